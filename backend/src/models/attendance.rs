use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AttendanceLogId, BookingId, UserId};

/// Presence event reported for a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceAction {
    Joined,
    Left,
    Rejoined,
}

impl AttendanceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceAction::Joined => "joined",
            AttendanceAction::Left => "left",
            AttendanceAction::Rejoined => "rejoined",
        }
    }
}

impl std::str::FromStr for AttendanceAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "joined" => Ok(AttendanceAction::Joined),
            "left" => Ok(AttendanceAction::Left),
            "rejoined" => Ok(AttendanceAction::Rejoined),
            other => Err(format!("Unknown attendance action: {}", other)),
        }
    }
}

/// Append-only attendance event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceLog {
    pub id: AttendanceLogId,
    pub booking_id: BookingId,
    pub student_id: UserId,
    pub action: AttendanceAction,
    pub timestamp: DateTime<Utc>,
    pub recorded_by: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttendanceLog {
    pub booking_id: BookingId,
    pub student_id: UserId,
    pub action: AttendanceAction,
    pub timestamp: DateTime<Utc>,
    pub recorded_by: UserId,
}

impl NewAttendanceLog {
    pub fn into_log(self, id: AttendanceLogId) -> AttendanceLog {
        AttendanceLog {
            id,
            booking_id: self.booking_id,
            student_id: self.student_id,
            action: self.action,
            timestamp: self.timestamp,
            recorded_by: self.recorded_by,
        }
    }
}

/// Raw counts a student's statistics are derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceCounts {
    /// Completed bookings.
    pub total_classes: i32,
    /// Completed bookings with a recorded join.
    pub attended_classes: i32,
}

impl AttendanceCounts {
    /// `round(100 * attended / total)`, 0 with no completed classes, clamped to 0..=100.
    pub fn attendance_rate(&self) -> i32 {
        if self.total_classes <= 0 {
            return 0;
        }
        let attended = self.attended_classes.clamp(0, self.total_classes) as f64;
        let rate = (100.0 * attended / self.total_classes as f64).round() as i32;
        rate.clamp(0, 100)
    }
}

/// Cached per-student attendance aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub student_id: UserId,
    pub total_classes: i32,
    pub attended_classes: i32,
    pub attendance_rate: i32,
    pub updated_at: DateTime<Utc>,
}

impl StudentStats {
    pub fn from_counts(student_id: UserId, counts: AttendanceCounts, now: DateTime<Utc>) -> Self {
        Self {
            student_id,
            total_classes: counts.total_classes,
            attended_classes: counts.attended_classes,
            attendance_rate: counts.attendance_rate(),
            updated_at: now,
        }
    }

    /// Statistics for a student with no completed classes yet.
    pub fn empty(student_id: UserId, now: DateTime<Utc>) -> Self {
        Self::from_counts(student_id, AttendanceCounts::default(), now)
    }
}
