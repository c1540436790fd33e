use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookingId, TopicId, UserId};

/// Lifecycle of a booked lesson.
///
/// ```text
/// SCHEDULED ──► COMPLETED
///     │
///     └──────► CANCELLED
/// ```
/// Both COMPLETED and CANCELLED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Scheduled,
    Completed,
    Cancelled,
}

/// A status change the state machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move booking from {from} to {to}")]
pub struct InvalidTransition {
    pub from: BookingStatus,
    pub to: BookingStatus,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "SCHEDULED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Scheduled)
    }

    /// Statuses that consume capacity of a slot.
    pub fn occupies_slot(&self) -> bool {
        matches!(self, BookingStatus::Scheduled | BookingStatus::Completed)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Scheduled, BookingStatus::Completed)
                | (BookingStatus::Scheduled, BookingStatus::Cancelled)
        )
    }

    pub fn transition(self, next: BookingStatus) -> Result<BookingStatus, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(BookingStatus::Scheduled),
            "COMPLETED" => Ok(BookingStatus::Completed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(format!("Unknown booking status: {}", other)),
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lesson reserved by a student with a teacher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub student_id: UserId,
    pub teacher_id: UserId,
    pub topic_id: TopicId,
    pub scheduled_at: DateTime<Utc>,
    pub status: BookingStatus,
    pub attended_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub external_event_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Whether `user` is the student or the teacher of this lesson.
    pub fn involves(&self, user: UserId) -> bool {
        self.student_id == user || self.teacher_id == user
    }
}

/// Booking row to insert; always starts SCHEDULED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub student_id: UserId,
    pub teacher_id: UserId,
    pub topic_id: TopicId,
    pub scheduled_at: DateTime<Utc>,
}

impl NewBooking {
    pub fn into_booking(self, id: BookingId, created_at: DateTime<Utc>) -> Booking {
        Booking {
            id,
            student_id: self.student_id,
            teacher_id: self.teacher_id,
            topic_id: self.topic_id,
            scheduled_at: self.scheduled_at,
            status: BookingStatus::Scheduled,
            attended_at: None,
            cancelled_at: None,
            external_event_ref: None,
            created_at,
        }
    }
}

/// Number of live bookings at one (teacher, instant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotOccupancy {
    pub teacher_id: UserId,
    pub scheduled_at: DateTime<Utc>,
    pub booked: u32,
}

/// Filter for booking listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingFilter {
    #[serde(default)]
    pub student_id: Option<UserId>,
    #[serde(default)]
    pub teacher_id: Option<UserId>,
    #[serde(default)]
    pub status: Option<BookingStatus>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.student_id.map_or(true, |id| booking.student_id == id)
            && self.teacher_id.map_or(true, |id| booking.teacher_id == id)
            && self.status.map_or(true, |s| booking.status == s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduled_can_complete_or_cancel() {
        assert_eq!(
            BookingStatus::Scheduled.transition(BookingStatus::Completed),
            Ok(BookingStatus::Completed)
        );
        assert_eq!(
            BookingStatus::Scheduled.transition(BookingStatus::Cancelled),
            Ok(BookingStatus::Cancelled)
        );
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for from in [BookingStatus::Completed, BookingStatus::Cancelled] {
            assert!(from.is_terminal());
            for to in [
                BookingStatus::Scheduled,
                BookingStatus::Completed,
                BookingStatus::Cancelled,
            ] {
                let err = from.transition(to).unwrap_err();
                assert_eq!(err.from, from);
                assert_eq!(err.to, to);
            }
        }
    }

    #[test]
    fn test_scheduled_to_scheduled_is_invalid() {
        assert!(BookingStatus::Scheduled
            .transition(BookingStatus::Scheduled)
            .is_err());
    }

    #[test]
    fn test_cancelled_does_not_occupy_slot() {
        assert!(BookingStatus::Scheduled.occupies_slot());
        assert!(BookingStatus::Completed.occupies_slot());
        assert!(!BookingStatus::Cancelled.occupies_slot());
    }

    #[test]
    fn test_status_string_roundtrip() {
        for s in [
            BookingStatus::Scheduled,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(s.as_str().parse::<BookingStatus>().unwrap(), s);
        }
        assert!("DONE".parse::<BookingStatus>().is_err());
    }
}
