use serde::{Deserialize, Serialize};

use super::{AvailabilityId, ClockTime, DayOfWeek, UserId};

/// Recurring weekly window during which a teacher can be booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub id: AvailabilityId,
    pub teacher_id: UserId,
    pub day_of_week: DayOfWeek,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub is_active: bool,
}

impl Availability {
    /// Windows with `end <= start` produce no slots.
    pub fn is_empty(&self) -> bool {
        self.end_time <= self.start_time
    }

    /// True when both windows are active, on the same teacher/day and share
    /// at least one minute. Touching windows (09:00-10:00, 10:00-11:00) do
    /// not overlap.
    pub fn overlaps(&self, other: &Availability) -> bool {
        self.is_active
            && other.is_active
            && self.teacher_id == other.teacher_id
            && self.day_of_week == other.day_of_week
            && windows_overlap(
                (self.start_time, self.end_time),
                (other.start_time, other.end_time),
            )
    }
}

/// Half-open interval overlap on wall-clock times.
pub fn windows_overlap(a: (ClockTime, ClockTime), b: (ClockTime, ClockTime)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Availability row to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAvailability {
    pub teacher_id: UserId,
    pub day_of_week: DayOfWeek,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
}

impl NewAvailability {
    pub fn into_availability(self, id: AvailabilityId) -> Availability {
        Availability {
            id,
            teacher_id: self.teacher_id,
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
            is_active: true,
        }
    }
}

/// Partial update of an availability window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityChanges {
    #[serde(default)]
    pub start_time: Option<ClockTime>,
    #[serde(default)]
    pub end_time: Option<ClockTime>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl AvailabilityChanges {
    pub fn apply(&self, current: &Availability) -> Availability {
        Availability {
            start_time: self.start_time.unwrap_or(current.start_time),
            end_time: self.end_time.unwrap_or(current.end_time),
            is_active: self.is_active.unwrap_or(current.is_active),
            ..current.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(id: i64, day: u8, start: (u32, u32), end: (u32, u32)) -> Availability {
        Availability {
            id: AvailabilityId(id),
            teacher_id: UserId(7),
            day_of_week: DayOfWeek::new(day).unwrap(),
            start_time: ClockTime::from_hm(start.0, start.1).unwrap(),
            end_time: ClockTime::from_hm(end.0, end.1).unwrap(),
            is_active: true,
        }
    }

    #[test]
    fn test_overlap_same_day() {
        let a = window(1, 1, (9, 0), (11, 0));
        let b = window(2, 1, (10, 30), (12, 0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn test_touching_windows_do_not_overlap() {
        let a = window(1, 1, (9, 0), (10, 0));
        let b = window(2, 1, (10, 0), (11, 0));
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_different_days_do_not_overlap() {
        let a = window(1, 1, (9, 0), (11, 0));
        let b = window(2, 2, (9, 0), (11, 0));
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_inactive_window_never_overlaps() {
        let a = window(1, 1, (9, 0), (11, 0));
        let mut b = window(2, 1, (9, 0), (11, 0));
        b.is_active = false;
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_inverted_window_is_empty() {
        assert!(window(1, 1, (11, 0), (9, 0)).is_empty());
        assert!(window(1, 1, (9, 0), (9, 0)).is_empty());
        assert!(!window(1, 1, (9, 0), (9, 30)).is_empty());
    }

    #[test]
    fn test_changes_apply_keeps_unset_fields() {
        let current = window(1, 3, (9, 0), (11, 0));
        let changes = AvailabilityChanges {
            end_time: Some(ClockTime::from_hm(12, 0).unwrap()),
            ..Default::default()
        };
        let updated = changes.apply(&current);
        assert_eq!(updated.start_time, current.start_time);
        assert_eq!(updated.end_time.to_string(), "12:00");
        assert!(updated.is_active);
    }
}
