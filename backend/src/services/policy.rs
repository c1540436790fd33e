//! Tunable booking rules, loaded from the `[booking]` section of `lms.toml`.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::models::{DayOfWeek, SchoolTimezone};

/// Numbers the slot generator, booking service and cancellation engine share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingPolicy {
    /// Live bookings allowed per (teacher, instant).
    pub slot_capacity: u32,
    /// Slots starting sooner than this are not offered or bookable.
    pub min_lead_time_minutes: i64,
    /// Students cannot cancel with less notice than this.
    pub cancellation_notice_hours: i64,
    /// Step between generated slots inside a window.
    pub slot_interval_minutes: u32,
    /// Weekdays (0=Sunday) with no classes.
    pub closed_days: Vec<u8>,
    /// Offset of the school's wall clock from UTC.
    pub utc_offset_minutes: i32,
    /// Longest date range a slot listing may cover, both ends inclusive.
    pub max_range_days: i64,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            slot_capacity: 10,
            min_lead_time_minutes: 60,
            cancellation_notice_hours: 6,
            slot_interval_minutes: 60,
            closed_days: vec![0],
            utc_offset_minutes: 0,
            max_range_days: 62,
        }
    }
}

impl BookingPolicy {
    /// Whether classes are held on `day`. The single home of the closed-day rule.
    pub fn is_open_day(&self, day: DayOfWeek) -> bool {
        !self.closed_days.contains(&day.index())
    }

    pub fn timezone(&self) -> SchoolTimezone {
        SchoolTimezone::from_offset_minutes(self.utc_offset_minutes).unwrap_or_default()
    }

    pub fn min_lead_time(&self) -> Duration {
        Duration::minutes(self.min_lead_time_minutes)
    }

    pub fn slot_interval(&self) -> Duration {
        Duration::minutes(i64::from(self.slot_interval_minutes))
    }

    pub fn cancellation_notice(&self) -> Duration {
        Duration::hours(self.cancellation_notice_hours)
    }

    /// Reject settings the engine cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.slot_capacity == 0 {
            return Err("booking.slot_capacity must be at least 1".to_string());
        }
        if self.slot_interval_minutes == 0 {
            return Err("booking.slot_interval_minutes must be at least 1".to_string());
        }
        if self.min_lead_time_minutes < 0 || self.cancellation_notice_hours < 0 {
            return Err("booking lead and notice times cannot be negative".to_string());
        }
        if self.max_range_days < 1 {
            return Err("booking.max_range_days must be at least 1".to_string());
        }
        if let Some(day) = self.closed_days.iter().find(|d| **d > 6) {
            return Err(format!("booking.closed_days has {}, expected 0..=6", day));
        }
        if SchoolTimezone::from_offset_minutes(self.utc_offset_minutes).is_none() {
            return Err(format!(
                "booking.utc_offset_minutes {} is out of range",
                self.utc_offset_minutes
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = BookingPolicy::default();
        assert_eq!(policy.slot_capacity, 10);
        assert_eq!(policy.min_lead_time(), Duration::hours(1));
        assert_eq!(policy.cancellation_notice(), Duration::hours(6));
        assert_eq!(policy.slot_interval(), Duration::minutes(60));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_sunday_closed_by_default() {
        let policy = BookingPolicy::default();
        assert!(!policy.is_open_day(DayOfWeek::SUNDAY));
        assert!(policy.is_open_day(DayOfWeek::MONDAY));
        assert!(policy.is_open_day(DayOfWeek::SATURDAY));
    }

    #[test]
    fn test_saturday_closure_is_configuration() {
        let policy = BookingPolicy {
            closed_days: vec![0, 6],
            ..Default::default()
        };
        assert!(!policy.is_open_day(DayOfWeek::SATURDAY));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let policy: BookingPolicy = toml::from_str("slot_capacity = 4").unwrap();
        assert_eq!(policy.slot_capacity, 4);
        assert_eq!(policy.closed_days, vec![0]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_day = BookingPolicy {
            closed_days: vec![7],
            ..Default::default()
        };
        assert!(bad_day.validate().is_err());

        let bad_offset = BookingPolicy {
            utc_offset_minutes: 24 * 60 + 1,
            ..Default::default()
        };
        assert!(bad_offset.validate().is_err());

        let zero_interval = BookingPolicy {
            slot_interval_minutes: 0,
            ..Default::default()
        };
        assert!(zero_interval.validate().is_err());
    }
}
