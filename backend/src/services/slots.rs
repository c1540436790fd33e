//! Bookable slots derived from weekly availability minus occupancy.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ServiceError, ServiceResult};
use super::policy::BookingPolicy;
use crate::db::repository::FullRepository;
use crate::models::{Availability, DayOfWeek, UserId};

/// Date range (school-local, both ends inclusive) to list slots for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub teacher_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub teacher_id: UserId,
    pub teacher_name: String,
    pub date_time: DateTime<Utc>,
    pub available: bool,
}

/// Every instant the windows produce between `start` and `end`, deduplicated
/// per teacher and ordered by `(instant, teacher)`.
///
/// Closed days, inactive windows and windows with `end <= start` produce
/// nothing. Lead time and occupancy are not applied here.
pub fn expand_windows(
    windows: &[Availability],
    start: NaiveDate,
    end: NaiveDate,
    policy: &BookingPolicy,
) -> BTreeSet<(DateTime<Utc>, UserId)> {
    let tz = policy.timezone();
    let step = policy.slot_interval_minutes.max(1);
    let mut instants = BTreeSet::new();

    for date in start.iter_days().take_while(|d| *d <= end) {
        let day = DayOfWeek::of(date);
        if !policy.is_open_day(day) {
            continue;
        }
        for window in windows
            .iter()
            .filter(|w| w.is_active && w.day_of_week == day && !w.is_empty())
        {
            let mut minute = window.start_time.minutes();
            while minute < window.end_time.minutes() {
                let local = NaiveTime::from_num_seconds_from_midnight_opt(minute * 60, 0);
                if let Some(instant) = local.and_then(|t| tz.to_utc(date, t)) {
                    instants.insert((instant, window.teacher_id));
                }
                minute += step;
            }
        }
    }
    instants
}

/// Whether `instant` is a slot the generator would offer for `teacher_id`,
/// ignoring occupancy.
pub fn is_generatable_slot(
    windows: &[Availability],
    teacher_id: UserId,
    instant: DateTime<Utc>,
    policy: &BookingPolicy,
    now: DateTime<Utc>,
) -> bool {
    if instant < now + policy.min_lead_time() {
        return false;
    }
    let teacher_windows: Vec<Availability> = windows
        .iter()
        .filter(|w| w.teacher_id == teacher_id)
        .cloned()
        .collect();
    let date = policy.timezone().local_date(instant);
    expand_windows(&teacher_windows, date, date, policy).contains(&(instant, teacher_id))
}

fn validate_range(query: &SlotQuery, policy: &BookingPolicy) -> ServiceResult<()> {
    if query.end_date < query.start_date {
        return Err(ServiceError::invalid_input(format!(
            "endDate {} is before startDate {}",
            query.end_date, query.start_date
        )));
    }
    let days = (query.end_date - query.start_date).num_days() + 1;
    if days > policy.max_range_days {
        return Err(ServiceError::invalid_input(format!(
            "date range covers {} days, at most {} allowed",
            days, policy.max_range_days
        )));
    }
    Ok(())
}

/// List bookable slots in `query`'s range, earliest first.
pub async fn generate_slots<R: FullRepository + ?Sized>(
    repo: &R,
    policy: &BookingPolicy,
    query: &SlotQuery,
    now: DateTime<Utc>,
) -> ServiceResult<Vec<Slot>> {
    validate_range(query, policy)?;

    let tz = policy.timezone();
    let (Some(from), Some(until)) = (
        tz.start_of_day(query.start_date),
        tz.end_of_day(query.end_date),
    ) else {
        return Err(ServiceError::invalid_input("date range is out of bounds"));
    };

    let windows = repo.list_availability(query.teacher_id, true).await?;
    let occupancy: HashMap<(UserId, DateTime<Utc>), u32> = repo
        .fetch_slot_occupancy(from, until, query.teacher_id)
        .await?
        .into_iter()
        .map(|o| ((o.teacher_id, o.scheduled_at), o.booked))
        .collect();

    let earliest = now + policy.min_lead_time();
    let instants: Vec<(DateTime<Utc>, UserId)> =
        expand_windows(&windows, query.start_date, query.end_date, policy)
            .into_iter()
            .filter(|(instant, _)| *instant >= earliest)
            .collect();

    let teacher_ids: Vec<UserId> = instants
        .iter()
        .map(|(_, teacher)| *teacher)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let names: HashMap<UserId, String> = repo
        .find_users(&teacher_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.display_name))
        .collect();

    let slots: Vec<Slot> = instants
        .into_iter()
        .map(|(date_time, teacher_id)| {
            let booked = occupancy.get(&(teacher_id, date_time)).copied().unwrap_or(0);
            Slot {
                teacher_id,
                teacher_name: names
                    .get(&teacher_id)
                    .cloned()
                    .unwrap_or_else(|| format!("Teacher {}", teacher_id)),
                date_time,
                available: booked < policy.slot_capacity,
            }
        })
        .collect();

    debug!(
        start = %query.start_date,
        end = %query.end_date,
        windows = windows.len(),
        slots = slots.len(),
        "generated slots"
    );
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AvailabilityId, ClockTime};
    use chrono::TimeZone;

    fn window(id: i64, teacher: i64, day: DayOfWeek, start: u32, end: u32) -> Availability {
        Availability {
            id: AvailabilityId(id),
            teacher_id: UserId(teacher),
            day_of_week: day,
            start_time: ClockTime::from_hm(start, 0).unwrap(),
            end_time: ClockTime::from_hm(end, 0).unwrap(),
            is_active: true,
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_window_excludes_end_time() {
        let windows = vec![window(1, 7, DayOfWeek::MONDAY, 9, 11)];
        let instants: Vec<_> = expand_windows(&windows, monday(), monday(), &BookingPolicy::default())
            .into_iter()
            .map(|(at, _)| at)
            .collect();
        assert_eq!(
            instants,
            vec![
                Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn test_overlapping_windows_do_not_double_generate() {
        let windows = vec![
            window(1, 7, DayOfWeek::MONDAY, 9, 11),
            window(2, 7, DayOfWeek::MONDAY, 10, 12),
        ];
        let instants = expand_windows(&windows, monday(), monday(), &BookingPolicy::default());
        assert_eq!(instants.len(), 3);
    }

    #[test]
    fn test_inverted_window_yields_nothing() {
        let windows = vec![window(1, 7, DayOfWeek::MONDAY, 11, 9)];
        assert!(expand_windows(&windows, monday(), monday(), &BookingPolicy::default()).is_empty());
    }

    #[test]
    fn test_closed_day_yields_nothing() {
        let sunday = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let windows = vec![window(1, 7, DayOfWeek::SUNDAY, 9, 11)];
        assert!(expand_windows(&windows, sunday, sunday, &BookingPolicy::default()).is_empty());
    }

    #[test]
    fn test_offset_shifts_instants_to_utc() {
        let policy = BookingPolicy {
            utc_offset_minutes: 120,
            ..Default::default()
        };
        let windows = vec![window(1, 7, DayOfWeek::MONDAY, 9, 10)];
        let instants: Vec<_> = expand_windows(&windows, monday(), monday(), &policy)
            .into_iter()
            .collect();
        assert_eq!(
            instants,
            vec![(Utc.with_ymd_and_hms(2026, 10, 19, 7, 0, 0).unwrap(), UserId(7))]
        );
    }

    #[test]
    fn test_is_generatable_slot() {
        let policy = BookingPolicy::default();
        let windows = vec![window(1, 7, DayOfWeek::MONDAY, 9, 11)];
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();
        let nine = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
        let half_past = Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap();

        assert!(is_generatable_slot(&windows, UserId(7), nine, &policy, now));
        assert!(!is_generatable_slot(&windows, UserId(8), nine, &policy, now));
        assert!(!is_generatable_slot(&windows, UserId(7), half_past, &policy, now));

        let too_late = nine - chrono::Duration::minutes(30);
        assert!(!is_generatable_slot(&windows, UserId(7), nine, &policy, too_late));
    }
}
