use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PackageId, UserId};

/// A purchased bundle of lesson credits.
///
/// The engine keeps `used_lessons + remaining_lessons == total_lessons`;
/// only an admin override may break that balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: PackageId,
    pub user_id: UserId,
    pub total_lessons: i32,
    pub used_lessons: i32,
    pub remaining_lessons: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Package {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.valid_until >= now
    }

    pub fn is_balanced(&self) -> bool {
        self.used_lessons + self.remaining_lessons == self.total_lessons
    }

    pub fn has_credit(&self) -> bool {
        self.remaining_lessons > 0
    }

    /// Consume one lesson.
    pub fn debit(&mut self) {
        self.used_lessons += 1;
        self.remaining_lessons -= 1;
    }

    /// Give one lesson back.
    pub fn refund(&mut self) {
        self.used_lessons -= 1;
        self.remaining_lessons += 1;
    }
}

/// The package credits are drawn from and refunded to: the most recently
/// created one still valid at `now`. Ties on `created_at` go to the higher id.
pub fn select_active_package<'a, I>(packages: I, now: DateTime<Utc>) -> Option<&'a Package>
where
    I: IntoIterator<Item = &'a Package>,
{
    packages
        .into_iter()
        .filter(|p| p.is_active(now))
        .max_by_key(|p| (p.created_at, p.id))
}

/// Package to create; starts with no lessons used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPackage {
    pub user_id: UserId,
    pub total_lessons: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl NewPackage {
    pub fn into_package(self, id: PackageId, created_at: DateTime<Utc>) -> Package {
        Package {
            id,
            user_id: self.user_id,
            total_lessons: self.total_lessons,
            used_lessons: 0,
            remaining_lessons: self.total_lessons,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            created_at,
        }
    }
}

/// Administrative correction of a package's counters. Fields left `None`
/// keep their current value; nothing is re-balanced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOverride {
    #[serde(default)]
    pub total_lessons: Option<i32>,
    #[serde(default)]
    pub used_lessons: Option<i32>,
    #[serde(default)]
    pub remaining_lessons: Option<i32>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

impl PackageOverride {
    pub fn apply(&self, current: &Package) -> Package {
        Package {
            total_lessons: self.total_lessons.unwrap_or(current.total_lessons),
            used_lessons: self.used_lessons.unwrap_or(current.used_lessons),
            remaining_lessons: self.remaining_lessons.unwrap_or(current.remaining_lessons),
            valid_until: self.valid_until.unwrap_or(current.valid_until),
            ..current.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn package(id: i64, created_days_ago: i64, valid_days: i64) -> Package {
        NewPackage {
            user_id: UserId(1),
            total_lessons: 10,
            valid_from: now() - Duration::days(30),
            valid_until: now() + Duration::days(valid_days),
        }
        .into_package(PackageId(id), now() - Duration::days(created_days_ago))
    }

    #[test]
    fn test_debit_and_refund_keep_balance() {
        let mut p = package(1, 1, 10);
        p.debit();
        assert_eq!((p.used_lessons, p.remaining_lessons), (1, 9));
        assert!(p.is_balanced());
        p.refund();
        assert_eq!((p.used_lessons, p.remaining_lessons), (0, 10));
        assert!(p.is_balanced());
    }

    #[test]
    fn test_active_package_is_most_recent_valid() {
        let older = package(1, 10, 30);
        let newer = package(2, 2, 30);
        let expired = package(3, 1, -1);
        let all = vec![older, newer, expired];
        let active = select_active_package(&all, now()).unwrap();
        assert_eq!(active.id, PackageId(2));
    }

    #[test]
    fn test_no_active_package_when_all_expired() {
        let all = vec![package(1, 10, -5), package(2, 3, -1)];
        assert!(select_active_package(&all, now()).is_none());
    }

    #[test]
    fn test_valid_until_now_is_still_active() {
        let p = package(1, 1, 0);
        assert!(p.is_active(now()));
    }

    #[test]
    fn test_override_can_unbalance() {
        let p = package(1, 1, 10);
        let changed = PackageOverride {
            remaining_lessons: Some(-2),
            ..Default::default()
        }
        .apply(&p);
        assert_eq!(changed.remaining_lessons, -2);
        assert!(!changed.is_balanced());
    }
}
