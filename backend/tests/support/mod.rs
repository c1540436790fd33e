//! Shared fixtures for the integration tests.
#![allow(dead_code)]

pub mod env;

pub use env::with_scoped_env;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;

use lms_booking::db::repositories::LocalRepository;
use lms_booking::db::repository::{
    AvailabilityRepository, AvailabilityWrite, PackageRepository, UserRepository,
};
use lms_booking::models::{
    Actor, Availability, ClockTime, DayOfWeek, NewPackage, Package, PackageOverride, Role,
    TopicId, User, UserId,
};
use lms_booking::services::booking::create_booking;
use lms_booking::services::{
    BookingPolicy, BookingReceipt, BookingRequest, CalendarError, CalendarEvent,
    CalendarService, DisabledCalendar, EventDetails,
};

pub const TEACHER: i64 = 20;
pub const STUDENT: i64 = 100;
pub const ADMIN: i64 = 1;

/// Friday 2026-10-16 12:00 UTC.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
}

/// The Monday after [`now`].
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

pub fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(hour, minute, 0).unwrap())
}

pub fn hm(hour: u32, minute: u32) -> ClockTime {
    ClockTime::from_hm(hour, minute).unwrap()
}

pub async fn seed_user(repo: &LocalRepository, id: i64, name: &str, role: Role) {
    repo.upsert_user(User {
        id: UserId(id),
        display_name: name.to_string(),
        role,
    })
    .await
    .unwrap();
}

/// Active weekly window for `teacher` on `day` (0 = Sunday).
pub async fn window(
    repo: &LocalRepository,
    teacher: i64,
    day: u8,
    start: ClockTime,
    end: ClockTime,
) -> Availability {
    match repo
        .insert_availability(lms_booking::models::NewAvailability {
            teacher_id: UserId(teacher),
            day_of_week: DayOfWeek::new(day).unwrap(),
            start_time: start,
            end_time: end,
        })
        .await
        .unwrap()
    {
        AvailabilityWrite::Saved(window) => window,
        AvailabilityWrite::Overlaps { existing } => panic!("fixture overlaps {:?}", existing),
    }
}

/// A package valid for the next 90 days, bought 30 days ago.
pub async fn package(repo: &LocalRepository, student: i64, total: i32) -> Package {
    repo.insert_package(
        NewPackage {
            user_id: UserId(student),
            total_lessons: total,
            valid_from: now() - Duration::days(30),
            valid_until: now() + Duration::days(90),
        },
        now() - Duration::days(30),
    )
    .await
    .unwrap()
}

/// A package already partly used, e.g. 80 total / 5 used / 75 remaining.
pub async fn used_package(repo: &LocalRepository, student: i64, total: i32, used: i32) -> Package {
    let fresh = package(repo, student, total).await;
    repo.override_package(
        fresh.id,
        PackageOverride {
            used_lessons: Some(used),
            remaining_lessons: Some(total - used),
            ..Default::default()
        },
    )
    .await
    .unwrap()
}

/// Teacher 20 with a Monday 09:00-11:00 window and student 100 with ten credits.
pub async fn school() -> LocalRepository {
    let repo = LocalRepository::new();
    seed_user(&repo, TEACHER, "Ana", Role::Teacher).await;
    seed_user(&repo, STUDENT, "Ben", Role::Student).await;
    window(&repo, TEACHER, 1, hm(9, 0), hm(11, 0)).await;
    package(&repo, STUDENT, 10).await;
    repo
}

pub fn request(teacher: i64, scheduled_at: DateTime<Utc>) -> BookingRequest {
    BookingRequest {
        teacher_id: UserId(teacher),
        topic_id: TopicId(1),
        scheduled_at,
        student_id: None,
    }
}

/// Book Monday 09:00 with teacher 20 as `student`, no calendar.
pub async fn book_monday_nine(repo: &LocalRepository, student: i64) -> BookingReceipt {
    create_booking(
        repo,
        &BookingPolicy::default(),
        &DisabledCalendar,
        60,
        &Actor::student(student),
        request(TEACHER, at(monday(), 9, 0)),
        now(),
    )
    .await
    .unwrap()
}

/// Calendar that succeeds and remembers every call.
#[derive(Default)]
pub struct RecordingCalendar {
    pub created: Mutex<Vec<EventDetails>>,
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl CalendarService for RecordingCalendar {
    async fn create_event(&self, details: &EventDetails) -> Result<CalendarEvent, CalendarError> {
        let mut created = self.created.lock();
        created.push(details.clone());
        Ok(CalendarEvent {
            event_id: format!("evt-{}", created.len()),
            join_link: Some(format!("https://meet.example/{}", details.booking_id)),
        })
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError> {
        self.deleted.lock().push(event_id.to_string());
        Ok(())
    }
}

/// Calendar whose every call fails with a 503.
pub struct FailingCalendar;

#[async_trait]
impl CalendarService for FailingCalendar {
    async fn create_event(&self, _details: &EventDetails) -> Result<CalendarEvent, CalendarError> {
        Err(CalendarError::Api {
            status: 503,
            message: "calendar unavailable".to_string(),
        })
    }

    async fn delete_event(&self, _event_id: &str) -> Result<(), CalendarError> {
        Err(CalendarError::Api {
            status: 503,
            message: "calendar unavailable".to_string(),
        })
    }
}
