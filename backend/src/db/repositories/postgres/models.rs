use chrono::{DateTime, NaiveTime, Utc};
use diesel::prelude::*;

use super::schema::{attendance_logs, availability, bookings, packages, student_stats, users};
use crate::db::repository::{RepositoryError, RepositoryResult};
use crate::models::{
    AttendanceLog, AttendanceLogId, Availability, AvailabilityId, Booking, BookingId, ClockTime,
    DayOfWeek, NewAttendanceLog, NewAvailability, NewBooking, NewPackage, Package, PackageId,
    StudentStats, TopicId, User, UserId,
};

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    pub user_id: i64,
    pub display_name: String,
    pub role: String,
}

impl UserRow {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id.value(),
            display_name: user.display_name.clone(),
            role: user.role.as_str().to_string(),
        }
    }

    pub fn into_user(self) -> RepositoryResult<User> {
        Ok(User {
            id: UserId(self.user_id),
            display_name: self.display_name,
            role: self.role.parse().map_err(RepositoryError::internal)?,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = availability)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AvailabilityRow {
    pub availability_id: i64,
    pub teacher_id: i64,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
}

impl AvailabilityRow {
    pub fn into_availability(self) -> RepositoryResult<Availability> {
        let day_of_week = u8::try_from(self.day_of_week)
            .ok()
            .and_then(DayOfWeek::new)
            .ok_or_else(|| {
                RepositoryError::internal(format!(
                    "availability {} has day_of_week {}",
                    self.availability_id, self.day_of_week
                ))
            })?;
        Ok(Availability {
            id: AvailabilityId(self.availability_id),
            teacher_id: UserId(self.teacher_id),
            day_of_week,
            start_time: ClockTime::from(self.start_time),
            end_time: ClockTime::from(self.end_time),
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = availability)]
pub struct NewAvailabilityRow {
    pub teacher_id: i64,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
}

impl From<&NewAvailability> for NewAvailabilityRow {
    fn from(a: &NewAvailability) -> Self {
        Self {
            teacher_id: a.teacher_id.value(),
            day_of_week: i16::from(a.day_of_week.index()),
            start_time: a.start_time.as_naive(),
            end_time: a.end_time.as_naive(),
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BookingRow {
    pub booking_id: i64,
    pub student_id: i64,
    pub teacher_id: i64,
    pub topic_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub status: String,
    pub attended_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub external_event_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingRow {
    pub fn into_booking(self) -> RepositoryResult<Booking> {
        Ok(Booking {
            id: BookingId(self.booking_id),
            student_id: UserId(self.student_id),
            teacher_id: UserId(self.teacher_id),
            topic_id: TopicId(self.topic_id),
            scheduled_at: self.scheduled_at,
            status: self.status.parse().map_err(RepositoryError::internal)?,
            attended_at: self.attended_at,
            cancelled_at: self.cancelled_at,
            external_event_ref: self.external_event_ref,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bookings)]
pub struct NewBookingRow {
    pub student_id: i64,
    pub teacher_id: i64,
    pub topic_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl NewBookingRow {
    pub fn new(booking: &NewBooking, created_at: DateTime<Utc>) -> Self {
        Self {
            student_id: booking.student_id.value(),
            teacher_id: booking.teacher_id.value(),
            topic_id: booking.topic_id.value(),
            scheduled_at: booking.scheduled_at,
            status: "SCHEDULED".to_string(),
            created_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = packages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PackageRow {
    pub package_id: i64,
    pub user_id: i64,
    pub total_lessons: i32,
    pub used_lessons: i32,
    pub remaining_lessons: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<PackageRow> for Package {
    fn from(row: PackageRow) -> Self {
        Package {
            id: PackageId(row.package_id),
            user_id: UserId(row.user_id),
            total_lessons: row.total_lessons,
            used_lessons: row.used_lessons,
            remaining_lessons: row.remaining_lessons,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = packages)]
pub struct NewPackageRow {
    pub user_id: i64,
    pub total_lessons: i32,
    pub used_lessons: i32,
    pub remaining_lessons: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewPackageRow {
    pub fn new(package: &NewPackage, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id: package.user_id.value(),
            total_lessons: package.total_lessons,
            used_lessons: 0,
            remaining_lessons: package.total_lessons,
            valid_from: package.valid_from,
            valid_until: package.valid_until,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = attendance_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AttendanceLogRow {
    pub attendance_log_id: i64,
    pub booking_id: i64,
    pub student_id: i64,
    pub action: String,
    pub logged_at: DateTime<Utc>,
    pub recorded_by: i64,
}

impl AttendanceLogRow {
    pub fn into_log(self) -> RepositoryResult<AttendanceLog> {
        Ok(AttendanceLog {
            id: AttendanceLogId(self.attendance_log_id),
            booking_id: BookingId(self.booking_id),
            student_id: UserId(self.student_id),
            action: self.action.parse().map_err(RepositoryError::internal)?,
            timestamp: self.logged_at,
            recorded_by: UserId(self.recorded_by),
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = attendance_logs)]
pub struct NewAttendanceLogRow {
    pub booking_id: i64,
    pub student_id: i64,
    pub action: String,
    pub logged_at: DateTime<Utc>,
    pub recorded_by: i64,
}

impl From<&NewAttendanceLog> for NewAttendanceLogRow {
    fn from(log: &NewAttendanceLog) -> Self {
        Self {
            booking_id: log.booking_id.value(),
            student_id: log.student_id.value(),
            action: log.action.as_str().to_string(),
            logged_at: log.timestamp,
            recorded_by: log.recorded_by.value(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = student_stats)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StudentStatsRow {
    pub student_id: i64,
    pub total_classes: i32,
    pub attended_classes: i32,
    pub attendance_rate: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<&StudentStats> for StudentStatsRow {
    fn from(stats: &StudentStats) -> Self {
        Self {
            student_id: stats.student_id.value(),
            total_classes: stats.total_classes,
            attended_classes: stats.attended_classes,
            attendance_rate: stats.attendance_rate,
            updated_at: stats.updated_at,
        }
    }
}

impl From<StudentStatsRow> for StudentStats {
    fn from(row: StudentStatsRow) -> Self {
        StudentStats {
            student_id: UserId(row.student_id),
            total_classes: row.total_classes,
            attended_classes: row.attended_classes,
            attendance_rate: row.attendance_rate,
            updated_at: row.updated_at,
        }
    }
}
