//! Attendance log and student statistics repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{AttendanceCounts, AttendanceLog, BookingId, NewAttendanceLog, StudentStats, UserId};

#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    /// Append one event. Logs are never updated.
    async fn append_attendance(&self, log: NewAttendanceLog) -> RepositoryResult<AttendanceLog>;

    /// Events of a booking in timestamp order.
    async fn list_attendance(&self, booking_id: BookingId) -> RepositoryResult<Vec<AttendanceLog>>;

    /// Completed and attended-completed booking counts of a student,
    /// read from the bookings table.
    async fn attendance_counts(&self, student_id: UserId) -> RepositoryResult<AttendanceCounts>;

    /// Insert or replace the cached statistics row of a student.
    async fn upsert_student_stats(&self, stats: StudentStats) -> RepositoryResult<StudentStats>;

    async fn get_student_stats(&self, student_id: UserId) -> RepositoryResult<Option<StudentStats>>;
}
