//! Attendance log and per-student statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::access::{ensure_booking_access, require_admin};
use super::error::{ServiceError, ServiceResult};
use crate::db::repository::FullRepository;
use crate::models::{
    Actor, AttendanceAction, AttendanceLog, Booking, BookingId, NewAttendanceLog, Role,
    StudentStats, UserId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRequest {
    pub booking_id: BookingId,
    pub student_id: UserId,
    pub action: AttendanceAction,
    /// When the event happened; defaults to the time it is recorded.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceReceipt {
    pub log: AttendanceLog,
    pub booking: Booking,
    /// Present when the event changed the student's statistics.
    pub stats: Option<StudentStats>,
}

/// Recount the student's completed and attended bookings and store the result.
pub(crate) async fn refresh_student_stats<R: FullRepository + ?Sized>(
    repo: &R,
    student_id: UserId,
    now: DateTime<Utc>,
) -> ServiceResult<StudentStats> {
    let counts = repo.attendance_counts(student_id).await?;
    let stats = repo
        .upsert_student_stats(StudentStats::from_counts(student_id, counts, now))
        .await?;
    debug!(
        student_id = %student_id,
        total = stats.total_classes,
        attended = stats.attended_classes,
        rate = stats.attendance_rate,
        "student stats refreshed"
    );
    Ok(stats)
}

/// Append a join/leave event. A `joined` event also stamps `attended_at`
/// once and refreshes the student's statistics.
pub async fn record_attendance<R: FullRepository + ?Sized>(
    repo: &R,
    actor: &Actor,
    request: AttendanceRequest,
    now: DateTime<Utc>,
) -> ServiceResult<AttendanceReceipt> {
    let booking = repo.get_booking(request.booking_id).await?;
    if booking.student_id != request.student_id {
        return Err(ServiceError::not_found(format!(
            "student {} has no booking {}",
            request.student_id, request.booking_id
        )));
    }
    ensure_booking_access(actor, &booking)?;

    let log = repo
        .append_attendance(NewAttendanceLog {
            booking_id: booking.id,
            student_id: booking.student_id,
            action: request.action,
            timestamp: request.timestamp.unwrap_or(now),
            recorded_by: actor.user_id,
        })
        .await?;

    let (booking, stats) = match request.action {
        AttendanceAction::Joined => {
            let booking = repo.mark_attended(booking.id, now).await?;
            let stats = refresh_student_stats(repo, booking.student_id, now).await?;
            (booking, Some(stats))
        }
        AttendanceAction::Left | AttendanceAction::Rejoined => (booking, None),
    };

    info!(
        booking_id = %booking.id,
        action = request.action.as_str(),
        recorded_by = %actor.user_id,
        "attendance recorded"
    );

    Ok(AttendanceReceipt {
        log,
        booking,
        stats,
    })
}

pub async fn list_attendance<R: FullRepository + ?Sized>(
    repo: &R,
    actor: &Actor,
    booking_id: BookingId,
) -> ServiceResult<Vec<AttendanceLog>> {
    let booking = repo.get_booking(booking_id).await?;
    ensure_booking_access(actor, &booking)?;
    Ok(repo.list_attendance(booking_id).await?)
}

/// Students may read only their own statistics. A student with no
/// recorded history reads as all zeros.
pub async fn get_student_stats<R: FullRepository + ?Sized>(
    repo: &R,
    actor: &Actor,
    student_id: UserId,
    now: DateTime<Utc>,
) -> ServiceResult<StudentStats> {
    if actor.role == Role::Student && actor.user_id != student_id {
        return Err(ServiceError::forbidden(
            "students may only read their own statistics",
        ));
    }
    Ok(repo
        .get_student_stats(student_id)
        .await?
        .unwrap_or_else(|| StudentStats::empty(student_id, now)))
}

/// Rebuild the cached statistics from bookings (admin repair).
pub async fn recompute_student_stats<R: FullRepository + ?Sized>(
    repo: &R,
    actor: &Actor,
    student_id: UserId,
    now: DateTime<Utc>,
) -> ServiceResult<StudentStats> {
    require_admin(actor, "recompute statistics")?;
    refresh_student_stats(repo, student_id, now).await
}
