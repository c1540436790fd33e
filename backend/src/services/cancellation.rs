//! Cancellation policy and credit refunds.
//!
//! This is the only place that decides whether a cancellation is allowed
//! and whether it returns a credit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::access::ensure_booking_access;
use super::booking::release_calendar_event;
use super::calendar::CalendarService;
use super::error::{ServiceError, ServiceResult, ServiceWarning};
use super::policy::BookingPolicy;
use crate::db::repository::{CancellationOutcome, FullRepository};
use crate::models::{Actor, Booking, BookingId, BookingStatus, Package, Role};

/// What an allowed cancellation does to credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancellationDecision {
    pub refund: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationReceipt {
    pub booking: Booking,
    pub credit_refunded: bool,
    /// The package the credit went back to, after the refund.
    pub refunded_package: Option<Package>,
    pub warnings: Vec<ServiceWarning>,
}

/// Apply the notice rule to a cancellation request.
///
/// Students need `cancellation_notice_hours` of notice; teachers and admins
/// may cancel at any time. Every allowed cancellation refunds the credit.
pub fn decide_cancellation(
    policy: &BookingPolicy,
    actor: &Actor,
    booking: &Booking,
    now: DateTime<Utc>,
) -> ServiceResult<CancellationDecision> {
    booking.status.transition(BookingStatus::Cancelled)?;

    let until_class = booking.scheduled_at - now;
    if actor.role == Role::Student && until_class < policy.cancellation_notice() {
        return Err(ServiceError::policy(format!(
            "cancellations require at least {} hours notice",
            policy.cancellation_notice_hours
        )));
    }
    Ok(CancellationDecision { refund: true })
}

/// Cancel a SCHEDULED booking and refund its credit when policy allows.
///
/// Status change and refund commit together or not at all. A concurrent
/// second cancellation finds the booking no longer SCHEDULED and fails with
/// `InvalidTransition` without refunding again; a refund with no active
/// package to land on fails with `PolicyViolation` and leaves the booking
/// SCHEDULED.
pub async fn cancel_booking<R: FullRepository + ?Sized>(
    repo: &R,
    policy: &BookingPolicy,
    calendar: &dyn CalendarService,
    actor: &Actor,
    id: BookingId,
    now: DateTime<Utc>,
) -> ServiceResult<CancellationReceipt> {
    let current = repo.get_booking(id).await?;
    ensure_booking_access(actor, &current)?;
    let decision = decide_cancellation(policy, actor, &current, now)?;

    let (booking, refunded) = match repo.cancel_booking(id, now, decision.refund).await? {
        CancellationOutcome::Cancelled { booking, refunded } => (booking, refunded),
        CancellationOutcome::NotScheduled { booking } => {
            booking.status.transition(BookingStatus::Cancelled)?;
            return Err(ServiceError::InvalidTransition(format!(
                "booking {} is no longer scheduled",
                booking.id
            )));
        }
        CancellationOutcome::NoActivePackage { booking } => {
            warn!(booking_id = %booking.id, student_id = %booking.student_id, "no active package to refund");
            return Err(ServiceError::policy(format!(
                "student {} has no active package to refund the credit to; the booking was not cancelled",
                booking.student_id
            )));
        }
    };

    let mut warnings = Vec::new();

    info!(
        booking_id = %booking.id,
        cancelled_by = %actor.user_id,
        refunded = refunded.is_some(),
        "booking cancelled"
    );

    release_calendar_event(calendar, &booking, &mut warnings).await;

    Ok(CancellationReceipt {
        booking,
        credit_refunded: refunded.is_some(),
        refunded_package: refunded,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TopicId, UserId};
    use chrono::{Duration, TimeZone};

    fn booking_at(at: DateTime<Utc>, status: BookingStatus) -> Booking {
        Booking {
            id: BookingId(1),
            student_id: UserId(10),
            teacher_id: UserId(20),
            topic_id: TopicId(1),
            scheduled_at: at,
            status,
            attended_at: None,
            cancelled_at: None,
            external_event_ref: None,
            created_at: at - Duration::days(1),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_student_with_enough_notice_gets_refund() {
        let booking = booking_at(now() + Duration::hours(10), BookingStatus::Scheduled);
        let decision =
            decide_cancellation(&BookingPolicy::default(), &Actor::student(10), &booking, now())
                .unwrap();
        assert!(decision.refund);
    }

    #[test]
    fn test_exactly_six_hours_is_enough() {
        let booking = booking_at(now() + Duration::hours(6), BookingStatus::Scheduled);
        assert!(
            decide_cancellation(&BookingPolicy::default(), &Actor::student(10), &booking, now())
                .is_ok()
        );
    }

    #[test]
    fn test_student_short_notice_is_policy_violation() {
        let booking = booking_at(now() + Duration::hours(3), BookingStatus::Scheduled);
        let err =
            decide_cancellation(&BookingPolicy::default(), &Actor::student(10), &booking, now())
                .unwrap_err();
        assert_eq!(err.code(), "POLICY_VIOLATION");
    }

    #[test]
    fn test_teacher_and_admin_ignore_notice() {
        let booking = booking_at(now() + Duration::hours(1), BookingStatus::Scheduled);
        let policy = BookingPolicy::default();
        assert!(decide_cancellation(&policy, &Actor::teacher(20), &booking, now()).unwrap().refund);
        assert!(decide_cancellation(&policy, &Actor::admin(1), &booking, now()).unwrap().refund);
    }

    #[test]
    fn test_terminal_booking_is_invalid_transition() {
        let booking = booking_at(now() + Duration::hours(10), BookingStatus::Completed);
        let err =
            decide_cancellation(&BookingPolicy::default(), &Actor::admin(1), &booking, now())
                .unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }
}
