//! Booking creation, lookup, completion and admin deletion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::access::{ensure_booking_access, ensure_teaches, require_admin, resolve_student};
use super::attendance::refresh_student_stats;
use super::calendar::{CalendarService, EventDetails};
use super::error::{ServiceError, ServiceResult, ServiceWarning};
use super::policy::BookingPolicy;
use super::slots::is_generatable_slot;
use crate::db::repository::{
    FullRepository, ReservationOutcome, ReservationRules, TransitionOutcome,
};
use crate::models::{
    Actor, Booking, BookingFilter, BookingId, BookingStatus, NewBooking, Package, Role, TopicId,
    UserId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub teacher_id: UserId,
    pub topic_id: TopicId,
    pub scheduled_at: DateTime<Utc>,
    /// Only admins booking on behalf of a student set this.
    #[serde(default)]
    pub student_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingReceipt {
    pub booking: Booking,
    /// The package the credit was taken from, after the debit.
    pub package: Package,
    pub join_link: Option<String>,
    pub warnings: Vec<ServiceWarning>,
}

pub(crate) fn event_details(booking: &Booking, lesson_minutes: u32) -> EventDetails {
    EventDetails {
        booking_id: booking.id,
        teacher_id: booking.teacher_id,
        student_id: booking.student_id,
        topic_id: booking.topic_id,
        starts_at: booking.scheduled_at,
        duration_minutes: lesson_minutes,
        title: format!("Lesson {} (topic {})", booking.id, booking.topic_id),
    }
}

/// Best-effort removal of the calendar event attached to `booking`.
pub(crate) async fn release_calendar_event(
    calendar: &dyn CalendarService,
    booking: &Booking,
    warnings: &mut Vec<ServiceWarning>,
) {
    let Some(event_ref) = booking.external_event_ref.as_deref() else {
        return;
    };
    if !calendar.is_enabled() {
        return;
    }
    if let Err(e) = calendar.delete_event(event_ref).await {
        warn!(booking_id = %booking.id, error = %e, "calendar event deletion failed");
        warnings.push(ServiceWarning::external(format!(
            "calendar event {} was not deleted: {}",
            event_ref, e
        )));
    }
}

/// Reserve a slot and take one credit from the student's active package.
///
/// The capacity re-count, package lookup, insert and debit happen in one
/// repository transaction. The calendar event is created afterwards; its
/// failure leaves the booking in place and is reported as a warning.
pub async fn create_booking<R: FullRepository + ?Sized>(
    repo: &R,
    policy: &BookingPolicy,
    calendar: &dyn CalendarService,
    lesson_minutes: u32,
    actor: &Actor,
    request: BookingRequest,
    now: DateTime<Utc>,
) -> ServiceResult<BookingReceipt> {
    let student_id = resolve_student(actor, request.student_id)?;

    let windows = repo.list_availability(Some(request.teacher_id), true).await?;
    if !is_generatable_slot(
        &windows,
        request.teacher_id,
        request.scheduled_at,
        policy,
        now,
    ) {
        return Err(ServiceError::policy(format!(
            "{} is not a bookable slot for teacher {}",
            request.scheduled_at, request.teacher_id
        )));
    }

    let outcome = repo
        .reserve_slot(
            NewBooking {
                student_id,
                teacher_id: request.teacher_id,
                topic_id: request.topic_id,
                scheduled_at: request.scheduled_at,
            },
            ReservationRules {
                capacity: policy.slot_capacity,
                now,
            },
        )
        .await?;

    let (mut booking, package) = match outcome {
        ReservationOutcome::Reserved { booking, package } => (booking, package),
        ReservationOutcome::SlotFull { booked } => {
            return Err(ServiceError::policy(format!(
                "slot is full ({} of {} places taken)",
                booked, policy.slot_capacity
            )))
        }
        ReservationOutcome::NoActivePackage => {
            return Err(ServiceError::policy(format!(
                "student {} has no active package",
                student_id
            )))
        }
        ReservationOutcome::NoCredit { package } => {
            return Err(ServiceError::policy(format!(
                "package {} has no remaining lessons",
                package.id
            )))
        }
        ReservationOutcome::AlreadyBooked { existing } => {
            return Err(ServiceError::policy(format!(
                "already booked (booking {})",
                existing
            )))
        }
    };

    info!(
        booking_id = %booking.id,
        student_id = %student_id,
        teacher_id = %booking.teacher_id,
        scheduled_at = %booking.scheduled_at,
        remaining_lessons = package.remaining_lessons,
        "booking created"
    );

    let mut warnings = Vec::new();
    let mut join_link = None;
    if calendar.is_enabled() {
        match calendar
            .create_event(&event_details(&booking, lesson_minutes))
            .await
        {
            Ok(event) => {
                join_link = event.join_link;
                match repo
                    .set_external_event_ref(booking.id, Some(event.event_id.clone()))
                    .await
                {
                    Ok(updated) => booking = updated,
                    Err(e) => {
                        warn!(booking_id = %booking.id, error = %e, "could not store calendar event ref");
                        warnings.push(ServiceWarning::external(format!(
                            "calendar event {} created but not linked: {}",
                            event.event_id, e
                        )));
                    }
                }
            }
            Err(e) => {
                warn!(booking_id = %booking.id, error = %e, "calendar event creation failed");
                warnings.push(ServiceWarning::external(format!(
                    "calendar event was not created: {}",
                    e
                )));
            }
        }
    }

    Ok(BookingReceipt {
        booking,
        package,
        join_link,
        warnings,
    })
}

pub async fn get_booking<R: FullRepository + ?Sized>(
    repo: &R,
    actor: &Actor,
    id: BookingId,
) -> ServiceResult<Booking> {
    let booking = repo.get_booking(id).await?;
    ensure_booking_access(actor, &booking)?;
    Ok(booking)
}

/// Students see their own bookings, teachers their own classes; admins
/// may filter freely.
pub async fn list_bookings<R: FullRepository + ?Sized>(
    repo: &R,
    actor: &Actor,
    filter: BookingFilter,
) -> ServiceResult<Vec<Booking>> {
    let filter = match actor.role {
        Role::Student => BookingFilter {
            student_id: Some(actor.user_id),
            ..filter
        },
        Role::Teacher => BookingFilter {
            teacher_id: Some(actor.user_id),
            ..filter
        },
        Role::Admin => filter,
    };
    Ok(repo.list_bookings(&filter).await?)
}

/// SCHEDULED → COMPLETED, then refresh the student's statistics.
pub async fn complete_booking<R: FullRepository + ?Sized>(
    repo: &R,
    actor: &Actor,
    id: BookingId,
    now: DateTime<Utc>,
) -> ServiceResult<Booking> {
    let booking = repo.get_booking(id).await?;
    ensure_teaches(actor, &booking)?;

    match repo.complete_booking(id).await? {
        TransitionOutcome::Applied(booking) => {
            info!(booking_id = %booking.id, "booking completed");
            refresh_student_stats(repo, booking.student_id, now).await?;
            Ok(booking)
        }
        TransitionOutcome::Rejected(current) => Err(current
            .status
            .transition(BookingStatus::Completed)
            .err()
            .map(ServiceError::from)
            .unwrap_or_else(|| {
                ServiceError::InvalidTransition(format!(
                    "booking {} could not be completed",
                    current.id
                ))
            })),
    }
}

/// Admin override: remove the booking outright. Credits are not touched.
pub async fn delete_booking<R: FullRepository + ?Sized>(
    repo: &R,
    calendar: &dyn CalendarService,
    actor: &Actor,
    id: BookingId,
    now: DateTime<Utc>,
) -> ServiceResult<Vec<ServiceWarning>> {
    require_admin(actor, "delete bookings")?;
    let booking = repo.get_booking(id).await?;
    repo.delete_booking(id).await?;
    warn!(booking_id = %id, admin = %actor.user_id, "booking deleted by admin");

    if booking.status == BookingStatus::Completed {
        refresh_student_stats(repo, booking.student_id, now).await?;
    }

    let mut warnings = Vec::new();
    release_calendar_event(calendar, &booking, &mut warnings).await;
    Ok(warnings)
}
