//! Booking repository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::RepositoryResult;
use crate::models::{Booking, BookingFilter, BookingId, NewBooking, Package, SlotOccupancy, UserId};

/// Limits checked inside the reservation transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationRules {
    /// Maximum live bookings per (teacher, instant).
    pub capacity: u32,
    /// Reference time for picking the active package and stamping `created_at`.
    pub now: DateTime<Utc>,
}

/// Result of [`BookingRepository::reserve_slot`]. Only `Reserved` wrote anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// Booking inserted and one credit taken from `package`.
    Reserved { booking: Booking, package: Package },
    /// The slot already holds `booked` live bookings.
    SlotFull { booked: u32 },
    /// The student has no package valid at `now`.
    NoActivePackage,
    /// The active package has no remaining lessons.
    NoCredit { package: Package },
    /// The student already holds a live booking at this slot.
    AlreadyBooked { existing: BookingId },
}

/// Result of [`BookingRepository::cancel_booking`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancellationOutcome {
    /// Status moved to CANCELLED. `refunded` is the package credited when a
    /// refund was requested.
    Cancelled {
        booking: Booking,
        refunded: Option<Package>,
    },
    /// Nothing changed because the booking was no longer SCHEDULED.
    NotScheduled { booking: Booking },
    /// Nothing changed: a refund was due but the student has no package
    /// valid at `now` to receive it.
    NoActivePackage { booking: Booking },
}

/// Result of a plain status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(Booking),
    /// Nothing changed; the booking is returned with its current status.
    Rejected(Booking),
}

/// Booking storage.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Check if the backend is reachable.
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// # Errors
    /// `NotFound` when no booking has this id.
    async fn get_booking(&self, id: BookingId) -> RepositoryResult<Booking>;

    /// Bookings matching `filter`, ordered by `scheduled_at`.
    async fn list_bookings(&self, filter: &BookingFilter) -> RepositoryResult<Vec<Booking>>;

    /// Live (SCHEDULED or COMPLETED) booking counts grouped by
    /// (teacher, instant) for `from <= scheduled_at < until`.
    async fn fetch_slot_occupancy(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        teacher_id: Option<UserId>,
    ) -> RepositoryResult<Vec<SlotOccupancy>>;

    /// Atomically re-check capacity, pick the student's active package,
    /// check its credit, insert the booking and debit the package.
    async fn reserve_slot(
        &self,
        booking: NewBooking,
        rules: ReservationRules,
    ) -> RepositoryResult<ReservationOutcome>;

    /// Atomically move a SCHEDULED booking to CANCELLED and, when `refund`
    /// is set, give one credit back to the student's active package.
    ///
    /// The status is re-read under lock: a second concurrent cancellation
    /// sees `NotScheduled` and refunds nothing. When the refund has nowhere
    /// to go the booking stays SCHEDULED (`NoActivePackage`).
    async fn cancel_booking(
        &self,
        id: BookingId,
        now: DateTime<Utc>,
        refund: bool,
    ) -> RepositoryResult<CancellationOutcome>;

    /// SCHEDULED → COMPLETED.
    async fn complete_booking(&self, id: BookingId) -> RepositoryResult<TransitionOutcome>;

    /// Set `attended_at` to `at` unless already set. Returns the stored booking.
    async fn mark_attended(&self, id: BookingId, at: DateTime<Utc>) -> RepositoryResult<Booking>;

    async fn set_external_event_ref(
        &self,
        id: BookingId,
        event_ref: Option<String>,
    ) -> RepositoryResult<Booking>;

    /// Hard delete (admin override). Attendance rows of the booking go with it.
    async fn delete_booking(&self, id: BookingId) -> RepositoryResult<()>;
}
