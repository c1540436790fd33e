//! Service layer: booking rules on top of the repository traits.
//!
//! Every operation is a free async function taking the repository, the
//! acting user and an explicit `now`, so the same code runs against the
//! in-memory and Postgres backends and tests control the clock.

pub mod access;
pub mod attendance;
pub mod availability;
pub mod booking;
pub mod calendar;
pub mod cancellation;
pub mod error;
pub mod packages;
pub mod policy;
pub mod slots;
pub mod users;

pub use attendance::{AttendanceReceipt, AttendanceRequest};
pub use availability::AvailabilityRequest;
pub use booking::{BookingReceipt, BookingRequest};
pub use calendar::{
    CalendarError, CalendarEvent, CalendarService, CalendarSettings, DisabledCalendar,
    EventDetails, WebhookCalendar,
};
pub use cancellation::{CancellationDecision, CancellationReceipt};
pub use error::{ServiceError, ServiceResult, ServiceWarning};
pub use policy::BookingPolicy;
pub use slots::{Slot, SlotQuery};

use crate::db::repository::{FullRepository, RepositoryResult};

/// Pass-through to the repository's health check.
pub async fn health_check<R: FullRepository + ?Sized>(repo: &R) -> RepositoryResult<bool> {
    repo.health_check().await
}
