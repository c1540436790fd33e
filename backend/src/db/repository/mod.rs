//! Repository traits for the booking store.
//!
//! Each trait covers one table family. Operations that must be atomic
//! (reserving a slot, cancelling with a refund) are single trait methods so
//! every backend runs them inside one transaction and reports the outcome
//! as data rather than as a half-applied write.

pub mod attendance;
pub mod availability;
pub mod booking;
pub mod error;
pub mod package;
pub mod user;

pub use attendance::AttendanceRepository;
pub use availability::{AvailabilityRepository, AvailabilityWrite};
pub use booking::{
    BookingRepository, CancellationOutcome, ReservationOutcome, ReservationRules,
    TransitionOutcome,
};
pub use error::{ErrorContext, RepositoryError, RepositoryResult};
pub use package::PackageRepository;
pub use user::UserRepository;

/// Everything the services need from a storage backend.
pub trait FullRepository:
    AvailabilityRepository
    + BookingRepository
    + PackageRepository
    + AttendanceRepository
    + UserRepository
    + Send
    + Sync
{
}

impl<T> FullRepository for T where
    T: AvailabilityRepository
        + BookingRepository
        + PackageRepository
        + AttendanceRepository
        + UserRepository
        + Send
        + Sync
{
}
