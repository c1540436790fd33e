//! Storage for bookings, packages, availability and attendance.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  HTTP handlers (http/)                                  │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Services (services/) - booking rules, access checks    │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository traits (repository/)                        │
//! └───────────┬───────────────────────────────┬─────────────┘
//!             │                               │
//!   ┌─────────▼──────────┐         ┌──────────▼───────────┐
//!   │ PostgresRepository │         │   LocalRepository    │
//!   │ (Diesel + r2d2)    │         │   (in-memory)        │
//!   └────────────────────┘         └──────────────────────┘
//! ```
//!
//! Repositories are built by [`RepositoryFactory`] and handed to the
//! services as `Arc<dyn FullRepository>`; nothing here is global.

#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod repositories;
pub mod repository;

#[cfg(feature = "postgres-repo")]
pub use repositories::postgres::{PoolStats, PostgresConfig};
/// Placeholder so factory signatures stay the same without `postgres-repo`.
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    _private: (),
}

pub use factory::{RepositoryBuilder, RepositoryFactory, RepositoryType};
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    AttendanceRepository, AvailabilityRepository, BookingRepository, ErrorContext,
    FullRepository, PackageRepository, RepositoryError, RepositoryResult, UserRepository,
};
