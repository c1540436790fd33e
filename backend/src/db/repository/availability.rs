//! Availability repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{Availability, AvailabilityChanges, AvailabilityId, NewAvailability, UserId};

/// Result of writing an availability window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityWrite {
    /// The window was stored.
    Saved(Availability),
    /// Nothing was written: the window would overlap an active one.
    Overlaps { existing: Availability },
}

/// Recurring teacher availability.
///
/// Overlap checks run in the same transaction as the write, so two
/// concurrent inserts cannot both succeed with overlapping windows.
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    /// Insert an active window unless it overlaps an active window of the
    /// same teacher and day.
    async fn insert_availability(
        &self,
        availability: NewAvailability,
    ) -> RepositoryResult<AvailabilityWrite>;

    /// Apply changes to a window. The overlap check runs when the result is
    /// active (including re-activation).
    ///
    /// # Errors
    /// `NotFound` when the window does not exist.
    async fn update_availability(
        &self,
        id: AvailabilityId,
        changes: AvailabilityChanges,
    ) -> RepositoryResult<AvailabilityWrite>;

    async fn get_availability(&self, id: AvailabilityId) -> RepositoryResult<Availability>;

    /// Windows ordered by teacher, day and start time.
    ///
    /// # Arguments
    /// * `teacher_id` - Restrict to one teacher
    /// * `active_only` - Skip soft-disabled windows
    async fn list_availability(
        &self,
        teacher_id: Option<UserId>,
        active_only: bool,
    ) -> RepositoryResult<Vec<Availability>>;
}
