//! Lesson package repository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::RepositoryResult;
use crate::models::{NewPackage, Package, PackageId, PackageOverride, UserId};

/// Lesson-credit packages.
///
/// Credit moves of the booking flow go through
/// [`BookingRepository`](super::BookingRepository); this trait only covers
/// creation, lookup and administrative correction.
#[async_trait]
pub trait PackageRepository: Send + Sync {
    async fn insert_package(
        &self,
        package: NewPackage,
        created_at: DateTime<Utc>,
    ) -> RepositoryResult<Package>;

    async fn get_package(&self, id: PackageId) -> RepositoryResult<Package>;

    /// Packages of a user, most recently created first.
    async fn list_packages(&self, user_id: UserId) -> RepositoryResult<Vec<Package>>;

    /// The most recently created package with `valid_until >= now`.
    async fn active_package(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<Package>>;

    /// Write the override verbatim; no balance check.
    async fn override_package(
        &self,
        id: PackageId,
        changes: PackageOverride,
    ) -> RepositoryResult<Package>;
}
