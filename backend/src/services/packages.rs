//! Lesson packages: creation, lookup and admin corrections.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::access::require_admin;
use super::error::{ServiceError, ServiceResult};
use crate::db::repository::FullRepository;
use crate::models::{Actor, NewPackage, Package, PackageId, PackageOverride, UserId};

fn ensure_owner_or_admin(actor: &Actor, user_id: UserId) -> ServiceResult<()> {
    if actor.is_admin() || actor.user_id == user_id {
        Ok(())
    } else {
        Err(ServiceError::forbidden(format!(
            "packages of user {} are not visible to user {}",
            user_id, actor.user_id
        )))
    }
}

pub async fn create_package<R: FullRepository + ?Sized>(
    repo: &R,
    actor: &Actor,
    package: NewPackage,
    now: DateTime<Utc>,
) -> ServiceResult<Package> {
    require_admin(actor, "create packages")?;
    if package.total_lessons <= 0 {
        return Err(ServiceError::invalid_input("totalLessons must be positive"));
    }
    if package.valid_until < package.valid_from {
        return Err(ServiceError::invalid_input(
            "validUntil must not be before validFrom",
        ));
    }
    let stored = repo.insert_package(package, now).await?;
    info!(package_id = %stored.id, user_id = %stored.user_id, total = stored.total_lessons, "package created");
    Ok(stored)
}

/// Newest first.
pub async fn list_packages<R: FullRepository + ?Sized>(
    repo: &R,
    actor: &Actor,
    user_id: UserId,
) -> ServiceResult<Vec<Package>> {
    ensure_owner_or_admin(actor, user_id)?;
    Ok(repo.list_packages(user_id).await?)
}

pub async fn active_package<R: FullRepository + ?Sized>(
    repo: &R,
    actor: &Actor,
    user_id: UserId,
    now: DateTime<Utc>,
) -> ServiceResult<Option<Package>> {
    ensure_owner_or_admin(actor, user_id)?;
    Ok(repo.active_package(user_id, now).await?)
}

/// Set counters verbatim. The only path allowed to leave a package unbalanced.
pub async fn override_package<R: FullRepository + ?Sized>(
    repo: &R,
    actor: &Actor,
    id: PackageId,
    changes: PackageOverride,
) -> ServiceResult<Package> {
    require_admin(actor, "override packages")?;
    let package = repo.override_package(id, changes).await?;
    if !package.is_balanced() {
        warn!(
            package_id = %package.id,
            total = package.total_lessons,
            used = package.used_lessons,
            remaining = package.remaining_lessons,
            "package left unbalanced by admin override"
        );
    }
    Ok(package)
}
