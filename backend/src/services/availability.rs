//! Teacher availability windows.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::access::resolve_teacher;
use super::error::{ServiceError, ServiceResult};
use crate::db::repository::{AvailabilityWrite, FullRepository};
use crate::models::{
    Actor, Availability, AvailabilityChanges, AvailabilityId, ClockTime, DayOfWeek,
    NewAvailability, Role, UserId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    /// Required for admins; teachers always edit their own.
    #[serde(default)]
    pub teacher_id: Option<UserId>,
    /// 0=Sunday .. 6=Saturday.
    pub day_of_week: u8,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
}

fn check_window(start: ClockTime, end: ClockTime) -> ServiceResult<()> {
    if end <= start {
        return Err(ServiceError::invalid_input(format!(
            "endTime {} must be after startTime {}",
            end, start
        )));
    }
    Ok(())
}

fn saved(write: AvailabilityWrite) -> ServiceResult<Availability> {
    match write {
        AvailabilityWrite::Saved(window) => Ok(window),
        AvailabilityWrite::Overlaps { existing } => Err(ServiceError::policy(format!(
            "window overlaps availability {} ({} {}-{})",
            existing.id,
            existing.day_of_week.name(),
            existing.start_time,
            existing.end_time
        ))),
    }
}

pub async fn create_availability<R: FullRepository + ?Sized>(
    repo: &R,
    actor: &Actor,
    request: AvailabilityRequest,
) -> ServiceResult<Availability> {
    let teacher_id = resolve_teacher(actor, request.teacher_id)?;
    let day_of_week = DayOfWeek::new(request.day_of_week).ok_or_else(|| {
        ServiceError::invalid_input(format!(
            "dayOfWeek must be 0..=6, got {}",
            request.day_of_week
        ))
    })?;
    check_window(request.start_time, request.end_time)?;

    let window = saved(
        repo.insert_availability(NewAvailability {
            teacher_id,
            day_of_week,
            start_time: request.start_time,
            end_time: request.end_time,
        })
        .await?,
    )?;
    info!(availability_id = %window.id, teacher_id = %teacher_id, "availability created");
    Ok(window)
}

/// Edit times or the active flag. Re-activating a window re-checks overlap.
pub async fn update_availability<R: FullRepository + ?Sized>(
    repo: &R,
    actor: &Actor,
    id: AvailabilityId,
    changes: AvailabilityChanges,
) -> ServiceResult<Availability> {
    let current = repo.get_availability(id).await?;
    match actor.role {
        Role::Admin => {}
        Role::Teacher if current.teacher_id == actor.user_id => {}
        _ => {
            return Err(ServiceError::forbidden(format!(
                "availability {} belongs to another teacher",
                id
            )))
        }
    }
    let updated = changes.apply(&current);
    check_window(updated.start_time, updated.end_time)?;

    saved(repo.update_availability(id, changes).await?)
}

/// Soft-disable a window. Windows are never hard-deleted.
pub async fn deactivate_availability<R: FullRepository + ?Sized>(
    repo: &R,
    actor: &Actor,
    id: AvailabilityId,
) -> ServiceResult<Availability> {
    update_availability(
        repo,
        actor,
        id,
        AvailabilityChanges {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await
}

pub async fn list_availability<R: FullRepository + ?Sized>(
    repo: &R,
    teacher_id: Option<UserId>,
    include_inactive: bool,
) -> ServiceResult<Vec<Availability>> {
    Ok(repo.list_availability(teacher_id, !include_inactive).await?)
}
