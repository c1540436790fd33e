//! Read model of users, fed by the identity service.

use super::access::require_admin;
use super::error::ServiceResult;
use crate::db::repository::FullRepository;
use crate::models::{Actor, Role, User};

pub async fn upsert_user<R: FullRepository + ?Sized>(
    repo: &R,
    actor: &Actor,
    user: User,
) -> ServiceResult<User> {
    require_admin(actor, "manage users")?;
    Ok(repo.upsert_user(user).await?)
}

pub async fn list_teachers<R: FullRepository + ?Sized>(repo: &R) -> ServiceResult<Vec<User>> {
    Ok(repo.list_users_by_role(Role::Teacher).await?)
}
