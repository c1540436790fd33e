//! User directory repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{Role, User, UserId};

/// Read model of users maintained from the authentication service.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn upsert_user(&self, user: User) -> RepositoryResult<User>;

    async fn get_user(&self, id: UserId) -> RepositoryResult<Option<User>>;

    /// Users among `ids`; unknown ids are skipped.
    async fn find_users(&self, ids: &[UserId]) -> RepositoryResult<Vec<User>>;

    async fn list_users_by_role(&self, role: Role) -> RepositoryResult<Vec<User>>;
}
