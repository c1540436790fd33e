//! Caller identity from gateway headers.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::error::AppError;
use crate::models::{Actor, Role, UserId};
use crate::services::ServiceError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";

/// The authenticated caller. Rejects with 401 when either header is
/// missing or malformed.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Actor);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ServiceError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| ServiceError::Unauthorized(format!("missing {} header", name)))?
        .to_str()
        .map_err(|_| ServiceError::Unauthorized(format!("{} header is not valid text", name)))
}

pub fn actor_from_parts(parts: &Parts) -> Result<Actor, ServiceError> {
    let user_id: UserId = header(parts, USER_ID_HEADER)?
        .trim()
        .parse()
        .map_err(|_| ServiceError::Unauthorized(format!("{} must be an integer", USER_ID_HEADER)))?;
    let role: Role = header(parts, ROLE_HEADER)?
        .parse()
        .map_err(ServiceError::Unauthorized)?;
    Ok(Actor::new(user_id, role))
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(AuthUser(actor_from_parts(parts)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/v1/bookings");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_reads_both_headers() {
        let actor =
            actor_from_parts(&parts(&[(USER_ID_HEADER, "42"), (ROLE_HEADER, "teacher")])).unwrap();
        assert_eq!(actor, Actor::teacher(42));
    }

    #[test]
    fn test_missing_role_is_unauthorized() {
        let err = actor_from_parts(&parts(&[(USER_ID_HEADER, "42")])).unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_non_numeric_id_is_unauthorized() {
        let err =
            actor_from_parts(&parts(&[(USER_ID_HEADER, "abc"), (ROLE_HEADER, "ADMIN")])).unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_unknown_role_is_unauthorized() {
        let err =
            actor_from_parts(&parts(&[(USER_ID_HEADER, "1"), (ROLE_HEADER, "guest")])).unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }
}
