use serde::{Deserialize, Serialize};

use super::UserId;

/// Role resolved by the authentication service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Teacher => "TEACHER",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "STUDENT" => Ok(Role::Student),
            "TEACHER" => Ok(Role::Teacher),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directory entry used to label slots and bookings with display names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub role: Role,
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn student(id: i64) -> Self {
        Self::new(UserId(id), Role::Student)
    }

    pub fn teacher(id: i64) -> Self {
        Self::new(UserId(id), Role::Teacher)
    }

    pub fn admin(id: i64) -> Self {
        Self::new(UserId(id), Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_str_is_case_insensitive() {
        assert_eq!("student".parse::<Role>().unwrap(), Role::Student);
        assert_eq!(" Teacher ".parse::<Role>().unwrap(), Role::Teacher);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("guest".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Role::Teacher).unwrap(), "\"TEACHER\"");
    }
}
