//! Common data types for the live room components.
//!
//! The identity collaborator is trusted: it supplies an `(identity, role)`
//! pair for every caller and nothing here verifies credentials. The types
//! below only make sure the pair is well-formed before it reaches a room.

use crate::error::{CommonError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity used for events the coordinator raises on its own behalf
/// (transport reconciliation, liveness timeouts).
pub const SYSTEM_IDENTITY: &str = "system";

/// Maximum accepted identity length in bytes.
pub const MAX_IDENTITY_LENGTH: usize = 128;

/// Role of a participant inside a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Owns the session and may run control actions.
    Instructor,
    /// Regular attendee.
    Student,
}

impl Role {
    /// Returns the role as a string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Instructor => "instructor",
            Role::Student => "student",
        }
    }

    #[must_use]
    pub const fn is_instructor(&self) -> bool {
        matches!(self, Role::Instructor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "instructor" => Ok(Role::Instructor),
            "student" => Ok(Role::Student),
            other => Err(CommonError::InvalidRole(other.to_string())),
        }
    }
}

/// The current caller, as reported by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Caller {
    /// Stable identity of the caller.
    pub identity: String,
    /// Role claimed for the caller.
    pub role: Role,
}

impl Caller {
    /// Build a caller, validating the identity.
    ///
    /// # Errors
    ///
    /// Returns `CommonError::InvalidIdentity` if the identity is empty, longer
    /// than [`MAX_IDENTITY_LENGTH`], or equal to [`SYSTEM_IDENTITY`].
    pub fn new(identity: impl Into<String>, role: Role) -> Result<Self> {
        let identity = identity.into();
        let trimmed = identity.trim();

        if trimmed.is_empty() {
            return Err(CommonError::InvalidIdentity("identity is empty".to_string()));
        }
        if trimmed.len() > MAX_IDENTITY_LENGTH {
            return Err(CommonError::InvalidIdentity(format!(
                "identity exceeds {MAX_IDENTITY_LENGTH} bytes"
            )));
        }
        if trimmed == SYSTEM_IDENTITY {
            return Err(CommonError::InvalidIdentity(
                "identity is reserved".to_string(),
            ));
        }

        Ok(Self {
            identity: trimmed.to_string(),
            role,
        })
    }

    /// Parse a caller from raw identity and role strings (e.g. request headers).
    ///
    /// # Errors
    ///
    /// Returns an error if either value is invalid.
    pub fn parse(identity: &str, role: &str) -> Result<Self> {
        let role = role.parse::<Role>()?;
        Self::new(identity, role)
    }

    /// Convenience constructor for an instructor.
    ///
    /// # Errors
    ///
    /// See [`Caller::new`].
    pub fn instructor(identity: impl Into<String>) -> Result<Self> {
        Self::new(identity, Role::Instructor)
    }

    /// Convenience constructor for a student.
    ///
    /// # Errors
    ///
    /// See [`Caller::new`].
    pub fn student(identity: impl Into<String>) -> Result<Self> {
        Self::new(identity, Role::Student)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("instructor".parse::<Role>().unwrap(), Role::Instructor);
        assert_eq!(" Student ".parse::<Role>().unwrap(), Role::Student);
        assert!(matches!(
            "admin".parse::<Role>(),
            Err(CommonError::InvalidRole(r)) if r == "admin"
        ));
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Instructor).unwrap();
        assert_eq!(json, "\"instructor\"");
        let role: Role = serde_json::from_str("\"student\"").unwrap();
        assert_eq!(role, Role::Student);
    }

    #[test]
    fn test_caller_trims_identity() {
        let caller = Caller::student("  alice ").unwrap();
        assert_eq!(caller.identity, "alice");
        assert_eq!(caller.role, Role::Student);
    }

    #[test]
    fn test_caller_rejects_reserved_and_empty() {
        assert!(Caller::instructor("system").is_err());
        assert!(Caller::student("   ").is_err());
        assert!(Caller::student("x".repeat(MAX_IDENTITY_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_caller_parse() {
        let caller = Caller::parse("bob", "instructor").unwrap();
        assert!(caller.role.is_instructor());
        assert!(Caller::parse("bob", "admin").is_err());
    }
}
