//! Common error types for the live room components.

use thiserror::Error;

/// Errors raised while parsing the identity facts handed over by the
/// identity collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Role string is not one of the known roles
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// Identity is empty, too long, or reserved
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),
}

/// Result type alias using `CommonError`
pub type Result<T> = std::result::Result<T, CommonError>;
