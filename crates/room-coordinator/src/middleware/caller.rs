//! Caller identification for the room API.
//!
//! The identity collaborator in front of the coordinator forwards the
//! authenticated caller as two headers:
//!
//! ```text
//! x-identity: <stable identity>
//! x-role: instructor | student
//! ```
//!
//! The middleware turns them into a [`Caller`] stored in request extensions.

use crate::errors::RcError;
use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};
use common::types::Caller;
use tracing::instrument;

pub const IDENTITY_HEADER: &str = "x-identity";
pub const ROLE_HEADER: &str = "x-role";

/// Reject requests without a well-formed caller (401), otherwise insert the
/// [`Caller`] for downstream handlers.
#[instrument(skip_all, name = "rc.middleware.caller")]
pub async fn require_caller(mut req: Request, next: Next) -> Result<Response, RcError> {
    let caller = caller_from_headers(req.headers())?;

    tracing::debug!(
        target: "rc.middleware.caller",
        identity = %caller.identity,
        role = caller.role.as_str(),
        "Caller identified"
    );

    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

/// Read the caller headers.
///
/// # Errors
///
/// `InvalidCaller` if a header is missing, not UTF-8, or holds an invalid
/// identity or role.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, RcError> {
    let identity = header(headers, IDENTITY_HEADER)?;
    let role = header(headers, ROLE_HEADER)?;
    Caller::parse(identity, role).map_err(RcError::from)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, RcError> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "rc.middleware.caller", header = name, "Missing caller header");
            RcError::InvalidCaller(format!("Missing {name} header"))
        })
}
