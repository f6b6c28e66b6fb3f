//! HTTP middleware for the room API.
//!
//! - `caller` - caller identification from the identity collaborator's headers
//! - `http_metrics` - HTTP request metrics

pub mod caller;
pub mod http_metrics;

pub use caller::{caller_from_headers, require_caller, IDENTITY_HEADER, ROLE_HEADER};
pub use http_metrics::http_metrics_middleware;
