//! Common configuration types for the live room components.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Observability configuration shared by every service binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub log_filter: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl ObservabilityConfig {
    /// Read `<prefix>_LOG_FILTER` and `<prefix>_LOG_JSON` from the given
    /// variables, falling back to `default_filter` and plain-text logs.
    #[must_use]
    pub fn from_vars(vars: &HashMap<String, String>, prefix: &str, default_filter: &str) -> Self {
        let log_filter = vars
            .get(&format!("{prefix}_LOG_FILTER"))
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| default_filter.to_string());

        let json_logs = vars
            .get(&format!("{prefix}_LOG_JSON"))
            .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"));

        Self {
            log_filter,
            json_logs,
        }
    }
}
