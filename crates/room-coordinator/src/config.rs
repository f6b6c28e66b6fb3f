//! Room Coordinator configuration.
//!
//! Configuration is loaded from environment variables. Every variable has a
//! default; malformed or zero-valued entries are rejected at startup rather
//! than silently replaced.

use common::config::ObservabilityConfig;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "RC";

/// Default HTTP API / WebSocket bind address.
pub const DEFAULT_HTTP_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default health and metrics endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default log filter when `RUST_LOG` and `RC_LOG_FILTER` are unset.
pub const DEFAULT_LOG_FILTER: &str = "room_coordinator=debug,tower_http=debug";

/// Default maximum number of live rooms.
pub const DEFAULT_MAX_ROOMS: usize = 1000;

/// Default maximum participants per room.
pub const DEFAULT_MAX_PARTICIPANTS_PER_ROOM: usize = 500;

/// Default liveness timeout before a silent participant is removed.
pub const DEFAULT_LAST_SEEN_TIMEOUT_SECONDS: u64 = 30;

/// Default time an open room may stay without connected participants.
pub const DEFAULT_EMPTY_ROOM_GRACE_SECONDS: u64 = 60;

/// Default time an ending room waits for its roster to drain.
pub const DEFAULT_ENDING_GRACE_SECONDS: u64 = 60;

/// Default time a closed room keeps its roster for late reports.
pub const DEFAULT_CLOSED_RETENTION_SECONDS: u64 = 30;

/// Default room housekeeping tick.
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 5;

/// Default reaction display TTL.
pub const DEFAULT_REACTION_TTL_MS: u64 = 4000;

/// Default coordinator instance ID prefix.
pub const DEFAULT_INSTANCE_ID_PREFIX: &str = "rc";

/// Per-room behavior knobs, copied into every `RoomActor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    /// Maximum roster size.
    pub max_participants: usize,
    /// Silence after which a participant is removed with reason `timeout`.
    pub last_seen_timeout: Duration,
    /// Time an open room may have no connected participant before closing.
    pub empty_room_grace: Duration,
    /// Time an ending room waits for its roster to drain before closing.
    pub ending_grace: Duration,
    /// Time a closed room keeps its roster before purging.
    pub closed_retention: Duration,
    /// Housekeeping tick for sweeps and lifecycle deadlines.
    pub sweep_interval: Duration,
    /// TTL attached to reaction broadcasts, in milliseconds.
    pub reaction_ttl_ms: u64,
    /// Whether students may publish on join.
    pub students_can_publish: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            max_participants: DEFAULT_MAX_PARTICIPANTS_PER_ROOM,
            last_seen_timeout: Duration::from_secs(DEFAULT_LAST_SEEN_TIMEOUT_SECONDS),
            empty_room_grace: Duration::from_secs(DEFAULT_EMPTY_ROOM_GRACE_SECONDS),
            ending_grace: Duration::from_secs(DEFAULT_ENDING_GRACE_SECONDS),
            closed_retention: Duration::from_secs(DEFAULT_CLOSED_RETENTION_SECONDS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECONDS),
            reaction_ttl_ms: DEFAULT_REACTION_TTL_MS,
            students_can_publish: false,
        }
    }
}

/// Room Coordinator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API and WebSocket bind address (default: "0.0.0.0:8080").
    pub http_bind_address: String,

    /// Health and metrics bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,

    /// Unique identifier for this coordinator instance.
    pub instance_id: String,

    /// Maximum concurrent live rooms.
    pub max_rooms: usize,

    /// Settings handed to every room.
    pub room: RoomSettings,

    /// Logging setup.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let http_bind_address = vars
            .get("RC_HTTP_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HTTP_BIND_ADDRESS.to_string());

        let health_bind_address = vars
            .get("RC_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let max_rooms = parse_positive(vars, "RC_MAX_ROOMS", DEFAULT_MAX_ROOMS)?;

        let room = RoomSettings {
            max_participants: parse_positive(
                vars,
                "RC_MAX_PARTICIPANTS_PER_ROOM",
                DEFAULT_MAX_PARTICIPANTS_PER_ROOM,
            )?,
            last_seen_timeout: Duration::from_secs(parse_positive(
                vars,
                "RC_LAST_SEEN_TIMEOUT_SECONDS",
                DEFAULT_LAST_SEEN_TIMEOUT_SECONDS,
            )?),
            empty_room_grace: Duration::from_secs(parse_positive(
                vars,
                "RC_EMPTY_ROOM_GRACE_SECONDS",
                DEFAULT_EMPTY_ROOM_GRACE_SECONDS,
            )?),
            ending_grace: Duration::from_secs(parse_positive(
                vars,
                "RC_ENDING_GRACE_SECONDS",
                DEFAULT_ENDING_GRACE_SECONDS,
            )?),
            closed_retention: Duration::from_secs(parse_positive(
                vars,
                "RC_CLOSED_RETENTION_SECONDS",
                DEFAULT_CLOSED_RETENTION_SECONDS,
            )?),
            sweep_interval: Duration::from_secs(parse_positive(
                vars,
                "RC_SWEEP_INTERVAL_SECONDS",
                DEFAULT_SWEEP_INTERVAL_SECONDS,
            )?),
            reaction_ttl_ms: parse_positive(vars, "RC_REACTION_TTL_MS", DEFAULT_REACTION_TTL_MS)?,
            students_can_publish: parse_bool(vars, "RC_STUDENTS_CAN_PUBLISH", false)?,
        };

        let instance_id = vars.get("RC_INSTANCE_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_INSTANCE_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        let observability = ObservabilityConfig::from_vars(vars, ENV_PREFIX, DEFAULT_LOG_FILTER);

        Ok(Config {
            http_bind_address,
            health_bind_address,
            instance_id,
            max_rooms,
            room,
            observability,
        })
    }
}

fn parse_positive<T>(vars: &HashMap<String, String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
{
    let Some(raw) = vars.get(key) else {
        return Ok(default);
    };

    let value: T = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{key}={raw} is not a number")))?;

    if value == T::default() {
        return Err(ConfigError::InvalidValue(format!("{key} must be greater than zero")));
    }

    Ok(value)
}

fn parse_bool(vars: &HashMap<String, String>, key: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = vars.get(key) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue(format!("{key}={raw} is not a boolean"))),
    }
}
