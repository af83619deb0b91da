// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the filaq server.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level filaq configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilaqConfig {
    /// Process-level settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Queue coordination parameters.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Queue coordination parameters.
///
/// These drive the sequencer cap, the service-day boundary, the ETA
/// heuristic, and the grace-period admission control.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum ticket number assignable per (shop, service day).
    #[serde(default = "default_daily_cap")]
    pub daily_cap: u32,

    /// Hour of day (0-23) at which a new service day starts.
    #[serde(default = "default_shift_start_hour")]
    pub shift_start_hour: u8,

    /// Fixed ETA heuristic: minutes per customer ahead.
    #[serde(default = "default_per_customer_minutes")]
    pub per_customer_minutes: u32,

    /// Length of the grace hold window for a near-turn, unarrived customer.
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: u32,

    /// 1-based waiting rank at which the grace timer is armed.
    #[serde(default = "default_grace_trigger_position")]
    pub grace_trigger_position: u32,

    /// Interval of the background grace/expiry sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Maximum entries shown on the public (kiosk) board.
    #[serde(default = "default_public_list_limit")]
    pub public_list_limit: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            daily_cap: default_daily_cap(),
            shift_start_hour: default_shift_start_hour(),
            per_customer_minutes: default_per_customer_minutes(),
            grace_minutes: default_grace_minutes(),
            grace_trigger_position: default_grace_trigger_position(),
            sweep_interval_secs: default_sweep_interval_secs(),
            public_list_limit: default_public_list_limit(),
        }
    }
}

fn default_daily_cap() -> u32 {
    1000
}

fn default_shift_start_hour() -> u8 {
    5
}

fn default_per_customer_minutes() -> u32 {
    15
}

fn default_grace_minutes() -> u32 {
    10
}

fn default_grace_trigger_position() -> u32 {
    2
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_public_list_limit() -> u32 {
    12
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("filaq").join("filaq.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("filaq.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token gating privileged (staff) routes. `None` disables
    /// privileged routes entirely (fail-closed).
    #[serde(default)]
    pub admin_token: Option<String>,

    /// CORS allow-list. Empty means permissive.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            admin_token: None,
            allowed_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let config = FilaqConfig::default();
        assert_eq!(config.queue.daily_cap, 1000);
        assert_eq!(config.queue.shift_start_hour, 5);
        assert_eq!(config.queue.per_customer_minutes, 15);
        assert_eq!(config.queue.grace_minutes, 10);
        assert_eq!(config.queue.grace_trigger_position, 2);
        assert_eq!(config.queue.public_list_limit, 12);
        assert!(config.storage.wal_mode);
        assert!(config.gateway.admin_token.is_none());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let toml_str = r#"
[queue]
daily_cap = 50

[gateway]
port = 8080
"#;
        let config: FilaqConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.queue.daily_cap, 50);
        assert_eq!(config.queue.grace_minutes, 10);
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.host, "127.0.0.1");
    }

    #[test]
    fn unknown_field_in_section_fails() {
        let toml_str = r#"
[gateway]
bearer = "nope"
"#;
        assert!(toml::from_str::<FilaqConfig>(toml_str).is_err());
    }
}
