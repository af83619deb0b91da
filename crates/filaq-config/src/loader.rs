// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./filaq.toml` > `~/.config/filaq/filaq.toml` >
//! `/etc/filaq/filaq.toml` with environment variable overrides via the
//! `FILAQ_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::FilaqConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/filaq/filaq.toml` (system-wide)
/// 3. `~/.config/filaq/filaq.toml` (user XDG config)
/// 4. `./filaq.toml` (local directory)
/// 5. `FILAQ_*` environment variables
pub fn load_config() -> Result<FilaqConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FilaqConfig::default()))
        .merge(Toml::file("/etc/filaq/filaq.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("filaq/filaq.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("filaq.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<FilaqConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FilaqConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<FilaqConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FilaqConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `FILAQ_QUEUE_DAILY_CAP` must map to
/// `queue.daily_cap`, not `queue.daily.cap`.
fn env_provider() -> Env {
    Env::prefixed("FILAQ_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: FILAQ_QUEUE_DAILY_CAP -> "queue_daily_cap"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("queue_", "queue.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("gateway_", "gateway.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins_over_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("filaq.toml", "[queue]\ndaily_cap = 200\n")?;
            jail.set_env("FILAQ_QUEUE_DAILY_CAP", "300");
            let config = load_config().expect("config should load");
            assert_eq!(config.queue.daily_cap, 300);
            Ok(())
        });
    }

    #[test]
    fn env_key_with_underscores_maps_to_one_section() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FILAQ_QUEUE_GRACE_TRIGGER_POSITION", "3");
            jail.set_env("FILAQ_GATEWAY_ADMIN_TOKEN", "sekrit");
            let config = load_config().expect("config should load");
            assert_eq!(config.queue.grace_trigger_position, 3);
            assert_eq!(config.gateway.admin_token.as_deref(), Some("sekrit"));
            Ok(())
        });
    }

    #[test]
    fn from_str_ignores_environment() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FILAQ_QUEUE_DAILY_CAP", "7");
            let config = load_config_from_str("").expect("config should load");
            assert_eq!(config.queue.daily_cap, 1000);
            Ok(())
        });
    }
}
