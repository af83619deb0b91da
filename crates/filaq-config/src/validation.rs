// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as ranges and non-empty paths.

use crate::diagnostic::ConfigError;
use crate::model::FilaqConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)`
/// with all collected validation errors (does not fail fast).
pub fn validate_config(config: &FilaqConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.queue.daily_cap < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "queue.daily_cap must be at least 1, got {}",
                config.queue.daily_cap
            ),
        });
    }

    if config.queue.shift_start_hour > 23 {
        errors.push(ConfigError::Validation {
            message: format!(
                "queue.shift_start_hour must be in 0..=23, got {}",
                config.queue.shift_start_hour
            ),
        });
    }

    if config.queue.per_customer_minutes < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "queue.per_customer_minutes must be at least 1, got {}",
                config.queue.per_customer_minutes
            ),
        });
    }

    if config.queue.grace_trigger_position < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "queue.grace_trigger_position must be at least 1, got {}",
                config.queue.grace_trigger_position
            ),
        });
    }

    if config.queue.grace_minutes < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "queue.grace_minutes must be at least 1, got {}",
                config.queue.grace_minutes
            ),
        });
    }

    if config.queue.sweep_interval_secs < 1 {
        errors.push(ConfigError::Validation {
            message: "queue.sweep_interval_secs must be at least 1".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    // Validate host looks like a valid IP or hostname.
    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("gateway.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.gateway.port == 0 {
        errors.push(ConfigError::Validation {
            message: "gateway.port must not be 0".to_string(),
        });
    }

    if let Some(ref token) = config.gateway.admin_token
        && token.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "gateway.admin_token must not be blank when set".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = FilaqConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn zero_daily_cap_fails_validation() {
        let mut config = FilaqConfig::default();
        config.queue.daily_cap = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("daily_cap"))));
    }

    #[test]
    fn shift_hour_out_of_range_fails_validation() {
        let mut config = FilaqConfig::default();
        config.queue.shift_start_hour = 24;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("shift_start_hour"))));
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = FilaqConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))));
    }

    #[test]
    fn blank_admin_token_fails_validation() {
        let mut config = FilaqConfig::default();
        config.gateway.admin_token = Some("  ".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("admin_token"))));
    }

    #[test]
    fn multiple_errors_are_collected() {
        let mut config = FilaqConfig::default();
        config.queue.daily_cap = 0;
        config.gateway.port = 0;
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn valid_custom_config_passes() {
        let mut config = FilaqConfig::default();
        config.gateway.host = "0.0.0.0".to_string();
        config.gateway.admin_token = Some("token".to_string());
        config.storage.database_path = "/tmp/test.db".to_string();
        config.queue.daily_cap = 42;
        assert!(validate_config(&config).is_ok());
    }
}
