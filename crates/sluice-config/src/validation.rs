// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::SluiceConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every problem rather than stopping at the first.
pub fn validate_config(config: &SluiceConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.database.path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "database.path must not be empty".to_string(),
        });
    }

    if config.coordinator.query_queue_depth == 0 {
        errors.push(ConfigError::Validation {
            message: "coordinator.query_queue_depth must be greater than zero".to_string(),
        });
    }

    if config.coordinator.action_queue_depth == 0 {
        errors.push(ConfigError::Validation {
            message: "coordinator.action_queue_depth must be greater than zero".to_string(),
        });
    }

    if !LOG_LEVELS.contains(&config.log.level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level `{}` is not one of {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if let Some(script) = &config.schema.script
        && script.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "schema.script must not be empty when set".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
