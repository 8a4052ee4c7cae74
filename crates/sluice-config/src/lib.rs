// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for sluice.
//!
//! TOML files are layered with figment (system, user, local), then
//! `SLUICE_*` environment variables. Unknown keys are rejected and reported
//! as miette diagnostics with typo suggestions.
//!
//! ```no_run
//! use sluice_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("database: {}", config.database.path);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::SluiceConfig;

/// Load configuration from the standard hierarchy and validate it.
pub fn load_and_validate() -> Result<SluiceConfig, Vec<ConfigError>> {
    finish(loader::load_config())
}

/// Load configuration from one explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<SluiceConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path))
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<SluiceConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content))
}

fn finish(loaded: Result<SluiceConfig, figment::Error>) -> Result<SluiceConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err)),
    }
}
