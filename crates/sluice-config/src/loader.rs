// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-based loader.
//!
//! Merge order, later wins: compiled defaults, `/etc/sluice/sluice.toml`,
//! `~/.config/sluice/sluice.toml`, `./sluice.toml`, `SLUICE_*` variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use tracing::debug;

use crate::model::SluiceConfig;

/// Sections whose names prefix environment keys.
const SECTIONS: &[&str] = &["database", "coordinator", "insert", "schema", "log"];

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<SluiceConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only. No files, no environment.
pub fn load_config_from_str(toml_content: &str) -> Result<SluiceConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SluiceConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SluiceConfig, figment::Error> {
    debug!(path = %path.display(), "loading configuration file");
    Figment::new()
        .merge(Serialized::defaults(SluiceConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SluiceConfig::default()))
        .merge(Toml::file("/etc/sluice/sluice.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("sluice/sluice.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("sluice.toml"))
        .merge(env_provider())
}

/// `SLUICE_DATABASE_BUSY_TIMEOUT_MS` maps to `database.busy_timeout_ms`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys that contain underscores survive intact.
fn env_provider() -> Env {
    Env::prefixed("SLUICE_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
