// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! Every struct rejects unknown keys so typos fail at startup instead of
//! being silently ignored.

use serde::{Deserialize, Serialize};

/// Top-level sluice configuration. All sections default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SluiceConfig {
    /// Database file and connection pragmas.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Request queue sizing for the access coordinator.
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Bulk insert session settings.
    #[serde(default)]
    pub insert: InsertConfig,

    /// Schema bootstrap.
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
}

impl SluiceConfig {
    /// The effective configuration as TOML, as printed by `sluice config`.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Enable WAL journaling for file databases.
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// How long a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Open the database read-only.
    #[serde(default)]
    pub read_only: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            wal_mode: true,
            busy_timeout_ms: default_busy_timeout_ms(),
            read_only: false,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("sluice").join("sluice.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("sluice.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Coordinator queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Capacity of the read request queue.
    #[serde(default = "default_queue_depth")]
    pub query_queue_depth: usize,

    /// Capacity of the write request queue.
    #[serde(default = "default_queue_depth")]
    pub action_queue_depth: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            query_queue_depth: default_queue_depth(),
            action_queue_depth: default_queue_depth(),
        }
    }
}

fn default_queue_depth() -> usize {
    64
}

/// Bulk insert configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InsertConfig {
    /// Capacity of a bulk insert intake. Zero means an intake of one.
    #[serde(default = "default_insert_depth")]
    pub queue_depth: usize,
}

impl Default for InsertConfig {
    fn default() -> Self {
        Self {
            queue_depth: default_insert_depth(),
        }
    }
}

fn default_insert_depth() -> usize {
    16
}

/// Schema bootstrap configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    /// SQL script run against the database when it is opened.
    #[serde(default)]
    pub script: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Level for sluice targets (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit every executed statement as a trace event.
    #[serde(default)]
    pub trace_sql: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            trace_sql: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
