// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the sluice configuration system.

use figment::Jail;
use sluice_config::model::SluiceConfig;
use sluice_config::{load_and_validate_str, load_config, load_config_from_str, ConfigError};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_sluice_config() {
    let toml = r#"
[database]
path = "/tmp/inventory.db"
wal_mode = false
busy_timeout_ms = 250
read_only = true

[coordinator]
query_queue_depth = 8
action_queue_depth = 4

[insert]
queue_depth = 0

[schema]
script = "schema.sql"

[log]
level = "debug"
trace_sql = true
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.database.path, "/tmp/inventory.db");
    assert!(!config.database.wal_mode);
    assert_eq!(config.database.busy_timeout_ms, 250);
    assert!(config.database.read_only);
    assert_eq!(config.coordinator.query_queue_depth, 8);
    assert_eq!(config.coordinator.action_queue_depth, 4);
    assert_eq!(config.insert.queue_depth, 0);
    assert_eq!(config.schema.script.as_deref(), Some("schema.sql"));
    assert_eq!(config.log.level, "debug");
    assert!(config.log.trace_sql);
}

/// Serialized defaults provide sensible values for every section.
#[test]
fn defaults_are_sensible() {
    let config = SluiceConfig::default();
    assert!(config.database.path.ends_with("sluice.db"));
    assert!(config.database.wal_mode);
    assert_eq!(config.database.busy_timeout_ms, 5_000);
    assert_eq!(config.coordinator.query_queue_depth, 64);
    assert_eq!(config.insert.queue_depth, 16);
    assert!(config.schema.script.is_none());
    assert_eq!(config.log.level, "info");
}

#[test]
fn unknown_section_is_rejected() {
    let err = load_config_from_str("[replication]\nfactor = 3\n").expect_err("should reject");
    assert!(err.to_string().contains("replication"));
}

#[test]
fn wrong_type_becomes_invalid_type_diagnostic() {
    let errors = load_and_validate_str("[coordinator]\nquery_queue_depth = \"many\"\n")
        .expect_err("should reject string depth");
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn validation_runs_after_deserialization() {
    let errors = load_and_validate_str("[log]\nlevel = \"verbose\"\n").expect_err("bad level");
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn local_file_and_env_layer_over_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "sluice.toml",
            r#"
[database]
path = "from-file.db"
busy_timeout_ms = 100
"#,
        )?;
        jail.set_env("SLUICE_DATABASE_BUSY_TIMEOUT_MS", "900");
        jail.set_env("SLUICE_COORDINATOR_ACTION_QUEUE_DEPTH", "3");

        let config = load_config()?;
        assert_eq!(config.database.path, "from-file.db");
        assert_eq!(config.database.busy_timeout_ms, 900);
        assert_eq!(config.coordinator.action_queue_depth, 3);
        Ok(())
    });
}
