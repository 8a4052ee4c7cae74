// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sluice backup` and `sluice restore`.
//!
//! Both work on the database file directly, so they can run while another
//! process holds the database open in WAL mode.

use std::path::Path;

use sluice_config::SluiceConfig;
use sluice_core::SluiceError;
use sluice_storage::backup::{backup_file, restore_file};
use sluice_storage::database::MEMORY_PATH;

fn file_path(config: &SluiceConfig) -> Result<&Path, SluiceError> {
    if config.database.path == MEMORY_PATH {
        return Err(SluiceError::Config(
            "backup and restore need a file database, not :memory:".into(),
        ));
    }
    Ok(Path::new(&config.database.path))
}

pub fn run_backup(config: &SluiceConfig, dest: &Path) -> Result<(), SluiceError> {
    backup_file(file_path(config)?, dest)?;
    println!("backup written to {}", dest.display());
    Ok(())
}

pub fn run_restore(config: &SluiceConfig, src: &Path) -> Result<(), SluiceError> {
    let db_path = file_path(config)?;
    if let Some(safety) = restore_file(db_path, src)? {
        println!("previous database saved to {}", safety.display());
    }
    println!("restored {} from {}", db_path.display(), src.display());
    Ok(())
}
