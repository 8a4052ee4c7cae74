// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sluice - serialized access to an embedded SQLite database.
//!
//! This is the command-line entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod backup;
mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use sluice_config::SluiceConfig;
use sluice_core::SluiceError;

/// Sluice - serialized access to an embedded SQLite database.
#[derive(Parser, Debug)]
#[command(name = "sluice", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database path, overriding `database.path`.
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Output formats for `sluice query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Table,
    Csv,
    Tsv,
    Json,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a query and print its rows.
    Query {
        sql: String,
        /// Positional arguments bound to `?1`, `?2`, ...
        #[arg(long = "arg")]
        args: Vec<String>,
        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
        /// Split table headers on these characters.
        #[arg(long)]
        split_headers: Option<String>,
    },
    /// Execute one statement.
    Exec {
        sql: String,
        #[arg(long = "arg")]
        args: Vec<String>,
    },
    /// Run a SQL script in one transaction.
    Load { script: PathBuf },
    /// Bulk insert a CSV file into a table. The header names the columns.
    Import {
        table: String,
        file: PathBuf,
        /// Field delimiter.
        #[arg(long, default_value_t = ',')]
        delimiter: char,
    },
    /// Copy the database to a file while it stays online.
    Backup { dest: PathBuf },
    /// Replace the database with a backup, keeping a `.pre-restore` copy.
    Restore { src: PathBuf },
    /// Print the effective configuration.
    Config,
}

fn load_config(cli: &Cli) -> SluiceConfig {
    let loaded = match &cli.config {
        Some(path) => sluice_config::load_and_validate_path(path),
        None => sluice_config::load_and_validate(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            sluice_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    if let Some(path) = &cli.database {
        config.database.path = path.clone();
    }
    config
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sluice={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, config: SluiceConfig) -> Result<(), SluiceError> {
    match cli.command {
        Commands::Query {
            sql,
            args,
            format,
            split_headers,
        } => {
            let db = commands::open(&config).await?;
            let result = commands::query(&db, sql, args, format, split_headers, std::io::stdout()).await;
            db.close().await?;
            result.map(drop)
        }
        Commands::Exec { sql, args } => {
            let db = commands::open(&config).await?;
            let result = commands::exec(&db, &config, sql, args).await;
            db.close().await?;
            let outcome = result?;
            println!(
                "{} row(s) affected, last insert id {}",
                outcome.rows_affected, outcome.last_insert_id
            );
            Ok(())
        }
        Commands::Load { script } => {
            let db = commands::open(&config).await?;
            let result = commands::load(&db, script).await;
            db.close().await?;
            println!("{} statement(s) applied", result?);
            Ok(())
        }
        Commands::Import {
            table,
            file,
            delimiter,
        } => {
            let db = commands::open(&config).await?;
            let result = commands::import(&db, &config, &table, &file, delimiter).await;
            db.close().await?;
            println!("{} row(s) imported into {table}", result?);
            Ok(())
        }
        Commands::Backup { dest } => backup::run_backup(&config, &dest),
        Commands::Restore { src } => backup::run_restore(&config, &src),
        Commands::Config => {
            let text = config
                .to_toml_string()
                .map_err(|e| SluiceError::Config(e.to_string()))?;
            print!("{text}");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(&cli);
    init_tracing(&config.log.level);

    if let Err(e) = run(cli, config).await {
        eprintln!("sluice: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn query_flags_parse() {
        let cli = Cli::try_parse_from([
            "sluice",
            "--database",
            "/tmp/x.db",
            "query",
            "SELECT * FROM t WHERE a = ?1",
            "--arg",
            "7",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.database.as_deref(), Some("/tmp/x.db"));
        match cli.command {
            Commands::Query { args, format, .. } => {
                assert_eq!(args, ["7"]);
                assert_eq!(format, Format::Json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::try_parse_from(["sluice", "backup", "/tmp/b.db", "--config", "/etc/s.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/s.toml")));
        assert!(matches!(cli.command, Commands::Backup { .. }));
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["sluice", "query", "SELECT 1", "--format", "xml"]).is_err());
    }

    #[test]
    fn default_config_is_valid() {
        let config = sluice_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.log.level, "info");
    }
}
