// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sluice query`, `exec`, `load`, and `import`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sluice_config::SluiceConfig;
use sluice_core::{ExecOutcome, SluiceError, Value};
use sluice_storage::sink::{self, TableOptions};
use sluice_storage::{coordinator, schema, Database, DatabaseOptions, Inserter};
use tracing::{debug, warn};

use crate::Format;

pub async fn open(config: &SluiceConfig) -> Result<Database, SluiceError> {
    let options = DatabaseOptions::from_config(config)?;
    Database::open(&config.database.path, options).await
}

/// Command-line text to a bound value: empty is NULL, then integer, then
/// finite real, otherwise text.
pub fn parse_field(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = raw.parse::<f64>()
        && f.is_finite()
    {
        return Value::Real(f);
    }
    Value::Text(raw.to_string())
}

fn parse_args(args: &[String]) -> Vec<Value> {
    args.iter().map(|a| parse_field(a)).collect()
}

/// Render `sql` to `out` on the reader connection and hand `out` back.
pub async fn query<W>(
    db: &Database,
    sql: String,
    args: Vec<String>,
    format: Format,
    split_headers: Option<String>,
    out: W,
) -> Result<W, SluiceError>
where
    W: Write + Send + 'static,
{
    let args = parse_args(&args);
    db.read(move |conn| {
        let mut out = out;
        match format {
            Format::Csv => sink::write_csv(&*conn, &mut out, &sql, &args)?,
            Format::Tsv => sink::write_tsv(&*conn, &mut out, &sql, &args)?,
            Format::Json => sink::write_json(&*conn, &mut out, &sql, &args)?,
            Format::Table => {
                let options = TableOptions {
                    split_headers,
                    ..TableOptions::default()
                };
                sink::write_table(&*conn, &mut out, &options, &sql, &args)?
            }
        }
        Ok(out)
    })
    .await
}

/// Execute one statement as a coordinator action.
pub async fn exec(
    db: &Database,
    config: &SluiceConfig,
    sql: String,
    args: Vec<String>,
) -> Result<ExecOutcome, SluiceError> {
    let (handle, task) = coordinator::spawn(
        db.clone(),
        config.coordinator.query_queue_depth,
        config.coordinator.action_queue_depth,
    );
    let outcome = handle.action(sql, parse_args(&args)).await;
    drop(handle);
    task.await
        .map_err(|e| SluiceError::Internal(format!("coordinator task failed: {e}")))?;
    outcome
}

pub async fn load(db: &Database, script: PathBuf) -> Result<usize, SluiceError> {
    db.write(move |conn| schema::load_file(conn, &script)).await
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn insert_statement(table: &str, columns: &[&str]) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        names.join(", "),
        placeholders.join(", ")
    )
}

/// Stream a delimited file into `table` through one bulk insert session.
///
/// Nothing is kept unless every row goes in.
pub async fn import(
    db: &Database,
    config: &SluiceConfig,
    table: &str,
    file: &Path,
    delimiter: char,
) -> Result<usize, SluiceError> {
    let delimiter = u8::try_from(delimiter)
        .map_err(|_| SluiceError::Config(format!("delimiter {delimiter:?} is not a single byte")))?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(file)
        .map_err(SluiceError::storage)?;
    let headers = reader.headers().map_err(SluiceError::storage)?.clone();
    let columns: Vec<&str> = headers.iter().collect();
    if columns.is_empty() {
        return Err(SluiceError::Config(format!("{} has no header row", file.display())));
    }
    let sql = insert_statement(table, &columns);
    debug!(%sql, "import statement");

    let failure = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&failure);
    let inserter = Inserter::new(
        db,
        config.insert.queue_depth,
        move |e| {
            if let Ok(mut slot) = slot.lock() {
                *slot = Some(e);
            }
        },
        sql,
    )
    .await?;

    let mut rows = 0usize;
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, line = rows + 2, "unreadable record, aborting import");
                inserter.abort().await?;
                return Err(SluiceError::storage(e));
            }
        };
        if inserter.has_failed() {
            break;
        }
        inserter.insert(record.iter().map(parse_field).collect()).await?;
        rows += 1;
    }
    inserter.close().await?;

    let failed = failure
        .lock()
        .map_err(|_| SluiceError::Internal("import error slot poisoned".into()))?
        .take();
    match failed {
        Some(e) => Err(e),
        None => Ok(rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_db(dir: &tempfile::TempDir) -> (Database, SluiceConfig) {
        let mut config = SluiceConfig::default();
        config.database.path = dir.path().join("cli.db").to_string_lossy().into_owned();
        let db = open(&config).await.unwrap();
        db.write(|conn| Ok(conn.execute_batch("CREATE TABLE people (name TEXT UNIQUE, age INTEGER);")?))
            .await
            .unwrap();
        (db, config)
    }

    #[test]
    fn fields_parse_by_shape() {
        assert_eq!(parse_field(""), Value::Null);
        assert_eq!(parse_field("42"), Value::Integer(42));
        assert_eq!(parse_field("-1.5"), Value::Real(-1.5));
        assert_eq!(parse_field("NaN"), Value::Text("NaN".into()));
        assert_eq!(parse_field("ada"), Value::Text("ada".into()));
    }

    #[test]
    fn insert_statement_quotes_identifiers() {
        assert_eq!(
            insert_statement("my table", &["a", "b\"c"]),
            r#"INSERT INTO "my table" ("a", "b""c") VALUES (?1, ?2)"#
        );
    }

    #[tokio::test]
    async fn import_then_query_as_csv() {
        let dir = tempfile::tempdir().unwrap();
        let (db, config) = temp_db(&dir).await;
        let file = dir.path().join("people.csv");
        std::fs::write(&file, "name,age\nada,36\nalan,\n").unwrap();

        let rows = import(&db, &config, "people", &file, ',').await.unwrap();
        assert_eq!(rows, 2);

        let out = query(
            &db,
            "SELECT name, age FROM people ORDER BY name".into(),
            vec![],
            Format::Csv,
            None,
            Vec::new(),
        )
        .await
        .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "name,age\nada,36\nalan,\n");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failed_import_keeps_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (db, config) = temp_db(&dir).await;
        let file = dir.path().join("dupes.csv");
        std::fs::write(&file, "name,age\nada,1\nada,2\n").unwrap();

        let err = import(&db, &config, "people", &file, ',').await.unwrap_err();
        assert!(matches!(err, SluiceError::Transaction { .. }));

        let outcome = exec(&db, &config, "DELETE FROM people".into(), vec![]).await.unwrap();
        assert_eq!(outcome.rows_affected, 0);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn exec_binds_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let (db, config) = temp_db(&dir).await;
        let outcome = exec(
            &db,
            &config,
            "INSERT INTO people VALUES (?1, ?2)".into(),
            vec!["grace".into(), "85".into()],
        )
        .await
        .unwrap();
        assert_eq!(outcome.rows_affected, 1);

        let out = query(
            &db,
            "SELECT age FROM people WHERE name = ?1".into(),
            vec!["grace".into()],
            Format::Json,
            None,
            Vec::new(),
        )
        .await
        .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[\n{\"age\":85}\n]\n");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn load_runs_script_file() {
        let dir = tempfile::tempdir().unwrap();
        let (db, _config) = temp_db(&dir).await;
        let script = dir.path().join("seed.sql");
        std::fs::write(&script, "-- seed\nINSERT INTO people VALUES ('x', 1);\nINSERT INTO people VALUES ('y', 2);\n")
            .unwrap();
        assert_eq!(load(&db, script).await.unwrap(), 2);
        db.close().await.unwrap();
    }
}
