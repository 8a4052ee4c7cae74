// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous execution primitives.
//!
//! These run directly on a `rusqlite::Connection`. The coordinator workers
//! call them inside the connection threads; callers holding a connection of
//! their own may call them directly.

use std::collections::HashMap;

use rusqlite::{params_from_iter, Connection};
use sluice_core::{ExecOutcome, FromRow, SluiceError, Value};

use crate::stream::{first_row, prepare};

/// Execute one autocommitted statement.
pub fn exec(conn: &Connection, sql: &str, args: &[Value]) -> Result<ExecOutcome, SluiceError> {
    let mut stmt = prepare(conn, sql, args)?;
    let rows_affected = stmt
        .execute(params_from_iter(args.iter()))
        .map_err(|e| SluiceError::query(sql, e))?;
    Ok(ExecOutcome {
        rows_affected,
        last_insert_id: conn.last_insert_rowid(),
    })
}

/// Execute a statement and return the number of rows it changed.
pub fn update(conn: &Connection, sql: &str, args: &[Value]) -> Result<usize, SluiceError> {
    exec(conn, sql, args).map(|o| o.rows_affected)
}

/// Execute an insert and return the new row id.
pub fn insert(conn: &Connection, sql: &str, args: &[Value]) -> Result<i64, SluiceError> {
    exec(conn, sql, args).map(|o| o.last_insert_id)
}

/// Fetch exactly one row into `T`.
///
/// No row is a query error; a column count that does not match `T` is a
/// scan error.
pub fn row<T: FromRow>(conn: &Connection, sql: &str, args: &[Value]) -> Result<T, SluiceError> {
    match first_row(conn, sql, args)? {
        Some((_, values)) => T::from_row(&values),
        None => Err(SluiceError::query(sql, "query returned no rows")),
    }
}

/// Fetch the first row keyed by column name, or `None` when there is none.
pub fn row_map(
    conn: &Connection,
    sql: &str,
    args: &[Value],
) -> Result<Option<HashMap<String, Value>>, SluiceError> {
    Ok(first_row(conn, sql, args)?
        .map(|(columns, values)| columns.into_iter().zip(values).collect()))
}

/// Insert every argument tuple in one transaction.
///
/// The first failure rolls the whole batch back. Returns the row id of the
/// last insert.
pub fn insert_many<I>(conn: &mut Connection, sql: &str, batches: I) -> Result<i64, SluiceError>
where
    I: IntoIterator<Item = Vec<Value>>,
{
    let tx = conn
        .transaction()
        .map_err(|e| SluiceError::transaction("begin", e))?;
    let mut last_insert_id = 0;
    {
        let mut stmt = tx
            .prepare(sql)
            .map_err(|e| SluiceError::transaction("prepare", e))?;
        for args in batches {
            // Dropping `tx` on the error path rolls back.
            stmt.execute(params_from_iter(args.iter()))
                .map_err(|e| SluiceError::transaction("exec", e))?;
            last_insert_id = tx.last_insert_rowid();
        }
    }
    tx.commit()
        .map_err(|e| SluiceError::transaction("commit", e))?;
    Ok(last_insert_id)
}

/// Execute statements in order inside one transaction, rolling back on the
/// first failure.
pub fn run<S: AsRef<str>>(conn: &mut Connection, statements: &[S]) -> Result<(), SluiceError> {
    let tx = conn
        .transaction()
        .map_err(|e| SluiceError::transaction("begin", e))?;
    for statement in statements {
        let sql = statement.as_ref();
        tx.execute_batch(sql)
            .map_err(|e| SluiceError::transaction("exec", format!("{e} (sql: {sql})")))?;
    }
    tx.commit()
        .map_err(|e| SluiceError::transaction("commit", e))
}
