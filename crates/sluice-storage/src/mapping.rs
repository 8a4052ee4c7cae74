// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Declarative record mapping.
//!
//! A type implements [`Record`] by naming its table, key column, and data
//! columns, and by converting itself to and from values in that column
//! order. Every statement here is generated from those names.

use rusqlite::Connection;
use sluice_core::{SluiceError, Value};

use crate::exec::{exec, update};
use crate::stream::stream;

/// Field-to-column table for one record type.
pub trait Record: Sized {
    const TABLE: &'static str;
    /// Integer primary key column.
    const KEY: &'static str;
    /// Data columns, in the order of [`values`](Record::values).
    const COLUMNS: &'static [&'static str];

    fn key(&self) -> i64;

    /// Column values in [`COLUMNS`](Record::COLUMNS) order.
    fn values(&self) -> Vec<Value>;

    /// Build a record from `[key, columns...]`.
    fn from_row(row: &[Value]) -> Result<Self, SluiceError>;
}

fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list<R: Record>() -> String {
    R::COLUMNS.iter().map(|c| ident(c)).collect::<Vec<_>>().join(", ")
}

pub fn insert_sql<R: Record>() -> String {
    let placeholders: Vec<String> = (1..=R::COLUMNS.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        ident(R::TABLE),
        column_list::<R>(),
        placeholders.join(", ")
    )
}

pub fn update_sql<R: Record>() -> String {
    let assignments: Vec<String> = R::COLUMNS
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ?{}", ident(c), i + 1))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {} = ?{}",
        ident(R::TABLE),
        assignments.join(", "),
        ident(R::KEY),
        R::COLUMNS.len() + 1
    )
}

pub fn delete_sql<R: Record>() -> String {
    format!("DELETE FROM {} WHERE {} = ?1", ident(R::TABLE), ident(R::KEY))
}

pub fn select_sql<R: Record>() -> String {
    format!(
        "SELECT {}, {} FROM {}",
        ident(R::KEY),
        column_list::<R>(),
        ident(R::TABLE)
    )
}

/// Insert `record` and return its new key.
pub fn save<R: Record>(conn: &Connection, record: &R) -> Result<i64, SluiceError> {
    exec(conn, &insert_sql::<R>(), &record.values()).map(|o| o.last_insert_id)
}

/// Overwrite the stored columns of `record`. Returns whether a row matched.
pub fn update_record<R: Record>(conn: &Connection, record: &R) -> Result<bool, SluiceError> {
    let mut args = record.values();
    args.push(Value::Integer(record.key()));
    Ok(update(conn, &update_sql::<R>(), &args)? > 0)
}

/// Delete the row with `key`. Returns whether a row matched.
pub fn delete_record<R: Record>(conn: &Connection, key: i64) -> Result<bool, SluiceError> {
    Ok(update(conn, &delete_sql::<R>(), &[Value::Integer(key)])? > 0)
}

/// Load the record with `key`.
pub fn load<R: Record>(conn: &Connection, key: i64) -> Result<Option<R>, SluiceError> {
    let sql = format!("{} WHERE {} = ?1", select_sql::<R>(), ident(R::KEY));
    Ok(load_where(conn, &sql, &[Value::Integer(key)])?.into_iter().next())
}

/// Load every record, optionally filtered by a `WHERE` clause body.
pub fn load_all<R: Record>(
    conn: &Connection,
    filter: Option<&str>,
    args: &[Value],
) -> Result<Vec<R>, SluiceError> {
    let mut sql = select_sql::<R>();
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    sql.push_str(&format!(" ORDER BY {}", ident(R::KEY)));
    load_where(conn, &sql, args)
}

fn load_where<R: Record>(conn: &Connection, sql: &str, args: &[Value]) -> Result<Vec<R>, SluiceError> {
    let expected = R::COLUMNS.len() + 1;
    let mut records = Vec::new();
    stream(conn, sql, args, |_, _, row| {
        if row.len() != expected {
            return Err(SluiceError::Scan {
                expected,
                actual: row.len(),
            });
        }
        records.push(R::from_row(row)?);
        Ok(())
    })?;
    Ok(records)
}
