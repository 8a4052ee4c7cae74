// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row streaming: a result set as a sequence of per-row callbacks.
//!
//! Rows arrive in the order the engine returns them. The value slice handed
//! to a callback is reused for the next row, so callers that want to keep
//! values must copy them. A callback error stops the stream at once and is
//! returned as is; rows already delivered stay delivered.

use rusqlite::{params_from_iter, Connection, Row, Statement};
use sluice_core::{SluiceError, Value};

use crate::sink::RowSink;

/// Execute `sql` and call `row_fn(columns, index, values)` for every row.
///
/// `index` counts from zero. The column set is computed once, before the
/// first call. The cursor is released before this returns, whatever the
/// outcome.
pub fn stream<F>(conn: &Connection, sql: &str, args: &[Value], row_fn: F) -> Result<(), SluiceError>
where
    F: FnMut(&[String], usize, &[Value]) -> Result<(), SluiceError>,
{
    stream_into(conn, sql, args, &mut CallbackSink(row_fn))
}

/// Like [`stream`], but also hands the column set to [`RowSink::header`]
/// before any rows, including when the result is empty.
pub fn stream_into<S>(conn: &Connection, sql: &str, args: &[Value], sink: &mut S) -> Result<(), SluiceError>
where
    S: RowSink + ?Sized,
{
    let mut stmt = prepare(conn, sql, args)?;
    let columns = column_names(&stmt);
    let decls = decl_types(&stmt);
    sink.header(&columns)?;

    let mut rows = stmt
        .query(params_from_iter(args.iter()))
        .map_err(|e| SluiceError::query(sql, e))?;
    let mut values = Vec::with_capacity(columns.len());
    let mut index = 0;
    while let Some(row) = rows.next().map_err(|e| SluiceError::query(sql, e))? {
        decode_row(row, &decls, &mut values)?;
        sink.row(&columns, index, &values)?;
        index += 1;
    }
    Ok(())
}

/// The first row of the result, if any, with its column set.
pub(crate) fn first_row(
    conn: &Connection,
    sql: &str,
    args: &[Value],
) -> Result<Option<(Vec<String>, Vec<Value>)>, SluiceError> {
    let mut stmt = prepare(conn, sql, args)?;
    let columns = column_names(&stmt);
    let decls = decl_types(&stmt);
    let mut rows = stmt
        .query(params_from_iter(args.iter()))
        .map_err(|e| SluiceError::query(sql, e))?;
    match rows.next().map_err(|e| SluiceError::query(sql, e))? {
        Some(row) => {
            let mut values = Vec::with_capacity(columns.len());
            decode_row(row, &decls, &mut values)?;
            Ok(Some((columns, values)))
        }
        None => Ok(None),
    }
}

/// Prepare `sql` and check the argument count against its placeholders.
pub(crate) fn prepare<'c>(
    conn: &'c Connection,
    sql: &str,
    args: &[Value],
) -> Result<Statement<'c>, SluiceError> {
    let stmt = conn.prepare(sql).map_err(|e| SluiceError::query(sql, e))?;
    let expected = stmt.parameter_count();
    if expected != args.len() {
        return Err(SluiceError::query(
            sql,
            format!("expected {expected} arguments, got {}", args.len()),
        ));
    }
    Ok(stmt)
}

fn column_names(stmt: &Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}

fn decl_types(stmt: &Statement<'_>) -> Vec<Option<String>> {
    stmt.columns()
        .iter()
        .map(|c| c.decl_type().map(str::to_string))
        .collect()
}

fn decode_row(row: &Row<'_>, decls: &[Option<String>], out: &mut Vec<Value>) -> Result<(), SluiceError> {
    out.clear();
    for (i, decl) in decls.iter().enumerate() {
        out.push(Value::from_sql_ref(row.get_ref(i)?, decl.as_deref()));
    }
    Ok(())
}

struct CallbackSink<F>(F);

impl<F> RowSink for CallbackSink<F>
where
    F: FnMut(&[String], usize, &[Value]) -> Result<(), SluiceError>,
{
    fn row(&mut self, columns: &[String], index: usize, values: &[Value]) -> Result<(), SluiceError> {
        (self.0)(columns, index, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(n: i64) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE n (v INTEGER, label TEXT);").unwrap();
        for v in 0..n {
            conn.execute("INSERT INTO n VALUES (?1, ?2)", (v, format!("row-{v}")))
                .unwrap();
        }
        conn
    }

    #[test]
    fn rows_arrive_in_result_order_with_zero_based_index() {
        let conn = numbers(5);
        let mut seen = Vec::new();
        stream(&conn, "SELECT v, label FROM n ORDER BY v DESC", &[], |cols, i, row| {
            assert_eq!(cols, ["v", "label"]);
            seen.push((i, row[0].clone()));
            Ok(())
        })
        .unwrap();
        let expected: Vec<_> = (0..5).map(|i| (i as usize, Value::Integer(4 - i))).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn callback_error_stops_stream_and_propagates() {
        let conn = numbers(10);
        let mut calls = 0;
        let err = stream(&conn, "SELECT v FROM n", &[], |_, i, _| {
            calls += 1;
            if i == 1 {
                return Err(SluiceError::Internal("enough".into()));
            }
            Ok(())
        })
        .unwrap_err();
        assert_eq!(calls, 2);
        assert!(matches!(err, SluiceError::Internal(ref m) if m == "enough"));
    }

    #[test]
    fn invalid_sql_is_query_error_before_any_callback() {
        let conn = numbers(1);
        let mut called = false;
        let err = stream(&conn, "SELECT nope FROM missing", &[], |_, _, _| {
            called = true;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, SluiceError::Query { .. }));
        assert!(!called);
    }

    #[test]
    fn wrong_argument_count_is_query_error() {
        let conn = numbers(1);
        let err = stream(&conn, "SELECT v FROM n WHERE v = ?1", &[], |_, _, _| Ok(())).unwrap_err();
        assert!(matches!(err, SluiceError::Query { ref message, .. } if message.contains("expected 1")));
    }

    #[test]
    fn arguments_bind_positionally() {
        let conn = numbers(10);
        let mut labels = Vec::new();
        stream(
            &conn,
            "SELECT label FROM n WHERE v BETWEEN ?1 AND ?2 ORDER BY v",
            &[Value::from(3), Value::from(4)],
            |_, _, row| {
                labels.push(row[0].to_text());
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(labels, ["row-3", "row-4"]);
    }

    #[test]
    fn statement_is_reusable_after_early_stop() {
        let conn = numbers(3);
        let _ = stream(&conn, "SELECT v FROM n", &[], |_, _, _| {
            Err(SluiceError::Internal("stop".into()))
        });
        // The cursor was released, so a write on the same connection works.
        conn.execute("DELETE FROM n", []).unwrap();
    }

    #[test]
    fn declared_datetime_columns_decode_as_timestamps() {
        use chrono::{TimeZone, Utc};

        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE ev (at DATETIME, note TEXT);
             INSERT INTO ev VALUES ('2024-01-02 03:04:05', '2024-01-02 03:04:05');",
        )
        .unwrap();
        let (_, row) = first_row(&conn, "SELECT at, note FROM ev", &[]).unwrap().unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(row[0], Value::Timestamp(expected));
        assert_eq!(row[1], Value::Text("2024-01-02 03:04:05".into()));
    }

    #[test]
    fn first_row_returns_columns_and_values() {
        let conn = numbers(3);
        let (cols, row) = first_row(&conn, "SELECT v, label FROM n ORDER BY v", &[])
            .unwrap()
            .unwrap();
        assert_eq!(cols, ["v", "label"]);
        assert_eq!(row, vec![Value::Integer(0), Value::Text("row-0".into())]);
        assert!(first_row(&conn, "SELECT v FROM n WHERE v > 99", &[]).unwrap().is_none());
    }
}
