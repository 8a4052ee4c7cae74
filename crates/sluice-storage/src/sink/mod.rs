// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Format sinks built on the row stream.
//!
//! A sink renders rows as they arrive. [`render`] drives a sink over a query
//! and always calls [`RowSink::finish`], so buffered output is flushed on
//! the error path too. Stream errors are returned unchanged.

mod delimited;
mod json;
mod table;

use std::io::Write;

use rusqlite::Connection;
use sluice_core::{SluiceError, Value};

pub use delimited::DelimitedSink;
pub use json::JsonSink;
pub use table::{Aligner, TableOptions, TableSink};

use crate::stream::stream_into;

/// Consumer of a streamed result set.
pub trait RowSink {
    /// Called once with the column set, before any row.
    fn header(&mut self, _columns: &[String]) -> Result<(), SluiceError> {
        Ok(())
    }

    /// Called for each row. `values` is only valid for this call.
    fn row(&mut self, columns: &[String], index: usize, values: &[Value]) -> Result<(), SluiceError>;

    /// Called once after the stream ends. `completed` is false when the
    /// stream failed.
    fn finish(&mut self, _completed: bool) -> Result<(), SluiceError> {
        Ok(())
    }
}

/// Stream `sql` into `sink`, then finish it.
///
/// A stream error takes precedence over a finish error.
pub fn render<S>(conn: &Connection, sql: &str, args: &[Value], sink: &mut S) -> Result<(), SluiceError>
where
    S: RowSink + ?Sized,
{
    let streamed = stream_into(conn, sql, args, sink);
    let finished = sink.finish(streamed.is_ok());
    streamed.and(finished)
}

/// Write the result as `delimiter`-separated values with a header line.
pub fn write_delimited<W: Write>(
    conn: &Connection,
    out: W,
    delimiter: u8,
    sql: &str,
    args: &[Value],
) -> Result<(), SluiceError> {
    render(conn, sql, args, &mut DelimitedSink::new(out, delimiter))
}

pub fn write_csv<W: Write>(conn: &Connection, out: W, sql: &str, args: &[Value]) -> Result<(), SluiceError> {
    write_delimited(conn, out, b',', sql, args)
}

pub fn write_tsv<W: Write>(conn: &Connection, out: W, sql: &str, args: &[Value]) -> Result<(), SluiceError> {
    write_delimited(conn, out, b'\t', sql, args)
}

/// Write the result as an array of JSON records, one per line.
pub fn write_json<W: Write>(conn: &Connection, out: W, sql: &str, args: &[Value]) -> Result<(), SluiceError> {
    render(conn, sql, args, &mut JsonSink::new(out))
}

/// Write the result as an aligned text table.
pub fn write_table<W: Write>(
    conn: &Connection,
    out: W,
    options: &TableOptions,
    sql: &str,
    args: &[Value],
) -> Result<(), SluiceError> {
    render(conn, sql, args, &mut TableSink::new(out, options.clone()))
}
