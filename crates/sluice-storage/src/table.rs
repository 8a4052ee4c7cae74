// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fully materialized result sets.

use std::io::Write;

use rusqlite::Connection;
use sluice_core::{SluiceError, Value};

use crate::sink::{Aligner, RowSink, TableOptions};
use crate::stream::stream_into;

/// A result set with every cell coerced to text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Run `sql` and keep the whole result.
    pub fn load(conn: &Connection, sql: &str, args: &[Value]) -> Result<Self, SluiceError> {
        let mut table = Table::default();
        stream_into(conn, sql, args, &mut table)?;
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `row` in the named column.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// Render with the same layout as the streaming table sink.
    pub fn render<W: Write>(&self, mut out: W, options: &TableOptions) -> Result<(), SluiceError> {
        let mut aligner = Aligner::new();
        for line in options.header_lines(&self.columns) {
            aligner.push_cells(line);
        }
        aligner.push_rule();
        for row in &self.rows {
            aligner.push_cells(row.iter().map(String::as_str));
        }
        aligner.flush_to(&mut out, options.padding)?;
        out.flush()?;
        Ok(())
    }
}

impl RowSink for Table {
    fn header(&mut self, columns: &[String]) -> Result<(), SluiceError> {
        self.columns = columns.to_vec();
        Ok(())
    }

    fn row(&mut self, _columns: &[String], _index: usize, values: &[Value]) -> Result<(), SluiceError> {
        self.rows.push(values.iter().map(Value::to_text).collect());
        Ok(())
    }
}
