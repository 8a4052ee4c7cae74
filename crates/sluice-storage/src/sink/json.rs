// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON output: an array with one record object per line.
//!
//! Strings and keys are escaped by `serde_json`. The closing bracket is
//! only written when the stream completes, so a failed render never looks
//! like a complete document.

use std::io::{BufWriter, Write};

use sluice_core::{SluiceError, Value};

use super::RowSink;

pub struct JsonSink<W: Write> {
    out: BufWriter<W>,
    started: bool,
    rows: usize,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
            started: false,
            rows: 0,
        }
    }

    fn write_record(&mut self, columns: &[String], values: &[Value]) -> Result<(), SluiceError> {
        self.out.write_all(b"{")?;
        for (i, (column, value)) in columns.iter().zip(values).enumerate() {
            if i > 0 {
                self.out.write_all(b",")?;
            }
            let json = value.to_json()?;
            serde_json::to_writer(&mut self.out, column).map_err(SluiceError::storage)?;
            self.out.write_all(b":")?;
            serde_json::to_writer(&mut self.out, &json).map_err(SluiceError::storage)?;
        }
        self.out.write_all(b"}")?;
        Ok(())
    }
}

impl<W: Write> RowSink for JsonSink<W> {
    fn header(&mut self, _columns: &[String]) -> Result<(), SluiceError> {
        self.out.write_all(b"[\n")?;
        self.started = true;
        Ok(())
    }

    fn row(&mut self, columns: &[String], _index: usize, values: &[Value]) -> Result<(), SluiceError> {
        if self.rows > 0 {
            self.out.write_all(b",\n")?;
        }
        self.write_record(columns, values)?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self, completed: bool) -> Result<(), SluiceError> {
        if completed && self.started {
            // The last record has no trailing newline of its own.
            let close: &[u8] = if self.rows == 0 { b"]\n" } else { b"\n]\n" };
            self.out.write_all(close)?;
        }
        self.out.flush()?;
        Ok(())
    }
}
