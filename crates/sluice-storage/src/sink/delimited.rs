// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CSV and TSV output via the `csv` crate (RFC 4180 quoting).

use std::io::Write;

use sluice_core::{SluiceError, Value};

use super::RowSink;

/// Delimited-text sink. The header line comes from the column set.
pub struct DelimitedSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> DelimitedSink<W> {
    pub fn new(out: W, delimiter: u8) -> Self {
        let writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .flexible(false)
            .from_writer(out);
        Self { writer }
    }
}

fn csv_err(e: csv::Error) -> SluiceError {
    SluiceError::storage(e)
}

impl<W: Write> RowSink for DelimitedSink<W> {
    fn header(&mut self, columns: &[String]) -> Result<(), SluiceError> {
        self.writer.write_record(columns).map_err(csv_err)
    }

    fn row(&mut self, _columns: &[String], _index: usize, values: &[Value]) -> Result<(), SluiceError> {
        self.writer
            .write_record(values.iter().map(Value::to_text))
            .map_err(csv_err)
    }

    fn finish(&mut self, _completed: bool) -> Result<(), SluiceError> {
        self.writer.flush().map_err(SluiceError::storage)
    }
}
