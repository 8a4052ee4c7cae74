// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aligned text tables.
//!
//! Unlike the other sinks, this one holds the whole result set: cells are
//! buffered in an [`Aligner`] until the stream ends, since a column's width
//! is only known once every row has been seen. Use CSV, TSV or JSON output
//! for results too large to hold in memory.

use std::io::{BufWriter, Write};

use sluice_core::{SluiceError, Value};

use super::RowSink;

/// Layout settings for table output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOptions {
    /// Characters that break a column name into stacked header lines,
    /// e.g. `"_."` renders `order_total` as `order` over `total`.
    pub split_headers: Option<String>,
    /// Spaces between columns.
    pub padding: usize,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            split_headers: None,
            padding: 2,
        }
    }
}

impl TableOptions {
    pub fn split_on(mut self, separators: impl Into<String>) -> Self {
        self.split_headers = Some(separators.into());
        self
    }

    /// Header lines for `columns`, bottom-aligned so the last part of every
    /// name sits on the line just above the rule.
    pub fn header_lines(&self, columns: &[String]) -> Vec<Vec<String>> {
        let Some(separators) = self.split_headers.as_deref().filter(|s| !s.is_empty()) else {
            return vec![columns.to_vec()];
        };
        let parts: Vec<Vec<&str>> = columns
            .iter()
            .map(|name| {
                let parts: Vec<&str> = name
                    .split(|c: char| separators.contains(c))
                    .filter(|p| !p.is_empty())
                    .collect();
                if parts.is_empty() { vec![name.as_str()] } else { parts }
            })
            .collect();
        let depth = parts.iter().map(Vec::len).max().unwrap_or(1);
        (0..depth)
            .map(|line| {
                parts
                    .iter()
                    .map(|p| {
                        let offset = depth - p.len();
                        if line < offset { String::new() } else { p[line - offset].to_string() }
                    })
                    .collect()
            })
            .collect()
    }
}

enum Line {
    Cells(Vec<String>),
    Rule,
}

/// Column-width aligner.
#[derive(Default)]
pub struct Aligner {
    lines: Vec<Line>,
    widths: Vec<usize>,
}

impl Aligner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_cells<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cells: Vec<String> = cells.into_iter().map(|c| flatten(c.into())).collect();
        if self.widths.len() < cells.len() {
            self.widths.resize(cells.len(), 0);
        }
        for (width, cell) in self.widths.iter_mut().zip(&cells) {
            *width = (*width).max(cell.chars().count());
        }
        self.lines.push(Line::Cells(cells));
    }

    /// An `=` underline spanning every column.
    pub fn push_rule(&mut self) {
        self.lines.push(Line::Rule);
    }

    /// Write every buffered line and clear the buffer.
    pub fn flush_to<W: Write>(&mut self, out: &mut W, padding: usize) -> std::io::Result<()> {
        let gap = " ".repeat(padding);
        for line in self.lines.drain(..) {
            let mut text = String::new();
            match line {
                Line::Cells(cells) => {
                    for (i, cell) in cells.iter().enumerate() {
                        if i > 0 {
                            text.push_str(&gap);
                        }
                        text.push_str(cell);
                        let fill = self.widths[i] - cell.chars().count();
                        text.extend(std::iter::repeat_n(' ', fill));
                    }
                }
                Line::Rule => {
                    let rules: Vec<String> = self.widths.iter().map(|w| "=".repeat(*w)).collect();
                    text = rules.join(&gap);
                }
            }
            out.write_all(text.trim_end().as_bytes())?;
            out.write_all(b"\n")?;
        }
        Ok(())
    }
}

fn flatten(cell: String) -> String {
    if cell.contains(['\n', '\r', '\t']) {
        cell.replace(['\n', '\r', '\t'], " ")
    } else {
        cell
    }
}

/// Streams rows into an [`Aligner`] and writes the table on finish.
pub struct TableSink<W: Write> {
    out: BufWriter<W>,
    options: TableOptions,
    aligner: Aligner,
}

impl<W: Write> TableSink<W> {
    pub fn new(out: W, options: TableOptions) -> Self {
        Self {
            out: BufWriter::new(out),
            options,
            aligner: Aligner::new(),
        }
    }
}

impl<W: Write> RowSink for TableSink<W> {
    fn header(&mut self, columns: &[String]) -> Result<(), SluiceError> {
        for line in self.options.header_lines(columns) {
            self.aligner.push_cells(line);
        }
        self.aligner.push_rule();
        Ok(())
    }

    fn row(&mut self, _columns: &[String], _index: usize, values: &[Value]) -> Result<(), SluiceError> {
        self.aligner.push_cells(values.iter().map(Value::to_text));
        Ok(())
    }

    // Rows seen before a failure are still written.
    fn finish(&mut self, _completed: bool) -> Result<(), SluiceError> {
        self.aligner.flush_to(&mut self.out, self.options.padding)?;
        self.out.flush()?;
        Ok(())
    }
}
