// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types shared by every sluice crate.
//!
//! This crate owns the error taxonomy, the [`Value`] cell type that rows are
//! made of, and the [`FromValue`]/[`FromRow`] traits used to pull typed data
//! out of a row without runtime type inspection.

pub mod error;
pub mod row;
pub mod value;

pub use error::{map_tr_err, SluiceError};
pub use row::{column, FromRow, FromValue};
pub use value::Value;

/// Outcome of a single autocommitted statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Rows changed by the statement.
    pub rows_affected: usize,
    /// Row id of the most recent successful insert on the connection.
    pub last_insert_id: i64,
}
