// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for sluice.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The error type returned by every fallible sluice operation.
///
/// None of these are retried internally. Retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum SluiceError {
    /// Malformed or rejected SQL: syntax errors, unknown tables or columns,
    /// wrong number of bound arguments.
    #[error("query error: {message} (sql: {sql})")]
    Query { sql: String, message: String },

    /// The number of destinations does not match the columns a row carries.
    #[error("scan error: expected {expected} columns, row has {actual}")]
    Scan { expected: usize, actual: usize },

    /// A value has no representation in the requested target.
    #[error("unsupported type: {type_name} cannot be converted to {target}")]
    UnsupportedType {
        type_name: String,
        target: &'static str,
    },

    /// Prepare, execute, or commit failed inside a transaction.
    /// The transaction has already been rolled back.
    #[error("transaction error during {stage}: {source}")]
    Transaction {
        stage: &'static str,
        source: BoxError,
    },

    /// The connection or bulk insert intake has been closed.
    #[error("{0} is closed")]
    ClosedResource(&'static str),

    /// Engine or I/O failure not covered by the variants above.
    #[error("storage error: {source}")]
    Storage { source: BoxError },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SluiceError {
    pub fn query(sql: &str, message: impl std::fmt::Display) -> Self {
        SluiceError::Query {
            sql: sql.to_string(),
            message: message.to_string(),
        }
    }

    pub fn transaction(stage: &'static str, source: impl Into<BoxError>) -> Self {
        SluiceError::Transaction {
            stage,
            source: source.into(),
        }
    }

    pub fn storage(source: impl Into<BoxError>) -> Self {
        SluiceError::Storage {
            source: source.into(),
        }
    }

    /// True for [`SluiceError::ClosedResource`].
    pub fn is_closed(&self) -> bool {
        matches!(self, SluiceError::ClosedResource(_))
    }
}

impl From<rusqlite::Error> for SluiceError {
    fn from(e: rusqlite::Error) -> Self {
        SluiceError::storage(e)
    }
}

impl From<std::io::Error> for SluiceError {
    fn from(e: std::io::Error) -> Self {
        SluiceError::storage(e)
    }
}

/// Convert a tokio-rusqlite error into a [`SluiceError`].
///
/// Calls against a closed connection become `ClosedResource`; errors raised
/// inside the closure pass through untouched.
pub fn map_tr_err(e: tokio_rusqlite::Error<SluiceError>) -> SluiceError {
    match e {
        tokio_rusqlite::Error::ConnectionClosed => SluiceError::ClosedResource("connection"),
        tokio_rusqlite::Error::Error(inner) => inner,
        other => SluiceError::storage(other.to_string()),
    }
}
