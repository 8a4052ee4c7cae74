// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialized access to an embedded SQLite database.
//!
//! SQLite tolerates one writer at a time. This crate gives many concurrent
//! callers an async interface over it:
//!
//! - [`database`] owns a writer connection and a reader connection.
//! - [`coordinator`] runs a read worker and a write worker over them, each
//!   draining its own FIFO request queue.
//! - [`inserter`] commits a stream of row arguments as one transaction.
//! - [`stream`] turns a result set into per-row callbacks, and [`sink`]
//!   renders those callbacks as CSV, TSV, JSON records, or aligned tables.
//! - [`exec`] holds the synchronous primitives the above are built from.
//!
//! Schema scripts, online backup, and declarative record mapping live in
//! [`schema`], [`backup`], and [`mapping`].

pub mod backup;
pub mod coordinator;
pub mod database;
pub mod exec;
pub mod inserter;
pub mod mapping;
pub mod schema;
pub mod sink;
pub mod stream;
pub mod table;

pub use coordinator::{run_coordinator, Action, CoordinatorHandle, Query};
pub use database::{Database, DatabaseOptions, SqlFunction};
pub use inserter::{InsertProducer, Inserter};
pub use sink::{RowSink, TableOptions};
pub use stream::stream;
pub use table::Table;

pub use sluice_core::{ExecOutcome, FromRow, FromValue, SluiceError, Value};
