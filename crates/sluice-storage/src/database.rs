// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection ownership, pragma setup, and lifecycle.
//!
//! A [`Database`] holds one writer connection and one reader connection,
//! each backed by its own tokio-rusqlite background thread. Every write goes
//! through the writer thread, which is what keeps SQLite's single-writer
//! rule intact. Do NOT open additional connections for writes while a
//! coordinator or bulk insert session is running.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::functions::FunctionFlags;
use rusqlite::OpenFlags;
use sluice_config::SluiceConfig;
use sluice_core::{map_tr_err, SluiceError, Value};
use tracing::{debug, trace, warn};

use crate::{backup, schema};

/// Path that selects a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

type ScalarFn = dyn Fn(&[Value]) -> Result<Value, SluiceError> + Send + Sync;

/// A scalar SQL function registered on every connection at open.
#[derive(Clone)]
pub struct SqlFunction {
    name: String,
    n_args: i32,
    deterministic: bool,
    func: Arc<ScalarFn>,
}

impl SqlFunction {
    /// `n_args` of -1 accepts any number of arguments.
    pub fn new<F>(name: impl Into<String>, n_args: i32, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, SluiceError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            n_args,
            deterministic: false,
            func: Arc::new(func),
        }
    }

    /// Let SQLite treat the function as pure.
    pub fn deterministic(mut self) -> Self {
        self.deterministic = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
        let mut flags = FunctionFlags::SQLITE_UTF8;
        if self.deterministic {
            flags |= FunctionFlags::SQLITE_DETERMINISTIC;
        }
        let func = AssertUnwindSafe(Arc::clone(&self.func));
        conn.create_scalar_function(self.name.as_str(), self.n_args, flags, move |ctx| {
            let func = &func;
            let args: Vec<Value> = (0..ctx.len())
                .map(|i| Value::from_sql_ref(ctx.get_raw(i), None))
                .collect();
            (func.0)(&args).map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))
        })
    }
}

impl std::fmt::Debug for SqlFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlFunction")
            .field("name", &self.name)
            .field("n_args", &self.n_args)
            .field("deterministic", &self.deterministic)
            .finish()
    }
}

/// Everything a [`Database`] needs at construction.
///
/// Functions, bootstrap schema, and tracing are scoped to the connections
/// this value opens; nothing is registered process-wide.
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    /// Use WAL journaling for file databases.
    pub wal_mode: bool,
    /// How long a connection waits on a locked database.
    pub busy_timeout: Duration,
    /// Open read-only. The writer connection rejects writes.
    pub read_only: bool,
    /// Script run on the writer right after open.
    pub schema: Option<String>,
    /// Emit every executed statement as a `trace` event on `sluice::sql`.
    pub trace_sql: bool,
    /// Scalar functions registered on every connection.
    pub functions: Vec<SqlFunction>,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            wal_mode: true,
            busy_timeout: Duration::from_secs(5),
            read_only: false,
            schema: None,
            trace_sql: false,
            functions: Vec::new(),
        }
    }
}

impl DatabaseOptions {
    /// Build options from loaded configuration, reading the schema script
    /// from disk if one is configured.
    pub fn from_config(config: &SluiceConfig) -> Result<Self, SluiceError> {
        let schema = match &config.schema.script {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|e| {
                SluiceError::Config(format!("cannot read schema script {path}: {e}"))
            })?),
            None => None,
        };
        Ok(Self {
            wal_mode: config.database.wal_mode,
            busy_timeout: Duration::from_millis(config.database.busy_timeout_ms),
            read_only: config.database.read_only,
            schema,
            trace_sql: config.log.trace_sql,
            functions: Vec::new(),
        })
    }

    pub fn with_schema(mut self, script: impl Into<String>) -> Self {
        self.schema = Some(script.into());
        self
    }

    pub fn with_function(mut self, function: SqlFunction) -> Self {
        self.functions.push(function);
        self
    }

    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace_sql = enabled;
        self
    }
}

fn trace_statement(sql: &str) {
    trace!(target: "sluice::sql", sql = %sql, "statement");
}

/// Handle to an open database.
///
/// Cloning is cheap; clones share the same connections. In-memory databases
/// use one connection for both roles, so their reads and writes serialize.
#[derive(Clone)]
pub struct Database {
    writer: tokio_rusqlite::Connection,
    reader: tokio_rusqlite::Connection,
    shared: bool,
    path: Option<PathBuf>,
    closed: Arc<AtomicBool>,
}

impl Database {
    /// Open (creating if needed) the database at `path`. `":memory:"` opens
    /// a private in-memory database.
    pub async fn open(path: impl AsRef<Path>, options: DatabaseOptions) -> Result<Self, SluiceError> {
        let path = path.as_ref();
        if path.as_os_str() == MEMORY_PATH {
            return Self::open_in_memory(options).await;
        }

        let base = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let writer_flags = if options.read_only {
            base | OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            base | OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
        };

        let writer = tokio_rusqlite::Connection::open_with_flags(path, writer_flags)
            .await
            .map_err(SluiceError::storage)?;
        let wal = options.wal_mode && !options.read_only;
        configure(&writer, &options, wal).await?;

        // The reader opens after the writer so WAL files already exist.
        let reader =
            tokio_rusqlite::Connection::open_with_flags(path, base | OpenFlags::SQLITE_OPEN_READ_ONLY)
                .await
                .map_err(SluiceError::storage)?;
        configure(&reader, &options, false).await?;

        let db = Self {
            writer,
            reader,
            shared: false,
            path: Some(path.to_path_buf()),
            closed: Arc::new(AtomicBool::new(false)),
        };
        db.bootstrap(options.schema).await?;
        debug!(path = %path.display(), wal, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory(options: DatabaseOptions) -> Result<Self, SluiceError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(SluiceError::storage)?;
        configure(&conn, &options, false).await?;
        let db = Self {
            reader: conn.clone(),
            writer: conn,
            shared: true,
            path: None,
            closed: Arc::new(AtomicBool::new(false)),
        };
        db.bootstrap(options.schema).await?;
        debug!("in-memory database opened");
        Ok(db)
    }

    async fn bootstrap(&self, schema: Option<String>) -> Result<(), SluiceError> {
        let Some(script) = schema else {
            return Ok(());
        };
        let count = self
            .write(move |conn| schema::load_script(conn, &script))
            .await?;
        debug!(statements = count, "schema bootstrap applied");
        Ok(())
    }

    /// File path, or `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The writer connection.
    pub fn writer(&self) -> &tokio_rusqlite::Connection {
        &self.writer
    }

    /// The reader connection. Same as the writer for in-memory databases.
    pub fn reader(&self) -> &tokio_rusqlite::Connection {
        &self.reader
    }

    /// Run `f` on the writer thread.
    pub async fn write<F, R>(&self, f: F) -> Result<R, SluiceError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, SluiceError> + Send + 'static,
        R: Send + 'static,
    {
        if self.is_closed() {
            return Err(SluiceError::ClosedResource("connection"));
        }
        self.writer.call(f).await.map_err(map_tr_err)
    }

    /// Run `f` on the reader thread.
    pub async fn read<F, R>(&self, f: F) -> Result<R, SluiceError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, SluiceError> + Send + 'static,
        R: Send + 'static,
    {
        if self.is_closed() {
            return Err(SluiceError::ClosedResource("connection"));
        }
        self.reader.call(f).await.map_err(map_tr_err)
    }

    /// Online copy of the live database into `dest`.
    ///
    /// Runs on the reader so writers keep going while pages are copied.
    pub async fn backup_to(&self, dest: impl AsRef<Path>) -> Result<(), SluiceError> {
        let dest = dest.as_ref().to_path_buf();
        self.read(move |conn| backup::backup_to(conn, &dest)).await
    }

    /// Replace the live contents with those of the database file at `src`.
    pub async fn restore_from(&self, src: impl AsRef<Path>) -> Result<(), SluiceError> {
        let src = src.as_ref().to_path_buf();
        self.write(move |conn| backup::restore_into(conn, &src)).await
    }

    /// Checkpoint and close both connections.
    ///
    /// The checkpoint is best effort: a failure is logged and does not stop
    /// the close. Closing an already closed database succeeds. Requests made
    /// after close fail with [`SluiceError::ClosedResource`].
    pub async fn close(&self) -> Result<(), SluiceError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let checkpoint = self
            .writer
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await;
        match checkpoint {
            Ok(()) => debug!("WAL checkpoint complete"),
            Err(e) => warn!(error = %e, "WAL checkpoint failed, closing anyway"),
        }

        close_connection(self.writer.clone()).await?;
        if !self.shared {
            close_connection(self.reader.clone()).await?;
        }
        debug!("database closed");
        Ok(())
    }
}

async fn configure(
    conn: &tokio_rusqlite::Connection,
    options: &DatabaseOptions,
    wal: bool,
) -> Result<(), SluiceError> {
    let busy_timeout = options.busy_timeout;
    let trace_sql = options.trace_sql;
    let functions = options.functions.clone();
    conn.call(move |conn| -> Result<(), SluiceError> {
        conn.busy_timeout(busy_timeout)?;
        if wal {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        for function in &functions {
            function.register(conn)?;
        }
        if trace_sql {
            conn.trace(Some(trace_statement));
        }
        Ok(())
    })
    .await
    .map_err(map_tr_err)
}

async fn close_connection(conn: tokio_rusqlite::Connection) -> Result<(), SluiceError> {
    match conn.close().await {
        Ok(()) | Err(tokio_rusqlite::Error::ConnectionClosed) => Ok(()),
        Err(e) => Err(SluiceError::storage(e.to_string())),
    }
}
