// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue-driven bulk insert in one transaction.
//!
//! An [`Inserter`] owns the writer connection for its whole life: the worker
//! is a single long call on the writer thread that opens a transaction,
//! prepares the statement once, and executes queued rows in the order they
//! were queued. Coordinator actions submitted meanwhile wait behind it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rusqlite::{params_from_iter, Connection};
use sluice_core::{map_tr_err, SluiceError, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::database::Database;

type OnError = Box<dyn FnOnce(SluiceError) + Send>;

enum Intake {
    Row(Vec<Value>),
    Close,
    Abort,
}

/// A bulk insert session.
///
/// Rows go in through [`insert`](Inserter::insert) or any number of
/// [`InsertProducer`]s. The first failed row rolls the transaction back and
/// is reported once through the error callback; rows queued after it are
/// discarded unexecuted.
pub struct Inserter {
    intake: mpsc::Sender<Intake>,
    worker: JoinHandle<Result<i64, SluiceError>>,
    failed: Arc<AtomicBool>,
}

/// Cloneable producer side of an [`Inserter`] for concurrent callers.
#[derive(Clone)]
pub struct InsertProducer {
    intake: mpsc::Sender<Intake>,
}

impl InsertProducer {
    /// Queue one row. Waits while the intake is full.
    pub async fn insert(&self, args: Vec<Value>) -> Result<(), SluiceError> {
        send_row(&self.intake, args).await
    }
}

async fn send_row(intake: &mpsc::Sender<Intake>, args: Vec<Value>) -> Result<(), SluiceError> {
    intake
        .send(Intake::Row(args))
        .await
        .map_err(|_| SluiceError::ClosedResource("bulk insert intake"))
}

impl Inserter {
    /// Open a session that runs `sql` once per queued row.
    ///
    /// A failure to begin the transaction or prepare `sql` is returned here
    /// and no session exists. Every later failure goes to `on_error`.
    /// A `queue_depth` of zero is treated as one.
    pub async fn new<F>(
        db: &Database,
        queue_depth: usize,
        on_error: F,
        sql: impl Into<String>,
    ) -> Result<Self, SluiceError>
    where
        F: FnOnce(SluiceError) + Send + 'static,
    {
        if db.is_closed() {
            return Err(SluiceError::ClosedResource("connection"));
        }
        let sql = sql.into();
        let (intake, rx) = mpsc::channel(queue_depth.max(1));
        let (ready_tx, ready_rx) = oneshot::channel();
        let failed = Arc::new(AtomicBool::new(false));

        let writer = db.writer().clone();
        let worker_failed = Arc::clone(&failed);
        let on_error: OnError = Box::new(on_error);
        let worker = tokio::spawn(async move {
            writer
                .call(move |conn| {
                    let session = Session {
                        sql: &sql,
                        failed: &worker_failed,
                        on_error: Some(on_error),
                    };
                    session.run(conn, rx, ready_tx)
                })
                .await
                .map_err(map_tr_err)
        });

        match ready_rx.await {
            Ok(Ok(())) => {
                debug!(queue_depth, "bulk insert session opened");
                Ok(Self {
                    intake,
                    worker,
                    failed,
                })
            }
            Ok(Err(e)) => {
                let _ = worker.await;
                Err(e)
            }
            Err(_) => match worker.await {
                Ok(Err(e)) => Err(e),
                _ => Err(SluiceError::ClosedResource("connection")),
            },
        }
    }

    /// Queue one row. Waits while the intake is full.
    pub async fn insert(&self, args: Vec<Value>) -> Result<(), SluiceError> {
        send_row(&self.intake, args).await
    }

    /// A producer handle that can be moved into other tasks.
    pub fn producer(&self) -> InsertProducer {
        InsertProducer {
            intake: self.intake.clone(),
        }
    }

    /// Whether a row or the commit has failed.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Close the intake and roll back everything, including rows still
    /// queued. The error callback is not called.
    pub async fn abort(self) -> Result<(), SluiceError> {
        let _ = self.intake.send(Intake::Abort).await;
        drop(self.intake);
        match self.worker.await {
            Ok(result) => result.map(drop),
            Err(e) => Err(SluiceError::Internal(format!("bulk insert worker failed: {e}"))),
        }
    }

    /// Close the intake, wait for queued rows, and commit.
    ///
    /// Returns the row id of the last successful insert. A failed session
    /// still returns; its error was already delivered to the callback.
    /// Producers still holding the intake get
    /// [`SluiceError::ClosedResource`] from now on.
    pub async fn close(self) -> Result<i64, SluiceError> {
        let _ = self.intake.send(Intake::Close).await;
        drop(self.intake);
        match self.worker.await {
            Ok(result) => result,
            Err(e) => Err(SluiceError::Internal(format!("bulk insert worker failed: {e}"))),
        }
    }
}

struct Session<'a> {
    sql: &'a str,
    failed: &'a AtomicBool,
    on_error: Option<OnError>,
}

impl Session<'_> {
    fn run(
        mut self,
        conn: &mut Connection,
        mut rx: mpsc::Receiver<Intake>,
        ready: oneshot::Sender<Result<(), SluiceError>>,
    ) -> Result<i64, SluiceError> {
        if let Err(e) = conn.execute_batch("BEGIN") {
            let _ = ready.send(Err(SluiceError::transaction("begin", e)));
            return Ok(0);
        }
        let mut stmt = match conn.prepare(self.sql) {
            Ok(stmt) => stmt,
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                let _ = ready.send(Err(SluiceError::transaction("prepare", e)));
                return Ok(0);
            }
        };
        if ready.send(Ok(())).is_err() {
            drop(stmt);
            let _ = conn.execute_batch("ROLLBACK");
            return Ok(0);
        }

        let mut last_insert_id = 0;
        let mut executed = 0usize;
        // After `close` the receiver still yields rows already queued.
        while let Some(message) = rx.blocking_recv() {
            let args = match message {
                Intake::Row(args) => args,
                Intake::Close => {
                    rx.close();
                    continue;
                }
                Intake::Abort => {
                    rx.close();
                    if !self.has_failed() {
                        let _ = conn.execute_batch("ROLLBACK");
                        self.failed.store(true, Ordering::Release);
                        debug!(rows = executed, "bulk insert aborted");
                    }
                    continue;
                }
            };
            if self.has_failed() {
                continue;
            }
            match stmt.execute(params_from_iter(args.iter())) {
                Ok(_) => {
                    last_insert_id = conn.last_insert_rowid();
                    executed += 1;
                }
                Err(e) => {
                    let _ = conn.execute_batch("ROLLBACK");
                    self.fail(SluiceError::transaction("exec", e), executed);
                }
            }
        }
        drop(stmt);

        if !self.has_failed() {
            match conn.execute_batch("COMMIT") {
                Ok(()) => debug!(rows = executed, last_insert_id, "bulk insert committed"),
                Err(e) => {
                    let _ = conn.execute_batch("ROLLBACK");
                    self.fail(SluiceError::transaction("commit", e), executed);
                }
            }
        }
        Ok(last_insert_id)
    }

    fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    fn fail(&mut self, err: SluiceError, executed: usize) {
        warn!(error = %err, rows = executed, "bulk insert rolled back");
        self.failed.store(true, Ordering::Release);
        if let Some(on_error) = self.on_error.take() {
            on_error(err);
        }
    }
}
