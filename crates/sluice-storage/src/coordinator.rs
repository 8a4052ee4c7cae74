// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access coordinator: one read worker and one write worker.
//!
//! Queries are served one at a time, in submission order, on the reader
//! connection. Actions are served one at a time, in submission order, on the
//! writer connection. The two streams do not wait on each other. Each worker
//! stops once its input channel is closed and drained; there is no other
//! cancellation, and work already dispatched runs to completion.

use std::sync::{Arc, Mutex};

use sluice_core::{ExecOutcome, SluiceError, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::database::Database;
use crate::exec::exec;
use crate::stream::stream;

/// Row consumer carried by a [`Query`].
pub type RowCallback = Box<dyn FnMut(&[String], usize, &[Value]) -> Result<(), SluiceError> + Send>;

/// Completion callback carried by an [`Action`].
pub type Completion = Box<dyn FnOnce(Result<ExecOutcome, SluiceError>) + Send>;

/// Reply slot for a [`Query`]. Holds exactly one result.
pub type QueryReply = oneshot::Receiver<Result<(), SluiceError>>;

/// A read request.
pub struct Query {
    sql: String,
    args: Vec<Value>,
    on_row: RowCallback,
    reply: Option<oneshot::Sender<Result<(), SluiceError>>>,
}

impl Query {
    /// A query whose outcome is not reported back.
    pub fn new<F>(sql: impl Into<String>, args: Vec<Value>, on_row: F) -> Self
    where
        F: FnMut(&[String], usize, &[Value]) -> Result<(), SluiceError> + Send + 'static,
    {
        Self {
            sql: sql.into(),
            args,
            on_row: Box::new(on_row),
            reply: None,
        }
    }

    /// Attach a reply slot. The read worker fills it without waiting for the
    /// receiver, so an abandoned receiver never stalls later queries.
    pub fn with_reply(mut self) -> (Self, QueryReply) {
        let (tx, rx) = oneshot::channel();
        self.reply = Some(tx);
        (self, rx)
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// A write request.
pub struct Action {
    sql: String,
    args: Vec<Value>,
    on_complete: Completion,
}

impl Action {
    pub fn new<F>(sql: impl Into<String>, args: Vec<Value>, on_complete: F) -> Self
    where
        F: FnOnce(Result<ExecOutcome, SluiceError>) + Send + 'static,
    {
        Self {
            sql: sql.into(),
            args,
            on_complete: Box::new(on_complete),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// Serve `queries` and `actions` against `db` until both are closed.
pub async fn run_coordinator(db: Database, queries: mpsc::Receiver<Query>, actions: mpsc::Receiver<Action>) {
    tokio::join!(read_worker(db.clone(), queries), write_worker(db, actions));
    debug!("coordinator stopped");
}

async fn read_worker(db: Database, mut queries: mpsc::Receiver<Query>) {
    let mut served = 0u64;
    while let Some(query) = queries.recv().await {
        let Query {
            sql,
            args,
            mut on_row,
            reply,
        } = query;
        let result = db
            .read(move |conn| stream(conn, &sql, &args, |columns, index, row| on_row(columns, index, row)))
            .await;
        served += 1;
        match reply {
            Some(reply) => {
                let _ = reply.send(result);
            }
            None => {
                if let Err(e) = result {
                    debug!(error = %e, "unreported query failed");
                }
            }
        }
    }
    debug!(served, "read worker stopped");
}

async fn write_worker(db: Database, mut actions: mpsc::Receiver<Action>) {
    let mut served = 0u64;
    while let Some(action) = actions.recv().await {
        let Action { sql, args, on_complete } = action;
        let result = db.write(move |conn| exec(conn, &sql, &args)).await;
        served += 1;
        on_complete(result);
    }
    debug!(served, "write worker stopped");
}

/// Start a coordinator on the current runtime.
///
/// Depths of zero are treated as one. The coordinator stops once every
/// handle clone has been dropped and the queued work is done.
pub fn spawn(db: Database, query_depth: usize, action_depth: usize) -> (CoordinatorHandle, JoinHandle<()>) {
    let (queries, query_rx) = mpsc::channel(query_depth.max(1));
    let (actions, action_rx) = mpsc::channel(action_depth.max(1));
    let task = tokio::spawn(run_coordinator(db, query_rx, action_rx));
    (CoordinatorHandle { queries, actions }, task)
}

/// Producer side of a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    queries: mpsc::Sender<Query>,
    actions: mpsc::Sender<Action>,
}

impl CoordinatorHandle {
    /// Queue a query. Waits while the query channel is full.
    pub async fn submit_query(&self, query: Query) -> Result<(), SluiceError> {
        self.queries
            .send(query)
            .await
            .map_err(|_| SluiceError::ClosedResource("coordinator"))
    }

    /// Queue an action. Waits while the action channel is full.
    pub async fn submit_action(&self, action: Action) -> Result<(), SluiceError> {
        self.actions
            .send(action)
            .await
            .map_err(|_| SluiceError::ClosedResource("coordinator"))
    }

    /// Stream `sql` through `on_row` and wait for the outcome.
    pub async fn query<F>(&self, sql: impl Into<String>, args: Vec<Value>, on_row: F) -> Result<(), SluiceError>
    where
        F: FnMut(&[String], usize, &[Value]) -> Result<(), SluiceError> + Send + 'static,
    {
        let (query, reply) = Query::new(sql, args, on_row).with_reply();
        self.submit_query(query).await?;
        reply
            .await
            .map_err(|_| SluiceError::ClosedResource("coordinator"))?
    }

    /// Run `sql` and collect every row.
    pub async fn query_rows(&self, sql: impl Into<String>, args: Vec<Value>) -> Result<Vec<Vec<Value>>, SluiceError> {
        let rows = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&rows);
        self.query(sql, args, move |_, _, row| {
            sink.lock()
                .map_err(|_| SluiceError::Internal("row buffer poisoned".into()))?
                .push(row.to_vec());
            Ok(())
        })
        .await?;
        let mut rows = rows
            .lock()
            .map_err(|_| SluiceError::Internal("row buffer poisoned".into()))?;
        Ok(std::mem::take(&mut *rows))
    }

    /// Execute `sql` as an action and wait for its outcome.
    pub async fn action(&self, sql: impl Into<String>, args: Vec<Value>) -> Result<ExecOutcome, SluiceError> {
        let (tx, rx) = oneshot::channel();
        let action = Action::new(sql, args, move |result| {
            let _ = tx.send(result);
        });
        self.submit_action(action).await?;
        rx.await
            .map_err(|_| SluiceError::ClosedResource("coordinator"))?
    }
}
