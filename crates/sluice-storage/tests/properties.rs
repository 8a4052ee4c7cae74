// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Behavioral tests for the coordinator and bulk insert pipeline.
//!
//! Each test opens its own database. Tests that need a separate reader and
//! writer use a WAL file database in a temp directory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sluice_storage::coordinator::{self, Action};
use sluice_storage::{Database, DatabaseOptions, Inserter, SluiceError, SqlFunction, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(30);

async fn file_db(dir: &tempfile::TempDir, schema: &str) -> Database {
    Database::open(
        dir.path().join("props.db"),
        DatabaseOptions::default().with_schema(schema),
    )
    .await
    .unwrap()
}

// ---- Test 1: Actions never overlap ----

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_actions_are_serialized() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let track = {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        SqlFunction::new("track", 1, move |args| {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(args[0].clone())
        })
    };
    // A file database, so reads and writes run on separate connections.
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(
        dir.path().join("props.db"),
        DatabaseOptions::default()
            .with_schema("CREATE TABLE log (n INTEGER);")
            .with_function(track),
    )
    .await
    .unwrap();
    let (handle, _task) = coordinator::spawn(db, 8, 8);

    let completed = Arc::new(Mutex::new(Vec::new()));
    let callback_count = Arc::new(AtomicUsize::new(0));
    let callback_peak = Arc::new(AtomicUsize::new(0));
    let (done_tx, mut done_rx) = mpsc::channel(64);
    let mut producers = Vec::new();
    for n in 0..50i64 {
        let handle = handle.clone();
        let completed = Arc::clone(&completed);
        let callbacks_in_flight = Arc::clone(&callback_count);
        let callbacks_peak = Arc::clone(&callback_peak);
        let done = done_tx.clone();
        producers.push(tokio::spawn(async move {
            let action = Action::new("INSERT INTO log VALUES (track(?1))", vec![n.into()], move |result| {
                let now = callbacks_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                callbacks_peak.fetch_max(now, Ordering::SeqCst);
                result.unwrap();
                completed.lock().unwrap().push(n);
                std::thread::sleep(Duration::from_millis(1));
                callbacks_in_flight.fetch_sub(1, Ordering::SeqCst);
                let _ = done.try_send(());
            });
            handle.submit_action(action).await.unwrap();
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }
    for _ in 0..50 {
        timeout(WAIT, done_rx.recv()).await.unwrap().unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1, "two actions overlapped");
    assert_eq!(callback_peak.load(Ordering::SeqCst), 1, "two completions overlapped");

    // Callback order is the execution order.
    let rows = handle
        .query_rows("SELECT n FROM log ORDER BY rowid", vec![])
        .await
        .unwrap();
    let stored: Vec<i64> = rows
        .iter()
        .map(|r| match r[0] {
            Value::Integer(n) => n,
            ref other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(stored, *completed.lock().unwrap());
}

// ---- Test 2: Bulk insert fails fast ----

#[tokio::test]
async fn test_bulk_insert_reports_first_failure_once() {
    let db = Database::open_in_memory(
        DatabaseOptions::default().with_schema("CREATE TABLE u (v INTEGER UNIQUE);"),
    )
    .await
    .unwrap();

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let inserter = Inserter::new(
        &db,
        8,
        move |e| sink.lock().unwrap().push(e),
        "INSERT INTO u VALUES (?1)",
    )
    .await
    .unwrap();
    // The third row repeats the first.
    for v in [1i64, 2, 1, 3, 4] {
        inserter.insert(vec![v.into()]).await.unwrap();
    }
    timeout(WAIT, inserter.close()).await.unwrap().unwrap();

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], SluiceError::Transaction { stage: "exec", .. }));
    drop(errors);

    let count: i64 = db
        .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM u", [], |r| r.get(0))?))
        .await
        .unwrap();
    assert_eq!(count, 0, "failed session must roll back");
}

// ---- Test 3: Partial consumption ----

#[tokio::test]
async fn test_stream_stops_at_callback_error() {
    let db = Database::open_in_memory(
        DatabaseOptions::default().with_schema(
            "CREATE TABLE ten (n INTEGER);
             WITH RECURSIVE seq(n) AS (SELECT 0 UNION ALL SELECT n + 1 FROM seq WHERE n < 9)
             INSERT INTO ten SELECT n FROM seq;",
        ),
    )
    .await
    .unwrap();
    let (handle, _task) = coordinator::spawn(db, 1, 1);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let err = handle
        .query("SELECT n FROM ten ORDER BY n", vec![], move |_, index, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            if index == 1 {
                return Err(SluiceError::Internal("took two".into()));
            }
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SluiceError::Internal(ref m) if m == "took two"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ---- Test 4: Bulk insert then read back ----

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bulk_insert_round_trip_through_coordinator() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(&dir, "CREATE TABLE grid (w INTEGER, c INTEGER);").await;

    let inserter = Inserter::new(&db, 16, |e| panic!("bulk insert failed: {e}"), "INSERT INTO grid VALUES (?1, ?2)")
        .await
        .unwrap();
    let mut producers = Vec::new();
    for w in 0..4i64 {
        let producer = inserter.producer();
        producers.push(tokio::spawn(async move {
            for c in 0..1000i64 {
                producer.insert(vec![w.into(), c.into()]).await.unwrap();
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }
    timeout(WAIT, inserter.close()).await.unwrap().unwrap();

    let (handle, _task) = coordinator::spawn(db.clone(), 4, 4);
    let rows = handle.query_rows("SELECT count(*) FROM grid", vec![]).await.unwrap();
    assert_eq!(rows, vec![vec![Value::Integer(4000)]]);

    let per_writer = handle
        .query_rows("SELECT w, count(DISTINCT c) FROM grid GROUP BY w ORDER BY w", vec![])
        .await
        .unwrap();
    assert_eq!(per_writer.len(), 4);
    assert!(per_writer.iter().all(|r| r[1] == Value::Integer(1000)));
    db.close().await.unwrap();
}

// ---- Test 5: Reads and writes do not wait on each other ----

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_query_does_not_block_actions() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(
        &dir,
        "CREATE TABLE src (n INTEGER); INSERT INTO src VALUES (1), (2), (3);
         CREATE TABLE dst (n INTEGER);",
    )
    .await;
    let (handle, _task) = coordinator::spawn(db.clone(), 4, 128);

    // The query holds the reader until every action has completed.
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let query = {
        let handle = handle.clone();
        tokio::spawn(async move {
            handle
                .query("SELECT n FROM src", vec![], move |_, index, _| {
                    if index == 0 {
                        release_rx
                            .recv_timeout(WAIT)
                            .map_err(|_| SluiceError::Internal("actions never finished".into()))?;
                    }
                    Ok(())
                })
                .await
        })
    };

    for n in 0..100i64 {
        let outcome = timeout(WAIT, handle.action("INSERT INTO dst VALUES (?1)", vec![n.into()]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.rows_affected, 1);
    }
    assert!(!query.is_finished(), "query finished before it was released");
    release_tx.send(()).unwrap();

    timeout(WAIT, query).await.unwrap().unwrap().unwrap();
    let rows = handle.query_rows("SELECT count(*) FROM dst", vec![]).await.unwrap();
    assert_eq!(rows, vec![vec![Value::Integer(100)]]);
    db.close().await.unwrap();
}

// ---- Test 6: Closed connections ----

#[tokio::test]
async fn test_closed_connection_is_reported_not_hung() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(&dir, "CREATE TABLE t (n INTEGER);").await;
    let (handle, _task) = coordinator::spawn(db.clone(), 1, 1);
    db.close().await.unwrap();

    let err = timeout(WAIT, handle.query("SELECT n FROM t", vec![], |_, _, _| Ok(())))
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, SluiceError::ClosedResource(_)));

    let err = timeout(WAIT, handle.action("INSERT INTO t VALUES (1)", vec![]))
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, SluiceError::ClosedResource(_)));
}

#[tokio::test]
async fn test_stopped_coordinator_is_closed_resource() {
    let db = Database::open_in_memory(DatabaseOptions::default()).await.unwrap();
    let (handle, task) = coordinator::spawn(db, 1, 1);
    task.abort();
    let _ = task.await;

    let err = handle.action("SELECT 1", vec![]).await.unwrap_err();
    assert!(matches!(err, SluiceError::ClosedResource("coordinator")));
}
