//! Conversions racing on a file-backed pool with several connections.
//!
//! The in-memory harness has a single connection, so its "concurrent" calls
//! take turns at the pool. Here every racer holds its own connection and
//! SQLite's write lock is what decides the winner.

mod common;

use std::sync::Arc;

use tokio::sync::Barrier;
use tokio::task::JoinHandle;

use docflow_core::SequenceNumber;
use docflow_db::DbConfig;
use docflow_engine::{AlertHandle, ConflictReason, EngineConfig, WorkflowError};

use common::*;

const RACERS: usize = 8;

async fn file_harness(dir: &tempfile::TempDir) -> Arc<Harness> {
    let db_config = DbConfig::new(dir.path().join("docflow.db")).max_connections(RACERS as u32);
    Arc::new(harness_on(db_config, EngineConfig::default(), AlertHandle::disabled()).await)
}

/// Lock contention that outlasted the busy timeout; the caller may retry.
fn is_lock_contention<T>(result: &Result<T, WorkflowError>) -> bool {
    matches!(result, Err(e @ WorkflowError::Persistence(_)) if e.is_retryable())
}

async fn join_all<T>(tasks: Vec<JoinHandle<T>>) -> Vec<T> {
    let mut out = Vec::with_capacity(tasks.len());
    for task in tasks {
        out.push(task.await.unwrap());
    }
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_unit_is_invoiced_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let h = file_harness(&dir).await;
    add_product(&h.db, "TONER-85A", 4500, RACERS as i64).await;

    let mut order_ids = Vec::new();
    for _ in 0..RACERS {
        order_ids.push(order_for(&h, &[("TONER-85A", 1)]).await.id);
    }
    h.db.inventory()
        .adjust_stock("TONER-85A", 1 - RACERS as i64, "cycle count")
        .await
        .unwrap();

    let start = Arc::new(Barrier::new(RACERS));
    let tasks = order_ids
        .iter()
        .cloned()
        .map(|order_id| {
            let h = h.clone();
            let start = start.clone();
            tokio::spawn(async move {
                start.wait().await;
                h.workflow.convert_order_to_invoice(&h.ctx, &order_id).await
            })
        })
        .collect();
    let outcomes = join_all(tasks).await;

    let winners: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "{outcomes:?}");
    for outcome in outcomes.iter().filter(|r| r.is_err()) {
        let out_of_stock = matches!(
            outcome,
            Err(WorkflowError::Conflict(ConflictReason::InsufficientStock {
                available: 0,
                requested: 1,
                ..
            }))
        );
        assert!(out_of_stock || is_lock_contention(outcome), "{outcome:?}");
    }

    assert_eq!(h.db.inventory().stock_of("TONER-85A").await.unwrap(), Some(0));
    assert_eq!(h.db.invoices().find_by_client(WHOLESALE_CLIENT).await.unwrap().len(), 1);
    // Losing transactions rolled their number back.
    let number: SequenceNumber = winners[0].number.parse().unwrap();
    assert_eq!(number.value, 1);

    let mut invoiced = 0;
    for id in &order_ids {
        if h.workflow.order(id).await.unwrap().document.invoiced {
            invoiced += 1;
        }
    }
    assert_eq!(invoiced, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_quotation_converts_once_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let h = file_harness(&dir).await;
    add_product(&h.db, "PAPEL-A4", 1000, 5).await;
    let quotation = quote(&h, &[("PAPEL-A4", 1)]).await;

    let start = Arc::new(Barrier::new(RACERS));
    let tasks = (0..RACERS)
        .map(|_| {
            let h = h.clone();
            let start = start.clone();
            let quotation_id = quotation.id.clone();
            tokio::spawn(async move {
                start.wait().await;
                h.workflow.convert_quotation_to_order(&h.ctx, &quotation_id).await
            })
        })
        .collect();
    let outcomes = join_all(tasks).await;

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1, "{outcomes:?}");
    for outcome in outcomes.iter().filter(|r| r.is_err()) {
        let converted = matches!(
            outcome,
            Err(WorkflowError::Conflict(ConflictReason::AlreadyConverted))
        );
        assert!(converted || is_lock_contention(outcome), "{outcome:?}");
    }

    let order = h
        .db
        .orders()
        .find_by_quotation(&quotation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.number.parse::<SequenceNumber>().unwrap().value, 1);
    assert_eq!(h.db.orders().find_by_client(WHOLESALE_CLIENT).await.unwrap().len(), 1);
    assert!(h.workflow.quotation(&quotation.id).await.unwrap().document.converted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_invoices_take_distinct_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let h = file_harness(&dir).await;
    add_product(&h.db, "PAPEL-A4", 1000, 100).await;

    let mut order_ids = Vec::new();
    for _ in 0..RACERS {
        order_ids.push(order_for(&h, &[("PAPEL-A4", 2)]).await.id);
    }

    let start = Arc::new(Barrier::new(RACERS));
    let tasks = order_ids
        .into_iter()
        .map(|order_id| {
            let h = h.clone();
            let start = start.clone();
            tokio::spawn(async move {
                start.wait().await;
                h.workflow.convert_order_to_invoice(&h.ctx, &order_id).await
            })
        })
        .collect();
    let outcomes = join_all(tasks).await;

    let mut values: Vec<i64> = outcomes
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|invoice| invoice.number.parse::<SequenceNumber>().unwrap().value)
        .collect();
    let committed = values.len();
    assert!(outcomes.iter().all(|r| r.is_ok() || is_lock_contention(r)), "{outcomes:?}");

    // Committed invoices hold 1..=n with no gaps or repeats.
    values.sort_unstable();
    assert_eq!(values, (1..=committed as i64).collect::<Vec<_>>());
    assert_eq!(
        h.db.inventory().stock_of("PAPEL-A4").await.unwrap(),
        Some(100 - 2 * committed as i64)
    );
}
