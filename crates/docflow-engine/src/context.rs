//! # Workflow Context and Alert Worker
//!
//! Per-call context and the background worker that delivers low-stock alerts.
//!
//! ## Alert Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Low-Stock Alert Flow                             │
//! │                                                                         │
//! │  convert_order_to_invoice                                              │
//! │       │  COMMIT                                                         │
//! │       ▼                                                                 │
//! │  AlertHandle::request_scan ──► unbounded mpsc ──► alert worker         │
//! │  (never blocks, never fails                          │                  │
//! │   the caller)                                        ▼                  │
//! │                                          low_stock_scan(threshold)     │
//! │                                          empty → nothing sent          │
//! │                                                      │                  │
//! │                                                      ▼                  │
//! │                                          AlertSink::deliver             │
//! │                                          error → warn! and move on     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The scan runs on the worker, so it reflects stock when the worker gets
//! to it rather than at the instant the invoice committed.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use docflow_core::{Actor, InventoryItem};
use docflow_db::InventoryLedger;

// =============================================================================
// Alert Payload
// =============================================================================

/// One product below the threshold at scan time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockItem {
    pub product_code: String,
    pub description: String,
    pub stock: i64,
}

impl From<&InventoryItem> for LowStockItem {
    fn from(item: &InventoryItem) -> Self {
        LowStockItem {
            product_code: item.code.clone(),
            description: item.description.clone(),
            stock: item.stock,
        }
    }
}

/// Result of the scan that follows an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    /// Invoice whose stock deduction triggered the scan.
    pub invoice_number: String,
    pub threshold: i64,
    pub items: Vec<LowStockItem>,
}

// =============================================================================
// Alert Sink
// =============================================================================

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Alert delivery failed: {0}")]
    Delivery(String),
}

/// Notification channel for low-stock alerts (e-mail, chat, ...).
///
/// Delivery is best-effort: errors are logged by the worker and dropped.
pub trait AlertSink: Send + Sync + 'static {
    fn deliver(&self, alert: &LowStockAlert) -> impl Future<Output = Result<(), AlertError>> + Send;
}

/// Default sink: writes the alert to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    async fn deliver(&self, alert: &LowStockAlert) -> Result<(), AlertError> {
        for item in &alert.items {
            warn!(
                invoice = %alert.invoice_number,
                code = %item.product_code,
                stock = item.stock,
                threshold = alert.threshold,
                "Low stock"
            );
        }
        Ok(())
    }
}

// =============================================================================
// Alert Handle + Worker
// =============================================================================

/// Scan requested after an invoice commits.
#[derive(Debug)]
struct LowStockCheck {
    invoice_number: String,
    threshold: i64,
}

/// Sending side of the alert channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AlertHandle {
    tx: Option<mpsc::UnboundedSender<LowStockCheck>>,
}

impl AlertHandle {
    /// A handle that discards every request.
    pub fn disabled() -> Self {
        AlertHandle { tx: None }
    }

    /// Queues a low-stock scan for the worker. Never blocks and never fails.
    pub fn request_scan(&self, invoice_number: &str, threshold: i64) {
        let Some(tx) = &self.tx else {
            debug!(invoice = %invoice_number, "Alerts disabled, skipping low-stock scan");
            return;
        };

        let check = LowStockCheck {
            invoice_number: invoice_number.to_string(),
            threshold,
        };
        if tx.send(check).is_err() {
            warn!(invoice = %invoice_number, "Alert worker stopped, low-stock scan dropped");
        }
    }
}

/// Spawns the alert worker on the current tokio runtime.
///
/// The worker scans `inventory` for each request and hands non-empty results
/// to `sink`. It runs until every [`AlertHandle`] clone is dropped.
pub fn spawn_alert_worker<S: AlertSink>(
    sink: S,
    inventory: InventoryLedger,
) -> (AlertHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<LowStockCheck>();

    let worker = tokio::spawn(async move {
        info!("Alert worker starting");

        while let Some(check) = rx.recv().await {
            let items = match inventory.low_stock_scan(check.threshold).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(error = %e, invoice = %check.invoice_number, "Low-stock scan failed");
                    continue;
                }
            };
            if items.is_empty() {
                continue;
            }

            let alert = LowStockAlert {
                invoice_number: check.invoice_number,
                threshold: check.threshold,
                items: items.iter().map(LowStockItem::from).collect(),
            };
            debug!(
                invoice = %alert.invoice_number,
                items = alert.items.len(),
                "Delivering low-stock alert"
            );
            if let Err(e) = sink.deliver(&alert).await {
                warn!(error = %e, invoice = %alert.invoice_number, "Low-stock alert not delivered");
            }
        }

        info!("Alert worker stopped");
    });

    (AlertHandle { tx: Some(tx) }, worker)
}

// =============================================================================
// Workflow Context
// =============================================================================

/// Who is acting, and where side-channel notifications go.
///
/// Passed into every workflow and payment call.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub actor: Actor,
    pub alerts: AlertHandle,
}

impl WorkflowContext {
    pub fn new(actor: Actor, alerts: AlertHandle) -> Self {
        WorkflowContext { actor, alerts }
    }

    /// Context for maintenance jobs: system actor, alerts discarded.
    pub fn system() -> Self {
        WorkflowContext::new(Actor::system(), AlertHandle::disabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;
    use docflow_core::ProductVariant;
    use docflow_db::{Database, DbConfig};

    struct ForwardingSink(mpsc::UnboundedSender<LowStockAlert>);

    impl AlertSink for ForwardingSink {
        async fn deliver(&self, alert: &LowStockAlert) -> Result<(), AlertError> {
            self.0
                .send(alert.clone())
                .map_err(|e| AlertError::Delivery(e.to_string()))
        }
    }

    struct FailingSink;

    impl AlertSink for FailingSink {
        async fn deliver(&self, _alert: &LowStockAlert) -> Result<(), AlertError> {
            Err(AlertError::Delivery("smtp unreachable".into()))
        }
    }

    async fn stocked(items: &[(&str, i64)]) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        for (code, stock) in items {
            db.products()
                .insert(&InventoryItem {
                    code: code.to_string(),
                    description: format!("{code} pen"),
                    unit_price_cents: 150,
                    stock: *stock,
                    serial_number: None,
                    is_active: true,
                    variant: ProductVariant::OfficeSupply {
                        brand: None,
                        pack_size: Some(12),
                    },
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
        }
        db
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<LowStockAlert>) -> LowStockAlert {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_worker_scans_and_delivers_in_order() {
        let db = stocked(&[("P1", 2), ("P2", 40)]).await;
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (handle, worker) = spawn_alert_worker(ForwardingSink(out_tx), db.inventory());

        handle.request_scan("FACT-20240315-0001", 5);
        handle.request_scan("FACT-20240315-0002", 5);

        let first = next(&mut out_rx).await;
        let second = next(&mut out_rx).await;
        assert_eq!(first.invoice_number, "FACT-20240315-0001");
        assert_eq!(second.invoice_number, "FACT-20240315-0002");
        assert_eq!(
            first.items,
            vec![LowStockItem {
                product_code: "P1".into(),
                description: "P1 pen".into(),
                stock: 2,
            }]
        );

        drop(handle);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_nothing_below_threshold_sends_nothing() {
        let db = stocked(&[("P1", 40)]).await;
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (handle, worker) = spawn_alert_worker(ForwardingSink(out_tx), db.inventory());

        handle.request_scan("FACT-20240315-0001", 5);
        drop(handle);
        worker.await.unwrap();

        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_scan_waits_on_the_worker_not_the_caller() {
        let db = stocked(&[("P1", 1)]).await;
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (handle, worker) = spawn_alert_worker(ForwardingSink(out_tx), db.inventory());

        // The in-memory pool has one connection; while it is held the scan
        // cannot run, yet queuing returns at once.
        let held = db.pool().acquire().await.unwrap();
        handle.request_scan("FACT-20240315-0001", 5);
        assert!(
            tokio::time::timeout(Duration::from_millis(200), out_rx.recv())
                .await
                .is_err()
        );

        drop(held);
        assert_eq!(next(&mut out_rx).await.items[0].stock, 1);

        drop(handle);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_failing_sink_keeps_worker_alive() {
        let db = stocked(&[("P1", 2)]).await;
        let (handle, worker) = spawn_alert_worker(FailingSink, db.inventory());

        handle.request_scan("FACT-20240315-0001", 5);
        handle.request_scan("FACT-20240315-0002", 5);

        drop(handle);
        tokio::time::timeout(Duration::from_secs(2), worker)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_disabled_handle_drops_silently() {
        AlertHandle::disabled().request_scan("FACT-20240315-0001", 5);
    }
}
