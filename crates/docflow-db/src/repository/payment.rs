//! # Payment Repository
//!
//! ## Payment States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CASH / approved CARD ──insert──► approved                              │
//! │  declined CARD        ──insert──► declined   (kept for audit)           │
//! │  TRANSFER / CHECK     ──insert──► pending                               │
//! │                                      │                                  │
//! │                 settle(.., Approved) ├──► approved                      │
//! │                 settle(.., Rejected) └──► rejected                      │
//! │                                                                         │
//! │  settle() only touches rows still in 'pending'.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use docflow_core::{Payment, PaymentStatus};

const PAYMENT_SELECT: &str = r#"
    SELECT id, invoice_id, amount_cents, method, reference, approved, status,
           observations, tendered_cents, change_cents, bank, card_last_four,
           created_at, settled_at
    FROM pagos
"#;

/// Repository for payment attempts.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Records a payment attempt on the caller's transaction.
    pub async fn insert(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
        debug!(
            id = %payment.id,
            invoice_id = %payment.invoice_id,
            amount = payment.amount_cents,
            method = ?payment.method,
            status = ?payment.status,
            "Recording payment"
        );

        sqlx::query(
            r#"
            INSERT INTO pagos (
                id, invoice_id, amount_cents, method, reference, approved, status,
                observations, tendered_cents, change_cents, bank, card_last_four,
                created_at, settled_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.invoice_id)
        .bind(payment.amount_cents)
        .bind(payment.method)
        .bind(&payment.reference)
        .bind(payment.approved)
        .bind(payment.status)
        .bind(&payment.observations)
        .bind(payment.tendered_cents)
        .bind(payment.change_cents)
        .bind(&payment.bank)
        .bind(&payment.card_last_four)
        .bind(payment.created_at)
        .bind(payment.settled_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Moves a pending payment to `Approved` or `Rejected`.
    ///
    /// ## Returns
    /// `true` if the payment was still pending and is now settled.
    pub async fn settle(
        conn: &mut SqliteConnection,
        id: &str,
        status: PaymentStatus,
        observations: Option<&str>,
        at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let approved = status == PaymentStatus::Approved;

        let result = sqlx::query(
            r#"
            UPDATE pagos
            SET status = ?2,
                approved = ?3,
                observations = COALESCE(?4, observations),
                settled_at = ?5
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(approved)
        .bind(observations)
        .bind(at)
        .execute(&mut *conn)
        .await?;

        debug!(id = %id, ?status, won = result.rows_affected() == 1, "Settling payment");
        Ok(result.rows_affected() == 1)
    }

    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Payment>> {
        let sql = format!("{PAYMENT_SELECT} WHERE id = ?1");
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(payment)
    }

    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    /// All attempts against an invoice, oldest first.
    pub async fn find_by_invoice(&self, invoice_id: &str) -> DbResult<Vec<Payment>> {
        let sql = format!("{PAYMENT_SELECT} WHERE invoice_id = ?1 ORDER BY created_at, id");
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(invoice_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(payments)
    }

    /// Payments waiting for manual approval, oldest first.
    pub async fn list_pending(&self) -> DbResult<Vec<Payment>> {
        let sql = format!("{PAYMENT_SELECT} WHERE status = 'pending' ORDER BY created_at, id");
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(payments)
    }

    /// Number of approved payments for an invoice.
    pub async fn count_approved(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pagos WHERE invoice_id = ?1 AND status = 'approved'",
        )
        .bind(invoice_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_product, seeded_db};
    use docflow_core::{DocumentTotals, Invoice, LineItem, PaymentMethod};

    fn transfer(id: &str) -> Payment {
        Payment {
            id: id.to_string(),
            invoice_id: "i-1".to_string(),
            amount_cents: 1102,
            method: PaymentMethod::Transfer,
            reference: Some(format!("TRX-{id}")),
            approved: false,
            status: PaymentStatus::Pending,
            observations: None,
            tendered_cents: None,
            change_cents: None,
            bank: Some("Banco Pichincha".to_string()),
            card_last_four: None,
            created_at: Utc::now(),
            settled_at: None,
        }
    }

    #[tokio::test]
    async fn test_settle_only_from_pending() {
        let db = seeded_db().await;
        let item = seed_product(&db, "PAPEL-A4", 10).await;
        db.invoices()
            .save(&Invoice {
                id: "i-1".to_string(),
                number: "FACT-20240315-0001".to_string(),
                client_id: "0912345678".to_string(),
                salesperson_id: "u-1".to_string(),
                created_at: Utc::now(),
                order_id: None,
                lines: vec![LineItem::snapshot(1, &item, 1)],
                totals: DocumentTotals {
                    subtotal_cents: 1000,
                    discount_cents: 50,
                    tax_cents: 152,
                    total_cents: 1102,
                },
                annulled: false,
                annulment_reason: None,
                annulled_at: None,
                paid: false,
                payment_method: None,
                paid_at: None,
            })
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        PaymentRepository::insert(&mut conn, &transfer("p-1")).await.unwrap();
        PaymentRepository::insert(&mut conn, &transfer("p-2")).await.unwrap();

        let now = Utc::now();
        assert!(PaymentRepository::settle(&mut conn, "p-1", PaymentStatus::Approved, None, now)
            .await
            .unwrap());
        assert!(!PaymentRepository::settle(
            &mut conn,
            "p-1",
            PaymentStatus::Rejected,
            Some("late"),
            now
        )
        .await
        .unwrap());
        assert!(PaymentRepository::settle(
            &mut conn,
            "p-2",
            PaymentStatus::Rejected,
            Some("bounced"),
            now
        )
        .await
        .unwrap());
        assert_eq!(PaymentRepository::count_approved(&mut conn, "i-1").await.unwrap(), 1);

        let rejected = PaymentRepository::fetch(&mut conn, "p-2").await.unwrap().unwrap();
        drop(conn);
        assert_eq!(rejected.status, PaymentStatus::Rejected);
        assert!(!rejected.approved);
        assert_eq!(rejected.observations.as_deref(), Some("bounced"));

        let approved = db.payments().find_by_id("p-1").await.unwrap().unwrap();
        assert!(approved.approved);
        assert!(approved.settled_at.is_some());
        assert!(db.payments().list_pending().await.unwrap().is_empty());
        assert_eq!(db.payments().find_by_invoice("i-1").await.unwrap().len(), 2);
    }
}
