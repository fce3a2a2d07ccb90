//! # Invoice Repository
//!
//! ## Invoice Flags
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  paid and annulled are independent flags, each flipped at most once:    │
//! │                                                                         │
//! │    mark_paid()      UPDATE ... SET paid = 1 ...     WHERE paid = 0      │
//! │    mark_annulled()  UPDATE ... SET annulled = 1 ... WHERE annulled = 0  │
//! │                                                                         │
//! │  Totals and lines are never updated after insert.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::hydrate;
use crate::repository::lines::{fetch_lines, insert_lines, LineTable};
use docflow_core::{DocumentTotals, Hydrated, Invoice, LineItem, PaymentMethod};

const INVOICE_SELECT: &str = r#"
    SELECT id, number, client_id, salesperson_id, created_at, order_id,
           subtotal_cents, discount_cents, tax_cents, total_cents,
           annulled, annulment_reason, annulled_at,
           paid, payment_method, paid_at
    FROM facturas
"#;

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: String,
    number: String,
    client_id: String,
    salesperson_id: String,
    created_at: DateTime<Utc>,
    order_id: Option<String>,
    #[sqlx(flatten)]
    totals: DocumentTotals,
    annulled: bool,
    annulment_reason: Option<String>,
    annulled_at: Option<DateTime<Utc>>,
    paid: bool,
    payment_method: Option<PaymentMethod>,
    paid_at: Option<DateTime<Utc>>,
}

impl InvoiceRow {
    fn into_invoice(self, lines: Vec<LineItem>) -> Invoice {
        Invoice {
            id: self.id,
            number: self.number,
            client_id: self.client_id,
            salesperson_id: self.salesperson_id,
            created_at: self.created_at,
            order_id: self.order_id,
            lines,
            totals: self.totals,
            annulled: self.annulled,
            annulment_reason: self.annulment_reason,
            annulled_at: self.annulled_at,
            paid: self.paid,
            payment_method: self.payment_method,
            paid_at: self.paid_at,
        }
    }
}

/// Repository for invoices.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Inserts header and lines on the caller's transaction.
    pub async fn insert(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
        debug!(id = %invoice.id, number = %invoice.number, "Inserting invoice");

        sqlx::query(
            r#"
            INSERT INTO facturas (
                id, number, client_id, salesperson_id, created_at, order_id,
                subtotal_cents, discount_cents, tax_cents, total_cents,
                annulled, annulment_reason, annulled_at,
                paid, payment_method, paid_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.number)
        .bind(&invoice.client_id)
        .bind(&invoice.salesperson_id)
        .bind(invoice.created_at)
        .bind(&invoice.order_id)
        .bind(invoice.totals.subtotal_cents)
        .bind(invoice.totals.discount_cents)
        .bind(invoice.totals.tax_cents)
        .bind(invoice.totals.total_cents)
        .bind(invoice.annulled)
        .bind(&invoice.annulment_reason)
        .bind(invoice.annulled_at)
        .bind(invoice.paid)
        .bind(invoice.payment_method)
        .bind(invoice.paid_at)
        .execute(&mut *conn)
        .await?;

        insert_lines(conn, LineTable::Invoice, &invoice.id, &invoice.lines).await
    }

    /// Saves an invoice in its own transaction.
    pub async fn save(&self, invoice: &Invoice) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert(&mut tx, invoice).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Marks the invoice annulled.
    ///
    /// ## Returns
    /// `true` if this call performed the transition.
    pub async fn mark_annulled(
        conn: &mut SqliteConnection,
        id: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE facturas
            SET annulled = 1, annulment_reason = ?2, annulled_at = ?3
            WHERE id = ?1 AND annulled = 0
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(at)
        .execute(&mut *conn)
        .await?;

        debug!(id = %id, won = result.rows_affected() == 1, "Annulment update");
        Ok(result.rows_affected() == 1)
    }

    /// Marks the invoice paid by `method`.
    ///
    /// ## Returns
    /// `true` if this call performed the transition.
    pub async fn mark_paid(
        conn: &mut SqliteConnection,
        id: &str,
        method: PaymentMethod,
        at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE facturas
            SET paid = 1, payment_method = ?2, paid_at = ?3
            WHERE id = ?1 AND paid = 0
            "#,
        )
        .bind(id)
        .bind(method)
        .bind(at)
        .execute(&mut *conn)
        .await?;

        debug!(id = %id, ?method, won = result.rows_affected() == 1, "Payment update");
        Ok(result.rows_affected() == 1)
    }

    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("{INVOICE_SELECT} WHERE id = ?1");
        Self::fetch_one_where(conn, &sql, id).await
    }

    async fn fetch_one_where(
        conn: &mut SqliteConnection,
        sql: &str,
        key: &str,
    ) -> DbResult<Option<Invoice>> {
        let row: Option<InvoiceRow> = sqlx::query_as(sql)
            .bind(key)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let lines = fetch_lines(conn, LineTable::Invoice, &row.id).await?;
                Ok(Some(row.into_invoice(lines)))
            }
            None => Ok(None),
        }
    }

    async fn with_lines(conn: &mut SqliteConnection, rows: Vec<InvoiceRow>) -> DbResult<Vec<Invoice>> {
        let mut invoices = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = fetch_lines(conn, LineTable::Invoice, &row.id).await?;
            invoices.push(row.into_invoice(lines));
        }
        Ok(invoices)
    }

    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    pub async fn find_by_number(&self, number: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{INVOICE_SELECT} WHERE number = ?1");
        Self::fetch_one_where(&mut conn, &sql, number).await
    }

    /// The invoice created from an order, if any.
    pub async fn find_by_order(&self, order_id: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{INVOICE_SELECT} WHERE order_id = ?1");
        Self::fetch_one_where(&mut conn, &sql, order_id).await
    }

    /// Lists a client's invoices, newest first.
    pub async fn find_by_client(&self, client_id: &str) -> DbResult<Vec<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        let sql =
            format!("{INVOICE_SELECT} WHERE client_id = ?1 ORDER BY created_at DESC, number DESC");
        let rows: Vec<InvoiceRow> = sqlx::query_as(&sql)
            .bind(client_id)
            .fetch_all(&mut *conn)
            .await?;

        Self::with_lines(&mut conn, rows).await
    }

    /// Invoices created in `[from, to)`, optionally for one salesperson.
    ///
    /// Ordered by creation time, then number.
    pub async fn find_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        salesperson_id: Option<&str>,
    ) -> DbResult<Vec<Invoice>> {
        debug!(%from, %to, ?salesperson_id, "Listing invoices in range");

        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            r#"
            {INVOICE_SELECT}
            WHERE created_at >= ?1 AND created_at < ?2
              AND (?3 IS NULL OR salesperson_id = ?3)
            ORDER BY created_at, number
            "#
        );
        let rows: Vec<InvoiceRow> = sqlx::query_as(&sql)
            .bind(from)
            .bind(to)
            .bind(salesperson_id)
            .fetch_all(&mut *conn)
            .await?;

        Self::with_lines(&mut conn, rows).await
    }

    pub async fn hydrated(&self, id: &str) -> DbResult<Option<Hydrated<Invoice>>> {
        let mut conn = self.pool.acquire().await?;
        match Self::fetch(&mut conn, id).await? {
            Some(invoice) => Ok(Some(hydrate(&mut conn, invoice).await?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_product, seeded_db};

    #[tokio::test]
    async fn test_paid_and_annulled_flip_once() {
        let db = seeded_db().await;
        let item = seed_product(&db, "PAPEL-A4", 10).await;

        let invoice = Invoice {
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
        };
        db.invoices().save(&invoice).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();
        assert!(InvoiceRepository::mark_paid(&mut conn, "i-1", PaymentMethod::Cash, now)
            .await
            .unwrap());
        assert!(!InvoiceRepository::mark_paid(&mut conn, "i-1", PaymentMethod::Transfer, now)
            .await
            .unwrap());
        assert!(InvoiceRepository::mark_annulled(&mut conn, "i-1", "duplicate", now)
            .await
            .unwrap());
        assert!(!InvoiceRepository::mark_annulled(&mut conn, "i-1", "again", now)
            .await
            .unwrap());
        drop(conn);

        let stored = db
            .invoices()
            .find_by_number("FACT-20240315-0001")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.paid);
        assert!(stored.annulled);
        assert_eq!(stored.payment_method, Some(PaymentMethod::Cash));
        assert_eq!(stored.annulment_reason.as_deref(), Some("duplicate"));
        assert_eq!(db.invoices().find_by_client("0912345678").await.unwrap().len(), 1);
    }
}
