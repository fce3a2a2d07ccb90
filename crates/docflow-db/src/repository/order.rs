//! # Order Repository
//!
//! Orders are created by converting a quotation and become invoiced exactly
//! once. `claim_for_invoicing` is the guard that makes the second attempt
//! lose, even when two requests race.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::hydrate;
use crate::repository::lines::{fetch_lines, insert_lines, LineTable};
use docflow_core::{DocumentTotals, Hydrated, LineItem, Order};

const ORDER_SELECT: &str = r#"
    SELECT id, number, client_id, salesperson_id, created_at, quotation_id,
           subtotal_cents, discount_cents, tax_cents, total_cents,
           invoiced, invoice_id
    FROM ordenes
"#;

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    number: String,
    client_id: String,
    salesperson_id: String,
    created_at: DateTime<Utc>,
    quotation_id: Option<String>,
    #[sqlx(flatten)]
    totals: DocumentTotals,
    invoiced: bool,
    invoice_id: Option<String>,
}

impl OrderRow {
    fn into_order(self, lines: Vec<LineItem>) -> Order {
        Order {
            id: self.id,
            number: self.number,
            client_id: self.client_id,
            salesperson_id: self.salesperson_id,
            created_at: self.created_at,
            quotation_id: self.quotation_id,
            lines,
            totals: self.totals,
            invoiced: self.invoiced,
            invoice_id: self.invoice_id,
        }
    }
}

/// Repository for orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts header and lines on the caller's transaction.
    pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, number = %order.number, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO ordenes (
                id, number, client_id, salesperson_id, created_at, quotation_id,
                subtotal_cents, discount_cents, tax_cents, total_cents,
                invoiced, invoice_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&order.id)
        .bind(&order.number)
        .bind(&order.client_id)
        .bind(&order.salesperson_id)
        .bind(order.created_at)
        .bind(&order.quotation_id)
        .bind(order.totals.subtotal_cents)
        .bind(order.totals.discount_cents)
        .bind(order.totals.tax_cents)
        .bind(order.totals.total_cents)
        .bind(order.invoiced)
        .bind(&order.invoice_id)
        .execute(&mut *conn)
        .await?;

        insert_lines(conn, LineTable::Order, &order.id, &order.lines).await
    }

    /// Saves an order in its own transaction.
    pub async fn save(&self, order: &Order) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Flips `invoiced` false → true.
    ///
    /// ## Returns
    /// `true` if this call won the claim.
    pub async fn claim_for_invoicing(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let result = sqlx::query("UPDATE ordenes SET invoiced = 1 WHERE id = ?1 AND invoiced = 0")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        debug!(id = %id, won = result.rows_affected() == 1, "Claimed order for invoicing");
        Ok(result.rows_affected() == 1)
    }

    /// Links the claimed order to the invoice created from it.
    pub async fn set_invoice(conn: &mut SqliteConnection, id: &str, invoice_id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE ordenes SET invoice_id = ?2 WHERE id = ?1 AND invoiced = 1")
            .bind(id)
            .bind(invoice_id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order (invoiced)", id));
        }

        Ok(())
    }

    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("{ORDER_SELECT} WHERE id = ?1");
        Self::fetch_one_where(conn, &sql, id).await
    }

    async fn fetch_one_where(
        conn: &mut SqliteConnection,
        sql: &str,
        key: &str,
    ) -> DbResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(sql)
            .bind(key)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let lines = fetch_lines(conn, LineTable::Order, &row.id).await?;
                Ok(Some(row.into_order(lines)))
            }
            None => Ok(None),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    pub async fn find_by_number(&self, number: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{ORDER_SELECT} WHERE number = ?1");
        Self::fetch_one_where(&mut conn, &sql, number).await
    }

    /// The order created from a quotation, if any.
    pub async fn find_by_quotation(&self, quotation_id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{ORDER_SELECT} WHERE quotation_id = ?1");
        Self::fetch_one_where(&mut conn, &sql, quotation_id).await
    }

    /// Lists a client's orders, newest first.
    pub async fn find_by_client(&self, client_id: &str) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{ORDER_SELECT} WHERE client_id = ?1 ORDER BY created_at DESC, number DESC");
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(client_id)
            .fetch_all(&mut *conn)
            .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = fetch_lines(&mut conn, LineTable::Order, &row.id).await?;
            orders.push(row.into_order(lines));
        }
        Ok(orders)
    }

    /// Orders not yet invoiced, oldest first.
    pub async fn list_pending(&self) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{ORDER_SELECT} WHERE invoiced = 0 ORDER BY created_at, number");
        let rows: Vec<OrderRow> = sqlx::query_as(&sql).fetch_all(&mut *conn).await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = fetch_lines(&mut conn, LineTable::Order, &row.id).await?;
            orders.push(row.into_order(lines));
        }
        Ok(orders)
    }

    pub async fn hydrated(&self, id: &str) -> DbResult<Option<Hydrated<Order>>> {
        let mut conn = self.pool.acquire().await?;
        match Self::fetch(&mut conn, id).await? {
            Some(order) => Ok(Some(hydrate(&mut conn, order).await?)),
            None => Ok(None),
        }
    }
}
