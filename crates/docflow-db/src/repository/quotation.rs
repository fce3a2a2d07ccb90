//! # Quotation Repository
//!
//! ## Quotation Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert()            ISSUED    converted = 0                            │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  mark_converted()    CONVERTED converted = 1   (terminal)               │
//! │     UPDATE ... SET converted = 1 WHERE id = ? AND converted = 0         │
//! │     rows_affected = 0 → someone else converted it first                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::hydrate;
use crate::repository::lines::{fetch_lines, insert_lines, LineTable};
use docflow_core::{DocumentTotals, Hydrated, LineItem, Quotation};

const QUOTATION_SELECT: &str = r#"
    SELECT id, number, client_id, salesperson_id, created_at,
           subtotal_cents, discount_cents, tax_cents, total_cents, converted
    FROM cotizaciones
"#;

#[derive(Debug, sqlx::FromRow)]
struct QuotationRow {
    id: String,
    number: String,
    client_id: String,
    salesperson_id: String,
    created_at: DateTime<Utc>,
    #[sqlx(flatten)]
    totals: DocumentTotals,
    converted: bool,
}

impl QuotationRow {
    fn into_quotation(self, lines: Vec<LineItem>) -> Quotation {
        Quotation {
            id: self.id,
            number: self.number,
            client_id: self.client_id,
            salesperson_id: self.salesperson_id,
            created_at: self.created_at,
            lines,
            totals: self.totals,
            converted: self.converted,
        }
    }
}

/// Repository for quotations.
#[derive(Debug, Clone)]
pub struct QuotationRepository {
    pool: SqlitePool,
}

impl QuotationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        QuotationRepository { pool }
    }

    /// Inserts header and lines on the caller's transaction.
    pub async fn insert(conn: &mut SqliteConnection, quotation: &Quotation) -> DbResult<()> {
        debug!(id = %quotation.id, number = %quotation.number, "Inserting quotation");

        sqlx::query(
            r#"
            INSERT INTO cotizaciones (
                id, number, client_id, salesperson_id, created_at,
                subtotal_cents, discount_cents, tax_cents, total_cents, converted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&quotation.id)
        .bind(&quotation.number)
        .bind(&quotation.client_id)
        .bind(&quotation.salesperson_id)
        .bind(quotation.created_at)
        .bind(quotation.totals.subtotal_cents)
        .bind(quotation.totals.discount_cents)
        .bind(quotation.totals.tax_cents)
        .bind(quotation.totals.total_cents)
        .bind(quotation.converted)
        .execute(&mut *conn)
        .await?;

        insert_lines(conn, LineTable::Quotation, &quotation.id, &quotation.lines).await
    }

    /// Saves a quotation in its own transaction.
    pub async fn save(&self, quotation: &Quotation) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert(&mut tx, quotation).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Flips `converted` false → true.
    ///
    /// ## Returns
    /// `true` if this call performed the transition, `false` if the
    /// quotation is missing or already converted.
    pub async fn mark_converted(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let result =
            sqlx::query("UPDATE cotizaciones SET converted = 1 WHERE id = ?1 AND converted = 0")
                .bind(id)
                .execute(&mut *conn)
                .await?;

        debug!(id = %id, won = result.rows_affected() == 1, "Claimed quotation for conversion");
        Ok(result.rows_affected() == 1)
    }

    /// Gets a quotation with its lines on an existing connection.
    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Quotation>> {
        let sql = format!("{QUOTATION_SELECT} WHERE id = ?1");
        let row: Option<QuotationRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let lines = fetch_lines(conn, LineTable::Quotation, &row.id).await?;
                Ok(Some(row.into_quotation(lines)))
            }
            None => Ok(None),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Quotation>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    pub async fn find_by_number(&self, number: &str) -> DbResult<Option<Quotation>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{QUOTATION_SELECT} WHERE number = ?1");
        let row: Option<QuotationRow> = sqlx::query_as(&sql)
            .bind(number)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let lines = fetch_lines(&mut conn, LineTable::Quotation, &row.id).await?;
                Ok(Some(row.into_quotation(lines)))
            }
            None => Ok(None),
        }
    }

    /// Lists a client's quotations, newest first.
    pub async fn find_by_client(&self, client_id: &str) -> DbResult<Vec<Quotation>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{QUOTATION_SELECT} WHERE client_id = ?1 ORDER BY created_at DESC, number DESC");
        let rows: Vec<QuotationRow> = sqlx::query_as(&sql)
            .bind(client_id)
            .fetch_all(&mut *conn)
            .await?;

        let mut quotations = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = fetch_lines(&mut conn, LineTable::Quotation, &row.id).await?;
            quotations.push(row.into_quotation(lines));
        }
        Ok(quotations)
    }

    /// Gets a quotation with client, salesperson and products resolved.
    pub async fn hydrated(&self, id: &str) -> DbResult<Option<Hydrated<Quotation>>> {
        let mut conn = self.pool.acquire().await?;
        match Self::fetch(&mut conn, id).await? {
            Some(q) => Ok(Some(hydrate(&mut conn, q).await?)),
            None => Ok(None),
        }
    }
}
