//! Line-item storage shared by the three document tables.
//!
//! Lines are written once with their parent document and never updated.

use sqlx::SqliteConnection;

use crate::error::DbResult;
use docflow_core::LineItem;

/// Which child table a document's lines live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineTable {
    Quotation,
    Order,
    Invoice,
}

impl LineTable {
    const fn table(self) -> &'static str {
        match self {
            LineTable::Quotation => "items_cotizacion",
            LineTable::Order => "items_orden",
            LineTable::Invoice => "items_factura",
        }
    }
}

pub(crate) async fn insert_lines(
    conn: &mut SqliteConnection,
    table: LineTable,
    document_id: &str,
    lines: &[LineItem],
) -> DbResult<()> {
    let sql = format!(
        r#"
        INSERT INTO {} (
            id, document_id, line_no, product_code, description,
            quantity, unit_price_cents, subtotal_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        table.table()
    );

    for line in lines {
        sqlx::query(&sql)
            .bind(&line.id)
            .bind(document_id)
            .bind(line.line_no)
            .bind(&line.product_code)
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.subtotal_cents)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

pub(crate) async fn fetch_lines(
    conn: &mut SqliteConnection,
    table: LineTable,
    document_id: &str,
) -> DbResult<Vec<LineItem>> {
    let sql = format!(
        r#"
        SELECT id, line_no, product_code, description, quantity, unit_price_cents, subtotal_cents
        FROM {}
        WHERE document_id = ?1
        ORDER BY line_no
        "#,
        table.table()
    );

    let lines = sqlx::query_as::<_, LineItem>(&sql)
        .bind(document_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(lines)
}
