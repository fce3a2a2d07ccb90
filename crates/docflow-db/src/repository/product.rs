//! # Product Repository
//!
//! Catalog access for the three product categories.
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  One base row + exactly one variant row                 │
//! │                                                                         │
//! │  productos (code, description, price, stock, category, serial, ...)     │
//! │       │                                                                 │
//! │       ├── category = office_supply ──► productos_oficina               │
//! │       ├── category = furniture     ──► productos_muebles               │
//! │       └── category = technology    ──► productos_tecnologia            │
//! │                                                                         │
//! │  Reads LEFT JOIN all three and rebuild the ProductVariant from the     │
//! │  category tag. A base row without its variant row is reported as a     │
//! │  data error instead of being silently defaulted.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use docflow_core::{InventoryItem, ProductCategory, ProductVariant};

/// Shared SELECT for product reads; callers append WHERE / ORDER BY.
pub(crate) const PRODUCT_SELECT: &str = r#"
    SELECT
        p.code,
        p.description,
        p.unit_price_cents,
        p.stock,
        p.category,
        p.serial_number,
        p.is_active,
        p.created_at,
        p.updated_at,
        COALESCE(o.code, m.code, t.code) AS variant_code,
        o.brand AS office_brand,
        o.pack_size,
        m.material,
        m.dimensions,
        m.assembly_required,
        t.brand AS tech_brand,
        t.model,
        t.warranty_months
    FROM productos p
    LEFT JOIN productos_oficina o ON o.code = p.code AND p.category = 'office_supply'
    LEFT JOIN productos_muebles m ON m.code = p.code AND p.category = 'furniture'
    LEFT JOIN productos_tecnologia t ON t.code = p.code AND p.category = 'technology'
"#;

/// Flat row produced by [`PRODUCT_SELECT`].
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    code: String,
    description: String,
    unit_price_cents: i64,
    stock: i64,
    category: ProductCategory,
    serial_number: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    variant_code: Option<String>,
    office_brand: Option<String>,
    pack_size: Option<i64>,
    material: Option<String>,
    dimensions: Option<String>,
    assembly_required: Option<bool>,
    tech_brand: Option<String>,
    model: Option<String>,
    warranty_months: Option<i64>,
}

impl ProductRow {
    pub(crate) fn into_item(self) -> DbResult<InventoryItem> {
        if self.variant_code.is_none() {
            return Err(DbError::Internal(format!(
                "product {} has no {} variant row",
                self.code,
                self.category.as_str()
            )));
        }

        let variant = match self.category {
            ProductCategory::OfficeSupply => ProductVariant::OfficeSupply {
                brand: self.office_brand,
                pack_size: self.pack_size,
            },
            ProductCategory::Furniture => ProductVariant::Furniture {
                material: self.material,
                dimensions: self.dimensions,
                assembly_required: self.assembly_required.unwrap_or(false),
            },
            ProductCategory::Technology => ProductVariant::Technology {
                brand: self.tech_brand,
                model: self.model,
                warranty_months: self.warranty_months.unwrap_or(0),
            },
        };

        Ok(InventoryItem {
            code: self.code,
            description: self.description,
            unit_price_cents: self.unit_price_cents,
            stock: self.stock,
            serial_number: self.serial_number,
            is_active: self.is_active,
            variant,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for catalog products.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
/// let desk = repo.find_by_code("DESK-01").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its code.
    ///
    /// ## Returns
    /// * `Ok(Some(InventoryItem))` - Product found (active or not)
    /// * `Ok(None)` - Product not found
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<InventoryItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, code).await
    }

    /// Gets a product by code on an existing connection or transaction.
    pub async fn fetch(conn: &mut SqliteConnection, code: &str) -> DbResult<Option<InventoryItem>> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.code = ?1");

        let row: Option<ProductRow> = sqlx::query_as(&sql)
            .bind(code)
            .fetch_optional(&mut *conn)
            .await?;

        row.map(ProductRow::into_item).transpose()
    }

    /// Lists active products ordered by code.
    pub async fn list_active(&self) -> DbResult<Vec<InventoryItem>> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.is_active = 1 ORDER BY p.code");

        let rows: Vec<ProductRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        rows.into_iter().map(ProductRow::into_item).collect()
    }

    /// Lists active products of one category.
    pub async fn list_by_category(&self, category: ProductCategory) -> DbResult<Vec<InventoryItem>> {
        let sql = format!(
            "{PRODUCT_SELECT} WHERE p.is_active = 1 AND p.category = ?1 ORDER BY p.code"
        );

        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(category)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ProductRow::into_item).collect()
    }

    /// Inserts a product with its variant row in one transaction.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Code or serial number already exists
    pub async fn insert(&self, item: &InventoryItem) -> DbResult<()> {
        debug!(code = %item.code, category = item.category().as_str(), "Inserting product");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO productos (
                code, description, unit_price_cents, stock, category,
                serial_number, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.code)
        .bind(&item.description)
        .bind(item.unit_price_cents)
        .bind(item.stock)
        .bind(item.category())
        .bind(&item.serial_number)
        .bind(item.is_active)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await?;

        match &item.variant {
            ProductVariant::OfficeSupply { brand, pack_size } => {
                sqlx::query(
                    "INSERT INTO productos_oficina (code, brand, pack_size) VALUES (?1, ?2, ?3)",
                )
                .bind(&item.code)
                .bind(brand)
                .bind(pack_size)
                .execute(&mut *tx)
                .await?;
            }
            ProductVariant::Furniture {
                material,
                dimensions,
                assembly_required,
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO productos_muebles (code, material, dimensions, assembly_required)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                )
                .bind(&item.code)
                .bind(material)
                .bind(dimensions)
                .bind(assembly_required)
                .execute(&mut *tx)
                .await?;
            }
            ProductVariant::Technology {
                brand,
                model,
                warranty_months,
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO productos_tecnologia (code, brand, model, warranty_months)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                )
                .bind(&item.code)
                .bind(brand)
                .bind(model)
                .bind(warranty_months)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Activates or soft-deletes a product.
    ///
    /// Historical document lines still reference inactive products.
    pub async fn set_active(&self, code: &str, active: bool) -> DbResult<()> {
        debug!(code = %code, active, "Setting product active flag");

        let result =
            sqlx::query("UPDATE productos SET is_active = ?2, updated_at = ?3 WHERE code = ?1")
                .bind(code)
                .bind(active)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", code));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM productos WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn item(code: &str, stock: i64, variant: ProductVariant) -> InventoryItem {
        let now = Utc::now();
        InventoryItem {
            code: code.to_string(),
            description: format!("{code} description"),
            unit_price_cents: 1000,
            stock,
            serial_number: None,
            is_active: true,
            variant,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_read_each_variant() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let office = item(
            "PAPER-A4",
            50,
            ProductVariant::OfficeSupply {
                brand: Some("Xerox".to_string()),
                pack_size: Some(500),
            },
        );
        let chair = item(
            "CHAIR-01",
            3,
            ProductVariant::Furniture {
                material: Some("mesh".to_string()),
                dimensions: None,
                assembly_required: true,
            },
        );
        let laptop = item(
            "LAPTOP-01",
            2,
            ProductVariant::Technology {
                brand: Some("Lenovo".to_string()),
                model: Some("T14".to_string()),
                warranty_months: 24,
            },
        );

        for p in [&office, &chair, &laptop] {
            repo.insert(p).await.unwrap();
        }

        assert_eq!(
            repo.find_by_code("PAPER-A4").await.unwrap().unwrap().variant,
            office.variant
        );
        assert_eq!(
            repo.find_by_code("CHAIR-01").await.unwrap().unwrap().variant,
            chair.variant
        );
        let stored = repo.find_by_code("LAPTOP-01").await.unwrap().unwrap();
        assert_eq!(stored.variant, laptop.variant);
        assert_eq!(stored.stock, 2);

        let furniture = repo.list_by_category(ProductCategory::Furniture).await.unwrap();
        assert_eq!(furniture.len(), 1);
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let variant = ProductVariant::OfficeSupply {
            brand: None,
            pack_size: None,
        };

        repo.insert(&item("PEN-01", 1, variant.clone())).await.unwrap();
        let err = repo.insert(&item("PEN-01", 1, variant)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_missing_variant_row_is_an_error() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        sqlx::query(
            r#"
            INSERT INTO productos (code, description, unit_price_cents, stock, category, created_at, updated_at)
            VALUES ('ORPHAN', 'orphan', 100, 1, 'furniture', '2024-03-15T00:00:00+00:00', '2024-03-15T00:00:00+00:00')
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = db.products().find_by_code("ORPHAN").await.unwrap_err();
        assert!(matches!(err, DbError::Internal(_)));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_active_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        repo.insert(&item(
            "STAPLER",
            4,
            ProductVariant::OfficeSupply {
                brand: None,
                pack_size: None,
            },
        ))
        .await
        .unwrap();

        repo.set_active("STAPLER", false).await.unwrap();

        assert!(repo.list_active().await.unwrap().is_empty());
        assert!(!repo.find_by_code("STAPLER").await.unwrap().unwrap().is_active);
    }
}
