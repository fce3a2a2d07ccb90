//! # Domain Types
//!
//! Core domain types used throughout the document workflow.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Directory            Catalog                 Documents                 │
//! │  ─────────            ───────                 ─────────                 │
//! │  Client               InventoryItem           Quotation ──┐            │
//! │  Salesperson          └─ ProductVariant       Order ──────┼─ LineItem  │
//! │                          (office/furniture/   Invoice ────┘            │
//! │                           technology)         Payment                  │
//! │                                                                         │
//! │  Ledger: AccountingMovement (append-only, DEBIT / CREDIT)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Documents carry:
//! - `id`: UUID v4 - immutable, used for relations
//! - `number`: `PREFIX-YYYYMMDD-NNNN` - human-readable, printed on paper
//!
//! Clients are keyed by their external identification number instead.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Rates
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1600 bps = 16%. The workflow reads a single configured rate; nothing in
/// the code base hard-codes the percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

/// Discount rate in basis points, applied to a document subtotal.
///
/// Valid range is 0..=10000; see [`crate::validation::validate_discount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        DiscountRate(bps)
    }

    /// Creates a discount from a percentage typed by the salesperson.
    ///
    /// Negative input clamps to zero; validation rejects values above 100%.
    pub fn from_percentage(pct: f64) -> Self {
        DiscountRate((pct.max(0.0) * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn none() -> Self {
        DiscountRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Directory
// =============================================================================

/// A customer of the distributor.
///
/// Never hard-deleted: `is_active = false` hides the client from new
/// documents while keeping historical documents resolvable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Client {
    /// External identification number (tax id / national id).
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Wholesale clients get the automatic quotation discount.
    pub wholesale: bool,
    pub credit_limit_cents: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Client {
    #[inline]
    pub fn credit_limit(&self) -> Money {
        Money::from_cents(self.credit_limit_cents)
    }
}

/// Role of a system user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Salesperson,
    Cashier,
}

/// A user who issues documents. Read-only from the workflow's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Salesperson {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
}

/// The user performing a workflow operation.
///
/// Recorded as the `actor` of every accounting movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Actor {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Actor used by background jobs and maintenance tasks.
    pub fn system() -> Self {
        Actor::new("system", "System")
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Category tag selecting the variant table a product lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    OfficeSupply,
    Furniture,
    Technology,
}

impl ProductCategory {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::OfficeSupply => "office_supply",
            ProductCategory::Furniture => "furniture",
            ProductCategory::Technology => "technology",
        }
    }
}

/// Category-specific attributes of a product.
///
/// Exactly one variant exists per product; the database mirrors this with a
/// base `productos` row joined to one row in the matching variant table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ProductVariant {
    OfficeSupply {
        brand: Option<String>,
        /// Units per sellable pack (e.g. 500 sheets).
        pack_size: Option<i64>,
    },
    Furniture {
        material: Option<String>,
        dimensions: Option<String>,
        assembly_required: bool,
    },
    Technology {
        brand: Option<String>,
        model: Option<String>,
        warranty_months: i64,
    },
}

impl ProductVariant {
    pub fn category(&self) -> ProductCategory {
        match self {
            ProductVariant::OfficeSupply { .. } => ProductCategory::OfficeSupply,
            ProductVariant::Furniture { .. } => ProductCategory::Furniture,
            ProductVariant::Technology { .. } => ProductCategory::Technology,
        }
    }
}

/// A catalog product together with its stock level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryItem {
    /// Unique product code - business identifier.
    pub code: String,
    pub description: String,
    pub unit_price_cents: i64,
    /// Units on hand. Never negative.
    pub stock: i64,
    /// Serialized items are sold one unit per line.
    pub serial_number: Option<String>,
    pub is_active: bool,
    pub variant: ProductVariant,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn category(&self) -> ProductCategory {
        self.variant.category()
    }

    #[inline]
    pub fn is_serialized(&self) -> bool {
        self.serial_number.is_some()
    }

    /// Checks whether current stock covers `quantity`.
    #[inline]
    pub fn can_supply(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }
}

// =============================================================================
// Documents
// =============================================================================

/// The three document kinds that carry a daily sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Quotation,
    Order,
    Invoice,
}

impl DocumentKind {
    /// Prefix printed in front of the sequence number.
    pub const fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "COT",
            DocumentKind::Order => "ORD",
            DocumentKind::Invoice => "FACT",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "COT" => Some(DocumentKind::Quotation),
            "ORD" => Some(DocumentKind::Order),
            "FACT" => Some(DocumentKind::Invoice),
            _ => None,
        }
    }
}

/// A line of a quotation, order or invoice.
///
/// Uses the snapshot pattern: description and unit price are frozen when the
/// line is created and copied verbatim on conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LineItem {
    pub id: String,
    /// 1-based position within the document.
    pub line_no: i64,
    pub product_code: String,
    /// Product description at time of quotation (frozen).
    pub description: String,
    pub quantity: i64,
    /// Unit price in cents at time of quotation (frozen).
    pub unit_price_cents: i64,
    /// quantity × unit price.
    pub subtotal_cents: i64,
}

impl LineItem {
    /// Creates a line priced from the current catalog entry.
    pub fn snapshot(line_no: i64, item: &InventoryItem, quantity: i64) -> Self {
        LineItem {
            id: uuid::Uuid::new_v4().to_string(),
            line_no,
            product_code: item.code.clone(),
            description: item.description.clone(),
            quantity,
            unit_price_cents: item.unit_price_cents,
            subtotal_cents: item.unit_price().multiply_quantity(quantity).cents(),
        }
    }

    /// Copies the values into a fresh line owned by another document.
    pub fn copy_for_conversion(&self) -> Self {
        LineItem {
            id: uuid::Uuid::new_v4().to_string(),
            ..self.clone()
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

/// Monetary summary shared by every document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DocumentTotals {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

impl DocumentTotals {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    #[inline]
    pub fn tax(&self) -> Money {
        Money::from_cents(self.tax_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A priced, non-binding proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Quotation {
    pub id: String,
    /// `COT-YYYYMMDD-NNNN`
    pub number: String,
    pub client_id: String,
    pub salesperson_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub lines: Vec<LineItem>,
    pub totals: DocumentTotals,
    /// Flips false → true exactly once.
    pub converted: bool,
}

/// A quotation accepted for fulfillment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    /// `ORD-YYYYMMDD-NNNN`
    pub number: String,
    pub client_id: String,
    pub salesperson_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub quotation_id: Option<String>,
    pub lines: Vec<LineItem>,
    pub totals: DocumentTotals,
    pub invoiced: bool,
    pub invoice_id: Option<String>,
}

/// The binding, chargeable document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    /// `FACT-YYYYMMDD-NNNN`
    pub number: String,
    pub client_id: String,
    pub salesperson_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub order_id: Option<String>,
    pub lines: Vec<LineItem>,
    pub totals: DocumentTotals,
    pub annulled: bool,
    pub annulment_reason: Option<String>,
    #[ts(as = "Option<String>")]
    pub annulled_at: Option<DateTime<Utc>>,
    pub paid: bool,
    pub payment_method: Option<PaymentMethod>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Invoice {
    #[inline]
    pub fn total(&self) -> Money {
        self.totals.total()
    }
}

/// A document with its client, salesperson and catalog references resolved.
///
/// This is the shape handed to export/print collaborators. Line prices and
/// descriptions stay as snapshotted; `products` carries the current catalog
/// entry (category, variant fields, serial number) keyed by product code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hydrated<D> {
    pub document: D,
    pub client: Client,
    pub salesperson: Salesperson,
    pub products: BTreeMap<String, InventoryItem>,
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    CardCredit,
    CardDebit,
    Transfer,
    Check,
}

impl PaymentMethod {
    /// Methods that settle immediately instead of waiting for approval.
    pub const fn settles_immediately(&self) -> bool {
        matches!(
            self,
            PaymentMethod::Cash | PaymentMethod::CardCredit | PaymentMethod::CardDebit
        )
    }
}

/// Approval state of a payment.
///
/// ```text
/// PENDING ──approve──► APPROVED
///    └─────reject───► REJECTED
/// (card declines are recorded directly as DECLINED)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
    Declined,
}

/// A settlement attempt against an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub invoice_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    /// Auth code, transfer reference or check number.
    pub reference: Option<String>,
    pub approved: bool,
    pub status: PaymentStatus,
    pub observations: Option<String>,
    /// Cash only: amount handed over by the client.
    pub tendered_cents: Option<i64>,
    /// Cash only: change returned.
    pub change_cents: Option<i64>,
    pub bank: Option<String>,
    pub card_last_four: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    /// When the payment was approved or rejected.
    #[ts(as = "Option<String>")]
    pub settled_at: Option<DateTime<Utc>>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }
}

// =============================================================================
// Accounting
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Debit,
    Credit,
}

/// What kind of document a movement was posted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementDocType {
    Quotation,
    Sale,
    CostOfGoods,
    Annulment,
    Payment,
    PeriodClose,
}

/// An append-only ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AccountingMovement {
    pub id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub document_type: MovementDocType,
    pub document_number: String,
    pub description: String,
    /// Always >= 0; the sign lives in `direction`.
    pub amount_cents: i64,
    pub direction: Direction,
    pub actor: String,
    pub counterparty: Option<String>,
    pub detail: Option<String>,
}

impl AccountingMovement {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn desk(stock: i64, serial: Option<&str>) -> InventoryItem {
        let now = Utc::now();
        InventoryItem {
            code: "DESK-01".to_string(),
            description: "Standing desk".to_string(),
            unit_price_cents: 25_000,
            stock,
            serial_number: serial.map(str::to_string),
            is_active: true,
            variant: ProductVariant::Furniture {
                material: Some("oak".to_string()),
                dimensions: Some("120x60".to_string()),
                assembly_required: true,
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_tax_rate_from_percentage() {
        let rate = TaxRate::from_percentage(16.0);
        assert_eq!(rate.bps(), 1600);
        assert!((rate.percentage() - 16.0).abs() < 0.001);
    }

    #[test]
    fn test_discount_rate_clamps_negative() {
        assert_eq!(DiscountRate::from_percentage(-3.0).bps(), 0);
        assert_eq!(DiscountRate::from_percentage(12.5).bps(), 1250);
    }

    #[test]
    fn test_document_prefixes_round_trip() {
        for kind in [DocumentKind::Quotation, DocumentKind::Order, DocumentKind::Invoice] {
            assert_eq!(DocumentKind::from_prefix(kind.prefix()), Some(kind));
        }
        assert_eq!(DocumentKind::from_prefix("XYZ"), None);
    }

    #[test]
    fn test_line_snapshot_freezes_price() {
        let mut item = desk(3, None);
        let line = LineItem::snapshot(1, &item, 2);
        item.unit_price_cents = 99_999;

        assert_eq!(line.unit_price_cents, 25_000);
        assert_eq!(line.subtotal_cents, 50_000);
    }

    #[test]
    fn test_conversion_copy_gets_new_identity() {
        let line = LineItem::snapshot(1, &desk(3, None), 1);
        let copy = line.copy_for_conversion();

        assert_ne!(copy.id, line.id);
        assert_eq!(copy.subtotal_cents, line.subtotal_cents);
        assert_eq!(copy.product_code, line.product_code);
    }

    #[test]
    fn test_inventory_item_helpers() {
        let item = desk(2, Some("SN-001"));
        assert!(item.is_serialized());
        assert!(item.can_supply(2));
        assert!(!item.can_supply(3));
        assert_eq!(item.category(), ProductCategory::Furniture);
    }

    #[test]
    fn test_variant_serializes_with_category_tag() {
        let json = serde_json::to_value(ProductVariant::Technology {
            brand: Some("Lenovo".to_string()),
            model: Some("T14".to_string()),
            warranty_months: 12,
        })
        .unwrap();
        assert_eq!(json["category"], "technology");
        assert_eq!(json["warranty_months"], 12);
    }

    #[test]
    fn test_immediate_settlement_methods() {
        assert!(PaymentMethod::Cash.settles_immediately());
        assert!(PaymentMethod::CardDebit.settles_immediately());
        assert!(!PaymentMethod::Transfer.settles_immediately());
        assert!(!PaymentMethod::Check.settles_immediately());
    }
}
