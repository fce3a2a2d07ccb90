//! # Validation Module
//!
//! Input validation for workflow requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE - shape of the request                           │
//! │  ├── codes, quantities, discounts, free-text reasons                   │
//! │  └── runs before a transaction is opened                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Workflow service - references and stock                      │
//! │  ├── client / salesperson / product exist and are active               │
//! │  └── quantities against current stock                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0), CHECK (amount_cents >= 0)                     │
//! │  └── UNIQUE numbers, FOREIGN KEY references                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{DiscountRate, InventoryItem};
use crate::{MAX_DOCUMENT_LINES, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use docflow_core::validation::validate_product_code;
///
/// assert!(validate_product_code("PAPEL-A4").is_ok());
/// assert!(validate_product_code("").is_err());
/// assert!(validate_product_code("has space").is_err());
/// ```
pub fn validate_product_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::required("product_code"));
    }

    if code.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "product_code".to_string(),
            max: 50,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "product_code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a client identification number (tax id / national id).
///
/// Digits, letters and hyphens, 5 to 20 characters.
pub fn validate_client_id(id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::required("client_id"));
    }

    if id.len() < 5 || id.len() > 20 {
        return Err(ValidationError::InvalidFormat {
            field: "client_id".to_string(),
            reason: "must be between 5 and 20 characters".to_string(),
        });
    }

    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::InvalidFormat {
            field: "client_id".to_string(),
            reason: "must contain only letters, digits and hyphens".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name or description.
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a free-text reason (annulment, payment rejection).
///
/// ## Returns
/// The trimmed reason.
pub fn validate_reason(field: &str, reason: &str) -> ValidationResult<String> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::required(field));
    }

    if reason.len() > 500 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 500,
        });
    }

    Ok(reason.to_string())
}

/// Validates the last four digits printed on a card slip.
pub fn validate_card_last_four(last_four: &str) -> ValidationResult<()> {
    if last_four.len() != 4 || !last_four.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "card_last_four".to_string(),
            reason: "must be exactly 4 digits".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price in cents.
///
/// Prices on a quoted line must be strictly positive.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "unit_price".to_string(),
        });
    }

    Ok(())
}

/// Validates a manual discount.
///
/// ## Rules
/// - 0% to 100% inclusive
///
/// ## Example
/// ```rust
/// use docflow_core::types::DiscountRate;
/// use docflow_core::validation::validate_discount;
///
/// assert!(validate_discount(DiscountRate::from_bps(1000)).is_ok());
/// assert!(validate_discount(DiscountRate::from_bps(10_001)).is_err());
/// ```
pub fn validate_discount(rate: DiscountRate) -> ValidationResult<()> {
    validate_rate_bps("discount", rate.bps())
}

/// Validates any rate expressed in basis points (0..=10000).
pub fn validate_rate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

// =============================================================================
// Document Validators
// =============================================================================

/// Validates the number of lines on a document.
pub fn validate_line_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::required("lines"));
    }

    if count > MAX_DOCUMENT_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_DOCUMENT_LINES as i64,
        });
    }

    Ok(())
}

/// Validates one requested line against its catalog entry.
///
/// ## Rules
/// - Serialized items: quantity at most 1
/// - Quantity within current stock (advisory at quotation time)
pub fn validate_line_against_item(item: &InventoryItem, qty: i64) -> ValidationResult<()> {
    validate_price_cents(item.unit_price_cents)?;

    if item.is_serialized() && qty > 1 {
        return Err(ValidationError::SerializedQuantity {
            product_code: item.code.clone(),
            requested: qty,
        });
    }

    if !item.can_supply(qty) {
        return Err(ValidationError::ExceedsAvailableStock {
            product_code: item.code.clone(),
            available: item.stock,
            requested: qty,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID-shaped document or payment id.
///
/// ## Example
/// ```rust
/// use docflow_core::validation::validate_uuid;
///
/// assert!(validate_uuid("order_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("order_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProductVariant;
    use chrono::Utc;

    fn item(stock: i64, serial: Option<&str>) -> InventoryItem {
        let now = Utc::now();
        InventoryItem {
            code: "LAPTOP-T14".to_string(),
            description: "Laptop".to_string(),
            unit_price_cents: 90_000,
            stock,
            serial_number: serial.map(str::to_string),
            is_active: true,
            variant: ProductVariant::Technology {
                brand: None,
                model: None,
                warranty_months: 12,
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_validate_product_code() {
        assert!(validate_product_code("P1").is_ok());
        assert!(validate_product_code("SILLA_ERG-02").is_ok());

        assert!(validate_product_code("").is_err());
        assert!(validate_product_code("   ").is_err());
        assert!(validate_product_code("has space").is_err());
        assert!(validate_product_code(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_client_id() {
        assert!(validate_client_id("0912345678").is_ok());
        assert!(validate_client_id("1790012345001").is_ok());
        assert!(validate_client_id("123").is_err());
        assert!(validate_client_id("09 1234 5678").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_discount() {
        assert!(validate_discount(DiscountRate::none()).is_ok());
        assert!(validate_discount(DiscountRate::from_bps(10_000)).is_ok());
        assert!(validate_discount(DiscountRate::from_bps(10_001)).is_err());
    }

    #[test]
    fn test_validate_line_count() {
        assert!(matches!(
            validate_line_count(0),
            Err(ValidationError::Required { .. })
        ));
        assert!(validate_line_count(1).is_ok());
        assert!(validate_line_count(MAX_DOCUMENT_LINES + 1).is_err());
    }

    #[test]
    fn test_serialized_item_limits_quantity() {
        let laptop = item(5, Some("SN-42"));
        assert!(validate_line_against_item(&laptop, 1).is_ok());
        assert!(matches!(
            validate_line_against_item(&laptop, 2),
            Err(ValidationError::SerializedQuantity { requested: 2, .. })
        ));
    }

    #[test]
    fn test_line_quantity_against_stock() {
        let laptop = item(1, None);
        assert!(matches!(
            validate_line_against_item(&laptop, 2),
            Err(ValidationError::ExceedsAvailableStock {
                available: 1,
                requested: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_validate_reason_trims() {
        assert_eq!(
            validate_reason("reason", "  wrong client  ").unwrap(),
            "wrong client"
        );
        assert!(validate_reason("reason", "   ").is_err());
    }

    #[test]
    fn test_validate_card_last_four() {
        assert!(validate_card_last_four("4242").is_ok());
        assert!(validate_card_last_four("424").is_err());
        assert!(validate_card_last_four("42a2").is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "123").is_err());
    }
}
