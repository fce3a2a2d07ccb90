//! # Document Totals
//!
//! Pricing math shared by every document kind.
//!
//! ## Calculation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. subtotal  = Σ (quantity × unit price)                               │
//! │  2. discount  = round(subtotal × wholesale%)   (wholesale clients only) │
//! │               + round(subtotal × manual%)                               │
//! │               capped at the subtotal                                    │
//! │  3. tax       = round((subtotal − discount) × tax%)                     │
//! │  4. total     = subtotal − discount + tax                               │
//! │                                                                         │
//! │  Example (wholesale client, 2 × $10.00, tax 16%):                       │
//! │    subtotal 2000 → discount 100 → tax round(1900 × 0.16) = 304          │
//! │    total 2000 − 100 + 304 = 2204 ($22.04)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals are computed once, at quotation time. Orders and invoices copy
//! them verbatim, so a later change to the tax rate never re-prices an
//! existing document.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{DiscountRate, DocumentTotals, LineItem, TaxRate};

/// Wholesale discount applied when no configuration overrides it (5%).
pub const DEFAULT_WHOLESALE_DISCOUNT_BPS: u32 = 500;

/// Tax rate applied when no configuration overrides it (16%).
pub const DEFAULT_TAX_RATE_BPS: u32 = 1600;

/// Estimated cost of goods as a share of sale price (70%).
pub const DEFAULT_COST_OF_GOODS_BPS: u32 = 7000;

/// Rates used when pricing a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub tax_rate: TaxRate,
    pub wholesale_discount: DiscountRate,
}

impl Default for Pricing {
    fn default() -> Self {
        Pricing {
            tax_rate: TaxRate::from_bps(DEFAULT_TAX_RATE_BPS),
            wholesale_discount: DiscountRate::from_bps(DEFAULT_WHOLESALE_DISCOUNT_BPS),
        }
    }
}

/// Computes the totals for a set of lines.
///
/// ## Errors
/// `DiscountExceedsSubtotal` when the wholesale and manual discounts add up
/// to more than 100%.
///
/// ## Example
/// ```rust
/// use docflow_core::totals::{compute_totals, Pricing};
/// use docflow_core::types::{DiscountRate, LineItem};
///
/// let line = LineItem {
///     id: "l1".into(),
///     line_no: 1,
///     product_code: "P1".into(),
///     description: "Pen".into(),
///     quantity: 2,
///     unit_price_cents: 1000,
///     subtotal_cents: 2000,
/// };
/// let totals = compute_totals(&[line], true, DiscountRate::none(), &Pricing::default()).unwrap();
/// assert_eq!(totals.total_cents, 2204);
/// ```
pub fn compute_totals(
    lines: &[LineItem],
    wholesale: bool,
    manual_discount: DiscountRate,
    pricing: &Pricing,
) -> CoreResult<DocumentTotals> {
    let wholesale_bps = if wholesale {
        pricing.wholesale_discount.bps()
    } else {
        0
    };

    let combined_bps = wholesale_bps.saturating_add(manual_discount.bps());
    if combined_bps > 10_000 {
        return Err(CoreError::DiscountExceedsSubtotal {
            discount_bps: combined_bps,
        });
    }

    let subtotal: Money = lines.iter().map(LineItem::subtotal).sum();
    // Each term rounds half-up on its own; at 100% combined the two
    // roundings can overshoot by a cent, so cap at the subtotal.
    let discount = (subtotal.portion(wholesale_bps) + subtotal.portion(manual_discount.bps()))
        .min(subtotal);
    let taxable = subtotal - discount;
    let tax = taxable.calculate_tax(pricing.tax_rate);
    let total = taxable + tax;

    Ok(DocumentTotals {
        subtotal_cents: subtotal.cents(),
        discount_cents: discount.cents(),
        tax_cents: tax.cents(),
        total_cents: total.cents(),
    })
}

/// Checks that stored totals still satisfy `total = subtotal − discount + tax`
/// and that the subtotal matches the lines.
pub fn totals_consistent(lines: &[LineItem], totals: &DocumentTotals) -> bool {
    let line_sum: i64 = lines.iter().map(|l| l.subtotal_cents).sum();
    line_sum == totals.subtotal_cents
        && totals.subtotal_cents - totals.discount_cents + totals.tax_cents == totals.total_cents
}

/// Estimated cost of goods for an invoice: Σ round(price × qty × bps).
///
/// Rounded per line so the amount posted matches a line-by-line audit.
pub fn cost_of_goods(lines: &[LineItem], cost_bps: u32) -> Money {
    lines.iter().map(|l| l.subtotal().portion(cost_bps)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(no: i64, qty: i64, price: i64) -> LineItem {
        LineItem {
            id: format!("line-{no}"),
            line_no: no,
            product_code: format!("P{no}"),
            description: "item".to_string(),
            quantity: qty,
            unit_price_cents: price,
            subtotal_cents: qty * price,
        }
    }

    #[test]
    fn test_wholesale_quotation_totals() {
        let totals = compute_totals(
            &[line(1, 2, 1000)],
            true,
            DiscountRate::none(),
            &Pricing::default(),
        )
        .unwrap();

        assert_eq!(totals.subtotal_cents, 2000);
        assert_eq!(totals.discount_cents, 100);
        assert_eq!(totals.tax_cents, 304);
        assert_eq!(totals.total_cents, 2204);
    }

    #[test]
    fn test_retail_client_gets_no_wholesale_discount() {
        let totals = compute_totals(
            &[line(1, 2, 1000)],
            false,
            DiscountRate::none(),
            &Pricing::default(),
        )
        .unwrap();

        assert_eq!(totals.discount_cents, 0);
        assert_eq!(totals.tax_cents, 320);
        assert_eq!(totals.total_cents, 2320);
    }

    #[test]
    fn test_manual_and_wholesale_discounts_add() {
        let totals = compute_totals(
            &[line(1, 1, 10_000)],
            true,
            DiscountRate::from_bps(1000),
            &Pricing::default(),
        )
        .unwrap();

        assert_eq!(totals.discount_cents, 1500);
        assert_eq!(totals.tax_cents, 1360);
        assert_eq!(totals.total_cents, 9860);
    }

    #[test]
    fn test_combined_discount_over_full_rejected() {
        let result = compute_totals(
            &[line(1, 1, 1000)],
            true,
            DiscountRate::from_bps(9_600),
            &Pricing::default(),
        );

        assert!(matches!(
            result,
            Err(CoreError::DiscountExceedsSubtotal { discount_bps: 10_100 })
        ));
    }

    #[test]
    fn test_full_discount_on_odd_subtotal_never_goes_negative() {
        // 5% of 10 = 0.5 → 1 and 95% of 10 = 9.5 → 10: capped at 10
        for price in [10, 2010] {
            let lines = [line(1, 1, price)];
            let totals = compute_totals(
                &lines,
                true,
                DiscountRate::from_bps(9_500),
                &Pricing::default(),
            )
            .unwrap();

            assert_eq!(totals.discount_cents, price);
            assert_eq!(totals.tax_cents, 0);
            assert_eq!(totals.total_cents, 0);
            assert!(totals_consistent(&lines, &totals));
        }
    }

    #[test]
    fn test_totals_are_conserved() {
        let lines = [line(1, 3, 333), line(2, 7, 149), line(3, 1, 1)];
        let totals = compute_totals(
            &lines,
            true,
            DiscountRate::from_bps(250),
            &Pricing::default(),
        )
        .unwrap();

        assert!(totals_consistent(&lines, &totals));
    }

    #[test]
    fn test_inconsistent_totals_detected() {
        let lines = [line(1, 2, 1000)];
        let mut totals = compute_totals(
            &lines,
            false,
            DiscountRate::none(),
            &Pricing::default(),
        )
        .unwrap();
        totals.total_cents += 1;

        assert!(!totals_consistent(&lines, &totals));
    }

    #[test]
    fn test_cost_of_goods_rounds_per_line() {
        // 70% of 5 = 3.5 → 4, twice
        let lines = [line(1, 1, 5), line(2, 1, 5)];
        assert_eq!(cost_of_goods(&lines, DEFAULT_COST_OF_GOODS_BPS).cents(), 8);

        let lines = [line(1, 2, 1000)];
        assert_eq!(cost_of_goods(&lines, DEFAULT_COST_OF_GOODS_BPS).cents(), 1400);
    }
}
