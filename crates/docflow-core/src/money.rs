//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    19.00 * 0.16 = 3.0400000000000005   ❌ WRONG on a printed invoice    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    1900 cents * 1600 bps / 10000 = 304 cents   ✅ $3.04                 │
//! │                                                                         │
//! │  Every rounding step happens once, explicitly, half-up to the cent.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use docflow_core::money::Money;
//!
//! let price = Money::from_cents(1000); // $10.00
//! let line = price.multiply_quantity(2);
//! assert_eq!(line.cents(), 2000);
//! assert_eq!(line.portion(500).cents(), 100); // 5% of $20.00
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

/// Basis points in one whole (100%).
pub const BPS_SCALE: i128 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents.
///
/// Signed so that intermediate differences (balances, refunds) can be
/// represented, but every persisted document amount is non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use docflow_core::money::Money;
    ///
    /// let total = Money::from_cents(2204); // $22.04
    /// assert_eq!(total.cents(), 2204);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole units and cents.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -$5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns `bps / 10000` of this amount, rounded half away from zero.
    ///
    /// Used for every percentage in the workflow: wholesale and manual
    /// discounts, tax, and the cost-of-goods estimate.
    ///
    /// ## Example
    /// ```rust
    /// use docflow_core::money::Money;
    ///
    /// // 70% of $0.05 = 3.5 cents → 4 cents
    /// assert_eq!(Money::from_cents(5).portion(7000).cents(), 4);
    /// ```
    pub fn portion(&self, bps: u32) -> Money {
        // i128 keeps large invoices from overflowing during the multiply
        let raw = self.0 as i128 * bps as i128;
        let half = BPS_SCALE / 2;
        let rounded = if raw >= 0 {
            (raw + half) / BPS_SCALE
        } else {
            (raw - half) / BPS_SCALE
        };
        Money(rounded as i64)
    }

    /// Calculates tax on this (already discounted) amount.
    ///
    /// ## Example
    /// ```rust
    /// use docflow_core::money::Money;
    /// use docflow_core::types::TaxRate;
    ///
    /// let taxable = Money::from_cents(1900); // $19.00
    /// let tax = taxable.calculate_tax(TaxRate::from_bps(1600));
    /// assert_eq!(tax.cents(), 304); // $3.04
    /// ```
    #[inline]
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.portion(rate.bps())
    }

    /// Multiplies a unit price by a line quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented rendering; the presentation layer owns localisation.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
