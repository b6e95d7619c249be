//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  With f64:                                                              │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  With integer cents, inclusive tax loses precision per line:           │
//! │    118.00 / 1.18 per line, rounded 40 times → drifts by cents          │
//! │                                                                         │
//! │  OUR SOLUTION: base-10 Decimal, full precision internally              │
//! │    0.1 + 0.2 = 0.3 exactly                                             │
//! │    Rounded to 2 places ONLY when presented (Display / rounded())       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Storage Boundary
//! SQLite has no decimal column type. Amounts are stored as REAL and
//! converted with [`Money::from_f64`] / [`Money::to_f64`] inside the
//! repositories (see the `sqlx` feature). Nothing else touches `f64`.
//!
//! ## Usage
//! ```rust
//! use folio_core::money::Money;
//!
//! let price = Money::from_cents(1099); // 10.99
//! let line = price * 3;                // 32.97
//! assert_eq!(line, Money::from_cents(3297));
//! assert_eq!(line.to_string(), "32.97");
//! ```

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use crate::types::TaxRate;

/// Decimal places used for presentation.
pub const DISPLAY_DECIMALS: u32 = 2;

/// Tolerance for comparing amounts that went through a float column or
/// a human count (0.01).
pub const MONEY_TOLERANCE: Money = Money(Decimal::from_parts(1, 0, 0, false, 2));

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount in the store currency.
///
/// ## Design Decisions
/// - **Decimal**: exact base-10 arithmetic, no binary float drift
/// - **Signed**: allows negative intermediate values (e.g. `subtotal + tax - discount`
///   before the zero floor is applied)
/// - **Unrounded**: values keep full precision; [`Money::rounded`] is for output only
///
/// ## Where Money Flows
/// ```text
/// Product.price ─┬─► PriceList override ─► unit price ─► line total
///                │                                          │
///                │                                          ▼
///                │                           base total ─► discount ─► tax split
///                │                                                        │
///                ▼                                                        ▼
///           Payment.amount ◄──────────── validated against ──────── Sale.total
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Creates a Money value from cents (hundredths of the currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use folio_core::money::Money;
    ///
    /// let price = Money::from_cents(2000);
    /// assert_eq!(price.to_string(), "20.00");
    /// ```
    #[inline]
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, 2))
    }

    /// Creates a Money value from whole currency units.
    #[inline]
    pub fn from_major(units: i64) -> Self {
        Money(Decimal::from(units))
    }

    /// Wraps an exact decimal amount.
    #[inline]
    pub const fn from_decimal(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Converts a stored REAL value into Money.
    ///
    /// Non-finite values (NaN, infinity) cannot come out of a CHECKed column
    /// and map to zero.
    pub fn from_f64(value: f64) -> Self {
        Money(Decimal::from_f64(value).unwrap_or(Decimal::ZERO))
    }

    /// Converts to `f64` for storage. Full precision, not rounded.
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    /// Returns the exact decimal amount.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money::ZERO
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is greater than zero.
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Checks if the value is less than zero.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Returns the absolute value.
    #[inline]
    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Rounds to two decimals, midpoint away from zero.
    ///
    /// Presentation only. Never feed a rounded value back into a calculation
    /// that still has lines to accumulate.
    ///
    /// ```rust
    /// use folio_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let third = Money::from_decimal(Decimal::from(10) / Decimal::from(3));
    /// assert_eq!(third.rounded(), Money::from_cents(333));
    /// ```
    pub fn rounded(&self) -> Self {
        Money(
            self.0
                .round_dp_with_strategy(DISPLAY_DECIMALS, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Multiplies a unit price by a quantity.
    #[inline]
    pub fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * Decimal::from(qty))
    }

    /// Returns `percent`% of this amount (`self * percent / 100`).
    pub fn percent(&self, percent: Decimal) -> Self {
        Money(self.0 * percent / Decimal::ONE_HUNDRED)
    }

    /// Clamps into `[min, max]`. When `max < min`, `min` wins.
    pub fn clamp_between(self, min: Money, max: Money) -> Self {
        if self > max {
            max.max(min)
        } else if self < min {
            min
        } else {
            self
        }
    }

    /// Floors the value at zero.
    #[inline]
    pub fn non_negative(self) -> Self {
        self.max(Money::ZERO)
    }

    /// True when `|self - other| <= tolerance`.
    pub fn approx_eq(&self, other: Money, tolerance: Money) -> bool {
        (*self - other).abs() <= tolerance
    }

    /// Tax charged on top of this amount (tax-exclusive pricing).
    ///
    /// ## Example
    /// ```rust
    /// use folio_core::money::Money;
    /// use folio_core::types::TaxRate;
    ///
    /// let subtotal = Money::from_major(100);
    /// let tax = subtotal.calculate_tax(TaxRate::from_percent(18));
    /// assert_eq!(tax, Money::from_major(18));
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.percent(rate.percentage())
    }

    /// Tax already contained in this amount (tax-inclusive pricing).
    ///
    /// `self - self / (1 + rate/100)`; zero when the rate is zero.
    ///
    /// ```rust
    /// use folio_core::money::Money;
    /// use folio_core::types::TaxRate;
    ///
    /// let gross = Money::from_major(118);
    /// assert_eq!(gross.included_tax(TaxRate::from_percent(18)), Money::from_major(18));
    /// ```
    pub fn included_tax(&self, rate: TaxRate) -> Money {
        if rate.is_zero() {
            return Money::ZERO;
        }
        let divisor = Decimal::ONE + rate.fraction();
        Money(self.0 - self.0 / divisor)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Two decimals, no currency symbol (the currency lives in settings).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.rounded().0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
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

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by a quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
