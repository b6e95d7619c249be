//! # Pricing Resolver
//!
//! Turns sale lines into a priced sale: unit price, discount, tax split.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  line ──► unit price = price-list override ?? product.price            │
//! │                │                                                        │
//! │                ▼                                                        │
//! │  base_total = Σ unit_price × qty                                       │
//! │                │                                                        │
//! │                ▼                                                        │
//! │  discount = promotion (PERCENT | AMOUNT) ?? manual discount            │
//! │             clamped to [0, base_total]                                  │
//! │                │                                                        │
//! │                ▼                                                        │
//! │  tax split (system rate, system inclusive flag)                        │
//! │    exclusive: subtotal = base       tax = subtotal × rate              │
//! │               total = subtotal + tax − discount                         │
//! │    inclusive: tax = base − base / (1 + rate)                            │
//! │               subtotal = base − tax  total = base − discount            │
//! │                │                                                        │
//! │                ▼                                                        │
//! │  total floored at 0                                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All arithmetic is exact decimal; nothing here rounds.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::TaxRate;

// =============================================================================
// Inputs
// =============================================================================

/// A discount rule from an active promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "UPPERCASE")]
pub enum DiscountRule {
    /// Percentage of the base total.
    Percent(Decimal),
    /// Flat amount off the base total.
    Amount(Money),
}

/// System-wide tax configuration. The per-product flag does not apply here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxPolicy {
    pub rate: TaxRate,
    /// Prices already contain tax.
    pub included: bool,
}

/// A sale line after its unit price has been resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLine {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
}

impl PriceLine {
    pub fn new(product_id: i64, quantity: i64, unit_price: Money) -> Self {
        PriceLine {
            product_id,
            quantity,
            unit_price,
        }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Output
// =============================================================================

/// Totals of a priced sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    /// Σ line totals, before discount and tax split.
    pub base_total: Money,
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
}

// =============================================================================
// Resolver
// =============================================================================

/// Computes prices, discount and tax for a sale.
///
/// ## Example
/// ```rust
/// use folio_core::money::Money;
/// use folio_core::pricing::{PriceLine, PricingResolver, TaxPolicy};
///
/// let resolver = PricingResolver::new(TaxPolicy::default());
/// let lines = vec![PriceLine::new(1, 2, Money::from_major(20))];
/// let totals = resolver.totals(&lines, None, Money::ZERO);
/// assert_eq!(totals.total, Money::from_major(40));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingResolver {
    policy: TaxPolicy,
}

impl PricingResolver {
    pub fn new(policy: TaxPolicy) -> Self {
        PricingResolver { policy }
    }

    pub fn policy(&self) -> TaxPolicy {
        self.policy
    }

    /// Unit price: the price-list override when one exists, else the list price.
    pub fn unit_price(&self, list_price: Money, override_price: Option<Money>) -> Money {
        override_price.unwrap_or(list_price)
    }

    /// Discount for a base total.
    ///
    /// A promotion replaces the manual discount entirely. Either way the
    /// result is clamped to `[0, base_total]`.
    pub fn discount(&self, base_total: Money, promotion: Option<DiscountRule>, manual: Money) -> Money {
        let raw = match promotion {
            Some(DiscountRule::Percent(percent)) => base_total.percent(percent),
            Some(DiscountRule::Amount(amount)) => amount,
            None => manual,
        };
        raw.clamp_between(Money::ZERO, base_total)
    }

    /// Splits tax out of (or onto) the base total and applies the discount.
    pub fn split_tax(&self, base_total: Money, discount: Money) -> SaleTotals {
        let rate = self.policy.rate;
        let (subtotal, tax, total) = if self.policy.included {
            let tax = base_total.included_tax(rate);
            (base_total - tax, tax, base_total - discount)
        } else {
            let tax = base_total.calculate_tax(rate);
            (base_total, tax, base_total + tax - discount)
        };

        SaleTotals {
            base_total,
            subtotal,
            tax,
            discount,
            total: total.non_negative(),
        }
    }

    /// Full pricing of a set of resolved lines.
    pub fn totals(
        &self,
        lines: &[PriceLine],
        promotion: Option<DiscountRule>,
        manual_discount: Money,
    ) -> SaleTotals {
        let base_total: Money = lines.iter().map(PriceLine::line_total).sum();
        let discount = self.discount(base_total, promotion, manual_discount);
        self.split_tax(base_total, discount)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
