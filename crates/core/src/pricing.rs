//! Order total computation.
//!
//! Totals are computed once when an order is created and stored on the order
//! row; nothing downstream recomputes them. The cart view uses the same rules
//! so the customer sees the amount they will be charged.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Store-wide pricing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingRules {
    /// Tax as a fraction of the subtotal (0.08 = 8%).
    pub tax_rate: Decimal,
    /// Subtotal at or above which shipping is free.
    pub free_shipping_threshold: Decimal,
    /// Shipping charged below the threshold.
    pub flat_shipping_fee: Decimal,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(8, 2),
            free_shipping_threshold: Decimal::from(499),
            flat_shipping_fee: Decimal::from(50),
        }
    }
}

/// Computed money fields of an order.
///
/// Invariant: `total == subtotal + tax + shipping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Compute totals for `(unit_price, quantity)` lines.
    ///
    /// Tax is rounded to two decimal places, half away from zero.
    #[must_use]
    pub fn compute<I>(lines: I, rules: &PricingRules) -> Self
    where
        I: IntoIterator<Item = (Decimal, u32)>,
    {
        let subtotal: Decimal = lines
            .into_iter()
            .map(|(unit_price, quantity)| unit_price * Decimal::from(quantity))
            .sum();

        let tax = (subtotal * rules.tax_rate)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        let shipping = if subtotal >= rules.free_shipping_threshold {
            Decimal::ZERO
        } else {
            rules.flat_shipping_fee
        };

        Self {
            subtotal,
            tax,
            shipping,
            total: subtotal + tax + shipping,
        }
    }

    /// Whether the stored fields still satisfy the total invariant.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.total == self.subtotal + self.tax + self.shipping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(units: i64, scale: u32) -> Decimal {
        Decimal::new(units, scale)
    }

    #[test]
    fn test_two_items_above_threshold() {
        let totals = OrderTotals::compute([(Decimal::from(299), 2)], &PricingRules::default());
        assert_eq!(totals.subtotal, Decimal::from(598));
        assert_eq!(totals.tax, d(4784, 2));
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.total, d(64584, 2));
    }

    #[test]
    fn test_below_threshold_pays_flat_fee() {
        let totals = OrderTotals::compute([(Decimal::from(299), 1)], &PricingRules::default());
        assert_eq!(totals.subtotal, Decimal::from(299));
        assert_eq!(totals.tax, d(2392, 2));
        assert_eq!(totals.shipping, Decimal::from(50));
        assert_eq!(totals.total, d(37292, 2));
    }

    #[test]
    fn test_exactly_at_threshold_ships_free() {
        let totals = OrderTotals::compute([(Decimal::from(499), 1)], &PricingRules::default());
        assert_eq!(totals.shipping, Decimal::ZERO);
    }

    #[test]
    fn test_empty_lines() {
        let totals = OrderTotals::compute(Vec::<(Decimal, u32)>::new(), &PricingRules::default());
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.shipping, Decimal::from(50));
    }

    #[test]
    fn test_mixed_lines() {
        let totals = OrderTotals::compute(
            [(d(14950, 2), 3), (d(8900, 2), 1)],
            &PricingRules::default(),
        );
        assert_eq!(totals.subtotal, d(53750, 2));
        assert_eq!(totals.tax, d(4300, 2));
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert!(totals.is_consistent());
    }

    proptest! {
        #[test]
        fn prop_totals_invariants(
            lines in proptest::collection::vec((1_i64..500_000, 1_u32..20), 0..8)
        ) {
            let rules = PricingRules::default();
            let priced: Vec<(Decimal, u32)> =
                lines.iter().map(|(paise, qty)| (Decimal::new(*paise, 2), *qty)).collect();
            let totals = OrderTotals::compute(priced, &rules);

            prop_assert!(totals.is_consistent());
            let expected_tax = (totals.subtotal * rules.tax_rate)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            prop_assert_eq!(totals.tax, expected_tax);
            if totals.subtotal >= rules.free_shipping_threshold {
                prop_assert_eq!(totals.shipping, Decimal::ZERO);
            } else {
                prop_assert_eq!(totals.shipping, rules.flat_shipping_fee);
            }
        }
    }
}
