//! Type-safe price representation using decimal arithmetic.

use core::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (rupees, not paise).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a price in Indian rupees.
    #[must_use]
    pub const fn inr(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::INR)
    }

    /// Amount in the smallest currency unit (paise for INR), as payment
    /// gateways expect it.
    ///
    /// Returns `None` if the amount is negative or does not fit in an `i64`.
    #[must_use]
    pub fn to_minor_units(&self) -> Option<i64> {
        if self.amount.is_sign_negative() {
            return None;
        }
        (self.amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }

    /// Build a price from minor units (e.g. a gateway refund amount in paise).
    #[must_use]
    pub fn from_minor_units(minor: i64, currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::new(minor, 2), currency_code)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:.2}", self.currency_code.symbol(), self.amount)
    }
}

/// ISO 4217 currency codes accepted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
}

impl CurrencyCode {
    /// The three-letter code sent to the payment gateway.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minor_units() {
        assert_eq!(Price::inr(Decimal::new(64584, 2)).to_minor_units(), Some(64584));
        assert_eq!(Price::inr(Decimal::from(299)).to_minor_units(), Some(29900));
        assert_eq!(Price::inr(Decimal::ZERO).to_minor_units(), Some(0));
    }

    #[test]
    fn test_to_minor_units_rounds_fractional_paise() {
        assert_eq!(Price::inr(Decimal::new(10005, 3)).to_minor_units(), Some(1001));
    }

    #[test]
    fn test_negative_has_no_minor_units() {
        assert_eq!(Price::inr(Decimal::new(-1, 0)).to_minor_units(), None);
    }

    #[test]
    fn test_from_minor_units() {
        let price = Price::from_minor_units(4784, CurrencyCode::INR);
        assert_eq!(price.amount, Decimal::new(4784, 2));
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::inr(Decimal::new(64584, 2)).to_string(), "₹645.84");
        assert_eq!(Price::inr(Decimal::from(50)).to_string(), "₹50.00");
    }
}
