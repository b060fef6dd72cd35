//! Cart models.

use rust_decimal::Decimal;
use serde::Serialize;

use ayurmart_core::{OrderTotals, PricingRules, ProductId};

/// One cart line joined with the current product data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub image_url: Option<String>,
    /// Current unit price in rupees.
    pub unit_price: Decimal,
    pub quantity: u32,
    pub stock_quantity: u32,
    pub is_active: bool,
}

impl CartLine {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Cart contents with totals priced the same way checkout prices them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub item_count: u32,
    pub totals: OrderTotals,
}

impl CartView {
    #[must_use]
    pub fn new(items: Vec<CartLine>, rules: &PricingRules) -> Self {
        let totals = OrderTotals::compute(items.iter().map(|l| (l.unit_price, l.quantity)), rules);
        let item_count = items.iter().map(|l| l.quantity).sum();
        Self {
            items,
            item_count,
            totals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::generate(),
            name: "Ashwagandha Churna".to_string(),
            slug: "ashwagandha-churna".to_string(),
            image_url: None,
            unit_price: Decimal::from(price),
            quantity,
            stock_quantity: 10,
            is_active: true,
        }
    }

    #[test]
    fn test_cart_view_totals() {
        let view = CartView::new(vec![line(299, 2)], &PricingRules::default());
        assert_eq!(view.item_count, 2);
        assert_eq!(view.totals.subtotal, Decimal::from(598));
        assert_eq!(view.totals.total, Decimal::new(64584, 2));
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line(150, 3).line_total(), Decimal::from(450));
    }
}
