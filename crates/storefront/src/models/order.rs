//! Order models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ayurmart_core::{
    Email, OrderId, OrderItemId, OrderStatus, OrderTotals, PaymentMethod, PaymentStatus,
    ProductId, RefundId, RefundStatus, UserId,
};

/// Shipping address captured at checkout and stored as a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "India".to_string()
}

impl ShippingAddress {
    /// Check required fields are present.
    ///
    /// # Errors
    ///
    /// Returns the name of the first empty required field.
    pub fn validate(&self) -> Result<(), &'static str> {
        let required = [
            ("fullName", &self.full_name),
            ("phone", &self.phone),
            ("addressLine1", &self.address_line1),
            ("city", &self.city),
            ("state", &self.state),
            ("postalCode", &self.postal_code),
        ];
        match required.iter().find(|(_, v)| v.trim().is_empty()) {
            Some((name, _)) => Err(*name),
            None => Ok(()),
        }
    }
}

impl std::fmt::Display for ShippingAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.full_name, self.address_line1)?;
        if let Some(line2) = self.address_line2.as_deref().filter(|l| !l.trim().is_empty()) {
            write!(f, ", {line2}")?;
        }
        write!(
            f,
            ", {}, {} {}, {}",
            self.city, self.state, self.postal_code, self.country
        )
    }
}

/// An order header.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub contact_name: String,
    pub contact_email: Email,
    pub contact_phone: String,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub shipping_address: ShippingAddress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable line snapshot taken at checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub product_image: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// A gateway refund recorded against an order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    pub id: RefundId,
    pub order_id: OrderId,
    pub razorpay_refund_id: String,
    pub amount: Decimal,
    pub status: RefundStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        serde_json::from_value(serde_json::json!({
            "fullName": "Meera Iyer",
            "phone": "+91 98450 12345",
            "addressLine1": "12 MG Road",
            "city": "Bengaluru",
            "state": "Karnataka",
            "postalCode": "560001"
        }))
        .unwrap()
    }

    #[test]
    fn test_address_defaults_country() {
        assert_eq!(address().country, "India");
        assert!(address().validate().is_ok());
    }

    #[test]
    fn test_address_reports_missing_field() {
        let mut a = address();
        a.city = "  ".to_string();
        assert_eq!(a.validate(), Err("city"));
    }

    #[test]
    fn test_address_display() {
        let mut a = address();
        assert_eq!(
            a.to_string(),
            "Meera Iyer, 12 MG Road, Bengaluru, Karnataka 560001, India"
        );
        a.address_line2 = Some("Near Cubbon Park".to_string());
        assert!(a.to_string().contains("12 MG Road, Near Cubbon Park, Bengaluru"));
    }
}
