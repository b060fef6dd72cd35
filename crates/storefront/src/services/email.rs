//! Transactional email: order confirmations and refund notices.
//!
//! Uses SMTP via lettre for delivery with Askama HTML and plain text
//! templates. Callers treat delivery as best effort.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use thiserror::Error;

use ayurmart_core::Price;

use crate::config::EmailConfig;
use crate::models::{Order, OrderItem};

/// One rendered line of an order email.
struct EmailLine {
    name: String,
    quantity: u32,
    unit_price: String,
    subtotal: String,
}

/// Money fields of an order email, already formatted.
struct EmailTotals {
    subtotal: String,
    tax: String,
    shipping: String,
    total: String,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    name: &'a str,
    order_number: &'a str,
    payment_method: &'a str,
    lines: &'a [EmailLine],
    totals: &'a EmailTotals,
    address: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    name: &'a str,
    order_number: &'a str,
    payment_method: &'a str,
    lines: &'a [EmailLine],
    totals: &'a EmailTotals,
    address: &'a str,
}

#[derive(Template)]
#[template(path = "email/refund_processed.html")]
struct RefundProcessedHtml<'a> {
    name: &'a str,
    order_number: &'a str,
    amount: &'a str,
}

#[derive(Template)]
#[template(path = "email/refund_processed.txt")]
struct RefundProcessedText<'a> {
    name: &'a str,
    order_number: &'a str,
    amount: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A rendered message ready to send.
#[derive(Debug)]
struct Rendered {
    subject: String,
    text: String,
    html: String,
}

fn money(amount: Decimal) -> String {
    Price::inr(amount).to_string()
}

fn render_order_confirmation(order: &Order, items: &[OrderItem]) -> Result<Rendered, EmailError> {
    let lines: Vec<EmailLine> = items
        .iter()
        .map(|item| EmailLine {
            name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price: money(item.unit_price),
            subtotal: money(item.subtotal),
        })
        .collect();
    let totals = EmailTotals {
        subtotal: money(order.totals.subtotal),
        tax: money(order.totals.tax),
        shipping: money(order.totals.shipping),
        total: money(order.totals.total),
    };
    let payment_method = match order.payment_method {
        ayurmart_core::PaymentMethod::Razorpay => "Paid online",
        ayurmart_core::PaymentMethod::Cod => "Cash on delivery",
    };
    let address = order.shipping_address.to_string();

    let html = OrderConfirmationHtml {
        name: &order.contact_name,
        order_number: &order.order_number,
        payment_method,
        lines: &lines,
        totals: &totals,
        address: &address,
    }
    .render()?;
    let text = OrderConfirmationText {
        name: &order.contact_name,
        order_number: &order.order_number,
        payment_method,
        lines: &lines,
        totals: &totals,
        address: &address,
    }
    .render()?;

    Ok(Rendered {
        subject: format!("Your AyurMart order {} is confirmed", order.order_number),
        text,
        html,
    })
}

fn render_refund_processed(order: &Order, amount: Decimal) -> Result<Rendered, EmailError> {
    let amount = money(amount);
    let html = RefundProcessedHtml {
        name: &order.contact_name,
        order_number: &order.order_number,
        amount: &amount,
    }
    .render()?;
    let text = RefundProcessedText {
        name: &order.contact_name,
        order_number: &order.order_number,
        amount: &amount,
    }
    .render()?;

    Ok(Rendered {
        subject: format!("Refund processed for order {}", order.order_number),
        text,
        html,
    })
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send the order confirmation to the order's contact email.
    ///
    /// # Errors
    ///
    /// Returns error if the template fails to render or delivery fails.
    pub async fn send_order_confirmation(
        &self,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<(), EmailError> {
        let rendered = render_order_confirmation(order, items)?;
        self.send_multipart_email(order.contact_email.as_str(), &rendered)
            .await
    }

    /// Tell the customer a refund reached their payment method.
    ///
    /// # Errors
    ///
    /// Returns error if the template fails to render or delivery fails.
    pub async fn send_refund_processed(
        &self,
        order: &Order,
        amount: Decimal,
    ) -> Result<(), EmailError> {
        let rendered = render_refund_processed(order, amount)?;
        self.send_multipart_email(order.contact_email.as_str(), &rendered)
            .await
    }

    async fn send_multipart_email(&self, to: &str, rendered: &Rendered) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(&rendered.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(rendered.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(rendered.html.clone()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %rendered.subject, "email sent");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ayurmart_core::{
        Email, OrderId, OrderItemId, OrderStatus, OrderTotals, PaymentMethod, PaymentStatus,
        PricingRules, UserId,
    };
    use chrono::Utc;

    use crate::models::ShippingAddress;

    fn order(method: PaymentMethod) -> Order {
        let totals = OrderTotals::compute([(Decimal::from(299), 2)], &PricingRules::default());
        Order {
            id: OrderId::generate(),
            order_number: "ORD-0LOYW3V28-AB12".to_string(),
            user_id: UserId::generate(),
            contact_name: "Meera <Iyer>".to_string(),
            contact_email: Email::parse("meera@example.in").unwrap(),
            contact_phone: "9876543210".to_string(),
            totals,
            status: OrderStatus::Processing,
            payment_method: method,
            payment_status: PaymentStatus::Paid,
            razorpay_order_id: None,
            razorpay_payment_id: None,
            shipping_address: ShippingAddress {
                full_name: "Meera Iyer".to_string(),
                phone: "9876543210".to_string(),
                email: None,
                address_line1: "12 Temple Road".to_string(),
                address_line2: None,
                city: "Kochi".to_string(),
                state: "Kerala".to_string(),
                postal_code: "682001".to_string(),
                country: "India".to_string(),
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(order: &Order) -> OrderItem {
        OrderItem {
            id: OrderItemId::generate(),
            order_id: order.id,
            product_id: None,
            product_name: "Chyawanprash".to_string(),
            product_image: None,
            quantity: 2,
            unit_price: Decimal::from(299),
            subtotal: Decimal::from(598),
        }
    }

    #[test]
    fn test_order_confirmation_renders_totals() {
        let order = order(PaymentMethod::Razorpay);
        let rendered = render_order_confirmation(&order, &[item(&order)]).unwrap();

        assert!(rendered.subject.contains("ORD-0LOYW3V28-AB12"));
        assert!(rendered.text.contains("Chyawanprash x 2"));
        assert!(rendered.text.contains("₹645.84"));
        assert!(rendered.text.contains("Paid online"));
        assert!(rendered.html.contains("₹47.84"));
    }

    #[test]
    fn test_html_escapes_customer_name() {
        let order = order(PaymentMethod::Cod);
        let rendered = render_order_confirmation(&order, &[]).unwrap();
        assert!(rendered.html.contains("Meera &#60;Iyer&#62;") || rendered.html.contains("Meera &lt;Iyer&gt;"));
        assert!(rendered.text.contains("Cash on delivery"));
    }

    #[test]
    fn test_refund_email() {
        let order = order(PaymentMethod::Razorpay);
        let rendered = render_refund_processed(&order, Decimal::new(29900, 2)).unwrap();
        assert!(rendered.subject.starts_with("Refund processed"));
        assert!(rendered.text.contains("₹299.00"));
    }
}
