//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Email and password accounts
//! - `checkout` - Order creation, payment verification, finalization
//! - `reconciliation` - Razorpay webhook processing
//! - `email` - Order confirmation and refund emails

pub mod auth;
pub mod checkout;
pub mod email;
pub mod reconciliation;
