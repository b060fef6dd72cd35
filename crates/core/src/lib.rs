//! AyurMart Core - Shared domain library.
//!
//! This crate provides the types and pure rules used across all AyurMart components:
//! - `storefront` - Public storefront API, checkout, payments and admin API
//! - `cli` - Command-line tools for migrations and operations
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Database encoding is available behind the
//! `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, emails, and statuses
//! - [`pricing`] - Order total computation (subtotal, tax, shipping)
//! - [`slug`] - URL slug generation for products and categories
//! - [`order_number`] - Human-facing order number generation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod order_number;
pub mod pricing;
pub mod slug;
pub mod types;

pub use order_number::generate_order_number;
pub use pricing::{OrderTotals, PricingRules};
pub use slug::generate_slug;
pub use types::*;
