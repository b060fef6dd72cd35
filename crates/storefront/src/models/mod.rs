//! Domain models for the storefront.

pub mod cart;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use cart::{CartLine, CartView};
pub use order::{Order, OrderItem, Refund, ShippingAddress};
pub use product::{Category, Product};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
