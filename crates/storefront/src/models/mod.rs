//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`]. All of them serialize in `camelCase` for the JSON API.

pub mod cart;
pub mod catalog;
pub mod customer;
pub mod order;

pub use cart::{Cart, CartLine};
pub use catalog::{
    Category, CategoryRef, FavoriteProduct, ProductCategory, ProductDetail, ProductSummary,
    Variant,
};
pub use customer::{Address, AddressInput, Customer};
pub use order::{Order, OrderItem, OrderSummary, ShippingAddress};
