//! Domain models for admin.
//!
//! Admin views are wider than the storefront's: customer lists carry order
//! counts, orders carry the customer, categories carry product counts.

pub mod catalog;
pub mod customer;
pub mod dashboard;
pub mod order;

pub use catalog::{CategoryInput, CategoryWithCount, ReassignOutcome, slugify};
pub use customer::{Customer, CustomerDetail, CustomerSummary};
pub use dashboard::DashboardSummary;
pub use order::{AdminOrderSummary, CustomerRef, OrderDetail, OrderItem, ShippingAddress};
