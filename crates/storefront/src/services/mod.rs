//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `catalog` - Cached catalog lookups (category list)
//! - `checkout` - Order pricing (subtotal, shipping, coupon discount, total)
//! - `webhook` - Verification and parsing of identity-provider webhooks

pub mod catalog;
pub mod checkout;
pub mod webhook;
