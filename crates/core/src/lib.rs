//! Storehouse Core - Shared domain types and business rules.
//!
//! This crate provides the pieces shared by every Storehouse component:
//! - `storefront` - Customer-facing JSON API (catalog, cart, favorites, checkout)
//! - `admin` - Internal management API (users, coupons, orders, categories)
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate performs no I/O: no database access, no HTTP clients, no
//! environment reads. Business rules that are pure arithmetic (coupon
//! discounts, pagination math) live here so both binaries agree on them.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, and statuses
//! - [`coupon`] - Coupon discount calculation and eligibility rules
//! - [`pagination`] - Page requests and paginated response envelopes
//! - [`api`] - The `{ success, data, error }` response envelope
//! - [`identity`] - Verification of identity-provider session tokens

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod coupon;
pub mod identity;
pub mod pagination;
pub mod types;

pub use api::ApiResponse;
pub use coupon::{Coupon, CouponError, CouponRule, CouponWindow, calculate_discount};
pub use pagination::{PageRequest, Paginated, Pagination};
pub use types::*;

/// Maximum number of favorites a single customer may keep.
pub const MAX_FAVORITES: i64 = 10;
