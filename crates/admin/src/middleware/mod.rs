//! HTTP middleware stack for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. CORS (only when `ADMIN_CORS_ORIGIN` is set)
//! 3. `TraceLayer` (request span with `request_id` and `customer_id`)
//! 4. Request ID
//!
//! Authorization is an extractor, [`RequireAdmin`], taken by every handler
//! under `/api`.

pub mod auth;
pub mod request_id;

pub use auth::{RequireAdmin, verify_session};
pub use request_id::request_id_middleware;
