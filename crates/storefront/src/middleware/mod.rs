//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded on the span and Sentry scope)
//! 4. Security headers
//! 5. Rate limiting (governor, per route group)
//!
//! Authentication is an extractor ([`RequireCustomer`]) rather than a layer,
//! so public routes pay nothing for it.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{RequireCustomer, verify_session};
pub use rate_limit::{api_rate_limiter, checkout_rate_limiter, webhook_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
