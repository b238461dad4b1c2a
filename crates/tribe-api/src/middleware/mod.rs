//! HTTP middleware shared by every route
//!
//! Credential and capability checks live in `crate::auth::middleware`.

pub mod metrics;
pub mod security_headers;

pub use metrics::{metrics_middleware, ApiMetrics};
pub use security_headers::security_headers_middleware;
