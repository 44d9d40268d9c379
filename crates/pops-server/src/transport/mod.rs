//! Transport layer (HTTP).
//!
//! Exposes the predict handlers and the request-metrics middleware.

pub mod http;
