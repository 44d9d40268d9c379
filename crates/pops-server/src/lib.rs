//! pOps service library entry.
//!
//! This crate wires the model guard, telemetry sink, inference handler and
//! HTTP surface into one service. It is consumed by the binary (`main.rs`)
//! and by integration tests, which build the router around their own
//! `ModelGuard`/`Telemetry` instances.

pub mod app_state;
pub mod config;
pub mod inference;
pub mod model;
pub mod obs;
pub mod ops;
pub mod router;
pub mod transport;
