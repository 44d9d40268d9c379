//! pOps core: transport-agnostic request/response types and the error surface.
//!
//! This crate defines the wire-level contracts shared by the server, its tests
//! and any client tooling. It carries no transport or runtime dependencies so
//! the request normalizer and payload shapes can be reused and tested in
//! isolation.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `PopsError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, PopsError, Result};
