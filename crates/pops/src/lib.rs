//! `pops`: one dependency for embedding the sentiment service.
//!
//! `core` holds the wire types and error taxonomy, `server` the model guard,
//! telemetry sink and HTTP router.

pub mod core {
    pub use pops_core::*;
}

pub mod server {
    pub use pops_server::*;
}
