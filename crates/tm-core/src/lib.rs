//! tm-core: shared types, request IDs, errors, configuration, and the
//! capability traits for stream sources and muxers.
//!
//! This crate is the foundational dependency for all other tm-* crates. It
//! defines the variant descriptors a [`StreamSource`] reports, the unified
//! error taxonomy, and the application configuration.

pub mod capability;
pub mod config;
pub mod error;
pub mod ids;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use capability::{MuxRequest, Muxer, StreamSource};
pub use error::{AssetRole, Error, Result};
pub use ids::*;
pub use media::*;
