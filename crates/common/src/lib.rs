//! Shared types for the tilespace crates.

pub mod types;

pub use types::{CategoryMask, TileId, TileVariantId};
