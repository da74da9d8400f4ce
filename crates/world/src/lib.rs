//! Tile container: authoritative store of instantiated tiles.
//!
//! # Invariants
//! - All mutations flow through explicit operations on [`TileWorld`].
//! - Iteration order is deterministic (BTreeMap keyed by `TileId`).

pub mod world;

pub use world::{TileInstance, TileWorld};

pub fn crate_info() -> &'static str {
    "tilespace-world v0.1.0"
}
