use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tilespace_common::{CategoryMask, TileId, TileVariantId};

/// A single instantiated tile occupying one grid slot.
///
/// The tile's content is opaque to the streaming core; this record only
/// carries what the core needs to manage the instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileInstance {
    /// World position of the tile's grid slot.
    pub position: Vec2,
    /// Which template this tile was instantiated from.
    pub variant: TileVariantId,
    /// Category the tile occupies for spatial queries.
    pub category: CategoryMask,
    /// Whether the tile is currently shown. Hidden tiles still occupy
    /// their slot.
    pub active: bool,
}

/// The tile container.
///
/// Owns every live tile instance; "parenting" a tile means inserting it
/// here. Uses BTreeMap for deterministic iteration order across platforms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TileWorld {
    tiles: BTreeMap<TileId, TileInstance>,
}

impl TileWorld {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tile instances, hidden ones included.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Read-only access to all tiles (BTreeMap for deterministic iteration).
    pub fn tiles(&self) -> &BTreeMap<TileId, TileInstance> {
        &self.tiles
    }

    /// Snapshot of all tile ids in iteration order. Useful for walks that
    /// remove entries along the way.
    pub fn ids(&self) -> Vec<TileId> {
        self.tiles.keys().copied().collect()
    }

    /// Instantiate a tile at the given position. Returns its id.
    /// New tiles start active.
    pub fn spawn(&mut self, position: Vec2, variant: TileVariantId, category: CategoryMask) -> TileId {
        let id = TileId::new();
        self.tiles.insert(
            id,
            TileInstance {
                position,
                variant,
                category,
                active: true,
            },
        );
        id
    }

    /// Remove a tile entirely. Returns the instance if it existed.
    pub fn despawn(&mut self, id: TileId) -> Option<TileInstance> {
        self.tiles.remove(&id)
    }

    pub fn get(&self, id: TileId) -> Option<&TileInstance> {
        self.tiles.get(&id)
    }

    pub fn get_mut(&mut self, id: TileId) -> Option<&mut TileInstance> {
        self.tiles.get_mut(&id)
    }

    /// Show or hide a tile. Returns false if the id is unknown.
    pub fn set_active(&mut self, id: TileId, active: bool) -> bool {
        match self.tiles.get_mut(&id) {
            Some(tile) => {
                tile.active = active;
                true
            }
            None => false,
        }
    }

    /// Point occupancy query: does any tile whose category intersects
    /// `mask` occupy `point`?
    ///
    /// A tile occupies the half-open box of `half_extent` around its
    /// position. Hidden tiles still count; a slot stays taken until its
    /// tile is despawned.
    pub fn occupied_at(&self, point: Vec2, mask: CategoryMask, half_extent: Vec2) -> bool {
        self.tiles.values().any(|tile| {
            tile.category.intersects(mask)
                && (tile.position.x - point.x).abs() < half_extent.x
                && (tile.position.y - point.y).abs() < half_extent.y
        })
    }
}
