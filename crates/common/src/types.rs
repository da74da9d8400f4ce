use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an instantiated tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(pub Uuid);

impl TileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TileId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a tile template in the configured variant set.
///
/// The streaming core never looks inside a variant; it only picks one
/// and records which was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileVariantId(pub u32);

/// Bit mask classifying world content for occupancy queries.
///
/// A query with mask `m` only sees content whose category shares at least
/// one bit with `m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryMask(pub u32);

impl CategoryMask {
    /// Default category for streamed terrain tiles.
    pub const TERRAIN: CategoryMask = CategoryMask(1);

    pub fn intersects(self, other: CategoryMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for CategoryMask {
    fn default() -> Self {
        Self::TERRAIN
    }
}
