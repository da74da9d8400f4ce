use std::collections::HashSet;

use glam::Vec2;

use crate::viewport::ViewRect;

/// A discrete grid cell coordinate identifying a tile slot.
///
/// Two world points name the same slot iff their rounded grid indices
/// match, which is exactly how [`GridPlanner::snap`] produces these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// World position of this slot for a given tile size.
    pub fn world(self, tile_size: Vec2) -> Vec2 {
        Vec2::new(self.x as f32 * tile_size.x, self.y as f32 * tile_size.y)
    }
}

/// Plans which grid slots a view rectangle covers.
#[derive(Debug, Clone, Copy)]
pub struct GridPlanner {
    tile_size: Vec2,
}

impl GridPlanner {
    /// Build a planner for the given cell pitch. The engine validates the
    /// tile size before constructing one.
    pub fn new(tile_size: Vec2) -> Self {
        debug_assert!(tile_size.x > 0.0 && tile_size.y > 0.0);
        Self { tile_size }
    }

    pub fn tile_size(&self) -> Vec2 {
        self.tile_size
    }

    /// Snap a world point to the nearest tile-aligned slot.
    ///
    /// Rounds half-up per component so each slot owns the half-open cell
    /// `[center - tile/2, center + tile/2)`. Idempotent through
    /// [`GridPos::world`].
    pub fn snap(&self, point: Vec2) -> GridPos {
        GridPos {
            x: (point.x / self.tile_size.x + 0.5).floor() as i32,
            y: (point.y / self.tile_size.y + 0.5).floor() as i32,
        }
    }

    /// Enumerate the candidate world points to probe for a view rectangle.
    ///
    /// Spans `ceil(size / tile) + 1` steps per axis and walks offsets from
    /// `view.min` at tile pitch for indices `-1..span`, one extra
    /// row/column beyond the rectangle in each direction so edge tiles are
    /// never missed to rounding. The result is deduplicated and its order
    /// is deterministic.
    pub fn candidates(&self, view: &ViewRect) -> Vec<Vec2> {
        let span_x = (view.size.x / self.tile_size.x).ceil() as i32 + 1;
        let span_y = (view.size.y / self.tile_size.y).ceil() as i32 + 1;

        let mut seen = HashSet::new();
        let mut points = Vec::new();
        for y in -1..span_y {
            for x in -1..span_x {
                let point = Vec2::new(
                    view.min.x + self.tile_size.x * x as f32,
                    view.min.y + self.tile_size.y * y as f32,
                );
                if seen.insert((point.x.to_bits(), point.y.to_bits())) {
                    points.push(point);
                }
            }
        }
        points
    }
}
