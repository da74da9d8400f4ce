use glam::Vec2;

/// Margin factor applied to the larger of view size and tile size when
/// deriving the cull distance. Generous so tiles drop out only well
/// outside the visible region.
const CULL_MARGIN: f32 = 3.0;

/// Read-only camera collaborator.
///
/// The streaming core never looks at rendering state; it only needs a
/// world position, the output surface size in pixels, and a projection
/// from normalized viewport corners into world space.
pub trait CameraView {
    /// World-space camera position.
    fn position(&self) -> Vec2;

    /// Pixel dimensions of the output surface.
    fn pixel_size(&self) -> Vec2;

    /// Project a normalized viewport corner (`(0,0)` = bottom-left,
    /// `(1,1)` = top-right) into world space.
    fn viewport_to_world(&self, corner: Vec2) -> Vec2;
}

/// Camera trait object that can move onto the scheduler thread.
pub type BoxedCamera = Box<dyn CameraView + Send>;

/// Axis-aligned world-space rectangle the camera covers this evaluation.
///
/// A throwaway snapshot; it has no identity beyond the tick it was
/// computed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRect {
    pub min: Vec2,
    pub size: Vec2,
}

impl ViewRect {
    pub fn max(&self) -> Vec2 {
        self.min + self.size
    }

    pub fn center(&self) -> Vec2 {
        self.min + self.size * 0.5
    }
}

/// Last observed camera state; decides whether re-evaluation is needed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraSnapshot {
    pub position: Vec2,
    pub pixel_size: Vec2,
}

/// Compute the world rectangle the camera covers and the squared cull
/// distance derived from it.
///
/// The cull distance is tied to whichever is larger, the visible area or
/// a single tile, so the margin never shrinks below one tile's worth of
/// slack even for a very narrow viewport.
pub fn compute_view_rect(camera: &dyn CameraView, tile_size: Vec2) -> (ViewRect, f32) {
    let min = camera.viewport_to_world(Vec2::ZERO);
    let max = camera.viewport_to_world(Vec2::ONE);
    let size = max - min;
    let cull_distance_sqr = CULL_MARGIN * size.length_squared().max(tile_size.length_squared());
    (ViewRect { min, size }, cull_distance_sqr)
}
