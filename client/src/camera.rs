//! Pan/zoom state and the screen <-> world transforms.
//!
//! `(x, y)` is the world coordinate shown at the top-left corner of the
//! viewport and `zoom` is screen pixels per world pixel, so
//! `screen = (world - origin) * zoom`.

use plotcanvas_shared::pixel::{COORD_MAX, COORD_MIN};
use serde::{Deserialize, Serialize};

pub const ZOOM_MIN: f64 = 1.0;
pub const ZOOM_MAX: f64 = 128.0;
const ZOOM_SENSITIVITY: f64 = 0.001;
const DEFAULT_ZOOM: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

/// Partial camera update; `None` fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraDelta {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub zoom: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl WorldPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// World-space rectangle, `max` exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldRect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl WorldRect {
    /// Inclusive integer pixel bounds touched by the rect.
    pub fn pixel_bounds(&self) -> (i32, i32, i32, i32) {
        let min_x = self.min_x.floor() as i32;
        let min_y = self.min_y.floor() as i32;
        let max_x = (self.max_x.ceil() as i32 - 1).max(min_x);
        let max_y = (self.max_y.ceil() as i32 - 1).max(min_y);
        (min_x, min_y, max_x, max_y)
    }

    pub fn center(&self) -> WorldPoint {
        WorldPoint::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: DEFAULT_ZOOM,
        }
    }
}

fn clamp_coord(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(COORD_MIN as f64, COORD_MAX as f64)
    } else {
        fallback
    }
}

fn clamp_zoom(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(ZOOM_MIN, ZOOM_MAX)
    } else {
        fallback
    }
}

impl Camera {
    pub fn new(x: f64, y: f64, zoom: f64) -> Self {
        let mut camera = Self::default();
        camera.move_camera(CameraDelta {
            x: Some(x),
            y: Some(y),
            zoom: Some(zoom),
        });
        camera
    }

    /// Apply a partial update, clamping every field. Non-finite inputs are ignored.
    pub fn move_camera(&mut self, delta: CameraDelta) -> Camera {
        if let Some(zoom) = delta.zoom {
            self.zoom = clamp_zoom(zoom, self.zoom);
        }
        if let Some(x) = delta.x {
            self.x = clamp_coord(x, self.x);
        }
        if let Some(y) = delta.y {
            self.y = clamp_coord(y, self.y);
        }
        *self
    }

    pub fn to_world(&self, screen: ScreenPoint) -> WorldPoint {
        WorldPoint::new(self.x + screen.x / self.zoom, self.y + screen.y / self.zoom)
    }

    pub fn to_screen(&self, world: WorldPoint) -> ScreenPoint {
        ScreenPoint::new((world.x - self.x) * self.zoom, (world.y - self.y) * self.zoom)
    }

    /// Grid pixel under a screen point.
    pub fn world_pixel(&self, screen: ScreenPoint) -> (i32, i32) {
        let world = self.to_world(screen);
        (world.x.floor() as i32, world.y.floor() as i32)
    }

    /// Set the zoom while keeping the world point under `screen` fixed.
    pub fn zoom_at(&mut self, screen: ScreenPoint, zoom: f64) -> Camera {
        let anchor = self.to_world(screen);
        self.zoom = clamp_zoom(zoom, self.zoom);
        self.x = clamp_coord(anchor.x - screen.x / self.zoom, self.x);
        self.y = clamp_coord(anchor.y - screen.y / self.zoom, self.y);
        *self
    }

    /// Wheel zoom toward a focus point (screen coordinates).
    pub fn zoom_by(&mut self, wheel_delta: f64, screen: ScreenPoint) -> Camera {
        let factor = (-wheel_delta * ZOOM_SENSITIVITY).exp();
        self.zoom_at(screen, self.zoom * factor)
    }

    /// Drag pan by a screen-space delta.
    pub fn pan_screen(&mut self, dx: f64, dy: f64) -> Camera {
        let zoom = self.zoom;
        self.move_camera(CameraDelta {
            x: Some(self.x - dx / zoom),
            y: Some(self.y - dy / zoom),
            zoom: None,
        })
    }

    pub fn visible_rect(&self, width: u32, height: u32) -> WorldRect {
        WorldRect {
            min_x: self.x,
            min_y: self.y,
            max_x: self.x + width as f64 / self.zoom,
            max_y: self.y + height as f64 / self.zoom,
        }
    }

    /// Move so that `world` sits at the centre of a `width` x `height` viewport.
    pub fn center_on(&mut self, world: WorldPoint, width: u32, height: u32) -> Camera {
        let zoom = self.zoom;
        self.move_camera(CameraDelta {
            x: Some(world.x - width as f64 / (2.0 * zoom)),
            y: Some(world.y - height as f64 / (2.0 * zoom)),
            zoom: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-6 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn fields_are_clamped_not_rejected() {
        let mut camera = Camera::default();
        camera.move_camera(CameraDelta {
            x: Some(5e9),
            y: Some(f64::NAN),
            zoom: Some(0.01),
        });
        assert_eq!(camera.x, COORD_MAX as f64);
        assert_eq!(camera.y, 0.0);
        assert_eq!(camera.zoom, ZOOM_MIN);

        camera.move_camera(CameraDelta {
            zoom: Some(1000.0),
            ..Default::default()
        });
        assert_eq!(camera.zoom, ZOOM_MAX);
        assert_eq!(camera.x, COORD_MAX as f64);
    }

    #[test]
    fn world_pixel_floors_negative_coordinates() {
        let camera = Camera::new(-10.0, -10.0, 10.0);
        assert_eq!(camera.world_pixel(ScreenPoint::new(5.0, 95.0)), (-10, -1));
    }

    #[test]
    fn pan_moves_against_drag_direction() {
        let mut camera = Camera::new(0.0, 0.0, 4.0);
        camera.pan_screen(40.0, -8.0);
        assert_eq!((camera.x, camera.y), (-10.0, 2.0));
    }

    #[test]
    fn visible_rect_spans_viewport() {
        let camera = Camera::new(100.0, 50.0, 10.0);
        let rect = camera.visible_rect(800, 600);
        assert_eq!(rect.max_x, 180.0);
        assert_eq!(rect.max_y, 110.0);
        assert_eq!(rect.pixel_bounds(), (100, 50, 179, 109));
    }

    #[test]
    fn wheel_zoom_keeps_cursor_anchor() {
        let mut camera = Camera::new(12.5, -3.0, 8.0);
        let cursor = ScreenPoint::new(320.0, 200.0);
        let before = camera.to_world(cursor);
        camera.zoom_by(-240.0, cursor);
        let after = camera.to_world(cursor);
        assert!(camera.zoom > 8.0);
        assert!(close(before.x, after.x) && close(before.y, after.y));
    }

    fn delta_strategy() -> impl Strategy<Value = CameraDelta> {
        (
            proptest::option::of(-2.0e6..2.0e6f64),
            proptest::option::of(-2.0e6..2.0e6f64),
            proptest::option::of(0.0..200.0f64),
        )
            .prop_map(|(x, y, zoom)| CameraDelta { x, y, zoom })
    }

    proptest! {
        #[test]
        fn screen_world_round_trip(
            moves in proptest::collection::vec(delta_strategy(), 0..8),
            px in -1.0e6..1.0e6f64,
            py in -1.0e6..1.0e6f64,
        ) {
            let mut camera = Camera::default();
            for delta in moves {
                camera.move_camera(delta);
            }
            let p = WorldPoint::new(px, py);
            let back = camera.to_world(camera.to_screen(p));
            prop_assert!(close(back.x, p.x), "{} vs {}", back.x, p.x);
            prop_assert!(close(back.y, p.y), "{} vs {}", back.y, p.y);
        }

        #[test]
        fn zoom_at_cursor_preserves_world_point(
            x in -1.0e5..1.0e5f64,
            y in -1.0e5..1.0e5f64,
            zoom in ZOOM_MIN..=ZOOM_MAX,
            target in 0.5..200.0f64,
            sx in 0.0..2000.0f64,
            sy in 0.0..2000.0f64,
        ) {
            let mut camera = Camera::new(x, y, zoom);
            let cursor = ScreenPoint::new(sx, sy);
            let before = camera.to_world(cursor);
            camera.zoom_at(cursor, target);
            let after = camera.to_world(cursor);
            prop_assert!(close(before.x, after.x));
            prop_assert!(close(before.y, after.y));
        }
    }
}
