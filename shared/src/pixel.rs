use serde::{Deserialize, Serialize};

/// Smallest world coordinate on either axis.
pub const COORD_MIN: i32 = -1_000_000;
/// Largest world coordinate on either axis.
pub const COORD_MAX: i32 = 1_000_000;
/// Most pixels one submission may carry. Larger strokes go out in several.
pub const MAX_PIXELS_PER_EDIT: usize = 16_384;

/// One palette write at a world coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pixel {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "colorIndex")]
    pub color: u8,
}

impl Pixel {
    pub const fn new(x: i32, y: i32, color: u8) -> Self {
        Self { x, y, color }
    }

    pub const fn coord(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

/// Whether a world coordinate lies inside the addressable grid.
pub fn in_bounds(x: i32, y: i32) -> bool {
    (COORD_MIN..=COORD_MAX).contains(&x) && (COORD_MIN..=COORD_MAX).contains(&y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_color_as_color_index() {
        let json = serde_json::to_string(&Pixel::new(5, -3, 7)).expect("serialize pixel");
        assert_eq!(json, r#"{"x":5,"y":-3,"colorIndex":7}"#);
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(in_bounds(COORD_MIN, COORD_MAX));
        assert!(!in_bounds(COORD_MAX + 1, 0));
    }
}
