use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::palette;

/// Edge length of a tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// Response header carrying the server revision a tile snapshot was taken at.
pub const REVISION_HEADER: &str = "x-revision";

/// Identifies one square block of the grid. Origins are multiples of `size`,
/// so keys of one size partition the plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileKey {
    pub origin_x: i32,
    pub origin_y: i32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileError {
    #[error("tile payload is {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },
    #[error("tile byte {offset} holds palette index {value}, which is out of range")]
    ColorOutOfRange { offset: usize, value: u8 },
}

impl TileKey {
    /// Key of the tile that holds world pixel `(x, y)`.
    pub fn containing(x: i32, y: i32, size: u32) -> Self {
        let s = size as i32;
        Self {
            origin_x: x.div_euclid(s) * s,
            origin_y: y.div_euclid(s) * s,
            size,
        }
    }

    /// Key from tile indices (origin divided by size).
    pub fn from_index(tx: i32, ty: i32, size: u32) -> Self {
        let s = size as i32;
        Self {
            origin_x: tx * s,
            origin_y: ty * s,
            size,
        }
    }

    pub fn index(&self) -> (i32, i32) {
        let s = self.size as i32;
        (self.origin_x.div_euclid(s), self.origin_y.div_euclid(s))
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        let s = self.size as i64;
        let dx = x as i64 - self.origin_x as i64;
        let dy = y as i64 - self.origin_y as i64;
        (0..s).contains(&dx) && (0..s).contains(&dy)
    }

    /// Row-major byte offset of `(x, y)` inside this tile's buffer.
    pub fn local_offset(&self, x: i32, y: i32) -> Option<usize> {
        if !self.contains(x, y) {
            return None;
        }
        let lx = (x - self.origin_x) as usize;
        let ly = (y - self.origin_y) as usize;
        Some(ly * self.size as usize + lx)
    }

    pub fn byte_len(&self) -> usize {
        self.size as usize * self.size as usize
    }

    pub fn center(&self) -> (f64, f64) {
        let half = self.size as f64 / 2.0;
        (self.origin_x as f64 + half, self.origin_y as f64 + half)
    }

    /// HTTP path the tile is served from.
    pub fn path(&self) -> String {
        let (tx, ty) = self.index();
        format!("/api/tiles/{tx}/{ty}")
    }
}

/// Every tile key of `size` touching the inclusive pixel rectangle.
pub fn covering(min_x: i32, min_y: i32, max_x: i32, max_y: i32, size: u32) -> Vec<TileKey> {
    if max_x < min_x || max_y < min_y {
        return Vec::new();
    }
    let first = TileKey::containing(min_x, min_y, size).index();
    let last = TileKey::containing(max_x, max_y, size).index();
    let mut keys = Vec::with_capacity(
        ((last.0 - first.0 + 1) as usize).saturating_mul((last.1 - first.1 + 1) as usize),
    );
    for ty in first.1..=last.1 {
        for tx in first.0..=last.0 {
            keys.push(TileKey::from_index(tx, ty, size));
        }
    }
    keys
}

/// Check a fetched payload: one palette index per pixel, row-major.
pub fn validate_tile_bytes(key: &TileKey, bytes: &[u8]) -> Result<(), TileError> {
    let expected = key.byte_len();
    if bytes.len() != expected {
        return Err(TileError::Length {
            expected,
            actual: bytes.len(),
        });
    }
    if let Some((offset, &value)) = bytes
        .iter()
        .enumerate()
        .find(|(_, value)| !palette::is_valid(**value))
    {
        return Err(TileError::ColorOutOfRange { offset, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_coordinates_use_euclidean_tiles() {
        let key = TileKey::containing(-1, -256, 256);
        assert_eq!((key.origin_x, key.origin_y), (-256, -256));
        assert_eq!(key.index(), (-1, -1));
        assert_eq!(key.local_offset(-1, -256), Some(255));
        assert_eq!(key.local_offset(0, 0), None);
    }

    #[test]
    fn covering_spans_every_touched_tile() {
        let keys = covering(-10, 0, 300, 10, 256);
        let indices: Vec<_> = keys.iter().map(TileKey::index).collect();
        assert_eq!(indices, vec![(-1, 0), (0, 0), (1, 0)]);
        assert!(covering(5, 5, 4, 5, 256).is_empty());
    }

    #[test]
    fn path_uses_tile_indices() {
        assert_eq!(TileKey::from_index(-2, 3, 256).path(), "/api/tiles/-2/3");
    }

    #[test]
    fn validate_rejects_short_and_out_of_palette_payloads() {
        let key = TileKey::from_index(0, 0, 4);
        assert_eq!(
            validate_tile_bytes(&key, &[0; 15]),
            Err(TileError::Length {
                expected: 16,
                actual: 15
            })
        );
        let mut bytes = vec![1u8; 16];
        bytes[9] = 250;
        assert_eq!(
            validate_tile_bytes(&key, &bytes),
            Err(TileError::ColorOutOfRange {
                offset: 9,
                value: 250
            })
        );
        bytes[9] = 3;
        assert!(validate_tile_bytes(&key, &bytes).is_ok());
    }
}
