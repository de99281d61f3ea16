pub mod claim;
pub mod events;
pub mod geometry;
pub mod palette;
pub mod pixel;
pub mod plot;
pub mod tile;

pub use claim::{
    MAX_VERTICES, PolygonError, can_afford, charge_for, cost, edit_delta, refund, validate_polygon,
};
pub use events::*;
pub use geometry::{Polygon, Vertex};
pub use pixel::{COORD_MAX, COORD_MIN, MAX_PIXELS_PER_EDIT, Pixel, in_bounds};
pub use plot::*;
pub use tile::{REVISION_HEADER, TILE_SIZE, TileError, TileKey, covering, validate_tile_bytes};
