use std::collections::{BTreeMap, HashMap};

use plotcanvas_shared::{Pixel, Polygon, SequenceId};

/// The local user's unresolved edits, drawn above Realtime.
///
/// Pixels are kept per coordinate as a stack ordered by sequence id, so
/// removing one edit uncovers whatever older in-flight edit wrote there.
#[derive(Debug, Default)]
pub struct Telegraph {
    pixels: HashMap<(i32, i32), Vec<(SequenceId, u8)>>,
    edits: BTreeMap<SequenceId, Vec<(i32, i32)>>,
    polygons: BTreeMap<SequenceId, Polygon>,
    generation: u64,
}

impl Telegraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.polygons.is_empty()
    }

    pub fn insert_pixels(&mut self, sequence_id: SequenceId, pixels: &[Pixel]) {
        let mut coords = Vec::with_capacity(pixels.len());
        for pixel in pixels {
            let stack = self.pixels.entry(pixel.coord()).or_default();
            let at = stack.partition_point(|(seq, _)| *seq <= sequence_id);
            stack.insert(at, (sequence_id, pixel.color));
            coords.push(pixel.coord());
        }
        self.edits.insert(sequence_id, coords);
        self.generation += 1;
    }

    pub fn insert_polygon(&mut self, sequence_id: SequenceId, polygon: Polygon) {
        self.polygons.insert(sequence_id, polygon);
        self.generation += 1;
    }

    /// Drop an edit once it resolves.
    pub fn remove(&mut self, sequence_id: SequenceId) -> bool {
        let mut removed = self.polygons.remove(&sequence_id).is_some();
        if let Some(coords) = self.edits.remove(&sequence_id) {
            removed = true;
            for coord in coords {
                if let Some(stack) = self.pixels.get_mut(&coord) {
                    stack.retain(|(seq, _)| *seq != sequence_id);
                    if stack.is_empty() {
                        self.pixels.remove(&coord);
                    }
                }
            }
        }
        if removed {
            self.generation += 1;
        }
        removed
    }

    /// Colour of the newest in-flight write at a coordinate.
    pub fn color_at(&self, x: i32, y: i32) -> Option<u8> {
        self.pixels
            .get(&(x, y))
            .and_then(|stack| stack.last())
            .map(|(_, color)| *color)
    }

    pub fn pixels(&self) -> impl Iterator<Item = Pixel> + '_ {
        self.pixels.iter().filter_map(|(&(x, y), stack)| {
            stack.last().map(|(_, color)| Pixel::new(x, y, *color))
        })
    }

    pub fn polygons(&self) -> impl Iterator<Item = &Polygon> {
        self.polygons.values()
    }

    pub fn clear(&mut self) {
        self.pixels.clear();
        self.edits.clear();
        self.polygons.clear();
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removing_newer_edit_uncovers_older_write() {
        let mut telegraph = Telegraph::new();
        telegraph.insert_pixels(1, &[Pixel::new(0, 0, 4)]);
        telegraph.insert_pixels(2, &[Pixel::new(0, 0, 7), Pixel::new(1, 0, 7)]);
        assert_eq!(telegraph.color_at(0, 0), Some(7));

        assert!(telegraph.remove(2));
        assert_eq!(telegraph.color_at(0, 0), Some(4));
        assert_eq!(telegraph.color_at(1, 0), None);

        assert!(telegraph.remove(1));
        assert!(telegraph.is_empty());
        assert!(!telegraph.remove(1));
    }

    #[test]
    fn polygons_are_tracked_per_edit() {
        let mut telegraph = Telegraph::new();
        telegraph.insert_polygon(3, Polygon::rectangle(0, 0, 2, 2));
        assert_eq!(telegraph.polygons().count(), 1);
        telegraph.remove(3);
        assert_eq!(telegraph.polygons().count(), 0);
    }
}
