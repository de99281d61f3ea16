use std::collections::HashMap;
use std::collections::hash_map::Entry;

use plotcanvas_shared::{Pixel, Revision, TileKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Confirmed {
    color: u8,
    revision: Revision,
}

/// Server-confirmed pixels not yet folded into the tile cache.
///
/// Writes are ordered by server revision: an entry is only replaced by a
/// write at the same or a later revision.
/// What a sweep does with the entries of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFate {
    /// Resident and settled: write into the tile bytes.
    Fold,
    /// A snapshot is on its way; hold until it lands.
    Keep,
    /// Not cached; a later fetch will carry these writes.
    Drop,
}

#[derive(Debug, Default)]
pub struct RealtimeLayer {
    pixels: HashMap<(i32, i32), Confirmed>,
    latest_revision: Revision,
    generation: u64,
}

impl RealtimeLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Highest revision seen so far.
    pub fn latest_revision(&self) -> Revision {
        self.latest_revision
    }

    pub fn get(&self, x: i32, y: i32) -> Option<u8> {
        self.pixels.get(&(x, y)).map(|entry| entry.color)
    }

    pub fn iter(&self) -> impl Iterator<Item = Pixel> + '_ {
        self.pixels
            .iter()
            .map(|(&(x, y), entry)| Pixel::new(x, y, entry.color))
    }

    /// Apply confirmed pixels stamped with `revision`. Returns how many changed.
    pub fn apply(&mut self, pixels: &[Pixel], revision: Revision) -> usize {
        let mut changed = 0;
        for pixel in pixels {
            match self.pixels.entry(pixel.coord()) {
                Entry::Occupied(mut occupied) => {
                    let entry = occupied.get_mut();
                    if entry.revision > revision {
                        continue;
                    }
                    if entry.color != pixel.color || entry.revision != revision {
                        *entry = Confirmed {
                            color: pixel.color,
                            revision,
                        };
                        changed += 1;
                    }
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(Confirmed {
                        color: pixel.color,
                        revision,
                    });
                    changed += 1;
                }
            }
        }
        self.latest_revision = self.latest_revision.max(revision);
        if changed > 0 {
            self.generation += 1;
        }
        changed
    }

    /// Drop entries inside `key` that a tile snapshot at `revision` already
    /// contains.
    pub fn prune_tile(&mut self, key: &TileKey, revision: Revision) -> usize {
        let before = self.pixels.len();
        self.pixels
            .retain(|&(x, y), entry| !(key.contains(x, y) && entry.revision <= revision));
        let removed = before - self.pixels.len();
        if removed > 0 {
            self.generation += 1;
        }
        removed
    }

    /// Hand settled entries of foldable tiles back for folding and forget
    /// entries of tiles the cache no longer holds. Entries newer than
    /// `settled_through` stay so a late, older write can still lose to them.
    pub fn sweep(
        &mut self,
        tile_size: u32,
        settled_through: Revision,
        mut fate: impl FnMut(&TileKey) -> TileFate,
    ) -> Vec<Pixel> {
        let before = self.pixels.len();
        let mut verdicts: HashMap<TileKey, TileFate> = HashMap::new();
        let mut taken = Vec::new();
        self.pixels.retain(|&(x, y), entry| {
            let key = TileKey::containing(x, y, tile_size);
            match *verdicts.entry(key).or_insert_with(|| fate(&key)) {
                TileFate::Keep => true,
                TileFate::Drop => false,
                TileFate::Fold if entry.revision <= settled_through => {
                    taken.push(Pixel::new(x, y, entry.color));
                    false
                }
                TileFate::Fold => true,
            }
        });
        if self.pixels.len() != before {
            self.generation += 1;
        }
        taken
    }

    pub fn clear(&mut self) {
        if !self.pixels.is_empty() {
            self.pixels.clear();
            self.generation += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_revision_wins_regardless_of_arrival_order() {
        let mut layer = RealtimeLayer::new();
        layer.apply(&[Pixel::new(5, 5, 9)], 12);
        assert_eq!(layer.apply(&[Pixel::new(5, 5, 3)], 11), 0);
        assert_eq!(layer.get(5, 5), Some(9));
        assert_eq!(layer.apply(&[Pixel::new(5, 5, 4)], 13), 1);
        assert_eq!(layer.get(5, 5), Some(4));
        assert_eq!(layer.latest_revision(), 13);
    }

    #[test]
    fn reapplying_same_write_does_not_bump_generation() {
        let mut layer = RealtimeLayer::new();
        layer.apply(&[Pixel::new(1, 1, 2)], 4);
        let generation = layer.generation();
        assert_eq!(layer.apply(&[Pixel::new(1, 1, 2)], 4), 0);
        assert_eq!(layer.generation(), generation);
    }

    #[test]
    fn prune_keeps_writes_newer_than_snapshot() {
        let mut layer = RealtimeLayer::new();
        layer.apply(&[Pixel::new(1, 1, 2)], 4);
        layer.apply(&[Pixel::new(2, 2, 3)], 8);
        layer.apply(&[Pixel::new(300, 1, 3)], 1);
        let key = TileKey::containing(0, 0, 256);
        assert_eq!(layer.prune_tile(&key, 5), 1);
        assert_eq!(layer.get(1, 1), None);
        assert_eq!(layer.get(2, 2), Some(3));
        assert_eq!(layer.get(300, 1), Some(3));
    }

    #[test]
    fn sweep_splits_by_tile() {
        let mut layer = RealtimeLayer::new();
        layer.apply(&[Pixel::new(1, 1, 2), Pixel::new(-1, 1, 5)], 4);
        let home = TileKey::containing(0, 0, 256);
        let mut taken = layer.sweep(256, 4, |key| {
            if *key == home {
                TileFate::Fold
            } else {
                TileFate::Keep
            }
        });
        taken.sort_by_key(|p| p.coord());
        assert_eq!(taken, vec![Pixel::new(1, 1, 2)]);
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.get(-1, 1), Some(5));
    }

    #[test]
    fn sweep_forgets_uncached_tiles() {
        let mut layer = RealtimeLayer::new();
        let far: Vec<_> = (0..500).map(|i| Pixel::new(500_000 + i, 500_000, 3)).collect();
        layer.apply(&far, 9);
        layer.apply(&[Pixel::new(1, 1, 2)], 10);
        let home = TileKey::containing(0, 0, 256);
        let generation = layer.generation();
        let taken = layer.sweep(256, 10, |key| {
            if *key == home {
                TileFate::Keep
            } else {
                TileFate::Drop
            }
        });
        assert!(taken.is_empty());
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.get(1, 1), Some(2));
        assert!(layer.generation() > generation);
    }

    #[test]
    fn recent_writes_stay_until_settled() {
        let mut layer = RealtimeLayer::new();
        layer.apply(&[Pixel::new(1, 1, 2)], 10);
        assert!(layer.sweep(256, 9, |_| TileFate::Fold).is_empty());

        // an older reply arriving late still loses to the unfolded write
        assert_eq!(layer.apply(&[Pixel::new(1, 1, 7)], 8), 0);
        assert_eq!(layer.get(1, 1), Some(2));

        assert_eq!(layer.sweep(256, 10, |_| TileFate::Fold), vec![Pixel::new(1, 1, 2)]);
        assert!(layer.is_empty());
    }
}
