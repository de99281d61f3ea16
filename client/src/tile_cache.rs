use std::collections::HashSet;

use lru::LruCache;
use plotcanvas_shared::tile::{covering, validate_tile_bytes};
use plotcanvas_shared::{Pixel, Revision, TileError, TileKey};

use crate::camera::WorldRect;
use crate::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState<'a> {
    Absent,
    Loading,
    Ready(&'a [u8]),
}

#[derive(Debug)]
struct Resident {
    bytes: Vec<u8>,
    revision: Revision,
    fetched_at: f64,
    refreshing: bool,
}

/// Client-side store of fetched tiles.
///
/// Residency is ordered least-recently-visible first; tiles inside the
/// viewport plus the prefetch margin are pinned and never evicted.
pub struct TileCache {
    size: u32,
    budget_bytes: usize,
    margin_tiles: i32,
    resident: LruCache<TileKey, Resident>,
    resident_bytes: usize,
    loading: HashSet<TileKey>,
    pinned: HashSet<TileKey>,
    generation: u64,
}

impl TileCache {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            size: config.tile_size,
            budget_bytes: config.cache_budget_bytes,
            margin_tiles: config.prefetch_margin_tiles.max(0),
            resident: LruCache::unbounded(),
            resident_bytes: 0,
            loading: HashSet::new(),
            pinned: HashSet::new(),
            generation: 0,
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.size
    }

    pub fn key_for(&self, x: i32, y: i32) -> TileKey {
        TileKey::containing(x, y, self.size)
    }

    pub fn get(&self, key: &TileKey) -> TileState<'_> {
        if let Some(tile) = self.resident.peek(key) {
            TileState::Ready(&tile.bytes)
        } else if self.loading.contains(key) {
            TileState::Loading
        } else {
            TileState::Absent
        }
    }

    /// Bumped whenever resident bytes change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn resident_bytes(&self) -> usize {
        self.resident_bytes
    }

    pub fn resident_len(&self) -> usize {
        self.resident.len()
    }

    pub fn is_pinned(&self, key: &TileKey) -> bool {
        self.pinned.contains(key)
    }

    pub fn is_resident(&self, key: &TileKey) -> bool {
        self.resident.contains(key)
    }

    pub fn revision(&self, key: &TileKey) -> Option<Revision> {
        self.resident.peek(key).map(|tile| tile.revision)
    }

    /// A fetch (initial or refresh) is outstanding for `key`.
    pub fn is_fetching(&self, key: &TileKey) -> bool {
        self.loading.contains(key) || self.resident.peek(key).is_some_and(|tile| tile.refreshing)
    }

    pub fn loading_len(&self) -> usize {
        self.loading.len()
    }

    /// Pin the visible rect plus margin and return the keys that still need a
    /// fetch, nearest to the viewport centre first. Returned keys are `Loading`.
    pub fn request(&mut self, visible: &WorldRect) -> Vec<TileKey> {
        let (min_x, min_y, max_x, max_y) = visible.pixel_bounds();
        let margin = self.margin_tiles.saturating_mul(self.size as i32);

        // oldest visible first so the nearest end up most recent
        for key in covering(min_x, min_y, max_x, max_y, self.size) {
            self.resident.promote(&key);
        }

        let pinned = covering(
            min_x.saturating_sub(margin),
            min_y.saturating_sub(margin),
            max_x.saturating_add(margin),
            max_y.saturating_add(margin),
            self.size,
        );
        self.pinned = pinned.iter().copied().collect();

        let center = visible.center();
        let mut missing: Vec<TileKey> = pinned
            .into_iter()
            .filter(|key| !self.resident.contains(key) && !self.loading.contains(key))
            .collect();
        missing.sort_by(|a, b| {
            distance_sq(a, center.x, center.y)
                .total_cmp(&distance_sq(b, center.x, center.y))
                .then_with(|| a.cmp(b))
        });
        self.loading.extend(missing.iter().copied());

        self.evict();
        missing
    }

    /// Install fetched bytes. Returns `Ok(false)` when nobody was waiting for
    /// the tile any more (the load was cancelled).
    pub fn complete(
        &mut self,
        key: TileKey,
        bytes: Vec<u8>,
        revision: Revision,
        now_ms: f64,
    ) -> Result<bool, TileError> {
        let was_loading = self.loading.remove(&key);
        let was_refreshing = self.resident.peek(&key).is_some_and(|tile| tile.refreshing);
        if !was_loading && !was_refreshing {
            return Ok(false);
        }

        if let Err(err) = validate_tile_bytes(&key, &bytes) {
            if let Some(tile) = self.resident.peek_mut(&key) {
                tile.refreshing = false;
            }
            return Err(err);
        }

        let len = bytes.len();
        let previous = self.resident.put(
            key,
            Resident {
                bytes,
                revision,
                fetched_at: now_ms,
                refreshing: false,
            },
        );
        if let Some(previous) = previous {
            self.resident_bytes -= previous.bytes.len();
        }
        self.resident_bytes += len;
        self.generation += 1;
        self.evict();
        Ok(true)
    }

    /// A fetch failed. Initial loads go back to `Absent` so a later `request`
    /// retries; failed refreshes keep the bytes they had.
    pub fn fail(&mut self, key: &TileKey) -> bool {
        if self.loading.remove(key) {
            return true;
        }
        if let Some(tile) = self.resident.peek_mut(key)
            && tile.refreshing
        {
            tile.refreshing = false;
            return true;
        }
        false
    }

    /// Pinned resident tiles last fetched at least `interval_ms` ago. They are
    /// marked refreshing until `complete` or `fail`.
    pub fn refresh_due(&mut self, now_ms: f64, interval_ms: f64) -> Vec<TileKey> {
        let mut due = Vec::new();
        for (key, tile) in self.resident.iter_mut() {
            if self.pinned.contains(key) && !tile.refreshing && now_ms - tile.fetched_at >= interval_ms
            {
                tile.refreshing = true;
                due.push(*key);
            }
        }
        due.sort();
        due
    }

    /// Make every resident tile due for refresh on the next pass.
    pub fn mark_stale(&mut self) {
        for (_, tile) in self.resident.iter_mut() {
            tile.fetched_at = f64::NEG_INFINITY;
        }
    }

    /// Drop every outstanding load and refresh, returning the abandoned keys.
    pub fn cancel_all(&mut self) -> Vec<TileKey> {
        let mut cancelled: Vec<TileKey> = self.loading.drain().collect();
        for (key, tile) in self.resident.iter_mut() {
            if tile.refreshing {
                tile.refreshing = false;
                cancelled.push(*key);
            }
        }
        cancelled.sort();
        cancelled
    }

    /// Resident colour at a world pixel; `None` when its tile is not loaded.
    pub fn color_at(&self, x: i32, y: i32) -> Option<u8> {
        let key = self.key_for(x, y);
        let tile = self.resident.peek(&key)?;
        let offset = key.local_offset(x, y)?;
        tile.bytes.get(offset).copied()
    }

    /// Write confirmed pixels into resident tiles. Pixels whose tile is not
    /// resident are skipped. Returns how many were written.
    pub fn fold(&mut self, pixels: &[Pixel]) -> usize {
        let mut written = 0;
        for pixel in pixels {
            let key = self.key_for(pixel.x, pixel.y);
            let Some(offset) = key.local_offset(pixel.x, pixel.y) else {
                continue;
            };
            if let Some(tile) = self.resident.peek_mut(&key)
                && let Some(slot) = tile.bytes.get_mut(offset)
            {
                *slot = pixel.color;
                written += 1;
            }
        }
        if written > 0 {
            self.generation += 1;
        }
        written
    }

    fn evict(&mut self) {
        while self.resident_bytes > self.budget_bytes {
            let victim = self
                .resident
                .iter()
                .rev()
                .find(|(key, _)| !self.pinned.contains(*key))
                .map(|(key, _)| *key);
            let Some(victim) = victim else {
                break;
            };
            if let Some(tile) = self.resident.pop(&victim) {
                self.resident_bytes -= tile.bytes.len();
                tracing::debug!(tx = victim.index().0, ty = victim.index().1, "evicted tile");
            }
        }
    }
}

fn distance_sq(key: &TileKey, x: f64, y: f64) -> f64 {
    let (cx, cy) = key.center();
    let dx = cx - x;
    let dy = cy - y;
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: u32 = 4;

    fn config(budget_tiles: usize, margin: i32) -> EngineConfig {
        EngineConfig {
            tile_size: SIZE,
            cache_budget_bytes: budget_tiles * (SIZE * SIZE) as usize,
            prefetch_margin_tiles: margin,
            ..EngineConfig::default()
        }
    }

    fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> WorldRect {
        WorldRect {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    fn bytes(color: u8) -> Vec<u8> {
        vec![color; (SIZE * SIZE) as usize]
    }

    #[test]
    fn request_returns_only_the_delta() {
        let mut cache = TileCache::new(&config(64, 0));
        let first = cache.request(&rect(0.0, 0.0, 8.0, 4.0));
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|key| cache.get(key) == TileState::Loading));

        assert!(cache.request(&rect(0.0, 0.0, 8.0, 4.0)).is_empty());
        cache.complete(first[0], bytes(1), 1, 0.0).unwrap();
        let moved = cache.request(&rect(0.0, 0.0, 12.0, 4.0));
        assert_eq!(moved, vec![TileKey::from_index(2, 0, SIZE)]);
    }

    #[test]
    fn nearest_tiles_are_requested_first() {
        let mut cache = TileCache::new(&config(64, 1));
        let keys = cache.request(&rect(0.0, 0.0, 4.0, 4.0));
        assert_eq!(keys.len(), 9);
        assert_eq!(keys[0], TileKey::from_index(0, 0, SIZE));
    }

    #[test]
    fn complete_validates_payload() {
        let mut cache = TileCache::new(&config(64, 0));
        let key = cache.request(&rect(0.0, 0.0, 4.0, 4.0))[0];
        let err = cache.complete(key, vec![1; 3], 1, 0.0).unwrap_err();
        assert_eq!(
            err,
            TileError::Length {
                expected: 16,
                actual: 3
            }
        );
        assert_eq!(cache.get(&key), TileState::Absent);

        let key = cache.request(&rect(0.0, 0.0, 4.0, 4.0))[0];
        let mut payload = bytes(2);
        payload[5] = 200;
        assert!(matches!(
            cache.complete(key, payload, 1, 0.0),
            Err(TileError::ColorOutOfRange { offset: 5, value: 200 })
        ));
    }

    #[test]
    fn cancelled_loads_ignore_late_completions() {
        let mut cache = TileCache::new(&config(64, 0));
        let keys = cache.request(&rect(0.0, 0.0, 4.0, 4.0));
        assert_eq!(cache.cancel_all(), keys);
        assert_eq!(cache.complete(keys[0], bytes(1), 1, 0.0), Ok(false));
        assert_eq!(cache.get(&keys[0]), TileState::Absent);
    }

    #[test]
    fn failed_loads_are_retried() {
        let mut cache = TileCache::new(&config(64, 0));
        let keys = cache.request(&rect(0.0, 0.0, 4.0, 4.0));
        assert!(cache.fail(&keys[0]));
        assert_eq!(cache.get(&keys[0]), TileState::Absent);
        assert_eq!(cache.request(&rect(0.0, 0.0, 4.0, 4.0)), keys);
    }

    #[test]
    fn eviction_drops_least_recently_visible_unpinned() {
        let mut cache = TileCache::new(&config(2, 0));
        let a = cache.request(&rect(0.0, 0.0, 4.0, 4.0))[0];
        cache.complete(a, bytes(1), 1, 0.0).unwrap();
        let b = cache.request(&rect(4.0, 0.0, 8.0, 4.0))[0];
        cache.complete(b, bytes(2), 1, 0.0).unwrap();
        let c = cache.request(&rect(8.0, 0.0, 12.0, 4.0))[0];
        cache.complete(c, bytes(3), 1, 0.0).unwrap();

        assert_eq!(cache.resident_len(), 2);
        assert_eq!(cache.get(&a), TileState::Absent);
        assert!(cache.is_resident(&b));
        assert!(cache.is_resident(&c));
    }

    #[test]
    fn pinned_tiles_survive_over_budget() {
        let mut cache = TileCache::new(&config(1, 0));
        let keys = cache.request(&rect(0.0, 0.0, 12.0, 4.0));
        for key in &keys {
            cache.complete(*key, bytes(1), 1, 0.0).unwrap();
        }
        assert_eq!(cache.resident_len(), 3);
        assert!(cache.resident_bytes() > 16);

        cache.request(&rect(100.0, 100.0, 101.0, 101.0));
        assert_eq!(cache.resident_len(), 1);
        assert!(cache.resident_bytes() <= 16);
    }

    #[test]
    fn refresh_keeps_bytes_until_replaced() {
        let mut cache = TileCache::new(&config(64, 0));
        let key = cache.request(&rect(0.0, 0.0, 4.0, 4.0))[0];
        cache.complete(key, bytes(1), 3, 0.0).unwrap();

        assert!(cache.refresh_due(10_000.0, 30_000.0).is_empty());
        assert_eq!(cache.refresh_due(30_000.0, 30_000.0), vec![key]);
        assert!(cache.is_fetching(&key));
        assert!(cache.refresh_due(60_000.0, 30_000.0).is_empty());

        assert!(cache.fail(&key));
        assert_eq!(cache.color_at(1, 1), Some(1));

        cache.mark_stale();
        assert_eq!(cache.refresh_due(30_001.0, 30_000.0), vec![key]);
        assert_eq!(cache.complete(key, bytes(4), 9, 30_500.0), Ok(true));
        assert_eq!(cache.color_at(1, 1), Some(4));
        assert_eq!(cache.revision(&key), Some(9));
    }

    #[test]
    fn fold_writes_only_resident_tiles() {
        let mut cache = TileCache::new(&config(64, 0));
        let key = cache.request(&rect(0.0, 0.0, 4.0, 4.0))[0];
        cache.complete(key, bytes(0), 1, 0.0).unwrap();
        let generation = cache.generation();

        let written = cache.fold(&[Pixel::new(2, 3, 7), Pixel::new(-1, 0, 7)]);
        assert_eq!(written, 1);
        assert_eq!(cache.color_at(2, 3), Some(7));
        assert_eq!(cache.color_at(-1, 0), None);
        assert_eq!(cache.generation(), generation + 1);
    }
}
