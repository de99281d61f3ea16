use plotcanvas_shared::TILE_SIZE;
use serde::{Deserialize, Serialize};

/// Engine tunables. Every field has a default so the host can pass a partial
/// object (`window.PLOTCANVAS_CONFIG`) or nothing at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Fixed to the server's tile edge; not read from the host object.
    #[serde(skip, default = "fixed_tile_size")]
    pub tile_size: u32,
    /// Resident tile bytes allowed before least-recently-visible eviction.
    pub cache_budget_bytes: usize,
    /// Tiles kept pinned and prefetched around the visible rect.
    pub prefetch_margin_tiles: i32,
    pub max_fill_pixels: usize,
    pub reconnect_base_ms: f64,
    pub reconnect_max_ms: f64,
    pub tile_refresh_ms: f64,
    /// Fold Realtime into tiles once it holds this many pixels...
    pub realtime_fold_threshold: usize,
    /// ...or this long after the previous fold, whichever comes first.
    pub realtime_fold_interval_ms: f64,
    /// Revisions a pixel must trail the newest one before it is folded.
    pub realtime_fold_lag: u64,
    pub query_debounce_ms: f64,
    /// Screen-space pick radius for claimer vertex handles.
    pub handle_radius_px: f64,
    pub grid_min_zoom: f64,
    pub api_base: String,
    pub socket_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_size: TILE_SIZE,
            cache_budget_bytes: 48 * 1024 * 1024,
            prefetch_margin_tiles: 1,
            max_fill_pixels: 16_384,
            reconnect_base_ms: 500.0,
            reconnect_max_ms: 10_000.0,
            tile_refresh_ms: 30_000.0,
            realtime_fold_threshold: 4_096,
            realtime_fold_interval_ms: 1_000.0,
            realtime_fold_lag: 64,
            query_debounce_ms: 400.0,
            handle_radius_px: 6.0,
            grid_min_zoom: 8.0,
            api_base: String::new(),
            socket_path: "/ws".to_string(),
        }
    }
}

fn fixed_tile_size() -> u32 {
    TILE_SIZE
}

impl EngineConfig {
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_object_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"maxFillPixels": 100, "apiBase": "https://pixels.test/"}"#)
                .unwrap();
        assert_eq!(config.max_fill_pixels, 100);
        assert_eq!(config.tile_size, 256);
        assert_eq!(config.socket_path, "/ws");
        assert_eq!(config.realtime_fold_lag, 64);
        assert_eq!(
            config.api_url("/api/me"),
            "https://pixels.test/api/me".to_string()
        );
    }

    #[test]
    fn tile_size_cannot_be_overridden() {
        let config: EngineConfig = serde_json::from_str(r#"{"tileSize": 64}"#).unwrap();
        assert_eq!(config.tile_size, TILE_SIZE);
    }
}
