use crate::camera::{Camera, CameraDelta};

/// Shareable `x`, `y`, `zoom` query string for a camera.
pub fn camera_query(camera: &Camera) -> String {
    format!(
        "x={}&y={}&zoom={}",
        camera.x.round() as i64,
        camera.y.round() as i64,
        camera.zoom.round() as i64
    )
}

/// Read a camera update from a query string. Unknown keys and values that are
/// not integers are skipped.
pub fn parse_camera_query(query: &str) -> CameraDelta {
    let mut delta = CameraDelta::default();
    for pair in query.trim_start_matches('?').split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let Ok(value) = value.trim().parse::<i64>() else {
            continue;
        };
        let value = value as f64;
        match key {
            "x" => delta.x = Some(value),
            "y" => delta.y = Some(value),
            "zoom" => delta.zoom = Some(value),
            _ => {}
        }
    }
    delta
}

/// Emits the camera query string once it has been stable for the debounce
/// window, and only when it differs from the last one written.
#[derive(Debug, Clone)]
pub struct QueryDebounce {
    window_ms: f64,
    written: Option<String>,
    pending: Option<(String, f64)>,
}

impl QueryDebounce {
    pub fn new(window_ms: f64) -> Self {
        Self {
            window_ms,
            written: None,
            pending: None,
        }
    }

    /// Treat `query` as already present in the URL (e.g. read on load).
    pub fn seed(&mut self, query: String) {
        self.written = Some(query);
        self.pending = None;
    }

    pub fn observe(&mut self, camera: &Camera, now_ms: f64) -> Option<String> {
        let query = camera_query(camera);
        if self.written.as_deref() == Some(query.as_str()) {
            self.pending = None;
            return None;
        }
        match &self.pending {
            Some((pending, since)) if *pending == query => {
                if now_ms - since < self.window_ms {
                    return None;
                }
            }
            _ => {
                self.pending = Some((query, now_ms));
                return None;
            }
        }
        self.pending = None;
        self.written = Some(query.clone());
        Some(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_round_trip_uses_integers() {
        let camera = Camera::new(-12.4, 80.6, 16.2);
        assert_eq!(camera_query(&camera), "x=-12&y=81&zoom=16");
        let delta = parse_camera_query("?x=-12&y=81&zoom=16");
        assert_eq!(delta.x, Some(-12.0));
        assert_eq!(delta.y, Some(81.0));
        assert_eq!(delta.zoom, Some(16.0));
    }

    #[test]
    fn malformed_params_are_ignored() {
        let delta = parse_camera_query("x=abc&zoom=3&theme=dark&y");
        assert_eq!(delta.x, None);
        assert_eq!(delta.y, None);
        assert_eq!(delta.zoom, Some(3.0));
    }

    #[test]
    fn debounce_waits_for_stable_camera() {
        let mut debounce = QueryDebounce::new(400.0);
        let mut camera = Camera::new(0.0, 0.0, 4.0);
        debounce.seed(camera_query(&camera));
        assert_eq!(debounce.observe(&camera, 0.0), None);

        camera.pan_screen(-40.0, 0.0);
        assert_eq!(debounce.observe(&camera, 100.0), None);
        assert_eq!(debounce.observe(&camera, 300.0), None);
        camera.pan_screen(-40.0, 0.0);
        assert_eq!(debounce.observe(&camera, 450.0), None);
        assert_eq!(
            debounce.observe(&camera, 850.0).as_deref(),
            Some("x=20&y=0&zoom=4")
        );
        assert_eq!(debounce.observe(&camera, 2000.0), None);
    }
}
