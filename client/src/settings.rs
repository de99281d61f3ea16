use plotcanvas_shared::palette;
use serde::{Deserialize, Serialize};

pub const MIN_TOOL_SIZE: u8 = 1;
pub const MAX_TOOL_SIZE: u8 = 16;

/// Local storage key the host persists [`ToolSettings`] under.
pub const SETTINGS_STORAGE_KEY: &str = "plotcanvas_settings";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolSettings {
    /// Active palette index; always paintable.
    pub color: u8,
    pub brush_size: u8,
    pub eraser_size: u8,
    pub line_size: u8,
    pub show_grid: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            color: 1,
            brush_size: 1,
            eraser_size: 4,
            line_size: 1,
            show_grid: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsUpdate {
    Color(u8),
    BrushSize(u8),
    EraserSize(u8),
    LineSize(u8),
    ShowGrid(bool),
}

fn clamp_size(size: u8) -> u8 {
    size.clamp(MIN_TOOL_SIZE, MAX_TOOL_SIZE)
}

impl ToolSettings {
    /// Repair values read from storage.
    pub fn sanitized(mut self) -> Self {
        if !palette::is_paintable(self.color) {
            self.color = Self::default().color;
        }
        self.brush_size = clamp_size(self.brush_size);
        self.eraser_size = clamp_size(self.eraser_size);
        self.line_size = clamp_size(self.line_size);
        self
    }

    /// Returns whether anything changed. Unpaintable colours are ignored.
    pub fn apply(&mut self, update: SettingsUpdate) -> bool {
        let before = self.clone();
        match update {
            SettingsUpdate::Color(color) if palette::is_paintable(color) => self.color = color,
            SettingsUpdate::Color(_) => {}
            SettingsUpdate::BrushSize(size) => self.brush_size = clamp_size(size),
            SettingsUpdate::EraserSize(size) => self.eraser_size = clamp_size(size),
            SettingsUpdate::LineSize(size) => self.line_size = clamp_size(size),
            SettingsUpdate::ShowGrid(show) => self.show_grid = show,
        }
        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_clamp_and_unset_is_not_a_brush_colour() {
        let mut settings = ToolSettings::default();
        assert!(settings.apply(SettingsUpdate::BrushSize(40)));
        assert_eq!(settings.brush_size, MAX_TOOL_SIZE);
        assert!(!settings.apply(SettingsUpdate::Color(palette::UNSET)));
        assert!(!settings.apply(SettingsUpdate::Color(200)));
        assert!(settings.apply(SettingsUpdate::Color(9)));
        assert_eq!(settings.color, 9);
    }

    #[test]
    fn stored_values_are_repaired() {
        let stored: ToolSettings =
            serde_json::from_str(r#"{"color": 0, "lineSize": 0, "showGrid": false}"#).unwrap();
        let settings = stored.sanitized();
        assert_eq!(settings.color, 1);
        assert_eq!(settings.line_size, 1);
        assert!(!settings.show_grid);
    }
}
