//! Pointer and keyboard input turned into edits.
//!
//! The tool set is closed: [`ActiveTool`] holds one variant per [`ToolKind`]
//! and [`ToolMachine`] drives whichever is active through the common
//! [`ToolBehavior`] interface.

mod bucket;
mod claimer;
mod eyedropper;
mod line;
mod pan;
mod stroke;

pub use bucket::BucketTool;
pub use claimer::ClaimerTool;
pub use eyedropper::EyedropperTool;
pub use line::LineTool;
pub use pan::MoveTool;
pub use stroke::StrokeTool;

use plotcanvas_shared::{Pixel, Plot, Vertex};

use crate::camera::{Camera, ScreenPoint, WorldPoint};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::settings::ToolSettings;
use crate::sync::EditDraft;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Brush,
    Erasure,
    Line,
    Bucket,
    Eyedropper,
    Claimer,
    Move,
}

impl ToolKind {
    pub const ALL: [ToolKind; 7] = [
        Self::Brush,
        Self::Erasure,
        Self::Line,
        Self::Bucket,
        Self::Eyedropper,
        Self::Claimer,
        Self::Move,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Brush => "brush",
            Self::Erasure => "eraser",
            Self::Line => "line",
            Self::Bucket => "bucket",
            Self::Eyedropper => "eyedropper",
            Self::Claimer => "claim",
            Self::Move => "move",
        }
    }

    /// Tools gated behind a signed-in user.
    pub fn requires_sign_in(self) -> bool {
        matches!(
            self,
            Self::Claimer | Self::Line | Self::Bucket | Self::Eyedropper
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPhase {
    Idle,
    Engaged,
}

/// How the last interaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOutcome {
    Committed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKey {
    Enter,
    Escape,
    Backspace,
}

/// One pointer position in both spaces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub screen: ScreenPoint,
    pub world: WorldPoint,
    pub pixel: (i32, i32),
}

impl PointerSample {
    pub fn at(camera: &Camera, screen: ScreenPoint) -> Self {
        Self {
            screen,
            world: camera.to_world(screen),
            pixel: camera.world_pixel(screen),
        }
    }

    /// Nearest grid intersection.
    pub fn vertex(&self) -> Vertex {
        Vertex::new(self.world.x.round() as i32, self.world.y.round() as i32)
    }
}

/// Read access to effective pixel colours.
pub trait PixelSource {
    /// Colour at a world pixel, Telegraph over Realtime over Background.
    /// `None` when the pixel's tile is not loaded.
    fn color_at(&self, x: i32, y: i32) -> Option<u8>;
}

pub struct ToolContext<'a> {
    pub camera: &'a Camera,
    pub settings: &'a ToolSettings,
    pub colors: &'a dyn PixelSource,
    pub balance: Option<i64>,
    pub config: &'a EngineConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolEffect {
    None,
    /// The preview changed; nothing else to do.
    Preview,
    Pan {
        dx: f64,
        dy: f64,
    },
    PickColor(u8),
    Commit {
        draft: EditDraft,
        cost: i64,
    },
    Failed(EngineError),
}

/// Telegraph-layer feedback for the interaction in progress.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolPreview {
    pub pixels: Vec<Pixel>,
    pub outline: Vec<Vertex>,
    pub outline_closed: bool,
    pub handles: Vec<Vertex>,
}

impl ToolPreview {
    pub fn clear(&mut self) {
        self.pixels.clear();
        self.outline.clear();
        self.outline_closed = false;
        self.handles.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty() && self.outline.is_empty() && self.handles.is_empty()
    }

    pub fn color_at(&self, x: i32, y: i32) -> Option<u8> {
        self.pixels
            .iter()
            .rev()
            .find(|pixel| pixel.x == x && pixel.y == y)
            .map(|pixel| pixel.color)
    }
}

pub trait ToolBehavior {
    fn kind(&self) -> ToolKind;
    fn phase(&self) -> ToolPhase;
    fn pointer_down(&mut self, ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect;
    fn pointer_move(&mut self, ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect;
    fn pointer_up(&mut self, ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect;

    /// The pointer left the canvas.
    fn pointer_leave(&mut self, _ctx: &ToolContext<'_>) -> ToolEffect {
        ToolEffect::None
    }

    fn key(&mut self, _ctx: &ToolContext<'_>, _key: ToolKey) -> ToolEffect {
        ToolEffect::None
    }

    /// Drop the interaction in progress without emitting anything.
    fn cancel(&mut self);

    fn preview(&self, out: &mut ToolPreview);
}

pub enum ActiveTool {
    Brush(StrokeTool),
    Erasure(StrokeTool),
    Line(LineTool),
    Bucket(BucketTool),
    Eyedropper(EyedropperTool),
    Claimer(ClaimerTool),
    Move(MoveTool),
}

impl ActiveTool {
    pub fn new(kind: ToolKind) -> Self {
        match kind {
            ToolKind::Brush => Self::Brush(StrokeTool::brush()),
            ToolKind::Erasure => Self::Erasure(StrokeTool::eraser()),
            ToolKind::Line => Self::Line(LineTool::default()),
            ToolKind::Bucket => Self::Bucket(BucketTool::default()),
            ToolKind::Eyedropper => Self::Eyedropper(EyedropperTool::default()),
            ToolKind::Claimer => Self::Claimer(ClaimerTool::default()),
            ToolKind::Move => Self::Move(MoveTool::default()),
        }
    }

    fn behavior(&self) -> &dyn ToolBehavior {
        match self {
            Self::Brush(tool) | Self::Erasure(tool) => tool,
            Self::Line(tool) => tool,
            Self::Bucket(tool) => tool,
            Self::Eyedropper(tool) => tool,
            Self::Claimer(tool) => tool,
            Self::Move(tool) => tool,
        }
    }

    fn behavior_mut(&mut self) -> &mut dyn ToolBehavior {
        match self {
            Self::Brush(tool) | Self::Erasure(tool) => tool,
            Self::Line(tool) => tool,
            Self::Bucket(tool) => tool,
            Self::Eyedropper(tool) => tool,
            Self::Claimer(tool) => tool,
            Self::Move(tool) => tool,
        }
    }
}

/// Drives the active tool and tracks how interactions end.
pub struct ToolMachine {
    active: ActiveTool,
    last_outcome: Option<ToolOutcome>,
}

impl ToolMachine {
    pub fn new(kind: ToolKind) -> Self {
        Self {
            active: ActiveTool::new(kind),
            last_outcome: None,
        }
    }

    pub fn kind(&self) -> ToolKind {
        self.active.behavior().kind()
    }

    pub fn phase(&self) -> ToolPhase {
        self.active.behavior().phase()
    }

    pub fn last_outcome(&self) -> Option<ToolOutcome> {
        self.last_outcome
    }

    pub fn active(&self) -> &ActiveTool {
        &self.active
    }

    /// Switch tools. An engaged outgoing tool is cancelled; returns whether
    /// that happened.
    pub fn select(&mut self, kind: ToolKind) -> bool {
        if kind == self.kind() {
            return false;
        }
        let cancelled = self.cancel();
        self.active = ActiveTool::new(kind);
        cancelled
    }

    /// Cancel the interaction in progress, if any.
    pub fn cancel(&mut self) -> bool {
        if self.phase() != ToolPhase::Engaged {
            return false;
        }
        self.active.behavior_mut().cancel();
        self.last_outcome = Some(ToolOutcome::Cancelled);
        true
    }

    /// Start reshaping an existing plot with the claimer.
    pub fn edit_plot(&mut self, plot: &Plot) {
        self.select(ToolKind::Claimer);
        if let ActiveTool::Claimer(claimer) = &mut self.active {
            claimer.begin_edit(plot);
        }
    }

    pub fn pointer_down(&mut self, ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect {
        let effect = self.active.behavior_mut().pointer_down(ctx, at);
        self.record(effect)
    }

    pub fn pointer_move(&mut self, ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect {
        let effect = self.active.behavior_mut().pointer_move(ctx, at);
        self.record(effect)
    }

    pub fn pointer_up(&mut self, ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect {
        let effect = self.active.behavior_mut().pointer_up(ctx, at);
        self.record(effect)
    }

    pub fn pointer_leave(&mut self, ctx: &ToolContext<'_>) -> ToolEffect {
        let effect = self.active.behavior_mut().pointer_leave(ctx);
        self.record(effect)
    }

    pub fn key(&mut self, ctx: &ToolContext<'_>, key: ToolKey) -> ToolEffect {
        if key == ToolKey::Escape {
            return if self.cancel() {
                ToolEffect::Preview
            } else {
                ToolEffect::None
            };
        }
        let effect = self.active.behavior_mut().key(ctx, key);
        self.record(effect)
    }

    pub fn preview(&self, out: &mut ToolPreview) {
        out.clear();
        self.active.behavior().preview(out);
    }

    fn record(&mut self, effect: ToolEffect) -> ToolEffect {
        if matches!(effect, ToolEffect::Commit { .. }) {
            self.last_outcome = Some(ToolOutcome::Committed);
        }
        effect
    }
}

/// Integer line from `from` to `to`, both ends included.
pub fn bresenham(from: (i32, i32), to: (i32, i32)) -> Vec<(i32, i32)> {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;
    let mut points = Vec::with_capacity((dx.max(-dy) + 1) as usize);

    loop {
        points.push((x, y));
        if (x, y) == to {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    points
}

/// Square stamp of `size` pixels a side around `center`.
pub fn footprint(center: (i32, i32), size: u8) -> impl Iterator<Item = (i32, i32)> {
    let size = size.max(1) as i32;
    let lo = -(size - 1) / 2;
    let hi = size / 2;
    (lo..=hi).flat_map(move |dy| (lo..=hi).map(move |dx| (center.0 + dx, center.1 + dy)))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Colours for tests; anything not listed is unloaded.
    #[derive(Default)]
    pub(crate) struct MapColors(pub HashMap<(i32, i32), u8>);

    impl MapColors {
        pub(crate) fn filled(min: (i32, i32), max: (i32, i32), color: u8) -> Self {
            let mut map = HashMap::new();
            for y in min.1..=max.1 {
                for x in min.0..=max.0 {
                    map.insert((x, y), color);
                }
            }
            Self(map)
        }
    }

    impl PixelSource for MapColors {
        fn color_at(&self, x: i32, y: i32) -> Option<u8> {
            self.0.get(&(x, y)).copied()
        }
    }

    pub(crate) struct Fixture {
        pub camera: Camera,
        pub settings: ToolSettings,
        pub colors: MapColors,
        pub balance: Option<i64>,
        pub config: EngineConfig,
    }

    impl Fixture {
        pub(crate) fn new() -> Self {
            Self {
                camera: Camera::new(0.0, 0.0, 10.0),
                settings: ToolSettings::default(),
                colors: MapColors::default(),
                balance: Some(1_000),
                config: EngineConfig::default(),
            }
        }

        pub(crate) fn ctx(&self) -> ToolContext<'_> {
            ToolContext {
                camera: &self.camera,
                settings: &self.settings,
                colors: &self.colors,
                balance: self.balance,
                config: &self.config,
            }
        }

        /// Sample at the centre of world pixel `(x, y)`.
        pub(crate) fn at(&self, x: i32, y: i32) -> PointerSample {
            let screen = self
                .camera
                .to_screen(WorldPoint::new(x as f64 + 0.5, y as f64 + 0.5));
            PointerSample::at(&self.camera, screen)
        }

        /// Sample exactly on grid intersection `(x, y)`.
        pub(crate) fn corner(&self, x: i32, y: i32) -> PointerSample {
            let screen = self.camera.to_screen(WorldPoint::new(x as f64, y as f64));
            PointerSample::at(&self.camera, screen)
        }
    }

    #[test]
    fn bresenham_covers_both_ends_without_gaps() {
        assert_eq!(bresenham((0, 0), (3, 1)), vec![(0, 0), (1, 0), (2, 1), (3, 1)]);
        assert_eq!(bresenham((2, 2), (2, 2)), vec![(2, 2)]);
        let diagonal = bresenham((0, 0), (-4, -4));
        assert_eq!(diagonal.len(), 5);
        assert_eq!(diagonal.last(), Some(&(-4, -4)));
    }

    #[test]
    fn footprint_is_square() {
        assert_eq!(footprint((5, 5), 1).collect::<Vec<_>>(), vec![(5, 5)]);
        let stamp: Vec<_> = footprint((0, 0), 2).collect();
        assert_eq!(stamp, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
        assert_eq!(footprint((0, 0), 3).count(), 9);
    }

    #[test]
    fn gated_tools() {
        let gated: Vec<_> = ToolKind::ALL
            .into_iter()
            .filter(|kind| kind.requires_sign_in())
            .collect();
        assert_eq!(
            gated,
            vec![
                ToolKind::Line,
                ToolKind::Bucket,
                ToolKind::Eyedropper,
                ToolKind::Claimer
            ]
        );
    }

    #[test]
    fn switching_while_engaged_cancels_outgoing_tool() {
        let fx = Fixture::new();
        let mut machine = ToolMachine::new(ToolKind::Brush);
        machine.pointer_down(&fx.ctx(), fx.at(1, 1));
        assert_eq!(machine.phase(), ToolPhase::Engaged);

        assert!(machine.select(ToolKind::Line));
        assert_eq!(machine.last_outcome(), Some(ToolOutcome::Cancelled));
        assert_eq!(machine.kind(), ToolKind::Line);
        assert_eq!(machine.phase(), ToolPhase::Idle);
        let mut preview = ToolPreview::default();
        machine.preview(&mut preview);
        assert!(preview.is_empty());
    }

    #[test]
    fn escape_cancels_and_commit_is_recorded() {
        let fx = Fixture::new();
        let mut machine = ToolMachine::new(ToolKind::Brush);
        machine.pointer_down(&fx.ctx(), fx.at(1, 1));
        assert_eq!(machine.key(&fx.ctx(), ToolKey::Escape), ToolEffect::Preview);
        assert_eq!(machine.phase(), ToolPhase::Idle);

        machine.pointer_down(&fx.ctx(), fx.at(1, 1));
        let effect = machine.pointer_up(&fx.ctx(), fx.at(1, 1));
        assert!(matches!(effect, ToolEffect::Commit { .. }));
        assert_eq!(machine.last_outcome(), Some(ToolOutcome::Committed));
    }
}
