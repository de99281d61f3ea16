use std::collections::HashSet;

use plotcanvas_shared::{Pixel, palette};

use super::{
    PointerSample, ToolBehavior, ToolContext, ToolEffect, ToolKind, ToolPhase, ToolPreview,
    bresenham, footprint,
};
use crate::sync::EditDraft;

/// Freehand brush and eraser. Consecutive samples are joined with a line so
/// fast drags leave no gaps; the whole stroke commits as one pixel batch.
#[derive(Debug, Default)]
pub struct StrokeTool {
    erase: bool,
    engaged: bool,
    color: u8,
    size: u8,
    last: Option<(i32, i32)>,
    pixels: Vec<Pixel>,
    seen: HashSet<(i32, i32)>,
}

impl StrokeTool {
    pub fn brush() -> Self {
        Self::default()
    }

    pub fn eraser() -> Self {
        Self {
            erase: true,
            ..Self::default()
        }
    }

    fn stamp_to(&mut self, to: (i32, i32)) {
        let from = self.last.unwrap_or(to);
        for point in bresenham(from, to) {
            for (x, y) in footprint(point, self.size) {
                if self.seen.insert((x, y)) {
                    self.pixels.push(Pixel::new(x, y, self.color));
                }
            }
        }
        self.last = Some(to);
    }

    fn finish(&mut self) -> ToolEffect {
        if !self.engaged {
            return ToolEffect::None;
        }
        let pixels = std::mem::take(&mut self.pixels);
        self.reset();
        if pixels.is_empty() {
            return ToolEffect::Preview;
        }
        ToolEffect::Commit {
            draft: EditDraft::Pixels(pixels),
            cost: 0,
        }
    }

    fn reset(&mut self) {
        self.engaged = false;
        self.last = None;
        self.pixels.clear();
        self.seen.clear();
    }
}

impl ToolBehavior for StrokeTool {
    fn kind(&self) -> ToolKind {
        if self.erase {
            ToolKind::Erasure
        } else {
            ToolKind::Brush
        }
    }

    fn phase(&self) -> ToolPhase {
        if self.engaged {
            ToolPhase::Engaged
        } else {
            ToolPhase::Idle
        }
    }

    fn pointer_down(&mut self, ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect {
        self.reset();
        self.engaged = true;
        if self.erase {
            self.color = palette::UNSET;
            self.size = ctx.settings.eraser_size;
        } else {
            self.color = ctx.settings.color;
            self.size = ctx.settings.brush_size;
        }
        self.stamp_to(at.pixel);
        ToolEffect::Preview
    }

    fn pointer_move(&mut self, _ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect {
        if !self.engaged || self.last == Some(at.pixel) {
            return ToolEffect::None;
        }
        self.stamp_to(at.pixel);
        ToolEffect::Preview
    }

    fn pointer_up(&mut self, _ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect {
        if self.engaged && self.last != Some(at.pixel) {
            self.stamp_to(at.pixel);
        }
        self.finish()
    }

    fn pointer_leave(&mut self, _ctx: &ToolContext<'_>) -> ToolEffect {
        self.finish()
    }

    fn cancel(&mut self) {
        self.reset();
    }

    fn preview(&self, out: &mut ToolPreview) {
        out.pixels.extend_from_slice(&self.pixels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsUpdate;
    use crate::tools::tests::Fixture;

    fn committed(effect: ToolEffect) -> Vec<Pixel> {
        match effect {
            ToolEffect::Commit {
                draft: EditDraft::Pixels(pixels),
                cost: 0,
            } => pixels,
            other => panic!("expected pixel commit, got {other:?}"),
        }
    }

    #[test]
    fn fast_drag_is_gap_free_and_deduplicated() {
        let fx = Fixture::new();
        let mut brush = StrokeTool::brush();
        brush.pointer_down(&fx.ctx(), fx.at(0, 0));
        brush.pointer_move(&fx.ctx(), fx.at(5, 0));
        brush.pointer_move(&fx.ctx(), fx.at(0, 0));
        let pixels = committed(brush.pointer_up(&fx.ctx(), fx.at(0, 0)));

        let xs: Vec<i32> = pixels.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0, 1, 2, 3, 4, 5]);
        assert!(pixels.iter().all(|p| p.color == fx.settings.color));
        assert_eq!(brush.phase(), ToolPhase::Idle);
    }

    #[test]
    fn eraser_writes_unset_with_its_own_size() {
        let mut fx = Fixture::new();
        fx.settings.apply(SettingsUpdate::EraserSize(2));
        let mut eraser = StrokeTool::eraser();
        eraser.pointer_down(&fx.ctx(), fx.at(3, 3));
        let pixels = committed(eraser.pointer_up(&fx.ctx(), fx.at(3, 3)));
        assert_eq!(pixels.len(), 4);
        assert!(pixels.iter().all(|p| p.color == palette::UNSET));
    }

    #[test]
    fn leaving_the_canvas_commits() {
        let fx = Fixture::new();
        let mut brush = StrokeTool::brush();
        brush.pointer_down(&fx.ctx(), fx.at(1, 1));
        brush.pointer_move(&fx.ctx(), fx.at(1, 3));
        let pixels = committed(brush.pointer_leave(&fx.ctx()));
        assert_eq!(pixels.len(), 3);
        assert_eq!(brush.pointer_leave(&fx.ctx()), ToolEffect::None);
    }

    #[test]
    fn preview_follows_stroke() {
        let fx = Fixture::new();
        let mut brush = StrokeTool::brush();
        brush.pointer_down(&fx.ctx(), fx.at(2, 2));
        let mut preview = ToolPreview::default();
        brush.preview(&mut preview);
        assert_eq!(preview.color_at(2, 2), Some(fx.settings.color));
        brush.cancel();
        preview.clear();
        brush.preview(&mut preview);
        assert!(preview.is_empty());
    }
}
