use std::collections::HashSet;

use plotcanvas_shared::Pixel;

use super::{
    PointerSample, ToolBehavior, ToolContext, ToolEffect, ToolKind, ToolPhase, ToolPreview,
    bresenham, footprint,
};
use crate::sync::EditDraft;

/// Straight line, either press-drag-release or click then click. Only the
/// endpoints are previewed; the line is rasterised at commit.
#[derive(Debug, Default)]
pub struct LineTool {
    start: Option<(i32, i32)>,
    end: (i32, i32),
    dragged: bool,
    awaiting_second_click: bool,
    color: u8,
    size: u8,
}

impl LineTool {
    fn commit(&mut self) -> ToolEffect {
        let Some(start) = self.start.take() else {
            return ToolEffect::None;
        };
        let end = self.end;
        self.dragged = false;
        self.awaiting_second_click = false;

        let mut seen = HashSet::new();
        let mut pixels = Vec::new();
        for point in bresenham(start, end) {
            for (x, y) in footprint(point, self.size) {
                if seen.insert((x, y)) {
                    pixels.push(Pixel::new(x, y, self.color));
                }
            }
        }
        ToolEffect::Commit {
            draft: EditDraft::Pixels(pixels),
            cost: 0,
        }
    }
}

impl ToolBehavior for LineTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Line
    }

    fn phase(&self) -> ToolPhase {
        if self.start.is_some() {
            ToolPhase::Engaged
        } else {
            ToolPhase::Idle
        }
    }

    fn pointer_down(&mut self, ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect {
        if self.awaiting_second_click {
            self.end = at.pixel;
            return ToolEffect::Preview;
        }
        self.start = Some(at.pixel);
        self.end = at.pixel;
        self.dragged = false;
        self.color = ctx.settings.color;
        self.size = ctx.settings.line_size;
        ToolEffect::Preview
    }

    fn pointer_move(&mut self, _ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect {
        let Some(start) = self.start else {
            return ToolEffect::None;
        };
        if at.pixel == self.end {
            return ToolEffect::None;
        }
        self.end = at.pixel;
        if at.pixel != start {
            self.dragged = true;
        }
        ToolEffect::Preview
    }

    fn pointer_up(&mut self, _ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect {
        if self.start.is_none() {
            return ToolEffect::None;
        }
        self.end = at.pixel;
        if self.dragged || self.awaiting_second_click {
            return self.commit();
        }
        self.awaiting_second_click = true;
        ToolEffect::Preview
    }

    fn pointer_leave(&mut self, _ctx: &ToolContext<'_>) -> ToolEffect {
        if self.start.is_some() && self.dragged {
            self.commit()
        } else {
            ToolEffect::None
        }
    }

    fn cancel(&mut self) {
        self.start = None;
        self.dragged = false;
        self.awaiting_second_click = false;
    }

    fn preview(&self, out: &mut ToolPreview) {
        let Some(start) = self.start else {
            return;
        };
        out.pixels.push(Pixel::new(start.0, start.1, self.color));
        if self.end != start {
            out.pixels.push(Pixel::new(self.end.0, self.end.1, self.color));
        }
    }
}
