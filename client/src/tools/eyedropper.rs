use plotcanvas_shared::palette;

use super::{
    PointerSample, ToolBehavior, ToolContext, ToolEffect, ToolKind, ToolPhase, ToolPreview,
};

/// Picks the effective colour under the pointer as the active colour.
#[derive(Debug, Default)]
pub struct EyedropperTool {
    pressed: bool,
}

impl ToolBehavior for EyedropperTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Eyedropper
    }

    fn phase(&self) -> ToolPhase {
        if self.pressed {
            ToolPhase::Engaged
        } else {
            ToolPhase::Idle
        }
    }

    fn pointer_down(&mut self, _ctx: &ToolContext<'_>, _at: PointerSample) -> ToolEffect {
        self.pressed = true;
        ToolEffect::None
    }

    fn pointer_move(&mut self, _ctx: &ToolContext<'_>, _at: PointerSample) -> ToolEffect {
        ToolEffect::None
    }

    fn pointer_up(&mut self, ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect {
        if !std::mem::take(&mut self.pressed) {
            return ToolEffect::None;
        }
        match ctx.colors.color_at(at.pixel.0, at.pixel.1) {
            Some(color) if palette::is_paintable(color) => ToolEffect::PickColor(color),
            _ => ToolEffect::None,
        }
    }

    fn cancel(&mut self) {
        self.pressed = false;
    }

    fn preview(&self, _out: &mut ToolPreview) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::{Fixture, MapColors};

    #[test]
    fn picks_paintable_colours_only() {
        let mut fx = Fixture::new();
        fx.colors = MapColors::filled((0, 0), (0, 0), 12);
        fx.colors.0.insert((1, 0), palette::UNSET);
        let mut dropper = EyedropperTool::default();

        dropper.pointer_down(&fx.ctx(), fx.at(0, 0));
        assert_eq!(dropper.pointer_up(&fx.ctx(), fx.at(0, 0)), ToolEffect::PickColor(12));

        dropper.pointer_down(&fx.ctx(), fx.at(1, 0));
        assert_eq!(dropper.pointer_up(&fx.ctx(), fx.at(1, 0)), ToolEffect::None);

        dropper.pointer_down(&fx.ctx(), fx.at(40, 40));
        assert_eq!(dropper.pointer_up(&fx.ctx(), fx.at(40, 40)), ToolEffect::None);
    }
}
