use super::{
    PointerSample, ToolBehavior, ToolContext, ToolEffect, ToolKind, ToolPhase, ToolPreview,
};
use crate::camera::ScreenPoint;

/// Drag to pan. Never produces edits.
#[derive(Debug, Default)]
pub struct MoveTool {
    last: Option<ScreenPoint>,
}

impl ToolBehavior for MoveTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Move
    }

    fn phase(&self) -> ToolPhase {
        if self.last.is_some() {
            ToolPhase::Engaged
        } else {
            ToolPhase::Idle
        }
    }

    fn pointer_down(&mut self, _ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect {
        self.last = Some(at.screen);
        ToolEffect::None
    }

    fn pointer_move(&mut self, _ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect {
        let Some(last) = self.last.replace(at.screen) else {
            return ToolEffect::None;
        };
        ToolEffect::Pan {
            dx: at.screen.x - last.x,
            dy: at.screen.y - last.y,
        }
    }

    fn pointer_up(&mut self, _ctx: &ToolContext<'_>, _at: PointerSample) -> ToolEffect {
        self.last = None;
        ToolEffect::None
    }

    fn pointer_leave(&mut self, _ctx: &ToolContext<'_>) -> ToolEffect {
        self.last = None;
        ToolEffect::None
    }

    fn cancel(&mut self) {
        self.last = None;
    }

    fn preview(&self, _out: &mut ToolPreview) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::Fixture;

    #[test]
    fn drag_reports_screen_deltas() {
        let fx = Fixture::new();
        let mut tool = MoveTool::default();
        let start = PointerSample::at(&fx.camera, ScreenPoint::new(100.0, 100.0));
        let next = PointerSample::at(&fx.camera, ScreenPoint::new(130.0, 90.0));
        assert_eq!(tool.pointer_move(&fx.ctx(), next), ToolEffect::None);
        tool.pointer_down(&fx.ctx(), start);
        assert_eq!(
            tool.pointer_move(&fx.ctx(), next),
            ToolEffect::Pan { dx: 30.0, dy: -10.0 }
        );
        tool.pointer_up(&fx.ctx(), next);
        assert_eq!(tool.phase(), ToolPhase::Idle);
    }
}
