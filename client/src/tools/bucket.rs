use std::collections::HashSet;

use plotcanvas_shared::Pixel;

use super::{
    PixelSource, PointerSample, ToolBehavior, ToolContext, ToolEffect, ToolKind, ToolPhase,
    ToolPreview,
};
use crate::error::EngineError;
use crate::sync::EditDraft;

#[derive(Debug, Default)]
pub struct BucketTool {
    pressed: bool,
}

/// 4-connected fill of the region sharing the start pixel's colour. Only
/// loaded pixels take part; more than `limit` pixels fails the fill.
pub fn flood_fill(
    colors: &dyn PixelSource,
    start: (i32, i32),
    replacement: u8,
    limit: usize,
) -> Result<Vec<Pixel>, EngineError> {
    let Some(target) = colors.color_at(start.0, start.1) else {
        return Err(EngineError::FillOutsideLoadedTiles);
    };
    if target == replacement {
        return Ok(Vec::new());
    }

    let mut visited: HashSet<(i32, i32)> = HashSet::new();
    let mut stack = vec![start];
    let mut filled = Vec::new();
    visited.insert(start);

    while let Some((x, y)) = stack.pop() {
        filled.push(Pixel::new(x, y, replacement));
        if filled.len() > limit {
            return Err(EngineError::FillTooLarge { limit });
        }
        for next in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
            if !visited.contains(&next) && colors.color_at(next.0, next.1) == Some(target) {
                visited.insert(next);
                stack.push(next);
            }
        }
    }
    Ok(filled)
}

impl ToolBehavior for BucketTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Bucket
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
        match flood_fill(
            ctx.colors,
            at.pixel,
            ctx.settings.color,
            ctx.config.max_fill_pixels,
        ) {
            Ok(pixels) if pixels.is_empty() => ToolEffect::None,
            Ok(pixels) => ToolEffect::Commit {
                draft: EditDraft::Pixels(pixels),
                cost: 0,
            },
            Err(err) => ToolEffect::Failed(err),
        }
    }

    fn cancel(&mut self) {
        self.pressed = false;
    }

    fn preview(&self, _out: &mut ToolPreview) {}
}
