use plotcanvas_shared::{Plot, PlotId, Polygon, Vertex, can_afford, charge_for, validate_polygon};

use super::{
    PointerSample, ToolBehavior, ToolContext, ToolEffect, ToolKey, ToolKind, ToolPhase,
    ToolPreview,
};
use crate::camera::{Camera, ScreenPoint, WorldPoint};
use crate::error::EngineError;
use crate::sync::EditDraft;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    /// Press on empty canvas; becomes a rectangle if the pointer moves to
    /// another pixel, otherwise the first polygon vertex.
    Rect {
        anchor: (i32, i32),
        current: (i32, i32),
    },
    Vertex(usize),
    Translate {
        last: Vertex,
    },
}

/// Draws plot outlines: drag for a rectangle, click vertex by vertex for a
/// free polygon. Clicking the first vertex or pressing Enter commits.
#[derive(Debug, Default)]
pub struct ClaimerTool {
    vertices: Vec<Vertex>,
    closed: bool,
    editing: Option<(PlotId, Polygon)>,
    drag: Option<Drag>,
}

impl ClaimerTool {
    /// Load an existing plot for reshaping.
    pub fn begin_edit(&mut self, plot: &Plot) {
        self.vertices = plot.polygon.vertices.clone();
        self.closed = true;
        self.editing = Some((plot.id, plot.polygon.clone()));
        self.drag = None;
    }

    pub fn editing(&self) -> Option<PlotId> {
        self.editing.as_ref().map(|(id, _)| *id)
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    fn reset(&mut self) {
        self.vertices.clear();
        self.closed = false;
        self.editing = None;
        self.drag = None;
    }

    fn hit_vertex(&self, camera: &Camera, screen: ScreenPoint, radius: f64) -> Option<usize> {
        self.vertices
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let at = camera.to_screen(WorldPoint::new(v.x as f64, v.y as f64));
                (i, (at.x - screen.x).hypot(at.y - screen.y))
            })
            .filter(|(_, distance)| *distance <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    fn contains(&self, world: WorldPoint) -> bool {
        self.vertices.len() >= 3 && Polygon::new(self.vertices.clone()).contains_point(world.x, world.y)
    }

    /// Validate, price and pre-flight the draft. The draft survives failures.
    fn commit(&mut self, ctx: &ToolContext<'_>) -> ToolEffect {
        let polygon = match validate_polygon(&self.vertices) {
            Ok(polygon) => polygon,
            Err(err) => return ToolEffect::Failed(EngineError::InvalidPolygon(err)),
        };
        let cost = charge_for(self.editing.as_ref().map(|(_, p)| p), &polygon);
        let balance = ctx.balance.unwrap_or(0);
        if !can_afford(balance, cost) {
            return ToolEffect::Failed(EngineError::InsufficientBalance { cost, balance });
        }
        let plot_id = self.editing();
        self.reset();
        ToolEffect::Commit {
            draft: EditDraft::Polygon { polygon, plot_id },
            cost,
        }
    }
}

fn rectangle(anchor: (i32, i32), current: (i32, i32)) -> Vec<Vertex> {
    let (min_x, max_x) = (anchor.0.min(current.0), anchor.0.max(current.0) + 1);
    let (min_y, max_y) = (anchor.1.min(current.1), anchor.1.max(current.1) + 1);
    Polygon::rectangle(min_x, min_y, max_x, max_y).vertices
}

impl ToolBehavior for ClaimerTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Claimer
    }

    fn phase(&self) -> ToolPhase {
        if self.vertices.is_empty() && self.drag.is_none() && self.editing.is_none() {
            ToolPhase::Idle
        } else {
            ToolPhase::Engaged
        }
    }

    fn pointer_down(&mut self, ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect {
        if self.vertices.is_empty() {
            self.drag = Some(Drag::Rect {
                anchor: at.pixel,
                current: at.pixel,
            });
            return ToolEffect::Preview;
        }

        let hit = self.hit_vertex(ctx.camera, at.screen, ctx.config.handle_radius_px);
        match hit {
            Some(0) if !self.closed && self.vertices.len() >= 3 => {
                self.closed = true;
                self.commit(ctx)
            }
            Some(index) => {
                self.drag = Some(Drag::Vertex(index));
                ToolEffect::Preview
            }
            None if self.closed => {
                if self.contains(at.world) {
                    self.drag = Some(Drag::Translate { last: at.vertex() });
                    ToolEffect::Preview
                } else {
                    ToolEffect::None
                }
            }
            None => {
                let vertex = at.vertex();
                if self.vertices.last() != Some(&vertex) {
                    self.vertices.push(vertex);
                }
                ToolEffect::Preview
            }
        }
    }

    fn pointer_move(&mut self, _ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect {
        match &mut self.drag {
            Some(Drag::Rect { current, .. }) => {
                if *current == at.pixel {
                    return ToolEffect::None;
                }
                *current = at.pixel;
            }
            Some(Drag::Vertex(index)) => {
                let vertex = at.vertex();
                let Some(slot) = self.vertices.get_mut(*index) else {
                    return ToolEffect::None;
                };
                if *slot == vertex {
                    return ToolEffect::None;
                }
                *slot = vertex;
            }
            Some(Drag::Translate { last }) => {
                let vertex = at.vertex();
                let (dx, dy) = (vertex.x - last.x, vertex.y - last.y);
                if dx == 0 && dy == 0 {
                    return ToolEffect::None;
                }
                *last = vertex;
                for v in &mut self.vertices {
                    v.x += dx;
                    v.y += dy;
                }
            }
            None => return ToolEffect::None,
        }
        ToolEffect::Preview
    }

    fn pointer_up(&mut self, ctx: &ToolContext<'_>, at: PointerSample) -> ToolEffect {
        match self.drag.take() {
            Some(Drag::Rect { anchor, current }) if anchor != current => {
                self.vertices = rectangle(anchor, current);
                self.closed = true;
                self.commit(ctx)
            }
            Some(Drag::Rect { .. }) => {
                self.vertices.push(at.vertex());
                ToolEffect::Preview
            }
            Some(Drag::Vertex(_)) | Some(Drag::Translate { .. }) => ToolEffect::Preview,
            None => ToolEffect::None,
        }
    }

    fn key(&mut self, ctx: &ToolContext<'_>, key: ToolKey) -> ToolEffect {
        match key {
            ToolKey::Enter if self.vertices.len() >= 3 => {
                self.closed = true;
                self.commit(ctx)
            }
            ToolKey::Backspace if !self.vertices.is_empty() => {
                self.vertices.pop();
                self.closed = false;
                self.drag = None;
                ToolEffect::Preview
            }
            _ => ToolEffect::None,
        }
    }

    fn cancel(&mut self) {
        self.reset();
    }

    fn preview(&self, out: &mut ToolPreview) {
        if let Some(Drag::Rect { anchor, current }) = self.drag {
            if anchor != current {
                out.outline = rectangle(anchor, current);
                out.outline_closed = true;
                return;
            }
        }
        out.outline.extend_from_slice(&self.vertices);
        out.outline_closed = self.closed;
        out.handles.extend_from_slice(&self.vertices);
    }
}
