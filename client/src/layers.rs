//! CPU compositor for the four canvas layers.
//!
//! Background (tiles), Realtime (confirmed pushes), Telegraph (in-flight
//! edits and tool preview) and UI (grid, outlines, handles, cursor) are each
//! a viewport-sized RGBA surface, blended bottom to top with source-over.
//! The host blits [`Surface::as_bytes`] into a 2D canvas.

use bytemuck::{Pod, Zeroable};
use plotcanvas_shared::palette;
use plotcanvas_shared::tile::covering;
use plotcanvas_shared::{PlotId, Polygon, Vertex};

use crate::camera::{Camera, ScreenPoint, WorldPoint};
use crate::config::EngineConfig;
use crate::plots::PlotStore;
use crate::realtime::RealtimeLayer;
use crate::telegraph::Telegraph;
use crate::tile_cache::{TileCache, TileState};
use crate::tools::{ToolPreview, bresenham, footprint};

const CHECKER_CELL_PX: usize = 8;
const CHECKER_LIGHT: Rgba = Rgba::rgb(0xEC, 0xEC, 0xEC);
const CHECKER_DARK: Rgba = Rgba::rgb(0xDA, 0xDA, 0xDA);
const GRID: Rgba = Rgba::new(0x00, 0x00, 0x00, 0x28);
const PLOT_OUTLINE: Rgba = Rgba::new(0x1F, 0x4E, 0xD8, 0xC0);
const PLOT_SELECTED: Rgba = Rgba::rgb(0xF6, 0xAA, 0x09);
const PENDING_OUTLINE: Rgba = Rgba::new(0x1F, 0x4E, 0xD8, 0x70);
const DRAFT_OUTLINE: Rgba = Rgba::rgb(0xED, 0x1C, 0x24);
const HANDLE_FILL: Rgba = Rgba::rgb(0xFF, 0xFF, 0xFF);
const HANDLE_BORDER: Rgba = Rgba::rgb(0x20, 0x20, 0x20);
const CURSOR: Rgba = Rgba::new(0x20, 0x20, 0x20, 0xB0);

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 0xFF)
    }

    /// Opaque colour of a palette index; unset renders as paper.
    pub fn palette(index: u8) -> Self {
        let (r, g, b) = palette::rgb(index);
        Self::rgb(r, g, b)
    }

    /// `self` composited over `dst` (straight alpha).
    pub fn over(self, dst: Rgba) -> Rgba {
        match self.a {
            0 => dst,
            0xFF => self,
            alpha => {
                let sa = alpha as u32;
                let inv = 0xFF - sa;
                let dw = dst.a as u32 * inv / 0xFF;
                let out_a = sa + dw;
                if out_a == 0 {
                    return Rgba::TRANSPARENT;
                }
                let channel = |s: u8, d: u8| ((s as u32 * sa + d as u32 * dw) / out_a) as u8;
                Rgba::new(
                    channel(self.r, dst.r),
                    channel(self.g, dst.g),
                    channel(self.b, dst.b),
                    out_a as u8,
                )
            }
        }
    }
}

/// Row-major RGBA pixels for one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgba::TRANSPARENT; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(self.index(x as usize, y as usize)).copied()
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    /// RGBA8 bytes ready for `ImageData`.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels
            .resize(width as usize * height as usize, Rgba::TRANSPARENT);
    }

    fn clear(&mut self) {
        self.pixels.fill(Rgba::TRANSPARENT);
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width as usize + x
    }

    /// Overwrite a clipped screen rect; `x1`/`y1` exclusive.
    fn fill(&mut self, x0: usize, y0: usize, x1: usize, y1: usize, color: Rgba) {
        let x1 = x1.min(self.width as usize);
        let y1 = y1.min(self.height as usize);
        for y in y0..y1 {
            let row = self.index(0, y);
            if x0 < x1 {
                self.pixels[row + x0..row + x1].fill(color);
            }
        }
    }

    fn blend(&mut self, x: i64, y: i64, color: Rgba) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let index = self.index(x as usize, y as usize);
        self.pixels[index] = color.over(self.pixels[index]);
    }

    fn composite_from(&mut self, base: &Surface) {
        self.pixels.copy_from_slice(&base.pixels);
    }

    fn composite_over(&mut self, layer: &Surface) {
        for (dst, src) in self.pixels.iter_mut().zip(&layer.pixels) {
            if src.a != 0 {
                *dst = src.over(*dst);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Background,
    Realtime,
    Telegraph,
    Ui,
}

impl Layer {
    pub const ALL: [Layer; 4] = [Self::Background, Self::Realtime, Self::Telegraph, Self::Ui];

    fn index(self) -> usize {
        self as usize
    }
}

/// Brush/eraser/line footprint under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorFootprint {
    pub pixel: (i32, i32),
    pub size: u8,
}

/// Read-only inputs for one frame.
#[derive(Clone, Copy)]
pub struct RenderSnapshot<'a> {
    pub camera: &'a Camera,
    pub tiles: &'a TileCache,
    pub realtime: &'a RealtimeLayer,
    pub telegraph: &'a Telegraph,
    pub preview: &'a ToolPreview,
    pub plots: &'a PlotStore,
    pub selected_plot: Option<PlotId>,
    pub cursor: Option<CursorFootprint>,
    pub show_grid: bool,
    pub config: &'a EngineConfig,
}

/// Screen-space range covered by one world pixel along an axis, clipped to
/// `[0, limit)`; end exclusive.
fn span(world: i32, origin: f64, zoom: f64, limit: u32) -> Option<(usize, usize)> {
    let start = ((world as f64 - origin) * zoom).floor().max(0.0);
    let end = ((world as f64 + 1.0 - origin) * zoom)
        .floor()
        .min(limit as f64);
    (start < end).then_some((start as usize, end as usize))
}

/// Liang-Barsky clip of a segment against `[0, w) x [0, h)`.
fn clip(a: ScreenPoint, b: ScreenPoint, w: u32, h: u32) -> Option<(ScreenPoint, ScreenPoint)> {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    let edges = [
        (-dx, a.x),
        (dx, w as f64 - 1.0 - a.x),
        (-dy, a.y),
        (dy, h as f64 - 1.0 - a.y),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    Some((
        ScreenPoint::new(a.x + t0 * dx, a.y + t0 * dy),
        ScreenPoint::new(a.x + t1 * dx, a.y + t1 * dy),
    ))
}

fn stroke(surface: &mut Surface, a: ScreenPoint, b: ScreenPoint, color: Rgba) {
    let Some((a, b)) = clip(a, b, surface.width, surface.height) else {
        return;
    };
    let from = (a.x.round() as i32, a.y.round() as i32);
    let to = (b.x.round() as i32, b.y.round() as i32);
    for (x, y) in bresenham(from, to) {
        surface.blend(x as i64, y as i64, color);
    }
}

fn outline(surface: &mut Surface, camera: &Camera, vertices: &[Vertex], closed: bool, color: Rgba) {
    let at = |v: &Vertex| camera.to_screen(WorldPoint::new(v.x as f64, v.y as f64));
    for pair in vertices.windows(2) {
        stroke(surface, at(&pair[0]), at(&pair[1]), color);
    }
    if closed && vertices.len() > 2 {
        if let (Some(first), Some(last)) = (vertices.first(), vertices.last()) {
            stroke(surface, at(last), at(first), color);
        }
    }
}

fn polygon_visible(polygon: &Polygon, bounds: (i32, i32, i32, i32)) -> bool {
    polygon.bounds().is_some_and(|(min_x, min_y, max_x, max_y)| {
        max_x >= bounds.0 && min_x <= bounds.2 + 1 && max_y >= bounds.1 && min_y <= bounds.3 + 1
    })
}

/// Four layer surfaces plus the composited result.
pub struct LayerStack {
    width: u32,
    height: u32,
    surfaces: [Surface; 4],
    composite: Surface,
    background_key: Option<(Camera, u64)>,
    realtime_key: Option<(Camera, u64)>,
    repaints: [u64; 4],
}

impl LayerStack {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            surfaces: std::array::from_fn(|_| Surface::new(width, height)),
            composite: Surface::new(width, height),
            background_key: None,
            realtime_key: None,
            repaints: [0; 4],
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Reflow every surface. Cached layers repaint on the next draw.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        for surface in &mut self.surfaces {
            surface.resize(width, height);
        }
        self.composite.resize(width, height);
        self.background_key = None;
        self.realtime_key = None;
    }

    pub fn layer(&self, layer: Layer) -> &Surface {
        &self.surfaces[layer.index()]
    }

    pub fn composite(&self) -> &Surface {
        &self.composite
    }

    /// How many times a layer has been repainted.
    pub fn repaints(&self, layer: Layer) -> u64 {
        self.repaints[layer.index()]
    }

    pub fn draw(&mut self, snapshot: &RenderSnapshot<'_>) -> &Surface {
        let camera = *snapshot.camera;

        let background_key = Some((camera, snapshot.tiles.generation()));
        if self.background_key != background_key {
            self.paint_background(snapshot);
            self.background_key = background_key;
        }

        let realtime_key = Some((camera, snapshot.realtime.generation()));
        if self.realtime_key != realtime_key {
            self.paint_realtime(snapshot);
            self.realtime_key = realtime_key;
        }

        self.paint_telegraph(snapshot);
        self.paint_ui(snapshot);

        let [background, realtime, telegraph, ui] = &self.surfaces;
        self.composite.composite_from(background);
        for layer in [realtime, telegraph, ui] {
            self.composite.composite_over(layer);
        }
        &self.composite
    }

    fn bump(&mut self, layer: Layer) -> &mut Surface {
        self.repaints[layer.index()] += 1;
        &mut self.surfaces[layer.index()]
    }

    fn paint_background(&mut self, snapshot: &RenderSnapshot<'_>) {
        let camera = *snapshot.camera;
        let tiles = snapshot.tiles;
        let (w, h) = (self.width, self.height);
        let (min_x, min_y, max_x, max_y) = camera.visible_rect(w, h).pixel_bounds();
        let surface = self.bump(Layer::Background);

        for key in covering(min_x, min_y, max_x, max_y, tiles.tile_size()) {
            let last = key.size as i32 - 1;
            let x0 = key.origin_x.max(min_x);
            let y0 = key.origin_y.max(min_y);
            let x1 = (key.origin_x + last).min(max_x);
            let y1 = (key.origin_y + last).min(max_y);

            match tiles.get(&key) {
                TileState::Ready(bytes) => {
                    for wy in y0..=y1 {
                        let Some((sy0, sy1)) = span(wy, camera.y, camera.zoom, h) else {
                            continue;
                        };
                        for wx in x0..=x1 {
                            let Some((sx0, sx1)) = span(wx, camera.x, camera.zoom, w) else {
                                continue;
                            };
                            let color = key
                                .local_offset(wx, wy)
                                .and_then(|offset| bytes.get(offset))
                                .copied()
                                .unwrap_or(palette::UNSET);
                            surface.fill(sx0, sy0, sx1, sy1, Rgba::palette(color));
                        }
                    }
                }
                TileState::Absent | TileState::Loading => {
                    let (Some((sx0, _)), Some((_, sx1))) = (
                        span(x0, camera.x, camera.zoom, w),
                        span(x1, camera.x, camera.zoom, w),
                    ) else {
                        continue;
                    };
                    let (Some((sy0, _)), Some((_, sy1))) = (
                        span(y0, camera.y, camera.zoom, h),
                        span(y1, camera.y, camera.zoom, h),
                    ) else {
                        continue;
                    };
                    for sy in sy0..sy1 {
                        for sx in sx0..sx1 {
                            let light = (sx / CHECKER_CELL_PX + sy / CHECKER_CELL_PX) % 2 == 0;
                            let color = if light { CHECKER_LIGHT } else { CHECKER_DARK };
                            surface.fill(sx, sy, sx + 1, sy + 1, color);
                        }
                    }
                }
            }
        }
    }

    fn paint_realtime(&mut self, snapshot: &RenderSnapshot<'_>) {
        let camera = *snapshot.camera;
        let (w, h) = (self.width, self.height);
        let surface = self.bump(Layer::Realtime);
        surface.clear();
        for pixel in snapshot.realtime.iter() {
            fill_pixel(surface, &camera, pixel.x, pixel.y, Rgba::palette(pixel.color), w, h);
        }
    }

    fn paint_telegraph(&mut self, snapshot: &RenderSnapshot<'_>) {
        let camera = *snapshot.camera;
        let (w, h) = (self.width, self.height);
        let surface = self.bump(Layer::Telegraph);
        surface.clear();

        for pixel in snapshot.telegraph.pixels() {
            fill_pixel(surface, &camera, pixel.x, pixel.y, Rgba::palette(pixel.color), w, h);
        }
        for pixel in &snapshot.preview.pixels {
            fill_pixel(surface, &camera, pixel.x, pixel.y, Rgba::palette(pixel.color), w, h);
        }
        for polygon in snapshot.telegraph.polygons() {
            outline(surface, &camera, &polygon.vertices, true, PENDING_OUTLINE);
        }
    }

    fn paint_ui(&mut self, snapshot: &RenderSnapshot<'_>) {
        let camera = *snapshot.camera;
        let (w, h) = (self.width, self.height);
        let bounds = camera.visible_rect(w, h).pixel_bounds();
        let handle_half = (snapshot.config.handle_radius_px / 2.0).max(2.0);
        let surface = self.bump(Layer::Ui);
        surface.clear();

        if snapshot.show_grid && camera.zoom >= snapshot.config.grid_min_zoom {
            let (min_x, min_y, max_x, max_y) = bounds;
            for wx in min_x..=max_x + 1 {
                let sx = ((wx as f64 - camera.x) * camera.zoom).round() as i64;
                for sy in 0..h as i64 {
                    surface.blend(sx, sy, GRID);
                }
            }
            for wy in min_y..=max_y + 1 {
                let sy = ((wy as f64 - camera.y) * camera.zoom).round() as i64;
                for sx in 0..w as i64 {
                    surface.blend(sx, sy, GRID);
                }
            }
        }

        for plot in snapshot.plots.iter() {
            if !polygon_visible(&plot.polygon, bounds) {
                continue;
            }
            let color = if snapshot.selected_plot == Some(plot.id) {
                PLOT_SELECTED
            } else {
                PLOT_OUTLINE
            };
            outline(surface, &camera, &plot.polygon.vertices, true, color);
        }

        let preview = snapshot.preview;
        outline(
            surface,
            &camera,
            &preview.outline,
            preview.outline_closed,
            DRAFT_OUTLINE,
        );
        for handle in &preview.handles {
            let at = camera.to_screen(WorldPoint::new(handle.x as f64, handle.y as f64));
            let (cx, cy) = (at.x.round() as i64, at.y.round() as i64);
            let r = handle_half.round() as i64;
            for y in cy - r..=cy + r {
                for x in cx - r..=cx + r {
                    let border = x == cx - r || x == cx + r || y == cy - r || y == cy + r;
                    surface.blend(x, y, if border { HANDLE_BORDER } else { HANDLE_FILL });
                }
            }
        }

        if let Some(cursor) = snapshot.cursor {
            let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
            let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);
            for (x, y) in footprint(cursor.pixel, cursor.size) {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x + 1);
                max_y = max_y.max(y + 1);
            }
            let ring = Polygon::rectangle(min_x, min_y, max_x, max_y);
            outline(surface, &camera, &ring.vertices, true, CURSOR);
        }
    }
}

fn fill_pixel(surface: &mut Surface, camera: &Camera, x: i32, y: i32, color: Rgba, w: u32, h: u32) {
    let (Some((sx0, sx1)), Some((sy0, sy1))) =
        (span(x, camera.x, camera.zoom, w), span(y, camera.y, camera.zoom, h))
    else {
        return;
    };
    surface.fill(sx0, sy0, sx1, sy1, color);
}

#[cfg(test)]
mod tests {
    use plotcanvas_shared::Pixel;

    use super::*;

    struct Scene {
        camera: Camera,
        tiles: TileCache,
        realtime: RealtimeLayer,
        telegraph: Telegraph,
        preview: ToolPreview,
        plots: PlotStore,
        config: EngineConfig,
    }

    impl Scene {
        fn new(camera: Camera, width: u32, height: u32) -> Self {
            let config = EngineConfig::default();
            Self {
                camera,
                tiles: TileCache::new(&config),
                realtime: RealtimeLayer::new(),
                telegraph: Telegraph::new(),
                preview: ToolPreview::default(),
                plots: PlotStore::new(),
                config,
            }
            .with_viewport(width, height)
        }

        fn with_viewport(mut self, width: u32, height: u32) -> Self {
            let visible = self.camera.visible_rect(width, height);
            self.tiles.request(&visible);
            self
        }

        fn load_all(&mut self, width: u32, height: u32) {
            let visible = self.camera.visible_rect(width, height);
            let (min_x, min_y, max_x, max_y) = visible.pixel_bounds();
            for key in covering(min_x, min_y, max_x, max_y, self.tiles.tile_size()) {
                let bytes = vec![palette::UNSET; key.byte_len()];
                assert!(self.tiles.complete(key, bytes, 1, 0.0).is_ok());
            }
        }

        fn snapshot(&self) -> RenderSnapshot<'_> {
            RenderSnapshot {
                camera: &self.camera,
                tiles: &self.tiles,
                realtime: &self.realtime,
                telegraph: &self.telegraph,
                preview: &self.preview,
                plots: &self.plots,
                selected_plot: None,
                cursor: None,
                show_grid: true,
                config: &self.config,
            }
        }
    }

    #[test]
    fn source_over_blending() {
        let black = Rgba::rgb(0, 0, 0);
        assert_eq!(Rgba::TRANSPARENT.over(black), black);
        assert_eq!(Rgba::rgb(9, 9, 9).over(black), Rgba::rgb(9, 9, 9));
        let half_white = Rgba::new(0xFF, 0xFF, 0xFF, 0x80);
        assert_eq!(half_white.over(black), Rgba::rgb(0x80, 0x80, 0x80));
        assert_eq!(half_white.over(Rgba::TRANSPARENT), half_white);
    }

    #[test]
    fn surface_bytes_are_rgba8() {
        let mut surface = Surface::new(3, 2);
        surface.fill(1, 0, 2, 1, Rgba::rgb(1, 2, 3));
        let bytes = surface.as_bytes();
        assert_eq!(bytes.len(), 3 * 2 * 4);
        assert_eq!(&bytes[4..8], &[1, 2, 3, 0xFF]);
    }

    #[test]
    fn unloaded_tiles_draw_checker() {
        let scene = Scene::new(Camera::new(0.0, 0.0, 4.0), 32, 32);
        let mut stack = LayerStack::new(32, 32);
        let frame = stack.draw(&scene.snapshot());
        assert_eq!(frame.get(0, 0), Some(CHECKER_LIGHT));
        assert_eq!(frame.get(CHECKER_CELL_PX as u32, 0), Some(CHECKER_DARK));
    }

    #[test]
    fn telegraph_draws_over_realtime_over_tiles() {
        let mut scene = Scene::new(Camera::new(0.0, 0.0, 4.0), 16, 16);
        scene.load_all(16, 16);
        scene.realtime.apply(&[Pixel::new(1, 1, 3)], 2);
        scene.telegraph.insert_pixels(1, &[Pixel::new(1, 1, 9)]);

        let mut stack = LayerStack::new(16, 16);
        assert_eq!(stack.draw(&scene.snapshot()).get(5, 5), Some(Rgba::palette(9)));
        assert_eq!(stack.composite().get(0, 0), Some(Rgba::palette(palette::UNSET)));

        scene.telegraph.remove(1);
        assert_eq!(stack.draw(&scene.snapshot()).get(5, 5), Some(Rgba::palette(3)));
    }

    #[test]
    fn cached_layers_repaint_only_on_change() {
        let mut scene = Scene::new(Camera::new(0.0, 0.0, 4.0), 16, 16);
        let mut stack = LayerStack::new(16, 16);
        stack.draw(&scene.snapshot());
        stack.draw(&scene.snapshot());
        assert_eq!(stack.repaints(Layer::Background), 1);
        assert_eq!(stack.repaints(Layer::Realtime), 1);
        assert_eq!(stack.repaints(Layer::Telegraph), 2);
        assert_eq!(stack.repaints(Layer::Ui), 2);

        scene.realtime.apply(&[Pixel::new(0, 0, 5)], 1);
        stack.draw(&scene.snapshot());
        assert_eq!(stack.repaints(Layer::Background), 1);
        assert_eq!(stack.repaints(Layer::Realtime), 2);

        scene.camera.pan_screen(4.0, 0.0);
        stack.draw(&scene.snapshot());
        assert_eq!(stack.repaints(Layer::Background), 2);

        stack.resize(20, 10);
        assert_eq!(stack.size(), (20, 10));
        let frame = stack.draw(&scene.snapshot());
        assert_eq!((frame.width(), frame.height()), (20, 10));
        assert_eq!(stack.repaints(Layer::Background), 3);
    }

    #[test]
    fn grid_appears_from_zoom_eight() {
        let scene = Scene::new(Camera::new(0.0, 0.0, 8.0), 32, 32);
        let mut stack = LayerStack::new(32, 32);
        stack.draw(&scene.snapshot());
        assert_eq!(stack.layer(Layer::Ui).get(8, 3).map(|c| c.a), Some(GRID.a));

        let zoomed_out = Scene::new(Camera::new(0.0, 0.0, 4.0), 32, 32);
        stack.draw(&zoomed_out.snapshot());
        assert_eq!(stack.layer(Layer::Ui).get(8, 3), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn claimer_handles_and_outline_are_drawn() {
        let mut scene = Scene::new(Camera::new(0.0, 0.0, 4.0), 64, 64);
        scene.preview.outline = Polygon::rectangle(2, 2, 10, 10).vertices;
        scene.preview.outline_closed = true;
        scene.preview.handles = scene.preview.outline.clone();

        let mut stack = LayerStack::new(64, 64);
        stack.draw(&scene.snapshot());
        let ui = stack.layer(Layer::Ui);
        assert_eq!(ui.get(8, 8), Some(HANDLE_FILL));
        assert_eq!(ui.get(24, 8), Some(DRAFT_OUTLINE));
        assert_eq!(ui.get(24, 24), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn far_away_segments_are_clipped() {
        let mut surface = Surface::new(10, 10);
        stroke(
            &mut surface,
            ScreenPoint::new(-1.0e8, 5.0),
            ScreenPoint::new(1.0e8, 5.0),
            Rgba::rgb(1, 1, 1),
        );
        assert!((0..10).all(|x| surface.get(x, 5) == Some(Rgba::rgb(1, 1, 1))));
        assert_eq!(surface.get(0, 4), Some(Rgba::TRANSPARENT));
    }
}
