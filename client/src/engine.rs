//! The single owner of canvas state.
//!
//! Inputs arrive as [`Command`]s (user intent, applied at once) and
//! [`NetworkEvent`]s (buffered by [`CanvasEngine::enqueue`] and applied by
//! [`CanvasEngine::tick`] between frames). Everything else reads through
//! selector methods or listens to [`EngineEvent`]s.

use std::collections::VecDeque;

use plotcanvas_shared::{
    CurrentUser, MAX_PIXELS_PER_EDIT, Plot, PlotId, PlotMutationResponse, PlotView,
    RejectReason, Revision, ServerMessage, TileKey, in_bounds, validate_plot_meta,
};

use crate::camera::{Camera, CameraDelta, ScreenPoint, WorldPoint};
use crate::config::EngineConfig;
use crate::error::{EngineError, Notice};
use crate::layers::{CursorFootprint, LayerStack, RenderSnapshot, Surface};
use crate::plots::{PlotRequest, PlotStore};
use crate::query::{QueryDebounce, camera_query, parse_camera_query};
use crate::realtime::{RealtimeLayer, TileFate};
use crate::settings::{SettingsUpdate, ToolSettings};
use crate::sync::{ConnectionState, EditDraft, Resolution, SyncEngine, Transport};
use crate::telegraph::Telegraph;
use crate::tile_cache::TileCache;
use crate::tools::{
    PixelSource, PointerSample, ToolContext, ToolEffect, ToolKey, ToolKind, ToolMachine,
    ToolPhase, ToolPreview,
};

const MAX_NOTICES: usize = 8;

fn tile_fate(tiles: &TileCache, key: &TileKey) -> TileFate {
    if tiles.is_fetching(key) {
        TileFate::Keep
    } else if tiles.is_resident(key) {
        TileFate::Fold
    } else {
        TileFate::Drop
    }
}

/// User intent.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    MoveCamera(CameraDelta),
    ZoomAt { screen: ScreenPoint, zoom: f64 },
    Wheel { delta: f64, screen: ScreenPoint },
    CenterOn(WorldPoint),
    Resize { width: u32, height: u32 },
    SelectTool(ToolKind),
    UpdateSettings(SettingsUpdate),
    RestoreSettings(ToolSettings),
    PointerDown(ScreenPoint),
    PointerMove(ScreenPoint),
    PointerUp(ScreenPoint),
    PointerLeave,
    Key(ToolKey),
    SignIn(CurrentUser),
    SignOut,
    SelectPlot(Option<PlotId>),
    EditPlot(PlotId),
    UpdatePlotMeta {
        id: PlotId,
        name: String,
        description: String,
    },
    DeletePlot(PlotId),
    LoadPlots(PlotView),
    DismissNotice(u64),
}

/// Results of host I/O, fed back through [`CanvasEngine::enqueue`].
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Connected,
    Disconnected,
    Message(ServerMessage),
    TileLoaded {
        key: TileKey,
        bytes: Vec<u8>,
        revision: Revision,
    },
    TileFailed {
        key: TileKey,
        reason: String,
    },
    PlotsListed(Vec<Plot>),
    PlotUpdated(PlotMutationResponse),
    PlotRemoved {
        id: PlotId,
        new_balance: i64,
    },
    PlotRequestFailed {
        reason: String,
    },
    /// Answer of the authentication collaborator; `None` when signed out.
    Me(Option<CurrentUser>),
}

/// Work the engine needs the host to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostTask {
    FetchTile(TileKey),
    Plot(PlotRequest),
    /// Replace the page query string.
    WriteQuery(String),
}

/// Published to subscribers after state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    CameraMoved(Camera),
    ToolChanged(ToolKind),
    SettingsChanged(ToolSettings),
    BalanceChanged(i64),
    UserChanged(Option<CurrentUser>),
    ConnectionChanged(ConnectionState),
    EditResolved { sequence_id: u64, accepted: bool },
    PlotsChanged,
    PlotSelected(Option<PlotId>),
    Notice(Notice),
}

pub type SubscriptionId = u64;

type Subscriber = Box<dyn FnMut(&EngineEvent)>;

/// Effective colour lookup: Telegraph over Realtime over Background, and
/// nothing at all where the tile is not loaded.
pub struct EffectiveColors<'a> {
    pub tiles: &'a TileCache,
    pub realtime: &'a RealtimeLayer,
    pub telegraph: &'a Telegraph,
}

impl PixelSource for EffectiveColors<'_> {
    fn color_at(&self, x: i32, y: i32) -> Option<u8> {
        let background = self.tiles.color_at(x, y)?;
        Some(
            self.telegraph
                .color_at(x, y)
                .or_else(|| self.realtime.get(x, y))
                .unwrap_or(background),
        )
    }
}

#[derive(Clone, Copy)]
enum Pointer {
    Down,
    Move,
    Up,
}

pub struct CanvasEngine<T: Transport> {
    config: EngineConfig,
    camera: Camera,
    viewport: (u32, u32),
    tiles: TileCache,
    realtime: RealtimeLayer,
    sync: SyncEngine,
    transport: T,
    tools: ToolMachine,
    settings: ToolSettings,
    plots: PlotStore,
    selected_plot: Option<PlotId>,
    user: Option<CurrentUser>,
    hover: Option<PointerSample>,
    preview: ToolPreview,
    layers: LayerStack,
    inbox: VecDeque<NetworkEvent>,
    outbox: Vec<HostTask>,
    notices: VecDeque<Notice>,
    next_notice_id: u64,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscriber: SubscriptionId,
    query: QueryDebounce,
    last_fold_ms: f64,
    now_ms: f64,
}

impl<T: Transport> CanvasEngine<T> {
    pub fn new(config: EngineConfig, session_id: impl Into<String>, transport: T) -> Self {
        let camera = Camera::default();
        let mut query = QueryDebounce::new(config.query_debounce_ms);
        query.seed(camera_query(&camera));
        Self {
            tiles: TileCache::new(&config),
            sync: SyncEngine::new(session_id, &config),
            camera,
            viewport: (0, 0),
            realtime: RealtimeLayer::new(),
            transport,
            tools: ToolMachine::new(ToolKind::Move),
            settings: ToolSettings::default(),
            plots: PlotStore::new(),
            selected_plot: None,
            user: None,
            hover: None,
            preview: ToolPreview::default(),
            layers: LayerStack::new(0, 0),
            inbox: VecDeque::new(),
            outbox: Vec::new(),
            notices: VecDeque::new(),
            next_notice_id: 1,
            subscribers: Vec::new(),
            next_subscriber: 1,
            query,
            last_fold_ms: 0.0,
            now_ms: 0.0,
            config,
        }
    }

    /// Apply a camera from the page query string without writing it back.
    pub fn restore_camera(&mut self, query: &str) {
        self.camera.move_camera(parse_camera_query(query));
        self.query.seed(camera_query(&self.camera));
    }

    /// Open the persistent channel and ask for the first plot listing.
    pub fn start(&mut self, now_ms: f64) {
        self.now_ms = now_ms;
        self.sync.start(&mut self.transport, now_ms);
        self.outbox.push(HostTask::Plot(PlotRequest::List {
            view: PlotView::Recent,
        }));
        self.emit(EngineEvent::ConnectionChanged(self.sync.state()));
    }

    /// Unmount: abandon tile loads and close the channel for good. Returns
    /// the tiles whose fetches the host should abort.
    pub fn shutdown(&mut self) -> Vec<TileKey> {
        let cancelled = self.tiles.cancel_all();
        self.sync.close(&mut self.transport);
        self.inbox.clear();
        self.outbox.clear();
        tracing::info!(cancelled = cancelled.len(), "engine shut down");
        self.emit(EngineEvent::ConnectionChanged(self.sync.state()));
        cancelled
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&EngineEvent) + 'static) -> SubscriptionId {
        let id = self.next_subscriber;
        self.next_subscriber += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    pub fn dispatch(&mut self, command: Command) {
        match command {
            Command::MoveCamera(delta) => {
                self.camera.move_camera(delta);
                self.camera_moved();
            }
            Command::ZoomAt { screen, zoom } => {
                self.camera.zoom_at(screen, zoom);
                self.camera_moved();
            }
            Command::Wheel { delta, screen } => {
                self.camera.zoom_by(delta, screen);
                self.camera_moved();
            }
            Command::CenterOn(world) => {
                let (width, height) = self.viewport;
                self.camera.center_on(world, width, height);
                self.camera_moved();
            }
            Command::Resize { width, height } => {
                self.viewport = (width, height);
                self.layers.resize(width, height);
            }
            Command::SelectTool(kind) => self.select_tool(kind),
            Command::UpdateSettings(update) => {
                if self.settings.apply(update) {
                    self.emit(EngineEvent::SettingsChanged(self.settings.clone()));
                }
            }
            Command::RestoreSettings(settings) => {
                self.settings = settings.sanitized();
                self.emit(EngineEvent::SettingsChanged(self.settings.clone()));
            }
            Command::PointerDown(screen) => self.pointer(Pointer::Down, screen),
            Command::PointerMove(screen) => self.pointer(Pointer::Move, screen),
            Command::PointerUp(screen) => self.pointer(Pointer::Up, screen),
            Command::PointerLeave => {
                self.hover = None;
                let colors = EffectiveColors {
                    tiles: &self.tiles,
                    realtime: &self.realtime,
                    telegraph: self.sync.telegraph(),
                };
                let ctx = ToolContext {
                    camera: &self.camera,
                    settings: &self.settings,
                    colors: &colors,
                    balance: self.available_balance(),
                    config: &self.config,
                };
                let effect = self.tools.pointer_leave(&ctx);
                self.apply_effect(effect);
            }
            Command::Key(key) => {
                let balance = self.available_balance();
                let colors = EffectiveColors {
                    tiles: &self.tiles,
                    realtime: &self.realtime,
                    telegraph: self.sync.telegraph(),
                };
                let ctx = ToolContext {
                    camera: &self.camera,
                    settings: &self.settings,
                    colors: &colors,
                    balance,
                    config: &self.config,
                };
                let effect = self.tools.key(&ctx, key);
                self.apply_effect(effect);
            }
            Command::SignIn(user) => self.set_user(Some(user)),
            Command::SignOut => self.set_user(None),
            Command::SelectPlot(id) => {
                if self.selected_plot != id {
                    self.selected_plot = id;
                    self.emit(EngineEvent::PlotSelected(id));
                }
            }
            Command::EditPlot(id) => self.edit_plot(id),
            Command::UpdatePlotMeta {
                id,
                name,
                description,
            } => match validate_plot_meta(&name, &description) {
                Ok((name, description)) => {
                    self.outbox.push(HostTask::Plot(PlotRequest::UpdateMeta {
                        id,
                        name,
                        description,
                    }));
                }
                Err(err) => self.raise(EngineError::PlotRequestFailed {
                    reason: err.to_string(),
                }),
            },
            Command::DeletePlot(id) => {
                if self.user.is_none() {
                    self.raise(EngineError::SignInRequired {
                        tool: ToolKind::Claimer,
                    });
                    return;
                }
                self.outbox
                    .push(HostTask::Plot(PlotRequest::Delete { id }));
            }
            Command::LoadPlots(view) => {
                self.outbox
                    .push(HostTask::Plot(PlotRequest::List { view }));
            }
            Command::DismissNotice(id) => self.notices.retain(|notice| notice.id != id),
        }
    }

    /// Buffer a network result until the next `tick`.
    pub fn enqueue(&mut self, event: NetworkEvent) {
        self.inbox.push_back(event);
    }

    /// Between-frame housekeeping. Returns the I/O the host should start.
    pub fn tick(&mut self, now_ms: f64) -> Vec<HostTask> {
        self.now_ms = now_ms;
        while let Some(event) = self.inbox.pop_front() {
            self.handle(event);
        }

        if self.sync.poll_reconnect(&mut self.transport, now_ms) {
            self.emit(EngineEvent::ConnectionChanged(self.sync.state()));
        }

        if self.realtime.len() >= self.config.realtime_fold_threshold
            || now_ms - self.last_fold_ms >= self.config.realtime_fold_interval_ms
        {
            self.fold_realtime();
            self.last_fold_ms = now_ms;
        }

        let mut tasks = std::mem::take(&mut self.outbox);
        let (width, height) = self.viewport;
        if width > 0 && height > 0 {
            let visible = self.camera.visible_rect(width, height);
            tasks.extend(self.tiles.request(&visible).into_iter().map(HostTask::FetchTile));
            tasks.extend(
                self.tiles
                    .refresh_due(now_ms, self.config.tile_refresh_ms)
                    .into_iter()
                    .map(HostTask::FetchTile),
            );
        }
        if let Some(query) = self.query.observe(&self.camera, now_ms) {
            tasks.push(HostTask::WriteQuery(query));
        }
        tasks
    }

    /// Composite the four layers for the current state.
    pub fn frame(&mut self) -> &Surface {
        self.tools.preview(&mut self.preview);
        let cursor = self.cursor();
        let snapshot = RenderSnapshot {
            camera: &self.camera,
            tiles: &self.tiles,
            realtime: &self.realtime,
            telegraph: self.sync.telegraph(),
            preview: &self.preview,
            plots: &self.plots,
            selected_plot: self.selected_plot,
            cursor,
            show_grid: self.settings.show_grid,
            config: &self.config,
        };
        self.layers.draw(&snapshot)
    }

    // --- selectors ---

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn tool(&self) -> ToolKind {
        self.tools.kind()
    }

    pub fn tool_phase(&self) -> ToolPhase {
        self.tools.phase()
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    pub fn user(&self) -> Option<&CurrentUser> {
        self.user.as_ref()
    }

    /// Server-confirmed balance; `None` when signed out.
    pub fn balance(&self) -> Option<i64> {
        self.user.as_ref().map(|user| user.balance)
    }

    /// Balance minus what queued and in-flight claims are expected to cost.
    pub fn available_balance(&self) -> Option<i64> {
        let committed: i64 = self
            .sync
            .pending()
            .filter(|edit| matches!(edit.draft, EditDraft::Polygon { .. }))
            .map(|edit| edit.cost_estimate.max(0))
            .sum();
        self.balance().map(|balance| balance - committed)
    }

    pub fn connection(&self) -> ConnectionState {
        self.sync.state()
    }

    pub fn pending_len(&self) -> usize {
        self.sync.pending_len()
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn plots(&self) -> &PlotStore {
        &self.plots
    }

    pub fn plot_list(&self, view: PlotView) -> Vec<&Plot> {
        self.plots
            .list(view, self.user.as_ref().map(|user| user.id.as_str()))
    }

    pub fn selected_plot(&self) -> Option<&Plot> {
        self.selected_plot.and_then(|id| self.plots.get(id))
    }

    pub fn plot_at_screen(&self, screen: ScreenPoint) -> Option<&Plot> {
        let (x, y) = self.camera.world_pixel(screen);
        self.plots.plot_at(x, y)
    }

    pub fn effective_color(&self, x: i32, y: i32) -> Option<u8> {
        EffectiveColors {
            tiles: &self.tiles,
            realtime: &self.realtime,
            telegraph: self.sync.telegraph(),
        }
        .color_at(x, y)
    }

    pub fn tiles(&self) -> &TileCache {
        &self.tiles
    }

    pub fn realtime(&self) -> &RealtimeLayer {
        &self.realtime
    }

    pub fn telegraph(&self) -> &Telegraph {
        self.sync.telegraph()
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // --- internals ---

    fn emit(&mut self, event: EngineEvent) {
        for (_, subscriber) in &mut self.subscribers {
            subscriber(&event);
        }
    }

    fn raise(&mut self, err: EngineError) {
        let notice = err.into_notice(self.next_notice_id);
        self.next_notice_id += 1;
        tracing::debug!(id = notice.id, severity = ?notice.severity, "{}", notice.message);
        if self.notices.len() == MAX_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(notice.clone());
        self.emit(EngineEvent::Notice(notice));
    }

    fn camera_moved(&mut self) {
        self.emit(EngineEvent::CameraMoved(self.camera));
    }

    fn select_tool(&mut self, kind: ToolKind) {
        if kind.requires_sign_in() && self.user.is_none() {
            self.raise(EngineError::SignInRequired { tool: kind });
            return;
        }
        if kind != self.tools.kind() {
            self.tools.select(kind);
            self.emit(EngineEvent::ToolChanged(kind));
        }
    }

    fn set_user(&mut self, user: Option<CurrentUser>) {
        if self.user == user {
            return;
        }
        let balance_changed = self.balance() != user.as_ref().map(|u| u.balance);
        self.user = user;
        if self.user.is_none() && self.tools.kind().requires_sign_in() {
            self.tools.select(ToolKind::Move);
            self.emit(EngineEvent::ToolChanged(ToolKind::Move));
        }
        self.emit(EngineEvent::UserChanged(self.user.clone()));
        if let (true, Some(balance)) = (balance_changed, self.balance()) {
            self.emit(EngineEvent::BalanceChanged(balance));
        }
    }

    fn set_balance(&mut self, balance: i64) {
        let Some(user) = self.user.as_mut() else {
            return;
        };
        if user.balance != balance {
            user.balance = balance;
            self.emit(EngineEvent::BalanceChanged(balance));
        }
    }

    fn edit_plot(&mut self, id: PlotId) {
        let Some(user) = self.user.as_ref() else {
            self.raise(EngineError::SignInRequired {
                tool: ToolKind::Claimer,
            });
            return;
        };
        let Some(plot) = self.plots.get(id) else {
            self.raise(EngineError::PlotRequestFailed {
                reason: format!("plot {id} is not loaded"),
            });
            return;
        };
        if plot.owner_id != user.id {
            self.raise(EngineError::PlotRequestFailed {
                reason: "only the owner can reshape a plot".to_string(),
            });
            return;
        }
        self.tools.edit_plot(plot);
        self.selected_plot = Some(id);
        self.emit(EngineEvent::ToolChanged(ToolKind::Claimer));
        self.emit(EngineEvent::PlotSelected(Some(id)));
    }

    fn cursor(&self) -> Option<CursorFootprint> {
        let hover = self.hover?;
        let size = match self.tools.kind() {
            ToolKind::Brush => self.settings.brush_size,
            ToolKind::Erasure => self.settings.eraser_size,
            ToolKind::Line => self.settings.line_size,
            ToolKind::Bucket | ToolKind::Eyedropper => 1,
            ToolKind::Claimer | ToolKind::Move => return None,
        };
        Some(CursorFootprint {
            pixel: hover.pixel,
            size,
        })
    }

    fn pointer(&mut self, kind: Pointer, screen: ScreenPoint) {
        let sample = PointerSample::at(&self.camera, screen);
        self.hover = Some(sample);

        let tool = self.tools.kind();
        if matches!(kind, Pointer::Down) && tool.requires_sign_in() && self.user.is_none() {
            self.raise(EngineError::SignInRequired { tool });
            return;
        }

        let balance = self.available_balance();
        let colors = EffectiveColors {
            tiles: &self.tiles,
            realtime: &self.realtime,
            telegraph: self.sync.telegraph(),
        };
        let ctx = ToolContext {
            camera: &self.camera,
            settings: &self.settings,
            colors: &colors,
            balance,
            config: &self.config,
        };
        let effect = match kind {
            Pointer::Down => self.tools.pointer_down(&ctx, sample),
            Pointer::Move => self.tools.pointer_move(&ctx, sample),
            Pointer::Up => self.tools.pointer_up(&ctx, sample),
        };
        self.apply_effect(effect);
    }

    fn apply_effect(&mut self, effect: ToolEffect) {
        match effect {
            ToolEffect::None | ToolEffect::Preview => {}
            ToolEffect::Pan { dx, dy } => {
                self.camera.pan_screen(dx, dy);
                self.camera_moved();
            }
            ToolEffect::PickColor(color) => {
                if self.settings.apply(SettingsUpdate::Color(color)) {
                    self.emit(EngineEvent::SettingsChanged(self.settings.clone()));
                }
            }
            ToolEffect::Commit { draft, cost } => self.submit(draft, cost),
            ToolEffect::Failed(err) => self.raise(err),
        }
    }

    fn submit(&mut self, draft: EditDraft, cost: i64) {
        match draft {
            EditDraft::Pixels(pixels) => {
                let pixels: Vec<_> = pixels
                    .into_iter()
                    .filter(|pixel| in_bounds(pixel.x, pixel.y))
                    .collect();
                if pixels.is_empty() {
                    return;
                }
                // long strokes go out as consecutive batches the server accepts
                for batch in pixels.chunks(MAX_PIXELS_PER_EDIT) {
                    self.send_draft(EditDraft::Pixels(batch.to_vec()), cost);
                }
            }
            polygon => self.send_draft(polygon, cost),
        }
        if !self.sync.is_connected() {
            self.raise(EngineError::NetworkUnavailable {
                queued: self.sync.queued_len(),
            });
        }
    }

    fn send_draft(&mut self, draft: EditDraft, cost: i64) {
        let sequence_id = self
            .sync
            .submit(&mut self.transport, draft, cost, self.now_ms);
        tracing::debug!(sequence_id, cost, "edit submitted");
    }

    fn fold_realtime(&mut self) {
        let tiles = &self.tiles;
        let settled = self
            .realtime
            .latest_revision()
            .saturating_sub(self.config.realtime_fold_lag);
        let pixels = self.realtime.sweep(tiles.tile_size(), settled, |key| tile_fate(tiles, key));
        if !pixels.is_empty() {
            let written = self.tiles.fold(&pixels);
            tracing::trace!(written, "folded realtime into tiles");
        }
    }

    fn handle(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Connected => {
                if self.sync.on_connected(&mut self.transport, self.now_ms) {
                    // catch up on whatever was missed while away
                    self.tiles.mark_stale();
                    self.outbox.push(HostTask::Plot(PlotRequest::List {
                        view: PlotView::Recent,
                    }));
                }
                self.emit(EngineEvent::ConnectionChanged(self.sync.state()));
            }
            NetworkEvent::Disconnected => {
                if self.sync.state() == ConnectionState::Closed {
                    return;
                }
                self.sync.on_disconnected(self.now_ms);
                if self.sync.pending_len() > 0 {
                    self.raise(EngineError::NetworkUnavailable {
                        queued: self.sync.pending_len(),
                    });
                }
                self.emit(EngineEvent::ConnectionChanged(self.sync.state()));
            }
            NetworkEvent::Message(message) => self.handle_message(message),
            NetworkEvent::TileLoaded {
                key,
                bytes,
                revision,
            } => match self.tiles.complete(key, bytes, revision, self.now_ms) {
                Ok(true) => {
                    let pruned = self.realtime.prune_tile(&key, revision);
                    tracing::trace!(?key, revision, pruned, "tile loaded");
                }
                Ok(false) => {}
                Err(err) => self.raise(EngineError::InvalidTile(err)),
            },
            NetworkEvent::TileFailed { key, reason } => {
                if self.tiles.fail(&key) {
                    let (tx, ty) = key.index();
                    self.raise(EngineError::TileFetchFailed { tx, ty, reason });
                }
            }
            NetworkEvent::PlotsListed(plots) => {
                if self.plots.merge(plots) > 0 {
                    self.emit(EngineEvent::PlotsChanged);
                }
            }
            NetworkEvent::PlotUpdated(response) => {
                if let Some(plot) = response.plot {
                    if self.plots.upsert(plot) {
                        self.emit(EngineEvent::PlotsChanged);
                    }
                }
                self.set_balance(response.new_balance);
            }
            NetworkEvent::PlotRemoved { id, new_balance } => {
                self.remove_plot(id);
                self.set_balance(new_balance);
            }
            NetworkEvent::PlotRequestFailed { reason } => {
                self.raise(EngineError::PlotRequestFailed { reason })
            }
            NetworkEvent::Me(user) => self.set_user(user),
        }
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Reply(reply) => {
                let Some(resolution) = self.sync.on_reply(reply) else {
                    return;
                };
                self.resolve(resolution);
            }
            ServerMessage::Pixels {
                revision,
                mut pixels,
                ..
            } => {
                let tiles = &self.tiles;
                pixels.retain(|pixel| {
                    let key = TileKey::containing(pixel.x, pixel.y, tiles.tile_size());
                    tile_fate(tiles, &key) != TileFate::Drop
                });
                self.realtime.apply(&pixels, revision);
            }
            ServerMessage::PlotUpserted { plot } => {
                if self.plots.upsert(plot) {
                    self.emit(EngineEvent::PlotsChanged);
                }
            }
            ServerMessage::PlotDeleted { plot_id, .. } => self.remove_plot(plot_id),
        }
    }

    fn resolve(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Acked {
                sequence_id,
                pixels,
                revision,
                new_balance,
                plot,
            } => {
                if !pixels.is_empty() {
                    let revision = revision.unwrap_or_else(|| self.realtime.latest_revision());
                    self.realtime.apply(&pixels, revision);
                }
                if let Some(plot) = plot {
                    if self.plots.upsert(plot) {
                        self.emit(EngineEvent::PlotsChanged);
                    }
                }
                if let Some(balance) = new_balance {
                    self.set_balance(balance);
                }
                self.emit(EngineEvent::EditResolved {
                    sequence_id,
                    accepted: true,
                });
            }
            Resolution::Rejected {
                sequence_id,
                reason,
                cost_estimate,
                new_balance,
            } => {
                if let Some(balance) = new_balance {
                    self.set_balance(balance);
                }
                let err = match reason {
                    RejectReason::InsufficientBalance => EngineError::InsufficientBalance {
                        cost: cost_estimate,
                        balance: self.balance().unwrap_or(0),
                    },
                    reason => EngineError::ServerReject {
                        sequence_id,
                        reason,
                    },
                };
                self.raise(err);
                self.emit(EngineEvent::EditResolved {
                    sequence_id,
                    accepted: false,
                });
            }
        }
    }

    fn remove_plot(&mut self, id: PlotId) {
        if self.plots.remove(id).is_some() {
            self.emit(EngineEvent::PlotsChanged);
        }
        if self.selected_plot == Some(id) {
            self.selected_plot = None;
            self.emit(EngineEvent::PlotSelected(None));
        }
    }
}
