use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use gloo_storage::{LocalStorage, Storage};
use gloo_timers::future::TimeoutFuture;
use js_sys::Reflect;
use leptos::prelude::*;
use plotcanvas_shared::{CurrentUser, PlotView, TileKey, cost, palette};
use wasm_bindgen::prelude::*;
use wasm_bindgen::{Clamped, JsCast, JsValue};
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    AbortController, CanvasRenderingContext2d, HtmlCanvasElement, ImageData, KeyboardEvent,
    PointerEvent, WheelEvent,
};

use crate::camera::ScreenPoint;
use crate::config::EngineConfig;
use crate::engine::{CanvasEngine, Command, EngineEvent, HostTask};
use crate::error::{Notice, Severity};
use crate::settings::{SETTINGS_STORAGE_KEY, SettingsUpdate, ToolSettings};
use crate::sync::ConnectionState;
use crate::tools::{ToolKey, ToolKind};

use super::http;
use super::scheduler::FrameScheduler;
use super::socket::{Inbox, WsTransport, socket_url};

type Engine = CanvasEngine<WsTransport>;

/// Info notices clear themselves after this long.
const INFO_NOTICE_MS: u32 = 6_000;

/// Everything the page needs to drive one engine.
struct Host {
    engine: RefCell<Engine>,
    inbox: Inbox,
    config: EngineConfig,
    /// Development identity taken from `?user=`; sent to the server as a header.
    user: Option<String>,
    aborts: RefCell<HashMap<TileKey, AbortController>>,
    canvas: RefCell<Option<(HtmlCanvasElement, CanvasRenderingContext2d)>>,
    plots_dirty: Cell<bool>,
}

struct KeydownBinding {
    window: web_sys::Window,
    handler: Closure<dyn Fn(KeyboardEvent)>,
}

thread_local! {
    static HOST: RefCell<Option<Rc<Host>>> = const { RefCell::new(None) };
    static SCHEDULER: RefCell<Option<FrameScheduler>> = const { RefCell::new(None) };
    static KEYDOWN_BINDING: RefCell<Option<KeydownBinding>> = const { RefCell::new(None) };
}

fn with_host(f: impl FnOnce(&Rc<Host>)) {
    let host = HOST.with(|slot| slot.borrow().clone());
    if let Some(host) = host {
        f(&host);
    }
}

fn dispatch(command: Command) {
    with_host(|host| host.engine.borrow_mut().dispatch(command));
}

/// `window.PLOTCANVAS_CONFIG`, falling back to defaults field by field.
fn read_config() -> EngineConfig {
    let Some(window) = web_sys::window() else {
        return EngineConfig::default();
    };
    let Ok(raw) = Reflect::get(window.as_ref(), &JsValue::from_str("PLOTCANVAS_CONFIG")) else {
        return EngineConfig::default();
    };
    if raw.is_undefined() || raw.is_null() {
        return EngineConfig::default();
    }
    serde_wasm_bindgen::from_value(raw).unwrap_or_else(|err| {
        tracing::warn!(%err, "ignoring malformed PLOTCANVAS_CONFIG");
        EngineConfig::default()
    })
}

fn location_search() -> String {
    web_sys::window()
        .and_then(|window| window.location().search().ok())
        .unwrap_or_default()
}

fn dev_user(search: &str) -> Option<String> {
    search
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "user")
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

fn session_id() -> String {
    let high = (js_sys::Math::random() * u32::MAX as f64) as u32;
    let low = (js_sys::Math::random() * u32::MAX as f64) as u32;
    format!("{high:08x}{low:08x}")
}

fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|window| window.performance())
        .map(|performance| performance.now())
        .unwrap_or_else(js_sys::Date::now)
}

fn write_query(query: &str) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let Ok(history) = window.history() else {
        return;
    };
    let pathname = window.location().pathname().unwrap_or_default();
    // keep the dev identity so reloads stay signed in
    let user = dev_user(&location_search())
        .map(|user| format!("&user={user}"))
        .unwrap_or_default();
    let url = format!("{pathname}?{query}{user}");
    let _ = history.replace_state_with_url(&JsValue::NULL, "", Some(&url));
}

fn run_task(host: &Rc<Host>, task: HostTask) {
    match task {
        HostTask::FetchTile(key) => {
            let controller = AbortController::new().ok();
            let signal = controller.as_ref().map(|controller| controller.signal());
            if let Some(controller) = controller {
                host.aborts.borrow_mut().insert(key, controller);
            }
            let host = host.clone();
            spawn_local(async move {
                let event = http::fetch_tile(&host.config, key, signal.as_ref()).await;
                host.aborts.borrow_mut().remove(&key);
                host.inbox.borrow_mut().push_back(event);
            });
        }
        HostTask::Plot(request) => {
            let host = host.clone();
            spawn_local(async move {
                let event = http::run_plot_request(&host.config, host.user.as_deref(), request).await;
                host.inbox.borrow_mut().push_back(event);
            });
        }
        HostTask::WriteQuery(query) => write_query(&query),
    }
}

fn sync_canvas_size(host: &Host) {
    let canvas = host.canvas.borrow();
    let Some((canvas, _)) = canvas.as_ref() else {
        return;
    };
    let width = canvas.client_width().max(0) as u32;
    let height = canvas.client_height().max(0) as u32;
    let current = host.engine.borrow().viewport();
    if current != (width, height) {
        canvas.set_width(width);
        canvas.set_height(height);
        host.engine
            .borrow_mut()
            .dispatch(Command::Resize { width, height });
    }
}

fn draw(host: &Host) {
    let canvas = host.canvas.borrow();
    let Some((_, ctx)) = canvas.as_ref() else {
        return;
    };
    let mut engine = host.engine.borrow_mut();
    let surface = engine.frame();
    let (width, height) = (surface.width(), surface.height());
    if width == 0 || height == 0 {
        return;
    }
    match ImageData::new_with_u8_clamped_array_and_sh(Clamped(surface.as_bytes()), width, height) {
        Ok(image) => {
            let _ = ctx.put_image_data(&image, 0.0, 0.0);
        }
        Err(err) => tracing::warn!(?err, "could not build frame image"),
    }
}

fn pump(host: &Rc<Host>, now: f64) {
    sync_canvas_size(host);
    let tasks = {
        let mut engine = host.engine.borrow_mut();
        let events: Vec<_> = host.inbox.borrow_mut().drain(..).collect();
        for event in events {
            engine.enqueue(event);
        }
        engine.tick(now)
    };
    for task in tasks {
        run_task(host, task);
    }
    draw(host);
}

fn shutdown() {
    SCHEDULER.with(|slot| slot.borrow_mut().take());
    KEYDOWN_BINDING.with(|slot| {
        if let Some(binding) = slot.borrow_mut().take() {
            let _ = binding.window.remove_event_listener_with_callback(
                "keydown",
                binding.handler.as_ref().unchecked_ref(),
            );
        }
    });
    let Some(host) = HOST.with(|slot| slot.borrow_mut().take()) else {
        return;
    };
    let cancelled = host.engine.borrow_mut().shutdown();
    let mut aborts = host.aborts.borrow_mut();
    for key in cancelled {
        if let Some(controller) = aborts.remove(&key) {
            controller.abort();
        }
    }
    for (_, controller) in aborts.drain() {
        controller.abort();
    }
}

fn bind_keys() {
    let Some(window) = web_sys::window() else {
        return;
    };
    let handler = Closure::<dyn Fn(KeyboardEvent)>::new(move |event: KeyboardEvent| {
        let key = match event.key().as_str() {
            "Enter" => ToolKey::Enter,
            "Escape" => ToolKey::Escape,
            "Backspace" => ToolKey::Backspace,
            _ => return,
        };
        event.prevent_default();
        dispatch(Command::Key(key));
    });
    let _ = window.add_event_listener_with_callback("keydown", handler.as_ref().unchecked_ref());
    KEYDOWN_BINDING.with(|slot| {
        *slot.borrow_mut() = Some(KeydownBinding { window, handler });
    });
}

fn pointer(event: &PointerEvent) -> ScreenPoint {
    ScreenPoint::new(event.offset_x() as f64, event.offset_y() as f64)
}

fn connection_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connected => "live",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Disconnected => "offline",
        ConnectionState::Closed => "closed",
    }
}

fn notice_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "#3d6fb6",
        Severity::Warning => "#b68a3d",
        Severity::Error => "#b63d3d",
    }
}

#[component]
pub fn App() -> impl IntoView {
    let config = read_config();
    let search = location_search();
    let user_id = dev_user(&search);

    let tool = RwSignal::new(ToolKind::Move);
    let settings = RwSignal::new(ToolSettings::default());
    let balance: RwSignal<Option<i64>> = RwSignal::new(None);
    let user: RwSignal<Option<CurrentUser>> = RwSignal::new(None);
    let connection = RwSignal::new(ConnectionState::Disconnected);
    let notices: RwSignal<Vec<Notice>> = RwSignal::new(Vec::new());
    let plot_names: RwSignal<Vec<(u64, String, i64)>> = RwSignal::new(Vec::new());

    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();

    Effect::new(move || {
        let saved = settings.get();
        let _ = LocalStorage::set(SETTINGS_STORAGE_KEY, &saved);
    });

    Effect::new(move || {
        let Some(canvas) = canvas_ref.get() else {
            return;
        };
        let canvas: HtmlCanvasElement = canvas;
        let ctx = canvas
            .get_context("2d")
            .ok()
            .flatten()
            .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok());
        let Some(ctx) = ctx else {
            tracing::error!("2d canvas context unavailable");
            return;
        };

        shutdown();

        let inbox: Inbox = Rc::new(RefCell::new(VecDeque::new()));
        let url = socket_url(&config.socket_path, user_id.as_deref());
        let transport = WsTransport::new(url, inbox.clone());
        let mut engine = CanvasEngine::new(config.clone(), session_id(), transport);
        engine.restore_camera(&search);
        if let Ok(saved) = LocalStorage::get::<ToolSettings>(SETTINGS_STORAGE_KEY) {
            engine.dispatch(Command::RestoreSettings(saved));
        }
        settings.set(engine.settings().clone());

        let host = Rc::new(Host {
            engine: RefCell::new(engine),
            inbox,
            config: config.clone(),
            user: user_id.clone(),
            aborts: RefCell::new(HashMap::new()),
            canvas: RefCell::new(Some((canvas, ctx))),
            plots_dirty: Cell::new(true),
        });

        {
            let weak_host = Rc::downgrade(&host);
            host.engine.borrow_mut().subscribe(move |event| match event {
                EngineEvent::ToolChanged(kind) => tool.set(*kind),
                EngineEvent::SettingsChanged(next) => settings.set(next.clone()),
                EngineEvent::BalanceChanged(next) => balance.set(Some(*next)),
                EngineEvent::UserChanged(next) => {
                    balance.set(next.as_ref().map(|user| user.balance));
                    user.set(next.clone());
                }
                EngineEvent::ConnectionChanged(state) => connection.set(*state),
                EngineEvent::Notice(notice) => {
                    notices.update(|list| {
                        list.push(notice.clone());
                        if list.len() > 8 {
                            list.remove(0);
                        }
                    });
                    if notice.severity == Severity::Info {
                        let id = notice.id;
                        spawn_local(async move {
                            TimeoutFuture::new(INFO_NOTICE_MS).await;
                            notices.update(|list| list.retain(|n| n.id != id));
                            dispatch(Command::DismissNotice(id));
                        });
                    }
                }
                EngineEvent::PlotsChanged => {
                    if let Some(host) = weak_host.upgrade() {
                        host.plots_dirty.set(true);
                    }
                }
                EngineEvent::CameraMoved(_)
                | EngineEvent::EditResolved { .. }
                | EngineEvent::PlotSelected(_) => {}
            });
        }

        host.engine.borrow_mut().start(now_ms());
        HOST.with(|slot| *slot.borrow_mut() = Some(host.clone()));

        {
            let host = host.clone();
            spawn_local(async move {
                let event = http::fetch_me(&host.config, host.user.as_deref()).await;
                host.inbox.borrow_mut().push_back(event);
            });
        }

        let weak = Rc::downgrade(&host);
        let scheduler = FrameScheduler::new(move |now| {
            let Some(host) = weak.upgrade() else {
                return false;
            };
            pump(&host, now);
            if host.plots_dirty.replace(false) {
                let engine = host.engine.borrow();
                plot_names.set(
                    engine
                        .plot_list(PlotView::Recent)
                        .into_iter()
                        .take(20)
                        .map(|plot| (plot.id, plot.name.clone(), cost(&plot.polygon)))
                        .collect(),
                );
            }
            true
        });
        scheduler.wake();
        SCHEDULER.with(|slot| *slot.borrow_mut() = Some(scheduler));
        bind_keys();

        on_cleanup(shutdown);
    });

    let on_pointer_down = move |event: PointerEvent| {
        if let Some(target) = event.target()
            && let Ok(element) = target.dyn_into::<web_sys::Element>()
        {
            element.set_pointer_capture(event.pointer_id()).ok();
        }
        dispatch(Command::PointerDown(pointer(&event)));
    };
    let on_pointer_move = move |event: PointerEvent| dispatch(Command::PointerMove(pointer(&event)));
    let on_pointer_up = move |event: PointerEvent| dispatch(Command::PointerUp(pointer(&event)));
    let on_pointer_leave = move |_: PointerEvent| dispatch(Command::PointerLeave);
    let on_wheel = move |event: WheelEvent| {
        event.prevent_default();
        dispatch(Command::Wheel {
            delta: event.delta_y(),
            screen: ScreenPoint::new(event.offset_x() as f64, event.offset_y() as f64),
        });
    };

    let toolbar = ToolKind::ALL
        .into_iter()
        .map(|kind| {
            let style = move || {
                let active = tool.get() == kind;
                let locked = kind.requires_sign_in() && user.get().is_none();
                format!(
                    "padding: 4px 8px; border-radius: 4px; border: 1px solid {}; background: {}; color: {}; cursor: pointer;",
                    if active { "#f5c542" } else { "#282c3e" },
                    if active { "#2a2d3a" } else { "#13161f" },
                    if locked { "#5a5860" } else { "#e2e0d8" },
                )
            };
            view! {
                <button style=style on:click=move |_| dispatch(Command::SelectTool(kind))>
                    {kind.label()}
                </button>
            }
        })
        .collect_view();

    let swatches = (0..palette::PALETTE_LEN as u8)
        .filter(|index| palette::is_paintable(*index))
        .map(|index| {
            let style = move || {
                let selected = settings.get().color == index;
                format!(
                    "width: 18px; height: 18px; background: {}; border: 2px solid {}; cursor: pointer;",
                    palette::css_hex(index),
                    if selected { "#f5c542" } else { "transparent" },
                )
            };
            view! {
                <div
                    style=style
                    on:click=move |_| dispatch(Command::UpdateSettings(SettingsUpdate::Color(index)))
                ></div>
            }
        })
        .collect_view();

    view! {
        <div style="width: 100%; height: 100%; position: relative; overflow: hidden; background: #0c0e17; font-family: 'JetBrains Mono', monospace; font-size: 12px;">
            <canvas
                node_ref=canvas_ref
                style="position: absolute; inset: 0; width: 100%; height: 100%; touch-action: none; image-rendering: pixelated;"
                on:pointerdown=on_pointer_down
                on:pointermove=on_pointer_move
                on:pointerup=on_pointer_up
                on:pointerleave=on_pointer_leave
                on:wheel=on_wheel
            ></canvas>
            <div style="position: absolute; top: 12px; left: 12px; display: flex; gap: 4px;">
                {toolbar}
            </div>
            <div style="position: absolute; bottom: 12px; left: 12px; display: flex; flex-wrap: wrap; gap: 2px; max-width: 420px;">
                {swatches}
            </div>
            <div style="position: absolute; top: 12px; right: 12px; color: #e2e0d8; background: #13161f; border: 1px solid #282c3e; border-radius: 6px; padding: 8px; min-width: 180px;">
                <div>{move || connection_label(connection.get())}</div>
                <div>
                    {move || match (user.get(), balance.get()) {
                        (Some(user), Some(balance)) => format!("{} · {balance} px", user.name),
                        (Some(user), None) => user.name,
                        (None, _) => "signed out".to_string(),
                    }}
                </div>
                <label style="display: flex; gap: 4px; align-items: center;">
                    <input
                        type="checkbox"
                        prop:checked=move || settings.get().show_grid
                        on:change=move |_| {
                            let show = !settings.get_untracked().show_grid;
                            dispatch(Command::UpdateSettings(SettingsUpdate::ShowGrid(show)));
                        }
                    />
                    "grid"
                </label>
                <ul style="list-style: none; margin: 6px 0 0; padding: 0; max-height: 240px; overflow-y: auto;">
                    <For
                        each=move || plot_names.get()
                        key=|(id, _, _)| *id
                        children=move |(id, name, area)| {
                            view! {
                                <li
                                    style="cursor: pointer; padding: 2px 0;"
                                    on:click=move |_| dispatch(Command::SelectPlot(Some(id)))
                                >
                                    {format!("{name} ({area} px)")}
                                </li>
                            }
                        }
                    />
                </ul>
            </div>
            <div style="position: absolute; bottom: 12px; right: 12px; display: flex; flex-direction: column; gap: 4px;">
                <For
                    each=move || notices.get()
                    key=|notice| notice.id
                    children=move |notice| {
                        let id = notice.id;
                        let style = format!(
                            "background: {}; color: #fff; padding: 6px 10px; border-radius: 4px; cursor: pointer;",
                            notice_color(notice.severity),
                        );
                        view! {
                            <div
                                style=style
                                on:click=move |_| {
                                    notices.update(|list| list.retain(|n| n.id != id));
                                    dispatch(Command::DismissNotice(id));
                                }
                            >
                                {notice.message}
                            </div>
                        }
                    }
                />
            </div>
        </div>
    }
}
