//! Realtime pixel canvas engine.
//!
//! Everything outside [`web`] is plain Rust with no browser calls, so the
//! engine runs and is tested natively; [`web`] is the wasm32 host that wires
//! it to the DOM, a WebSocket and `fetch`.

pub mod camera;
pub mod config;
pub mod engine;
pub mod error;
pub mod layers;
pub mod plots;
pub mod query;
pub mod realtime;
pub mod settings;
pub mod sync;
pub mod telegraph;
pub mod tile_cache;
pub mod tools;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use camera::{Camera, CameraDelta, ScreenPoint, WorldPoint, WorldRect};
pub use config::EngineConfig;
pub use engine::{CanvasEngine, Command, EngineEvent, HostTask, NetworkEvent};
pub use error::{EngineError, Notice, Severity, TransportError};
pub use sync::{ConnectionState, Transport};
pub use tools::{ToolKey, ToolKind};
