use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::Utf8Bytes;
use dashmap::DashMap;
use plotcanvas_shared::{
    EditReply, Pixel, Plot, PlotId, Polygon, Revision, SequenceId, ServerMessage, TILE_SIZE,
    TileKey, UserId,
};
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::warn;

use crate::config::{broadcast_buffer, reply_cache_len, starting_balance, static_dir};

/// Push frame serialized once and shared by every connection; clones are
/// reference-counted.
pub type PushFrame = Utf8Bytes;

#[derive(Debug, Clone)]
pub struct TileEntry {
    pub bytes: Vec<u8>,
    /// Revision of the newest edit written into this tile.
    pub revision: Revision,
}

/// Balances and plots. Claims check and mutate both, so they live behind
/// one lock.
#[derive(Debug)]
pub struct Ledger {
    starting_balance: i64,
    balances: HashMap<UserId, i64>,
    plots: BTreeMap<PlotId, Plot>,
    next_plot_id: PlotId,
}

impl Ledger {
    pub fn new(starting_balance: i64) -> Self {
        Self {
            starting_balance,
            balances: HashMap::new(),
            plots: BTreeMap::new(),
            next_plot_id: 1,
        }
    }

    /// Current balance, granting the starting balance on first sight.
    pub fn balance(&mut self, user: &str) -> i64 {
        *self
            .balances
            .entry(user.to_string())
            .or_insert(self.starting_balance)
    }

    /// Apply a signed debit and return the new balance.
    pub fn debit(&mut self, user: &str, amount: i64) -> i64 {
        let starting = self.starting_balance;
        let balance = self.balances.entry(user.to_string()).or_insert(starting);
        *balance -= amount;
        *balance
    }

    pub fn plot(&self, id: PlotId) -> Option<&Plot> {
        self.plots.get(&id)
    }

    pub fn plots(&self) -> impl Iterator<Item = &Plot> {
        self.plots.values()
    }

    /// First plot other than `except` whose interior meets `polygon`.
    pub fn overlapping(&self, polygon: &Polygon, except: Option<PlotId>) -> Option<PlotId> {
        self.plots
            .values()
            .filter(|plot| Some(plot.id) != except)
            .find(|plot| plot.polygon.overlaps(polygon))
            .map(|plot| plot.id)
    }

    pub fn allocate_plot_id(&mut self) -> PlotId {
        let id = self.next_plot_id;
        self.next_plot_id += 1;
        id
    }

    pub fn upsert_plot(&mut self, plot: Plot) {
        self.plots.insert(plot.id, plot);
    }

    pub fn remove_plot(&mut self, id: PlotId) -> Option<Plot> {
        self.plots.remove(&id)
    }
}

/// Replies keyed by `(user, session, sequence)`, so a replayed submission
/// gets the original answer instead of being applied twice.
#[derive(Debug)]
pub struct ReplyCache {
    capacity: usize,
    replies: HashMap<ReplyKey, EditReply>,
    order: VecDeque<ReplyKey>,
}

pub type ReplyKey = (UserId, String, SequenceId);

impl ReplyCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            replies: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &ReplyKey) -> Option<&EditReply> {
        self.replies.get(key)
    }

    pub fn insert(&mut self, key: ReplyKey, reply: EditReply) {
        if self.replies.insert(key.clone(), reply).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.replies.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.replies.len()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub tiles: Arc<DashMap<(i32, i32), TileEntry>>,
    revision: Arc<AtomicU64>,
    pub ledger: Arc<RwLock<Ledger>>,
    pub replies: Arc<Mutex<ReplyCache>>,
    /// Serializes edits so revision order, tile contents and push order agree.
    pub edit_lock: Arc<Mutex<()>>,
    pub push_tx: broadcast::Sender<PushFrame>,
    pub static_dir: String,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_settings(starting_balance(), broadcast_buffer(), reply_cache_len())
    }

    pub fn with_settings(
        starting_balance: i64,
        broadcast_buffer: usize,
        reply_cache_len: usize,
    ) -> Self {
        let (push_tx, _) = broadcast::channel(broadcast_buffer.max(1));
        Self {
            tiles: Arc::new(DashMap::new()),
            revision: Arc::new(AtomicU64::new(0)),
            ledger: Arc::new(RwLock::new(Ledger::new(starting_balance))),
            replies: Arc::new(Mutex::new(ReplyCache::new(reply_cache_len))),
            edit_lock: Arc::new(Mutex::new(())),
            push_tx,
            static_dir: static_dir(),
        }
    }

    pub fn current_revision(&self) -> Revision {
        self.revision.load(Ordering::SeqCst)
    }

    /// Stamp the next edit. Callers hold `edit_lock`.
    pub fn next_revision(&self) -> Revision {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Snapshot of one tile; never-written tiles are blank at revision 0.
    pub fn tile_snapshot(&self, tx: i32, ty: i32) -> (Vec<u8>, Revision) {
        match self.tiles.get(&(tx, ty)) {
            Some(entry) => (entry.bytes.clone(), entry.revision),
            None => {
                let key = TileKey::from_index(tx, ty, TILE_SIZE);
                (vec![0; key.byte_len()], 0)
            }
        }
    }

    /// Write already-validated pixels into their tiles under `revision`.
    pub fn write_pixels(&self, pixels: &[Pixel], revision: Revision) {
        for pixel in pixels {
            let key = TileKey::containing(pixel.x, pixel.y, TILE_SIZE);
            let Some(offset) = key.local_offset(pixel.x, pixel.y) else {
                continue;
            };
            let mut entry = self.tiles.entry(key.index()).or_insert_with(|| TileEntry {
                bytes: vec![0; key.byte_len()],
                revision: 0,
            });
            entry.bytes[offset] = pixel.color;
            entry.revision = entry.revision.max(revision);
        }
    }

    /// Serialize once and fan out to every open connection.
    pub fn publish(&self, message: &ServerMessage) {
        let frame: PushFrame = match serde_json::to_string(message) {
            Ok(json) => Utf8Bytes::from(json),
            Err(e) => {
                warn!(error = %e, "failed to serialize push frame");
                return;
            }
        };
        // no receivers just means nobody is connected
        let _ = self.push_tx.send(frame);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
