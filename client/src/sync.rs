//! Optimistic edit buffer reconciled against the server over a persistent
//! channel.
//!
//! Every edit gets a sequence id scoped to this session. Unresolved edits are
//! kept in sequence order and replayed after each (re)connect; the server
//! answers replays it already applied with its cached reply, and replies for
//! ids that are no longer pending are ignored here.

use std::collections::BTreeMap;

use plotcanvas_shared::{
    ClientMessage, EditPayload, EditReply, EditSubmission, Pixel, Plot, PlotId, Polygon,
    RejectReason, ReplyStatus, Revision, SequenceId,
};

use crate::config::EngineConfig;
use crate::error::TransportError;
use crate::telegraph::Telegraph;

/// The persistent bidirectional channel. Opening is asynchronous: the host
/// reports the outcome back as `NetworkEvent::Connected` / `Disconnected`.
pub trait Transport {
    fn connect(&mut self) -> Result<(), TransportError>;
    fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError>;
    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Shut down for good; no further reconnects.
    Closed,
}

/// Exponential reconnect delay: `base * 2^(failures - 1)`, capped.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: f64,
    max_ms: f64,
    consecutive_failures: u32,
    next_attempt_at_ms: f64,
}

impl Backoff {
    pub fn new(base_ms: f64, max_ms: f64) -> Self {
        Self {
            base_ms,
            max_ms,
            consecutive_failures: 0,
            next_attempt_at_ms: 0.0,
        }
    }

    pub fn delay_ms(&self, consecutive_failures: u32) -> f64 {
        let exponent = consecutive_failures.saturating_sub(1).min(6);
        let factor = 1u32 << exponent;
        (self.base_ms * factor as f64).min(self.max_ms)
    }

    pub fn record_failure(&mut self, now_ms: f64) -> f64 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let delay = self.delay_ms(self.consecutive_failures);
        self.next_attempt_at_ms = now_ms + delay;
        delay
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.next_attempt_at_ms = 0.0;
    }

    pub fn ready(&self, now_ms: f64) -> bool {
        now_ms >= self.next_attempt_at_ms
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

/// What a tool hands to the sync engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EditDraft {
    Pixels(Vec<Pixel>),
    Polygon {
        polygon: Polygon,
        /// Plot being reshaped, if any.
        plot_id: Option<PlotId>,
    },
}

impl EditDraft {
    pub fn payload(&self) -> EditPayload {
        match self {
            Self::Pixels(pixels) => EditPayload::Pixels {
                pixels: pixels.clone(),
            },
            Self::Polygon { polygon, plot_id } => EditPayload::Polygon {
                polygon: polygon.clone(),
                plot_id: *plot_id,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStatus {
    Queued,
    InFlight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingEdit {
    pub sequence_id: SequenceId,
    pub draft: EditDraft,
    pub cost_estimate: i64,
    pub status: EditStatus,
}

/// Outcome of a reply for a pending edit, for the engine to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Acked {
        sequence_id: SequenceId,
        pixels: Vec<Pixel>,
        revision: Option<Revision>,
        new_balance: Option<i64>,
        plot: Option<Plot>,
    },
    Rejected {
        sequence_id: SequenceId,
        reason: RejectReason,
        cost_estimate: i64,
        new_balance: Option<i64>,
    },
}

pub struct SyncEngine {
    session_id: String,
    next_sequence: SequenceId,
    pending: BTreeMap<SequenceId, PendingEdit>,
    telegraph: Telegraph,
    state: ConnectionState,
    backoff: Backoff,
    connected_before: bool,
}

impl SyncEngine {
    pub fn new(session_id: impl Into<String>, config: &EngineConfig) -> Self {
        Self {
            session_id: session_id.into(),
            next_sequence: 1,
            pending: BTreeMap::new(),
            telegraph: Telegraph::new(),
            state: ConnectionState::Disconnected,
            backoff: Backoff::new(config.reconnect_base_ms, config.reconnect_max_ms),
            connected_before: false,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn telegraph(&self) -> &Telegraph {
        &self.telegraph
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingEdit> {
        self.pending.values()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn queued_len(&self) -> usize {
        self.pending
            .values()
            .filter(|edit| edit.status == EditStatus::Queued)
            .count()
    }

    /// Open the channel for the first time.
    pub fn start<T: Transport>(&mut self, transport: &mut T, now_ms: f64) {
        if self.state != ConnectionState::Disconnected {
            return;
        }
        self.open(transport, now_ms);
    }

    /// Record a new edit: it shows in Telegraph at once and is sent if the
    /// channel is up, otherwise queued until the next connect.
    pub fn submit<T: Transport>(
        &mut self,
        transport: &mut T,
        draft: EditDraft,
        cost_estimate: i64,
        now_ms: f64,
    ) -> SequenceId {
        let sequence_id = self.next_sequence;
        self.next_sequence += 1;

        match &draft {
            EditDraft::Pixels(pixels) => self.telegraph.insert_pixels(sequence_id, pixels),
            EditDraft::Polygon { polygon, .. } => {
                self.telegraph.insert_polygon(sequence_id, polygon.clone())
            }
        }
        self.pending.insert(
            sequence_id,
            PendingEdit {
                sequence_id,
                draft,
                cost_estimate,
                status: EditStatus::Queued,
            },
        );

        if self.is_connected() {
            self.send_edit(transport, sequence_id, now_ms);
        } else {
            tracing::debug!(sequence_id, queued = self.queued_len(), "queued edit while offline");
        }
        sequence_id
    }

    /// The channel opened. Says hello, then replays unresolved edits in order.
    /// Returns `true` when this is a reconnect.
    pub fn on_connected<T: Transport>(&mut self, transport: &mut T, now_ms: f64) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        self.state = ConnectionState::Connected;
        self.backoff.reset();
        let reconnect = self.connected_before;
        self.connected_before = true;

        let hello = ClientMessage::Hello {
            session_id: self.session_id.clone(),
        };
        if let Err(err) = transport.send(&hello) {
            self.send_failed(transport, err, now_ms);
            return reconnect;
        }

        let replay: Vec<SequenceId> = self.pending.keys().copied().collect();
        tracing::info!(replayed = replay.len(), reconnect, "sync channel open");
        for sequence_id in replay {
            if !self.send_edit(transport, sequence_id, now_ms) {
                break;
            }
        }
        reconnect
    }

    /// The channel dropped. In-flight edits go back to queued. Returns the
    /// delay before the next reconnect attempt.
    pub fn on_disconnected(&mut self, now_ms: f64) -> f64 {
        if self.state == ConnectionState::Closed {
            return 0.0;
        }
        self.state = ConnectionState::Disconnected;
        for edit in self.pending.values_mut() {
            edit.status = EditStatus::Queued;
        }
        let delay = self.backoff.record_failure(now_ms);
        tracing::warn!(
            attempt = self.backoff.consecutive_failures(),
            backoff_ms = delay.round(),
            pending = self.pending.len(),
            "sync channel lost"
        );
        delay
    }

    /// Try to reopen once the backoff has elapsed. Returns `true` if a
    /// connect was started.
    pub fn poll_reconnect<T: Transport>(&mut self, transport: &mut T, now_ms: f64) -> bool {
        if self.state != ConnectionState::Disconnected || !self.backoff.ready(now_ms) {
            return false;
        }
        self.open(transport, now_ms)
    }

    /// Resolve a pending edit. Unknown or already-resolved ids are a no-op.
    pub fn on_reply(&mut self, reply: EditReply) -> Option<Resolution> {
        let Some(edit) = self.pending.remove(&reply.sequence_id) else {
            tracing::debug!(sequence_id = reply.sequence_id, "ignoring reply for resolved edit");
            return None;
        };
        self.telegraph.remove(edit.sequence_id);

        match reply.status {
            ReplyStatus::Ack => {
                let pixels = match edit.draft {
                    EditDraft::Pixels(pixels) => pixels,
                    EditDraft::Polygon { .. } => Vec::new(),
                };
                Some(Resolution::Acked {
                    sequence_id: edit.sequence_id,
                    pixels,
                    revision: reply.revision,
                    new_balance: reply.new_balance,
                    plot: reply.plot,
                })
            }
            ReplyStatus::Reject => {
                let reason = reply.reason.unwrap_or(RejectReason::Malformed);
                tracing::warn!(sequence_id = edit.sequence_id, ?reason, "edit rejected");
                Some(Resolution::Rejected {
                    sequence_id: edit.sequence_id,
                    reason,
                    cost_estimate: edit.cost_estimate,
                    new_balance: reply.new_balance,
                })
            }
        }
    }

    /// Unmount: close the channel and stop reconnecting. Pending edits are
    /// left as they are.
    pub fn close<T: Transport>(&mut self, transport: &mut T) {
        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Closed;
            transport.close();
        }
    }

    fn open<T: Transport>(&mut self, transport: &mut T, now_ms: f64) -> bool {
        self.state = ConnectionState::Connecting;
        match transport.connect() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "could not open sync channel");
                self.on_disconnected(now_ms);
                false
            }
        }
    }

    fn send_edit<T: Transport>(
        &mut self,
        transport: &mut T,
        sequence_id: SequenceId,
        now_ms: f64,
    ) -> bool {
        let Some(edit) = self.pending.get_mut(&sequence_id) else {
            return false;
        };
        let message = ClientMessage::Submit(EditSubmission::new(
            sequence_id,
            edit.draft.payload(),
            edit.cost_estimate,
        ));
        match transport.send(&message) {
            Ok(()) => {
                edit.status = EditStatus::InFlight;
                true
            }
            Err(err) => {
                self.send_failed(transport, err, now_ms);
                false
            }
        }
    }

    fn send_failed<T: Transport>(&mut self, transport: &mut T, err: TransportError, now_ms: f64) {
        tracing::warn!(%err, "send failed; dropping connection");
        transport.close();
        self.on_disconnected(now_ms);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records every frame; `connect` and `send` can be made to fail.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingTransport {
        pub sent: Vec<ClientMessage>,
        pub connects: usize,
        pub closes: usize,
        pub fail_connect: bool,
        pub fail_send: bool,
    }

    impl RecordingTransport {
        pub(crate) fn submissions(&self) -> Vec<&EditSubmission> {
            self.sent
                .iter()
                .filter_map(|message| match message {
                    ClientMessage::Submit(submission) => Some(submission),
                    ClientMessage::Hello { .. } => None,
                })
                .collect()
        }
    }

    impl Transport for RecordingTransport {
        fn connect(&mut self) -> Result<(), TransportError> {
            self.connects += 1;
            if self.fail_connect {
                Err(TransportError::Open("refused".into()))
            } else {
                Ok(())
            }
        }

        fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError> {
            if self.fail_send {
                return Err(TransportError::NotConnected);
            }
            self.sent.push(message.clone());
            Ok(())
        }

        fn close(&mut self) {
            self.closes += 1;
        }
    }

    fn connected() -> (SyncEngine, RecordingTransport) {
        let mut sync = SyncEngine::new("session-a", &EngineConfig::default());
        let mut transport = RecordingTransport::default();
        sync.start(&mut transport, 0.0);
        sync.on_connected(&mut transport, 0.0);
        (sync, transport)
    }

    fn dot(x: i32, y: i32, color: u8) -> EditDraft {
        EditDraft::Pixels(vec![Pixel::new(x, y, color)])
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let backoff = Backoff::new(500.0, 10_000.0);
        let delays: Vec<f64> = (1..=7).map(|n| backoff.delay_ms(n)).collect();
        assert_eq!(
            delays,
            vec![500.0, 1000.0, 2000.0, 4000.0, 8000.0, 10_000.0, 10_000.0]
        );
    }

    #[test]
    fn connect_sends_hello_first() {
        let (sync, transport) = connected();
        assert_eq!(
            transport.sent,
            vec![ClientMessage::Hello {
                session_id: "session-a".into()
            }]
        );
        assert!(sync.is_connected());
    }

    #[test]
    fn submit_writes_telegraph_and_sends() {
        let (mut sync, mut transport) = connected();
        let seq = sync.submit(&mut transport, dot(5, 5, 3), 0, 0.0);
        assert_eq!(seq, 1);
        assert_eq!(sync.telegraph().color_at(5, 5), Some(3));
        let submissions = transport.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].sequence_id, 1);
        assert_eq!(sync.pending().next().map(|e| e.status), Some(EditStatus::InFlight));
    }

    #[test]
    fn offline_edits_queue_and_flush_in_order() {
        let mut sync = SyncEngine::new("s", &EngineConfig::default());
        let mut transport = RecordingTransport::default();
        for i in 0..3 {
            sync.submit(&mut transport, dot(i, 0, 2), 0, 0.0);
        }
        assert!(transport.sent.is_empty());
        assert_eq!(sync.queued_len(), 3);

        sync.start(&mut transport, 0.0);
        sync.on_connected(&mut transport, 10.0);
        let order: Vec<SequenceId> = transport.submissions().iter().map(|s| s.sequence_id).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(sync.queued_len(), 0);
    }

    #[test]
    fn reconnect_replays_unresolved_edits() {
        let (mut sync, mut transport) = connected();
        sync.submit(&mut transport, dot(0, 0, 2), 0, 0.0);
        sync.submit(&mut transport, dot(1, 0, 2), 0, 0.0);
        sync.on_reply(EditReply::ack(1, 5, 100));

        let delay = sync.on_disconnected(1_000.0);
        assert_eq!(delay, 500.0);
        assert!(!sync.poll_reconnect(&mut transport, 1_200.0));
        assert!(sync.poll_reconnect(&mut transport, 1_500.0));
        assert_eq!(sync.state(), ConnectionState::Connecting);

        transport.sent.clear();
        assert!(sync.on_connected(&mut transport, 1_600.0));
        assert!(matches!(transport.sent[0], ClientMessage::Hello { .. }));
        let replayed: Vec<SequenceId> =
            transport.submissions().iter().map(|s| s.sequence_id).collect();
        assert_eq!(replayed, vec![2]);
    }

    #[test]
    fn failed_connect_backs_off_again() {
        let mut sync = SyncEngine::new("s", &EngineConfig::default());
        let mut transport = RecordingTransport {
            fail_connect: true,
            ..Default::default()
        };
        sync.start(&mut transport, 0.0);
        assert_eq!(sync.state(), ConnectionState::Disconnected);
        assert!(!sync.poll_reconnect(&mut transport, 400.0));
        assert!(!sync.poll_reconnect(&mut transport, 500.0));
        assert_eq!(sync.backoff().consecutive_failures(), 2);
        assert_eq!(transport.connects, 2);
    }

    #[test]
    fn send_failure_keeps_edit_queued() {
        let (mut sync, mut transport) = connected();
        transport.fail_send = true;
        sync.submit(&mut transport, dot(0, 0, 2), 0, 50.0);
        assert_eq!(sync.state(), ConnectionState::Disconnected);
        assert_eq!(sync.queued_len(), 1);
        assert_eq!(transport.closes, 1);
    }

    #[test]
    fn ack_is_idempotent() {
        let (mut sync, mut transport) = connected();
        sync.submit(&mut transport, dot(5, 5, 3), 0, 0.0);
        let first = sync.on_reply(EditReply::ack(1, 9, 40));
        assert!(matches!(
            first,
            Some(Resolution::Acked { revision: Some(9), new_balance: Some(40), .. })
        ));
        assert_eq!(sync.telegraph().color_at(5, 5), None);
        assert_eq!(sync.on_reply(EditReply::ack(1, 9, 40)), None);
        assert_eq!(sync.on_reply(EditReply::ack(77, 9, 40)), None);
    }

    #[test]
    fn reject_restores_older_in_flight_pixel() {
        let (mut sync, mut transport) = connected();
        sync.submit(&mut transport, dot(5, 5, 3), 0, 0.0);
        sync.submit(&mut transport, dot(5, 5, 8), 0, 0.0);
        let resolution = sync.on_reply(EditReply::reject(2, RejectReason::InvalidPixels));
        assert!(matches!(
            resolution,
            Some(Resolution::Rejected { reason: RejectReason::InvalidPixels, .. })
        ));
        assert_eq!(sync.telegraph().color_at(5, 5), Some(3));
    }

    #[test]
    fn closed_engine_never_reconnects() {
        let (mut sync, mut transport) = connected();
        sync.close(&mut transport);
        sync.on_disconnected(0.0);
        assert!(!sync.poll_reconnect(&mut transport, 1e9));
        assert_eq!(sync.state(), ConnectionState::Closed);
        assert_eq!(transport.closes, 1);
    }
}
