use serde::{Deserialize, Serialize};

use crate::geometry::Polygon;
use crate::pixel::Pixel;
use crate::plot::{Plot, PlotId, UserId};

/// Sequence ids are scoped to one session; a page reload starts a new session.
pub type SequenceId = u64;
pub type Revision = u64;

/// Frames sent by the client over the persistent channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Submit(EditSubmission),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKind {
    Pixels,
    Polygon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EditPayload {
    Pixels {
        pixels: Vec<Pixel>,
    },
    Polygon {
        polygon: Polygon,
        /// Set when reshaping an existing plot.
        #[serde(rename = "plotId", default, skip_serializing_if = "Option::is_none")]
        plot_id: Option<PlotId>,
    },
}

impl EditPayload {
    pub fn kind(&self) -> EditKind {
        match self {
            Self::Pixels { .. } => EditKind::Pixels,
            Self::Polygon { .. } => EditKind::Polygon,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSubmission {
    pub sequence_id: SequenceId,
    pub kind: EditKind,
    pub payload: EditPayload,
    pub cost_estimate: i64,
}

impl EditSubmission {
    pub fn new(sequence_id: SequenceId, payload: EditPayload, cost_estimate: i64) -> Self {
        Self {
            sequence_id,
            kind: payload.kind(),
            payload,
            cost_estimate,
        }
    }

    /// `kind` agrees with the payload shape.
    pub fn is_consistent(&self) -> bool {
        self.kind == self.payload.kind()
    }
}

/// Frames sent by the server over the persistent channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Reply(EditReply),
    /// Pixels applied on behalf of `author`, pushed to every connection.
    Pixels {
        revision: Revision,
        author: UserId,
        pixels: Vec<Pixel>,
    },
    PlotUpserted {
        plot: Plot,
    },
    PlotDeleted {
        #[serde(rename = "plotId")]
        plot_id: PlotId,
        revision: Revision,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ack,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InsufficientBalance,
    InvalidPolygon,
    InvalidPixels,
    RegionClaimed,
    PlotNotFound,
    NotOwner,
    SignInRequired,
    Malformed,
}

impl RejectReason {
    pub fn describe(self) -> &'static str {
        match self {
            Self::InsufficientBalance => "not enough pixels in your balance",
            Self::InvalidPolygon => "the plot outline is not a valid polygon",
            Self::InvalidPixels => "the edit contains pixels outside the canvas or palette",
            Self::RegionClaimed => "that region is already claimed",
            Self::PlotNotFound => "the plot no longer exists",
            Self::NotOwner => "you do not own that plot",
            Self::SignInRequired => "sign in to do that",
            Self::Malformed => "the server could not read the edit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditReply {
    pub sequence_id: SequenceId,
    pub status: ReplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<Revision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot: Option<Plot>,
}

impl EditReply {
    pub fn ack(sequence_id: SequenceId, revision: Revision, new_balance: i64) -> Self {
        Self {
            sequence_id,
            status: ReplyStatus::Ack,
            reason: None,
            new_balance: Some(new_balance),
            revision: Some(revision),
            plot: None,
        }
    }

    pub fn reject(sequence_id: SequenceId, reason: RejectReason) -> Self {
        Self {
            sequence_id,
            status: ReplyStatus::Reject,
            reason: Some(reason),
            new_balance: None,
            revision: None,
            plot: None,
        }
    }

    pub fn with_plot(mut self, plot: Plot) -> Self {
        self.plot = Some(plot);
        self
    }

    pub fn with_balance(mut self, balance: i64) -> Self {
        self.new_balance = Some(balance);
        self
    }
}
