use plotcanvas_shared::{PolygonError, RejectReason, SequenceId, TileError};
use thiserror::Error;

use crate::tools::ToolKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid plot outline: {0}")]
    InvalidPolygon(#[from] PolygonError),
    #[error("this costs {cost} pixels but your balance is {balance}")]
    InsufficientBalance { cost: i64, balance: i64 },
    #[error("connection lost; {queued} edit(s) will be sent once it is back")]
    NetworkUnavailable { queued: usize },
    #[error("tile {tx},{ty} failed to load: {reason}")]
    TileFetchFailed { tx: i32, ty: i32, reason: String },
    #[error("edit {sequence_id} was refused: {}", reason.describe())]
    ServerReject {
        sequence_id: SequenceId,
        reason: RejectReason,
    },
    #[error("fill would cover more than {limit} pixels")]
    FillTooLarge { limit: usize },
    #[error("fills must start on a loaded part of the canvas")]
    FillOutsideLoadedTiles,
    #[error("sign in to use the {} tool", tool.label())]
    SignInRequired { tool: ToolKind },
    #[error("tile payload rejected: {0}")]
    InvalidTile(#[from] TileError),
    #[error("plot request failed: {reason}")]
    PlotRequestFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,
    #[error("could not encode frame: {0}")]
    Encode(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("could not open connection: {0}")]
    Open(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A user-facing message raised by the engine. Rendering never depends on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub id: u64,
    pub severity: Severity,
    pub message: String,
    pub dismissible: bool,
    pub error: Option<EngineError>,
}

impl EngineError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::NetworkUnavailable { .. } => Severity::Info,
            Self::TileFetchFailed { .. } | Self::InvalidTile(_) | Self::PlotRequestFailed { .. } => {
                Severity::Warning
            }
            Self::InvalidPolygon(_)
            | Self::InsufficientBalance { .. }
            | Self::ServerReject { .. }
            | Self::FillTooLarge { .. }
            | Self::FillOutsideLoadedTiles
            | Self::SignInRequired { .. } => Severity::Error,
        }
    }

    /// Transient network problems; the engine retries them on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkUnavailable { .. } | Self::TileFetchFailed { .. }
        )
    }

    pub fn into_notice(self, id: u64) -> Notice {
        Notice {
            id,
            severity: self.severity(),
            message: self.to_string(),
            dismissible: true,
            error: Some(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_message_uses_reason_text() {
        let err = EngineError::ServerReject {
            sequence_id: 3,
            reason: RejectReason::RegionClaimed,
        };
        assert_eq!(
            err.to_string(),
            "edit 3 was refused: that region is already claimed"
        );
        let notice = err.into_notice(1);
        assert_eq!(notice.severity, Severity::Error);
        assert!(notice.dismissible);
    }

    #[test]
    fn polygon_errors_convert() {
        let err: EngineError = PolygonError::SelfIntersecting.into();
        assert!(matches!(err, EngineError::InvalidPolygon(_)));
        assert!(!err.is_transient());
        assert!(EngineError::NetworkUnavailable { queued: 2 }.is_transient());
    }
}
