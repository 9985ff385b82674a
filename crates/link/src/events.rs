//! Notifications published to the presentation layer.
//!
//! These are produced by [`MonitorState`](crate::state::MonitorState) as
//! the connection task interprets inbound events. The snapshot remains
//! the authoritative view; notifications only say that something moved.

use serde::Serialize;

use floodwatch_core::connection::ConnectionState;
use floodwatch_core::frame::DecodedFrame;
use floodwatch_core::hazard::ChangeEvent;
use floodwatch_core::log_buffer::LogEntry;
use floodwatch_core::reconciler::ReconciledState;

/// Source of a free-text alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Smoke,
    Rain,
    WaterLevel,
    Camera,
}

impl AlertKind {
    /// Prefix used for the audit log line.
    pub fn label(self) -> &'static str {
        match self {
            AlertKind::Smoke => "Smoke",
            AlertKind::Rain => "Rain",
            AlertKind::WaterLevel => "Water level",
            AlertKind::Camera => "Camera",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// The connection moved to a new state.
    ConnectionChanged { state: ConnectionState },

    /// A hazard quantity moved to a different tier.
    StateChanged { change: ChangeEvent },

    /// A camera frame was decoded. Published for every frame.
    Frame { frame: DecodedFrame },

    /// The server raised a free-text alert.
    Alert { source: AlertKind, message: String },
}

/// Everything the presentation layer renders, copied out at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub state: ReconciledState,
    pub connection: ConnectionState,
    /// Newest first.
    pub logs: Vec<LogEntry>,
    pub frame: Option<DecodedFrame>,
}
