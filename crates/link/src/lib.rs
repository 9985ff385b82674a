//! Sensor server link.
//!
//! Provides Socket.IO message parsing, WebSocket connection management,
//! fixed-delay reconnection, and the shared [`MonitorState`] that routes
//! decoded events into the reconciliation core and out to presentation.

pub mod client;
pub mod events;
pub mod manager;
pub mod messages;
pub mod processor;
pub mod reconnect;
pub mod state;

pub use events::{AlertKind, MonitorEvent, MonitorSnapshot};
pub use manager::{ConnectionConfig, ConnectionManager};
pub use state::MonitorState;
