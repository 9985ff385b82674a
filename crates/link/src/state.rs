//! Shared monitor state.
//!
//! [`MonitorState`] bundles the single reconciler, log buffer,
//! connectivity signal, and frame relay for the process, plus the
//! broadcast channel that feeds presentation. It is created once at
//! startup and shared as `Arc<MonitorState>`.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use floodwatch_core::classify::ThresholdConfig;
use floodwatch_core::connection::{ConnectionState, Connectivity};
use floodwatch_core::frame::{DecodedFrame, FrameRelay};
use floodwatch_core::hazard::{ChangeEvent, HazardReading};
use floodwatch_core::log_buffer::LogBuffer;
use floodwatch_core::reconciler::Reconciler;

use crate::events::{AlertKind, MonitorEvent, MonitorSnapshot};
use crate::messages::InboundEvent;

/// Broadcast channel capacity for presentation notifications.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct MonitorState {
    log: Arc<LogBuffer>,
    connectivity: Arc<Connectivity>,
    reconciler: Reconciler,
    relay: FrameRelay,
    event_tx: broadcast::Sender<MonitorEvent>,
}

impl MonitorState {
    /// Build the state of record and seed the log with `System initialized`.
    pub fn new(thresholds: ThresholdConfig) -> Arc<Self> {
        let log = Arc::new(LogBuffer::new());
        let connectivity = Arc::new(Connectivity::new(Arc::clone(&log)));
        let reconciler = Reconciler::new(thresholds, Arc::clone(&log), Arc::clone(&connectivity));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        log.append("System initialized");

        Arc::new(Self {
            log,
            connectivity,
            reconciler,
            relay: FrameRelay::new(),
            event_tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.event_tx.subscribe()
    }

    pub fn log(&self) -> &LogBuffer {
        &self.log
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connectivity.state()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn frame_relay(&self) -> &FrameRelay {
        &self.relay
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            state: self.reconciler.snapshot(),
            connection: self.connectivity.state(),
            logs: self.log.entries(),
            frame: self.relay.latest(),
        }
    }

    // ---- inbound events ----

    /// Route one decoded event to the reconciler, relay, or log.
    pub fn dispatch(&self, event: InboundEvent) {
        match event {
            InboundEvent::SmokeReading(data) => {
                self.apply_reading(data.into());
            }
            InboundEvent::RainReading(data) => {
                self.apply_reading(data.into());
            }
            InboundEvent::WaterLevelReading(data) => {
                self.apply_reading(data.into());
            }
            InboundEvent::CameraData(payload) => {
                self.relay_frame(&payload);
            }
            InboundEvent::SmokeAlert(data) => self.raise_alert(AlertKind::Smoke, data.message),
            InboundEvent::RainAlert(data) => self.raise_alert(AlertKind::Rain, data.message),
            InboundEvent::WaterLevelAlert(data) => {
                self.raise_alert(AlertKind::WaterLevel, data.message)
            }
            InboundEvent::CameraAlert(data) => self.raise_alert(AlertKind::Camera, data.message),
            InboundEvent::ConnectionStatus(data) => {
                tracing::debug!(status = %data.status, "Server status");
                self.note(format!("Server status: {}", data.status));
            }
        }
    }

    pub fn apply_reading(&self, reading: HazardReading) -> Option<ChangeEvent> {
        let change = self.reconciler.apply(reading)?;
        self.publish(MonitorEvent::StateChanged {
            change: change.clone(),
        });
        Some(change)
    }

    pub fn relay_frame(&self, payload: &Value) -> Option<DecodedFrame> {
        let frame = self.relay.on_frame(payload)?;
        self.publish(MonitorEvent::Frame {
            frame: frame.clone(),
        });
        Some(frame)
    }

    pub fn raise_alert(&self, source: AlertKind, message: String) {
        tracing::info!(source = ?source, message = %message, "Sensor alert");
        self.note(format!("{} alert: {message}", source.label()));
        self.publish(MonitorEvent::Alert { source, message });
    }

    /// Append a state-derived line, unless disconnected.
    fn note(&self, message: String) {
        if self.connectivity.is_disconnected() {
            tracing::debug!(message = %message, "Disconnected, suppressing log entry");
        } else {
            self.log.append(message);
        }
    }

    // ---- connectivity ----

    pub fn mark_connecting(&self, attempt: Option<u32>) {
        let changed = self.connectivity.mark_connecting(attempt);
        self.publish_connection(changed);
    }

    pub fn mark_connected(&self) {
        let changed = self.connectivity.mark_connected();
        self.publish_connection(changed);
    }

    pub fn mark_disconnected(&self, reason: &str) {
        let changed = self.connectivity.mark_disconnected(Some(reason));
        self.publish_connection(changed);
    }

    pub fn mark_attempt_failed(&self, reason: &str) {
        let changed = self.connectivity.mark_attempt_failed(reason);
        self.publish_connection(changed);
    }

    /// Record that reconnection has been abandoned. Not a transition.
    pub fn mark_retries_exhausted(&self, attempts: u32) {
        tracing::warn!(attempts, "Reconnect attempts exhausted, staying disconnected");
        self.log
            .append(format!("Reconnection abandoned after {attempts} attempts"));
    }

    fn publish_connection(&self, changed: bool) {
        if changed {
            self.publish(MonitorEvent::ConnectionChanged {
                state: self.connectivity.state(),
            });
        }
    }

    /// Release held resources. Called once the connection task has stopped.
    pub fn release(&self) {
        self.relay.release();
    }

    fn publish(&self, event: MonitorEvent) {
        // Ignore the SendError; it only means there are no subscribers.
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use floodwatch_core::hazard::WaterLevel;

    use super::*;
    use crate::messages::{AlertData, StatusData, WaterLevelData};

    fn connected() -> Arc<MonitorState> {
        let state = MonitorState::new(ThresholdConfig::default());
        state.mark_connecting(None);
        state.mark_connected();
        state
    }

    fn water(value: f64) -> InboundEvent {
        InboundEvent::WaterLevelReading(WaterLevelData {
            value,
            high_water_level: None,
        })
    }

    fn messages(state: &MonitorState) -> Vec<String> {
        state
            .log()
            .entries()
            .iter()
            .map(|e| e.message().to_string())
            .collect()
    }

    #[test]
    fn log_is_seeded_on_creation() {
        let state = MonitorState::new(ThresholdConfig::default());
        assert_eq!(messages(&state), vec!["System initialized"]);
        assert_eq!(state.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn state_changes_are_published_once() {
        let state = connected();
        let mut rx = state.subscribe();

        state.dispatch(water(260.0));
        state.dispatch(water(260.0));
        state.dispatch(water(510.0));

        let first = rx.recv().await.unwrap();
        assert_matches!(first, MonitorEvent::StateChanged { change } if change.raw_value == 260.0);
        let second = rx.recv().await.unwrap();
        assert_matches!(second, MonitorEvent::StateChanged { change } if change.raw_value == 510.0);
        assert!(rx.try_recv().is_err());

        assert_eq!(state.snapshot().state.water_level, WaterLevel::Danger);
    }

    #[tokio::test]
    async fn every_frame_is_published() {
        let state = connected();
        let mut rx = state.subscribe();

        let payload = json!({"image": "data:image/jpeg;base64,AAAA", "fire_detected": false});
        state.dispatch(InboundEvent::CameraData(payload.clone()));
        state.dispatch(InboundEvent::CameraData(payload));

        assert_matches!(rx.recv().await.unwrap(), MonitorEvent::Frame { .. });
        assert_matches!(rx.recv().await.unwrap(), MonitorEvent::Frame { .. });
        assert!(state.snapshot().frame.is_some());
    }

    #[test]
    fn unrecognized_frame_publishes_nothing() {
        let state = connected();
        let mut rx = state.subscribe();
        state.dispatch(InboundEvent::CameraData(json!({"pixels": []})));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn alerts_and_status_are_logged_when_connected() {
        let state = connected();
        state.dispatch(InboundEvent::SmokeAlert(AlertData {
            message: "Smoke near intake".into(),
        }));
        state.dispatch(InboundEvent::ConnectionStatus(StatusData {
            status: "sensors online".into(),
        }));

        let logs = messages(&state);
        assert_eq!(logs[0], "Server status: sensors online");
        assert_eq!(logs[1], "Smoke alert: Smoke near intake");
    }

    #[tokio::test]
    async fn disconnected_suppresses_derived_lines_but_not_transitions() {
        let state = connected();
        state.mark_disconnected("ping timeout");
        let mut rx = state.subscribe();
        let before = state.log().len();

        state.dispatch(water(800.0));
        state.dispatch(InboundEvent::WaterLevelAlert(AlertData {
            message: "rising".into(),
        }));

        assert_eq!(state.log().len(), before);
        assert_eq!(state.snapshot().state.water_level, WaterLevel::Danger);
        // Presentation still hears about the change.
        assert_matches!(rx.recv().await.unwrap(), MonitorEvent::StateChanged { .. });
        assert_matches!(rx.recv().await.unwrap(), MonitorEvent::Alert { .. });
    }

    #[tokio::test]
    async fn reconnect_scenario() {
        let state = connected();
        let mut rx = state.subscribe();

        state.mark_disconnected("ping timeout");
        assert_eq!(state.connection_state(), ConnectionState::Disconnected);
        assert!(messages(&state).contains(&"Disconnected from server: ping timeout".to_string()));

        state.mark_connecting(Some(1));
        state.mark_connected();
        assert_eq!(state.connection_state(), ConnectionState::Connected);
        assert_eq!(state.log().latest().unwrap().message(), "Connected to server");

        let states: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| match e {
                MonitorEvent::ConnectionChanged { state } => state,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            states,
            vec![
                ConnectionState::Disconnected,
                ConnectionState::Connecting,
                ConnectionState::Connected,
            ]
        );
    }

    #[test]
    fn exhausted_retries_are_logged_without_transition() {
        let state = MonitorState::new(ThresholdConfig::default());
        state.mark_retries_exhausted(5);
        assert_eq!(
            state.log().latest().unwrap().message(),
            "Reconnection abandoned after 5 attempts"
        );
        assert_eq!(state.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn release_drops_the_latest_frame() {
        let state = connected();
        state.relay_frame(&json!({"image": "x"}));
        state.release();
        assert!(state.snapshot().frame.is_none());
    }
}
