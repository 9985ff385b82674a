//! Console presenter.
//!
//! Subscribes to [`MonitorEvent`]s and reports each one through
//! `tracing`. Rendering beyond a log line is left to real frontends.

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use floodwatch_link::{MonitorEvent, MonitorSnapshot};

/// One-line description of a notification.
pub fn describe(event: &MonitorEvent) -> String {
    match event {
        MonitorEvent::ConnectionChanged { state } => format!("connection {state}"),
        MonitorEvent::StateChanged { change } => format!(
            "{:?}: {} -> {} (raw {})",
            change.field, change.old_value, change.new_value, change.raw_value
        ),
        MonitorEvent::Frame { frame } => format!(
            "frame ({} bytes encoded){}",
            frame.image.as_str().len(),
            if frame.fire_detected {
                ", FIRE DETECTED"
            } else {
                ""
            }
        ),
        MonitorEvent::Alert { source, message } => format!("{} alert: {message}", source.label()),
    }
}

/// One-line summary of the current snapshot.
pub fn summarize(snapshot: &MonitorSnapshot) -> String {
    format!(
        "connection={} smoke={} rain={} water_level={} log_entries={}",
        snapshot.connection,
        if snapshot.state.smoke { "Detected" } else { "Clear" },
        if snapshot.state.rain { "Detected" } else { "Clear" },
        snapshot.state.water_level,
        snapshot.logs.len(),
    )
}

/// Report notifications until `cancel` fires or the channel closes.
pub async fn run(mut rx: broadcast::Receiver<MonitorEvent>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            received = rx.recv() => match received {
                Ok(event @ MonitorEvent::Frame { .. }) => {
                    tracing::debug!("{}", describe(&event));
                }
                Ok(event @ MonitorEvent::Alert { .. }) => {
                    tracing::warn!("{}", describe(&event));
                }
                Ok(event) => {
                    tracing::info!("{}", describe(&event));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Presenter lagged, notifications dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use floodwatch_core::classify::ThresholdConfig;
    use floodwatch_core::connection::ConnectionState;
    use floodwatch_core::hazard::{ChangeEvent, HazardField, WaterLevel};
    use floodwatch_link::{AlertKind, MonitorState};

    use super::*;

    #[test]
    fn describes_state_changes() {
        let event = MonitorEvent::StateChanged {
            change: ChangeEvent {
                field: HazardField::WaterLevel,
                old_value: WaterLevel::Caution.into(),
                new_value: WaterLevel::Danger.into(),
                raw_value: 510.0,
            },
        };
        assert_eq!(describe(&event), "WaterLevel: Caution -> Danger (raw 510)");
    }

    #[test]
    fn describes_connection_and_alerts() {
        let event = MonitorEvent::ConnectionChanged {
            state: ConnectionState::Connected,
        };
        assert_eq!(describe(&event), "connection connected");

        let event = MonitorEvent::Alert {
            source: AlertKind::Camera,
            message: "Lens blocked".into(),
        };
        assert_eq!(describe(&event), "Camera alert: Lens blocked");
    }

    #[test]
    fn summarizes_fresh_snapshot() {
        let state = MonitorState::new(ThresholdConfig::default());
        assert_eq!(
            summarize(&state.snapshot()),
            "connection=disconnected smoke=Clear rain=Clear water_level=Low log_entries=1"
        );
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let state = MonitorState::new(ThresholdConfig::default());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(state.subscribe(), cancel.clone()));

        state.mark_connecting(None);
        cancel.cancel();
        task.await.unwrap();
    }
}
