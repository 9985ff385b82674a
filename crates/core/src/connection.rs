//! Connectivity signal shared between the connection manager and the
//! reconciler.
//!
//! [`Connectivity`] holds the process-wide [`ConnectionState`] in a
//! `tokio::sync::watch` channel. Only the connection manager drives
//! transitions; every transition that actually changes the state is
//! recorded once in the [`LogBuffer`].

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::log_buffer::LogBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
        }
    }
}

#[derive(Debug)]
pub struct Connectivity {
    tx: watch::Sender<ConnectionState>,
    log: Arc<LogBuffer>,
}

impl Connectivity {
    /// Starts out [`ConnectionState::Disconnected`].
    pub fn new(log: Arc<LogBuffer>) -> Self {
        let (tx, _) = watch::channel(ConnectionState::Disconnected);
        Self { tx, log }
    }

    pub fn state(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    pub fn is_disconnected(&self) -> bool {
        self.state() == ConnectionState::Disconnected
    }

    /// Receiver that observes every transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Disconnected -> Connecting. `attempt` is `None` for the initial connect.
    pub fn mark_connecting(&self, attempt: Option<u32>) -> bool {
        let message = match attempt {
            None => "Connecting to server".to_string(),
            Some(n) => format!("Reconnect attempt {n}"),
        };
        self.transition(ConnectionState::Connecting, message)
    }

    /// Connecting -> Connected.
    pub fn mark_connected(&self) -> bool {
        self.transition(ConnectionState::Connected, "Connected to server".to_string())
    }

    /// Connected -> Disconnected.
    pub fn mark_disconnected(&self, reason: Option<&str>) -> bool {
        let message = match reason {
            Some(reason) => format!("Disconnected from server: {reason}"),
            None => "Disconnected from server".to_string(),
        };
        self.transition(ConnectionState::Disconnected, message)
    }

    /// Connecting -> Disconnected after a failed attempt.
    pub fn mark_attempt_failed(&self, reason: &str) -> bool {
        self.transition(
            ConnectionState::Disconnected,
            format!("Connection failed: {reason}"),
        )
    }

    /// Apply `next` if it differs from the current state. Returns whether it did.
    ///
    /// The log line is written before subscribers are notified.
    fn transition(&self, next: ConnectionState, message: String) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            tracing::info!(state = %next, "{message}");
            self.log.append(message);
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connectivity() -> (Connectivity, Arc<LogBuffer>) {
        let log = Arc::new(LogBuffer::new());
        (Connectivity::new(Arc::clone(&log)), log)
    }

    fn messages(log: &LogBuffer) -> Vec<String> {
        log.entries().iter().map(|e| e.message().to_string()).collect()
    }

    #[test]
    fn starts_disconnected_with_empty_log() {
        let (c, log) = connectivity();
        assert_eq!(c.state(), ConnectionState::Disconnected);
        assert!(log.is_empty());
    }

    #[test]
    fn full_lifecycle_logs_each_transition_once() {
        let (c, log) = connectivity();

        assert!(c.mark_connecting(None));
        assert!(c.mark_connected());
        assert!(c.mark_disconnected(Some("ping timeout")));
        assert!(c.mark_connecting(Some(1)));
        assert!(c.mark_connected());

        assert_eq!(
            messages(&log),
            vec![
                "Connected to server",
                "Reconnect attempt 1",
                "Disconnected from server: ping timeout",
                "Connected to server",
                "Connecting to server",
            ]
        );
    }

    #[test]
    fn repeated_transition_is_not_logged_twice() {
        let (c, log) = connectivity();
        c.mark_connecting(None);
        c.mark_connected();
        assert!(c.mark_disconnected(Some("transport close")));
        assert!(!c.mark_disconnected(Some("transport close")));

        let count = messages(&log)
            .iter()
            .filter(|m| m.starts_with("Disconnected from server"))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn failed_attempt_returns_to_disconnected() {
        let (c, log) = connectivity();
        c.mark_connecting(None);
        assert!(c.mark_attempt_failed("connection refused"));
        assert!(c.is_disconnected());
        assert_eq!(
            log.latest().unwrap().message(),
            "Connection failed: connection refused"
        );
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let (c, _log) = connectivity();
        let mut rx = c.subscribe();

        c.mark_connecting(None);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Connecting);

        c.mark_connected();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Connected);
    }
}
