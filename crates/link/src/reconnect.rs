//! Fixed-delay reconnection for the sensor server connection.
//!
//! When the connection drops, the manager calls [`reconnect_loop`] to
//! keep retrying after a fixed delay until the connection is restored,
//! the attempt bound is reached, or the [`CancellationToken`] fires.
//! Every attempt moves the connectivity signal and lands in the log.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{EventConnection, EventSourceClient};
use crate::state::MonitorState;

/// Retry policy after a lost or failed connection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Wait before each reconnection attempt.
    pub delay: Duration,
    /// Give up after this many attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

/// Whether attempt number `attempt` (1-based) is within the bound.
pub fn attempt_allowed(attempt: u32, config: &ReconnectConfig) -> bool {
    config.max_attempts.map_or(true, |max| attempt <= max)
}

/// Outcome of a [`reconnect_loop`].
pub enum ReconnectOutcome {
    Connected(EventConnection),
    /// The attempt bound was reached; holds the number of attempts made.
    Exhausted(u32),
    Cancelled,
}

/// Retry the connection with a fixed delay between attempts.
pub async fn reconnect_loop(
    client: &EventSourceClient,
    config: &ReconnectConfig,
    state: &MonitorState,
    cancel: &CancellationToken,
) -> ReconnectOutcome {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if !attempt_allowed(attempt, config) {
            let made = attempt - 1;
            state.mark_retries_exhausted(made);
            return ReconnectOutcome::Exhausted(made);
        }

        // Wait before the attempt, respecting cancellation.
        tokio::select! {
            _ = cancel.cancelled() => return ReconnectOutcome::Cancelled,
            _ = tokio::time::sleep(config.delay) => {}
        }

        tracing::info!(
            attempt,
            delay_ms = config.delay.as_millis() as u64,
            "Reconnecting to sensor server",
        );
        state.mark_connecting(Some(attempt));

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reconnect cancelled");
                state.mark_attempt_failed("cancelled");
                return ReconnectOutcome::Cancelled;
            }
            result = client.connect() => {
                match result {
                    Ok(conn) => {
                        tracing::info!(attempt, "Reconnected to sensor server");
                        return ReconnectOutcome::Connected(conn);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Reconnect attempt {attempt} failed");
                        state.mark_attempt_failed(&e.to_string());
                    }
                }
            }
        }
    }
}
