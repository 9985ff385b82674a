//! Connection lifecycle for the sensor server.
//!
//! [`ConnectionManager::connect`] spawns one long-lived task that
//! connects, processes messages, and reconnects when the connection
//! drops (connect -> process -> reconnect loop). Connectivity is exposed
//! through [`MonitorState`]; the manager itself only owns the task and
//! its cancellation token.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use floodwatch_core::connection::ConnectionState;
use floodwatch_core::error::CoreError;

use crate::client::{validate_transports, EventSourceClient, Transport};
use crate::processor::process_messages;
use crate::reconnect::{reconnect_loop, ReconnectConfig, ReconnectOutcome};
use crate::state::MonitorState;

/// How long [`ConnectionManager::shutdown`] waits for the task to exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything needed to reach the sensor server.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server base URL, e.g. `http://host:5000`.
    pub endpoint: String,
    /// Transport preference list. Must include WebSocket.
    pub transports: Vec<Transport>,
    pub reconnect: ReconnectConfig,
    /// Bound on socket open plus handshake for each attempt.
    pub connect_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            transports: vec![Transport::WebSocket],
            reconnect: ReconnectConfig::default(),
            connect_timeout: Duration::from_secs(20),
        }
    }
}

/// Handle to the running connection task.
#[derive(Debug)]
pub struct ConnectionManager {
    state: Arc<MonitorState>,
    cancel: CancellationToken,
    task_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Validate `config` and start connecting in the background.
    ///
    /// Returns immediately; watch [`connection_state`](Self::connection_state)
    /// or subscribe to `state` for progress.
    pub fn connect(config: ConnectionConfig, state: Arc<MonitorState>) -> Result<Self, CoreError> {
        validate_transports(&config.transports)?;
        let client = EventSourceClient::new(&config.endpoint, config.connect_timeout)?;
        let cancel = CancellationToken::new();

        let task_state = Arc::clone(&state);
        let task_cancel = cancel.clone();
        let reconnect = config.reconnect.clone();

        let task_handle = tokio::spawn(async move {
            tracing::info!(url = %client.url(), "Starting connection task");
            run_connection_loop(&client, &reconnect, &task_state, &task_cancel).await;
            tracing::info!("Connection task exited");
        });

        Ok(Self {
            state,
            cancel,
            task_handle: Mutex::new(Some(task_handle)),
        })
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.connection_state()
    }

    /// Receiver observing every connectivity transition.
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.connectivity().subscribe()
    }

    pub fn state(&self) -> &Arc<MonitorState> {
        &self.state
    }

    /// Stop the connection task and release held resources.
    ///
    /// Cancels any pending reconnect timer, closes the transport, waits up
    /// to 5 seconds for the task, then releases the frame relay.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down connection manager");
        self.cancel.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            stop_task(handle, SHUTDOWN_TIMEOUT).await;
        }

        self.state.release();
        tracing::info!("Connection manager shut down complete");
    }
}

/// Wait up to `timeout` for `handle` to finish, aborting it otherwise so
/// the socket it owns is dropped.
async fn stop_task(mut handle: tokio::task::JoinHandle<()>, timeout: Duration) {
    if tokio::time::timeout(timeout, &mut handle).await.is_err() {
        tracing::warn!("Connection task did not stop in time, aborting");
        handle.abort();
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Core connection loop: connect -> process messages -> reconnect.
///
/// Runs until cancelled or until reconnect attempts are exhausted.
async fn run_connection_loop(
    client: &EventSourceClient,
    reconnect: &ReconnectConfig,
    state: &MonitorState,
    cancel: &CancellationToken,
) {
    state.mark_connecting(None);
    let initial = tokio::select! {
        _ = cancel.cancelled() => {
            state.mark_attempt_failed("cancelled");
            return;
        }
        result = client.connect() => result,
    };

    let mut conn = match initial {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(error = %e, "Connection failed, entering reconnect loop");
            state.mark_attempt_failed(&e.to_string());
            match reconnect_loop(client, reconnect, state, cancel).await {
                ReconnectOutcome::Connected(conn) => conn,
                ReconnectOutcome::Exhausted(_) | ReconnectOutcome::Cancelled => return,
            }
        }
    };

    loop {
        state.mark_connected();

        // Process messages until the connection drops.
        let reason = process_messages(&mut conn, state, cancel).await;
        drop(conn);
        state.mark_disconnected(reason.as_str());

        if cancel.is_cancelled() {
            return;
        }

        tracing::info!(reason = %reason, "Connection lost, entering reconnect loop");
        conn = match reconnect_loop(client, reconnect, state, cancel).await {
            ReconnectOutcome::Connected(conn) => conn,
            ReconnectOutcome::Exhausted(_) | ReconnectOutcome::Cancelled => return,
        };
    }
}
