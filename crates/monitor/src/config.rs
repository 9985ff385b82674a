use std::time::Duration;

use floodwatch_core::classify::{ThresholdConfig, DEFAULT_CAUTION_MIN, DEFAULT_DANGER_MIN};
use floodwatch_core::error::CoreError;
use floodwatch_link::client::Transport;
use floodwatch_link::reconnect::ReconnectConfig;
use floodwatch_link::ConnectionConfig;

/// Monitor configuration loaded from environment variables.
///
/// All fields have defaults suitable for a sensor server on the local
/// machine. Any value that is present but invalid is a startup error.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Sensor server base URL (default: `http://localhost:5000`).
    pub endpoint: String,
    /// Transport preference list (default: `websocket`).
    pub transports: Vec<Transport>,
    /// Reconnect attempt bound (default: unbounded).
    pub reconnect_attempts: Option<u32>,
    /// Delay before each reconnect attempt (default: 1000 ms).
    pub reconnect_delay: Duration,
    /// Bound on socket open plus handshake (default: 20 s).
    pub connect_timeout: Duration,
    pub thresholds: ThresholdConfig,
}

impl MonitorConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                | Default                 |
    /// |------------------------|-------------------------|
    /// | `SENSOR_SERVER_URL`    | `http://localhost:5000` |
    /// | `SENSOR_TRANSPORTS`    | `websocket`             |
    /// | `RECONNECT_ATTEMPTS`   | unbounded               |
    /// | `RECONNECT_DELAY_MS`   | `1000`                  |
    /// | `CONNECT_TIMEOUT_SECS` | `20`                    |
    /// | `WATER_CAUTION_MIN`    | `250`                   |
    /// | `WATER_DANGER_MIN`     | `500`                   |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let endpoint = get("SENSOR_SERVER_URL").unwrap_or_else(|| "http://localhost:5000".into());

        let transports = get("SENSOR_TRANSPORTS")
            .unwrap_or_else(|| "websocket".into())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Transport>, _>>()?;

        let reconnect_attempts = get("RECONNECT_ATTEMPTS")
            .map(|v| parse::<u32>("RECONNECT_ATTEMPTS", &v))
            .transpose()?;

        let reconnect_delay_ms = get("RECONNECT_DELAY_MS")
            .map(|v| parse::<u64>("RECONNECT_DELAY_MS", &v))
            .transpose()?
            .unwrap_or(1000);

        let connect_timeout_secs = get("CONNECT_TIMEOUT_SECS")
            .map(|v| parse::<u64>("CONNECT_TIMEOUT_SECS", &v))
            .transpose()?
            .unwrap_or(20);
        if connect_timeout_secs == 0 {
            return Err(CoreError::Configuration(
                "CONNECT_TIMEOUT_SECS must be greater than zero".into(),
            ));
        }

        let caution_min = get("WATER_CAUTION_MIN")
            .map(|v| parse::<f64>("WATER_CAUTION_MIN", &v))
            .transpose()?
            .unwrap_or(DEFAULT_CAUTION_MIN);
        let danger_min = get("WATER_DANGER_MIN")
            .map(|v| parse::<f64>("WATER_DANGER_MIN", &v))
            .transpose()?
            .unwrap_or(DEFAULT_DANGER_MIN);
        let thresholds = ThresholdConfig::new(caution_min, danger_min)?;

        Ok(Self {
            endpoint,
            transports,
            reconnect_attempts,
            reconnect_delay: Duration::from_millis(reconnect_delay_ms),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            thresholds,
        })
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            endpoint: self.endpoint.clone(),
            transports: self.transports.clone(),
            reconnect: ReconnectConfig {
                delay: self.reconnect_delay,
                max_attempts: self.reconnect_attempts,
            },
            connect_timeout: self.connect_timeout,
        }
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, CoreError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| CoreError::Configuration(format!("{key} must be a valid number: {e}")))
}
