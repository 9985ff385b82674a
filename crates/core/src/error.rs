#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Invalid startup configuration. The only error that stops the process.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An inbound event that could not be interpreted. The event is dropped.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}
