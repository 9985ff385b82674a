//! Floodwatch hazard reconciliation core.
//!
//! Pure domain logic with no network I/O:
//!
//! - [`classify`] — water-level thresholds and detector classification.
//! - [`reconciler`] — per-field deduplicating state of record.
//! - [`log_buffer`] — bounded newest-first audit log.
//! - [`connection`] — process-wide connectivity signal.
//! - [`frame`] — camera frame decoding and relay.

pub mod classify;
pub mod connection;
pub mod error;
pub mod frame;
pub mod hazard;
pub mod log_buffer;
pub mod reconciler;
pub mod types;
