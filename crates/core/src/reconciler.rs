//! State reconciliation.
//!
//! [`Reconciler`] owns the authoritative last-known tier for every
//! monitored quantity. A reading only mutates state, and only produces a
//! [`ChangeEvent`] and log line, when its classified tier differs from the
//! stored one. Each quantity sits behind its own mutex so different fields
//! never contend, while updates to the same field are serialized together
//! with their log line.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::classify::{classify, ThresholdConfig};
use crate::connection::Connectivity;
use crate::hazard::{ChangeEvent, Detection, HazardReading, HazardTier, WaterLevel};
use crate::log_buffer::LogBuffer;

/// Snapshot of the reconciled values handed to presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReconciledState {
    pub smoke: bool,
    pub rain: bool,
    pub water_level: WaterLevel,
}

#[derive(Debug)]
pub struct Reconciler {
    smoke: Mutex<Detection>,
    rain: Mutex<Detection>,
    water_level: Mutex<WaterLevel>,
    thresholds: ThresholdConfig,
    log: Arc<LogBuffer>,
    connectivity: Arc<Connectivity>,
}

impl Reconciler {
    /// Starts from the defaults: no smoke, no rain, water level `Low`.
    pub fn new(
        thresholds: ThresholdConfig,
        log: Arc<LogBuffer>,
        connectivity: Arc<Connectivity>,
    ) -> Self {
        Self {
            smoke: Mutex::new(Detection::Clear),
            rain: Mutex::new(Detection::Clear),
            water_level: Mutex::new(WaterLevel::Low),
            thresholds,
            log,
            connectivity,
        }
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Merge a reading into the reconciled state.
    ///
    /// Returns `None` when the classified tier equals the stored tier.
    /// While disconnected the state still moves but no log line is written.
    pub fn apply(&self, reading: HazardReading) -> Option<ChangeEvent> {
        let field = reading.field();
        let raw_value = reading.raw_value();
        let next = classify(&reading, &self.thresholds);

        let change = match next {
            HazardTier::Detection(detection) => {
                let slot = match reading {
                    HazardReading::Rain { .. } => &self.rain,
                    _ => &self.smoke,
                };
                self.swap(slot, detection, |old| ChangeEvent {
                    field,
                    old_value: old.into(),
                    new_value: next,
                    raw_value,
                })
            }
            HazardTier::WaterLevel(level) => self.swap(&self.water_level, level, |old| ChangeEvent {
                field,
                old_value: old.into(),
                new_value: next,
                raw_value,
            }),
        };

        match &change {
            Some(change) => tracing::debug!(
                field = ?change.field,
                old = %change.old_value,
                new = %change.new_value,
                raw_value,
                "Hazard state changed",
            ),
            None => tracing::trace!(field = ?field, raw_value, "Reading unchanged"),
        }
        change
    }

    /// Compare-and-swap one field. The log line is written under the field
    /// lock so same-field changes reach the log in the order they were applied.
    fn swap<T, F>(&self, slot: &Mutex<T>, next: T, build: F) -> Option<ChangeEvent>
    where
        T: Copy + PartialEq,
        F: FnOnce(T) -> ChangeEvent,
    {
        let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == next {
            return None;
        }
        let old = std::mem::replace(&mut *current, next);
        let change = build(old);
        if self.connectivity.is_disconnected() {
            tracing::debug!(field = ?change.field, "Disconnected, suppressing log entry");
        } else {
            self.log.append(change.log_message());
        }
        Some(change)
    }

    /// Copy of the current values. Each field lock is held only while it is read.
    pub fn snapshot(&self) -> ReconciledState {
        ReconciledState {
            smoke: read(&self.smoke).is_detected(),
            rain: read(&self.rain).is_detected(),
            water_level: read(&self.water_level),
        }
    }
}

fn read<T: Copy>(slot: &Mutex<T>) -> T {
    *slot.lock().unwrap_or_else(PoisonError::into_inner)
}
