//! Camera frame decoding and relay.
//!
//! Producers have sent two payload shapes over time:
//!
//! - flat: `{"image": "<data url>", "fire_detected": true}`
//! - nested: `{"frame": "<data url>"}` or `{"frame": {"image": "<data url>"}}`
//!
//! Both are resolved into a [`FrameShape`] at decode time. Frames are a
//! continuous stream, so the relay forwards every recognized frame without
//! comparing it to the previous one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use base64::Engine;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Encoded image as received, usually a base64 `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FrameImage(String);

impl FrameImage {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the pixel bytes of a base64 `data:` URL.
    ///
    /// Returns `None` for anything that is not a base64 data URL.
    pub fn decode_data_url(&self) -> Option<Vec<u8>> {
        let rest = self.0.strip_prefix("data:")?;
        let (meta, body) = rest.split_once(',')?;
        if !meta.ends_with(";base64") {
            return None;
        }
        base64::engine::general_purpose::STANDARD.decode(body).ok()
    }
}

/// Payload shape, resolved once per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameShape {
    /// `{"image": "..."}`
    Flat(String),
    /// `{"frame": "..."}`
    FrameString(String),
    /// `{"frame": {"image": "..."}}`
    FrameObject(String),
}

impl FrameShape {
    /// Resolve the shape of a `camera_data` payload.
    ///
    /// Empty strings count as absent. A flat `image` wins over `frame`.
    pub fn resolve(payload: &Value) -> Result<Self, CoreError> {
        if let Some(image) = non_empty_str(payload.get("image")) {
            return Ok(FrameShape::Flat(image.to_string()));
        }
        match payload.get("frame") {
            Some(Value::String(s)) if !s.is_empty() => Ok(FrameShape::FrameString(s.clone())),
            Some(frame @ Value::Object(_)) => non_empty_str(frame.get("image"))
                .map(|image| FrameShape::FrameObject(image.to_string()))
                .ok_or_else(|| {
                    CoreError::MalformedPayload("camera frame object has no image".into())
                }),
            _ => Err(CoreError::MalformedPayload(
                "camera payload carries neither image nor frame".into(),
            )),
        }
    }

    pub fn into_image(self) -> FrameImage {
        match self {
            FrameShape::Flat(s) | FrameShape::FrameString(s) | FrameShape::FrameObject(s) => {
                FrameImage(s)
            }
        }
    }
}

/// A normalized camera frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedFrame {
    pub image: FrameImage,
    pub fire_detected: bool,
    pub received_at: Timestamp,
}

/// Decode a `camera_data` payload of either shape.
pub fn decode_frame(payload: &Value) -> Result<DecodedFrame, CoreError> {
    let image = FrameShape::resolve(payload)?.into_image();
    let fire_detected = payload.get("fire_detected").is_some_and(is_truthy);
    Ok(DecodedFrame {
        image,
        fire_detected,
        received_at: Utc::now(),
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Loose truthiness: producers have sent `fire_detected` as bools, 0/1, and strings.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Holds the latest decoded frame for presentation.
#[derive(Debug, Default)]
pub struct FrameRelay {
    latest: Mutex<Option<DecodedFrame>>,
    forwarded: AtomicU64,
    released: AtomicBool,
}

impl FrameRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and forward a frame.
    ///
    /// Unrecognized payloads are dropped and yield `None`; so does every
    /// frame received after [`release`](Self::release).
    pub fn on_frame(&self, payload: &Value) -> Option<DecodedFrame> {
        if self.released.load(Ordering::Acquire) {
            tracing::trace!("Frame relay released, dropping frame");
            return None;
        }
        match decode_frame(payload) {
            Ok(frame) => {
                *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame.clone());
                self.forwarded.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(fire_detected = frame.fire_detected, "Frame forwarded");
                Some(frame)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring camera payload");
                None
            }
        }
    }

    pub fn latest(&self) -> Option<DecodedFrame> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of frames forwarded since creation.
    pub fn forwarded_count(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Drop the held frame and stop accepting new ones.
    pub fn release(&self) {
        self.released.store(true, Ordering::Release);
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        tracing::debug!("Frame relay released");
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}
