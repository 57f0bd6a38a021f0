//! Decoding of one wire message into a structured sample. The sensor publishes
//! JSON with either a per-zone probability map (`probs`) or a single scalar
//! (`prob_target`), a base64 JPEG frame, and its own measured frame rate.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde::Deserialize;

use crate::error::DecodeError;

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    probs: Option<HashMap<String, f64>>,
    #[serde(default)]
    prob_target: Option<f64>,
    image_b64: String,
    #[serde(default)]
    jetson_fps: f64,
}

/// Detection output carried by one sample.
#[derive(Debug, Clone)]
pub enum Probabilities {
    /// Probability per named zone.
    Zones(HashMap<String, f64>),
    /// One scalar probability for the whole frame.
    Single(f64),
}

/// One decoded telemetry sample. Immutable after decode.
#[derive(Debug, Clone)]
pub struct Sample {
    pub probabilities: Probabilities,
    /// Compressed (JPEG) frame exactly as the sensor sent it.
    pub image: Bytes,
    /// Frame rate the sensor reports for itself.
    pub source_fps: f64,
}

impl Sample {
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let msg: WireMessage = serde_json::from_slice(raw)?;
        let probabilities = match (msg.probs, msg.prob_target) {
            (Some(zones), _) => Probabilities::Zones(zones),
            (None, Some(p)) => Probabilities::Single(p),
            (None, None) => return Err(DecodeError::MissingProbabilities),
        };
        let image = Bytes::from(BASE64.decode(msg.image_b64.as_bytes())?);
        Ok(Sample {
            probabilities,
            image,
            source_fps: msg.jetson_fps,
        })
    }
}
