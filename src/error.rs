// THEORY:
// One error taxonomy for the whole pipeline, mirroring the failure policy of
// the ingest loop: nothing here is fatal to the process. Transport errors are
// retried on the next iteration, decode and render errors drop the offending
// sample, and snapshot errors are reported back to the HTTP caller as text.
// Typed variants exist so callers can branch (e.g. 503 for `Unavailable`)
// without string matching.

use thiserror::Error;

/// Failure to turn a wire message into a [`crate::sample::Sample`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed telemetry payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("malformed embedded image: {0}")]
    ImageEncoding(#[from] base64::DecodeError),
    #[error("message carries neither zone nor single-target probabilities")]
    MissingProbabilities,
}

/// Failure inside the overlay transform. The caller drops the cycle.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("frame is empty")]
    EmptyFrame,
    #[error("frame failed to decode: {0}")]
    Image(#[from] image::ImageError),
}

/// Failure of an on-demand snapshot capture, surfaced to the HTTP caller.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("no frame received yet")]
    Unavailable,
    #[error("snapshot image processing failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("snapshot write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything that can make the ingest loop drop one iteration.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transport receive failed: {0}")]
    Transport(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Render(#[from] RenderError),
}
