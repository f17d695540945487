//! Error types for rect snapshots.

use bevy::prelude::Entity;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while capturing a snapshot.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// A capture is already in flight on this coordinator.
    #[error("a snapshot is already being captured")]
    Busy,

    /// The config has no target area set.
    #[error("no target area configured")]
    MissingTarget,

    /// The target area is not under a `SnapSurface`.
    #[error("target area {0} has no enclosing snap surface")]
    MissingRootSurface(Entity),

    /// The host could not report on-screen corners for an element.
    #[error("element {0} has no computed layout")]
    MissingGeometry(Entity),

    /// No source camera configured and no default camera available.
    #[error("no camera available for render target capture")]
    MissingCamera,

    /// The cropped region covers zero pixels.
    #[error("crop region is empty")]
    EmptyRegion,

    /// A bounded wait ran out.
    #[error("timed out while {stage} (waited {waited:?})")]
    Timeout {
        stage: &'static str,
        waited: Duration,
    },

    /// File system error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The capture file could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Render target setup or readback failed.
    #[error("render error: {0}")]
    Render(String),
}

impl From<image::ImageError> for CaptureError {
    fn from(e: image::ImageError) -> Self {
        CaptureError::Decode(e.to_string())
    }
}

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;
