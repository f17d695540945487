//! Zero-argument snapshot trigger with callback fan-out.
//!
//! Attach [`SnapHelper`] next to a [`crate::RectSnap`], register callbacks, and
//! call [`SnapHelper::snap`] from a button or any other trigger. Callbacks run
//! in registration order with the cropped image.

use crate::coordinator::SnapCallback;
use crate::plugin::RectSnap;
use bevy::log::warn;
use bevy::prelude::*;
use image::RgbaImage;
use std::sync::Arc;

/// Callback receiving a finished snapshot.
pub type SnapListener = Arc<dyn Fn(&RgbaImage) + Send + Sync>;

#[derive(Component, Default)]
#[require(RectSnap)]
pub struct SnapHelper {
    listeners: Vec<SnapListener>,
    requested: bool,
}

impl SnapHelper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback, builder style.
    pub fn with_callback(mut self, callback: impl Fn(&RgbaImage) + Send + Sync + 'static) -> Self {
        self.add_callback(callback);
        self
    }

    pub fn add_callback(&mut self, callback: impl Fn(&RgbaImage) + Send + Sync + 'static) {
        self.listeners.push(Arc::new(callback));
    }

    /// Request a snapshot; picked up on the next frame.
    pub fn snap(&mut self) {
        self.requested = true;
    }

    /// Consume a pending request.
    pub fn take_request(&mut self) -> bool {
        std::mem::take(&mut self.requested)
    }

    /// Completion callback that forwards a successful snapshot to every listener.
    pub fn fan_out(&self) -> SnapCallback {
        let listeners = self.listeners.clone();
        Box::new(move |result| match result {
            Ok(image) => {
                for listener in &listeners {
                    listener(&image);
                }
            }
            Err(e) => warn!("Snapshot not delivered to listeners: {}", e),
        })
    }
}
