//! Texture target capture strategy.
//!
//! Renders the source camera into an off-screen buffer sized to the root
//! surface and reads it back:
//!
//! 1. Wait for the current frame to finish rendering
//! 2. Allocate the buffer and point the camera at it
//! 3. One frame later, request a readback of the rendered buffer
//! 4. Once the readback arrives, restore the camera target and release the buffer
//!
//! Step 4 runs on every exit path, including failures and timeouts.

use crate::config::TextureTargetSettings;
use crate::error::{CaptureError, CaptureResult};
use crate::host::RenderHost;
use bevy::log::{debug, error};
use bevy::math::UVec2;
use bevy::prelude::Entity;
use image::RgbaImage;
use std::task::Poll;
use std::time::Duration;

enum Stage<B, T> {
    /// Waiting for the requesting frame to finish rendering.
    Scheduled,
    /// Camera bound to the buffer; its render lands this frame.
    Bound { buffer: B, previous: T },
    /// Readback requested, waiting for pixels.
    Reading {
        buffer: B,
        previous: T,
        frames: u32,
        since: Duration,
    },
    Finished,
}

/// In-progress texture target capture over buffer `B` and camera target `T`.
pub struct TextureTargetCapture<B, T> {
    camera: Entity,
    size: UVec2,
    settings: TextureTargetSettings,
    stage: Stage<B, T>,
}

impl<B, T> TextureTargetCapture<B, T> {
    pub fn new(camera: Entity, size: UVec2, settings: TextureTargetSettings) -> Self {
        Self {
            camera,
            size,
            settings,
            stage: Stage::Scheduled,
        }
    }

    /// Advance by one frame.
    pub fn poll<H>(&mut self, host: &mut H, now: Duration) -> Poll<CaptureResult<RgbaImage>>
    where
        H: RenderHost<Buffer = B, Target = T>,
    {
        match std::mem::replace(&mut self.stage, Stage::Finished) {
            Stage::Scheduled => match self.bind(host) {
                Ok((buffer, previous)) => {
                    self.stage = Stage::Bound { buffer, previous };
                    Poll::Pending
                }
                Err(e) => Poll::Ready(Err(e)),
            },
            Stage::Bound { buffer, previous } => match host.request_readback(&buffer) {
                Ok(()) => {
                    self.stage = Stage::Reading {
                        buffer,
                        previous,
                        frames: 0,
                        since: now,
                    };
                    Poll::Pending
                }
                Err(e) => {
                    self.release(host, buffer, previous);
                    Poll::Ready(Err(e))
                }
            },
            Stage::Reading {
                buffer,
                previous,
                frames,
                since,
            } => {
                if let Some(result) = host.poll_readback(&buffer) {
                    self.release(host, buffer, previous);
                    return Poll::Ready(result);
                }

                let frames = frames + 1;
                if frames >= self.settings.readback_timeout_frames {
                    self.release(host, buffer, previous);
                    return Poll::Ready(Err(CaptureError::Timeout {
                        stage: "reading back the render target",
                        waited: now.saturating_sub(since),
                    }));
                }

                self.stage = Stage::Reading {
                    buffer,
                    previous,
                    frames,
                    since,
                };
                Poll::Pending
            }
            Stage::Finished => Poll::Pending,
        }
    }

    fn bind<H>(&self, host: &mut H) -> CaptureResult<(B, T)>
    where
        H: RenderHost<Buffer = B, Target = T>,
    {
        if self.size.x == 0 || self.size.y == 0 {
            return Err(CaptureError::EmptyRegion);
        }

        let previous = host
            .camera_target(self.camera)
            .ok_or(CaptureError::MissingCamera)?;
        let buffer = host.allocate_buffer(self.size)?;

        let target = host.buffer_target(&buffer);
        if let Err(e) = host.set_camera_target(self.camera, target) {
            self.release(host, buffer, previous);
            return Err(e);
        }

        debug!(
            "Rendering camera {} into {}x{} snapshot buffer",
            self.camera, self.size.x, self.size.y
        );
        Ok((buffer, previous))
    }

    fn release<H>(&self, host: &mut H, buffer: B, previous: T)
    where
        H: RenderHost<Buffer = B, Target = T>,
    {
        if let Err(e) = host.set_camera_target(self.camera, previous) {
            error!("Failed to restore target of camera {}: {}", self.camera, e);
        }
        host.release_buffer(buffer);
    }
}
