//! Full-screen capture strategy.
//!
//! Goes through a full-display screenshot written to a temporary file:
//!
//! 1. Optionally hide UI, recording the prior visibility/opacity, and give
//!    the change one frame to reach the renderer
//! 2. Delete a stale temporary file and wait until the deletion is observed
//! 3. Trigger the capture and poll until the file appears, then settle
//! 4. Restore UI (on every exit path, success or failure)
//! 5. Decode the file, delete it and wait until the removal is observed
//!
//! Each poll is one display refresh. The settle delay after the file appears
//! is a timing assumption about the writer flushing, not a completion signal.

use crate::config::{FullScreenSettings, UiHideMode};
use crate::error::{CaptureError, CaptureResult};
use crate::host::{ScreenCapture, SnapFileSystem, UiVisibility};
use bevy::log::{debug, error, info, warn};
use bevy::math::UVec2;
use bevy::prelude::{Entity, Visibility};
use image::RgbaImage;
use std::path::PathBuf;
use std::task::Poll;
use std::time::Duration;

/// UI state hidden for the duration of the capture.
#[derive(Clone, Copy, Debug, PartialEq)]
enum HiddenUi {
    Surface {
        surface: Entity,
        previous: Visibility,
    },
    Target {
        element: Entity,
        previous: f32,
    },
}

enum Stage {
    Start,
    /// UI hidden this frame; visibility propagates before the next render.
    Hiding,
    AwaitStaleRemoval { since: Duration },
    AwaitFile { since: Duration },
    Settling { since: Duration },
    AwaitRemoval { image: RgbaImage, since: Duration },
    Finished,
}

/// In-progress full-screen capture.
pub struct FullScreenCapture {
    path: PathBuf,
    size: UVec2,
    ui_hide_mode: UiHideMode,
    surface: Entity,
    target: Entity,
    settings: FullScreenSettings,
    hidden: Option<HiddenUi>,
    stage: Stage,
}

impl FullScreenCapture {
    /// `size` is the root surface size the capture is expected to have.
    pub fn new(
        size: UVec2,
        ui_hide_mode: UiHideMode,
        surface: Entity,
        target: Entity,
        settings: FullScreenSettings,
    ) -> Self {
        Self {
            path: settings.temp_path(),
            size,
            ui_hide_mode,
            surface,
            target,
            settings,
            hidden: None,
            stage: Stage::Start,
        }
    }

    /// Advance by one display refresh.
    pub fn poll<H>(&mut self, host: &mut H, now: Duration) -> Poll<CaptureResult<RgbaImage>>
    where
        H: UiVisibility + ScreenCapture + SnapFileSystem,
    {
        match std::mem::replace(&mut self.stage, Stage::Finished) {
            Stage::Start => {
                self.hide_ui(host);
                if self.hidden.is_some() {
                    self.stage = Stage::Hiding;
                    return Poll::Pending;
                }
                self.clear_stale(host, now)
            }
            Stage::Hiding => self.clear_stale(host, now),
            Stage::AwaitStaleRemoval { since } => {
                if !host.file_exists(&self.path) {
                    return self.trigger(host, now);
                }
                let waited = now.saturating_sub(since);
                if waited >= self.settings.appear_timeout {
                    return self.fail(
                        host,
                        CaptureError::Timeout {
                            stage: "removing a stale capture file",
                            waited,
                        },
                    );
                }
                self.stage = Stage::AwaitStaleRemoval { since };
                Poll::Pending
            }
            Stage::AwaitFile { since } => {
                if host.file_exists(&self.path) {
                    self.stage = Stage::Settling { since: now };
                    return Poll::Pending;
                }
                let waited = now.saturating_sub(since);
                if waited >= self.settings.appear_timeout {
                    return self.fail(
                        host,
                        CaptureError::Timeout {
                            stage: "waiting for the capture file",
                            waited,
                        },
                    );
                }
                self.stage = Stage::AwaitFile { since };
                Poll::Pending
            }
            Stage::Settling { since } => {
                if now.saturating_sub(since) < self.settings.settle_delay {
                    self.stage = Stage::Settling { since };
                    return Poll::Pending;
                }

                self.restore_ui(host);
                let loaded = self.load(host);

                info!("Removing capture file {}", self.path.display());
                if let Err(e) = host.remove_file(&self.path) {
                    error!("Failed to remove {}: {}", self.path.display(), e);
                }

                match loaded {
                    Ok(image) => self.await_removal(host, image, now, now),
                    Err(e) => Poll::Ready(Err(e)),
                }
            }
            Stage::AwaitRemoval { image, since } => self.await_removal(host, image, since, now),
            Stage::Finished => Poll::Pending,
        }
    }

    fn clear_stale<H>(&mut self, host: &mut H, now: Duration) -> Poll<CaptureResult<RgbaImage>>
    where
        H: UiVisibility + ScreenCapture + SnapFileSystem,
    {
        if host.file_exists(&self.path) {
            debug!("Removing stale capture file {}", self.path.display());
            if let Err(e) = host.remove_file(&self.path) {
                return self.fail(host, e.into());
            }
            if host.file_exists(&self.path) {
                self.stage = Stage::AwaitStaleRemoval { since: now };
                return Poll::Pending;
            }
        }
        self.trigger(host, now)
    }

    fn trigger<H>(&mut self, host: &mut H, now: Duration) -> Poll<CaptureResult<RgbaImage>>
    where
        H: UiVisibility + ScreenCapture + SnapFileSystem,
    {
        if let Err(e) = host.capture_screen_to_file(&self.path) {
            return self.fail(host, e);
        }
        info!("Saving capture file {}", self.path.display());
        self.stage = Stage::AwaitFile { since: now };
        Poll::Pending
    }

    fn await_removal<H>(
        &mut self,
        host: &mut H,
        image: RgbaImage,
        since: Duration,
        now: Duration,
    ) -> Poll<CaptureResult<RgbaImage>>
    where
        H: SnapFileSystem,
    {
        if !host.file_exists(&self.path) {
            return Poll::Ready(Ok(image));
        }
        if now.saturating_sub(since) >= self.settings.removal_timeout {
            warn!(
                "Capture file {} still present after removal, delivering snapshot anyway",
                self.path.display()
            );
            return Poll::Ready(Ok(image));
        }
        self.stage = Stage::AwaitRemoval { image, since };
        Poll::Pending
    }

    fn load<H: SnapFileSystem>(&self, host: &H) -> CaptureResult<RgbaImage> {
        let bytes = host.read_file(&self.path)?;
        let image = image::load_from_memory(&bytes)?.to_rgba8();

        if image.dimensions() != (self.size.x, self.size.y) {
            debug!(
                "Capture file is {}x{}, root surface is {}x{}",
                image.width(),
                image.height(),
                self.size.x,
                self.size.y
            );
        }
        Ok(image)
    }

    fn fail<H: UiVisibility>(
        &mut self,
        host: &mut H,
        error: CaptureError,
    ) -> Poll<CaptureResult<RgbaImage>> {
        self.restore_ui(host);
        Poll::Ready(Err(error))
    }

    fn hide_ui<H: UiVisibility>(&mut self, host: &mut H) {
        self.hidden = match self.ui_hide_mode {
            UiHideMode::DontHide => None,
            UiHideMode::HideWholeSurface => {
                host.surface_visibility(self.surface).map(|previous| {
                    host.set_surface_visibility(self.surface, Visibility::Hidden);
                    HiddenUi::Surface {
                        surface: self.surface,
                        previous,
                    }
                })
            }
            UiHideMode::HideTargetOnly => host.element_alpha(self.target).map(|previous| {
                host.set_element_alpha(self.target, 0.0);
                HiddenUi::Target {
                    element: self.target,
                    previous,
                }
            }),
        };
    }

    fn restore_ui<H: UiVisibility>(&mut self, host: &mut H) {
        match self.hidden.take() {
            Some(HiddenUi::Surface { surface, previous }) => {
                host.set_surface_visibility(surface, previous)
            }
            Some(HiddenUi::Target { element, previous }) => {
                host.set_element_alpha(element, previous)
            }
            None => {}
        }
    }
}
