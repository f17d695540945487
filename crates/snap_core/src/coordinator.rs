//! Single-flight capture coordinator.
//!
//! One coordinator per capturable target. [`CaptureCoordinator::capture`]
//! validates the target geometry, picks a strategy and opens a session;
//! [`CaptureCoordinator::tick`] advances the session once per frame and, when
//! the strategy delivers a full frame, crops it and hands the result to the
//! completion callback.
//!
//! A request made while a session is in flight is rejected with
//! [`CaptureError::Busy`], never queued, and its callback is never invoked.

use crate::config::{CaptureConfig, SnapSettings};
use crate::crop::crop;
use crate::error::{CaptureError, CaptureResult};
use crate::full_screen::FullScreenCapture;
use crate::geometry::{fractional_rect, root_surface_size, FractionalRect};
use crate::host::CaptureHost;
use crate::platform::{select_strategy, Strategy};
use crate::texture_target::TextureTargetCapture;
use bevy::log::{error, info, warn};
use image::RgbaImage;
use std::task::Poll;
use std::time::Duration;

/// Completion callback for one capture.
pub type SnapCallback = Box<dyn FnOnce(CaptureResult<RgbaImage>) + Send + Sync>;

enum ActiveStrategy<B, T> {
    TextureTarget(TextureTargetCapture<B, T>),
    FullScreen(FullScreenCapture),
}

struct CaptureSession<B, T> {
    rect: FractionalRect,
    strategy: ActiveStrategy<B, T>,
    on_done: SnapCallback,
}

/// Capture state machine over render buffer `B` and camera target `T`.
pub struct CaptureCoordinator<B, T> {
    session: Option<CaptureSession<B, T>>,
}

impl<B, T> Default for CaptureCoordinator<B, T> {
    fn default() -> Self {
        Self { session: None }
    }
}

impl<B, T> CaptureCoordinator<B, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a capture session is in flight.
    pub fn is_in_flight(&self) -> bool {
        self.session.is_some()
    }

    /// Strategy of the in-flight session.
    pub fn active_strategy(&self) -> Option<Strategy> {
        self.session.as_ref().map(|s| match s.strategy {
            ActiveStrategy::TextureTarget(_) => Strategy::TextureTarget,
            ActiveStrategy::FullScreen(_) => Strategy::FullScreen,
        })
    }

    /// Start a capture of `config.target_area`.
    ///
    /// Busy and configuration errors are logged and returned immediately;
    /// `on_done` is only invoked for accepted requests.
    pub fn capture<H>(
        &mut self,
        host: &H,
        config: &CaptureConfig,
        settings: &SnapSettings,
        on_done: impl FnOnce(CaptureResult<RgbaImage>) + Send + Sync + 'static,
    ) -> CaptureResult<()>
    where
        H: CaptureHost<Buffer = B, Target = T>,
    {
        if self.is_in_flight() {
            warn!("Snapshot already in progress, request dropped");
            return Err(CaptureError::Busy);
        }

        match open_session(host, config, settings) {
            Ok((rect, strategy)) => {
                self.session = Some(CaptureSession {
                    rect,
                    strategy,
                    on_done: Box::new(on_done),
                });
                Ok(())
            }
            Err(e) => {
                error!("Cannot start snapshot: {}", e);
                Err(e)
            }
        }
    }

    /// Advance the in-flight session by one frame.
    ///
    /// `now` is monotonic time used for the full-screen settle delay and timeouts.
    pub fn tick<H>(&mut self, host: &mut H, now: Duration)
    where
        H: CaptureHost<Buffer = B, Target = T>,
    {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let polled = match &mut session.strategy {
            ActiveStrategy::TextureTarget(capture) => capture.poll(host, now),
            ActiveStrategy::FullScreen(capture) => capture.poll(host, now),
        };
        let Poll::Ready(frame) = polled else {
            return;
        };

        let Some(session) = self.session.take() else {
            return;
        };
        let result = frame.and_then(|frame| crop(&frame, session.rect));
        if let Err(e) = &result {
            error!("Snapshot failed: {}", e);
        }
        (session.on_done)(result);
    }
}

fn open_session<H, B, T>(
    host: &H,
    config: &CaptureConfig,
    settings: &SnapSettings,
) -> CaptureResult<(FractionalRect, ActiveStrategy<B, T>)>
where
    H: CaptureHost<Buffer = B, Target = T>,
{
    let target = config.target_area.ok_or(CaptureError::MissingTarget)?;
    let rect = fractional_rect(host, target)?;
    let size = root_surface_size(host, target)?;
    let surface = host
        .root_surface(target)
        .ok_or(CaptureError::MissingRootSurface(target))?;

    let strategy = match select_strategy(config.mode, &settings.profile) {
        Strategy::TextureTarget => {
            let camera = config
                .source_camera
                .or_else(|| host.default_camera())
                .ok_or(CaptureError::MissingCamera)?;
            info!("Snapshot of {} using render target capture", target);
            ActiveStrategy::TextureTarget(TextureTargetCapture::new(
                camera,
                size,
                settings.texture_target.clone(),
            ))
        }
        Strategy::FullScreen => {
            info!("Snapshot of {} using full-screen capture", target);
            ActiveStrategy::FullScreen(FullScreenCapture::new(
                size,
                config.ui_hide_mode,
                surface,
                target,
                settings.full_screen.clone(),
            ))
        }
    };

    Ok((rect, strategy))
}
