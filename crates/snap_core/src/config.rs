//! Capture configuration.
//!
//! `CaptureConfig` describes what to capture; the settings structs hold the
//! timing knobs for each capture strategy.
//!
//! # Example
//!
//! ```ignore
//! let config = CaptureConfig::new(panel)
//!     .with_camera(camera)
//!     .with_mode(CaptureMode::ForceFullScreen)
//!     .with_ui_hide_mode(UiHideMode::HideTargetOnly);
//! ```

use crate::platform::PlatformProfile;
use bevy::prelude::{Entity, Resource};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which capture strategy to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    /// Pick per platform.
    #[default]
    Recommended,
    /// Always render the camera into an off-screen target.
    ForceTextureTarget,
    /// Always go through a full-screen capture file.
    ForceFullScreen,
}

/// What to hide while a full-screen capture is taken.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiHideMode {
    #[default]
    DontHide,
    /// Hide the whole snap surface.
    HideWholeSurface,
    /// Make only the target area transparent.
    HideTargetOnly,
}

/// Configuration for one capturable target.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CaptureConfig {
    /// UI element whose on-screen rect is captured.
    pub target_area: Option<Entity>,
    /// Camera rendered by the texture target strategy (default camera if unset).
    pub source_camera: Option<Entity>,
    pub mode: CaptureMode,
    pub ui_hide_mode: UiHideMode,
}

impl CaptureConfig {
    /// Create a config capturing `target_area`.
    pub fn new(target_area: Entity) -> Self {
        Self {
            target_area: Some(target_area),
            ..Default::default()
        }
    }

    /// Render this camera instead of the default one.
    pub fn with_camera(mut self, camera: Entity) -> Self {
        self.source_camera = Some(camera);
        self
    }

    pub fn with_mode(mut self, mode: CaptureMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_ui_hide_mode(mut self, ui_hide_mode: UiHideMode) -> Self {
        self.ui_hide_mode = ui_hide_mode;
        self
    }
}

/// Settings for the full-screen strategy.
#[derive(Clone, Debug, PartialEq)]
pub struct FullScreenSettings {
    /// Directory the temporary capture file is written to.
    pub temp_dir: PathBuf,
    /// Fixed name of the temporary capture file.
    pub file_name: String,
    /// Wait after the file appears before reading it.
    pub settle_delay: Duration,
    /// Bound on waiting for a stale file to vanish and the new one to appear.
    pub appear_timeout: Duration,
    /// Bound on waiting for the temporary file's removal after reading.
    pub removal_timeout: Duration,
}

impl Default for FullScreenSettings {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            file_name: "temp_screenshot.png".to_string(),
            settle_delay: Duration::from_millis(300),
            appear_timeout: Duration::from_secs(5),
            removal_timeout: Duration::from_secs(2),
        }
    }
}

impl FullScreenSettings {
    /// Full path of the temporary capture file.
    pub fn temp_path(&self) -> PathBuf {
        self.temp_dir.join(&self.file_name)
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_appear_timeout(mut self, timeout: Duration) -> Self {
        self.appear_timeout = timeout;
        self
    }

    pub fn with_removal_timeout(mut self, timeout: Duration) -> Self {
        self.removal_timeout = timeout;
        self
    }
}

/// Settings for the texture target strategy.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureTargetSettings {
    /// Frames to wait for the readback before giving up.
    pub readback_timeout_frames: u32,
}

impl Default for TextureTargetSettings {
    fn default() -> Self {
        Self {
            readback_timeout_frames: 10,
        }
    }
}

/// Process-wide capture settings, resolved once at startup.
#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub struct SnapSettings {
    /// Platform descriptor used by `CaptureMode::Recommended`.
    pub profile: PlatformProfile,
    pub full_screen: FullScreenSettings,
    pub texture_target: TextureTargetSettings,
}

impl SnapSettings {
    pub fn with_profile(mut self, profile: PlatformProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_full_screen(mut self, full_screen: FullScreenSettings) -> Self {
        self.full_screen = full_screen;
        self
    }
}
