//! Platform capability descriptor and strategy selection.
//!
//! The strategy table is plain data keyed by [`Platform`]. A [`PlatformProfile`]
//! is resolved once at startup (or loaded from JSON) and injected into the
//! coordinator, so selection never probes the platform at capture time.

use crate::config::CaptureMode;
use serde::{Deserialize, Serialize};

/// Platforms with distinct capture behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Editor,
    Windows,
    MacOs,
    Linux,
    Android,
    Ios,
    Web,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn compiled() -> Self {
        if cfg!(target_os = "android") {
            Platform::Android
        } else if cfg!(target_os = "ios") {
            Platform::Ios
        } else if cfg!(target_arch = "wasm32") {
            Platform::Web
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Whether off-screen render targets can be read back reliably.
    pub fn render_targets_reliable(self) -> bool {
        !matches!(self, Platform::Android | Platform::Ios)
    }
}

/// Runtime platform descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformProfile {
    pub platform: Platform,
    /// Editor-only: select strategies as if running on this platform.
    #[serde(default)]
    pub simulate: Option<Platform>,
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self::current()
    }
}

impl PlatformProfile {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            simulate: None,
        }
    }

    /// Profile of the compiled target.
    pub fn current() -> Self {
        Self::new(Platform::compiled())
    }

    /// Editor profile simulating `target`.
    pub fn editor_simulating(target: Platform) -> Self {
        Self {
            platform: Platform::Editor,
            simulate: Some(target),
        }
    }

    /// Parse a profile from JSON, e.g. `{"platform": "Android"}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The platform used for strategy selection.
    ///
    /// Simulation only applies in the editor.
    pub fn effective_platform(&self) -> Platform {
        match (self.platform, self.simulate) {
            (Platform::Editor, Some(target)) => target,
            (platform, _) => platform,
        }
    }
}

/// A concrete capture path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    TextureTarget,
    FullScreen,
}

/// Pick the capture strategy for `mode` on `profile`.
pub fn select_strategy(mode: CaptureMode, profile: &PlatformProfile) -> Strategy {
    match mode {
        CaptureMode::ForceTextureTarget => Strategy::TextureTarget,
        CaptureMode::ForceFullScreen => Strategy::FullScreen,
        CaptureMode::Recommended => {
            if profile.effective_platform().render_targets_reliable() {
                Strategy::TextureTarget
            } else {
                Strategy::FullScreen
            }
        }
    }
}
