//! Rect snapshots for Bevy UI.
//!
//! Captures the pixels under a UI element and delivers them, cropped, to a
//! callback. This crate provides:
//! - Fractional rect geometry relative to a root UI surface
//! - A single-flight capture coordinator with per-platform strategy selection
//! - A render target strategy (camera rendered into an off-screen image)
//! - A full-screen strategy (screenshot file written, polled, read and removed)
//! - The Bevy host adapter and plugin driving captures once per frame

pub mod bevy_host;
pub mod config;
pub mod coordinator;
pub mod crop;
pub mod error;
pub mod full_screen;
pub mod geometry;
pub mod helper;
pub mod host;
pub mod platform;
pub mod plugin;
pub mod texture_target;

pub use bevy_host::{find_root_surface, rgba_from_bevy, BevyCaptureHost, ReadbackInbox, SnapSurface};
pub use config::{
    CaptureConfig, CaptureMode, FullScreenSettings, SnapSettings, TextureTargetSettings,
    UiHideMode,
};
pub use coordinator::{CaptureCoordinator, SnapCallback};
pub use crop::crop;
pub use error::{CaptureError, CaptureResult};
pub use full_screen::FullScreenCapture;
pub use geometry::{
    element_rect, fractional_rect, root_surface_rect, root_surface_size, world_rect,
    FractionalRect, UiLayout,
};
pub use helper::{SnapHelper, SnapListener};
pub use host::{CaptureHost, RenderHost, ScreenCapture, SnapFileSystem, StdFileSystem, UiVisibility};
pub use platform::{select_strategy, Platform, PlatformProfile, Strategy};
pub use plugin::{
    drive_rect_snaps, BevyCoordinator, RectSnap, RectSnapPlugin, SnapFailed, SnapRequest,
    SnapTaken,
};
pub use texture_target::TextureTargetCapture;
