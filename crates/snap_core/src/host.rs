//! Host seams consumed by the capture coordinator.
//!
//! The coordinator and strategies only talk to the engine through these
//! traits. [`crate::bevy_host::BevyCaptureHost`] implements them on top of
//! Bevy; tests implement them in memory.

use crate::error::CaptureResult;
use crate::geometry::UiLayout;
use bevy::math::UVec2;
use bevy::prelude::{Entity, Visibility};
use image::RgbaImage;
use std::io;
use std::path::Path;

/// Visibility and opacity toggles on UI elements.
pub trait UiVisibility {
    /// Current visibility of a surface, `None` if it has none.
    fn surface_visibility(&self, surface: Entity) -> Option<Visibility>;
    fn set_surface_visibility(&mut self, surface: Entity, visibility: Visibility);

    /// Current opacity of an element, `None` if it has none.
    fn element_alpha(&self, element: Entity) -> Option<f32>;
    fn set_element_alpha(&mut self, element: Entity, alpha: f32);
}

/// Camera render-to-buffer primitives.
pub trait RenderHost {
    /// An off-screen color buffer.
    type Buffer;
    /// What a camera renders into.
    type Target: Clone;

    /// The primary viewpoint, used when no source camera is configured.
    fn default_camera(&self) -> Option<Entity>;

    fn camera_target(&self, camera: Entity) -> Option<Self::Target>;
    fn set_camera_target(&mut self, camera: Entity, target: Self::Target) -> CaptureResult<()>;

    fn allocate_buffer(&mut self, size: UVec2) -> CaptureResult<Self::Buffer>;
    /// Render target that draws into `buffer`.
    fn buffer_target(&self, buffer: &Self::Buffer) -> Self::Target;

    /// Ask for the buffer contents once the current frame has rendered.
    fn request_readback(&mut self, buffer: &Self::Buffer) -> CaptureResult<()>;
    /// `Some` once the requested readback has arrived.
    fn poll_readback(&mut self, buffer: &Self::Buffer) -> Option<CaptureResult<RgbaImage>>;

    fn release_buffer(&mut self, buffer: Self::Buffer);
}

/// Full-screen capture trigger.
pub trait ScreenCapture {
    /// Request that the next presented frame is written to `path`.
    fn capture_screen_to_file(&mut self, path: &Path) -> CaptureResult<()>;
}

/// File primitives used by the full-screen strategy.
pub trait SnapFileSystem {
    fn file_exists(&self, path: &Path) -> bool;
    fn remove_file(&mut self, path: &Path) -> io::Result<()>;
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Everything a capture needs from the host.
pub trait CaptureHost: UiLayout + UiVisibility + RenderHost + ScreenCapture + SnapFileSystem {}

impl<T> CaptureHost for T where
    T: UiLayout + UiVisibility + RenderHost + ScreenCapture + SnapFileSystem
{
}

/// [`SnapFileSystem`] backed by `std::fs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdFileSystem;

impl SnapFileSystem for StdFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn remove_file(&mut self, path: &Path) -> io::Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            result => result,
        }
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_std_file_system() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp_screenshot.png");
        let mut fs = StdFileSystem;

        assert!(!fs.file_exists(&path));
        std::fs::write(&path, b"png").unwrap();
        assert!(fs.file_exists(&path));
        assert_eq!(fs.read_file(&path).unwrap(), b"png");

        fs.remove_file(&path).unwrap();
        assert!(!fs.file_exists(&path));
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let dir = TempDir::new().unwrap();
        let mut fs = StdFileSystem;
        fs.remove_file(&dir.path().join("missing.png")).unwrap();
    }
}
