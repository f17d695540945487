//! In-memory capture host with fault injection.

#![allow(dead_code)]

use bevy::math::{Rect, UVec2, Vec2};
use bevy::prelude::{Entity, Visibility, World};
use image::{ImageFormat, Rgba, RgbaImage};
use snap_core::{
    CaptureCoordinator, CaptureError, CaptureResult, RenderHost, ScreenCapture, SnapFileSystem,
    UiLayout, UiVisibility,
};
use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One display refresh.
pub const FRAME: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FakeTarget {
    Window,
    Buffer(u32),
}

pub type FakeCoordinator = CaptureCoordinator<u32, FakeTarget>;

/// Host calls in the order they happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostEvent {
    RemoveFile(PathBuf),
    TriggerCapture(PathBuf),
    ReadFile(PathBuf),
}

#[derive(Default)]
pub struct FakeHost {
    // layout
    pub rects: HashMap<Entity, Rect>,
    pub roots: HashMap<Entity, Entity>,
    pub visibility: HashMap<Entity, Visibility>,
    /// Visibility the renderer sees; lags `visibility` by one frame.
    pub rendered_visibility: HashMap<Entity, Visibility>,
    pub alpha: HashMap<Entity, f32>,

    // rendering
    pub default_camera: Option<Entity>,
    pub camera_targets: HashMap<Entity, FakeTarget>,
    pub live_buffers: HashSet<u32>,
    pub next_buffer: u32,
    pub readbacks: HashSet<u32>,
    pub fail_readback: bool,
    pub withhold_readback: bool,

    // screen + files
    pub screen: RgbaImage,
    pub files: HashMap<PathBuf, Vec<u8>>,
    pub pending_writes: Vec<PathBuf>,
    pub pending_removals: Vec<PathBuf>,
    pub sticky_removals: bool,
    pub fail_trigger: bool,
    pub drop_captures: bool,
    pub corrupt_captures: bool,
    /// Surface visibility recorded in each written capture.
    pub captured_visibility: Vec<HashMap<Entity, Visibility>>,
    pub events: Mutex<Vec<HostEvent>>,
}

/// Entities of a standard 1000x800 surface with one target panel.
pub struct Scene {
    pub host: FakeHost,
    pub surface: Entity,
    pub target: Entity,
    pub camera: Entity,
}

impl Scene {
    /// Surface 1000x800 at the origin, target at (100, 80) sized 200x160.
    pub fn standard() -> Self {
        let mut world = World::new();
        let surface = world.spawn_empty().id();
        let target = world.spawn_empty().id();
        let camera = world.spawn_empty().id();

        let mut host = FakeHost {
            screen: gradient(1000, 800),
            default_camera: Some(camera),
            ..Default::default()
        };
        host.rects.insert(surface, Rect::new(0.0, 0.0, 1000.0, 800.0));
        host.rects.insert(target, Rect::new(100.0, 80.0, 300.0, 240.0));
        host.roots.insert(surface, surface);
        host.roots.insert(target, surface);
        host.visibility.insert(surface, Visibility::Inherited);
        host.rendered_visibility = host.visibility.clone();
        host.alpha.insert(target, 0.75);
        host.camera_targets.insert(camera, FakeTarget::Window);

        Self {
            host,
            surface,
            target,
            camera,
        }
    }
}

impl FakeHost {
    /// Present the frame: flush pending screen captures and file removals.
    ///
    /// Captures see the visibility propagated before this frame's changes.
    pub fn end_frame(&mut self) {
        for path in std::mem::take(&mut self.pending_writes) {
            if self.drop_captures {
                continue;
            }
            let bytes = if self.corrupt_captures {
                b"not a png".to_vec()
            } else {
                encode_png(&self.screen)
            };
            self.files.insert(path, bytes);
            self.captured_visibility.push(self.rendered_visibility.clone());
        }
        self.rendered_visibility = self.visibility.clone();
        if !self.sticky_removals {
            for path in std::mem::take(&mut self.pending_removals) {
                self.files.remove(&path);
            }
        }
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    fn log(&self, event: HostEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl UiLayout for FakeHost {
    fn corners(&self, element: Entity) -> Option<[Vec2; 4]> {
        self.rects.get(&element).map(|r| {
            [
                r.min,
                Vec2::new(r.max.x, r.min.y),
                r.max,
                Vec2::new(r.min.x, r.max.y),
            ]
        })
    }

    fn root_surface(&self, element: Entity) -> Option<Entity> {
        self.roots.get(&element).copied()
    }
}

impl UiVisibility for FakeHost {
    fn surface_visibility(&self, surface: Entity) -> Option<Visibility> {
        self.visibility.get(&surface).copied()
    }

    fn set_surface_visibility(&mut self, surface: Entity, visibility: Visibility) {
        self.visibility.insert(surface, visibility);
    }

    fn element_alpha(&self, element: Entity) -> Option<f32> {
        self.alpha.get(&element).copied()
    }

    fn set_element_alpha(&mut self, element: Entity, alpha: f32) {
        self.alpha.insert(element, alpha);
    }
}

impl RenderHost for FakeHost {
    type Buffer = u32;
    type Target = FakeTarget;

    fn default_camera(&self) -> Option<Entity> {
        self.default_camera
    }

    fn camera_target(&self, camera: Entity) -> Option<FakeTarget> {
        self.camera_targets.get(&camera).cloned()
    }

    fn set_camera_target(&mut self, camera: Entity, target: FakeTarget) -> CaptureResult<()> {
        match self.camera_targets.get_mut(&camera) {
            Some(current) => {
                *current = target;
                Ok(())
            }
            None => Err(CaptureError::MissingCamera),
        }
    }

    fn allocate_buffer(&mut self, _size: UVec2) -> CaptureResult<u32> {
        self.next_buffer += 1;
        self.live_buffers.insert(self.next_buffer);
        Ok(self.next_buffer)
    }

    fn buffer_target(&self, buffer: &u32) -> FakeTarget {
        FakeTarget::Buffer(*buffer)
    }

    fn request_readback(&mut self, buffer: &u32) -> CaptureResult<()> {
        self.readbacks.insert(*buffer);
        Ok(())
    }

    fn poll_readback(&mut self, buffer: &u32) -> Option<CaptureResult<RgbaImage>> {
        if self.withhold_readback || !self.readbacks.remove(buffer) {
            return None;
        }
        if self.fail_readback {
            return Some(Err(CaptureError::Render("device lost".to_string())));
        }
        Some(Ok(self.screen.clone()))
    }

    fn release_buffer(&mut self, buffer: u32) {
        self.live_buffers.remove(&buffer);
    }
}

impl ScreenCapture for FakeHost {
    fn capture_screen_to_file(&mut self, path: &Path) -> CaptureResult<()> {
        self.log(HostEvent::TriggerCapture(path.to_path_buf()));
        if self.fail_trigger {
            return Err(CaptureError::Io(io::Error::other("capture unavailable")));
        }
        self.pending_writes.push(path.to_path_buf());
        Ok(())
    }
}

impl SnapFileSystem for FakeHost {
    fn file_exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn remove_file(&mut self, path: &Path) -> io::Result<()> {
        self.log(HostEvent::RemoveFile(path.to_path_buf()));
        self.pending_removals.push(path.to_path_buf());
        Ok(())
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.log(HostEvent::ReadFile(path.to_path_buf()));
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

/// Image whose pixels encode their own coordinates.
pub fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, (x / 256 + 4 * (y / 256)) as u8, 255])
    })
}

pub fn encode_png(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Results delivered to completion callbacks.
pub type Deliveries = Arc<Mutex<Vec<CaptureResult<RgbaImage>>>>;

/// A completion callback recording into the returned deliveries.
pub fn recorder() -> (
    Deliveries,
    impl FnOnce(CaptureResult<RgbaImage>) + Send + Sync + 'static,
) {
    let deliveries: Deliveries = Arc::default();
    let sink = deliveries.clone();
    (deliveries, move |result| sink.lock().unwrap().push(result))
}

/// Tick until the coordinator goes idle or `max_frames` pass.
pub fn run_until_idle(
    coordinator: &mut FakeCoordinator,
    host: &mut FakeHost,
    clock: &mut Duration,
    max_frames: usize,
) -> usize {
    for frame in 0..max_frames {
        if !coordinator.is_in_flight() {
            return frame;
        }
        *clock += FRAME;
        coordinator.tick(host, *clock);
        host.end_frame();
    }
    max_frames
}
