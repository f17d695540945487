//! Bevy implementation of the capture host seams.
//!
//! - UI geometry comes from `ComputedNode` + `UiGlobalTransform`
//! - Root surfaces are entities marked with [`SnapSurface`]
//! - Render target buffers are `Image` assets bound through `Camera::target`
//!   and read back with `Screenshot::image`
//! - Full-screen captures use `Screenshot::primary_window` + `save_to_disk`

use crate::error::{CaptureError, CaptureResult};
use crate::geometry::UiLayout;
use crate::host::{RenderHost, ScreenCapture, SnapFileSystem, StdFileSystem, UiVisibility};
use async_channel::{Receiver, Sender};
use bevy::asset::RenderAssetUsages;
use bevy::camera::RenderTarget;
use bevy::color::Alpha;
use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat, TextureUsages};
use bevy::render::view::screenshot::{save_to_disk, Screenshot, ScreenshotCaptured};
use bevy::ui::{ComputedNode, UiGlobalTransform};
use image::RgbaImage;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;

/// Marks the root UI surface that fractional rects are relative to.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct SnapSurface;

/// Render target readbacks delivered by screenshot observers.
#[derive(Resource)]
pub struct ReadbackInbox {
    sender: Sender<(AssetId<Image>, Image)>,
    receiver: Receiver<(AssetId<Image>, Image)>,
    arrived: HashMap<AssetId<Image>, Image>,
    /// Buffers still waiting on a readback.
    live: HashSet<AssetId<Image>>,
}

impl Default for ReadbackInbox {
    fn default() -> Self {
        let (sender, receiver) = async_channel::unbounded();
        Self {
            sender,
            receiver,
            arrived: HashMap::new(),
            live: HashSet::new(),
        }
    }
}

impl ReadbackInbox {
    fn track(&mut self, id: AssetId<Image>) {
        self.live.insert(id);
    }

    fn release(&mut self, id: AssetId<Image>) {
        self.live.remove(&id);
        self.arrived.remove(&id);
    }

    /// Readback for `id`, if it arrived. Readbacks of released buffers are dropped.
    fn take(&mut self, id: AssetId<Image>) -> Option<Image> {
        while let Ok((arrived_id, image)) = self.receiver.try_recv() {
            if self.live.contains(&arrived_id) {
                self.arrived.insert(arrived_id, image);
            } else {
                debug!("Dropping late readback for released buffer {:?}", arrived_id);
            }
        }
        self.arrived.remove(&id)
    }
}

/// Nearest entity at or above `element` marked with [`SnapSurface`].
pub fn find_root_surface(
    element: Entity,
    surfaces: &Query<(), With<SnapSurface>>,
    parents: &Query<&ChildOf>,
) -> Option<Entity> {
    std::iter::once(element)
        .chain(parents.iter_ancestors(element))
        .find(|e| surfaces.contains(*e))
}

/// Convert a read-back `Image` into RGBA8 pixels.
pub fn rgba_from_bevy(image: &Image) -> CaptureResult<RgbaImage> {
    let data = image
        .data
        .as_ref()
        .ok_or_else(|| CaptureError::Render("readback has no pixel data".to_string()))?;

    let pixels = match image.texture_descriptor.format {
        TextureFormat::Bgra8UnormSrgb | TextureFormat::Bgra8Unorm => {
            let mut rgba = data.clone();
            for chunk in rgba.chunks_exact_mut(4) {
                chunk.swap(0, 2);
            }
            rgba
        }
        TextureFormat::Rgba8UnormSrgb | TextureFormat::Rgba8Unorm => data.clone(),
        other => {
            return Err(CaptureError::Render(format!(
                "unsupported texture format {:?}",
                other
            )))
        }
    };

    RgbaImage::from_raw(image.width(), image.height(), pixels)
        .ok_or_else(|| CaptureError::Render("readback size mismatch".to_string()))
}

/// System parameter exposing the Bevy world as a [`crate::CaptureHost`].
#[derive(SystemParam)]
pub struct BevyCaptureHost<'w, 's> {
    commands: Commands<'w, 's>,
    nodes: Query<'w, 's, (&'static ComputedNode, &'static UiGlobalTransform)>,
    surfaces: Query<'w, 's, (), With<SnapSurface>>,
    parents: Query<'w, 's, &'static ChildOf>,
    surface_visibility: Query<'w, 's, &'static mut Visibility, With<SnapSurface>>,
    backgrounds: Query<'w, 's, &'static mut BackgroundColor>,
    cameras: Query<'w, 's, (Entity, &'static mut Camera)>,
    images: ResMut<'w, Assets<Image>>,
    inbox: ResMut<'w, ReadbackInbox>,
}

impl UiLayout for BevyCaptureHost<'_, '_> {
    fn corners(&self, element: Entity) -> Option<[Vec2; 4]> {
        let (node, transform) = self.nodes.get(element).ok()?;
        let half = node.size() * 0.5;
        Some(
            [
                Vec2::new(-half.x, -half.y),
                Vec2::new(half.x, -half.y),
                Vec2::new(half.x, half.y),
                Vec2::new(-half.x, half.y),
            ]
            .map(|corner| transform.transform_point2(corner)),
        )
    }

    fn root_surface(&self, element: Entity) -> Option<Entity> {
        find_root_surface(element, &self.surfaces, &self.parents)
    }
}

impl UiVisibility for BevyCaptureHost<'_, '_> {
    fn surface_visibility(&self, surface: Entity) -> Option<Visibility> {
        self.surface_visibility.get(surface).ok().copied()
    }

    fn set_surface_visibility(&mut self, surface: Entity, visibility: Visibility) {
        if let Ok(mut current) = self.surface_visibility.get_mut(surface) {
            *current = visibility;
        }
    }

    fn element_alpha(&self, element: Entity) -> Option<f32> {
        self.backgrounds.get(element).ok().map(|bg| bg.0.alpha())
    }

    fn set_element_alpha(&mut self, element: Entity, alpha: f32) {
        if let Ok(mut bg) = self.backgrounds.get_mut(element) {
            bg.0.set_alpha(alpha);
        }
    }
}

impl RenderHost for BevyCaptureHost<'_, '_> {
    type Buffer = Handle<Image>;
    type Target = RenderTarget;

    fn default_camera(&self) -> Option<Entity> {
        self.cameras
            .iter()
            .filter(|(_, camera)| camera.is_active)
            .min_by_key(|(_, camera)| camera.order)
            .map(|(entity, _)| entity)
    }

    fn camera_target(&self, camera: Entity) -> Option<RenderTarget> {
        self.cameras
            .get(camera)
            .ok()
            .map(|(_, camera)| camera.target.clone())
    }

    fn set_camera_target(&mut self, camera: Entity, target: RenderTarget) -> CaptureResult<()> {
        let (_, mut camera) = self
            .cameras
            .get_mut(camera)
            .map_err(|_| CaptureError::MissingCamera)?;
        camera.target = target;
        Ok(())
    }

    fn allocate_buffer(&mut self, size: UVec2) -> CaptureResult<Handle<Image>> {
        let extent = Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        };
        let mut image = Image::new_fill(
            extent,
            TextureDimension::D2,
            &[0, 0, 0, 0],
            TextureFormat::Rgba8UnormSrgb,
            RenderAssetUsages::default(),
        );
        image.texture_descriptor.usage = TextureUsages::TEXTURE_BINDING
            | TextureUsages::COPY_DST
            | TextureUsages::COPY_SRC
            | TextureUsages::RENDER_ATTACHMENT;

        let handle = self.images.add(image);
        self.inbox.track(handle.id());
        Ok(handle)
    }

    fn buffer_target(&self, buffer: &Handle<Image>) -> RenderTarget {
        buffer.clone().into()
    }

    fn request_readback(&mut self, buffer: &Handle<Image>) -> CaptureResult<()> {
        let sender = self.inbox.sender.clone();
        let id = buffer.id();
        self.commands
            .spawn(Screenshot::image(buffer.clone()))
            .observe(move |captured: On<ScreenshotCaptured>| {
                if sender.try_send((id, captured.image.clone())).is_err() {
                    error!("Snapshot readback channel closed");
                }
            });
        Ok(())
    }

    fn poll_readback(&mut self, buffer: &Handle<Image>) -> Option<CaptureResult<RgbaImage>> {
        self.inbox
            .take(buffer.id())
            .map(|image| rgba_from_bevy(&image))
    }

    fn release_buffer(&mut self, buffer: Handle<Image>) {
        self.inbox.release(buffer.id());
        self.images.remove(&buffer);
    }
}

impl ScreenCapture for BevyCaptureHost<'_, '_> {
    fn capture_screen_to_file(&mut self, path: &Path) -> CaptureResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.commands
            .spawn(Screenshot::primary_window())
            .observe(save_to_disk(path.to_path_buf()));
        Ok(())
    }
}

impl SnapFileSystem for BevyCaptureHost<'_, '_> {
    fn file_exists(&self, path: &Path) -> bool {
        StdFileSystem.file_exists(path)
    }

    fn remove_file(&mut self, path: &Path) -> io::Result<()> {
        StdFileSystem.remove_file(path)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        StdFileSystem.read_file(path)
    }
}
