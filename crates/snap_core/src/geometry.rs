//! Screen-space geometry for UI elements.
//!
//! Converts a UI element's on-screen corners into rectangles expressed as
//! fractions of its enclosing snap surface, so a crop can be applied to a
//! capture of any resolution.
//!
//! # Example
//!
//! ```ignore
//! let rect = fractional_rect(&layout, target)?;
//! // Surface 1000x800, element at (100, 80) sized 200x160:
//! assert_eq!(rect, FractionalRect::new(0.1, 0.1, 0.2, 0.2));
//! ```

use crate::error::{CaptureError, CaptureResult};
use bevy::math::{Rect, UVec2, Vec2};
use bevy::prelude::Entity;

/// Read access to the host's UI layout.
pub trait UiLayout {
    /// On-screen corners of `element` in physical pixels, ordered top-left,
    /// top-right, bottom-right, bottom-left.
    fn corners(&self, element: Entity) -> Option<[Vec2; 4]>;

    /// Nearest enclosing snap surface of `element`, including the element itself.
    fn root_surface(&self, element: Entity) -> Option<Entity>;
}

/// A rectangle expressed as proportions of the root surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FractionalRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FractionalRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole surface.
    pub fn full() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}

/// Axis-aligned rect spanned by the top-left corner and its diagonal opposite.
///
/// Rotated elements yield the rect between those two points only.
pub fn world_rect(corners: &[Vec2; 4]) -> Rect {
    Rect::from_corners(corners[0], corners[2])
}

/// World rect of `element`, read from the host layout.
pub fn element_rect(layout: &impl UiLayout, element: Entity) -> CaptureResult<Rect> {
    layout
        .corners(element)
        .map(|c| world_rect(&c))
        .ok_or(CaptureError::MissingGeometry(element))
}

/// World rect of the snap surface enclosing `element`.
pub fn root_surface_rect(layout: &impl UiLayout, element: Entity) -> CaptureResult<Rect> {
    let root = layout
        .root_surface(element)
        .ok_or(CaptureError::MissingRootSurface(element))?;
    element_rect(layout, root)
}

/// Pixel size of the snap surface enclosing `element`, rounded down.
pub fn root_surface_size(layout: &impl UiLayout, element: Entity) -> CaptureResult<UVec2> {
    let size = root_surface_rect(layout, element)?.size();
    Ok(UVec2::new(size.x.max(0.0) as u32, size.y.max(0.0) as u32))
}

/// `element`'s world rect divided by its root surface's width and height.
///
/// The origin is not shifted by the root's origin: the capture buffer must be
/// aligned to the root surface's coordinate space.
pub fn fractional_rect(layout: &impl UiLayout, element: Entity) -> CaptureResult<FractionalRect> {
    let rect = element_rect(layout, element)?;
    let root = root_surface_rect(layout, element)?;
    let (w, h) = (root.width(), root.height());
    if w <= 0.0 || h <= 0.0 {
        return Err(CaptureError::EmptyRegion);
    }

    Ok(FractionalRect::new(
        rect.min.x / w,
        rect.min.y / h,
        rect.width() / w,
        rect.height() / h,
    ))
}
