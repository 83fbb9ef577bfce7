//! Camera components
//!
//! Cameras are discovered and harvested exactly like renderables, through a
//! parallel registry on the scene. The render layer turns them into view
//! transforms.

use crate::component::{Component, ComponentBase};
use crate::renderable::{RenderLayer, RenderStates};
use glam::{Affine2, Vec2};
use parking_lot::RwLock;
use std::sync::Arc;

pub trait Camera: Component {
    /// Cameras with a lower order are rendered first
    fn order(&self) -> i32;

    /// World to view transform
    fn view_matrix(&self) -> Affine2;

    fn render_states(&self) -> RenderStates {
        RenderStates::with_view(self.view_matrix())
    }
}

/// Camera looking at the owning object's global position
///
/// The view is centered on the object, follows its global rotation and is
/// magnified by `zoom`.
#[derive(Debug)]
pub struct CameraComponent {
    base: ComponentBase,
    order: RenderLayer,
    size: RwLock<Vec2>,
    zoom: RwLock<f32>,
}

impl CameraComponent {
    pub fn new(size: Vec2) -> Self {
        Self {
            base: ComponentBase::new(),
            order: RenderLayer::default(),
            size: RwLock::new(size),
            zoom: RwLock::new(1.0),
        }
    }

    pub fn with_order(self, order: i32) -> Self {
        Self {
            order: RenderLayer::new(order),
            ..self
        }
    }

    pub fn set_order(&self, order: i32) {
        self.order.set(&self.base, order);
    }

    /// Visible area in world units at zoom 1
    pub fn size(&self) -> Vec2 {
        *self.size.read()
    }

    pub fn set_size(&self, size: Vec2) {
        *self.size.write() = size;
    }

    pub fn zoom(&self) -> f32 {
        *self.zoom.read()
    }

    /// Non-positive zoom factors are ignored
    pub fn set_zoom(&self, zoom: f32) {
        if zoom > 0.0 {
            *self.zoom.write() = zoom;
        } else {
            log::warn!("ignoring non-positive camera zoom {zoom}");
        }
    }

    /// Visible area in world units at the current zoom
    pub fn visible_size(&self) -> Vec2 {
        self.size() / self.zoom()
    }
}

impl Default for CameraComponent {
    fn default() -> Self {
        Self::new(Vec2::new(1280.0, 720.0))
    }
}

impl Component for CameraComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn into_camera(self: Arc<Self>) -> Option<Arc<dyn Camera>> {
        Some(self)
    }
}

impl Camera for CameraComponent {
    fn order(&self) -> i32 {
        self.order.get()
    }

    fn view_matrix(&self) -> Affine2 {
        let zoom = Affine2::from_scale(Vec2::splat(self.zoom()));
        let Some(transform) = self.base.transform() else {
            return zoom;
        };
        let eye = transform.global_transformations();
        zoom * Affine2::from_angle(-eye.rotation.to_radians()) * Affine2::from_translation(-eye.position)
    }
}
