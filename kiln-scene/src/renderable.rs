//! Drawable components and the data they hand to a render backend
//!
//! The scene core never talks to a graphics API. A [`Renderable`] draws by
//! submitting [`DrawCommand`]s to whatever [`RenderTarget`] the render layer
//! passes in.

use crate::component::{Component, ComponentBase};
use crate::types::ObjectId;
use bytemuck::{Pod, Zeroable};
use glam::{Affine2, Mat2, Vec2};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// A component that can be drawn
///
/// `draw` runs on the render thread while the logic thread may be updating
/// the same component, so implementations read their state through atomics
/// or short locks.
pub trait Renderable: Component {
    /// Draw order; lower layers draw first
    fn layer(&self) -> i32;

    fn draw(&self, target: &mut dyn RenderTarget, states: &RenderStates);
}

/// Sink for draw commands, implemented by the render layer
pub trait RenderTarget {
    fn submit(&mut self, command: DrawCommand);
}

/// Per-pass state applied on top of every drawable's own transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStates {
    /// World to view transform, usually from a camera
    pub view: Affine2,
    /// Multiplied into every drawable's alpha
    pub opacity: f32,
}

impl RenderStates {
    pub fn with_view(view: Affine2) -> Self {
        Self {
            view,
            ..Self::default()
        }
    }

    /// Combine the view with a drawable's model matrix
    pub fn apply(&self, model: Affine2) -> Affine2 {
        self.view * model
    }
}

impl Default for RenderStates {
    fn default() -> Self {
        Self {
            view: Affine2::IDENTITY,
            opacity: 1.0,
        }
    }
}

/// GPU-ready 2D transform: a 3x3 column-major matrix, each column padded
/// to four floats
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DrawTransform {
    pub columns: [[f32; 4]; 3],
}

impl DrawTransform {
    pub fn from_affine(matrix: &Affine2) -> Self {
        let x = matrix.matrix2.x_axis;
        let y = matrix.matrix2.y_axis;
        let t = matrix.translation;
        Self {
            columns: [
                [x.x, x.y, 0.0, 0.0],
                [y.x, y.y, 0.0, 0.0],
                [t.x, t.y, 1.0, 0.0],
            ],
        }
    }

    pub fn to_affine(&self) -> Affine2 {
        let [x, y, t] = self.columns;
        Affine2::from_mat2_translation(
            Mat2::from_cols(Vec2::new(x[0], x[1]), Vec2::new(y[0], y[1])),
            Vec2::new(t[0], t[1]),
        )
    }
}

/// One drawable's contribution to a frame
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub object: ObjectId,
    pub layer: i32,
    pub transform: DrawTransform,
    pub size: Vec2,
    pub color: [f32; 4],
}

/// Render target that just records what was submitted
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<DrawCommand>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn into_commands(self) -> Vec<DrawCommand> {
        self.commands
    }
}

impl RenderTarget for CommandBuffer {
    fn submit(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }
}

/// Atomic draw-order number that re-stages its component when it changes
#[derive(Debug)]
pub struct RenderLayer(AtomicI32);

impl RenderLayer {
    pub fn new(layer: i32) -> Self {
        Self(AtomicI32::new(layer))
    }

    pub fn get(&self) -> i32 {
        self.0.load(Ordering::Relaxed)
    }

    /// Store `layer` and, if it differs, queue `base`'s component for
    /// re-insertion into its scene's harvest
    pub fn set(&self, base: &ComponentBase, layer: i32) {
        if self.0.swap(layer, Ordering::Relaxed) != layer {
            base.restage();
        }
    }
}

impl Default for RenderLayer {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Solid rectangle drawn at the owning object's transform
#[derive(Debug)]
pub struct QuadComponent {
    base: ComponentBase,
    layer: RenderLayer,
    size: RwLock<Vec2>,
    color: RwLock<[f32; 4]>,
}

impl QuadComponent {
    pub fn new(size: Vec2, color: [f32; 4]) -> Self {
        Self {
            base: ComponentBase::new(),
            layer: RenderLayer::default(),
            size: RwLock::new(size),
            color: RwLock::new(color),
        }
    }

    pub fn with_layer(self, layer: i32) -> Self {
        Self {
            layer: RenderLayer::new(layer),
            ..self
        }
    }

    pub fn set_layer(&self, layer: i32) {
        self.layer.set(&self.base, layer);
    }

    pub fn size(&self) -> Vec2 {
        *self.size.read()
    }

    pub fn set_size(&self, size: Vec2) {
        *self.size.write() = size;
    }

    pub fn color(&self) -> [f32; 4] {
        *self.color.read()
    }

    pub fn set_color(&self, color: [f32; 4]) {
        *self.color.write() = color;
    }
}

impl Default for QuadComponent {
    fn default() -> Self {
        Self::new(Vec2::ONE, [1.0, 1.0, 1.0, 1.0])
    }
}

impl Component for QuadComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn into_renderable(self: Arc<Self>) -> Option<Arc<dyn Renderable>> {
        Some(self)
    }
}

impl Renderable for QuadComponent {
    fn layer(&self) -> i32 {
        self.layer.get()
    }

    fn draw(&self, target: &mut dyn RenderTarget, states: &RenderStates) {
        let Some(owner) = self.base.owner() else {
            return;
        };
        let model = owner.transform().draw_matrix();
        let mut color = self.color();
        color[3] *= states.opacity;

        target.submit(DrawCommand {
            object: owner.id(),
            layer: self.layer(),
            transform: DrawTransform::from_affine(&states.apply(model)),
            size: self.size(),
            color,
        });
    }
}
