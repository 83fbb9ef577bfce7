//! Kiln scene core
//!
//! The scene graph of a 2D engine that ticks game logic on one thread and
//! draws on another.
//!
//! - Components attach to scene objects, one per concrete type
//! - Every object carries a transform whose global value is cached lazily
//!   and invalidated down the hierarchy on local changes
//! - Scenes stage object creation and deletion to tick boundaries
//! - Drawable and camera components reach the render thread through a
//!   double-buffered harvest, never through the object lists

pub mod camera;
pub mod component;
pub mod error;
pub mod harvest;
pub mod object;
pub mod render;
pub mod renderable;
pub mod scene;
pub mod scene_map;
pub mod transform;
pub mod types;

pub use camera::*;
pub use component::{Component, ComponentBase};
pub use error::*;
pub use harvest::*;
pub use object::*;
pub use render::*;
pub use renderable::*;
pub use scene::*;
pub use scene_map::*;
pub use transform::*;
pub use types::*;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
