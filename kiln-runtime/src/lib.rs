//! Kiln runtime
//!
//! Drives a [`kiln_scene::SceneMap`] from two long-lived threads: a logic
//! thread ticking every activated scene at a fixed rate, and a render thread
//! harvesting the scenes in render order for a [`RenderBackend`].

pub mod config;
pub mod error;
pub mod frame;
pub mod runtime;

pub use config::*;
pub use error::*;
pub use frame::*;
pub use runtime::*;
