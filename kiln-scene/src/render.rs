//! Drawing a scene's harvested renderables
//!
//! These helpers are what a render thread calls once per frame: harvest the
//! scene, skip entries whose component is gone or disabled, and let every
//! remaining renderable submit its draw commands in layer order.

use crate::camera::Camera;
use crate::component::Component;
use crate::harvest::Harvested;
use crate::renderable::{CommandBuffer, DrawCommand, RenderStates, RenderTarget, Renderable};
use crate::scene::Scene;

/// Draw every live, enabled renderable of `scene` into `target`
///
/// Returns the number of renderables drawn.
pub fn render_scene(scene: &Scene, target: &mut dyn RenderTarget, states: &RenderStates) -> usize {
    draw_renderables(&scene.renderable_components(), target, states)
}

/// Like [`render_scene`], but draws only the harvested entries `filter`
/// accepts
///
/// `filter` runs on the entry's layer, object id and type key before the weak
/// reference is upgraded.
pub fn render_scene_filtered<F>(
    scene: &Scene,
    target: &mut dyn RenderTarget,
    states: &RenderStates,
    mut filter: F,
) -> usize
where
    F: FnMut(&Harvested<dyn Renderable>) -> bool,
{
    scene
        .renderable_components()
        .iter()
        .filter(|entry| filter(entry))
        .map(|entry| draw_entry(entry, target, states))
        .filter(|&drawn| drawn)
        .count()
}

/// Render a scene once per live camera, lowest order first
///
/// Without an enabled camera the scene is drawn once with `fallback`.
pub fn render_scene_with_cameras(
    scene: &Scene,
    target: &mut dyn RenderTarget,
    fallback: &RenderStates,
) -> usize {
    let renderables = scene.renderable_components();
    camera_states(&scene.camera_components(), fallback)
        .iter()
        .map(|states| draw_renderables(&renderables, target, states))
        .sum()
}

/// Draw an already harvested snapshot, skipping expired and disabled entries
pub fn draw_renderables(
    entries: &[Harvested<dyn Renderable>],
    target: &mut dyn RenderTarget,
    states: &RenderStates,
) -> usize {
    entries
        .iter()
        .map(|entry| draw_entry(entry, target, states))
        .filter(|&drawn| drawn)
        .count()
}

/// Render states of every live, enabled camera in order, or just `fallback`
/// when there is none
pub fn camera_states(entries: &[Harvested<dyn Camera>], fallback: &RenderStates) -> Vec<RenderStates> {
    let states: Vec<RenderStates> = entries
        .iter()
        .filter_map(Harvested::upgrade)
        .filter(|camera| camera.base().is_enabled())
        .map(|camera| camera.render_states())
        .collect();

    if states.is_empty() {
        vec![*fallback]
    } else {
        states
    }
}

fn draw_entry(
    entry: &Harvested<dyn Renderable>,
    target: &mut dyn RenderTarget,
    states: &RenderStates,
) -> bool {
    let Some(renderable) = entry.upgrade() else {
        return false;
    };
    if !renderable.base().is_enabled() {
        return false;
    }
    renderable.draw(target, states);
    true
}

/// Render a scene into a fresh command list
pub fn collect_commands(scene: &Scene, states: &RenderStates) -> Vec<DrawCommand> {
    let mut buffer = CommandBuffer::new();
    render_scene(scene, &mut buffer, states);
    buffer.into_commands()
}
