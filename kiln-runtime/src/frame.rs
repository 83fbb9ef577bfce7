//! What the render thread hands to the backend each frame

use crate::error::RuntimeResult;
use kiln_scene::{
    camera_states, draw_renderables, Camera, HarvestSnapshot, RenderStates, RenderTarget,
    Renderable, SceneMap,
};

/// Harvested contents of one scene
pub struct SceneFrame {
    pub name: String,
    pub renderables: HarvestSnapshot<dyn Renderable>,
    pub cameras: HarvestSnapshot<dyn Camera>,
}

impl SceneFrame {
    /// Draw the scene once per live camera, or once with `fallback`
    pub fn draw(&self, target: &mut dyn RenderTarget, fallback: &RenderStates) -> usize {
        camera_states(&self.cameras, fallback)
            .iter()
            .map(|states| draw_renderables(&self.renderables, target, states))
            .sum()
    }
}

/// Every activated scene, in render order
pub struct Frame {
    pub index: u64,
    pub scenes: Vec<SceneFrame>,
}

impl Frame {
    /// Harvest every activated scene of `scenes`
    pub fn capture(index: u64, scenes: &SceneMap) -> Self {
        let scenes = scenes
            .ordered_scenes()
            .iter()
            .map(|scene| SceneFrame {
                name: scene.name().to_string(),
                renderables: scene.renderable_components(),
                cameras: scene.camera_components(),
            })
            .collect();
        Self { index, scenes }
    }

    /// Total harvested renderable entries, live or not
    pub fn renderable_count(&self) -> usize {
        self.scenes.iter().map(|scene| scene.renderables.len()).sum()
    }

    /// Draw every scene in order
    pub fn draw(&self, target: &mut dyn RenderTarget, fallback: &RenderStates) -> usize {
        self.scenes
            .iter()
            .map(|scene| scene.draw(target, fallback))
            .sum()
    }
}

/// Consumer of harvested frames, driven by the render thread
pub trait RenderBackend: Send + 'static {
    /// Present one frame. An error stops the runtime.
    fn render_frame(&mut self, frame: &Frame) -> RuntimeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use kiln_scene::{CameraComponent, CommandBuffer, QuadComponent, Scene};

    #[test]
    fn test_capture_follows_render_order() {
        let map = SceneMap::new();
        for name in ["world", "hud", "paused"] {
            let scene = Scene::new(name);
            scene
                .create_object("sprite")
                .add_component::<QuadComponent>()
                .unwrap();
            map.add_scene(scene);
        }
        map.set_render_order(&["world", "hud", "paused"]);
        map.get_scene("paused").unwrap().deactivate();

        let frame = Frame::capture(7, &map);
        let names: Vec<&str> = frame.scenes.iter().map(|scene| scene.name.as_str()).collect();
        assert_eq!(frame.index, 7);
        assert_eq!(names, vec!["world", "hud"]);
        assert_eq!(frame.renderable_count(), 2);
    }

    #[test]
    fn test_draw_with_camera() {
        let map = SceneMap::new();
        let scene = Scene::new("world");
        let sprite = scene.create_object("sprite");
        sprite.transform().set_position(Vec2::new(5.0, 5.0));
        sprite.add_component::<QuadComponent>().unwrap();

        let eye = scene.create_object("camera");
        eye.transform().set_position(Vec2::new(5.0, 0.0));
        eye.add_component::<CameraComponent>().unwrap();
        map.add_scene(scene);

        let frame = Frame::capture(0, &map);
        let mut buffer = CommandBuffer::new();
        assert_eq!(frame.draw(&mut buffer, &RenderStates::default()), 1);
        assert_eq!(buffer.commands()[0].transform.columns[2], [0.0, 5.0, 1.0, 0.0]);
    }
}
