//! Registry of named scenes and their render order

use crate::camera::Camera;
use crate::harvest::HarvestSnapshot;
use crate::renderable::Renderable;
use crate::scene::Scene;
use crate::types::Tick;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Owns every scene and the order they are rendered in
///
/// Every registered scene appears exactly once in the render order. Scenes
/// are removed lazily: [`SceneMap::remove_scene`] only marks the scene, and
/// the next [`SceneMap::update_scenes`] erases it.
#[derive(Debug, Default)]
pub struct SceneMap {
    scenes: RwLock<HashMap<String, Arc<Scene>>>,
    render_order: RwLock<Vec<String>>,
}

impl SceneMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scene under its name, at the front of the render order
    ///
    /// Returns `false` and leaves the registered scene untouched if the name
    /// is already taken.
    pub fn add_scene(&self, scene: Arc<Scene>) -> bool {
        let mut scenes = self.scenes.write();
        let name = scene.name().to_string();
        if scenes.contains_key(&name) {
            log::warn!("scene '{name}' is already registered");
            return false;
        }

        log::debug!("adding scene '{name}'");
        self.render_order.write().insert(0, name.clone());
        scenes.insert(name, scene);
        true
    }

    /// Mark a scene for removal on the next update. Returns whether a scene
    /// with that name was registered.
    pub fn remove_scene(&self, name: &str) -> bool {
        match self.scenes.read().get(name) {
            Some(scene) => {
                scene.mark_for_deletion();
                true
            }
            None => false,
        }
    }

    pub fn get_scene(&self, name: &str) -> Option<Arc<Scene>> {
        self.scenes.read().get(name).cloned()
    }

    /// Registered scene names, sorted
    pub fn scene_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scenes.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.scenes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.read().is_empty()
    }

    // ========================================================================
    // Render order
    // ========================================================================

    /// Scene names, first rendered first
    pub fn render_order(&self) -> Vec<String> {
        self.render_order.read().clone()
    }

    /// Replace the render order
    ///
    /// Unknown and repeated names are dropped. Registered scenes missing from
    /// `order` are prepended, so they render before the listed ones.
    pub fn set_render_order<S: AsRef<str>>(&self, order: &[S]) {
        let scenes = self.scenes.read();

        let mut listed: Vec<String> = Vec::with_capacity(scenes.len());
        for name in order {
            let name = name.as_ref();
            if !scenes.contains_key(name) {
                log::warn!("render order names unknown scene '{name}'");
                continue;
            }
            if !listed.iter().any(|existing| existing == name) {
                listed.push(name.to_string());
            }
        }

        let mut missing: Vec<String> = scenes
            .keys()
            .filter(|name| !listed.contains(name))
            .cloned()
            .collect();
        missing.sort();

        missing.extend(listed);
        *self.render_order.write() = missing;
    }

    /// Activated scenes in render order
    pub fn ordered_scenes(&self) -> Vec<Arc<Scene>> {
        let scenes = self.scenes.read();
        self.render_order
            .read()
            .iter()
            .filter_map(|name| scenes.get(name))
            .filter(|scene| scene.is_activated())
            .cloned()
            .collect()
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Sweep scenes marked for deletion, then update every activated scene
    /// in render order
    pub fn update_scenes(&self, tick: &Tick) {
        for scene in self.sweep() {
            scene.update(tick);
        }
    }

    /// Like [`SceneMap::update_scenes`], but ticks the scenes on the rayon
    /// pool. Each scene still runs its own passes in order.
    pub fn update_scenes_parallel(&self, tick: &Tick) {
        let scenes = self.sweep();
        scenes.par_iter().for_each(|scene| scene.update(tick));
    }

    /// Erase deleted scenes and return the activated ones in render order
    fn sweep(&self) -> Vec<Arc<Scene>> {
        let removed: Vec<Arc<Scene>> = {
            let mut scenes = self.scenes.write();
            let doomed: Vec<String> = scenes
                .iter()
                .filter(|(_, scene)| scene.is_marked_for_deletion())
                .map(|(name, _)| name.clone())
                .collect();

            if !doomed.is_empty() {
                self.render_order
                    .write()
                    .retain(|name| !doomed.contains(name));
            }
            doomed
                .iter()
                .filter_map(|name| scenes.remove(name))
                .collect()
        };

        for scene in &removed {
            log::debug!("removed scene '{}'", scene.name());
        }
        drop(removed);

        self.ordered_scenes()
    }

    // ========================================================================
    // Harvesting
    // ========================================================================

    /// Harvested renderables of the named scene (render thread)
    pub fn renderable_components_from_scene(
        &self,
        name: &str,
    ) -> Option<HarvestSnapshot<dyn Renderable>> {
        self.get_scene(name).map(|scene| scene.renderable_components())
    }

    /// Harvested cameras of the named scene (render thread)
    pub fn camera_components_from_scene(&self, name: &str) -> Option<HarvestSnapshot<dyn Camera>> {
        self.get_scene(name).map(|scene| scene.camera_components())
    }
}
