//! Scene management with staged object creation and double-buffered
//! renderable harvesting
//!
//! The logic thread owns the object lists: [`Scene::update`] sweeps objects
//! flagged for deletion, promotes objects created since the last tick and runs
//! the update and late-update passes. The render thread only calls
//! [`Scene::renderable_components`] / [`Scene::camera_components`], which go
//! through the harvest queues and never touch the object lists.

use crate::camera::Camera;
use crate::component::Component;
use crate::harvest::{Harvest, HarvestSnapshot, Harvested};
use crate::object::SceneObject;
use crate::renderable::Renderable;
use crate::types::{ObjectId, Tick};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// A named, independently activatable collection of scene objects
pub struct Scene {
    name: String,
    activated: AtomicBool,
    marked_for_deletion: AtomicBool,

    /// Live objects, in promotion order
    objects: Mutex<Vec<Arc<SceneObject>>>,
    /// Objects created since the last tick
    staging: Mutex<Vec<Arc<SceneObject>>>,

    renderables: Harvest<dyn Renderable>,
    cameras: Harvest<dyn Camera>,

    ticks: AtomicU64,
    promoted: AtomicU64,
    swept: AtomicU64,

    this: Weak<Scene>,
}

impl Scene {
    /// Create an activated, empty scene
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            name: name.to_string(),
            activated: AtomicBool::new(true),
            marked_for_deletion: AtomicBool::new(false),
            objects: Mutex::new(Vec::with_capacity(64)),
            staging: Mutex::new(Vec::new()),
            renderables: Harvest::new(),
            cameras: Harvest::new(),
            ticks: AtomicU64::new(0),
            promoted: AtomicU64::new(0),
            swept: AtomicU64::new(0),
            this: this.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_activated(&self) -> bool {
        self.activated.load(Ordering::Relaxed)
    }

    pub fn activate(&self) {
        self.activated.store(true, Ordering::Relaxed);
    }

    pub fn deactivate(&self) {
        self.activated.store(false, Ordering::Relaxed);
    }

    /// Flag the scene for removal from its map on the next map update
    pub fn mark_for_deletion(&self) {
        self.marked_for_deletion.store(true, Ordering::Relaxed);
    }

    pub fn is_marked_for_deletion(&self) -> bool {
        self.marked_for_deletion.load(Ordering::Relaxed)
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Create an object. It joins the live list on the next [`Scene::update`],
    /// so an object created during a tick is not updated in that tick.
    pub fn create_object(&self, name: &str) -> Arc<SceneObject> {
        let object = SceneObject::new(name, self.this.clone());
        log::debug!("scene '{}': staged {} '{}'", self.name, object.id(), name);
        self.staging.lock().push(Arc::clone(&object));
        object
    }

    /// Number of live objects
    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    /// Number of objects waiting for the next tick
    pub fn staged_count(&self) -> usize {
        self.staging.lock().len()
    }

    /// Snapshot of the live objects
    pub fn objects(&self) -> Vec<Arc<SceneObject>> {
        self.objects.lock().clone()
    }

    /// Find a live or staged object by id
    pub fn find_object(&self, id: ObjectId) -> Option<Arc<SceneObject>> {
        self.find(|object| object.id() == id)
    }

    /// Find the first live or staged object with this name
    pub fn find_object_by_name(&self, name: &str) -> Option<Arc<SceneObject>> {
        self.find(|object| object.name() == name)
    }

    fn find<F>(&self, predicate: F) -> Option<Arc<SceneObject>>
    where
        F: Fn(&SceneObject) -> bool,
    {
        if let Some(object) = self.objects.lock().iter().find(|object| predicate(object)) {
            return Some(Arc::clone(object));
        }
        self.staging
            .lock()
            .iter()
            .find(|object| predicate(object))
            .cloned()
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Run one logic tick: sweep, promote, update pass, late-update pass
    pub fn update(&self, tick: &Tick) {
        let (live, swept) = {
            let mut objects = self.objects.lock();

            let mut swept = Vec::new();
            objects.retain(|object| {
                if object.is_pending_deletion() {
                    swept.push(Arc::clone(object));
                    false
                } else {
                    true
                }
            });

            let staged = std::mem::take(&mut *self.staging.lock());
            let mut promoted = 0u64;
            for object in staged {
                // destroyed before its first tick: never goes live
                if object.is_pending_deletion() {
                    swept.push(object);
                } else {
                    objects.push(object);
                    promoted += 1;
                }
            }
            self.promoted.fetch_add(promoted, Ordering::Relaxed);

            (objects.clone(), swept)
        };

        if !swept.is_empty() {
            log::debug!("scene '{}': swept {} objects", self.name, swept.len());
            self.swept.fetch_add(swept.len() as u64, Ordering::Relaxed);
            for object in &swept {
                object.teardown();
            }
        }

        for object in &live {
            object.update(tick);
        }
        for object in &live {
            object.late_update(tick);
        }

        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    // ========================================================================
    // Harvesting
    // ========================================================================

    /// Ordered snapshot of the drawable components (render thread)
    ///
    /// Entries may expire after the snapshot is returned; upgrade each one
    /// before drawing.
    pub fn renderable_components(&self) -> HarvestSnapshot<dyn Renderable> {
        self.renderables.harvest()
    }

    /// Ordered snapshot of the camera components (render thread)
    pub fn camera_components(&self) -> HarvestSnapshot<dyn Camera> {
        self.cameras.harvest()
    }

    /// Queue a newly attached or re-ordered component for harvesting
    pub(crate) fn discover(&self, object: ObjectId, component: &Arc<dyn Component>) {
        let Some(key) = component.type_key() else {
            return;
        };

        if let Some(renderable) = Arc::clone(component).into_renderable() {
            log::trace!("scene '{}': staging renderable {} on {}", self.name, key.short_name(), object);
            self.renderables.stage(Harvested::new(
                renderable.layer(),
                object,
                key,
                Arc::downgrade(&renderable),
            ));
        }

        if let Some(camera) = Arc::clone(component).into_camera() {
            log::trace!("scene '{}': staging camera {} on {}", self.name, key.short_name(), object);
            self.cameras.stage(Harvested::new(
                camera.order(),
                object,
                key,
                Arc::downgrade(&camera),
            ));
        }
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn stats(&self) -> SceneStats {
        SceneStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            live_objects: self.object_count(),
            staged_objects: self.staged_count(),
            promoted_objects: self.promoted.load(Ordering::Relaxed),
            swept_objects: self.swept.load(Ordering::Relaxed),
            staged_renderables: self.renderables.staged_len(),
            published_renderables: self.renderables.published_len(),
        }
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("activated", &self.is_activated())
            .field("marked_for_deletion", &self.is_marked_for_deletion())
            .field("objects", &self.object_count())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneStats {
    pub ticks: u64,
    pub live_objects: usize,
    pub staged_objects: usize,
    pub promoted_objects: u64,
    pub swept_objects: u64,
    pub staged_renderables: usize,
    pub published_renderables: usize,
}
