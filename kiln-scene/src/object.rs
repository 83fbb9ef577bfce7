//! Scene objects: nodes of the scene graph
//!
//! An object owns its components (at most one per concrete type, always
//! including a [`TransformComponent`]) and its children. The child to parent
//! edge is a weak back-reference, so the graph has no ownership cycles.
//!
//! Components are stored in insertion order in a small vector, looked up by
//! [`TypeKey`]. Objects rarely carry more than a handful of components, and
//! insertion order makes the tick order of an object's hooks deterministic.

use crate::component::{Component, ComponentSlot};
use crate::error::{SceneError, SceneResult};
use crate::scene::Scene;
use crate::transform::TransformComponent;
use crate::types::{ObjectId, Tick, TypeKey};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

pub struct SceneObject {
    id: ObjectId,
    name: RwLock<String>,
    components: RwLock<Vec<ComponentSlot>>,
    /// Same allocation as the transform's slot in `components`
    transform: Arc<TransformComponent>,
    parent: RwLock<Weak<SceneObject>>,
    children: RwLock<Vec<Arc<SceneObject>>>,
    pending_deletion: AtomicBool,
    scene: Weak<Scene>,
    this: Weak<SceneObject>,
}

impl SceneObject {
    /// Build an object with its mandatory transform. Objects are created
    /// through [`Scene::create_object`].
    pub(crate) fn new(name: &str, scene: Weak<Scene>) -> Arc<Self> {
        let object = Arc::new_cyclic(|this| Self {
            id: ObjectId::next(),
            name: RwLock::new(name.to_string()),
            components: RwLock::new(Vec::with_capacity(4)),
            transform: Arc::new(TransformComponent::new()),
            parent: RwLock::new(Weak::new()),
            children: RwLock::new(Vec::new()),
            pending_deletion: AtomicBool::new(false),
            scene,
            this: this.clone(),
        });

        let transform = Arc::clone(&object.transform);
        object.activate(&transform);
        object.components.write().push(ComponentSlot::new(transform));
        object
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.name.write() = name.to_string();
    }

    /// Owning scene, if it still exists
    pub fn scene(&self) -> Option<Arc<Scene>> {
        self.scene.upgrade()
    }

    // ========================================================================
    // Component registry
    // ========================================================================

    /// Construct and attach a `T`
    ///
    /// Fails without touching the object if a `T` is already attached.
    pub fn add_component<T: Component + Default>(&self) -> SceneResult<Arc<T>> {
        self.insert_component(T::default())
    }

    /// Attach an already constructed component
    pub fn insert_component<T: Component>(&self, component: T) -> SceneResult<Arc<T>> {
        let key = TypeKey::of::<T>();
        let component = Arc::new(component);
        {
            let mut components = self.components.write();
            if components.iter().any(|slot| slot.key() == key) {
                log::debug!("{} already has a {} component", self.id, key.short_name());
                return Err(SceneError::DuplicateComponent {
                    object: self.id,
                    type_name: key.name(),
                });
            }
            self.activate(&component);
            components.push(ComponentSlot::new(Arc::clone(&component)));
        }

        component.on_activate();
        let dynamic: Arc<dyn Component> = component.clone();
        self.notify_component_added(&dynamic);
        Ok(component)
    }

    pub fn get_component<T: Component>(&self) -> Option<Arc<T>> {
        let key = TypeKey::of::<T>();
        self.components
            .read()
            .iter()
            .find(|slot| slot.key() == key)
            .and_then(ComponentSlot::downcast::<T>)
    }

    pub fn has_component<T: Component>(&self) -> bool {
        let key = TypeKey::of::<T>();
        self.components.read().iter().any(|slot| slot.key() == key)
    }

    /// Detach the `T` component, if any. Returns whether one was removed.
    ///
    /// The transform is mandatory and cannot be removed.
    pub fn remove_component<T: Component>(&self) -> SceneResult<bool> {
        let key = TypeKey::of::<T>();
        if key == TypeKey::of::<TransformComponent>() {
            log::warn!("refusing to remove the transform of {}", self.id);
            return Err(SceneError::TransformRequired);
        }

        let removed = {
            let mut components = self.components.write();
            components
                .iter()
                .position(|slot| slot.key() == key)
                .map(|index| components.remove(index))
        };
        // the slot drops here, outside the lock
        match removed {
            Some(slot) => {
                slot.component().base().detach();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn component_count(&self) -> usize {
        self.components.read().len()
    }

    /// Snapshot of every attached component, in insertion order
    pub fn components(&self) -> Vec<Arc<dyn Component>> {
        self.components
            .read()
            .iter()
            .map(|slot| Arc::clone(slot.component()))
            .collect()
    }

    pub fn transform(&self) -> Arc<TransformComponent> {
        Arc::clone(&self.transform)
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    pub fn parent(&self) -> Option<Arc<SceneObject>> {
        self.parent.read().upgrade()
    }

    pub fn has_parent(&self) -> bool {
        self.parent().is_some()
    }

    /// Snapshot of the direct children
    pub fn children(&self) -> Vec<Arc<SceneObject>> {
        self.children.read().clone()
    }

    pub fn child_count(&self) -> usize {
        self.children.read().len()
    }

    /// Whether `self` appears on `other`'s parent chain
    pub fn is_ancestor_of(&self, other: &SceneObject) -> bool {
        let mut current = other.parent();
        while let Some(node) = current {
            if node.id == self.id {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Move this object under `parent`, or to the scene root with `None`,
    /// keeping its world placement. Logic thread only.
    pub fn set_parent(self: &Arc<Self>, parent: Option<&Arc<SceneObject>>) -> SceneResult<()> {
        let current = self.parent();
        let unchanged = match (&current, parent) {
            (Some(current), Some(parent)) => Arc::ptr_eq(current, parent),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return Ok(());
        }

        if let Some(parent) = parent {
            if Arc::ptr_eq(parent, self) || self.is_ancestor_of(parent) {
                log::warn!("rejecting cycle: {} under {}", self.id, parent.id);
                return Err(SceneError::HierarchyCycle {
                    object: self.id,
                    parent: parent.id,
                });
            }
            if !Weak::ptr_eq(&self.scene, &parent.scene) {
                return Err(SceneError::ForeignParent {
                    object: self.id,
                    parent: parent.id,
                });
            }
            if parent.is_pending_deletion() {
                log::warn!("{} cannot join {}: pending deletion", self.id, parent.id);
                return Err(SceneError::ParentPendingDeletion {
                    object: self.id,
                    parent: parent.id,
                });
            }
        }

        // computed against the old linkage, before anything moves
        let local = match parent {
            Some(parent) => self.transform.transform_relative_to(&parent.transform),
            None => self.transform.global_transformations(),
        };

        if let Some(parent) = parent {
            parent.children.write().push(Arc::clone(self));
        }
        if let Some(current) = &current {
            current.children.write().retain(|child| !Arc::ptr_eq(child, self));
        }
        self.transform.set_local_transformations(local);
        *self.parent.write() = parent.map(Arc::downgrade).unwrap_or_default();

        // a concurrent read may have cached a global against the old parent
        // between the local update and the parent swap
        self.transform.invalidate_subtree();

        log::debug!(
            "{} reparented to {}",
            self.id,
            parent.map_or_else(|| "root".to_string(), |parent| parent.id.to_string())
        );
        Ok(())
    }

    /// Create an object in the same scene and parent it here
    pub fn create_child(self: &Arc<Self>, name: &str) -> SceneResult<Arc<SceneObject>> {
        let scene = self.scene().ok_or(SceneError::SceneDetached(self.id))?;
        let child = scene.create_object(name);
        child.set_parent(Some(self))?;
        Ok(child)
    }

    // ========================================================================
    // Deferred deletion
    // ========================================================================

    /// Flag this object and its whole subtree; the scene removes them on its
    /// next update
    pub fn destroy(&self) {
        self.pending_deletion.store(true, Ordering::Relaxed);
        for child in self.children() {
            child.destroy();
        }
    }

    pub fn is_pending_deletion(&self) -> bool {
        self.pending_deletion.load(Ordering::Relaxed)
    }

    /// Drop components and hierarchy edges once the scene has swept this
    /// object out
    ///
    /// Children that are not themselves pending deletion move to the scene
    /// root with their world placement.
    pub(crate) fn teardown(&self) {
        let children: Vec<Arc<SceneObject>> = self.children.read().clone();
        for child in children.iter().filter(|child| !child.is_pending_deletion()) {
            if let Err(err) = child.set_parent(None) {
                log::warn!("could not re-root {} from {}: {err}", child.id, self.id);
            }
        }

        if let Some(parent) = self.parent() {
            parent.children.write().retain(|child| child.id != self.id);
        }
        *self.parent.write() = Weak::new();
        self.children.write().clear();

        let removed: Vec<ComponentSlot> = std::mem::take(&mut *self.components.write());
        for slot in &removed {
            slot.component().base().detach();
        }
        drop(removed);
    }

    // ========================================================================
    // Tick
    // ========================================================================

    pub(crate) fn update(&self, tick: &Tick) {
        for component in self.components() {
            if component.is_enabled() {
                component.update(tick);
            }
        }
    }

    pub(crate) fn late_update(&self, tick: &Tick) {
        for component in self.components() {
            if component.is_enabled() {
                component.late_update(tick);
            }
        }
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    pub(crate) fn notify_transform_changed(&self) {
        let transform_key = TypeKey::of::<TransformComponent>();
        for component in self.components() {
            if component.is_enabled() && *component != transform_key {
                component.on_transform_changed();
            }
        }
    }

    fn notify_component_added(&self, component: &Arc<dyn Component>) {
        if let Some(scene) = self.scene.upgrade() {
            scene.discover(self.id, component);
        }
    }

    pub(crate) fn notify_restaged(&self, component: &Arc<dyn Component>) {
        if let Some(scene) = self.scene.upgrade() {
            scene.discover(self.id, component);
        }
    }

    fn activate<T: Component>(&self, component: &Arc<T>) {
        let this: Weak<T> = Arc::downgrade(component);
        let this: Weak<dyn Component> = this;
        component
            .base()
            .activate(TypeKey::of::<T>(), self.this.clone(), this);
    }
}

impl fmt::Debug for SceneObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneObject")
            .field("id", &self.id)
            .field("name", &*self.name.read())
            .field("components", &self.component_count())
            .field("children", &self.child_count())
            .field("pending_deletion", &self.is_pending_deletion())
            .finish()
    }
}
