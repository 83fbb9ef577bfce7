//! Component trait and the per-component bookkeeping shared by all components
//!
//! A component is attached to exactly one [`SceneObject`]. Its identity is a
//! [`TypeKey`] fixed once, when the owning object activates it, to the
//! concrete type it was added as. Hooks take `&self`: components are shared
//! with the render thread, so mutable state lives behind atomics or locks.

use crate::camera::Camera;
use crate::object::SceneObject;
use crate::renderable::Renderable;
use crate::transform::TransformComponent;
use crate::types::{ObjectId, Tick, TypeKey};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// A unit of behaviour or data attached to a scene object
pub trait Component: Any + Send + Sync {
    /// Shared bookkeeping (enabled flag, type key, owner)
    fn base(&self) -> &ComponentBase;

    /// Called once, right after the component is attached and its key fixed
    fn on_activate(&self) {}

    /// First pass of the tick
    fn update(&self, _tick: &Tick) {}

    /// Second pass of the tick, after every object of the scene has updated
    fn late_update(&self, _tick: &Tick) {}

    /// The owning object's transform changed during this tick
    fn on_transform_changed(&self) {}

    /// Drawable view of this component, if it is one
    fn into_renderable(self: Arc<Self>) -> Option<Arc<dyn Renderable>> {
        None
    }

    /// Camera view of this component, if it is one
    fn into_camera(self: Arc<Self>) -> Option<Arc<dyn Camera>> {
        None
    }
}

impl dyn Component {
    pub fn type_key(&self) -> Option<TypeKey> {
        self.base().type_key()
    }

    pub fn is_enabled(&self) -> bool {
        self.base().is_enabled()
    }
}

impl PartialEq for dyn Component {
    fn eq(&self, other: &Self) -> bool {
        match (self.type_key(), other.type_key()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq<TypeKey> for dyn Component {
    fn eq(&self, other: &TypeKey) -> bool {
        self.type_key() == Some(*other)
    }
}

/// State every component embeds and exposes through [`Component::base`]
#[derive(Debug)]
pub struct ComponentBase {
    enabled: AtomicBool,
    /// Set once the component leaves its object; never cleared
    detached: AtomicBool,
    type_key: OnceLock<TypeKey>,
    owner: OnceLock<Weak<SceneObject>>,
    this: OnceLock<Weak<dyn Component>>,
}

impl ComponentBase {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            detached: AtomicBool::new(false),
            type_key: OnceLock::new(),
            owner: OnceLock::new(),
            this: OnceLock::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// May be called from any thread
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// `None` until the component has been attached to an object
    pub fn type_key(&self) -> Option<TypeKey> {
        self.type_key.get().copied()
    }

    pub fn is_activated(&self) -> bool {
        self.type_key.get().is_some()
    }

    /// Whether the component was removed from its object or swept with it.
    /// Outstanding handles stay valid but the component is no longer
    /// updated, harvested or drawn.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Owning object, if it is still alive and still owns this component
    pub fn owner(&self) -> Option<Arc<SceneObject>> {
        if self.is_detached() {
            return None;
        }
        self.owner.get().and_then(Weak::upgrade)
    }

    pub fn owner_id(&self) -> Option<ObjectId> {
        self.owner().map(|object| object.id())
    }

    /// Transform of the owning object
    pub fn transform(&self) -> Option<Arc<TransformComponent>> {
        self.owner().map(|object| object.transform())
    }

    /// Re-submit this component to its scene's harvest queues.
    ///
    /// Call after changing anything that affects draw ordering (the layer of
    /// a renderable, the order of a camera).
    pub fn restage(&self) {
        let Some(owner) = self.owner() else {
            return;
        };
        let Some(this) = self.this.get().and_then(Weak::upgrade) else {
            return;
        };
        owner.notify_restaged(&this);
    }

    pub(crate) fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }

    /// Fix the key and back-references. Only the first call has any effect.
    pub(crate) fn activate(
        &self,
        key: TypeKey,
        owner: Weak<SceneObject>,
        this: Weak<dyn Component>,
    ) -> bool {
        if self.type_key.set(key).is_err() {
            return false;
        }
        let _ = self.owner.set(owner);
        let _ = self.this.set(this);
        true
    }
}

impl Default for ComponentBase {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry of an object's component list
///
/// Keeps the same allocation twice: once as a trait object for the hooks and
/// once as `Any` for typed lookups.
pub(crate) struct ComponentSlot {
    key: TypeKey,
    component: Arc<dyn Component>,
    any: Arc<dyn Any + Send + Sync>,
}

impl ComponentSlot {
    pub(crate) fn new<T: Component>(component: Arc<T>) -> Self {
        let any: Arc<dyn Any + Send + Sync> = component.clone();
        Self {
            key: TypeKey::of::<T>(),
            component,
            any,
        }
    }

    pub(crate) fn key(&self) -> TypeKey {
        self.key
    }

    pub(crate) fn component(&self) -> &Arc<dyn Component> {
        &self.component
    }

    pub(crate) fn downcast<T: Component>(&self) -> Option<Arc<T>> {
        self.any.clone().downcast::<T>().ok()
    }
}
