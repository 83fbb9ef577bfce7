//! Double-buffered hand-off of drawable references from the logic thread to
//! the render thread
//!
//! The logic thread only ever pushes into the staging list. The render thread
//! prunes expired entries from the published set, drains the staging list
//! into it and gets back a shared, ordered snapshot. The staging mutex is the
//! only lock both threads contend on, and it is held just long enough to swap
//! the list out.
//!
//! Entries are ordered by layer, then by owning object id, then by component
//! type. Re-staging a component replaces its previous entry, which is how a
//! layer change takes effect. An entry counts as expired once its component
//! is dropped or detached from its object, even while other handles keep the
//! allocation alive.

use crate::component::Component;
use crate::types::{ObjectId, TypeKey};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};

/// Ordered, shared view handed to the render thread
pub type HarvestSnapshot<T> = Arc<[Harvested<T>]>;

type EntryKey = (i32, ObjectId, TypeKey);

/// One harvested component reference
///
/// The target may expire at any time after the snapshot was taken; always go
/// through [`Harvested::upgrade`].
pub struct Harvested<T: ?Sized + Component> {
    pub layer: i32,
    pub object: ObjectId,
    pub key: TypeKey,
    target: Weak<T>,
}

impl<T: ?Sized + Component> Harvested<T> {
    pub fn new(layer: i32, object: ObjectId, key: TypeKey, target: Weak<T>) -> Self {
        Self {
            layer,
            object,
            key,
            target,
        }
    }

    /// The component, unless it was dropped or detached
    pub fn upgrade(&self) -> Option<Arc<T>> {
        self.target
            .upgrade()
            .filter(|target| !target.base().is_detached())
    }

    pub fn is_alive(&self) -> bool {
        is_live(&self.target)
    }
}

impl<T: ?Sized + Component> Clone for Harvested<T> {
    fn clone(&self) -> Self {
        Self {
            layer: self.layer,
            object: self.object,
            key: self.key,
            target: self.target.clone(),
        }
    }
}

impl<T: ?Sized + Component> fmt::Debug for Harvested<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harvested")
            .field("layer", &self.layer)
            .field("object", &self.object)
            .field("key", &self.key)
            .field("alive", &self.is_alive())
            .finish()
    }
}

struct Published<T: ?Sized + Component> {
    entries: BTreeMap<EntryKey, Weak<T>>,
    /// Current layer of every published (object, type) pair
    layers: HashMap<(ObjectId, TypeKey), i32>,
    /// Cached snapshot, `None` once the entries changed
    snapshot: Option<HarvestSnapshot<T>>,
}

impl<T: ?Sized + Component> Published<T> {
    fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            layers: HashMap::new(),
            snapshot: None,
        }
    }

    /// Drop every entry whose component has been destroyed or detached
    fn prune(&mut self) -> usize {
        let expired: Vec<EntryKey> = self
            .entries
            .iter()
            .filter(|(_, target)| !is_live(target))
            .map(|(key, _)| *key)
            .collect();

        for key in &expired {
            self.entries.remove(key);
            self.layers.remove(&(key.1, key.2));
        }
        expired.len()
    }

    fn insert(&mut self, entry: Harvested<T>) {
        let slot = (entry.object, entry.key);
        if let Some(previous) = self.layers.insert(slot, entry.layer) {
            self.entries.remove(&(previous, entry.object, entry.key));
        }
        self.entries
            .insert((entry.layer, entry.object, entry.key), entry.target);
    }

    fn snapshot(&mut self) -> HarvestSnapshot<T> {
        if let Some(snapshot) = &self.snapshot {
            return Arc::clone(snapshot);
        }
        let snapshot: HarvestSnapshot<T> = self
            .entries
            .iter()
            .map(|(&(layer, object, key), target)| Harvested::new(layer, object, key, target.clone()))
            .collect();
        self.snapshot = Some(Arc::clone(&snapshot));
        snapshot
    }
}

/// Staging list plus published set for one kind of harvested component
pub struct Harvest<T: ?Sized + Component> {
    staging: Mutex<Vec<Harvested<T>>>,
    published: Mutex<Published<T>>,
}

impl<T: ?Sized + Component> Harvest<T> {
    pub fn new() -> Self {
        Self {
            staging: Mutex::new(Vec::new()),
            published: Mutex::new(Published::new()),
        }
    }

    /// Queue a newly discovered or re-ordered component (logic thread)
    pub fn stage(&self, entry: Harvested<T>) {
        self.staging.lock().push(entry);
    }

    /// Prune, merge staged entries and return the ordered snapshot (render thread)
    pub fn harvest(&self) -> HarvestSnapshot<T> {
        let mut published = self.published.lock();

        let pruned = published.prune();
        let pending = std::mem::take(&mut *self.staging.lock());
        let merged = pending.len();

        for entry in pending {
            if entry.is_alive() {
                published.insert(entry);
            }
        }

        if pruned > 0 || merged > 0 {
            log::trace!("harvest: pruned {pruned}, merged {merged}");
            published.snapshot = None;
        }
        published.snapshot()
    }

    pub fn staged_len(&self) -> usize {
        self.staging.lock().len()
    }

    /// Entries in the published set as of the last harvest
    pub fn published_len(&self) -> usize {
        self.published.lock().entries.len()
    }
}

impl<T: ?Sized + Component> Default for Harvest<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn is_live<T: ?Sized + Component>(target: &Weak<T>) -> bool {
    target
        .upgrade()
        .map_or(false, |target| !target.base().is_detached())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentBase;

    #[derive(Default)]
    struct Sprite {
        base: ComponentBase,
    }

    impl Component for Sprite {
        fn base(&self) -> &ComponentBase {
            &self.base
        }
    }

    fn sprite() -> Arc<Sprite> {
        Arc::new(Sprite::default())
    }

    fn entry(layer: i32, object: u64, target: &Arc<Sprite>) -> Harvested<Sprite> {
        Harvested::new(
            layer,
            ObjectId::from_raw(object),
            TypeKey::of::<Sprite>(),
            Arc::downgrade(target),
        )
    }

    fn object_ids(snapshot: &HarvestSnapshot<Sprite>) -> Vec<u64> {
        snapshot.iter().map(|entry| entry.object.raw()).collect()
    }

    #[test]
    fn test_ordering_by_layer_then_object() {
        let harvest = Harvest::new();
        let sprites: Vec<Arc<Sprite>> = (0..4).map(|_| sprite()).collect();

        for ((layer, object), sprite) in [(3, 10), (1, 20), (1, 5), (2, 30)].into_iter().zip(&sprites) {
            harvest.stage(entry(layer, object, sprite));
        }

        let snapshot = harvest.harvest();
        assert_eq!(object_ids(&snapshot), vec![5, 20, 30, 10]);
    }

    #[test]
    fn test_staged_entries_invisible_until_harvest() {
        let harvest = Harvest::new();
        let sprite = sprite();
        harvest.stage(entry(0, 1, &sprite));

        assert_eq!(harvest.staged_len(), 1);
        assert_eq!(harvest.published_len(), 0);

        harvest.harvest();
        assert_eq!(harvest.staged_len(), 0);
        assert_eq!(harvest.published_len(), 1);
    }

    #[test]
    fn test_expired_entries_pruned() {
        let harvest = Harvest::new();
        let keep = sprite();
        let drop_me = sprite();

        harvest.stage(entry(0, 1, &keep));
        harvest.stage(entry(0, 2, &drop_me));
        assert_eq!(harvest.harvest().len(), 2);

        drop(drop_me);
        let snapshot = harvest.harvest();
        assert_eq!(object_ids(&snapshot), vec![1]);
        assert!(snapshot.iter().all(Harvested::is_alive));
    }

    #[test]
    fn test_detached_entries_pruned_while_held() {
        let harvest = Harvest::new();
        let held = sprite();
        harvest.stage(entry(0, 1, &held));
        let snapshot = harvest.harvest();
        assert!(snapshot[0].upgrade().is_some());

        held.base().detach();
        assert!(snapshot[0].upgrade().is_none());
        assert!(!snapshot[0].is_alive());
        assert!(harvest.harvest().is_empty());
        assert_eq!(harvest.published_len(), 0);
    }

    #[test]
    fn test_expired_before_merge_skipped() {
        let harvest = Harvest::new();
        let sprite = sprite();
        harvest.stage(entry(0, 1, &sprite));
        drop(sprite);

        assert!(harvest.harvest().is_empty());
        assert_eq!(harvest.published_len(), 0);
    }

    #[test]
    fn test_restage_replaces_layer() {
        let harvest = Harvest::new();
        let a = sprite();
        let b = sprite();

        harvest.stage(entry(0, 1, &a));
        harvest.stage(entry(5, 2, &b));
        assert_eq!(object_ids(&harvest.harvest()), vec![1, 2]);

        // move object 1 above object 2
        harvest.stage(entry(9, 1, &a));
        let snapshot = harvest.harvest();
        assert_eq!(object_ids(&snapshot), vec![2, 1]);
        assert_eq!(snapshot[1].layer, 9);
        assert_eq!(harvest.published_len(), 2);
    }

    #[test]
    fn test_snapshot_reused_when_unchanged() {
        let harvest = Harvest::new();
        let sprite = sprite();
        harvest.stage(entry(0, 1, &sprite));

        let first = harvest.harvest();
        let second = harvest.harvest();
        assert!(Arc::ptr_eq(&first, &second));

        harvest.stage(entry(1, 1, &sprite));
        let third = harvest.harvest();
        assert!(!Arc::ptr_eq(&first, &third));
        // old handle stays valid for whoever still holds it
        assert_eq!(first[0].layer, 0);
    }

    #[test]
    fn test_concurrent_stage_and_harvest() {
        use std::thread;

        let harvest = Arc::new(Harvest::new());
        let writer = {
            let harvest = Arc::clone(&harvest);
            thread::spawn(move || {
                let mut kept = Vec::new();
                for i in 0..500u64 {
                    let sprite = sprite();
                    harvest.stage(entry((i % 7) as i32, i, &sprite));
                    if i % 2 == 0 {
                        kept.push(sprite);
                    }
                }
                kept
            })
        };

        for _ in 0..200 {
            let snapshot = harvest.harvest();
            let layers: Vec<i32> = snapshot.iter().map(|entry| entry.layer).collect();
            let mut sorted = layers.clone();
            sorted.sort_unstable();
            assert_eq!(layers, sorted);
        }

        let _kept = writer.join().unwrap();
        let snapshot = harvest.harvest();
        assert_eq!(snapshot.len(), 250);
    }
}
