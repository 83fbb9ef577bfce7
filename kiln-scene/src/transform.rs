//! Local/global transform caching for scene objects
//!
//! Every object carries one [`TransformComponent`]. Local mutators mark the
//! cached global transform dirty, on this object and on every descendant.
//! Reading a global value while dirty composes the local matrix with the
//! parent's current global matrix (forcing the parent clean first) and caches
//! the result.
//!
//! Hierarchy matrices are `translate(position) * rotate(rotation) * scale`.
//! The origin only shifts drawing, see [`TransformComponent::draw_matrix`].

use crate::component::{Component, ComponentBase};
use crate::types::Tick;
use glam::{Affine2, Vec2};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Below this length an axis of a decomposed matrix counts as collapsed
const AXIS_EPSILON: f32 = 1e-6;

/// Wrap an angle in degrees into `[0, 360)`
pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Position, rotation (degrees) and scale of a 2D placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transformations {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
}

impl Transformations {
    pub const IDENTITY: Self = Self {
        position: Vec2::ZERO,
        rotation: 0.0,
        scale: Vec2::ONE,
    };

    pub fn new(position: Vec2, rotation: f32, scale: Vec2) -> Self {
        Self {
            position,
            rotation: normalize_degrees(rotation),
            scale,
        }
    }

    /// `translate(position) * rotate(rotation) * scale(scale)`
    pub fn to_matrix(&self) -> Affine2 {
        Affine2::from_scale_angle_translation(self.scale, self.rotation.to_radians(), self.position)
    }

    /// Split an affine matrix back into translation, rotation and scale.
    ///
    /// The angle comes from the first column, the first scale factor from its
    /// length and the second from the determinant, so the result is exact for
    /// any rotation including ±90°. Shear cannot be represented and is lost.
    pub fn from_matrix(matrix: &Affine2) -> Self {
        let x_axis = matrix.matrix2.x_axis;
        let y_axis = matrix.matrix2.y_axis;
        let determinant = matrix.matrix2.determinant();

        let scale_x = x_axis.length();
        let (angle, scale) = if scale_x > AXIS_EPSILON {
            (x_axis.y.atan2(x_axis.x), Vec2::new(scale_x, determinant / scale_x))
        } else {
            // collapsed x axis: recover the angle from the y axis instead
            let scale_y = y_axis.length();
            ((-y_axis.x).atan2(y_axis.y), Vec2::new(0.0, scale_y))
        };

        Self {
            position: matrix.translation,
            rotation: normalize_degrees(angle.to_degrees()),
            scale,
        }
    }
}

impl Default for Transformations {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug)]
struct TransformState {
    origin: Vec2,
    local: Transformations,
    global: Transformations,
    global_matrix: Affine2,
    global_dirty: bool,
    /// Bumped on every invalidation so a recompute racing a mutation does
    /// not mark a stale result clean
    epoch: u64,
}

impl TransformState {
    fn invalidate(&mut self) {
        self.global_dirty = true;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// Mandatory spatial component of every scene object
#[derive(Debug)]
pub struct TransformComponent {
    base: ComponentBase,
    state: RwLock<TransformState>,
    /// Set by local mutators, consumed once per tick by `late_update`
    changed: AtomicBool,
}

impl TransformComponent {
    pub fn new() -> Self {
        Self::with_local(Transformations::IDENTITY)
    }

    pub fn with_local(local: Transformations) -> Self {
        Self {
            base: ComponentBase::new(),
            state: RwLock::new(TransformState {
                origin: Vec2::ZERO,
                local,
                global: local,
                global_matrix: local.to_matrix(),
                global_dirty: true,
                epoch: 0,
            }),
            changed: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Local space
    // ========================================================================

    pub fn origin(&self) -> Vec2 {
        self.state.read().origin
    }

    pub fn set_origin(&self, origin: Vec2) {
        self.mutate(|state| state.origin = origin);
    }

    pub fn position(&self) -> Vec2 {
        self.state.read().local.position
    }

    pub fn set_position(&self, position: Vec2) {
        self.mutate(|state| state.local.position = position);
    }

    /// Move by `offset` in the parent's space
    pub fn translate(&self, offset: Vec2) {
        self.mutate(|state| state.local.position += offset);
    }

    /// Local rotation in degrees, always within `[0, 360)`
    pub fn rotation(&self) -> f32 {
        self.state.read().local.rotation
    }

    pub fn set_rotation(&self, degrees: f32) {
        self.mutate(|state| state.local.rotation = normalize_degrees(degrees));
    }

    pub fn rotate(&self, degrees: f32) {
        self.mutate(|state| state.local.rotation = normalize_degrees(state.local.rotation + degrees));
    }

    pub fn scale(&self) -> Vec2 {
        self.state.read().local.scale
    }

    pub fn set_scale(&self, scale: Vec2) {
        self.mutate(|state| state.local.scale = scale);
    }

    /// Multiply the current scale component-wise
    pub fn scale_by(&self, factor: Vec2) {
        self.mutate(|state| state.local.scale *= factor);
    }

    pub fn local_transformations(&self) -> Transformations {
        self.state.read().local
    }

    pub fn set_local_transformations(&self, local: Transformations) {
        let local = Transformations::new(local.position, local.rotation, local.scale);
        self.mutate(|state| state.local = local);
    }

    pub fn local_matrix(&self) -> Affine2 {
        self.state.read().local.to_matrix()
    }

    // ========================================================================
    // Global space
    // ========================================================================

    pub fn global_matrix(&self) -> Affine2 {
        self.resolve_global().0
    }

    pub fn global_position(&self) -> Vec2 {
        self.resolve_global().1.position
    }

    /// Global rotation in degrees, within `[0, 360)`
    pub fn global_rotation(&self) -> f32 {
        self.resolve_global().1.rotation
    }

    pub fn global_scale(&self) -> Vec2 {
        self.resolve_global().1.scale
    }

    pub fn global_transformations(&self) -> Transformations {
        self.resolve_global().1
    }

    /// Global matrix with the origin applied, for drawing
    pub fn draw_matrix(&self) -> Affine2 {
        let origin = self.origin();
        self.global_matrix() * Affine2::from_translation(-origin)
    }

    /// This transform expressed in `other`'s local space
    pub fn transform_relative_to(&self, other: &TransformComponent) -> Transformations {
        let relative = other.global_matrix().inverse() * self.global_matrix();
        Transformations::from_matrix(&relative)
    }

    pub fn is_global_dirty(&self) -> bool {
        self.state.read().global_dirty
    }

    /// Whether a local mutation is waiting for this tick's notification
    pub fn has_changed(&self) -> bool {
        self.changed.load(Ordering::Relaxed)
    }

    // ========================================================================
    // Cache maintenance
    // ========================================================================

    fn mutate<F>(&self, apply: F)
    where
        F: FnOnce(&mut TransformState),
    {
        {
            let mut state = self.state.write();
            apply(&mut state);
            state.invalidate();
        }
        self.changed.store(true, Ordering::Relaxed);
        self.invalidate_descendants();
    }

    /// Mark this transform's global cache dirty, then every descendant's
    pub(crate) fn invalidate_subtree(&self) {
        self.state.write().invalidate();
        self.invalidate_descendants();
    }

    fn invalidate_descendants(&self) {
        let Some(owner) = self.base.owner() else {
            return;
        };
        for child in owner.children() {
            child.transform().invalidate_subtree();
        }
    }

    fn parent_global(&self) -> Option<Affine2> {
        let parent = self.base.owner()?.parent()?;
        Some(parent.transform().global_matrix())
    }

    fn resolve_global(&self) -> (Affine2, Transformations) {
        let (epoch, local) = {
            let state = self.state.read();
            if !state.global_dirty {
                return (state.global_matrix, state.global);
            }
            (state.epoch, state.local)
        };

        // no lock is held while the parent chain resolves
        let local_matrix = local.to_matrix();
        let (matrix, global) = match self.parent_global() {
            Some(parent) => {
                let matrix = parent * local_matrix;
                (matrix, Transformations::from_matrix(&matrix))
            }
            None => (local_matrix, local),
        };

        let mut state = self.state.write();
        if state.epoch == epoch {
            state.global_matrix = matrix;
            state.global = global;
            state.global_dirty = false;
        }
        (matrix, global)
    }
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for TransformComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn late_update(&self, _tick: &Tick) {
        if !self.changed.swap(false, Ordering::Relaxed) {
            return;
        }
        if let Some(owner) = self.base.owner() {
            owner.notify_transform_changed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const EPS: f32 = 1e-4;

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(normalize_degrees(0.0), 0.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(450.0), 90.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert!(normalize_degrees(-1e-9) < 360.0);
    }

    #[test]
    fn test_rotation_normalized_on_write() {
        let transform = TransformComponent::new();
        transform.set_rotation(-30.0);
        assert_abs_diff_eq!(transform.rotation(), 330.0, epsilon = EPS);

        transform.rotate(60.0);
        assert_abs_diff_eq!(transform.rotation(), 30.0, epsilon = EPS);

        transform.set_rotation(720.0);
        assert_eq!(transform.rotation(), 0.0);
    }

    #[test]
    fn test_local_mutators() {
        let transform = TransformComponent::new();
        transform.set_position(Vec2::new(3.0, 4.0));
        transform.translate(Vec2::new(1.0, -1.0));
        transform.set_scale(Vec2::new(2.0, 2.0));
        transform.scale_by(Vec2::new(0.5, 3.0));
        transform.set_origin(Vec2::new(8.0, 8.0));

        assert_eq!(transform.position(), Vec2::new(4.0, 3.0));
        assert_eq!(transform.scale(), Vec2::new(1.0, 6.0));
        assert_eq!(transform.origin(), Vec2::new(8.0, 8.0));
        assert!(transform.has_changed());
    }

    #[test]
    fn test_detached_global_equals_local() {
        let transform = TransformComponent::new();
        transform.set_position(Vec2::new(12.0, -7.0));
        transform.set_rotation(45.0);
        assert!(transform.is_global_dirty());

        let global = transform.global_transformations();
        assert!(!transform.is_global_dirty());
        assert_eq!(global, transform.local_transformations());
    }

    #[test]
    fn test_mutation_invalidates_cache() {
        let transform = TransformComponent::new();
        let _ = transform.global_position();
        assert!(!transform.is_global_dirty());

        transform.set_position(Vec2::new(1.0, 1.0));
        assert!(transform.is_global_dirty());
        assert_eq!(transform.global_position(), Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_decompose_round_trip_at_right_angle() {
        let original = Transformations::new(Vec2::new(5.0, 6.0), 90.0, Vec2::new(2.0, 3.0));
        let decomposed = Transformations::from_matrix(&original.to_matrix());

        assert_abs_diff_eq!(decomposed.position.x, 5.0, epsilon = EPS);
        assert_abs_diff_eq!(decomposed.position.y, 6.0, epsilon = EPS);
        assert_abs_diff_eq!(decomposed.rotation, 90.0, epsilon = EPS);
        assert_abs_diff_eq!(decomposed.scale.x, 2.0, epsilon = EPS);
        assert_abs_diff_eq!(decomposed.scale.y, 3.0, epsilon = EPS);
    }

    #[test]
    fn test_decompose_negative_angle() {
        let original = Transformations::new(Vec2::ZERO, 270.0, Vec2::ONE);
        let decomposed = Transformations::from_matrix(&original.to_matrix());
        assert_abs_diff_eq!(decomposed.rotation, 270.0, epsilon = EPS);
        assert_abs_diff_eq!(decomposed.scale.y, 1.0, epsilon = EPS);
    }

    #[test]
    fn test_relative_to_inverts_other() {
        let a = TransformComponent::new();
        a.set_position(Vec2::new(10.0, 0.0));
        a.set_rotation(90.0);

        let b = TransformComponent::new();
        b.set_position(Vec2::new(10.0, 5.0));

        let relative = b.transform_relative_to(&a);
        // rotating (5, 0) by 90 degrees lands on (0, 5)
        assert_abs_diff_eq!(relative.position.x, 5.0, epsilon = EPS);
        assert_abs_diff_eq!(relative.position.y, 0.0, epsilon = EPS);
        assert_abs_diff_eq!(relative.rotation, 270.0, epsilon = EPS);
    }

    #[test]
    fn test_draw_matrix_applies_origin() {
        let transform = TransformComponent::new();
        transform.set_position(Vec2::new(100.0, 100.0));
        transform.set_origin(Vec2::new(10.0, 20.0));

        let corner = transform.draw_matrix().transform_point2(Vec2::ZERO);
        assert_abs_diff_eq!(corner.x, 90.0, epsilon = EPS);
        assert_abs_diff_eq!(corner.y, 80.0, epsilon = EPS);
        // origin does not move the hierarchy position
        assert_eq!(transform.global_position(), Vec2::new(100.0, 100.0));
    }

    #[test]
    fn test_late_update_consumes_changed_flag() {
        let transform = TransformComponent::new();
        transform.set_position(Vec2::ONE);
        transform.set_position(Vec2::ONE * 2.0);
        assert!(transform.has_changed());

        transform.late_update(&Tick::default());
        assert!(!transform.has_changed());
    }
}
