//! Errors for structural operations on the scene graph

use crate::types::ObjectId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    /// A component of this concrete type is already attached
    #[error("object {object} already has a {type_name} component")]
    DuplicateComponent {
        object: ObjectId,
        type_name: &'static str,
    },

    /// Every object keeps exactly one transform
    #[error("the transform component cannot be removed")]
    TransformRequired,

    /// The requested parent is the object itself or one of its descendants
    #[error("object {object} cannot be parented to its own descendant {parent}")]
    HierarchyCycle { object: ObjectId, parent: ObjectId },

    /// Parent and child belong to different scenes
    #[error("object {object} and parent {parent} live in different scenes")]
    ForeignParent { object: ObjectId, parent: ObjectId },

    /// The requested parent is waiting to be swept out of its scene
    #[error("object {object} cannot be parented to {parent}, which is pending deletion")]
    ParentPendingDeletion { object: ObjectId, parent: ObjectId },

    /// The owning scene has already been dropped
    #[error("object {0} is no longer attached to a scene")]
    SceneDetached(ObjectId),
}

pub type SceneResult<T> = Result<T, SceneError>;
