/// Skeleton data model
///
/// A skeleton is an ordered list of joint entities with one inverse-bind
/// matrix table (shared across every instance of the same base skeleton) and
/// one per-instance joint-transform table. Animation evaluation happens
/// outside the core; evaluated transforms are written in with
/// `set_instance_transforms`, which marks the skeleton dirty for the next
/// bone-matrix upload.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use glam::Mat4;
use rustc_hash::FxHashMap;

use crate::ecs::Entity;

/// An animation clip owned by a skeleton. Evaluation is external; the core
/// only keys clips by name and exposes their duration.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
}

pub struct Skeleton {
    /// Ordered joint entities (parent before child)
    joints: Vec<Entity>,
    /// Shared across all instances of the same base skeleton
    inverse_bind_matrices: Arc<Vec<Mat4>>,
    /// Per-instance evaluated joint transforms
    instance_transforms: Mutex<Vec<Mat4>>,
    animations: FxHashMap<String, AnimationClip>,
    animation_speed: Mutex<f32>,
    dirty: AtomicBool,
}

impl Skeleton {
    pub fn new(joints: Vec<Entity>, inverse_bind_matrices: Vec<Mat4>) -> Arc<Self> {
        let count = joints.len();
        Arc::new(Self {
            joints,
            inverse_bind_matrices: Arc::new(inverse_bind_matrices),
            instance_transforms: Mutex::new(vec![Mat4::IDENTITY; count]),
            animations: FxHashMap::default(),
            animation_speed: Mutex::new(1.0),
            dirty: AtomicBool::new(true),
        })
    }

    /// Per-instance copy: shares the inverse-bind table, owns fresh
    /// transforms. Used when a skinned mesh instance is created.
    pub fn copy_skeleton(&self) -> Arc<Skeleton> {
        Arc::new(Self {
            joints: self.joints.clone(),
            inverse_bind_matrices: Arc::clone(&self.inverse_bind_matrices),
            instance_transforms: Mutex::new(vec![Mat4::IDENTITY; self.joints.len()]),
            animations: self.animations.clone(),
            animation_speed: Mutex::new(*self.animation_speed.lock().unwrap_or_else(|p| p.into_inner())),
            dirty: AtomicBool::new(true),
        })
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn joints(&self) -> &[Entity] {
        &self.joints
    }

    pub fn inverse_bind_matrices(&self) -> &[Mat4] {
        &self.inverse_bind_matrices
    }

    /// Whether two skeletons share the same base (inverse-bind table)
    pub fn shares_base_with(&self, other: &Skeleton) -> bool {
        Arc::ptr_eq(&self.inverse_bind_matrices, &other.inverse_bind_matrices)
    }

    /// Write externally evaluated joint transforms and mark dirty
    pub fn set_instance_transforms(&self, transforms: Vec<Mat4>) {
        debug_assert_eq!(transforms.len(), self.joints.len());
        *self
            .instance_transforms
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = transforms;
        self.dirty.store(true, Ordering::Release);
    }

    /// Snapshot the current joint transforms
    pub fn instance_transforms(&self) -> Vec<Mat4> {
        self.instance_transforms
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Clear and return the dirty flag (the frame's bone-matrix upload)
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub fn set_animation_speed(&self, speed: f32) {
        *self
            .animation_speed
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = speed;
    }

    pub fn animation_speed(&self) -> f32 {
        *self
            .animation_speed
            .lock()
            .unwrap_or_else(|p| p.into_inner())
    }

    pub fn add_animation(&mut self, clip: AnimationClip) {
        self.animations.insert(clip.name.clone(), clip);
    }

    pub fn animation(&self, name: &str) -> Option<&AnimationClip> {
        self.animations.get(name)
    }

    pub fn animation_count(&self) -> usize {
        self.animations.len()
    }
}
