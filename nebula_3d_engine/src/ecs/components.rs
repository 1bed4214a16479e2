/// Canonical component set
///
/// The design vocabulary shared by scenes, managers and passes. Tag
/// components are unit structs; relations hold entity keys.

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3, Vec4};
use rustc_hash::FxHashMap;

use crate::camera::Camera;
use crate::mesh::MeshInstance;
use crate::resources::{GpuBuffer, PixelBuffer};
use crate::shader_buffers::BoundingSphere;
use super::Entity;

// ===== TRANSFORMS =====

#[derive(Debug, Clone, Copy)]
pub struct Position(pub Vec3);

#[derive(Debug, Clone, Copy)]
pub struct Rotation(pub Quat);

#[derive(Debug, Clone, Copy)]
pub struct Scale(pub Vec3);

#[derive(Debug, Clone, Copy)]
pub struct LocalMatrix(pub Mat4);

#[derive(Debug, Clone, Copy)]
pub struct GlobalMatrix(pub Mat4);

#[derive(Debug, Clone)]
pub struct Name(pub String);

/// Scene-graph linkage
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    pub parent: Option<Entity>,
    pub children: Vec<Entity>,
}

/// Tag on a scene's root entity
#[derive(Debug, Clone, Copy)]
pub struct SceneRoot;

// ===== RENDERABLES =====

/// Per-object draw indices handed out by the object manager
#[derive(Debug, Clone, Copy)]
pub struct ObjectDrawInfo {
    pub per_object_cb_index: u32,
    pub normal_matrix_index: u32,
}

/// Marks an entity as drawable; indices are attached at scene activation
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderableObject {
    pub draw_info: Option<ObjectDrawInfo>,
}

/// The entity's mesh instances
#[derive(Clone, Default)]
pub struct MeshInstances(pub Vec<Arc<MeshInstance>>);

/// Per-render-phase partition of the entity's mesh instances, keyed by
/// phase hash. For each instance there is an entry for every phase its
/// material technique declares.
#[derive(Clone, Default)]
pub struct PerPassMeshes(pub FxHashMap<u64, Vec<Arc<MeshInstance>>>);

/// Relation to the RenderPhase tag entities this entity draws in
#[derive(Debug, Clone, Default)]
pub struct ParticipatesInPass(pub Vec<Entity>);

/// Tag entity payload identifying one render phase
#[derive(Debug, Clone, Copy)]
pub struct RenderPhaseTag(pub super::RenderPhase);

// ===== LIGHTS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Point,
    Spot,
    Directional,
}

#[derive(Debug, Clone, Copy)]
pub struct Light {
    pub light_type: LightType,
    pub color: Vec4,
    pub intensity: f32,
    /// (constant, linear, quadratic)
    pub attenuation: Vec3,
    pub direction: Vec3,
    pub inner_cone_angle: f32,
    pub outer_cone_angle: f32,
    pub range: f32,
    pub bounding_sphere: BoundingSphere,
    pub casts_shadows: bool,
}

/// Per-light GPU indices, attached by the light manager
#[derive(Debug, Clone)]
pub struct LightViewInfo {
    /// Slot of the light's constants in the light pool
    pub light_buffer_slot: u32,
    /// Slot of the light's first view constants in the view pool
    pub view_buffer_slot: u32,
    /// One render view per face (point), cascade (directional) or the
    /// single spot face
    pub view_ids: Vec<crate::managers::view_manager::ViewId>,
}

/// Shadow depth targets owned by a shadow-casting light
#[derive(Clone)]
pub struct DepthMap {
    pub depth: Arc<PixelBuffer>,
    pub linear_depth: Arc<PixelBuffer>,
}

// ===== CAMERAS AND VIEWS =====

/// Camera component (primary or secondary)
#[derive(Debug, Clone, Copy)]
pub struct CameraComponent(pub Camera);

/// Reference to the render view driving this entity's culling
#[derive(Debug, Clone, Copy)]
pub struct RenderViewRef(pub crate::managers::view_manager::ViewId);

// ===== TAGS =====

/// Entity carries a skinned mesh
#[derive(Debug, Clone, Copy)]
pub struct Skinned;

/// Exclude this entity from shadow rendering
#[derive(Debug, Clone, Copy)]
pub struct SkipShadowPass;

/// Entity contributes to rendering
#[derive(Debug, Clone, Copy)]
pub struct Active;

/// Tag on the root of the currently active scene(s)
#[derive(Debug, Clone, Copy)]
pub struct ActiveScene;

/// Marks an entity wrapping an indirect-argument buffer so the render graph
/// can discover it by query at build time
#[derive(Debug, Clone, Copy)]
pub struct IsIndirectArguments;

/// Buffer payload for `IsIndirectArguments` entities
#[derive(Clone)]
pub struct IndirectArgumentsRef(pub Arc<GpuBuffer>);

/// Tag on the primary camera entity
#[derive(Debug, Clone, Copy)]
pub struct PrimaryCamera;
