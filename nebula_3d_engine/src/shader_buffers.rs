//! GPU-facing constant-buffer and structured-buffer layouts
//!
//! Every struct here is uploaded byte-for-byte into an indexed pool and read
//! by shaders through bindless slot indices, so layouts are `repr(C)` with
//! explicit padding to 16-byte multiples.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

// ===== GEOMETRY =====

/// Bounding sphere. XYZ stays contiguous in memory so spatial sorts can read
/// the center as a raw float3.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct BoundingSphere {
    pub center: [f32; 3],
    pub radius: f32,
}

/// One meshlet's offsets into the meshlet-vertex and meshlet-triangle pools
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct Meshlet {
    /// First entry in the meshlet-vertex remap array
    pub vertex_offset: u32,
    /// First byte in the meshlet-triangle array (3 bytes per triangle)
    pub triangle_offset: u32,
    pub vertex_count: u32,
    pub triangle_count: u32,
}

// ===== PER-MESH / PER-INSTANCE =====

/// Per-mesh constants: vertex layout info plus byte offsets into every
/// global pool the mesh's data lives in.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct PerMeshCB {
    pub vertex_byte_size: u32,
    pub vertex_flags: u32,
    pub skinning_vertex_byte_size: u32,
    pub num_vertices: u32,
    pub num_meshlets: u32,
    /// Byte offset of the mesh's vertices in the post-skinning pool
    pub vertex_buffer_offset: u32,
    /// Offset in meshlets (byte offset / sizeof(Meshlet))
    pub meshlet_buffer_offset: u32,
    /// Offset in elements (byte offset / 4)
    pub meshlet_vertices_offset: u32,
    /// Byte offset into the meshlet-triangle pool
    pub meshlet_triangles_offset: u32,
    pub material_data_index: u32,
    pub _pad: [u32; 2],
    pub bounding_sphere: BoundingSphere,
}

/// Per-mesh-instance constants
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct PerMeshInstanceCB {
    /// Byte offset of this instance's post-skinning vertex range
    pub post_skinning_vertex_offset: u32,
    /// Slot in the skinning-instance table; `u32::MAX` when not skinned
    pub skinning_instance_slot: u32,
    /// First bit of this instance's meshlet-visibility range in the
    /// per-view culling bitfield
    pub meshlet_bitfield_offset: u32,
    /// Index of the instance's cluster-LOD offsets entry; `u32::MAX` when
    /// the mesh carries no cluster hierarchy
    pub clod_offsets_index: u32,
}

// ===== PER-OBJECT =====

/// Per-object constants (one per renderable entity)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct PerObjectCB {
    pub model: Mat4,
    pub normal_matrix_index: u32,
    pub flags: u32,
    pub _pad: [u32; 2],
}

/// Normal matrix pool entry (inverse-transpose of the model matrix)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct NormalMatrixCB {
    pub normal_matrix: Mat4,
}

// ===== PER-MATERIAL =====

/// Per-material constants: factors, flags and the bindless slot indices of
/// every texture/sampler pair the material references.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PerMaterialCB {
    pub base_color_factor: [f32; 4],
    pub emissive_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub alpha_cutoff: f32,
    pub texture_scale: f32,
    pub height_map_scale: f32,
    pub material_flags: u32,
    pub base_color_texture_index: u32,
    pub base_color_sampler_index: u32,
    pub normal_texture_index: u32,
    pub normal_sampler_index: u32,
    pub ao_texture_index: u32,
    pub ao_sampler_index: u32,
    pub height_texture_index: u32,
    pub height_sampler_index: u32,
    pub metallic_texture_index: u32,
    pub metallic_sampler_index: u32,
    pub roughness_texture_index: u32,
    pub roughness_sampler_index: u32,
    pub emissive_texture_index: u32,
    pub emissive_sampler_index: u32,
    pub opacity_texture_index: u32,
    pub opacity_sampler_index: u32,
    /// Channel swizzles for single-channel reads packed one byte each:
    /// metallic | roughness << 8 | ao << 16 | opacity << 24
    pub channel_swizzles: u32,
    pub _pad: [u32; 5],
}

impl Default for PerMaterialCB {
    fn default() -> Self {
        let mut cb: PerMaterialCB = Zeroable::zeroed();
        cb.base_color_factor = [1.0, 1.0, 1.0, 1.0];
        cb.metallic_factor = 1.0;
        cb.roughness_factor = 1.0;
        cb.alpha_cutoff = 0.5;
        cb.texture_scale = 1.0;
        cb.base_color_texture_index = u32::MAX;
        cb.base_color_sampler_index = u32::MAX;
        cb.normal_texture_index = u32::MAX;
        cb.normal_sampler_index = u32::MAX;
        cb.ao_texture_index = u32::MAX;
        cb.ao_sampler_index = u32::MAX;
        cb.height_texture_index = u32::MAX;
        cb.height_sampler_index = u32::MAX;
        cb.metallic_texture_index = u32::MAX;
        cb.metallic_sampler_index = u32::MAX;
        cb.roughness_texture_index = u32::MAX;
        cb.roughness_sampler_index = u32::MAX;
        cb.emissive_texture_index = u32::MAX;
        cb.emissive_sampler_index = u32::MAX;
        cb.opacity_texture_index = u32::MAX;
        cb.opacity_sampler_index = u32::MAX;
        cb
    }
}

// ===== VIEWS =====

/// Per-view constants shared by cameras and light views
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct ViewCB {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub inverse_view_projection: Mat4,
    /// World-space position (w unused)
    pub position: Vec4,
    /// Frustum planes as (normal, distance)
    pub frustum_planes: [Vec4; 6],
    pub near_plane: f32,
    pub far_plane: f32,
    /// First bit of this view's meshlet-culling bitfield
    pub meshlet_bitfield_offset: u32,
    pub _pad: u32,
}

// ===== LIGHTS =====

/// Light kinds stored in `LightCB::light_type`
pub const LIGHT_TYPE_POINT: u32 = 0;
pub const LIGHT_TYPE_SPOT: u32 = 1;
pub const LIGHT_TYPE_DIRECTIONAL: u32 = 2;

/// Per-light constants
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct LightCB {
    pub color: Vec4,
    pub position: Vec4,
    pub direction: Vec4,
    pub light_type: u32,
    pub intensity: f32,
    /// (constant, linear, quadratic) attenuation packed below
    pub attenuation_constant: f32,
    pub attenuation_linear: f32,
    pub attenuation_quadratic: f32,
    pub inner_cone_cos: f32,
    pub outer_cone_cos: f32,
    pub range: f32,
    /// Index of the light's first view in the view pool; `u32::MAX` when the
    /// light casts no shadows
    pub shadow_view_index: u32,
    /// Shadow map SRV slot; `u32::MAX` when absent
    pub shadow_map_index: u32,
    pub num_cascades: u32,
    pub _pad: u32,
    pub bounding_sphere: BoundingSphere,
}

/// One cluster of the view-space light grid
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct LightClusterCB {
    pub min_bounds: Vec4,
    pub max_bounds: Vec4,
    /// First entry in the cluster light-index page buffer
    pub light_index_offset: u32,
    pub light_count: u32,
    pub _pad: [u32; 2],
}

// ===== SKINNING =====

/// Per-skinning-instance table entry
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct SkinningInstanceCB {
    /// First bone matrix of this instance in the bone-matrix pool
    pub bone_matrix_offset: u32,
    pub num_bones: u32,
    /// Byte offset of the inverse-bind matrices in the bone-matrix pool
    pub inverse_bind_offset: u32,
    pub _pad: u32,
}

// ===== CLUSTER LOD =====

/// A group of meshlets sharing one LOD decision
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct ClusterLodGroup {
    pub first_meshlet: u32,
    pub meshlet_count: u32,
    pub child_offset: u32,
    pub child_count: u32,
    pub bounding_sphere: BoundingSphere,
    pub max_quadric_error: f32,
    pub _pad: [u32; 3],
}

/// A child reference within a cluster-LOD group
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct ClusterLodChild {
    pub group_index: u32,
    /// First entry in the child-local meshlet index remap
    pub first_local_meshlet: u32,
    pub meshlet_count: u32,
    pub _pad: u32,
}

/// Traversal metric of a cluster-LOD node.
///
/// The bounding-sphere XYZ must stay contiguous: spatial ordering reads the
/// center as a raw float3 at the struct's base address.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct ClusterLodTraversalMetric {
    pub bounding_sphere_x: f32,
    pub bounding_sphere_y: f32,
    pub bounding_sphere_z: f32,
    pub bounding_sphere_radius: f32,
    pub max_quadric_error: f32,
    pub _pad: [f32; 3],
}

/// Node kind + range. For GROUP nodes `index_or_offset` is the group index
/// and `count_minus_one` is the group's meshlet count - 1; for INNER nodes
/// `index_or_offset` is the child offset into the node array and
/// `count_minus_one` the child count - 1.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct ClusterLodNodeRange {
    pub is_group: u32,
    pub index_or_offset: u32,
    pub count_minus_one: u32,
    pub _pad: u32,
}

/// One node of the breadth-first packed cluster-LOD traversal hierarchy.
/// The root is always node index 0.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct ClusterLodNode {
    pub range: ClusterLodNodeRange,
    pub traversal_metric: ClusterLodTraversalMetric,
}

// ===== INDIRECT COMMANDS =====

/// One GPU-written indirect command for the mesh-shader path: per-draw root
/// constants followed by the native DispatchMesh arguments.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct IndirectDispatchMeshCommand {
    pub per_object_index: u32,
    pub per_mesh_index: u32,
    pub per_mesh_instance_index: u32,
    pub _pad: u32,
    pub group_count_x: u32,
    pub group_count_y: u32,
    pub group_count_z: u32,
    pub _pad2: u32,
}

#[cfg(test)]
#[path = "shader_buffers_tests.rs"]
mod tests;
