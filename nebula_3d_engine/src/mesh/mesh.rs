/// Mesh - immutable, shared meshlet-based geometry
///
/// Created once from loader-produced `MeshData`, then registered with the
/// mesh manager which appends its arrays to the global pools and hands back
/// buffer views. The mesh itself never changes after creation; only its view
/// set and the pool offsets baked into its per-mesh constants do.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use glam::{Mat4, Vec3};

use crate::engine_bail;
use crate::error::Result;
use crate::material::Material;
use crate::resources::BufferView;
use crate::shader_buffers::{BoundingSphere, Meshlet, PerMeshCB};
use super::cluster_lod::{ClusterLodHierarchy, DEFAULT_NODE_WIDTH};
use super::meshlet::{self, MeshletBuild};
use super::skeleton::Skeleton;
use super::vertex::{MeshData, VertexFlags};

// ===== AABB =====

/// Axis-Aligned Bounding Box in local space
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Transform this local-space AABB by a matrix, returning a new AABB.
    ///
    /// Uses the Arvo method: projects each matrix axis onto the AABB extents
    /// for an exact (tight) result without transforming all 8 corners.
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        let translation = matrix.col(3).truncate();
        let mut new_min = translation;
        let mut new_max = translation;

        for i in 0..3 {
            let axis = matrix.col(i).truncate();
            let a = axis * self.min[i];
            let b = axis * self.max[i];
            new_min += a.min(b);
            new_max += a.max(b);
        }

        Aabb { min: new_min, max: new_max }
    }

    /// Test if this AABB intersects (overlaps) another AABB.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x
        && self.min.y <= other.max.y && self.max.y >= other.min.y
        && self.min.z <= other.max.z && self.max.z >= other.min.z
    }
}

// ===== GPU VIEW SETS =====

/// Views into the mesh manager's cluster-LOD pools
#[derive(Default, Clone)]
pub struct ClodGpuViews {
    pub groups: Option<BufferView>,
    pub children: Option<BufferView>,
    pub meshlets: Option<BufferView>,
    pub meshlet_vertices: Option<BufferView>,
    pub meshlet_triangles: Option<BufferView>,
    pub meshlet_bounds: Option<BufferView>,
    pub child_local_meshlet_indices: Option<BufferView>,
    pub nodes: Option<BufferView>,
}

/// Views into the mesh manager's global pools, set at `add_mesh` and
/// released together at `remove_mesh`
#[derive(Default, Clone)]
pub struct MeshGpuViews {
    pub pre_skinning_vertices: Option<BufferView>,
    pub post_skinning_vertices: Option<BufferView>,
    pub meshlet_offsets: Option<BufferView>,
    pub meshlet_vertices: Option<BufferView>,
    pub meshlet_triangles: Option<BufferView>,
    pub meshlet_bounds: Option<BufferView>,
    pub per_mesh: Option<BufferView>,
    pub clod: Option<ClodGpuViews>,
}

// ===== MESH =====

static GLOBAL_MESH_COUNT: AtomicU64 = AtomicU64::new(0);

pub struct Mesh {
    global_id: u64,
    vertices: Vec<u8>,
    vertex_stride: u32,
    skinning_vertices: Option<Vec<u8>>,
    skinning_vertex_stride: u32,
    indices: Vec<u32>,
    meshlets: Vec<Meshlet>,
    meshlet_vertices: Vec<u32>,
    meshlet_triangles: Vec<u8>,
    meshlet_bounds: Vec<BoundingSphere>,
    /// Vertices duplicated into meshlet-local order (mesh-shader path)
    meshlet_reordered_vertices: Vec<u8>,
    cluster_lod: Option<ClusterLodHierarchy>,
    bounding_sphere: BoundingSphere,
    aabb: Aabb,
    pub material: Arc<Material>,
    flags: VertexFlags,
    base_skeleton: Option<Arc<Skeleton>>,
    /// Per-mesh constants; pool offsets are baked in by the mesh manager
    per_mesh_cb: Mutex<PerMeshCB>,
    views: Mutex<MeshGpuViews>,
}

impl Mesh {
    /// Build a mesh from loader data.
    ///
    /// Constructs meshlets, the meshlet-reordered vertex blob, bounds, and
    /// (when `build_cluster_lod` is set) the cluster-LOD hierarchy.
    pub fn from_mesh_data(
        data: &MeshData,
        material: Arc<Material>,
        base_skeleton: Option<Arc<Skeleton>>,
        build_cluster_lod: bool,
    ) -> Result<Arc<Mesh>> {
        data.validate()?;
        if data.indices.is_empty() {
            engine_bail!(InvalidResource, "nebula3d::Mesh", "mesh has no indices");
        }
        if data.flags.contains(VertexFlags::SKINNED) && base_skeleton.is_none() {
            engine_bail!(InvalidResource, "nebula3d::Mesh",
                "skinned mesh without a base skeleton");
        }

        let vertices = data.build_vertex_blob();
        let vertex_stride = data.vertex_stride();
        let skinning_vertices = data.build_skinning_blob();

        let meshlet_build = meshlet::build_meshlets(&data.indices, &data.positions);
        let meshlet_reordered_vertices = meshlet::build_meshlet_reordered_vertices(
            &meshlet_build.meshlet_vertices,
            &vertices,
            vertex_stride as usize,
        );
        let cluster_lod = if build_cluster_lod {
            Some(ClusterLodHierarchy::build(&meshlet_build, DEFAULT_NODE_WIDTH))
        } else {
            None
        };

        let bounding_sphere = compute_bounding_sphere(&data.positions, &data.indices);
        let aabb = compute_aabb(&data.positions);

        let MeshletBuild {
            meshlets,
            meshlet_vertices,
            meshlet_triangles,
            bounds: meshlet_bounds,
        } = meshlet_build;

        let num_vertices = data.vertex_count() as u32;
        let per_mesh_cb = PerMeshCB {
            vertex_byte_size: vertex_stride,
            vertex_flags: data.flags.bits(),
            skinning_vertex_byte_size: if skinning_vertices.is_some() {
                data.skinning_vertex_stride()
            } else {
                0
            },
            num_vertices,
            num_meshlets: meshlets.len() as u32,
            material_data_index: u32::MAX,
            bounding_sphere,
            ..Default::default()
        };

        Ok(Arc::new(Mesh {
            global_id: GLOBAL_MESH_COUNT.fetch_add(1, Ordering::Relaxed),
            vertices,
            vertex_stride,
            skinning_vertex_stride: data.skinning_vertex_stride(),
            skinning_vertices,
            indices: data.indices.clone(),
            meshlets,
            meshlet_vertices,
            meshlet_triangles,
            meshlet_bounds,
            meshlet_reordered_vertices,
            cluster_lod,
            bounding_sphere,
            aabb,
            material,
            flags: data.flags,
            base_skeleton,
            per_mesh_cb: Mutex::new(per_mesh_cb),
            views: Mutex::new(MeshGpuViews::default()),
        }))
    }

    /// Globally-unique mesh id
    pub fn global_id(&self) -> u64 {
        self.global_id
    }

    pub fn vertex_flags(&self) -> VertexFlags {
        self.flags
    }

    pub fn is_skinned(&self) -> bool {
        self.flags.contains(VertexFlags::SKINNED)
    }

    /// Vertex count; the meshlet-reordered blob duplicates shared vertices
    pub fn num_vertices(&self, meshlet_reordered: bool) -> u64 {
        if meshlet_reordered {
            (self.meshlet_reordered_vertices.len() / self.vertex_stride as usize) as u64
        } else {
            (self.vertices.len() / self.vertex_stride as usize) as u64
        }
    }

    pub fn vertex_stride(&self) -> u32 {
        self.vertex_stride
    }

    pub fn skinning_vertex_stride(&self) -> u32 {
        self.skinning_vertex_stride
    }

    pub fn vertices(&self) -> &[u8] {
        &self.vertices
    }

    pub fn meshlet_reordered_vertices(&self) -> &[u8] {
        &self.meshlet_reordered_vertices
    }

    pub fn skinning_vertices(&self) -> Option<&[u8]> {
        self.skinning_vertices.as_deref()
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn meshlets(&self) -> &[Meshlet] {
        &self.meshlets
    }

    pub fn meshlet_count(&self) -> u32 {
        self.meshlets.len() as u32
    }

    pub fn meshlet_vertices(&self) -> &[u32] {
        &self.meshlet_vertices
    }

    pub fn meshlet_triangles(&self) -> &[u8] {
        &self.meshlet_triangles
    }

    pub fn meshlet_bounds(&self) -> &[BoundingSphere] {
        &self.meshlet_bounds
    }

    pub fn cluster_lod(&self) -> Option<&ClusterLodHierarchy> {
        self.cluster_lod.as_ref()
    }

    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.bounding_sphere
    }

    pub fn aabb(&self) -> Aabb {
        self.aabb
    }

    pub fn has_base_skin(&self) -> bool {
        self.base_skeleton.is_some()
    }

    pub fn base_skin(&self) -> Option<&Arc<Skeleton>> {
        self.base_skeleton.as_ref()
    }

    /// Per-mesh constants (mutated by the mesh manager when pool offsets or
    /// the material slot change)
    pub fn per_mesh_cb(&self) -> PerMeshCB {
        *self.per_mesh_cb.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn update_per_mesh_cb(&self, f: impl FnOnce(&mut PerMeshCB)) {
        let mut cb = self.per_mesh_cb.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut cb);
    }

    pub fn set_material_data_index(&self, index: u32) {
        self.update_per_mesh_cb(|cb| cb.material_data_index = index);
    }

    /// Current pool views (locked; set and released by the mesh manager)
    pub fn views(&self) -> MutexGuard<'_, MeshGpuViews> {
        self.views.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn compute_bounding_sphere(positions: &[f32], indices: &[u32]) -> BoundingSphere {
    let referenced: Vec<u32> = {
        let mut v: Vec<u32> = indices.to_vec();
        v.sort_unstable();
        v.dedup();
        v
    };
    meshlet::bounding_sphere_of(&referenced, positions)
}

fn compute_aabb(positions: &[f32]) -> Aabb {
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    for p in positions.chunks_exact(3) {
        let v = Vec3::new(p[0], p[1], p[2]);
        min = min.min(v);
        max = max.max(v);
    }
    if positions.is_empty() {
        min = Vec3::ZERO;
        max = Vec3::ZERO;
    }
    Aabb { min, max }
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
