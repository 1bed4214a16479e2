/// Mesh manager
///
/// Owns the global geometry pools: pre-skinning vertices, post-skinning
/// vertices (UAV-writable for the skinning compute pass), meshlet tables,
/// per-mesh and per-mesh-instance constant arrays, and the cluster-LOD
/// pools. A mesh's views are allocated together at `add_mesh` and released
/// together at `remove_mesh`.

use bytemuck::{bytes_of, cast_slice};
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::engine_bail;
use crate::error::Result;
use crate::mesh::{Mesh, MeshInstance};
use crate::mesh::mesh::{ClodGpuViews, MeshGpuViews};
use crate::resources::{BufferView, DynamicBuffer, GpuServices};
use crate::rhi::ResourceState;
use crate::shader_buffers::{
    BoundingSphere, ClusterLodChild, ClusterLodGroup, ClusterLodNode, Meshlet, PerMeshCB,
    PerMeshInstanceCB,
};

pub struct MeshManager {
    pre_skinning_vertices: DynamicBuffer,
    post_skinning_vertices: DynamicBuffer,
    meshlet_offsets: DynamicBuffer,
    meshlet_vertices: DynamicBuffer,
    meshlet_triangles: DynamicBuffer,
    meshlet_bounds: DynamicBuffer,
    per_mesh_buffers: DynamicBuffer,
    per_mesh_instance_buffers: DynamicBuffer,
    // Cluster-LOD pools
    clod_groups: DynamicBuffer,
    clod_children: DynamicBuffer,
    clod_meshlets: DynamicBuffer,
    clod_meshlet_vertices: DynamicBuffer,
    clod_meshlet_triangles: DynamicBuffer,
    clod_meshlet_bounds: DynamicBuffer,
    clod_child_local_indices: DynamicBuffer,
    clod_nodes: DynamicBuffer,
    /// Global mesh table; a mesh appears at most once
    meshes: FxHashMap<u64, Arc<Mesh>>,
}

impl MeshManager {
    pub fn new(gpu: &mut GpuServices) -> Result<Self> {
        let rm = &mut *gpu.resources;
        Ok(Self {
            pre_skinning_vertices: rm.create_indexed_dynamic_buffer(
                1, 4096, ResourceState::AllSrv, "PreSkinningVertices", true, false)?,
            post_skinning_vertices: rm.create_indexed_dynamic_buffer(
                1, 4096, ResourceState::UnorderedAccess, "PostSkinningVertices", true, false)?,
            meshlet_offsets: rm.create_indexed_dynamic_buffer(
                std::mem::size_of::<Meshlet>() as u32, 64,
                ResourceState::AllSrv, "MeshletOffsets", false, false)?,
            meshlet_vertices: rm.create_indexed_dynamic_buffer(
                4, 256, ResourceState::AllSrv, "MeshletVertices", false, false)?,
            meshlet_triangles: rm.create_indexed_dynamic_buffer(
                1, 1024, ResourceState::AllSrv, "MeshletTriangles", true, false)?,
            meshlet_bounds: rm.create_indexed_dynamic_buffer(
                std::mem::size_of::<BoundingSphere>() as u32, 64,
                ResourceState::AllSrv, "MeshletBounds", false, false)?,
            per_mesh_buffers: rm.create_indexed_dynamic_buffer(
                std::mem::size_of::<PerMeshCB>() as u32, 16,
                ResourceState::AllSrv, "PerMeshBuffers", false, false)?,
            per_mesh_instance_buffers: rm.create_indexed_dynamic_buffer(
                std::mem::size_of::<PerMeshInstanceCB>() as u32, 16,
                ResourceState::AllSrv, "PerMeshInstanceBuffers", false, false)?,
            clod_groups: rm.create_indexed_dynamic_buffer(
                std::mem::size_of::<ClusterLodGroup>() as u32, 16,
                ResourceState::AllSrv, "ClusterLodGroups", false, false)?,
            clod_children: rm.create_indexed_dynamic_buffer(
                std::mem::size_of::<ClusterLodChild>() as u32, 16,
                ResourceState::AllSrv, "ClusterLodChildren", false, false)?,
            clod_meshlets: rm.create_indexed_dynamic_buffer(
                std::mem::size_of::<Meshlet>() as u32, 64,
                ResourceState::AllSrv, "ClusterLodMeshlets", false, false)?,
            clod_meshlet_vertices: rm.create_indexed_dynamic_buffer(
                4, 256, ResourceState::AllSrv, "ClusterLodMeshletVertices", false, false)?,
            clod_meshlet_triangles: rm.create_indexed_dynamic_buffer(
                1, 1024, ResourceState::AllSrv, "ClusterLodMeshletTriangles", true, false)?,
            clod_meshlet_bounds: rm.create_indexed_dynamic_buffer(
                std::mem::size_of::<BoundingSphere>() as u32, 64,
                ResourceState::AllSrv, "ClusterLodMeshletBounds", false, false)?,
            clod_child_local_indices: rm.create_indexed_dynamic_buffer(
                4, 256, ResourceState::AllSrv, "ClusterLodChildLocalIndices", false, false)?,
            clod_nodes: rm.create_indexed_dynamic_buffer(
                std::mem::size_of::<ClusterLodNode>() as u32, 16,
                ResourceState::AllSrv, "ClusterLodNodes", false, false)?,
            meshes: FxHashMap::default(),
        })
    }

    // ===== MESHES =====

    /// Append a mesh's arrays to the global pools, bake the pool offsets
    /// into its per-mesh constants and hand it its view set.
    ///
    /// With `use_meshlet_reordered_vertices` (mesh-shader paths) the
    /// meshlet-reordered vertex copy is uploaded instead of the plain blob.
    pub fn add_mesh(
        &mut self,
        gpu: &mut GpuServices,
        mesh: &Arc<Mesh>,
        use_meshlet_reordered_vertices: bool,
    ) -> Result<()> {
        if mesh.vertices().is_empty() {
            engine_bail!(InvalidResource, "nebula3d::MeshManager", "mesh vertices are empty");
        }
        if self.meshes.contains_key(&mesh.global_id()) {
            engine_bail!(DuplicateResource, "nebula3d::MeshManager",
                "mesh {} is already registered", mesh.global_id());
        }

        let mut views = MeshGpuViews::default();
        let mut cb = mesh.per_mesh_cb();

        if mesh.is_skinned() {
            if let Some(skinning) = mesh.skinning_vertices() {
                views.pre_skinning_vertices =
                    Some(self.pre_skinning_vertices.add_data(gpu, skinning)?);
            }
            // Post-skinning ranges are allocated per instance for skinned
            // meshes; the shared range stays empty
        } else {
            let blob: &[u8] = if use_meshlet_reordered_vertices {
                mesh.meshlet_reordered_vertices()
            } else {
                mesh.vertices()
            };
            let view = self.post_skinning_vertices.add_data(gpu, blob)?;
            cb.vertex_buffer_offset = view.offset() as u32;
            views.post_skinning_vertices = Some(view);
        }

        let meshlet_view = self
            .meshlet_offsets
            .add_data(gpu, cast_slice(mesh.meshlets()))?;
        cb.meshlet_buffer_offset = meshlet_view.element_offset() as u32;
        views.meshlet_offsets = Some(meshlet_view);

        let vertices_view = self
            .meshlet_vertices
            .add_data(gpu, cast_slice(mesh.meshlet_vertices()))?;
        cb.meshlet_vertices_offset = vertices_view.element_offset() as u32;
        views.meshlet_vertices = Some(vertices_view);

        let triangles_view = self
            .meshlet_triangles
            .add_data(gpu, mesh.meshlet_triangles())?;
        cb.meshlet_triangles_offset = triangles_view.offset() as u32;
        views.meshlet_triangles = Some(triangles_view);

        views.meshlet_bounds = Some(
            self.meshlet_bounds
                .add_data(gpu, cast_slice(mesh.meshlet_bounds()))?,
        );

        if let Some(clod) = mesh.cluster_lod() {
            views.clod = Some(ClodGpuViews {
                groups: Some(self.clod_groups.add_data(gpu, cast_slice(&clod.groups))?),
                children: Some(self.clod_children.add_data(gpu, cast_slice(&clod.children))?),
                meshlets: Some(self.clod_meshlets.add_data(gpu, cast_slice(&clod.meshlets))?),
                meshlet_vertices: Some(
                    self.clod_meshlet_vertices
                        .add_data(gpu, cast_slice(&clod.meshlet_vertices))?,
                ),
                meshlet_triangles: Some(
                    self.clod_meshlet_triangles.add_data(gpu, &clod.meshlet_triangles)?,
                ),
                meshlet_bounds: Some(
                    self.clod_meshlet_bounds
                        .add_data(gpu, cast_slice(&clod.meshlet_bounds))?,
                ),
                child_local_meshlet_indices: Some(
                    self.clod_child_local_indices
                        .add_data(gpu, cast_slice(&clod.child_local_meshlet_indices))?,
                ),
                nodes: Some(self.clod_nodes.add_data(gpu, cast_slice(&clod.nodes))?),
            });
        }

        // Material slot is assigned by the material manager before meshes
        // register (scene activation order)
        cb.material_data_index = mesh.material.material_slot();

        let per_mesh_view = self.per_mesh_buffers.add_data(gpu, bytes_of(&cb))?;
        mesh.update_per_mesh_cb(|stored| *stored = cb);
        views.per_mesh = Some(per_mesh_view);

        *mesh.views() = views;
        self.meshes.insert(mesh.global_id(), mesh.clone());
        crate::engine_debug!("nebula3d::MeshManager",
            "Added mesh {} ({} meshlets)", mesh.global_id(), mesh.meshlet_count());
        Ok(())
    }

    /// Release every view a mesh holds into the pools
    pub fn remove_mesh(&mut self, mesh: &Arc<Mesh>) {
        if self.meshes.remove(&mesh.global_id()).is_none() {
            return;
        }
        let mut views = mesh.views();
        if let Some(v) = views.pre_skinning_vertices.take() {
            self.pre_skinning_vertices.deallocate(&v);
        }
        if let Some(v) = views.post_skinning_vertices.take() {
            self.post_skinning_vertices.deallocate(&v);
        }
        if let Some(v) = views.meshlet_offsets.take() {
            self.meshlet_offsets.deallocate(&v);
        }
        if let Some(v) = views.meshlet_vertices.take() {
            self.meshlet_vertices.deallocate(&v);
        }
        if let Some(v) = views.meshlet_triangles.take() {
            self.meshlet_triangles.deallocate(&v);
        }
        if let Some(v) = views.meshlet_bounds.take() {
            self.meshlet_bounds.deallocate(&v);
        }
        if let Some(v) = views.per_mesh.take() {
            self.per_mesh_buffers.deallocate(&v);
        }
        if let Some(clod) = views.clod.take() {
            for (pool, view) in [
                (&mut self.clod_groups, clod.groups),
                (&mut self.clod_children, clod.children),
                (&mut self.clod_meshlets, clod.meshlets),
                (&mut self.clod_meshlet_vertices, clod.meshlet_vertices),
                (&mut self.clod_meshlet_triangles, clod.meshlet_triangles),
                (&mut self.clod_meshlet_bounds, clod.meshlet_bounds),
                (&mut self.clod_child_local_indices, clod.child_local_meshlet_indices),
                (&mut self.clod_nodes, clod.nodes),
            ] {
                if let Some(v) = view {
                    pool.deallocate(&v);
                }
            }
        }
        crate::engine_debug!("nebula3d::MeshManager", "Removed mesh {}", mesh.global_id());
    }

    // ===== INSTANCES =====

    /// Register an instance: skinned instances get a unique post-skinning
    /// range (seeded with the bind-pose vertices), every instance gets a
    /// per-mesh-instance constants slot.
    pub fn add_mesh_instance(
        &mut self,
        gpu: &mut GpuServices,
        instance: &Arc<MeshInstance>,
        use_meshlet_reordered_vertices: bool,
    ) -> Result<()> {
        let mesh = instance.mesh().clone();
        let mut cb = instance.per_mesh_instance_cb();
        let mut views = instance.views();

        if instance.has_skin() {
            let blob: &[u8] = if use_meshlet_reordered_vertices {
                mesh.meshlet_reordered_vertices()
            } else {
                mesh.vertices()
            };
            let view = self.post_skinning_vertices.add_data(gpu, blob)?;
            cb.post_skinning_vertex_offset = view.offset() as u32;
            views.post_skinning_vertices = Some(view);
        } else {
            cb.post_skinning_vertex_offset = mesh
                .views()
                .post_skinning_vertices
                .as_ref()
                .map(|v| v.offset() as u32)
                .unwrap_or(0);
        }

        let instance_view = self
            .per_mesh_instance_buffers
            .add_data(gpu, bytes_of(&cb))?;
        views.per_mesh_instance = Some(instance_view);
        views.meshlet_bounds = mesh.views().meshlet_bounds.clone();
        drop(views);
        instance.update_per_mesh_instance_cb(|stored| *stored = cb);
        Ok(())
    }

    /// Release an instance's views
    pub fn remove_mesh_instance(&mut self, instance: &Arc<MeshInstance>) {
        let mut views = instance.views();
        if let Some(v) = views.post_skinning_vertices.take() {
            self.post_skinning_vertices.deallocate(&v);
        }
        if let Some(v) = views.per_mesh_instance.take() {
            self.per_mesh_instance_buffers.deallocate(&v);
        }
        views.meshlet_bounds = None;
        views.meshlet_bitfield = None;
        views.clod_offsets = None;
    }

    // ===== UPDATES =====

    /// Re-upload a mesh's constants (slot changes)
    pub fn update_per_mesh_buffer(
        &self,
        gpu: &mut GpuServices,
        view: &BufferView,
        data: &PerMeshCB,
    ) -> Result<()> {
        self.per_mesh_buffers.update_view(gpu, view, bytes_of(data))
    }

    /// Re-upload an instance's constants
    pub fn update_per_mesh_instance_buffer(
        &self,
        gpu: &mut GpuServices,
        view: &BufferView,
        data: &PerMeshInstanceCB,
    ) -> Result<()> {
        self.per_mesh_instance_buffers
            .update_view(gpu, view, bytes_of(data))
    }

    // ===== ACCESS =====

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn contains_mesh(&self, mesh: &Arc<Mesh>) -> bool {
        self.meshes.contains_key(&mesh.global_id())
    }

    pub fn pre_skinning_srv_index(&self) -> u32 {
        self.pre_skinning_vertices.srv_index()
    }

    pub fn post_skinning_srv_index(&self) -> u32 {
        self.post_skinning_vertices.srv_index()
    }

    pub fn post_skinning_uav_index(&self) -> u32 {
        self.post_skinning_vertices.uav_index()
    }

    pub fn meshlet_offsets_srv_index(&self) -> u32 {
        self.meshlet_offsets.srv_index()
    }

    pub fn meshlet_vertices_srv_index(&self) -> u32 {
        self.meshlet_vertices.srv_index()
    }

    pub fn meshlet_triangles_srv_index(&self) -> u32 {
        self.meshlet_triangles.srv_index()
    }

    pub fn meshlet_bounds_srv_index(&self) -> u32 {
        self.meshlet_bounds.srv_index()
    }

    pub fn per_mesh_srv_index(&self) -> u32 {
        self.per_mesh_buffers.srv_index()
    }

    pub fn per_mesh_instance_srv_index(&self) -> u32 {
        self.per_mesh_instance_buffers.srv_index()
    }

    pub fn clod_nodes_srv_index(&self) -> u32 {
        self.clod_nodes.srv_index()
    }

    pub fn clod_groups_srv_index(&self) -> u32 {
        self.clod_groups.srv_index()
    }

    /// Pools exposed for accounting in tests and the engine's stats
    pub fn post_skinning_pool(&self) -> &DynamicBuffer {
        &self.post_skinning_vertices
    }

    pub fn meshlet_offsets_pool(&self) -> &DynamicBuffer {
        &self.meshlet_offsets
    }

    pub fn per_mesh_pool(&self) -> &DynamicBuffer {
        &self.per_mesh_buffers
    }

    pub fn per_mesh_instance_pool(&self) -> &DynamicBuffer {
        &self.per_mesh_instance_buffers
    }
}

#[cfg(test)]
#[path = "mesh_manager_tests.rs"]
mod tests;
