/// Mesh instance - one drawable use of a shared mesh
///
/// Skinned instances own a unique post-skinning vertex range and a private
/// skeleton copy; non-skinned instances share the mesh's single
/// post-skinning range. The per-mesh-instance constants carry the offsets
/// the shaders need to find this instance's data in the global pools.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::resources::BufferView;
use crate::shader_buffers::PerMeshInstanceCB;
use super::mesh::Mesh;
use super::skeleton::Skeleton;

/// Views owned by one instance
#[derive(Default, Clone)]
pub struct InstanceGpuViews {
    /// Unique range for skinned instances; `None` means the instance uses
    /// the mesh's shared range
    pub post_skinning_vertices: Option<BufferView>,
    pub per_mesh_instance: Option<BufferView>,
    pub meshlet_bounds: Option<BufferView>,
    /// This instance's slice of the per-view meshlet-culling bitfield
    pub meshlet_bitfield: Option<BufferView>,
    /// Per-instance cluster-LOD offset table entry
    pub clod_offsets: Option<BufferView>,
}

pub struct MeshInstance {
    mesh: Arc<Mesh>,
    /// Instance-private skeleton (skinned meshes only)
    skeleton: Option<Arc<Skeleton>>,
    cb: Mutex<PerMeshInstanceCB>,
    views: Mutex<InstanceGpuViews>,
    animation_speed: Mutex<f32>,
}

impl MeshInstance {
    /// Create an instance; skinned meshes get a private skeleton copy
    pub fn new(mesh: Arc<Mesh>) -> Arc<MeshInstance> {
        let skeleton = mesh.base_skin().map(|base| base.copy_skeleton());
        Arc::new(Self {
            mesh,
            skeleton,
            cb: Mutex::new(PerMeshInstanceCB {
                post_skinning_vertex_offset: 0,
                skinning_instance_slot: u32::MAX,
                meshlet_bitfield_offset: 0,
                clod_offsets_index: u32::MAX,
            }),
            views: Mutex::new(InstanceGpuViews::default()),
            animation_speed: Mutex::new(1.0),
        })
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn has_skin(&self) -> bool {
        self.skeleton.is_some()
    }

    pub fn skin(&self) -> Option<&Arc<Skeleton>> {
        self.skeleton.as_ref()
    }

    /// Per-mesh-instance constants snapshot
    pub fn per_mesh_instance_cb(&self) -> PerMeshInstanceCB {
        *self.cb.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn update_per_mesh_instance_cb(&self, f: impl FnOnce(&mut PerMeshInstanceCB)) {
        let mut cb = self.cb.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut cb);
    }

    pub fn set_skinning_instance_slot(&self, slot: u32) {
        self.update_per_mesh_instance_cb(|cb| cb.skinning_instance_slot = slot);
    }

    /// Byte offset of this instance's post-skinning vertices: the unique
    /// range for skinned instances, the mesh's shared range otherwise
    pub fn post_skinning_vertex_offset(&self) -> u64 {
        let views = self.views();
        if let Some(view) = &views.post_skinning_vertices {
            return view.offset();
        }
        drop(views);
        self.mesh
            .views()
            .post_skinning_vertices
            .as_ref()
            .map(|v| v.offset())
            .unwrap_or(0)
    }

    pub fn views(&self) -> MutexGuard<'_, InstanceGpuViews> {
        self.views.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_animation_speed(&self, speed: f32) {
        *self
            .animation_speed
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = speed;
        if let Some(skeleton) = &self.skeleton {
            skeleton.set_animation_speed(speed);
        }
    }

    pub fn animation_speed(&self) -> f32 {
        *self
            .animation_speed
            .lock()
            .unwrap_or_else(|p| p.into_inner())
    }
}
