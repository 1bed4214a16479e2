/// Skeleton/skinning manager
///
/// Owns the global bone-matrix pool and the per-skinning-instance table.
/// Inverse-bind matrices are uploaded once per base skeleton and shared;
/// each instance owns a transforms range. Dirty skeletons re-upload their
/// evaluated transforms each frame, after which the skinning compute pass
/// reads pre-skinning vertices + bones and writes post-skinning vertices.

use bytemuck::cast_slice;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::engine_bail;
use crate::error::Result;
use crate::mesh::Skeleton;
use crate::resources::{BufferView, DynamicBuffer, GpuServices};
use crate::rhi::ResourceState;
use crate::shader_buffers::SkinningInstanceCB;

const MATRIX_SIZE: u32 = 64;

struct SharedBindPose {
    view: BufferView,
    ref_count: u32,
}

struct SkinningInstance {
    skeleton: Arc<Skeleton>,
    transforms_view: BufferView,
    table_view: BufferView,
    /// Key of the shared inverse-bind upload this instance references
    bind_pose_key: usize,
}

pub struct SkinningManager {
    /// All inverse-bind and per-instance transform matrices
    bone_matrix_pool: DynamicBuffer,
    /// Per-skinning-instance table read by the skinning compute shader
    instance_table: DynamicBuffer,
    /// Shared inverse-bind uploads keyed by base-skeleton identity
    bind_poses: FxHashMap<usize, SharedBindPose>,
    /// Live instances keyed by their table slot
    instances: FxHashMap<u32, SkinningInstance>,
}

impl SkinningManager {
    pub fn new(gpu: &mut GpuServices) -> Result<Self> {
        Ok(Self {
            bone_matrix_pool: gpu.resources.create_indexed_dynamic_buffer(
                MATRIX_SIZE,
                256,
                ResourceState::AllSrv,
                "BoneMatrices",
                false,
                false,
            )?,
            instance_table: gpu.resources.create_indexed_dynamic_buffer(
                std::mem::size_of::<SkinningInstanceCB>() as u32,
                16,
                ResourceState::AllSrv,
                "SkinningInstances",
                false,
                false,
            )?,
            bind_poses: FxHashMap::default(),
            instances: FxHashMap::default(),
        })
    }

    /// Allocate a skinning-instance slot for a skeleton.
    ///
    /// Returns the slot the owning mesh instance stores in its constants.
    pub fn acquire_skinning_instance(
        &mut self,
        gpu: &mut GpuServices,
        skeleton: &Arc<Skeleton>,
    ) -> Result<u32> {
        if skeleton.joint_count() == 0 {
            engine_bail!(InvalidResource, "nebula3d::SkinningManager",
                "skeleton has no joints");
        }

        // Inverse-bind matrices upload once per base skeleton
        let bind_pose_key = skeleton.inverse_bind_matrices().as_ptr() as usize;
        let inverse_bind_offset = match self.bind_poses.get_mut(&bind_pose_key) {
            Some(shared) => {
                shared.ref_count += 1;
                shared.view.element_offset() as u32
            }
            None => {
                let view = self
                    .bone_matrix_pool
                    .add_data(gpu, cast_slice(skeleton.inverse_bind_matrices()))?;
                let offset = view.element_offset() as u32;
                self.bind_poses.insert(
                    bind_pose_key,
                    SharedBindPose {
                        view,
                        ref_count: 1,
                    },
                );
                offset
            }
        };

        let transforms = skeleton.instance_transforms();
        let transforms_view = self.bone_matrix_pool.add_data(gpu, cast_slice(&transforms))?;

        let cb = SkinningInstanceCB {
            bone_matrix_offset: transforms_view.element_offset() as u32,
            num_bones: skeleton.joint_count() as u32,
            inverse_bind_offset,
            _pad: 0,
        };
        let table_view = self
            .instance_table
            .add_data(gpu, bytemuck::bytes_of(&cb))?;
        let slot = table_view.element_offset() as u32;

        self.instances.insert(
            slot,
            SkinningInstance {
                skeleton: skeleton.clone(),
                transforms_view,
                table_view,
                bind_pose_key,
            },
        );
        Ok(slot)
    }

    /// Release a skinning-instance slot
    pub fn release_skinning_instance(&mut self, slot: u32) {
        let Some(instance) = self.instances.remove(&slot) else {
            return;
        };
        self.bone_matrix_pool.deallocate(&instance.transforms_view);
        self.instance_table.deallocate(&instance.table_view);

        let drop_shared = match self.bind_poses.get_mut(&instance.bind_pose_key) {
            Some(shared) => {
                shared.ref_count -= 1;
                shared.ref_count == 0
            }
            None => false,
        };
        if drop_shared {
            if let Some(shared) = self.bind_poses.remove(&instance.bind_pose_key) {
                self.bone_matrix_pool.deallocate(&shared.view);
            }
        }
    }

    /// Upload the transforms of every skeleton marked dirty since the last
    /// frame. Returns how many skeletons were refreshed.
    pub fn update_dirty_skeletons(&mut self, gpu: &mut GpuServices) -> Result<usize> {
        let mut refreshed = 0;
        for instance in self.instances.values() {
            if instance.skeleton.take_dirty() {
                let transforms = instance.skeleton.instance_transforms();
                self.bone_matrix_pool.update_view(
                    gpu,
                    &instance.transforms_view,
                    cast_slice(&transforms),
                )?;
                refreshed += 1;
            }
        }
        Ok(refreshed)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn bone_matrix_srv_index(&self) -> u32 {
        self.bone_matrix_pool.srv_index()
    }

    pub fn instance_table_srv_index(&self) -> u32 {
        self.instance_table.srv_index()
    }
}

#[cfg(test)]
#[path = "skinning_manager_tests.rs"]
mod tests;
