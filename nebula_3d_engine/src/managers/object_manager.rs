/// Object manager
///
/// Per-object and normal-matrix constant pools. Each renderable entity gets
/// an `ObjectDrawInfo` pairing its per-object CB index with its normal
/// matrix index.

use bytemuck::bytes_of;
use glam::Mat4;
use rustc_hash::FxHashMap;

use crate::ecs::components::ObjectDrawInfo;
use crate::ecs::Entity;
use crate::error::Result;
use crate::resources::{BufferView, DynamicBuffer, GpuServices};
use crate::rhi::ResourceState;
use crate::shader_buffers::{NormalMatrixCB, PerObjectCB};

struct ObjectRecord {
    object_view: BufferView,
    normal_view: BufferView,
}

pub struct ObjectManager {
    per_object_pool: DynamicBuffer,
    normal_matrix_pool: DynamicBuffer,
    objects: FxHashMap<Entity, ObjectRecord>,
}

impl ObjectManager {
    pub fn new(gpu: &mut GpuServices) -> Result<Self> {
        Ok(Self {
            per_object_pool: gpu.resources.create_indexed_dynamic_buffer(
                std::mem::size_of::<PerObjectCB>() as u32,
                64,
                ResourceState::AllSrv,
                "PerObjectBuffers",
                false,
                false,
            )?,
            normal_matrix_pool: gpu.resources.create_indexed_dynamic_buffer(
                std::mem::size_of::<NormalMatrixCB>() as u32,
                64,
                ResourceState::AllSrv,
                "NormalMatrices",
                false,
                false,
            )?,
            objects: FxHashMap::default(),
        })
    }

    /// Register a renderable entity; writes its constants and the derived
    /// normal matrix, returning the draw indices shaders receive through
    /// the PerObject root parameter.
    pub fn add_object(
        &mut self,
        gpu: &mut GpuServices,
        entity: Entity,
        cb: &PerObjectCB,
    ) -> Result<ObjectDrawInfo> {
        let normal = NormalMatrixCB {
            normal_matrix: cb.model.inverse().transpose(),
        };
        let normal_view = self.normal_matrix_pool.add_data(gpu, bytes_of(&normal))?;

        let mut cb = *cb;
        cb.normal_matrix_index = normal_view.element_offset() as u32;
        let object_view = self.per_object_pool.add_data(gpu, bytes_of(&cb))?;

        let info = ObjectDrawInfo {
            per_object_cb_index: object_view.element_offset() as u32,
            normal_matrix_index: cb.normal_matrix_index,
        };
        self.objects.insert(
            entity,
            ObjectRecord {
                object_view,
                normal_view,
            },
        );
        Ok(info)
    }

    /// Re-upload an entity's transform (and derived normal matrix)
    pub fn update_object(
        &mut self,
        gpu: &mut GpuServices,
        entity: Entity,
        model: Mat4,
        flags: u32,
    ) -> Result<()> {
        let Some(record) = self.objects.get(&entity) else {
            return Ok(());
        };
        let cb = PerObjectCB {
            model,
            normal_matrix_index: record.normal_view.element_offset() as u32,
            flags,
            _pad: [0; 2],
        };
        self.per_object_pool
            .update_view(gpu, &record.object_view, bytes_of(&cb))?;
        let normal = NormalMatrixCB {
            normal_matrix: model.inverse().transpose(),
        };
        self.normal_matrix_pool
            .update_view(gpu, &record.normal_view, bytes_of(&normal))
    }

    pub fn remove_object(&mut self, entity: Entity) {
        if let Some(record) = self.objects.remove(&entity) {
            self.per_object_pool.deallocate(&record.object_view);
            self.normal_matrix_pool.deallocate(&record.normal_view);
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn per_object_srv_index(&self) -> u32 {
        self.per_object_pool.srv_index()
    }

    pub fn normal_matrix_srv_index(&self) -> u32 {
        self.normal_matrix_pool.srv_index()
    }
}

#[cfg(test)]
#[path = "object_manager_tests.rs"]
mod tests;
