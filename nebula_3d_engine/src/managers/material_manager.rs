/// Material manager
///
/// Ref-counted material table with material-data slot assignment in the
/// per-material pool. Materials deduplicate by content hash: two materials
/// with identical constants and flags share one slot.

use bytemuck::bytes_of;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::material::Material;
use crate::resources::{BufferView, DynamicBuffer, GpuServices};
use crate::rhi::ResourceState;
use crate::shader_buffers::PerMaterialCB;

struct MaterialRecord {
    material: Arc<Material>,
    view: BufferView,
    use_count: u32,
}

pub struct MaterialManager {
    material_pool: DynamicBuffer,
    /// Records keyed by material content hash (deduplication)
    records: FxHashMap<u64, MaterialRecord>,
    default_material: Arc<Material>,
}

impl MaterialManager {
    pub fn new(gpu: &mut GpuServices) -> Result<Self> {
        let material_pool = gpu.resources.create_indexed_dynamic_buffer(
            std::mem::size_of::<PerMaterialCB>() as u32,
            16,
            ResourceState::AllSrv,
            "PerMaterialData",
            false,
            false,
        )?;
        Ok(Self {
            material_pool,
            records: FxHashMap::default(),
            default_material: Material::default_material(),
        })
    }

    /// Register one use of a material, assigning its pool slot on first use.
    ///
    /// Returns the material's slot in the per-material pool. Content-equal
    /// materials share a slot.
    pub fn increment_usage(
        &mut self,
        gpu: &mut GpuServices,
        material: &Arc<Material>,
    ) -> Result<u32> {
        let key = material.content_hash();
        if let Some(record) = self.records.get_mut(&key) {
            record.use_count += 1;
            let slot = record.view.element_offset() as u32;
            material.set_material_slot(slot);
            return Ok(slot);
        }

        let cb = material.material_cb();
        let view = self.material_pool.add_data(gpu, bytes_of(&cb))?;
        let slot = view.element_offset() as u32;
        material.set_material_slot(slot);
        crate::engine_debug!("nebula3d::MaterialManager",
            "Material '{}' assigned slot {}", material.name(), slot);
        self.records.insert(
            key,
            MaterialRecord {
                material: material.clone(),
                view,
                use_count: 1,
            },
        );
        Ok(slot)
    }

    /// Release one use; the slot is freed when the count reaches zero
    pub fn decrement_usage(&mut self, material: &Arc<Material>) {
        let key = material.content_hash();
        let remove = match self.records.get_mut(&key) {
            Some(record) => {
                record.use_count -= 1;
                record.use_count == 0
            }
            None => {
                crate::engine_warn!("nebula3d::MaterialManager",
                    "decrement_usage on unregistered material '{}'", material.name());
                false
            }
        };
        if remove {
            if let Some(record) = self.records.remove(&key) {
                self.material_pool.deallocate(&record.view);
                crate::engine_debug!("nebula3d::MaterialManager",
                    "Material '{}' released", record.material.name());
            }
        }
    }

    /// Current use count of a material (0 when unregistered)
    pub fn use_count(&self, material: &Arc<Material>) -> u32 {
        self.records
            .get(&material.content_hash())
            .map(|r| r.use_count)
            .unwrap_or(0)
    }

    /// Number of distinct (content-deduplicated) live materials
    pub fn material_count(&self) -> usize {
        self.records.len()
    }

    /// Fallback material used when an import provides none
    pub fn default_material(&self) -> &Arc<Material> {
        &self.default_material
    }

    /// SRV slot of the per-material pool
    pub fn material_pool_srv_index(&self) -> u32 {
        self.material_pool.srv_index()
    }
}

#[cfg(test)]
#[path = "material_manager_tests.rs"]
mod tests;
