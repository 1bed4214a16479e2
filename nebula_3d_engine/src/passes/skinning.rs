/// Skinning compute pass
///
/// One dispatch per skinned mesh instance: reads the pre-skinning vertex
/// pool and the bone-matrix pool, writes the instance's unique range of the
/// post-skinning pool. Runs before any geometry pass touches the
/// post-skinning vertices.

use bytemuck::bytes_of;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::ecs::components::{MeshInstances, Skinned};
use crate::error::Result;
use crate::render_graph::{PassBuilder, PassContext, PassReturn, RenderPass};
use crate::rhi::{PipelineHandle, RootParam, ShaderStages};
use super::hash_pipeline;

/// Threads per skinning work group
const SKINNING_GROUP_SIZE: u32 = 64;

pub struct SkinningComputeInputs {
    /// Registered name of the post-skinning vertex pool
    pub post_skinning_pool: String,
    /// Registered name of the pre-skinning vertex pool
    pub pre_skinning_pool: String,
    pub pipeline: Arc<dyn PipelineHandle>,
}

pub struct SkinningComputePass {
    inputs: SkinningComputeInputs,
}

impl SkinningComputePass {
    pub fn new(inputs: SkinningComputeInputs) -> Self {
        Self { inputs }
    }
}

impl RenderPass for SkinningComputePass {
    fn name(&self) -> &str {
        "SkinningComputePass"
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()> {
        builder
            .with_non_pixel_shader_resource(self.inputs.pre_skinning_pool.as_str())
            .with_unordered_access(self.inputs.post_skinning_pool.as_str());
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<PassReturn> {
        let mesh = &ctx.managers.mesh;
        let skinning = &ctx.managers.skinning;

        ctx.list.bind_pipeline(&self.inputs.pipeline)?;
        ctx.list.push_constants(
            ShaderStages::COMPUTE,
            RootParam::MiscUint,
            0,
            bytes_of(&[
                mesh.pre_skinning_srv_index(),
                mesh.post_skinning_uav_index(),
                skinning.bone_matrix_srv_index(),
                skinning.instance_table_srv_index(),
            ]),
        )?;

        for entity in ctx.world.query2::<Skinned, MeshInstances>() {
            let Some(MeshInstances(instances)) = ctx.world.get::<MeshInstances>(entity) else {
                continue;
            };
            for instance in instances {
                if !instance.has_skin() {
                    continue;
                }
                let cb = instance.per_mesh_instance_cb();
                if cb.skinning_instance_slot == u32::MAX {
                    continue;
                }
                let vertex_count = instance.mesh().num_vertices(true) as u32;
                // Per-instance root constants: the instance's table slot and
                // its post-skinning byte offset
                ctx.list.push_constants(
                    ShaderStages::COMPUTE,
                    RootParam::MiscFloat,
                    0,
                    bytes_of(&[
                        cb.skinning_instance_slot,
                        cb.post_skinning_vertex_offset,
                        vertex_count,
                        0u32,
                    ]),
                )?;
                ctx.list
                    .dispatch(vertex_count.div_ceil(SKINNING_GROUP_SIZE), 1, 1)?;
            }
        }
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.inputs.post_skinning_pool.hash(&mut hasher);
        self.inputs.pre_skinning_pool.hash(&mut hasher);
        hash_pipeline(&mut hasher, &self.inputs.pipeline);
        hasher.finish()
    }
}
