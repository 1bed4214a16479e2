/// Cluster light binning pass
///
/// Compute pass that bins the scene's lights into the view-space cluster
/// grid: resets the cluster light-index page counter, then dispatches one
/// thread group per cluster column. Consumed by the forward and deferred
/// shading passes through the cluster buffers' bindless indices.

use bytemuck::bytes_of;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::Result;
use crate::managers::light_manager::CLUSTER_GRID_DIMS;
use crate::managers::ViewId;
use crate::render_graph::{PassBuilder, PassContext, PassReturn, RenderPass};
use crate::rhi::{PipelineHandle, RootParam, ShaderStages};
use super::{hash_pipeline, hash_view, push_view_constants};

pub struct LightBinningInputs {
    pub view: ViewId,
    /// Registered names of the cluster grid and index page buffers
    pub cluster_buffer: String,
    pub cluster_light_indices: String,
    pub pipeline: Arc<dyn PipelineHandle>,
}

pub struct LightBinningPass {
    inputs: LightBinningInputs,
}

impl LightBinningPass {
    pub fn new(inputs: LightBinningInputs) -> Self {
        Self { inputs }
    }
}

impl RenderPass for LightBinningPass {
    fn name(&self) -> &str {
        "LightBinningPass"
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()> {
        builder
            .with_unordered_access(self.inputs.cluster_buffer.as_str())
            .with_unordered_access(self.inputs.cluster_light_indices.as_str());
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<PassReturn> {
        if !ctx.settings.enable_clustered_lighting {
            return Ok(PassReturn::default());
        }
        let Some(view) = ctx.managers.views.view(self.inputs.view) else {
            return Ok(PassReturn::default());
        };

        let indices = ctx.managers.lights.cluster_light_indices();
        if let Some(counter_offset) = indices.counter_offset() {
            ctx.list.fill_buffer(indices.handle(), counter_offset, 4, 0)?;
        }

        ctx.list.bind_pipeline(&self.inputs.pipeline)?;
        push_view_constants(ctx.list, ctx.managers.lights.light_pool_srv_index(),
            view.view_cb_index())?;
        ctx.list.push_constants(
            ShaderStages::COMPUTE,
            RootParam::MiscUint,
            0,
            bytes_of(&[
                ctx.managers.lights.light_count() as u32,
                ctx.managers.lights.cluster_buffer().slots().uav,
                indices.slots().uav,
                0u32,
            ]),
        )?;
        let (x, y, z) = CLUSTER_GRID_DIMS;
        ctx.list.dispatch(x, y, z)?;
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        hash_view(&mut hasher, self.inputs.view);
        self.inputs.cluster_buffer.hash(&mut hasher);
        self.inputs.cluster_light_indices.hash(&mut hasher);
        hash_pipeline(&mut hasher, &self.inputs.pipeline);
        hasher.finish()
    }
}
