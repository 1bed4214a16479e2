/// GTAO pass shell
///
/// Compute dispatch over the screen that reads linearized depth and
/// G-buffer normals and writes the ambient-occlusion texture. The AO math
/// lives in the externally compiled shader; this shell owns the resource
/// traffic only.

use bytemuck::bytes_of;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::Result;
use crate::render_graph::{
    PassBuilder, PassContext, PassReturn, RenderPass, ResourceRegistryView,
};
use crate::resources::PixelBuffer;
use crate::rhi::{PipelineHandle, RootParam, ShaderStages};
use super::hash_pipeline;

pub struct GtaoInputs {
    pub linear_depth: String,
    pub gbuffer_normals: String,
    pub ao_target: String,
    pub pipeline: Arc<dyn PipelineHandle>,
}

pub struct GtaoPass {
    inputs: GtaoInputs,
    ao: Option<Arc<PixelBuffer>>,
    srv_indices: [u32; 2],
}

impl GtaoPass {
    pub fn new(inputs: GtaoInputs) -> Self {
        Self {
            inputs,
            ao: None,
            srv_indices: [u32::MAX; 2],
        }
    }
}

impl RenderPass for GtaoPass {
    fn name(&self) -> &str {
        "GTAOPass"
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()> {
        builder
            .with_non_pixel_shader_resource(self.inputs.linear_depth.as_str())
            .with_non_pixel_shader_resource(self.inputs.gbuffer_normals.as_str())
            .with_unordered_access(self.inputs.ao_target.as_str());
        Ok(())
    }

    fn setup(&mut self, registry: &ResourceRegistryView<'_>) -> Result<()> {
        self.ao = Some(registry.texture(&self.inputs.ao_target)?);
        self.srv_indices = [
            registry.texture(&self.inputs.linear_depth)?.srv_slot(),
            registry.texture(&self.inputs.gbuffer_normals)?.srv_slot(),
        ];
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<PassReturn> {
        if !ctx.settings.enable_gtao {
            return Ok(PassReturn::default());
        }
        let Some(ao) = &self.ao else {
            return Ok(PassReturn::default());
        };
        ctx.list.bind_pipeline(&self.inputs.pipeline)?;
        ctx.list.push_constants(
            ShaderStages::COMPUTE,
            RootParam::MiscUint,
            0,
            bytes_of(&[
                self.srv_indices[0],
                self.srv_indices[1],
                ao.uav_slot(0, 0),
                0u32,
            ]),
        )?;
        ctx.list
            .dispatch(ao.width().div_ceil(8), ao.height().div_ceil(8), 1)?;
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.inputs.linear_depth.hash(&mut hasher);
        self.inputs.gbuffer_normals.hash(&mut hasher);
        self.inputs.ao_target.hash(&mut hasher);
        hash_pipeline(&mut hasher, &self.inputs.pipeline);
        hasher.finish()
    }

    fn cleanup(&mut self) {
        self.ao = None;
    }
}
