/// Deferred lighting pass
///
/// Fullscreen shading of the G-buffer into the HDR target, used when
/// deferred rendering is enabled. G-buffer SRV slots travel in MiscUint.

use bytemuck::bytes_of;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::Result;
use crate::render_graph::{
    PassBuilder, PassContext, PassReturn, RenderPass, ResourceRegistryView,
};
use crate::resources::PixelBuffer;
use crate::rhi::{
    ClearValue, ColorAttachment, LoadOp, PassBeginInfo, PipelineHandle, PrimitiveTopology,
    ResourceState, RootParam, ShaderStages, StoreOp,
};
use super::{
    draw_fullscreen, hash_pipeline, push_settings_constants, shadow_map_resolver,
};

pub struct DeferredLightingInputs {
    pub hdr_target: String,
    pub gbuffer_normals: String,
    pub gbuffer_albedo: String,
    pub gbuffer_metallic_roughness: String,
    pub gbuffer_emissive: String,
    pub pipeline: Arc<dyn PipelineHandle>,
}

pub struct DeferredLightingPass {
    inputs: DeferredLightingInputs,
    hdr: Option<Arc<PixelBuffer>>,
    gbuffer_srv_indices: [u32; 4],
}

impl DeferredLightingPass {
    pub fn new(inputs: DeferredLightingInputs) -> Self {
        Self {
            inputs,
            hdr: None,
            gbuffer_srv_indices: [u32::MAX; 4],
        }
    }
}

impl RenderPass for DeferredLightingPass {
    fn name(&self) -> &str {
        "DeferredLightingPass"
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()> {
        builder
            .with_render_target(self.inputs.hdr_target.as_str())
            .with_pixel_shader_resource(self.inputs.gbuffer_normals.as_str())
            .with_pixel_shader_resource(self.inputs.gbuffer_albedo.as_str())
            .with_pixel_shader_resource(self.inputs.gbuffer_metallic_roughness.as_str())
            .with_pixel_shader_resource(self.inputs.gbuffer_emissive.as_str())
            .with_ecs_resources(ResourceState::AllSrv, shadow_map_resolver(false));
        Ok(())
    }

    fn setup(&mut self, registry: &ResourceRegistryView<'_>) -> Result<()> {
        self.hdr = Some(registry.texture(&self.inputs.hdr_target)?);
        self.gbuffer_srv_indices = [
            registry.texture(&self.inputs.gbuffer_normals)?.srv_slot(),
            registry.texture(&self.inputs.gbuffer_albedo)?.srv_slot(),
            registry
                .texture(&self.inputs.gbuffer_metallic_roughness)?
                .srv_slot(),
            registry.texture(&self.inputs.gbuffer_emissive)?.srv_slot(),
        ];
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<PassReturn> {
        let Some(hdr) = &self.hdr else {
            return Ok(PassReturn::default());
        };
        ctx.list.begin_pass(&PassBeginInfo {
            color_attachments: vec![ColorAttachment {
                texture: hdr.handle().clone(),
                mip: 0,
                slice: 0,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                clear: ClearValue::Color([0.0; 4]),
            }],
            depth_attachment: None,
            render_area: (hdr.width(), hdr.height()),
        })?;
        ctx.list.set_primitive_topology(PrimitiveTopology::TriangleList)?;
        ctx.list.bind_pipeline(&self.inputs.pipeline)?;
        push_settings_constants(ctx)?;
        ctx.list.push_constants(
            ShaderStages::PIXEL,
            RootParam::MiscUint,
            0,
            bytes_of(&self.gbuffer_srv_indices),
        )?;
        draw_fullscreen(ctx.list)?;
        ctx.list.end_pass()?;
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.inputs.hdr_target.hash(&mut hasher);
        self.inputs.gbuffer_normals.hash(&mut hasher);
        self.inputs.gbuffer_albedo.hash(&mut hasher);
        self.inputs.gbuffer_metallic_roughness.hash(&mut hasher);
        self.inputs.gbuffer_emissive.hash(&mut hasher);
        hash_pipeline(&mut hasher, &self.inputs.pipeline);
        hasher.finish()
    }

    fn cleanup(&mut self) {
        self.hdr = None;
    }
}
