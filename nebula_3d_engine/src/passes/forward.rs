/// Forward pass
///
/// Shades opaque geometry into the HDR target using the mesh-shader
/// indirect path. Reads the G-buffer attachments, every light's shadow
/// maps, the cluster light bins, the GTAO output and (when image-based
/// lighting is enabled) the environment cubemap + IBL textures. The
/// bindless indices of the screen-space inputs travel in the MiscUint root
/// parameter.

use bytemuck::bytes_of;
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::ecs::phase;
use crate::error::Result;
use crate::managers::ViewId;
use crate::material::CompileFlags;
use crate::render_graph::{
    PassBuilder, PassContext, PassReturn, RenderPass, ResourceRegistryView,
};
use crate::resources::PixelBuffer;
use crate::rhi::{
    ClearValue, ColorAttachment, DepthAttachment, LoadOp, PassBeginInfo, PipelineHandle,
    PrimitiveTopology, ResourceState, RootParam, ShaderStages, StoreOp, INVALID_SLOT,
};
use super::{
    execute_phase_workloads, hash_pipelines, hash_view, indirect_arguments_resolver,
    push_settings_constants, push_view_constants, shadow_map_resolver,
};

pub struct ForwardPassInputs {
    pub view: ViewId,
    pub hdr_target: String,
    pub depth_target: String,
    pub gtao_texture: String,
    pub gbuffer_normals: String,
    pub gbuffer_albedo: String,
    pub gbuffer_metallic_roughness: String,
    pub gbuffer_emissive: String,
    /// Environment cubemap + IBL inputs, present when IBL is enabled
    pub environment_cubemap: Option<String>,
    pub brdf_lut: Option<String>,
    pub irradiance_map: Option<String>,
    pub pipelines: FxHashMap<CompileFlags, Arc<dyn PipelineHandle>>,
}

pub struct ForwardPass {
    inputs: ForwardPassInputs,
    hdr: Option<Arc<PixelBuffer>>,
    depth: Option<Arc<PixelBuffer>>,
    /// SRV indices pushed through MiscUint: gtao, environment, brdf,
    /// irradiance
    misc_srv_indices: [u32; 4],
}

impl ForwardPass {
    pub fn new(inputs: ForwardPassInputs) -> Self {
        Self {
            inputs,
            hdr: None,
            depth: None,
            misc_srv_indices: [INVALID_SLOT; 4],
        }
    }
}

impl RenderPass for ForwardPass {
    fn name(&self) -> &str {
        "ForwardPass"
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()> {
        builder
            .with_render_target(self.inputs.hdr_target.as_str())
            .with_depth_read_write(self.inputs.depth_target.as_str())
            .with_pixel_shader_resource(self.inputs.gtao_texture.as_str())
            .with_pixel_shader_resource(self.inputs.gbuffer_normals.as_str())
            .with_pixel_shader_resource(self.inputs.gbuffer_albedo.as_str())
            .with_pixel_shader_resource(self.inputs.gbuffer_metallic_roughness.as_str())
            .with_pixel_shader_resource(self.inputs.gbuffer_emissive.as_str());
        for optional in [
            &self.inputs.environment_cubemap,
            &self.inputs.brdf_lut,
            &self.inputs.irradiance_map,
        ]
        .into_iter()
        .flatten()
        {
            builder.with_pixel_shader_resource(optional.as_str());
        }
        builder
            .with_ecs_resources(ResourceState::AllSrv, shadow_map_resolver(true))
            .with_indirect_arguments(indirect_arguments_resolver())
            .is_geometry_pass();
        Ok(())
    }

    fn setup(&mut self, registry: &ResourceRegistryView<'_>) -> Result<()> {
        self.hdr = Some(registry.texture(&self.inputs.hdr_target)?);
        self.depth = Some(registry.texture(&self.inputs.depth_target)?);

        let optional_srv = |name: &Option<String>| -> Result<u32> {
            match name {
                Some(name) => Ok(registry.texture(name)?.srv_slot()),
                None => Ok(INVALID_SLOT),
            }
        };
        self.misc_srv_indices = [
            registry.texture(&self.inputs.gtao_texture)?.srv_slot(),
            optional_srv(&self.inputs.environment_cubemap)?,
            optional_srv(&self.inputs.brdf_lut)?,
            optional_srv(&self.inputs.irradiance_map)?,
        ];
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<PassReturn> {
        let (Some(hdr), Some(depth)) = (&self.hdr, &self.depth) else {
            return Ok(PassReturn::default());
        };
        let Some(view) = ctx.managers.views.view(self.inputs.view) else {
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
            depth_attachment: Some(DepthAttachment {
                texture: depth.handle().clone(),
                mip: 0,
                slice: 0,
                load_op: LoadOp::Load,
                store_op: StoreOp::Store,
                clear: ClearValue::DepthStencil {
                    depth: 1.0,
                    stencil: 0,
                },
                read_only: false,
            }),
            render_area: (hdr.width(), hdr.height()),
        })?;

        ctx.list.set_primitive_topology(PrimitiveTopology::TriangleList)?;
        push_view_constants(ctx.list, view.view_cb_index(), view.view_cb_index())?;
        push_settings_constants(ctx)?;
        ctx.list.push_constants(
            ShaderStages::ALL,
            RootParam::MiscUint,
            0,
            bytes_of(&self.misc_srv_indices),
        )?;
        execute_phase_workloads(
            ctx,
            self.inputs.view,
            phase::FORWARD_PASS,
            &self.inputs.pipelines,
        )?;

        ctx.list.end_pass()?;
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        hash_view(&mut hasher, self.inputs.view);
        self.inputs.hdr_target.hash(&mut hasher);
        self.inputs.depth_target.hash(&mut hasher);
        self.inputs.gtao_texture.hash(&mut hasher);
        self.inputs.gbuffer_normals.hash(&mut hasher);
        self.inputs.gbuffer_albedo.hash(&mut hasher);
        self.inputs.gbuffer_metallic_roughness.hash(&mut hasher);
        self.inputs.gbuffer_emissive.hash(&mut hasher);
        self.inputs.environment_cubemap.hash(&mut hasher);
        self.inputs.brdf_lut.hash(&mut hasher);
        self.inputs.irradiance_map.hash(&mut hasher);
        hash_pipelines(&mut hasher, &self.inputs.pipelines);
        hasher.finish()
    }

    fn cleanup(&mut self) {
        self.hdr = None;
        self.depth = None;
    }
}
