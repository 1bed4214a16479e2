/// G-buffer pass
///
/// Mesh-shader-indirect geometry pass writing the deferred attachment set:
/// world normals, motion vectors, albedo, metallic-roughness and emissive,
/// with depth carried over from the Z-prepass. Per-object, per-mesh,
/// per-mesh-instance and per-material data arrive through bindless pool
/// indices; only the root table travels per draw.

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
    PrimitiveTopology, StoreOp,
};
use super::{
    execute_phase_workloads, hash_pipelines, hash_view, indirect_arguments_resolver,
    push_settings_constants, push_view_constants,
};

pub struct GBufferInputs {
    pub view: ViewId,
    pub depth_target: String,
    pub normals_target: String,
    pub motion_target: String,
    pub albedo_target: String,
    pub metallic_roughness_target: String,
    pub emissive_target: String,
    pub pipelines: FxHashMap<CompileFlags, Arc<dyn PipelineHandle>>,
}

pub struct GBufferPass {
    inputs: GBufferInputs,
    depth: Option<Arc<PixelBuffer>>,
    color_targets: Vec<Arc<PixelBuffer>>,
}

impl GBufferPass {
    pub fn new(inputs: GBufferInputs) -> Self {
        Self {
            inputs,
            depth: None,
            color_targets: Vec::new(),
        }
    }

    fn color_target_names(&self) -> [&str; 5] {
        [
            self.inputs.normals_target.as_str(),
            self.inputs.motion_target.as_str(),
            self.inputs.albedo_target.as_str(),
            self.inputs.metallic_roughness_target.as_str(),
            self.inputs.emissive_target.as_str(),
        ]
    }
}

impl RenderPass for GBufferPass {
    fn name(&self) -> &str {
        "GBufferPass"
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()> {
        // Depth was laid down by the Z-prepass; the G-buffer only tests it
        builder.with_depth_read_write(self.inputs.depth_target.as_str());
        for target in self.color_target_names() {
            builder.with_render_target(target);
        }
        builder
            .with_indirect_arguments(indirect_arguments_resolver())
            .is_geometry_pass();
        Ok(())
    }

    fn setup(&mut self, registry: &ResourceRegistryView<'_>) -> Result<()> {
        self.depth = Some(registry.texture(&self.inputs.depth_target)?);
        self.color_targets = self
            .color_target_names()
            .iter()
            .map(|name| registry.texture(name))
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<PassReturn> {
        let Some(depth) = &self.depth else {
            return Ok(PassReturn::default());
        };
        let Some(view) = ctx.managers.views.view(self.inputs.view) else {
            return Ok(PassReturn::default());
        };

        let color_attachments = self
            .color_targets
            .iter()
            .map(|target| ColorAttachment {
                texture: target.handle().clone(),
                mip: 0,
                slice: 0,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                clear: ClearValue::Color([0.0; 4]),
            })
            .collect();

        ctx.list.begin_pass(&PassBeginInfo {
            color_attachments,
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
            render_area: (depth.width(), depth.height()),
        })?;

        ctx.list.set_primitive_topology(PrimitiveTopology::TriangleList)?;
        push_view_constants(ctx.list, view.view_cb_index(), view.view_cb_index())?;
        push_settings_constants(ctx)?;
        execute_phase_workloads(
            ctx,
            self.inputs.view,
            phase::GBUFFER_PASS,
            &self.inputs.pipelines,
        )?;

        ctx.list.end_pass()?;
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        hash_view(&mut hasher, self.inputs.view);
        self.inputs.depth_target.hash(&mut hasher);
        for target in self.color_target_names() {
            target.hash(&mut hasher);
        }
        hash_pipelines(&mut hasher, &self.inputs.pipelines);
        hasher.finish()
    }

    fn cleanup(&mut self) {
        self.depth = None;
        self.color_targets.clear();
    }
}
