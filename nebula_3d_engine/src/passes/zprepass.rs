/// Z-prepass
///
/// Mesh-shader-indirect depth-only pass over the primary view's opaque
/// geometry. Writes the hardware depth buffer and a linearized-depth color
/// target read by GTAO and the light binning pass.

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

pub struct ZPrepassInputs {
    pub view: ViewId,
    pub depth_target: String,
    pub linear_depth_target: String,
    pub clear_depth: bool,
    /// Pipelines keyed by the technique compile flags they were built for
    pub pipelines: FxHashMap<CompileFlags, Arc<dyn PipelineHandle>>,
}

pub struct ZPrepass {
    inputs: ZPrepassInputs,
    depth: Option<Arc<PixelBuffer>>,
    linear_depth: Option<Arc<PixelBuffer>>,
}

impl ZPrepass {
    pub fn new(inputs: ZPrepassInputs) -> Self {
        Self {
            inputs,
            depth: None,
            linear_depth: None,
        }
    }
}

impl RenderPass for ZPrepass {
    fn name(&self) -> &str {
        "ZPrepass"
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()> {
        builder
            .with_depth_read_write(self.inputs.depth_target.as_str())
            .with_render_target(self.inputs.linear_depth_target.as_str())
            .with_indirect_arguments(indirect_arguments_resolver())
            .is_geometry_pass();
        Ok(())
    }

    fn setup(&mut self, registry: &ResourceRegistryView<'_>) -> Result<()> {
        self.depth = Some(registry.texture(&self.inputs.depth_target)?);
        self.linear_depth = Some(registry.texture(&self.inputs.linear_depth_target)?);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<PassReturn> {
        let (Some(depth), Some(linear_depth)) = (&self.depth, &self.linear_depth) else {
            return Ok(PassReturn::default());
        };
        let Some(view) = ctx.managers.views.view(self.inputs.view) else {
            return Ok(PassReturn::default());
        };

        ctx.list.begin_pass(&PassBeginInfo {
            color_attachments: vec![ColorAttachment {
                texture: linear_depth.handle().clone(),
                mip: 0,
                slice: 0,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                clear: ClearValue::Color([1.0, 0.0, 0.0, 0.0]),
            }],
            depth_attachment: Some(DepthAttachment {
                texture: depth.handle().clone(),
                mip: 0,
                slice: 0,
                load_op: if self.inputs.clear_depth {
                    LoadOp::Clear
                } else {
                    LoadOp::Load
                },
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
        execute_phase_workloads(ctx, self.inputs.view, phase::Z_PREPASS, &self.inputs.pipelines)?;

        ctx.list.end_pass()?;
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        hash_view(&mut hasher, self.inputs.view);
        self.inputs.depth_target.hash(&mut hasher);
        self.inputs.linear_depth_target.hash(&mut hasher);
        self.inputs.clear_depth.hash(&mut hasher);
        hash_pipelines(&mut hasher, &self.inputs.pipelines);
        hasher.finish()
    }

    fn cleanup(&mut self) {
        self.depth = None;
        self.linear_depth = None;
    }
}
