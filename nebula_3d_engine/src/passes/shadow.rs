/// Shadow pass
///
/// Iterates every light owning a depth map (skipping `SkipShadowPass`
/// entities) and renders each face/cascade slice with the mesh-shader
/// indirect path: begin a pass on the slice's DSV + linear-depth RTV, push
/// the light's buffer slot and the face view's index, then execute the
/// shadow-phase workloads of that view.

use rustc_hash::{FxHashMap, FxHasher};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::ecs::components::{DepthMap, LightViewInfo, SkipShadowPass};
use crate::ecs::phase;
use crate::error::Result;
use crate::material::CompileFlags;
use crate::render_graph::{PassBuilder, PassContext, PassReturn, RenderPass};
use crate::rhi::{
    ClearValue, ColorAttachment, DepthAttachment, LoadOp, PassBeginInfo, PipelineHandle,
    PrimitiveTopology, Rect2D, ResourceState, StoreOp, Viewport,
};
use super::{
    execute_phase_workloads, hash_pipelines, indirect_arguments_resolver,
    push_settings_constants, push_view_constants, shadow_linear_depth_resolver,
    shadow_map_resolver,
};

pub struct ShadowPassInputs {
    /// Clear each slice's depth before rendering (Load otherwise)
    pub clear_depths: bool,
    pub pipelines: FxHashMap<CompileFlags, Arc<dyn PipelineHandle>>,
}

pub struct ShadowPass {
    inputs: ShadowPassInputs,
}

impl ShadowPass {
    pub fn new(inputs: ShadowPassInputs) -> Self {
        Self { inputs }
    }
}

impl RenderPass for ShadowPass {
    fn name(&self) -> &str {
        "ShadowPass"
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()> {
        builder
            .with_ecs_resources(ResourceState::DepthWrite, shadow_map_resolver(false))
            .with_ecs_resources(ResourceState::RenderTarget, shadow_linear_depth_resolver())
            .with_indirect_arguments(indirect_arguments_resolver());
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<PassReturn> {
        ctx.list.set_primitive_topology(PrimitiveTopology::TriangleList)?;
        push_settings_constants(ctx)?;

        for entity in ctx.world.query2::<DepthMap, LightViewInfo>() {
            if ctx.world.has::<SkipShadowPass>(entity) {
                continue;
            }
            let Some(depth_map) = ctx.world.get::<DepthMap>(entity) else {
                continue;
            };
            let Some(info) = ctx.world.get::<LightViewInfo>(entity) else {
                continue;
            };

            let resolution = depth_map.depth.width();
            ctx.list.set_viewport(Viewport {
                x: 0.0,
                y: 0.0,
                width: resolution as f32,
                height: resolution as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            })?;
            ctx.list.set_scissor(Rect2D {
                x: 0,
                y: 0,
                width: resolution,
                height: resolution,
            })?;

            for (slice, &view_id) in info.view_ids.iter().enumerate() {
                let Some(view) = ctx.managers.views.view(view_id) else {
                    continue;
                };
                ctx.list.begin_pass(&PassBeginInfo {
                    color_attachments: vec![ColorAttachment {
                        texture: depth_map.linear_depth.handle().clone(),
                        mip: 0,
                        slice: slice as u32,
                        load_op: if self.inputs.clear_depths {
                            LoadOp::Clear
                        } else {
                            LoadOp::Load
                        },
                        store_op: StoreOp::Store,
                        clear: ClearValue::Color([1.0, 0.0, 0.0, 0.0]),
                    }],
                    depth_attachment: Some(DepthAttachment {
                        texture: depth_map.depth.handle().clone(),
                        mip: 0,
                        slice: slice as u32,
                        load_op: if self.inputs.clear_depths {
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
                    render_area: (resolution, resolution),
                })?;

                push_view_constants(ctx.list, info.light_buffer_slot, view.view_cb_index())?;
                execute_phase_workloads(
                    ctx,
                    view_id,
                    phase::SHADOW_MAPS_PASS,
                    &self.inputs.pipelines,
                )?;
                ctx.list.end_pass()?;
            }
        }
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.inputs.clear_depths.hash(&mut hasher);
        hash_pipelines(&mut hasher, &self.inputs.pipelines);
        hasher.finish()
    }
}
