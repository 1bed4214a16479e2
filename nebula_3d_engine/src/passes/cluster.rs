/// Cluster-LOD culling and rasterization
///
/// The culling pass traverses the breadth-first cluster-LOD node array on
/// the GPU per view: frustum tests against the per-view planes, screen-
/// space error selection over the traversal metric, writing the surviving
/// clusters as indirect commands and updating the per-view meshlet
/// visibility bitfield. The rasterization pass then draws the selected
/// clusters mesh-shader-indirect into the visibility buffer + linear depth.

use rustc_hash::{FxHashMap, FxHasher};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bytemuck::bytes_of;

use crate::ecs::RenderPhase;
use crate::error::Result;
use crate::managers::ViewId;
use crate::material::CompileFlags;
use crate::render_graph::{
    PassBuilder, PassContext, PassReturn, RenderPass, ResourceRegistryView,
};
use crate::resources::PixelBuffer;
use crate::rhi::{
    ClearValue, ColorAttachment, DepthAttachment, LoadOp, PassBeginInfo, PipelineHandle,
    PrimitiveTopology, ResourceState, RootParam, ShaderStages, StoreOp,
};
use super::{
    execute_phase_workloads, hash_pipeline, hash_pipelines, hash_view,
    indirect_arguments_resolver, push_view_constants,
};

// ============================================================================
// Culling
// ============================================================================

pub struct ClusterCullingInputs {
    /// Views whose workloads this pass populates
    pub views: Vec<ViewId>,
    /// Phases the culled commands are appended for
    pub phases: Vec<RenderPhase>,
    pub pipeline: Arc<dyn PipelineHandle>,
}

pub struct ClusterCullingPass {
    inputs: ClusterCullingInputs,
}

impl ClusterCullingPass {
    pub fn new(inputs: ClusterCullingInputs) -> Self {
        Self { inputs }
    }
}

impl RenderPass for ClusterCullingPass {
    fn name(&self) -> &str {
        "ClusterCullingPass"
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()> {
        // Culling writes the same buffers the geometry passes later consume
        // as indirect arguments; the state difference is what splits the
        // batches and produces the UAV -> INDIRECT_ARGUMENT transitions
        builder.with_ecs_resources(
            ResourceState::UnorderedAccess,
            indirect_arguments_resolver(),
        );
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<PassReturn> {
        ctx.list.bind_pipeline(&self.inputs.pipeline)?;
        ctx.list.push_constants(
            ShaderStages::COMPUTE,
            RootParam::MiscUint,
            0,
            bytes_of(&[
                ctx.managers.mesh.clod_nodes_srv_index(),
                ctx.managers.mesh.clod_groups_srv_index(),
                ctx.managers.views.bitfield_pool_uav_index(),
                ctx.managers.mesh.per_mesh_instance_srv_index(),
            ]),
        )?;

        for &view_id in &self.inputs.views {
            let Some(view) = ctx.managers.views.view(view_id) else {
                continue;
            };
            push_view_constants(ctx.list, view.view_cb_index(), view.view_cb_index())?;

            for &phase in &self.inputs.phases {
                for (_, workload) in ctx
                    .managers
                    .indirect
                    .buffers_for_render_phase(view_id, phase)
                {
                    // Reset the append counter, then let the traversal
                    // append surviving clusters
                    ctx.list.fill_buffer(
                        workload.buffer.handle(),
                        workload.counter_offset(),
                        4,
                        0,
                    )?;
                    ctx.list
                        .dispatch(workload.capacity.div_ceil(64).max(1), 1, 1)?;
                }
            }
        }
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        for &view in &self.inputs.views {
            hash_view(&mut hasher, view);
        }
        for phase in &self.inputs.phases {
            phase.hash.hash(&mut hasher);
        }
        hash_pipeline(&mut hasher, &self.inputs.pipeline);
        hasher.finish()
    }
}

// ============================================================================
// Rasterization
// ============================================================================

pub struct ClusterRasterizationInputs {
    pub view: ViewId,
    pub phase: RenderPhase,
    /// R32_UINT visibility buffer target
    pub visibility_target: String,
    pub linear_depth_target: String,
    pub depth_target: String,
    pub pipelines: FxHashMap<CompileFlags, Arc<dyn PipelineHandle>>,
}

pub struct ClusterRasterizationPass {
    inputs: ClusterRasterizationInputs,
    visibility: Option<Arc<PixelBuffer>>,
    linear_depth: Option<Arc<PixelBuffer>>,
    depth: Option<Arc<PixelBuffer>>,
}

impl ClusterRasterizationPass {
    pub fn new(inputs: ClusterRasterizationInputs) -> Self {
        Self {
            inputs,
            visibility: None,
            linear_depth: None,
            depth: None,
        }
    }
}

impl RenderPass for ClusterRasterizationPass {
    fn name(&self) -> &str {
        "ClusterRasterizationPass"
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()> {
        builder
            .with_render_target(self.inputs.visibility_target.as_str())
            .with_render_target(self.inputs.linear_depth_target.as_str())
            .with_depth_read_write(self.inputs.depth_target.as_str())
            .with_indirect_arguments(indirect_arguments_resolver())
            .is_geometry_pass();
        Ok(())
    }

    fn setup(&mut self, registry: &ResourceRegistryView<'_>) -> Result<()> {
        self.visibility = Some(registry.texture(&self.inputs.visibility_target)?);
        self.linear_depth = Some(registry.texture(&self.inputs.linear_depth_target)?);
        self.depth = Some(registry.texture(&self.inputs.depth_target)?);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<PassReturn> {
        let (Some(visibility), Some(linear_depth), Some(depth)) =
            (&self.visibility, &self.linear_depth, &self.depth)
        else {
            return Ok(PassReturn::default());
        };
        let Some(view) = ctx.managers.views.view(self.inputs.view) else {
            return Ok(PassReturn::default());
        };

        ctx.list.begin_pass(&PassBeginInfo {
            color_attachments: vec![
                ColorAttachment {
                    texture: visibility.handle().clone(),
                    mip: 0,
                    slice: 0,
                    load_op: LoadOp::Clear,
                    store_op: StoreOp::Store,
                    clear: ClearValue::Color([f32::from_bits(u32::MAX), 0.0, 0.0, 0.0]),
                },
                ColorAttachment {
                    texture: linear_depth.handle().clone(),
                    mip: 0,
                    slice: 0,
                    load_op: LoadOp::Clear,
                    store_op: StoreOp::Store,
                    clear: ClearValue::Color([1.0, 0.0, 0.0, 0.0]),
                },
            ],
            depth_attachment: Some(DepthAttachment {
                texture: depth.handle().clone(),
                mip: 0,
                slice: 0,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                clear: ClearValue::DepthStencil {
                    depth: 1.0,
                    stencil: 0,
                },
                read_only: false,
            }),
            render_area: (visibility.width(), visibility.height()),
        })?;

        ctx.list.set_primitive_topology(PrimitiveTopology::TriangleList)?;
        push_view_constants(ctx.list, view.view_cb_index(), view.view_cb_index())?;
        execute_phase_workloads(ctx, self.inputs.view, self.inputs.phase, &self.inputs.pipelines)?;
        ctx.list.end_pass()?;
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        hash_view(&mut hasher, self.inputs.view);
        self.inputs.phase.hash.hash(&mut hasher);
        self.inputs.visibility_target.hash(&mut hasher);
        self.inputs.linear_depth_target.hash(&mut hasher);
        self.inputs.depth_target.hash(&mut hasher);
        hash_pipelines(&mut hasher, &self.inputs.pipelines);
        hasher.finish()
    }

    fn cleanup(&mut self) {
        self.visibility = None;
        self.linear_depth = None;
        self.depth = None;
    }
}
