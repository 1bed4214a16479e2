/// Per-pixel linked-list transparency
///
/// The fill pass rasterizes blend-sorted geometry with no color target
/// (depth read-only): each fragment appends a node to the global pool and
/// links it into the per-pixel head buffer. Head entries reset to
/// 0xFFFFFFFF and the pool counter to 0 exactly once per frame, before any
/// append. The resolve pass walks each pixel's list in a fullscreen
/// triangle, sorts and composites into the HDR target.

use bytemuck::bytes_of;
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::ecs::components::PerPassMeshes;
use crate::ecs::components::RenderableObject;
use crate::ecs::phase;
use crate::error::Result;
use crate::managers::ViewId;
use crate::material::CompileFlags;
use crate::render_graph::{
    PassBuilder, PassContext, PassReturn, RenderPass, ResourceRegistryView,
};
use crate::resources::{GpuBuffer, PixelBuffer};
use crate::rhi::{
    ClearValue, ColorAttachment, DepthAttachment, LoadOp, PassBeginInfo, PipelineHandle,
    PrimitiveTopology, RootParam, ShaderStages, StoreOp,
};
use super::{draw_fullscreen, hash_pipelines, hash_view, push_settings_constants,
    push_view_constants};

/// The four TransparencyInfo root constants: head slot, node slot, counter
/// word offset, pool capacity
fn transparency_constants(head: &GpuBuffer, nodes: &GpuBuffer, reading: bool) -> [u32; 4] {
    let head_slot = if reading { head.slots().srv } else { head.slots().uav };
    let node_slot = if reading { nodes.slots().srv } else { nodes.slots().uav };
    let pool_capacity = (nodes.size() / u64::from(nodes.element_size().max(1))) as u32;
    [
        head_slot,
        node_slot,
        (nodes.counter_offset().unwrap_or(0) / 4) as u32,
        pool_capacity,
    ]
}

// ============================================================================
// Fill
// ============================================================================

pub struct PpllFillInputs {
    pub view: ViewId,
    pub depth_target: String,
    pub head_buffer: String,
    pub node_buffer: String,
    pub pipelines: FxHashMap<CompileFlags, Arc<dyn PipelineHandle>>,
}

pub struct PpllFillPass {
    inputs: PpllFillInputs,
    depth: Option<Arc<PixelBuffer>>,
    head: Option<Arc<GpuBuffer>>,
    nodes: Option<Arc<GpuBuffer>>,
}

impl PpllFillPass {
    pub fn new(inputs: PpllFillInputs) -> Self {
        Self {
            inputs,
            depth: None,
            head: None,
            nodes: None,
        }
    }
}

impl RenderPass for PpllFillPass {
    fn name(&self) -> &str {
        "PPLLFillPass"
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()> {
        builder
            .with_depth_read(self.inputs.depth_target.as_str())
            .with_unordered_access(self.inputs.head_buffer.as_str())
            .with_unordered_access(self.inputs.node_buffer.as_str())
            .is_geometry_pass();
        Ok(())
    }

    fn setup(&mut self, registry: &ResourceRegistryView<'_>) -> Result<()> {
        self.depth = Some(registry.texture(&self.inputs.depth_target)?);
        self.head = Some(registry.buffer(&self.inputs.head_buffer)?);
        self.nodes = Some(registry.buffer(&self.inputs.node_buffer)?);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<PassReturn> {
        let (Some(depth), Some(head), Some(nodes)) = (&self.depth, &self.head, &self.nodes)
        else {
            return Ok(PassReturn::default());
        };
        let Some(view) = ctx.managers.views.view(self.inputs.view) else {
            return Ok(PassReturn::default());
        };

        // Reset head pointers and the append counter once, before any append
        ctx.list
            .fill_buffer(head.handle(), 0, head.size(), 0xFFFF_FFFF)?;
        if let Some(counter_offset) = nodes.counter_offset() {
            ctx.list.fill_buffer(nodes.handle(), counter_offset, 4, 0)?;
        }

        // Depth read-only, no color target bound
        ctx.list.begin_pass(&PassBeginInfo {
            color_attachments: Vec::new(),
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
                read_only: true,
            }),
            render_area: (depth.width(), depth.height()),
        })?;

        ctx.list.set_primitive_topology(PrimitiveTopology::TriangleList)?;
        push_view_constants(ctx.list, view.view_cb_index(), view.view_cb_index())?;
        push_settings_constants(ctx)?;
        ctx.list.push_constants(
            ShaderStages::ALL,
            RootParam::TransparencyInfo,
            0,
            bytes_of(&transparency_constants(head, nodes, false)),
        )?;

        // Blend-sorted geometry only: the forward-phase partition filtered
        // down to blended materials, drawn directly (no GPU culling)
        for entity in ctx.world.query1::<PerPassMeshes>() {
            let Some(per_pass) = ctx.world.get::<PerPassMeshes>(entity) else {
                continue;
            };
            let Some(instances) = per_pass.0.get(&phase::FORWARD_PASS.hash) else {
                continue;
            };
            let draw_info = ctx
                .world
                .get::<RenderableObject>(entity)
                .and_then(|r| r.draw_info);

            for instance in instances {
                let material = &instance.mesh().material;
                if !material.is_blended() {
                    continue;
                }
                let compile_flags = material
                    .technique()
                    .compile_flags_for(phase::FORWARD_PASS)
                    .unwrap_or(CompileFlags(0));
                let Some(pipeline) = self.inputs.pipelines.get(&compile_flags) else {
                    continue;
                };
                ctx.list.bind_pipeline(pipeline)?;

                if let Some(info) = draw_info {
                    ctx.list.push_constants(
                        ShaderStages::ALL,
                        RootParam::PerObject,
                        0,
                        bytes_of(&info.per_object_cb_index),
                    )?;
                }
                let mesh = instance.mesh();
                let per_mesh_index = mesh
                    .views()
                    .per_mesh
                    .as_ref()
                    .map(|v| v.element_offset() as u32)
                    .unwrap_or(u32::MAX);
                let per_instance_index = instance
                    .views()
                    .per_mesh_instance
                    .as_ref()
                    .map(|v| v.element_offset() as u32)
                    .unwrap_or(u32::MAX);
                ctx.list.push_constants(
                    ShaderStages::ALL,
                    RootParam::PerMesh,
                    0,
                    bytes_of(&[per_mesh_index, per_instance_index]),
                )?;
                ctx.list.dispatch_mesh(mesh.meshlet_count(), 1, 1)?;
            }
        }

        ctx.list.end_pass()?;
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        hash_view(&mut hasher, self.inputs.view);
        self.inputs.depth_target.hash(&mut hasher);
        self.inputs.head_buffer.hash(&mut hasher);
        self.inputs.node_buffer.hash(&mut hasher);
        hash_pipelines(&mut hasher, &self.inputs.pipelines);
        hasher.finish()
    }

    fn cleanup(&mut self) {
        self.depth = None;
        self.head = None;
        self.nodes = None;
    }
}

// ============================================================================
// Resolve
// ============================================================================

pub struct PpllResolveInputs {
    pub hdr_target: String,
    pub head_buffer: String,
    pub node_buffer: String,
    pub pipeline: Arc<dyn PipelineHandle>,
}

pub struct PpllResolvePass {
    inputs: PpllResolveInputs,
    hdr: Option<Arc<PixelBuffer>>,
    head: Option<Arc<GpuBuffer>>,
    nodes: Option<Arc<GpuBuffer>>,
}

impl PpllResolvePass {
    pub fn new(inputs: PpllResolveInputs) -> Self {
        Self {
            inputs,
            hdr: None,
            head: None,
            nodes: None,
        }
    }
}

#[cfg(test)]
#[path = "ppll_tests.rs"]
mod tests;

impl RenderPass for PpllResolvePass {
    fn name(&self) -> &str {
        "PPLLResolvePass"
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()> {
        builder
            .with_render_target(self.inputs.hdr_target.as_str())
            .with_pixel_shader_resource(self.inputs.head_buffer.as_str())
            .with_pixel_shader_resource(self.inputs.node_buffer.as_str());
        Ok(())
    }

    fn setup(&mut self, registry: &ResourceRegistryView<'_>) -> Result<()> {
        self.hdr = Some(registry.texture(&self.inputs.hdr_target)?);
        self.head = Some(registry.buffer(&self.inputs.head_buffer)?);
        self.nodes = Some(registry.buffer(&self.inputs.node_buffer)?);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<PassReturn> {
        let (Some(hdr), Some(head), Some(nodes)) = (&self.hdr, &self.head, &self.nodes) else {
            return Ok(PassReturn::default());
        };

        ctx.list.begin_pass(&PassBeginInfo {
            color_attachments: vec![ColorAttachment {
                texture: hdr.handle().clone(),
                mip: 0,
                slice: 0,
                load_op: LoadOp::Load,
                store_op: StoreOp::Store,
                clear: ClearValue::Color([0.0; 4]),
            }],
            depth_attachment: None,
            render_area: (hdr.width(), hdr.height()),
        })?;
        ctx.list.set_primitive_topology(PrimitiveTopology::TriangleList)?;
        ctx.list.bind_pipeline(&self.inputs.pipeline)?;
        ctx.list.push_constants(
            ShaderStages::PIXEL,
            RootParam::TransparencyInfo,
            0,
            bytes_of(&transparency_constants(head, nodes, true)),
        )?;
        draw_fullscreen(ctx.list)?;
        ctx.list.end_pass()?;
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.inputs.hdr_target.hash(&mut hasher);
        self.inputs.head_buffer.hash(&mut hasher);
        self.inputs.node_buffer.hash(&mut hasher);
        super::hash_pipeline(&mut hasher, &self.inputs.pipeline);
        hasher.finish()
    }

    fn cleanup(&mut self) {
        self.hdr = None;
        self.head = None;
        self.nodes = None;
    }
}
