/// Debug overlay pass
///
/// Fullscreen visualization of one G-buffer attachment or the linear depth
/// (picked by the mode input), composited over the HDR target. Intended for
/// development; registered only when wireframe/debug settings ask for it.

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
    RootParam, ShaderStages, StoreOp,
};
use super::{draw_fullscreen, hash_pipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugView {
    Normals,
    Albedo,
    LinearDepth,
    MeshletIds,
}

pub struct DebugOverlayInputs {
    pub hdr_target: String,
    /// Texture visualized by the overlay
    pub source: String,
    pub view: DebugView,
    pub pipeline: Arc<dyn PipelineHandle>,
}

pub struct DebugOverlayPass {
    inputs: DebugOverlayInputs,
    hdr: Option<Arc<PixelBuffer>>,
    source_srv: u32,
}

impl DebugOverlayPass {
    pub fn new(inputs: DebugOverlayInputs) -> Self {
        Self {
            inputs,
            hdr: None,
            source_srv: u32::MAX,
        }
    }
}

impl RenderPass for DebugOverlayPass {
    fn name(&self) -> &str {
        "DebugOverlayPass"
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()> {
        builder
            .with_render_target(self.inputs.hdr_target.as_str())
            .with_pixel_shader_resource(self.inputs.source.as_str());
        Ok(())
    }

    fn setup(&mut self, registry: &ResourceRegistryView<'_>) -> Result<()> {
        self.hdr = Some(registry.texture(&self.inputs.hdr_target)?);
        self.source_srv = registry.texture(&self.inputs.source)?.srv_slot();
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
            RootParam::MiscUint,
            0,
            bytes_of(&[self.source_srv, self.inputs.view as u32, 0u32, 0u32]),
        )?;
        draw_fullscreen(ctx.list)?;
        ctx.list.end_pass()?;
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.inputs.hdr_target.hash(&mut hasher);
        self.inputs.source.hash(&mut hasher);
        self.inputs.view.hash(&mut hasher);
        hash_pipeline(&mut hasher, &self.inputs.pipeline);
        hasher.finish()
    }

    fn cleanup(&mut self) {
        self.hdr = None;
    }
}
