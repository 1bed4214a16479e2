/// Bloom chain
///
/// A chain of down-sample passes (each reads mip N of the HDR target as
/// SRV and writes mip N+1 as RTV), up-sample passes (read mip N+1, blend
/// into mip N) and a final blend pass that UAV-writes mip 0. Subresource
/// declarations keep the barriers per-mip, so adjacent chain passes batch
/// without full-resource transitions.

use bytemuck::bytes_of;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::Result;
use crate::render_graph::{
    subresources, PassBuilder, PassContext, PassReturn, RenderPass, ResourceRegistryView,
};
use crate::resources::PixelBuffer;
use crate::rhi::{
    ClearValue, ColorAttachment, LoadOp, PassBeginInfo, PipelineHandle, PrimitiveTopology,
    Rect2D, RootParam, ShaderStages, StoreOp, Viewport,
};
use super::{draw_fullscreen, hash_pipeline};

fn begin_mip_pass(
    ctx: &mut PassContext<'_>,
    target: &Arc<PixelBuffer>,
    mip: u32,
    load_op: LoadOp,
) -> Result<()> {
    let (width, height) = (
        (target.width() >> mip).max(1),
        (target.height() >> mip).max(1),
    );
    ctx.list.begin_pass(&PassBeginInfo {
        color_attachments: vec![ColorAttachment {
            texture: target.handle().clone(),
            mip,
            slice: 0,
            load_op,
            store_op: StoreOp::Store,
            clear: ClearValue::Color([0.0; 4]),
        }],
        depth_attachment: None,
        render_area: (width, height),
    })?;
    ctx.list.set_viewport(Viewport {
        x: 0.0,
        y: 0.0,
        width: width as f32,
        height: height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    })?;
    ctx.list.set_scissor(Rect2D {
        x: 0,
        y: 0,
        width,
        height,
    })
}

// ============================================================================
// Downsample
// ============================================================================

pub struct BloomDownsamplePass {
    hdr_target: String,
    /// Reads this mip, writes `source_mip + 1`
    source_mip: u32,
    pipeline: Arc<dyn PipelineHandle>,
    hdr: Option<Arc<PixelBuffer>>,
}

impl BloomDownsamplePass {
    pub fn new(hdr_target: impl Into<String>, source_mip: u32, pipeline: Arc<dyn PipelineHandle>) -> Self {
        Self {
            hdr_target: hdr_target.into(),
            source_mip,
            pipeline,
            hdr: None,
        }
    }
}

impl RenderPass for BloomDownsamplePass {
    fn name(&self) -> &str {
        "BloomDownsample"
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()> {
        builder
            .with_pixel_shader_resource(subresources(&self.hdr_target, self.source_mip, 1))
            .with_render_target(subresources(&self.hdr_target, self.source_mip + 1, 1));
        Ok(())
    }

    fn setup(&mut self, registry: &ResourceRegistryView<'_>) -> Result<()> {
        self.hdr = Some(registry.texture(&self.hdr_target)?);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<PassReturn> {
        let Some(hdr) = &self.hdr else {
            return Ok(PassReturn::default());
        };
        begin_mip_pass(ctx, hdr, self.source_mip + 1, LoadOp::DontCare)?;
        ctx.list.set_primitive_topology(PrimitiveTopology::TriangleList)?;
        ctx.list.bind_pipeline(&self.pipeline)?;
        // Source mip SRV slot in MiscUint[0]
        ctx.list.push_constants(
            ShaderStages::PIXEL,
            RootParam::MiscUint,
            0,
            bytes_of(&[hdr.mip_srv_slot(self.source_mip), self.source_mip, 0u32, 0u32]),
        )?;
        draw_fullscreen(ctx.list)?;
        ctx.list.end_pass()?;
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hdr_target.hash(&mut hasher);
        self.source_mip.hash(&mut hasher);
        hash_pipeline(&mut hasher, &self.pipeline);
        hasher.finish()
    }

    fn cleanup(&mut self) {
        self.hdr = None;
    }
}

// ============================================================================
// Upsample
// ============================================================================

pub struct BloomUpsamplePass {
    hdr_target: String,
    /// Reads this mip, blends into `source_mip - 1`
    source_mip: u32,
    pipeline: Arc<dyn PipelineHandle>,
    hdr: Option<Arc<PixelBuffer>>,
}

impl BloomUpsamplePass {
    pub fn new(hdr_target: impl Into<String>, source_mip: u32, pipeline: Arc<dyn PipelineHandle>) -> Self {
        debug_assert!(source_mip > 0, "upsample needs a coarser source mip");
        Self {
            hdr_target: hdr_target.into(),
            source_mip,
            pipeline,
            hdr: None,
        }
    }
}

impl RenderPass for BloomUpsamplePass {
    fn name(&self) -> &str {
        "BloomUpsample"
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()> {
        builder
            .with_pixel_shader_resource(subresources(&self.hdr_target, self.source_mip, 1))
            .with_render_target(subresources(&self.hdr_target, self.source_mip - 1, 1));
        Ok(())
    }

    fn setup(&mut self, registry: &ResourceRegistryView<'_>) -> Result<()> {
        self.hdr = Some(registry.texture(&self.hdr_target)?);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<PassReturn> {
        let Some(hdr) = &self.hdr else {
            return Ok(PassReturn::default());
        };
        // Additive blend into the finer mip: load, don't clear
        begin_mip_pass(ctx, hdr, self.source_mip - 1, LoadOp::Load)?;
        ctx.list.set_primitive_topology(PrimitiveTopology::TriangleList)?;
        ctx.list.bind_pipeline(&self.pipeline)?;
        ctx.list.push_constants(
            ShaderStages::PIXEL,
            RootParam::MiscUint,
            0,
            bytes_of(&[hdr.mip_srv_slot(self.source_mip), self.source_mip, 0u32, 0u32]),
        )?;
        draw_fullscreen(ctx.list)?;
        ctx.list.end_pass()?;
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hdr_target.hash(&mut hasher);
        self.source_mip.hash(&mut hasher);
        hash_pipeline(&mut hasher, &self.pipeline);
        hasher.finish()
    }

    fn cleanup(&mut self) {
        self.hdr = None;
    }
}

// ============================================================================
// Final blend
// ============================================================================

/// Compute blend of the accumulated bloom into mip 0 of the HDR target
pub struct BloomBlendPass {
    hdr_target: String,
    pipeline: Arc<dyn PipelineHandle>,
    hdr: Option<Arc<PixelBuffer>>,
}

impl BloomBlendPass {
    pub fn new(hdr_target: impl Into<String>, pipeline: Arc<dyn PipelineHandle>) -> Self {
        Self {
            hdr_target: hdr_target.into(),
            pipeline,
            hdr: None,
        }
    }
}

impl RenderPass for BloomBlendPass {
    fn name(&self) -> &str {
        "BloomBlend"
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()> {
        builder.with_unordered_access(subresources(&self.hdr_target, 0, 1));
        Ok(())
    }

    fn setup(&mut self, registry: &ResourceRegistryView<'_>) -> Result<()> {
        self.hdr = Some(registry.texture(&self.hdr_target)?);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<PassReturn> {
        let Some(hdr) = &self.hdr else {
            return Ok(PassReturn::default());
        };
        ctx.list.bind_pipeline(&self.pipeline)?;
        ctx.list.push_constants(
            ShaderStages::COMPUTE,
            RootParam::MiscUint,
            0,
            bytes_of(&[hdr.uav_slot(0, 0), 0u32, 0u32, 0u32]),
        )?;
        ctx.list
            .dispatch(hdr.width().div_ceil(8), hdr.height().div_ceil(8), 1)?;
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hdr_target.hash(&mut hasher);
        hash_pipeline(&mut hasher, &self.pipeline);
        hasher.finish()
    }

    fn cleanup(&mut self) {
        self.hdr = None;
    }
}
