/// Concrete render passes
///
/// Every pass follows the `RenderPass` contract: declare usage, resolve
/// pointers at setup, record at execute. Pass inputs are plain structs with
/// a stable hash so the graph's input-hash cache can skip re-declaration.

pub mod skinning;
pub mod zprepass;
pub mod gbuffer;
pub mod shadow;
pub mod light_binning;
pub mod gtao;
pub mod deferred;
pub mod forward;
pub mod ppll;
pub mod bloom;
pub mod cluster;
pub mod debug;

pub use skinning::SkinningComputePass;
pub use zprepass::ZPrepass;
pub use gbuffer::GBufferPass;
pub use shadow::ShadowPass;
pub use light_binning::LightBinningPass;
pub use gtao::GtaoPass;
pub use deferred::DeferredLightingPass;
pub use forward::ForwardPass;
pub use ppll::{PpllFillPass, PpllResolvePass};
pub use bloom::{BloomBlendPass, BloomDownsamplePass, BloomUpsamplePass};
pub use cluster::{ClusterCullingPass, ClusterRasterizationPass};
pub use debug::DebugOverlayPass;

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bytemuck::bytes_of;
use rustc_hash::FxHasher;
use slotmap::Key;

use crate::error::Result;
use crate::managers::ViewId;
use crate::material::CompileFlags;
use crate::render_graph::PassContext;
use crate::rhi::{
    CommandList, IndirectCommandKind, PipelineHandle, RootParam, ShaderStages,
};

/// Stable hash of a pipeline map entry set
pub(crate) fn hash_pipelines(
    hasher: &mut FxHasher,
    pipelines: &rustc_hash::FxHashMap<CompileFlags, Arc<dyn PipelineHandle>>,
) {
    let mut keys: Vec<_> = pipelines.keys().copied().collect();
    keys.sort();
    for key in keys {
        key.0.hash(hasher);
        if let Some(p) = pipelines.get(&key) {
            (Arc::as_ptr(p) as *const () as usize).hash(hasher);
        }
    }
}

pub(crate) fn hash_view(hasher: &mut FxHasher, view: ViewId) {
    view.data().as_ffi().hash(hasher);
}

pub(crate) fn hash_pipeline(hasher: &mut FxHasher, pipeline: &Arc<dyn PipelineHandle>) {
    (Arc::as_ptr(pipeline) as *const () as usize).hash(hasher);
}

/// Push the View root parameter: (light/camera buffer index, view info index)
pub(crate) fn push_view_constants(
    list: &mut dyn CommandList,
    buffer_index: u32,
    view_info_index: u32,
) -> Result<()> {
    list.push_constants(
        ShaderStages::ALL,
        RootParam::View,
        0,
        bytes_of(&[buffer_index, view_info_index]),
    )
}

/// Push the Settings root parameter from the frame's settings snapshot
pub(crate) fn push_settings_constants(ctx: &mut PassContext<'_>) -> Result<()> {
    let values = [
        u32::from(ctx.settings.enable_shadows),
        u32::from(ctx.settings.enable_punctual_lighting),
        u32::from(ctx.settings.enable_gtao),
    ];
    ctx.list
        .push_constants(ShaderStages::ALL, RootParam::Settings, 0, bytes_of(&values))
}

/// Execute every indirect workload registered for (view, phase): one
/// pipeline bind plus one `execute_indirect` per compile-flag set, counted
/// by the workload's UAV counter.
pub(crate) fn execute_phase_workloads(
    ctx: &mut PassContext<'_>,
    view: ViewId,
    phase: crate::ecs::RenderPhase,
    pipelines: &rustc_hash::FxHashMap<CompileFlags, Arc<dyn PipelineHandle>>,
) -> Result<()> {
    for (compile_flags, workload) in ctx.managers.indirect.buffers_for_render_phase(view, phase) {
        let Some(pipeline) = pipelines.get(&compile_flags) else {
            crate::engine_warn!("nebula3d::RenderPasses",
                "no pipeline for phase {} compile flags {:#x}", phase.name, compile_flags.0);
            continue;
        };
        ctx.list.bind_pipeline(pipeline)?;
        ctx.list.execute_indirect(
            IndirectCommandKind::DispatchMesh,
            crate::managers::indirect_commands::INDIRECT_COMMAND_STRIDE,
            workload.buffer.handle(),
            0,
            Some((workload.buffer.handle(), workload.counter_offset())),
            workload.capacity,
        )?;
    }
    Ok(())
}

/// Draw a fullscreen triangle (3 vertices, no buffers)
pub(crate) fn draw_fullscreen(list: &mut dyn CommandList) -> Result<()> {
    list.draw(3, 1, 0, 0)
}

/// Build-time resolver over every `IsIndirectArguments` entity's buffer
pub(crate) fn indirect_arguments_resolver() -> crate::render_graph::EcsResourceResolver {
    use crate::ecs::components::{IndirectArgumentsRef, IsIndirectArguments};
    Box::new(|world| {
        world
            .query2::<IsIndirectArguments, IndirectArgumentsRef>()
            .into_iter()
            .filter_map(|entity| {
                world
                    .get::<IndirectArgumentsRef>(entity)
                    .map(|r| crate::render_graph::GraphResource::Buffer(r.0.clone()))
            })
            .collect()
    })
}

/// Build-time resolver over every shadow-casting light's depth targets
pub(crate) fn shadow_map_resolver(
    include_linear: bool,
) -> crate::render_graph::EcsResourceResolver {
    use crate::ecs::components::DepthMap;
    Box::new(move |world| {
        let mut out = Vec::new();
        for entity in world.query1::<DepthMap>() {
            if let Some(map) = world.get::<DepthMap>(entity) {
                out.push(crate::render_graph::GraphResource::Texture(map.depth.clone()));
                if include_linear {
                    out.push(crate::render_graph::GraphResource::Texture(
                        map.linear_depth.clone(),
                    ));
                }
            }
        }
        out
    })
}

/// Build-time resolver over the linearized shadow depth targets only
pub(crate) fn shadow_linear_depth_resolver() -> crate::render_graph::EcsResourceResolver {
    use crate::ecs::components::DepthMap;
    Box::new(|world| {
        world
            .query1::<DepthMap>()
            .into_iter()
            .filter_map(|entity| {
                world.get::<DepthMap>(entity).map(|map| {
                    crate::render_graph::GraphResource::Texture(map.linear_depth.clone())
                })
            })
            .collect()
    })
}
