//! Render graph integration: compile + execute against the mock device,
//! covering read-after-write batching, per-mip bloom transitions and the
//! loop-back guarantee.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use nebula_3d_engine::ecs::World;
use nebula_3d_engine::managers::Managers;
use nebula_3d_engine::render_graph::{
    ExecutionContext, PassBuilder, PassContext, PassReturn, RenderGraph, RenderPass,
    ResourceSelector,
};
use nebula_3d_engine::resources::{
    DeletionManager, FrameTick, GpuServices, PixelBuffer, ResourceManager, TextureDescription,
    UploadManager,
};
use nebula_3d_engine::rhi::mock_device::MockDevice;
use nebula_3d_engine::rhi::{Device, Format, ResourceState, SamplerDesc, SubresourceRange};
use nebula_3d_engine::settings::SettingsStore;

struct RecordingPass {
    name: &'static str,
    usages: Vec<(ResourceSelector, ResourceState)>,
    executed: Arc<AtomicU32>,
}

impl RenderPass for RecordingPass {
    fn name(&self) -> &str {
        self.name
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> nebula_3d_engine::Result<()> {
        for (selector, state) in &self.usages {
            match state {
                ResourceState::AllSrv => builder.with_shader_resource(selector.clone()),
                ResourceState::RenderTarget => builder.with_render_target(selector.clone()),
                ResourceState::PixelSrv => builder.with_pixel_shader_resource(selector.clone()),
                other => panic!("unexpected state {:?}", other),
            };
        }
        Ok(())
    }

    fn execute(&mut self, _ctx: &mut PassContext<'_>) -> nebula_3d_engine::Result<PassReturn> {
        self.executed.fetch_add(1, Ordering::Relaxed);
        Ok(PassReturn::default())
    }
}

struct Fixture {
    device: Arc<Mutex<dyn Device>>,
    resources: ResourceManager,
    upload: UploadManager,
    deletion: DeletionManager,
    managers: Managers,
    world: World,
    settings: SettingsStore,
}

impl Fixture {
    fn new() -> Self {
        let device: Arc<Mutex<dyn Device>> = Arc::new(Mutex::new(MockDevice::new()));
        let mut resources = ResourceManager::new(device.clone(), 2).unwrap();
        let mut upload = UploadManager::new(device.clone(), 2).unwrap();
        let mut deletion = DeletionManager::new(2);
        let settings = SettingsStore::default();
        let managers = {
            let mut gpu = GpuServices {
                resources: &mut resources,
                upload: &mut upload,
                deletion: &mut deletion,
                tick: FrameTick { frame: 0, slot: 0 },
            };
            Managers::new(&mut gpu, &settings).unwrap()
        };
        Self {
            device,
            resources,
            upload,
            deletion,
            managers,
            world: World::new(),
            settings,
        }
    }

    fn hdr(&mut self, mips: u32) -> Arc<PixelBuffer> {
        self.resources
            .create_texture(
                &TextureDescription {
                    width: 128,
                    height: 128,
                    mip_levels: mips,
                    array_layers: 1,
                    cubemap: false,
                    format: Format::R16G16B16A16_FLOAT,
                    has_srv: true,
                    has_uav: false,
                    has_rtv: true,
                    has_dsv: false,
                    per_mip_srvs: true,
                    initial_state: ResourceState::Common,
                    sampler: Some(SamplerDesc::default()),
                    name: "HDRTarget".to_string(),
                },
                &[],
            )
            .unwrap()
    }

    fn execute(&mut self, graph: &mut RenderGraph, frame: u64) {
        graph.prepare(&self.world).unwrap();
        let mut ctx = ExecutionContext {
            world: &self.world,
            managers: &self.managers,
            frame: FrameTick {
                frame,
                slot: (frame % 2) as usize,
            },
            settings: self.settings.snapshot(),
        };
        graph.execute(&mut ctx).unwrap();
    }
}

// S1: Pass A writes HDR as render target, pass B reads it as SRV. Compile
// yields two batches with one transition between them; the loop-back batch
// returns HDR to its initial state.
#[test]
fn test_read_after_write_round_trip() {
    let mut fixture = Fixture::new();
    let hdr = fixture.hdr(1);

    let mut graph = RenderGraph::new(fixture.device.clone());
    graph.setup(2).unwrap();
    graph.register_texture("HDR", hdr.clone()).unwrap();

    let executed = Arc::new(AtomicU32::new(0));
    graph
        .add_pass(
            Box::new(RecordingPass {
                name: "writer",
                usages: vec![("HDR".into(), ResourceState::RenderTarget)],
                executed: executed.clone(),
            }),
            "writer",
        )
        .unwrap();
    graph
        .add_pass(
            Box::new(RecordingPass {
                name: "reader",
                usages: vec![("HDR".into(), ResourceState::AllSrv)],
                executed: executed.clone(),
            }),
            "reader",
        )
        .unwrap();

    fixture.execute(&mut graph, 1);
    assert_eq!(executed.load(Ordering::Relaxed), 2);

    let batches = graph.batches();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[1].transitions.len(), 1);
    assert_eq!(batches[1].transitions[0].from, ResourceState::RenderTarget);
    assert_eq!(batches[1].transitions[0].to, ResourceState::AllSrv);

    // S5: after a frame, the tracked state equals the initial state
    assert_eq!(
        hdr.state().uniform_state(&hdr.whole_range()),
        Some(ResourceState::Common)
    );

    // Re-execution is safe: the loop-back returned everything home
    fixture.execute(&mut graph, 2);
    assert_eq!(executed.load(Ordering::Relaxed), 4);
}

// S2: the bloom chain declares per-mip subresources; compilation produces
// one batch per down-sample with per-mip transitions only.
#[test]
fn test_bloom_chain_subresource_batches() {
    let mut fixture = Fixture::new();
    let hdr = fixture.hdr(5);

    let mut graph = RenderGraph::new(fixture.device.clone());
    graph.setup(2).unwrap();
    graph.register_texture("HDR", hdr.clone()).unwrap();

    let executed = Arc::new(AtomicU32::new(0));
    for mip in 0..4u32 {
        let name: &'static str = Box::leak(format!("downsample{}", mip).into_boxed_str());
        graph
            .add_pass(
                Box::new(RecordingPass {
                    name,
                    usages: vec![
                        (
                            ResourceSelector {
                                name: "HDR".to_string(),
                                range: SubresourceRange::mips(mip, 1),
                            },
                            ResourceState::PixelSrv,
                        ),
                        (
                            ResourceSelector {
                                name: "HDR".to_string(),
                                range: SubresourceRange::mips(mip + 1, 1),
                            },
                            ResourceState::RenderTarget,
                        ),
                    ],
                    executed: executed.clone(),
                }),
                name,
            )
            .unwrap();
    }

    fixture.execute(&mut graph, 1);
    assert_eq!(executed.load(Ordering::Relaxed), 4);

    // One batch per down-sample plus the loop-back
    let batches = graph.batches();
    assert_eq!(batches.len(), 5);
    for batch in batches {
        for transition in &batch.transitions {
            assert_eq!(transition.range.mip_count, 1);
        }
    }

    // The whole chain loops back to Common
    assert_eq!(
        hdr.state().uniform_state(&hdr.whole_range()),
        Some(ResourceState::Common)
    );
}
