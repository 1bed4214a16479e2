use super::*;
use crate::ecs::World;
use crate::error::Error;
use crate::render_graph::builder::{PassBuilder, ResourceSelector};
use crate::render_graph::pass::{PassContext, PassReturn, RenderPass};
use crate::render_graph::registry::ResourceRegistryView;
use crate::resources::{ResourceManager, TextureDescription};
use crate::rhi::{Format, ResourceState, SamplerDesc, SubresourceRange};
use crate::test_support::mock_device;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Minimal pass declaring a fixed usage list
struct TestPass {
    name: &'static str,
    usages: Vec<(ResourceSelector, ResourceState)>,
    inputs_hash: u64,
    declare_count: Arc<AtomicU32>,
    execute_count: Arc<AtomicU32>,
}

impl TestPass {
    fn new(name: &'static str, usages: Vec<(ResourceSelector, ResourceState)>) -> Box<Self> {
        Box::new(Self {
            name,
            usages,
            inputs_hash: 0,
            declare_count: Arc::new(AtomicU32::new(0)),
            execute_count: Arc::new(AtomicU32::new(0)),
        })
    }
}

impl RenderPass for TestPass {
    fn name(&self) -> &str {
        self.name
    }

    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> crate::error::Result<()> {
        self.declare_count.fetch_add(1, Ordering::Relaxed);
        for (selector, state) in &self.usages {
            match state {
                ResourceState::AllSrv => builder.with_shader_resource(selector.clone()),
                ResourceState::NonPixelSrv => {
                    builder.with_non_pixel_shader_resource(selector.clone())
                }
                ResourceState::PixelSrv => builder.with_pixel_shader_resource(selector.clone()),
                ResourceState::RenderTarget => builder.with_render_target(selector.clone()),
                ResourceState::DepthWrite => builder.with_depth_read_write(selector.clone()),
                ResourceState::UnorderedAccess => {
                    builder.with_unordered_access(selector.clone())
                }
                ResourceState::CopySource => builder.with_copy_source(selector.clone()),
                ResourceState::CopyDest => builder.with_copy_dest(selector.clone()),
                other => panic!("untested state {:?}", other),
            };
        }
        Ok(())
    }

    fn setup(&mut self, _registry: &ResourceRegistryView<'_>) -> crate::error::Result<()> {
        Ok(())
    }

    fn execute(&mut self, _ctx: &mut PassContext<'_>) -> crate::error::Result<PassReturn> {
        self.execute_count.fetch_add(1, Ordering::Relaxed);
        Ok(PassReturn::default())
    }

    fn inputs_hash(&self) -> u64 {
        self.inputs_hash
    }
}

fn hdr_texture(rm: &mut ResourceManager, mips: u32) -> Arc<crate::resources::PixelBuffer> {
    rm.create_texture(
        &TextureDescription {
            width: 256,
            height: 256,
            mip_levels: mips,
            array_layers: 1,
            cubemap: false,
            format: Format::R16G16B16A16_FLOAT,
            has_srv: true,
            has_uav: true,
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

fn selector(name: &str) -> ResourceSelector {
    ResourceSelector::from(name)
}

fn graph_with_hdr(mips: u32) -> (RenderGraph, World) {
    let device = mock_device();
    let mut rm = ResourceManager::new(device.clone(), 3).unwrap();
    let hdr = hdr_texture(&mut rm, mips);
    let mut graph = RenderGraph::new(device);
    graph.register_texture("HDR", hdr).unwrap();
    (graph, World::new())
}

// ============================================================================
// Registration errors
// ============================================================================

#[test]
fn test_duplicate_resource_registration_fails() {
    let device = mock_device();
    let mut rm = ResourceManager::new(device.clone(), 3).unwrap();
    let a = hdr_texture(&mut rm, 1);
    let b = hdr_texture(&mut rm, 1);
    let mut graph = RenderGraph::new(device);
    graph.register_texture("HDR", a).unwrap();
    assert!(matches!(
        graph.register_texture("HDR", b),
        Err(Error::DuplicateResource(_))
    ));
}

#[test]
fn test_missing_resource_fails_compile() {
    let (mut graph, world) = graph_with_hdr(1);
    graph
        .add_pass(
            TestPass::new("reads-ghost", vec![(selector("Ghost"), ResourceState::AllSrv)]),
            "reads-ghost",
        )
        .unwrap();
    assert!(matches!(
        graph.prepare(&world),
        Err(Error::MissingResource(_))
    ));
}

#[test]
fn test_conflicting_intents_within_one_pass_fail() {
    let (mut graph, world) = graph_with_hdr(1);
    graph
        .add_pass(
            TestPass::new(
                "conflicted",
                vec![
                    (selector("HDR"), ResourceState::RenderTarget),
                    (selector("HDR"), ResourceState::AllSrv),
                ],
            ),
            "conflicted",
        )
        .unwrap();
    assert!(matches!(graph.prepare(&world), Err(Error::UsageConflict(_))));
}

#[test]
fn test_duplicate_pass_names_are_rejected() {
    let (mut graph, _world) = graph_with_hdr(1);
    graph
        .add_pass(TestPass::new("p", vec![]), "p")
        .unwrap();
    assert!(matches!(
        graph.add_pass(TestPass::new("p", vec![]), "p"),
        Err(Error::DuplicateResource(_))
    ));
}

// ============================================================================
// Batching
// ============================================================================

#[test]
fn test_write_then_read_splits_batches_with_one_transition() {
    let (mut graph, world) = graph_with_hdr(1);
    graph
        .add_pass(
            TestPass::new("writes", vec![(selector("HDR"), ResourceState::RenderTarget)]),
            "writes",
        )
        .unwrap();
    graph
        .add_pass(
            TestPass::new("reads", vec![(selector("HDR"), ResourceState::AllSrv)]),
            "reads",
        )
        .unwrap();
    graph.prepare(&world).unwrap();

    // Two pass batches plus the loop-back batch
    let batches = graph.batches();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0].pass_indices, vec![0]);
    assert_eq!(batches[1].pass_indices, vec![1]);

    // HDR starts Common: first batch transitions Common -> RenderTarget
    assert_eq!(batches[0].transitions.len(), 1);
    assert_eq!(batches[0].transitions[0].from, ResourceState::Common);
    assert_eq!(batches[0].transitions[0].to, ResourceState::RenderTarget);

    // Between the batches: RenderTarget -> AllSrv
    assert_eq!(batches[1].transitions.len(), 1);
    assert_eq!(batches[1].transitions[0].from, ResourceState::RenderTarget);
    assert_eq!(batches[1].transitions[0].to, ResourceState::AllSrv);

    // Loop-back returns to the initial state
    let last = &batches[2];
    assert!(last.pass_indices.is_empty());
    assert_eq!(last.transitions.len(), 1);
    assert_eq!(last.transitions[0].from, ResourceState::AllSrv);
    assert_eq!(last.transitions[0].to, ResourceState::Common);
}

#[test]
fn test_compatible_reads_share_a_batch() {
    let (mut graph, world) = graph_with_hdr(1);
    graph
        .add_pass(
            TestPass::new("compute-read", vec![(selector("HDR"), ResourceState::NonPixelSrv)]),
            "compute-read",
        )
        .unwrap();
    graph
        .add_pass(
            TestPass::new("pixel-read", vec![(selector("HDR"), ResourceState::PixelSrv)]),
            "pixel-read",
        )
        .unwrap();
    graph.prepare(&world).unwrap();

    // The SRV sub-states compose: one batch, merged to ALL_SRV
    let batches = graph.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].pass_indices, vec![0, 1]);
    let id = graph.registry().lookup("HDR").unwrap();
    let states = batches[0].states_of(id);
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].1, ResourceState::AllSrv);
}

#[test]
fn test_bloom_chain_batches_per_mip() {
    let (mut graph, world) = graph_with_hdr(4);
    // D0 reads mip 0, writes mip 1; D1 reads mip 1, writes mip 2; ...
    for mip in 0..3u32 {
        let read = ResourceSelector {
            name: "HDR".to_string(),
            range: SubresourceRange::mips(mip, 1),
        };
        let write = ResourceSelector {
            name: "HDR".to_string(),
            range: SubresourceRange::mips(mip + 1, 1),
        };
        let name: &'static str = Box::leak(format!("down{}", mip).into_boxed_str());
        graph
            .add_pass(
                TestPass::new(
                    name,
                    vec![(read, ResourceState::PixelSrv), (write, ResourceState::RenderTarget)],
                ),
                name,
            )
            .unwrap();
    }
    graph.prepare(&world).unwrap();

    // Each downsample conflicts with the previous one's written mip, so
    // one batch per pass plus the loop-back
    let batches = graph.batches();
    assert_eq!(batches.len(), 4);

    // Transitions stay per-mip: no transition covers more than one mip
    for batch in batches {
        for transition in &batch.transitions {
            assert_eq!(transition.range.mip_count, 1, "full-resource transition leaked in");
        }
    }
}

// ============================================================================
// Input-hash caching
// ============================================================================

#[test]
fn test_unchanged_inputs_skip_redeclaration() {
    let (mut graph, world) = graph_with_hdr(1);
    let pass = TestPass::new("cached", vec![(selector("HDR"), ResourceState::AllSrv)]);
    let declare_count = pass.declare_count.clone();
    graph.add_pass(pass, "cached").unwrap();

    assert!(graph.prepare(&world).unwrap());
    assert_eq!(declare_count.load(Ordering::Relaxed), 1);

    // Same inputs: no re-declaration, no recompilation
    assert!(!graph.prepare(&world).unwrap());
    assert_eq!(declare_count.load(Ordering::Relaxed), 1);
}

// ============================================================================
// State write-back (compile-time authoritative update)
// ============================================================================

#[test]
fn test_compile_leaves_tracked_state_at_loop_back_target() {
    let device = mock_device();
    let mut rm = ResourceManager::new(device.clone(), 3).unwrap();
    let hdr = hdr_texture(&mut rm, 1);
    let mut graph = RenderGraph::new(device);
    graph.register_texture("HDR", hdr.clone()).unwrap();
    graph
        .add_pass(
            TestPass::new("writes", vec![(selector("HDR"), ResourceState::RenderTarget)]),
            "writes",
        )
        .unwrap();
    let world = World::new();
    graph.prepare(&world).unwrap();

    // After compile + loop-back, the tracked state equals the initial state
    assert_eq!(
        hdr.state().uniform_state(&hdr.whole_range()),
        Some(ResourceState::Common)
    );
}
