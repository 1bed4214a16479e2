use super::*;
use crate::camera::CameraInfo;
use crate::ecs::World;
use crate::managers::{Managers, ViewFlags};
use crate::render_graph::{PassContext, RenderPass, ResourceRegistry};
use crate::resources::{BufferCreateInfo, FrameTick, TextureDescription};
use crate::rhi::mock_device::{MockBuffer, MockCommandList};
use crate::rhi::{BufferUsage, Format, HeapType, ResourceState};
use crate::settings::SettingsStore;
use crate::test_support::Harness;

// Property: the fill pass resets the head-pointer buffer to 0xFFFFFFFF and
// the node counter to 0 exactly once per frame, before any append.
#[test]
fn test_fill_pass_resets_head_and_counter_before_appends() {
    let mut harness = Harness::new();
    let settings = SettingsStore::default();
    let mut managers = {
        let mut gpu = harness.gpu(1);
        Managers::new(&mut gpu, &settings).unwrap()
    };
    let view = {
        let mut gpu = harness.gpu(1);
        managers
            .views
            .create_view(&mut gpu, &CameraInfo::default(), ViewFlags::PRIMARY_CAMERA)
            .unwrap()
    };

    let depth = harness
        .resources
        .create_texture(
            &TextureDescription {
                width: 16,
                height: 16,
                mip_levels: 1,
                array_layers: 1,
                cubemap: false,
                format: Format::D32_FLOAT,
                has_srv: true,
                has_uav: false,
                has_rtv: false,
                has_dsv: true,
                per_mip_srvs: false,
                initial_state: ResourceState::DepthWrite,
                sampler: None,
                name: "Depth".to_string(),
            },
            &[],
        )
        .unwrap();
    let head = harness
        .resources
        .create_buffer(&BufferCreateInfo {
            size: 16 * 16 * 4,
            heap: HeapType::Default,
            usage: BufferUsage::STORAGE,
            element_size: 4,
            wants_srv: true,
            wants_uav: true,
            wants_cbv: false,
            with_counter: false,
            initial_state: ResourceState::UnorderedAccess,
            name: "PPLLHeads".to_string(),
        })
        .unwrap();
    let nodes = harness
        .resources
        .create_buffer(&BufferCreateInfo {
            size: 1024 * 16,
            heap: HeapType::Default,
            usage: BufferUsage::STORAGE,
            element_size: 16,
            wants_srv: true,
            wants_uav: true,
            wants_cbv: false,
            with_counter: true,
            initial_state: ResourceState::UnorderedAccess,
            name: "PPLLNodes".to_string(),
        })
        .unwrap();

    let mut registry = ResourceRegistry::new();
    registry.register_texture("Depth", depth).unwrap();
    registry.register_buffer("PPLLHeads", head.clone()).unwrap();
    registry.register_buffer("PPLLNodes", nodes.clone()).unwrap();

    let mut pass = PpllFillPass::new(PpllFillInputs {
        view,
        depth_target: "Depth".to_string(),
        head_buffer: "PPLLHeads".to_string(),
        node_buffer: "PPLLNodes".to_string(),
        pipelines: Default::default(),
    });
    pass.setup(&registry.view()).unwrap();

    // Seed the counter with garbage so the reset is observable
    {
        let mock = nodes.handle().as_any().downcast_ref::<MockBuffer>().unwrap();
        let counter_offset = nodes.counter_offset().unwrap() as usize;
        mock.data.lock().unwrap()[counter_offset..counter_offset + 4]
            .copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
    }

    let device = harness.resources.device().clone();
    let mut list = device
        .lock()
        .unwrap()
        .create_command_list(crate::rhi::QueueKind::Graphics)
        .unwrap();
    list.begin().unwrap();
    let world = World::new();
    let settings_snapshot = settings.snapshot();
    let registry_view = registry.view();
    let mut ctx = PassContext {
        list: list.as_mut(),
        world: &world,
        managers: &managers,
        registry: &registry_view,
        frame: FrameTick { frame: 1, slot: 0 },
        settings: &settings_snapshot,
    };
    pass.execute(&mut ctx).unwrap();
    list.end().unwrap();

    // Every head entry is 0xFFFFFFFF
    let head_mock = head.handle().as_any().downcast_ref::<MockBuffer>().unwrap();
    for word in head_mock.bytes().chunks_exact(4) {
        assert_eq!(u32::from_le_bytes([word[0], word[1], word[2], word[3]]), u32::MAX);
    }

    // The node counter is 0 again
    let nodes_mock = nodes.handle().as_any().downcast_ref::<MockBuffer>().unwrap();
    let counter_offset = nodes.counter_offset().unwrap() as usize;
    let counter_bytes = &nodes_mock.bytes()[counter_offset..counter_offset + 4];
    assert_eq!(u32::from_le_bytes(counter_bytes.try_into().unwrap()), 0);

    // Exactly one reset of each, recorded before the pass begins (so before
    // any append the rasterized fragments could issue)
    let commands = &list
        .as_any_mut()
        .downcast_mut::<MockCommandList>()
        .unwrap()
        .commands;
    let fills: Vec<usize> = commands
        .iter()
        .enumerate()
        .filter(|(_, c)| c.starts_with("fill_buffer"))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(fills.len(), 2, "head + counter reset exactly once");
    let begin_pass = commands
        .iter()
        .position(|c| c.starts_with("begin_pass"))
        .expect("pass begins");
    assert!(fills.iter().all(|&i| i < begin_pass));
}
