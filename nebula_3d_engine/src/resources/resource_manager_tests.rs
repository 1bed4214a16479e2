use super::*;
use crate::resources::{BufferCreateInfo, TextureDescription};
use crate::rhi::{Format, ResourceState, SamplerDesc, INVALID_SLOT};
use crate::test_support::{mock_device, Harness};

fn manager() -> ResourceManager {
    ResourceManager::new(mock_device(), 3).expect("resource manager")
}

// ============================================================================
// Capability gating
// ============================================================================

#[test]
fn test_missing_caps_fail_configuration() {
    use crate::rhi::mock_device::MockDevice;
    use crate::rhi::Device;
    use std::sync::{Arc, Mutex};

    let mut mock = MockDevice::new();
    mock.caps.mesh_shaders = false;
    let device: Arc<Mutex<dyn Device>> = Arc::new(Mutex::new(mock));
    let result = ResourceManager::new(device, 3);
    assert!(matches!(result, Err(crate::error::Error::Configuration(_))));
}

// ============================================================================
// Slot assignment
// ============================================================================

#[test]
fn test_buffer_slots_are_unique_across_live_resources() {
    let mut rm = manager();
    let mut seen = std::collections::HashSet::new();
    for i in 0..16 {
        let info = BufferCreateInfo {
            wants_uav: true,
            ..BufferCreateInfo::structured(64, 4, format!("B{}", i))
        };
        let buffer = rm.create_buffer(&info).unwrap();
        assert!(seen.insert(buffer.slots().srv), "srv slot reused");
        assert!(seen.insert(buffer.slots().uav), "uav slot reused");
    }
}

#[test]
fn test_counter_backed_buffer_places_counter_after_data() {
    let mut rm = manager();
    let info = BufferCreateInfo {
        wants_uav: true,
        with_counter: true,
        ..BufferCreateInfo::structured(1000, 4, "Append")
    };
    let buffer = rm.create_buffer(&info).unwrap();
    let counter = buffer.counter_offset().expect("counter");
    assert!(counter >= 1000);
    assert_eq!(counter % super::super::buffer::COUNTER_PLACEMENT_ALIGNMENT, 0);
    assert_eq!(buffer.handle().size(), counter + 4);
}

#[test]
fn test_texture_gets_per_mip_and_per_slice_slots() {
    let mut rm = manager();
    let texture = rm
        .create_texture(
            &TextureDescription {
                width: 256,
                height: 256,
                mip_levels: 3,
                array_layers: 2,
                cubemap: false,
                format: Format::R16G16B16A16_FLOAT,
                has_srv: true,
                has_uav: true,
                has_rtv: true,
                has_dsv: false,
                per_mip_srvs: true,
                initial_state: ResourceState::AllSrv,
                sampler: Some(SamplerDesc::default()),
                name: "HDR".to_string(),
            },
            &[],
        )
        .unwrap();

    assert_ne!(texture.srv_slot(), INVALID_SLOT);
    for mip in 0..3 {
        assert_ne!(texture.mip_srv_slot(mip), INVALID_SLOT);
        for slice in 0..2 {
            assert_ne!(texture.uav_slot(mip, slice), INVALID_SLOT);
            assert_ne!(texture.rtv_slot(mip, slice), INVALID_SLOT);
        }
    }
    assert_eq!(texture.dsv_slot(0, 0), INVALID_SLOT);
    assert_ne!(texture.sampler_slot(), INVALID_SLOT);
}

#[test]
fn test_dsv_on_color_format_is_rejected() {
    let mut rm = manager();
    let result = rm.create_texture(
        &TextureDescription {
            has_dsv: true,
            ..TextureDescription::sampled_2d(64, 64, Format::R8G8B8A8_UNORM, "NotDepth")
        },
        &[],
    );
    assert!(matches!(result, Err(crate::error::Error::InvalidResource(_))));
}

// ============================================================================
// Sampler deduplication
// ============================================================================

#[test]
fn test_samplers_deduplicate_by_description() {
    let mut rm = manager();
    let a = rm.create_sampler(&SamplerDesc::default()).unwrap();
    let b = rm.create_sampler(&SamplerDesc::default()).unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert_eq!(rm.sampler_count(), 1);

    let different = SamplerDesc {
        lod_max: 4.0,
        ..SamplerDesc::default()
    };
    let c = rm.create_sampler(&different).unwrap();
    assert_ne!(a.slot(), c.slot());
    assert_eq!(rm.sampler_count(), 2);
}

// ============================================================================
// Deferred slot reuse
// ============================================================================

#[test]
fn test_destroyed_buffer_slots_defer_reuse() {
    let mut harness = Harness::new();
    harness.resources.begin_frame(1);
    let buffer = harness
        .resources
        .create_buffer(&BufferCreateInfo::structured(64, 4, "Gone"))
        .unwrap();
    let slot = buffer.slots().srv;

    harness.resources.destroy_buffer(buffer, &mut harness.deletion);
    assert!(harness
        .resources
        .descriptor_is_deferred(crate::rhi::DescriptorHeapKind::CbvSrvUav, slot));

    // Inside the flight window new buffers never receive the old slot
    for frame in 2..4 {
        harness.resources.begin_frame(frame);
        let fresh = harness
            .resources
            .create_buffer(&BufferCreateInfo::structured(64, 4, "Fresh"))
            .unwrap();
        assert_ne!(fresh.slots().srv, slot);
    }

    // After the window the slot recycles
    harness.resources.begin_frame(4);
    assert!(!harness
        .resources
        .descriptor_is_deferred(crate::rhi::DescriptorHeapKind::CbvSrvUav, slot));
}
