//! Resource lifetime integration: deletion safety across frames (S4) and
//! descriptor slot stability under churn.

use std::sync::{Arc, Mutex};

use nebula_3d_engine::resources::{
    BufferCreateInfo, DeletionManager, ResourceManager,
};
use nebula_3d_engine::rhi::mock_device::MockDevice;
use nebula_3d_engine::rhi::{DescriptorHeapKind, Device};

fn manager(frames_in_flight: u8) -> (ResourceManager, DeletionManager) {
    let device: Arc<Mutex<dyn Device>> = Arc::new(Mutex::new(MockDevice::new()));
    (
        ResourceManager::new(device, frames_in_flight).unwrap(),
        DeletionManager::new(u64::from(frames_in_flight)),
    )
}

// S4: a resource freed in frame F keeps its descriptor slot parked for
// numFramesInFlight frames; queries inside the window observe the slot in
// the deferred queue.
#[test]
fn test_freed_slot_stays_deferred_for_flight_window() {
    let frames_in_flight = 3u8;
    let (mut resources, mut deletion) = manager(frames_in_flight);

    resources.begin_frame(10);
    let buffer = resources
        .create_buffer(&BufferCreateInfo::structured(256, 16, "Transient"))
        .unwrap();
    let slot = buffer.slots().srv;
    resources.destroy_buffer(buffer, &mut deletion);

    // Frames 11 and 12 (N-1 frames after the free): still deferred
    for frame in 11..13 {
        resources.begin_frame(frame);
        deletion.process(frame);
        assert!(
            resources.descriptor_is_deferred(DescriptorHeapKind::CbvSrvUav, slot),
            "slot {} left the deferred queue at frame {}",
            slot,
            frame
        );
    }

    // Frame 13 = 10 + numFramesInFlight: the slot matures and recycles
    resources.begin_frame(13);
    assert!(!resources.descriptor_is_deferred(DescriptorHeapKind::CbvSrvUav, slot));
    let recycled = resources
        .create_buffer(&BufferCreateInfo::structured(256, 16, "Recycled"))
        .unwrap();
    assert_eq!(recycled.slots().srv, slot);
}

#[test]
fn test_slots_stay_stable_while_other_resources_churn() {
    let (mut resources, mut deletion) = manager(2);
    resources.begin_frame(1);

    let stable = resources
        .create_buffer(&BufferCreateInfo::structured(64, 4, "Stable"))
        .unwrap();
    let stable_slot = stable.slots().srv;

    for frame in 2..10 {
        resources.begin_frame(frame);
        deletion.process(frame);
        let churn = resources
            .create_buffer(&BufferCreateInfo::structured(64, 4, "Churn"))
            .unwrap();
        assert_ne!(churn.slots().srv, stable_slot);
        resources.destroy_buffer(churn, &mut deletion);
    }

    assert_eq!(stable.slots().srv, stable_slot);
}
