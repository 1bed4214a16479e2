use super::*;
use crate::resources::BufferCreateInfo;
use crate::test_support::Harness;

#[test]
fn test_resources_survive_their_flight_window() {
    let mut harness = Harness::new();
    let buffer = harness
        .resources
        .create_buffer(&BufferCreateInfo::structured(64, 4, "Doomed"))
        .unwrap();
    let handle = buffer.handle().clone();
    let weak = std::sync::Arc::downgrade(&handle);
    drop(handle);

    let mut deletion = DeletionManager::new(3);
    deletion.mark_for_delete(DeferredRelease::EngineBuffer(buffer), 5);

    // Frames 5..7: still parked, the handle stays alive
    for frame in 5..8 {
        assert_eq!(deletion.process(frame), 0, "released too early at frame {}", frame);
        assert!(weak.upgrade().is_some());
    }

    // Frame 8 = 5 + 3: released and dropped
    assert_eq!(deletion.process(8), 1);
    assert!(weak.upgrade().is_none());
    assert_eq!(deletion.pending(), 0);
}

#[test]
fn test_drain_drops_everything() {
    let mut harness = Harness::new();
    let mut deletion = DeletionManager::new(3);
    for i in 0..4 {
        let buffer = harness
            .resources
            .create_buffer(&BufferCreateInfo::structured(16, 4, format!("B{}", i)))
            .unwrap();
        deletion.mark_for_delete(DeferredRelease::EngineBuffer(buffer), i);
    }
    assert_eq!(deletion.pending(), 4);
    deletion.drain();
    assert_eq!(deletion.pending(), 0);
}
