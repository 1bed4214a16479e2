use super::*;
use crate::resources::BufferCreateInfo;
use crate::rhi::mock_device::MockBuffer;
use crate::test_support::Harness;

#[test]
fn test_upload_lands_in_destination_after_processing() {
    let mut harness = Harness::new();
    let dest = harness
        .resources
        .create_buffer(&BufferCreateInfo::structured(64, 4, "Dest"))
        .unwrap();

    let tick = crate::resources::FrameTick { frame: 1, slot: 1 };
    let payload = [7u8, 8, 9, 10];
    harness
        .upload
        .upload(&mut harness.deletion, tick, &payload, &dest, FrameReplication::Once, 16)
        .unwrap();
    harness.upload.process_uploads(1, None).unwrap();

    // MockCommandList moved real bytes through the ring
    let mock = dest.handle().as_any().downcast_ref::<MockBuffer>().unwrap();
    assert_eq!(&mock.bytes()[16..20], &payload);
}

#[test]
fn test_ring_ranges_release_only_after_frame_completes() {
    let mut harness = Harness::new();
    let dest = harness
        .resources
        .create_buffer(&BufferCreateInfo::structured(256, 1, "Dest"))
        .unwrap();

    let tick = crate::resources::FrameTick { frame: 1, slot: 0 };
    harness
        .upload
        .upload(&mut harness.deletion, tick, &[1u8; 100], &dest, FrameReplication::Once, 0)
        .unwrap();
    assert_eq!(harness.upload.reserved_bytes(), 100);

    // Processing submits the copy but keeps the range reserved
    harness.upload.process_uploads(0, None).unwrap();
    assert_eq!(harness.upload.reserved_bytes(), 100);

    // The fence for frame 1 clears -> the range frees
    harness.upload.on_frame_complete(0);
    assert_eq!(harness.upload.reserved_bytes(), 0);
}

#[test]
fn test_all_frames_replication_queues_into_every_slot() {
    let mut harness = Harness::new();
    let dest = harness
        .resources
        .create_buffer(&BufferCreateInfo::structured(16, 4, "PerFrameCB"))
        .unwrap();

    let tick = crate::resources::FrameTick { frame: 1, slot: 0 };
    harness
        .upload
        .upload(
            &mut harness.deletion,
            tick,
            &[3u8; 16],
            &dest,
            FrameReplication::AllFrames,
            0,
        )
        .unwrap();

    // The ring range stays reserved until every frame queue has consumed it
    harness.upload.process_uploads(0, None).unwrap();
    harness.upload.on_frame_complete(0);
    assert_eq!(harness.upload.reserved_bytes(), 16);

    harness.upload.process_uploads(1, None).unwrap();
    harness.upload.on_frame_complete(1);
    assert_eq!(harness.upload.reserved_bytes(), 16);

    harness.upload.process_uploads(2, None).unwrap();
    harness.upload.on_frame_complete(2);
    assert_eq!(harness.upload.reserved_bytes(), 0);
}

#[test]
fn test_ring_grows_and_parks_old_buffer() {
    let mut harness = Harness::new();
    let dest = harness
        .resources
        .create_buffer(&BufferCreateInfo::structured(256 * 1024, 1, "Big"))
        .unwrap();

    let tick = crate::resources::FrameTick { frame: 1, slot: 0 };
    let initial_capacity = harness.upload.capacity();
    let big = vec![5u8; initial_capacity as usize + 1];
    harness
        .upload
        .upload(&mut harness.deletion, tick, &big, &dest, FrameReplication::Once, 0)
        .unwrap();

    assert!(harness.upload.capacity() > initial_capacity);
    assert_eq!(harness.deletion.pending(), 1);

    // The queued update still copies out of the old ring
    harness.upload.process_uploads(0, None).unwrap();
    let mock = dest.handle().as_any().downcast_ref::<MockBuffer>().unwrap();
    assert_eq!(mock.bytes()[initial_capacity as usize], 5);
}

#[test]
fn test_queued_resource_copy_moves_bytes() {
    let mut harness = Harness::new();
    let src = harness
        .resources
        .create_buffer(&BufferCreateInfo::structured(32, 4, "Src"))
        .unwrap();
    let dst = harness
        .resources
        .create_buffer(&BufferCreateInfo::structured(32, 4, "Dst"))
        .unwrap();

    // Seed the source through an upload first
    let tick = crate::resources::FrameTick { frame: 1, slot: 0 };
    harness
        .upload
        .upload(&mut harness.deletion, tick, &[9u8; 32], &src, FrameReplication::Once, 0)
        .unwrap();
    harness.upload.process_uploads(0, None).unwrap();

    harness.upload.queue_resource_copy(dst.clone(), src, 32);
    harness.upload.execute_resource_copies(0).unwrap();

    let mock = dst.handle().as_any().downcast_ref::<MockBuffer>().unwrap();
    assert_eq!(mock.bytes(), vec![9u8; 32]);
}
