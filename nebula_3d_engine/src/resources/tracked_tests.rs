use super::*;
use crate::rhi::{ResourceState, SubresourceRange};

fn mips(first: u32, count: u32) -> SubresourceRange {
    SubresourceRange {
        first_mip: first,
        mip_count: count,
        first_slice: 0,
        slice_count: 1,
    }
}

#[test]
fn test_new_tracks_whole_resource_in_initial_state() {
    let tracked = TrackedState::new(mips(0, 6), ResourceState::Common);
    assert_eq!(tracked.uniform_state(&mips(0, 6)), Some(ResourceState::Common));
    assert_eq!(tracked.initial_state(), ResourceState::Common);
}

#[test]
fn test_set_splits_overlapping_range() {
    let tracked = TrackedState::new(mips(0, 6), ResourceState::Common);
    tracked.set(&mips(2, 2), ResourceState::RenderTarget);

    // Mips 2-3 transitioned; the rest stayed
    assert_eq!(tracked.uniform_state(&mips(2, 2)), Some(ResourceState::RenderTarget));
    assert_eq!(tracked.uniform_state(&mips(0, 2)), Some(ResourceState::Common));
    assert_eq!(tracked.uniform_state(&mips(4, 2)), Some(ResourceState::Common));
    // Spanning both regions is not uniform
    assert_eq!(tracked.uniform_state(&mips(1, 3)), None);
}

#[test]
fn test_query_clips_to_requested_range() {
    let tracked = TrackedState::new(mips(0, 8), ResourceState::AllSrv);
    tracked.set(&mips(4, 4), ResourceState::RenderTarget);

    let pieces = tracked.query(&mips(3, 2));
    assert_eq!(pieces.len(), 2);
    let total: u32 = pieces.iter().map(|(r, _)| r.mip_count).sum();
    assert_eq!(total, 2);
}

#[test]
fn test_slice_splitting_keeps_disjoint_pieces() {
    let whole = SubresourceRange {
        first_mip: 0,
        mip_count: 1,
        first_slice: 0,
        slice_count: 6,
    };
    let tracked = TrackedState::new(whole, ResourceState::DepthWrite);
    let face2 = SubresourceRange::single(0, 2);
    tracked.set(&face2, ResourceState::AllSrv);

    assert_eq!(tracked.uniform_state(&face2), Some(ResourceState::AllSrv));
    assert_eq!(
        tracked.uniform_state(&SubresourceRange::single(0, 1)),
        Some(ResourceState::DepthWrite)
    );
    // The whole resource covers exactly 6 subresources across all pieces
    let pieces = tracked.query(&whole);
    let covered: u32 = pieces.iter().map(|(r, _)| r.subresource_count()).sum();
    assert_eq!(covered, 6);
}

#[test]
fn test_reset_collapses_splits() {
    let tracked = TrackedState::new(mips(0, 4), ResourceState::Common);
    tracked.set(&mips(1, 1), ResourceState::RenderTarget);
    tracked.set(&mips(3, 1), ResourceState::AllSrv);
    tracked.reset(ResourceState::Common);
    assert_eq!(tracked.uniform_state(&mips(0, 4)), Some(ResourceState::Common));
    assert_eq!(tracked.query(&mips(0, 4)).len(), 1);
}
