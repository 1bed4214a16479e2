use crate::rhi::ResourceState;
use crate::test_support::Harness;

fn pool(harness: &mut Harness, element_size: u32, count: u64) -> super::DynamicBuffer {
    harness
        .resources
        .create_indexed_dynamic_buffer(element_size, count, ResourceState::AllSrv, "TestPool",
            false, false)
        .expect("pool")
}

// ============================================================================
// Allocation accounting (pool bytes == sum of live view sizes)
// ============================================================================

#[test]
fn test_allocated_bytes_match_live_views() {
    let mut harness = Harness::new();
    let mut pool = pool(&mut harness, 16, 64);
    let mut gpu = harness.gpu(1);

    let a = pool.allocate(&mut gpu, 64).unwrap();
    let b = pool.allocate(&mut gpu, 128).unwrap();
    assert_eq!(pool.allocated_bytes(), 192);

    pool.deallocate(&a);
    assert_eq!(pool.allocated_bytes(), 128);
    pool.deallocate(&b);
    assert_eq!(pool.allocated_bytes(), 0);
}

#[test]
fn test_views_do_not_overlap() {
    let mut harness = Harness::new();
    let mut pool = pool(&mut harness, 4, 256);
    let mut gpu = harness.gpu(1);

    let views: Vec<_> = (0..8).map(|_| pool.allocate(&mut gpu, 40).unwrap()).collect();
    for (i, a) in views.iter().enumerate() {
        for b in &views[i + 1..] {
            let disjoint =
                a.offset() + a.size() <= b.offset() || b.offset() + b.size() <= a.offset();
            assert!(disjoint, "views overlap: {}+{} vs {}+{}",
                a.offset(), a.size(), b.offset(), b.size());
        }
    }
}

#[test]
fn test_offsets_align_to_element_size() {
    let mut harness = Harness::new();
    let mut pool = pool(&mut harness, 48, 64);
    let mut gpu = harness.gpu(1);
    for _ in 0..5 {
        let view = pool.allocate(&mut gpu, 48).unwrap();
        assert_eq!(view.offset() % 48, 0);
    }
}

// ============================================================================
// Free-list coalescing
// ============================================================================

#[test]
fn test_deallocate_coalesces_neighbors() {
    let mut harness = Harness::new();
    let mut pool = pool(&mut harness, 1, 256);
    let mut gpu = harness.gpu(1);

    let a = pool.allocate(&mut gpu, 64).unwrap();
    let b = pool.allocate(&mut gpu, 64).unwrap();
    let c = pool.allocate(&mut gpu, 64).unwrap();

    pool.deallocate(&a);
    pool.deallocate(&c);
    pool.deallocate(&b); // coalesces with both neighbors

    // The whole range is free again: a full-size allocation fits without
    // growth
    let capacity = pool.capacity();
    let all = pool.allocate(&mut gpu, capacity).unwrap();
    assert_eq!(all.offset(), 0);
    assert_eq!(pool.capacity(), capacity);
}

// ============================================================================
// Growth
// ============================================================================

#[test]
fn test_growth_preserves_live_view_offsets() {
    let mut harness = Harness::new();
    let mut pool = pool(&mut harness, 4, 16); // 64 bytes
    let mut gpu = harness.gpu(1);

    let a = pool.allocate(&mut gpu, 32).unwrap();
    let a_offset = a.offset();
    // Exceed the remaining capacity to force a grow
    let b = pool.allocate(&mut gpu, 128).unwrap();

    assert!(pool.capacity() >= 160);
    assert_eq!(a.offset(), a_offset);
    // Views resolve through the pool indirection to the new backing buffer
    let backing = pool.buffer();
    assert!(std::sync::Arc::ptr_eq(&a.buffer().unwrap(), &backing));
    assert!(std::sync::Arc::ptr_eq(&b.buffer().unwrap(), &backing));
    // The retired backing buffer is parked with the deletion manager
    assert!(gpu.deletion.pending() > 0);
}

#[test]
fn test_view_outliving_pool_resolves_to_none() {
    let mut harness = Harness::new();
    let view = {
        let mut pool = pool(&mut harness, 4, 16);
        let mut gpu = harness.gpu(1);
        pool.allocate(&mut gpu, 16).unwrap()
    };
    assert!(view.buffer().is_none());
}
