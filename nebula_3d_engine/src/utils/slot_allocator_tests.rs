use super::*;

// ============================================================================
// Basic allocation tests
// ============================================================================

#[test]
fn test_sequential_alloc() {
    let mut alloc = SlotAllocator::new();
    assert_eq!(alloc.alloc(), 0);
    assert_eq!(alloc.alloc(), 1);
    assert_eq!(alloc.alloc(), 2);
}

#[test]
fn test_new_is_empty() {
    let alloc = SlotAllocator::new();
    assert!(alloc.is_empty());
    assert_eq!(alloc.len(), 0);
    assert_eq!(alloc.high_water_mark(), 0);
}

// ============================================================================
// Immediate free and recycle
// ============================================================================

#[test]
fn test_free_and_recycle() {
    let mut alloc = SlotAllocator::new();
    let a = alloc.alloc(); // 0
    let b = alloc.alloc(); // 1
    alloc.free(a);          // 0 goes to free list
    let c = alloc.alloc(); // 0 (recycled)
    assert_eq!(c, 0);
    assert_eq!(b, 1);
}

#[test]
fn test_high_water_mark_never_decreases() {
    let mut alloc = SlotAllocator::new();
    alloc.alloc(); // 0
    alloc.alloc(); // 1
    alloc.free(0);
    alloc.free(1);
    assert_eq!(alloc.high_water_mark(), 2);
    alloc.alloc(); // recycled
    assert_eq!(alloc.high_water_mark(), 2);
}

// ============================================================================
// Deferred free
// ============================================================================

#[test]
fn test_deferred_slot_not_reused_inside_flight_window() {
    let frames_in_flight = 3;
    let mut alloc = SlotAllocator::new();
    let a = alloc.alloc(); // 0
    let _b = alloc.alloc(); // 1

    // Freed at frame 10: must stay parked through frames 10, 11, 12
    alloc.free_deferred(a, 10, frames_in_flight);
    assert!(alloc.is_deferred(a));

    for frame in 10..13 {
        alloc.collect(frame);
        assert!(alloc.is_deferred(a), "slot reusable too early at frame {}", frame);
        // A fresh allocation must not hand the parked slot back
        let fresh = alloc.alloc();
        assert_ne!(fresh, a);
    }

    // Frame 13 = 10 + frames_in_flight: the slot matures
    alloc.collect(13);
    assert!(!alloc.is_deferred(a));
    assert_eq!(alloc.alloc(), a);
}

#[test]
fn test_deferred_collect_is_fifo_by_release_frame() {
    let mut alloc = SlotAllocator::new();
    let a = alloc.alloc();
    let b = alloc.alloc();
    alloc.free_deferred(a, 1, 2); // matures at frame 3
    alloc.free_deferred(b, 2, 2); // matures at frame 4
    alloc.collect(3);
    assert!(!alloc.is_deferred(a));
    assert!(alloc.is_deferred(b));
    alloc.collect(4);
    assert_eq!(alloc.deferred_len(), 0);
}

#[test]
#[should_panic(expected = "descriptor heap exhausted")]
fn test_capacity_exhaustion_panics() {
    let mut alloc = SlotAllocator::with_capacity(2);
    alloc.alloc();
    alloc.alloc();
    alloc.alloc(); // past capacity
}

// ============================================================================
// Uniqueness under churn
// ============================================================================

#[test]
fn test_live_indices_are_unique() {
    let mut alloc = SlotAllocator::new();
    let mut seen = std::collections::HashSet::new();

    for _ in 0..50 {
        seen.insert(alloc.alloc());
    }
    for id in 0..10 {
        alloc.free(id);
        seen.remove(&id);
    }
    for _ in 0..10 {
        let id = alloc.alloc();
        assert!(seen.insert(id), "duplicate slot id: {}", id);
    }
    assert_eq!(seen.len(), 50);
}
