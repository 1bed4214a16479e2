use std::collections::VecDeque;

/// Allocates and recycles unique `u32` indices.
///
/// Manages a pool of slot indices for bindless descriptor heaps and GPU-side
/// tables. Freed indices are recycled on subsequent allocations.
///
/// Two release paths exist:
/// - [`free`](Self::free) recycles the slot immediately (CPU-side tables).
/// - [`free_deferred`](Self::free_deferred) parks the slot until the frames
///   that may still reference it have left flight; [`collect`](Self::collect)
///   moves matured slots back to the free list. Descriptor slots always take
///   this path so in-flight command lists never see a reused index.
pub struct SlotAllocator {
    free_list: Vec<u32>,
    /// Parked slots: (frame at which the slot may be reused, slot)
    deferred: VecDeque<(u64, u32)>,
    next_id: u32,
    len: u32,
    /// Optional hard capacity (shader-visible heap size)
    capacity: Option<u32>,
}

impl SlotAllocator {
    /// Create a new unbounded allocator
    pub fn new() -> Self {
        Self {
            free_list: Vec::new(),
            deferred: VecDeque::new(),
            next_id: 0,
            len: 0,
            capacity: None,
        }
    }

    /// Create an allocator with a hard capacity.
    ///
    /// Allocating past the capacity panics: descriptor heap exhaustion is
    /// unrecoverable.
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            free_list: Vec::new(),
            deferred: VecDeque::new(),
            next_id: 0,
            len: 0,
            capacity: Some(capacity),
        }
    }

    /// Allocate the next available slot index
    pub fn alloc(&mut self) -> u32 {
        self.len += 1;
        self.free_list.pop().unwrap_or_else(|| {
            let id = self.next_id;
            if let Some(capacity) = self.capacity {
                assert!(
                    id < capacity,
                    "descriptor heap exhausted: {} slots",
                    capacity
                );
            }
            self.next_id += 1;
            id
        })
    }

    /// Return a slot index to the pool for immediate reuse
    pub fn free(&mut self, id: u32) {
        debug_assert!(id < self.next_id, "freeing an unallocated slot: {}", id);
        self.len -= 1;
        self.free_list.push(id);
    }

    /// Park a slot until `current_frame + frames_in_flight` frames have passed
    pub fn free_deferred(&mut self, id: u32, current_frame: u64, frames_in_flight: u64) {
        debug_assert!(id < self.next_id, "freeing an unallocated slot: {}", id);
        self.len -= 1;
        self.deferred
            .push_back((current_frame + frames_in_flight, id));
    }

    /// Move parked slots whose release frame has been reached back to the
    /// free list. Called once per frame with the frame counter.
    pub fn collect(&mut self, current_frame: u64) {
        while let Some(&(release_frame, id)) = self.deferred.front() {
            if release_frame > current_frame {
                break;
            }
            self.deferred.pop_front();
            self.free_list.push(id);
        }
    }

    /// Whether a slot is currently parked in the deferred queue
    pub fn is_deferred(&self, id: u32) -> bool {
        self.deferred.iter().any(|&(_, slot)| slot == id)
    }

    /// Number of parked slots
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Highest index ever allocated + 1.
    ///
    /// This is the minimum capacity the backing storage must have
    /// to accommodate all allocated indices.
    pub fn high_water_mark(&self) -> u32 {
        self.next_id
    }

    /// Number of currently allocated slots
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether no slots are currently allocated
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for SlotAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "slot_allocator_tests.rs"]
mod tests;
