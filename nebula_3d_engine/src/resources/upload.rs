/// Upload manager - host-visible ring buffer + queued updates
///
/// Reserves ranges in a host-visible ring, copies the caller's bytes in, and
/// queues per-frame `ResourceUpdate`s. At frame begin the engine calls
/// [`UploadManager::process_uploads`], which records `state -> COPY_DEST`
/// barriers, the copies, and the reverting barriers, then submits on the
/// primary queue. Ring ranges are released once the frame's fence clears
/// (`on_frame_complete`), never at queue time.

use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::rhi::{
    BarrierDesc, BufferBarrier, BufferDesc, BufferHandle, BufferUsage, CommandList, Device,
    FenceHandle, HeapType, QueueKind, ResourceState, SubresourceRange,
};
use rustc_hash::FxHashMap;

use super::buffer::GpuBuffer;
use super::deletion::{DeferredRelease, DeletionManager};
use super::FrameTick;

/// How many frame queues an upload is replicated into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameReplication {
    /// Upload once, visible from the current frame on (static data)
    Once,
    /// Replicate into every frame-in-flight queue (per-frame CB arrays)
    AllFrames,
}

struct ResourceUpdate {
    dest: Arc<GpuBuffer>,
    dst_offset: u64,
    src_offset: u64,
    size: u64,
    /// Ring buffer the data was written into (may be an old, grown-away ring)
    src_buffer: Arc<dyn BufferHandle>,
}

struct ResourceCopy {
    dest: Arc<GpuBuffer>,
    src: Arc<GpuBuffer>,
    size: u64,
}

#[derive(Debug, Clone, Copy)]
struct MemoryBlock {
    offset: u64,
    size: u64,
    is_free: bool,
}

const INITIAL_RING_CAPACITY: u64 = 64 * 1024;

pub struct UploadManager {
    device: Arc<Mutex<dyn Device>>,
    ring: Arc<dyn BufferHandle>,
    capacity: u64,
    blocks: Vec<MemoryBlock>,
    /// Live ring allocations: offset -> (size, outstanding frame references)
    live_allocs: FxHashMap<u64, (u64, u32)>,
    /// Per-frame-slot queued updates
    frame_updates: Vec<Vec<ResourceUpdate>>,
    /// Per-frame-slot ranges awaiting the frame's fence before release
    pending_release: Vec<Vec<(u64, u64)>>,
    queued_copies: Vec<ResourceCopy>,
    command_lists: Vec<Box<dyn CommandList>>,
    frames_in_flight: usize,
}

impl UploadManager {
    pub fn new(device: Arc<Mutex<dyn Device>>, frames_in_flight: usize) -> Result<Self> {
        let (ring, command_lists) = {
            let mut dev = device
                .lock()
                .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
            let ring = dev.create_buffer(&BufferDesc {
                size: INITIAL_RING_CAPACITY,
                heap: HeapType::Upload,
                usage: BufferUsage::TRANSFER_SRC,
                name: "UploadRing".to_string(),
            })?;
            let mut lists = Vec::with_capacity(frames_in_flight);
            for _ in 0..frames_in_flight {
                lists.push(dev.create_command_list(QueueKind::Graphics)?);
            }
            (ring, lists)
        };

        Ok(Self {
            device,
            ring,
            capacity: INITIAL_RING_CAPACITY,
            blocks: vec![MemoryBlock {
                offset: 0,
                size: INITIAL_RING_CAPACITY,
                is_free: true,
            }],
            live_allocs: FxHashMap::default(),
            frame_updates: (0..frames_in_flight).map(|_| Vec::new()).collect(),
            pending_release: (0..frames_in_flight).map(|_| Vec::new()).collect(),
            queued_copies: Vec::new(),
            command_lists,
            frames_in_flight,
        })
    }

    /// Reserve ring space, copy `data` in, and queue the buffer update
    pub fn upload(
        &mut self,
        deletion: &mut DeletionManager,
        tick: FrameTick,
        data: &[u8],
        dest: &Arc<GpuBuffer>,
        replication: FrameReplication,
        dst_offset: u64,
    ) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let size = data.len() as u64;
        let offset = match self.reserve(size) {
            Some(offset) => offset,
            None => {
                self.grow_ring(deletion, tick.frame, size)?;
                self.reserve(size).ok_or(Error::OutOfMemory)?
            }
        };
        self.ring.write(offset, data)?;

        let refs = match replication {
            FrameReplication::Once => 1,
            FrameReplication::AllFrames => self.frames_in_flight as u32,
        };
        self.live_allocs.insert(offset, (size, refs));

        let slots: Vec<usize> = match replication {
            FrameReplication::Once => vec![tick.slot],
            FrameReplication::AllFrames => (0..self.frames_in_flight).collect(),
        };
        for slot in slots {
            self.frame_updates[slot].push(ResourceUpdate {
                dest: dest.clone(),
                dst_offset,
                src_offset: offset,
                size,
                src_buffer: self.ring.clone(),
            });
        }
        Ok(())
    }

    /// Queue a whole-resource GPU copy (pool growth, blit)
    pub fn queue_resource_copy(&mut self, dest: Arc<GpuBuffer>, src: Arc<GpuBuffer>, size: u64) {
        self.queued_copies.push(ResourceCopy { dest, src, size });
    }

    /// Record and submit this frame slot's queued updates.
    ///
    /// All uploads queued before a frame's graph execution are visible to
    /// that frame's rendering: the engine calls this before the graph runs.
    pub fn process_uploads(
        &mut self,
        frame_slot: usize,
        signal: Option<(&Arc<dyn FenceHandle>, u64)>,
    ) -> Result<()> {
        let updates = std::mem::take(&mut self.frame_updates[frame_slot]);
        if updates.is_empty() && signal.is_none() {
            return Ok(());
        }

        let whole = SubresourceRange::single(0, 0);
        let list = &mut self.command_lists[frame_slot];
        list.begin()?;
        for update in &updates {
            let dest_state = update
                .dest
                .state()
                .uniform_state(&whole)
                .unwrap_or(ResourceState::Common);
            list.resource_barrier(&[BarrierDesc::Buffer(BufferBarrier {
                buffer: update.dest.handle().clone(),
                from: dest_state,
                to: ResourceState::CopyDest,
            })])?;
            list.copy_buffer_region(
                update.dest.handle(),
                update.dst_offset,
                &update.src_buffer,
                update.src_offset,
                update.size,
            )?;
            list.resource_barrier(&[BarrierDesc::Buffer(BufferBarrier {
                buffer: update.dest.handle().clone(),
                from: ResourceState::CopyDest,
                to: dest_state,
            })])?;
        }
        list.end()?;

        {
            let mut dev = self
                .device
                .lock()
                .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
            dev.submit(QueueKind::Graphics, &mut [list.as_mut()], signal)?;
        }

        // Retire ring references; ranges free once this frame's fence clears
        for update in &updates {
            if !Arc::ptr_eq(&update.src_buffer, &self.ring) {
                // The ring was reallocated since this update was queued; the
                // old buffer is already with the deletion manager
                continue;
            }
            let mut matured = None;
            if let Some((size, refs)) = self.live_allocs.get_mut(&update.src_offset) {
                *refs -= 1;
                if *refs == 0 {
                    matured = Some((update.src_offset, *size));
                }
            }
            if let Some(range) = matured {
                self.live_allocs.remove(&range.0);
                self.pending_release[frame_slot].push(range);
            }
        }
        Ok(())
    }

    /// Record and submit queued resource copies for this frame slot
    pub fn execute_resource_copies(&mut self, frame_slot: usize) -> Result<()> {
        if self.queued_copies.is_empty() {
            return Ok(());
        }
        let copies = std::mem::take(&mut self.queued_copies);
        let whole = SubresourceRange::single(0, 0);
        let list = &mut self.command_lists[frame_slot];
        list.begin()?;
        for copy in &copies {
            let src_state = copy
                .src
                .state()
                .uniform_state(&whole)
                .unwrap_or(ResourceState::Common);
            let dst_state = copy
                .dest
                .state()
                .uniform_state(&whole)
                .unwrap_or(ResourceState::Common);
            list.resource_barrier(&[
                BarrierDesc::Buffer(BufferBarrier {
                    buffer: copy.src.handle().clone(),
                    from: src_state,
                    to: ResourceState::CopySource,
                }),
                BarrierDesc::Buffer(BufferBarrier {
                    buffer: copy.dest.handle().clone(),
                    from: dst_state,
                    to: ResourceState::CopyDest,
                }),
            ])?;
            list.copy_buffer_region(copy.dest.handle(), 0, copy.src.handle(), 0, copy.size)?;
            list.resource_barrier(&[
                BarrierDesc::Buffer(BufferBarrier {
                    buffer: copy.src.handle().clone(),
                    from: ResourceState::CopySource,
                    to: src_state,
                }),
                BarrierDesc::Buffer(BufferBarrier {
                    buffer: copy.dest.handle().clone(),
                    from: ResourceState::CopyDest,
                    to: dst_state,
                }),
            ])?;
        }
        list.end()?;

        let mut dev = self
            .device
            .lock()
            .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
        dev.submit(QueueKind::Graphics, &mut [list.as_mut()], None)?;
        Ok(())
    }

    /// Release ring ranges tied to a frame whose fence has cleared
    pub fn on_frame_complete(&mut self, frame_slot: usize) {
        let ranges = std::mem::take(&mut self.pending_release[frame_slot]);
        for (offset, size) in ranges {
            self.release(offset, size);
        }
    }

    /// Bytes currently reserved in the ring (live allocations + unreleased)
    pub fn reserved_bytes(&self) -> u64 {
        self.blocks
            .iter()
            .filter(|b| !b.is_free)
            .map(|b| b.size)
            .sum()
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    // ===== INTERNALS =====

    fn reserve(&mut self, size: u64) -> Option<u64> {
        for i in 0..self.blocks.len() {
            if self.blocks[i].is_free && self.blocks[i].size >= size {
                let offset = self.blocks[i].offset;
                let remaining = self.blocks[i].size - size;
                self.blocks[i].is_free = false;
                self.blocks[i].size = size;
                if remaining > 0 {
                    self.blocks.insert(
                        i + 1,
                        MemoryBlock {
                            offset: offset + size,
                            size: remaining,
                            is_free: true,
                        },
                    );
                }
                return Some(offset);
            }
        }
        None
    }

    fn release(&mut self, offset: u64, size: u64) {
        for i in 0..self.blocks.len() {
            if self.blocks[i].offset == offset && self.blocks[i].size == size
                && !self.blocks[i].is_free
            {
                self.blocks[i].is_free = true;
                let mut i = i;
                if i > 0 && self.blocks[i - 1].is_free {
                    self.blocks[i - 1].size += self.blocks[i].size;
                    self.blocks.remove(i);
                    i -= 1;
                }
                if i + 1 < self.blocks.len() && self.blocks[i + 1].is_free {
                    self.blocks[i].size += self.blocks[i + 1].size;
                    self.blocks.remove(i + 1);
                }
                return;
            }
        }
    }

    /// Reallocate the ring; the old buffer goes to the deletion manager
    fn grow_ring(
        &mut self,
        deletion: &mut DeletionManager,
        current_frame: u64,
        required: u64,
    ) -> Result<()> {
        let mut grow_by = self.capacity.max(required);
        if let Some(last) = self.blocks.last() {
            if last.is_free {
                grow_by = grow_by.saturating_sub(last.size).max(required);
            }
        }
        let new_capacity = self.capacity + grow_by;
        crate::engine_info!("nebula3d::UploadManager",
            "growing upload ring: {} -> {} bytes", self.capacity, new_capacity);

        let new_ring = {
            let mut dev = self
                .device
                .lock()
                .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
            dev.create_buffer(&BufferDesc {
                size: new_capacity,
                heap: HeapType::Upload,
                usage: BufferUsage::TRANSFER_SRC,
                name: "UploadRing".to_string(),
            })?
        };
        let old = std::mem::replace(&mut self.ring, new_ring);
        deletion.mark_for_delete(DeferredRelease::Buffer(old), current_frame);

        self.capacity = new_capacity;
        self.blocks.clear();
        self.blocks.push(MemoryBlock {
            offset: 0,
            size: new_capacity,
            is_free: true,
        });
        self.live_allocs.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "upload_tests.rs"]
mod tests;
