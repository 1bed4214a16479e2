/// Suballocating dynamic buffer pool
///
/// A single large buffer supporting best-fit suballocation of `BufferView`
/// ranges, with free-list coalescing and growth by reallocation. Growth
/// copies the old contents to offset 0 of the new backing buffer, so live
/// view offsets stay valid; views reach the current backing through a shared
/// indirection object (weak back-reference, per the pool/view cycle
/// redesign).

use std::sync::{Arc, Mutex, Weak};

use crate::engine_bail;
use crate::error::Result;
use super::buffer::GpuBuffer;
use super::GpuServices;

/// Indirection target for views: always points at the pool's current backing
pub struct ViewedBuffer {
    current: Mutex<Arc<GpuBuffer>>,
}

impl ViewedBuffer {
    fn new(buffer: Arc<GpuBuffer>) -> Self {
        Self {
            current: Mutex::new(buffer),
        }
    }

    /// The pool's current backing buffer
    pub fn buffer(&self) -> Arc<GpuBuffer> {
        self.current
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn replace(&self, buffer: Arc<GpuBuffer>) {
        *self.current.lock().unwrap_or_else(|p| p.into_inner()) = buffer;
    }
}

/// A suballocated range within a dynamic buffer pool.
///
/// Holds a weak back-reference to the pool; `buffer()` returns `None` once
/// the pool is gone.
#[derive(Clone)]
pub struct BufferView {
    pool: Weak<ViewedBuffer>,
    offset: u64,
    size: u64,
    element_size: u64,
}

impl BufferView {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn element_size(&self) -> u64 {
        self.element_size
    }

    /// First element index of this view within the pool
    pub fn element_offset(&self) -> u64 {
        if self.element_size == 0 {
            self.offset
        } else {
            self.offset / self.element_size
        }
    }

    /// The pool's current backing buffer, if the pool is still alive
    pub fn buffer(&self) -> Option<Arc<GpuBuffer>> {
        self.pool.upgrade().map(|viewed| viewed.buffer())
    }
}

#[derive(Debug, Clone, Copy)]
struct MemoryBlock {
    offset: u64,
    size: u64,
    is_free: bool,
}

/// A bindless suballocated pool (indexed dynamic buffer)
pub struct DynamicBuffer {
    viewed: Arc<ViewedBuffer>,
    blocks: Vec<MemoryBlock>,
    capacity: u64,
    element_size: u64,
    name: String,
}

impl DynamicBuffer {
    pub(crate) fn new(backing: Arc<GpuBuffer>, capacity: u64, element_size: u64) -> Self {
        let name = backing.name().to_string();
        Self {
            viewed: Arc::new(ViewedBuffer::new(backing)),
            blocks: vec![MemoryBlock {
                offset: 0,
                size: capacity,
                is_free: true,
            }],
            capacity,
            element_size,
            name,
        }
    }

    /// Current backing buffer (changes on growth)
    pub fn buffer(&self) -> Arc<GpuBuffer> {
        self.viewed.buffer()
    }

    /// The pool's indirection object; always resolves to the current
    /// backing buffer, so long-lived references survive growth
    pub fn viewed(&self) -> Arc<ViewedBuffer> {
        Arc::clone(&self.viewed)
    }

    /// SRV heap slot of the current backing buffer
    pub fn srv_index(&self) -> u32 {
        self.buffer().slots().srv
    }

    /// UAV heap slot of the current backing buffer
    pub fn uav_index(&self) -> u32 {
        self.buffer().slots().uav
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn element_size(&self) -> u64 {
        self.element_size
    }

    /// Sum of live (non-free) block sizes, for accounting and tests
    pub fn allocated_bytes(&self) -> u64 {
        self.blocks
            .iter()
            .filter(|b| !b.is_free)
            .map(|b| b.size)
            .sum()
    }

    /// Allocate a view of `size` bytes, growing the pool when needed
    pub fn allocate(&mut self, gpu: &mut GpuServices, size: u64) -> Result<BufferView> {
        if size == 0 {
            engine_bail!(InvalidResource, "nebula3d::DynamicBuffer",
                "zero-size allocation in pool '{}'", self.name);
        }
        let size = self.align_up(size);
        if let Some(offset) = self.reserve(size) {
            return Ok(self.make_view(offset, size));
        }

        // No suitable free block: grow, absorbing a trailing free block
        let mut grow_by = self.capacity.max(size);
        if let Some(last) = self.blocks.last() {
            if last.is_free {
                grow_by = grow_by.saturating_sub(last.size).max(size);
            }
        }
        self.grow(gpu, self.capacity + grow_by)?;

        match self.reserve(size) {
            Some(offset) => Ok(self.make_view(offset, size)),
            None => {
                crate::engine_error!("nebula3d::DynamicBuffer",
                    "pool '{}' failed to satisfy {} bytes after growth", self.name, size);
                Err(crate::error::Error::OutOfMemory)
            }
        }
    }

    /// Allocate a view and queue an upload of `data` into it
    pub fn add_data(&mut self, gpu: &mut GpuServices, data: &[u8]) -> Result<BufferView> {
        let view = self.allocate(gpu, data.len() as u64)?;
        self.update_view(gpu, &view, data)?;
        Ok(view)
    }

    /// Queue an upload of `data` into an existing view
    pub fn update_view(
        &self,
        gpu: &mut GpuServices,
        view: &BufferView,
        data: &[u8],
    ) -> Result<()> {
        if data.len() as u64 > view.size {
            engine_bail!(InvalidResource, "nebula3d::DynamicBuffer",
                "update of {} bytes does not fit view of {} bytes in pool '{}'",
                data.len(), view.size, self.name);
        }
        let dest = self.buffer();
        gpu.upload.upload(
            gpu.deletion,
            gpu.tick,
            data,
            &dest,
            super::upload::FrameReplication::Once,
            view.offset,
        )
    }

    /// Release a view's range back to the pool, coalescing free neighbors
    pub fn deallocate(&mut self, view: &BufferView) {
        let mut index = None;
        for (i, block) in self.blocks.iter().enumerate() {
            if block.offset == view.offset && block.size == view.size && !block.is_free {
                index = Some(i);
                break;
            }
        }
        let Some(mut i) = index else {
            crate::engine_warn!("nebula3d::DynamicBuffer",
                "deallocate of unknown view (offset {}, size {}) in pool '{}'",
                view.offset, view.size, self.name);
            return;
        };
        self.blocks[i].is_free = true;

        // Coalesce with previous block if free
        if i > 0 && self.blocks[i - 1].is_free {
            self.blocks[i - 1].size += self.blocks[i].size;
            self.blocks.remove(i);
            i -= 1;
        }
        // Coalesce with next block if free
        if i + 1 < self.blocks.len() && self.blocks[i + 1].is_free {
            self.blocks[i].size += self.blocks[i + 1].size;
            self.blocks.remove(i + 1);
        }
    }

    // ===== INTERNALS =====

    fn align_up(&self, size: u64) -> u64 {
        if self.element_size <= 1 {
            size
        } else {
            size.div_ceil(self.element_size) * self.element_size
        }
    }

    /// Best-fit search over the free list; splits the chosen block
    fn reserve(&mut self, size: u64) -> Option<u64> {
        let mut best: Option<usize> = None;
        for (i, block) in self.blocks.iter().enumerate() {
            if block.is_free && block.size >= size {
                match best {
                    Some(b) if self.blocks[b].size <= block.size => {}
                    _ => best = Some(i),
                }
            }
        }
        let i = best?;
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
        Some(offset)
    }

    /// Reallocate the backing buffer, preserving live offsets.
    ///
    /// The old contents are copied to offset 0 of the new buffer via a
    /// queued GPU copy; the old buffer goes to the deletion manager.
    fn grow(&mut self, gpu: &mut GpuServices, new_capacity: u64) -> Result<()> {
        let new_capacity = self.align_up(new_capacity);
        crate::engine_info!("nebula3d::DynamicBuffer",
            "growing pool '{}': {} -> {} bytes", self.name, self.capacity, new_capacity);

        let old = self.buffer();
        let new = gpu.resources.recreate_pool_buffer(&old, new_capacity)?;
        gpu.upload.queue_resource_copy(new.clone(), old.clone(), self.capacity);
        gpu.deletion.mark_for_delete(
            super::deletion::DeferredRelease::EngineBuffer(old),
            gpu.tick.frame,
        );

        // Extend the block list with the added tail space
        let added = new_capacity - self.capacity;
        if let Some(last) = self.blocks.last_mut() {
            if last.is_free {
                last.size += added;
            } else {
                self.blocks.push(MemoryBlock {
                    offset: self.capacity,
                    size: added,
                    is_free: true,
                });
            }
        }
        self.capacity = new_capacity;
        self.viewed.replace(new);
        Ok(())
    }

    fn make_view(&self, offset: u64, size: u64) -> BufferView {
        BufferView {
            pool: Arc::downgrade(&self.viewed),
            offset,
            size,
            element_size: self.element_size,
        }
    }
}

#[cfg(test)]
#[path = "dynamic_buffer_tests.rs"]
mod tests;
