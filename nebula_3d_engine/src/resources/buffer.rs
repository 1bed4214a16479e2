/// Engine-side buffer wrapper
///
/// A `GpuBuffer` pairs the backend handle with its bindless descriptor slots
/// and tracked state. Slots are assigned at creation by the resource manager
/// and stay stable for the buffer's lifetime.

use std::sync::Arc;

use crate::rhi::{
    BufferHandle, BufferUsage, HeapType, ResourceState, SubresourceRange, INVALID_SLOT,
};
use super::tracked::TrackedState;

/// Bindless descriptor slots cached on a resource.
///
/// `INVALID_SLOT` marks views that were not requested.
#[derive(Debug, Clone, Copy)]
pub struct BindlessSlots {
    pub srv: u32,
    pub uav: u32,
    pub cbv: u32,
}

impl Default for BindlessSlots {
    fn default() -> Self {
        Self {
            srv: INVALID_SLOT,
            uav: INVALID_SLOT,
            cbv: INVALID_SLOT,
        }
    }
}

/// Creation parameters for a typed engine buffer
#[derive(Clone)]
pub struct BufferCreateInfo {
    pub size: u64,
    pub heap: HeapType,
    pub usage: BufferUsage,
    /// Structured element size in bytes; 0 selects a raw (byte-address) view
    pub element_size: u32,
    pub wants_srv: bool,
    pub wants_uav: bool,
    pub wants_cbv: bool,
    /// Append-buffer counter placed after the data region
    pub with_counter: bool,
    pub initial_state: ResourceState,
    pub name: String,
}

impl BufferCreateInfo {
    /// A plain structured SRV buffer in the default heap
    pub fn structured(size: u64, element_size: u32, name: impl Into<String>) -> Self {
        Self {
            size,
            heap: HeapType::Default,
            usage: BufferUsage::STORAGE | BufferUsage::TRANSFER_DST,
            element_size,
            wants_srv: true,
            wants_uav: false,
            wants_cbv: false,
            with_counter: false,
            initial_state: ResourceState::AllSrv,
            name: name.into(),
        }
    }
}

/// UAV counter placement alignment, in bytes
pub const COUNTER_PLACEMENT_ALIGNMENT: u64 = 4096;

/// A GPU buffer with stable bindless slots and tracked state
pub struct GpuBuffer {
    handle: Arc<dyn BufferHandle>,
    slots: BindlessSlots,
    /// Offset of the UAV append counter, when allocated with one
    counter_offset: Option<u64>,
    state: TrackedState,
    /// Creation parameters, kept so pools can recreate the buffer on growth
    info: BufferCreateInfo,
}

impl GpuBuffer {
    pub(crate) fn new(
        handle: Arc<dyn BufferHandle>,
        slots: BindlessSlots,
        info: &BufferCreateInfo,
        counter_offset: Option<u64>,
    ) -> Self {
        Self {
            handle,
            slots,
            counter_offset,
            state: TrackedState::new(SubresourceRange::single(0, 0), info.initial_state),
            info: info.clone(),
        }
    }

    /// Backend handle
    pub fn handle(&self) -> &Arc<dyn BufferHandle> {
        &self.handle
    }

    /// Bindless slot set assigned at creation
    pub fn slots(&self) -> BindlessSlots {
        self.slots
    }

    /// Byte size of the data region (excludes the counter, when present)
    pub fn size(&self) -> u64 {
        self.info.size
    }

    /// Structured element size (0 for raw buffers)
    pub fn element_size(&self) -> u32 {
        self.info.element_size
    }

    /// Creation parameters
    pub fn create_info(&self) -> &BufferCreateInfo {
        &self.info
    }

    /// Byte offset of the UAV append counter, for counter-backed buffers
    pub fn counter_offset(&self) -> Option<u64> {
        self.counter_offset
    }

    /// Tracked current state
    pub fn state(&self) -> &TrackedState {
        &self.state
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }
}
