/// Device, resource-handle and command-list traits
///
/// Implemented by backend crates (e.g. the Vulkan renderer). The engine
/// records commands single-threaded on the render thread; backends are free
/// to use interior mutability for their own bookkeeping.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use super::binding::{DescriptorHeapKind, RootParam};
use super::types::{
    BarrierDesc, BufferDesc, CompareOp, CopyableFootprint, Format, IndexBufferView,
    IndirectCommandKind, PassBeginInfo, PrimitiveTopology, Rect2D, ResourceState, SamplerDesc,
    ShaderStages, SubresourceRange, TextureDesc, TextureSubresourceData, VertexBufferView,
    Viewport,
};

// ============================================================================
// Capabilities
// ============================================================================

/// Device capabilities checked at engine initialization.
///
/// The engine requires `mesh_shaders`, `bindless`, `enhanced_barriers` and
/// `draw_indirect_count`; initialization fails with a Configuration error
/// when any is missing.
#[derive(Debug, Clone)]
pub struct DeviceCaps {
    pub mesh_shaders: bool,
    pub bindless: bool,
    pub enhanced_barriers: bool,
    pub draw_indirect_count: bool,
    /// Required row alignment for buffer<->texture copies, in bytes
    pub row_pitch_alignment: u64,
    /// Capacity of the shader-visible CBV/SRV/UAV heap
    pub max_cbv_srv_uav_descriptors: u32,
    /// Capacity of the shader-visible sampler heap
    pub max_sampler_descriptors: u32,
}

/// Queues a command list can be submitted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Primary graphics queue; all render-graph work goes here
    Graphics,
    Compute,
    Copy,
}

// ============================================================================
// Resource handles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Buffer,
    Texture,
}

/// Base trait for GPU resources created by a device
pub trait ResourceHandle: Send + Sync {
    fn kind(&self) -> ResourceKind;
    fn debug_name(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
}

/// Buffer resource handle.
///
/// `write` is only valid for Upload-heap buffers, `read` only for
/// Readback-heap buffers; other heaps return InvalidResource.
pub trait BufferHandle: ResourceHandle {
    fn size(&self) -> u64;
    fn heap(&self) -> super::types::HeapType;
    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;
    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()>;
}

/// Texture resource handle
pub trait TextureHandle: ResourceHandle {
    fn desc(&self) -> &TextureDesc;
}

/// Sampler handle (immutable once created)
pub trait SamplerHandle: Send + Sync {
    fn desc(&self) -> &SamplerDesc;
    fn as_any(&self) -> &dyn Any;
}

/// Compiled pipeline state handle
pub trait PipelineHandle: Send + Sync {
    fn debug_name(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
}

/// Timeline fence handle
pub trait FenceHandle: Send + Sync {
    /// Last value the GPU has signaled
    fn completed_value(&self) -> u64;

    /// Block until `completed_value() >= value` or the timeout elapses.
    ///
    /// Returns `Ok(true)` when the value was reached, `Ok(false)` on timeout.
    fn wait(&self, value: u64, timeout: Duration) -> Result<bool>;

    fn as_any(&self) -> &dyn Any;
}

/// Shader-visible descriptor heap handle
pub trait DescriptorHeapHandle: Send + Sync {
    fn heap_kind(&self) -> DescriptorHeapKind;
    fn capacity(&self) -> u32;
}

// ============================================================================
// Descriptor writes
// ============================================================================

/// A single bindless descriptor update at a heap slot.
///
/// Slot allocation policy lives in the engine's resource manager; the device
/// only writes descriptors where it is told to (update-after-bind).
#[derive(Clone)]
pub enum DescriptorWrite {
    BufferSrv {
        buffer: Arc<dyn BufferHandle>,
        offset: u64,
        size: u64,
        /// Structured stride in bytes; ignored when `raw`
        stride: u32,
        /// Raw (byte-address) view
        raw: bool,
    },
    BufferUav {
        buffer: Arc<dyn BufferHandle>,
        offset: u64,
        size: u64,
        stride: u32,
        raw: bool,
        /// Offset of the UAV append counter within the same buffer
        counter_offset: Option<u64>,
    },
    BufferCbv {
        buffer: Arc<dyn BufferHandle>,
        offset: u64,
        size: u64,
    },
    TextureSrv {
        texture: Arc<dyn TextureHandle>,
        range: SubresourceRange,
        cube: bool,
    },
    TextureUav {
        texture: Arc<dyn TextureHandle>,
        mip: u32,
        first_slice: u32,
        slice_count: u32,
    },
    Sampler {
        sampler: Arc<dyn SamplerHandle>,
    },
}

// ============================================================================
// Pipeline descriptions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Opaque,
    AlphaBlend,
    Additive,
}

/// Graphics pipeline description.
///
/// Bytecode blobs are pre-compiled externally and keyed by the material's
/// technique descriptor; either `vertex_bytecode` or `mesh_bytecode` must be
/// present (the mesh path may also carry an amplification stage).
#[derive(Clone, Default)]
pub struct GraphicsPipelineDesc {
    pub name: String,
    pub vertex_bytecode: Option<Vec<u8>>,
    pub amplification_bytecode: Option<Vec<u8>>,
    pub mesh_bytecode: Option<Vec<u8>>,
    pub pixel_bytecode: Option<Vec<u8>>,
    pub color_formats: Vec<Format>,
    pub depth_format: Option<Format>,
    pub depth_write: bool,
    pub depth_compare: Option<CompareOp>,
    pub cull_mode: Option<CullMode>,
    pub blend: Option<BlendMode>,
    pub topology: Option<PrimitiveTopology>,
    pub wireframe: bool,
}

#[derive(Clone)]
pub struct ComputePipelineDesc {
    pub name: String,
    pub bytecode: Vec<u8>,
}

// ============================================================================
// Device trait
// ============================================================================

/// Main device trait - factory for GPU resources and submission endpoint
///
/// This is the central interface implemented by backend-specific devices
/// (e.g. VulkanDevice). The engine wraps it in `Arc<Mutex<dyn Device>>` on
/// the render context.
pub trait Device: Send + Sync {
    /// Device capabilities (queried once at initialization)
    fn caps(&self) -> &DeviceCaps;

    /// Create a buffer
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<Arc<dyn BufferHandle>>;

    /// Create a texture, optionally with initial subresource data
    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        initial_data: &[TextureSubresourceData],
    ) -> Result<Arc<dyn TextureHandle>>;

    /// Create a sampler
    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<Arc<dyn SamplerHandle>>;

    /// Create a timeline fence with the given initial value
    fn create_fence(&mut self, initial_value: u64) -> Result<Arc<dyn FenceHandle>>;

    /// Create a graphics (vertex or mesh) pipeline
    fn create_graphics_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
    ) -> Result<Arc<dyn PipelineHandle>>;

    /// Create a compute pipeline
    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDesc,
    ) -> Result<Arc<dyn PipelineHandle>>;

    /// Create a command list for the given queue kind
    fn create_command_list(&mut self, queue: QueueKind) -> Result<Box<dyn CommandList>>;

    /// Get the shader-visible descriptor heap of the given kind
    fn descriptor_heap(&self, kind: DescriptorHeapKind) -> &dyn DescriptorHeapHandle;

    /// Write one bindless descriptor at a heap slot (update-after-bind)
    fn write_descriptor(
        &mut self,
        heap: DescriptorHeapKind,
        slot: u32,
        write: &DescriptorWrite,
    ) -> Result<()>;

    /// Submit recorded command lists, optionally signaling a fence value
    fn submit(
        &mut self,
        queue: QueueKind,
        lists: &mut [&mut dyn CommandList],
        signal: Option<(&Arc<dyn FenceHandle>, u64)>,
    ) -> Result<()>;

    /// Wait for all GPU operations to complete
    fn wait_idle(&self) -> Result<()>;
}

// ============================================================================
// CommandList trait
// ============================================================================

/// Command list for recording rendering, compute and copy commands.
///
/// `begin` implicitly resets the list; a list may be re-recorded every frame.
pub trait CommandList: Send {
    /// Begin recording (resets previously recorded commands)
    fn begin(&mut self) -> Result<()>;

    /// End recording
    fn end(&mut self) -> Result<()>;

    /// Bind a pipeline
    fn bind_pipeline(&mut self, pipeline: &Arc<dyn PipelineHandle>) -> Result<()>;

    /// Bind the engine's fixed root layout (push-constant table)
    fn bind_layout(&mut self) -> Result<()>;

    /// Bind the shader-visible bindless descriptor heaps
    fn set_descriptor_heaps(&mut self) -> Result<()>;

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> Result<()>;

    fn set_vertex_buffer(&mut self, slot: u32, view: &VertexBufferView) -> Result<()>;

    fn set_index_buffer(&mut self, view: &IndexBufferView) -> Result<()>;

    /// Push root constants into one root parameter
    ///
    /// # Arguments
    ///
    /// * `stages` - Shader stages that read the constants
    /// * `param` - Root parameter to write
    /// * `byte_offset` - Offset in bytes within the parameter
    /// * `data` - Data to push (must fit in the parameter)
    fn push_constants(
        &mut self,
        stages: ShaderStages,
        param: RootParam,
        byte_offset: u32,
        data: &[u8],
    ) -> Result<()>;

    /// Begin a render pass with the given attachments
    fn begin_pass(&mut self, info: &PassBeginInfo) -> Result<()>;

    /// End the current render pass
    fn end_pass(&mut self) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()>;

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()>;

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()>;

    /// Dispatch mesh-shader work groups
    fn dispatch_mesh(&mut self, x: u32, y: u32, z: u32) -> Result<()>;

    /// Execute indirect commands from a GPU buffer
    ///
    /// # Arguments
    ///
    /// * `kind` - Command signature kind
    /// * `stride` - Byte stride between commands in the argument buffer
    /// * `args` / `args_offset` - Argument buffer and byte offset
    /// * `count` - Optional (buffer, offset) holding the GPU-written count
    /// * `max_count` - Upper bound on executed commands
    fn execute_indirect(
        &mut self,
        kind: IndirectCommandKind,
        stride: u32,
        args: &Arc<dyn BufferHandle>,
        args_offset: u64,
        count: Option<(&Arc<dyn BufferHandle>, u64)>,
        max_count: u32,
    ) -> Result<()>;

    fn copy_buffer_region(
        &mut self,
        dst: &Arc<dyn BufferHandle>,
        dst_offset: u64,
        src: &Arc<dyn BufferHandle>,
        src_offset: u64,
        size: u64,
    ) -> Result<()>;

    fn copy_buffer_to_texture(
        &mut self,
        dst: &Arc<dyn TextureHandle>,
        src: &Arc<dyn BufferHandle>,
        footprints: &[CopyableFootprint],
    ) -> Result<()>;

    fn copy_texture_to_buffer(
        &mut self,
        dst: &Arc<dyn BufferHandle>,
        src: &Arc<dyn TextureHandle>,
        footprints: &[CopyableFootprint],
    ) -> Result<()>;

    /// Record a batch of resource state transitions
    fn resource_barrier(&mut self, barriers: &[BarrierDesc]) -> Result<()>;

    /// Fill a buffer range with a repeated 32-bit value (clears counters and
    /// PPLL head textures backed by buffers)
    fn fill_buffer(&mut self, dst: &Arc<dyn BufferHandle>, offset: u64, size: u64, value: u32)
        -> Result<()>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Record of a state transition the render graph wants lowered.
///
/// Carries the logical registry identity rather than an RHI handle; the
/// graph resolves handles when recording the barrier batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTransition<Id> {
    pub resource: Id,
    pub range: SubresourceRange,
    pub from: ResourceState,
    pub to: ResourceState,
}
