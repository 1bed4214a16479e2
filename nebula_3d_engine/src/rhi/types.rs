/// RHI value types
///
/// Plain-data vocabulary shared between the engine core and the backends:
/// formats, resource states, barrier masks, attachment descriptions,
/// sampler descriptions and copy footprints.

use bitflags::bitflags;
use std::sync::Arc;

use super::device::{BufferHandle, TextureHandle};

// ===== FORMATS =====

/// Texture and buffer element formats (closed set used by the engine)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Format {
    UNKNOWN,
    R8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_UNORM_SRGB,
    B8G8R8A8_UNORM,
    R10G10B10A2_UNORM,
    R11G11B10_FLOAT,
    R16_FLOAT,
    R16G16_FLOAT,
    R16G16B16A16_FLOAT,
    R32_FLOAT,
    R32_UINT,
    R32G32B32A32_FLOAT,
    D32_FLOAT,
    D24_UNORM_S8_UINT,
}

impl Format {
    /// Size of one pixel in bytes (uncompressed formats only)
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Format::UNKNOWN => 0,
            Format::R8_UNORM => 1,
            Format::R16_FLOAT => 2,
            Format::R8G8B8A8_UNORM
            | Format::R8G8B8A8_UNORM_SRGB
            | Format::B8G8R8A8_UNORM
            | Format::R10G10B10A2_UNORM
            | Format::R11G11B10_FLOAT
            | Format::R16G16_FLOAT
            | Format::R32_FLOAT
            | Format::R32_UINT
            | Format::D32_FLOAT
            | Format::D24_UNORM_S8_UINT => 4,
            Format::R16G16B16A16_FLOAT => 8,
            Format::R32G32B32A32_FLOAT => 16,
        }
    }

    /// Whether this is a depth(-stencil) format
    pub fn is_depth(&self) -> bool {
        matches!(self, Format::D32_FLOAT | Format::D24_UNORM_S8_UINT)
    }
}

// ===== PRIMITIVES / PASS OPS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    TriangleList,
    TriangleStrip,
}

/// Load operation for an attachment at pass begin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

/// Store operation for an attachment at pass end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Store,
    DontCare,
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy)]
pub enum ClearValue {
    /// Color clear value (RGBA)
    Color([f32; 4]),
    /// Depth/stencil clear value
    DepthStencil { depth: f32, stencil: u32 },
}

bitflags! {
    /// Shader stages, used for push-constant visibility and pipeline stages
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX        = 1 << 0;
        const PIXEL         = 1 << 1;
        const COMPUTE       = 1 << 2;
        const AMPLIFICATION = 1 << 3;
        const MESH          = 1 << 4;
        const ALL = Self::VERTEX.bits() | Self::PIXEL.bits() | Self::COMPUTE.bits()
                  | Self::AMPLIFICATION.bits() | Self::MESH.bits();
    }
}

// ===== RESOURCE STATES =====

/// Logical resource states tracked by the render graph.
///
/// Closed enum; backends lower state pairs to their native barrier
/// vocabulary via [`ResourceState::barrier_parts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Unknown,
    Common,
    /// Readable from any shader stage
    AllSrv,
    /// Readable from non-pixel stages only
    NonPixelSrv,
    /// Readable from the pixel stage only
    PixelSrv,
    /// Bound as a constant buffer
    Constant,
    RenderTarget,
    DepthWrite,
    DepthRead,
    UnorderedAccess,
    CopySource,
    CopyDest,
    IndirectArgument,
    IndexBuffer,
}

impl ResourceState {
    /// Whether the state only reads the resource
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            ResourceState::AllSrv
                | ResourceState::NonPixelSrv
                | ResourceState::PixelSrv
                | ResourceState::Constant
                | ResourceState::DepthRead
                | ResourceState::CopySource
                | ResourceState::IndirectArgument
                | ResourceState::IndexBuffer
        )
    }

    /// Try to merge two read states required within the same batch.
    ///
    /// The SRV sub-states compose (`NonPixelSrv` + `PixelSrv` = `AllSrv`);
    /// all other read states only merge with themselves. Write states never
    /// merge.
    pub fn merge(self, other: ResourceState) -> Option<ResourceState> {
        if self == other {
            return Some(self);
        }
        let srv = |s: ResourceState| {
            matches!(
                s,
                ResourceState::AllSrv | ResourceState::NonPixelSrv | ResourceState::PixelSrv
            )
        };
        if srv(self) && srv(other) {
            return Some(ResourceState::AllSrv);
        }
        None
    }

    /// Lower this state to enhanced-barrier sync/access/layout masks
    pub fn barrier_parts(&self) -> (BarrierSync, BarrierAccess, BarrierLayout) {
        match self {
            ResourceState::Unknown | ResourceState::Common => {
                (BarrierSync::NONE, BarrierAccess::NO_ACCESS, BarrierLayout::Common)
            }
            ResourceState::AllSrv => (
                BarrierSync::ALL_SHADING,
                BarrierAccess::SHADER_RESOURCE,
                BarrierLayout::ShaderResource,
            ),
            ResourceState::NonPixelSrv => (
                BarrierSync::NON_PIXEL_SHADING,
                BarrierAccess::SHADER_RESOURCE,
                BarrierLayout::ShaderResource,
            ),
            ResourceState::PixelSrv => (
                BarrierSync::PIXEL_SHADING,
                BarrierAccess::SHADER_RESOURCE,
                BarrierLayout::ShaderResource,
            ),
            ResourceState::Constant => (
                BarrierSync::ALL_SHADING,
                BarrierAccess::CONSTANT_BUFFER,
                BarrierLayout::Undefined,
            ),
            ResourceState::RenderTarget => (
                BarrierSync::RENDER_TARGET,
                BarrierAccess::RENDER_TARGET,
                BarrierLayout::RenderTarget,
            ),
            ResourceState::DepthWrite => (
                BarrierSync::DEPTH_STENCIL,
                BarrierAccess::DEPTH_STENCIL_WRITE,
                BarrierLayout::DepthStencilWrite,
            ),
            ResourceState::DepthRead => (
                BarrierSync::DEPTH_STENCIL,
                BarrierAccess::DEPTH_STENCIL_READ,
                BarrierLayout::DepthStencilRead,
            ),
            ResourceState::UnorderedAccess => (
                BarrierSync::ALL_SHADING,
                BarrierAccess::UNORDERED_ACCESS,
                BarrierLayout::UnorderedAccess,
            ),
            ResourceState::CopySource => {
                (BarrierSync::COPY, BarrierAccess::COPY_SOURCE, BarrierLayout::CopySource)
            }
            ResourceState::CopyDest => {
                (BarrierSync::COPY, BarrierAccess::COPY_DEST, BarrierLayout::CopyDest)
            }
            ResourceState::IndirectArgument => (
                BarrierSync::EXECUTE_INDIRECT,
                BarrierAccess::INDIRECT_ARGUMENT,
                BarrierLayout::Undefined,
            ),
            ResourceState::IndexBuffer => (
                BarrierSync::INDEX_INPUT,
                BarrierAccess::INDEX_BUFFER,
                BarrierLayout::Undefined,
            ),
        }
    }
}

bitflags! {
    /// Pipeline synchronization scopes for enhanced barriers
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BarrierSync: u32 {
        const NONE              = 0;
        const ALL               = 1 << 0;
        const DRAW              = 1 << 1;
        const INDEX_INPUT       = 1 << 2;
        const VERTEX_SHADING    = 1 << 3;
        const PIXEL_SHADING     = 1 << 4;
        const NON_PIXEL_SHADING = 1 << 5;
        const ALL_SHADING       = 1 << 6;
        const DEPTH_STENCIL     = 1 << 7;
        const RENDER_TARGET     = 1 << 8;
        const COMPUTE_SHADING   = 1 << 9;
        const COPY              = 1 << 10;
        const EXECUTE_INDIRECT  = 1 << 11;
    }
}

bitflags! {
    /// Memory access kinds for enhanced barriers
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BarrierAccess: u32 {
        const NO_ACCESS           = 0;
        const VERTEX_BUFFER       = 1 << 0;
        const CONSTANT_BUFFER     = 1 << 1;
        const INDEX_BUFFER        = 1 << 2;
        const RENDER_TARGET       = 1 << 3;
        const UNORDERED_ACCESS    = 1 << 4;
        const DEPTH_STENCIL_WRITE = 1 << 5;
        const DEPTH_STENCIL_READ  = 1 << 6;
        const SHADER_RESOURCE     = 1 << 7;
        const INDIRECT_ARGUMENT   = 1 << 8;
        const COPY_DEST           = 1 << 9;
        const COPY_SOURCE         = 1 << 10;
    }
}

/// Image layouts for enhanced barriers (ignored for buffers)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierLayout {
    Undefined,
    Common,
    ShaderResource,
    RenderTarget,
    DepthStencilWrite,
    DepthStencilRead,
    UnorderedAccess,
    CopySource,
    CopyDest,
}

// ===== SUBRESOURCES =====

/// A rectangular range of texture subresources (mips x array slices).
///
/// Ranges handed to the render graph may be open-ended
/// ([`SubresourceRange::ALL_REMAINING`]); the graph normalizes them against
/// the resource description before tracking, so tracked ranges are always
/// concrete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubresourceRange {
    pub first_mip: u32,
    pub mip_count: u32,
    pub first_slice: u32,
    pub slice_count: u32,
}

impl SubresourceRange {
    /// Sentinel count meaning "all remaining mips/slices"
    pub const ALL_REMAINING: u32 = u32::MAX;

    /// The whole resource (open-ended)
    pub const ALL: SubresourceRange = SubresourceRange {
        first_mip: 0,
        mip_count: Self::ALL_REMAINING,
        first_slice: 0,
        slice_count: Self::ALL_REMAINING,
    };

    /// A concrete mip range over all slices (open-ended on slices)
    pub fn mips(first_mip: u32, mip_count: u32) -> Self {
        Self {
            first_mip,
            mip_count,
            first_slice: 0,
            slice_count: Self::ALL_REMAINING,
        }
    }

    /// A single (mip, slice) subresource
    pub fn single(mip: u32, slice: u32) -> Self {
        Self {
            first_mip: mip,
            mip_count: 1,
            first_slice: slice,
            slice_count: 1,
        }
    }

    /// Clamp open-ended counts against the resource's mip/layer counts
    pub fn normalized(&self, mip_levels: u32, array_layers: u32) -> Self {
        let mip_count = if self.mip_count == Self::ALL_REMAINING {
            mip_levels.saturating_sub(self.first_mip)
        } else {
            self.mip_count
        };
        let slice_count = if self.slice_count == Self::ALL_REMAINING {
            array_layers.saturating_sub(self.first_slice)
        } else {
            self.slice_count
        };
        Self {
            first_mip: self.first_mip,
            mip_count,
            first_slice: self.first_slice,
            slice_count,
        }
    }

    /// Whether two concrete ranges share any (mip, slice) pair
    pub fn overlaps(&self, other: &SubresourceRange) -> bool {
        let mips = self.first_mip < other.first_mip + other.mip_count
            && other.first_mip < self.first_mip + self.mip_count;
        let slices = self.first_slice < other.first_slice + other.slice_count
            && other.first_slice < self.first_slice + self.slice_count;
        mips && slices
    }

    /// Whether this concrete range fully contains another
    pub fn contains(&self, other: &SubresourceRange) -> bool {
        self.first_mip <= other.first_mip
            && self.first_mip + self.mip_count >= other.first_mip + other.mip_count
            && self.first_slice <= other.first_slice
            && self.first_slice + self.slice_count >= other.first_slice + other.slice_count
    }

    /// Number of subresources covered
    pub fn subresource_count(&self) -> u32 {
        self.mip_count * self.slice_count
    }
}

// ===== HEAPS AND USAGE FLAGS =====

/// Memory heap a resource is allocated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapType {
    /// Device-local memory
    Default,
    /// Host-visible, write-combined (upload ring, staging)
    Upload,
    /// Host-visible, cached (readback)
    Readback,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const CONSTANT     = 1 << 2;
        const STORAGE      = 1 << 3;
        const INDEX        = 1 << 4;
        const VERTEX       = 1 << 5;
        const INDIRECT     = 1 << 6;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TextureUsage: u32 {
        const TRANSFER_SRC  = 1 << 0;
        const TRANSFER_DST  = 1 << 1;
        const SAMPLED       = 1 << 2;
        const STORAGE       = 1 << 3;
        const RENDER_TARGET = 1 << 4;
        const DEPTH_STENCIL = 1 << 5;
    }
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    pub size: u64,
    pub heap: HeapType,
    pub usage: BufferUsage,
    pub name: String,
}

/// Descriptor for creating a texture (2D, 2D array or cube)
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub cubemap: bool,
    pub format: Format,
    pub usage: TextureUsage,
    pub name: String,
}

impl TextureDesc {
    /// Total number of subresources (mips x layers)
    pub fn subresource_count(&self) -> u32 {
        self.mip_levels * self.array_layers
    }

    /// Extent of the given mip level
    pub fn mip_extent(&self, mip: u32) -> (u32, u32) {
        ((self.width >> mip).max(1), (self.height >> mip).max(1))
    }
}

/// Initial pixel data for one (mip, slice) subresource at texture creation
#[derive(Debug, Clone)]
pub struct TextureSubresourceData {
    pub mip: u32,
    pub slice: u32,
    pub data: Vec<u8>,
}

// ===== SAMPLERS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MipFilter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReductionMode {
    WeightedAverage,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderPreset {
    TransparentBlack,
    OpaqueBlack,
    OpaqueWhite,
}

/// Sampler description.
///
/// Hash/Eq treat the LOD floats by bit pattern so descriptions can key the
/// sampler deduplication cache.
#[derive(Debug, Clone, Copy)]
pub struct SamplerDesc {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub mip_filter: MipFilter,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub lod_min: f32,
    pub lod_max: f32,
    pub border: BorderPreset,
    pub compare: Option<CompareOp>,
    pub reduction: ReductionMode,
    pub max_anisotropy: u8,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            mip_filter: MipFilter::Linear,
            address_u: AddressMode::Repeat,
            address_v: AddressMode::Repeat,
            address_w: AddressMode::Repeat,
            lod_min: 0.0,
            lod_max: f32::MAX,
            border: BorderPreset::OpaqueBlack,
            compare: None,
            reduction: ReductionMode::WeightedAverage,
            max_anisotropy: 1,
        }
    }
}

impl PartialEq for SamplerDesc {
    fn eq(&self, other: &Self) -> bool {
        self.min_filter == other.min_filter
            && self.mag_filter == other.mag_filter
            && self.mip_filter == other.mip_filter
            && self.address_u == other.address_u
            && self.address_v == other.address_v
            && self.address_w == other.address_w
            && self.lod_min.to_bits() == other.lod_min.to_bits()
            && self.lod_max.to_bits() == other.lod_max.to_bits()
            && self.border == other.border
            && self.compare == other.compare
            && self.reduction == other.reduction
            && self.max_anisotropy == other.max_anisotropy
    }
}

impl Eq for SamplerDesc {}

impl std::hash::Hash for SamplerDesc {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.min_filter.hash(state);
        self.mag_filter.hash(state);
        self.mip_filter.hash(state);
        self.address_u.hash(state);
        self.address_v.hash(state);
        self.address_w.hash(state);
        self.lod_min.to_bits().hash(state);
        self.lod_max.to_bits().hash(state);
        self.border.hash(state);
        self.compare.hash(state);
        self.reduction.hash(state);
        self.max_anisotropy.hash(state);
    }
}

// ===== ATTACHMENTS AND PASS BEGIN =====

/// Color attachment bound at pass begin (one mip, one slice)
#[derive(Clone)]
pub struct ColorAttachment {
    pub texture: Arc<dyn TextureHandle>,
    pub mip: u32,
    pub slice: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear: ClearValue,
}

/// Depth attachment bound at pass begin
#[derive(Clone)]
pub struct DepthAttachment {
    pub texture: Arc<dyn TextureHandle>,
    pub mip: u32,
    pub slice: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear: ClearValue,
    /// Depth-read-only pass (depth test without write)
    pub read_only: bool,
}

/// Everything a backend needs to begin a render pass
#[derive(Clone, Default)]
pub struct PassBeginInfo {
    pub color_attachments: Vec<ColorAttachment>,
    pub depth_attachment: Option<DepthAttachment>,
    /// Render area (width, height); derived from the attachments' mip extent
    pub render_area: (u32, u32),
}

// ===== VERTEX / INDEX VIEWS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Vertex buffer binding for the traditional (non-mesh-shader) path
#[derive(Clone)]
pub struct VertexBufferView {
    pub buffer: Arc<dyn BufferHandle>,
    pub offset: u64,
    pub size: u64,
    pub stride: u32,
}

/// Index buffer binding
#[derive(Clone)]
pub struct IndexBufferView {
    pub buffer: Arc<dyn BufferHandle>,
    pub offset: u64,
    pub size: u64,
    pub index_type: IndexType,
}

// ===== BARRIERS (COMMAND LIST LEVEL) =====

/// One texture state transition, lowered by the backend to its native barrier
#[derive(Clone)]
pub struct TextureBarrier {
    pub texture: Arc<dyn TextureHandle>,
    pub range: SubresourceRange,
    pub from: ResourceState,
    pub to: ResourceState,
}

/// One buffer state transition
#[derive(Clone)]
pub struct BufferBarrier {
    pub buffer: Arc<dyn BufferHandle>,
    pub from: ResourceState,
    pub to: ResourceState,
}

/// A batch entry for `CommandList::resource_barrier`
#[derive(Clone)]
pub enum BarrierDesc {
    Texture(TextureBarrier),
    Buffer(BufferBarrier),
}

// ===== COPY FOOTPRINTS =====

/// Placement of one (mip, slice) subresource within a linear buffer
#[derive(Debug, Clone, Copy)]
pub struct CopyableFootprint {
    pub mip: u32,
    pub slice: u32,
    pub buffer_offset: u64,
    /// Row pitch in bytes, aligned to the device's row pitch alignment
    pub row_pitch: u64,
    pub width: u32,
    pub height: u32,
    /// Tightly packed bytes per row (width * bytes_per_pixel)
    pub row_size: u64,
}

impl CopyableFootprint {
    /// Total (pitched) byte size of this footprint
    pub fn total_bytes(&self) -> u64 {
        self.row_pitch * u64::from(self.height)
    }
}

/// Subresource range selector for footprint queries
#[derive(Debug, Clone, Copy)]
pub struct FootprintRangeDesc {
    pub first_mip: u32,
    pub mip_count: u32,
    pub first_slice: u32,
    pub slice_count: u32,
}

/// Alignment of each subresource placement within a copy buffer
pub const FOOTPRINT_PLACEMENT_ALIGNMENT: u64 = 512;

/// Compute the linear-buffer footprints for a range of texture subresources.
///
/// Slices are laid out outermost, mips innermost, each placement aligned to
/// [`FOOTPRINT_PLACEMENT_ALIGNMENT`] and each row to `row_pitch_alignment`.
/// Returns the footprints and the total buffer size required.
pub fn copyable_footprints(
    desc: &TextureDesc,
    range: &FootprintRangeDesc,
    row_pitch_alignment: u64,
    base_offset: u64,
) -> (Vec<CopyableFootprint>, u64) {
    let bpp = u64::from(desc.format.bytes_per_pixel());
    let mut footprints = Vec::with_capacity((range.mip_count * range.slice_count) as usize);
    let mut offset = base_offset;
    for slice in range.first_slice..range.first_slice + range.slice_count {
        for mip in range.first_mip..range.first_mip + range.mip_count {
            let (width, height) = desc.mip_extent(mip);
            let row_size = u64::from(width) * bpp;
            let row_pitch = row_size.div_ceil(row_pitch_alignment) * row_pitch_alignment;
            offset = offset.div_ceil(FOOTPRINT_PLACEMENT_ALIGNMENT)
                * FOOTPRINT_PLACEMENT_ALIGNMENT;
            footprints.push(CopyableFootprint {
                mip,
                slice,
                buffer_offset: offset,
                row_pitch,
                width,
                height,
                row_size,
            });
            offset += row_pitch * u64::from(height);
        }
    }
    (footprints, offset - base_offset)
}

// ===== INDIRECT EXECUTION =====

/// Command signature kind for `execute_indirect`.
///
/// The engine's indirect argument structs carry root constants followed by
/// the native draw/dispatch arguments; the backend only needs the kind and
/// the stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndirectCommandKind {
    DrawIndexed,
    DispatchMesh,
    Dispatch,
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

/// 2D rectangle
#[derive(Debug, Clone, Copy)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
