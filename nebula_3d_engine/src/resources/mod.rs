/// GPU resource layer
///
/// Engine-side wrappers over RHI handles (bindless slot sets + tracked
/// state), the suballocating dynamic buffer pools, the upload ring, deferred
/// deletion and readback.

pub mod tracked;
pub mod buffer;
pub mod pixel_buffer;
pub mod sampler;
pub mod dynamic_buffer;
pub mod upload;
pub mod deletion;
pub mod readback;
pub mod resource_manager;

pub use tracked::TrackedState;

/// Frame identity used by resource plumbing: the monotonically increasing
/// frame counter plus the frame-in-flight slot it maps to.
#[derive(Debug, Clone, Copy)]
pub struct FrameTick {
    /// Monotonic frame counter (never wraps in practice)
    pub frame: u64,
    /// `frame % num_frames_in_flight`
    pub slot: usize,
}

/// Borrowed bundle of the resource-side services a manager needs to touch
/// GPU memory. This is the explicit replacement for the original's
/// process-wide singletons: callers assemble it from the pieces they own and
/// hand it down.
pub struct GpuServices<'a> {
    pub resources: &'a mut resource_manager::ResourceManager,
    pub upload: &'a mut upload::UploadManager,
    pub deletion: &'a mut deletion::DeletionManager,
    pub tick: FrameTick,
}
pub use buffer::{BindlessSlots, BufferCreateInfo, GpuBuffer};
pub use pixel_buffer::{PixelBuffer, TextureDescription};
pub use sampler::Sampler;
pub use dynamic_buffer::{BufferView, DynamicBuffer};
pub use upload::{FrameReplication, UploadManager};
pub use deletion::DeletionManager;
pub use readback::ReadbackManager;
pub use resource_manager::ResourceManager;
