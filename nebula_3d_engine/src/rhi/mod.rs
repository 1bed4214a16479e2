/// RHI abstraction - thin portable surface over an explicit graphics API
///
/// The engine core records every GPU operation through these traits and
/// value types. The Vulkan backend crate provides the real implementation;
/// `MockDevice` (test builds only) provides a CPU-side implementation with
/// backing memory so the engine's algorithms are testable without a GPU.

// Module declarations
pub mod types;
pub mod binding;
pub mod device;

// Re-export everything from the submodules
pub use types::*;
pub use binding::*;
pub use device::*;

// Mock device for tests (no GPU required). Kept unconditionally compiled so
// integration tests and downstream crates can drive the engine headless.
pub mod mock_device;
