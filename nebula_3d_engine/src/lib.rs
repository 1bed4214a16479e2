/*!
# Nebula 3D Engine

Frame-graph-driven, bindless, meshlet-based rendering engine core.

The crate is organized around four tightly-coupled subsystems:

- **Render graph** (`render_graph`): declarative pass registration with
  per-subresource usage declarations, batch compilation with exact barrier
  transitions and a terminal loop-back batch, input-hash caching, and
  single-queue execution.
- **Bindless resources** (`resources`, `rhi`): every buffer and texture
  carries stable shader-visible descriptor slots handed out at creation;
  dynamic pools suballocate `BufferView` ranges; uploads stream through a
  host-visible ring.
- **Mesh & scene data model** (`mesh`, `material`, `ecs`, `scene`):
  meshlet-based meshes with an optional cluster-LOD hierarchy, one-mesh
  many-instances indirection, and an ECS-driven scene with cached queries.
- **Indirect workloads** (`managers`): per-(view, render-phase,
  compile-flags) indirect command buffers populated by GPU culling and
  consumed by pass execution.

Backends implement the `rhi` traits; the Vulkan implementation lives in the
`nebula_3d_engine_renderer_vulkan` crate. `rhi::mock_device::MockDevice`
drives the whole engine headless for tests.
*/

// Error handling and logging
pub mod error;
pub mod log;

// Settings surface
pub mod settings;

// RHI abstraction (traits + value types + mock device)
pub mod rhi;

// GPU-facing constant-buffer layouts
pub mod shader_buffers;

// Resource layer (bindless wrappers, pools, upload, deletion, readback)
pub mod resources;

// Data model
pub mod mesh;
pub mod material;
pub mod camera;
pub mod ecs;
pub mod scene;

// Managers (ManagerInterface redesign)
pub mod managers;

// Render graph and passes
pub mod render_graph;
pub mod passes;

// Engine orchestration
pub mod engine;

// Small utilities
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export the engine entry point
pub use engine::RenderEngine;

// Re-export math library
pub use glam;
