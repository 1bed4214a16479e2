/*!
# Nebula 3D Engine - Vulkan renderer

Vulkan implementation of the `nebula_3d_engine` RHI traits, built on `ash`
and `gpu-allocator`.

Device bring-up requires the feature set the engine's binding model depends
on and fails with a Configuration error otherwise:

- Vulkan 1.3 (`synchronization2`, `dynamic_rendering`)
- `VK_EXT_mesh_shader`
- Descriptor indexing with update-after-bind (bindless heaps)
- Timeline semaphores and `drawIndirectCount` (1.2 core)

The backend is headless: render targets come from the engine's resource
manager, presentation is out of scope.
*/

mod vulkan_context;
mod vulkan_device;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_sampler;
mod vulkan_fence;
mod vulkan_pipeline;
mod vulkan_descriptor_heap;
mod vulkan_command_list;
mod vulkan_format;

#[cfg(feature = "vulkan-validation")]
mod vulkan_debug;

pub use vulkan_context::VulkanContext;
pub use vulkan_device::VulkanDevice;
