//! Vulkan instance and device bring-up
//!
//! Creates the instance, picks a physical device that carries the engine's
//! required feature set, creates the logical device with those features
//! enabled, and wires up the memory allocator. Everything downstream shares
//! the context through `Arc<DeviceShared>`.

use std::ffi::CStr;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};

use nebula_3d_engine::error::{Error, Result};
use nebula_3d_engine::rhi::DeviceCaps;

/// Shader-visible heap capacities requested from the driver
pub const CBV_SRV_UAV_HEAP_CAPACITY: u32 = 1 << 19;
pub const SAMPLER_HEAP_CAPACITY: u32 = 1024;

/// State shared by every Vulkan resource and command list
pub struct DeviceShared {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub mesh_shader: ash::ext::mesh_shader::Device,
    pub graphics_queue: Mutex<vk::Queue>,
    pub graphics_queue_family: u32,
    pub allocator: Mutex<Option<Allocator>>,
    pub caps: DeviceCaps,
}

impl DeviceShared {
    /// Lock the allocator for an allocation or free
    pub fn with_allocator<R>(&self, f: impl FnOnce(&mut Allocator) -> R) -> Result<R> {
        let mut guard = self
            .allocator
            .lock()
            .map_err(|_| Error::BackendError("Allocator lock poisoned".to_string()))?;
        match guard.as_mut() {
            Some(allocator) => Ok(f(allocator)),
            None => Err(Error::BackendError("Allocator already destroyed".to_string())),
        }
    }
}

impl Drop for DeviceShared {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            // The allocator must drop before the device it allocates from
            if let Ok(mut guard) = self.allocator.lock() {
                guard.take();
            }
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Owns the shared device state; handed to `VulkanDevice::new`
pub struct VulkanContext {
    pub shared: Arc<DeviceShared>,
}

impl VulkanContext {
    /// Create a headless Vulkan context with the engine's required features.
    ///
    /// # Errors
    ///
    /// Configuration errors when no physical device supports mesh shaders,
    /// bindless descriptor indexing, synchronization2, dynamic rendering,
    /// timeline semaphores and indirect count draws.
    pub fn new(app_name: &CStr) -> Result<Self> {
        unsafe { Self::create(app_name) }
    }

    unsafe fn create(app_name: &CStr) -> Result<Self> {
        let entry = ash::Entry::load()
            .map_err(|e| Error::Configuration(format!("Vulkan loader: {}", e)))?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"nebula3d")
            .api_version(vk::API_VERSION_1_3);

        #[cfg(feature = "vulkan-validation")]
        let layers = [c"VK_LAYER_KHRONOS_validation".as_ptr()];
        #[cfg(not(feature = "vulkan-validation"))]
        let layers: [*const i8; 0] = [];

        let instance_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layers);
        let instance = entry
            .create_instance(&instance_info, None)
            .map_err(|e| Error::Configuration(format!("vkCreateInstance: {}", e)))?;

        let (physical_device, queue_family) = pick_physical_device(&instance)?;

        let queue_priorities = [1.0f32];
        let queue_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family)
            .queue_priorities(&queue_priorities)];

        let extensions = [ash::ext::mesh_shader::NAME.as_ptr()];

        let mut features_1_2 = vk::PhysicalDeviceVulkan12Features::default()
            .descriptor_indexing(true)
            .shader_sampled_image_array_non_uniform_indexing(true)
            .shader_storage_buffer_array_non_uniform_indexing(true)
            .descriptor_binding_sampled_image_update_after_bind(true)
            .descriptor_binding_storage_buffer_update_after_bind(true)
            .descriptor_binding_storage_image_update_after_bind(true)
            .descriptor_binding_uniform_buffer_update_after_bind(true)
            .descriptor_binding_partially_bound(true)
            .runtime_descriptor_array(true)
            .timeline_semaphore(true)
            .draw_indirect_count(true);
        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default()
            .synchronization2(true)
            .dynamic_rendering(true);
        let mut mesh_features = vk::PhysicalDeviceMeshShaderFeaturesEXT::default()
            .mesh_shader(true)
            .task_shader(true);

        let features = vk::PhysicalDeviceFeatures::default()
            .multi_draw_indirect(true)
            .fill_mode_non_solid(true);

        let device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features)
            .push_next(&mut features_1_2)
            .push_next(&mut features_1_3)
            .push_next(&mut mesh_features);
        let device = instance
            .create_device(physical_device, &device_info, None)
            .map_err(|e| Error::Configuration(format!("vkCreateDevice: {}", e)))?;

        let mesh_shader = ash::ext::mesh_shader::Device::new(&instance, &device);
        let graphics_queue = device.get_device_queue(queue_family, 0);

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| Error::Configuration(format!("allocator: {}", e)))?;

        let limits = instance
            .get_physical_device_properties(physical_device)
            .limits;

        let caps = DeviceCaps {
            mesh_shaders: true,
            bindless: true,
            enhanced_barriers: true,
            draw_indirect_count: true,
            row_pitch_alignment: limits.optimal_buffer_copy_row_pitch_alignment.max(1),
            max_cbv_srv_uav_descriptors: CBV_SRV_UAV_HEAP_CAPACITY,
            max_sampler_descriptors: SAMPLER_HEAP_CAPACITY,
        };

        Ok(Self {
            shared: Arc::new(DeviceShared {
                entry,
                instance,
                physical_device,
                device,
                mesh_shader,
                graphics_queue: Mutex::new(graphics_queue),
                graphics_queue_family: queue_family,
                allocator: Mutex::new(Some(allocator)),
                caps,
            }),
        })
    }
}

/// Pick the first physical device carrying the required feature set and a
/// graphics queue
unsafe fn pick_physical_device(instance: &ash::Instance) -> Result<(vk::PhysicalDevice, u32)> {
    let devices = instance
        .enumerate_physical_devices()
        .map_err(|e| Error::Configuration(format!("enumerate devices: {}", e)))?;

    for device in devices {
        let mut features_1_2 = vk::PhysicalDeviceVulkan12Features::default();
        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default();
        let mut mesh_features = vk::PhysicalDeviceMeshShaderFeaturesEXT::default();
        let mut features = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut features_1_2)
            .push_next(&mut features_1_3)
            .push_next(&mut mesh_features);
        instance.get_physical_device_features2(device, &mut features);

        if features_1_2.descriptor_indexing == vk::FALSE
            || features_1_2.timeline_semaphore == vk::FALSE
            || features_1_2.draw_indirect_count == vk::FALSE
            || features_1_3.synchronization2 == vk::FALSE
            || features_1_3.dynamic_rendering == vk::FALSE
            || mesh_features.mesh_shader == vk::FALSE
        {
            continue;
        }

        let queue_families = instance.get_physical_device_queue_family_properties(device);
        let family = queue_families.iter().position(|props| {
            props
                .queue_flags
                .contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
        });
        if let Some(family) = family {
            return Ok((device, family as u32));
        }
    }

    Err(Error::Configuration(
        "no Vulkan device with mesh shaders, bindless indexing, synchronization2 and \
         indirect count support"
            .to_string(),
    ))
}
