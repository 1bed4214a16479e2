//! Timeline-semaphore fence

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use ash::vk;

use nebula_3d_engine::error::{Error, Result};
use nebula_3d_engine::rhi::FenceHandle;

use crate::vulkan_context::DeviceShared;

pub struct VulkanFence {
    shared: Arc<DeviceShared>,
    pub semaphore: vk::Semaphore,
}

impl VulkanFence {
    pub fn new(shared: Arc<DeviceShared>, initial_value: u64) -> Result<Arc<Self>> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
        let semaphore = unsafe {
            shared
                .device
                .create_semaphore(&info, None)
                .map_err(|e| Error::BackendError(format!("vkCreateSemaphore: {}", e)))?
        };
        Ok(Arc::new(Self { shared, semaphore }))
    }
}

impl FenceHandle for VulkanFence {
    fn completed_value(&self) -> u64 {
        unsafe {
            self.shared
                .device
                .get_semaphore_counter_value(self.semaphore)
                .unwrap_or(0)
        }
    }

    fn wait(&self, value: u64, timeout: Duration) -> Result<bool> {
        let semaphores = [self.semaphore];
        let values = [value];
        let info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        let timeout_ns = timeout.as_nanos().min(u128::from(u64::MAX)) as u64;
        match unsafe { self.shared.device.wait_semaphores(&info, timeout_ns) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(Error::DeviceLost(format!("vkWaitSemaphores: {}", e))),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        unsafe { self.shared.device.destroy_semaphore(self.semaphore, None) };
    }
}
