//! Vulkan buffer handle

use std::any::Any;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use nebula_3d_engine::error::{Error, Result};
use nebula_3d_engine::rhi::{BufferDesc, BufferHandle, BufferUsage, HeapType, ResourceHandle,
    ResourceKind};

use crate::vulkan_context::DeviceShared;

pub struct VulkanBuffer {
    shared: Arc<DeviceShared>,
    pub buffer: vk::Buffer,
    allocation: Mutex<Option<Allocation>>,
    size: u64,
    heap: HeapType,
    name: String,
}

impl VulkanBuffer {
    pub fn new(shared: Arc<DeviceShared>, desc: &BufferDesc) -> Result<Arc<Self>> {
        let mut usage = vk::BufferUsageFlags::empty();
        if desc.usage.contains(BufferUsage::TRANSFER_SRC) {
            usage |= vk::BufferUsageFlags::TRANSFER_SRC;
        }
        if desc.usage.contains(BufferUsage::TRANSFER_DST) {
            usage |= vk::BufferUsageFlags::TRANSFER_DST;
        }
        if desc.usage.contains(BufferUsage::CONSTANT) {
            usage |= vk::BufferUsageFlags::UNIFORM_BUFFER;
        }
        if desc.usage.contains(BufferUsage::STORAGE) {
            usage |= vk::BufferUsageFlags::STORAGE_BUFFER;
        }
        if desc.usage.contains(BufferUsage::INDEX) {
            usage |= vk::BufferUsageFlags::INDEX_BUFFER;
        }
        if desc.usage.contains(BufferUsage::VERTEX) {
            usage |= vk::BufferUsageFlags::VERTEX_BUFFER;
        }
        if desc.usage.contains(BufferUsage::INDIRECT) {
            usage |= vk::BufferUsageFlags::INDIRECT_BUFFER;
        }

        let info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe {
            shared
                .device
                .create_buffer(&info, None)
                .map_err(|e| Error::BackendError(format!("vkCreateBuffer: {}", e)))?
        };
        let requirements = unsafe { shared.device.get_buffer_memory_requirements(buffer) };

        let location = match desc.heap {
            HeapType::Default => MemoryLocation::GpuOnly,
            HeapType::Upload => MemoryLocation::CpuToGpu,
            HeapType::Readback => MemoryLocation::GpuToCpu,
        };
        let allocation = shared.with_allocator(|allocator| {
            allocator.allocate(&AllocationCreateDesc {
                name: &desc.name,
                requirements,
                location,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
        })?;
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(_) => {
                unsafe { shared.device.destroy_buffer(buffer, None) };
                return Err(Error::OutOfMemory);
            }
        };

        unsafe {
            shared
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .map_err(|e| Error::BackendError(format!("vkBindBufferMemory: {}", e)))?;
        }

        Ok(Arc::new(Self {
            shared,
            buffer,
            allocation: Mutex::new(Some(allocation)),
            size: desc.size,
            heap: desc.heap,
            name: desc.name.clone(),
        }))
    }
}

impl ResourceHandle for VulkanBuffer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Buffer
    }
    fn debug_name(&self) -> &str {
        &self.name
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl BufferHandle for VulkanBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn heap(&self) -> HeapType {
        self.heap
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        if self.heap != HeapType::Upload {
            return Err(Error::InvalidResource(format!(
                "buffer '{}' is not host-writable",
                self.name
            )));
        }
        let mut guard = self
            .allocation
            .lock()
            .map_err(|_| Error::BackendError("Allocation lock poisoned".to_string()))?;
        let mapped = guard
            .as_mut()
            .and_then(|a| a.mapped_slice_mut())
            .ok_or_else(|| Error::BackendError("upload buffer not mapped".to_string()))?;
        let offset = offset as usize;
        mapped[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        if self.heap != HeapType::Readback {
            return Err(Error::InvalidResource(format!(
                "buffer '{}' is not host-readable",
                self.name
            )));
        }
        let guard = self
            .allocation
            .lock()
            .map_err(|_| Error::BackendError("Allocation lock poisoned".to_string()))?;
        let mapped = guard
            .as_ref()
            .and_then(|a| a.mapped_slice())
            .ok_or_else(|| Error::BackendError("readback buffer not mapped".to_string()))?;
        let offset = offset as usize;
        out.copy_from_slice(&mapped[offset..offset + out.len()]);
        Ok(())
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.allocation.lock() {
            if let Some(allocation) = guard.take() {
                let _ = self.shared.with_allocator(|allocator| {
                    let _ = allocator.free(allocation);
                });
            }
        }
        unsafe { self.shared.device.destroy_buffer(self.buffer, None) };
    }
}
