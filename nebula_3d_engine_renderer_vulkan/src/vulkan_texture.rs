//! Vulkan texture handle
//!
//! Owns the image, its allocation and a lazily built cache of per-(mip,
//! slice-range) views used by attachments and descriptor writes. Initial
//! subresource data uploads through a one-shot staging buffer.

use std::any::Any;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use rustc_hash::FxHashMap;

use nebula_3d_engine::error::{Error, Result};
use nebula_3d_engine::rhi::{
    ResourceHandle, ResourceKind, SubresourceRange, TextureDesc, TextureHandle,
    TextureSubresourceData, TextureUsage,
};

use crate::vulkan_context::DeviceShared;
use crate::vulkan_format;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct ViewKey {
    first_mip: u32,
    mip_count: u32,
    first_slice: u32,
    slice_count: u32,
    cube: bool,
}

pub struct VulkanTexture {
    shared: Arc<DeviceShared>,
    pub image: vk::Image,
    allocation: Mutex<Option<Allocation>>,
    desc: TextureDesc,
    views: Mutex<FxHashMap<ViewKey, vk::ImageView>>,
}

impl VulkanTexture {
    pub fn new(
        shared: Arc<DeviceShared>,
        desc: &TextureDesc,
        initial_data: &[TextureSubresourceData],
    ) -> Result<Arc<Self>> {
        let mut usage = vk::ImageUsageFlags::empty();
        if desc.usage.contains(TextureUsage::TRANSFER_SRC) {
            usage |= vk::ImageUsageFlags::TRANSFER_SRC;
        }
        if desc.usage.contains(TextureUsage::TRANSFER_DST) {
            usage |= vk::ImageUsageFlags::TRANSFER_DST;
        }
        if desc.usage.contains(TextureUsage::SAMPLED) {
            usage |= vk::ImageUsageFlags::SAMPLED;
        }
        if desc.usage.contains(TextureUsage::STORAGE) {
            usage |= vk::ImageUsageFlags::STORAGE;
        }
        if desc.usage.contains(TextureUsage::RENDER_TARGET) {
            usage |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
        }
        if desc.usage.contains(TextureUsage::DEPTH_STENCIL) {
            usage |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
        }

        let mut flags = vk::ImageCreateFlags::empty();
        if desc.cubemap {
            flags |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
        }

        let info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(vk::ImageType::TYPE_2D)
            .format(vulkan_format::format(desc.format))
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(desc.array_layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe {
            shared
                .device
                .create_image(&info, None)
                .map_err(|e| Error::BackendError(format!("vkCreateImage: {}", e)))?
        };
        let requirements = unsafe { shared.device.get_image_memory_requirements(image) };
        let allocation = shared.with_allocator(|allocator| {
            allocator.allocate(&AllocationCreateDesc {
                name: &desc.name,
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
        })?;
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(_) => {
                unsafe { shared.device.destroy_image(image, None) };
                return Err(Error::OutOfMemory);
            }
        };
        unsafe {
            shared
                .device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
                .map_err(|e| Error::BackendError(format!("vkBindImageMemory: {}", e)))?;
        }

        let texture = Arc::new(Self {
            shared,
            image,
            allocation: Mutex::new(Some(allocation)),
            desc: desc.clone(),
            views: Mutex::new(FxHashMap::default()),
        });

        if !initial_data.is_empty() {
            texture.upload_initial_data(initial_data)?;
        }
        Ok(texture)
    }

    pub fn aspect(&self) -> vk::ImageAspectFlags {
        if self.desc.format.is_depth() {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        }
    }

    /// Get (or create) a view over a subresource range
    pub fn view(&self, range: &SubresourceRange, cube: bool) -> Result<vk::ImageView> {
        let range = range.normalized(self.desc.mip_levels, self.desc.array_layers);
        let key = ViewKey {
            first_mip: range.first_mip,
            mip_count: range.mip_count,
            first_slice: range.first_slice,
            slice_count: range.slice_count,
            cube,
        };
        let mut views = self
            .views
            .lock()
            .map_err(|_| Error::BackendError("View cache lock poisoned".to_string()))?;
        if let Some(&view) = views.get(&key) {
            return Ok(view);
        }

        let view_type = if cube {
            vk::ImageViewType::CUBE
        } else if range.slice_count > 1 {
            vk::ImageViewType::TYPE_2D_ARRAY
        } else {
            vk::ImageViewType::TYPE_2D
        };
        let info = vk::ImageViewCreateInfo::default()
            .image(self.image)
            .view_type(view_type)
            .format(vulkan_format::format(self.desc.format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.aspect(),
                base_mip_level: range.first_mip,
                level_count: range.mip_count,
                base_array_layer: range.first_slice,
                layer_count: range.slice_count,
            });
        let view = unsafe {
            self.shared
                .device
                .create_image_view(&info, None)
                .map_err(|e| Error::BackendError(format!("vkCreateImageView: {}", e)))?
        };
        views.insert(key, view);
        Ok(view)
    }

    /// One-shot staging upload of initial subresource data
    fn upload_initial_data(&self, initial_data: &[TextureSubresourceData]) -> Result<()> {
        use nebula_3d_engine::rhi::{BufferDesc, BufferUsage, HeapType};
        use crate::vulkan_buffer::VulkanBuffer;

        let total: u64 = initial_data.iter().map(|d| d.data.len() as u64 + 256).sum();
        let staging = VulkanBuffer::new(
            self.shared.clone(),
            &BufferDesc {
                size: total,
                heap: HeapType::Upload,
                usage: BufferUsage::TRANSFER_SRC,
                name: format!("Staging:{}", self.desc.name),
            },
        )?;

        let mut regions = Vec::with_capacity(initial_data.len());
        let mut offset = 0u64;
        for data in initial_data {
            use nebula_3d_engine::rhi::BufferHandle as _;
            staging.write(offset, &data.data)?;
            let (width, height) = self.desc.mip_extent(data.mip);
            regions.push(vk::BufferImageCopy {
                buffer_offset: offset,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: self.aspect(),
                    mip_level: data.mip,
                    base_array_layer: data.slice,
                    layer_count: 1,
                },
                image_offset: vk::Offset3D::default(),
                image_extent: vk::Extent3D {
                    width,
                    height,
                    depth: 1,
                },
            });
            offset += data.data.len() as u64;
            offset = offset.div_ceil(256) * 256;
        }

        // Record the copy on a transient command buffer and wait
        unsafe {
            let device = &self.shared.device;
            let pool_info = vk::CommandPoolCreateInfo::default()
                .flags(vk::CommandPoolCreateFlags::TRANSIENT)
                .queue_family_index(self.shared.graphics_queue_family);
            let pool = device
                .create_command_pool(&pool_info, None)
                .map_err(|e| Error::BackendError(format!("vkCreateCommandPool: {}", e)))?;
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let cb = device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| Error::BackendError(format!("vkAllocateCommandBuffers: {}", e)))?[0];

            let begin = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(cb, &begin)
                .map_err(|e| Error::BackendError(format!("vkBeginCommandBuffer: {}", e)))?;

            let whole = vk::ImageSubresourceRange {
                aspect_mask: self.aspect(),
                base_mip_level: 0,
                level_count: self.desc.mip_levels,
                base_array_layer: 0,
                layer_count: self.desc.array_layers,
            };
            let to_transfer = vk::ImageMemoryBarrier2::default()
                .src_stage_mask(vk::PipelineStageFlags2::NONE)
                .dst_stage_mask(vk::PipelineStageFlags2::COPY)
                .dst_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .image(self.image)
                .subresource_range(whole);
            let barriers = [to_transfer];
            let dep = vk::DependencyInfo::default().image_memory_barriers(&barriers);
            device.cmd_pipeline_barrier2(cb, &dep);

            device.cmd_copy_buffer_to_image(
                cb,
                staging.buffer,
                self.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );

            let to_general = vk::ImageMemoryBarrier2::default()
                .src_stage_mask(vk::PipelineStageFlags2::COPY)
                .src_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
                .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::GENERAL)
                .image(self.image)
                .subresource_range(whole);
            let barriers = [to_general];
            let dep = vk::DependencyInfo::default().image_memory_barriers(&barriers);
            device.cmd_pipeline_barrier2(cb, &dep);

            device
                .end_command_buffer(cb)
                .map_err(|e| Error::BackendError(format!("vkEndCommandBuffer: {}", e)))?;

            let queue = self
                .shared
                .graphics_queue
                .lock()
                .map_err(|_| Error::BackendError("Queue lock poisoned".to_string()))?;
            let cbs = [cb];
            let submit = vk::SubmitInfo::default().command_buffers(&cbs);
            device
                .queue_submit(*queue, &[submit], vk::Fence::null())
                .map_err(|e| Error::BackendError(format!("vkQueueSubmit: {}", e)))?;
            device
                .queue_wait_idle(*queue)
                .map_err(|e| Error::BackendError(format!("vkQueueWaitIdle: {}", e)))?;
            device.destroy_command_pool(pool, None);
        }
        Ok(())
    }
}

impl ResourceHandle for VulkanTexture {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Texture
    }
    fn debug_name(&self) -> &str {
        &self.desc.name
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl TextureHandle for VulkanTexture {
    fn desc(&self) -> &TextureDesc {
        &self.desc
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            if let Ok(views) = self.views.lock() {
                for view in views.values() {
                    self.shared.device.destroy_image_view(*view, None);
                }
            }
            if let Ok(mut guard) = self.allocation.lock() {
                if let Some(allocation) = guard.take() {
                    let _ = self.shared.with_allocator(|allocator| {
                        let _ = allocator.free(allocation);
                    });
                }
            }
            self.shared.device.destroy_image(self.image, None);
        }
    }
}
