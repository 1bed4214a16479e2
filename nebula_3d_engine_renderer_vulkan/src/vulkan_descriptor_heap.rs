//! Bindless descriptor heaps
//!
//! The engine's two D3D12-style heaps map to two update-after-bind
//! descriptor sets. The CBV/SRV/UAV heap is one set with one binding per
//! Vulkan descriptor type sharing the slot index space (shaders pick the
//! array matching the resource type); the sampler heap is its own set.
//! The fixed pipeline layout carries both sets plus the 80-byte root
//! push-constant block.

use std::sync::Arc;

use ash::vk;

use nebula_3d_engine::error::{Error, Result};
use nebula_3d_engine::rhi::{
    DescriptorHeapHandle, DescriptorHeapKind, DescriptorWrite, SubresourceRange,
    PUSH_CONSTANT_SIZE,
};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::{DeviceShared, CBV_SRV_UAV_HEAP_CAPACITY, SAMPLER_HEAP_CAPACITY};
use crate::vulkan_sampler::VulkanSampler;
use crate::vulkan_texture::VulkanTexture;

/// Binding indices within the CBV/SRV/UAV set
const BINDING_STORAGE_BUFFER: u32 = 0;
const BINDING_UNIFORM_BUFFER: u32 = 1;
const BINDING_SAMPLED_IMAGE: u32 = 2;
const BINDING_STORAGE_IMAGE: u32 = 3;

pub struct HeapInfo {
    kind: DescriptorHeapKind,
    capacity: u32,
}

impl DescriptorHeapHandle for HeapInfo {
    fn heap_kind(&self) -> DescriptorHeapKind {
        self.kind
    }
    fn capacity(&self) -> u32 {
        self.capacity
    }
}

pub struct DescriptorHeaps {
    shared: Arc<DeviceShared>,
    pool: vk::DescriptorPool,
    pub cbv_srv_uav_layout: vk::DescriptorSetLayout,
    pub sampler_layout: vk::DescriptorSetLayout,
    pub cbv_srv_uav_set: vk::DescriptorSet,
    pub sampler_set: vk::DescriptorSet,
    pub pipeline_layout: vk::PipelineLayout,
    pub cbv_srv_uav_info: HeapInfo,
    pub sampler_info: HeapInfo,
}

impl DescriptorHeaps {
    pub fn new(shared: Arc<DeviceShared>) -> Result<Self> {
        unsafe { Self::create(shared) }
    }

    unsafe fn create(shared: Arc<DeviceShared>) -> Result<Self> {
        let device = &shared.device;
        let flags = vk::DescriptorBindingFlags::UPDATE_AFTER_BIND
            | vk::DescriptorBindingFlags::PARTIALLY_BOUND;

        // CBV/SRV/UAV set: four typed arrays sharing one slot space
        let bindings = [
            vk::DescriptorSetLayoutBinding::default()
                .binding(BINDING_STORAGE_BUFFER)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .descriptor_count(CBV_SRV_UAV_HEAP_CAPACITY)
                .stage_flags(vk::ShaderStageFlags::ALL),
            vk::DescriptorSetLayoutBinding::default()
                .binding(BINDING_UNIFORM_BUFFER)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(CBV_SRV_UAV_HEAP_CAPACITY)
                .stage_flags(vk::ShaderStageFlags::ALL),
            vk::DescriptorSetLayoutBinding::default()
                .binding(BINDING_SAMPLED_IMAGE)
                .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
                .descriptor_count(CBV_SRV_UAV_HEAP_CAPACITY)
                .stage_flags(vk::ShaderStageFlags::ALL),
            vk::DescriptorSetLayoutBinding::default()
                .binding(BINDING_STORAGE_IMAGE)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .descriptor_count(CBV_SRV_UAV_HEAP_CAPACITY)
                .stage_flags(vk::ShaderStageFlags::ALL),
        ];
        let binding_flags = [flags; 4];
        let mut flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default()
            .binding_flags(&binding_flags);
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
            .bindings(&bindings)
            .push_next(&mut flags_info);
        let cbv_srv_uav_layout = device
            .create_descriptor_set_layout(&layout_info, None)
            .map_err(|e| Error::BackendError(format!("descriptor set layout: {}", e)))?;

        // Sampler set
        let sampler_bindings = [vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(vk::DescriptorType::SAMPLER)
            .descriptor_count(SAMPLER_HEAP_CAPACITY)
            .stage_flags(vk::ShaderStageFlags::ALL)];
        let sampler_flags = [flags];
        let mut sampler_flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default()
            .binding_flags(&sampler_flags);
        let sampler_layout_info = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
            .bindings(&sampler_bindings)
            .push_next(&mut sampler_flags_info);
        let sampler_layout = device
            .create_descriptor_set_layout(&sampler_layout_info, None)
            .map_err(|e| Error::BackendError(format!("sampler set layout: {}", e)))?;

        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_BUFFER,
                descriptor_count: CBV_SRV_UAV_HEAP_CAPACITY,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: CBV_SRV_UAV_HEAP_CAPACITY,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::SAMPLED_IMAGE,
                descriptor_count: CBV_SRV_UAV_HEAP_CAPACITY,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_IMAGE,
                descriptor_count: CBV_SRV_UAV_HEAP_CAPACITY,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::SAMPLER,
                descriptor_count: SAMPLER_HEAP_CAPACITY,
            },
        ];
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
            .max_sets(2)
            .pool_sizes(&pool_sizes);
        let pool = device
            .create_descriptor_pool(&pool_info, None)
            .map_err(|e| Error::BackendError(format!("descriptor pool: {}", e)))?;

        let layouts = [cbv_srv_uav_layout, sampler_layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = device
            .allocate_descriptor_sets(&alloc_info)
            .map_err(|e| Error::BackendError(format!("descriptor sets: {}", e)))?;

        let push_range = [vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::ALL)
            .offset(0)
            .size(PUSH_CONSTANT_SIZE)];
        let pipeline_layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&layouts)
            .push_constant_ranges(&push_range);
        let pipeline_layout = device
            .create_pipeline_layout(&pipeline_layout_info, None)
            .map_err(|e| Error::BackendError(format!("pipeline layout: {}", e)))?;

        Ok(Self {
            shared,
            pool,
            cbv_srv_uav_layout,
            sampler_layout,
            cbv_srv_uav_set: sets[0],
            sampler_set: sets[1],
            pipeline_layout,
            cbv_srv_uav_info: HeapInfo {
                kind: DescriptorHeapKind::CbvSrvUav,
                capacity: CBV_SRV_UAV_HEAP_CAPACITY,
            },
            sampler_info: HeapInfo {
                kind: DescriptorHeapKind::Sampler,
                capacity: SAMPLER_HEAP_CAPACITY,
            },
        })
    }

    /// Write one bindless descriptor at `slot` (update-after-bind)
    pub fn write(
        &self,
        heap: DescriptorHeapKind,
        slot: u32,
        write: &DescriptorWrite,
    ) -> Result<()> {
        let device = &self.shared.device;
        let mut buffer_info = [vk::DescriptorBufferInfo::default()];
        let mut image_info = [vk::DescriptorImageInfo::default()];

        let descriptor_write = match write {
            DescriptorWrite::BufferSrv { buffer, offset, size, .. }
            | DescriptorWrite::BufferUav { buffer, offset, size, .. } => {
                let vulkan_buffer = buffer
                    .as_any()
                    .downcast_ref::<VulkanBuffer>()
                    .ok_or_else(|| Error::InvalidResource("non-Vulkan buffer".to_string()))?;
                buffer_info[0] = vk::DescriptorBufferInfo {
                    buffer: vulkan_buffer.buffer,
                    offset: *offset,
                    range: *size,
                };
                vk::WriteDescriptorSet::default()
                    .dst_set(self.cbv_srv_uav_set)
                    .dst_binding(BINDING_STORAGE_BUFFER)
                    .dst_array_element(slot)
                    .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                    .buffer_info(&buffer_info)
            }
            DescriptorWrite::BufferCbv { buffer, offset, size } => {
                let vulkan_buffer = buffer
                    .as_any()
                    .downcast_ref::<VulkanBuffer>()
                    .ok_or_else(|| Error::InvalidResource("non-Vulkan buffer".to_string()))?;
                buffer_info[0] = vk::DescriptorBufferInfo {
                    buffer: vulkan_buffer.buffer,
                    offset: *offset,
                    range: *size,
                };
                vk::WriteDescriptorSet::default()
                    .dst_set(self.cbv_srv_uav_set)
                    .dst_binding(BINDING_UNIFORM_BUFFER)
                    .dst_array_element(slot)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&buffer_info)
            }
            DescriptorWrite::TextureSrv { texture, range, cube } => {
                let vulkan_texture = texture
                    .as_any()
                    .downcast_ref::<VulkanTexture>()
                    .ok_or_else(|| Error::InvalidResource("non-Vulkan texture".to_string()))?;
                image_info[0] = vk::DescriptorImageInfo {
                    sampler: vk::Sampler::null(),
                    image_view: vulkan_texture.view(range, *cube)?,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                };
                vk::WriteDescriptorSet::default()
                    .dst_set(self.cbv_srv_uav_set)
                    .dst_binding(BINDING_SAMPLED_IMAGE)
                    .dst_array_element(slot)
                    .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
                    .image_info(&image_info)
            }
            DescriptorWrite::TextureUav { texture, mip, first_slice, slice_count } => {
                let vulkan_texture = texture
                    .as_any()
                    .downcast_ref::<VulkanTexture>()
                    .ok_or_else(|| Error::InvalidResource("non-Vulkan texture".to_string()))?;
                let range = SubresourceRange {
                    first_mip: *mip,
                    mip_count: 1,
                    first_slice: *first_slice,
                    slice_count: *slice_count,
                };
                image_info[0] = vk::DescriptorImageInfo {
                    sampler: vk::Sampler::null(),
                    image_view: vulkan_texture.view(&range, false)?,
                    image_layout: vk::ImageLayout::GENERAL,
                };
                vk::WriteDescriptorSet::default()
                    .dst_set(self.cbv_srv_uav_set)
                    .dst_binding(BINDING_STORAGE_IMAGE)
                    .dst_array_element(slot)
                    .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                    .image_info(&image_info)
            }
            DescriptorWrite::Sampler { sampler } => {
                let vulkan_sampler = sampler
                    .as_any()
                    .downcast_ref::<VulkanSampler>()
                    .ok_or_else(|| Error::InvalidResource("non-Vulkan sampler".to_string()))?;
                image_info[0] = vk::DescriptorImageInfo {
                    sampler: vulkan_sampler.sampler,
                    image_view: vk::ImageView::null(),
                    image_layout: vk::ImageLayout::UNDEFINED,
                };
                vk::WriteDescriptorSet::default()
                    .dst_set(self.sampler_set)
                    .dst_binding(0)
                    .dst_array_element(slot)
                    .descriptor_type(vk::DescriptorType::SAMPLER)
                    .image_info(&image_info)
            }
        };

        if matches!(heap, DescriptorHeapKind::Sampler)
            != matches!(write, DescriptorWrite::Sampler { .. })
        {
            return Err(Error::InvalidResource(
                "descriptor write does not match the target heap".to_string(),
            ));
        }

        unsafe { device.update_descriptor_sets(&[descriptor_write], &[]) };
        Ok(())
    }
}

impl Drop for DescriptorHeaps {
    fn drop(&mut self) {
        unsafe {
            let device = &self.shared.device;
            device.destroy_pipeline_layout(self.pipeline_layout, None);
            device.destroy_descriptor_pool(self.pool, None);
            device.destroy_descriptor_set_layout(self.cbv_srv_uav_layout, None);
            device.destroy_descriptor_set_layout(self.sampler_layout, None);
        }
    }
}
