//! VulkanDevice - the `rhi::Device` implementation

use std::sync::Arc;

use ash::vk;

use nebula_3d_engine::error::{Error, Result};
use nebula_3d_engine::rhi::{
    BufferDesc, BufferHandle, CommandList, ComputePipelineDesc, DescriptorHeapHandle,
    DescriptorHeapKind, DescriptorWrite, Device, DeviceCaps, FenceHandle, GraphicsPipelineDesc,
    PipelineHandle, QueueKind, SamplerDesc, SamplerHandle, TextureDesc, TextureHandle,
    TextureSubresourceData,
};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::VulkanCommandList;
use crate::vulkan_context::{DeviceShared, VulkanContext};
use crate::vulkan_descriptor_heap::DescriptorHeaps;
use crate::vulkan_fence::VulkanFence;
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_sampler::VulkanSampler;
use crate::vulkan_texture::VulkanTexture;

pub struct VulkanDevice {
    shared: Arc<DeviceShared>,
    heaps: Arc<DescriptorHeaps>,
}

impl VulkanDevice {
    pub fn new(context: VulkanContext) -> Result<Self> {
        let shared = context.shared;
        let heaps = Arc::new(DescriptorHeaps::new(shared.clone())?);
        Ok(Self { shared, heaps })
    }
}

impl Device for VulkanDevice {
    fn caps(&self) -> &DeviceCaps {
        &self.shared.caps
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<Arc<dyn BufferHandle>> {
        let buffer: Arc<dyn BufferHandle> = VulkanBuffer::new(self.shared.clone(), desc)?;
        Ok(buffer)
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        initial_data: &[TextureSubresourceData],
    ) -> Result<Arc<dyn TextureHandle>> {
        let texture: Arc<dyn TextureHandle> =
            VulkanTexture::new(self.shared.clone(), desc, initial_data)?;
        Ok(texture)
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<Arc<dyn SamplerHandle>> {
        let sampler: Arc<dyn SamplerHandle> = VulkanSampler::new(self.shared.clone(), desc)?;
        Ok(sampler)
    }

    fn create_fence(&mut self, initial_value: u64) -> Result<Arc<dyn FenceHandle>> {
        let fence: Arc<dyn FenceHandle> = VulkanFence::new(self.shared.clone(), initial_value)?;
        Ok(fence)
    }

    fn create_graphics_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
    ) -> Result<Arc<dyn PipelineHandle>> {
        let pipeline: Arc<dyn PipelineHandle> =
            VulkanPipeline::graphics(self.shared.clone(), self.heaps.pipeline_layout, desc)?;
        Ok(pipeline)
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDesc,
    ) -> Result<Arc<dyn PipelineHandle>> {
        let pipeline: Arc<dyn PipelineHandle> =
            VulkanPipeline::compute(self.shared.clone(), self.heaps.pipeline_layout, desc)?;
        Ok(pipeline)
    }

    fn create_command_list(&mut self, _queue: QueueKind) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(VulkanCommandList::new(
            self.shared.clone(),
            self.heaps.clone(),
        )?))
    }

    fn descriptor_heap(&self, kind: DescriptorHeapKind) -> &dyn DescriptorHeapHandle {
        match kind {
            DescriptorHeapKind::CbvSrvUav => &self.heaps.cbv_srv_uav_info,
            DescriptorHeapKind::Sampler => &self.heaps.sampler_info,
        }
    }

    fn write_descriptor(
        &mut self,
        heap: DescriptorHeapKind,
        slot: u32,
        write: &DescriptorWrite,
    ) -> Result<()> {
        self.heaps.write(heap, slot, write)
    }

    fn submit(
        &mut self,
        _queue: QueueKind,
        lists: &mut [&mut dyn CommandList],
        signal: Option<(&Arc<dyn FenceHandle>, u64)>,
    ) -> Result<()> {
        let mut command_buffer_infos = Vec::with_capacity(lists.len());
        for list in lists.iter_mut() {
            let vulkan_list = list
                .as_any_mut()
                .downcast_mut::<VulkanCommandList>()
                .ok_or_else(|| Error::InvalidResource("non-Vulkan command list".to_string()))?;
            command_buffer_infos.push(
                vk::CommandBufferSubmitInfo::default()
                    .command_buffer(vulkan_list.command_buffer),
            );
        }

        let mut signal_infos = Vec::new();
        if let Some((fence, value)) = signal {
            let vulkan_fence = fence
                .as_any()
                .downcast_ref::<VulkanFence>()
                .ok_or_else(|| Error::InvalidResource("non-Vulkan fence".to_string()))?;
            signal_infos.push(
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(vulkan_fence.semaphore)
                    .value(value)
                    .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
            );
        }

        let submit = vk::SubmitInfo2::default()
            .command_buffer_infos(&command_buffer_infos)
            .signal_semaphore_infos(&signal_infos);

        let queue = self
            .shared
            .graphics_queue
            .lock()
            .map_err(|_| Error::BackendError("Queue lock poisoned".to_string()))?;
        unsafe {
            self.shared
                .device
                .queue_submit2(*queue, &[submit], vk::Fence::null())
                .map_err(|e| match e {
                    vk::Result::ERROR_DEVICE_LOST => {
                        Error::DeviceLost("vkQueueSubmit2".to_string())
                    }
                    other => Error::BackendError(format!("vkQueueSubmit2: {}", other)),
                })
        }
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.shared
                .device
                .device_wait_idle()
                .map_err(|e| Error::DeviceLost(format!("vkDeviceWaitIdle: {}", e)))
        }
    }
}

// ============================================================================
// GPU-gated smoke test (requires a Vulkan 1.3 device with mesh shaders)
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires a Vulkan device with the engine's feature set"]
    fn test_device_bring_up_reports_caps() {
        let context = VulkanContext::new(c"nebula3d-test").expect("context");
        let device = VulkanDevice::new(context).expect("device");
        let caps = device.caps();
        assert!(caps.mesh_shaders);
        assert!(caps.bindless);
        assert!(caps.enhanced_barriers);
        assert!(caps.draw_indirect_count);
    }
}
