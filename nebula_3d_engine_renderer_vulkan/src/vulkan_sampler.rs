//! Vulkan sampler handle

use std::any::Any;
use std::sync::Arc;

use ash::vk;

use nebula_3d_engine::error::{Error, Result};
use nebula_3d_engine::rhi::{ReductionMode, SamplerDesc, SamplerHandle};

use crate::vulkan_context::DeviceShared;
use crate::vulkan_format;

pub struct VulkanSampler {
    shared: Arc<DeviceShared>,
    pub sampler: vk::Sampler,
    desc: SamplerDesc,
}

impl VulkanSampler {
    pub fn new(shared: Arc<DeviceShared>, desc: &SamplerDesc) -> Result<Arc<Self>> {
        let mut info = vk::SamplerCreateInfo::default()
            .mag_filter(vulkan_format::filter(desc.mag_filter))
            .min_filter(vulkan_format::filter(desc.min_filter))
            .mipmap_mode(vulkan_format::mip_filter(desc.mip_filter))
            .address_mode_u(vulkan_format::address_mode(desc.address_u))
            .address_mode_v(vulkan_format::address_mode(desc.address_v))
            .address_mode_w(vulkan_format::address_mode(desc.address_w))
            .min_lod(desc.lod_min)
            .max_lod(if desc.lod_max == f32::MAX {
                vk::LOD_CLAMP_NONE
            } else {
                desc.lod_max
            })
            .border_color(vulkan_format::border_color(desc.border))
            .anisotropy_enable(desc.max_anisotropy > 1)
            .max_anisotropy(f32::from(desc.max_anisotropy.max(1)));
        if let Some(compare) = desc.compare {
            info = info
                .compare_enable(true)
                .compare_op(vulkan_format::compare_op(compare));
        }
        let mut reduction = vk::SamplerReductionModeCreateInfo::default()
            .reduction_mode(vulkan_format::reduction_mode(desc.reduction));
        if desc.reduction != ReductionMode::WeightedAverage {
            info = info.push_next(&mut reduction);
        }

        let sampler = unsafe {
            shared
                .device
                .create_sampler(&info, None)
                .map_err(|e| Error::BackendError(format!("vkCreateSampler: {}", e)))?
        };
        Ok(Arc::new(Self {
            shared,
            sampler,
            desc: *desc,
        }))
    }
}

impl SamplerHandle for VulkanSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSampler {
    fn drop(&mut self) {
        unsafe { self.shared.device.destroy_sampler(self.sampler, None) };
    }
}
