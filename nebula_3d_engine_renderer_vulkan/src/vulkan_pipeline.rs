//! Vulkan pipeline handle
//!
//! Graphics pipelines target dynamic rendering (no render pass objects);
//! the vertex path uses empty vertex input (vertices are pulled from the
//! bindless pools), the mesh path feeds task/mesh stages. Compiled SPIR-V
//! arrives as byte blobs keyed externally by the material technique.

use std::any::Any;
use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;

use nebula_3d_engine::error::{Error, Result};
use nebula_3d_engine::rhi::{
    BlendMode, ComputePipelineDesc, CullMode, GraphicsPipelineDesc, PipelineHandle,
    PrimitiveTopology,
};

use crate::vulkan_context::DeviceShared;
use crate::vulkan_format;

const ENTRY_POINT: &CStr = c"main";

pub struct VulkanPipeline {
    shared: Arc<DeviceShared>,
    pub pipeline: vk::Pipeline,
    pub bind_point: vk::PipelineBindPoint,
    name: String,
}

impl VulkanPipeline {
    pub fn graphics(
        shared: Arc<DeviceShared>,
        layout: vk::PipelineLayout,
        desc: &GraphicsPipelineDesc,
    ) -> Result<Arc<Self>> {
        unsafe { Self::create_graphics(shared, layout, desc) }
    }

    pub fn compute(
        shared: Arc<DeviceShared>,
        layout: vk::PipelineLayout,
        desc: &ComputePipelineDesc,
    ) -> Result<Arc<Self>> {
        let module = unsafe { create_module(&shared, &desc.bytecode)? };
        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(module)
            .name(ENTRY_POINT);
        let info = vk::ComputePipelineCreateInfo::default()
            .stage(stage)
            .layout(layout);
        let pipeline = unsafe {
            shared
                .device
                .create_compute_pipelines(vk::PipelineCache::null(), &[info], None)
                .map_err(|(_, e)| Error::BackendError(format!("compute pipeline: {}", e)))?[0]
        };
        unsafe { shared.device.destroy_shader_module(module, None) };
        Ok(Arc::new(Self {
            shared,
            pipeline,
            bind_point: vk::PipelineBindPoint::COMPUTE,
            name: desc.name.clone(),
        }))
    }

    unsafe fn create_graphics(
        shared: Arc<DeviceShared>,
        layout: vk::PipelineLayout,
        desc: &GraphicsPipelineDesc,
    ) -> Result<Arc<Self>> {
        if desc.vertex_bytecode.is_none() && desc.mesh_bytecode.is_none() {
            return Err(Error::InvalidResource(format!(
                "pipeline '{}' has neither a vertex nor a mesh stage",
                desc.name
            )));
        }

        let mut modules = Vec::new();
        let mut stages = Vec::new();
        let stage_list = [
            (&desc.vertex_bytecode, vk::ShaderStageFlags::VERTEX),
            (&desc.amplification_bytecode, vk::ShaderStageFlags::TASK_EXT),
            (&desc.mesh_bytecode, vk::ShaderStageFlags::MESH_EXT),
            (&desc.pixel_bytecode, vk::ShaderStageFlags::FRAGMENT),
        ];
        for (bytecode, stage) in stage_list {
            if let Some(bytecode) = bytecode {
                let module = create_module(&shared, bytecode)?;
                modules.push(module);
                stages.push((stage, module));
            }
        }

        let stage_infos: Vec<vk::PipelineShaderStageCreateInfo> = stages
            .iter()
            .map(|(stage, module)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(*stage)
                    .module(*module)
                    .name(ENTRY_POINT)
            })
            .collect();

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vulkan_format::topology(
                desc.topology.unwrap_or(PrimitiveTopology::TriangleList),
            ));
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(if desc.wireframe {
                vk::PolygonMode::LINE
            } else {
                vk::PolygonMode::FILL
            })
            .cull_mode(vulkan_format::cull_mode(desc.cull_mode.unwrap_or(CullMode::Back)))
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);
        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let mut depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default();
        if desc.depth_format.is_some() {
            depth_stencil = depth_stencil
                .depth_test_enable(true)
                .depth_write_enable(desc.depth_write)
                .depth_compare_op(
                    desc.depth_compare
                        .map(vulkan_format::compare_op)
                        .unwrap_or(vk::CompareOp::LESS_OR_EQUAL),
                );
        }

        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = desc
            .color_formats
            .iter()
            .map(|_| vulkan_format::blend_attachment(desc.blend.unwrap_or(BlendMode::Opaque)))
            .collect();
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats: Vec<vk::Format> = desc
            .color_formats
            .iter()
            .map(|f| vulkan_format::format(*f))
            .collect();
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(
                desc.depth_format
                    .map(vulkan_format::format)
                    .unwrap_or(vk::Format::UNDEFINED),
            );

        let info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stage_infos)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .push_next(&mut rendering_info);

        let result = shared
            .device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[info], None);
        for module in &modules {
            shared.device.destroy_shader_module(*module, None);
        }
        let pipeline = result
            .map_err(|(_, e)| Error::BackendError(format!("graphics pipeline: {}", e)))?[0];

        Ok(Arc::new(Self {
            shared,
            pipeline,
            bind_point: vk::PipelineBindPoint::GRAPHICS,
            name: desc.name.clone(),
        }))
    }
}

impl PipelineHandle for VulkanPipeline {
    fn debug_name(&self) -> &str {
        &self.name
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe { self.shared.device.destroy_pipeline(self.pipeline, None) };
    }
}

/// Build a shader module from a little-endian SPIR-V byte blob
unsafe fn create_module(shared: &DeviceShared, bytecode: &[u8]) -> Result<vk::ShaderModule> {
    if bytecode.len() % 4 != 0 {
        return Err(Error::InvalidResource(
            "SPIR-V blob length is not a multiple of 4".to_string(),
        ));
    }
    let words: Vec<u32> = bytecode
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let info = vk::ShaderModuleCreateInfo::default().code(&words);
    shared
        .device
        .create_shader_module(&info, None)
        .map_err(|e| Error::BackendError(format!("vkCreateShaderModule: {}", e)))
}
