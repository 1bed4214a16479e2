//! Vulkan command list
//!
//! Owns a command pool + primary command buffer; `begin` resets the pool so
//! the list can be re-recorded every frame. Barriers lower through
//! `ResourceState::barrier_parts` to `vkCmdPipelineBarrier2`; render passes
//! use dynamic rendering; indirect execution reads the native argument
//! portion of the engine's command records (root constants first, native
//! arguments at a fixed offset).

use std::any::Any;
use std::sync::Arc;

use ash::vk;

use nebula_3d_engine::error::{Error, Result};
use nebula_3d_engine::rhi::{
    BarrierDesc, BufferHandle, CommandList, CopyableFootprint, IndexBufferView,
    IndirectCommandKind, PassBeginInfo, PipelineHandle, PrimitiveTopology, Rect2D, RootParam,
    ShaderStages, SubresourceRange, TextureHandle, VertexBufferView, Viewport, ClearValue,
};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::DeviceShared;
use crate::vulkan_descriptor_heap::DescriptorHeaps;
use crate::vulkan_format;
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_texture::VulkanTexture;

/// Byte offset of the native draw/dispatch arguments within one engine
/// indirect command record (after the per-draw root constants)
const NATIVE_ARGS_OFFSET: u64 = 16;

pub struct VulkanCommandList {
    shared: Arc<DeviceShared>,
    heaps: Arc<DescriptorHeaps>,
    pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    current_bind_point: Option<vk::PipelineBindPoint>,
}

impl VulkanCommandList {
    pub fn new(shared: Arc<DeviceShared>, heaps: Arc<DescriptorHeaps>) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(shared.graphics_queue_family);
        let pool = unsafe {
            shared
                .device
                .create_command_pool(&pool_info, None)
                .map_err(|e| Error::BackendError(format!("vkCreateCommandPool: {}", e)))?
        };
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = unsafe {
            shared
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| Error::BackendError(format!("vkAllocateCommandBuffers: {}", e)))?[0]
        };
        Ok(Self {
            shared,
            heaps,
            pool,
            command_buffer,
            current_bind_point: None,
        })
    }

    fn buffer_of<'a>(handle: &'a Arc<dyn BufferHandle>) -> Result<&'a VulkanBuffer> {
        handle
            .as_any()
            .downcast_ref::<VulkanBuffer>()
            .ok_or_else(|| Error::InvalidResource("non-Vulkan buffer".to_string()))
    }

    fn texture_of<'a>(handle: &'a Arc<dyn TextureHandle>) -> Result<&'a VulkanTexture> {
        handle
            .as_any()
            .downcast_ref::<VulkanTexture>()
            .ok_or_else(|| Error::InvalidResource("non-Vulkan texture".to_string()))
    }
}

impl CommandList for VulkanCommandList {
    fn begin(&mut self) -> Result<()> {
        unsafe {
            self.shared
                .device
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())
                .map_err(|e| Error::BackendError(format!("vkResetCommandPool: {}", e)))?;
            let info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.shared
                .device
                .begin_command_buffer(self.command_buffer, &info)
                .map_err(|e| Error::BackendError(format!("vkBeginCommandBuffer: {}", e)))?;
        }
        self.current_bind_point = None;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        unsafe {
            self.shared
                .device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| Error::BackendError(format!("vkEndCommandBuffer: {}", e)))
        }
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn PipelineHandle>) -> Result<()> {
        let vulkan_pipeline = pipeline
            .as_any()
            .downcast_ref::<VulkanPipeline>()
            .ok_or_else(|| Error::InvalidResource("non-Vulkan pipeline".to_string()))?;
        unsafe {
            self.shared.device.cmd_bind_pipeline(
                self.command_buffer,
                vulkan_pipeline.bind_point,
                vulkan_pipeline.pipeline,
            );
            // The bindless sets rebind whenever the bind point changes
            if self.current_bind_point != Some(vulkan_pipeline.bind_point) {
                self.shared.device.cmd_bind_descriptor_sets(
                    self.command_buffer,
                    vulkan_pipeline.bind_point,
                    self.heaps.pipeline_layout,
                    0,
                    &[self.heaps.cbv_srv_uav_set, self.heaps.sampler_set],
                    &[],
                );
                self.current_bind_point = Some(vulkan_pipeline.bind_point);
            }
        }
        Ok(())
    }

    fn bind_layout(&mut self) -> Result<()> {
        // The fixed root layout binds with the descriptor sets; nothing to
        // record separately on Vulkan
        Ok(())
    }

    fn set_descriptor_heaps(&mut self) -> Result<()> {
        // Sets bind lazily at the first pipeline bind per bind point
        self.current_bind_point = None;
        Ok(())
    }

    fn set_primitive_topology(&mut self, _topology: PrimitiveTopology) -> Result<()> {
        // Topology is baked into the pipeline state
        Ok(())
    }

    fn set_vertex_buffer(&mut self, slot: u32, view: &VertexBufferView) -> Result<()> {
        let buffer = Self::buffer_of(&view.buffer)?;
        unsafe {
            self.shared.device.cmd_bind_vertex_buffers(
                self.command_buffer,
                slot,
                &[buffer.buffer],
                &[view.offset],
            );
        }
        Ok(())
    }

    fn set_index_buffer(&mut self, view: &IndexBufferView) -> Result<()> {
        let buffer = Self::buffer_of(&view.buffer)?;
        unsafe {
            self.shared.device.cmd_bind_index_buffer(
                self.command_buffer,
                buffer.buffer,
                view.offset,
                vulkan_format::index_type(view.index_type),
            );
        }
        Ok(())
    }

    fn push_constants(
        &mut self,
        _stages: ShaderStages,
        param: RootParam,
        byte_offset: u32,
        data: &[u8],
    ) -> Result<()> {
        if byte_offset + data.len() as u32 > param.size_bytes() {
            return Err(Error::InvalidResource(format!(
                "push constants overflow root parameter {:?}",
                param
            )));
        }
        unsafe {
            self.shared.device.cmd_push_constants(
                self.command_buffer,
                self.heaps.pipeline_layout,
                vk::ShaderStageFlags::ALL,
                param.byte_offset() + byte_offset,
                data,
            );
        }
        Ok(())
    }

    fn begin_pass(&mut self, info: &PassBeginInfo) -> Result<()> {
        let mut color_attachments = Vec::with_capacity(info.color_attachments.len());
        for attachment in &info.color_attachments {
            let texture = Self::texture_of(&attachment.texture)?;
            let view =
                texture.view(&SubresourceRange::single(attachment.mip, attachment.slice), false)?;
            let clear = match attachment.clear {
                ClearValue::Color(color) => vk::ClearValue {
                    color: vk::ClearColorValue { float32: color },
                },
                ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
                },
            };
            color_attachments.push(
                vk::RenderingAttachmentInfo::default()
                    .image_view(view)
                    .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .load_op(vulkan_format::load_op(attachment.load_op))
                    .store_op(vulkan_format::store_op(attachment.store_op))
                    .clear_value(clear),
            );
        }

        let mut rendering = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: vk::Extent2D {
                    width: info.render_area.0,
                    height: info.render_area.1,
                },
            })
            .layer_count(1)
            .color_attachments(&color_attachments);

        let depth_attachment_info;
        if let Some(depth) = &info.depth_attachment {
            let texture = Self::texture_of(&depth.texture)?;
            let view = texture.view(&SubresourceRange::single(depth.mip, depth.slice), false)?;
            let clear = match depth.clear {
                ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
                },
                ClearValue::Color(_) => vk::ClearValue::default(),
            };
            depth_attachment_info = vk::RenderingAttachmentInfo::default()
                .image_view(view)
                .image_layout(if depth.read_only {
                    vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
                } else {
                    vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
                })
                .load_op(vulkan_format::load_op(depth.load_op))
                .store_op(vulkan_format::store_op(depth.store_op))
                .clear_value(clear);
            rendering = rendering.depth_attachment(&depth_attachment_info);
        }

        unsafe {
            self.shared
                .device
                .cmd_begin_rendering(self.command_buffer, &rendering);
        }
        Ok(())
    }

    fn end_pass(&mut self) -> Result<()> {
        unsafe { self.shared.device.cmd_end_rendering(self.command_buffer) };
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        // Flip Y so clip space matches the engine's D3D-style convention
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y + viewport.height,
            width: viewport.width,
            height: -viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            self.shared
                .device
                .cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        let rect = vk::Rect2D {
            offset: vk::Offset2D {
                x: scissor.x,
                y: scissor.y,
            },
            extent: vk::Extent2D {
                width: scissor.width,
                height: scissor.height,
            },
        };
        unsafe {
            self.shared
                .device
                .cmd_set_scissor(self.command_buffer, 0, &[rect]);
        }
        Ok(())
    }

    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()> {
        unsafe {
            self.shared.device.cmd_draw(
                self.command_buffer,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        unsafe {
            self.shared.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        unsafe { self.shared.device.cmd_dispatch(self.command_buffer, x, y, z) };
        Ok(())
    }

    fn dispatch_mesh(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        unsafe {
            self.shared
                .mesh_shader
                .cmd_draw_mesh_tasks(self.command_buffer, x, y, z);
        }
        Ok(())
    }

    fn execute_indirect(
        &mut self,
        kind: IndirectCommandKind,
        stride: u32,
        args: &Arc<dyn BufferHandle>,
        args_offset: u64,
        count: Option<(&Arc<dyn BufferHandle>, u64)>,
        max_count: u32,
    ) -> Result<()> {
        let args_buffer = Self::buffer_of(args)?;
        let native_offset = args_offset + NATIVE_ARGS_OFFSET;
        unsafe {
            match (kind, count) {
                (IndirectCommandKind::DispatchMesh, Some((count_buffer, count_offset))) => {
                    let count_buffer = Self::buffer_of(count_buffer)?;
                    self.shared.mesh_shader.cmd_draw_mesh_tasks_indirect_count(
                        self.command_buffer,
                        args_buffer.buffer,
                        native_offset,
                        count_buffer.buffer,
                        count_offset,
                        max_count,
                        stride,
                    );
                }
                (IndirectCommandKind::DispatchMesh, None) => {
                    self.shared.mesh_shader.cmd_draw_mesh_tasks_indirect(
                        self.command_buffer,
                        args_buffer.buffer,
                        native_offset,
                        max_count,
                        stride,
                    );
                }
                (IndirectCommandKind::DrawIndexed, Some((count_buffer, count_offset))) => {
                    let count_buffer = Self::buffer_of(count_buffer)?;
                    self.shared.device.cmd_draw_indexed_indirect_count(
                        self.command_buffer,
                        args_buffer.buffer,
                        native_offset,
                        count_buffer.buffer,
                        count_offset,
                        max_count,
                        stride,
                    );
                }
                (IndirectCommandKind::DrawIndexed, None) => {
                    self.shared.device.cmd_draw_indexed_indirect(
                        self.command_buffer,
                        args_buffer.buffer,
                        native_offset,
                        max_count,
                        stride,
                    );
                }
                (IndirectCommandKind::Dispatch, _) => {
                    self.shared.device.cmd_dispatch_indirect(
                        self.command_buffer,
                        args_buffer.buffer,
                        native_offset,
                    );
                }
            }
        }
        Ok(())
    }

    fn copy_buffer_region(
        &mut self,
        dst: &Arc<dyn BufferHandle>,
        dst_offset: u64,
        src: &Arc<dyn BufferHandle>,
        src_offset: u64,
        size: u64,
    ) -> Result<()> {
        let src_buffer = Self::buffer_of(src)?;
        let dst_buffer = Self::buffer_of(dst)?;
        let region = vk::BufferCopy {
            src_offset,
            dst_offset,
            size,
        };
        unsafe {
            self.shared.device.cmd_copy_buffer(
                self.command_buffer,
                src_buffer.buffer,
                dst_buffer.buffer,
                &[region],
            );
        }
        Ok(())
    }

    fn copy_buffer_to_texture(
        &mut self,
        dst: &Arc<dyn TextureHandle>,
        src: &Arc<dyn BufferHandle>,
        footprints: &[CopyableFootprint],
    ) -> Result<()> {
        let src_buffer = Self::buffer_of(src)?;
        let dst_texture = Self::texture_of(dst)?;
        let bpp = u64::from(dst_texture.desc().format.bytes_per_pixel()).max(1);
        let regions: Vec<vk::BufferImageCopy> = footprints
            .iter()
            .map(|fp| vk::BufferImageCopy {
                buffer_offset: fp.buffer_offset,
                buffer_row_length: (fp.row_pitch / bpp) as u32,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: dst_texture.aspect(),
                    mip_level: fp.mip,
                    base_array_layer: fp.slice,
                    layer_count: 1,
                },
                image_offset: vk::Offset3D::default(),
                image_extent: vk::Extent3D {
                    width: fp.width,
                    height: fp.height,
                    depth: 1,
                },
            })
            .collect();
        unsafe {
            self.shared.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                src_buffer.buffer,
                dst_texture.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );
        }
        Ok(())
    }

    fn copy_texture_to_buffer(
        &mut self,
        dst: &Arc<dyn BufferHandle>,
        src: &Arc<dyn TextureHandle>,
        footprints: &[CopyableFootprint],
    ) -> Result<()> {
        let dst_buffer = Self::buffer_of(dst)?;
        let src_texture = Self::texture_of(src)?;
        let bpp = u64::from(src_texture.desc().format.bytes_per_pixel()).max(1);
        let regions: Vec<vk::BufferImageCopy> = footprints
            .iter()
            .map(|fp| vk::BufferImageCopy {
                buffer_offset: fp.buffer_offset,
                buffer_row_length: (fp.row_pitch / bpp) as u32,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: src_texture.aspect(),
                    mip_level: fp.mip,
                    base_array_layer: fp.slice,
                    layer_count: 1,
                },
                image_offset: vk::Offset3D::default(),
                image_extent: vk::Extent3D {
                    width: fp.width,
                    height: fp.height,
                    depth: 1,
                },
            })
            .collect();
        unsafe {
            self.shared.device.cmd_copy_image_to_buffer(
                self.command_buffer,
                src_texture.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst_buffer.buffer,
                &regions,
            );
        }
        Ok(())
    }

    fn resource_barrier(&mut self, barriers: &[BarrierDesc]) -> Result<()> {
        let mut buffer_barriers = Vec::new();
        let mut image_barriers = Vec::new();
        for barrier in barriers {
            match barrier {
                BarrierDesc::Buffer(b) => {
                    let buffer = Self::buffer_of(&b.buffer)?;
                    let (src_sync, src_access, _) = b.from.barrier_parts();
                    let (dst_sync, dst_access, _) = b.to.barrier_parts();
                    buffer_barriers.push(
                        vk::BufferMemoryBarrier2::default()
                            .src_stage_mask(vulkan_format::sync_flags(src_sync))
                            .src_access_mask(vulkan_format::access_flags(src_access))
                            .dst_stage_mask(vulkan_format::sync_flags(dst_sync))
                            .dst_access_mask(vulkan_format::access_flags(dst_access))
                            .buffer(buffer.buffer)
                            .offset(0)
                            .size(vk::WHOLE_SIZE),
                    );
                }
                BarrierDesc::Texture(t) => {
                    let texture = Self::texture_of(&t.texture)?;
                    let is_depth = texture.desc().format.is_depth();
                    let (src_sync, src_access, src_layout) = t.from.barrier_parts();
                    let (dst_sync, dst_access, dst_layout) = t.to.barrier_parts();
                    let range = t
                        .range
                        .normalized(texture.desc().mip_levels, texture.desc().array_layers);
                    image_barriers.push(
                        vk::ImageMemoryBarrier2::default()
                            .src_stage_mask(vulkan_format::sync_flags(src_sync))
                            .src_access_mask(vulkan_format::access_flags(src_access))
                            .dst_stage_mask(vulkan_format::sync_flags(dst_sync))
                            .dst_access_mask(vulkan_format::access_flags(dst_access))
                            .old_layout(vulkan_format::image_layout(src_layout, is_depth))
                            .new_layout(vulkan_format::image_layout(dst_layout, is_depth))
                            .image(texture.image)
                            .subresource_range(vk::ImageSubresourceRange {
                                aspect_mask: texture.aspect(),
                                base_mip_level: range.first_mip,
                                level_count: range.mip_count,
                                base_array_layer: range.first_slice,
                                layer_count: range.slice_count,
                            }),
                    );
                }
            }
        }
        let dependency = vk::DependencyInfo::default()
            .buffer_memory_barriers(&buffer_barriers)
            .image_memory_barriers(&image_barriers);
        unsafe {
            self.shared
                .device
                .cmd_pipeline_barrier2(self.command_buffer, &dependency);
        }
        Ok(())
    }

    fn fill_buffer(
        &mut self,
        dst: &Arc<dyn BufferHandle>,
        offset: u64,
        size: u64,
        value: u32,
    ) -> Result<()> {
        let buffer = Self::buffer_of(dst)?;
        unsafe {
            self.shared
                .device
                .cmd_fill_buffer(self.command_buffer, buffer.buffer, offset, size, value);
        }
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        unsafe { self.shared.device.destroy_command_pool(self.pool, None) };
    }
}
