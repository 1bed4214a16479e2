/// Mock device for unit tests (no GPU required)
///
/// Buffers and textures are backed by real host memory and copy commands
/// move real bytes at record time, so upload, readback and render-graph
/// tests observe the same data flow a GPU backend would produce. All other
/// commands are recorded as strings for assertions.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use super::binding::DescriptorHeapKind;
use super::device::*;
use super::types::*;

// ============================================================================
// Mock buffer
// ============================================================================

pub struct MockBuffer {
    pub name: String,
    pub heap: HeapType,
    pub data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    fn new(desc: &BufferDesc) -> Self {
        Self {
            name: desc.name.clone(),
            heap: desc.heap,
            data: Mutex::new(vec![0u8; desc.size as usize]),
        }
    }

    /// Raw byte access for test assertions
    pub fn bytes(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl ResourceHandle for MockBuffer {
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

impl BufferHandle for MockBuffer {
    fn size(&self) -> u64 {
        self.data.lock().unwrap().len() as u64
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
        let mut bytes = self.data.lock().unwrap();
        let offset = offset as usize;
        if offset + data.len() > bytes.len() {
            return Err(Error::InvalidResource(format!(
                "write past end of buffer '{}'",
                self.name
            )));
        }
        bytes[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        if self.heap != HeapType::Readback {
            return Err(Error::InvalidResource(format!(
                "buffer '{}' is not host-readable",
                self.name
            )));
        }
        let bytes = self.data.lock().unwrap();
        let offset = offset as usize;
        if offset + out.len() > bytes.len() {
            return Err(Error::InvalidResource(format!(
                "read past end of buffer '{}'",
                self.name
            )));
        }
        out.copy_from_slice(&bytes[offset..offset + out.len()]);
        Ok(())
    }
}

// ============================================================================
// Mock texture
// ============================================================================

pub struct MockTexture {
    pub desc: TextureDesc,
    /// One tightly packed byte vector per subresource, indexed
    /// `slice * mip_levels + mip`
    pub data: Mutex<Vec<Vec<u8>>>,
}

impl MockTexture {
    fn new(desc: &TextureDesc, initial_data: &[TextureSubresourceData]) -> Self {
        let bpp = desc.format.bytes_per_pixel() as usize;
        let mut subresources = Vec::with_capacity(desc.subresource_count() as usize);
        for slice in 0..desc.array_layers {
            let _ = slice;
            for mip in 0..desc.mip_levels {
                let (w, h) = desc.mip_extent(mip);
                subresources.push(vec![0u8; (w * h) as usize * bpp]);
            }
        }
        for init in initial_data {
            let index = (init.slice * desc.mip_levels + init.mip) as usize;
            let dst = &mut subresources[index];
            let len = dst.len().min(init.data.len());
            dst[..len].copy_from_slice(&init.data[..len]);
        }
        Self {
            desc: desc.clone(),
            data: Mutex::new(subresources),
        }
    }

    /// Bytes of one subresource, for test assertions
    pub fn subresource_bytes(&self, mip: u32, slice: u32) -> Vec<u8> {
        let data = self.data.lock().unwrap();
        data[(slice * self.desc.mip_levels + mip) as usize].clone()
    }
}

impl ResourceHandle for MockTexture {
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

impl TextureHandle for MockTexture {
    fn desc(&self) -> &TextureDesc {
        &self.desc
    }
}

// ============================================================================
// Mock sampler / pipeline / fence / heap
// ============================================================================

pub struct MockSampler {
    pub desc: SamplerDesc,
}

impl SamplerHandle for MockSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockPipeline {
    pub name: String,
}

impl PipelineHandle for MockPipeline {
    fn debug_name(&self) -> &str {
        &self.name
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Mock fence; `submit` signals it immediately since mock "GPU work"
/// completes at record time.
pub struct MockFence {
    completed: AtomicU64,
}

impl FenceHandle for MockFence {
    fn completed_value(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    fn wait(&self, value: u64, timeout: Duration) -> Result<bool> {
        let start = Instant::now();
        while self.completed_value() < value {
            if start.elapsed() > timeout {
                return Ok(false);
            }
            std::thread::yield_now();
        }
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct MockDescriptorHeap {
    kind: DescriptorHeapKind,
    capacity: u32,
}

impl DescriptorHeapHandle for MockDescriptorHeap {
    fn heap_kind(&self) -> DescriptorHeapKind {
        self.kind
    }
    fn capacity(&self) -> u32 {
        self.capacity
    }
}

// ============================================================================
// Mock command list
// ============================================================================

pub struct MockCommandList {
    pub commands: Vec<String>,
    recording: bool,
}

impl MockCommandList {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
            recording: false,
        }
    }

    fn downcast_buffer<'a>(buffer: &'a Arc<dyn BufferHandle>) -> &'a MockBuffer {
        buffer
            .as_any()
            .downcast_ref::<MockBuffer>()
            .expect("non-mock buffer passed to MockCommandList")
    }

    fn downcast_texture<'a>(texture: &'a Arc<dyn TextureHandle>) -> &'a MockTexture {
        texture
            .as_any()
            .downcast_ref::<MockTexture>()
            .expect("non-mock texture passed to MockCommandList")
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        self.commands.clear();
        self.recording = true;
        self.commands.push("begin".to_string());
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.recording = false;
        self.commands.push("end".to_string());
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn PipelineHandle>) -> Result<()> {
        self.commands
            .push(format!("bind_pipeline {}", pipeline.debug_name()));
        Ok(())
    }

    fn bind_layout(&mut self) -> Result<()> {
        self.commands.push("bind_layout".to_string());
        Ok(())
    }

    fn set_descriptor_heaps(&mut self) -> Result<()> {
        self.commands.push("set_descriptor_heaps".to_string());
        Ok(())
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> Result<()> {
        self.commands.push(format!("set_topology {:?}", topology));
        Ok(())
    }

    fn set_vertex_buffer(&mut self, slot: u32, view: &VertexBufferView) -> Result<()> {
        self.commands.push(format!(
            "set_vertex_buffer slot={} buffer={} offset={}",
            slot,
            view.buffer.debug_name(),
            view.offset
        ));
        Ok(())
    }

    fn set_index_buffer(&mut self, view: &IndexBufferView) -> Result<()> {
        self.commands.push(format!(
            "set_index_buffer buffer={} offset={}",
            view.buffer.debug_name(),
            view.offset
        ));
        Ok(())
    }

    fn push_constants(
        &mut self,
        _stages: ShaderStages,
        param: super::binding::RootParam,
        byte_offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.commands.push(format!(
            "push_constants {:?}+{} {}B",
            param,
            byte_offset,
            data.len()
        ));
        Ok(())
    }

    fn begin_pass(&mut self, info: &PassBeginInfo) -> Result<()> {
        let colors: Vec<String> = info
            .color_attachments
            .iter()
            .map(|a| format!("{}:m{}s{}", a.texture.debug_name(), a.mip, a.slice))
            .collect();
        let depth = info
            .depth_attachment
            .as_ref()
            .map(|a| format!("{}:m{}s{}", a.texture.debug_name(), a.mip, a.slice))
            .unwrap_or_else(|| "none".to_string());
        self.commands
            .push(format!("begin_pass colors=[{}] depth={}", colors.join(","), depth));
        Ok(())
    }

    fn end_pass(&mut self) -> Result<()> {
        self.commands.push("end_pass".to_string());
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.commands
            .push(format!("set_viewport {}x{}", viewport.width, viewport.height));
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.commands
            .push(format!("set_scissor {}x{}", scissor.width, scissor.height));
        Ok(())
    }

    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        _first_instance: u32,
    ) -> Result<()> {
        self.commands.push(format!(
            "draw n={} inst={} first={}",
            vertex_count, instance_count, first_vertex
        ));
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) -> Result<()> {
        self.commands.push(format!(
            "draw_indexed n={} inst={} first={}",
            index_count, instance_count, first_index
        ));
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.commands.push(format!("dispatch {}x{}x{}", x, y, z));
        Ok(())
    }

    fn dispatch_mesh(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.commands.push(format!("dispatch_mesh {}x{}x{}", x, y, z));
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
        let count_str = count
            .map(|(b, o)| format!("{}+{}", b.debug_name(), o))
            .unwrap_or_else(|| "direct".to_string());
        self.commands.push(format!(
            "execute_indirect {:?} stride={} args={}+{} count={} max={}",
            kind,
            stride,
            args.debug_name(),
            args_offset,
            count_str,
            max_count
        ));
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
        self.commands.push(format!(
            "copy_buffer {}+{} -> {}+{} {}B",
            src.debug_name(),
            src_offset,
            dst.debug_name(),
            dst_offset,
            size
        ));
        let src_mock = Self::downcast_buffer(src);
        let dst_mock = Self::downcast_buffer(dst);
        let chunk = {
            let src_data = src_mock.data.lock().unwrap();
            src_data[src_offset as usize..(src_offset + size) as usize].to_vec()
        };
        let mut dst_data = dst_mock.data.lock().unwrap();
        dst_data[dst_offset as usize..(dst_offset + size) as usize].copy_from_slice(&chunk);
        Ok(())
    }

    fn copy_buffer_to_texture(
        &mut self,
        dst: &Arc<dyn TextureHandle>,
        src: &Arc<dyn BufferHandle>,
        footprints: &[CopyableFootprint],
    ) -> Result<()> {
        self.commands.push(format!(
            "copy_buffer_to_texture {} -> {} ({} footprints)",
            src.debug_name(),
            dst.debug_name(),
            footprints.len()
        ));
        let src_mock = Self::downcast_buffer(src);
        let dst_mock = Self::downcast_texture(dst);
        let src_data = src_mock.data.lock().unwrap();
        let mut tex_data = dst_mock.data.lock().unwrap();
        for fp in footprints {
            let sub = &mut tex_data[(fp.slice * dst_mock.desc.mip_levels + fp.mip) as usize];
            for row in 0..fp.height as usize {
                let src_start = (fp.buffer_offset + row as u64 * fp.row_pitch) as usize;
                let dst_start = row * fp.row_size as usize;
                sub[dst_start..dst_start + fp.row_size as usize]
                    .copy_from_slice(&src_data[src_start..src_start + fp.row_size as usize]);
            }
        }
        Ok(())
    }

    fn copy_texture_to_buffer(
        &mut self,
        dst: &Arc<dyn BufferHandle>,
        src: &Arc<dyn TextureHandle>,
        footprints: &[CopyableFootprint],
    ) -> Result<()> {
        self.commands.push(format!(
            "copy_texture_to_buffer {} -> {} ({} footprints)",
            src.debug_name(),
            dst.debug_name(),
            footprints.len()
        ));
        let src_mock = Self::downcast_texture(src);
        let dst_mock = Self::downcast_buffer(dst);
        let tex_data = src_mock.data.lock().unwrap();
        let mut dst_data = dst_mock.data.lock().unwrap();
        for fp in footprints {
            let sub = &tex_data[(fp.slice * src_mock.desc.mip_levels + fp.mip) as usize];
            for row in 0..fp.height as usize {
                let src_start = row * fp.row_size as usize;
                let dst_start = (fp.buffer_offset + row as u64 * fp.row_pitch) as usize;
                dst_data[dst_start..dst_start + fp.row_size as usize]
                    .copy_from_slice(&sub[src_start..src_start + fp.row_size as usize]);
            }
        }
        Ok(())
    }

    fn resource_barrier(&mut self, barriers: &[BarrierDesc]) -> Result<()> {
        for barrier in barriers {
            match barrier {
                BarrierDesc::Texture(t) => self.commands.push(format!(
                    "barrier tex {} m{}+{} s{}+{} {:?}->{:?}",
                    t.texture.debug_name(),
                    t.range.first_mip,
                    t.range.mip_count,
                    t.range.first_slice,
                    t.range.slice_count,
                    t.from,
                    t.to
                )),
                BarrierDesc::Buffer(b) => self.commands.push(format!(
                    "barrier buf {} {:?}->{:?}",
                    b.buffer.debug_name(),
                    b.from,
                    b.to
                )),
            }
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
        self.commands.push(format!(
            "fill_buffer {}+{} {}B = {:#x}",
            dst.debug_name(),
            offset,
            size,
            value
        ));
        let dst_mock = Self::downcast_buffer(dst);
        let mut data = dst_mock.data.lock().unwrap();
        let bytes = value.to_le_bytes();
        for i in 0..(size as usize / 4) {
            let at = offset as usize + i * 4;
            data[at..at + 4].copy_from_slice(&bytes);
        }
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ============================================================================
// Mock device
// ============================================================================

pub struct MockDevice {
    /// Mutable so tests can simulate devices missing required features
    pub caps: DeviceCaps,
    cbv_srv_uav_heap: MockDescriptorHeap,
    sampler_heap: MockDescriptorHeap,
    /// (heap, slot) log of descriptor writes, for assertions
    pub descriptor_writes: Vec<(DescriptorHeapKind, u32)>,
    pub submit_count: u64,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            caps: DeviceCaps {
                mesh_shaders: true,
                bindless: true,
                enhanced_barriers: true,
                draw_indirect_count: true,
                row_pitch_alignment: 256,
                max_cbv_srv_uav_descriptors: 1 << 20,
                max_sampler_descriptors: 2048,
            },
            cbv_srv_uav_heap: MockDescriptorHeap {
                kind: DescriptorHeapKind::CbvSrvUav,
                capacity: 1 << 20,
            },
            sampler_heap: MockDescriptorHeap {
                kind: DescriptorHeapKind::Sampler,
                capacity: 2048,
            },
            descriptor_writes: Vec::new(),
            submit_count: 0,
        }
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for MockDevice {
    fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<Arc<dyn BufferHandle>> {
        Ok(Arc::new(MockBuffer::new(desc)))
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        initial_data: &[TextureSubresourceData],
    ) -> Result<Arc<dyn TextureHandle>> {
        Ok(Arc::new(MockTexture::new(desc, initial_data)))
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<Arc<dyn SamplerHandle>> {
        Ok(Arc::new(MockSampler { desc: *desc }))
    }

    fn create_fence(&mut self, initial_value: u64) -> Result<Arc<dyn FenceHandle>> {
        Ok(Arc::new(MockFence {
            completed: AtomicU64::new(initial_value),
        }))
    }

    fn create_graphics_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
    ) -> Result<Arc<dyn PipelineHandle>> {
        Ok(Arc::new(MockPipeline {
            name: desc.name.clone(),
        }))
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDesc,
    ) -> Result<Arc<dyn PipelineHandle>> {
        Ok(Arc::new(MockPipeline {
            name: desc.name.clone(),
        }))
    }

    fn create_command_list(&mut self, _queue: QueueKind) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList::new()))
    }

    fn descriptor_heap(&self, kind: DescriptorHeapKind) -> &dyn DescriptorHeapHandle {
        match kind {
            DescriptorHeapKind::CbvSrvUav => &self.cbv_srv_uav_heap,
            DescriptorHeapKind::Sampler => &self.sampler_heap,
        }
    }

    fn write_descriptor(
        &mut self,
        heap: DescriptorHeapKind,
        slot: u32,
        _write: &DescriptorWrite,
    ) -> Result<()> {
        self.descriptor_writes.push((heap, slot));
        Ok(())
    }

    fn submit(
        &mut self,
        _queue: QueueKind,
        _lists: &mut [&mut dyn CommandList],
        signal: Option<(&Arc<dyn FenceHandle>, u64)>,
    ) -> Result<()> {
        self.submit_count += 1;
        // Mock commands executed at record time; the fence can signal now
        if let Some((fence, value)) = signal {
            if let Some(mock) = fence.as_any().downcast_ref::<MockFence>() {
                mock.completed.fetch_max(value, Ordering::AcqRel);
            }
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(())
    }
}
