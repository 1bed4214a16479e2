/// Readback manager - GPU -> CPU texture readback and DDS serialization
///
/// `save_texture_to_dds` records a `CopyTextureToBuffer` into a readback
/// buffer and signals a fence; once the fence clears (polled at frame
/// boundaries), `poll` de-pitches the rows and writes a DDS file with the
/// full mip chain. Cubemaps get the cubemap caps bits.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ddsfile::{AlphaMode, Caps2, D3D10ResourceDimension, Dds, DxgiFormat, NewDxgiParams};

use crate::engine_bail;
use crate::error::{Error, Result};
use crate::rhi::{
    copyable_footprints, BarrierDesc, BufferDesc, BufferHandle, BufferUsage, CommandList,
    CopyableFootprint, Device, FenceHandle, FootprintRangeDesc, Format, HeapType, QueueKind,
    ResourceState, TextureBarrier, TextureDesc, TextureSubresourceData,
};

use super::pixel_buffer::PixelBuffer;

/// Hard timeout on readback fence waits (TDR dump window)
pub const READBACK_TIMEOUT: Duration = Duration::from_secs(3);

struct ReadbackRequest {
    fence_value: u64,
    buffer: Arc<dyn BufferHandle>,
    desc: TextureDesc,
    footprints: Vec<CopyableFootprint>,
    cubemap: bool,
    path: PathBuf,
}

pub struct ReadbackManager {
    device: Arc<Mutex<dyn Device>>,
    fence: Arc<dyn FenceHandle>,
    next_fence_value: u64,
    command_list: Box<dyn CommandList>,
    /// Pending requests; mutex-guarded because completion callbacks may be
    /// observed from worker threads
    requests: Mutex<Vec<ReadbackRequest>>,
    row_pitch_alignment: u64,
}

impl ReadbackManager {
    pub fn new(device: Arc<Mutex<dyn Device>>) -> Result<Self> {
        let (fence, command_list, row_pitch_alignment) = {
            let mut dev = device
                .lock()
                .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
            let alignment = dev.caps().row_pitch_alignment;
            let fence = dev.create_fence(0)?;
            let list = dev.create_command_list(QueueKind::Graphics)?;
            (fence, list, alignment)
        };
        Ok(Self {
            device,
            fence,
            next_fence_value: 0,
            command_list,
            requests: Mutex::new(Vec::new()),
            row_pitch_alignment,
        })
    }

    /// Queue a full-mip-chain readback of a 2D or array texture to a DDS
    /// file. Returns the fence value the copy signals.
    pub fn save_texture_to_dds(
        &mut self,
        texture: &Arc<PixelBuffer>,
        path: impl AsRef<Path>,
    ) -> Result<u64> {
        self.queue_readback(texture, path.as_ref(), false)
    }

    /// Queue a cubemap readback (all 6 faces, full mip chain) to a DDS file
    pub fn save_cubemap_to_dds(
        &mut self,
        texture: &Arc<PixelBuffer>,
        path: impl AsRef<Path>,
    ) -> Result<u64> {
        if texture.array_layers() % 6 != 0 {
            engine_bail!(InvalidResource, "nebula3d::ReadbackManager",
                "texture '{}' is not a cubemap ({} layers)",
                texture.name(), texture.array_layers());
        }
        self.queue_readback(texture, path.as_ref(), true)
    }

    fn queue_readback(
        &mut self,
        texture: &Arc<PixelBuffer>,
        path: &Path,
        cubemap: bool,
    ) -> Result<u64> {
        dds_format(texture.format())?; // fail early on unsupported formats

        let rhi_desc = texture.handle().desc().clone();
        let range = FootprintRangeDesc {
            first_mip: 0,
            mip_count: rhi_desc.mip_levels,
            first_slice: 0,
            slice_count: rhi_desc.array_layers,
        };
        let (footprints, total_size) =
            copyable_footprints(&rhi_desc, &range, self.row_pitch_alignment, 0);

        let buffer = {
            let mut dev = self
                .device
                .lock()
                .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
            dev.create_buffer(&BufferDesc {
                size: total_size,
                heap: HeapType::Readback,
                usage: BufferUsage::TRANSFER_DST,
                name: format!("Readback:{}", texture.name()),
            })?
        };

        let whole = texture.whole_range();
        let current = texture
            .state()
            .uniform_state(&whole)
            .unwrap_or(ResourceState::Common);

        let list = &mut self.command_list;
        list.begin()?;
        list.resource_barrier(&[BarrierDesc::Texture(TextureBarrier {
            texture: texture.handle().clone(),
            range: whole,
            from: current,
            to: ResourceState::CopySource,
        })])?;
        list.copy_texture_to_buffer(&buffer, texture.handle(), &footprints)?;
        list.resource_barrier(&[BarrierDesc::Texture(TextureBarrier {
            texture: texture.handle().clone(),
            range: whole,
            from: ResourceState::CopySource,
            to: current,
        })])?;
        list.end()?;

        self.next_fence_value += 1;
        let fence_value = self.next_fence_value;
        {
            let mut dev = self
                .device
                .lock()
                .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
            dev.submit(
                QueueKind::Graphics,
                &mut [self.command_list.as_mut()],
                Some((&self.fence, fence_value)),
            )?;
        }

        let request = ReadbackRequest {
            fence_value,
            buffer,
            desc: rhi_desc,
            footprints,
            cubemap,
            path: path.to_path_buf(),
        };
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request);

        crate::engine_info!("nebula3d::ReadbackManager",
            "Queued readback of '{}' (fence value {})", texture.name(), fence_value);
        Ok(fence_value)
    }

    /// Complete every request whose fence has cleared, writing its DDS file.
    ///
    /// Called at frame boundaries on the render thread. Returns the number
    /// of requests completed.
    pub fn poll(&mut self) -> Result<usize> {
        let completed_value = self.fence.completed_value();
        let ready: Vec<ReadbackRequest> = {
            let mut requests = self.requests.lock().unwrap_or_else(|p| p.into_inner());
            let mut ready = Vec::new();
            let mut i = 0;
            while i < requests.len() {
                if requests[i].fence_value <= completed_value {
                    ready.push(requests.remove(i));
                } else {
                    i += 1;
                }
            }
            ready
        };

        let count = ready.len();
        for request in ready {
            if let Err(err) = write_dds(&request) {
                // Failed readbacks are logged; the file is simply not produced
                crate::engine_error!("nebula3d::ReadbackManager",
                    "readback of '{}' failed: {}", request.desc.name, err);
            }
        }
        Ok(count)
    }

    /// Block until every queued request's fence has cleared, then complete
    /// them. Aborts with DeviceLost after the hard timeout.
    pub fn flush(&mut self) -> Result<usize> {
        let last = self.next_fence_value;
        if !self.fence.wait(last, READBACK_TIMEOUT)? {
            engine_bail!(DeviceLost, "nebula3d::ReadbackManager",
                "readback fence did not clear within {:?}", READBACK_TIMEOUT);
        }
        self.poll()
    }

    /// Number of requests still waiting on their fence
    pub fn pending(&self) -> usize {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

/// De-pitch the readback buffer rows and write the DDS container
fn write_dds(request: &ReadbackRequest) -> Result<()> {
    let desc = &request.desc;
    let mut tight = Vec::new();
    let mut row = Vec::new();
    for fp in &request.footprints {
        row.resize(fp.row_size as usize, 0u8);
        for y in 0..fp.height as u64 {
            request
                .buffer
                .read(fp.buffer_offset + y * fp.row_pitch, &mut row)?;
            tight.extend_from_slice(&row);
        }
    }

    let caps2 = if request.cubemap {
        Some(
            Caps2::CUBEMAP
                | Caps2::CUBEMAP_POSITIVEX
                | Caps2::CUBEMAP_NEGATIVEX
                | Caps2::CUBEMAP_POSITIVEY
                | Caps2::CUBEMAP_NEGATIVEY
                | Caps2::CUBEMAP_POSITIVEZ
                | Caps2::CUBEMAP_NEGATIVEZ,
        )
    } else {
        None
    };
    let mut dds = Dds::new_dxgi(NewDxgiParams {
        height: desc.height,
        width: desc.width,
        depth: None,
        format: dds_format(desc.format)?,
        mipmap_levels: Some(desc.mip_levels),
        array_layers: if request.cubemap {
            Some(desc.array_layers / 6)
        } else {
            Some(desc.array_layers)
        },
        caps2,
        is_cubemap: request.cubemap,
        resource_dimension: D3D10ResourceDimension::Texture2D,
        alpha_mode: AlphaMode::Unknown,
    })
    .map_err(|e| Error::BackendError(format!("DDS header: {}", e)))?;
    dds.data = tight;

    let mut file = std::fs::File::create(&request.path)
        .map_err(|e| Error::BackendError(format!("create {}: {}", request.path.display(), e)))?;
    dds.write(&mut file)
        .map_err(|e| Error::BackendError(format!("write {}: {}", request.path.display(), e)))?;
    crate::engine_info!("nebula3d::ReadbackManager",
        "Wrote '{}'", request.path.display());
    Ok(())
}

/// Load an uncompressed DDS file back into texture creation inputs.
///
/// The inverse of `save_texture_to_dds` for round-trip use; returns the
/// texture dimensions and one data blob per (mip, slice) subresource.
pub fn load_dds(path: impl AsRef<Path>) -> Result<(TextureDesc, Vec<TextureSubresourceData>)> {
    let mut file = std::fs::File::open(path.as_ref())
        .map_err(|e| Error::BackendError(format!("open {}: {}", path.as_ref().display(), e)))?;
    let dds = Dds::read(&mut file)
        .map_err(|e| Error::BackendError(format!("parse {}: {}", path.as_ref().display(), e)))?;

    let format = engine_format(
        dds.get_dxgi_format()
            .ok_or_else(|| Error::InvalidResource("DDS without DXGI format".to_string()))?,
    )?;
    let width = dds.get_width();
    let height = dds.get_height();
    let mip_levels = dds.get_num_mipmap_levels();
    let cubemap = dds.header.caps2.contains(Caps2::CUBEMAP);
    let array_layers = dds.get_num_array_layers() * if cubemap { 6 } else { 1 };

    let desc = TextureDesc {
        width,
        height,
        mip_levels,
        array_layers,
        cubemap,
        format,
        usage: crate::rhi::TextureUsage::SAMPLED | crate::rhi::TextureUsage::TRANSFER_DST,
        name: path.as_ref().display().to_string(),
    };

    let bpp = format.bytes_per_pixel() as usize;
    let mut subresources = Vec::new();
    let mut cursor = 0usize;
    for slice in 0..array_layers {
        for mip in 0..mip_levels {
            let (w, h) = desc.mip_extent(mip);
            let size = (w * h) as usize * bpp;
            if cursor + size > dds.data.len() {
                return Err(Error::InvalidResource(
                    "DDS data shorter than its header promises".to_string(),
                ));
            }
            subresources.push(TextureSubresourceData {
                mip,
                slice,
                data: dds.data[cursor..cursor + size].to_vec(),
            });
            cursor += size;
        }
    }
    Ok((desc, subresources))
}

fn dds_format(format: Format) -> Result<DxgiFormat> {
    Ok(match format {
        Format::R8G8B8A8_UNORM => DxgiFormat::R8G8B8A8_UNorm,
        Format::R8G8B8A8_UNORM_SRGB => DxgiFormat::R8G8B8A8_UNorm_sRGB,
        Format::B8G8R8A8_UNORM => DxgiFormat::B8G8R8A8_UNorm,
        Format::R16G16B16A16_FLOAT => DxgiFormat::R16G16B16A16_Float,
        Format::R32G32B32A32_FLOAT => DxgiFormat::R32G32B32A32_Float,
        Format::R11G11B10_FLOAT => DxgiFormat::R11G11B10_Float,
        Format::R16_FLOAT => DxgiFormat::R16_Float,
        Format::R16G16_FLOAT => DxgiFormat::R16G16_Float,
        Format::R32_FLOAT => DxgiFormat::R32_Float,
        Format::R32_UINT => DxgiFormat::R32_UInt,
        Format::R8_UNORM => DxgiFormat::R8_UNorm,
        other => {
            return Err(Error::InvalidResource(format!(
                "format {:?} has no DDS mapping",
                other
            )))
        }
    })
}

fn engine_format(format: DxgiFormat) -> Result<Format> {
    Ok(match format {
        DxgiFormat::R8G8B8A8_UNorm => Format::R8G8B8A8_UNORM,
        DxgiFormat::R8G8B8A8_UNorm_sRGB => Format::R8G8B8A8_UNORM_SRGB,
        DxgiFormat::B8G8R8A8_UNorm => Format::B8G8R8A8_UNORM,
        DxgiFormat::R16G16B16A16_Float => Format::R16G16B16A16_FLOAT,
        DxgiFormat::R32G32B32A32_Float => Format::R32G32B32A32_FLOAT,
        DxgiFormat::R11G11B10_Float => Format::R11G11B10_FLOAT,
        DxgiFormat::R16_Float => Format::R16_FLOAT,
        DxgiFormat::R16G16_Float => Format::R16G16_FLOAT,
        DxgiFormat::R32_Float => Format::R32_FLOAT,
        DxgiFormat::R32_UInt => Format::R32_UINT,
        DxgiFormat::R8_UNorm => Format::R8_UNORM,
        other => {
            return Err(Error::InvalidResource(format!(
                "DDS format {:?} not supported",
                other
            )))
        }
    })
}
