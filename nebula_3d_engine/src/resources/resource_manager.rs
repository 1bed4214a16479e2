//! Central resource factory and bindless descriptor heap owner.
//!
//! Creates typed buffers and textures, assigns stable bindless descriptor
//! slots on creation, deduplicates samplers, and tracks current resource
//! state (through the wrappers' `TrackedState`). Freed descriptor slots are
//! not reused until `num_frames_in_flight` frames have passed.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::engine_bail;
use crate::error::{Error, Result};
use crate::rhi::{
    BufferDesc, BufferUsage, DescriptorHeapKind, DescriptorWrite, Device, HeapType, ResourceState,
    SamplerDesc, SubresourceRange, TextureDesc, TextureSubresourceData, TextureUsage,
    INVALID_SLOT,
};
use crate::utils::SlotAllocator;

use super::buffer::{BindlessSlots, BufferCreateInfo, GpuBuffer, COUNTER_PLACEMENT_ALIGNMENT};
use super::deletion::{DeferredRelease, DeletionManager};
use super::dynamic_buffer::DynamicBuffer;
use super::pixel_buffer::{PixelBuffer, SubresourceSlots, TextureDescription};
use super::sampler::Sampler;

pub struct ResourceManager {
    device: Arc<Mutex<dyn Device>>,
    cbv_srv_uav: SlotAllocator,
    sampler_slots: SlotAllocator,
    /// CPU-side render-target identifiers (not shader-visible)
    rtv_slots: SlotAllocator,
    dsv_slots: SlotAllocator,
    sampler_cache: FxHashMap<SamplerDesc, Arc<Sampler>>,
    frames_in_flight: u64,
    frame: u64,
}

impl ResourceManager {
    /// Create the resource manager, validating required device capabilities.
    ///
    /// # Errors
    ///
    /// Returns a Configuration error when the device lacks mesh shaders,
    /// bindless descriptor indexing, enhanced barriers or indirect count
    /// support.
    pub fn new(device: Arc<Mutex<dyn Device>>, frames_in_flight: u8) -> Result<Self> {
        let (cbv_srv_uav_capacity, sampler_capacity) = {
            let dev = device
                .lock()
                .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
            let caps = dev.caps();
            if !caps.mesh_shaders {
                engine_bail!(Configuration, "nebula3d::ResourceManager",
                    "device does not support mesh shaders");
            }
            if !caps.bindless {
                engine_bail!(Configuration, "nebula3d::ResourceManager",
                    "device does not support bindless descriptor indexing");
            }
            if !caps.enhanced_barriers {
                engine_bail!(Configuration, "nebula3d::ResourceManager",
                    "device does not support enhanced barriers");
            }
            if !caps.draw_indirect_count {
                engine_bail!(Configuration, "nebula3d::ResourceManager",
                    "device does not support indirect count execution");
            }
            (caps.max_cbv_srv_uav_descriptors, caps.max_sampler_descriptors)
        };

        Ok(Self {
            device,
            cbv_srv_uav: SlotAllocator::with_capacity(cbv_srv_uav_capacity),
            sampler_slots: SlotAllocator::with_capacity(sampler_capacity),
            rtv_slots: SlotAllocator::new(),
            dsv_slots: SlotAllocator::new(),
            sampler_cache: FxHashMap::default(),
            frames_in_flight: u64::from(frames_in_flight),
            frame: 0,
        })
    }

    /// The device this manager creates resources on
    pub fn device(&self) -> &Arc<Mutex<dyn Device>> {
        &self.device
    }

    /// Advance the frame counter and recycle matured descriptor slots
    pub fn begin_frame(&mut self, frame: u64) {
        self.frame = frame;
        // Slots freed at frame F mature once frame F + frames_in_flight begins
        self.cbv_srv_uav.collect(frame);
        self.sampler_slots.collect(frame);
    }

    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    pub fn frames_in_flight(&self) -> u64 {
        self.frames_in_flight
    }

    // ===== BUFFER CREATION =====

    /// Create a buffer and assign its bindless descriptor slots
    pub fn create_buffer(&mut self, info: &BufferCreateInfo) -> Result<Arc<GpuBuffer>> {
        if info.size == 0 {
            engine_bail!(InvalidResource, "nebula3d::ResourceManager",
                "buffer '{}' has zero size", info.name);
        }

        // Counter-backed buffers place a 4-byte counter after the data
        // region, aligned for UAV counter placement
        let counter_offset = if info.with_counter {
            Some(
                info.size.div_ceil(COUNTER_PLACEMENT_ALIGNMENT) * COUNTER_PLACEMENT_ALIGNMENT,
            )
        } else {
            None
        };
        let total_size = counter_offset.map_or(info.size, |off| off + 4);

        let mut usage = info.usage;
        if info.heap == HeapType::Default {
            usage |= BufferUsage::TRANSFER_DST | BufferUsage::TRANSFER_SRC;
        }
        if info.wants_uav || info.wants_srv {
            usage |= BufferUsage::STORAGE;
        }
        if info.wants_cbv {
            usage |= BufferUsage::CONSTANT;
        }

        let handle = {
            let mut dev = self
                .device
                .lock()
                .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
            dev.create_buffer(&BufferDesc {
                size: total_size,
                heap: info.heap,
                usage,
                name: info.name.clone(),
            })?
        };

        let mut slots = BindlessSlots::default();
        if info.wants_srv {
            slots.srv = self.cbv_srv_uav.alloc();
            self.write_descriptor(
                DescriptorHeapKind::CbvSrvUav,
                slots.srv,
                &DescriptorWrite::BufferSrv {
                    buffer: handle.clone(),
                    offset: 0,
                    size: info.size,
                    stride: info.element_size,
                    raw: info.element_size == 0,
                },
            )?;
        }
        if info.wants_uav {
            slots.uav = self.cbv_srv_uav.alloc();
            self.write_descriptor(
                DescriptorHeapKind::CbvSrvUav,
                slots.uav,
                &DescriptorWrite::BufferUav {
                    buffer: handle.clone(),
                    offset: 0,
                    size: info.size,
                    stride: info.element_size,
                    raw: info.element_size == 0,
                    counter_offset,
                },
            )?;
        }
        if info.wants_cbv {
            slots.cbv = self.cbv_srv_uav.alloc();
            self.write_descriptor(
                DescriptorHeapKind::CbvSrvUav,
                slots.cbv,
                &DescriptorWrite::BufferCbv {
                    buffer: handle.clone(),
                    offset: 0,
                    size: info.size,
                },
            )?;
        }

        crate::engine_info!("nebula3d::ResourceManager",
            "Created buffer '{}' ({} bytes, srv {}, uav {})",
            info.name, total_size,
            if slots.srv == INVALID_SLOT { "-".to_string() } else { slots.srv.to_string() },
            if slots.uav == INVALID_SLOT { "-".to_string() } else { slots.uav.to_string() });

        Ok(Arc::new(GpuBuffer::new(handle, slots, info, counter_offset)))
    }

    /// Recreate a pool's backing buffer at a new size (same views and state)
    pub(crate) fn recreate_pool_buffer(
        &mut self,
        old: &Arc<GpuBuffer>,
        new_size: u64,
    ) -> Result<Arc<GpuBuffer>> {
        let mut info = old.create_info().clone();
        info.size = new_size;
        self.create_buffer(&info)
    }

    /// Create a bindless suballocated pool (§4.3 dynamic buffer)
    pub fn create_indexed_dynamic_buffer(
        &mut self,
        element_size: u32,
        initial_element_count: u64,
        state: ResourceState,
        name: &str,
        raw: bool,
        with_counter: bool,
    ) -> Result<DynamicBuffer> {
        let stride = if raw { 0 } else { element_size };
        let capacity = u64::from(element_size.max(1)) * initial_element_count.max(1);
        let info = BufferCreateInfo {
            size: capacity,
            heap: HeapType::Default,
            usage: BufferUsage::STORAGE,
            element_size: stride,
            wants_srv: true,
            wants_uav: with_counter || state == ResourceState::UnorderedAccess,
            wants_cbv: false,
            with_counter,
            initial_state: state,
            name: name.to_string(),
        };
        let backing = self.create_buffer(&info)?;
        Ok(DynamicBuffer::new(
            backing,
            capacity,
            u64::from(element_size.max(1)),
        ))
    }

    // ===== TEXTURE CREATION =====

    /// Create a texture and its declared per-mip / per-slice descriptors
    pub fn create_texture(
        &mut self,
        desc: &TextureDescription,
        initial_data: &[TextureSubresourceData],
    ) -> Result<Arc<PixelBuffer>> {
        if desc.mip_levels == 0 || desc.array_layers == 0 {
            engine_bail!(InvalidResource, "nebula3d::ResourceManager",
                "texture '{}' has zero mips or layers", desc.name);
        }
        if desc.cubemap && desc.array_layers % 6 != 0 {
            engine_bail!(InvalidResource, "nebula3d::ResourceManager",
                "cubemap '{}' needs a multiple of 6 layers, got {}",
                desc.name, desc.array_layers);
        }
        if desc.has_dsv && !desc.format.is_depth() {
            engine_bail!(InvalidResource, "nebula3d::ResourceManager",
                "texture '{}' requests a DSV with non-depth format {:?}",
                desc.name, desc.format);
        }

        let mut usage = TextureUsage::TRANSFER_SRC | TextureUsage::TRANSFER_DST;
        if desc.has_srv {
            usage |= TextureUsage::SAMPLED;
        }
        if desc.has_uav {
            usage |= TextureUsage::STORAGE;
        }
        if desc.has_rtv {
            usage |= TextureUsage::RENDER_TARGET;
        }
        if desc.has_dsv {
            usage |= TextureUsage::DEPTH_STENCIL;
        }

        let rhi_desc = TextureDesc {
            width: desc.width,
            height: desc.height,
            mip_levels: desc.mip_levels,
            array_layers: desc.array_layers,
            cubemap: desc.cubemap,
            format: desc.format,
            usage,
            name: desc.name.clone(),
        };
        let handle = {
            let mut dev = self
                .device
                .lock()
                .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
            dev.create_texture(&rhi_desc, initial_data)?
        };

        // Whole-resource SRV (cube view for cubemaps)
        let srv_slot = if desc.has_srv {
            let slot = self.cbv_srv_uav.alloc();
            self.write_descriptor(
                DescriptorHeapKind::CbvSrvUav,
                slot,
                &DescriptorWrite::TextureSrv {
                    texture: handle.clone(),
                    range: SubresourceRange {
                        first_mip: 0,
                        mip_count: desc.mip_levels,
                        first_slice: 0,
                        slice_count: desc.array_layers,
                    },
                    cube: desc.cubemap,
                },
            )?;
            slot
        } else {
            INVALID_SLOT
        };

        // Per-mip SRVs over all slices
        let mut mip_srv_slots = Vec::new();
        if desc.has_srv && desc.per_mip_srvs {
            for mip in 0..desc.mip_levels {
                let slot = self.cbv_srv_uav.alloc();
                self.write_descriptor(
                    DescriptorHeapKind::CbvSrvUav,
                    slot,
                    &DescriptorWrite::TextureSrv {
                        texture: handle.clone(),
                        range: SubresourceRange {
                            first_mip: mip,
                            mip_count: 1,
                            first_slice: 0,
                            slice_count: desc.array_layers,
                        },
                        cube: false,
                    },
                )?;
                mip_srv_slots.push(slot);
            }
        }

        let subresource_count = (desc.mip_levels * desc.array_layers) as usize;

        // Per-mip, per-slice UAVs
        let uav_slots = if desc.has_uav {
            let mut slots = Vec::with_capacity(subresource_count);
            for slice in 0..desc.array_layers {
                for mip in 0..desc.mip_levels {
                    let slot = self.cbv_srv_uav.alloc();
                    self.write_descriptor(
                        DescriptorHeapKind::CbvSrvUav,
                        slot,
                        &DescriptorWrite::TextureUav {
                            texture: handle.clone(),
                            mip,
                            first_slice: slice,
                            slice_count: 1,
                        },
                    )?;
                    slots.push(slot);
                }
            }
            // Stored mip-major per slice: rebuild in (slice * mips + mip) order
            let mut table = vec![INVALID_SLOT; subresource_count];
            let mut it = slots.into_iter();
            for slice in 0..desc.array_layers {
                for mip in 0..desc.mip_levels {
                    table[(slice * desc.mip_levels + mip) as usize] =
                        it.next().unwrap_or(INVALID_SLOT);
                }
            }
            SubresourceSlots::new(table, desc.mip_levels)
        } else {
            SubresourceSlots::new(Vec::new(), desc.mip_levels)
        };

        let rtv_slots = if desc.has_rtv {
            let mut table = vec![INVALID_SLOT; subresource_count];
            for slice in 0..desc.array_layers {
                for mip in 0..desc.mip_levels {
                    table[(slice * desc.mip_levels + mip) as usize] = self.rtv_slots.alloc();
                }
            }
            SubresourceSlots::new(table, desc.mip_levels)
        } else {
            SubresourceSlots::new(Vec::new(), desc.mip_levels)
        };

        let dsv_slots = if desc.has_dsv {
            let mut table = vec![INVALID_SLOT; subresource_count];
            for slice in 0..desc.array_layers {
                for mip in 0..desc.mip_levels {
                    table[(slice * desc.mip_levels + mip) as usize] = self.dsv_slots.alloc();
                }
            }
            SubresourceSlots::new(table, desc.mip_levels)
        } else {
            SubresourceSlots::new(Vec::new(), desc.mip_levels)
        };

        let sampler = match &desc.sampler {
            Some(sampler_desc) => Some(self.create_sampler(sampler_desc)?),
            None => None,
        };

        crate::engine_info!("nebula3d::ResourceManager",
            "Created texture '{}' ({}x{}, {} mips, {} layers, {:?})",
            desc.name, desc.width, desc.height, desc.mip_levels, desc.array_layers,
            desc.format);

        Ok(Arc::new(PixelBuffer::new(
            handle,
            desc.clone(),
            srv_slot,
            mip_srv_slots,
            uav_slots,
            rtv_slots,
            dsv_slots,
            sampler,
        )))
    }

    // ===== SAMPLERS =====

    /// Create or reuse a sampler; descriptions deduplicate by equality
    pub fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<Arc<Sampler>> {
        if let Some(existing) = self.sampler_cache.get(desc) {
            return Ok(existing.clone());
        }
        let handle = {
            let mut dev = self
                .device
                .lock()
                .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
            dev.create_sampler(desc)?
        };
        let slot = self.sampler_slots.alloc();
        self.write_descriptor(
            DescriptorHeapKind::Sampler,
            slot,
            &DescriptorWrite::Sampler {
                sampler: handle.clone(),
            },
        )?;
        let sampler = Arc::new(Sampler::new(handle, slot, *desc));
        self.sampler_cache.insert(*desc, sampler.clone());
        Ok(sampler)
    }

    /// Number of distinct samplers created so far
    pub fn sampler_count(&self) -> usize {
        self.sampler_cache.len()
    }

    // ===== DESCRIPTORS =====

    /// Allocate a raw descriptor slot
    pub fn allocate_descriptor(&mut self, heap: DescriptorHeapKind) -> u32 {
        match heap {
            DescriptorHeapKind::CbvSrvUav => self.cbv_srv_uav.alloc(),
            DescriptorHeapKind::Sampler => self.sampler_slots.alloc(),
        }
    }

    /// Free a descriptor slot; reuse is deferred by `frames_in_flight` frames
    pub fn free_descriptor(&mut self, heap: DescriptorHeapKind, slot: u32) {
        match heap {
            DescriptorHeapKind::CbvSrvUav => {
                self.cbv_srv_uav
                    .free_deferred(slot, self.frame, self.frames_in_flight)
            }
            DescriptorHeapKind::Sampler => {
                self.sampler_slots
                    .free_deferred(slot, self.frame, self.frames_in_flight)
            }
        }
    }

    /// Whether a freed slot is still inside its deferred window
    pub fn descriptor_is_deferred(&self, heap: DescriptorHeapKind, slot: u32) -> bool {
        match heap {
            DescriptorHeapKind::CbvSrvUav => self.cbv_srv_uav.is_deferred(slot),
            DescriptorHeapKind::Sampler => self.sampler_slots.is_deferred(slot),
        }
    }

    fn write_descriptor(
        &self,
        heap: DescriptorHeapKind,
        slot: u32,
        write: &DescriptorWrite,
    ) -> Result<()> {
        let mut dev = self
            .device
            .lock()
            .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
        dev.write_descriptor(heap, slot, write)
    }

    // ===== DESTRUCTION =====

    /// Release a buffer: slots go to the deferred free list, the handle to
    /// the deletion manager
    pub fn destroy_buffer(&mut self, buffer: Arc<GpuBuffer>, deletion: &mut DeletionManager) {
        let slots = buffer.slots();
        if slots.srv != INVALID_SLOT {
            self.free_descriptor(DescriptorHeapKind::CbvSrvUav, slots.srv);
        }
        if slots.uav != INVALID_SLOT {
            self.free_descriptor(DescriptorHeapKind::CbvSrvUav, slots.uav);
        }
        if slots.cbv != INVALID_SLOT {
            self.free_descriptor(DescriptorHeapKind::CbvSrvUav, slots.cbv);
        }
        crate::engine_info!("nebula3d::ResourceManager",
            "Released buffer '{}'", buffer.name());
        deletion.mark_for_delete(DeferredRelease::EngineBuffer(buffer), self.frame);
    }

    /// Release a texture: SRV/UAV slots deferred, RTV/DSV identifiers
    /// recycled immediately (CPU-side only), handle to the deletion manager
    pub fn destroy_texture(&mut self, texture: Arc<PixelBuffer>, deletion: &mut DeletionManager) {
        if texture.srv_slot() != INVALID_SLOT {
            self.free_descriptor(DescriptorHeapKind::CbvSrvUav, texture.srv_slot());
        }
        for mip in 0..texture.mip_levels() {
            let slot = texture.mip_srv_slot(mip);
            if slot != INVALID_SLOT {
                self.free_descriptor(DescriptorHeapKind::CbvSrvUav, slot);
            }
            for slice in 0..texture.array_layers() {
                let uav = texture.uav_slot(mip, slice);
                if uav != INVALID_SLOT {
                    self.free_descriptor(DescriptorHeapKind::CbvSrvUav, uav);
                }
                let rtv = texture.rtv_slot(mip, slice);
                if rtv != INVALID_SLOT {
                    self.rtv_slots.free(rtv);
                }
                let dsv = texture.dsv_slot(mip, slice);
                if dsv != INVALID_SLOT {
                    self.dsv_slots.free(dsv);
                }
            }
        }
        crate::engine_info!("nebula3d::ResourceManager",
            "Released texture '{}'", texture.name());
        deletion.mark_for_delete(DeferredRelease::EngineTexture(texture), self.frame);
    }
}

#[cfg(test)]
#[path = "resource_manager_tests.rs"]
mod tests;
