/// Pixel buffer - engine-side texture wrapper
///
/// Owns the backend texture plus the per-mip / per-slice descriptor slot
/// arrays declared at creation, the optional attached sampler, and the
/// tracked per-subresource state.

use std::sync::Arc;

use crate::rhi::{
    Format, ResourceState, SamplerDesc, SubresourceRange, TextureHandle, INVALID_SLOT,
};
use super::sampler::Sampler;
use super::tracked::TrackedState;

/// Creation parameters for a texture resource
#[derive(Clone)]
pub struct TextureDescription {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub cubemap: bool,
    pub format: Format,
    pub has_srv: bool,
    pub has_uav: bool,
    pub has_rtv: bool,
    pub has_dsv: bool,
    /// Allocate one SRV per mip in addition to the whole-resource SRV
    pub per_mip_srvs: bool,
    pub initial_state: ResourceState,
    pub sampler: Option<SamplerDesc>,
    pub name: String,
}

impl TextureDescription {
    /// A sampled 2D color texture with a full mip chain view
    pub fn sampled_2d(width: u32, height: u32, format: Format, name: impl Into<String>) -> Self {
        Self {
            width,
            height,
            mip_levels: 1,
            array_layers: 1,
            cubemap: false,
            format,
            has_srv: true,
            has_uav: false,
            has_rtv: false,
            has_dsv: false,
            per_mip_srvs: false,
            initial_state: ResourceState::AllSrv,
            sampler: Some(SamplerDesc::default()),
            name: name.into(),
        }
    }
}

/// Per-mip, per-slice descriptor slot table.
///
/// Indexed `slice * mip_levels + mip`; `INVALID_SLOT` where the view kind
/// was not requested for that subresource.
#[derive(Debug, Clone, Default)]
pub struct SubresourceSlots {
    pub slots: Vec<u32>,
    mip_levels: u32,
}

impl SubresourceSlots {
    pub(crate) fn new(slots: Vec<u32>, mip_levels: u32) -> Self {
        Self { slots, mip_levels }
    }

    pub fn get(&self, mip: u32, slice: u32) -> u32 {
        self.slots
            .get((slice * self.mip_levels + mip) as usize)
            .copied()
            .unwrap_or(INVALID_SLOT)
    }
}

/// A texture resource: pixel storage + descriptor slots + tracked state
pub struct PixelBuffer {
    handle: Arc<dyn TextureHandle>,
    desc: TextureDescription,
    /// Whole-resource SRV (cube view for cubemaps, array view otherwise)
    srv_slot: u32,
    /// Per-mip SRVs over all slices (bloom chain reads single mips)
    mip_srv_slots: Vec<u32>,
    /// Per-mip, per-slice UAV slots
    uav_slots: SubresourceSlots,
    /// Per-mip, per-slice RTV identifiers (engine-side, not shader-visible)
    rtv_slots: SubresourceSlots,
    /// Per-mip, per-slice DSV identifiers (engine-side, not shader-visible)
    dsv_slots: SubresourceSlots,
    sampler: Option<Arc<Sampler>>,
    state: TrackedState,
}

impl PixelBuffer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        handle: Arc<dyn TextureHandle>,
        desc: TextureDescription,
        srv_slot: u32,
        mip_srv_slots: Vec<u32>,
        uav_slots: SubresourceSlots,
        rtv_slots: SubresourceSlots,
        dsv_slots: SubresourceSlots,
        sampler: Option<Arc<Sampler>>,
    ) -> Self {
        let whole = SubresourceRange {
            first_mip: 0,
            mip_count: desc.mip_levels,
            first_slice: 0,
            slice_count: desc.array_layers,
        };
        let state = TrackedState::new(whole, desc.initial_state);
        Self {
            handle,
            desc,
            srv_slot,
            mip_srv_slots,
            uav_slots,
            rtv_slots,
            dsv_slots,
            sampler,
            state,
        }
    }

    pub fn handle(&self) -> &Arc<dyn TextureHandle> {
        &self.handle
    }

    pub fn description(&self) -> &TextureDescription {
        &self.desc
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    pub fn mip_levels(&self) -> u32 {
        self.desc.mip_levels
    }

    pub fn array_layers(&self) -> u32 {
        self.desc.array_layers
    }

    pub fn format(&self) -> Format {
        self.desc.format
    }

    /// Whole-resource SRV slot
    pub fn srv_slot(&self) -> u32 {
        self.srv_slot
    }

    /// SRV slot restricted to one mip (requires `per_mip_srvs`)
    pub fn mip_srv_slot(&self, mip: u32) -> u32 {
        self.mip_srv_slots.get(mip as usize).copied().unwrap_or(INVALID_SLOT)
    }

    pub fn uav_slot(&self, mip: u32, slice: u32) -> u32 {
        self.uav_slots.get(mip, slice)
    }

    pub fn rtv_slot(&self, mip: u32, slice: u32) -> u32 {
        self.rtv_slots.get(mip, slice)
    }

    pub fn dsv_slot(&self, mip: u32, slice: u32) -> u32 {
        self.dsv_slots.get(mip, slice)
    }

    pub fn sampler(&self) -> Option<&Arc<Sampler>> {
        self.sampler.as_ref()
    }

    /// Sampler heap slot, or `INVALID_SLOT` when no sampler is attached
    pub fn sampler_slot(&self) -> u32 {
        self.sampler.as_ref().map_or(INVALID_SLOT, |s| s.slot())
    }

    /// Tracked per-subresource state
    pub fn state(&self) -> &TrackedState {
        &self.state
    }

    /// The full subresource range of this texture
    pub fn whole_range(&self) -> SubresourceRange {
        self.state.whole_range()
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }
}
