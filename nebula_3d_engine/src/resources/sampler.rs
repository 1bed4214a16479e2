/// Engine-side sampler wrapper
///
/// Samplers are deduplicated by description: the resource manager hands out
/// the same `Arc<Sampler>` for hash-equal descriptions, so the sampler heap
/// stays small.

use std::sync::Arc;

use crate::rhi::{SamplerDesc, SamplerHandle};

/// A sampler with its shader-visible heap slot
pub struct Sampler {
    handle: Arc<dyn SamplerHandle>,
    slot: u32,
    desc: SamplerDesc,
}

impl Sampler {
    pub(crate) fn new(handle: Arc<dyn SamplerHandle>, slot: u32, desc: SamplerDesc) -> Self {
        Self { handle, slot, desc }
    }

    pub fn handle(&self) -> &Arc<dyn SamplerHandle> {
        &self.handle
    }

    /// Stable slot in the sampler descriptor heap
    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
}
