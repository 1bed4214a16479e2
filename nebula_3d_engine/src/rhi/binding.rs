/// Root binding model
///
/// The root/push-constant layout is fixed and known to all passes and
/// shaders. Every non-per-draw buffer or texture reference travels as a
/// bindless descriptor-heap slot index embedded in the corresponding
/// constant-buffer struct; the root table only carries the per-draw indices
/// below.

/// Root parameter table
///
/// | Param            | Contents                                              |
/// |------------------|-------------------------------------------------------|
/// | PerObject        | 1 u32 (per-object CB index)                           |
/// | PerMesh          | 2 u32 (per-mesh CB index, per-mesh-instance CB index) |
/// | View             | 2 u32 (light/camera buffer index, view info index)    |
/// | Settings         | 3 u32 (enableShadows, enablePunctualLights, enableGTAO)|
/// | MiscUint         | 4 u32 general-purpose                                 |
/// | MiscFloat        | 4 f32 general-purpose                                 |
/// | TransparencyInfo | 4 u32 (PPLL head, nodes, counter, pool size)          |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootParam {
    PerObject,
    PerMesh,
    View,
    Settings,
    MiscUint,
    MiscFloat,
    TransparencyInfo,
}

impl RootParam {
    /// Size of this parameter in bytes
    pub const fn size_bytes(self) -> u32 {
        match self {
            RootParam::PerObject => 4,
            RootParam::PerMesh => 8,
            RootParam::View => 8,
            RootParam::Settings => 12,
            RootParam::MiscUint => 16,
            RootParam::MiscFloat => 16,
            RootParam::TransparencyInfo => 16,
        }
    }

    /// Byte offset of this parameter within the push-constant block
    pub const fn byte_offset(self) -> u32 {
        match self {
            RootParam::PerObject => 0,
            RootParam::PerMesh => 4,
            RootParam::View => 12,
            RootParam::Settings => 20,
            RootParam::MiscUint => 32,
            RootParam::MiscFloat => 48,
            RootParam::TransparencyInfo => 64,
        }
    }
}

/// Total push-constant block size in bytes
pub const PUSH_CONSTANT_SIZE: u32 = 80;

/// Bindless descriptor heap kinds.
///
/// Samplers live in a separate heap from CBV/SRV/UAV descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapKind {
    CbvSrvUav,
    Sampler,
}

/// Sentinel for "no descriptor slot assigned"
pub const INVALID_SLOT: u32 = u32::MAX;

#[cfg(test)]
#[path = "binding_tests.rs"]
mod tests;
