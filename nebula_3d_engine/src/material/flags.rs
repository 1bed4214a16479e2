/// Material and pipeline-state flag sets

use bitflags::bitflags;

bitflags! {
    /// Shader-visible material feature flags (mirrored in the material CB)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MaterialFlags: u32 {
        const BASE_COLOR_TEXTURE  = 1 << 0;
        const NORMAL_MAP          = 1 << 1;
        const AO_TEXTURE          = 1 << 2;
        const EMISSIVE_TEXTURE    = 1 << 3;
        const PBR_MAPS            = 1 << 4;
        const OPACITY_TEXTURE     = 1 << 5;
        const HEIGHT_MAP          = 1 << 6;
        const TEXTURED            = 1 << 7;
        const PBR                 = 1 << 8;
        const DOUBLE_SIDED        = 1 << 9;
        const PARALLAX            = 1 << 10;
        const NEGATE_NORMALS      = 1 << 11;
        const INVERT_NORMAL_GREEN = 1 << 12;
    }
}

bitflags! {
    /// Flags that select pipeline-state permutations
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PsoFlags: u32 {
        const ALPHA_TEST   = 1 << 0;
        const BLEND        = 1 << 1;
        const DOUBLE_SIDED = 1 << 2;
        const SKINNED      = 1 << 3;
        const WIREFRAME    = 1 << 4;
    }
}
