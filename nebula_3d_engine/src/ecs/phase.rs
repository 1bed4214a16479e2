/// Render phases
///
/// A render phase is a typed identity `{ name, hash }` used both as an ECS
/// tag entity and as a key in per-workload maps. Materials declare the
/// phases they draw in through their technique descriptor.

/// FNV-1a, evaluated at compile time for the predefined phases
const fn fnv1a(name: &str) -> u64 {
    let bytes = name.as_bytes();
    let mut hash = 0xcbf29ce484222325u64;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(0x100000001b3);
        i += 1;
    }
    hash
}

/// A named point in the frame at which a material may choose to be drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPhase {
    pub name: &'static str,
    pub hash: u64,
}

impl RenderPhase {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            hash: fnv1a(name),
        }
    }
}

/// Depth-only pre-pass
pub const Z_PREPASS: RenderPhase = RenderPhase::new("ZPrepass");
/// G-buffer fill
pub const GBUFFER_PASS: RenderPhase = RenderPhase::new("GBufferPass");
/// Shadow map rendering (all light views)
pub const SHADOW_MAPS_PASS: RenderPhase = RenderPhase::new("ShadowMapsPass");
/// Forward shading (includes blended geometry via the PPLL passes)
pub const FORWARD_PASS: RenderPhase = RenderPhase::new("ForwardPass");

/// All phases the engine predefines, in frame order
pub const PREDEFINED_PHASES: [RenderPhase; 4] =
    [Z_PREPASS, GBUFFER_PASS, SHADOW_MAPS_PASS, FORWARD_PASS];

#[cfg(test)]
#[path = "phase_tests.rs"]
mod tests;
