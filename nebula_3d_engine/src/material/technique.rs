/// Technique descriptor
///
/// A material's declared set of (render phase, compile flags)
/// participations. The indirect command buffer manager registers one
/// workload per (view, phase, compile flags) a technique names; the PSO
/// cache keys pipelines by the same pair.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::ecs::phase::RenderPhase;
use super::flags::PsoFlags;

/// Hash key over a pipeline permutation's compile defines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompileFlags(pub u64);

impl CompileFlags {
    /// Derive the compile-flag set from the PSO flags a permutation bakes in
    pub fn from_pso_flags(flags: PsoFlags) -> Self {
        Self(u64::from(flags.bits()))
    }
}

/// One (phase, compile flags) participation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TechniquePhase {
    pub phase: RenderPhase,
    pub compile_flags: CompileFlags,
}

/// The full participation set of one material
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TechniqueDescriptor {
    participations: Vec<TechniquePhase>,
}

impl TechniqueDescriptor {
    pub fn new(participations: Vec<TechniquePhase>) -> Self {
        Self { participations }
    }

    pub fn participations(&self) -> &[TechniquePhase] {
        &self.participations
    }

    /// Whether this technique draws in `phase`
    pub fn participates_in(&self, phase: RenderPhase) -> bool {
        self.participations.iter().any(|p| p.phase == phase)
    }

    /// Compile flags used for `phase`, when participating
    pub fn compile_flags_for(&self, phase: RenderPhase) -> Option<CompileFlags> {
        self.participations
            .iter()
            .find(|p| p.phase == phase)
            .map(|p| p.compile_flags)
    }

    /// Stable hash over the whole participation set
    pub fn hash64(&self) -> u64 {
        let mut hasher = FxHasher::default();
        for p in &self.participations {
            p.phase.hash.hash(&mut hasher);
            p.compile_flags.0.hash(&mut hasher);
        }
        hasher.finish()
    }
}
