use super::*;

#[test]
fn test_predefined_phases_have_distinct_hashes() {
    let mut seen = std::collections::HashSet::new();
    for phase in PREDEFINED_PHASES {
        assert!(seen.insert(phase.hash), "hash collision for {}", phase.name);
    }
}

#[test]
fn test_phase_identity_is_stable() {
    // The hash keys per-workload maps and PerPassMeshes; it must not drift
    assert_eq!(Z_PREPASS.hash, RenderPhase::new("ZPrepass").hash);
    assert_ne!(Z_PREPASS.hash, GBUFFER_PASS.hash);
}
