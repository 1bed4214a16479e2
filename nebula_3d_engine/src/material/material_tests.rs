use super::*;
use crate::ecs::phase;
use crate::material::{MaterialFlags, PsoFlags};
use crate::rhi::BlendMode;

#[test]
fn test_opaque_material_participates_in_all_phases() {
    let material = Material::from_description(&MaterialDescription::default());
    let technique = material.technique();
    assert!(technique.participates_in(phase::Z_PREPASS));
    assert!(technique.participates_in(phase::GBUFFER_PASS));
    assert!(technique.participates_in(phase::SHADOW_MAPS_PASS));
    assert!(technique.participates_in(phase::FORWARD_PASS));
    assert!(!material.is_blended());
}

#[test]
fn test_blended_material_only_draws_forward() {
    let desc = MaterialDescription {
        blend_state: BlendMode::AlphaBlend,
        ..Default::default()
    };
    let material = Material::from_description(&desc);
    assert!(material.is_blended());
    let technique = material.technique();
    assert!(technique.participates_in(phase::FORWARD_PASS));
    assert!(!technique.participates_in(phase::GBUFFER_PASS));
    assert!(!technique.participates_in(phase::SHADOW_MAPS_PASS));
}

#[test]
fn test_opacity_texture_selects_alpha_testing_not_blending() {
    // Deterministic policy: an opacity texture alone means alpha testing
    let desc = MaterialDescription {
        opacity: TextureAndConstant {
            texture: None, // flags derive from presence; simulate via factor-only
            factor: 1.0,
            channels: vec![3],
        },
        ..Default::default()
    };
    // Without a texture the material stays plain opaque
    let material = Material::from_description(&desc);
    assert!(!material.pso_flags().contains(PsoFlags::ALPHA_TEST));
    assert!(!material.material_flags().contains(MaterialFlags::OPACITY_TEXTURE));
}

#[test]
fn test_content_hash_deduplicates_identical_descriptions() {
    let a = Material::from_description(&MaterialDescription::default());
    let b = Material::from_description(&MaterialDescription {
        name: "different-name".to_string(),
        ..Default::default()
    });
    // Names differ, content does not
    assert_eq!(a.content_hash(), b.content_hash());

    let c = Material::from_description(&MaterialDescription {
        alpha_cutoff: 0.75,
        ..Default::default()
    });
    assert_ne!(a.content_hash(), c.content_hash());
}

#[test]
fn test_material_cb_bakes_factors_and_swizzles() {
    let desc = MaterialDescription {
        metallic: TextureAndConstant {
            factor: 0.25,
            channels: vec![2],
            ..Default::default()
        },
        roughness: TextureAndConstant {
            factor: 0.5,
            channels: vec![1],
            ..Default::default()
        },
        ..Default::default()
    };
    let material = Material::from_description(&desc);
    let cb = material.material_cb();
    assert_eq!(cb.metallic_factor, 0.25);
    assert_eq!(cb.roughness_factor, 0.5);
    assert_eq!(cb.channel_swizzles & 0xff, 2);
    assert_eq!((cb.channel_swizzles >> 8) & 0xff, 1);
}

#[test]
fn test_material_slot_starts_unassigned() {
    let material = Material::from_description(&MaterialDescription::default());
    assert_eq!(material.material_slot(), u32::MAX);
}
