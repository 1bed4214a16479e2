use super::*;
use crate::material::{Material, MaterialDescription};
use crate::test_support::Harness;

#[test]
fn test_usage_counting_releases_slot_at_zero() {
    let mut harness = Harness::new();
    let mut manager = {
        let mut gpu = harness.gpu(1);
        MaterialManager::new(&mut gpu).unwrap()
    };
    let material = Material::from_description(&MaterialDescription::default());

    let mut gpu = harness.gpu(1);
    let slot = manager.increment_usage(&mut gpu, &material).unwrap();
    manager.increment_usage(&mut gpu, &material).unwrap();
    assert_eq!(manager.use_count(&material), 2);
    assert_eq!(material.material_slot(), slot);

    manager.decrement_usage(&material);
    assert_eq!(manager.use_count(&material), 1);
    assert_eq!(manager.material_count(), 1);

    manager.decrement_usage(&material);
    assert_eq!(manager.use_count(&material), 0);
    assert_eq!(manager.material_count(), 0);
}

#[test]
fn test_content_equal_materials_share_one_slot() {
    let mut harness = Harness::new();
    let mut manager = {
        let mut gpu = harness.gpu(1);
        MaterialManager::new(&mut gpu).unwrap()
    };
    let a = Material::from_description(&MaterialDescription::default());
    let b = Material::from_description(&MaterialDescription {
        name: "same content, other name".to_string(),
        ..Default::default()
    });

    let mut gpu = harness.gpu(1);
    let slot_a = manager.increment_usage(&mut gpu, &a).unwrap();
    let slot_b = manager.increment_usage(&mut gpu, &b).unwrap();
    assert_eq!(slot_a, slot_b);
    assert_eq!(manager.material_count(), 1);
    assert_eq!(manager.use_count(&a), 2);
}

#[test]
fn test_distinct_content_gets_distinct_slots() {
    let mut harness = Harness::new();
    let mut manager = {
        let mut gpu = harness.gpu(1);
        MaterialManager::new(&mut gpu).unwrap()
    };
    let a = Material::from_description(&MaterialDescription::default());
    let b = Material::from_description(&MaterialDescription {
        alpha_cutoff: 0.9,
        ..Default::default()
    });

    let mut gpu = harness.gpu(1);
    let slot_a = manager.increment_usage(&mut gpu, &a).unwrap();
    let slot_b = manager.increment_usage(&mut gpu, &b).unwrap();
    assert_ne!(slot_a, slot_b);
    assert_eq!(manager.material_count(), 2);
}
