use super::*;
use crate::ecs::Entity;
use crate::mesh::Skeleton;
use crate::test_support::Harness;
use glam::Mat4;

#[test]
fn test_instances_of_one_base_share_inverse_bind_upload() {
    let mut harness = Harness::new();
    let mut manager = {
        let mut gpu = harness.gpu(1);
        SkinningManager::new(&mut gpu).unwrap()
    };
    let base = Skeleton::new(vec![Entity::default(); 8], vec![Mat4::IDENTITY; 8]);
    let a = base.copy_skeleton();
    let b = base.copy_skeleton();

    let mut gpu = harness.gpu(1);
    let slot_a = manager.acquire_skinning_instance(&mut gpu, &a).unwrap();
    let slot_b = manager.acquire_skinning_instance(&mut gpu, &b).unwrap();
    assert_ne!(slot_a, slot_b);
    assert_eq!(manager.instance_count(), 2);
    // One shared inverse-bind table: both copies report the same base
    assert!(a.shares_base_with(&b));
}

#[test]
fn test_release_recycles_slots_and_shared_bind_pose() {
    let mut harness = Harness::new();
    let mut manager = {
        let mut gpu = harness.gpu(1);
        SkinningManager::new(&mut gpu).unwrap()
    };
    let base = Skeleton::new(vec![Entity::default(); 4], vec![Mat4::IDENTITY; 4]);
    let skeleton = base.copy_skeleton();

    let mut gpu = harness.gpu(1);
    let slot = manager.acquire_skinning_instance(&mut gpu, &skeleton).unwrap();
    manager.release_skinning_instance(slot);
    assert_eq!(manager.instance_count(), 0);

    // Releasing twice is harmless
    manager.release_skinning_instance(slot);

    let again = manager.acquire_skinning_instance(&mut gpu, &skeleton).unwrap();
    assert_eq!(again, slot);
}

#[test]
fn test_dirty_skeletons_upload_once_per_frame() {
    let mut harness = Harness::new();
    let mut manager = {
        let mut gpu = harness.gpu(1);
        SkinningManager::new(&mut gpu).unwrap()
    };
    let skeleton = Skeleton::new(vec![Entity::default(); 4], vec![Mat4::IDENTITY; 4]).copy_skeleton();
    let mut gpu = harness.gpu(1);
    manager.acquire_skinning_instance(&mut gpu, &skeleton).unwrap();

    // Creation leaves the skeleton dirty once
    assert_eq!(manager.update_dirty_skeletons(&mut gpu).unwrap(), 1);
    assert_eq!(manager.update_dirty_skeletons(&mut gpu).unwrap(), 0);

    // Externally evaluated transforms re-dirty it
    skeleton.set_instance_transforms(vec![Mat4::from_rotation_x(0.5); 4]);
    assert_eq!(manager.update_dirty_skeletons(&mut gpu).unwrap(), 1);
}

#[test]
fn test_empty_skeleton_is_rejected() {
    let mut harness = Harness::new();
    let mut manager = {
        let mut gpu = harness.gpu(1);
        SkinningManager::new(&mut gpu).unwrap()
    };
    let empty = Skeleton::new(Vec::new(), Vec::new());
    let mut gpu = harness.gpu(1);
    let result = manager.acquire_skinning_instance(&mut gpu, &empty);
    assert!(matches!(result, Err(crate::error::Error::InvalidResource(_))));
}
