use super::*;
use crate::camera::CameraInfo;
use crate::test_support::Harness;

#[test]
fn test_views_get_distinct_cb_slots() {
    let mut harness = Harness::new();
    let mut views = {
        let mut gpu = harness.gpu(1);
        ViewManager::new(&mut gpu).unwrap()
    };
    let mut gpu = harness.gpu(1);

    let a = views
        .create_view(&mut gpu, &CameraInfo::default(), ViewFlags::PRIMARY_CAMERA)
        .unwrap();
    let b = views
        .create_view(&mut gpu, &CameraInfo::default(), ViewFlags::SHADOW_VIEW)
        .unwrap();

    let slot_a = views.view(a).unwrap().view_cb_index();
    let slot_b = views.view(b).unwrap().view_cb_index();
    assert_ne!(slot_a, slot_b);
    assert_eq!(views.view_count(), 2);
    assert_eq!(views.views_with_flags(ViewFlags::PRIMARY_CAMERA), vec![a]);
}

#[test]
fn test_view_cb_carries_frustum_planes() {
    let mut harness = Harness::new();
    let mut views = {
        let mut gpu = harness.gpu(1);
        ViewManager::new(&mut gpu).unwrap()
    };
    let mut gpu = harness.gpu(1);
    let id = views
        .create_view(&mut gpu, &CameraInfo::default(), ViewFlags::PRIMARY_CAMERA)
        .unwrap();
    let cb = views.view(id).unwrap().cb();
    // Normalized planes have unit-length normals
    for plane in cb.frustum_planes {
        let length = plane.truncate().length();
        assert!((length - 1.0).abs() < 1e-3);
    }
}

#[test]
fn test_bitfield_sized_to_meshlet_slots() {
    let mut harness = Harness::new();
    let mut views = {
        let mut gpu = harness.gpu(1);
        ViewManager::new(&mut gpu).unwrap()
    };
    let mut gpu = harness.gpu(1);
    let id = views
        .create_view(&mut gpu, &CameraInfo::default(), ViewFlags::PRIMARY_CAMERA)
        .unwrap();

    // 1000 meshlet slots -> 125 bytes, one bit per slot
    views.resize_meshlet_bitfield(&mut gpu, id, 1000).unwrap();
    {
        let view = views.view(id).unwrap();
        assert_eq!(view.meshlet_slot_count(), 1000);
        assert_eq!(view.meshlet_bitfield().unwrap().size(), 125);
    }

    // Workload change resizes; same count is a no-op
    let old_offset = views.view(id).unwrap().meshlet_bitfield().unwrap().offset();
    views.resize_meshlet_bitfield(&mut gpu, id, 1000).unwrap();
    assert_eq!(
        views.view(id).unwrap().meshlet_bitfield().unwrap().offset(),
        old_offset
    );

    views.resize_meshlet_bitfield(&mut gpu, id, 64).unwrap();
    assert_eq!(views.view(id).unwrap().meshlet_bitfield().unwrap().size(), 8);
}

#[test]
fn test_remove_view_releases_pool_slots() {
    let mut harness = Harness::new();
    let mut views = {
        let mut gpu = harness.gpu(1);
        ViewManager::new(&mut gpu).unwrap()
    };
    let mut gpu = harness.gpu(1);
    let id = views
        .create_view(&mut gpu, &CameraInfo::default(), ViewFlags::SHADOW_VIEW)
        .unwrap();
    let slot = views.view(id).unwrap().view_cb_index();
    views.remove_view(id);
    assert!(views.view(id).is_none());

    // The released slot recycles for the next view
    let fresh = views
        .create_view(&mut gpu, &CameraInfo::default(), ViewFlags::SHADOW_VIEW)
        .unwrap();
    assert_eq!(views.view(fresh).unwrap().view_cb_index(), slot);
}
