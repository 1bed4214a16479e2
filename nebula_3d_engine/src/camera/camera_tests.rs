use super::*;
use glam::{Vec3, Vec4Swizzles};

#[test]
fn test_view_matrix_inverts_pose() {
    let info = CameraInfo {
        position: Vec3::new(0.0, 0.0, 5.0),
        ..Default::default()
    };
    let camera = Camera::new(info);
    // The camera's own position maps to the view-space origin
    let origin = camera.view_matrix() * info.position.extend(1.0);
    assert!(origin.xyz().length() < 1e-5);
}

#[test]
fn test_cascade_splits_are_monotonic_and_bounded() {
    let splits = cascade_splits(4, 0.1, 100.0);
    assert_eq!(splits.len(), 4);
    for window in splits.windows(2) {
        assert!(window[0] < window[1]);
    }
    assert!((splits[3] - 100.0).abs() < 1e-3);
    assert!(splits[0] > 0.1);
}

#[test]
fn test_cascade_splits_blend_log_and_uniform() {
    // The practical scheme puts near cascades much tighter than uniform
    let splits = cascade_splits(4, 0.1, 100.0);
    assert!(splits[0] < 25.0);
}
