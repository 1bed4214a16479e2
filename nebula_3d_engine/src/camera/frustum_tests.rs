use super::*;
use crate::camera::{Camera, CameraInfo};
use crate::mesh::Aabb;
use crate::shader_buffers::BoundingSphere;
use glam::Vec3;

fn camera_frustum() -> Frustum {
    let camera = Camera::new(CameraInfo {
        position: Vec3::ZERO,
        ..Default::default()
    });
    Frustum::from_view_projection(&camera.view_projection())
}

#[test]
fn test_sphere_in_front_is_visible() {
    let frustum = camera_frustum();
    // Default camera looks down -Z
    let visible = BoundingSphere {
        center: [0.0, 0.0, -10.0],
        radius: 1.0,
    };
    assert!(frustum.intersects_sphere(&visible));
}

#[test]
fn test_sphere_behind_is_culled() {
    let frustum = camera_frustum();
    let behind = BoundingSphere {
        center: [0.0, 0.0, 10.0],
        radius: 1.0,
    };
    assert!(!frustum.intersects_sphere(&behind));
}

#[test]
fn test_large_sphere_straddling_plane_is_visible() {
    let frustum = camera_frustum();
    let straddling = BoundingSphere {
        center: [0.0, 0.0, 1.0],
        radius: 5.0,
    };
    assert!(frustum.intersects_sphere(&straddling));
}

#[test]
fn test_aabb_tests_match_sphere_results() {
    let frustum = camera_frustum();
    let visible = Aabb {
        min: Vec3::new(-1.0, -1.0, -11.0),
        max: Vec3::new(1.0, 1.0, -9.0),
    };
    assert!(frustum.intersects_aabb(&visible));

    let behind = Aabb {
        min: Vec3::new(-1.0, -1.0, 9.0),
        max: Vec3::new(1.0, 1.0, 11.0),
    };
    assert!(!frustum.intersects_aabb(&behind));
}
