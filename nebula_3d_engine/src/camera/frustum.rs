/// View frustum - plane extraction and intersection tests
///
/// Planes are extracted from a view-projection matrix (Gribb/Hartmann) and
/// stored as (normal, distance) with normals pointing inward, so a point is
/// inside when every plane evaluates non-negative.

use glam::{Mat4, Vec3, Vec4};

use crate::mesh::Aabb;
use crate::shader_buffers::BoundingSphere;

#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far
    pub planes: [Vec4; 6],
}

impl Frustum {
    /// Extract the six planes from a view-projection matrix
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let m = view_projection.transpose();
        let rows = [m.col(0), m.col(1), m.col(2), m.col(3)];
        let mut planes = [
            rows[3] + rows[0], // left
            rows[3] - rows[0], // right
            rows[3] + rows[1], // bottom
            rows[3] - rows[1], // top
            rows[2],           // near (D3D-style 0..1 depth)
            rows[3] - rows[2], // far
        ];
        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > 0.0 {
                *plane /= length;
            }
        }
        Self { planes }
    }

    /// Signed distance of a point to a plane
    fn distance(plane: &Vec4, point: Vec3) -> f32 {
        plane.truncate().dot(point) + plane.w
    }

    /// Whether a bounding sphere intersects (or is inside) the frustum
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        let center = Vec3::from_array(sphere.center);
        self.planes
            .iter()
            .all(|plane| Self::distance(plane, center) >= -sphere.radius)
    }

    /// Whether an AABB intersects (or is inside) the frustum
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            // Positive vertex: the AABB corner furthest along the normal
            let normal = plane.truncate();
            let positive = Vec3::new(
                if normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            Self::distance(plane, positive) >= 0.0
        })
    }
}

#[cfg(test)]
#[path = "frustum_tests.rs"]
mod tests;
