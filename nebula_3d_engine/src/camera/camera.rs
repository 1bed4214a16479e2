/// Camera state and projection math

use glam::{Mat4, Quat, Vec3};

/// Plain description of a camera's projection and pose, used to create
/// render views
#[derive(Debug, Clone, Copy)]
pub struct CameraInfo {
    pub position: Vec3,
    pub rotation: Quat,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraInfo {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            fov_y: std::f32::consts::FRAC_PI_3,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// A perspective camera
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    info: CameraInfo,
}

impl Camera {
    pub fn new(info: CameraInfo) -> Self {
        Self { info }
    }

    pub fn info(&self) -> &CameraInfo {
        &self.info
    }

    pub fn set_info(&mut self, info: CameraInfo) {
        self.info = info;
    }

    pub fn position(&self) -> Vec3 {
        self.info.position
    }

    /// World-to-view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.info.rotation, self.info.position).inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.info.fov_y, self.info.aspect, self.info.near, self.info.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Practical cascade split scheme: blend of logarithmic and uniform splits.
///
/// Returns `num_cascades` far-plane distances covering `[near,
/// max_shadow_distance]`. Written back into the settings store whenever the
/// camera changes, so light views can rebuild their cascade matrices.
pub fn cascade_splits(num_cascades: u8, near: f32, max_shadow_distance: f32) -> Vec<f32> {
    const LAMBDA: f32 = 0.75;
    let count = num_cascades.max(1) as usize;
    let far = max_shadow_distance.max(near + f32::EPSILON);
    (1..=count)
        .map(|i| {
            let p = i as f32 / count as f32;
            let log_split = near * (far / near).powf(p);
            let uniform_split = near + (far - near) * p;
            LAMBDA * log_split + (1.0 - LAMBDA) * uniform_split
        })
        .collect()
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
