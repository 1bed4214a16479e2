/// Camera module - camera state, frustum extraction and cascade splits

pub mod camera;
pub mod frustum;

pub use camera::{Camera, CameraInfo};
pub use frustum::Frustum;
