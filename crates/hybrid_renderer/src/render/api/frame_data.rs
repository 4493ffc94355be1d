//! Per-frame camera data
//!
//! Computed once by `Renderer::begin` and read by every pass of the frame.

use crate::foundation::math::{Mat4, Vec3};
use crate::render::primitives::{BoundingBox, Camera, Frustum};

/// Camera matrices and culling volume of the current frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameData {
    /// World-to-view
    pub view: Mat4,
    /// View-to-clip
    pub proj: Mat4,
    /// Inverse of `view`
    pub inv_view: Mat4,
    /// Inverse of `proj`
    pub inv_proj: Mat4,
    /// `proj * view`
    pub view_proj: Mat4,
    /// Culling planes
    pub frustum: Frustum,
    /// World-space box around the frustum
    pub frustum_bounds: BoundingBox,
    /// Camera position
    pub view_position: Vec3,
    /// Internal resolution the frame renders at
    pub resolution: (u32, u32),
    /// Camera near distance
    pub near: f32,
    /// Camera far distance
    pub far: f32,
}

impl FrameData {
    /// Derive all matrices from `camera`
    ///
    /// # Arguments
    /// * `aspect` - Width over height of the projection
    /// * `resolution` - Internal render size
    pub fn new(camera: &Camera, aspect: f32, near: f32, far: f32, resolution: (u32, u32)) -> Self {
        let view = camera.view_matrix();
        let proj = camera.projection_matrix(aspect, near, far);
        let inv_view = view.try_inverse().unwrap_or_else(Mat4::identity);
        let inv_proj = proj.try_inverse().unwrap_or_else(Mat4::identity);
        let view_proj = proj * view;
        let inv_view_proj = inv_view * inv_proj;

        Self {
            view,
            proj,
            inv_view,
            inv_proj,
            view_proj,
            frustum: Frustum::from_matrix(&view_proj),
            frustum_bounds: Frustum::world_bounds(&inv_view_proj),
            view_position: camera.position,
            resolution,
            near,
            far,
        }
    }

    /// Resolution as floats
    pub fn resolution_f32(&self) -> (f32, f32) {
        (self.resolution.0 as f32, self.resolution.1 as f32)
    }

    /// Squared distance from the camera to `point`
    pub fn distance_sq(&self, point: &Vec3) -> f32 {
        (point - self.view_position).norm_squared()
    }
}
