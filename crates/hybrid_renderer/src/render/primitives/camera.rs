//! # 3D Camera
//!
//! Camera description handed to `Renderer::begin`. The camera itself stores
//! no clip distances or aspect ratio: those belong to the renderer, which
//! derives the projection from its configuration and output size.
//!
//! ## Conventions
//! - Right-handed, Y-up world space
//! - View space looks down -Z
//! - Clip space follows OpenGL, z in [-1, 1]

use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};

/// Projection model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraProjection {
    /// `fovy` is the vertical field of view in degrees
    Perspective,
    /// `fovy` is the visible height in world units
    Orthographic,
}

/// 3D camera for perspective and orthographic projections
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,

    /// Point the camera is looking at in world space
    pub target: Vec3,

    /// Up vector for camera orientation (typically [0, 1, 0])
    pub up: Vec3,

    /// Vertical field of view in degrees, or view height when orthographic
    pub fovy: f32,

    /// Projection model
    pub projection: CameraProjection,
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), 60.0)
    }
}

impl Camera {
    /// Create a perspective camera with standard Y-up orientation
    ///
    /// # Arguments
    /// * `position` - Camera position in world space
    /// * `target` - Point to look at
    /// * `fovy_degrees` - Vertical field of view in degrees
    ///
    /// # Example
    /// ```rust
    /// use hybrid_renderer::foundation::math::Vec3;
    /// use hybrid_renderer::render::primitives::Camera;
    ///
    /// let camera = Camera::perspective(Vec3::new(0.0, 2.0, 5.0), Vec3::zeros(), 75.0);
    /// assert_eq!(camera.fovy, 75.0);
    /// ```
    pub fn perspective(position: Vec3, target: Vec3, fovy_degrees: f32) -> Self {
        Self {
            position,
            target,
            up: Vec3::y(),
            fovy: fovy_degrees,
            projection: CameraProjection::Perspective,
        }
    }

    /// Create an orthographic camera showing `height` world units vertically
    pub fn orthographic(position: Vec3, target: Vec3, height: f32) -> Self {
        Self {
            position,
            target,
            up: Vec3::y(),
            fovy: height,
            projection: CameraProjection::Orthographic,
        }
    }

    /// Update camera position in world space
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        log::trace!("Camera position updated to: {:?}", position);
    }

    /// Update the look-at point
    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        log::trace!("Camera target updated to: {:?}", target);
    }

    /// Normalized viewing direction, zero if position and target coincide
    pub fn forward(&self) -> Vec3 {
        utils::normalize_or_zero(self.target - self.position)
    }

    /// World-to-view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.position, self.target, self.up)
    }

    /// View-to-clip matrix for the given output aspect and clip distances
    ///
    /// Perspective cameras build a symmetric frustum whose half height at
    /// the near plane is `near * tan(fovy / 2)`. Orthographic cameras use
    /// `fovy / 2` as the half height directly.
    pub fn projection_matrix(&self, aspect: f32, near: f32, far: f32) -> Mat4 {
        match self.projection {
            CameraProjection::Perspective => {
                let top = near * utils::deg_to_rad(self.fovy * 0.5).tan();
                let right = top * aspect;
                Mat4::frustum(-right, right, -top, top, near, far)
            }
            CameraProjection::Orthographic => {
                let top = self.fovy * 0.5;
                let right = top * aspect;
                Mat4::ortho(-right, right, -top, top, near, far)
            }
        }
    }
}
