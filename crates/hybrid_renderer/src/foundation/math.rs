//! Math utilities and types
//!
//! Provides the nalgebra aliases used across the renderer together with the
//! OpenGL-style projection helpers the pass pipeline relies on. All matrices
//! follow nalgebra's column-vector convention: a world position `p` lands in
//! clip space as `proj * view * model * p`.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Mat4, Vec3};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Wrap `value` into `[min, max)`
    ///
    /// Returns `min` when the range is empty.
    pub fn wrap(value: f32, min: f32, max: f32) -> f32 {
        let span = max - min;
        if span <= 0.0 {
            return min;
        }
        value - span * ((value - min) / span).floor()
    }

    /// Normalize a vector, returning zero for degenerate input instead of NaN
    pub fn normalize_or_zero(v: Vec3) -> Vec3 {
        v.try_normalize(1e-12).unwrap_or_else(Vec3::zeros)
    }

    /// World-space translation stored in the last column of an affine matrix
    pub fn translation_of(m: &Mat4) -> Vec3 {
        Vec3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
    }
}

/// Extension trait for Mat4 with the projection and view builders used by
/// the renderer. Clip space follows OpenGL: x, y and z in [-1, 1].
pub trait Mat4Ext {
    /// Off-center perspective frustum (glFrustum)
    fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Orthographic projection (glOrtho)
    fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Symmetric perspective projection from a vertical field of view in radians
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Rotation of `angle` radians around an arbitrary axis
    fn rotation_axis(axis: Vec3, angle: f32) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        let rl = right - left;
        let tb = top - bottom;
        let fne = far - near;

        Mat4::new(
            near * 2.0 / rl, 0.0, (right + left) / rl, 0.0,
            0.0, near * 2.0 / tb, (top + bottom) / tb, 0.0,
            0.0, 0.0, -(far + near) / fne, -(far * near * 2.0) / fne,
            0.0, 0.0, -1.0, 0.0,
        )
    }

    fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        let rl = right - left;
        let tb = top - bottom;
        let fne = far - near;

        Mat4::new(
            2.0 / rl, 0.0, 0.0, -(left + right) / rl,
            0.0, 2.0 / tb, 0.0, -(top + bottom) / tb,
            0.0, 0.0, -2.0 / fne, -(far + near) / fne,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let top = near * (fov_y * 0.5).tan();
        let right = top * aspect;
        Self::frustum(-right, right, -top, top, near, far)
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }

    fn rotation_axis(axis: Vec3, angle: f32) -> Mat4 {
        match Unit::try_new(axis, 1e-12) {
            Some(axis) => Mat4::from_axis_angle(&axis, angle),
            None => Mat4::identity(),
        }
    }
}
