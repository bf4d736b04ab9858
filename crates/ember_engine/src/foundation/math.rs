//! Math utilities and types
//!
//! Provides the nalgebra aliases used throughout the renderer together with the
//! OpenGL-convention projection and view helpers.

pub use nalgebra::{Matrix3, Matrix4, Unit, Vector2, Vector3, Vector4};

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
    use super::{constants, Vec3};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }

    /// Clamp every channel of a colour into [0, 1]
    pub fn clamp_color(color: Vec3) -> Vec3 {
        color.map(|c| c.clamp(0.0, 1.0))
    }

    /// Transform a point by a homogeneous matrix, ignoring projective division
    pub fn transform_point(matrix: &super::Mat4, point: &Vec3) -> Vec3 {
        (matrix * point.push(1.0)).xyz()
    }
}

/// Extension trait for Mat4 with OpenGL-convention constructors
pub trait Mat4Ext {
    /// Create a rotation matrix around an arbitrary axis
    fn rotation(angle: f32, axis: &Vec3) -> Mat4;

    /// Create a rotation matrix around the X axis
    fn rotation_x(angle: f32) -> Mat4;

    /// Create a rotation matrix around the Y axis
    fn rotation_y(angle: f32) -> Mat4;

    /// Create a perspective projection with depth mapped to [-1, 1]
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create an orthographic projection with depth mapped to [-1, 1]
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Create a right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Keep only the upper 3x3 block, dropping translation
    fn rotation_part(&self) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn rotation(angle: f32, axis: &Vec3) -> Mat4 {
        match Unit::try_new(*axis, f32::EPSILON) {
            Some(axis) => Mat4::from_axis_angle(&axis, angle),
            None => Mat4::identity(),
        }
    }

    fn rotation_x(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::x_axis(), angle)
    }

    fn rotation_y(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::y_axis(), angle)
    }

    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_perspective(aspect, fov_y, near, far)
    }

    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_orthographic(left, right, bottom, top, near, far)
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }

    fn rotation_part(&self) -> Mat4 {
        let rotation: Mat3 = self.fixed_view::<3, 3>(0, 0).into_owned();
        rotation.to_homogeneous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_look_at_matches_camera_convention() {
        let view = Mat4::look_at(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0), Vec3::y());
        assert_relative_eq!(view, Mat4::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_rotation_part_drops_translation() {
        let m = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0)) * Mat4::rotation_y(0.5);
        let r = m.rotation_part();
        assert_relative_eq!(r, Mat4::rotation_y(0.5), epsilon = 1e-6);
    }

    #[test]
    fn test_clamp_color() {
        let c = utils::clamp_color(Vec3::new(-1.0, 0.5, 3.0));
        assert_eq!(c, Vec3::new(0.0, 0.5, 1.0));
    }

    #[test]
    fn test_rotation_with_zero_axis_is_identity() {
        assert_eq!(Mat4::rotation(1.0, &Vec3::zeros()), Mat4::identity());
    }
}
