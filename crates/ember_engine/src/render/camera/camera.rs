//! # First-Person Camera
//!
//! Yaw/pitch camera with a perspective projection and simple velocity based
//! movement.
//!
//! ## Conventions
//! - rotation = Rx(pitch) * Ry(yaw)
//! - view = rotation * translate(-position)
//! - the direction, right and up vectors are the inverse rotation applied to
//!   -Z, +X and +Y, so they are expressed in world space
//!
//! Every setter recomputes the affected matrices immediately, so reads never
//! observe stale values. While [`Camera::updates_frustum_box`] is set, every
//! recomputation is mirrored into the owned [`FrustumBox`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{ensure, EngineResult};
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::render::camera::FrustumBox;

/// Camera shared between the master renderer and application code
pub type SharedCamera = Rc<RefCell<Camera>>;

/// Movement request for [`Camera::move_towards`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    /// Along the view direction
    Forward,
    /// Against the view direction
    Backward,
    /// Against the right vector
    Left,
    /// Along the right vector
    Right,
}

/// Perspective camera with an attached frustum box
#[derive(Debug, Clone)]
pub struct Camera {
    name: String,

    yaw: f32,
    pitch: f32,
    position: Vec3,

    rotation_matrix: Mat4,
    direction: Vec3,
    right: Vec3,
    up: Vec3,

    view_matrix: Mat4,
    static_view_matrix: Mat4,
    inverse_view_matrix: Mat4,

    fov: f32,
    aspect: f32,
    near_plane: f32,
    far_plane: f32,
    projection_matrix: Mat4,

    move_speed: f32,
    resistance_factor: f32,
    ahead_speed: f32,
    side_speed: f32,

    update_frustum_box: bool,
    frustum_box: FrustumBox,
}

impl Camera {
    /// Camera at the origin looking down -Z
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let frustum_box = FrustumBox::new(format!("{name}_view_box"));
        let mut camera = Self {
            name,
            yaw: 0.0,
            pitch: 0.0,
            position: Vec3::zeros(),
            rotation_matrix: Mat4::identity(),
            direction: Vec3::new(0.0, 0.0, -1.0),
            right: Vec3::x(),
            up: Vec3::y(),
            view_matrix: Mat4::identity(),
            static_view_matrix: Mat4::identity(),
            inverse_view_matrix: Mat4::identity(),
            fov: 1.05,
            aspect: 16.0 / 9.0,
            near_plane: 0.01,
            far_plane: 100.0,
            projection_matrix: Mat4::identity(),
            move_speed: 1.0,
            resistance_factor: 0.95,
            ahead_speed: 0.0,
            side_speed: 0.0,
            update_frustum_box: true,
            frustum_box,
        };
        camera.calculate_rotation();
        camera.calculate_view_matrix();
        camera.calculate_projection_matrix();
        log::debug!(target: "camera", "Camera [{}] created.", camera.name);
        camera
    }

    /// Wrap the camera for sharing with the renderer
    pub fn into_shared(self) -> SharedCamera {
        Rc::new(RefCell::new(self))
    }

    /// Camera name
    pub fn name(&self) -> &str {
        &self.name
    }

    // Projection

    /// Replace every projection parameter (all > 0)
    pub fn set_projection(&mut self, fov: f32, aspect: f32, near_plane: f32, far_plane: f32) -> EngineResult<()> {
        ensure(fov > 0.0, &self.name, "Camera::set_projection", "Camera FOV value out of range: {0.0 < VALUE}.")?;
        ensure(aspect > 0.0, &self.name, "Camera::set_projection", "Camera aspect value out of range: {0.0 < VALUE}.")?;
        ensure(
            near_plane > 0.0 && far_plane > 0.0,
            &self.name,
            "Camera::set_projection",
            "Camera clip plane value out of range: {0.0 < VALUE}.",
        )?;
        self.fov = fov;
        self.aspect = aspect;
        self.near_plane = near_plane;
        self.far_plane = far_plane;
        self.calculate_projection_matrix();
        Ok(())
    }

    /// Change the vertical field of view (> 0, radians)
    pub fn set_fov(&mut self, fov: f32) -> EngineResult<()> {
        self.set_projection(fov, self.aspect, self.near_plane, self.far_plane)
    }

    /// Change the aspect ratio (> 0)
    pub fn set_aspect(&mut self, aspect: f32) -> EngineResult<()> {
        self.set_projection(self.fov, aspect, self.near_plane, self.far_plane)
    }

    /// Vertical field of view in radians
    pub fn fov(&self) -> f32 {
        self.fov
    }

    /// Width / height
    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Near clip distance
    pub fn near_plane(&self) -> f32 {
        self.near_plane
    }

    /// Far clip distance
    pub fn far_plane(&self) -> f32 {
        self.far_plane
    }

    // Orientation

    /// Set absolute yaw (horizontal) and pitch (vertical) angles
    pub fn set_rotation(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        self.pitch = pitch;
        self.calculate_rotation();
        self.calculate_view_matrix();
    }

    /// Add to the pitch (vertical) and yaw (horizontal) angles
    pub fn rotate(&mut self, pitch: f32, yaw: f32) {
        self.set_rotation(self.yaw + yaw, self.pitch + pitch);
    }

    /// Negate the pitch, used to mirror the camera below a reflecting plane
    pub fn flip_pitch(&mut self) {
        self.set_rotation(self.yaw, -self.pitch);
    }

    /// Horizontal angle
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Vertical angle
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    // Position

    /// Move to an absolute position
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.calculate_view_matrix();
    }

    /// Move by an offset
    pub fn translate(&mut self, translation: Vec3) {
        self.position += translation;
        self.calculate_view_matrix();
    }

    /// World position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// World-space view direction
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// World-space right vector
    pub fn right(&self) -> Vec3 {
        self.right
    }

    /// World-space up vector
    pub fn up(&self) -> Vec3 {
        self.up
    }

    // Matrices

    /// Rotation * translation
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    /// View matrix without translation, used by the skybox
    pub fn static_view_matrix(&self) -> Mat4 {
        self.static_view_matrix
    }

    /// Inverse of the view matrix
    pub fn inverse_view_matrix(&self) -> Mat4 {
        self.inverse_view_matrix
    }

    /// Perspective projection
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    // Movement

    /// Start moving in `direction` at the configured move speed
    pub fn move_towards(&mut self, direction: MoveDirection) {
        match direction {
            MoveDirection::Forward => self.ahead_speed = self.move_speed,
            MoveDirection::Backward => self.ahead_speed = -self.move_speed,
            MoveDirection::Left => self.side_speed = -self.move_speed,
            MoveDirection::Right => self.side_speed = self.move_speed,
        }
    }

    /// Set the move speed (> 0)
    pub fn set_move_speed(&mut self, move_speed: f32) -> EngineResult<()> {
        ensure(move_speed > 0.0, &self.name, "Camera::set_move_speed", "Camera move speed value out of range: {0.0 < VALUE}.")?;
        self.move_speed = move_speed;
        Ok(())
    }

    /// Move speed
    pub fn move_speed(&self) -> f32 {
        self.move_speed
    }

    /// Set the per-update velocity decay ([0, 1])
    pub fn set_move_resistance_factor(&mut self, factor: f32) -> EngineResult<()> {
        ensure(
            (0.0..=1.0).contains(&factor),
            &self.name,
            "Camera::set_move_resistance_factor",
            "Camera move resistance factor value out of range: {0.0 <= VALUE <= 1.0}.",
        )?;
        self.resistance_factor = factor;
        Ok(())
    }

    /// Velocity decay factor
    pub fn move_resistance_factor(&self) -> f32 {
        self.resistance_factor
    }

    /// Integrate the current velocity over `delta` seconds, then decay it
    pub fn update(&mut self, delta: f32) {
        let translation = self.direction * self.ahead_speed * delta + self.right * self.side_speed * delta;
        self.translate(translation);
        self.ahead_speed *= self.resistance_factor;
        self.side_speed *= self.resistance_factor;
    }

    // Frustum box

    /// Mirror camera changes into the frustum box
    pub fn set_updates_frustum_box(&mut self, enabled: bool) {
        self.update_frustum_box = enabled;
    }

    /// Whether camera changes reach the frustum box
    pub fn updates_frustum_box(&self) -> bool {
        self.update_frustum_box
    }

    /// The owned frustum box
    pub fn frustum_box(&self) -> &FrustumBox {
        &self.frustum_box
    }

    /// The owned frustum box, mutably
    pub fn frustum_box_mut(&mut self) -> &mut FrustumBox {
        &mut self.frustum_box
    }

    fn calculate_rotation(&mut self) {
        self.rotation_matrix = Mat4::rotation_x(self.pitch) * Mat4::rotation_y(self.yaw);
        // Pure rotation: the inverse is the transpose
        let inverse = self.rotation_matrix.transpose();
        self.direction = inverse.transform_vector(&Vec3::new(0.0, 0.0, -1.0));
        self.right = inverse.transform_vector(&Vec3::x());
        self.up = inverse.transform_vector(&Vec3::y());
        if self.update_frustum_box {
            self.frustum_box.set_camera_vectors(self.direction, self.up, self.right);
        }
    }

    fn calculate_view_matrix(&mut self) {
        self.view_matrix = self.rotation_matrix * Mat4::new_translation(&-self.position);
        self.static_view_matrix = self.view_matrix.rotation_part();
        self.inverse_view_matrix = self.view_matrix.try_inverse().unwrap_or_else(Mat4::identity);
        if self.update_frustum_box {
            self.frustum_box.set_camera_matrix(self.inverse_view_matrix);
        }
    }

    fn calculate_projection_matrix(&mut self) {
        self.projection_matrix = Mat4::perspective(self.fov, self.aspect, self.near_plane, self.far_plane);
        if self.update_frustum_box {
            self.frustum_box.set_camera_parameters(self.near_plane, self.aspect, self.fov);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::constants::PI;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_vectors() {
        let camera = Camera::new("camera");
        assert_relative_eq!(camera.direction(), Vec3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(camera.right(), Vec3::x());
        assert_relative_eq!(camera.up(), Vec3::y());
        assert_relative_eq!(camera.view_matrix(), Mat4::identity());
    }

    #[test]
    fn test_yaw_turns_direction() {
        let mut camera = Camera::new("camera");
        camera.set_rotation(PI / 2.0, 0.0);
        assert_relative_eq!(camera.direction(), Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(camera.right(), Vec3::new(0.0, 0.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_view_and_inverse() {
        let mut camera = Camera::new("camera");
        camera.set_rotation(0.3, -0.2);
        camera.set_position(Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(camera.view_matrix() * camera.inverse_view_matrix(), Mat4::identity(), epsilon = 1e-5);
        assert_relative_eq!(camera.static_view_matrix()[(0, 3)], 0.0);
        assert_relative_eq!(camera.inverse_view_matrix()[(1, 3)], 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_movement_integrates_then_decays() {
        let mut camera = Camera::new("camera");
        camera.set_move_speed(2.0).unwrap();
        camera.set_move_resistance_factor(0.5).unwrap();
        camera.move_towards(MoveDirection::Forward);
        camera.move_towards(MoveDirection::Right);

        camera.update(1.0);
        assert_relative_eq!(camera.position(), Vec3::new(2.0, 0.0, -2.0), epsilon = 1e-6);
        camera.update(1.0);
        assert_relative_eq!(camera.position(), Vec3::new(3.0, 0.0, -3.0), epsilon = 1e-6);
    }

    #[test]
    fn test_flip_pitch() {
        let mut camera = Camera::new("camera");
        camera.set_rotation(0.4, 0.25);
        camera.flip_pitch();
        assert_eq!(camera.pitch(), -0.25);
        assert_eq!(camera.yaw(), 0.4);
    }

    #[test]
    fn test_validation() {
        let mut camera = Camera::new("camera");
        assert!(camera.set_projection(0.0, 1.0, 0.1, 10.0).is_err());
        assert!(camera.set_projection(1.0, 1.0, 0.1, -1.0).is_err());
        assert!(camera.set_move_speed(0.0).is_err());
        assert!(camera.set_move_resistance_factor(1.5).is_err());
        assert!(camera.set_aspect(2.0).is_ok());
        assert_eq!(camera.aspect(), 2.0);
    }

    #[test]
    fn test_frustum_box_mirroring_can_be_paused() {
        let mut camera = Camera::new("camera");
        camera.frustum_box_mut().update(10.0).unwrap();
        let center = camera.frustum_box().center();

        camera.set_updates_frustum_box(false);
        camera.set_position(Vec3::new(0.0, 50.0, 0.0));
        camera.frustum_box_mut().update(10.0).unwrap();
        assert_eq!(camera.frustum_box().center(), center);

        camera.set_updates_frustum_box(true);
        camera.translate(Vec3::zeros());
        camera.frustum_box_mut().update(10.0).unwrap();
        assert_relative_eq!(camera.frustum_box().center().y, center.y + 50.0, epsilon = 1e-4);
    }
}
