//! # Frustum Box
//!
//! Bounding volume of the slice of a camera frustum between the near plane
//! and a chosen distance. The shadow pass fits the directional light's
//! orthographic projection to this box.
//!
//! ## Caching
//! Two levels of dirty tracking keep the steady state cheap:
//! - plane sizes are recomputed only when the box distance or the camera
//!   projection parameters change
//! - corner points are recomputed only when the camera vectors, the camera
//!   matrix or the plane sizes change
//!
//! ## Re-projection
//! [`FrustumBox::recalculate_space`] moves the stored corners into another
//! space (usually light view space). It runs at most once per freshly computed
//! point set; a second call is a no-op until [`FrustumBox::update`] recomputes
//! the corners.

use crate::error::{ensure, EngineResult};
use crate::foundation::math::{utils, Mat4, Vec3};

/// Eight frustum corners with their axis-aligned extents
#[derive(Debug, Clone)]
pub struct FrustumBox {
    name: String,

    near_distance: f32,
    far_distance: f32,
    aspect: f32,
    fov: f32,

    direction: Vec3,
    up: Vec3,
    right: Vec3,
    camera_matrix: Mat4,

    near_width: f32,
    near_height: f32,
    far_width: f32,
    far_height: f32,

    points: [Vec3; 8],
    min: Vec3,
    max: Vec3,
    center: Vec3,

    planes_changed: bool,
    vectors_changed: bool,
    matrix_changed: bool,
    box_updated: bool,
}

impl FrustumBox {
    /// Box with camera-default vectors; everything is recomputed on first update
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            near_distance: 0.01,
            far_distance: 0.0,
            aspect: 16.0 / 9.0,
            fov: 1.05,
            direction: Vec3::new(0.0, 0.0, -1.0),
            up: Vec3::y(),
            right: Vec3::x(),
            camera_matrix: Mat4::identity(),
            near_width: 0.0,
            near_height: 0.0,
            far_width: 0.0,
            far_height: 0.0,
            points: [Vec3::zeros(); 8],
            min: Vec3::zeros(),
            max: Vec3::zeros(),
            center: Vec3::zeros(),
            planes_changed: true,
            vectors_changed: true,
            matrix_changed: true,
            box_updated: false,
        }
    }

    /// Mirror the camera projection; flags a change only if a value differs
    pub fn set_camera_parameters(&mut self, near_distance: f32, aspect: f32, fov: f32) {
        if near_distance != self.near_distance || aspect != self.aspect || fov != self.fov {
            self.near_distance = near_distance;
            self.aspect = aspect;
            self.fov = fov;
            self.planes_changed = true;
        }
    }

    /// Mirror the camera's inverse view matrix; flags a change only if it differs
    pub fn set_camera_matrix(&mut self, inverse_view: Mat4) {
        if inverse_view != self.camera_matrix {
            self.camera_matrix = inverse_view;
            self.matrix_changed = true;
        }
    }

    /// Mirror the camera's world-space direction, up and right vectors
    pub fn set_camera_vectors(&mut self, direction: Vec3, up: Vec3, right: Vec3) {
        self.direction = direction;
        self.up = up;
        self.right = right;
        self.vectors_changed = true;
    }

    /// Recompute the box for the slice between the near plane and `box_distance`
    pub fn update(&mut self, box_distance: f32) -> EngineResult<()> {
        ensure(
            box_distance > 0.0,
            &self.name,
            "FrustumBox::update",
            "Far clipping plane value out of range: {0.0 < VALUE}.",
        )?;

        let mut planes_updated = false;
        if box_distance != self.far_distance || self.planes_changed {
            self.far_distance = box_distance;
            self.calculate_planes_size();
            planes_updated = true;
        }

        if self.vectors_changed || self.matrix_changed || planes_updated {
            self.calculate_points();
            self.find_min_max();
            self.vectors_changed = false;
            self.matrix_changed = false;
            self.box_updated = true;
            log::trace!(target: "frustum_box", "Box [{}] recalculated for distance {}.", self.name, box_distance);
        }
        Ok(())
    }

    /// Move the corners into the space of `space_matrix`, once per computed box
    pub fn recalculate_space(&mut self, space_matrix: &Mat4) {
        if !self.box_updated {
            return;
        }
        for point in &mut self.points {
            *point = utils::transform_point(space_matrix, point);
        }
        self.find_min_max();
        self.box_updated = false;
    }

    fn calculate_planes_size(&mut self) {
        let tangent = (self.fov / 2.0).tan();
        self.far_width = self.far_distance * tangent * 2.0;
        self.near_width = self.near_distance * tangent * 2.0;
        self.far_height = self.far_width / self.aspect;
        self.near_height = self.near_width / self.aspect;
        self.planes_changed = false;
    }

    fn calculate_points(&mut self) {
        // Camera vectors are already in world space, so only the eye position
        // is taken from the inverse view matrix.
        let eye = utils::transform_point(&self.camera_matrix, &Vec3::zeros());
        let near_center = eye + self.direction * self.near_distance;
        let far_center = eye + self.direction * self.far_distance;

        let far_top = far_center + self.up * (self.far_height / 2.0);
        let far_bottom = far_center - self.up * (self.far_height / 2.0);
        let near_top = near_center + self.up * (self.near_height / 2.0);
        let near_bottom = near_center - self.up * (self.near_height / 2.0);

        let far_side = self.right * (self.far_width / 2.0);
        let near_side = self.right * (self.near_width / 2.0);

        self.points = [
            far_top + far_side,
            far_top - far_side,
            far_bottom + far_side,
            far_bottom - far_side,
            near_top + near_side,
            near_top - near_side,
            near_bottom + near_side,
            near_bottom - near_side,
        ];
    }

    fn find_min_max(&mut self) {
        let mut min = self.points[0];
        let mut max = self.points[0];
        for point in &self.points[1..] {
            min = min.inf(point);
            max = max.sup(point);
        }
        self.min = min;
        self.max = max;
        self.center = (min + max) / 2.0;
    }

    /// Box name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Corners in the space they were last computed in
    pub fn points(&self) -> &[Vec3; 8] {
        &self.points
    }

    /// Minimum corner
    pub fn min(&self) -> Vec3 {
        self.min
    }

    /// Maximum corner
    pub fn max(&self) -> Vec3 {
        self.max
    }

    /// Midpoint of the extents
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Extent along X
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    /// Extent along Y
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Extent along Z
    pub fn length(&self) -> f32 {
        self.max.z - self.min.z
    }

    /// Full width of the far slice plane
    pub fn far_width(&self) -> f32 {
        self.far_width
    }

    /// Full height of the far slice plane
    pub fn far_height(&self) -> f32 {
        self.far_height
    }

    /// Full width of the near plane
    pub fn near_width(&self) -> f32 {
        self.near_width
    }

    /// Whether the corners are fresh and not yet re-projected
    pub fn is_box_updated(&self) -> bool {
        self.box_updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;
    use approx::assert_relative_eq;

    fn looking_down_z() -> FrustumBox {
        let mut frustum = FrustumBox::new("view_box");
        frustum.set_camera_parameters(0.1, 1.0, 60.0_f32.to_radians());
        frustum.set_camera_vectors(Vec3::new(0.0, 0.0, -1.0), Vec3::y(), Vec3::x());
        frustum.set_camera_matrix(Mat4::identity());
        frustum
    }

    #[test]
    fn test_far_width_for_shadow_distance() {
        let mut frustum = looking_down_z();
        frustum.update(10.0).unwrap();
        assert_relative_eq!(frustum.far_width(), 11.547, epsilon = 1e-3);
        assert_relative_eq!(frustum.far_height(), frustum.far_width());
        assert_relative_eq!(frustum.min().z, -10.0, epsilon = 1e-5);
        assert_relative_eq!(frustum.max().z, -0.1, epsilon = 1e-5);
        assert_relative_eq!(frustum.width(), frustum.far_width(), epsilon = 1e-5);
    }

    #[test]
    fn test_repeated_update_is_deterministic() {
        let mut frustum = looking_down_z();
        frustum.update(10.0).unwrap();
        let points = *frustum.points();
        let (min, max) = (frustum.min(), frustum.max());

        frustum.update(10.0).unwrap();
        assert_eq!(*frustum.points(), points);
        assert_eq!(frustum.min(), min);
        assert_eq!(frustum.max(), max);

        // Same vectors force a recomputation with identical inputs
        frustum.set_camera_vectors(Vec3::new(0.0, 0.0, -1.0), Vec3::y(), Vec3::x());
        frustum.update(10.0).unwrap();
        assert_eq!(*frustum.points(), points);
        assert_eq!(frustum.min(), min);
    }

    #[test]
    fn test_recalculate_space_runs_once_per_box() {
        let mut frustum = looking_down_z();
        frustum.update(10.0).unwrap();
        let light_view = Mat4::look_at(frustum.center(), frustum.center() + Vec3::new(-1.0, -1.0, -1.0), Vec3::y());

        frustum.recalculate_space(&light_view);
        let (min, max) = (frustum.min(), frustum.max());
        assert!(!frustum.is_box_updated());

        frustum.recalculate_space(&light_view);
        assert_eq!(frustum.min(), min);
        assert_eq!(frustum.max(), max);
    }

    #[test]
    fn test_box_follows_camera_position() {
        let mut frustum = looking_down_z();
        frustum.update(10.0).unwrap();
        let before = frustum.center();

        frustum.set_camera_matrix(Mat4::new_translation(&Vec3::new(5.0, 0.0, 0.0)));
        frustum.update(10.0).unwrap();
        assert_relative_eq!(frustum.center().x, before.x + 5.0, epsilon = 1e-5);
        assert!(frustum.is_box_updated());
    }

    #[test]
    fn test_non_positive_distance_is_rejected() {
        let mut frustum = looking_down_z();
        assert!(frustum.update(0.0).is_err());
        assert!(frustum.update(-2.0).is_err());
    }
}
