//! Cameras and view-volume geometry

pub mod camera;
pub mod frustum_box;

pub use camera::{Camera, MoveDirection, SharedCamera};
pub use frustum_box::FrustumBox;
