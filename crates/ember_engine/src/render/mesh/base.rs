//! Shared mesh building blocks
//!
//! [`MeshData`] is CPU-side geometry, [`MeshBuffers`] is the same geometry
//! uploaded into a vertex array, [`ModelTransform`] is the lazily composed
//! model matrix and [`MeshKind`] selects how a bound mesh is drawn.

use std::cell::Cell;
use std::collections::HashMap;

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::render::api::{BufferId, VertexArrayId, VertexAttribute};
use crate::render::state::{ReleaseQueue, Released, StateCache};

/// Geometry ready to be uploaded
///
/// Attributes are tightly packed `f32` arrays. Positions are required; the
/// other attributes are optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    positions: Vec<f32>,
    position_components: i32,
    tex_coords: Option<Vec<f32>>,
    normals: Option<Vec<f32>>,
    tangents: Option<Vec<f32>>,
    indices: Option<Vec<u32>>,
    dynamic_positions: bool,
}

impl MeshData {
    /// Geometry with `components` floats per position (2 or 3)
    pub fn positions(positions: Vec<f32>, components: i32) -> Self {
        Self { positions, position_components: components.max(1), ..Self::default() }
    }

    /// Add 2-component texture coordinates
    pub fn with_tex_coords(mut self, tex_coords: Vec<f32>) -> Self {
        self.tex_coords = Some(tex_coords);
        self
    }

    /// Add 3-component normals
    pub fn with_normals(mut self, normals: Vec<f32>) -> Self {
        self.normals = Some(normals);
        self
    }

    /// Add 3-component tangents
    pub fn with_tangents(mut self, tangents: Vec<f32>) -> Self {
        self.tangents = Some(tangents);
        self
    }

    /// Add a triangle index list
    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = Some(indices);
        self
    }

    /// Positions will be rewritten every frame
    pub fn with_dynamic_positions(mut self) -> Self {
        self.dynamic_positions = true;
        self
    }

    /// Number of vertices described by the position array
    pub fn vertex_count(&self) -> u32 {
        let count = self.positions.len() / self.position_components.unsigned_abs() as usize;
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Number of indices, 0 when not indexed
    pub fn index_count(&self) -> u32 {
        self.indices.as_ref().map_or(0, |i| u32::try_from(i.len()).unwrap_or(u32::MAX))
    }
}

/// Vertex array with its attribute buffers
#[derive(Debug)]
pub struct MeshBuffers {
    vertex_array: VertexArrayId,
    attributes: HashMap<VertexAttribute, BufferId>,
    index_buffer: Option<BufferId>,
    vertex_count: u32,
    index_count: u32,
    releases: ReleaseQueue,
}

impl MeshBuffers {
    /// Upload `data` into a new vertex array (left bound)
    pub fn upload(state: &mut StateCache, data: &MeshData) -> Self {
        let vertex_array = state.create_vertex_array();
        let mut attributes = HashMap::new();

        let position = state.device().upload_attribute(
            VertexAttribute::Position,
            data.position_components,
            &data.positions,
            data.dynamic_positions,
        );
        attributes.insert(VertexAttribute::Position, position);

        let optional = [
            (VertexAttribute::TexCoord, 2, &data.tex_coords),
            (VertexAttribute::Normal, 3, &data.normals),
            (VertexAttribute::Tangent, 3, &data.tangents),
        ];
        for (attribute, components, values) in optional {
            if let Some(values) = values {
                let buffer = state.device().upload_attribute(attribute, components, values, false);
                attributes.insert(attribute, buffer);
            }
        }

        let index_buffer = data.indices.as_ref().map(|indices| state.device().upload_indices(indices));

        Self {
            vertex_array,
            attributes,
            index_buffer,
            vertex_count: data.vertex_count(),
            index_count: data.index_count(),
            releases: state.release_queue(),
        }
    }

    /// Vertex array handle
    pub fn vertex_array(&self) -> VertexArrayId {
        self.vertex_array
    }

    /// Whether an index buffer is attached
    pub fn uses_indices(&self) -> bool {
        self.index_buffer.is_some()
    }

    /// Vertices uploaded at creation
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Indices uploaded at creation
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Replace the contents of one attribute buffer
    ///
    /// Returns `false` if the mesh has no such attribute.
    pub fn update_attribute(&self, state: &mut StateCache, attribute: VertexAttribute, data: &[f32]) -> bool {
        match self.attributes.get(&attribute) {
            Some(buffer) => {
                state.device().update_attribute(*buffer, data);
                true
            }
            None => false,
        }
    }
}

impl Drop for MeshBuffers {
    fn drop(&mut self) {
        let buffers = self.attributes.values().copied().chain(self.index_buffer).collect();
        self.releases.push(Released::VertexArray(self.vertex_array, buffers));
    }
}

/// How a bound mesh is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshKind {
    /// One entity of a generic object
    Object3D {
        /// First index (indexed) or first vertex
        starting_index: u32,
        /// Indices drawn when indexed
        indices_count: u32,
        /// Vertices drawn when not indexed
        vertices_count: u32,
        /// Draw through the index buffer
        indexed: bool,
    },
    /// 36-vertex skybox cube
    SkyboxCube,
    /// 6-vertex full-screen quad
    ScreenQuad,
    /// 6-vertex water plane
    WaterTile,
    /// 6-vertex particle or glyph quad
    Billboard,
}

impl MeshKind {
    /// Issue the draw call for the currently bound mesh
    pub fn draw(self, state: &mut StateCache) {
        match self {
            Self::Object3D { starting_index, indices_count, vertices_count, indexed } => {
                if indexed {
                    let offset = starting_index.saturating_mul(4);
                    state.device().draw_elements(gl_count(indices_count), gl_count(offset));
                } else {
                    state.device().draw_arrays(gl_count(starting_index), gl_count(vertices_count));
                }
            }
            Self::SkyboxCube => state.device().draw_arrays(0, 36),
            Self::ScreenQuad | Self::WaterTile | Self::Billboard => state.device().draw_arrays(0, 6),
        }
    }
}

fn gl_count(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Model matrix composed as translation * rotation * scale
///
/// The product is cached and recomputed on the first read after a change.
#[derive(Debug, Clone)]
pub struct ModelTransform {
    position: Vec3,
    scale: Vec3,
    translation_matrix: Mat4,
    rotation_matrix: Mat4,
    scale_matrix: Mat4,
    model: Cell<Mat4>,
    dirty: Cell<bool>,
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            translation_matrix: Mat4::identity(),
            rotation_matrix: Mat4::identity(),
            scale_matrix: Mat4::identity(),
            model: Cell::new(Mat4::identity()),
            dirty: Cell::new(false),
        }
    }
}

impl ModelTransform {
    /// Identity transform
    pub fn new() -> Self {
        Self::default()
    }

    /// Current model matrix
    pub fn model_matrix(&self) -> Mat4 {
        if self.dirty.get() {
            self.model.set(self.compose(self.scale_matrix));
            self.dirty.set(false);
        }
        self.model.get()
    }

    /// Model matrix with the scale multiplied by `factor`, without touching the cache
    pub fn scaled_model_matrix(&self, factor: f32) -> Mat4 {
        self.compose(Mat4::new_nonuniform_scaling(&(self.scale * factor)))
    }

    fn compose(&self, scale: Mat4) -> Mat4 {
        self.translation_matrix * self.rotation_matrix * scale
    }

    /// Whether the next read recomputes the matrix
    pub fn needs_update(&self) -> bool {
        self.dirty.get()
    }

    /// World position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Scale factors
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Rotation matrix
    pub fn rotation_matrix(&self) -> Mat4 {
        self.rotation_matrix
    }

    /// Move to an absolute position
    pub fn set_position(&mut self, position: Vec3) {
        self.position = Vec3::zeros();
        self.translation_matrix = Mat4::identity();
        self.translate(position);
    }

    /// Move by an offset
    pub fn translate(&mut self, translation: Vec3) {
        self.position += translation;
        self.translation_matrix = Mat4::new_translation(&self.position);
        self.dirty.set(true);
    }

    /// Reset translation to the origin
    pub fn zero_translation(&mut self) {
        self.position = Vec3::zeros();
        self.translation_matrix = Mat4::identity();
        self.dirty.set(true);
    }

    /// Replace the scale factors
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.scale_matrix = Mat4::new_nonuniform_scaling(&scale);
        self.dirty.set(true);
    }

    /// Rotate by `angle` radians about `axis`, on top of the current rotation
    pub fn rotate(&mut self, angle: f32, axis: Vec3) {
        self.rotation_matrix *= Mat4::rotation(angle, &axis);
        self.dirty.set(true);
    }

    /// Replace the rotation with `angle` radians about `axis`
    pub fn set_rotation_angle(&mut self, angle: f32, axis: Vec3) {
        self.rotation_matrix = Mat4::identity();
        self.rotate(angle, axis);
    }

    /// Reset rotation to identity
    pub fn zero_rotation(&mut self) {
        self.rotation_matrix = Mat4::identity();
        self.dirty.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::recording::{GpuCall, RecordingDevice};
    use approx::assert_relative_eq;

    #[test]
    fn test_model_matrix_is_translate_rotate_scale() {
        let mut transform = ModelTransform::new();
        transform.translate(Vec3::new(1.0, 0.0, 0.0));
        transform.set_scale(Vec3::new(2.0, 2.0, 2.0));
        assert!(transform.needs_update());

        let expected = Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0))
            * Mat4::identity()
            * Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 2.0, 2.0));
        let first = transform.model_matrix();
        assert_relative_eq!(first, expected);

        assert!(!transform.needs_update());
        let second = transform.model_matrix();
        assert_eq!(first, second);
        assert!(!transform.needs_update());
    }

    #[test]
    fn test_set_position_replaces_translation() {
        let mut transform = ModelTransform::new();
        transform.translate(Vec3::new(5.0, 5.0, 5.0));
        transform.set_position(Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(transform.position(), Vec3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(transform.model_matrix(), Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn test_scaled_model_matrix_leaves_cache_alone() {
        let mut transform = ModelTransform::new();
        transform.set_scale(Vec3::new(1.0, 2.0, 1.0));
        let base = transform.model_matrix();
        let outline = transform.scaled_model_matrix(1.1);
        assert_relative_eq!(outline[(1, 1)], 2.2, epsilon = 1e-6);
        assert_eq!(transform.model_matrix(), base);
        assert_eq!(transform.scale(), Vec3::new(1.0, 2.0, 1.0));
    }

    #[test]
    fn test_upload_attributes_and_indices() {
        let device = RecordingDevice::new();
        let log = device.log();
        let mut state = StateCache::new(Box::new(device));

        let data = MeshData::positions(vec![0.0; 12], 3)
            .with_tex_coords(vec![0.0; 8])
            .with_normals(vec![0.0; 12])
            .with_indices(vec![0, 1, 2, 2, 1, 3]);
        let mesh = MeshBuffers::upload(&mut state, &data);

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.index_count(), 6);
        assert!(mesh.uses_indices());
        assert_eq!(log.count(|c| matches!(c, GpuCall::UploadAttribute(..))), 3);
        assert!(!mesh.update_attribute(&mut state, VertexAttribute::Tangent, &[0.0; 12]));
    }

    #[test]
    fn test_draw_dispatch() {
        let device = RecordingDevice::new();
        let log = device.log();
        let mut state = StateCache::new(Box::new(device));

        MeshKind::SkyboxCube.draw(&mut state);
        MeshKind::WaterTile.draw(&mut state);
        MeshKind::Object3D { starting_index: 3, indices_count: 9, vertices_count: 0, indexed: true }.draw(&mut state);
        MeshKind::Object3D { starting_index: 0, indices_count: 0, vertices_count: 24, indexed: false }.draw(&mut state);

        let calls = log.calls();
        assert_eq!(calls[0], GpuCall::DrawArrays { first: 0, count: 36 });
        assert_eq!(calls[1], GpuCall::DrawArrays { first: 0, count: 6 });
        assert_eq!(calls[2], GpuCall::DrawElements { count: 9, offset: 12 });
        assert_eq!(calls[3], GpuCall::DrawArrays { first: 0, count: 24 });
    }
}
