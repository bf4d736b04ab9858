//! Generic lit 3D objects

use std::rc::Rc;

use crate::error::{ensure, EngineResult};
use crate::foundation::math::{utils, Vec3};
use crate::render::material::Material;
use crate::render::mesh::{MeshBuffers, MeshData, MeshKind, ModelTransform};
use crate::render::state::StateCache;

/// Index range of an object drawn with one material
#[derive(Debug, Clone)]
pub struct Object3DEntity {
    /// First index (or first vertex when the mesh is not indexed)
    pub starting_index: u32,
    /// Number of indices
    pub indices_count: u32,
    /// Number of vertices
    pub vertices_count: u32,
    /// Material, if any
    pub material: Option<Rc<Material>>,
}

/// Stencil outline drawn around an object
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    enabled: bool,
    always_visible: bool,
    scale: f32,
    color: Vec3,
}

impl Default for Outline {
    fn default() -> Self {
        Self { enabled: false, always_visible: false, scale: 1.0, color: Vec3::new(1.0, 0.0, 0.0) }
    }
}

impl Outline {
    /// Enable or disable the outline
    pub fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the outline is drawn
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Draw the outline through occluding geometry
    pub fn set_always_visible(&mut self, always_visible: bool) {
        self.always_visible = always_visible;
    }

    /// Whether the outline ignores depth
    pub fn is_always_visible(&self) -> bool {
        self.always_visible
    }

    /// Scale factor applied to the object for the outline draw
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Set the outline scale factor (> 0)
    pub fn set_scale(&mut self, scale: f32) -> EngineResult<()> {
        ensure(scale > 0.0, "outline", "Outline::set_scale", "Outline scale value out of range: {0.0 < VALUE}.")?;
        self.scale = scale;
        Ok(())
    }

    /// Outline color
    pub fn color(&self) -> Vec3 {
        self.color
    }

    /// Set the outline color (clamped to [0, 1])
    pub fn set_color(&mut self, color: Vec3) {
        self.color = utils::clamp_color(color);
    }
}

/// Uploaded mesh with a transform, material entities and an optional outline
#[derive(Debug)]
pub struct Object3D {
    name: String,
    buffers: MeshBuffers,
    transform: ModelTransform,
    entities: Vec<Object3DEntity>,
    outline: Option<Outline>,
}

impl Object3D {
    /// Upload `data` as a new object without entities
    pub fn new(state: &mut StateCache, name: impl Into<String>, data: &MeshData) -> Self {
        let name = name.into();
        let buffers = MeshBuffers::upload(state, data);
        log::debug!(target: "object_3d", "Object [{}] uploaded ({} vertices).", name, buffers.vertex_count());
        Self { name, buffers, transform: ModelTransform::new(), entities: Vec::new(), outline: None }
    }

    /// Upload `data` as one entity spanning the whole mesh
    pub fn with_material(state: &mut StateCache, name: impl Into<String>, data: &MeshData, material: Option<Rc<Material>>) -> Self {
        let mut object = Self::new(state, name, data);
        let entity = Object3DEntity {
            starting_index: 0,
            indices_count: object.buffers.index_count(),
            vertices_count: object.buffers.vertex_count(),
            material,
        };
        object.entities.push(entity);
        object
    }

    /// Object name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// GPU buffers
    pub fn buffers(&self) -> &MeshBuffers {
        &self.buffers
    }

    /// Model transform
    pub fn transform(&self) -> &ModelTransform {
        &self.transform
    }

    /// Model transform, mutably
    pub fn transform_mut(&mut self) -> &mut ModelTransform {
        &mut self.transform
    }

    /// Add an entity drawn with `material`
    pub fn add_entity(&mut self, entity: Object3DEntity) {
        self.entities.push(entity);
    }

    /// Entities in draw order
    pub fn entities(&self) -> &[Object3DEntity] {
        &self.entities
    }

    /// Entities in draw order, mutably
    pub fn entities_mut(&mut self) -> &mut [Object3DEntity] {
        &mut self.entities
    }

    /// Attach an outline modifier, or return the existing one
    pub fn add_outline(&mut self) -> &mut Outline {
        self.outline.get_or_insert_with(Outline::default)
    }

    /// Outline modifier, if attached
    pub fn outline(&self) -> Option<&Outline> {
        self.outline.as_ref()
    }

    /// Outline modifier, mutably
    pub fn outline_mut(&mut self) -> Option<&mut Outline> {
        self.outline.as_mut()
    }

    /// Detach the outline modifier
    pub fn remove_outline(&mut self) {
        self.outline = None;
    }

    /// Outline that should be drawn this frame
    pub fn active_outline(&self) -> Option<&Outline> {
        self.outline.as_ref().filter(|outline| outline.is_enabled())
    }

    /// Draw one entity of the bound mesh
    pub fn draw_entity(&self, state: &mut StateCache, index: usize) {
        if let Some(entity) = self.entities.get(index) {
            MeshKind::Object3D {
                starting_index: entity.starting_index,
                indices_count: entity.indices_count,
                vertices_count: entity.vertices_count,
                indexed: self.buffers.uses_indices(),
            }
            .draw(state);
        }
    }
}
