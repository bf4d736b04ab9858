//! Scene container handed to the master renderer once per frame

use crate::render::mesh::{Object3D, ParticleSystem, Skybox, WaterTile};
use crate::render::text::Text;

/// Flat lists of everything drawn in one frame
///
/// The scene owns its content; renderers only borrow it while drawing.
#[derive(Debug)]
pub struct Scene {
    name: String,
    enabled: bool,
    objects: Vec<Object3D>,
    particle_systems: Vec<ParticleSystem>,
    skyboxes: Vec<Skybox>,
    active_skybox: Option<usize>,
    texts: Vec<Text>,
    water_tiles: Vec<WaterTile>,
}

impl Scene {
    /// Empty, enabled scene
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            objects: Vec::new(),
            particle_systems: Vec::new(),
            skyboxes: Vec::new(),
            active_skybox: None,
            texts: Vec::new(),
            water_tiles: Vec::new(),
        }
    }

    /// Scene name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Disabled scenes are skipped by the master renderer
    pub fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the scene is drawn
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Add an object, returning its index
    pub fn add_object(&mut self, object: Object3D) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    /// Objects in insertion order
    pub fn objects(&self) -> &[Object3D] {
        &self.objects
    }

    /// Mutable access to one object
    pub fn object_mut(&mut self, index: usize) -> Option<&mut Object3D> {
        self.objects.get_mut(index)
    }

    /// Add a particle system, returning its index
    pub fn add_particle_system(&mut self, system: ParticleSystem) -> usize {
        self.particle_systems.push(system);
        self.particle_systems.len() - 1
    }

    /// Particle systems in insertion order
    pub fn particle_systems(&self) -> &[ParticleSystem] {
        &self.particle_systems
    }

    /// Mutable access to all particle systems
    pub fn particle_systems_mut(&mut self) -> &mut [ParticleSystem] {
        &mut self.particle_systems
    }

    /// Add a skybox, optionally making it the one that is drawn
    pub fn add_skybox(&mut self, skybox: Skybox, activate: bool) -> usize {
        self.skyboxes.push(skybox);
        let index = self.skyboxes.len() - 1;
        if activate {
            self.active_skybox = Some(index);
        }
        index
    }

    /// Select the drawn skybox; out-of-range indices are ignored with a warning
    pub fn set_active_skybox(&mut self, index: Option<usize>) {
        match index {
            Some(i) if i >= self.skyboxes.len() => {
                log::warn!(target: "scene", "Scene [{}] has no skybox with index {}.", self.name, i);
            }
            _ => self.active_skybox = index,
        }
    }

    /// Skybox that is drawn and used as the environment map
    pub fn active_skybox(&self) -> Option<&Skybox> {
        self.active_skybox.and_then(|i| self.skyboxes.get(i))
    }

    /// Mutable access to the active skybox
    pub fn active_skybox_mut(&mut self) -> Option<&mut Skybox> {
        self.active_skybox.and_then(|i| self.skyboxes.get_mut(i))
    }

    /// All skyboxes
    pub fn skyboxes(&self) -> &[Skybox] {
        &self.skyboxes
    }

    /// Add a text label, returning its index
    pub fn add_text(&mut self, text: Text) -> usize {
        self.texts.push(text);
        self.texts.len() - 1
    }

    /// Text labels in drawing order
    pub fn texts(&self) -> &[Text] {
        &self.texts
    }

    /// Mutable access to one label
    pub fn text_mut(&mut self, index: usize) -> Option<&mut Text> {
        self.texts.get_mut(index)
    }

    /// Add a water tile, returning its index
    pub fn add_water_tile(&mut self, tile: WaterTile) -> usize {
        self.water_tiles.push(tile);
        self.water_tiles.len() - 1
    }

    /// Water tiles
    pub fn water_tiles(&self) -> &[WaterTile] {
        &self.water_tiles
    }

    /// Mutable access to one water tile
    pub fn water_tile_mut(&mut self, index: usize) -> Option<&mut WaterTile> {
        self.water_tiles.get_mut(index)
    }

    /// Water tiles, mutably
    pub fn water_tiles_mut(&mut self) -> &mut [WaterTile] {
        &mut self.water_tiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::recording::RecordingDevice;
    use crate::render::state::StateCache;

    #[test]
    fn test_skybox_activation() {
        let mut state = StateCache::new(Box::new(RecordingDevice::new()));
        let mut scene = Scene::new("lake");
        assert!(scene.active_skybox().is_none());

        scene.add_skybox(Skybox::new(&mut state, "day"), true);
        scene.add_skybox(Skybox::new(&mut state, "night"), false);
        assert_eq!(scene.active_skybox().map(Skybox::name), Some("day"));

        scene.set_active_skybox(Some(1));
        assert_eq!(scene.active_skybox().map(Skybox::name), Some("night"));

        scene.set_active_skybox(Some(7));
        assert_eq!(scene.active_skybox().map(Skybox::name), Some("night"));

        scene.set_active_skybox(None);
        assert!(scene.active_skybox().is_none());
    }

    #[test]
    fn test_containers_keep_insertion_order() {
        let mut scene = Scene::new("ui");
        scene.add_text(Text::new("a", "font.ttf"));
        scene.add_text(Text::new("b", "font.ttf"));
        assert_eq!(scene.texts()[1].text(), "b");
        assert!(scene.is_enabled());
    }
}
