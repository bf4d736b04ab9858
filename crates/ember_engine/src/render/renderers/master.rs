//! # Master Renderer
//!
//! Owns the window, the GPU state cache and every render pass, and drives the
//! frame loop:
//!
//! ```text
//! poll events -> frame callback -> swap buffers -> frame delta -> close check
//! ```
//!
//! The callback receives the renderer and usually ends with
//! [`MasterRenderer::draw_scene`], which runs the passes in a fixed order:
//! shadow maps, water reflection and refraction, the multisampled scene
//! (skybox, objects, water, particles), the postprocess resolve and the text
//! overlay.

use crate::config::{DisplayConfig, EngineConfig};
use crate::error::{EngineError, EngineResult};
use crate::foundation::math::Vec3;
use crate::foundation::time::FpsCounter;
use crate::input::Input;
use crate::render::api::GpuDevice;
use crate::render::backends::gl::GlDevice;
use crate::render::camera::{Camera, SharedCamera};
use crate::render::lighting::LightManager;
use crate::render::resources::ShaderLibrary;
use crate::render::scene::Scene;
use crate::render::settings::{Fog, PolygonMode, PostprocessConfig, ShadowMapConfig};
use crate::render::state::StateCache;
use crate::render::text::GlyphRasterizer;
use crate::render::window::{Display, GlfwDisplay};

use super::{
    clear_target, FontRenderer, FrameContext, ObjectRenderer, ParticleRenderer, PostprocessRenderer, ShadowRenderer,
    SkyboxRenderer, WaterRenderer,
};

/// Per-frame user callback
pub type FrameCallback = Box<dyn FnMut(&mut MasterRenderer) -> EngineResult<()>>;

/// Frame loop and pass orchestration
///
/// Fields drop in declaration order: every GPU resource owner comes before
/// `state`, which deletes what they released, and `display` (the context)
/// goes last.
pub struct MasterRenderer {
    input: Input,
    fps: FpsCounter,
    camera: SharedCamera,
    lights: LightManager,

    display_config: DisplayConfig,
    fog: Fog,
    shadows: ShadowMapConfig,
    polygon_mode: PolygonMode,
    postprocess: PostprocessConfig,

    library: ShaderLibrary,
    object_renderer: ObjectRenderer,
    shadow_renderer: ShadowRenderer,
    skybox_renderer: SkyboxRenderer,
    water_renderer: WaterRenderer,
    particle_renderer: ParticleRenderer,
    postprocess_renderer: PostprocessRenderer,
    font_renderer: Option<FontRenderer>,
    warned_missing_font: bool,

    callback: Option<FrameCallback>,
    running: bool,

    state: StateCache,
    display: Box<dyn Display>,
}

impl MasterRenderer {
    /// Open a GLFW window described by `config` and render through OpenGL
    pub fn open(config: &EngineConfig) -> EngineResult<Self> {
        let (display, gl) = GlfwDisplay::create(&config.display)?;
        let device = GlDevice::new(gl);
        Self::new(Box::new(display), Box::new(device), config)
    }

    /// Build every pass on top of `display` and `device`
    pub fn new(display: Box<dyn Display>, device: Box<dyn GpuDevice>, config: &EngineConfig) -> EngineResult<Self> {
        config.validate().map_err(|e| EngineError::usage("master_renderer", "MasterRenderer::new", e))?;

        let mut state = StateCache::new(device);
        let library = match &config.shader_dir {
            Some(dir) => ShaderLibrary::from_directory(dir),
            None => ShaderLibrary::Embedded,
        };

        let size = (config.display.width, config.display.height);
        let object_renderer = ObjectRenderer::new(&mut state, &library)?;
        let shadow_renderer = ShadowRenderer::new(&mut state, &library)?;
        let skybox_renderer = SkyboxRenderer::new(&mut state, &library)?;
        let water_renderer = WaterRenderer::new(&mut state, &library, &config.water)?;
        let particle_renderer = ParticleRenderer::new(&mut state, &library)?;
        let postprocess_renderer = PostprocessRenderer::new(&mut state, &library, size, config.display.msaa_samples)?;

        let mut camera = Camera::new("default_camera");
        camera.set_aspect(size.0 as f32 / size.1 as f32)?;

        log::info!(target: "master_renderer", "Master renderer created ({}x{}).", size.0, size.1);
        Ok(Self {
            display,
            state,
            input: Input::new(),
            fps: FpsCounter::new(),
            camera: camera.into_shared(),
            lights: LightManager::new(),
            display_config: config.display.clone(),
            fog: config.fog.clone(),
            shadows: config.shadows.clone(),
            polygon_mode: config.polygon_mode.clone(),
            postprocess: config.postprocess.clone(),
            library,
            object_renderer,
            shadow_renderer,
            skybox_renderer,
            water_renderer,
            particle_renderer,
            postprocess_renderer,
            font_renderer: None,
            warned_missing_font: false,
            callback: None,
            running: false,
        })
    }

    // Frame loop

    /// Install the per-frame callback
    pub fn set_callback(&mut self, callback: impl FnMut(&mut MasterRenderer) -> EngineResult<()> + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// Run frames until [`Self::stop`] is called, the window asks to close or
    /// the callback fails
    pub fn start(&mut self) -> EngineResult<()> {
        if self.running {
            log::warn!(target: "master_renderer", "Frame loop is already running.");
            return Ok(());
        }
        log::info!(target: "master_renderer", "Frame loop started.");
        self.running = true;

        while self.running {
            self.fps.start_delta();
            self.display.poll_events(&mut self.input);

            if let Some(mut callback) = self.callback.take() {
                let result = callback(self);
                // The callback may have installed a replacement for itself
                if self.callback.is_none() {
                    self.callback = Some(callback);
                }
                if let Err(error) = result {
                    self.running = false;
                    return Err(error);
                }
            }

            self.display.swap_buffers();
            self.fps.end_delta();

            if self.display.should_close() {
                self.stop();
            }
        }
        Ok(())
    }

    /// Leave the frame loop at the end of the current iteration
    pub fn stop(&mut self) {
        if self.running {
            log::info!(target: "master_renderer", "Frame loop stopped.");
        }
        self.running = false;
    }

    /// Whether the frame loop is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Clear the bound target to the background colour and reset the
    /// viewport to the display size
    pub fn clear(&mut self) {
        let size = self.display.framebuffer_size();
        clear_target(&mut self.state, self.display_config.background_color, size);
    }

    // Scene

    /// Render `scene` through every pass
    pub fn draw_scene(&mut self, scene: &mut Scene) -> EngineResult<()> {
        if !scene.is_enabled() {
            return Ok(());
        }
        self.state.collect_released();
        let wireframe = self.polygon_mode.wireframe;
        let display_size = self.display.framebuffer_size();
        let delta = self.fps.delta() as f32;

        self.state.enable_depth_mask(true);
        self.state.enable_depth_test(true);
        self.state.enable_face_cull(true);
        self.state.set_wireframe(wireframe);

        self.camera.borrow_mut().set_updates_frustum_box(false);
        let offscreen = self.render_offscreen(scene, display_size, delta);
        self.camera.borrow_mut().set_updates_frustum_box(true);
        offscreen?;

        self.state.unbind_framebuffer();
        self.clear();

        if !wireframe {
            self.postprocess_renderer.begin_scene(&mut self.state, self.display_config.background_color);
        }

        let ctx = FrameContext {
            camera: &self.camera,
            lights: &self.lights,
            fog: &self.fog,
            shadows: &self.shadows,
            polygon_mode: &self.polygon_mode,
            display_size,
            delta,
        };
        if !wireframe {
            self.skybox_renderer.render(&mut self.state, &ctx, scene.active_skybox());
        }
        self.object_renderer.set_full_render(true);
        self.object_renderer.render(&mut self.state, &ctx, scene.objects(), scene.active_skybox());
        self.water_renderer.render(&mut self.state, &ctx, scene.water_tiles_mut());
        self.particle_renderer.render(&mut self.state, &ctx, scene.particle_systems_mut())?;

        if !wireframe {
            self.postprocess_renderer.render(
                &mut self.state,
                &self.postprocess,
                self.display_config.background_color,
                display_size,
            );
            self.render_texts(scene, display_size)?;
        }

        self.camera.borrow_mut().update(delta);
        self.fps.update();
        Ok(())
    }

    fn render_offscreen(&mut self, scene: &Scene, display_size: (u32, u32), delta: f32) -> EngineResult<()> {
        if !self.polygon_mode.wireframe && self.lights.is_lighting_enabled() {
            self.shadow_renderer.render(
                &mut self.state,
                &mut self.object_renderer,
                &self.camera,
                &mut self.lights,
                &self.shadows,
                scene.objects(),
            )?;
        }

        let ctx = FrameContext {
            camera: &self.camera,
            lights: &self.lights,
            fog: &self.fog,
            shadows: &self.shadows,
            polygon_mode: &self.polygon_mode,
            display_size,
            delta,
        };
        self.water_renderer.render_to_framebuffers(
            &mut self.state,
            &ctx,
            &mut self.object_renderer,
            &mut self.skybox_renderer,
            scene.water_tiles().first(),
            scene.objects(),
            scene.active_skybox(),
        )
    }

    fn render_texts(&mut self, scene: &Scene, display_size: (u32, u32)) -> EngineResult<()> {
        if scene.texts().is_empty() {
            return Ok(());
        }
        match self.font_renderer.as_mut() {
            Some(font_renderer) => font_renderer.render(&mut self.state, scene.texts(), display_size),
            None => {
                if !self.warned_missing_font {
                    log::warn!(target: "master_renderer", "Scene [{}] has texts but no glyph rasterizer is set.", scene.name());
                    self.warned_missing_font = true;
                }
                Ok(())
            }
        }
    }

    /// Enable text rendering with glyphs from `rasterizer`
    pub fn set_glyph_rasterizer(&mut self, rasterizer: Box<dyn GlyphRasterizer>) -> EngineResult<()> {
        self.font_renderer = Some(FontRenderer::new(&mut self.state, &self.library, rasterizer)?);
        Ok(())
    }

    // Accessors

    /// GPU state cache, used to create meshes, textures and framebuffers
    pub fn state_mut(&mut self) -> &mut StateCache {
        &mut self.state
    }

    /// Window collaborator
    pub fn display_mut(&mut self) -> &mut dyn Display {
        self.display.as_mut()
    }

    /// Keyboard and mouse state of the last poll
    pub fn input(&self) -> &Input {
        &self.input
    }

    /// Keyboard and mouse state, mutably
    pub fn input_mut(&mut self) -> &mut Input {
        &mut self.input
    }

    /// Camera the scene is viewed through
    pub fn camera(&self) -> SharedCamera {
        SharedCamera::clone(&self.camera)
    }

    /// Replace the active camera
    pub fn use_camera(&mut self, camera: SharedCamera) {
        log::debug!(target: "master_renderer", "Camera [{}] in use.", camera.borrow().name());
        self.camera = camera;
    }

    /// Frames counted over the last full second
    pub fn fps(&self) -> u32 {
        self.fps.frame_rate()
    }

    /// Duration of the previous frame in seconds
    pub fn delta(&self) -> f64 {
        self.fps.delta()
    }

    /// Lights shared by all passes
    pub fn light_manager(&self) -> &LightManager {
        &self.lights
    }

    /// Lights shared by all passes, mutably
    pub fn light_manager_mut(&mut self) -> &mut LightManager {
        &mut self.lights
    }

    /// Window settings the renderer was created with
    pub fn display_config(&self) -> &DisplayConfig {
        &self.display_config
    }

    /// Background colour of cleared targets, clamped to [0, 1]
    pub fn set_background_color(&mut self, color: Vec3) {
        self.display_config.background_color = color.map(|c| c.clamp(0.0, 1.0));
    }

    /// Distance fog
    pub fn fog(&self) -> &Fog {
        &self.fog
    }

    /// Distance fog, mutably
    pub fn fog_mut(&mut self) -> &mut Fog {
        &mut self.fog
    }

    /// Shadow mapping parameters
    pub fn shadows(&self) -> &ShadowMapConfig {
        &self.shadows
    }

    /// Shadow mapping parameters, mutably
    pub fn shadows_mut(&mut self) -> &mut ShadowMapConfig {
        &mut self.shadows
    }

    /// Wireframe debug view
    pub fn polygon_mode(&self) -> &PolygonMode {
        &self.polygon_mode
    }

    /// Wireframe debug view, mutably
    pub fn polygon_mode_mut(&mut self) -> &mut PolygonMode {
        &mut self.polygon_mode
    }

    /// Postprocess effect
    pub fn postprocess(&self) -> &PostprocessConfig {
        &self.postprocess
    }

    /// Postprocess effect, mutably
    pub fn postprocess_mut(&mut self) -> &mut PostprocessConfig {
        &mut self.postprocess
    }

    /// Water pass, for its offscreen resolutions
    pub fn water_renderer_mut(&mut self) -> &mut WaterRenderer {
        &mut self.water_renderer
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::render::api::{ClearMask, FramebufferBinding};
    use crate::render::backends::recording::{CallLog, GpuCall, RecordingDevice};
    use crate::render::mesh::{MeshData, Object3D, Particle, ParticleSystem, Skybox, WaterTile};
    use crate::render::text::Text;
    use crate::render::window::HeadlessDisplay;

    fn renderer(frames: u32) -> (MasterRenderer, CallLog) {
        let device = RecordingDevice::new();
        let log = device.log();
        let display = HeadlessDisplay::new(320, 180).with_frame_limit(frames);
        let mut config = EngineConfig::default();
        config.display.width = 320;
        config.display.height = 180;
        let renderer = MasterRenderer::new(Box::new(display), Box::new(device), &config).unwrap();
        (renderer, log)
    }

    fn lake_scene(renderer: &mut MasterRenderer) -> Scene {
        let state = renderer.state_mut();
        let mut scene = Scene::new("lake");
        let data = MeshData::positions(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], 3);
        scene.add_object(Object3D::with_material(state, "rock", &data, None));
        scene.add_skybox(Skybox::new(state, "sky"), true);
        scene.add_water_tile(WaterTile::new(state, "lake"));
        let mut sparks = ParticleSystem::new("sparks", 10.0).unwrap();
        sparks.emit(Particle::simple(Vec3::zeros(), Vec3::zeros(), 5.0, 1.0).unwrap());
        scene.add_particle_system(sparks);
        scene
    }

    #[test]
    fn test_loop_stops_when_display_closes() {
        let (mut renderer, _log) = renderer(3);
        let frames = Rc::new(Cell::new(0));
        let counter = Rc::clone(&frames);
        renderer.set_callback(move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });

        renderer.start().unwrap();

        assert_eq!(frames.get(), 3);
        assert!(!renderer.is_running());
    }

    #[test]
    fn test_stop_from_callback_ends_after_current_frame() {
        let (mut renderer, _log) = renderer(10);
        let frames = Rc::new(Cell::new(0));
        let counter = Rc::clone(&frames);
        renderer.set_callback(move |renderer| {
            counter.set(counter.get() + 1);
            renderer.stop();
            Ok(())
        });

        renderer.start().unwrap();
        assert_eq!(frames.get(), 1);
    }

    #[test]
    fn test_callback_error_stops_loop() {
        let (mut renderer, _log) = renderer(10);
        renderer.set_callback(|_| Err(EngineError::usage("app", "frame", "broken")));
        assert!(matches!(renderer.start(), Err(EngineError::Usage { .. })));
        assert!(!renderer.is_running());
    }

    #[test]
    fn test_passes_run_in_frame_order() {
        let (mut renderer, log) = renderer(1);
        let mut scene = lake_scene(&mut renderer);
        let scene_target = renderer.postprocess_renderer.scene_framebuffer().id();
        log.clear();

        renderer.draw_scene(&mut scene).unwrap();

        let calls = log.calls();
        let find = |pred: &dyn Fn(&GpuCall) -> bool| calls.iter().position(|c| pred(c)).unwrap();
        let scene_bind = find(&|c| matches!(c, GpuCall::BindFramebuffer(FramebufferBinding::Full, Some(id)) if *id == scene_target));
        let skybox = scene_bind + calls[scene_bind..].iter().position(|c| matches!(c, GpuCall::DrawArrays { count: 36, .. })).unwrap();
        let object = skybox + calls[skybox..].iter().position(|c| matches!(c, GpuCall::DrawArrays { count: 3, .. })).unwrap();
        let blit = find(&|c| matches!(c, GpuCall::Blit { mask, .. } if *mask == ClearMask::COLOR));
        let screen = blit + calls[blit..].iter().position(GpuCall::is_draw).unwrap();

        // Reflection and refraction drew the rock before the visible pass
        let offscreen_rock = find(&|c| matches!(c, GpuCall::DrawArrays { count: 3, .. }));
        assert!(offscreen_rock < scene_bind);
        assert!(scene_bind < skybox && skybox < object && object < blit && blit < screen);
        assert!(renderer.camera().borrow().updates_frustum_box());
        assert_eq!(renderer.state_mut().bound_draw_framebuffer(), None);
    }

    #[test]
    fn test_wireframe_draws_straight_to_default_target() {
        let (mut renderer, log) = renderer(1);
        let mut scene = lake_scene(&mut renderer);
        renderer.polygon_mode_mut().wireframe = true;
        log.clear();

        renderer.draw_scene(&mut scene).unwrap();

        assert!(log.calls().iter().any(|c| matches!(c, GpuCall::PolygonMode(true))));
        assert_eq!(log.count(|c| matches!(c, GpuCall::Blit { .. })), 0);
        assert_eq!(log.count(|c| matches!(c, GpuCall::DrawArrays { count: 36, .. })), 2);
    }

    #[test]
    fn test_camera_integrates_after_scene() {
        let (mut renderer, _log) = renderer(1);
        let mut scene = Scene::new("empty");
        let camera = Camera::new("walker").into_shared();
        renderer.use_camera(Rc::clone(&camera));
        camera.borrow_mut().move_towards(crate::render::camera::MoveDirection::Forward);

        renderer.fps.start_delta();
        std::thread::sleep(std::time::Duration::from_millis(5));
        renderer.fps.end_delta();
        renderer.draw_scene(&mut scene).unwrap();

        assert!(camera.borrow().position().z < 0.0);
    }

    #[test]
    fn test_texts_skipped_without_rasterizer() {
        let (mut renderer, log) = renderer(1);
        let mut scene = Scene::new("ui");
        scene.add_text(Text::new("hello", "mono.ttf"));
        log.clear();

        renderer.draw_scene(&mut scene).unwrap();
        renderer.draw_scene(&mut scene).unwrap();

        // Only the postprocess quad is drawn each frame
        assert_eq!(log.draw_count(), 2);
        assert!(renderer.warned_missing_font);
    }

    #[test]
    fn test_disabled_scene_draws_nothing() {
        let (mut renderer, log) = renderer(1);
        let mut scene = lake_scene(&mut renderer);
        scene.enable(false);
        log.clear();
        renderer.draw_scene(&mut scene).unwrap();
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_removed_resources_are_deleted_next_frame() {
        let (mut renderer, log) = renderer(1);
        let mut scene = lake_scene(&mut renderer);
        renderer.draw_scene(&mut scene).unwrap();
        let rock = scene.objects()[0].buffers().vertex_array();
        drop(scene);
        assert_eq!(log.count(|c| matches!(c, GpuCall::DeleteVertexArray { vertex_array, .. } if *vertex_array == rock)), 0);

        let mut empty = Scene::new("empty");
        renderer.draw_scene(&mut empty).unwrap();
        assert_eq!(log.count(|c| matches!(c, GpuCall::DeleteVertexArray { vertex_array, .. } if *vertex_array == rock)), 1);
    }

    #[test]
    fn test_dropping_renderer_releases_every_gpu_object() {
        let (mut renderer, log) = renderer(1);
        renderer.light_manager_mut().enable_lighting(true);
        renderer.shadows_mut().enabled = true;
        let mut scene = lake_scene(&mut renderer);
        renderer.draw_scene(&mut scene).unwrap();
        drop(scene);
        drop(renderer);

        let created_programs = log.count(|c| matches!(c, GpuCall::CreateProgram(_)));
        let created_framebuffers = log.count(|c| matches!(c, GpuCall::CreateFramebuffer(_)));
        let created_textures = log.count(|c| matches!(c, GpuCall::CreateTexture(..)));
        assert!(created_framebuffers > 0);
        assert_eq!(log.count(|c| matches!(c, GpuCall::DeleteProgram(_))), created_programs);
        assert_eq!(log.count(|c| matches!(c, GpuCall::DeleteFramebuffer(_))), created_framebuffers);
        assert_eq!(log.count(|c| matches!(c, GpuCall::DeleteTexture(_))), created_textures);
    }
}
