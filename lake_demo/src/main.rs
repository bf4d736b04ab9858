//! Lake demo
//!
//! A small island scene exercising every pass of the engine: a lit and shadowed
//! crate, an outlined pillar, a water tile reflecting both, a spark fountain
//! and an FPS label.
//!
//! Controls: `W`/`A`/`S`/`D` move, hold the right mouse button to look around,
//! `F1` toggles wireframe, `F2` toggles shadows, `F3` cycles postprocess
//! effects, `Escape` quits.

mod block_font;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use ember_engine::prelude::*;
use ember_engine::render::resources::CUBE_FACES;
use rand::prelude::*;

use block_font::BlockFont;

const CONFIG_PATH: &str = "lake_demo.toml";
const SKYBOX_DIR: &str = "assets/skybox";
const MOUSE_SENSITIVITY: f32 = 0.003;

const EFFECTS: [PostprocessEffect; 7] = [
    PostprocessEffect::None,
    PostprocessEffect::Negative,
    PostprocessEffect::Grayscale,
    PostprocessEffect::Sharpen,
    PostprocessEffect::Blur,
    PostprocessEffect::Edge,
    PostprocessEffect::Tint,
];

/// Unit cube as 36 vertices with flat normals
fn cube_data() -> MeshData {
    // (normal, tangent u, tangent v) per face
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0)];

    let mut positions = Vec::with_capacity(108);
    let mut normals = Vec::with_capacity(108);
    let mut tex_coords = Vec::with_capacity(72);
    for (normal, u, v) in faces {
        for (a, b) in corners {
            positions.extend((0..3).map(|i| 0.5 * (normal[i] + a * u[i] + b * v[i])));
            normals.extend_from_slice(&normal);
            tex_coords.extend_from_slice(&[(a + 1.0) * 0.5, (b + 1.0) * 0.5]);
        }
    }
    MeshData::positions(positions, 3).with_normals(normals).with_tex_coords(tex_coords)
}

fn material(name: &str, diffuse: Vec3) -> Rc<Material> {
    let mut material = Material::new(name);
    material.set_ka(diffuse * 0.2);
    material.set_kd(diffuse);
    material.set_ks(Vec3::new(0.5, 0.5, 0.5));
    material.set_shininess(32);
    Rc::new(material)
}

fn load_skybox(renderer: &mut MasterRenderer, loader: &mut TextureLoader) -> Option<Skybox> {
    let dir = Path::new(SKYBOX_DIR);
    let paths: Vec<PathBuf> = CUBE_FACES.iter().map(|face| dir.join(format!("{face}.png"))).collect();
    if !paths.iter().all(|p| p.exists()) {
        log::warn!("No skybox images under [{}], drawing without a sky.", dir.display());
        return None;
    }

    let faces = [&*paths[0], &*paths[1], &*paths[2], &*paths[3], &*paths[4], &*paths[5]];
    let state = renderer.state_mut();
    let mut skybox = Skybox::new(state, "sky");
    match loader.load_cube(state, faces).and_then(|texture| skybox.set_texture(Some(texture))) {
        Ok(()) => Some(skybox),
        Err(error) => {
            log::warn!("Skybox not loaded: {error}");
            None
        }
    }
}

fn build_scene(renderer: &mut MasterRenderer) -> EngineResult<Scene> {
    let mut scene = Scene::new("lake");
    let mut loader = TextureLoader::new();
    if let Some(skybox) = load_skybox(renderer, &mut loader) {
        scene.add_skybox(skybox, true);
    }

    let cube = cube_data();
    let state = renderer.state_mut();

    let mut ground = Object3D::with_material(state, "island", &cube, Some(material("sand", Vec3::new(0.76, 0.7, 0.5))));
    ground.transform_mut().set_scale(Vec3::new(6.0, 0.5, 6.0));
    ground.transform_mut().set_position(Vec3::new(0.0, -0.2, -6.0));
    scene.add_object(ground);

    let mut crate_box = Object3D::with_material(state, "crate", &cube, Some(material("wood", Vec3::new(0.6, 0.4, 0.2))));
    crate_box.transform_mut().set_position(Vec3::new(-1.0, 0.55, -5.0));
    scene.add_object(crate_box);

    let mut pillar = Object3D::with_material(state, "pillar", &cube, Some(material("stone", Vec3::new(0.5, 0.5, 0.55))));
    pillar.transform_mut().set_scale(Vec3::new(0.5, 2.0, 0.5));
    pillar.transform_mut().set_position(Vec3::new(1.5, 1.05, -7.0));
    let outline = pillar.add_outline();
    outline.enable(true);
    outline.set_scale(1.08)?;
    outline.set_color(Vec3::new(1.0, 0.8, 0.0));
    scene.add_object(pillar);

    let mut lake = WaterTile::new(state, "lake");
    lake.transform_mut().set_scale(Vec3::new(40.0, 1.0, 40.0));
    lake.transform_mut().set_position(Vec3::new(0.0, 0.0, -6.0));
    lake.set_texture_tiling(8.0)?;
    scene.add_water_tile(lake);

    let mut sparks = ParticleSystem::new("sparks", 40.0)?;
    sparks.set_position(Vec3::new(-1.0, 1.2, -5.0));
    sparks.set_blend_function(BlendFunction::Additive);
    let mut rng = StdRng::from_entropy();
    sparks.set_generator(move |origin| {
        let velocity = Vec3::new(rng.gen_range(-0.6..0.6), rng.gen_range(2.0..3.5), rng.gen_range(-0.6..0.6));
        Particle::new(origin, velocity, rng.gen_range(0.8..1.6), -9.81, 0.3, 0.0, rng.gen_range(0.3..0.8))
    });
    scene.add_particle_system(sparks);

    let mut label = Text::new("FPS: --", "block");
    label.set_position(16, 32);
    label.set_outline_size(1);
    scene.add_text(label);

    Ok(scene)
}

fn setup_lights(renderer: &mut MasterRenderer) -> EngineResult<()> {
    let lights = renderer.light_manager_mut();
    lights.enable_lighting(true);

    let sun = lights.directional_light_mut();
    sun.enable(true);
    sun.set_direction(Vec3::new(-0.4, -1.0, -0.6));
    sun.set_color(Vec3::new(1.0, 0.95, 0.85));

    let index = lights.create_point_light()?;
    if let Some(lamp) = lights.point_light_mut(index) {
        lamp.enable(true);
        lamp.set_position(Vec3::new(-1.0, 2.0, -4.0));
        lamp.set_color(Vec3::new(1.0, 0.5, 0.2));
    }
    Ok(())
}

/// Keyboard and mouse handling of one frame
struct Controls {
    look_anchor: Option<(f64, f64)>,
    effect: usize,
}

impl Controls {
    fn apply(&mut self, renderer: &mut MasterRenderer) {
        let camera = renderer.camera();
        let input = renderer.input_mut();

        if input.is_key_pressed(Key::Escape, false) {
            renderer.stop();
            return;
        }

        {
            let mut camera = camera.borrow_mut();
            for (key, direction) in [
                (Key::W, MoveDirection::Forward),
                (Key::S, MoveDirection::Backward),
                (Key::A, MoveDirection::Left),
                (Key::D, MoveDirection::Right),
            ] {
                if input.is_key_pressed(key, true) {
                    camera.move_towards(direction);
                }
            }

            if input.is_mouse_button_pressed(MouseButton::Button2) {
                let (x, y) = input.cursor_position();
                if let Some((anchor_x, anchor_y)) = self.look_anchor {
                    let yaw = (x - anchor_x) as f32 * MOUSE_SENSITIVITY;
                    let pitch = (y - anchor_y) as f32 * MOUSE_SENSITIVITY;
                    camera.rotate(pitch, yaw);
                    input.set_cursor_position(anchor_x, anchor_y);
                } else {
                    self.look_anchor = Some((x, y));
                }
            } else {
                self.look_anchor = None;
            }
        }

        let toggle_wireframe = input.is_key_pressed(Key::F1, false);
        let toggle_shadows = input.is_key_pressed(Key::F2, false);
        let next_effect = input.is_key_pressed(Key::F3, false);

        if toggle_wireframe {
            let mode = renderer.polygon_mode_mut();
            mode.wireframe = !mode.wireframe;
        }
        if toggle_shadows {
            let shadows = renderer.shadows_mut();
            shadows.enabled = !shadows.enabled;
            log::info!("Shadows {}.", if shadows.enabled { "on" } else { "off" });
        }
        if next_effect {
            self.effect = (self.effect + 1) % EFFECTS.len();
            renderer.postprocess_mut().effect = EFFECTS[self.effect];
            log::info!("Postprocess effect: {:?}.", EFFECTS[self.effect]);
        }
    }
}

fn run() -> EngineResult<()> {
    let mut config = if Path::new(CONFIG_PATH).exists() {
        EngineConfig::load_from_file(CONFIG_PATH)?
    } else {
        let mut config = EngineConfig::default();
        config.display = config.display.with_title("Lake").with_background_color(Vec3::new(0.4, 0.6, 0.8));
        config.shadows.enabled = true;
        config.fog.enabled = true;
        config
    };
    config.logger = config.logger.with_console(true);
    logging::init_with(&config.logger)?;
    log::info!("Starting lake demo");

    let mut renderer = MasterRenderer::open(&config)?;
    renderer.set_glyph_rasterizer(Box::new(BlockFont))?;
    setup_lights(&mut renderer)?;
    {
        let camera = renderer.camera();
        let mut camera = camera.borrow_mut();
        camera.set_position(Vec3::new(0.0, 2.0, 2.0));
        camera.set_rotation(0.0, 0.25);
    }

    let mut scene = build_scene(&mut renderer)?;
    let mut controls = Controls { look_anchor: None, effect: 0 };
    renderer.set_callback(move |renderer| {
        controls.apply(renderer);
        if let Some(label) = scene.text_mut(0) {
            label.set_text(format!("FPS: {}", renderer.fps()));
        }
        renderer.draw_scene(&mut scene)
    });

    renderer.start()
}

fn main() {
    if let Err(error) = run() {
        log::error!("Lake demo failed: {error}");
        eprintln!("Lake demo failed: {error}");
        std::process::exit(1);
    }
    log::info!("Lake demo finished");
}
