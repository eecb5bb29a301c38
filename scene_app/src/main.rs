//! Scene runtime demo
//!
//! Builds a small scene (a tank with a rotating turret, a few sprites, a
//! light and a camera), runs it through a number of frames on the headless
//! or the Vulkan backend, reloads a texture halfway through and saves the
//! result as a RON scene file.
//!
//! ```text
//! scene_demo [--frames N] [--config PATH] [--save PATH] [--vulkan]
//! ```

use std::sync::Arc;

use rand::Rng;
use scene_runtime::assets::types::{NodeData, PartData};
use scene_runtime::assets::{MaterialData, MeshData, TextureSlot};
use scene_runtime::config::RuntimeConfig;
use scene_runtime::foundation::logging;
use scene_runtime::prelude::*;
use scene_runtime::render::vulkan::{
    VulkanAssetFactory, VulkanBackend, VulkanContext, VulkanError, VulkanReplicaMemory,
};
use scene_runtime::render::DrawCommand;
use thiserror::Error;

const TANK: &str = "meshes/tank.mesh.ron";
const SPRITE: &str = "textures/sprite.png";
const CAMO: &str = "materials/camo.mat.ron";

#[derive(Error, Debug)]
enum AppError {
    #[error("{0}")]
    Scene(#[from] SceneError),

    #[error("Vulkan setup failed: {0}")]
    Vulkan(#[from] VulkanError),

    #[error("Bad argument: {0}")]
    Args(String),
}

struct Options {
    frames: usize,
    config: Option<String>,
    save: Option<String>,
    vulkan: bool,
}

impl Options {
    fn parse() -> Result<Self, AppError> {
        let mut options = Self {
            frames: 6,
            config: None,
            save: None,
            vulkan: false,
        };

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--frames" => {
                    let value = args.next().ok_or_else(|| AppError::Args("--frames needs a value".into()))?;
                    options.frames = value
                        .parse()
                        .map_err(|_| AppError::Args(format!("invalid frame count '{}'", value)))?;
                }
                "--config" => options.config = args.next(),
                "--save" => options.save = args.next(),
                "--vulkan" => options.vulkan = true,
                other => return Err(AppError::Args(format!("unknown argument '{}'", other))),
            }
        }
        Ok(options)
    }
}

/// Backends the demo can present with
trait Presenter: RenderBackend {
    fn present(&mut self) -> Vec<DrawCommand>;
}

impl Presenter for HeadlessBackend {
    fn present(&mut self) -> Vec<DrawCommand> {
        let draws = self.take_draws();
        self.advance_frame();
        draws
    }
}

impl Presenter for VulkanBackend {
    fn present(&mut self) -> Vec<DrawCommand> {
        let draws = self.take_draws();
        self.advance_frame();
        draws
    }
}

fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    rgba.repeat(width as usize * height as usize)
}

fn demo_assets() -> MemoryAssetFactory {
    let tank = MeshData {
        nodes: vec![
            NodeData { name: "hull".into(), parent: -1, transform: Transform::identity() },
            NodeData {
                name: "turret".into(),
                parent: 0,
                transform: Transform::from_position(Vec3::new(0.0, 0.8, 0.0)),
            },
        ],
        parts: vec![
            PartData { name: "hull".into(), node: 0, first_index: 0, index_count: 36, texture: None },
            PartData {
                name: "turret".into(),
                node: 1,
                first_index: 36,
                index_count: 24,
                texture: Some("textures/turret.png".into()),
            },
        ],
        index_count: 60,
        texture: None,
    };

    MemoryAssetFactory::new()
        .with_mesh(TANK, tank)
        .with_mesh("meshes/cube.mesh.ron", MeshData { index_count: 36, ..Default::default() })
        .with_texture_pixels("textures/turret.png", 64, 64, solid(64, 64, [90, 100, 60, 255]))
        .with_texture_pixels("textures/camo.png", 256, 256, solid(256, 256, [70, 90, 50, 255]))
        .with_texture_pixels(SPRITE, 32, 32, solid(32, 32, [255, 220, 80, 255]))
        .with_material(
            CAMO,
            MaterialData {
                name: "camo".into(),
                base_color_factor: [0.4, 0.5, 0.3, 1.0],
                ..Default::default()
            }
            .with_texture(TextureSlot::BaseColor, "textures/camo.png"),
        )
}

fn load_config(options: &Options) -> Result<RuntimeConfig, AppError> {
    let config = match &options.config {
        Some(path) => RuntimeConfig::load_validated(path).map_err(SceneError::from)?,
        None => RuntimeConfig::default()
            .with_max_objects(32)
            .with_default_mesh("meshes/cube.mesh.ron")
            .with_default_sprite(SPRITE),
    };
    Ok(config)
}

fn populate<F: AssetFactory>(scene: &mut Scene<F>) -> Result<ObjectId, SceneError> {
    let tank = scene.create_mesh(Vec3::zeros(), Some(TANK))?;
    scene.set_name(tank, "Tank")?;
    scene.apply_material(tank, CAMO)?;

    let mut rng = rand::thread_rng();
    for _ in 0..4 {
        let position = Vec3::new(rng.gen_range(-5.0..5.0), 0.5, rng.gen_range(-5.0..5.0));
        scene.create_sprite(position, None)?;
    }

    scene.create_point_light(Vec3::new(2.0, 4.0, 2.0))?;
    scene.create_camera(Vec3::new(0.0, 3.0, 10.0))?;
    Ok(tank)
}

fn run<F: AssetFactory, B: Presenter>(
    scene: &mut Scene<F>,
    backend: &mut B,
    options: &Options,
) -> Result<(), SceneError> {
    scene.load_registry()?;
    let tank = populate(scene)?;

    for frame in 0..options.frames {
        let yaw = frame as f32 * 0.25;
        let turret = Transform::from_euler(Vec3::zeros(), Vec3::new(0.0, yaw, 0.0), Vec3::new(1.0, 1.0, 1.0));
        scene.set_node_override(tank, 1, turret, true)?;

        if frame == options.frames / 2 {
            scene.reload_texture(SPRITE);
        }

        let stats = scene.prepare_frame(backend)?;
        let draws = backend.present();
        log::info!(
            "Frame {} (replica {}): {} uploads, {} draws, bindings reset: {}",
            frame,
            stats.replica,
            stats.objects_written,
            draws.len(),
            stats.bindings_reset
        );
    }

    let binding_stats = scene.bindings().stats();
    log::info!(
        "Bindings: {} allocated, {} updated, {} reused",
        binding_stats.allocations,
        binding_stats.updates,
        binding_stats.hits
    );

    if let Some(path) = &options.save {
        scene.save_scene(path)?;
    }
    Ok(())
}

fn run_headless(config: RuntimeConfig, options: &Options) -> Result<(), SceneError> {
    let mut backend = HeadlessBackend::new(config.frames_in_flight, config.max_bindings());
    let mut scene = Scene::headless(config, demo_assets())?;
    run(&mut scene, &mut backend, options)
}

fn run_vulkan(config: RuntimeConfig, options: &Options) -> Result<(), AppError> {
    let context = Arc::new(VulkanContext::new("scene_demo", cfg!(debug_assertions))?);
    let replicas = VulkanReplicaMemory::for_config(Arc::clone(&context), &config)?;
    let mut backend = VulkanBackend::new(Arc::clone(&context), &replicas, config.max_bindings())?;
    let factory = VulkanAssetFactory::new(Arc::clone(&context), backend.pool().texture_table(), demo_assets());
    let mut scene = Scene::new(config, factory, Box::new(replicas))?;

    let result = run(&mut scene, &mut backend, options);
    let uploader = scene.assets().factory();
    log::info!(
        "Textures: {} uploaded, {} resident",
        uploader.uploads(),
        uploader.resident_images()
    );
    context.wait_idle()?;
    Ok(result?)
}

fn main() {
    let prepared = Options::parse().and_then(|options| Ok((load_config(&options)?, options)));
    let (config, options) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            eprintln!("scene_demo: {}", e);
            std::process::exit(2);
        }
    };

    logging::init_with_level(&config.log_level);
    log::info!("Starting scene runtime demo");

    let result = if options.vulkan {
        run_vulkan(config, &options)
    } else {
        run_headless(config, &options).map_err(AppError::from)
    };

    match result {
        Ok(()) => log::info!("Scene demo completed successfully"),
        Err(AppError::Scene(e)) if e.is_fatal() => {
            log::error!("Fatal scene error: {}", e);
            std::process::abort();
        }
        Err(e) => {
            log::error!("Scene demo failed: {}", e);
            std::process::exit(1);
        }
    }
}
