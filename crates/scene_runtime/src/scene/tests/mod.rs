//! Scenario tests driving the scene through its facade
//!
//! Shared fixtures live here; each submodule covers one area.

mod asset_reload;
mod frame_pipeline;
mod lifecycle;

use crate::assets::types::{NodeData, PartData};
use crate::assets::{MaterialData, MemoryAssetFactory, MeshData, TextureSlot};
use crate::config::RuntimeConfig;
use crate::foundation::math::{Transform, Vec3};
use crate::render::{HeadlessBackend, ObjectParams};
use crate::scene::{ObjectId, Scene};

pub(super) const CUBE: &str = "meshes/cube.mesh.ron";
pub(super) const PLAIN_CUBE: &str = "meshes/plain.mesh.ron";
pub(super) const TANK: &str = "meshes/tank.mesh.ron";
pub(super) const SPRITE: &str = "textures/sprite.png";
pub(super) const RUST: &str = "materials/rust.mat.ron";
pub(super) const PLAIN: &str = "materials/plain.mat.ron";

pub(super) fn cube() -> MeshData {
    MeshData {
        index_count: 36,
        texture: Some("textures/crate.png".into()),
        ..Default::default()
    }
}

pub(super) fn plain_cube() -> MeshData {
    MeshData {
        index_count: 36,
        ..Default::default()
    }
}

/// Body with a turret one unit above it, one part per node
pub(super) fn tank() -> MeshData {
    MeshData {
        nodes: vec![
            NodeData { name: "body".into(), parent: -1, transform: Transform::identity() },
            NodeData {
                name: "turret".into(),
                parent: 0,
                transform: Transform::from_position(Vec3::new(0.0, 1.0, 0.0)),
            },
        ],
        parts: vec![
            PartData { name: "body".into(), node: 0, first_index: 0, index_count: 36, texture: None },
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
    }
}

pub(super) fn factory() -> MemoryAssetFactory {
    MemoryAssetFactory::new()
        .with_mesh(CUBE, cube())
        .with_mesh(PLAIN_CUBE, plain_cube())
        .with_mesh(TANK, tank())
        .with_texture("textures/crate.png", 64, 64)
        .with_texture("textures/turret.png", 32, 32)
        .with_texture(SPRITE, 16, 16)
        .with_texture("textures/rust.png", 128, 128)
        .with_texture("textures/chrome.png", 128, 128)
        .with_material(
            RUST,
            MaterialData {
                name: "rust".into(),
                base_color_factor: [0.5, 0.25, 0.1, 1.0],
                ..Default::default()
            }
            .with_texture(TextureSlot::BaseColor, "textures/rust.png"),
        )
        .with_material(PLAIN, MaterialData::default())
}

pub(super) fn config() -> RuntimeConfig {
    RuntimeConfig::default()
        .with_max_objects(8)
        .with_default_mesh(CUBE)
        .with_default_sprite(SPRITE)
}

pub(super) fn scene() -> Scene<MemoryAssetFactory> {
    Scene::headless(config(), factory()).unwrap()
}

pub(super) fn backend_for(scene: &Scene<MemoryAssetFactory>) -> HeadlessBackend {
    let config = scene.config();
    HeadlessBackend::new(config.frames_in_flight, config.max_bindings())
}

pub(super) fn params(scene: &Scene<MemoryAssetFactory>, replica: usize, id: ObjectId) -> ObjectParams {
    bytemuck::pod_read_unaligned(&scene.store().read(replica, id).unwrap())
}
