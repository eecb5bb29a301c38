//! Materials, texture reloads and retirement as seen from the scene

use super::{backend_for, config, factory, params, scene, CUBE, PLAIN, PLAIN_CUBE, RUST, SPRITE};
use crate::assets::{MaterialData, TextureSlot};
use crate::foundation::math::Vec3;
use crate::render::object_data::FLAG_TEXTURED;
use crate::render::BindingOwner;
use crate::scene::{ObjectKind, Scene, SceneError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_material_recomputes_texturing() {
        let mut scene = scene();
        let mut backend = backend_for(&scene);
        let plain = scene.create_mesh(Vec3::zeros(), Some(PLAIN_CUBE)).unwrap();
        let textured = scene.create_mesh(Vec3::zeros(), Some(CUBE)).unwrap();

        assert!(!scene.apply_material(plain, PLAIN).unwrap());
        assert!(scene.apply_material(plain, RUST).unwrap());
        scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(params(&scene, 0, plain).flags[1], FLAG_TEXTURED);

        // A material that fails to load leaves only the mesh's own textures
        assert!(!scene.apply_material(plain, "materials/missing.mat.ron").unwrap());
        assert!(scene.object(plain).unwrap().mesh().unwrap().material.is_none());
        scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(params(&scene, 1, plain).flags[1], 0);

        assert!(scene.apply_material(textured, PLAIN).unwrap());

        let light = scene.create_point_light(Vec3::zeros()).unwrap();
        assert!(matches!(
            scene.apply_material(light, RUST),
            Err(SceneError::WrongKind { expected: "mesh", .. })
        ));
    }

    #[test]
    fn test_material_update_rebinds_every_user() {
        let mut scene = scene();
        let mut backend = backend_for(&scene);
        let a = scene.create_mesh(Vec3::zeros(), None).unwrap();
        let b = scene.create_mesh(Vec3::new(2.0, 0.0, 0.0), None).unwrap();
        let c = scene.create_mesh(Vec3::new(4.0, 0.0, 0.0), None).unwrap();
        scene.apply_material(a, RUST).unwrap();
        scene.apply_material(b, RUST).unwrap();
        scene.prepare_frame(&mut backend).unwrap();

        let chrome = MaterialData::default().with_texture(TextureSlot::BaseColor, "textures/chrome.png");
        assert!(scene.update_material_from_data(RUST, chrome));
        assert!(scene.object(a).unwrap().is_dirty());
        assert!(scene.object(b).unwrap().is_dirty());
        assert!(!scene.object(c).unwrap().is_dirty());

        let stats = scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(stats.objects_written, 2);
        assert_eq!(scene.bindings().stats().updates, 2);
        assert_eq!(params(&scene, 1, a).color, [1.0, 1.0, 1.0, 1.0]);

        let chrome_id = scene.assets_mut().load_texture("textures/chrome.png").unwrap().id();
        let handle = scene.bindings().peek(BindingOwner::Object(b), 0).unwrap();
        assert_eq!(backend.pool().describe(handle).unwrap().texture_id(), Some(chrome_id));

        // The old texture waits in the queue; the cache still owns it
        assert_eq!(scene.assets().retirement().len(), 1);
        assert!(scene.assets().factory().destroyed().is_empty());

        assert!(!scene.update_material_from_data("materials/unknown.mat.ron", MaterialData::default()));
    }

    #[test]
    fn test_reload_texture_repoints_sprites() {
        let mut scene = scene();
        let mut backend = backend_for(&scene);
        let sprite = scene.create_sprite(Vec3::zeros(), None).unwrap();
        scene.prepare_frame(&mut backend).unwrap();

        let texture_of = |scene: &Scene<_>| match scene.object(sprite).unwrap().kind() {
            ObjectKind::Sprite(s) => s.texture.as_ref().map(|t| t.id()),
            _ => None,
        };
        let before = texture_of(&scene);

        assert!(scene.reload_texture(SPRITE));
        let after = texture_of(&scene);
        assert!(after.is_some());
        assert_ne!(before, after);

        scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(scene.bindings().stats().updates, 1);
        assert_eq!(scene.assets().retirement().len(), 1);

        assert!(!scene.reload_texture("textures/none.png"));
        assert_eq!(texture_of(&scene), after);
    }

    #[test]
    fn test_retired_textures_are_destroyed_in_order() {
        let mut scene = Scene::headless(config().with_retirement_capacity(2), factory()).unwrap();
        scene.create_sprite(Vec3::zeros(), None).unwrap();

        for _ in 0..4 {
            assert!(scene.reload_texture(SPRITE));
        }

        let assets = scene.assets();
        assert_eq!(assets.retirement().len(), 2);
        assert_eq!(assets.retirement().evicted_total(), 2);
        assert_eq!(assets.factory().destroyed(), [SPRITE.to_string(), SPRITE.to_string()]);
        assert_eq!(assets.factory().live_textures(), 3);
    }
}
