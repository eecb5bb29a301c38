//! Object creation, destruction and kind-specific edits

use std::collections::HashSet;

use super::{backend_for, config, factory, scene, TANK};
use crate::foundation::math::{Transform, Vec3};
use crate::scene::{ObjectId, Scene, SceneError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_ids_stay_unique_across_reuse() {
        let mut scene = scene();
        let ids: Vec<ObjectId> = (0..4)
            .map(|i| scene.create_point_light(Vec3::new(i as f32, 0.0, 0.0)).unwrap())
            .collect();
        assert_eq!(ids, [ObjectId(0), ObjectId(1), ObjectId(2), ObjectId(3)]);

        assert!(scene.destroy(ObjectId(1)));
        assert!(!scene.destroy(ObjectId(1)));
        assert_eq!(scene.create_camera(Vec3::zeros()).unwrap(), ObjectId(1));
        assert_eq!(scene.create_camera(Vec3::zeros()).unwrap(), ObjectId(4));

        let live = scene.objects().ids();
        let unique: HashSet<_> = live.iter().collect();
        assert_eq!(live.len(), 5);
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn test_stale_handle_does_not_alias_new_object() {
        let mut scene = scene();
        let old = scene.create_point_light(Vec3::zeros()).unwrap();
        let handle = scene.handle(old).unwrap();
        assert_eq!(scene.resolve(handle).unwrap().name(), "PointLight_0");

        scene.destroy(old);
        let new = scene.create_sprite(Vec3::zeros(), None).unwrap();
        assert_eq!(new, old);

        assert!(scene.resolve(handle).is_none());
        let fresh = scene.handle(new).unwrap();
        assert_eq!(scene.resolve(fresh).unwrap().name(), "Sprite_0");
    }

    #[test]
    fn test_capacity_exceeded_is_fatal() {
        let mut scene = Scene::headless(config().with_max_objects(2), factory()).unwrap();
        scene.create_point_light(Vec3::zeros()).unwrap();
        scene.create_point_light(Vec3::zeros()).unwrap();

        let err = scene.create_point_light(Vec3::zeros()).unwrap_err();
        assert!(matches!(err, SceneError::CapacityExceeded { capacity: 2 }));
        assert!(err.is_fatal());
        assert_eq!(scene.objects().len(), 2);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = Scene::headless(config().with_frames_in_flight(0), factory());
        assert!(matches!(result, Err(SceneError::Config(_))));
    }

    #[test]
    fn test_missing_mesh_still_creates_object() {
        let mut scene = scene();
        let mut backend = backend_for(&scene);
        let id = scene.create_mesh(Vec3::zeros(), Some("meshes/missing.mesh.ron")).unwrap();

        let mesh = scene.object(id).unwrap().mesh().unwrap();
        assert!(mesh.mesh.is_none());
        assert_eq!(mesh.mesh_path.as_deref(), Some("meshes/missing.mesh.ron"));
        assert_eq!(scene.assets().stats().failures, 1);

        let stats = scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(stats.objects_written, 1);
        assert_eq!(stats.draws, 0);
    }

    #[test]
    fn test_transform_setters_mark_dirty() {
        let mut scene = scene();
        let mut backend = backend_for(&scene);
        let id = scene.create_point_light(Vec3::zeros()).unwrap();
        scene.prepare_frame(&mut backend).unwrap();
        assert!(!scene.object(id).unwrap().is_dirty());

        scene.set_rotation(id, Vec3::new(0.0, 1.0, 0.0)).unwrap();
        assert!(scene.object(id).unwrap().is_dirty());
        scene.prepare_frame(&mut backend).unwrap();

        scene.set_scale(id, Vec3::new(2.0, 2.0, 2.0)).unwrap();
        assert!(scene.object(id).unwrap().is_dirty());

        // Renaming does not touch GPU state
        scene.prepare_frame(&mut backend).unwrap();
        scene.set_name(id, "Key light").unwrap();
        assert!(!scene.object(id).unwrap().is_dirty());
        assert_eq!(scene.object(id).unwrap().name(), "Key light");

        assert!(matches!(
            scene.set_position(ObjectId(7), Vec3::zeros()),
            Err(SceneError::ObjectNotFound(ObjectId(7)))
        ));
    }

    #[test]
    fn test_single_active_camera() {
        let mut scene = scene();
        let first = scene.create_camera(Vec3::zeros()).unwrap();
        let second = scene.create_camera(Vec3::new(0.0, 0.0, 5.0)).unwrap();
        assert_eq!(scene.active_camera(), Some(first));

        scene.set_active_camera(second).unwrap();
        assert_eq!(scene.active_camera(), Some(second));
        assert!(!scene.object(first).unwrap().camera().unwrap().active);

        let light = scene.create_point_light(Vec3::zeros()).unwrap();
        let err = scene.set_active_camera(light).unwrap_err();
        assert!(matches!(err, SceneError::WrongKind { expected: "camera", .. }));
        assert!(!err.is_fatal());
        assert_eq!(scene.active_camera(), Some(second));

        scene.destroy(second);
        assert_eq!(scene.active_camera(), None);
    }

    #[test]
    fn test_node_override_validation() {
        let mut scene = scene();
        let tank = scene.create_mesh(Vec3::zeros(), Some(TANK)).unwrap();
        let light = scene.create_point_light(Vec3::zeros()).unwrap();

        let err = scene.set_node_override(tank, 5, Transform::identity(), true).unwrap_err();
        assert!(matches!(err, SceneError::NodeOutOfRange { node: 5, count: 2, .. }));

        let err = scene.set_node_override(light, 0, Transform::identity(), true).unwrap_err();
        assert!(matches!(err, SceneError::WrongKind { expected: "mesh", actual: "point light", .. }));

        scene.set_node_override(tank, 0, Transform::identity(), false).unwrap();
        assert_eq!(scene.object(tank).unwrap().mesh().unwrap().overrides().len(), 2);

        scene.clear_node_overrides(tank).unwrap();
        assert!(scene.object(tank).unwrap().mesh().unwrap().overrides().is_empty());
    }

    #[test]
    fn test_node_override_edits_mark_dirty() {
        let mut scene = scene();
        let mut backend = backend_for(&scene);
        let tank = scene.create_mesh(Vec3::zeros(), Some(TANK)).unwrap();
        scene.prepare_frame(&mut backend).unwrap();
        assert!(!scene.object(tank).unwrap().is_dirty());

        let turret = Transform::from_position(Vec3::new(0.0, 2.0, 0.0));
        scene.set_node_override(tank, 1, turret, true).unwrap();
        assert!(scene.object(tank).unwrap().is_dirty());
        assert_eq!(scene.prepare_frame(&mut backend).unwrap().hierarchies_refreshed, 1);
        assert!(!scene.object(tank).unwrap().is_dirty());

        scene.clear_node_overrides(tank).unwrap();
        assert!(scene.object(tank).unwrap().is_dirty());
        scene.prepare_frame(&mut backend).unwrap();

        scene.begin_override_edit(tank).unwrap();
        scene.end_override_edit(tank).unwrap();
        assert!(scene.object(tank).unwrap().is_dirty());
    }

    #[test]
    fn test_override_edit_refreshes_every_frame() {
        let mut scene = scene();
        let mut backend = backend_for(&scene);
        let tank = scene.create_mesh(Vec3::zeros(), Some(TANK)).unwrap();
        scene.prepare_frame(&mut backend).unwrap();

        scene.begin_override_edit(tank).unwrap();
        for _ in 0..3 {
            let stats = scene.prepare_frame(&mut backend).unwrap();
            assert_eq!(stats.hierarchies_refreshed, 1);
        }

        scene.end_override_edit(tank).unwrap();
        assert_eq!(scene.prepare_frame(&mut backend).unwrap().hierarchies_refreshed, 1);
        assert_eq!(scene.prepare_frame(&mut backend).unwrap().hierarchies_refreshed, 0);
    }
}
