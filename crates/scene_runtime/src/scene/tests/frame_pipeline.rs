//! Per-frame pipeline: dirty propagation, hierarchy refresh, bindings, draws

use approx::assert_relative_eq;

use super::{backend_for, config, factory, params, scene, RUST, TANK};
use crate::foundation::math::{Mat4, Transform, Vec3};
use crate::render::{BindingOwner, HeadlessBackend, HostReplicaMemory, ObjectParams};
use crate::scene::{Scene, SceneError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moved_object_is_visible_in_every_replica() {
        let mut scene = scene();
        let mut backend = backend_for(&scene);
        let a = scene.create_mesh(Vec3::zeros(), None).unwrap();

        let stats = scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(stats.objects_written, 1);
        assert!(stats.flushed);
        for replica in 0..2 {
            assert_eq!(params(&scene, replica, a).model[3], [0.0, 0.0, 0.0, 1.0]);
        }

        backend.advance_frame();
        scene.set_position(a, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        let stats = scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(stats.objects_written, 1);
        // Replica 0 is not the one being recorded, it still sees the move
        for replica in 0..2 {
            assert_eq!(params(&scene, replica, a).model[3], [1.0, 2.0, 3.0, 1.0]);
        }

        let writes = scene.store().stats().writes;
        let flushes = scene.store().stats().flushes;
        let stats = scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(stats.objects_written, 0);
        assert!(!stats.flushed);
        assert_eq!(scene.store().stats().writes, writes);
        assert_eq!(scene.store().stats().flushes, flushes);
    }

    #[test]
    fn test_steady_scene_reuses_bindings() {
        let mut scene = scene();
        let mut backend = backend_for(&scene);
        scene.create_mesh(Vec3::zeros(), None).unwrap();
        scene.create_sprite(Vec3::new(2.0, 0.0, 0.0), None).unwrap();

        let stats = scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(stats.draws, 2);
        assert_eq!(backend.pool().allocations(), 2);

        backend.advance_frame();
        scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(backend.pool().allocations(), 4);

        backend.advance_frame();
        let hits = scene.bindings().stats().hits;
        scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(backend.pool().allocations(), 4);
        assert_eq!(backend.pool().updates(), 0);
        assert_eq!(scene.bindings().stats().hits, hits + 2);
    }

    #[test]
    fn test_material_change_rebuilds_only_that_binding() {
        let mut scene = scene();
        let mut backend = backend_for(&scene);
        let a = scene.create_mesh(Vec3::zeros(), None).unwrap();
        let b = scene.create_mesh(Vec3::new(3.0, 0.0, 0.0), None).unwrap();
        scene.prepare_frame(&mut backend).unwrap();

        let handle_a = scene.bindings().peek(BindingOwner::Object(a), 0).unwrap();
        let handle_b = scene.bindings().peek(BindingOwner::Object(b), 0).unwrap();

        assert!(scene.apply_material(a, RUST).unwrap());
        let stats = scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(stats.objects_written, 1);

        let bindings = scene.bindings().stats();
        assert_eq!(bindings.updates, 1);
        assert_eq!(bindings.allocations, 2);
        assert_eq!(scene.bindings().peek(BindingOwner::Object(a), 0), Some(handle_a));
        assert_eq!(scene.bindings().peek(BindingOwner::Object(b), 0), Some(handle_b));

        let rust = scene.assets_mut().load_texture("textures/rust.png").unwrap();
        let bound = backend.pool().describe(handle_a).unwrap();
        assert_eq!(bound.texture_id(), Some(rust.id()));

        for replica in 0..2 {
            assert_eq!(params(&scene, replica, a).color, [0.5, 0.25, 0.1, 1.0]);
            assert_eq!(params(&scene, replica, b).color, [1.0, 1.0, 1.0, 1.0]);
        }
    }

    #[test]
    fn test_multi_part_mesh_draws_each_part() {
        let mut scene = scene();
        let mut backend = backend_for(&scene);
        let tank = scene.create_mesh(Vec3::zeros(), Some(TANK)).unwrap();

        let stats = scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(stats.draws, 2);
        assert_eq!(stats.hierarchies_refreshed, 1);

        let draws = backend.take_draws();
        assert_eq!(draws[0].part, Some(0));
        assert_eq!(draws[1].part, Some(1));
        assert_eq!(draws[1].first_index, 36);
        assert_relative_eq!(draws[1].world, Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0)));
        assert_ne!(
            scene.bindings().peek(BindingOwner::SubMesh(tank, 0), 0),
            scene.bindings().peek(BindingOwner::SubMesh(tank, 1), 0)
        );

        scene
            .set_node_override(tank, 1, Transform::from_position(Vec3::new(1.0, 0.0, 0.0)), true)
            .unwrap();
        let stats = scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(stats.hierarchies_refreshed, 1);

        let draws = backend.take_draws();
        assert_relative_eq!(draws[0].world, Mat4::identity());
        assert_relative_eq!(draws[1].world, Mat4::new_translation(&Vec3::new(1.0, 1.0, 0.0)));

        let stats = scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(stats.hierarchies_refreshed, 0);
    }

    #[test]
    fn test_surface_recreation_resets_bindings_once() {
        let mut scene = scene();
        let mut backend = backend_for(&scene);
        scene.create_mesh(Vec3::zeros(), None).unwrap();
        scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(backend.pool().allocations(), 1);

        backend.signal_surface_recreated();
        let stats = scene.prepare_frame(&mut backend).unwrap();
        assert!(stats.bindings_reset);
        assert_eq!(backend.pool().resets(), 1);
        assert_eq!(backend.pool().allocations(), 2);
        assert_eq!(scene.bindings().stats().resets, 1);

        let stats = scene.prepare_frame(&mut backend).unwrap();
        assert!(!stats.bindings_reset);
        assert_eq!(backend.pool().allocations(), 2);
    }

    #[test]
    fn test_destroyed_object_bindings_are_recycled() {
        let mut scene = scene();
        let mut backend = backend_for(&scene);
        let a = scene.create_mesh(Vec3::zeros(), None).unwrap();
        scene.prepare_frame(&mut backend).unwrap();
        let handle = scene.bindings().peek(BindingOwner::Object(a), 0).unwrap();

        assert!(scene.destroy(a));
        assert_eq!(scene.bindings().spare_count(), 1);

        let sprite = scene.create_sprite(Vec3::zeros(), None).unwrap();
        assert_eq!(sprite, a);
        scene.prepare_frame(&mut backend).unwrap();

        assert_eq!(scene.bindings().stats().recycled, 1);
        assert_eq!(backend.pool().allocations(), 1);
        assert_eq!(scene.bindings().peek(BindingOwner::Object(sprite), 0), Some(handle));
    }

    #[test]
    fn test_lights_and_cameras_upload_but_do_not_draw() {
        let mut scene = scene();
        let mut backend = backend_for(&scene);
        let light = scene.create_point_light(Vec3::new(0.0, 5.0, 0.0)).unwrap();
        scene.create_camera(Vec3::new(0.0, 0.0, 10.0)).unwrap();

        let stats = scene.prepare_frame(&mut backend).unwrap();
        assert_eq!(stats.objects_written, 2);
        assert_eq!(stats.draws, 0);

        let block = params(&scene, 1, light);
        assert_eq!(block.color, [1.0, 1.0, 1.0, 10.0]);
        assert_eq!(block.flags[0], 3);
    }

    #[test]
    fn test_frame_count_mismatch_is_fatal() {
        let mut scene = scene();
        let mut backend = HeadlessBackend::new(3, 64);

        let err = scene.prepare_frame(&mut backend).unwrap_err();
        assert!(matches!(err, SceneError::FrameMismatch { backend: 3, scene: 2 }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_pool_exhaustion_is_fatal() {
        let mut scene = scene();
        let mut backend = HeadlessBackend::new(2, 1);
        scene.create_mesh(Vec3::zeros(), None).unwrap();
        scene.create_mesh(Vec3::zeros(), None).unwrap();

        let err = scene.prepare_frame(&mut backend).unwrap_err();
        assert!(matches!(err, SceneError::Render(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_bindings_cover_each_objects_parameter_block() {
        let config = config();
        let memory = HostReplicaMemory::new(config.frames_in_flight, config.max_objects * 256).with_alignment(256);
        let mut scene = Scene::new(config, factory(), Box::new(memory)).unwrap();
        let mut backend = backend_for(&scene);
        let a = scene.create_mesh(Vec3::zeros(), None).unwrap();
        let b = scene.create_mesh(Vec3::new(3.0, 0.0, 0.0), None).unwrap();
        scene.prepare_frame(&mut backend).unwrap();

        assert_eq!(scene.store().stride(), 256);
        for id in [a, b] {
            let handle = scene.bindings().peek(BindingOwner::Object(id), 0).unwrap();
            let desc = backend.pool().describe(handle).unwrap();
            assert_eq!(desc.param_offset, scene.store().offset_of(id) as u64);
            assert_eq!(desc.param_offset % 256, 0);
            assert_eq!(desc.param_size, ObjectParams::SIZE as u64);
        }
        assert_relative_eq!(params(&scene, 0, b).model[3][0], 3.0);
    }
}
