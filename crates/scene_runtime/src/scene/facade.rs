//! Scene facade
//!
//! The single entry point for gameplay and editor code. Every mutation goes
//! through here so the object table, the asset cache and the binding cache
//! stay consistent with each other.

use std::sync::Arc;

use crate::assets::{AssetCache, AssetFactory, AssetRegistry, MaterialAsset, MaterialData, TextureAsset};
use crate::config::RuntimeConfig;
use crate::foundation::math::{Transform, Vec3};
use crate::render::frame::{record_object_draws, ParamLayout};
use crate::render::{
    BindingCache, FrameReplicatedStore, FrameStats, HostReplicaMemory, ObjectParams,
    RenderBackend, ReplicaMemory,
};

use super::dirty::propagate_dirty;
use super::object::{
    CameraComponent, MeshComponent, ObjectHandle, ObjectId, ObjectKind, ObjectRecord,
    ObjectTransform, PointLightComponent, SpriteComponent,
};
use super::object_table::ObjectTable;
use super::persistence::{KindDescription, ObjectDescription, SceneDescription, SCENE_FORMAT_VERSION};
use super::SceneError;

/// A live scene
///
/// Objects are declared before assets so that, on drop, objects release
/// their asset references before the cache tears down.
pub struct Scene<F: AssetFactory> {
    objects: ObjectTable,
    store: FrameReplicatedStore,
    bindings: BindingCache,
    assets: AssetCache<F>,
    config: RuntimeConfig,
}

impl<F: AssetFactory> Scene<F> {
    /// Create a scene over explicit replica memory
    pub fn new(
        config: RuntimeConfig,
        factory: F,
        memory: Box<dyn ReplicaMemory>,
    ) -> Result<Self, SceneError> {
        config.validate()?;

        let store = FrameReplicatedStore::new(
            config.max_objects,
            ObjectParams::SIZE,
            config.frames_in_flight,
            memory,
        )?;

        log::info!(
            "Scene created: {} objects max, {} frames in flight",
            config.max_objects,
            config.frames_in_flight
        );

        Ok(Self {
            objects: ObjectTable::new(config.max_objects),
            store,
            bindings: BindingCache::new(config.frames_in_flight),
            assets: AssetCache::new(factory, config.retirement_capacity),
            config,
        })
    }

    /// Create a scene backed by host memory
    pub fn headless(config: RuntimeConfig, factory: F) -> Result<Self, SceneError> {
        let memory = HostReplicaMemory::new(
            config.frames_in_flight,
            config.max_objects * ObjectParams::SIZE,
        );
        Self::new(config, factory, Box::new(memory))
    }

    /// Use a guid registry for asset path resolution
    pub fn with_registry(mut self, registry: AssetRegistry) -> Self {
        *self.assets.registry_mut() = registry;
        self
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Object table
    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    /// One object
    pub fn object(&self, id: ObjectId) -> Option<&ObjectRecord> {
        self.objects.get(id)
    }

    /// One object, mutably
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut ObjectRecord> {
        self.objects.get_mut(id)
    }

    /// Generation-checked handle for a live object
    pub fn handle(&self, id: ObjectId) -> Option<ObjectHandle> {
        self.objects.handle(id)
    }

    /// Object behind a handle, if it still exists
    pub fn resolve(&self, handle: ObjectHandle) -> Option<&ObjectRecord> {
        self.objects.resolve(handle)
    }

    /// Asset cache
    pub fn assets(&self) -> &AssetCache<F> {
        &self.assets
    }

    /// Asset cache, mutably
    pub fn assets_mut(&mut self) -> &mut AssetCache<F> {
        &mut self.assets
    }

    /// Parameter store
    pub fn store(&self) -> &FrameReplicatedStore {
        &self.store
    }

    /// Binding cache
    pub fn bindings(&self) -> &BindingCache {
        &self.bindings
    }

    /// Create a mesh object, using the configured default mesh if `path` is `None`
    ///
    /// A mesh that fails to load leaves the object without geometry.
    pub fn create_mesh(&mut self, position: Vec3, path: Option<&str>) -> Result<ObjectId, SceneError> {
        let path = path.map_or_else(|| self.config.default_mesh_path.clone(), str::to_string);
        let mesh = self.assets.load_model(&path);
        let component = MeshComponent::new(mesh, Some(path));
        self.spawn("Mesh", position, ObjectKind::Mesh(component))
    }

    /// Create a sprite, using the configured default texture if `path` is `None`
    pub fn create_sprite(&mut self, position: Vec3, path: Option<&str>) -> Result<ObjectId, SceneError> {
        let path = path.map_or_else(|| self.config.default_sprite_path.clone(), str::to_string);
        let texture = self.assets.load_texture(&path);
        let component = SpriteComponent {
            texture,
            path: Some(path),
            ..Default::default()
        };
        self.spawn("Sprite", position, ObjectKind::Sprite(component))
    }

    /// Create a point light
    pub fn create_point_light(&mut self, position: Vec3) -> Result<ObjectId, SceneError> {
        self.spawn(
            "PointLight",
            position,
            ObjectKind::PointLight(PointLightComponent::default()),
        )
    }

    /// Create a camera; the first camera in a scene becomes active
    pub fn create_camera(&mut self, position: Vec3) -> Result<ObjectId, SceneError> {
        let active = self.active_camera().is_none();
        let camera = CameraComponent {
            active,
            ..Default::default()
        };
        self.spawn("Camera", position, ObjectKind::Camera(camera))
    }

    /// Destroy an object
    ///
    /// Its cached bindings are discarded; nothing is torn down on the GPU.
    pub fn destroy(&mut self, id: ObjectId) -> bool {
        if !self.objects.destroy(id) {
            return false;
        }
        self.bindings.discard_object(id);
        log::debug!("Destroyed object {}", id);
        true
    }

    /// Rename an object
    pub fn set_name(&mut self, id: ObjectId, name: impl Into<String>) -> Result<(), SceneError> {
        self.record_mut(id)?.set_name(name);
        Ok(())
    }

    /// Move an object
    pub fn set_position(&mut self, id: ObjectId, position: Vec3) -> Result<(), SceneError> {
        self.record_mut(id)?.set_position(position);
        Ok(())
    }

    /// Rotate an object (Euler radians)
    pub fn set_rotation(&mut self, id: ObjectId, rotation: Vec3) -> Result<(), SceneError> {
        self.record_mut(id)?.set_rotation(rotation);
        Ok(())
    }

    /// Scale an object
    pub fn set_scale(&mut self, id: ObjectId, scale: Vec3) -> Result<(), SceneError> {
        self.record_mut(id)?.set_scale(scale);
        Ok(())
    }

    /// Replace an object's transform
    pub fn set_transform(&mut self, id: ObjectId, transform: ObjectTransform) -> Result<(), SceneError> {
        self.record_mut(id)?.set_transform(transform);
        Ok(())
    }

    /// Make a camera the only active one
    pub fn set_active_camera(&mut self, id: ObjectId) -> Result<(), SceneError> {
        let record = self.record(id)?;
        if record.camera().is_none() {
            return Err(wrong_kind(id, "camera", record.kind()));
        }

        for (other, record) in self.objects.iter_mut() {
            if let Some(camera) = record.camera_mut() {
                camera.active = other == id;
            }
        }
        Ok(())
    }

    /// The active camera, if any
    pub fn active_camera(&self) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|(_, record)| record.camera().is_some_and(|c| c.active))
            .map(|(id, _)| id)
    }

    /// Bind a material to a mesh object
    ///
    /// Returns whether the object ends up textured, from either the material
    /// or the mesh. A material that fails to load leaves the mesh's own
    /// textures in charge.
    pub fn apply_material(&mut self, id: ObjectId, path: &str) -> Result<bool, SceneError> {
        self.mesh_mut(id)?;
        let material = self.assets.load_material(path);

        let record = self.record_mut(id)?;
        let Some(component) = record.mesh_mut() else {
            return Err(SceneError::ObjectNotFound(id));
        };
        component.material = material;
        component.material_path = Some(path.to_string());
        let textured = component.recompute_texturing();
        record.mark_dirty();

        log::debug!("Applied material '{}' to {} (textured: {})", path, id, textured);
        Ok(textured)
    }

    /// Override one node of a mesh object
    pub fn set_node_override(
        &mut self,
        id: ObjectId,
        node: usize,
        transform: Transform,
        enabled: bool,
    ) -> Result<(), SceneError> {
        let component = self.mesh_mut(id)?;
        if !component.set_override(node, transform, enabled) {
            return Err(SceneError::NodeOutOfRange {
                id,
                node,
                count: component.node_count(),
            });
        }
        self.record_mut(id)?.mark_dirty();
        Ok(())
    }

    /// Drop every node override of a mesh object
    pub fn clear_node_overrides(&mut self, id: ObjectId) -> Result<(), SceneError> {
        self.mesh_mut(id)?.clear_overrides();
        self.record_mut(id)?.mark_dirty();
        Ok(())
    }

    /// Start an interactive override edit
    pub fn begin_override_edit(&mut self, id: ObjectId) -> Result<(), SceneError> {
        self.mesh_mut(id)?.begin_override_edit();
        Ok(())
    }

    /// Finish an interactive override edit
    pub fn end_override_edit(&mut self, id: ObjectId) -> Result<(), SceneError> {
        self.mesh_mut(id)?.end_override_edit();
        self.record_mut(id)?.mark_dirty();
        Ok(())
    }

    /// Update a cached material in place and refresh the objects using it
    pub fn update_material_from_data(&mut self, path: &str, data: MaterialData) -> bool {
        if !self.assets.update_material_from_data(path, data) {
            return false;
        }

        let key = self.assets.resolve_path(path);
        for (_, record) in self.objects.iter_mut() {
            let uses_material = record
                .mesh()
                .and_then(|m| m.material.as_ref())
                .is_some_and(|m| m.path() == key);
            if uses_material {
                if let Some(component) = record.mesh_mut() {
                    component.recompute_texturing();
                }
                record.mark_dirty();
            }
        }
        true
    }

    /// Reload a texture and repoint sprites that use it
    pub fn reload_texture(&mut self, path: &str) -> bool {
        let Some(texture) = self.assets.reload_texture(path) else {
            return false;
        };

        let key = self.assets.resolve_path(path);
        for (_, record) in self.objects.iter_mut() {
            if let ObjectKind::Sprite(sprite) = record.kind_mut() {
                if sprite.texture.as_ref().is_some_and(|t| t.path() == key) {
                    sprite.texture = Some(Arc::clone(&texture));
                }
            }
        }
        true
    }

    /// Serializable description of every live object
    pub fn export_scene(&self) -> SceneDescription {
        let objects = self
            .objects
            .iter()
            .map(|(id, record)| ObjectDescription {
                id,
                name: record.name().to_string(),
                transform: *record.transform(),
                kind: self.describe_kind(record.kind()),
                node_overrides: record
                    .mesh()
                    .map(|m| m.overrides().to_vec())
                    .unwrap_or_default(),
            })
            .collect();

        SceneDescription {
            version: SCENE_FORMAT_VERSION,
            objects,
        }
    }

    /// Replace the live object set with a description
    ///
    /// Everything except `protect` is cleared first; each described object
    /// is recreated under its recorded id. A description entry with the
    /// protected id is skipped so the protected object survives untouched.
    /// Returns the number of objects imported.
    pub fn import_scene(
        &mut self,
        description: &SceneDescription,
        protect: Option<ObjectId>,
    ) -> Result<usize, SceneError> {
        for id in self.objects.clear_all_except(protect) {
            self.bindings.discard_object(id);
        }

        let mut imported = 0;
        for object in &description.objects {
            if Some(object.id) == protect {
                log::debug!("Skipping protected object {} in scene import", object.id);
                continue;
            }

            let record = self.build_record(object);
            *self.objects.create_with_id(object.id)? = record;
            self.bindings.discard_object(object.id);
            imported += 1;
        }

        self.enforce_single_active_camera();
        log::info!(
            "Imported scene: {} objects ({} live)",
            imported,
            self.objects.len()
        );
        Ok(imported)
    }

    /// Export to a RON file
    pub fn save_scene(&self, path: &str) -> Result<(), SceneError> {
        self.export_scene().save(path)?;
        log::info!("Saved scene to {}", path);
        Ok(())
    }

    /// Import from a RON file
    pub fn load_scene(&mut self, path: &str, protect: Option<ObjectId>) -> Result<usize, SceneError> {
        let description = SceneDescription::load(path)?;
        self.import_scene(&description, protect)
    }

    /// Load the guid registry from the configured path
    ///
    /// A missing file is not an error; the scene keeps its current registry.
    pub fn load_registry(&mut self) -> Result<usize, SceneError> {
        let path = self.config.asset_registry_path.clone();
        if !std::path::Path::new(&path).exists() {
            log::debug!("No asset registry at {}", path);
            return Ok(0);
        }
        let registry = AssetRegistry::load(&path)?;
        let entries = registry.len();
        *self.assets.registry_mut() = registry;
        Ok(entries)
    }

    /// Save the guid registry to the configured path
    pub fn save_registry(&self) -> Result<(), SceneError> {
        self.assets.registry().save(&self.config.asset_registry_path)?;
        Ok(())
    }

    /// Create a blank material at the configured default path and persist it
    pub fn create_default_material(&mut self) -> Arc<MaterialAsset> {
        let path = self.config.default_material_path.clone();
        let material = self.assets.create_material(&path);
        self.assets.save_material(&path, &material.data());
        material
    }

    /// Prepare one frame against the backend's current replica
    ///
    /// Order: binding reset on a recreated surface, dirty propagation, node
    /// hierarchy refresh, then bindings and draws for every object.
    pub fn prepare_frame<B: RenderBackend>(&mut self, backend: &mut B) -> Result<FrameStats, SceneError> {
        let frames = backend.frames_in_flight();
        if frames != self.store.frames_in_flight() {
            return Err(SceneError::FrameMismatch {
                backend: frames,
                scene: self.store.frames_in_flight(),
            });
        }

        let mut stats = FrameStats {
            replica: backend.current_frame(),
            ..Default::default()
        };

        if backend.take_surface_recreated() {
            self.bindings.reset(backend.binding_pool())?;
            stats.bindings_reset = true;
        }

        let propagation = propagate_dirty(&mut self.objects, &mut self.store)?;
        stats.objects_written = propagation.written;
        stats.flushed = propagation.flushed;

        for (_, record) in self.objects.iter_mut() {
            if let Some(component) = record.mesh_mut() {
                if component.refresh_globals() {
                    stats.hierarchies_refreshed += 1;
                }
            }
        }

        for (id, record) in self.objects.iter() {
            let layout = ParamLayout {
                offset: self.store.offset_of(id) as u64,
                size: ObjectParams::SIZE as u64,
            };
            stats.draws += record_object_draws(id, record, layout, &mut self.bindings, &mut *backend)?;
        }

        Ok(stats)
    }

    fn spawn(&mut self, label: &str, position: Vec3, kind: ObjectKind) -> Result<ObjectId, SceneError> {
        let record = ObjectRecord::new(label, kind).with_transform(ObjectTransform::at(position));
        let id = self.objects.insert(record)?;
        self.record_mut(id)?.set_name(format!("{}_{}", label, id.0));
        log::debug!("Created {} {} at {:?}", label, id, position);
        Ok(id)
    }

    fn record(&self, id: ObjectId) -> Result<&ObjectRecord, SceneError> {
        self.objects.get(id).ok_or(SceneError::ObjectNotFound(id))
    }

    fn record_mut(&mut self, id: ObjectId) -> Result<&mut ObjectRecord, SceneError> {
        self.objects.get_mut(id).ok_or(SceneError::ObjectNotFound(id))
    }

    fn mesh_mut(&mut self, id: ObjectId) -> Result<&mut MeshComponent, SceneError> {
        let record = self.record_mut(id)?;
        let actual = record.kind().name();
        record.mesh_mut().ok_or(SceneError::WrongKind {
            id,
            expected: "mesh",
            actual,
        })
    }

    fn describe_kind(&self, kind: &ObjectKind) -> KindDescription {
        let reference = |path: &Option<String>| path.as_deref().map(|p| self.assets.reference_for(p));
        match kind {
            ObjectKind::Empty => KindDescription::Empty,
            ObjectKind::Mesh(mesh) => KindDescription::Mesh {
                mesh: reference(&mesh.mesh_path),
                material: reference(&mesh.material_path),
            },
            ObjectKind::Sprite(sprite) => KindDescription::Sprite {
                texture: reference(&sprite.path),
                size: sprite.size,
            },
            ObjectKind::PointLight(light) => KindDescription::PointLight(*light),
            ObjectKind::Camera(camera) => KindDescription::Camera(*camera),
        }
    }

    fn build_record(&mut self, object: &ObjectDescription) -> ObjectRecord {
        let kind = match &object.kind {
            KindDescription::Empty => ObjectKind::Empty,
            KindDescription::Mesh { mesh, material } => {
                let loaded = mesh.as_deref().and_then(|p| self.assets.load_model(p));
                let mut component = MeshComponent::new(loaded, mesh.clone());
                if let Some(path) = material {
                    component.material = self.assets.load_material(path);
                    component.material_path = Some(path.clone());
                    component.recompute_texturing();
                }
                component.set_overrides(object.node_overrides.clone());
                ObjectKind::Mesh(component)
            }
            KindDescription::Sprite { texture, size } => {
                let loaded: Option<Arc<TextureAsset>> =
                    texture.as_deref().and_then(|p| self.assets.load_texture(p));
                ObjectKind::Sprite(SpriteComponent {
                    texture: loaded,
                    path: texture.clone(),
                    size: *size,
                })
            }
            KindDescription::PointLight(light) => ObjectKind::PointLight(*light),
            KindDescription::Camera(camera) => ObjectKind::Camera(*camera),
        };

        ObjectRecord::new(object.name.clone(), kind).with_transform(object.transform)
    }

    fn enforce_single_active_camera(&mut self) {
        let mut seen = false;
        for (id, record) in self.objects.iter_mut() {
            if let Some(camera) = record.camera_mut() {
                if camera.active && seen {
                    log::debug!("Deactivating extra active camera {}", id);
                    camera.active = false;
                }
                seen |= camera.active;
            }
        }
    }
}

fn wrong_kind(id: ObjectId, expected: &'static str, kind: &ObjectKind) -> SceneError {
    SceneError::WrongKind {
        id,
        expected,
        actual: kind.name(),
    }
}
