//! Scene object records
//!
//! An [`ObjectRecord`] is what the object table stores per live id: a name,
//! a transform with its composed matrix, the dirty flag the propagation pass
//! consumes, and exactly one [`ObjectKind`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::assets::{MaterialAsset, MeshAsset, MeshId, TextureAsset};
use crate::foundation::math::{Mat4, Transform, Vec2, Vec3};

use super::hierarchy::{compute_globals, NodeOverride};

/// Identity of a live scene object
///
/// Unique among live objects; reused after destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Slot index in tables and replica memory
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Generation-checked reference to an object
///
/// Survives id reuse: once the object is destroyed the handle no longer
/// resolves, even if a new object takes the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    /// Object id
    pub id: ObjectId,
    /// Slot generation at the time the handle was taken
    pub generation: u32,
}

/// Position, Euler rotation (radians) and scale of an object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectTransform {
    /// Translation
    pub position: Vec3,
    /// Euler angles in radians (roll, pitch, yaw)
    pub rotation: Vec3,
    /// Per-axis scale
    pub scale: Vec3,
}

impl Default for ObjectTransform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl ObjectTransform {
    /// Transform at a position
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Composed model matrix
    pub fn to_matrix(&self) -> Mat4 {
        Transform::from_euler(self.position, self.rotation, self.scale).to_matrix()
    }
}

/// Mesh-backed object state
#[derive(Debug, Clone, Default)]
pub struct MeshComponent {
    /// Bound mesh, `None` if loading failed
    pub mesh: Option<Arc<MeshAsset>>,
    /// Path the mesh was requested from
    pub mesh_path: Option<String>,
    /// Override material, `None` to use the mesh's own textures
    pub material: Option<Arc<MaterialAsset>>,
    /// Path the material was requested from
    pub material_path: Option<String>,
    node_overrides: Vec<NodeOverride>,
    node_globals: Vec<Mat4>,
    globals_mesh: Option<MeshId>,
    hierarchy_dirty: bool,
    editing_overrides: bool,
    texturing_enabled: bool,
}

impl MeshComponent {
    /// Create a component bound to a mesh
    pub fn new(mesh: Option<Arc<MeshAsset>>, mesh_path: Option<String>) -> Self {
        let mut component = Self {
            mesh,
            mesh_path,
            hierarchy_dirty: true,
            ..Default::default()
        };
        component.recompute_texturing();
        component
    }

    /// Rebind the mesh
    pub(crate) fn set_mesh(&mut self, mesh: Option<Arc<MeshAsset>>, mesh_path: Option<String>) {
        self.mesh = mesh;
        self.mesh_path = mesh_path;
        self.hierarchy_dirty = true;
        self.fit_overrides();
        self.recompute_texturing();
    }

    /// Node count of the bound mesh
    pub fn node_count(&self) -> usize {
        self.mesh.as_ref().map_or(0, |m| m.node_count())
    }

    /// Per-node overrides, empty or one per node
    pub fn overrides(&self) -> &[NodeOverride] {
        &self.node_overrides
    }

    /// Replace the override list, repairing its shape
    pub(crate) fn set_overrides(&mut self, overrides: Vec<NodeOverride>) {
        self.node_overrides = overrides;
        self.hierarchy_dirty = true;
        self.fit_overrides();
    }

    /// Resize the override list to the bound mesh's node count
    ///
    /// An empty list is left alone. Returns whether anything changed.
    pub(crate) fn fit_overrides(&mut self) -> bool {
        let target = self.node_count();
        if self.node_overrides.is_empty() || self.node_overrides.len() == target {
            return false;
        }

        log::debug!(
            "Resizing node overrides from {} to {} for mesh {:?}",
            self.node_overrides.len(),
            target,
            self.mesh_path
        );
        self.node_overrides.resize(target, NodeOverride::default());
        self.hierarchy_dirty = true;
        true
    }

    /// Set the override of one node
    ///
    /// Returns `false` if the node does not exist on the bound mesh.
    pub(crate) fn set_override(&mut self, node: usize, transform: Transform, enabled: bool) -> bool {
        let count = self.node_count();
        if node >= count {
            return false;
        }

        self.fit_overrides();
        if self.node_overrides.is_empty() {
            self.node_overrides = vec![NodeOverride::default(); count];
        }
        self.node_overrides[node] = NodeOverride { enabled, transform };
        self.hierarchy_dirty = true;
        true
    }

    /// Drop every override
    pub(crate) fn clear_overrides(&mut self) {
        self.node_overrides.clear();
        self.hierarchy_dirty = true;
    }

    /// Start an interactive override edit; globals refresh every frame until it ends
    pub(crate) fn begin_override_edit(&mut self) {
        self.editing_overrides = true;
    }

    /// Finish an interactive override edit
    pub(crate) fn end_override_edit(&mut self) {
        self.editing_overrides = false;
        self.hierarchy_dirty = true;
    }

    /// Whether an override edit is in progress
    pub fn is_editing_overrides(&self) -> bool {
        self.editing_overrides
    }

    /// Recompute node globals if overrides or the mesh changed
    ///
    /// Returns whether a recomputation happened.
    pub fn refresh_globals(&mut self) -> bool {
        let mesh_id = self.mesh.as_ref().map(|m| m.id());
        if !self.hierarchy_dirty && !self.editing_overrides && mesh_id == self.globals_mesh {
            return false;
        }

        self.fit_overrides();
        self.node_globals = match &self.mesh {
            Some(mesh) => compute_globals(&mesh.nodes, &self.node_overrides),
            None => Vec::new(),
        };
        self.globals_mesh = mesh_id;
        self.hierarchy_dirty = false;
        true
    }

    /// Cached node globals from the last refresh
    pub fn node_globals(&self) -> &[Mat4] {
        &self.node_globals
    }

    /// Cached global of one node, identity if unknown
    pub fn node_global(&self, node: usize) -> Mat4 {
        self.node_globals.get(node).copied().unwrap_or_else(Mat4::identity)
    }

    /// Whether draws should sample a texture
    pub fn texturing_enabled(&self) -> bool {
        self.texturing_enabled
    }

    /// Recompute texturing from the material and the mesh
    pub fn recompute_texturing(&mut self) -> bool {
        let material_textured = self.material.as_ref().is_some_and(|m| m.has_texture());
        let mesh_textured = self.mesh.as_ref().is_some_and(|m| m.has_texture());
        self.texturing_enabled = material_textured || mesh_textured;
        self.texturing_enabled
    }
}

/// 2-D sprite state
#[derive(Debug, Clone)]
pub struct SpriteComponent {
    /// Sprite texture, `None` if loading failed
    pub texture: Option<Arc<TextureAsset>>,
    /// Path the texture was requested from
    pub path: Option<String>,
    /// Size in world units
    pub size: Vec2,
}

impl Default for SpriteComponent {
    fn default() -> Self {
        Self {
            texture: None,
            path: None,
            size: Vec2::new(1.0, 1.0),
        }
    }
}

/// Point light parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointLightComponent {
    /// Linear RGB colour
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
    /// Attenuation range in world units
    pub range: f32,
}

impl Default for PointLightComponent {
    fn default() -> Self {
        Self {
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            range: 10.0,
        }
    }
}

/// Camera parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraComponent {
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Near plane
    pub near: f32,
    /// Far plane
    pub far: f32,
    /// Whether this is the scene's active camera
    pub active: bool,
}

impl Default for CameraComponent {
    fn default() -> Self {
        Self {
            fov_y: std::f32::consts::FRAC_PI_3,
            near: 0.1,
            far: 1000.0,
            active: false,
        }
    }
}

/// What an object is
///
/// Exactly one variant per object; there is no way to be both a sprite and
/// a light.
#[derive(Debug, Clone, Default)]
pub enum ObjectKind {
    /// Transform only
    #[default]
    Empty,
    /// Mesh with optional material and node overrides
    Mesh(MeshComponent),
    /// Textured quad
    Sprite(SpriteComponent),
    /// Point light
    PointLight(PointLightComponent),
    /// Camera
    Camera(CameraComponent),
}

impl ObjectKind {
    /// Discriminant written into GPU parameter blocks
    pub fn code(&self) -> u32 {
        match self {
            ObjectKind::Empty => 0,
            ObjectKind::Mesh(_) => 1,
            ObjectKind::Sprite(_) => 2,
            ObjectKind::PointLight(_) => 3,
            ObjectKind::Camera(_) => 4,
        }
    }

    /// Human-readable kind name
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Empty => "empty",
            ObjectKind::Mesh(_) => "mesh",
            ObjectKind::Sprite(_) => "sprite",
            ObjectKind::PointLight(_) => "point light",
            ObjectKind::Camera(_) => "camera",
        }
    }
}

/// One live scene object
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    name: String,
    transform: ObjectTransform,
    matrix: Mat4,
    dirty: bool,
    kind: ObjectKind,
}

impl Default for ObjectRecord {
    fn default() -> Self {
        Self::new("Object", ObjectKind::Empty)
    }
}

impl ObjectRecord {
    /// Create a record; new records start dirty
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            transform: ObjectTransform::default(),
            matrix: Mat4::identity(),
            dirty: true,
            kind,
        }
    }

    /// Builder-style transform
    pub fn with_transform(mut self, transform: ObjectTransform) -> Self {
        self.set_transform(transform);
        self
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Current transform
    pub fn transform(&self) -> &ObjectTransform {
        &self.transform
    }

    /// Replace the transform
    pub fn set_transform(&mut self, transform: ObjectTransform) {
        self.transform = transform;
        self.matrix = transform.to_matrix();
        self.dirty = true;
    }

    /// Move
    pub fn set_position(&mut self, position: Vec3) {
        self.set_transform(ObjectTransform { position, ..self.transform });
    }

    /// Rotate (Euler radians)
    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.set_transform(ObjectTransform { rotation, ..self.transform });
    }

    /// Scale
    pub fn set_scale(&mut self, scale: Vec3) {
        self.set_transform(ObjectTransform { scale, ..self.transform });
    }

    /// Composed model matrix
    pub fn world_matrix(&self) -> &Mat4 {
        &self.matrix
    }

    /// Whether the GPU copy is stale
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Force a GPU upload on the next propagation pass
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Kind and its component
    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// Mutable kind
    pub fn kind_mut(&mut self) -> &mut ObjectKind {
        &mut self.kind
    }

    /// Mesh component, if this is a mesh
    pub fn mesh(&self) -> Option<&MeshComponent> {
        match &self.kind {
            ObjectKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Mutable mesh component, if this is a mesh
    pub fn mesh_mut(&mut self) -> Option<&mut MeshComponent> {
        match &mut self.kind {
            ObjectKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Camera component, if this is a camera
    pub fn camera(&self) -> Option<&CameraComponent> {
        match &self.kind {
            ObjectKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    /// Mutable camera component, if this is a camera
    pub fn camera_mut(&mut self) -> Option<&mut CameraComponent> {
        match &mut self.kind {
            ObjectKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{MeshData, TextureAsset};
    use crate::assets::types::{NodeData, PartData};
    use approx::assert_relative_eq;

    fn two_node_mesh() -> Arc<MeshAsset> {
        let data = MeshData {
            nodes: vec![
                NodeData { name: "body".into(), parent: -1, transform: Transform::default() },
                NodeData {
                    name: "turret".into(),
                    parent: 0,
                    transform: Transform::from_position(Vec3::new(0.0, 1.0, 0.0)),
                },
            ],
            parts: vec![
                PartData { name: "body".into(), node: 0, first_index: 0, index_count: 6, texture: None },
                PartData { name: "turret".into(), node: 1, first_index: 6, index_count: 6, texture: None },
            ],
            index_count: 12,
            texture: None,
        };
        Arc::new(data.into_asset("tank.mesh.ron"))
    }

    #[test]
    fn test_new_record_is_dirty() {
        let mut record = ObjectRecord::default();
        assert!(record.is_dirty());
        record.clear_dirty();
        record.set_position(Vec3::new(1.0, 2.0, 3.0));
        assert!(record.is_dirty());
        assert_relative_eq!(
            *record.world_matrix(),
            Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0))
        );
    }

    #[test]
    fn test_override_shape_is_repaired() {
        let mut mesh = MeshComponent::new(Some(two_node_mesh()), None);
        mesh.set_overrides(vec![NodeOverride::default(); 7]);
        assert_eq!(mesh.overrides().len(), 2);

        mesh.set_mesh(None, None);
        assert!(mesh.overrides().is_empty());
    }

    #[test]
    fn test_set_override_sizes_list() {
        let mut mesh = MeshComponent::new(Some(two_node_mesh()), None);
        assert!(mesh.overrides().is_empty());
        assert!(mesh.set_override(1, Transform::identity(), true));
        assert_eq!(mesh.overrides().len(), 2);
        assert!(!mesh.set_override(5, Transform::identity(), true));
    }

    #[test]
    fn test_globals_are_cached_until_change() {
        let mut mesh = MeshComponent::new(Some(two_node_mesh()), None);
        assert!(mesh.refresh_globals());
        assert!(!mesh.refresh_globals());

        mesh.set_override(1, Transform::from_position(Vec3::new(1.0, 0.0, 0.0)), true);
        assert!(mesh.refresh_globals());
        assert_relative_eq!(
            mesh.node_global(1),
            Mat4::new_translation(&Vec3::new(1.0, 1.0, 0.0))
        );

        mesh.begin_override_edit();
        assert!(mesh.refresh_globals());
        assert!(mesh.refresh_globals());
        mesh.end_override_edit();
        assert!(mesh.refresh_globals());
        assert!(!mesh.refresh_globals());

        // A different mesh asset with the same shape still triggers a rebuild
        mesh.mesh = Some(two_node_mesh());
        assert!(mesh.refresh_globals());
    }

    #[test]
    fn test_texturing_follows_mesh_and_material() {
        let mut asset = Arc::try_unwrap(two_node_mesh()).unwrap();
        let mut mesh = MeshComponent::new(Some(Arc::new(MeshAsset::new("plain"))), None);
        assert!(!mesh.texturing_enabled());

        asset.parts[0].texture = Some(Arc::new(TextureAsset::new("t.png", 1, 1, 1)));
        mesh.set_mesh(Some(Arc::new(asset)), None);
        assert!(mesh.texturing_enabled());
    }

    #[test]
    fn test_kind_codes_are_distinct() {
        let kinds = [
            ObjectKind::Empty,
            ObjectKind::Mesh(MeshComponent::default()),
            ObjectKind::Sprite(SpriteComponent::default()),
            ObjectKind::PointLight(PointLightComponent::default()),
            ObjectKind::Camera(CameraComponent::default()),
        ];
        let mut codes: Vec<u32> = kinds.iter().map(ObjectKind::code).collect();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }
}
