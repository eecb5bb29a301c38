//! Scene description files
//!
//! The serializable form of a whole object set. Asset fields hold registry
//! references (`guid:<hex>`) when the asset is registered and plain paths
//! otherwise; resolution happens in the scene on import.

use serde::{Deserialize, Serialize};

use crate::assets::AssetError;
use crate::foundation::math::Vec2;

use super::hierarchy::NodeOverride;
use super::object::{CameraComponent, ObjectId, ObjectTransform, PointLightComponent};

/// Current scene file format version
pub const SCENE_FORMAT_VERSION: u32 = 1;

/// Kind-specific fields of one object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KindDescription {
    /// Transform only
    Empty,
    /// Mesh object
    Mesh {
        /// Mesh reference
        mesh: Option<String>,
        /// Material reference
        #[serde(default)]
        material: Option<String>,
    },
    /// Sprite object
    Sprite {
        /// Texture reference
        texture: Option<String>,
        /// Size in world units
        size: Vec2,
    },
    /// Point light
    PointLight(PointLightComponent),
    /// Camera
    Camera(CameraComponent),
}

/// One exported object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescription {
    /// Object id, reproduced on import
    pub id: ObjectId,
    /// Display name
    pub name: String,
    /// Transform
    #[serde(default)]
    pub transform: ObjectTransform,
    /// Kind and kind-specific fields
    pub kind: KindDescription,
    /// Per-node overrides, meshes only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_overrides: Vec<NodeOverride>,
}

/// A whole exported scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    /// File format version
    pub version: u32,
    /// Objects in id order
    pub objects: Vec<ObjectDescription>,
}

impl Default for SceneDescription {
    fn default() -> Self {
        Self {
            version: SCENE_FORMAT_VERSION,
            objects: Vec::new(),
        }
    }
}

impl SceneDescription {
    /// Parse from RON text
    pub fn from_ron(text: &str) -> Result<Self, AssetError> {
        let description: Self = ron::from_str(text).map_err(|e| AssetError::Parse(e.to_string()))?;
        if description.version > SCENE_FORMAT_VERSION {
            log::warn!(
                "Scene format version {} is newer than supported version {}",
                description.version,
                SCENE_FORMAT_VERSION
            );
        }
        Ok(description)
    }

    /// Render as pretty RON
    pub fn to_ron(&self) -> Result<String, AssetError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| AssetError::Serialize(e.to_string()))
    }

    /// Load from a RON file
    pub fn load(path: &str) -> Result<Self, AssetError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Save to a RON file
    pub fn save(&self, path: &str) -> Result<(), AssetError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}
