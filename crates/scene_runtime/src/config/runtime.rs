//! # Runtime Configuration
//!
//! Capacity limits and default asset paths for the scene runtime. The
//! capacities here size GPU-side pools up front, so they are validated once
//! at startup rather than checked on every allocation.

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};

/// Number of texture slots a material exposes to a binding
pub const MATERIAL_TEXTURE_SLOTS: usize = 5;

/// Runtime capacities and asset defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Hard cap on live scene objects
    pub max_objects: usize,
    /// Frames the GPU may be consuming while the CPU prepares the next one
    pub frames_in_flight: usize,
    /// How many superseded resources are kept alive before destruction
    pub retirement_capacity: usize,
    /// Texture slots reserved per binding when sizing the binding pool
    pub texture_slots_per_binding: usize,
    /// Mesh used by `create_mesh` when the caller gives no path
    pub default_mesh_path: String,
    /// Texture used by `create_sprite` when the caller gives no path
    pub default_sprite_path: String,
    /// Material file written by `create_material`-style tooling
    pub default_material_path: String,
    /// Where the asset guid registry is persisted
    pub asset_registry_path: String,
    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_objects: 1024,
            frames_in_flight: 2,
            retirement_capacity: 16,
            texture_slots_per_binding: MATERIAL_TEXTURE_SLOTS,
            default_mesh_path: "assets/meshes/cube.mesh.ron".to_string(),
            default_sprite_path: "assets/textures/sprite.png".to_string(),
            default_material_path: "assets/materials/default.mat.ron".to_string(),
            asset_registry_path: "assets/registry.ron".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config for RuntimeConfig {}

impl RuntimeConfig {
    /// Set the object capacity
    pub fn with_max_objects(mut self, max_objects: usize) -> Self {
        self.max_objects = max_objects;
        self
    }

    /// Set the number of frames in flight
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Set the retirement queue capacity
    pub fn with_retirement_capacity(mut self, capacity: usize) -> Self {
        self.retirement_capacity = capacity;
        self
    }

    /// Set the default mesh path
    pub fn with_default_mesh(mut self, path: impl Into<String>) -> Self {
        self.default_mesh_path = path.into();
        self
    }

    /// Set the default sprite texture path
    pub fn with_default_sprite(mut self, path: impl Into<String>) -> Self {
        self.default_sprite_path = path.into();
        self
    }

    /// Upper bound on bindings the pool must be able to hold
    pub fn max_bindings(&self) -> usize {
        self.max_objects * self.frames_in_flight * self.texture_slots_per_binding
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_objects == 0 {
            return Err(ConfigError::Invalid("max_objects must be at least 1".to_string()));
        }

        if self.frames_in_flight == 0 {
            return Err(ConfigError::Invalid("frames_in_flight must be at least 1".to_string()));
        }

        if self.frames_in_flight > 8 {
            return Err(ConfigError::Invalid(
                "frames_in_flight should not exceed 8".to_string(),
            ));
        }

        if self.retirement_capacity == 0 {
            return Err(ConfigError::Invalid(
                "retirement_capacity must be at least 1".to_string(),
            ));
        }

        if self.texture_slots_per_binding == 0 {
            return Err(ConfigError::Invalid(
                "texture_slots_per_binding must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Load from disk and validate
    pub fn load_validated(path: &str) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.retirement_capacity, 16);
    }

    #[test]
    fn test_rejects_zero_frames() {
        let config = RuntimeConfig::default().with_frames_in_flight(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_max_bindings() {
        let config = RuntimeConfig::default()
            .with_max_objects(10)
            .with_frames_in_flight(3);
        assert_eq!(config.max_bindings(), 10 * 3 * MATERIAL_TEXTURE_SLOTS);
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.toml");
        let path = path.to_str().unwrap();

        let config = RuntimeConfig::default().with_max_objects(64);
        config.save_to_file(path).unwrap();

        let loaded = RuntimeConfig::load_validated(path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.ron");
        std::fs::write(&path, "(max_objects: 8)").unwrap();

        let loaded = RuntimeConfig::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.max_objects, 8);
        assert_eq!(loaded.frames_in_flight, 2);
    }

    #[test]
    fn test_unknown_extension() {
        let result = RuntimeConfig::load_from_file("settings.ini");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = RuntimeConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, RuntimeConfig::default());

        let broken = dir.path().join("broken.ron");
        std::fs::write(&broken, "(max_objects: \"many\")").unwrap();
        assert!(matches!(RuntimeConfig::load_or_default(&broken), Err(ConfigError::Parse(_))));
    }
}
