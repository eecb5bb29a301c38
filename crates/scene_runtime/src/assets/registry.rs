//! Asset guid registry
//!
//! Maps stable guids to the current on-disk path of an asset. Scene files
//! store `guid:<hex>` references for registered assets so that moving or
//! renaming a file only needs a registry update.

use std::collections::HashMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{normalize_path, AssetError};

const GUID_PREFIX: &str = "guid:";

/// Stable asset identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetGuid(pub u64);

impl AssetGuid {
    /// Parse a `guid:<hex>` reference
    pub fn parse_reference(reference: &str) -> Option<Self> {
        let hex = reference.strip_prefix(GUID_PREFIX)?;
        u64::from_str_radix(hex, 16).ok().map(Self)
    }

    /// Format as a `guid:<hex>` reference
    pub fn to_reference(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AssetGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:016x}", GUID_PREFIX, self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryEntry {
    guid: AssetGuid,
    path: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    entries: Vec<RegistryEntry>,
}

/// Bidirectional guid/path table
#[derive(Debug, Default)]
pub struct AssetRegistry {
    by_guid: HashMap<AssetGuid, String>,
    by_path: HashMap<String, AssetGuid>,
}

impl AssetRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path, returning its existing guid if already known
    pub fn register(&mut self, path: &str) -> AssetGuid {
        let path = normalize_path(path);
        if let Some(guid) = self.by_path.get(&path) {
            return *guid;
        }

        let mut rng = rand::thread_rng();
        let guid = loop {
            let candidate = AssetGuid(rng.gen());
            if !self.by_guid.contains_key(&candidate) {
                break candidate;
            }
        };

        self.insert(guid, path);
        guid
    }

    /// Register a path under a known guid, replacing any previous mapping
    pub fn register_with_guid(&mut self, guid: AssetGuid, path: &str) {
        if let Some(old_path) = self.by_guid.remove(&guid) {
            self.by_path.remove(&old_path);
        }
        self.insert(guid, normalize_path(path));
    }

    /// Point an existing guid at a new path
    pub fn rename(&mut self, guid: AssetGuid, new_path: &str) -> bool {
        let Some(old_path) = self.by_guid.remove(&guid) else {
            return false;
        };
        self.by_path.remove(&old_path);
        let new_path = normalize_path(new_path);
        log::info!("Asset {} moved: {} -> {}", guid, old_path, new_path);
        self.insert(guid, new_path);
        true
    }

    /// Current path for a guid
    pub fn path_of(&self, guid: AssetGuid) -> Option<&str> {
        self.by_guid.get(&guid).map(String::as_str)
    }

    /// Guid for a path
    pub fn guid_of(&self, path: &str) -> Option<AssetGuid> {
        self.by_path.get(&normalize_path(path)).copied()
    }

    /// Resolve a stored reference to the path handed to the asset factory
    ///
    /// Guid references resolve to their registered path; plain paths are
    /// normalized and passed through. An unknown guid resolves to itself so
    /// the factory fails the load and the caller falls back to "no asset".
    pub fn resolve(&self, stored: &str) -> String {
        match AssetGuid::parse_reference(stored) {
            Some(guid) => match self.by_guid.get(&guid) {
                Some(path) => path.clone(),
                None => {
                    log::warn!("Unregistered asset reference {}", stored);
                    stored.to_string()
                }
            },
            None => normalize_path(stored),
        }
    }

    /// Reference to persist for a path: its guid if registered
    pub fn reference_for(&self, path: &str) -> String {
        let path = normalize_path(path);
        self.by_path
            .get(&path)
            .map_or(path, |guid| guid.to_reference())
    }

    /// Number of registered assets
    pub fn len(&self) -> usize {
        self.by_guid.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.by_guid.is_empty()
    }

    /// Load a registry from a RON file
    pub fn load(path: &str) -> Result<Self, AssetError> {
        let contents = std::fs::read_to_string(path)?;
        let file: RegistryFile =
            ron::from_str(&contents).map_err(|e| AssetError::Parse(e.to_string()))?;

        let mut registry = Self::new();
        for entry in file.entries {
            registry.register_with_guid(entry.guid, &entry.path);
        }
        log::info!("Loaded asset registry {} ({} entries)", path, registry.len());
        Ok(registry)
    }

    /// Save the registry to a RON file
    pub fn save(&self, path: &str) -> Result<(), AssetError> {
        let mut entries: Vec<RegistryEntry> = self
            .by_guid
            .iter()
            .map(|(guid, path)| RegistryEntry { guid: *guid, path: path.clone() })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let contents = ron::ser::to_string_pretty(&RegistryFile { entries }, ron::ser::PrettyConfig::default())
            .map_err(|e| AssetError::Serialize(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn insert(&mut self, guid: AssetGuid, path: String) {
        self.by_path.insert(path.clone(), guid);
        self.by_guid.insert(guid, path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_stable() {
        let mut registry = AssetRegistry::new();
        let a = registry.register("meshes/ship.mesh.ron");
        let b = registry.register("meshes\\ship.mesh.ron");
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rename_keeps_references_working() {
        let mut registry = AssetRegistry::new();
        let guid = registry.register("textures/old.png");
        let reference = registry.reference_for("textures/old.png");
        assert_eq!(reference, guid.to_reference());

        assert!(registry.rename(guid, "textures/new.png"));
        assert_eq!(registry.resolve(&reference), "textures/new.png");
        assert!(registry.guid_of("textures/old.png").is_none());
    }

    #[test]
    fn test_plain_paths_pass_through() {
        let registry = AssetRegistry::new();
        assert_eq!(registry.resolve("./a/../b/c.png"), "b/c.png");
        assert_eq!(registry.reference_for("b/c.png"), "b/c.png");
    }

    #[test]
    fn test_unknown_guid_resolves_to_itself() {
        let registry = AssetRegistry::new();
        let stored = AssetGuid(0xdead_beef).to_reference();
        assert_eq!(registry.resolve(&stored), stored);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("registry.ron");
        let file = file.to_str().unwrap();

        let mut registry = AssetRegistry::new();
        let guid = registry.register("materials/hull.mat.ron");
        registry.save(file).unwrap();

        let loaded = AssetRegistry::load(file).unwrap();
        assert_eq!(loaded.path_of(guid), Some("materials/hull.mat.ron"));
    }
}
