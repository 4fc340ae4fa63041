//! Engine feature flags
//!
//! Flags are read once from a JSON file and injected into the factory as a
//! plain value; nothing here is global or mutable at runtime.

use std::collections::HashMap;

use crate::engines::EngineKind;
use crate::errors::PipeformError;
use crate::filesys::file::File;

/// Boolean gate per engine, keyed `<engine>_transformations`
#[derive(Debug, Clone)]
pub struct FeatureFlags {
    flags: HashMap<String, bool>,
}

impl FeatureFlags {
    /// Engine enabled when no flag file exists
    pub const PRIMARY_ENGINE: EngineKind = EngineKind::Sqlmesh;

    /// Build from an explicit flag map
    pub fn new(flags: HashMap<String, bool>) -> Self {
        Self { flags }
    }

    /// Safe default: the primary engine enabled, everything else disabled
    pub fn safe_default() -> Self {
        let mut flags = HashMap::new();
        for kind in EngineKind::all() {
            flags.insert(kind.flag_key(), kind == Self::PRIMARY_ENGINE);
        }
        Self { flags }
    }

    /// Load flags from a file; an absent file degrades to the safe default
    pub async fn load(file: &File) -> Result<Self, PipeformError> {
        let flags: HashMap<String, bool> = file
            .read_json_or(|| Self::safe_default().flags)
            .await?;
        Ok(Self { flags })
    }

    /// Whether the flag for `kind` is enabled; unknown keys are disabled
    pub fn is_enabled(&self, kind: EngineKind) -> bool {
        self.flags.get(&kind.flag_key()).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_default_enables_primary_only() {
        let flags = FeatureFlags::safe_default();
        assert!(flags.is_enabled(EngineKind::Sqlmesh));
        assert!(!flags.is_enabled(EngineKind::Dbt));
    }

    #[test]
    fn test_missing_key_is_disabled() {
        let flags = FeatureFlags::new(HashMap::new());
        assert!(!flags.is_enabled(EngineKind::Sqlmesh));
        assert!(!flags.is_enabled(EngineKind::Dbt));
    }

    #[test]
    fn test_explicit_flags_win() {
        let mut map = HashMap::new();
        map.insert("dbt_transformations".to_string(), true);
        map.insert("sqlmesh_transformations".to_string(), false);
        let flags = FeatureFlags::new(map);
        assert!(flags.is_enabled(EngineKind::Dbt));
        assert!(!flags.is_enabled(EngineKind::Sqlmesh));
    }
}
