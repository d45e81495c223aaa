use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::migration::MigrationVersion;

/// File looked up in the destination directory when no `--config` is given.
pub const CONFIG_FILE: &str = "codefirst.toml";

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub models_path: String,
    pub migrate_path: String,
    pub parent_class: String,
    pub adapter: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        GeneratorSettings {
            models_path: "app/models".to_string(),
            migrate_path: "db/migrate".to_string(),
            parent_class: "ApplicationRecord".to_string(),
            adapter: "active_record".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub debug: bool,
    pub database_url: String,
    pub migration_version: MigrationVersion,
    pub generator: GeneratorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            debug: false,
            database_url: "sqlite::memory:".to_string(),
            migration_version: MigrationVersion::default(),
            generator: GeneratorSettings::default(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml_str(&source)
    }

    /// Load `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
