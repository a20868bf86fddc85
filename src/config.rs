//! Gemara store configuration management

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default schema version (git ref in the schema repository)
pub const DEFAULT_SCHEMA_VERSION: &str = "main";

/// Default base URL for remote schema fragments
pub const DEFAULT_SCHEMA_BASE_URL: &str = "https://raw.githubusercontent.com/ossf/gemara";

/// Default document cache capacity
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Main Gemara store configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GemaraConfig {
    /// Artifact storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Schema source configuration
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Validation behaviour
    #[serde(default)]
    pub validation: ValidationConfig,
}

impl GemaraConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text and validate it
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but cannot work
    pub fn validate(&self) -> Result<()> {
        if self.schema.version.trim().is_empty() {
            return Err(Error::Config("schema.version must not be empty".to_string()));
        }
        if self.schema.timeout_secs == 0 {
            return Err(Error::Config(
                "schema.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let CachePolicy::Lru { capacity: 0 } = self.storage.cache {
            return Err(Error::Config(
                "storage.cache lru capacity must be greater than zero".to_string(),
            ));
        }
        match self.schema.source {
            SchemaSourceKind::Remote if self.schema.base_url.trim().is_empty() => Err(
                Error::Config("schema.base_url is required for the remote source".to_string()),
            ),
            SchemaSourceKind::Directory if self.schema.directory.is_none() => Err(
                Error::Config("schema.directory is required for the directory source".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

/// Artifact storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory holding `layer<N>/` subdirectories
    pub base_dir: PathBuf,

    /// Eviction policy for parsed documents
    pub cache: CachePolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs_next::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gemara")
            .join("artifacts");

        Self {
            base_dir: base,
            cache: CachePolicy::default(),
        }
    }
}

/// Eviction policy for the store's document cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Every retrieval loads from disk
    Disabled,
    /// Keep every loaded document until invalidated
    Unbounded,
    /// Keep at most `capacity` documents, evicting the least recently used
    Lru { capacity: usize },
}

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy::Lru {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Where schema fragments come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaSourceKind {
    /// Fragments compiled into the binary
    #[default]
    Embedded,
    /// Fragments fetched over HTTP from `base_url`
    Remote,
    /// Fragments read from `<directory>/<version>/<name>.cue`
    Directory,
}

/// Schema source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Schema version (git ref for the remote source)
    pub version: String,

    /// Fragment source
    pub source: SchemaSourceKind,

    /// Base URL for the remote source
    pub base_url: String,

    /// Root directory for the directory source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Per-request timeout for remote fetches, in seconds
    pub timeout_secs: u64,

    /// Retries after a failed remote fetch
    pub max_retries: u32,

    /// Cache compiled schema packages per (version, layer)
    pub cache_compiled: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_SCHEMA_VERSION.to_string(),
            source: SchemaSourceKind::default(),
            base_url: DEFAULT_SCHEMA_BASE_URL.to_string(),
            directory: None,
            timeout_secs: 10,
            max_retries: 2,
            cache_compiled: true,
        }
    }
}

/// Validation behaviour
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Validate documents before the CLI stores them
    pub validate_on_store: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GemaraConfig::default();
        assert_eq!(config.schema.version, "main");
        assert_eq!(config.schema.source, SchemaSourceKind::Embedded);
        assert_eq!(config.storage.cache, CachePolicy::Lru { capacity: 256 });
        assert!(config.storage.base_dir.ends_with(".gemara/artifacts"));
        assert!(!config.validation.validate_on_store);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = GemaraConfig::from_toml(
            r#"
            [storage]
            base_dir = "/tmp/gemara"

            [schema]
            version = "v0.7.0"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.base_dir, PathBuf::from("/tmp/gemara"));
        assert_eq!(config.schema.version, "v0.7.0");
        assert_eq!(config.schema.timeout_secs, 10);
        assert_eq!(config.storage.cache, CachePolicy::default());
    }

    #[test]
    fn test_cache_policy_toml() {
        let config = GemaraConfig::from_toml(
            r#"
            [storage]
            cache = "unbounded"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.cache, CachePolicy::Unbounded);

        let config = GemaraConfig::from_toml(
            r#"
            [storage.cache.lru]
            capacity = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.cache, CachePolicy::Lru { capacity: 8 });
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = GemaraConfig::default();
        config.storage.cache = CachePolicy::Lru { capacity: 0 };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = GemaraConfig::default();
        config.schema.version = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = GemaraConfig::default();
        config.schema.source = SchemaSourceKind::Directory;
        assert!(config.validate().is_err());
        config.schema.directory = Some(PathBuf::from("/srv/schemas"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gemara.toml");
        std::fs::write(&path, "[validation]\nvalidate_on_store = true\n").unwrap();
        let config = GemaraConfig::from_file(&path).unwrap();
        assert!(config.validation.validate_on_store);

        let missing = GemaraConfig::from_file(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(Error::Config(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = GemaraConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back = GemaraConfig::from_toml(&text).unwrap();
        assert_eq!(back, config);
    }
}
