//! Disk-backed artifact store
//!
//! Directory layout:
//! ```text
//! <base_dir>/
//! ├── layer1/
//! │   ├── <artifact-id>.yaml
//! │   └── ...
//! ├── layer2/
//! ├── layer3/
//! └── layer4/
//! ```
//!
//! The store writes `<id>.yaml`; `.yml` and `.json` files dropped in by other
//! tools are picked up by [`ArtifactStore::rescan`].
//!
//! Locking: one `RwLock` guards the index. Writers (`store_raw_yaml`, `add`,
//! `delete`, `rescan`) hold the write lock for their whole critical section.
//! `retrieve` and `list` take the read lock for the index lookup only, and
//! `retrieve` loads from disk after releasing it.

use super::cache::DocumentCache;
use super::index::{ArtifactIndex, ArtifactIndexEntry};
use crate::config::{CachePolicy, GemaraConfig};
use crate::document::{matches, Artifact, LayerDocument, ScopeFilter};
use crate::error::{Error, Result};
use crate::layer::Layer;
use crate::schema::{DocumentValidator, ValidationResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Extensions recognised by rescan
const ARTIFACT_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Extension of files written by the store
const STORE_EXTENSION: &str = "yaml";

/// Layer-partitioned artifact store with an in-memory index
pub struct ArtifactStore {
    base_dir: PathBuf,
    index: RwLock<ArtifactIndex>,
    /// Bumped under the write lock on every index mutation
    generation: AtomicU64,
    cache: DocumentCache,
    validator: Option<Arc<dyn DocumentValidator>>,
}

/// A catalog control that matched a scope filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlRef {
    pub catalog_id: String,
    pub family_id: String,
    pub control_id: String,
}

/// Result of [`ArtifactStore::find_applicable`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplicableArtifacts {
    pub scope: ScopeFilter,
    /// Layer 1 guidance ids
    pub guidance: Vec<String>,
    /// Layer 2 controls
    pub controls: Vec<ControlRef>,
}

impl ApplicableArtifacts {
    pub fn total(&self) -> usize {
        self.guidance.len() + self.controls.len()
    }
}

impl ArtifactStore {
    /// Open a store at `base_dir` with the default cache policy.
    ///
    /// Creates the base and layer directories, then indexes what is on disk.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_cache_policy(base_dir, CachePolicy::default())
    }

    /// Open a store using the storage section of `config`.
    pub fn open(config: &GemaraConfig) -> Result<Self> {
        Self::with_cache_policy(config.storage.base_dir.clone(), config.storage.cache)
    }

    /// Open a store at `base_dir` with an explicit cache policy.
    pub fn with_cache_policy(base_dir: impl Into<PathBuf>, policy: CachePolicy) -> Result<Self> {
        let base_dir = base_dir.into();
        for layer in Layer::ALL {
            std::fs::create_dir_all(base_dir.join(layer.dir_name()))?;
        }
        // index entries carry absolute paths
        let base_dir = base_dir.canonicalize()?;

        let store = Self {
            base_dir,
            index: RwLock::new(ArtifactIndex::new()),
            generation: AtomicU64::new(0),
            cache: DocumentCache::new(policy),
            validator: None,
        };
        store.rescan()?;
        Ok(store)
    }

    /// Attach the validator used by `store_validated` and `validate_stored`.
    pub fn with_validator(mut self, validator: Arc<dyn DocumentValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding a layer's artifacts
    pub fn layer_dir(&self, layer: u32) -> Result<PathBuf> {
        let layer = Layer::try_from(layer)?;
        Ok(self.dir_for(layer))
    }

    /// The store's document cache
    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store raw YAML/JSON text verbatim, returning the artifact id.
    ///
    /// Only `metadata.id` and `metadata.title` are read from the text, so
    /// fields unknown to the typed documents survive the write.
    pub fn store_raw_yaml(&self, layer: u32, text: &str) -> Result<String> {
        let layer = Layer::try_from(layer)?;
        let (id, title) = extract_metadata(text)?;
        check_id(&id)?;

        let mut index = self.write_index();
        let path = self.canonical_path(layer, &id);
        write_atomic(&path, text)?;
        self.record(&mut index, layer, &id, path, title);

        tracing::info!(layer = layer.number(), id = %id, "Stored artifact");
        Ok(id)
    }

    /// Store a typed document under `id`, serialized as YAML.
    ///
    /// `id` must equal the document's `metadata.id`.
    pub fn add<T: LayerDocument>(&self, id: &str, doc: &T) -> Result<()> {
        let layer = T::LAYER;
        if id.is_empty() || doc.metadata().id.is_empty() {
            return Err(Error::MissingId);
        }
        if doc.metadata().id != id {
            return Err(Error::Parse(format!(
                "id {:?} does not match metadata.id {:?}",
                id,
                doc.metadata().id
            )));
        }
        check_id(id)?;
        let text = serde_yaml::to_string(doc)?;
        let (_, title) = extract_metadata(&text)?;

        let mut index = self.write_index();
        let path = self.canonical_path(layer, id);
        write_atomic(&path, &text)?;
        self.record(&mut index, layer, id, path, title);
        self.cache
            .put(layer, id, Arc::new(doc.clone().into_artifact()));

        tracing::info!(layer = layer.number(), id = %id, "Added artifact");
        Ok(())
    }

    /// Validate `text` against its layer schema, then store it.
    ///
    /// Nothing is written when validation fails.
    pub fn store_validated(&self, layer: u32, text: &str) -> Result<String> {
        let checked = Layer::try_from(layer)?;
        self.validator()?.check(text, checked)?;
        self.store_raw_yaml(layer, text)
    }

    /// Remove an artifact's file, index entry and cached document.
    pub fn delete(&self, layer: u32, id: &str) -> Result<()> {
        let layer = Layer::try_from(layer)?;
        let mut index = self.write_index();
        let entry = index.remove(layer, id).ok_or_else(|| Error::NotFound {
            layer: layer.number(),
            id: id.to_string(),
        })?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate(layer, id);

        match std::fs::remove_file(&entry.file_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %entry.file_path.display(), "Artifact file already gone");
            }
            Err(e) => {
                // keep the index consistent with the file that is still there
                index.upsert(entry);
                return Err(e.into());
            }
        }

        tracing::info!(layer = layer.number(), id = %id, "Deleted artifact");
        Ok(())
    }

    /// Clear the index and rebuild it from the layer directories.
    ///
    /// Files that cannot be read or parsed, or that carry no id, are skipped.
    /// Returns the number of indexed artifacts.
    pub fn rescan(&self) -> Result<usize> {
        let mut index = self.write_index();
        let mut fresh = ArtifactIndex::new();

        for layer in Layer::ALL {
            let dir = self.dir_for(layer);
            let mut paths: Vec<PathBuf> = match std::fs::read_dir(&dir) {
                Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            paths.sort();

            for path in paths {
                let recognised = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map_or(false, |e| ARTIFACT_EXTENSIONS.contains(&e));
                if !recognised || !path.is_file() {
                    continue;
                }
                let text = match std::fs::read_to_string(&path) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable file");
                        continue;
                    }
                };
                let (id, title) = match extract_metadata(&text) {
                    Ok(meta) => meta,
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "Skipping file without metadata.id");
                        continue;
                    }
                };

                // <id>.yaml wins over other files declaring the same id
                let canonical = self.canonical_path(layer, &id);
                if let Some(existing) = fresh.get(layer, &id) {
                    if existing.file_path == canonical {
                        continue;
                    }
                }
                fresh.upsert(ArtifactIndexEntry {
                    id,
                    layer,
                    file_path: path,
                    title,
                });
            }
        }

        let count = fresh.len();
        *index = fresh;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.clear();

        tracing::info!(count, base_dir = %self.base_dir.display(), "Rescanned artifact store");
        Ok(count)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Load and parse an artifact.
    ///
    /// A file that no longer parses yields `Error::Load`; its index entry is
    /// kept until the next rescan.
    pub fn retrieve(&self, layer: u32, id: &str) -> Result<Artifact> {
        let layer = Layer::try_from(layer)?;
        self.load(layer, id).map(|doc| (*doc).clone())
    }

    /// Load an artifact as its layer's concrete document type.
    pub fn retrieve_as<T: LayerDocument>(&self, id: &str) -> Result<T> {
        let doc = self.load(T::LAYER, id)?;
        let artifact = Arc::try_unwrap(doc).unwrap_or_else(|shared| (*shared).clone());
        T::from_artifact(artifact).ok_or_else(|| Error::NotFound {
            layer: T::LAYER.number(),
            id: id.to_string(),
        })
    }

    /// Raw stored text of an artifact.
    pub fn retrieve_raw(&self, layer: u32, id: &str) -> Result<String> {
        let layer = Layer::try_from(layer)?;
        let path = self.lookup(layer, id)?.file_path;
        std::fs::read_to_string(&path).map_err(|e| Error::Load {
            path,
            message: e.to_string(),
        })
    }

    /// Copies of the index entries for `layer`; `0` lists every layer.
    pub fn list(&self, layer: u32) -> Result<Vec<ArtifactIndexEntry>> {
        let layer = match layer {
            0 => None,
            n => Some(Layer::try_from(n)?),
        };
        Ok(self.read_index().list(layer))
    }

    /// Entries whose id or title contains `term`, ignoring case.
    /// `layer` follows [`list`](Self::list).
    pub fn search(&self, layer: u32, term: &str) -> Result<Vec<ArtifactIndexEntry>> {
        let term = term.trim().to_lowercase();
        let mut entries = self.list(layer)?;
        if !term.is_empty() {
            entries.retain(|e| {
                e.id.to_lowercase().contains(&term) || e.title.to_lowercase().contains(&term)
            });
        }
        Ok(entries)
    }

    /// Guidance documents and catalog controls whose scope matches `filter`.
    ///
    /// Artifacts that fail to load are skipped.
    pub fn find_applicable(&self, filter: &ScopeFilter) -> Result<ApplicableArtifacts> {
        let mut found = ApplicableArtifacts {
            scope: filter.clone(),
            ..Default::default()
        };

        for entry in self.list(Layer::Guidance.number())? {
            match self.load(Layer::Guidance, &entry.id) {
                Ok(doc) if matches(doc.as_ref(), filter) => found.guidance.push(entry.id),
                Ok(_) => {}
                Err(e) => tracing::warn!(id = %entry.id, error = %e, "Skipping guidance document"),
            }
        }

        for entry in self.list(Layer::Controls.number())? {
            let doc = match self.load(Layer::Controls, &entry.id) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(id = %entry.id, error = %e, "Skipping catalog");
                    continue;
                }
            };
            if let Artifact::Catalog(catalog) = doc.as_ref() {
                found
                    .controls
                    .extend(catalog.applicable_controls(filter).map(|c| ControlRef {
                        catalog_id: entry.id.clone(),
                        family_id: c.family.clone(),
                        control_id: c.id.clone(),
                    }));
            }
        }

        Ok(found)
    }

    /// Re-validate the stored text of an artifact against its layer schema.
    pub fn validate_stored(&self, layer: u32, id: &str) -> Result<ValidationResult> {
        let validator = self.validator()?;
        let text = self.retrieve_raw(layer, id)?;
        let layer = Layer::try_from(layer)?;
        Ok(validator.validate(&text, layer))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn load(&self, layer: Layer, id: &str) -> Result<Arc<Artifact>> {
        if let Some(doc) = self.cache.get(layer, id) {
            tracing::debug!(layer = layer.number(), id = %id, "Document cache hit");
            return Ok(doc);
        }

        let (entry, generation) = {
            let index = self.read_index();
            let entry = index.get(layer, id).cloned();
            (entry, self.generation.load(Ordering::SeqCst))
        };
        let entry = entry.ok_or_else(|| Error::NotFound {
            layer: layer.number(),
            id: id.to_string(),
        })?;

        let parsed = std::fs::read_to_string(&entry.file_path)
            .map_err(|e| e.to_string())
            .and_then(|text| Artifact::parse(layer, &text).map_err(|e| e.to_string()));
        let doc = match parsed {
            Ok(doc) => Arc::new(doc),
            Err(message) => {
                tracing::warn!(
                    layer = layer.number(),
                    id = %id,
                    path = %entry.file_path.display(),
                    error = %message,
                    "Indexed artifact failed to load"
                );
                return Err(Error::Load {
                    path: entry.file_path,
                    message,
                });
            }
        };

        // skip caching if a writer touched the index since the lookup
        let _index = self.read_index();
        if self.generation.load(Ordering::SeqCst) == generation {
            self.cache.put(layer, id, doc.clone());
        }
        Ok(doc)
    }

    fn lookup(&self, layer: Layer, id: &str) -> Result<ArtifactIndexEntry> {
        self.read_index()
            .get(layer, id)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                layer: layer.number(),
                id: id.to_string(),
            })
    }

    fn record(
        &self,
        index: &mut ArtifactIndex,
        layer: Layer,
        id: &str,
        file_path: PathBuf,
        title: String,
    ) {
        let previous = index.upsert(ArtifactIndexEntry {
            id: id.to_string(),
            layer,
            file_path,
            title,
        });
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate(layer, id);
        tracing::debug!(
            layer = layer.number(),
            id = %id,
            replaced = previous.is_some(),
            "Updated index entry"
        );
    }

    fn validator(&self) -> Result<&Arc<dyn DocumentValidator>> {
        self.validator
            .as_ref()
            .ok_or_else(|| Error::Schema("no validator configured".to_string()))
    }

    fn dir_for(&self, layer: Layer) -> PathBuf {
        self.base_dir.join(layer.dir_name())
    }

    fn canonical_path(&self, layer: Layer, id: &str) -> PathBuf {
        self.dir_for(layer).join(format!("{}.{}", id, STORE_EXTENSION))
    }

    // Poisoning is ignored: the index can always be rebuilt from disk.
    fn read_index(&self) -> RwLockReadGuard<'_, ArtifactIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, ArtifactIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read `metadata.id` and the title from YAML/JSON text without a typed
/// parse. The title is the document-level `title`, falling back to
/// `metadata.title`.
fn extract_metadata(text: &str) -> Result<(String, String)> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| Error::Parse(e.to_string()))?;
    let metadata = value.get("metadata").ok_or(Error::MissingId)?;
    let id = metadata
        .get("id")
        .and_then(serde_yaml::Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or(Error::MissingId)?
        .to_string();
    let title = [&value, metadata]
        .into_iter()
        .filter_map(|v| v.get("title").and_then(serde_yaml::Value::as_str))
        .find(|t| !t.is_empty())
        .unwrap_or_default()
        .to_string();
    Ok((id, title))
}

/// Ids become file names.
fn check_id(id: &str) -> Result<()> {
    let bad = id == "."
        || id == ".."
        || id.trim() != id
        || id.contains(['/', '\\', '\0']);
    if bad {
        return Err(Error::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Write to a temporary sibling, then rename over `path`.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp = path.with_extension(format!("{}.tmp-{}", STORE_EXTENSION, uuid::Uuid::new_v4()));
    if let Err(e) = std::fs::write(&tmp, content) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
