//! In-memory artifact index
//!
//! Maps (layer, id) to a lightweight entry. The index is derived state:
//! the files under the base directory are authoritative and
//! [`ArtifactStore::rescan`](super::ArtifactStore::rescan) rebuilds it.

use crate::layer::Layer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Index entry for a stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactIndexEntry {
    pub id: String,
    pub layer: Layer,
    pub file_path: PathBuf,
    #[serde(default)]
    pub title: String,
}

/// One entry per (layer, id)
#[derive(Debug, Default)]
pub struct ArtifactIndex {
    entries: HashMap<(Layer, String), ArtifactIndexEntry>,
}

impl ArtifactIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `(entry.layer, entry.id)`.
    /// Returns the entry it replaced.
    pub fn upsert(&mut self, entry: ArtifactIndexEntry) -> Option<ArtifactIndexEntry> {
        self.entries
            .insert((entry.layer, entry.id.clone()), entry)
    }

    pub fn get(&self, layer: Layer, id: &str) -> Option<&ArtifactIndexEntry> {
        self.entries.get(&(layer, id.to_string()))
    }

    pub fn remove(&mut self, layer: Layer, id: &str) -> Option<ArtifactIndexEntry> {
        self.entries.remove(&(layer, id.to_string()))
    }

    /// Copies of the entries for `layer`, or every layer when `None`,
    /// ordered by layer then id.
    pub fn list(&self, layer: Option<Layer>) -> Vec<ArtifactIndexEntry> {
        let mut out: Vec<ArtifactIndexEntry> = self
            .entries
            .values()
            .filter(|e| layer.map_or(true, |l| e.layer == l))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.layer.cmp(&b.layer).then_with(|| a.id.cmp(&b.id)));
        out
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(layer: Layer, id: &str, title: &str) -> ArtifactIndexEntry {
        ArtifactIndexEntry {
            id: id.to_string(),
            layer,
            file_path: PathBuf::from(format!("/data/{}/{}.yaml", layer.dir_name(), id)),
            title: title.to_string(),
        }
    }

    #[test]
    fn test_upsert_replaces() {
        let mut index = ArtifactIndex::new();
        assert!(index.upsert(entry(Layer::Guidance, "a", "First")).is_none());
        let old = index.upsert(entry(Layer::Guidance, "a", "Second")).unwrap();
        assert_eq!(old.title, "First");
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(Layer::Guidance, "a").unwrap().title, "Second");
    }

    #[test]
    fn test_same_id_different_layers() {
        let mut index = ArtifactIndex::new();
        index.upsert(entry(Layer::Guidance, "x", ""));
        index.upsert(entry(Layer::Policy, "x", ""));
        assert_eq!(index.len(), 2);
        assert!(index.remove(Layer::Guidance, "x").is_some());
        assert!(index.get(Layer::Policy, "x").is_some());
    }

    #[test]
    fn test_list_filters_and_sorts() {
        let mut index = ArtifactIndex::new();
        index.upsert(entry(Layer::Controls, "b", ""));
        index.upsert(entry(Layer::Guidance, "z", ""));
        index.upsert(entry(Layer::Controls, "a", ""));

        let all: Vec<_> = index.list(None).into_iter().map(|e| e.id).collect();
        assert_eq!(all, vec!["z", "a", "b"]);

        let controls = index.list(Some(Layer::Controls));
        assert_eq!(controls.len(), 2);
        assert!(index.list(Some(Layer::Evaluation)).is_empty());
    }

    #[test]
    fn test_entry_serializes_layer_as_number() {
        let json = serde_json::to_value(entry(Layer::Policy, "p", "P")).unwrap();
        assert_eq!(json["layer"], 3);
        assert_eq!(json["id"], "p");
    }
}
