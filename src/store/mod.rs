//! Disk-backed artifact storage
//!
//! - [`ArtifactStore`]: layer-partitioned files plus the index, under one lock
//! - [`ArtifactIndex`]: (layer, id) → entry, rebuilt by rescan
//! - [`DocumentCache`]: parsed documents, evicted per [`CachePolicy`](crate::config::CachePolicy)

mod artifact_store;
mod cache;
mod index;

pub use artifact_store::{ApplicableArtifacts, ArtifactStore, ControlRef};
pub use cache::{CacheKey, CacheStats, DocumentCache};
pub use index::{ArtifactIndex, ArtifactIndexEntry};
