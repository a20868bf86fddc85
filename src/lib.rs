//! Gemara Store - layered governance artifacts on disk, indexed and validated
//!
//! Gemara organizes governance, risk and compliance documents into layers:
//! guidance (1), control catalogs (2), policies (3) and evaluation logs (4).
//! This crate persists those documents as plain YAML files, keeps an
//! in-memory index over them, and validates documents against the layered
//! Gemara schemas before they are trusted.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                      Callers (tools, CLI)                          │
//! └──────────────┬───────────────────────────────────┬─────────────────┘
//!                │ store / retrieve / list / rescan  │ validate
//! ┌──────────────▼──────────────────────┐   ┌────────▼─────────────────┐
//! │            ArtifactStore            │   │     SchemaValidator      │
//! │  ┌───────────────┐ ┌─────────────┐  │   │  ┌────────────────────┐  │
//! │  │ ArtifactIndex │ │DocumentCache│  ├──▶│  │  compiled packages │  │
//! │  │ (RwLock)      │ │ (policy)    │  │   │  └─────────┬──────────┘  │
//! │  └───────────────┘ └─────────────┘  │   │  ┌─────────▼──────────┐  │
//! │  ┌───────────────────────────────┐  │   │  │   FragmentCache    │  │
//! │  │  Applicability matcher        │  │   │  └─────────┬──────────┘  │
//! │  └───────────────────────────────┘  │   └────────────┼─────────────┘
//! └──────────────┬──────────────────────┘                │
//!                │                          embedded / remote / directory
//! ┌──────────────▼──────────────────────┐
//! │  <base_dir>/layer<N>/<id>.yaml      │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`store`]: artifact store, index and document cache
//! - [`schema`]: fragment sources, fragment cache, validator and the
//!   constraint language the fragments are written in
//! - [`document`]: typed documents per layer and the applicability matcher
//! - [`layer`]: layer numbers, directories and schema entry points
//! - [`config`]: configuration management
//!
//! ## Example
//!
//! ```no_run
//! use gemara_store::{ArtifactStore, SchemaValidator};
//! use std::sync::Arc;
//!
//! # fn main() -> gemara_store::Result<()> {
//! let store = ArtifactStore::new("/tmp/gemara")?
//!     .with_validator(Arc::new(SchemaValidator::embedded()));
//! let id = store.store_validated(1, "metadata:\n  id: nist-csf\n  title: NIST CSF\n")?;
//! let doc = store.retrieve(1, &id)?;
//! assert_eq!(doc.title(), Some("NIST CSF"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod layer;
pub mod schema;
pub mod store;

pub use config::GemaraConfig;
pub use document::{Artifact, LayerDocument, ScopeFilter};
pub use error::{Error, ErrorClass, Result};
pub use layer::Layer;
pub use schema::{DocumentValidator, SchemaValidator, ValidationResult};
pub use store::{ArtifactIndexEntry, ArtifactStore};
