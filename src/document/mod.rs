//! Layer-typed Gemara documents
//!
//! `Artifact` is the sum type returned by layer-agnostic retrieval;
//! `LayerDocument` lets call sites that know their layer work with the
//! concrete type directly.

pub mod applicability;
pub mod types;

pub use applicability::{matches, Applicable, DeclaredScope, ScopeFilter};
pub use types::*;

use crate::error::{Error, Result};
use crate::layer::Layer;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A parsed artifact of any layer
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Guidance(GuidanceDocument),
    Catalog(Catalog),
    Policy(Policy),
    EvaluationLog(EvaluationLog),
}

impl Artifact {
    /// Parse YAML or JSON text into the typed document for `layer`
    pub fn parse(layer: Layer, text: &str) -> Result<Self> {
        match layer {
            Layer::Guidance => GuidanceDocument::parse(text).map(Artifact::Guidance),
            Layer::Controls => Catalog::parse(text).map(Artifact::Catalog),
            Layer::Policy => Policy::parse(text).map(Artifact::Policy),
            Layer::Evaluation => EvaluationLog::parse(text).map(Artifact::EvaluationLog),
        }
    }

    /// Layer this artifact belongs to
    pub fn layer(&self) -> Layer {
        match self {
            Artifact::Guidance(_) => Layer::Guidance,
            Artifact::Catalog(_) => Layer::Controls,
            Artifact::Policy(_) => Layer::Policy,
            Artifact::EvaluationLog(_) => Layer::Evaluation,
        }
    }

    /// Metadata block
    pub fn metadata(&self) -> &Metadata {
        match self {
            Artifact::Guidance(d) => d.metadata(),
            Artifact::Catalog(d) => d.metadata(),
            Artifact::Policy(d) => d.metadata(),
            Artifact::EvaluationLog(d) => d.metadata(),
        }
    }

    /// Artifact id (`metadata.id`)
    pub fn id(&self) -> &str {
        &self.metadata().id
    }

    /// Document title, falling back to `metadata.title`
    pub fn title(&self) -> Option<&str> {
        match self {
            Artifact::Guidance(d) => d.title(),
            Artifact::Catalog(d) => d.title(),
            Artifact::Policy(d) => d.title(),
            Artifact::EvaluationLog(d) => d.title(),
        }
    }

    /// Serialize to canonical YAML
    pub fn to_yaml(&self) -> Result<String> {
        let text = match self {
            Artifact::Guidance(d) => serde_yaml::to_string(d)?,
            Artifact::Catalog(d) => serde_yaml::to_string(d)?,
            Artifact::Policy(d) => serde_yaml::to_string(d)?,
            Artifact::EvaluationLog(d) => serde_yaml::to_string(d)?,
        };
        Ok(text)
    }
}

/// A document type bound to a single layer
pub trait LayerDocument: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Layer the type is stored under
    const LAYER: Layer;

    /// Metadata block
    fn metadata(&self) -> &Metadata;

    /// Document-level title
    fn own_title(&self) -> Option<&str>;

    /// Wrap in the layer-agnostic sum type
    fn into_artifact(self) -> Artifact;

    /// Unwrap from the sum type, `None` if it belongs to another layer
    fn from_artifact(artifact: Artifact) -> Option<Self>;

    /// Document title, falling back to `metadata.title`
    fn title(&self) -> Option<&str> {
        self.own_title()
            .filter(|t| !t.is_empty())
            .or(self.metadata().title.as_deref())
            .filter(|t| !t.is_empty())
    }

    /// Parse YAML (or JSON, which YAML subsumes) text
    fn parse(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| Error::Parse(e.to_string()))
    }
}

macro_rules! layer_document {
    ($ty:ident, $layer:expr, $variant:ident) => {
        impl LayerDocument for $ty {
            const LAYER: Layer = $layer;

            fn metadata(&self) -> &Metadata {
                &self.metadata
            }

            fn own_title(&self) -> Option<&str> {
                self.title.as_deref()
            }

            fn into_artifact(self) -> Artifact {
                Artifact::$variant(self)
            }

            fn from_artifact(artifact: Artifact) -> Option<Self> {
                match artifact {
                    Artifact::$variant(doc) => Some(doc),
                    _ => None,
                }
            }
        }
    };
}

layer_document!(GuidanceDocument, Layer::Guidance, Guidance);
layer_document!(Catalog, Layer::Controls, Catalog);
layer_document!(Policy, Layer::Policy, Policy);
layer_document!(EvaluationLog, Layer::Evaluation, EvaluationLog);
