//! Layered schema validation
//!
//! Fragments (`base`, `metadata`, `mapping`, `layer-<N>`) are fetched
//! through a [`FragmentSource`], memoized by [`FragmentCache`], composed
//! into one package and checked by [`SchemaValidator`].

pub mod fragments;
pub mod lang;
pub mod validator;

pub use fragments::{
    DirectorySource, EmbeddedSource, FragmentCache, FragmentSource, RemoteSource, COMMON_FRAGMENTS,
};
pub use validator::{
    DocumentValidator, SchemaValidator, ValidationReport, ValidationResult, SCHEMA_REPOSITORY,
};
