//! Layer schema validation
//!
//! For a layer, the common fragments and the layer fragment are composed
//! into one package, the layer's entry point is unified with the parsed
//! document, and every remaining violation is reported.

use super::fragments::{
    DirectorySource, EmbeddedSource, FragmentCache, FragmentSource, RemoteSource, COMMON_FRAGMENTS,
};
use super::lang::{CompileError, Package};
use crate::config::{SchemaConfig, SchemaSourceKind, DEFAULT_SCHEMA_VERSION};
use crate::error::{Error, Result};
use crate::layer::Layer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Upstream repository the schema fragments are published in
pub const SCHEMA_REPOSITORY: &str = "https://github.com/ossf/gemara";

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Self {
        Error::Schema(e.to_string())
    }
}

/// Validates document text against a layer schema
pub trait DocumentValidator: Send + Sync {
    /// `Ok` if `text` satisfies the schema for `layer`.
    ///
    /// Constraint violations are `Error::Validation`; malformed text is
    /// `Error::Parse`; schema problems are `Error::Schema`.
    fn check(&self, text: &str, layer: Layer) -> Result<()>;

    /// Like [`check`](Self::check), folded into a result value
    fn validate(&self, text: &str, layer: Layer) -> ValidationResult {
        ValidationResult::from_check(self.check(text, layer))
    }
}

/// Outcome of one validation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    /// Primary error; serialized as `""` when absent
    #[serde(default, with = "empty_as_none")]
    pub error: Option<String>,
    /// Every constraint violation, sorted by path
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
            errors: Vec::new(),
        }
    }

    pub fn from_check(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::valid(),
            Err(Error::Validation { message, errors }) => Self {
                valid: false,
                error: Some(message),
                errors,
            },
            Err(e) => Self {
                valid: false,
                error: Some(e.to_string()),
                errors: Vec::new(),
            },
        }
    }
}

mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<String>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<String>, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(if s.is_empty() { None } else { Some(s) })
    }
}

/// A validation result with the schema it was checked against
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    #[serde(flatten)]
    pub result: ValidationResult,
    pub layer: Layer,
    pub schema_version: String,
    pub schema_url: String,
    pub repository: String,
}

/// Validator over composed schema fragments
pub struct SchemaValidator {
    fragments: FragmentCache,
    version: String,
    /// Compiled packages per (version, layer); `None` disables caching
    compiled: Option<RwLock<HashMap<(String, Layer), Arc<Package>>>>,
}

impl SchemaValidator {
    pub fn new(source: Arc<dyn FragmentSource>, version: impl Into<String>) -> Self {
        Self {
            fragments: FragmentCache::new(source),
            version: version.into(),
            compiled: Some(RwLock::new(HashMap::new())),
        }
    }

    /// Validator over the bundled fragments
    pub fn embedded() -> Self {
        Self::new(Arc::new(EmbeddedSource), DEFAULT_SCHEMA_VERSION)
    }

    /// Build from the `[schema]` config section
    pub fn from_config(config: &SchemaConfig) -> Result<Self> {
        let source: Arc<dyn FragmentSource> = match config.source {
            SchemaSourceKind::Embedded => Arc::new(EmbeddedSource),
            SchemaSourceKind::Remote => Arc::new(RemoteSource::new(
                config.base_url.clone(),
                Duration::from_secs(config.timeout_secs),
                config.max_retries,
            )?),
            SchemaSourceKind::Directory => {
                let dir = config.directory.clone().ok_or_else(|| {
                    Error::Config("schema.directory is required for the directory source".into())
                })?;
                Arc::new(DirectorySource::new(dir))
            }
        };
        Ok(Self::new(source, config.version.clone()).with_compiled_cache(config.cache_compiled))
    }

    pub fn with_compiled_cache(mut self, enabled: bool) -> Self {
        self.compiled = enabled.then(|| RwLock::new(HashMap::new()));
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn fragments(&self) -> &FragmentCache {
        &self.fragments
    }

    /// The composed package for `layer`
    pub fn package(&self, layer: Layer) -> Result<Arc<Package>> {
        let key = (self.version.clone(), layer);
        if let Some(compiled) = &self.compiled {
            // Poisoning is ignored: packages are inserted whole.
            if let Some(pkg) = compiled
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&key)
            {
                return Ok(pkg.clone());
            }
        }

        let layer_fragment = layer.fragment_name();
        let names = COMMON_FRAGMENTS
            .iter()
            .copied()
            .chain(std::iter::once(layer_fragment.as_str()));
        let mut texts = Vec::with_capacity(COMMON_FRAGMENTS.len() + 1);
        for name in names {
            let text = self.fragments.get(&self.version, name).map_err(|e| {
                Error::Schema(format!("failed to load schema fragment {}: {}", name, e))
            })?;
            texts.push((name, text));
        }

        let sources: Vec<(&str, &str)> = texts.iter().map(|(n, t)| (*n, &**t)).collect();
        let package = Package::compile(&sources)?;
        if !package.has(layer.entry_point()) {
            return Err(Error::Schema(format!(
                "no entry point {} for {}",
                layer.entry_point(),
                layer
            )));
        }
        let package = Arc::new(package);
        tracing::debug!(version = %self.version, layer = layer.number(), "Compiled schema package");

        if let Some(compiled) = &self.compiled {
            compiled
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key, package.clone());
        }
        Ok(package)
    }

    /// Validate and attach the schema location
    pub fn report(&self, text: &str, layer: Layer) -> ValidationReport {
        ValidationReport {
            result: self.validate(text, layer),
            layer,
            schema_version: self.version.clone(),
            schema_url: format!(
                "{}/blob/{}/schemas/{}.cue",
                SCHEMA_REPOSITORY,
                self.version,
                layer.fragment_name()
            ),
            repository: format!("{}/tree/{}/schemas", SCHEMA_REPOSITORY, self.version),
        }
    }
}

impl DocumentValidator for SchemaValidator {
    fn check(&self, text: &str, layer: Layer) -> Result<()> {
        let package = self.package(layer)?;
        let data: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| Error::Parse(e.to_string()))?;

        let errors = package.validate(layer.entry_point(), &data);
        if errors.is_empty() {
            tracing::debug!(layer = layer.number(), "Document is valid");
            return Ok(());
        }
        tracing::debug!(layer = layer.number(), errors = errors.len(), "Document failed validation");
        Err(Error::Validation {
            message: summarize(&errors),
            errors,
        })
    }
}

fn summarize(errors: &[String]) -> String {
    match errors {
        [] => "validation failed".to_string(),
        [only] => format!("validation failed: {}", only),
        [first, rest @ ..] => format!(
            "validation failed: {} (and {} more errors)",
            first,
            rest.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn errors_of(text: &str, layer: Layer) -> Vec<String> {
        let result = SchemaValidator::embedded().validate(text, layer);
        assert!(!result.valid, "expected failure for {}", text);
        result.errors
    }

    /// Serves the bundled fragments, overriding or failing named ones
    struct PatchedSource {
        overrides: Vec<(&'static str, &'static str)>,
        failing: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl PatchedSource {
        fn new() -> Self {
            Self {
                overrides: Vec::new(),
                failing: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl FragmentSource for PatchedSource {
        fn fetch(&self, version: &str, name: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing == Some(name) {
                return Err(Error::Fetch(format!("{} returned status 503", name)));
            }
            if let Some((_, text)) = self.overrides.iter().find(|(n, _)| *n == name) {
                return Ok(text.to_string());
            }
            EmbeddedSource.fetch(version, name)
        }

        fn location(&self, _version: &str, name: &str) -> String {
            name.to_string()
        }
    }

    const NIST_CSF: &str = "metadata:\n  id: nist-csf\n  title: \"NIST CSF\"\n";

    const CATALOG: &str = r#"
title: OSPS Baseline
metadata:
  id: osps-b
  version: "2025.02"
  date: "2025-02-25"
  author:
    id: openssf
    name: OpenSSF
    type: Human
  applicability:
    technology-domains: [Source Code Management]
  mapping-references:
    - id: CSF
      title: NIST Cybersecurity Framework
      version: "2.0"
      url: https://www.nist.gov/cyberframework
families:
  - id: AC
    title: Access Control
controls:
  - id: OSPS-AC-01
    family: AC
    title: Require MFA
    assessment-requirements:
      - id: OSPS-AC-01.01
        text: MFA is enforced for all collaborators
        applicability: [Maturity Level 1]
    guideline-mappings:
      - reference-id: CSF
        entries:
          - reference-id: PR.AA-01
            strength: 8
"#;

    const EVALUATION: &str = r#"
metadata:
  id: eval-2025-01
evaluations:
  - name: MFA check
    control-id: OSPS-AC-01
    result: Passed
    assessment-logs:
      - requirement-id: OSPS-AC-01.01
        result: Passed
        start: "2025-01-01T10:00:00Z"
"#;

    #[test]
    fn test_valid_documents() {
        let validator = SchemaValidator::embedded();
        assert_eq!(validator.validate(NIST_CSF, Layer::Guidance), ValidationResult::valid());
        assert!(validator.validate(CATALOG, Layer::Controls).valid);
        assert!(validator.validate(EVALUATION, Layer::Evaluation).valid);
        assert!(validator
            .validate(
                "metadata: {id: p1}\nimports:\n  catalogs:\n    - reference-id: osps-b\n      exclusions: [OSPS-AC-01]\n",
                Layer::Policy
            )
            .valid);
    }

    #[test]
    fn test_json_input() {
        let validator = SchemaValidator::embedded();
        assert!(validator
            .validate(r#"{"metadata": {"id": "nist-csf"}}"#, Layer::Guidance)
            .valid);
    }

    #[test]
    fn test_missing_required_fields() {
        assert_eq!(
            errors_of("metadata:\n  title: x\n", Layer::Guidance),
            vec!["metadata.id: field is required but not present"]
        );
        assert_eq!(
            errors_of("title: x\n", Layer::Controls),
            vec!["metadata: field is required but not present"]
        );
    }

    #[test]
    fn test_wrong_type() {
        let errors = errors_of("metadata:\n  id: 5\n", Layer::Policy);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("metadata.id: conflicting values"), "{}", errors[0]);
        assert!(errors[0].contains("mismatched types string and int"), "{}", errors[0]);
    }

    #[test]
    fn test_disallowed_field() {
        assert_eq!(
            errors_of("metadata:\n  id: x\nbogus: 1\n", Layer::Guidance),
            vec!["bogus: field not allowed"]
        );
        assert_eq!(
            errors_of("metadata:\n  id: x\n\"#smuggled\": 1\n", Layer::Guidance),
            vec!["#smuggled: field not allowed"]
        );
    }

    #[test]
    fn test_nested_violations_are_sorted() {
        let text = r#"
metadata:
  id: c
  date: 25/02/2025
controls:
  - id: C-1
    family: F
    title: T
    assessment-requirements: []
  - id: C-2
    family: F
    title: T
    assessment-requirements:
      - id: R
        text: ""
"#;
        let errors = errors_of(text, Layer::Controls);
        assert_eq!(errors.len(), 3, "{:?}", errors);
        assert!(errors[0].starts_with("controls.0.assessment-requirements: incompatible list lengths"));
        assert!(errors[1].starts_with("controls.1.assessment-requirements.0.text: invalid value"));
        assert!(errors[2].starts_with("metadata.date: invalid value \"25/02/2025\""));
    }

    #[test]
    fn test_evaluation_constraints() {
        let errors = errors_of("metadata: {id: e}\nevaluations: []\n", Layer::Evaluation);
        assert_eq!(
            errors,
            vec!["evaluations: invalid value (list has 0 items, want list.MinItems(1))"]
        );

        let errors = errors_of(
            "metadata: {id: e}\nevaluations:\n  - name: n\n    control-id: c\n    result: Maybe\n",
            Layer::Evaluation,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("evaluations.0.result: conflicting values \"Maybe\""));
    }

    #[test]
    fn test_summary_message() {
        let err = SchemaValidator::embedded()
            .check("metadata: {}\nextra: 1\n", Layer::Guidance)
            .unwrap_err();
        match err {
            Error::Validation { message, errors } => {
                assert_eq!(errors.len(), 2);
                assert_eq!(
                    message,
                    "validation failed: extra: field not allowed (and 1 more errors)"
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_error() {
        let validator = SchemaValidator::embedded();
        assert!(matches!(
            validator.check("metadata: [unclosed", Layer::Guidance),
            Err(Error::Parse(_))
        ));
        let result = validator.validate("metadata: [unclosed", Layer::Guidance);
        assert!(!result.valid);
        assert!(result.error.unwrap().starts_with("parse error"));
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let validator = SchemaValidator::embedded().with_compiled_cache(false);
        let text = "metadata:\n  id: ''\n  date: nope\nfoo: 1\n";
        let first = validator.validate(text, Layer::Guidance);
        for _ in 0..5 {
            assert_eq!(validator.validate(text, Layer::Guidance), first);
        }
        assert_eq!(first.errors.len(), 3);
    }

    #[test]
    fn test_fragment_fetch_failure_names_fragment() {
        let mut source = PatchedSource::new();
        source.failing = Some("mapping");
        let validator = SchemaValidator::new(Arc::new(source), "main");
        match validator.check(NIST_CSF, Layer::Guidance) {
            Err(Error::Schema(msg)) => {
                assert!(msg.contains("mapping"), "{}", msg);
                assert!(msg.contains("503"), "{}", msg);
            }
            other => panic!("unexpected {:?}", other),
        }
        let result = validator.validate(NIST_CSF, Layer::Guidance);
        assert!(!result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_package_mismatch() {
        let mut source = PatchedSource::new();
        source.overrides.push(("layer-1", "package other\n#GuidanceDocument: {...}\n"));
        let validator = SchemaValidator::new(Arc::new(source), "main");
        match validator.check(NIST_CSF, Layer::Guidance) {
            Err(Error::Schema(msg)) => assert!(msg.contains("package name mismatch"), "{}", msg),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_entry_point() {
        let mut source = PatchedSource::new();
        source.overrides.push(("layer-3", "package schemas\n#Other: {...}\n"));
        let validator = SchemaValidator::new(Arc::new(source), "main");
        match validator.check("metadata: {id: p}", Layer::Policy) {
            Err(Error::Schema(msg)) => assert!(msg.contains("no entry point #Policy"), "{}", msg),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_compiled_package_is_reused() {
        let source = Arc::new(PatchedSource::new());
        let validator = SchemaValidator::new(source.clone(), "main");
        let a = validator.package(Layer::Controls).unwrap();
        let b = validator.package(Layer::Controls).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);

        // fragments are shared across layers
        validator.package(Layer::Policy).unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_from_config() {
        let config = SchemaConfig {
            source: SchemaSourceKind::Directory,
            directory: None,
            ..Default::default()
        };
        assert!(matches!(
            SchemaValidator::from_config(&config),
            Err(Error::Config(_))
        ));
        let validator = SchemaValidator::from_config(&SchemaConfig::default()).unwrap();
        assert_eq!(validator.version(), "main");
        assert!(validator.validate(NIST_CSF, Layer::Guidance).valid);
    }

    #[test]
    fn test_result_serialization() {
        let json = serde_json::to_value(ValidationResult::valid()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"valid": true, "error": "", "errors": []})
        );
        let back: ValidationResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.error, None);
    }

    #[test]
    fn test_report() {
        let report = SchemaValidator::embedded().report(NIST_CSF, Layer::Guidance);
        assert!(report.result.valid);
        assert_eq!(
            report.schema_url,
            "https://github.com/ossf/gemara/blob/main/schemas/layer-1.cue"
        );
        assert_eq!(report.repository, "https://github.com/ossf/gemara/tree/main/schemas");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["layer"], 1);
        assert_eq!(json["valid"], true);
    }
}
