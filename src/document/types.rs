//! Typed Gemara documents
//!
//! Field names follow the kebab-case YAML used by Gemara artifacts. Every
//! field except `metadata.id` is optional so partially authored documents
//! still load; unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// Metadata block shared by every layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Metadata {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Actor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicability: Option<Applicability>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mapping_references: Vec<MappingReference>,
}

/// Person or tool responsible for a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Actor {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub actor_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Declared scope of a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Applicability {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub technology_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jurisdictions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub industry_sectors: Vec<String>,
}

impl Applicability {
    /// True when no scope value is declared in any dimension
    pub fn is_empty(&self) -> bool {
        self.technology_domains.is_empty()
            && self.jurisdictions.is_empty()
            && self.industry_sectors.is_empty()
    }
}

/// External document a mapping points into
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MappingReference {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Mapping from one item to entries of a referenced document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MultiMapping {
    #[serde(default)]
    pub reference_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<MappingEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

/// Single mapped entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MappingEntry {
    #[serde(default)]
    pub reference_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

// ============================================================================
// Layer 1
// ============================================================================

/// Layer 1 guidance document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GuidanceDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front_matter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<GuidanceCategory>,
}

/// Group of guidelines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GuidanceCategory {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guidelines: Vec<Guideline>,
}

/// Single guideline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Guideline {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guideline_mappings: Vec<MultiMapping>,
}

// ============================================================================
// Layer 2
// ============================================================================

/// Layer 2 control catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Catalog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub families: Vec<Family>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<Control>,
}

impl Catalog {
    /// Find a control by id
    pub fn control(&self, id: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.id == id)
    }

    /// Find a family by id
    pub fn family(&self, id: &str) -> Option<&Family> {
        self.families.iter().find(|f| f.id == id)
    }
}

/// Control family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Family {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Technology-specific control
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Control {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assessment_requirements: Vec<AssessmentRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guideline_mappings: Vec<MultiMapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub threat_mappings: Vec<MultiMapping>,
}

/// Testable requirement attached to a control
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AssessmentRequirement {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applicability: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

// ============================================================================
// Layer 3
// ============================================================================

/// Layer 3 policy document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Policy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<Actor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imports: Option<PolicyImports>,
}

/// Artifacts a policy adopts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolicyImports {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub catalogs: Vec<PolicyImport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guidance: Vec<PolicyImport>,
}

/// Reference to an adopted artifact with optional exclusions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolicyImport {
    #[serde(default)]
    pub reference_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<String>,
}

// ============================================================================
// Layer 4
// ============================================================================

/// Layer 4 evaluation log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EvaluationLog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evaluations: Vec<ControlEvaluation>,
}

/// Outcome of evaluating one control
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ControlEvaluation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub control_id: String,
    #[serde(default)]
    pub result: EvaluationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assessment_logs: Vec<AssessmentLog>,
}

/// Outcome of one assessment requirement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AssessmentLog {
    #[serde(default)]
    pub requirement_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub result: EvaluationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applicability: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// Evaluation outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvaluationResult {
    #[serde(rename = "Not Run")]
    #[default]
    NotRun,
    Passed,
    Failed,
    #[serde(rename = "Needs Review")]
    NeedsReview,
    #[serde(rename = "Not Applicable")]
    NotApplicable,
    Unknown,
}

impl std::fmt::Display for EvaluationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotRun => write!(f, "Not Run"),
            Self::Passed => write!(f, "Passed"),
            Self::Failed => write!(f, "Failed"),
            Self::NeedsReview => write!(f, "Needs Review"),
            Self::NotApplicable => write!(f, "Not Applicable"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_guidance_parses() {
        let doc: GuidanceDocument =
            serde_yaml::from_str("metadata:\n  id: nist-csf\n  title: \"NIST CSF\"\n").unwrap();
        assert_eq!(doc.metadata.id, "nist-csf");
        assert_eq!(doc.metadata.title.as_deref(), Some("NIST CSF"));
        assert!(doc.categories.is_empty());
    }

    #[test]
    fn test_catalog_kebab_case_fields() {
        let yaml = r#"
title: Object Storage
metadata:
  id: ccc-objstor
families:
  - id: CCC.F01
    title: Data
controls:
  - id: CCC.C01
    family: CCC.F01
    title: Encrypt data at rest
    assessment-requirements:
      - id: CCC.C01.TR01
        text: Data is encrypted
        applicability: [tlp-green, cloud storage]
"#;
        let catalog: Catalog = serde_yaml::from_str(yaml).unwrap();
        let control = catalog.control("CCC.C01").unwrap();
        assert_eq!(control.assessment_requirements[0].applicability.len(), 2);
        assert_eq!(catalog.family("CCC.F01").unwrap().title, "Data");
        assert!(catalog.control("missing").is_none());
    }

    #[test]
    fn test_evaluation_result_names() {
        let log: EvaluationLog = serde_yaml::from_str(
            "metadata: {id: eval-1}\nevaluations:\n  - name: check\n    control-id: C1\n    result: Needs Review\n",
        )
        .unwrap();
        assert_eq!(log.evaluations[0].result, EvaluationResult::NeedsReview);
        assert_eq!(EvaluationResult::NotApplicable.to_string(), "Not Applicable");
    }

    #[test]
    fn test_serialize_skips_empty() {
        let policy = Policy {
            metadata: Metadata {
                id: "pol-1".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&policy).unwrap();
        assert!(yaml.contains("id: pol-1"));
        assert!(!yaml.contains("contacts"));
        assert!(!yaml.contains("title"));
    }
}
