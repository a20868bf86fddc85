//! Applicability matching
//!
//! Decides whether a document's declared scope overlaps a requested scope.
//! Filter dimensions map onto declared dimensions as:
//!
//! | filter         | declared (`metadata.applicability`) |
//! |----------------|-------------------------------------|
//! | `technologies` | `technology-domains`                |
//! | `boundaries`   | `jurisdictions`                     |
//! | `providers`    | `industry-sectors`                  |
//!
//! Catalog controls declare scope as free-text strings on their assessment
//! requirements; those strings are not split into dimensions, so any of them
//! may satisfy any filter list.

use super::types::{Catalog, Control, EvaluationLog, GuidanceDocument, Metadata, Policy};
use super::Artifact;
use serde::{Deserialize, Serialize};

/// Requested scope. Blank values are dropped on construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFilter {
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub boundaries: Vec<String>,
    #[serde(default)]
    pub providers: Vec<String>,
}

impl ScopeFilter {
    pub fn new<I, S>(technologies: I, boundaries: I, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        fn clean<I: IntoIterator<Item = S>, S: Into<String>>(values: I) -> Vec<String> {
            values
                .into_iter()
                .map(Into::into)
                .map(|v: String| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        }
        Self {
            technologies: clean(technologies),
            boundaries: clean(boundaries),
            providers: clean(providers),
        }
    }

    /// True when no dimension is constrained
    pub fn is_empty(&self) -> bool {
        self.technologies.is_empty() && self.boundaries.is_empty() && self.providers.is_empty()
    }

    fn dimensions(&self) -> [&[String]; 3] {
        [&self.technologies, &self.boundaries, &self.providers]
    }
}

/// Scope declared by a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredScope<'a> {
    /// Values split per dimension, in filter order
    Dimensioned([&'a [String]; 3]),
    /// Undimensioned free-text values
    Flat(Vec<&'a str>),
}

/// Anything that declares an applicability scope
pub trait Applicable {
    fn declared_scope(&self) -> DeclaredScope<'_>;
}

/// Whether `doc` falls inside `filter`.
///
/// Dimensions are ANDed across the non-empty filter lists; values within a
/// dimension are ORed. A non-empty filter dimension with no declared values
/// fails the whole match.
pub fn matches<T: Applicable + ?Sized>(doc: &T, filter: &ScopeFilter) -> bool {
    if filter.is_empty() {
        return true;
    }

    match doc.declared_scope() {
        DeclaredScope::Dimensioned(declared) => filter
            .dimensions()
            .iter()
            .zip(declared.iter())
            .filter(|(requested, _)| !requested.is_empty())
            .all(|(requested, declared)| {
                declared
                    .iter()
                    .any(|d| requested.iter().any(|r| overlaps(d, r)))
            }),
        DeclaredScope::Flat(declared) => filter
            .dimensions()
            .iter()
            .filter(|requested| !requested.is_empty())
            .all(|requested| {
                declared
                    .iter()
                    .any(|d| requested.iter().any(|r| overlaps(d, r)))
            }),
    }
}

/// Case-insensitive containment in either direction
fn overlaps(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    a.contains(&b) || b.contains(&a)
}

const NONE: &[String] = &[];

impl Applicable for Metadata {
    fn declared_scope(&self) -> DeclaredScope<'_> {
        match &self.applicability {
            Some(a) => DeclaredScope::Dimensioned([
                &a.technology_domains,
                &a.jurisdictions,
                &a.industry_sectors,
            ]),
            None => DeclaredScope::Dimensioned([NONE, NONE, NONE]),
        }
    }
}

impl Applicable for GuidanceDocument {
    fn declared_scope(&self) -> DeclaredScope<'_> {
        self.metadata.declared_scope()
    }
}

impl Applicable for Policy {
    fn declared_scope(&self) -> DeclaredScope<'_> {
        self.metadata.declared_scope()
    }
}

impl Applicable for EvaluationLog {
    fn declared_scope(&self) -> DeclaredScope<'_> {
        self.metadata.declared_scope()
    }
}

impl Applicable for Control {
    fn declared_scope(&self) -> DeclaredScope<'_> {
        DeclaredScope::Flat(
            self.assessment_requirements
                .iter()
                .flat_map(|r| r.applicability.iter().map(String::as_str))
                .collect(),
        )
    }
}

impl Applicable for Catalog {
    fn declared_scope(&self) -> DeclaredScope<'_> {
        DeclaredScope::Flat(
            self.controls
                .iter()
                .flat_map(|c| c.assessment_requirements.iter())
                .flat_map(|r| r.applicability.iter().map(String::as_str))
                .collect(),
        )
    }
}

impl Applicable for Artifact {
    fn declared_scope(&self) -> DeclaredScope<'_> {
        match self {
            Artifact::Guidance(d) => d.declared_scope(),
            Artifact::Catalog(d) => d.declared_scope(),
            Artifact::Policy(d) => d.declared_scope(),
            Artifact::EvaluationLog(d) => d.declared_scope(),
        }
    }
}

impl Catalog {
    /// Controls whose assessment requirements match `filter`
    pub fn applicable_controls<'a>(
        &'a self,
        filter: &'a ScopeFilter,
    ) -> impl Iterator<Item = &'a Control> + 'a {
        self.controls.iter().filter(move |c| matches(*c, filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::types::{Applicability, AssessmentRequirement};

    fn guidance(tech: &[&str], juris: &[&str], sectors: &[&str]) -> GuidanceDocument {
        let to_vec = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        GuidanceDocument {
            metadata: Metadata {
                id: "g".to_string(),
                applicability: Some(Applicability {
                    technology_domains: to_vec(tech),
                    jurisdictions: to_vec(juris),
                    industry_sectors: to_vec(sectors),
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn control(strings: &[&str]) -> Control {
        Control {
            id: "C1".to_string(),
            assessment_requirements: vec![AssessmentRequirement {
                id: "C1.TR01".to_string(),
                applicability: strings.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn filter(t: &[&str], b: &[&str], p: &[&str]) -> ScopeFilter {
        ScopeFilter::new(t.to_vec(), b.to_vec(), p.to_vec())
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let empty = ScopeFilter::default();
        assert!(matches(&GuidanceDocument::default(), &empty));
        assert!(matches(&control(&[]), &empty));
        assert!(matches(&guidance(&["cloud"], &[], &[]), &empty));
    }

    #[test]
    fn test_blank_values_dropped() {
        let f = filter(&["  ", ""], &[], &[]);
        assert!(f.is_empty());
        assert!(matches(&GuidanceDocument::default(), &f));
    }

    #[test]
    fn test_bidirectional_case_insensitive_substring() {
        let doc = guidance(&["Cloud Computing"], &[], &[]);
        assert!(matches(&doc, &filter(&["cloud"], &[], &[])));
        assert!(matches(&doc, &filter(&["public cloud computing services"], &[], &[])));
        assert!(!matches(&doc, &filter(&["mainframe"], &[], &[])));
    }

    #[test]
    fn test_dimensions_are_anded() {
        let doc = guidance(&["cloud"], &["EU"], &[]);
        assert!(matches(&doc, &filter(&["cloud"], &["eu"], &[])));
        assert!(!matches(&doc, &filter(&["cloud"], &["us"], &[])));
        // non-empty provider filter but nothing declared in that dimension
        assert!(!matches(&doc, &filter(&["cloud"], &[], &["finance"])));
    }

    #[test]
    fn test_values_within_dimension_are_ored() {
        let doc = guidance(&["containers"], &[], &[]);
        assert!(matches(&doc, &filter(&["mainframe", "container"], &[], &[])));
    }

    #[test]
    fn test_no_applicability_fails_non_empty_filter() {
        assert!(!matches(&GuidanceDocument::default(), &filter(&["cloud"], &[], &[])));
    }

    #[test]
    fn test_control_strings_satisfy_any_dimension() {
        let c = control(&["tlp-green", "Financial Services"]);
        assert!(matches(&c, &filter(&[], &[], &["financial"])));
        assert!(matches(&c, &filter(&["TLP-GREEN"], &[], &[])));
        assert!(matches(&c, &filter(&["tlp"], &["services"], &[])));
        assert!(!matches(&c, &filter(&["tlp"], &["healthcare"], &[])));
        assert!(!matches(&control(&[]), &filter(&["tlp"], &[], &[])));
    }

    #[test]
    fn test_applicable_controls() {
        let catalog = Catalog {
            controls: vec![control(&["storage"]), {
                let mut c = control(&["compute"]);
                c.id = "C2".to_string();
                c
            }],
            ..Default::default()
        };
        let f = filter(&["compute"], &[], &[]);
        let ids: Vec<_> = catalog.applicable_controls(&f).map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C2"]);
        assert!(matches(&catalog, &f));
    }
}
