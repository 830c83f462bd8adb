//! Inventory drift comparison between two SBOM documents.
//!
//! Consumes two CycloneDX-shaped JSON documents (`{"components": [...]}`),
//! joins components by name, and classifies every difference: added,
//! removed, version bump, content-hash drift, risk escalation, license or
//! legal-status change.
//!
//! Risk, legal status, and license ride in the free-text `description`
//! field (`Risk: … | Legal: … | License: …`) because the upstream SBOM
//! component has no dedicated slots for them; the extractors here parse
//! those tokens back out. Hash comparison uses only `SHA-256` entries.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RiskLevel;

/// Failure loading a diff input document.
#[derive(Debug, Error)]
pub enum DiffError {
    /// The file could not be read.
    #[error("could not read {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a JSON document of the expected shape.
    #[error("could not parse {path}: {source}")]
    Parse {
        /// Offending path.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// One component of an SBOM document. Unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    /// Component name — the join key.
    pub name: String,
    /// Declared version, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Free-text description carrying the `Risk:`/`Legal:`/`License:` tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Content hashes by algorithm.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashes: Vec<ComponentHash>,
}

/// One hash entry of a component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHash {
    /// Algorithm label, e.g. `"SHA-256"`.
    pub alg: String,
    /// Hex digest.
    pub content: String,
}

impl Component {
    /// Risk token from the description, or `"UNKNOWN"`.
    #[must_use]
    pub fn risk(&self) -> String {
        let re = Regex::new(r"Risk:\s*([A-Z]+)").expect("risk pattern regex is valid");
        self.description
            .as_deref()
            .and_then(|desc| re.captures(desc))
            .map_or_else(|| "UNKNOWN".to_owned(), |cap| cap[1].to_owned())
    }

    /// First `SHA-256` hash content, or the empty string.
    #[must_use]
    pub fn sha256(&self) -> String {
        self.hashes
            .iter()
            .find(|h| h.alg == "SHA-256")
            .map(|h| h.content.clone())
            .unwrap_or_default()
    }

    /// License token from the description, or `"Unknown"`.
    #[must_use]
    pub fn license(&self) -> String {
        let re = Regex::new(r"License:\s*([^|]+)").expect("license pattern regex is valid");
        self.description
            .as_deref()
            .and_then(|desc| re.captures(desc))
            .map_or_else(|| "Unknown".to_owned(), |cap| cap[1].trim().to_owned())
    }

    /// Legal-status label from the description, or `"UNKNOWN"`.
    ///
    /// Qualified labels collapse to their leading status word, so
    /// `"LEGAL RISK (cc-by-nc-4.0)"` compares equal across license-text
    /// changes that do not change the verdict.
    #[must_use]
    pub fn legal_status(&self) -> String {
        let re = Regex::new(r"Legal:\s*([^|]+)").expect("legal pattern regex is valid");
        let Some(value) = self
            .description
            .as_deref()
            .and_then(|desc| re.captures(desc))
            .map(|cap| cap[1].trim().to_owned())
        else {
            return "UNKNOWN".to_owned();
        };

        for label in ["LEGAL RISK", "PASS", "UNKNOWN"] {
            if value.starts_with(label) {
                return label.to_owned();
            }
        }
        value
    }

    /// Declared version, or `"unknown"`.
    #[must_use]
    fn version_or_unknown(&self) -> String {
        self.version.clone().unwrap_or_else(|| "unknown".to_owned())
    }
}

/// Per-field differences for one component present in both inventories.
///
/// Each populated field is an `(old, new)` pair.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComponentDiff {
    /// Component name.
    pub name: String,
    /// Version changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_diff: Option<(String, String)>,
    /// SHA-256 changed with both sides present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_diff: Option<(String, String)>,
    /// Risk token changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_diff: Option<(String, String)>,
    /// Legal-status label changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_status_diff: Option<(String, String)>,
    /// License text changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_diff: Option<(String, String)>,
}

/// Aggregate result of comparing two inventories.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffResult {
    /// Components only in the new inventory.
    pub added: Vec<Component>,
    /// Components only in the old inventory.
    pub removed: Vec<Component>,
    /// Components in both with at least one field difference.
    pub changed: Vec<ComponentDiff>,
    /// An added component is CRITICAL, or a change landed on CRITICAL.
    pub risk_increased: bool,
    /// Some component's SHA-256 drifted with both sides present.
    pub hash_drifted: bool,
}

/// An SBOM document reduced to its component list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SbomDocument {
    /// The components array; everything else in the document is ignored.
    #[serde(default)]
    pub components: Vec<Component>,
}

/// Comparer over two loaded SBOM documents.
pub struct SbomDiff {
    old: SbomDocument,
    new: SbomDocument,
}

impl SbomDiff {
    /// Compare two already-parsed documents.
    #[must_use]
    pub fn new(old: SbomDocument, new: SbomDocument) -> Self {
        Self { old, new }
    }

    /// Load both documents from JSON files.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError`] if either file cannot be read or parsed.
    pub fn from_files(old_path: &Path, new_path: &Path) -> Result<Self, DiffError> {
        Ok(Self {
            old: load_document(old_path)?,
            new: load_document(new_path)?,
        })
    }

    /// Compute the drift between the two inventories.
    ///
    /// Components are joined by name. Output order follows the new
    /// document for `added` and `changed`, the old document for `removed`.
    #[must_use]
    pub fn compare(&self) -> DiffResult {
        let mut result = DiffResult::default();

        for new_comp in &self.new.components {
            let Some(old_comp) = self
                .old
                .components
                .iter()
                .find(|c| c.name == new_comp.name)
            else {
                if new_comp.risk() == "CRITICAL" {
                    result.risk_increased = true;
                }
                result.added.push(new_comp.clone());
                continue;
            };

            if let Some(diff) = diff_component(old_comp, new_comp, &mut result) {
                result.changed.push(diff);
            }
        }

        for old_comp in &self.old.components {
            if !self.new.components.iter().any(|c| c.name == old_comp.name) {
                result.removed.push(old_comp.clone());
            }
        }

        result
    }
}

/// Compare one component across inventories; `Some` when anything differs.
fn diff_component(
    old: &Component,
    new: &Component,
    result: &mut DiffResult,
) -> Option<ComponentDiff> {
    let mut diff = ComponentDiff {
        name: new.name.clone(),
        ..ComponentDiff::default()
    };
    let mut has_change = false;

    let (old_ver, new_ver) = (old.version_or_unknown(), new.version_or_unknown());
    if old_ver != new_ver {
        diff.version_diff = Some((old_ver, new_ver));
        has_change = true;
    }

    // Drift only counts with both hashes present; a hash appearing or
    // disappearing is not an integrity signal.
    let (old_hash, new_hash) = (old.sha256(), new.sha256());
    if !old_hash.is_empty() && !new_hash.is_empty() && old_hash != new_hash {
        diff.hash_diff = Some((old_hash, new_hash));
        result.hash_drifted = true;
        has_change = true;
    }

    let (old_risk, new_risk) = (old.risk(), new.risk());
    if old_risk != new_risk {
        if RiskLevel::parse(&new_risk) == RiskLevel::Critical {
            result.risk_increased = true;
        }
        diff.risk_diff = Some((old_risk, new_risk));
        has_change = true;
    }

    let (old_status, new_status) = (old.legal_status(), new.legal_status());
    if old_status != new_status {
        diff.legal_status_diff = Some((old_status, new_status));
        has_change = true;
    }

    let (old_license, new_license) = (old.license(), new.license());
    if old_license != new_license {
        diff.license_diff = Some((old_license, new_license));
        has_change = true;
    }

    has_change.then_some(diff)
}

/// Read and parse one SBOM JSON file.
fn load_document(path: &Path) -> Result<SbomDocument, DiffError> {
    let display = path.display().to_string();
    let raw = std::fs::read(path).map_err(|source| DiffError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| DiffError::Parse {
        path: display,
        source,
    })
}
