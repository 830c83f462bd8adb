//! Core type definitions for the AIsentry scan engine.
//!
//! These types form the contract between the engine and its consumers
//! (the CLI, the report serializers, and the diff engine):
//!
//! - [`Framework`] classifies an artifact by container format
//! - [`RiskLevel`] is the totally ordered security-risk scale
//! - [`RiskAssessment`] pairs a level with a human-readable qualifier
//! - [`LegalStatus`] carries the license-risk verdict
//! - [`Threat`] is the atomic unit of safety-scanner output
//! - [`LintDiagnostic`] is the atomic unit of migration-linter output
//! - [`ArtifactRecord`] is the inventory entry for one scanned artifact
//! - [`ScanReport`] is the aggregate result of a full scan

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// License substrings that mark an artifact as commercially restricted.
///
/// Matched case-insensitively against the raw license string.
pub const RESTRICTED_LICENSE_MARKERS: &[&str] = &["cc-by-nc", "agpl", "commons clause"];

/// Sentinel hash value emitted when the content hash could not be computed.
///
/// Consumers (serializers, the diff engine) treat this exact string as
/// "no hash available" — it must never be compared as a real digest.
pub const HASH_ERROR: &str = "hash_error";

/// Artifact container format, as classified by the walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Framework {
    /// PyTorch container (`.pt`, `.pth`, `.bin`) — ZIP archive with pickle blobs.
    #[serde(rename = "PyTorch")]
    PyTorch,
    /// SafeTensors (`.safetensors`) — length-prefixed JSON header plus tensor payload.
    #[serde(rename = "SafeTensors")]
    SafeTensors,
    /// GGUF (`.gguf`) — typed key/value binary header.
    #[serde(rename = "GGUF")]
    Gguf,
    /// Plain-text Python path configuration masquerading under a PyTorch extension.
    #[serde(rename = "Python Path Config")]
    PathConfig,
    /// Unrecognized or unclassifiable content.
    #[serde(rename = "Unknown")]
    Unknown,
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PyTorch => write!(f, "PyTorch"),
            Self::SafeTensors => write!(f, "SafeTensors"),
            Self::Gguf => write!(f, "GGUF"),
            Self::PathConfig => write!(f, "Python Path Config"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Security-risk level. The derived `Ord` follows declaration order, so
/// `UNKNOWN < LOW < MEDIUM < HIGH < CRITICAL` — the diff engine's
/// escalation rule relies on this total order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Could not be assessed (inspection failure).
    #[default]
    Unknown,
    /// No executable content found.
    Low,
    /// Executable content present but no known-dangerous symbols.
    Medium,
    /// Reserved for policy escalation; never produced by the inspectors directly.
    High,
    /// Dangerous symbol resolution or unauditable legacy container.
    Critical,
}

impl RiskLevel {
    /// Parse a risk token (e.g. from a `Risk: CRITICAL` description field).
    ///
    /// Unrecognized tokens map to [`RiskLevel::Unknown`].
    #[must_use]
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "LOW" => Self::Low,
            "MEDIUM" => Self::Medium,
            "HIGH" => Self::High,
            "CRITICAL" => Self::Critical,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "UNKNOWN"),
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A risk level with an optional human-readable qualifier.
///
/// Renders as `"LOW"` or `"CRITICAL (RCE Detected: os.system)"`. The
/// rendered form is what lands in the `risk_level` field of serialized
/// records, and what the diff engine's `Risk:` token parser reads back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessment {
    /// The ordered level.
    pub level: RiskLevel,
    /// Free-form qualifier, e.g. `"Pickle Present"` or `"Legacy Binary"`.
    pub qualifier: Option<String>,
}

impl RiskAssessment {
    /// An assessment with no qualifier.
    #[must_use]
    pub fn new(level: RiskLevel) -> Self {
        Self {
            level,
            qualifier: None,
        }
    }

    /// An assessment with a qualifier.
    #[must_use]
    pub fn with_qualifier(level: RiskLevel, qualifier: impl Into<String>) -> Self {
        Self {
            level,
            qualifier: Some(qualifier.into()),
        }
    }
}

impl std::fmt::Display for RiskAssessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{} ({})", self.level, q),
            None => write!(f, "{}", self.level),
        }
    }
}

impl Serialize for RiskAssessment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Legal-risk verdict derived from embedded license metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegalStatus {
    /// No license information found.
    Unknown,
    /// A license was found and it is not on the restricted list.
    Pass,
    /// The license matches a restricted marker; carries the raw license string.
    LegalRisk(String),
}

impl LegalStatus {
    /// Classify a raw license string.
    ///
    /// Empty or `"Unknown"` input yields [`LegalStatus::Unknown`]; a match
    /// against [`RESTRICTED_LICENSE_MARKERS`] (case-insensitive substring)
    /// yields [`LegalStatus::LegalRisk`]; anything else passes.
    #[must_use]
    pub fn from_license(license: &str) -> Self {
        if license.is_empty() || license == "Unknown" {
            return Self::Unknown;
        }
        let lowered = license.to_lowercase();
        if RESTRICTED_LICENSE_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
        {
            return Self::LegalRisk(license.to_owned());
        }
        Self::Pass
    }
}

impl std::fmt::Display for LegalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "UNKNOWN"),
            Self::Pass => write!(f, "PASS"),
            Self::LegalRisk(license) => write!(f, "LEGAL RISK ({license})"),
        }
    }
}

impl Serialize for LegalStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// What kind of policy violation a threat represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatKind {
    /// A `(module, name)` pair from the dangerous-globals blocklist.
    DangerousSymbol,
    /// A symbol outside the strict-mode allowlist.
    UnsafeImport,
}

/// A dangerous or unauthorized symbol import resolved from a pickle stream.
///
/// Renders as the qualified symbol (`"os.system"`), with strict-mode
/// findings prefixed: `"UNSAFE_IMPORT: os.system"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Threat {
    /// Violation category.
    pub kind: ThreatKind,
    /// Fully qualified `module.name`.
    pub symbol: String,
}

impl Threat {
    /// A blocklist hit.
    #[must_use]
    pub fn dangerous(module: &str, name: &str) -> Self {
        Self {
            kind: ThreatKind::DangerousSymbol,
            symbol: format!("{module}.{name}"),
        }
    }

    /// A strict-mode allowlist violation.
    #[must_use]
    pub fn unsafe_import(module: &str, name: &str) -> Self {
        Self {
            kind: ThreatKind::UnsafeImport,
            symbol: format!("{module}.{name}"),
        }
    }
}

impl std::fmt::Display for Threat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ThreatKind::DangerousSymbol => write!(f, "{}", self.symbol),
            ThreatKind::UnsafeImport => write!(f, "UNSAFE_IMPORT: {}", self.symbol),
        }
    }
}

impl Serialize for Threat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Migration-lint severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LintSeverity {
    /// Incompatible with the safe loading path.
    Error,
    /// Suspicious but loadable.
    Warning,
}

/// A single migration-lint finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintDiagnostic {
    /// Byte offset of the offending opcode in the pickle stream.
    pub offset: usize,
    /// Severity of the finding.
    pub severity: LintSeverity,
    /// Human-readable description.
    pub message: String,
    /// Remediation hint.
    pub hint: String,
}

/// Format-specific detail map attached to an [`ArtifactRecord`].
///
/// Only the fields relevant to the artifact's format are populated;
/// absent fields are omitted from serialized output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArtifactDetails {
    /// Number of member files inside a PyTorch ZIP container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_files: Option<usize>,
    /// Threats found by the safety scanner (PyTorch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threats: Option<Vec<Threat>>,
    /// Migration-lint findings, when lint mode is enabled (PyTorch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lint_report: Option<Vec<LintDiagnostic>>,
    /// Number of header keys, `__metadata__` included (SafeTensors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tensors: Option<usize>,
    /// Raw `__metadata__` object from the header (SafeTensors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Container format version (GGUF).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Declared tensor count (GGUF).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tensor_count: Option<u64>,
    /// Number of key/value pairs actually parsed (GGUF).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kv_parsed: Option<u64>,
}

/// Inventory entry for one scanned artifact.
///
/// Every file surfaced by the walker produces exactly one record;
/// inspection failures populate `error` and leave the risk at
/// `UNKNOWN` rather than aborting the scan. The content hash is
/// computed before any parsing, so a parse failure never loses
/// integrity tracking.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRecord {
    /// Path basename as observed by the walker.
    pub name: String,
    /// Container format classification.
    pub framework: Framework,
    /// Lowercase hex SHA-256 of the file's bounded prefix, or [`HASH_ERROR`].
    pub content_hash: String,
    /// Security-risk verdict.
    pub risk_level: RiskAssessment,
    /// Legal-risk verdict.
    pub legal_status: LegalStatus,
    /// Raw license identifier, or `"Unknown"`.
    pub license: String,
    /// Format-specific details.
    pub details: ArtifactDetails,
    /// Inspection error, if the container could not be parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ArtifactRecord {
    /// A fresh record for `name`, pending inspection.
    ///
    /// Starts at `UNKNOWN` risk with no license; inspectors overwrite
    /// the fields they can populate.
    #[must_use]
    pub fn new(name: impl Into<String>, framework: Framework) -> Self {
        Self {
            name: name.into(),
            framework,
            content_hash: HASH_ERROR.to_owned(),
            risk_level: RiskAssessment::new(RiskLevel::Unknown),
            legal_status: LegalStatus::Unknown,
            license: "Unknown".to_owned(),
            details: ArtifactDetails::default(),
            error: None,
        }
    }

    /// Apply the legal-status rule for a license string, updating both
    /// the `license` and `legal_status` fields.
    pub fn set_license(&mut self, license: impl Into<String>) {
        let license = license.into();
        self.legal_status = LegalStatus::from_license(&license);
        self.license = license;
    }
}

/// A library dependency extracted from a manifest file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Package name.
    pub name: String,
    /// First version bound found, or `"unknown"`.
    pub version: String,
}

impl Serialize for Dependency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Dependency", 3)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("version", &self.version)?;
        state.serialize_field("type", "library")?;
        state.end()
    }
}

/// A scan-level failure that did not map to a single artifact record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanError {
    /// Offending file path.
    pub file: String,
    /// Failure description.
    pub error: String,
}

/// Aggregate result of a full scan pass.
///
/// This is the neutral inventory document consumed by the report
/// serializers; field presence is stable across runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// One record per recognized artifact, in walk order.
    pub artifacts: Vec<ArtifactRecord>,
    /// Library dependencies from manifest files.
    pub dependencies: Vec<Dependency>,
    /// Scan-level errors (manifest parse failures and similar).
    pub errors: Vec<ScanError>,
}

impl ScanReport {
    /// Highest risk level across all artifact records.
    #[must_use]
    pub fn highest_risk(&self) -> RiskLevel {
        self.artifacts
            .iter()
            .map(|a| a.risk_level.level)
            .max()
            .unwrap_or(RiskLevel::Unknown)
    }

    /// Whether any artifact was assessed CRITICAL.
    #[must_use]
    pub fn has_critical(&self) -> bool {
        self.highest_risk() == RiskLevel::Critical
    }

    /// Process exit code for the invoking CLI.
    ///
    /// `2` for CRITICAL findings when `fail_on_risk` is set (takes
    /// precedence), `1` for scan errors, `0` otherwise.
    #[must_use]
    pub fn exit_code(&self, fail_on_risk: bool) -> i32 {
        if fail_on_risk && self.has_critical() {
            return 2;
        }
        if !self.errors.is_empty() {
            return 1;
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_order_is_total() {
        assert!(RiskLevel::Unknown < RiskLevel::Low);
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn test_risk_parse_tokens() {
        assert_eq!(RiskLevel::parse("CRITICAL"), RiskLevel::Critical);
        assert_eq!(RiskLevel::parse("low"), RiskLevel::Low);
        assert_eq!(RiskLevel::parse("bogus"), RiskLevel::Unknown);
        assert_eq!(RiskLevel::parse(""), RiskLevel::Unknown);
    }

    #[test]
    fn test_risk_assessment_display() {
        let plain = RiskAssessment::new(RiskLevel::Low);
        assert_eq!(plain.to_string(), "LOW");

        let qualified =
            RiskAssessment::with_qualifier(RiskLevel::Critical, "RCE Detected: os.system");
        assert_eq!(qualified.to_string(), "CRITICAL (RCE Detected: os.system)");
    }

    #[test]
    fn test_legal_status_restricted_markers() {
        assert_eq!(
            LegalStatus::from_license("cc-by-nc-4.0"),
            LegalStatus::LegalRisk("cc-by-nc-4.0".to_owned())
        );
        assert_eq!(
            LegalStatus::from_license("AGPL-3.0"),
            LegalStatus::LegalRisk("AGPL-3.0".to_owned())
        );
        assert_eq!(LegalStatus::from_license("MIT"), LegalStatus::Pass);
        assert_eq!(LegalStatus::from_license(""), LegalStatus::Unknown);
        assert_eq!(LegalStatus::from_license("Unknown"), LegalStatus::Unknown);
    }

    #[test]
    fn test_legal_status_display_carries_license() {
        let status = LegalStatus::from_license("cc-by-nc-sa-4.0");
        assert_eq!(status.to_string(), "LEGAL RISK (cc-by-nc-sa-4.0)");
    }

    #[test]
    fn test_threat_display_forms() {
        assert_eq!(Threat::dangerous("os", "system").to_string(), "os.system");
        assert_eq!(
            Threat::unsafe_import("os", "system").to_string(),
            "UNSAFE_IMPORT: os.system"
        );
    }

    #[test]
    fn test_record_serializes_stable_fields() {
        let record = ArtifactRecord::new("model.pt", Framework::PyTorch);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "model.pt");
        assert_eq!(json["framework"], "PyTorch");
        assert_eq!(json["content_hash"], HASH_ERROR);
        assert_eq!(json["risk_level"], "UNKNOWN");
        assert_eq!(json["legal_status"], "UNKNOWN");
        assert_eq!(json["license"], "Unknown");
        // No error captured — field omitted entirely.
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_dependency_serializes_library_type() {
        let dep = Dependency {
            name: "torch".to_owned(),
            version: "2.1.0".to_owned(),
        };
        let json = serde_json::to_value(&dep).unwrap();
        assert_eq!(json["type"], "library");
        assert_eq!(json["version"], "2.1.0");
    }

    #[test]
    fn test_exit_code_contract() {
        let mut report = ScanReport::default();
        assert_eq!(report.exit_code(true), 0);

        report.errors.push(ScanError {
            file: "requirements.txt".to_owned(),
            error: "unreadable".to_owned(),
        });
        assert_eq!(report.exit_code(true), 1);

        let mut critical = ArtifactRecord::new("evil.pt", Framework::PyTorch);
        critical.risk_level = RiskAssessment::with_qualifier(RiskLevel::Critical, "Legacy Binary");
        report.artifacts.push(critical);
        // CRITICAL takes precedence over scan errors.
        assert_eq!(report.exit_code(true), 2);
        // Without fail-on-risk the errors still surface.
        assert_eq!(report.exit_code(false), 1);
    }

    #[test]
    fn test_details_omit_absent_fields() {
        let details = ArtifactDetails {
            tensors: Some(3),
            ..ArtifactDetails::default()
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["tensors"], 3);
        assert!(json.get("threats").is_none());
        assert!(json.get("lint_report").is_none());
    }
}
