//! Report serialization for the scan engine.
//!
//! Produces four output formats from one [`ScanReport`]:
//!
//! 1. **JSON** — the neutral inventory document, via direct `serde_json`
//!    serialization. Field presence is stable.
//! 2. **CycloneDX JSON** — component list for SBOM tooling. Risk, legal
//!    status, and license are encoded into each model component's
//!    `description` (`Risk: … | Framework: … | Legal: … | License: …`),
//!    which is exactly the shape the diff engine parses back.
//! 3. **SPDX 2.3 JSON** — compliance document with one package per
//!    artifact and dependency.
//! 4. **Markdown** — a human-readable table for CI artifacts.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::types::{ArtifactRecord, ScanReport, HASH_ERROR};

/// Engine version stamped into tool metadata.
const ENGINE_VERSION: &str = "0.4.0";

// ---------------------------------------------------------------------------
// Neutral JSON output
// ---------------------------------------------------------------------------

/// Serialize a [`ScanReport`] to pretty-printed JSON.
///
/// # Errors
///
/// Returns an error message if serialization fails (should not happen for
/// valid data).
pub fn to_json(report: &ScanReport) -> Result<String, String> {
    serde_json::to_string_pretty(report).map_err(|e| format!("JSON serialization failed: {e}"))
}

// ---------------------------------------------------------------------------
// CycloneDX output
// ---------------------------------------------------------------------------

/// The description side-channel consumed by the diff engine.
#[must_use]
pub fn component_description(record: &ArtifactRecord) -> String {
    format!(
        "Risk: {} | Framework: {} | Legal: {} | License: {}",
        record.risk_level, record.framework, record.legal_status, record.license
    )
}

/// Serialize a [`ScanReport`] to a CycloneDX-style JSON document.
///
/// `spec_version` selects the declared schema version (`"1.5"` or
/// `"1.6"`).
///
/// # Errors
///
/// Returns an error message if serialization fails.
pub fn to_cyclonedx(report: &ScanReport, spec_version: &str) -> Result<String, String> {
    let mut components = Vec::new();

    for artifact in &report.artifacts {
        let hashes = if artifact.content_hash == HASH_ERROR {
            Vec::new()
        } else {
            vec![CdxHash {
                alg: "SHA-256".to_owned(),
                content: artifact.content_hash.clone(),
            }]
        };

        let licenses = if artifact.license == "Unknown" {
            Vec::new()
        } else {
            vec![CdxLicenseChoice {
                license: CdxLicense {
                    name: artifact.license.clone(),
                },
            }]
        };

        components.push(CdxComponent {
            component_type: "machine-learning-model".to_owned(),
            name: artifact.name.clone(),
            version: None,
            description: Some(component_description(artifact)),
            hashes,
            licenses,
        });
    }

    for dep in &report.dependencies {
        components.push(CdxComponent {
            component_type: "library".to_owned(),
            name: dep.name.clone(),
            version: Some(dep.version.clone()),
            description: None,
            hashes: Vec::new(),
            licenses: Vec::new(),
        });
    }

    let bom = CdxBom {
        bom_format: "CycloneDX".to_owned(),
        spec_version: spec_version.to_owned(),
        version: 1,
        metadata: CdxMetadata {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            tools: vec![CdxTool {
                name: "aisentry".to_owned(),
                version: ENGINE_VERSION.to_owned(),
            }],
        },
        components,
    };

    serde_json::to_string_pretty(&bom).map_err(|e| format!("CycloneDX serialization failed: {e}"))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CdxBom {
    bom_format: String,
    spec_version: String,
    version: u32,
    metadata: CdxMetadata,
    components: Vec<CdxComponent>,
}

#[derive(Serialize)]
struct CdxMetadata {
    timestamp: String,
    tools: Vec<CdxTool>,
}

#[derive(Serialize)]
struct CdxTool {
    name: String,
    version: String,
}

#[derive(Serialize)]
struct CdxComponent {
    #[serde(rename = "type")]
    component_type: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    hashes: Vec<CdxHash>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    licenses: Vec<CdxLicenseChoice>,
}

#[derive(Serialize)]
struct CdxHash {
    alg: String,
    content: String,
}

#[derive(Serialize)]
struct CdxLicenseChoice {
    license: CdxLicense,
}

#[derive(Serialize)]
struct CdxLicense {
    name: String,
}

// ---------------------------------------------------------------------------
// SPDX output
// ---------------------------------------------------------------------------

/// Serialize a [`ScanReport`] to an SPDX 2.3 JSON document with the
/// current time as creation timestamp.
///
/// # Errors
///
/// Returns an error message if serialization fails.
pub fn to_spdx(report: &ScanReport) -> Result<String, String> {
    to_spdx_at(report, Utc::now())
}

/// [`to_spdx`] with an explicit creation timestamp.
///
/// # Errors
///
/// Returns an error message if serialization fails.
pub fn to_spdx_at(report: &ScanReport, created: DateTime<Utc>) -> Result<String, String> {
    let created = created.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut packages = Vec::new();
    let mut relationships = Vec::new();

    for (index, artifact) in report.artifacts.iter().enumerate() {
        let spdx_id = format!(
            "SPDXRef-Artifact-{}-{index}",
            sanitize_spdx_id(&artifact.name)
        );
        let checksums = if artifact.content_hash == HASH_ERROR {
            Vec::new()
        } else {
            vec![SpdxChecksum {
                algorithm: "SHA256".to_owned(),
                checksum_value: artifact.content_hash.clone(),
            }]
        };

        packages.push(SpdxPackage {
            spdx_id: spdx_id.clone(),
            name: artifact.name.clone(),
            version_info: "unknown".to_owned(),
            download_location: "NOASSERTION".to_owned(),
            files_analyzed: false,
            license_concluded: "NOASSERTION".to_owned(),
            license_declared: "NOASSERTION".to_owned(),
            copyright_text: "NOASSERTION".to_owned(),
            comment: Some(format!(
                "Risk: {}\nFramework: {}\nLegal: {}",
                artifact.risk_level, artifact.framework, artifact.legal_status
            )),
            checksums,
        });
        relationships.push(SpdxRelationship {
            spdx_element_id: "SPDXRef-DOCUMENT".to_owned(),
            relationship_type: "DESCRIBES".to_owned(),
            related_spdx_element: spdx_id,
        });
    }

    for dep in &report.dependencies {
        let spdx_id = format!(
            "SPDXRef-Lib-{}-{}",
            sanitize_spdx_id(&dep.name),
            sanitize_spdx_id(&dep.version)
        );
        packages.push(SpdxPackage {
            spdx_id: spdx_id.clone(),
            name: dep.name.clone(),
            version_info: dep.version.clone(),
            download_location: "NOASSERTION".to_owned(),
            files_analyzed: false,
            license_concluded: "NOASSERTION".to_owned(),
            license_declared: "NOASSERTION".to_owned(),
            copyright_text: "NOASSERTION".to_owned(),
            comment: None,
            checksums: Vec::new(),
        });
        relationships.push(SpdxRelationship {
            spdx_element_id: "SPDXRef-DOCUMENT".to_owned(),
            relationship_type: "DESCRIBES".to_owned(),
            related_spdx_element: spdx_id,
        });
    }

    let document = SpdxDocument {
        spdx_version: "SPDX-2.3".to_owned(),
        data_license: "CC0-1.0".to_owned(),
        spdx_id: "SPDXRef-DOCUMENT".to_owned(),
        name: "AIsentry-Scan".to_owned(),
        document_namespace: format!(
            "https://aisentry.dev/spdxdocs/aisentry-scan-{}",
            created.replace(':', "-")
        ),
        creation_info: SpdxCreationInfo {
            created,
            creators: vec![format!("Tool: aisentry-{ENGINE_VERSION}")],
        },
        packages,
        relationships,
    };

    serde_json::to_string_pretty(&document)
        .map_err(|e| format!("SPDX serialization failed: {e}"))
}

/// SPDX identifiers allow only alphanumerics, `.` and `-`.
fn sanitize_spdx_id(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxDocument {
    spdx_version: String,
    data_license: String,
    #[serde(rename = "SPDXID")]
    spdx_id: String,
    name: String,
    document_namespace: String,
    creation_info: SpdxCreationInfo,
    packages: Vec<SpdxPackage>,
    relationships: Vec<SpdxRelationship>,
}

#[derive(Serialize)]
struct SpdxCreationInfo {
    created: String,
    creators: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxPackage {
    #[serde(rename = "SPDXID")]
    spdx_id: String,
    name: String,
    version_info: String,
    download_location: String,
    files_analyzed: bool,
    license_concluded: String,
    license_declared: String,
    copyright_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    checksums: Vec<SpdxChecksum>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxChecksum {
    algorithm: String,
    checksum_value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxRelationship {
    spdx_element_id: String,
    relationship_type: String,
    related_spdx_element: String,
}

// ---------------------------------------------------------------------------
// Markdown output
// ---------------------------------------------------------------------------

/// Render a GitHub-flavored Markdown report for CI artifacts.
#[must_use]
pub fn to_markdown(report: &ScanReport) -> String {
    let mut lines = Vec::new();
    lines.push("## AIsentry Report".to_owned());
    lines.push(String::new());
    lines.push(format!(
        "- Dependencies found: **{}**",
        report.dependencies.len()
    ));
    lines.push(String::new());
    lines.push("| Filename | Framework | Security Risk | Legal Risk | SHA256 Hash |".to_owned());
    lines.push("| :--- | :--- | :--- | :--- | :--- |".to_owned());

    for artifact in &report.artifacts {
        let risk = artifact.risk_level.to_string();
        let legal = artifact.legal_status.to_string();

        let risk_icon = if risk.contains("CRITICAL") || risk.contains("HIGH") {
            "🔴"
        } else if risk.contains("MEDIUM") {
            "🟡"
        } else {
            "🟢"
        };
        let legal_icon = if legal.contains("RISK") { "🔴" } else { "🟢" };

        let hash_short = if artifact.content_hash == HASH_ERROR {
            "N/A".to_owned()
        } else {
            artifact.content_hash.chars().take(8).collect()
        };

        lines.push(format!(
            "| {} | {} | {risk_icon} {risk} | {legal_icon} {legal} | {hash_short} |",
            artifact.name, artifact.framework
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::SbomDocument;
    use crate::types::{ArtifactRecord, Dependency, Framework, RiskAssessment, RiskLevel};
    use chrono::TimeZone;

    fn sample_report() -> ScanReport {
        let mut malware = ArtifactRecord::new("mock_malware.pt", Framework::PyTorch);
        malware.risk_level =
            RiskAssessment::with_qualifier(RiskLevel::Critical, "RCE Detected: os.system");
        malware.content_hash = "ab".repeat(32);

        let mut restricted = ArtifactRecord::new("restricted.safetensors", Framework::SafeTensors);
        restricted.risk_level = RiskAssessment::new(RiskLevel::Low);
        restricted.set_license("cc-by-nc-4.0");
        // Hash deliberately left at the error sentinel.

        ScanReport {
            artifacts: vec![malware, restricted],
            dependencies: vec![Dependency {
                name: "torch".to_owned(),
                version: "2.1.0".to_owned(),
            }],
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_neutral_json_has_stable_top_level_fields() {
        let json = to_json(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["artifacts"].is_array());
        assert!(value["dependencies"].is_array());
        assert!(value["errors"].is_array());
    }

    #[test]
    fn test_cyclonedx_components_and_hashes() {
        let json = to_cyclonedx(&sample_report(), "1.6").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["bomFormat"], "CycloneDX");
        assert_eq!(value["specVersion"], "1.6");

        let components = value["components"].as_array().unwrap();
        assert_eq!(components.len(), 3);

        let malware = &components[0];
        assert_eq!(malware["type"], "machine-learning-model");
        assert_eq!(malware["hashes"][0]["alg"], "SHA-256");

        // The hash-error sentinel must not serialize as a real hash.
        let restricted = &components[1];
        assert!(restricted.get("hashes").is_none());
        assert_eq!(restricted["licenses"][0]["license"]["name"], "cc-by-nc-4.0");

        let library = &components[2];
        assert_eq!(library["type"], "library");
        assert_eq!(library["version"], "2.1.0");
    }

    #[test]
    fn test_cyclonedx_description_round_trips_through_diff_parser() {
        let json = to_cyclonedx(&sample_report(), "1.6").unwrap();
        let document: SbomDocument = serde_json::from_str(&json).unwrap();

        let malware = &document.components[0];
        assert_eq!(malware.risk(), "CRITICAL");
        assert_eq!(malware.legal_status(), "UNKNOWN");
        assert_eq!(malware.license(), "Unknown");

        let restricted = &document.components[1];
        assert_eq!(restricted.risk(), "LOW");
        assert_eq!(restricted.legal_status(), "LEGAL RISK");
        assert_eq!(restricted.license(), "cc-by-nc-4.0");
    }

    #[test]
    fn test_spdx_document_shape() {
        let created = chrono::Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        let json = to_spdx_at(&sample_report(), created).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["spdxVersion"], "SPDX-2.3");
        assert_eq!(value["dataLicense"], "CC0-1.0");
        assert_eq!(value["SPDXID"], "SPDXRef-DOCUMENT");
        assert_eq!(value["creationInfo"]["created"], "2026-06-01T12:00:00Z");

        let packages = value["packages"].as_array().unwrap();
        assert_eq!(packages.len(), 3);
        assert!(packages[0]["SPDXID"]
            .as_str()
            .unwrap()
            .starts_with("SPDXRef-Artifact-mock-malware-pt"));
        assert_eq!(packages[0]["checksums"][0]["algorithm"], "SHA256");

        let relationships = value["relationships"].as_array().unwrap();
        assert_eq!(relationships.len(), 3);
        assert!(relationships
            .iter()
            .all(|r| r["relationshipType"] == "DESCRIBES"));
    }

    #[test]
    fn test_markdown_table() {
        let md = to_markdown(&sample_report());
        assert!(md.contains("## AIsentry Report"));
        assert!(md.contains("Dependencies found: **1**"));
        assert!(md.contains("| mock_malware.pt | PyTorch | 🔴"));
        assert!(md.contains("abababab"));
        // Sentinel hash renders as N/A.
        assert!(md.contains("| N/A |"));
    }
}
