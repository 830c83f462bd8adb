//! Mock artifact generation for demos and tests.
//!
//! Builds harmless files that trip each detector: a PyTorch ZIP whose
//! pickle resolves `posix.system` (the RCE signature, pointed at an echo),
//! a SafeTensors file with non-commercial license metadata, a GGUF with a
//! restrictive `general.license`, and a baseline/drifted SBOM pair that
//! exercises every diff category.
//!
//! Everything is deterministic — stand-in hashes are derived from the
//! component name, not random.

use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::diff::{Component, ComponentHash};
use crate::types::LegalStatus;

/// Protocol-2 pickle resolving `posix.system` and reducing over an echo
/// command. The scanner flags it; loading it would only print a line.
pub const MOCK_RCE_PICKLE: &[u8] =
    b"\x80\x02cposix\nsystem\nX\x0e\x00\x00\x00echo pwned :-(\x85R.";

/// Write a PyTorch-style archive containing the mock RCE pickle.
///
/// # Errors
///
/// Returns any I/O error from writing the archive.
pub fn write_mock_malware_pt(dir: &Path) -> std::io::Result<PathBuf> {
    let path = dir.join("mock_malware.pt");
    let file = std::fs::File::create(&path)?;
    let mut writer = ZipWriter::new(file);

    writer.start_file("archive/data.pkl", SimpleFileOptions::default())?;
    writer.write_all(MOCK_RCE_PICKLE)?;
    writer.start_file("archive/version", SimpleFileOptions::default())?;
    writer.write_all(b"3")?;
    writer.finish()?;

    Ok(path)
}

/// Write a SafeTensors file with non-commercial license metadata.
///
/// # Errors
///
/// Returns any I/O error from writing the file.
pub fn write_mock_restricted_safetensors(dir: &Path) -> std::io::Result<PathBuf> {
    let header = serde_json::json!({
        "weight_tensor": {"dtype": "F32", "shape": [1], "data_offsets": [0, 4]},
        "__metadata__": {
            "format": "pt",
            "license": "cc-by-nc-4.0 (Non-Commercial)",
            "author": "Research Lab X"
        }
    });
    let header_json = serde_json::to_vec(&header)?;

    let path = dir.join("mock_restricted.safetensors");
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(header_json.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&header_json);
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    std::fs::write(&path, bytes)?;

    Ok(path)
}

/// Write a minimal valid GGUF header with a restrictive license.
///
/// # Errors
///
/// Returns any I/O error from writing the file.
pub fn write_mock_gguf(dir: &Path) -> std::io::Result<PathBuf> {
    let path = dir.join("mock_restricted.gguf");
    let mut bytes = Vec::new();

    bytes.extend_from_slice(b"GGUF");
    bytes.extend_from_slice(&3u32.to_le_bytes());
    bytes.extend_from_slice(&0u64.to_le_bytes()); // tensor count
    bytes.extend_from_slice(&1u64.to_le_bytes()); // kv count

    let key = b"general.license";
    bytes.extend_from_slice(&(key.len() as u64).to_le_bytes());
    bytes.extend_from_slice(key);
    bytes.extend_from_slice(&8u32.to_le_bytes()); // string type

    let value = b"cc-by-nc-sa-4.0";
    bytes.extend_from_slice(&(value.len() as u64).to_le_bytes());
    bytes.extend_from_slice(value);

    std::fs::write(&path, bytes)?;
    Ok(path)
}

/// Write a baseline/drifted SBOM pair into `dir/demo_data/`.
///
/// The drifted document adds a CRITICAL component, removes one, bumps a
/// version, flips a license to non-commercial, and changes a hash — one
/// trigger for every diff category.
///
/// # Errors
///
/// Returns any I/O error from writing the documents.
pub fn write_demo_diff_sboms(dir: &Path) -> std::io::Result<(PathBuf, PathBuf)> {
    let demo_dir = dir.join("demo_data");
    std::fs::create_dir_all(&demo_dir)?;

    let old_components = vec![
        demo_component("stable-lib", "1.0.0", "LOW", "MIT", false),
        demo_component("stable-model.pt", "v1", "LOW", "MIT", true),
        demo_component("drift-risk.pt", "v1", "LOW", "MIT", true),
        demo_component("drift-license.pt", "v1", "LOW", "MIT", true),
        demo_component("drift-ver-lib", "1.0.0", "LOW", "MIT", false),
        demo_component("drift-hash.pt", "v1", "LOW", "MIT", true),
        demo_component("removed-lib", "0.9.0", "LOW", "MIT", false),
    ];

    let mut new_components = Vec::new();
    for component in &old_components {
        match component.name.as_str() {
            "removed-lib" => {}
            "drift-risk.pt" => {
                new_components.push(demo_component("drift-risk.pt", "v1", "CRITICAL", "MIT", true));
            }
            "drift-license.pt" => new_components.push(demo_component(
                "drift-license.pt",
                "v1",
                "LOW",
                "CC-BY-NC-4.0",
                true,
            )),
            "drift-ver-lib" => {
                new_components.push(demo_component("drift-ver-lib", "1.0.1", "LOW", "MIT", false));
            }
            "drift-hash.pt" => {
                let mut drifted = component.clone();
                drifted.hashes = vec![ComponentHash {
                    alg: "SHA-256".to_owned(),
                    content: format!("deadbeef{}", "0".repeat(56)),
                }];
                new_components.push(drifted);
            }
            _ => new_components.push(component.clone()),
        }
    }
    new_components.push(demo_component("added-new-lib", "2.0.0", "LOW", "Apache-2.0", false));
    new_components.push(demo_component("added-critical.pt", "v1", "CRITICAL", "Unknown", true));

    let old_path = demo_dir.join("sbom_baseline.json");
    let new_path = demo_dir.join("sbom_drifted.json");
    write_components(&old_path, &old_components)?;
    write_components(&new_path, &new_components)?;

    Ok((old_path, new_path))
}

/// Build one demo component with the description side-channel populated.
fn demo_component(name: &str, version: &str, risk: &str, license: &str, is_model: bool) -> Component {
    let legal = LegalStatus::from_license(license);
    let description =
        format!("Risk: {risk} | Framework: PyTorch | Legal: {legal} | License: {license}");

    let hashes = if is_model {
        // Deterministic stand-in digest derived from the name.
        vec![ComponentHash {
            alg: "SHA-256".to_owned(),
            content: hex::encode(Sha256::digest(name.as_bytes())),
        }]
    } else {
        Vec::new()
    };

    Component {
        name: name.to_owned(),
        version: Some(version.to_owned()),
        description: Some(description),
        hashes,
    }
}

/// Serialize a component list as `{"components": [...]}`.
fn write_components(path: &Path, components: &[Component]) -> std::io::Result<()> {
    let document = serde_json::json!({ "components": components });
    std::fs::write(path, serde_json::to_vec_pretty(&document)?)
}
