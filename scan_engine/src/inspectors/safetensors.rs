//! SafeTensors inspection (`.safetensors`).
//!
//! The format is inert by design — a little-endian `u64` header length,
//! a JSON header, then opaque tensor data. Risk is always LOW; what the
//! inspection extracts is the tensor inventory and the `__metadata__`
//! block, whose `license` entry drives the legal-status verdict.

use std::io::SeekFrom;

use byteorder::{ByteOrder, LittleEndian};

use crate::config::ScanConfig;
use crate::inspectors::Inspector;
use crate::source::ByteSource;
use crate::types::{ArtifactRecord, Framework, RiskAssessment, RiskLevel};

/// Upper bound on an acceptable header length. Anything larger is a
/// corrupt or hostile length field, not a real header.
const HEADER_CAP_BYTES: u64 = 100 * 1024 * 1024;

/// Inspector for the SafeTensors format.
pub struct SafeTensorsInspector;

impl Inspector for SafeTensorsInspector {
    fn name(&self) -> &'static str {
        "safetensors"
    }

    fn framework(&self) -> Framework {
        Framework::SafeTensors
    }

    fn inspect(
        &self,
        name: &str,
        source: &mut dyn ByteSource,
        _config: &ScanConfig,
    ) -> ArtifactRecord {
        let mut record = ArtifactRecord::new(name, Framework::SafeTensors);
        record.risk_level = RiskAssessment::new(RiskLevel::Low);

        if let Err(e) = read_header(&mut record, source) {
            record.error = Some(e);
        }

        record
    }
}

/// Read and decode the JSON header, populating details and license.
fn read_header(record: &mut ArtifactRecord, source: &mut dyn ByteSource) -> Result<(), String> {
    source
        .seek(SeekFrom::Start(0))
        .map_err(|e| e.to_string())?;

    let mut length_bytes = [0u8; 8];
    source
        .read_exact(&mut length_bytes)
        .map_err(|e| e.to_string())?;
    let header_len = LittleEndian::read_u64(&length_bytes);

    if header_len > HEADER_CAP_BYTES {
        return Err(format!("header length {header_len} exceeds cap"));
    }

    let mut header_bytes = vec![0u8; header_len as usize];
    source
        .read_exact(&mut header_bytes)
        .map_err(|e| e.to_string())?;

    let header: serde_json::Value =
        serde_json::from_slice(&header_bytes).map_err(|e| e.to_string())?;
    let object = header
        .as_object()
        .ok_or_else(|| "header is not a JSON object".to_owned())?;

    record.details.tensors = Some(object.len());

    let metadata = object.get("__metadata__").cloned();
    if let Some(license) = metadata
        .as_ref()
        .and_then(|m| m.get("license"))
        .and_then(|l| l.as_str())
    {
        record.set_license(license);
    }
    record.details.metadata = metadata;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn safetensors_bytes(header: &serde_json::Value) -> Vec<u8> {
        let header_json = serde_json::to_vec(header).unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(header_json.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&header_json);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes
    }

    fn inspect(bytes: Vec<u8>) -> ArtifactRecord {
        let mut source = Cursor::new(bytes);
        SafeTensorsInspector.inspect("model.safetensors", &mut source, &ScanConfig::default())
    }

    #[test]
    fn test_restricted_license_sets_legal_risk() {
        let header = serde_json::json!({
            "weight_tensor": {"dtype": "F32", "shape": [1], "data_offsets": [0, 4]},
            "__metadata__": {
                "format": "pt",
                "license": "cc-by-nc-4.0 (Non-Commercial)",
                "author": "Research Lab X"
            }
        });
        let record = inspect(safetensors_bytes(&header));

        assert_eq!(record.risk_level.to_string(), "LOW");
        assert!(record.legal_status.to_string().starts_with("LEGAL RISK"));
        assert_eq!(record.license, "cc-by-nc-4.0 (Non-Commercial)");
        assert_eq!(record.details.tensors, Some(2));
        assert!(record.error.is_none());
    }

    #[test]
    fn test_permissive_license_passes() {
        let header = serde_json::json!({
            "w": {"dtype": "F32", "shape": [1], "data_offsets": [0, 4]},
            "__metadata__": {"license": "apache-2.0"}
        });
        let record = inspect(safetensors_bytes(&header));

        assert_eq!(record.legal_status.to_string(), "PASS");
    }

    #[test]
    fn test_missing_metadata_leaves_license_unknown() {
        let header = serde_json::json!({
            "w": {"dtype": "F32", "shape": [1], "data_offsets": [0, 4]}
        });
        let record = inspect(safetensors_bytes(&header));

        assert_eq!(record.license, "Unknown");
        assert_eq!(record.legal_status.to_string(), "UNKNOWN");
        assert_eq!(record.details.tensors, Some(1));
    }

    #[test]
    fn test_truncated_header_records_error_but_stays_low() {
        // Declares an 8 KiB header over a 4-byte body.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&8192u64.to_le_bytes());
        bytes.extend_from_slice(b"{}\n\n");
        let record = inspect(bytes);

        assert!(record.error.is_some());
        // Safe by design even when unparsable.
        assert_eq!(record.risk_level.to_string(), "LOW");
    }

    #[test]
    fn test_hostile_header_length_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        bytes.extend_from_slice(b"junk");
        let record = inspect(bytes);

        assert!(record.error.unwrap().contains("exceeds cap"));
    }

    #[test]
    fn test_header_must_be_json() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&4u64.to_le_bytes());
        bytes.extend_from_slice(b"@@@@");
        let record = inspect(bytes);

        assert!(record.error.is_some());
        assert_eq!(record.details.tensors, None);
    }

    #[test]
    fn test_empty_file_records_error() {
        let record = inspect(Vec::new());
        assert!(record.error.is_some());
        assert_eq!(record.risk_level.to_string(), "LOW");
    }
}
