//! GGUF inspection (`.gguf`).
//!
//! GGUF fronts the file with a typed key/value header: magic, version,
//! tensor count, then `kv_count` entries of `key_len || key || val_type
//! || value`. The inspection walks those entries looking for
//! `general.license`; array values (type 9) and unknown types end the
//! walk, since their layouts are not worth modelling for metadata
//! extraction.

use std::io::SeekFrom;

use byteorder::{ByteOrder, LittleEndian};

use crate::config::ScanConfig;
use crate::inspectors::Inspector;
use crate::source::ByteSource;
use crate::types::{ArtifactRecord, Framework, RiskAssessment, RiskLevel};

/// GGUF magic bytes.
const GGUF_MAGIC: &[u8; 4] = b"GGUF";

/// GGUF value type tag for strings.
const TYPE_STRING: u32 = 8;

/// GGUF value type tag for arrays — ends the header walk.
const TYPE_ARRAY: u32 = 9;

/// Upper bound on key and string-value lengths. Real keys are tens of
/// bytes; anything larger is a corrupt length field.
const KV_STRING_CAP_BYTES: u64 = 1024 * 1024;

/// The key whose string value populates the record license.
const LICENSE_KEY: &str = "general.license";

/// Inspector for the GGUF format.
pub struct GgufInspector;

impl Inspector for GgufInspector {
    fn name(&self) -> &'static str {
        "gguf"
    }

    fn framework(&self) -> Framework {
        Framework::Gguf
    }

    fn inspect(
        &self,
        name: &str,
        source: &mut dyn ByteSource,
        _config: &ScanConfig,
    ) -> ArtifactRecord {
        let mut record = ArtifactRecord::new(name, Framework::Gguf);

        match read_header(&mut record, source) {
            Ok(()) => {}
            Err(HeaderError::BadMagic) => {
                record.risk_level =
                    RiskAssessment::with_qualifier(RiskLevel::Unknown, "Invalid Header");
            }
            Err(HeaderError::Malformed(message)) => {
                // Keep whatever was parsed before the failure.
                record.error = Some(message);
            }
        }

        record
    }
}

/// Why the header walk stopped early.
enum HeaderError {
    /// The file does not start with the GGUF magic.
    BadMagic,
    /// Truncated or corrupt header content after a valid magic.
    Malformed(String),
}

/// Walk the GGUF header, populating details and license.
fn read_header(
    record: &mut ArtifactRecord,
    source: &mut dyn ByteSource,
) -> Result<(), HeaderError> {
    source
        .seek(SeekFrom::Start(0))
        .map_err(|e| HeaderError::Malformed(e.to_string()))?;

    let mut magic = [0u8; 4];
    source
        .read_exact(&mut magic)
        .map_err(|_| HeaderError::BadMagic)?;
    if &magic != GGUF_MAGIC {
        return Err(HeaderError::BadMagic);
    }

    // Magic is valid: from here on the format is inert, like SafeTensors.
    record.risk_level = RiskAssessment::new(RiskLevel::Low);

    let version = read_u32(source).map_err(HeaderError::Malformed)?;
    let tensor_count = read_u64(source).map_err(HeaderError::Malformed)?;
    let kv_count = read_u64(source).map_err(HeaderError::Malformed)?;

    record.details.version = Some(version);
    record.details.tensor_count = Some(tensor_count);

    let mut parsed = 0u64;
    for _ in 0..kv_count {
        match read_kv(record, source) {
            Ok(KvOutcome::Parsed) => parsed += 1,
            Ok(KvOutcome::Unsupported) => break,
            Err(message) => {
                record.details.kv_parsed = Some(parsed);
                return Err(HeaderError::Malformed(message));
            }
        }
    }
    record.details.kv_parsed = Some(parsed);

    Ok(())
}

/// Result of parsing one key/value entry.
enum KvOutcome {
    /// Entry fully consumed.
    Parsed,
    /// Array or unknown value type — stop the walk.
    Unsupported,
}

/// Parse one `key_len || key || val_type || value` entry.
fn read_kv(record: &mut ArtifactRecord, source: &mut dyn ByteSource) -> Result<KvOutcome, String> {
    let key_len = read_u64(source)?;
    if key_len > KV_STRING_CAP_BYTES {
        return Err(format!("key length {key_len} exceeds cap"));
    }

    let mut key_bytes = vec![0u8; key_len as usize];
    source
        .read_exact(&mut key_bytes)
        .map_err(|e| e.to_string())?;
    let key = String::from_utf8_lossy(&key_bytes).into_owned();

    let val_type = read_u32(source)?;

    if val_type == TYPE_STRING {
        let val_len = read_u64(source)?;
        if val_len > KV_STRING_CAP_BYTES {
            return Err(format!("value length {val_len} exceeds cap"));
        }
        let mut val_bytes = vec![0u8; val_len as usize];
        source
            .read_exact(&mut val_bytes)
            .map_err(|e| e.to_string())?;

        if key == LICENSE_KEY {
            record.set_license(String::from_utf8_lossy(&val_bytes).into_owned());
        }
        return Ok(KvOutcome::Parsed);
    }

    match scalar_size(val_type) {
        Some(size) => {
            let mut discard = vec![0u8; size];
            source.read_exact(&mut discard).map_err(|e| e.to_string())?;
            Ok(KvOutcome::Parsed)
        }
        // Arrays (type 9) and unknown types: layout not modelled.
        None => Ok(KvOutcome::Unsupported),
    }
}

/// Encoded size of a scalar value type, or `None` for array/unknown.
fn scalar_size(val_type: u32) -> Option<usize> {
    match val_type {
        // uint8, int8, bool
        0 | 1 | 7 => Some(1),
        // uint16, int16
        2 | 3 => Some(2),
        // uint32, int32, float32
        4 | 5 | 6 => Some(4),
        // uint64, int64, float64
        10 | 11 | 12 => Some(8),
        TYPE_ARRAY => None,
        _ => None,
    }
}

fn read_u32(source: &mut dyn ByteSource) -> Result<u32, String> {
    let mut buf = [0u8; 4];
    source.read_exact(&mut buf).map_err(|e| e.to_string())?;
    Ok(LittleEndian::read_u32(&buf))
}

fn read_u64(source: &mut dyn ByteSource) -> Result<u64, String> {
    let mut buf = [0u8; 8];
    source.read_exact(&mut buf).map_err(|e| e.to_string())?;
    Ok(LittleEndian::read_u64(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Minimal valid GGUF: version 3, no tensors, one KV pair.
    fn gguf_with_license(license: &str) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"GGUF");
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&1u64.to_le_bytes());

        let key = LICENSE_KEY.as_bytes();
        bytes.extend_from_slice(&(key.len() as u64).to_le_bytes());
        bytes.extend_from_slice(key);
        bytes.extend_from_slice(&TYPE_STRING.to_le_bytes());
        bytes.extend_from_slice(&(license.len() as u64).to_le_bytes());
        bytes.extend_from_slice(license.as_bytes());

        bytes
    }

    fn inspect(bytes: Vec<u8>) -> ArtifactRecord {
        let mut source = Cursor::new(bytes);
        GgufInspector.inspect("model.gguf", &mut source, &ScanConfig::default())
    }

    #[test]
    fn test_license_kv_sets_legal_status() {
        let record = inspect(gguf_with_license("cc-by-nc-sa-4.0"));

        assert_eq!(record.framework, Framework::Gguf);
        assert_eq!(record.risk_level.to_string(), "LOW");
        assert_eq!(record.license, "cc-by-nc-sa-4.0");
        assert!(record.legal_status.to_string().starts_with("LEGAL RISK"));
        assert_eq!(record.details.version, Some(3));
        assert_eq!(record.details.kv_parsed, Some(1));
    }

    #[test]
    fn test_invalid_magic() {
        let record = inspect(b"BAD_MAGIC_HEADER".to_vec());
        assert!(record.risk_level.to_string().contains("Invalid Header"));
    }

    #[test]
    fn test_numeric_kv_entries_are_skipped() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"GGUF");
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&1u64.to_le_bytes());
        let key = b"general.weight_count";
        bytes.extend_from_slice(&(key.len() as u64).to_le_bytes());
        bytes.extend_from_slice(key);
        bytes.extend_from_slice(&0u32.to_le_bytes()); // uint8
        bytes.push(0x01);

        let record = inspect(bytes);
        assert_eq!(record.risk_level.to_string(), "LOW");
        assert_eq!(record.details.kv_parsed, Some(1));
        assert!(record.error.is_none());
    }

    #[test]
    fn test_array_entry_stops_the_walk() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"GGUF");
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&2u64.to_le_bytes());
        let key = b"general.arch";
        bytes.extend_from_slice(&(key.len() as u64).to_le_bytes());
        bytes.extend_from_slice(key);
        bytes.extend_from_slice(&TYPE_ARRAY.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());

        let record = inspect(bytes);
        assert_eq!(record.risk_level.to_string(), "LOW");
        assert_eq!(record.details.kv_parsed, Some(0));
        assert!(record.error.is_none());
    }

    #[test]
    fn test_truncated_header_keeps_partial_details() {
        let mut bytes = gguf_with_license("mit");
        bytes.truncate(bytes.len() - 2);
        let record = inspect(bytes);

        assert_eq!(record.risk_level.to_string(), "LOW");
        assert!(record.error.is_some());
        assert_eq!(record.details.version, Some(3));
        assert_eq!(record.details.kv_parsed, Some(0));
    }

    #[test]
    fn test_hostile_key_length_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"GGUF");
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());

        let record = inspect(bytes);
        assert!(record.error.unwrap().contains("exceeds cap"));
    }

    #[test]
    fn test_empty_file_is_invalid_header() {
        let record = inspect(Vec::new());
        assert!(record.risk_level.to_string().contains("Invalid Header"));
    }

    #[test]
    fn test_permissive_license_passes() {
        let record = inspect(gguf_with_license("apache-2.0"));
        assert_eq!(record.legal_status.to_string(), "PASS");
    }
}
