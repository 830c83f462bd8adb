//! PyTorch container inspection (`.pt`, `.pth`, `.bin`).
//!
//! The modern PyTorch checkpoint is a ZIP archive whose object graph
//! lives in a pickle member (`archive/data.pkl` or similar). The safety
//! scanner runs over that member's bytes, capped to keep zip bombs cheap.
//!
//! Files under a PyTorch extension that are not ZIP archives are either
//! plain-text path configuration (`.pth` site files — harmless) or legacy
//! raw-pickle checkpoints, which cannot be audited structurally and are
//! flagged CRITICAL outright.

use std::io::{Read, Seek, SeekFrom};

use zip::ZipArchive;

use crate::config::ScanConfig;
use crate::inspectors::Inspector;
use crate::linter::lint_pickle;
use crate::safety::{scan_pickle_stream, ScanMode};
use crate::source::ByteSource;
use crate::types::{ArtifactRecord, Framework, RiskAssessment, RiskLevel};

/// How many leading bytes the legacy-file probe examines.
const TEXT_PROBE_BYTES: usize = 8 * 1024;

/// Inspector for the PyTorch container format.
pub struct PytorchInspector;

impl Inspector for PytorchInspector {
    fn name(&self) -> &'static str {
        "pytorch"
    }

    fn framework(&self) -> Framework {
        Framework::PyTorch
    }

    fn inspect(
        &self,
        name: &str,
        source: &mut dyn ByteSource,
        config: &ScanConfig,
    ) -> ArtifactRecord {
        let mut record = ArtifactRecord::new(name, Framework::PyTorch);

        if let Err(e) = source.seek(SeekFrom::Start(0)) {
            record.error = Some(e.to_string());
            return record;
        }

        match ZipArchive::new(&mut *source) {
            Ok(mut archive) => inspect_zip(&mut record, &mut archive, config),
            Err(zip::result::ZipError::Io(e)) => {
                record.error = Some(e.to_string());
            }
            Err(_) => {
                // Not a ZIP container at all — legacy or path config.
                inspect_non_zip(&mut record, source, config);
            }
        }

        record
    }
}

/// Inspect a valid ZIP container: locate the pickle member and scan it.
fn inspect_zip<R: Read + Seek>(
    record: &mut ArtifactRecord,
    archive: &mut ZipArchive<R>,
    config: &ScanConfig,
) {
    let names: Vec<String> = archive.file_names().map(str::to_owned).collect();
    let pickle_member = names.iter().find(|n| n.ends_with(".pkl")).cloned();

    let mut threats = Vec::new();
    if let Some(member) = &pickle_member {
        match archive.by_name(member) {
            Ok(entry) => {
                let mut content = Vec::new();
                let mut limited = entry.take(config.pickle_cap_bytes);
                if let Err(e) = limited.read_to_end(&mut content) {
                    record.error = Some(e.to_string());
                }

                let mode = if config.strict_mode {
                    ScanMode::Strict
                } else {
                    ScanMode::Blocklist
                };
                threats = scan_pickle_stream(&content, mode);

                if config.lint {
                    record.details.lint_report = Some(lint_pickle(&content));
                }
            }
            Err(e) => record.error = Some(e.to_string()),
        }
    }

    record.risk_level = if !threats.is_empty() {
        let joined = threats
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        RiskAssessment::with_qualifier(RiskLevel::Critical, format!("RCE Detected: {joined}"))
    } else if pickle_member.is_some() {
        RiskAssessment::with_qualifier(RiskLevel::Medium, "Pickle Present")
    } else {
        RiskAssessment::with_qualifier(RiskLevel::Low, "No bytecode found")
    };

    record.details.internal_files = Some(names.len());
    record.details.threats = Some(threats);
}

/// Classify a non-ZIP file: plain-text path config is harmless, anything
/// else is an unauditable legacy binary.
fn inspect_non_zip(record: &mut ArtifactRecord, source: &mut dyn ByteSource, config: &ScanConfig) {
    if source.seek(SeekFrom::Start(0)).is_err() {
        record.risk_level =
            RiskAssessment::with_qualifier(RiskLevel::Critical, "Legacy Binary");
        return;
    }

    let mut probe = vec![0u8; TEXT_PROBE_BYTES];
    let read = read_up_to(source, &mut probe);
    probe.truncate(read);

    if is_path_config_text(&probe) {
        record.framework = Framework::PathConfig;
        record.risk_level = RiskAssessment::new(RiskLevel::Low);
        return;
    }

    record.risk_level = RiskAssessment::with_qualifier(RiskLevel::Critical, "Legacy Binary");

    if config.lint {
        // Legacy checkpoints are raw pickle streams; lint what we can read.
        if source.seek(SeekFrom::Start(0)).is_ok() {
            let mut content = Vec::new();
            let mut limited = source.take(config.pickle_cap_bytes);
            if limited.read_to_end(&mut content).is_ok() {
                record.details.lint_report = Some(lint_pickle(&content));
            }
        }
    }
}

/// Fill `buf` as far as the source allows; short reads are fine.
fn read_up_to(source: &mut dyn ByteSource, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) | Err(_) => break,
            Ok(n) => filled += n,
        }
    }
    filled
}

/// Whether a leading chunk of a file reads as path-config text: non-empty
/// UTF-8 lines with no control bytes beyond line and tab whitespace.
fn is_path_config_text(probe: &[u8]) -> bool {
    if probe.is_empty() {
        return false;
    }

    // The probe may split a multi-byte character; validate the prefix
    // that decodes cleanly.
    let text = match std::str::from_utf8(probe) {
        Ok(text) => text,
        Err(e) if e.valid_up_to() > 0 && e.error_len().is_none() => {
            // Only a truncated trailing character is tolerable.
            std::str::from_utf8(&probe[..e.valid_up_to()]).unwrap_or("")
        }
        Err(_) => return false,
    };

    if text.trim().is_empty() {
        return false;
    }

    text.chars()
        .all(|c| !c.is_control() || c == '\n' || c == '\r' || c == '\t')
}
