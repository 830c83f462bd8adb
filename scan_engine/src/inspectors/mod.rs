//! Inspector trait definition and inspector registry.
//!
//! Every artifact format gets one [`Inspector`]. Inspectors are stateless —
//! all context arrives via parameters — and total: they always return a
//! populated [`ArtifactRecord`], encoding failures in the record's `error`
//! field rather than propagating them.
//!
//! The registry function [`build_inspector_registry`] returns all format
//! inspectors; the engine dispatches to them by the walker's framework
//! classification.

pub mod gguf;
pub mod pytorch;
pub mod safetensors;

use crate::config::ScanConfig;
use crate::source::ByteSource;
use crate::types::{ArtifactRecord, Framework};

/// Every format inspector implements this trait.
///
/// Inspectors must be `Send + Sync` to support parallel execution via
/// rayon, and must not retain any state between artifacts.
pub trait Inspector: Send + Sync {
    /// Unique name for this inspector.
    fn name(&self) -> &'static str;

    /// The framework classification this inspector handles.
    fn framework(&self) -> Framework;

    /// Inspect one artifact.
    ///
    /// `name` is the basename the record is keyed by; `source` is
    /// positioned arbitrarily (inspectors rewind before reading). The
    /// returned record always has `framework`, `risk_level`, and
    /// `legal_status` populated; the content hash is filled in by the
    /// engine, which computes it before inspection.
    fn inspect(
        &self,
        name: &str,
        source: &mut dyn ByteSource,
        config: &ScanConfig,
    ) -> ArtifactRecord;
}

/// Build the inspector registry containing all format inspectors.
#[must_use]
pub fn build_inspector_registry() -> Vec<Box<dyn Inspector>> {
    vec![
        Box::new(pytorch::PytorchInspector),
        Box::new(safetensors::SafeTensorsInspector),
        Box::new(gguf::GgufInspector),
    ]
}

/// Find the inspector for a framework classification.
#[must_use]
pub fn inspector_for(
    registry: &[Box<dyn Inspector>],
    framework: Framework,
) -> Option<&dyn Inspector> {
    registry
        .iter()
        .find(|i| i.framework() == framework)
        .map(AsRef::as_ref)
}
