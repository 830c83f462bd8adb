//! Scan orchestrator — the main entry point for running scans.
//!
//! Coordinates discovery, hashing, format inspection, and manifest
//! parsing, and assembles the final [`ScanReport`]. Local targets are
//! walked on disk; `http(s)://` and `hf://` targets resolve to artifact
//! URLs read over HTTP ranges.
//!
//! Per-artifact inspections fan out across rayon workers and are
//! collected in walk order, so inventories are deterministic. Every
//! failure is captured as a value — an `error` on the artifact record or
//! an entry in the report's `errors` list — and never aborts the scan.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use rayon::prelude::*;

use crate::config::ScanConfig;
use crate::discovery::{classify_url, walk, DiscoveredEntry, FileKind};
use crate::inspectors::{build_inspector_registry, inspector_for, Inspector};
use crate::manifest::parse_requirements;
use crate::remote::{is_remote_target, resolve_targets, RemoteSource};
use crate::source::{hash_source, LocalSource};
use crate::types::{ArtifactRecord, Framework, ScanError, ScanReport};

/// The scan engine: configuration plus the format-inspector registry.
pub struct ScanEngine {
    config: ScanConfig,
    inspectors: Vec<Box<dyn Inspector>>,
}

/// What one discovered file contributed to the report.
enum EntryOutcome {
    Artifact(Box<ArtifactRecord>),
    Dependencies(Vec<crate::types::Dependency>),
    ManifestError(ScanError),
}

impl ScanEngine {
    /// Create an engine with the given configuration.
    #[must_use]
    pub fn new(config: ScanConfig) -> Self {
        let inspectors = build_inspector_registry();
        Self { config, inspectors }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run a scan over a local directory or a remote target.
    #[must_use]
    pub fn scan(&self, target: &str) -> ScanReport {
        if is_remote_target(target) {
            self.scan_remote(target)
        } else {
            self.scan_local(Path::new(target))
        }
    }

    /// Scan a local directory tree.
    #[must_use]
    pub fn scan_local(&self, root: &Path) -> ScanReport {
        // 1. Discover and classify, in deterministic walk order.
        let entries = walk(root, &self.config);

        // 2. Inspect in parallel; collect preserves walk order.
        let outcomes: Vec<EntryOutcome> = entries
            .par_iter()
            .map(|entry| self.process_entry(entry))
            .collect();

        // 3. Merge sequentially into the aggregate report.
        let mut report = ScanReport::default();
        for outcome in outcomes {
            match outcome {
                EntryOutcome::Artifact(record) => report.artifacts.push(*record),
                EntryOutcome::Dependencies(deps) => report.dependencies.extend(deps),
                EntryOutcome::ManifestError(error) => report.errors.push(error),
            }
        }
        report
    }

    /// Scan a remote target: resolve it to artifact URLs, then inspect
    /// each over a ranged byte source.
    #[must_use]
    pub fn scan_remote(&self, target: &str) -> ScanReport {
        let mut report = ScanReport::default();

        let urls = match resolve_targets(target, self.config.remote_timeout_secs) {
            Ok(urls) => urls,
            Err(e) => {
                report.errors.push(ScanError {
                    file: target.to_owned(),
                    error: e.to_string(),
                });
                return report;
            }
        };

        report.artifacts = urls
            .par_iter()
            .filter_map(|url| self.inspect_remote_artifact(url))
            .collect();
        report
    }

    /// Handle one discovered local file.
    fn process_entry(&self, entry: &DiscoveredEntry) -> EntryOutcome {
        match entry.kind {
            FileKind::Artifact(framework) => EntryOutcome::Artifact(Box::new(
                self.inspect_local_artifact(entry, framework),
            )),
            FileKind::Manifest => match parse_requirements(&entry.path) {
                Ok(deps) => EntryOutcome::Dependencies(deps),
                Err(error) => EntryOutcome::ManifestError(ScanError {
                    file: entry.path.display().to_string(),
                    error,
                }),
            },
            // The walker drops ignored files before dispatch.
            FileKind::Ignored => EntryOutcome::Dependencies(Vec::new()),
        }
    }

    /// Inspect one local artifact: open, hash, then parse.
    fn inspect_local_artifact(
        &self,
        entry: &DiscoveredEntry,
        framework: Framework,
    ) -> ArtifactRecord {
        let name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry.rel_path.clone());

        match LocalSource::open(&entry.path) {
            Ok(mut source) => {
                // Hash first — a parse failure must not lose the digest.
                let hash = hash_source(&mut source, self.config.hash_cap_bytes);
                let mut record = self.dispatch(&name, framework, &mut source);
                record.content_hash = hash;
                record
            }
            Err(e) => {
                log::warn!("could not open {}: {e}", entry.path.display());
                let mut record = ArtifactRecord::new(&name, framework);
                record.error = Some(e.to_string());
                record
            }
        }
    }

    /// Inspect one remote artifact URL. Unclassifiable URLs are skipped.
    fn inspect_remote_artifact(&self, url: &str) -> Option<ArtifactRecord> {
        let Some(framework) = classify_url(url) else {
            log::warn!("skipping remote target with unrecognized extension: {url}");
            return None;
        };
        let name = url.rsplit('/').next().unwrap_or(url).to_owned();

        match RemoteSource::open(url, self.config.remote_timeout_secs) {
            Ok(mut source) => {
                let hash = hash_source(&mut source, self.config.hash_cap_bytes);
                let mut record = self.dispatch(&name, framework, &mut source);
                record.content_hash = hash;
                Some(record)
            }
            Err(e) => {
                log::warn!("remote read failed for {url}: {e}");
                let mut record = ArtifactRecord::new(&name, framework);
                record.error = Some(e.to_string());
                Some(record)
            }
        }
    }

    /// Route a source to the inspector registered for its framework.
    ///
    /// Dispatch is wrapped in `catch_unwind` so a panic in one inspector
    /// becomes an error record instead of taking down the whole scan.
    fn dispatch(
        &self,
        name: &str,
        framework: Framework,
        source: &mut dyn crate::source::ByteSource,
    ) -> ArtifactRecord {
        let Some(inspector) = inspector_for(&self.inspectors, framework) else {
            // The walker only classifies frameworks we register, so this
            // is a record for completeness, not a reachable path.
            return ArtifactRecord::new(name, framework);
        };

        let result = catch_unwind(AssertUnwindSafe(|| {
            inspector.inspect(name, source, &self.config)
        }));

        match result {
            Ok(record) => record,
            Err(panic_info) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else if let Some(s) = panic_info.downcast_ref::<&str>() {
                    (*s).to_owned()
                } else {
                    "unknown panic".to_owned()
                };

                let mut record = ArtifactRecord::new(name, framework);
                record.error = Some(format!(
                    "internal error in inspector '{}': {panic_msg}",
                    inspector.name()
                ));
                record
            }
        }
    }
}
