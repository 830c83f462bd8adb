//! AIsentry scan engine — static analysis for machine-learning model
//! artifacts and their dependency manifests.
//!
//! The engine walks a local tree (or a remote repository over HTTP range
//! reads) and produces one inventory record per recognized artifact:
//! a SHA-256 content hash, a framework classification, a security-risk
//! verdict from byte-level inspection (including a non-executing pickle
//! bytecode scan), and a legal-risk verdict from embedded license
//! metadata. A separate diff engine compares two inventories and flags
//! drift — risk escalation, hash changes, license changes, version bumps.
//!
//! Nothing in this crate ever executes artifact content.

pub mod config;
pub mod diff;
pub mod discovery;
pub mod engine;
pub mod inspectors;
pub mod linter;
pub mod manifest;
pub mod mockgen;
pub mod pickle;
pub mod remote;
pub mod reporter;
pub mod safety;
pub mod source;
pub mod types;

pub use config::ScanConfig;
pub use engine::ScanEngine;
pub use types::ScanReport;
