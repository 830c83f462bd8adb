//! Configuration loading and resolution for the scan engine.
//!
//! Resolution order:
//! 1. `aisentry.toml` (`[scan]` section) in the scan root
//! 2. Built-in defaults
//!
//! CLI flags are applied on top by the caller after loading.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hashing reads at most this many bytes of an artifact (zip bombs and
/// multi-gigabyte checkpoints stay cheap to fingerprint).
pub const DEFAULT_HASH_CAP_BYTES: u64 = 100 * 1024 * 1024;

/// At most this many bytes of a single embedded pickle entry are scanned.
pub const DEFAULT_PICKLE_CAP_BYTES: u64 = 10 * 1024 * 1024;

/// Default timeout for a single remote range read, in seconds.
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Error raised when a config file exists but cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("could not read {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML or has the wrong shape.
    #[error("could not parse {path}: {source}")]
    Parse {
        /// Offending path.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
}

/// Complete scan engine configuration.
///
/// Passed by reference to the walker, the inspectors, and the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Strict allowlist mode: flag every symbol outside the allow-rule,
    /// not just the blocklist entries.
    pub strict_mode: bool,

    /// Attach a migration-lint report to PyTorch records.
    pub lint: bool,

    /// Whether CRITICAL findings should produce exit code 2.
    pub fail_on_risk: bool,

    /// Upper bound on bytes hashed per artifact.
    pub hash_cap_bytes: u64,

    /// Upper bound on bytes read from a single embedded pickle entry.
    pub pickle_cap_bytes: u64,

    /// Timeout for a single remote range read, in seconds.
    pub remote_timeout_secs: u64,

    /// Additional path exclusion patterns (prefix or glob), beyond the
    /// hardcoded directory excludes.
    pub exclude: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            lint: false,
            fail_on_risk: true,
            hash_cap_bytes: DEFAULT_HASH_CAP_BYTES,
            pickle_cap_bytes: DEFAULT_PICKLE_CAP_BYTES,
            remote_timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
            exclude: Vec::new(),
        }
    }
}

impl ScanConfig {
    /// Load configuration for a scan rooted at `root`.
    ///
    /// Reads `aisentry.toml` from the root when present; missing file
    /// means defaults. A present-but-broken file is an error — silently
    /// ignoring a config the user wrote would be worse than failing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `aisentry.toml` exists but cannot be
    /// read or parsed.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join("aisentry.toml");
        if !path.is_file() {
            return Ok(Self::default());
        }

        let display = path.display().to_string();
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let file: TomlConfigFile = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;

        let mut config = Self::default();
        if let Some(section) = file.scan {
            config.apply_toml(section);
        }
        Ok(config)
    }

    /// Merge a parsed `[scan]` section into this config.
    fn apply_toml(&mut self, section: TomlScanSection) {
        if let Some(v) = section.strict_mode {
            self.strict_mode = v;
        }
        if let Some(v) = section.lint {
            self.lint = v;
        }
        if let Some(v) = section.fail_on_risk {
            self.fail_on_risk = v;
        }
        if let Some(v) = section.hash_cap_bytes {
            self.hash_cap_bytes = v;
        }
        if let Some(v) = section.pickle_cap_bytes {
            self.pickle_cap_bytes = v;
        }
        if let Some(v) = section.remote_timeout_secs {
            self.remote_timeout_secs = v;
        }
        if let Some(v) = section.exclude {
            self.exclude = v;
        }
    }
}

// ---------------------------------------------------------------------------
// TOML deserialization helpers
// ---------------------------------------------------------------------------

/// Raw TOML structure for `aisentry.toml`.
#[derive(Debug, Deserialize)]
struct TomlConfigFile {
    scan: Option<TomlScanSection>,
}

/// The `[scan]` section inside the TOML file. Every field is optional;
/// absent fields keep their defaults.
#[derive(Debug, Deserialize)]
struct TomlScanSection {
    strict_mode: Option<bool>,
    lint: Option<bool>,
    fail_on_risk: Option<bool>,
    hash_cap_bytes: Option<u64>,
    pickle_cap_bytes: Option<u64>,
    remote_timeout_secs: Option<u64>,
    exclude: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert!(!config.strict_mode);
        assert!(!config.lint);
        assert!(config.fail_on_risk);
        assert_eq!(config.hash_cap_bytes, 100 * 1024 * 1024);
        assert_eq!(config.pickle_cap_bytes, 10 * 1024 * 1024);
        assert_eq!(config.remote_timeout_secs, 10);
        assert!(config.exclude.is_empty());
    }

    #[test]
    fn test_load_missing_file_is_defaults() {
        let dir = tempdir().unwrap();
        let config = ScanConfig::load(dir.path()).unwrap();
        assert!(!config.strict_mode);
    }

    #[test]
    fn test_load_partial_section() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("aisentry.toml"),
            "[scan]\nstrict_mode = true\nexclude = [\"vendor/\"]\n",
        )
        .unwrap();

        let config = ScanConfig::load(dir.path()).unwrap();
        assert!(config.strict_mode);
        assert_eq!(config.exclude, vec!["vendor/".to_owned()]);
        // Unspecified fields keep their defaults.
        assert_eq!(config.pickle_cap_bytes, DEFAULT_PICKLE_CAP_BYTES);
    }

    #[test]
    fn test_load_rejects_broken_toml() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("aisentry.toml"), "[scan\nnope").unwrap();
        assert!(matches!(
            ScanConfig::load(dir.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_ignores_unrelated_sections() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("aisentry.toml"),
            "[scan]\nlint = true\n\n[report]\nformat = \"json\"\n",
        )
        .unwrap();
        let config = ScanConfig::load(dir.path()).unwrap();
        assert!(config.lint);
    }
}
