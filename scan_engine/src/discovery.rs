//! File discovery and classification for the scan engine.
//!
//! Walks the scan root with the `ignore` crate's builder in sorted order,
//! so inventory order is deterministic across runs. Classification is by
//! lowercased extension:
//!
//! - `.pt`, `.pth`, `.bin` → PyTorch
//! - `.safetensors` → SafeTensors
//! - `.gguf` → GGUF
//! - a file named `requirements.txt` → dependency manifest
//!
//! Everything else is ignored. Unlike a source-tree linter, the walker
//! deliberately does not honor `.gitignore` — model binaries are routinely
//! gitignored and the walk must still see them.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::config::ScanConfig;
use crate::types::Framework;

/// Directory names that are always excluded from the walk.
const HARDCODED_EXCLUDES: &[&str] = &[".git", "__pycache__", ".venv", "node_modules", "target"];

/// File name recognized as a Python dependency manifest.
const REQUIREMENTS_FILENAME: &str = "requirements.txt";

/// What the walker decided to do with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Hand to the format inspector for this framework.
    Artifact(Framework),
    /// Hand to the dependency-manifest parser.
    Manifest,
    /// Not our business.
    Ignored,
}

/// A file surfaced by the walk, ready for dispatch.
#[derive(Debug, Clone)]
pub struct DiscoveredEntry {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the scan root, forward slashes.
    pub rel_path: String,
    /// Classification result.
    pub kind: FileKind,
}

/// Classify a framework by bare lowercase extension (no dot).
#[must_use]
pub fn classify_extension(ext: &str) -> Option<Framework> {
    match ext {
        "pt" | "pth" | "bin" => Some(Framework::PyTorch),
        "safetensors" => Some(Framework::SafeTensors),
        "gguf" => Some(Framework::Gguf),
        _ => None,
    }
}

/// Classify a path by file name and extension.
#[must_use]
pub fn classify(path: &Path) -> FileKind {
    if path
        .file_name()
        .is_some_and(|name| name == REQUIREMENTS_FILENAME)
    {
        return FileKind::Manifest;
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match classify_extension(&ext) {
        Some(framework) => FileKind::Artifact(framework),
        None => FileKind::Ignored,
    }
}

/// Classify a remote URL by its trailing extension.
#[must_use]
pub fn classify_url(url: &str) -> Option<Framework> {
    let name = url.rsplit('/').next().unwrap_or(url);
    let ext = name.rsplit('.').next().unwrap_or("").to_lowercase();
    if name.contains('.') {
        classify_extension(&ext)
    } else {
        None
    }
}

/// Walk the scan root and return every artifact or manifest file, in
/// deterministic sorted order.
///
/// Ignored files are dropped here; callers never see them.
#[must_use]
pub fn walk(root: &Path, config: &ScanConfig) -> Vec<DiscoveredEntry> {
    let mut builder = WalkBuilder::new(root);

    // Plain recursive walk: no VCS filters, hidden files included.
    builder
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .sort_by_file_name(|a, b| a.cmp(b));

    let mut entries = Vec::new();

    for entry in builder.build().flatten() {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if is_in_excluded_dir(root, path) {
            continue;
        }

        if is_config_excluded(root, path, config) {
            continue;
        }

        let kind = classify(path);
        if kind == FileKind::Ignored {
            continue;
        }

        let rel_path = match path.strip_prefix(root) {
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => path.to_string_lossy().replace('\\', "/"),
        };

        entries.push(DiscoveredEntry {
            path: path.to_path_buf(),
            rel_path,
            kind,
        });
    }

    entries
}

/// Check if a path is inside a hardcoded-excluded directory.
fn is_in_excluded_dir(root: &Path, path: &Path) -> bool {
    let rel = match path.strip_prefix(root) {
        Ok(r) => r,
        Err(_) => return false,
    };

    for component in rel.components() {
        if let std::path::Component::Normal(name) = component {
            let name_str = name.to_string_lossy();
            if HARDCODED_EXCLUDES.contains(&name_str.as_ref()) {
                return true;
            }
        }
    }
    false
}

/// Check if a path matches any config-level exclusion pattern.
fn is_config_excluded(root: &Path, path: &Path, config: &ScanConfig) -> bool {
    let rel = match path.strip_prefix(root) {
        Ok(r) => r,
        Err(_) => return false,
    };
    let rel_str = rel.to_string_lossy().replace('\\', "/");

    for pattern in &config.exclude {
        // Prefix matching for directory patterns (e.g. "vendor/").
        let normalized = pattern.trim_end_matches('/');
        if rel_str.starts_with(normalized)
            || rel_str.starts_with(&format!("{normalized}/"))
            || rel_str.contains(&format!("/{normalized}/"))
        {
            return true;
        }

        // Glob matching for more complex patterns.
        if let Ok(glob) = globset::Glob::new(pattern) {
            if glob.compile_matcher().is_match(&rel_str) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_classify_pytorch_extensions() {
        for name in ["model.pt", "model.pth", "weights.bin", "MODEL.PT"] {
            assert_eq!(
                classify(Path::new(name)),
                FileKind::Artifact(Framework::PyTorch),
                "{name}"
            );
        }
    }

    #[test]
    fn test_classify_other_formats() {
        assert_eq!(
            classify(Path::new("model.safetensors")),
            FileKind::Artifact(Framework::SafeTensors)
        );
        assert_eq!(
            classify(Path::new("llama.gguf")),
            FileKind::Artifact(Framework::Gguf)
        );
        assert_eq!(classify(Path::new("requirements.txt")), FileKind::Manifest);
        assert_eq!(classify(Path::new("README.md")), FileKind::Ignored);
        assert_eq!(classify(Path::new("noext")), FileKind::Ignored);
    }

    #[test]
    fn test_classify_url() {
        assert_eq!(
            classify_url("https://huggingface.co/org/repo/resolve/main/model.gguf"),
            Some(Framework::Gguf)
        );
        assert_eq!(
            classify_url("https://example.com/weights.PT"),
            Some(Framework::PyTorch)
        );
        assert_eq!(classify_url("https://example.com/README.md"), None);
        assert_eq!(classify_url("https://example.com/no-extension"), None);
    }

    #[test]
    fn test_walk_finds_artifacts_in_subdirs() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("checkpoints").join("v2");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("model.safetensors"), b"x").unwrap();
        fs::write(dir.path().join("requirements.txt"), "torch\n").unwrap();
        fs::write(dir.path().join("notes.md"), "hi").unwrap();

        let entries = walk(dir.path(), &ScanConfig::default());
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .any(|e| e.rel_path == "checkpoints/v2/model.safetensors"));
        assert!(entries.iter().any(|e| e.kind == FileKind::Manifest));
    }

    #[test]
    fn test_walk_order_is_sorted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.gguf"), b"x").unwrap();
        fs::write(dir.path().join("a.gguf"), b"x").unwrap();
        fs::write(dir.path().join("c.gguf"), b"x").unwrap();

        let entries = walk(dir.path(), &ScanConfig::default());
        let names: Vec<&str> = entries.iter().map(|e| e.rel_path.as_str()).collect();
        assert_eq!(names, vec!["a.gguf", "b.gguf", "c.gguf"]);
    }

    #[test]
    fn test_walk_skips_hardcoded_dirs() {
        let dir = tempdir().unwrap();
        let git = dir.path().join(".git");
        fs::create_dir_all(&git).unwrap();
        fs::write(git.join("blob.pt"), b"x").unwrap();
        fs::write(dir.path().join("model.pt"), b"x").unwrap();

        let entries = walk(dir.path(), &ScanConfig::default());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rel_path, "model.pt");
    }

    #[test]
    fn test_walk_sees_gitignored_artifacts() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".gitignore"), "*.bin\n").unwrap();
        fs::write(dir.path().join("weights.bin"), b"x").unwrap();

        let entries = walk(dir.path(), &ScanConfig::default());
        assert!(entries.iter().any(|e| e.rel_path == "weights.bin"));
    }

    #[test]
    fn test_walk_honors_config_excludes() {
        let dir = tempdir().unwrap();
        let vendor = dir.path().join("vendor");
        fs::create_dir_all(&vendor).unwrap();
        fs::write(vendor.join("third_party.pt"), b"x").unwrap();
        fs::write(dir.path().join("mine.pt"), b"x").unwrap();

        let config = ScanConfig {
            exclude: vec!["vendor/".to_owned()],
            ..ScanConfig::default()
        };
        let entries = walk(dir.path(), &config);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rel_path, "mine.pt");
    }

    #[test]
    fn test_walk_glob_excludes() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("legacy_old.pt"), b"x").unwrap();
        fs::write(dir.path().join("current.pt"), b"x").unwrap();

        let config = ScanConfig {
            exclude: vec!["legacy_*.pt".to_owned()],
            ..ScanConfig::default()
        };
        let entries = walk(dir.path(), &config);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rel_path, "current.pt");
    }
}
