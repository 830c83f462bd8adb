//! Dependency-manifest parsing (`requirements.txt`).
//!
//! A line-oriented parser producing `{name, version, type: "library"}`
//! records. It understands the common shapes — pinned versions, ranges,
//! extras, environment markers, comments — and silently skips what it
//! cannot parse. Only a file-level failure (unreadable file) is an
//! error; that lands in the scan's `errors` list, not in a record.

use std::path::Path;

use crate::types::Dependency;

/// Version comparison operators, longest first so `==` wins over `=`.
const VERSION_OPERATORS: &[&str] = &["===", "==", ">=", "<=", "~=", "!=", ">", "<"];

/// Parse a `requirements.txt` file into dependency records.
///
/// # Errors
///
/// Returns the I/O failure message if the file cannot be read; malformed
/// individual lines are skipped, not errors.
pub fn parse_requirements(path: &Path) -> Result<Vec<Dependency>, String> {
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    Ok(parse_requirements_content(&content))
}

/// Parse requirements text into dependency records.
#[must_use]
pub fn parse_requirements_content(content: &str) -> Vec<Dependency> {
    content.lines().filter_map(parse_line).collect()
}

/// Parse one requirements line; `None` means skip (blank, comment,
/// option, or unparseable).
fn parse_line(line: &str) -> Option<Dependency> {
    let mut line = line.trim();

    if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
        return None;
    }

    // Trailing comment, then environment marker.
    if let Some(idx) = line.find(" #") {
        line = line[..idx].trim_end();
    }
    if let Some(idx) = line.find(';') {
        line = line[..idx].trim_end();
    }

    let name_end = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'))
        .unwrap_or(line.len());
    let name = &line[..name_end];
    if name.is_empty() || !name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let mut rest = line[name_end..].trim_start();

    // Extras: requests[socks]>=2.0
    if rest.starts_with('[') {
        let close = rest.find(']')?;
        rest = rest[close + 1..].trim_start();
    }

    if rest.is_empty() {
        return Some(Dependency {
            name: name.to_owned(),
            version: "unknown".to_owned(),
        });
    }

    let operator = VERSION_OPERATORS.iter().find(|op| rest.starts_with(**op))?;
    let spec = rest[operator.len()..].trim();
    // First bound of a comma-separated specifier set.
    let version = spec.split(',').next().unwrap_or("").trim();
    if version.is_empty() {
        return None;
    }

    Some(Dependency {
        name: name.to_owned(),
        version: version.to_owned(),
    })
}
