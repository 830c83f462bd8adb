//! Remote byte sources over HTTP range requests.
//!
//! [`RemoteSource`] gives the format inspectors the same `Read + Seek`
//! capability over an HTTP resource that a local file provides, by
//! translating reads into `Range: bytes=start-end` requests. Total size
//! comes from the `Content-Range` header of a one-byte probe (or
//! `Content-Length` when the server ignores ranges).
//!
//! `hf://org/repo` targets resolve through the Hugging Face tree-listing
//! endpoint into per-file `resolve/main` URLs before any artifact read.

use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use serde::Deserialize;

use crate::discovery::classify_url;
use crate::source::SourceError;

/// Minimum bytes fetched per range request. A ZIP central-directory walk
/// issues many tiny reads; without readahead each would be a round-trip.
const READAHEAD_BYTES: usize = 256 * 1024;

/// Hugging Face host serving tree listings and file downloads.
const HF_HOST: &str = "https://huggingface.co";

/// Whether a scan target is a remote URL rather than a local path.
#[must_use]
pub fn is_remote_target(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://") || target.starts_with("hf://")
}

/// Build the shared HTTP agent with the configured per-request timeout.
#[must_use]
pub fn build_agent(timeout_secs: u64) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

/// Resolve a remote scan target to the list of artifact URLs to inspect.
///
/// `http(s)://` targets are taken as a single pre-resolved artifact URL;
/// `hf://org/repo` targets are expanded via the repository tree listing.
///
/// # Errors
///
/// Returns [`SourceError::Network`] if the tree listing cannot be fetched
/// or decoded.
pub fn resolve_targets(target: &str, timeout_secs: u64) -> Result<Vec<String>, SourceError> {
    if let Some(repo) = target.strip_prefix("hf://") {
        let agent = build_agent(timeout_secs);
        return resolve_hf_repo(repo, &agent);
    }
    Ok(vec![target.to_owned()])
}

/// One entry of the Hugging Face repository tree listing.
#[derive(Debug, Deserialize)]
pub struct TreeEntry {
    /// Path within the repository.
    pub path: String,
    /// `"file"` or `"directory"`.
    #[serde(rename = "type")]
    pub entry_type: String,
}

/// Query the tree listing for `org/repo` and return download URLs for
/// every file entry with a recognized artifact extension.
///
/// # Errors
///
/// Returns [`SourceError::Network`] on transport or decode failure.
pub fn resolve_hf_repo(repo: &str, agent: &ureq::Agent) -> Result<Vec<String>, SourceError> {
    let tree_url = format!("{HF_HOST}/api/models/{repo}/tree/main");
    let response = agent
        .get(&tree_url)
        .call()
        .map_err(|e| SourceError::Network(e.to_string()))?;
    let entries: Vec<TreeEntry> = response
        .into_json()
        .map_err(|e| SourceError::Network(e.to_string()))?;

    Ok(artifact_urls_from_tree(repo, &entries))
}

/// Map tree entries to download URLs, keeping only recognized artifacts.
#[must_use]
pub fn artifact_urls_from_tree(repo: &str, entries: &[TreeEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| e.entry_type == "file" && classify_url(&e.path).is_some())
        .map(|e| format!("{HF_HOST}/{repo}/resolve/main/{}", e.path))
        .collect()
}

/// Extract the total resource size from a `Content-Range` header value
/// (`"bytes 0-0/1234"` → `1234`). An unknown length (`*`) yields `None`.
#[must_use]
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

/// Random-access reader over a remote HTTP resource.
///
/// Maintains a read position and a single readahead block; every cache
/// miss issues one ranged GET. The HTTP session lives exactly as long as
/// the source.
pub struct RemoteSource {
    agent: ureq::Agent,
    url: String,
    size: u64,
    pos: u64,
    buffer: Vec<u8>,
    buffer_start: u64,
}

impl RemoteSource {
    /// Probe the resource and open a source positioned at byte zero.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Network`] on transport failure, or
    /// [`SourceError::RangeNotSatisfied`] when the server reports neither
    /// a usable `Content-Range` nor a `Content-Length`.
    pub fn open(url: &str, timeout_secs: u64) -> Result<Self, SourceError> {
        let agent = build_agent(timeout_secs);
        Self::open_with_agent(url, agent)
    }

    /// Open using an existing agent (shared timeouts and connection pool).
    ///
    /// # Errors
    ///
    /// Same as [`RemoteSource::open`].
    pub fn open_with_agent(url: &str, agent: ureq::Agent) -> Result<Self, SourceError> {
        let response = agent
            .get(url)
            .set("Range", "bytes=0-0")
            .call()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let from_range = response
            .header("Content-Range")
            .and_then(parse_content_range_total);
        let from_length = response
            .header("Content-Length")
            .and_then(|v| v.parse().ok());

        let size = from_range
            .or(from_length)
            .ok_or_else(|| SourceError::RangeNotSatisfied {
                url: url.to_owned(),
            })?;

        Ok(Self {
            agent,
            url: url.to_owned(),
            size,
            pos: 0,
            buffer: Vec::new(),
            buffer_start: 0,
        })
    }

    /// Total resource size reported by the server.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Resource URL this source reads from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch `[start, end]` (inclusive) from the server.
    fn fetch_range(&self, start: u64, end: u64) -> Result<Vec<u8>, SourceError> {
        let response = self
            .agent
            .get(&self.url)
            .set("Range", &format!("bytes={start}-{end}"))
            .call()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let expected = (end - start + 1) as usize;
        let mut body = Vec::with_capacity(expected);
        response
            .into_reader()
            .take(expected as u64)
            .read_to_end(&mut body)
            .map_err(|e| SourceError::Network(e.to_string()))?;
        Ok(body)
    }

    /// Serve a read at the current position, refilling the readahead
    /// buffer on a miss.
    fn read_at_pos(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        if self.pos >= self.size || buf.is_empty() {
            return Ok(0);
        }

        let in_buffer = self.pos >= self.buffer_start
            && self.pos < self.buffer_start + self.buffer.len() as u64;

        if !in_buffer {
            let want = buf.len().max(READAHEAD_BYTES) as u64;
            let end = (self.pos + want - 1).min(self.size - 1);
            self.buffer = self.fetch_range(self.pos, end)?;
            self.buffer_start = self.pos;
            if self.buffer.is_empty() {
                return Ok(0);
            }
        }

        let offset = (self.pos - self.buffer_start) as usize;
        let available = self.buffer.len() - offset;
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&self.buffer[offset..offset + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Read for RemoteSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_at_pos(buf).map_err(std::io::Error::other)
    }
}

impl Seek for RemoteSource {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.pos) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(self.size) + i128::from(delta),
        };

        if target < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "invalid seek to a negative position",
            ));
        }

        self.pos = target as u64;
        Ok(self.pos)
    }
}
