//! Endpoint list loading
//!
//! The sites file holds one host or URL per line. Each line is trimmed and
//! gets `https://` prepended unless it already names `http://` or `https://`.
//! No line is skipped, blank ones included.

use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

const DEFAULT_SCHEME: &str = "https://";

/// Normalize a single endpoint line
pub fn normalize_url(line: &str) -> String {
    let url = line.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("{DEFAULT_SCHEME}{url}")
    }
}

/// Read newline-delimited endpoints from any reader
pub fn parse_urls(reader: impl BufRead) -> Result<Vec<String>> {
    reader
        .lines()
        .map(|line| {
            line.map(|l| normalize_url(&l))
                .context("failed to read endpoint list")
        })
        .collect()
}

/// Read the endpoint list from a file
pub fn read_urls(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("can't open endpoint list {}", path.display()))?;
    let urls = parse_urls(std::io::BufReader::new(file))?;
    debug!("loaded {} endpoints from {}", urls.len(), path.display());
    Ok(urls)
}
