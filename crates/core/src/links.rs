//! Link list reading.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// One share link, as it appeared in the list (trimmed, never empty).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Link(String);

impl Link {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split file contents into links: one per line, trimmed, blank lines
/// dropped. Order and duplicates are preserved.
pub fn parse_links(contents: &str) -> Vec<Link> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| Link(line.to_string()))
        .collect()
}

/// Read and parse a UTF-8 link list file.
pub async fn read_links(path: &Path) -> std::io::Result<Vec<Link>> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(parse_links(&contents))
}
