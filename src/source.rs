//! Source locators and the transports behind them.

use anyhow::{Context, Result};
use framepull_pipeline::ByteFeeder;
use futures::TryStreamExt;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

/// Where the media bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    File(PathBuf),
    Url(String),
}

impl FromStr for SourceLocator {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            anyhow::bail!("Empty source locator");
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            return Ok(Self::Url(s.to_string()));
        }
        let path = s.strip_prefix("file://").unwrap_or(s);
        Ok(Self::File(PathBuf::from(shellexpand::tilde(path).as_ref())))
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{}", url),
        }
    }
}

impl SourceLocator {
    /// Open the transport and wrap it in a feeder.
    pub async fn open(&self, read_chunk_size: usize) -> Result<ByteFeeder> {
        match self {
            Self::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("Failed to open {:?}", path))?;
                tracing::debug!("Reading {:?}", path);
                Ok(ByteFeeder::from_reader(file, read_chunk_size))
            }
            Self::Url(url) => {
                let response = reqwest::get(url)
                    .await
                    .with_context(|| format!("Failed to request {}", url))?
                    .error_for_status()
                    .with_context(|| format!("Request for {} failed", url))?;
                tracing::debug!(
                    "Streaming {} ({} bytes)",
                    url,
                    response
                        .content_length()
                        .map_or_else(|| "unknown".to_string(), |n| n.to_string())
                );
                let body = response.bytes_stream().map_err(io::Error::other);
                Ok(ByteFeeder::new(body))
            }
        }
    }
}
