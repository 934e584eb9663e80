//! Host page access: run a read-only routine against a problem page.
//!
//! The pipeline never assumes where the page lives. It only needs something
//! that can hand a parsed document to an extraction routine and return the
//! routine's string, which is what [`HostPage`] captures. Three adapters are
//! provided: an in-memory document, a saved HTML file, and a live URL.
//!
//! HTML parsing and the routine itself run on `spawn_blocking`: parsing a
//! full problem page is CPU work, and the parsed tree is not `Send`, so it is
//! built and dropped entirely on the blocking thread.

use crate::error::StageError;
use async_trait::async_trait;
use scraper::Html;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// A read-only extraction routine executed against a parsed document.
pub type PageRoutine = fn(&Html) -> String;

/// Capability to execute a routine inside a host page.
#[async_trait]
pub trait HostPage: Send + Sync {
    /// Run `routine` against the page and return its result.
    async fn execute_in_page(&self, routine: PageRoutine) -> Result<String, StageError>;

    /// Short human-readable origin of the page, for logs.
    fn origin(&self) -> String;
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

async fn run_routine(html: String, routine: PageRoutine) -> Result<String, StageError> {
    tokio::task::spawn_blocking(move || {
        let doc = Html::parse_document(&html);
        routine(&doc)
    })
    .await
    .map_err(|e| StageError::HostPage {
        detail: format!("extraction routine did not complete: {e}"),
    })
}

// ── In-memory ────────────────────────────────────────────────────────────

/// A page whose HTML is already in memory.
#[derive(Debug, Clone)]
pub struct StaticPage {
    html: String,
}

impl StaticPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

#[async_trait]
impl HostPage for StaticPage {
    async fn execute_in_page(&self, routine: PageRoutine) -> Result<String, StageError> {
        run_routine(self.html.clone(), routine).await
    }

    fn origin(&self) -> String {
        format!("<in-memory page, {} bytes>", self.html.len())
    }
}

// ── Saved file ───────────────────────────────────────────────────────────

/// A page saved to disk (e.g. "Save page as…" from a browser).
#[derive(Debug, Clone)]
pub struct FilePage {
    path: PathBuf,
}

impl FilePage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl HostPage for FilePage {
    async fn execute_in_page(&self, routine: PageRoutine) -> Result<String, StageError> {
        let html = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| StageError::HostPage {
                detail: format!("cannot read '{}': {}", self.path.display(), e),
            })?;
        debug!("Loaded {} bytes from {}", html.len(), self.path.display());
        run_routine(html, routine).await
    }

    fn origin(&self) -> String {
        self.path.display().to_string()
    }
}

// ── Live URL ─────────────────────────────────────────────────────────────

/// A page fetched over HTTP(S) when the routine is executed.
#[derive(Debug, Clone)]
pub struct RemotePage {
    url: String,
    timeout_secs: u64,
}

impl RemotePage {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            url: url.into(),
            timeout_secs,
        }
    }

    async fn fetch(&self) -> Result<String, StageError> {
        info!("Fetching problem page: {}", self.url);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .user_agent(concat!("cf2lc/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StageError::HostPage {
                detail: e.to_string(),
            })?;

        let response = client.get(&self.url).send().await.map_err(|e| {
            let detail = if e.is_timeout() {
                format!("timed out after {}s fetching '{}'", self.timeout_secs, self.url)
            } else {
                format!("failed to fetch '{}': {}", self.url, e)
            };
            StageError::HostPage { detail }
        })?;

        if !response.status().is_success() {
            return Err(StageError::HostPage {
                detail: format!("HTTP {} fetching '{}'", response.status(), self.url),
            });
        }

        let body = response.text().await.map_err(|e| StageError::HostPage {
            detail: format!("failed to read body of '{}': {}", self.url, e),
        })?;
        debug!("Fetched {} bytes from {}", body.len(), self.url);
        Ok(body)
    }
}

#[async_trait]
impl HostPage for RemotePage {
    async fn execute_in_page(&self, routine: PageRoutine) -> Result<String, StageError> {
        let html = self.fetch().await?;
        run_routine(html, routine).await
    }

    fn origin(&self) -> String {
        self.url.clone()
    }
}
