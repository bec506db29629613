use std::sync::Mutex;

use async_trait::async_trait;
use interview_types::{InterviewError, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DocHit
// ---------------------------------------------------------------------------

/// One search result: enough to read the page later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocHit {
    pub title: String,
    /// Documentation set identifier (a DevDocs slug such as `python~3.12`).
    pub doc_id: String,
    pub path: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// DocSource
// ---------------------------------------------------------------------------

/// Searchable documentation.
///
/// A miss (unknown technology, no matching entry, unknown page) is an empty
/// result, never an error. `Err` is reserved for transport failures.
#[async_trait]
pub trait DocSource: Send + Sync {
    async fn search(&self, tech: &str, keyword: &str) -> Result<Vec<DocHit>>;

    /// Raw page content, or an empty string when the page does not exist.
    async fn read(&self, doc_id: &str, path: &str) -> Result<String>;

    /// Verify the source is reachable. Called once before the interview.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InMemoryDocSource
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Page {
    tech: String,
    title: String,
    path: String,
    html: String,
}

/// Fixture-backed source for offline runs and tests.
///
/// Pages are grouped by technology; `search` matches titles containing the
/// keyword, case-insensitively.
pub struct InMemoryDocSource {
    pages: Vec<Page>,
    offline: bool,
    searches: Mutex<Vec<(String, String)>>,
}

impl InMemoryDocSource {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            offline: false,
            searches: Mutex::new(Vec::new()),
        }
    }

    pub fn with_page(
        mut self,
        tech: impl Into<String>,
        title: impl Into<String>,
        path: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        self.pages.push(Page {
            tech: tech.into(),
            title: title.into(),
            path: path.into(),
            html: html.into(),
        });
        self
    }

    /// Every call fails as if the server were down.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// `(tech, keyword)` pairs searched so far.
    pub fn searches(&self) -> Vec<(String, String)> {
        self.searches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline {
            return Err(InterviewError::DocSource("in-memory source is offline".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryDocSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocSource for InMemoryDocSource {
    async fn search(&self, tech: &str, keyword: &str) -> Result<Vec<DocHit>> {
        self.check_online()?;
        self.searches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((tech.to_string(), keyword.to_string()));

        let tech = tech.to_lowercase();
        let keyword = keyword.to_lowercase();
        Ok(self
            .pages
            .iter()
            .filter(|p| p.tech == tech && p.title.to_lowercase().contains(&keyword))
            .map(|p| DocHit {
                title: p.title.clone(),
                doc_id: p.tech.clone(),
                path: p.path.clone(),
                url: format!("memory://{}/{}", p.tech, p.path),
            })
            .collect())
    }

    async fn read(&self, doc_id: &str, path: &str) -> Result<String> {
        self.check_online()?;
        Ok(self
            .pages
            .iter()
            .find(|p| p.tech == doc_id && p.path == path)
            .map(|p| p.html.clone())
            .unwrap_or_default())
    }

    async fn health_check(&self) -> Result<()> {
        self.check_online()
    }
}
