use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use interview_types::{InterviewError, Result};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{DocHit, DocSource};

// ---------------------------------------------------------------------------
// Wire formats
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    slug: String,
}

#[derive(Debug, Deserialize)]
struct IndexFile {
    #[serde(default)]
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    name: String,
    path: String,
}

type PageDb = Arc<HashMap<String, String>>;

// ---------------------------------------------------------------------------
// DevDocsClient
// ---------------------------------------------------------------------------

/// Client for a self-hosted DevDocs server.
///
/// Uses the static JSON the server publishes: `docs/docs.json` (manifest),
/// `docs/{slug}/index.json` (entry list) and `docs/{slug}/db.json` (page
/// HTML keyed by path). Page databases are cached per slug.
pub struct DevDocsClient {
    base_url: String,
    client: reqwest::Client,
    page_dbs: Mutex<HashMap<String, PageDb>>,
}

impl DevDocsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            page_dbs: Mutex::new(HashMap::new()),
        }
    }

    /// Reads `DEVDOCS_URL`, defaulting to `http://localhost:9292`.
    pub fn from_env() -> Self {
        let url = std::env::var("DEVDOCS_URL").unwrap_or_else(|_| "http://localhost:9292".into());
        Self::new(url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<Option<T>> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| InterviewError::DocSource(format!("GET {url}: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(InterviewError::DocSource(format!(
                "GET {url}: HTTP {}",
                resp.status().as_u16()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| InterviewError::DocSource(format!("GET {url}: {e}")))?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn manifest(&self) -> Result<Vec<ManifestEntry>> {
        let url = format!("{}/docs/docs.json", self.base_url);
        Ok(self
            .get_json(&url, Duration::from_secs(2))
            .await?
            .unwrap_or_default())
    }

    async fn page_db(&self, slug: &str) -> Result<Option<PageDb>> {
        if let Some(db) = self.page_dbs.lock().await.get(slug) {
            return Ok(Some(db.clone()));
        }

        let url = format!("{}/docs/{}/db.json", self.base_url, slug);
        let Some(db) = self
            .get_json::<HashMap<String, String>>(&url, Duration::from_secs(10))
            .await?
        else {
            return Ok(None);
        };

        let db = Arc::new(db);
        tracing::debug!(slug, pages = db.len(), "DevDocs page database cached");
        self.page_dbs
            .lock()
            .await
            .insert(slug.to_string(), db.clone());
        Ok(Some(db))
    }
}

/// First manifest slug starting with the lowercased technology name.
fn resolve_slug(manifest: &[ManifestEntry], tech: &str) -> Option<String> {
    let wanted = tech.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    manifest
        .iter()
        .find(|d| d.slug.starts_with(&wanted))
        .map(|d| d.slug.clone())
}

fn matching_entries(index: IndexFile, base_url: &str, slug: &str, keyword: &str) -> Vec<DocHit> {
    let keyword = keyword.to_lowercase();
    index
        .entries
        .into_iter()
        .filter(|e| e.name.to_lowercase().contains(&keyword))
        .map(|e| DocHit {
            url: format!("{}/{}/{}", base_url, slug, e.path),
            title: e.name,
            doc_id: slug.to_string(),
            path: e.path,
        })
        .collect()
}

#[async_trait]
impl DocSource for DevDocsClient {
    async fn search(&self, tech: &str, keyword: &str) -> Result<Vec<DocHit>> {
        let manifest = self.manifest().await?;
        let Some(slug) = resolve_slug(&manifest, tech) else {
            tracing::debug!(tech, "No DevDocs documentation for technology");
            return Ok(Vec::new());
        };

        let url = format!("{}/docs/{}/index.json", self.base_url, slug);
        let Some(index) = self
            .get_json::<IndexFile>(&url, Duration::from_secs(5))
            .await?
        else {
            return Ok(Vec::new());
        };

        let hits = matching_entries(index, &self.base_url, &slug, keyword);
        tracing::debug!(tech, keyword, slug = %slug, hits = hits.len(), "DevDocs search");
        Ok(hits)
    }

    async fn read(&self, doc_id: &str, path: &str) -> Result<String> {
        let Some(db) = self.page_db(doc_id).await? else {
            return Ok(String::new());
        };
        Ok(db.get(path).cloned().unwrap_or_default())
    }

    async fn health_check(&self) -> Result<()> {
        self.manifest()
            .await
            .map(|_| ())
            .map_err(|e| InterviewError::Unavailable {
                name: "devdocs".into(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> Vec<ManifestEntry> {
        serde_json::from_str(
            r#"[{"slug": "go", "name": "Go"}, {"slug": "python~3.12", "name": "Python"},
                {"slug": "postgresql~16", "name": "PostgreSQL"}]"#,
        )
        .unwrap()
    }

    #[test]
    fn resolve_slug_by_prefix() {
        let m = manifest();
        assert_eq!(resolve_slug(&m, "Python").as_deref(), Some("python~3.12"));
        assert_eq!(resolve_slug(&m, "go").as_deref(), Some("go"));
        assert_eq!(resolve_slug(&m, "postgresql").as_deref(), Some("postgresql~16"));
        assert_eq!(resolve_slug(&m, "rust"), None);
        assert_eq!(resolve_slug(&m, "  "), None);
    }

    #[test]
    fn entries_filtered_by_keyword() {
        let index: IndexFile = serde_json::from_str(
            r#"{"entries": [
                {"name": "Introduction", "path": "tutorial/introduction", "type": "Tutorial"},
                {"name": "asyncio", "path": "library/asyncio", "type": "Library"},
                {"name": "An Informal Introduction", "path": "tutorial/introduction#numbers", "type": "Tutorial"}
            ]}"#,
        )
        .unwrap();

        let hits = matching_entries(index, "http://localhost:9292", "python~3.12", "INTRODUCTION");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Introduction");
        assert_eq!(hits[0].doc_id, "python~3.12");
        assert_eq!(
            hits[0].url,
            "http://localhost:9292/python~3.12/tutorial/introduction"
        );
        assert_eq!(hits[1].path, "tutorial/introduction#numbers");
    }

    #[test]
    fn index_without_entries_parses_empty() {
        let index: IndexFile = serde_json::from_str("{}").unwrap();
        assert!(matching_entries(index, "x", "go", "a").is_empty());
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = DevDocsClient::new("http://localhost:9292/");
        assert_eq!(client.base_url(), "http://localhost:9292");
    }

    #[tokio::test]
    async fn unreachable_server_fails_health_check() {
        let client = DevDocsClient::new("http://127.0.0.1:9");
        let err = client.health_check().await.unwrap_err();
        assert!(err.is_bootstrap_fatal());
    }
}
