use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::{clean_html, DocHit, DocSource, Document, DocumentStore};

/// Cleaned pages shorter than this are not worth storing.
pub const MIN_PAGE_CHARS: usize = 160;

/// Pulls documentation pages from a [`DocSource`] into a [`DocumentStore`].
#[derive(Clone)]
pub struct DocLoader {
    source: Arc<dyn DocSource>,
    store: Arc<DocumentStore>,
}

impl DocLoader {
    pub fn new(source: Arc<dyn DocSource>, store: Arc<DocumentStore>) -> Self {
        Self { source, store }
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Load the introduction pages for `tech` (or, failing that, pages
    /// matching the technology name). `max_hits` caps the pages read; `None`
    /// reads every hit. Returns whether anything was added.
    pub async fn load_docs_for_tech(&self, tech: &str, max_hits: Option<usize>) -> bool {
        let mut hits = self.search(tech, "introduction").await;
        if hits.is_empty() {
            hits = self.search(tech, tech).await;
        }
        if hits.is_empty() {
            tracing::info!(tech, "No documentation found");
            return false;
        }

        let mut seen = HashSet::new();
        let docs = self.read_hits(tech, &hits, max_hits, &mut seen).await;
        self.commit(tech, docs).await
    }

    /// Like [`load_docs_for_tech`](Self::load_docs_for_tech), searching once
    /// per topic. A topic with no hits falls back to the technology name.
    pub async fn load_docs_for_tech_with_topics(
        &self,
        tech: &str,
        topics: &[String],
        max_hits: Option<usize>,
    ) -> bool {
        let mut seen = HashSet::new();
        let mut docs = Vec::new();
        for topic in topics {
            let mut hits = self.search(tech, topic).await;
            if hits.is_empty() {
                hits = self.search(tech, tech).await;
            }
            if hits.is_empty() {
                continue;
            }
            let added = self.read_hits(tech, &hits, max_hits, &mut seen).await;
            for doc in &added {
                tracing::debug!(tech, topic = %topic, url = %doc.url, "Topic page loaded");
            }
            docs.extend(added);
        }
        self.commit(tech, docs).await
    }

    /// Load each pending technology in order, skipping those in `loaded`.
    /// Uses the technology's topics when the plan has any. Returns the
    /// updated loaded set.
    pub async fn background_load(
        &self,
        pending: Vec<String>,
        topics_map: BTreeMap<String, Vec<String>>,
        mut loaded: HashSet<String>,
        max_hits: usize,
    ) -> HashSet<String> {
        for tech in pending {
            if loaded.contains(&tech) {
                continue;
            }
            let ok = match topics_map.get(&tech).filter(|t| !t.is_empty()) {
                Some(topics) => {
                    self.load_docs_for_tech_with_topics(&tech, topics, Some(max_hits))
                        .await
                }
                None => self.load_docs_for_tech(&tech, Some(max_hits)).await,
            };
            if ok {
                tracing::info!(tech = %tech, "Background documentation loaded");
                loaded.insert(tech);
            } else {
                tracing::info!(tech = %tech, "Background documentation not found");
            }
        }
        loaded
    }

    async fn search(&self, tech: &str, keyword: &str) -> Vec<DocHit> {
        match self.source.search(tech, keyword).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(tech, keyword, error = %e, "Documentation search failed");
                Vec::new()
            }
        }
    }

    async fn read_hits(
        &self,
        tech: &str,
        hits: &[DocHit],
        max_hits: Option<usize>,
        seen: &mut HashSet<String>,
    ) -> Vec<Document> {
        let limit = max_hits.unwrap_or(hits.len());
        let mut docs = Vec::new();

        for hit in hits.iter().take(limit) {
            let doc_id = if hit.doc_id.is_empty() { tech } else { hit.doc_id.as_str() };
            let path = hit.path.split('#').next().unwrap_or_default();
            if path.is_empty() || !seen.insert(format!("{doc_id}::{path}")) {
                continue;
            }

            let html = match self.source.read(doc_id, path).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!(tech, path, error = %e, "Documentation read failed");
                    continue;
                }
            };
            let text = clean_html(&html);
            if text.chars().count() < MIN_PAGE_CHARS {
                continue;
            }

            docs.push(Document {
                text,
                tech: tech.to_string(),
                url: if hit.url.is_empty() { path.to_string() } else { hit.url.clone() },
                path: path.to_string(),
            });
        }
        docs
    }

    async fn commit(&self, tech: &str, docs: Vec<Document>) -> bool {
        if docs.is_empty() {
            return false;
        }
        tracing::info!(tech, pages = docs.len(), "Documentation pages added");
        self.store.add_documents(docs).await;
        true
    }
}
