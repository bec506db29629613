use std::collections::{HashMap, HashSet};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use interview_types::{ContextChunk, Result, RetrievalContext};
use tokio::sync::Mutex;

// ---------------------------------------------------------------------------
// Retriever
// ---------------------------------------------------------------------------

/// Maps a query to ranked, source-tagged chunks.
///
/// The technology filter is best-effort: when fewer than `k` chunks match
/// it, the result is padded with unfiltered ones.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn query(&self, text: &str, tech: Option<&str>, k: usize) -> Result<RetrievalContext>;
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    pub tech: String,
    pub url: String,
    pub path: String,
}

struct Indexed {
    doc: Document,
    terms: HashMap<String, u32>,
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

/// In-memory document store with lexical (tf-idf) ranking.
///
/// One lock guards the whole store: a batch insert is never observed half
/// written, and queries wait for in-flight inserts.
pub struct DocumentStore {
    docs: Mutex<Vec<Indexed>>,
    min_chunk_chars: usize,
    excerpt_chars: usize,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(Vec::new()),
            min_chunk_chars: 120,
            excerpt_chars: 520,
        }
    }

    /// Documents shorter than `min_chunk_chars` are never rendered; longer
    /// ones are cut to `excerpt_chars`.
    pub fn with_chunk_limits(mut self, min_chunk_chars: usize, excerpt_chars: usize) -> Self {
        self.min_chunk_chars = min_chunk_chars;
        self.excerpt_chars = excerpt_chars;
        self
    }

    pub async fn add_documents(&self, batch: Vec<Document>) {
        let indexed: Vec<Indexed> = batch
            .into_iter()
            .map(|doc| {
                let mut terms = HashMap::new();
                for t in tokenize(&doc.text) {
                    *terms.entry(t).or_insert(0) += 1;
                }
                Indexed { doc, terms }
            })
            .collect();

        let mut docs = self.docs.lock().await;
        docs.extend(indexed);
        tracing::debug!(total = docs.len(), "Documents added to store");
    }

    pub async fn len(&self) -> usize {
        self.docs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.lock().await.is_empty()
    }

    /// Top `k` documents for `query`, preferring those tagged `tech`.
    pub async fn similarity_search(&self, query: &str, k: usize, tech: Option<&str>) -> Vec<Document> {
        if k == 0 {
            return Vec::new();
        }
        let docs = self.docs.lock().await;
        let ranked = rank(&docs, query);

        let Some(tech) = tech else {
            return ranked.into_iter().take(k).map(|i| docs[i].doc.clone()).collect();
        };

        let pool: Vec<usize> = ranked.into_iter().take((k * 3).max(12)).collect();
        let mut picked: Vec<usize> = pool
            .iter()
            .copied()
            .filter(|&i| docs[i].doc.tech == tech)
            .take(k)
            .collect();
        if picked.len() < k {
            let needed = k - picked.len();
            let filler: Vec<usize> = pool
                .iter()
                .copied()
                .filter(|i| !picked.contains(i))
                .take(needed)
                .collect();
            picked.extend(filler);
        }
        picked.into_iter().map(|i| docs[i].doc.clone()).collect()
    }

    fn render(&self, docs: Vec<Document>) -> RetrievalContext {
        let chunks = docs
            .into_iter()
            .filter_map(|doc| {
                let text = doc.text.trim();
                if text.chars().count() < self.min_chunk_chars {
                    return None;
                }
                let mut excerpt: String = text.chars().take(self.excerpt_chars).collect();
                excerpt.push_str("...");
                Some(ContextChunk::new(doc.url, excerpt))
            })
            .collect();
        RetrievalContext::from_chunks(chunks)
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Indices of all documents, best first. Documents sharing no term with the
/// query keep insertion order behind the scored ones.
fn rank(docs: &[Indexed], query: &str) -> Vec<usize> {
    let terms: HashSet<String> = tokenize(query).collect();
    let n = docs.len() as f64;

    let idf: HashMap<&str, f64> = terms
        .iter()
        .map(|t| {
            let df = docs.iter().filter(|d| d.terms.contains_key(t)).count() as f64;
            (t.as_str(), (1.0 + n / (1.0 + df)).ln())
        })
        .collect();

    let mut scored: Vec<(usize, f64)> = docs
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let score = terms
                .iter()
                .filter_map(|t| {
                    d.terms
                        .get(t)
                        .map(|&tf| (1.0 + (tf as f64).ln()) * idf[t.as_str()])
                })
                .sum::<f64>();
            (i, score)
        })
        .collect();

    // Stable sort keeps insertion order among equal scores.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(i, _)| i).collect()
}

#[async_trait]
impl Retriever for DocumentStore {
    async fn query(&self, text: &str, tech: Option<&str>, k: usize) -> Result<RetrievalContext> {
        let docs = self.similarity_search(text, k, tech).await;
        Ok(self.render(docs))
    }
}

// ---------------------------------------------------------------------------
// FixedRetriever
// ---------------------------------------------------------------------------

/// Retriever with canned answers, for offline runs and tests.
///
/// Rules are `(marker, context)` pairs; the first rule whose marker occurs
/// in the query wins, otherwise the default context is returned.
pub struct FixedRetriever {
    rules: Vec<(String, RetrievalContext)>,
    default: RetrievalContext,
    queries: StdMutex<Vec<(String, Option<String>, usize)>>,
}

impl FixedRetriever {
    pub fn new(default: RetrievalContext) -> Self {
        Self {
            rules: Vec::new(),
            default,
            queries: StdMutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(RetrievalContext::empty())
    }

    pub fn on(mut self, marker: impl Into<String>, context: RetrievalContext) -> Self {
        self.rules.push((marker.into(), context));
        self
    }

    /// `(query, tech filter, k)` triples received so far.
    pub fn queries(&self) -> Vec<(String, Option<String>, usize)> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Retriever for FixedRetriever {
    async fn query(&self, text: &str, tech: Option<&str>, k: usize) -> Result<RetrievalContext> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((text.to_string(), tech.map(String::from), k));

        let context = self
            .rules
            .iter()
            .find(|(marker, _)| text.contains(marker.as_str()))
            .map(|(_, ctx)| ctx)
            .unwrap_or(&self.default);
        Ok(context.clone())
    }
}
