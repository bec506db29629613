use std::path::{Path, PathBuf};
use std::time::Duration;

use interview_rag::DocumentStore;
use interview_types::Result;
use serde::{Deserialize, Serialize};

/// Every tunable of an interview run.
///
/// Missing fields in a config file take their default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Context-quality floor, in characters.
    pub min_context_chars: usize,
    /// Chunks retrieved when generating or grounding a question.
    pub retrieval_k: usize,
    /// Chunks retrieved when re-checking a generated question.
    pub validation_k: usize,
    pub min_chunk_chars: usize,
    pub excerpt_chars: usize,
    pub max_tries: u32,
    pub topics_per_tech: usize,
    pub max_techs: usize,
    pub primary_max_hits: usize,
    pub background_max_hits: usize,
    pub background_timeout_ms: u64,
    /// Inputs that end the interview (case-insensitive).
    pub stop_words: Vec<String>,
    pub transcript_path: PathBuf,
    pub team_name: String,
    /// Log every retrieval context used for question generation.
    pub debug_rag: bool,
    pub rag_trace_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_context_chars: 220,
            retrieval_k: 4,
            validation_k: 2,
            min_chunk_chars: 120,
            excerpt_chars: 520,
            max_tries: 3,
            topics_per_tech: 3,
            max_techs: 6,
            primary_max_hits: 3,
            background_max_hits: 2,
            background_timeout_ms: 3000,
            stop_words: ["стоп", "stop", "exit", "выход"]
                .into_iter()
                .map(String::from)
                .collect(),
            transcript_path: PathBuf::from("logs/interview_log.json"),
            team_name: "Interview Coach".to_string(),
            debug_rag: false,
            rag_trace_chars: 900,
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn is_stop_word(&self, input: &str) -> bool {
        let input = input.trim().to_lowercase();
        self.stop_words.iter().any(|w| w.to_lowercase() == input)
    }

    pub fn background_timeout(&self) -> Duration {
        Duration::from_millis(self.background_timeout_ms)
    }

    /// An empty store using this config's chunk limits.
    pub fn document_store(&self) -> DocumentStore {
        DocumentStore::new().with_chunk_limits(self.min_chunk_chars, self.excerpt_chars)
    }

    /// `payload` cut to `rag_trace_chars`, with a note of what was dropped.
    pub(crate) fn trim_trace(&self, payload: &str) -> String {
        let total = payload.chars().count();
        if total <= self.rag_trace_chars {
            return payload.to_string();
        }
        let head: String = payload.chars().take(self.rag_trace_chars).collect();
        format!("{head}\n...[trimmed {} chars]", total - self.rag_trace_chars)
    }
}
