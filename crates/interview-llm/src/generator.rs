use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use interview_types::{InterviewError, Result};

// ---------------------------------------------------------------------------
// TextGenerator
// ---------------------------------------------------------------------------

/// Single free-form completion: prompt in, text out. No conversation state
/// is kept between calls.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// Generator that answers from a script, for offline runs and tests.
///
/// Rules are `(marker, reply)` pairs checked in order: the first rule whose
/// marker occurs in the prompt wins. Prompts matching no rule get the queued
/// fallback replies in order, then an error once those run out.
pub struct ScriptedGenerator {
    rules: Vec<(String, String)>,
    fallback: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, marker: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push((marker.into(), reply.into()));
        self
    }

    pub fn then(self, reply: impl Into<String>) -> Self {
        self.fallback
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply.into());
        self
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());

        if let Some((_, reply)) = self.rules.iter().find(|(m, _)| prompt.contains(m.as_str())) {
            return Ok(reply.clone());
        }
        self.fallback
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| InterviewError::Generation("script exhausted".into()))
    }
}
