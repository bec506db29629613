//! Sources of candidate input.

use std::sync::Mutex;

use async_trait::async_trait;
use interview_types::Result;

use crate::console::Console;

#[async_trait]
pub trait CandidateInput: Send + Sync {
    /// Show `prompt` and return the candidate's raw reply.
    async fn ask(&self, prompt: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// ConsoleInput
// ---------------------------------------------------------------------------

pub struct ConsoleInput {
    console: Console,
}

impl ConsoleInput {
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

#[async_trait]
impl CandidateInput for ConsoleInput {
    async fn ask(&self, prompt: &str) -> Result<String> {
        self.console.read_line(prompt).await
    }
}

// ---------------------------------------------------------------------------
// ScriptedInput
// ---------------------------------------------------------------------------

/// Replays pre-recorded answers in order and records every prompt. Once
/// the script runs out it answers `stop`.
pub struct ScriptedInput {
    answers: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedInput {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut reversed: Vec<String> = answers.into_iter().map(Into::into).collect();
        reversed.reverse();
        Self {
            answers: Mutex::new(reversed),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn remaining(&self) -> usize {
        self.answers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl CandidateInput for ScriptedInput {
    async fn ask(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        let answer = self
            .answers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .unwrap_or_else(|| "stop".to_string());
        Ok(answer)
    }
}
