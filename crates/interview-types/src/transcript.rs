//! Incremental JSON transcript of an interview run.
//!
//! The whole document is rewritten after every turn so that a crash loses
//! at most the turn in flight.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::feedback::FinalFeedback;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub turn_id: u32,
    #[serde(alias = "agent_message")]
    pub agent_visible_message: String,
    pub user_message: String,
    pub internal_thoughts: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub team_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub turns: Vec<TranscriptTurn>,
    pub final_feedback: Option<FinalFeedback>,
}

impl Transcript {
    /// Read a transcript from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Owns the transcript document and its file.
pub struct TranscriptWriter {
    path: PathBuf,
    transcript: Transcript,
}

impl TranscriptWriter {
    /// Create the transcript and write the empty document immediately.
    pub fn create(team_name: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self> {
        let writer = Self {
            path: path.into(),
            transcript: Transcript {
                team_name: team_name.into(),
                created_at: chrono::Utc::now(),
                turns: Vec::new(),
                final_feedback: None,
            },
        };
        writer.save()?;
        Ok(writer)
    }

    pub fn log_turn(
        &mut self,
        user_message: impl Into<String>,
        agent_message: impl Into<String>,
        internal_thoughts: impl Into<String>,
    ) -> Result<()> {
        let turn_id = self.transcript.turns.len() as u32 + 1;
        self.transcript.turns.push(TranscriptTurn {
            turn_id,
            agent_visible_message: agent_message.into(),
            user_message: user_message.into(),
            internal_thoughts: internal_thoughts.into(),
        });
        self.save()
    }

    pub fn log_feedback(&mut self, feedback: FinalFeedback) -> Result<()> {
        self.transcript.final_feedback = Some(feedback);
        self.save()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.transcript)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!(path = %self.path.display(), turns = self.transcript.turns.len(), "Transcript saved");
        Ok(())
    }
}
