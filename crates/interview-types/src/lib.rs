//! Shared types, errors, and transcript persistence for the interview engine.
//!
//! This crate provides the foundational types used across all other interview crates:
//! - `InterviewError`: unified error taxonomy
//! - `QaItem`, `RetrievalContext`, `ObserverResult`: per-turn data
//! - `InterviewPlan`, `EvaluationState`: per-run state
//! - `TranscriptWriter`: incremental JSON transcript

pub mod feedback;
pub mod model;
pub mod transcript;

pub use feedback::{
    Decision, FinalFeedback, KnowledgeGap, RoadmapItem, SoftSkills, TechnicalReview,
};
pub use model::{
    Assessment, CandidateProfile, ContextChunk, Correctness, Difficulty, DifficultyAdjustment,
    EvaluationState, Gap, InterviewPlan, ObserverFlags, ObserverResult, PlannedQuestion, QaItem,
    RetrievalContext, Signals, TopicStatus, TurnSummary,
};
pub use transcript::{Transcript, TranscriptTurn, TranscriptWriter};

/// Unified error type for all interview subsystems.
#[derive(Debug, thiserror::Error)]
pub enum InterviewError {
    // === Text generator errors ===
    #[error("Provider {provider} returned HTTP {status}: {message}")]
    ProviderError {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Authentication failed for provider {provider}")]
    AuthError { provider: String },

    #[error("Request to {provider} timed out after {timeout_ms}ms")]
    RequestTimeout { provider: String, timeout_ms: u64 },

    #[error("Generator returned unusable output: {0}")]
    Generation(String),

    // === Documentation / retrieval errors ===
    #[error("Documentation source error: {0}")]
    DocSource(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    // === Bootstrap ===
    #[error("Collaborator '{name}' unavailable: {message}")]
    Unavailable { name: String, message: String },

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl InterviewError {
    /// Returns `true` when the failure can be absorbed by a local fallback
    /// mid-interview (ungrounded question, neutral assessment, skipped load).
    pub fn is_recoverable(&self) -> bool {
        !self.is_bootstrap_fatal()
    }

    /// Returns `true` when the engine cannot start at all.
    pub fn is_bootstrap_fatal(&self) -> bool {
        matches!(
            self,
            InterviewError::Unavailable { .. } | InterviewError::AuthError { .. }
        )
    }
}

/// A convenience alias for `Result<T, InterviewError>`.
pub type Result<T> = std::result::Result<T, InterviewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_provider_error() {
        let err = InterviewError::ProviderError {
            provider: "openai-compat".into(),
            status: 500,
            message: "internal server error".into(),
        };
        assert_eq!(
            err.to_string(),
            "Provider openai-compat returned HTTP 500: internal server error"
        );
    }

    #[test]
    fn error_display_unavailable() {
        let err = InterviewError::Unavailable {
            name: "devdocs".into(),
            message: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "Collaborator 'devdocs' unavailable: connection refused"
        );
    }

    #[test]
    fn generation_and_docs_errors_are_recoverable() {
        assert!(InterviewError::Generation("no json".into()).is_recoverable());
        assert!(InterviewError::DocSource("timeout".into()).is_recoverable());
        assert!(InterviewError::Retrieval("empty".into()).is_recoverable());
        assert!(InterviewError::RequestTimeout {
            provider: "x".into(),
            timeout_ms: 10
        }
        .is_recoverable());
    }

    #[test]
    fn unavailable_and_auth_are_bootstrap_fatal() {
        let err = InterviewError::Unavailable {
            name: "llm".into(),
            message: "down".into(),
        };
        assert!(err.is_bootstrap_fatal());
        assert!(!err.is_recoverable());
        assert!(InterviewError::AuthError {
            provider: "x".into()
        }
        .is_bootstrap_fatal());
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: InterviewError = io_err.into();
        assert!(matches!(err, InterviewError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: InterviewError = json_err.into();
        assert!(matches!(err, InterviewError::Json(_)));
    }
}
