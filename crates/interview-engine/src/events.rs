//! Interview progress events.
//!
//! The orchestrator publishes [`InterviewEvent`]s on a
//! [`tokio::sync::broadcast`] channel so that frontends and tests can follow
//! a session without reaching into its state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InterviewEvent {
    SessionStarted {
        candidate: String,
        position: String,
        grade: String,
    },
    TechnologiesDetected {
        technologies: Vec<String>,
        domain_mode: bool,
    },
    PlanBuilt {
        technologies: Vec<String>,
        questions: usize,
    },
    PrimaryDocsLoaded {
        tech: String,
        loaded: bool,
    },
    QuestionAsked {
        turn: u32,
        tech: String,
        question: String,
        grounded: bool,
    },
    TurnEvaluated {
        turn: u32,
        topic: String,
        correctness: String,
        off_topic: bool,
        hallucination: bool,
    },
    TechnologySwitched {
        from: String,
        to: String,
    },
    BackgroundLoadFinished {
        loaded: Vec<String>,
        timed_out: bool,
    },
    SessionConcluded {
        turns: u32,
        hiring_recommendation: String,
    },
}

/// Broadcast sender for [`InterviewEvent`]s.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<InterviewEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers; dropped when nobody listens.
    pub fn emit(&self, event: InterviewEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<InterviewEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
