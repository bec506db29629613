//! Grounded interview engine.
//!
//! Components, leaves first: grounding checks, question generation with
//! retries, the topic/plan builder, the observer (answer evaluator), the
//! interviewer (reaction text and technology switching), and the
//! orchestrator that drives one interview run from bootstrap to feedback.

pub mod candidate;
pub mod config;
pub mod console;
pub mod events;
pub mod feedback;
pub mod grounding;
pub mod interviewer;
pub mod json_extract;
pub mod observer;
pub mod orchestrator;
pub mod plan;
pub mod question_gen;
pub mod tech_extraction;

pub use candidate::{CandidateInput, ConsoleInput, ScriptedInput};
pub use config::EngineConfig;
pub use console::Console;
pub use events::{EventEmitter, InterviewEvent};
pub use feedback::generate_final_feedback;
pub use grounding::{is_context_good, is_grounded_answer};
pub use interviewer::{decide_next_tech, parse_reaction, Interviewer, InterviewerInput, NEXT_TECH_MARKER};
pub use json_extract::{extract_json_array, extract_json_object};
pub use observer::Observer;
pub use orchestrator::{CandidateIntake, Collaborators, InterviewSession, SessionOutcome, SessionState};
pub use plan::{normalize_topic_seed, PlanBuilder};
pub use question_gen::QuestionGenerator;
pub use tech_extraction::{extract_tech_slugs, lexical_tech_slugs, KNOWN_SLUGS};
