//! Data model for one interview run: question units, retrieval context,
//! observer judgments, the interview plan, and the evaluation accumulator.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// QaItem
// ---------------------------------------------------------------------------

/// One question unit. An empty `expected_answer` means "ungrounded".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaItem {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub expected_answer: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub topic: String,
}

impl QaItem {
    /// A question with no ground truth attached.
    pub fn ungrounded(question: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            expected_answer: String::new(),
            key_points: Vec::new(),
            topic: topic.into(),
        }
    }

    pub fn has_expected_answer(&self) -> bool {
        !self.expected_answer.is_empty()
    }
}

// ---------------------------------------------------------------------------
// RetrievalContext
// ---------------------------------------------------------------------------

/// Marker that prefixes every rendered chunk.
pub const SOURCE_TAG: &str = "[Source:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextChunk {
    pub source: String,
    pub text: String,
}

impl ContextChunk {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// Concatenated, source-tagged chunks returned by a retriever.
///
/// The rendered text is computed once so that grounding checks run against
/// exactly the string the generator saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalContext {
    chunks: Vec<ContextChunk>,
    text: String,
}

impl RetrievalContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_chunks(chunks: Vec<ContextChunk>) -> Self {
        let text = chunks
            .iter()
            .map(|c| format!("{} {}]\n{}", SOURCE_TAG, c.source, c.text))
            .collect::<Vec<_>>()
            .join("\n\n")
            .trim()
            .to_string();
        Self { chunks, text }
    }

    pub fn chunks(&self) -> &[ContextChunk] {
        &self.chunks
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Length in characters, not bytes.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn has_source_tag(&self) -> bool {
        !self.chunks.is_empty() && self.text.contains(SOURCE_TAG)
    }
}

impl fmt::Display for RetrievalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// ---------------------------------------------------------------------------
// Observer enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    #[default]
    Continue,
    Change,
    WrapUp,
}

impl FromStr for TopicStatus {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "change" => Ok(Self::Change),
            "wrap_up" | "wrap-up" | "wrapup" => Ok(Self::WrapUp),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyAdjustment {
    Increase,
    Decrease,
    #[default]
    Maintain,
}

impl FromStr for DifficultyAdjustment {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "increase" => Ok(Self::Increase),
            "decrease" => Ok(Self::Decrease),
            "maintain" => Ok(Self::Maintain),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correctness {
    High,
    #[default]
    Medium,
    Low,
}

impl FromStr for Correctness {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Correctness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Correctness::High => "high",
            Correctness::Medium => "medium",
            Correctness::Low => "low",
        })
    }
}

// ---------------------------------------------------------------------------
// ObserverResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverFlags {
    pub hallucination_detected: bool,
    pub off_topic: bool,
    pub candidate_question: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub topic: String,
    pub correctness: Correctness,
    pub missing_points: Vec<String>,
    pub correct_answer_short: String,
}

/// Per-turn judgment produced by the observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverResult {
    pub internal_thoughts: String,
    pub instruction_to_interviewer: String,
    pub topic_status: TopicStatus,
    pub difficulty_adjustment: DifficultyAdjustment,
    pub flags: ObserverFlags,
    pub assessment: Assessment,
}

impl ObserverResult {
    /// The neutral judgment used whenever the generator output is unusable:
    /// continue, maintain, no flags, medium correctness.
    pub fn neutral(topic: impl Into<String>) -> Self {
        Self {
            internal_thoughts: "Failed to parse analysis.".into(),
            instruction_to_interviewer: "Continue the interview and ask a clarifying question."
                .into(),
            topic_status: TopicStatus::Continue,
            difficulty_adjustment: DifficultyAdjustment::Maintain,
            flags: ObserverFlags::default(),
            assessment: Assessment {
                topic: topic.into(),
                correctness: Correctness::Medium,
                missing_points: Vec::new(),
                correct_answer_short: String::new(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

/// Question difficulty, always within `[MIN, MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Difficulty(u8);

impl Difficulty {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(level: u8) -> Self {
        Self(level.clamp(Self::MIN, Self::MAX))
    }

    pub fn level(self) -> u8 {
        self.0
    }

    pub fn adjust(self, adjustment: DifficultyAdjustment) -> Self {
        match adjustment {
            DifficultyAdjustment::Increase => Self::new(self.0.saturating_add(1)),
            DifficultyAdjustment::Decrease => Self::new(self.0.saturating_sub(1)),
            DifficultyAdjustment::Maintain => self,
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

// ---------------------------------------------------------------------------
// CandidateProfile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub name: String,
    pub position: String,
    pub grade: String,
    /// Allowed technologies, primary first. Empty means domain mode.
    pub technologies: Vec<String>,
}

impl CandidateProfile {
    pub fn allows(&self, tech: &str) -> bool {
        self.technologies.iter().any(|t| t == tech)
    }
}

// ---------------------------------------------------------------------------
// InterviewPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedQuestion {
    pub tech: String,
    pub topic: String,
    pub question: String,
}

/// Validated topics per technology and the ordered question queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewPlan {
    pub topics_map: BTreeMap<String, Vec<String>>,
    pub questions_queue: VecDeque<PlannedQuestion>,
}

impl InterviewPlan {
    pub fn topics_for(&self, tech: &str) -> &[String] {
        self.topics_map.get(tech).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove and return the first queued question for `tech`
    /// (case-insensitive, whitespace-trimmed match).
    pub fn pop_for_tech(&mut self, tech: &str) -> Option<PlannedQuestion> {
        let wanted = tech.trim().to_lowercase();
        let idx = self
            .questions_queue
            .iter()
            .position(|q| q.tech.trim().to_lowercase() == wanted)?;
        self.questions_queue.remove(idx)
    }

    /// Question for `tech` if one is queued, otherwise the queue head.
    pub fn pop_next(&mut self, tech: &str) -> Option<PlannedQuestion> {
        self.pop_for_tech(tech)
            .or_else(|| self.questions_queue.pop_front())
    }

    pub fn remaining(&self) -> usize {
        self.questions_queue.len()
    }
}

// ---------------------------------------------------------------------------
// EvaluationState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub topic: String,
    pub issue: String,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSummary {
    pub tech: String,
    pub topic: String,
    pub question: String,
    pub user_answer: String,
    pub correctness: Correctness,
    pub missing_points: Vec<String>,
    pub correct_answer_short: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signals {
    pub hallucination: u32,
    pub off_topic: u32,
    pub candidate_question: u32,
}

/// Accumulated results of one interview run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationState {
    pub topics: Vec<String>,
    pub confirmed: Vec<String>,
    pub gaps: Vec<Gap>,
    pub turns: Vec<TurnSummary>,
    pub signals: Signals,
}

pub const GAP_ISSUE: &str = "The answer contains errors or gaps.";
pub const GAP_FALLBACK_ANSWER: &str = "See the reference documentation for this topic.";

impl EvaluationState {
    /// Fold one observer judgment into the accumulator and return the topic
    /// the turn was attributed to.
    ///
    /// `tech_label` prefixes confirmed/gap tags (`tech:topic`); `fallback_topic`
    /// is used when neither the assessment nor the question carries a topic.
    pub fn absorb(
        &mut self,
        tech_label: &str,
        qa: &QaItem,
        answer: &str,
        observation: &ObserverResult,
        fallback_topic: &str,
    ) -> String {
        let flags = observation.flags;
        if flags.hallucination_detected {
            self.signals.hallucination += 1;
        }
        if flags.off_topic {
            self.signals.off_topic += 1;
        }
        if flags.candidate_question {
            self.signals.candidate_question += 1;
        }

        let assessment = &observation.assessment;
        let topic = [assessment.topic.as_str(), qa.topic.as_str(), fallback_topic]
            .into_iter()
            .map(str::trim)
            .find(|t| !t.is_empty())
            .unwrap_or_default()
            .to_string();
        if !topic.is_empty() && !self.topics.contains(&topic) {
            self.topics.push(topic.clone());
        }

        self.turns.push(TurnSummary {
            tech: tech_label.to_string(),
            topic: topic.clone(),
            question: qa.question.clone(),
            user_answer: answer.to_string(),
            correctness: assessment.correctness,
            missing_points: assessment.missing_points.clone(),
            correct_answer_short: assessment.correct_answer_short.clone(),
        });

        let tag = format!("{tech_label}:{topic}");
        match assessment.correctness {
            Correctness::High => {
                if !self.confirmed.contains(&tag) {
                    self.confirmed.push(tag);
                }
            }
            Correctness::Low => {
                let correct_answer = [
                    assessment.correct_answer_short.as_str(),
                    qa.expected_answer.as_str(),
                ]
                .into_iter()
                .find(|s| !s.trim().is_empty())
                .unwrap_or(GAP_FALLBACK_ANSWER)
                .to_string();
                self.gaps.push(Gap {
                    topic: tag,
                    issue: GAP_ISSUE.into(),
                    correct_answer,
                });
            }
            Correctness::Medium => {}
        }

        topic
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
