//! Answer evaluation against the grounded expected answer.

use std::sync::Arc;

use interview_llm::TextGenerator;
use interview_types::{
    Assessment, Correctness, DifficultyAdjustment, ObserverFlags, ObserverResult, QaItem,
    RetrievalContext, TopicStatus,
};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::json_extract::{extract_json_object, str_field, string_items};

const MAX_MISSING_POINTS: usize = 8;

/// Phrases that, on their own, mean the candidate has no answer.
const NON_ANSWERS: &[&str] = &[
    "i don't know",
    "i do not know",
    "dont know",
    "don't know",
    "idk",
    "no idea",
    "no clue",
    "не знаю",
    "без понятия",
    "понятия не имею",
    "не помню",
    "хз",
];

/// Words that may surround a non-answer phrase without adding content.
const FILLER: &[&str] = &[
    "i", "sorry", "honestly", "really", "actually", "well", "so", "um", "uh", "hmm", "maybe",
    "no", "nope", "sadly", "unfortunately", "guess", "just", "the", "answer", "this", "that",
    "it", "to", "be", "honest", "at", "all", "about", "here", "yet",
    "я", "извините", "простите", "честно", "говоря", "ну", "эм", "хм", "увы", "к", "сожалению",
    "вообще", "это", "тут", "пока", "ответ", "ответа",
];

/// Short answers only; longer text is judged by the generator.
const NON_ANSWER_MAX_CHARS: usize = 60;

pub struct Observer {
    generator: Arc<dyn TextGenerator>,
    config: EngineConfig,
}

impl Observer {
    pub fn new(generator: Arc<dyn TextGenerator>, config: EngineConfig) -> Self {
        Self { generator, config }
    }

    /// Judge one answer. Never fails: unusable generator output yields
    /// [`ObserverResult::neutral`].
    pub async fn analyze(
        &self,
        tech_label: &str,
        question: &str,
        answer: &str,
        qa: &QaItem,
        context: &RetrievalContext,
    ) -> ObserverResult {
        let prompt = build_prompt(tech_label, question, answer, qa, context);

        if self.config.debug_rag {
            tracing::debug!(
                target: "interview_engine::rag",
                expected = %qa.expected_answer,
                key_points = ?qa.key_points,
                "Observer input context:\n{}",
                self.config.trim_trace(context.text())
            );
        }

        let mut result = match self.generator.generate(&prompt).await {
            Ok(raw) => parse_observation(&extract_json_object(&raw), &qa.topic).unwrap_or_else(|| {
                tracing::warn!(tech = tech_label, "Observer output unparseable, using neutral result");
                ObserverResult::neutral(&qa.topic)
            }),
            Err(e) => {
                tracing::warn!(tech = tech_label, error = %e, "Observer request failed");
                ObserverResult::neutral(&qa.topic)
            }
        };

        apply_policy(&mut result, answer, qa, context);
        tracing::debug!(
            tech = tech_label,
            correctness = %result.assessment.correctness,
            off_topic = result.flags.off_topic,
            hallucination = result.flags.hallucination_detected,
            candidate_question = result.flags.candidate_question,
            "Answer evaluated"
        );
        result
    }
}

fn build_prompt(
    tech_label: &str,
    question: &str,
    answer: &str,
    qa: &QaItem,
    context: &RetrievalContext,
) -> String {
    let key_points = serde_json::to_string(&qa.key_points).unwrap_or_else(|_| "[]".into());
    format!(
        r#"
You are an Observer/Critic. Evaluate the candidate's answer based on the documentation (CONTEXT) and the expected ground truth (EXPECTED).

TECH: {tech_label}
QUESTION: {question}

CANDIDATE ANSWER:
{answer}

EXPECTED (ground truth):
{expected}

KEY POINTS:
{key_points}

CONTEXT (docs):
{context}

Requirements:
- Mark if the candidate goes off-topic (off_topic).
- Mark if the candidate confidently states false facts (hallucination_detected).
- Mark if the candidate asks a question or requests a technology switch instead of answering (candidate_question).
- If EXPECTED and CONTEXT are empty (no factual base), evaluate only relevance and coherence,
  and do NOT set hallucination_detected.

Return ONLY JSON:
{{
  "internal_thoughts": "...",
  "instruction_to_interviewer": "...",
  "topic_status": "continue | change | wrap_up",
  "difficulty_adjustment": "increase | decrease | maintain",
  "flags": {{
    "hallucination_detected": true/false,
    "off_topic": true/false,
    "candidate_question": true/false
  }},
  "assessment": {{
    "topic": "{topic}",
    "correctness": "high | medium | low",
    "missing_points": ["..."],
    "correct_answer_short": "..."
  }}
}}

Scoring rubric (important):
- If the answer matches EXPECTED in meaning but is shortened or lacks a full package prefix, use correctness="high".
- Set off_topic=true ONLY if the answer clearly does not address the question (refusal, "let's talk about life").
  A short or incomplete but on-topic answer is NOT off_topic. A plain "I don't know" is NOT off_topic, it is correctness="low".
- Set hallucination_detected=true only if the candidate confidently states a fact contradicting CONTEXT/EXPECTED.

Correctness rules:
- high: essentially correct (abbreviations acceptable), the key fact matches
- medium: partially correct or imprecise, but the direction is right
- low: incorrect or no substantive answer
"#,
        expected = qa.expected_answer,
        context = context.text(),
        topic = qa.topic,
    )
}

/// Lenient field-by-field reading. `None` when the reply carried no object.
fn parse_observation(value: &Value, default_topic: &str) -> Option<ObserverResult> {
    let obj = value.as_object()?;
    if obj.is_empty() {
        return None;
    }

    let mut result = ObserverResult::neutral(default_topic);
    let thoughts = str_field(value, "internal_thoughts");
    if !thoughts.is_empty() {
        result.internal_thoughts = thoughts;
    }
    let instruction = str_field(value, "instruction_to_interviewer");
    if !instruction.is_empty() {
        result.instruction_to_interviewer = instruction;
    }
    result.topic_status = str_field(value, "topic_status")
        .parse()
        .unwrap_or(TopicStatus::Continue);
    result.difficulty_adjustment = str_field(value, "difficulty_adjustment")
        .parse()
        .unwrap_or(DifficultyAdjustment::Maintain);

    let flags = &value["flags"];
    result.flags = ObserverFlags {
        hallucination_detected: flag(&flags["hallucination_detected"]),
        off_topic: flag(&flags["off_topic"]),
        candidate_question: flag(&flags["candidate_question"]),
    };

    let assessment = &value["assessment"];
    let topic = str_field(assessment, "topic");
    result.assessment = Assessment {
        topic: if topic.is_empty() {
            default_topic.to_string()
        } else {
            topic
        },
        correctness: str_field(assessment, "correctness")
            .parse()
            .unwrap_or(Correctness::Medium),
        missing_points: string_items(&assessment["missing_points"], MAX_MISSING_POINTS),
        correct_answer_short: str_field(assessment, "correct_answer_short"),
    };
    Some(result)
}

fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Rules that hold regardless of what the generator said.
fn apply_policy(result: &mut ObserverResult, answer: &str, qa: &QaItem, context: &RetrievalContext) {
    if is_non_answer(answer) {
        result.assessment.correctness = Correctness::Low;
        result.flags.off_topic = false;
    }
    if qa.expected_answer.trim().is_empty() && context.is_empty() {
        result.flags.hallucination_detected = false;
    }
}

/// `true` for an empty answer or a short "I don't know" style reply.
///
/// The reply must consist of a non-answer phrase and filler only; a hedge
/// next to actual content ("go/parser, don't know the rest") is left to the
/// generator's judgment.
pub fn is_non_answer(answer: &str) -> bool {
    let normalized: String = answer
        .to_lowercase()
        .replace('\u{2019}', "'")
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect();
    let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return true;
    }
    if normalized.chars().count() > NON_ANSWER_MAX_CHARS {
        return false;
    }

    let mut phrases = NON_ANSWERS.to_vec();
    phrases.sort_by_key(|p| std::cmp::Reverse(p.len()));
    let mut rest = format!(" {normalized} ");
    let mut found = false;
    for phrase in phrases {
        let padded = format!(" {phrase} ");
        while rest.contains(&padded) {
            rest = rest.replacen(&padded, " ", 1);
            found = true;
        }
    }
    found && rest.split_whitespace().all(|w| FILLER.contains(&w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_llm::ScriptedGenerator;
    use interview_types::ContextChunk;

    fn qa() -> QaItem {
        QaItem {
            question: "Which package parses Go source?".into(),
            expected_answer: "go/parser".into(),
            key_points: vec!["parser".into()],
            topic: "parser".into(),
        }
    }

    fn ctx() -> RetrievalContext {
        RetrievalContext::from_chunks(vec![ContextChunk::new(
            "go/parser",
            "Package parser implements a parser for Go source files.",
        )])
    }

    fn observer(gen: ScriptedGenerator) -> Observer {
        Observer::new(Arc::new(gen), EngineConfig::default())
    }

    #[tokio::test]
    async fn full_reply_is_read() {
        let gen = ScriptedGenerator::new().then(
            r#"```json
{"internal_thoughts": "Correct, short form.",
 "instruction_to_interviewer": "Go deeper.",
 "topic_status": "continue",
 "difficulty_adjustment": "increase",
 "flags": {"hallucination_detected": false, "off_topic": false, "candidate_question": false},
 "assessment": {"topic": "parser", "correctness": "high", "missing_points": ["full path"], "correct_answer_short": "go/parser"}}
```"#,
        );
        let r = observer(gen).analyze("go", "Q", "parser", &qa(), &ctx()).await;
        assert_eq!(r.assessment.correctness, Correctness::High);
        assert_eq!(r.difficulty_adjustment, DifficultyAdjustment::Increase);
        assert_eq!(r.assessment.missing_points, vec!["full path"]);
        assert_eq!(r.instruction_to_interviewer, "Go deeper.");
    }

    #[tokio::test]
    async fn garbage_reply_is_neutral() {
        let gen = ScriptedGenerator::new().then("I think the answer is fine.");
        let r = observer(gen).analyze("go", "Q", "go/parser", &qa(), &ctx()).await;
        assert_eq!(r, ObserverResult::neutral("parser"));
    }

    #[tokio::test]
    async fn generator_error_is_neutral() {
        let r = observer(ScriptedGenerator::new())
            .analyze("go", "Q", "go/parser", &qa(), &ctx())
            .await;
        assert_eq!(r.topic_status, TopicStatus::Continue);
        assert_eq!(r.assessment.correctness, Correctness::Medium);
        assert_eq!(r.flags, ObserverFlags::default());
    }

    #[tokio::test]
    async fn non_answer_is_low_and_on_topic() {
        let gen = ScriptedGenerator::new().then(
            r#"{"flags": {"off_topic": true}, "assessment": {"correctness": "medium"}}"#,
        );
        let r = observer(gen).analyze("go", "Q", "I don't know", &qa(), &ctx()).await;
        assert_eq!(r.assessment.correctness, Correctness::Low);
        assert!(!r.flags.off_topic);
        assert_eq!(r.assessment.topic, "parser");
    }

    #[tokio::test]
    async fn hedged_correct_answer_keeps_generator_verdict() {
        let gen = ScriptedGenerator::new().then(r#"{"assessment": {"correctness": "high"}}"#);
        let r = observer(gen)
            .analyze("go", "Q", "go/parser, don't know the rest", &qa(), &ctx())
            .await;
        assert_eq!(r.assessment.correctness, Correctness::High);
    }

    #[tokio::test]
    async fn no_factual_base_means_no_hallucination() {
        let gen = ScriptedGenerator::new()
            .then(r#"{"flags": {"hallucination_detected": "true"}}"#)
            .then(r#"{"flags": {"hallucination_detected": true}}"#);
        let obs = observer(gen);

        let ungrounded = QaItem::ungrounded("Tell me about your role", "role");
        let r = obs
            .analyze("Backend Developer", "Q", "I build APIs", &ungrounded, &RetrievalContext::empty())
            .await;
        assert!(!r.flags.hallucination_detected);

        let r = obs.analyze("go", "Q", "It is go/ast", &qa(), &ctx()).await;
        assert!(r.flags.hallucination_detected);
    }

    #[tokio::test]
    async fn unknown_enum_values_use_defaults() {
        let gen = ScriptedGenerator::new().then(
            r#"{"topic_status": "continue | change", "difficulty_adjustment": "harder", "assessment": {"correctness": "great"}}"#,
        );
        let r = observer(gen).analyze("go", "Q", "go/parser", &qa(), &ctx()).await;
        assert_eq!(r.topic_status, TopicStatus::Continue);
        assert_eq!(r.difficulty_adjustment, DifficultyAdjustment::Maintain);
        assert_eq!(r.assessment.correctness, Correctness::Medium);
    }

    #[test]
    fn non_answer_detection() {
        assert!(is_non_answer("I don't know"));
        assert!(is_non_answer("Не знаю."));
        assert!(is_non_answer("idk, sorry"));
        assert!(is_non_answer("   "));
        assert!(!is_non_answer("go/parser"));
        assert!(is_non_answer("Sorry, I really don't know the answer"));
        assert!(!is_non_answer("go/parser, don't know the rest"));
        assert!(!is_non_answer("kidkit"));
        assert!(!is_non_answer(
            "I don't know the exact name but the parser package builds an AST from source files"
        ));
    }
}
