//! Question synthesis grounded in retrieved documentation.
//!
//! Every accepted question carries an expected answer that is an exact
//! excerpt of the context it was generated from. When grounding cannot be
//! achieved the generator degrades to an ungrounded open question; it never
//! fails.

use std::sync::Arc;

use interview_llm::TextGenerator;
use interview_rag::Retriever;
use interview_types::{Difficulty, QaItem, RetrievalContext};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::grounding::{is_context_good, is_grounded_answer};
use crate::json_extract::{extract_json_object, str_field, string_items};

/// Seed queries by difficulty level, 1 through 5.
const SEED_TEMPLATES: [&str; 5] = [
    "introduction overview",
    "basic concepts",
    "api reference",
    "examples tutorial",
    "edge cases best practices",
];

pub struct QuestionGenerator {
    generator: Arc<dyn TextGenerator>,
    retriever: Arc<dyn Retriever>,
    config: EngineConfig,
}

impl QuestionGenerator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        retriever: Arc<dyn Retriever>,
        config: EngineConfig,
    ) -> Self {
        Self {
            generator,
            retriever,
            config,
        }
    }

    /// Ground an already formulated question.
    ///
    /// Retrieves by `topic_seed`, then by the question itself, and asks the
    /// generator to excerpt the expected answer. If that fails, one more
    /// attempt runs with the broadened query `"{tech} {topic_seed} reference"`.
    /// The returned item has an empty expected answer when nothing grounded.
    pub async fn ensure_expected_from_rag(
        &self,
        tech: &str,
        question: &str,
        topic_seed: &str,
    ) -> (QaItem, RetrievalContext) {
        let k = self.config.retrieval_k;
        let mut ctx = self.retrieve(topic_seed, tech, k).await;
        if !self.is_good(&ctx) {
            ctx = self.retrieve(question, tech, k).await;
        }
        if !self.is_good(&ctx) {
            tracing::debug!(tech, topic_seed, "No usable context for planned question");
            return (QaItem::ungrounded(question, tech), ctx);
        }

        let qa = self.build_expected_for_question(tech, question, &ctx).await;
        if qa.has_expected_answer() {
            return (qa, ctx);
        }

        let broadened = format!("{tech} {topic_seed} reference");
        let ctx2 = self.retrieve(&broadened, tech, k).await;
        if self.is_good(&ctx2) {
            let qa2 = self.build_expected_for_question(tech, question, &ctx2).await;
            if qa2.has_expected_answer() {
                return (qa2, ctx2);
            }
        }

        (qa, ctx)
    }

    /// Synthesise a grounded question from scratch.
    ///
    /// The seed query comes from the difficulty level unless `focus_topic`
    /// is given. A generated question is accepted only when its expected
    /// answer is grounded in the generation context and a second retrieval,
    /// keyed by the question text, also passes the quality gate. After
    /// `max_tries` failed attempts an ungrounded open question is returned
    /// with an empty context.
    pub async fn make_answerable_question(
        &self,
        tech: &str,
        difficulty: Difficulty,
        max_tries: u32,
        focus_topic: &str,
    ) -> (QaItem, RetrievalContext) {
        let level = difficulty.level();
        let focus_topic = focus_topic.trim();
        let mut seed_query = if focus_topic.is_empty() {
            let template = SEED_TEMPLATES[(level as usize).clamp(1, 5) - 1];
            format!("{tech} {template}")
        } else {
            format!("{tech} {focus_topic}").trim().to_string()
        };

        for attempt in 1..=max_tries {
            let mut ctx = self.retrieve(&seed_query, tech, self.config.retrieval_k).await;
            if !self.is_good(&ctx) {
                ctx = self.retrieve(tech, tech, self.config.retrieval_k).await;
            }
            self.trace(
                &format!("generation context attempt={attempt} difficulty={level} seed='{seed_query}'"),
                ctx.text(),
            );

            if !self.is_good(&ctx) {
                tracing::debug!(tech, attempt, chars = ctx.char_len(), "Context below quality gate");
                seed_query = format!("{seed_query} reference");
                continue;
            }

            let qa = self.generate_question_from_context(tech, difficulty, &ctx).await;
            if qa.question.trim().is_empty()
                || !is_grounded_answer(&qa.expected_answer, &qa.key_points, ctx.text())
            {
                self.trace(
                    "not grounded in generation context",
                    &format!("expected={}\nkey_points={:?}", qa.expected_answer, qa.key_points),
                );
                seed_query = broaden(&seed_query, tech, &qa.topic);
                continue;
            }

            let check_ctx = self
                .retrieve(&qa.question, tech, self.config.validation_k)
                .await;
            self.trace("validation context (retrieved by question)", check_ctx.text());
            if self.is_good(&check_ctx) {
                tracing::debug!(tech, attempt, topic = %qa.topic, "Grounded question accepted");
                return (qa, check_ctx);
            }

            seed_query = broaden(&seed_query, tech, &qa.topic);
        }

        tracing::info!(tech, difficulty = level, "Falling back to an ungrounded question");
        (fallback_question(tech), RetrievalContext::empty())
    }

    async fn generate_question_from_context(
        &self,
        tech: &str,
        difficulty: Difficulty,
        ctx: &RetrievalContext,
    ) -> QaItem {
        let prompt = format!(
            r#"
You are a technical interviewer. Generate ONE question about the technology: {tech}.
Difficulty: {level}/5.

MANDATORY RULES:
1) Use ONLY facts from the CONTEXT below.
2) expected_answer MUST be an exact substring of CONTEXT (including token., go/parser, etc.).
3) key_points: each item must also be a substring of CONTEXT.
4) If this is not possible, return an empty expected_answer and ask a simpler question based on CONTEXT.

Return ONLY JSON:
{{
  "question": "...",
  "expected_answer": "...",
  "key_points": ["...", "..."],
  "topic": "..."
}}

CONTEXT:
{ctx}
"#,
            level = difficulty.level(),
        );

        let fallback = || QaItem::ungrounded(format!("Tell me the basics of {tech}."), tech);
        match self.generator.generate(&prompt).await {
            Ok(raw) => parse_qa(&extract_json_object(&raw)).unwrap_or_else(fallback),
            Err(e) => {
                tracing::warn!(tech, error = %e, "Question generation failed");
                fallback()
            }
        }
    }

    /// Excerpt the expected answer for `question` from `ctx`. The result is
    /// only kept if it passes the grounding check.
    async fn build_expected_for_question(
        &self,
        tech: &str,
        question: &str,
        ctx: &RetrievalContext,
    ) -> QaItem {
        let prompt = format!(
            r#"
You are a technical assistant. Your task is to extract the expected answer from CONTEXT for the given QUESTION.

STRICT RULES:
1) expected_answer MUST be an exact substring of CONTEXT (with the same characters).
2) key_points: each item must also be an exact substring of CONTEXT.
3) If CONTEXT does not contain a direct answer, return an empty expected_answer and key_points [].
4) Return ONLY JSON.

TECH: {tech}
QUESTION: {question}

CONTEXT:
{ctx}

Return JSON:
{{
  "question": "{question}",
  "expected_answer": "...",
  "key_points": ["...", "..."],
  "topic": "..."
}}
"#
        );

        let raw = match self.generator.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(tech, error = %e, "Expected-answer extraction failed");
                return QaItem::ungrounded(question, tech);
            }
        };
        let Some(mut qa) = parse_qa(&extract_json_object(&raw)) else {
            return QaItem::ungrounded(question, tech);
        };

        let topic = if qa.topic.is_empty() { tech.to_string() } else { qa.topic.clone() };
        if !is_grounded_answer(&qa.expected_answer, &qa.key_points, ctx.text()) {
            return QaItem::ungrounded(question, topic);
        }
        qa.question = question.to_string();
        qa.topic = topic;
        qa
    }

    async fn retrieve(&self, query: &str, tech: &str, k: usize) -> RetrievalContext {
        match self.retriever.query(query, Some(tech), k).await {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(tech, query, error = %e, "Retrieval failed");
                RetrievalContext::empty()
            }
        }
    }

    fn is_good(&self, ctx: &RetrievalContext) -> bool {
        is_context_good(ctx, self.config.min_context_chars)
    }

    fn trace(&self, title: &str, payload: &str) {
        if self.config.debug_rag {
            tracing::debug!(target: "interview_engine::rag", title, "{}", self.config.trim_trace(payload));
        }
    }
}

/// Generic open question used when no grounded question could be built.
pub fn fallback_question(tech: &str) -> QaItem {
    QaItem::ungrounded(
        format!("Tell me what {tech} is, where it is used, and which core concepts you know."),
        tech,
    )
}

fn broaden(seed_query: &str, tech: &str, topic: &str) -> String {
    if topic.trim().is_empty() {
        format!("{seed_query} reference")
    } else {
        format!("{tech} {} reference", topic.trim())
    }
}

/// `None` when the value is not an object carrying a question.
fn parse_qa(value: &Value) -> Option<QaItem> {
    if !value.is_object() {
        return None;
    }
    let question = str_field(value, "question");
    if question.is_empty() {
        return None;
    }
    Some(QaItem {
        question,
        expected_answer: str_field(value, "expected_answer"),
        key_points: value
            .get("key_points")
            .map(|v| string_items(v, usize::MAX))
            .unwrap_or_default(),
        topic: str_field(value, "topic"),
    })
}
