//! Topic discovery and question-queue construction.

use std::sync::Arc;

use interview_llm::TextGenerator;
use interview_rag::DocSource;
use interview_types::{InterviewPlan, PlannedQuestion};

use crate::json_extract::{extract_json_array, extract_json_object, str_field, string_items};

/// Builds the interview plan and the role questions used in domain mode.
pub struct PlanBuilder {
    generator: Arc<dyn TextGenerator>,
    source: Arc<dyn DocSource>,
    topics_per_tech: usize,
}

impl PlanBuilder {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        source: Arc<dyn DocSource>,
        topics_per_tech: usize,
    ) -> Self {
        Self {
            generator,
            source,
            topics_per_tech,
        }
    }

    /// For each technology: ask for topic keywords, keep those the
    /// documentation source knows, fall back to the technology name, then
    /// ask for one question per kept topic.
    ///
    /// `topics_map[tech]` is never empty for a technology in `techs`.
    pub async fn build_plan(&self, grade: &str, position: &str, techs: &[String]) -> InterviewPlan {
        let mut plan = InterviewPlan::default();

        for tech in techs {
            let candidates = self
                .generate_topics_for_tech(grade, position, tech, self.topics_per_tech)
                .await;

            let mut validated = Vec::new();
            for topic in candidates {
                if self.has_docs(tech, &topic).await {
                    validated.push(topic);
                }
            }
            if validated.is_empty() {
                validated.push(tech.clone());
            }
            tracing::info!(tech = %tech, topics = ?validated, "Topics validated");

            for topic in &validated {
                let question = self
                    .generate_question_for_tech_topic(grade, position, tech, topic)
                    .await;
                plan.questions_queue.push_back(PlannedQuestion {
                    tech: tech.clone(),
                    topic: topic.clone(),
                    question,
                });
            }
            plan.topics_map.insert(tech.clone(), validated);
        }

        plan
    }

    /// Up to `max_topics` keywords usable as documentation search terms.
    /// An unparseable reply falls back to a fixed list per technology.
    pub async fn generate_topics_for_tech(
        &self,
        grade: &str,
        position: &str,
        tech: &str,
        max_topics: usize,
    ) -> Vec<String> {
        let prompt = format!(
            r#"
Return STRICTLY a JSON array of short keyword topics for the technology "{tech}".
Topics must match real headings/terms/packages of the official DevDocs documentation
and be usable as a keyword for a documentation search.
No more than {max_topics} topics. No explanations, only a JSON array of strings.
Context: grade={grade}, position={position}, tech={tech}
Example: ["slices","maps","fmt"]
"#
        );

        match self.generator.generate(&prompt).await {
            Ok(raw) => {
                let parsed = extract_json_array(&raw);
                if parsed.as_array().is_some_and(|a| !a.is_empty()) || raw.contains('[') {
                    return string_items(&parsed, max_topics);
                }
                tracing::warn!(tech, "Topic list unparseable, using fallback topics");
            }
            Err(e) => tracing::warn!(tech, error = %e, "Topic generation failed"),
        }
        fallback_topics(tech, max_topics)
    }

    pub async fn generate_question_for_tech_topic(
        &self,
        grade: &str,
        position: &str,
        tech: &str,
        topic: &str,
    ) -> String {
        let prompt = format!(
            r#"
You are a technical interviewer. Formulate ONE specific question for a {grade} candidate applying for {position}.
TECH: {tech}
TOPIC (keyword/area): {topic}
Requirement: return only a JSON object {{"question": "..."}}. The question must be short and directly about TOPIC.

Adaptivity (important):
- If the candidate drifts into empty generalities or buzzwords, ask a clarifying question about real experience.
- If the answer is too general or off-topic, ask for specifics or an example.
- The question must always stay within IT and be relevant to the position.
"#
        );

        self.ask_question(&prompt).await.unwrap_or_else(|| {
            format!("Explain what {topic} is in the context of {tech} and where it is typically used.")
        })
    }

    /// Next role/process question for domain mode.
    pub async fn generate_role_question(
        &self,
        grade: &str,
        position: &str,
        last_question: &str,
        last_answer: &str,
    ) -> String {
        let prompt = format!(
            r#"
You are an HR/technical interviewer in IT. Formulate ONE next question for the candidate.

Context:
- Position: {position}
- Level: {grade}
- Last question: {last_question}
- Candidate answer: {last_answer}

Requirements:
- If the candidate does not name technologies, do not demand them and do not ask to list a stack.
  Ask about the role, processes, responsibilities, typical tasks, cases, metrics
  or architecture decisions depending on the position.
- If the candidate drifts into generalities/noise or answers too long, ask a clarifying, more specific question.
- If the candidate confidently states nonsense or mixes up terms, ask to explain in practice or give an example.
- The question must be short, a single one, and always stay within IT.

Return only JSON:
{{"question": "..."}}
"#
        );

        self.ask_question(&prompt).await.unwrap_or_else(|| {
            format!("Tell me about your role as {position} and key tasks on recent projects.")
        })
    }

    async fn ask_question(&self, prompt: &str) -> Option<String> {
        match self.generator.generate(prompt).await {
            Ok(raw) => Some(str_field(&extract_json_object(&raw), "question")).filter(|q| !q.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Question request failed");
                None
            }
        }
    }

    async fn has_docs(&self, tech: &str, topic: &str) -> bool {
        match self.source.search(tech, topic).await {
            Ok(hits) => !hits.is_empty(),
            Err(e) => {
                tracing::warn!(tech, topic, error = %e, "Topic validation search failed");
                false
            }
        }
    }
}

fn fallback_topics(tech: &str, max_topics: usize) -> Vec<String> {
    let topics = match tech {
        "python" => vec!["asyncio", "typing", "decorators"],
        "go" => vec!["slices", "maps", "goroutines"],
        "javascript" => vec!["promises", "async-await", "dom"],
        _ => vec![tech, "introduction"],
    };
    topics.into_iter().take(max_topics).map(String::from).collect()
}

/// The topic used as retrieval seed: the planned topic, or the technology
/// when the topic is blank.
pub fn normalize_topic_seed(topic: &str, tech: &str) -> String {
    let topic = topic.trim();
    if topic.is_empty() {
        tech.to_string()
    } else {
        topic.to_string()
    }
}
