//! The interviewer: reaction text for the candidate and the technology
//! switch decision.
//!
//! The reaction travels to the orchestrator as one string carrying an
//! embedded `__NEXT_TECH__=<slug>` line, which [`parse_reaction`] strips.

use std::sync::{Arc, OnceLock};

use interview_llm::TextGenerator;
use interview_types::{CandidateProfile, ObserverResult};
use regex::Regex;
use serde_json::json;

use crate::json_extract::{extract_json_object, str_field};
use crate::tech_extraction::canonical_slug;

pub const NEXT_TECH_MARKER: &str = "__NEXT_TECH__=";

// Nouns that name what is being switched.
const SUBJECT: &str = r"(?:topic|subject|tech\w*|stack|language|area)";

fn switch_intent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"\b(?:switch(?:ing)?\s+(?:over\s+)?to|(?:switch|change)\s+(?:the\s+)?{SUBJECT}|move\s+(?:on\s+)?to|talk\s+about|ask\s+(?:me\s+)?about|(?:how|what)\s+about|let'?s\s+(?:do|try|discuss|talk|move|go|switch|continue\s+with|focus\s+on)\b|переключ\w*|смени\w*|перейд\w*|перейти|поговорим|давай(?:те)?\s+(?:про|о|об|на|по|лучше|другую|другой|другое))\b"
        ))
        .expect("valid switch intent regex")
    })
}

fn another_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:another|(?:a\s+)?different\s+one|something\s+else|some\s+other|the\s+other\s+one|друг(?:ую|ой|ое)|что-то\s+другое)\b",
        )
        .expect("valid another regex")
    })
}

fn another_subject_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"\b(?:another|different|other|друг(?:ую|ой|ое))\s+(?:{SUBJECT}|технолог\w*|тем\w*|язык\w*|стек\w*)\b"
        ))
        .expect("valid another subject regex")
    })
}

fn request_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:can\s+we|could\s+we|i'?d\s+like|i\s+would\s+like|i\s+want|please|let'?s|давай\w*|можно|хочу)\b")
            .expect("valid request regex")
    })
}

fn normalize_message(message: &str) -> String {
    message.to_lowercase().replace('\u{2019}', "'")
}

/// Whether the message asks to change the subject, as opposed to merely
/// mentioning another technology while answering.
fn has_switch_intent(message: &str) -> bool {
    switch_intent_re().is_match(&normalize_message(message))
}

// ---------------------------------------------------------------------------
// Switch decision
// ---------------------------------------------------------------------------

fn has_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-zA-Zа-яА-Я0-9_+#.\-]+").expect("valid word regex"))
}

/// Deterministic `next_tech` for one candidate message.
///
/// 1. No allowed technologies or no current technology: empty.
/// 2. A switch request naming an allowed technology: that technology.
/// 3. A request for "another one" without a name: the technology after
///    `current` in `allowed`, cyclically.
/// 4. Otherwise empty.
///
/// Requests are recognised by whole phrases ("switch to", "move on to",
/// "another technology"), so an answer that merely mentions a technology
/// or uses words like "change" or "other" never switches.
///
/// The result is always empty or a member of `allowed`, and never equal
/// to `current`.
pub fn decide_next_tech(allowed: &[String], current: &str, user_message: &str) -> String {
    if allowed.is_empty() || current.trim().is_empty() {
        return String::new();
    }
    let message = normalize_message(user_message);
    let intent = switch_intent_re().is_match(&message);

    if intent {
        let named = word_re()
            .find_iter(&message)
            .filter_map(|m| canonical_slug(m.as_str().trim_end_matches('.')))
            .find(|slug| *slug != current && allowed.iter().any(|a| a == slug));
        if let Some(slug) = named {
            return slug.to_string();
        }
    }

    let wants_another = (intent && another_re().is_match(&message))
        || (another_subject_re().is_match(&message)
            && (intent || request_re().is_match(&message)));
    if wants_another {
        let next = match allowed.iter().position(|a| a == current) {
            Some(i) => &allowed[(i + 1) % allowed.len()],
            None => &allowed[0],
        };
        if next != current {
            return next.clone();
        }
    }

    String::new()
}

// ---------------------------------------------------------------------------
// Tone hints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToneHint {
    RejectsPractice,
    Buzzwords,
    CopyPaste,
    Overlong,
}

impl ToneHint {
    fn instruction(self) -> &'static str {
        match self {
            ToneHint::RejectsPractice => {
                "The candidate rejects established practice (CI/CD, tests, reviews): ask about the risks of that approach."
            }
            ToneHint::Buzzwords => {
                "The answer is mostly buzzwords: ask for practical value or one concrete example."
            }
            ToneHint::CopyPaste => {
                "The answer looks copy-pasted: ask the candidate to restate it briefly in their own words."
            }
            ToneHint::Overlong => {
                "The answer is too long or drifts away: politely ask for a concise, on-point answer."
            }
        }
    }
}

const REJECTION_MARKERS: &[&str] = &[
    "tests are useless",
    "tests are a waste",
    "don't need tests",
    "dont need tests",
    "no need for tests",
    "never write tests",
    "code review is",
    "ci/cd is",
    "не нужны тесты",
    "тесты не нужны",
    "без тестов",
    "ревью не нужно",
];

const BUZZWORDS: &[&str] = &[
    "synergy",
    "blockchain",
    "ai-driven",
    "cloud-native",
    "disruptive",
    "leverage",
    "paradigm",
    "best practices",
    "game changer",
    "big data",
    "web3",
    "hyperscale",
];

const OVERLONG_CHARS: usize = 1200;

fn tone_hints(message: &str, off_topic: bool) -> Vec<ToneHint> {
    let lower = message.to_lowercase();
    let mut hints = Vec::new();
    if has_any(&lower, REJECTION_MARKERS) {
        hints.push(ToneHint::RejectsPractice);
    }
    if BUZZWORDS.iter().filter(|b| lower.contains(*b)).count() >= 3 {
        hints.push(ToneHint::Buzzwords);
    }
    let structured_lines = message
        .lines()
        .filter(|l| {
            let l = l.trim_start();
            l.starts_with("- ") || l.starts_with("* ") || l.starts_with('#')
        })
        .count();
    if message.contains("```") || structured_lines >= 3 || lower.contains("as an ai") {
        hints.push(ToneHint::CopyPaste);
    }
    if off_topic || message.chars().count() > OVERLONG_CHARS {
        hints.push(ToneHint::Overlong);
    }
    hints
}

// ---------------------------------------------------------------------------
// Interviewer
// ---------------------------------------------------------------------------

pub struct InterviewerInput<'a> {
    pub profile: &'a CandidateProfile,
    pub current_tech: &'a str,
    pub next_question: &'a str,
    pub observer: &'a ObserverResult,
    pub user_message: &'a str,
    pub last_question: &'a str,
    pub history_summary: &'a str,
}

pub struct Interviewer {
    generator: Arc<dyn TextGenerator>,
}

impl Interviewer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Reaction text, the `next_tech` marker line and the next question.
    ///
    /// The switch is decided by [`decide_next_tech`]; the generator's own
    /// proposal only counts when the rules found nothing, the message shows
    /// switch intent, and the proposal is an allowed technology.
    pub async fn react(&self, input: &InterviewerInput<'_>) -> String {
        let decided = decide_next_tech(
            &input.profile.technologies,
            input.current_tech,
            input.user_message,
        );
        let prompt = build_prompt(input, &decided);

        let raw = match self.generator.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Interviewer request failed");
                return format!("\n{NEXT_TECH_MARKER}\n\n{}", input.next_question);
            }
        };

        let parsed = extract_json_object(&raw);
        let reaction = single_question(&str_field(&parsed, "reaction"));
        let proposed = str_field(&parsed, "next_tech").to_lowercase();

        let next_tech = if !decided.is_empty() {
            decided
        } else if !proposed.is_empty()
            && proposed != input.current_tech
            && input.profile.allows(&proposed)
            && has_switch_intent(input.user_message)
        {
            proposed
        } else {
            if !proposed.is_empty() {
                tracing::debug!(proposed = %proposed, "Ignoring technology switch proposal");
            }
            String::new()
        };

        format!("{reaction}\n{NEXT_TECH_MARKER}{next_tech}\n\n{}", input.next_question)
    }
}

fn build_prompt(input: &InterviewerInput<'_>, decided: &str) -> String {
    let obs = input.observer;
    let hint = json!({
        "correctness": obs.assessment.correctness.to_string(),
        "off_topic": obs.flags.off_topic,
        "hallucination": obs.flags.hallucination_detected,
        "candidate_question": obs.flags.candidate_question,
        "missing_points": obs.assessment.missing_points.iter().take(3).collect::<Vec<_>>(),
        "correct_answer_short": obs.assessment.correct_answer_short,
        "instruction": obs.instruction_to_interviewer,
    });
    let allowed = serde_json::to_string(&input.profile.technologies).unwrap_or_else(|_| "[]".into());
    let tone: Vec<&str> = tone_hints(input.user_message, obs.flags.off_topic)
        .into_iter()
        .map(ToneHint::instruction)
        .collect();
    let tone = if tone.is_empty() {
        "- none".to_string()
    } else {
        tone.iter().map(|t| format!("- {t}")).collect::<Vec<_>>().join("\n")
    };

    format!(
        r#"
You are an Interviewer (technical interviewer) in IT. Candidate: {name}, {grade} {position}.

Your task is to react to the candidate's last message and, if needed, SWITCH TECHNOLOGY, but only within ALLOWED_TECHS.

CURRENT INPUTS:
- ALLOWED_TECHS: {allowed}
- CURRENT_TECH: {current}
- USER_MESSAGE: {user_message}
- LAST_QUESTION: {last_question}
- OBSERVER_HINT: {hint}
- HISTORY_SUMMARY: {history}
- DECIDED_NEXT_TECH: "{decided}"

SWITCHING RULES (important):
1) If ALLOWED_TECHS is empty or CURRENT_TECH is empty, do NOT suggest or switch; next_tech must be "".
2) If the candidate explicitly asks to switch to a specific technology, set next_tech to it (strictly from ALLOWED_TECHS).
3) If the candidate asks for "another technology" without naming one, set next_tech to the next one from ALLOWED_TECHS (cyclic).
4) If the candidate does NOT request a switch, next_tech must be "".
5) Talk to the candidate in the language they use.

ADAPTIVE BEHAVIOR:
{tone}

FORMAT: return ONLY JSON:
{{
  "reaction": "1-2 sentences of reaction",
  "next_tech": "python|go|...|\"\""
}}

CONSTRAINT:
- reaction must not contain more than one question.
- If next_tech is not empty, confirm the switch first in reaction.
"#,
        name = input.profile.name,
        grade = input.profile.grade,
        position = input.profile.position,
        current = input.current_tech,
        user_message = input.user_message,
        last_question = input.last_question,
        history = input.history_summary,
    )
}

/// Keep the reaction up to and including its first question mark.
fn single_question(reaction: &str) -> String {
    let reaction = reaction.trim();
    match reaction.char_indices().filter(|(_, c)| *c == '?').nth(1) {
        Some(_) => {
            let end = reaction.find('?').map_or(reaction.len(), |i| i + 1);
            reaction[..end].to_string()
        }
        None => reaction.to_string(),
    }
}

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"__NEXT_TECH__=([a-z0-9_+\-]*)").expect("valid marker regex"))
}

fn marker_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n?__NEXT_TECH__=[^\n]*\n?").expect("valid marker line regex"))
}

/// Split interviewer output into the text shown to the candidate and the
/// proposed `next_tech` (empty when none).
pub fn parse_reaction(raw: &str) -> (String, String) {
    let next_tech = marker_re()
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let visible = marker_line_re().replace_all(raw, "\n").trim().to_string();
    (visible, next_tech)
}
