//! Final structured feedback built from the accumulated evaluation.

use interview_llm::TextGenerator;
use interview_types::{CandidateProfile, EvaluationState, FinalFeedback};
use serde_json::Value;

use crate::json_extract::extract_json_object;

/// Ask the generator for the final report. An unusable reply falls back to
/// [`FinalFeedback::from_evaluation`]. Gaps and roadmap recorded during the
/// interview are never lost: if the reply omits them they are filled in
/// from the evaluation.
pub async fn generate_final_feedback(
    generator: &dyn TextGenerator,
    profile: &CandidateProfile,
    evaluation: &EvaluationState,
) -> FinalFeedback {
    let fallback = FinalFeedback::from_evaluation(profile, evaluation);
    let evaluation_json = serde_json::to_string_pretty(evaluation).unwrap_or_default();
    let profile_json = serde_json::to_string(profile).unwrap_or_default();

    let prompt = format!(
        r#"
You are a Hiring Manager and Mentor. Produce a structured report for the finished interview.

Profile:
{profile_json}

Accumulated interview results (ground truth):
{evaluation_json}

Required format (ONLY JSON):
{{
  "decision": {{
    "grade": "Junior | Middle | Senior",
    "hiring_recommendation": "Hire | No Hire | Strong Hire",
    "confidence_score": 0-100
  }},
  "technical_review": {{
    "topics": ["..."],
    "confirmed_skills": ["..."],
    "knowledge_gaps": [
      {{
        "topic": "...",
        "issue": "...",
        "correct_answer": "..."
      }}
    ]
  }},
  "soft_skills": {{
    "clarity": "low|medium|high",
    "honesty": "low|medium|high",
    "engagement": "low|medium|high",
    "notes": ["..."]
  }},
  "roadmap": [
    {{
      "topic": "...",
      "next_steps": ["...","..."],
      "links": ["optional"]
    }}
  ]
}}

Rules:
- Every knowledge gap must include the correct answer.
- The roadmap must follow from the knowledge gaps.
- No text besides the JSON.
"#
    );

    let raw = match generator.generate(&prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "Feedback request failed, using fallback feedback");
            return fallback;
        }
    };

    let mut value = extract_json_object(&raw);
    if value.as_object().map_or(true, |o| o.is_empty()) {
        tracing::warn!("Feedback output unparseable, using fallback feedback");
        return fallback;
    }
    normalize_confidence(&mut value);

    match serde_json::from_value::<FinalFeedback>(value) {
        Ok(mut feedback) => {
            if feedback.decision.grade.trim().is_empty() {
                feedback.decision.grade = fallback.decision.grade.clone();
            }
            if feedback.decision.hiring_recommendation.trim().is_empty() {
                feedback.decision.hiring_recommendation = fallback.decision.hiring_recommendation.clone();
            }
            feedback.decision.confidence_score = feedback.decision.confidence_score.min(100);
            if feedback.technical_review.knowledge_gaps.is_empty() {
                feedback.technical_review.knowledge_gaps = fallback.technical_review.knowledge_gaps;
            }
            if feedback.roadmap.is_empty() {
                feedback.roadmap = fallback.roadmap;
            }
            feedback
        }
        Err(e) => {
            tracing::warn!(error = %e, "Feedback shape invalid, using fallback feedback");
            fallback
        }
    }
}

/// Generators like to answer `72.5` or `"80"` for an integer score.
fn normalize_confidence(value: &mut Value) {
    let Some(score) = value.pointer_mut("/decision/confidence_score") else {
        return;
    };
    let normalized = match &*score {
        Value::Number(n) if n.is_u64() => return,
        Value::Number(n) => n.as_f64().map(|f| f.round().clamp(0.0, 100.0) as u64),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok().map(|f| f.round().clamp(0.0, 100.0) as u64),
        _ => None,
    };
    *score = normalized.map_or(Value::from(0u64), Value::from);
}
