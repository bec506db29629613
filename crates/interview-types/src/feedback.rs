//! Structured end-of-interview feedback.

use serde::{Deserialize, Serialize};

use crate::model::{CandidateProfile, EvaluationState};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Decision {
    pub grade: String,
    pub hiring_recommendation: String,
    pub confidence_score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeGap {
    pub topic: String,
    pub issue: String,
    pub correct_answer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalReview {
    pub topics: Vec<String>,
    pub confirmed_skills: Vec<String>,
    pub knowledge_gaps: Vec<KnowledgeGap>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftSkills {
    pub clarity: String,
    pub honesty: String,
    pub engagement: String,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadmapItem {
    pub topic: String,
    pub next_steps: Vec<String>,
    pub links: Vec<String>,
}

/// Hiring decision, technical review and remediation roadmap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalFeedback {
    pub decision: Decision,
    pub technical_review: TechnicalReview,
    pub soft_skills: SoftSkills,
    pub roadmap: Vec<RoadmapItem>,
}

impl FinalFeedback {
    /// Deterministic feedback derived purely from the accumulated evaluation.
    pub fn from_evaluation(profile: &CandidateProfile, evaluation: &EvaluationState) -> Self {
        let grade = if profile.grade.trim().is_empty() {
            "Junior".to_string()
        } else {
            profile.grade.clone()
        };

        let mut topics = evaluation.topics.clone();
        topics.sort();
        topics.dedup();

        let knowledge_gaps: Vec<KnowledgeGap> = evaluation
            .gaps
            .iter()
            .map(|g| KnowledgeGap {
                topic: g.topic.clone(),
                issue: g.issue.clone(),
                correct_answer: g.correct_answer.clone(),
            })
            .collect();

        let roadmap = knowledge_gaps
            .iter()
            .map(|g| RoadmapItem {
                topic: g.topic.clone(),
                next_steps: vec![
                    format!("Review the reference documentation for {}", g.topic),
                    "Write a small example that exercises the concept".to_string(),
                ],
                links: Vec::new(),
            })
            .collect();

        Self {
            decision: Decision {
                grade,
                hiring_recommendation: "No Hire".into(),
                confidence_score: 55,
            },
            technical_review: TechnicalReview {
                topics,
                confirmed_skills: evaluation.confirmed.clone(),
                knowledge_gaps,
            },
            soft_skills: SoftSkills {
                clarity: "medium".into(),
                honesty: "medium".into(),
                engagement: "medium".into(),
                notes: vec!["Fallback feedback.".into()],
            },
            roadmap,
        }
    }
}
