//! Interview turn loop.
//!
//! One session moves through `Bootstrapping -> Active -> Concluding -> Done`.
//! Bootstrapping detects technologies, builds the plan, loads documentation
//! for the primary technology and starts one background task for the rest.
//! Each active turn evaluates the answer, folds the judgment into the
//! evaluation state, prepares the next question and lets the interviewer
//! react. Concluding waits briefly for the background task and produces the
//! final feedback.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use interview_llm::TextGenerator;
use interview_rag::{DocLoader, DocSource, DocumentStore, Retriever};
use interview_types::{
    CandidateProfile, Difficulty, EvaluationState, FinalFeedback, InterviewError, InterviewPlan,
    PlannedQuestion, QaItem, Result, RetrievalContext, TopicStatus, TranscriptWriter,
};
use tokio::task::JoinHandle;

use crate::candidate::CandidateInput;
use crate::config::EngineConfig;
use crate::console::Console;
use crate::events::{EventEmitter, InterviewEvent};
use crate::feedback::generate_final_feedback;
use crate::interviewer::{parse_reaction, Interviewer, InterviewerInput};
use crate::observer::Observer;
use crate::plan::{normalize_topic_seed, PlanBuilder};
use crate::question_gen::QuestionGenerator;
use crate::tech_extraction::extract_tech_slugs;

const STOP_THOUGHTS: &str = "[Observer]: stop requested. [Interviewer]: generate final feedback.";
const INPUT_PROMPT: &str = "You: ";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// External capabilities a session runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn TextGenerator>,
    pub retriever: Arc<dyn Retriever>,
    pub source: Arc<dyn DocSource>,
    pub store: Arc<DocumentStore>,
}

impl Collaborators {
    /// Retrieval runs against `store`, which the loader fills from `source`.
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        source: Arc<dyn DocSource>,
        store: Arc<DocumentStore>,
    ) -> Self {
        Self {
            generator,
            retriever: store.clone(),
            source,
            store,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = retriever;
        self
    }
}

/// What the candidate told us before the interview starts. Blank fields
/// take the defaults `Alex`, `Backend Developer` and `Junior`.
#[derive(Debug, Clone, Default)]
pub struct CandidateIntake {
    pub name: String,
    pub position: String,
    pub grade: String,
    /// Free-text stack description.
    pub stack: String,
}

impl CandidateIntake {
    fn profile(&self, technologies: Vec<String>) -> CandidateProfile {
        fn or_default(value: &str, default: &str) -> String {
            let value = value.trim();
            if value.is_empty() {
                default.to_string()
            } else {
                value.to_string()
            }
        }
        CandidateProfile {
            name: or_default(&self.name, "Alex"),
            position: or_default(&self.position, "Backend Developer"),
            grade: or_default(&self.grade, "Junior"),
            technologies,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Bootstrapping,
    Active,
    Concluding,
    Done,
}

/// Everything a finished session produced.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub profile: CandidateProfile,
    pub evaluation: EvaluationState,
    pub feedback: FinalFeedback,
    pub transcript_path: PathBuf,
    pub final_state: SessionState,
    /// Technology active when the session ended; empty in domain mode.
    pub current_tech: String,
    pub difficulty: Difficulty,
    /// Evaluated turns, not counting the stop turn.
    pub turns: u32,
}

// ---------------------------------------------------------------------------
// Per-run state
// ---------------------------------------------------------------------------

/// State owned by the turn loop. The background task never touches it.
struct RunState {
    profile: CandidateProfile,
    domain_mode: bool,
    plan: InterviewPlan,
    current_tech: String,
    difficulty: Difficulty,
    qa: QaItem,
    context: RetrievalContext,
    /// Planned question behind `qa`, kept so a technology switch can put it back.
    planned: Option<PlannedQuestion>,
    evaluation: EvaluationState,
    last_agent_message: String,
    transcript: TranscriptWriter,
    turns: u32,
}

impl RunState {
    /// Tag used for the current turn: the technology, or the position in
    /// domain mode.
    fn tech_label(&self) -> String {
        if self.current_tech.is_empty() {
            self.profile.position.clone()
        } else {
            self.current_tech.clone()
        }
    }

    fn log_turn(&mut self, user_message: &str, thoughts: &str) {
        if let Err(e) = self
            .transcript
            .log_turn(user_message, self.last_agent_message.clone(), thoughts)
        {
            tracing::warn!(error = %e, "Failed to write transcript turn");
        }
    }
}

// ---------------------------------------------------------------------------
// InterviewSession
// ---------------------------------------------------------------------------

pub struct InterviewSession {
    config: EngineConfig,
    collaborators: Collaborators,
    console: Console,
    input: Arc<dyn CandidateInput>,
    events: EventEmitter,
    state: SessionState,
    questions: QuestionGenerator,
    planner: PlanBuilder,
    observer: Observer,
    interviewer: Interviewer,
    loader: DocLoader,
}

impl InterviewSession {
    pub fn new(
        config: EngineConfig,
        collaborators: Collaborators,
        console: Console,
        input: Arc<dyn CandidateInput>,
    ) -> Self {
        let generator = collaborators.generator.clone();
        Self {
            questions: QuestionGenerator::new(
                generator.clone(),
                collaborators.retriever.clone(),
                config.clone(),
            ),
            planner: PlanBuilder::new(
                generator.clone(),
                collaborators.source.clone(),
                config.topics_per_tech,
            ),
            observer: Observer::new(generator.clone(), config.clone()),
            interviewer: Interviewer::new(generator),
            loader: DocLoader::new(collaborators.source.clone(), collaborators.store.clone()),
            config,
            collaborators,
            console,
            input,
            events: EventEmitter::default(),
            state: SessionState::Bootstrapping,
        }
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        tracing::info!(from = ?self.state, to = ?next, "Session state changed");
        self.state = next;
    }

    /// Run one interview to completion.
    ///
    /// Only bootstrap failures surface as errors: an unwritable transcript
    /// or an unreachable documentation source when technologies were found.
    /// Everything after bootstrap degrades instead of failing.
    pub async fn run(&mut self, intake: CandidateIntake) -> Result<SessionOutcome> {
        self.state = SessionState::Bootstrapping;
        let (mut run, background) = self.bootstrap(&intake).await?;

        self.transition(SessionState::Active);
        self.turn_loop(&mut run).await;

        self.transition(SessionState::Concluding);
        let feedback = self.conclude(&mut run, background).await;

        self.transition(SessionState::Done);
        Ok(SessionOutcome {
            transcript_path: run.transcript.path().to_path_buf(),
            profile: run.profile,
            evaluation: run.evaluation,
            feedback,
            final_state: self.state,
            current_tech: run.current_tech,
            difficulty: run.difficulty,
            turns: run.turns,
        })
    }

    // -- Bootstrapping -----------------------------------------------------

    async fn bootstrap(
        &mut self,
        intake: &CandidateIntake,
    ) -> Result<(RunState, Option<JoinHandle<HashSet<String>>>)> {
        let transcript =
            TranscriptWriter::create(&self.config.team_name, &self.config.transcript_path)?;

        let techs = if intake.stack.trim().is_empty() {
            Vec::new()
        } else {
            extract_tech_slugs(
                self.collaborators.generator.as_ref(),
                &intake.stack,
                self.config.max_techs,
            )
            .await
        };
        let profile = intake.profile(techs.clone());
        let domain_mode = techs.is_empty();

        self.events.emit(InterviewEvent::SessionStarted {
            candidate: profile.name.clone(),
            position: profile.position.clone(),
            grade: profile.grade.clone(),
        });
        self.events.emit(InterviewEvent::TechnologiesDetected {
            technologies: techs.clone(),
            domain_mode,
        });

        let mut run = RunState {
            domain_mode,
            plan: InterviewPlan::default(),
            current_tech: techs.first().cloned().unwrap_or_default(),
            difficulty: Difficulty::default(),
            qa: QaItem::default(),
            context: RetrievalContext::empty(),
            planned: None,
            evaluation: EvaluationState::default(),
            last_agent_message: String::new(),
            transcript,
            turns: 0,
            profile,
        };

        let mut background = None;
        if domain_mode {
            self.console
                .write("No technologies recognised, the interview will cover your role and experience.");
            let question = self
                .planner
                .generate_role_question(&run.profile.grade, &run.profile.position, "", "")
                .await;
            run.qa = QaItem::ungrounded(question, run.profile.position.clone());
            self.announce_role_question(&run);
            run.last_agent_message = format!(
                "Hi, {}! Let's start the interview for the {} role.\n\n{}",
                run.profile.name, run.profile.position, run.qa.question
            );
        } else {
            self.check_doc_source().await?;

            let primary = run.current_tech.clone();
            let pending: Vec<String> = techs[1..].to_vec();
            self.console.write(format!("Recognised technologies: {techs:?}"));
            self.console.write(format!("Primary technology: {primary}"));
            if !pending.is_empty() {
                self.console.write(format!("Loading in background: {pending:?}"));
            }

            self.console.write("Building the interview plan...");
            run.plan = self
                .planner
                .build_plan(&run.profile.grade, &run.profile.position, &techs)
                .await;
            self.events.emit(InterviewEvent::PlanBuilt {
                technologies: techs.clone(),
                questions: run.plan.remaining(),
            });

            self.console
                .write(format!("Loading documentation for {primary}..."));
            let loaded = self.load_primary_docs(&primary, run.plan.topics_for(&primary)).await;
            self.events.emit(InterviewEvent::PrimaryDocsLoaded {
                tech: primary.clone(),
                loaded,
            });
            if loaded {
                self.console.write(format!("Documentation ready: {primary}"));
            } else {
                self.console.write(format!(
                    "Could not load documentation for {primary}, continuing without grounding guarantees."
                ));
            }

            if !pending.is_empty() {
                let mut loaded_set = HashSet::new();
                if loaded {
                    loaded_set.insert(primary.clone());
                }
                background = Some(self.spawn_background_load(pending, &run.plan, loaded_set));
            }

            self.prepare_next_question(&mut run, true).await;
            run.last_agent_message = format!(
                "Hi, {}! Let's start the technical interview on {primary}.\n\n{}",
                run.profile.name, run.qa.question
            );
        }

        self.show_agent_message(&run);
        let stop_word = self
            .config
            .stop_words
            .first()
            .cloned()
            .unwrap_or_else(|| "stop".into());
        self.console
            .write(format!("(Type '{stop_word}' to finish and get feedback)"));
        Ok((run, background))
    }

    async fn check_doc_source(&self) -> Result<()> {
        match self.collaborators.source.health_check().await {
            Ok(()) => Ok(()),
            Err(e) if e.is_bootstrap_fatal() => Err(e),
            Err(e) => Err(InterviewError::Unavailable {
                name: "documentation source".into(),
                message: e.to_string(),
            }),
        }
    }

    async fn load_primary_docs(&self, primary: &str, topics: &[String]) -> bool {
        let max_hits = Some(self.config.primary_max_hits);
        if topics.is_empty() {
            self.loader.load_docs_for_tech(primary, max_hits).await
        } else {
            self.loader
                .load_docs_for_tech_with_topics(primary, topics, max_hits)
                .await
        }
    }

    fn spawn_background_load(
        &self,
        pending: Vec<String>,
        plan: &InterviewPlan,
        loaded: HashSet<String>,
    ) -> JoinHandle<HashSet<String>> {
        let loader = self.loader.clone();
        let console = self.console.clone();
        let topics_map = plan.topics_map.clone();
        let max_hits = self.config.background_max_hits;
        tokio::spawn(async move {
            let before = loaded.len();
            let loaded = loader
                .background_load(pending, topics_map, loaded, max_hits)
                .await;
            if loaded.len() > before {
                let mut techs: Vec<&String> = loaded.iter().collect();
                techs.sort();
                console.write(format!("[background] documentation loaded: {techs:?}"));
            }
            loaded
        })
    }

    // -- Active ------------------------------------------------------------

    async fn turn_loop(&mut self, run: &mut RunState) {
        loop {
            let answer = match self.input.ask(INPUT_PROMPT).await {
                Ok(answer) => answer.trim().to_string(),
                Err(e) => {
                    tracing::warn!(error = %e, "Candidate input ended, concluding");
                    run.log_turn("", STOP_THOUGHTS);
                    return;
                }
            };

            if self.config.is_stop_word(&answer) {
                tracing::info!(turns = run.turns, "Stop requested");
                run.log_turn(&answer, STOP_THOUGHTS);
                return;
            }
            if answer.is_empty() {
                self.console
                    .write("Interviewer: Please answer the question (or type 'stop').");
                continue;
            }

            run.turns += 1;
            let label = run.tech_label();
            let observation = self
                .observer
                .analyze(&label, &run.qa.question, &answer, &run.qa, &run.context)
                .await;

            let topic = run
                .evaluation
                .absorb(&label, &run.qa, &answer, &observation, &label);
            run.difficulty = run.difficulty.adjust(observation.difficulty_adjustment);
            self.events.emit(InterviewEvent::TurnEvaluated {
                turn: run.turns,
                topic,
                correctness: observation.assessment.correctness.to_string(),
                off_topic: observation.flags.off_topic,
                hallucination: observation.flags.hallucination_detected,
            });
            tracing::info!(
                turn = run.turns,
                tech = %label,
                correctness = %observation.assessment.correctness,
                difficulty = run.difficulty.level(),
                "Turn evaluated"
            );

            let thoughts = format!(
                "[Observer]: {} [Interviewer]: will_follow='{}'",
                observation.internal_thoughts, observation.instruction_to_interviewer
            );
            run.log_turn(&answer, &thoughts);

            if observation.topic_status == TopicStatus::WrapUp {
                tracing::info!(turn = run.turns, "Observer requested wrap-up");
                return;
            }

            let previous_question = run.qa.question.clone();
            if run.domain_mode {
                let question = self
                    .planner
                    .generate_role_question(
                        &run.profile.grade,
                        &run.profile.position,
                        &previous_question,
                        &answer,
                    )
                    .await;
                run.qa = QaItem::ungrounded(question, run.profile.position.clone());
                run.context = RetrievalContext::empty();
                self.announce_role_question(run);
            } else {
                self.prepare_next_question(run, true).await;
            }

            let history_summary = format!(
                "Current technology: {label}. Last assessment: {}.",
                observation.assessment.correctness
            );
            let raw = self
                .interviewer
                .react(&InterviewerInput {
                    profile: &run.profile,
                    current_tech: &run.current_tech,
                    next_question: &run.qa.question,
                    observer: &observation,
                    user_message: &answer,
                    last_question: &previous_question,
                    history_summary: &history_summary,
                })
                .await;
            let (mut visible, next_tech) = parse_reaction(&raw);

            if !next_tech.is_empty() && next_tech != run.current_tech {
                if run.profile.allows(&next_tech) {
                    visible = self.switch_technology(run, &next_tech, &visible).await;
                } else {
                    tracing::warn!(proposed = %next_tech, "Ignoring switch to a technology outside the allowed list");
                }
            }

            run.last_agent_message = visible;
            self.show_agent_message(run);
        }
    }

    /// Make `next` the current technology and swap the already prepared
    /// question for one about `next`. Returns the updated visible message.
    async fn switch_technology(&self, run: &mut RunState, next: &str, visible: &str) -> String {
        let previous = std::mem::replace(&mut run.current_tech, next.to_string());
        tracing::info!(from = %previous, to = %next, "Technology switched");
        self.events.emit(InterviewEvent::TechnologySwitched {
            from: previous,
            to: next.to_string(),
        });

        let old_question = run.qa.question.clone();
        if let Some(planned) = run.planned.take() {
            run.plan.questions_queue.push_front(planned);
        }
        self.prepare_next_question(run, false).await;

        let reaction = visible
            .strip_suffix(old_question.as_str())
            .unwrap_or(visible)
            .trim();
        if reaction.is_empty() {
            run.qa.question.clone()
        } else {
            format!("{reaction}\n\n{}", run.qa.question)
        }
    }

    /// Next question for the current technology: the queued one (grounded
    /// through retrieval if possible), otherwise a freshly synthesised one.
    ///
    /// With `follow_queue`, an exhausted technology hands over to the queue
    /// head, and the current technology follows that question.
    async fn prepare_next_question(&self, run: &mut RunState, follow_queue: bool) {
        let tech = run.current_tech.clone();
        let planned = if follow_queue {
            run.plan.pop_next(&tech)
        } else {
            run.plan.pop_for_tech(&tech)
        };

        let (qa, context) = match &planned {
            Some(p) => {
                if p.tech != tech {
                    tracing::debug!(current = %tech, planned = %p.tech, "No queued question left for current technology");
                }
                let seed = normalize_topic_seed(&p.topic, &p.tech);
                let (qa, context) = self
                    .questions
                    .ensure_expected_from_rag(&p.tech, &p.question, &seed)
                    .await;
                if qa.has_expected_answer() {
                    (qa, context)
                } else {
                    self.questions
                        .make_answerable_question(&p.tech, run.difficulty, self.config.max_tries, &p.topic)
                        .await
                }
            }
            None => {
                self.questions
                    .make_answerable_question(&tech, run.difficulty, self.config.max_tries, "")
                    .await
            }
        };

        if let Some(p) = &planned {
            if p.tech != run.current_tech {
                let previous = std::mem::replace(&mut run.current_tech, p.tech.clone());
                self.events.emit(InterviewEvent::TechnologySwitched {
                    from: previous,
                    to: p.tech.clone(),
                });
            }
        }

        self.events.emit(InterviewEvent::QuestionAsked {
            turn: run.turns + 1,
            tech: run.current_tech.clone(),
            question: qa.question.clone(),
            grounded: qa.has_expected_answer(),
        });
        run.qa = qa;
        run.context = context;
        run.planned = planned;
    }

    fn announce_role_question(&self, run: &RunState) {
        self.events.emit(InterviewEvent::QuestionAsked {
            turn: run.turns + 1,
            tech: String::new(),
            question: run.qa.question.clone(),
            grounded: false,
        });
    }

    fn show_agent_message(&self, run: &RunState) {
        self.console
            .write(format!("\nInterviewer:\n{}\n", run.last_agent_message));
    }

    // -- Concluding --------------------------------------------------------

    async fn conclude(
        &mut self,
        run: &mut RunState,
        background: Option<JoinHandle<HashSet<String>>>,
    ) -> FinalFeedback {
        if let Some(mut handle) = background {
            let (loaded, timed_out) =
                match tokio::time::timeout(self.config.background_timeout(), &mut handle).await {
                    Ok(Ok(loaded)) => (loaded, false),
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "Background documentation task failed");
                        (HashSet::new(), false)
                    }
                    Err(_) => {
                        tracing::warn!("Background documentation load still running, abandoning it");
                        handle.abort();
                        (HashSet::new(), true)
                    }
                };
            let mut loaded: Vec<String> = loaded.into_iter().collect();
            loaded.sort();
            self.events
                .emit(InterviewEvent::BackgroundLoadFinished { loaded, timed_out });
        }

        let feedback = generate_final_feedback(
            self.collaborators.generator.as_ref(),
            &run.profile,
            &run.evaluation,
        )
        .await;
        if let Err(e) = run.transcript.log_feedback(feedback.clone()) {
            tracing::warn!(error = %e, "Failed to write final feedback to transcript");
        }

        self.console.write(format!(
            "\nFINAL FEEDBACK (saved to {}):\n",
            run.transcript.path().display()
        ));
        match serde_json::to_string_pretty(&feedback) {
            Ok(json) => self.console.write(json),
            Err(e) => tracing::warn!(error = %e, "Failed to render feedback"),
        }
        self.console.write(format!(
            "\nDone. Log file: {}",
            run.transcript.path().display()
        ));

        self.events.emit(InterviewEvent::SessionConcluded {
            turns: run.turns,
            hiring_recommendation: feedback.decision.hiring_recommendation.clone(),
        });
        feedback
    }
}
