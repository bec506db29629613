//! End-to-end interview runs against scripted collaborators.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use interview_engine::{
    decide_next_tech, parse_reaction, CandidateIntake, Collaborators, Console, EngineConfig,
    InterviewEvent, InterviewSession, QuestionGenerator, ScriptedInput, SessionOutcome,
    SessionState,
};
use interview_llm::ScriptedGenerator;
use interview_rag::{DocHit, DocSource, FixedRetriever, InMemoryDocSource, Retriever};
use interview_types::{
    ContextChunk, Correctness, Difficulty, Result, RetrievalContext, Transcript,
};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const PARSER_FACT: &str = "Package parser implements a parser for Go source files.";
const SLICE_FACT: &str = "append returns the updated slice.";
const DECORATOR_FACT: &str = "A decorator wraps a function and returns a replacement callable.";

fn docs_text() -> String {
    format!(
        "{PARSER_FACT} Input may be provided in a variety of forms. {SLICE_FACT} \
         It is therefore necessary to store the result of append. {DECORATOR_FACT} \
         The output is an abstract syntax tree representing the source."
    )
}

fn good_ctx() -> RetrievalContext {
    RetrievalContext::from_chunks(vec![ContextChunk::new("memory://go/ref", docs_text())])
}

fn short_ctx() -> RetrievalContext {
    RetrievalContext::from_chunks(vec![ContextChunk::new("memory://go/x", "Too short to ground anything.")])
}

fn page(title: &str) -> String {
    format!("<h1>{title}</h1><p>{}</p>", docs_text())
}

fn expected_reply(expected: &str) -> String {
    format!(r#"{{"question": "unused", "expected_answer": "{expected}", "key_points": [], "topic": ""}}"#)
}

struct Harness {
    session: InterviewSession,
    console: Console,
    events: broadcast::Receiver<InterviewEvent>,
    _dir: tempfile::TempDir,
    transcript_path: std::path::PathBuf,
}

fn harness(
    generator: ScriptedGenerator,
    source: Arc<dyn DocSource>,
    retriever: Arc<dyn Retriever>,
    answers: &[&str],
    tweak: impl FnOnce(&mut EngineConfig),
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let transcript_path = dir.path().join("interview_log.json");
    let mut config = EngineConfig {
        transcript_path: transcript_path.clone(),
        ..EngineConfig::default()
    };
    tweak(&mut config);

    let store = Arc::new(config.document_store());
    let collaborators =
        Collaborators::new(Arc::new(generator), source, store).with_retriever(retriever);
    let console = Console::captured();
    let session = InterviewSession::new(
        config,
        collaborators,
        console.clone(),
        Arc::new(ScriptedInput::new(answers.iter().copied())),
    );
    let events = session.events().subscribe();
    Harness {
        session,
        console,
        events,
        _dir: dir,
        transcript_path,
    }
}

fn intake(stack: &str) -> CandidateIntake {
    CandidateIntake {
        name: "Alex".into(),
        position: "Backend Developer".into(),
        grade: "Junior".into(),
        stack: stack.into(),
    }
}

fn drain(rx: &mut broadcast::Receiver<InterviewEvent>) -> Vec<InterviewEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn assert_done(outcome: &SessionOutcome, path: &std::path::Path) -> Transcript {
    assert_eq!(outcome.final_state, SessionState::Done);
    assert_eq!(outcome.transcript_path, path);
    let transcript = Transcript::load(path).unwrap();
    assert!(transcript.final_feedback.is_some());
    transcript
}

// ---------------------------------------------------------------------------
// Scenario A: a plain non-answer is low correctness, not off-topic
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_answer_records_gap_for_current_technology() {
    let gen = ScriptedGenerator::new()
        .on("Observer/Critic", r#"{"flags": {"off_topic": true}, "assessment": {"topic": "parser", "correctness": "medium"}}"#)
        .on("You are an Interviewer", r#"{"reaction": "No problem, let's try another one.", "next_tech": ""}"#)
        .on("DevDocs slug", r#"["go"]"#)
        .on("keyword topics", r#"["parser"]"#)
        .on("ONE specific question", r#"{"question": "Which package parses Go source files?"}"#)
        .on("extract the expected answer", expected_reply(PARSER_FACT))
        .on(
            "Generate ONE question",
            format!(r#"{{"question": "What must you do with the result of append?", "expected_answer": "{SLICE_FACT}", "key_points": ["append"], "topic": "slices"}}"#),
        );
    let source = Arc::new(InMemoryDocSource::new().with_page("go", "Parser", "go/parser/index", page("parser")));
    let mut h = harness(gen, source, Arc::new(FixedRetriever::new(good_ctx())), &["I don't know", "stop"], |_| {});

    let outcome = h.session.run(intake("Go")).await.unwrap();

    assert_eq!(outcome.profile.technologies, vec!["go"]);
    assert_eq!(outcome.turns, 1);
    let turn = &outcome.evaluation.turns[0];
    assert_eq!(turn.correctness, Correctness::Low);
    assert_eq!(turn.question, "Which package parses Go source files?");
    assert_eq!(outcome.evaluation.signals.off_topic, 0);

    assert_eq!(outcome.evaluation.gaps.len(), 1);
    let gap = &outcome.evaluation.gaps[0];
    assert_eq!(gap.topic, "go:parser");
    assert_eq!(gap.correct_answer, PARSER_FACT);

    // Fallback feedback keeps the gap with its corrective answer.
    assert_eq!(outcome.feedback.technical_review.knowledge_gaps[0].topic, "go:parser");

    let transcript = assert_done(&outcome, &h.transcript_path);
    assert_eq!(transcript.turns.len(), 2);
    assert_eq!(transcript.turns[0].user_message, "I don't know");
    assert!(transcript.turns[0]
        .agent_visible_message
        .starts_with("Hi, Alex! Let's start the technical interview on go."));
    assert!(transcript.turns[0].internal_thoughts.starts_with("[Observer]: "));
    assert!(!transcript.turns[1].agent_visible_message.contains("__NEXT_TECH__"));

    let lines = h.console.captured_lines();
    assert!(lines.iter().any(|l| l.contains("Which package parses Go source files?")));
}

// ---------------------------------------------------------------------------
// Scenario B: no technologies means role questions only
// ---------------------------------------------------------------------------

#[tokio::test]
async fn domain_mode_never_plans_or_switches() {
    let gen = ScriptedGenerator::new()
        .on("Observer/Critic", r#"{"assessment": {"correctness": "medium"}}"#)
        .on("You are an Interviewer", r#"{"reaction": "Okay, switching.", "next_tech": "python"}"#)
        .on("DevDocs slug", "[]")
        .on("ONE next question", r#"{"question": "How do you plan a quarter?"}"#);
    let source = Arc::new(InMemoryDocSource::new());
    let retriever = Arc::new(FixedRetriever::new(good_ctx()));
    let mut h = harness(
        gen,
        source.clone(),
        retriever.clone(),
        &["let's switch to python", "We plan by outcomes, not tasks", "stop"],
        |_| {},
    );

    let outcome = h.session.run(intake("I lead a team and write roadmaps")).await.unwrap();

    assert!(outcome.profile.technologies.is_empty());
    assert_eq!(outcome.current_tech, "");
    assert_eq!(outcome.turns, 2);
    assert!(outcome
        .evaluation
        .turns
        .iter()
        .all(|t| t.question == "How do you plan a quarter?" && t.tech == "Backend Developer"));

    // No plan, no documentation, no retrieval.
    assert!(source.searches().is_empty());
    assert!(retriever.queries().is_empty());

    let events = drain(&mut h.events);
    assert!(events.contains(&InterviewEvent::TechnologiesDetected {
        technologies: vec![],
        domain_mode: true
    }));
    assert!(!events.iter().any(|e| matches!(
        e,
        InterviewEvent::PlanBuilt { .. } | InterviewEvent::TechnologySwitched { .. }
    )));

    // The generator proposed a switch; the rules still give none.
    assert_eq!(decide_next_tech(&[], "", "let's switch to python"), "");
    assert_done(&outcome, &h.transcript_path);
}

// ---------------------------------------------------------------------------
// Scenario C: a 50-character context fails the gate and broadens the query
// ---------------------------------------------------------------------------

#[tokio::test]
async fn short_context_broadens_and_falls_back() {
    let ctx = short_ctx();
    assert!(ctx.has_source_tag());
    assert!(ctx.char_len() < 220);

    let gen = Arc::new(ScriptedGenerator::new());
    let retriever = Arc::new(FixedRetriever::new(ctx));
    let qg = QuestionGenerator::new(gen.clone(), retriever.clone(), EngineConfig::default());

    let (qa, used) = qg.make_answerable_question("go", Difficulty::new(2), 3, "").await;
    assert!(!qa.question.is_empty());
    assert!(!qa.has_expected_answer());
    assert!(used.is_empty());
    assert!(gen.prompts().is_empty());

    let queries: Vec<String> = retriever.queries().into_iter().map(|(q, _, _)| q).collect();
    assert_eq!(queries[0], "go basic concepts");
    assert_eq!(queries[1], "go");
    assert_eq!(queries[2], "go basic concepts reference");
    assert_eq!(queries.len(), 6);
}

#[tokio::test]
async fn broadened_query_recovers_a_grounded_question() {
    let gen = Arc::new(ScriptedGenerator::new().on(
        "Generate ONE question",
        format!(r#"{{"question": "What does package parser implement?", "expected_answer": "{PARSER_FACT}", "key_points": ["parser"], "topic": "parser"}}"#),
    ));
    let retriever = Arc::new(
        FixedRetriever::new(short_ctx())
            .on("reference", good_ctx())
            .on("parser", good_ctx()),
    );
    let qg = QuestionGenerator::new(gen.clone(), retriever.clone(), EngineConfig::default());

    let (qa, used) = qg.make_answerable_question("go", Difficulty::new(1), 3, "").await;
    assert_eq!(qa.expected_answer, PARSER_FACT);
    assert!(used.text().contains(PARSER_FACT));
    assert_eq!(gen.prompts().len(), 1);

    let queries: Vec<String> = retriever.queries().into_iter().map(|(q, _, _)| q).collect();
    assert_eq!(queries[2], "go introduction overview reference");
    assert_eq!(queries[3], "What does package parser implement?");
}

#[tokio::test]
async fn every_difficulty_yields_a_question() {
    let qg = QuestionGenerator::new(
        Arc::new(ScriptedGenerator::new()),
        Arc::new(FixedRetriever::empty()),
        EngineConfig::default(),
    );
    for level in 1..=5 {
        let (qa, _) = qg.make_answerable_question("rust", Difficulty::new(level), 2, "").await;
        assert!(!qa.question.trim().is_empty(), "difficulty {level}");
    }
}

// ---------------------------------------------------------------------------
// Scenario D: an explicit switch request changes the current technology
// ---------------------------------------------------------------------------

#[tokio::test]
async fn explicit_switch_moves_to_requested_technology() {
    let gen = ScriptedGenerator::new()
        .on("Observer/Critic", r#"{"flags": {"candidate_question": true}, "assessment": {"correctness": "medium"}}"#)
        .on("You are an Interviewer", r#"{"reaction": "Sure, switching to Python.", "next_tech": "python"}"#)
        .on("DevDocs slug", r#"["go", "python"]"#)
        .on("keyword topics", r#"["slices", "maps", "decorators"]"#)
        .on("TOPIC (keyword/area): slices", r#"{"question": "What does append return?"}"#)
        .on("TOPIC (keyword/area): maps", r#"{"question": "Are Go maps ordered?"}"#)
        .on("TOPIC (keyword/area): decorators", r#"{"question": "What does a decorator do?"}"#)
        .on("QUESTION: What does a decorator do?", expected_reply(DECORATOR_FACT))
        .on("extract the expected answer", expected_reply(SLICE_FACT));
    let source = Arc::new(
        InMemoryDocSource::new()
            .with_page("go", "Slices", "ref/slices", page("slices"))
            .with_page("go", "Maps", "ref/maps", page("maps"))
            .with_page("python", "Decorators", "glossary/decorators", page("decorators")),
    );
    let mut h = harness(
        gen,
        source,
        Arc::new(FixedRetriever::new(good_ctx())),
        &["let's switch to python", "stop"],
        |_| {},
    );

    let outcome = h.session.run(intake("Golang mostly, some Python")).await.unwrap();

    assert_eq!(outcome.profile.technologies, vec!["go", "python"]);
    assert_eq!(outcome.current_tech, "python");
    assert_eq!(outcome.evaluation.signals.candidate_question, 1);
    assert_eq!(outcome.evaluation.turns[0].tech, "go");

    let events = drain(&mut h.events);
    assert!(events.contains(&InterviewEvent::TechnologySwitched {
        from: "go".into(),
        to: "python".into()
    }));

    let transcript = assert_done(&outcome, &h.transcript_path);
    let shown = &transcript.turns[1].agent_visible_message;
    assert_eq!(shown, "Sure, switching to Python.\n\nWhat does a decorator do?");

    let (_, next) = parse_reaction("Sure.\n__NEXT_TECH__=python\n\nQ?");
    assert_eq!(next, "python");
}

#[tokio::test]
async fn ordinary_answer_mentioning_another_technology_keeps_current() {
    let gen = ScriptedGenerator::new()
        .on("Observer/Critic", r#"{"assessment": {"correctness": "medium", "topic": "slices"}}"#)
        .on("You are an Interviewer", r#"{"reaction": "Right.", "next_tech": "python"}"#)
        .on("DevDocs slug", r#"["go", "python"]"#)
        .on("keyword topics", r#"["slices", "maps", "decorators"]"#)
        .on("TOPIC (keyword/area): slices", r#"{"question": "What does append return?"}"#)
        .on("TOPIC (keyword/area): maps", r#"{"question": "Are Go maps ordered?"}"#)
        .on("TOPIC (keyword/area): decorators", r#"{"question": "What does a decorator do?"}"#)
        .on("QUESTION: What does a decorator do?", expected_reply(DECORATOR_FACT))
        .on("extract the expected answer", expected_reply(SLICE_FACT));
    let source = Arc::new(
        InMemoryDocSource::new()
            .with_page("go", "Slices", "ref/slices", page("slices"))
            .with_page("go", "Maps", "ref/maps", page("maps"))
            .with_page("python", "Decorators", "glossary/decorators", page("decorators")),
    );
    let mut h = harness(
        gen,
        source,
        Arc::new(FixedRetriever::new(good_ctx())),
        &[
            "Let's see, it is similar to a python list: the slices exchange data with each other",
            "stop",
        ],
        |_| {},
    );

    let outcome = h.session.run(intake("Golang and Python")).await.unwrap();

    assert_eq!(outcome.current_tech, "go");
    assert!(!drain(&mut h.events)
        .iter()
        .any(|e| matches!(e, InterviewEvent::TechnologySwitched { .. })));
    let transcript = assert_done(&outcome, &h.transcript_path);
    assert_eq!(
        transcript.turns[1].agent_visible_message,
        "Right.\n\nAre Go maps ordered?"
    );
}

#[tokio::test]
async fn switch_outside_allowed_list_is_never_applied() {
    let gen = ScriptedGenerator::new()
        .on("Observer/Critic", r#"{"assessment": {"correctness": "medium"}}"#)
        .on("You are an Interviewer", r#"{"reaction": "Let's do Rust.", "next_tech": "rust"}"#)
        .on("DevDocs slug", r#"["go"]"#)
        .on("keyword topics", r#"["slices"]"#)
        .on("ONE specific question", r#"{"question": "What does append return?"}"#)
        .on("extract the expected answer", expected_reply(SLICE_FACT))
        .on(
            "Generate ONE question",
            format!(r#"{{"question": "Why store the result of append?", "expected_answer": "{SLICE_FACT}", "key_points": [], "topic": "slices"}}"#),
        );
    let source = Arc::new(InMemoryDocSource::new().with_page("go", "Slices", "ref/slices", page("slices")));
    let mut h = harness(
        gen,
        source,
        Arc::new(FixedRetriever::new(good_ctx())),
        &["switch to rust please", "stop"],
        |_| {},
    );

    let outcome = h.session.run(intake("go")).await.unwrap();
    assert_eq!(outcome.current_tech, "go");
    assert!(!drain(&mut h.events)
        .iter()
        .any(|e| matches!(e, InterviewEvent::TechnologySwitched { .. })));
}

// ---------------------------------------------------------------------------
// Scenario E: a stop command concludes immediately
// ---------------------------------------------------------------------------

/// Documentation source whose page reads stall for one technology.
struct StallingSource {
    inner: InMemoryDocSource,
    stalled_tech: &'static str,
}

#[async_trait]
impl DocSource for StallingSource {
    async fn search(&self, tech: &str, keyword: &str) -> Result<Vec<DocHit>> {
        self.inner.search(tech, keyword).await
    }

    async fn read(&self, doc_id: &str, path: &str) -> Result<String> {
        if doc_id == self.stalled_tech {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        self.inner.read(doc_id, path).await
    }
}

#[tokio::test]
async fn stop_first_turn_concludes_with_empty_evaluation() {
    let gen = ScriptedGenerator::new()
        .on("Hiring Manager", r#"{"decision": {"grade": "Junior", "hiring_recommendation": "No Hire", "confidence_score": 10}}"#)
        .on("DevDocs slug", r#"["go"]"#)
        .on("keyword topics", r#"["slices"]"#)
        .on("ONE specific question", r#"{"question": "What does append return?"}"#)
        .on("extract the expected answer", expected_reply(SLICE_FACT));
    let source = Arc::new(InMemoryDocSource::new().with_page("go", "Slices", "ref/slices", page("slices")));
    let mut h = harness(gen, source, Arc::new(FixedRetriever::new(good_ctx())), &["Стоп"], |_| {});

    let outcome = h.session.run(intake("go")).await.unwrap();
    assert_eq!(outcome.turns, 0);
    assert!(outcome.evaluation.turns.is_empty());
    assert!(outcome.evaluation.gaps.is_empty());
    assert_eq!(outcome.feedback.decision.confidence_score, 10);
    assert_eq!(h.session.state(), SessionState::Done);

    let transcript = assert_done(&outcome, &h.transcript_path);
    assert_eq!(transcript.turns.len(), 1);
    assert_eq!(transcript.turns[0].user_message, "Стоп");
    assert_eq!(
        transcript.turns[0].internal_thoughts,
        "[Observer]: stop requested. [Interviewer]: generate final feedback."
    );
    assert_eq!(transcript.final_feedback.unwrap().decision.confidence_score, 10);
}

#[tokio::test]
async fn stop_is_prompt_while_background_load_is_pending() {
    let gen = ScriptedGenerator::new()
        .on("Observer/Critic", r#"{"assessment": {"correctness": "high", "topic": "slices"}}"#)
        .on("You are an Interviewer", r#"{"reaction": "Good.", "next_tech": ""}"#)
        .on("DevDocs slug", r#"["go", "python"]"#)
        .on("keyword topics", r#"["slices"]"#)
        .on("ONE specific question", r#"{"question": "What does append return?"}"#)
        .on("extract the expected answer", expected_reply(SLICE_FACT))
        .on(
            "Generate ONE question",
            format!(r#"{{"question": "Why store the result of append?", "expected_answer": "{SLICE_FACT}", "key_points": [], "topic": "slices"}}"#),
        );
    let source = Arc::new(StallingSource {
        inner: InMemoryDocSource::new()
            .with_page("go", "Slices", "ref/slices", page("slices"))
            .with_page("python", "Slices", "library/slices", page("slices")),
        stalled_tech: "python",
    });
    let mut h = harness(
        gen,
        source,
        Arc::new(FixedRetriever::new(good_ctx())),
        &["It returns the updated slice", "exit"],
        |c| c.background_timeout_ms = 100,
    );

    let started = Instant::now();
    let outcome = tokio::time::timeout(Duration::from_secs(120), h.session.run(intake("go")))
        .await
        .expect("session finished")
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(20));
    assert_eq!(outcome.turns, 1);
    assert_eq!(outcome.evaluation.confirmed, vec!["go:slices"]);
    assert!(drain(&mut h.events).contains(&InterviewEvent::BackgroundLoadFinished {
        loaded: vec![],
        timed_out: true
    }));
    assert_done(&outcome, &h.transcript_path);
}
