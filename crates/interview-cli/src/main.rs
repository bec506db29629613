//! CLI binary for running a grounded technical interview in the terminal.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clap::Parser;
use interview_engine::{
    CandidateIntake, Collaborators, Console, ConsoleInput, EngineConfig, InterviewSession,
};
use interview_llm::{
    LlmClient, LoggingMiddleware, OpenAiCompatAdapter, ProviderAdapter, UsageTrackingMiddleware,
};
use interview_rag::DevDocsClient;

#[derive(Parser)]
#[command(name = "coach", version, about = "Documentation-grounded technical interview coach")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// JSON file with engine settings (missing fields keep their defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// OpenAI-compatible server root (overrides LLM_BASE_URL)
    #[arg(long)]
    llm_base_url: Option<String>,

    /// Model name (overrides LLM_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Sampling temperature (overrides LLM_TEMPERATURE)
    #[arg(long)]
    temperature: Option<f32>,

    /// DevDocs server root (overrides DEVDOCS_URL)
    #[arg(long)]
    devdocs_url: Option<String>,

    /// Where to write the interview transcript
    #[arg(short, long)]
    transcript: Option<PathBuf>,

    /// Log the retrieval context used for every generated question
    #[arg(long)]
    debug_rag: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_file.as_deref())?;

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(path) = &cli.transcript {
        config.transcript_path = path.clone();
    }
    config.debug_rag |= cli.debug_rag;

    let usage = UsageTrackingMiddleware::new();
    let generator = build_llm_client(&cli, usage.clone())?;
    let source = match &cli.devdocs_url {
        Some(url) => DevDocsClient::new(url.as_str()),
        None => DevDocsClient::from_env(),
    };
    tracing::info!(devdocs = %source.base_url(), "Documentation source configured");

    let console = Console::stdout();
    let intake = read_intake(&console).await?;

    let store = Arc::new(config.document_store());
    let collaborators = Collaborators::new(Arc::new(generator), Arc::new(source), store);
    let mut session = InterviewSession::new(
        config,
        collaborators,
        console.clone(),
        Arc::new(ConsoleInput::new(console.clone())),
    );

    let outcome = session.run(intake).await?;

    console.write(format!(
        "\nTranscript saved to {}",
        outcome.transcript_path.display()
    ));
    tracing::info!(
        turns = outcome.turns,
        llm_calls = usage.calls(),
        input_tokens = usage.total_input_tokens(),
        output_tokens = usage.total_output_tokens(),
        "Interview finished"
    );
    Ok(())
}

fn init_tracing(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(if verbose { "debug" } else { "info" }));

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::File::create(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn build_llm_client(cli: &Cli, usage: UsageTrackingMiddleware) -> anyhow::Result<LlmClient> {
    let mut adapter = OpenAiCompatAdapter::from_env()?;
    if let Some(url) = &cli.llm_base_url {
        adapter = adapter.with_base_url(url.clone());
    }
    if let Some(model) = &cli.model {
        adapter = adapter.with_model(model.clone());
    }
    tracing::info!(provider = adapter.name(), llm = %adapter.base_url(), "LLM server configured");

    let temperature = cli
        .temperature
        .or_else(|| {
            std::env::var("LLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
        })
        .unwrap_or(0.4);

    Ok(LlmClient::new()
        .with_middleware(LoggingMiddleware)
        .with_middleware(usage)
        .with_temperature(temperature)
        .with_provider(adapter))
}

async fn read_intake(console: &Console) -> anyhow::Result<CandidateIntake> {
    console.write("Interview Coach. Type 'stop' at any time to finish.\n");
    Ok(CandidateIntake {
        name: ask(console, "Your name [Alex]: ").await?,
        position: ask(console, "Position [Backend Developer]: ").await?,
        grade: ask(console, "Grade (Junior/Middle/Senior) [Junior]: ").await?,
        stack: ask(console, "Describe your stack: ").await?,
    })
}

/// Empty replies are kept empty; the session fills in its defaults.
async fn ask(console: &Console, prompt: &str) -> anyhow::Result<String> {
    Ok(console.read_line(prompt).await?.trim().to_string())
}
