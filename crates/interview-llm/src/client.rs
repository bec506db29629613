use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use interview_types::InterviewError;

use crate::{DynProvider, ProviderAdapter, Request, Response, TextGenerator};

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

pub trait Middleware: Send + Sync {
    fn before(&self, _request: &mut Request) {}
    fn after(&self, _request: &Request, _response: &mut Response) {}
}

// ---------------------------------------------------------------------------
// Built-in middleware: LoggingMiddleware
// ---------------------------------------------------------------------------

pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn before(&self, request: &mut Request) {
        let prompt_chars: usize = request.messages.iter().map(|m| m.content.len()).sum();
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            prompt_chars,
            "LLM request"
        );
    }

    fn after(&self, _request: &Request, response: &mut Response) {
        tracing::debug!(
            model = %response.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            response_chars = response.text.len(),
            finish = ?response.finish_reason,
            "LLM response"
        );
    }
}

// ---------------------------------------------------------------------------
// Built-in middleware: UsageTrackingMiddleware
// ---------------------------------------------------------------------------

/// Accumulates token usage across calls. Clones share the same counters.
#[derive(Clone)]
pub struct UsageTrackingMiddleware {
    total_input: Arc<AtomicU64>,
    total_output: Arc<AtomicU64>,
    calls: Arc<AtomicU64>,
}

impl UsageTrackingMiddleware {
    pub fn new() -> Self {
        Self {
            total_input: Arc::new(AtomicU64::new(0)),
            total_output: Arc::new(AtomicU64::new(0)),
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn total_input_tokens(&self) -> u64 {
        self.total_input.load(Ordering::Relaxed)
    }

    pub fn total_output_tokens(&self) -> u64 {
        self.total_output.load(Ordering::Relaxed)
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Default for UsageTrackingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for UsageTrackingMiddleware {
    fn after(&self, _request: &Request, response: &mut Response) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.total_input
            .fetch_add(response.usage.input_tokens, Ordering::Relaxed);
        self.total_output
            .fetch_add(response.usage.output_tokens, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// LlmClient
// ---------------------------------------------------------------------------

pub struct LlmClient {
    provider: Option<DynProvider>,
    middleware: Vec<Box<dyn Middleware>>,
    model: Option<String>,
    temperature: Option<f32>,
}

impl LlmClient {
    pub fn new() -> Self {
        Self {
            provider: None,
            middleware: Vec::new(),
            model: None,
            temperature: None,
        }
    }

    /// Set the provider every request is sent to.
    pub fn with_provider(mut self, provider: impl ProviderAdapter + 'static) -> Self {
        self.provider = Some(DynProvider::new(provider));
        self
    }

    pub fn with_middleware(mut self, m: impl Middleware + 'static) -> Self {
        self.middleware.push(Box::new(m));
        self
    }

    /// Model used by [`TextGenerator::generate`]; defaults to the provider's.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub async fn complete(&self, request: &Request) -> Result<Response, InterviewError> {
        let provider = self.provider()?;
        let mut req = request.clone();

        for m in &self.middleware {
            m.before(&mut req);
        }

        let mut resp = provider.complete(&req).await?;

        for m in &self.middleware {
            m.after(&req, &mut resp);
        }

        Ok(resp)
    }

    fn provider(&self) -> Result<&DynProvider, InterviewError> {
        self.provider
            .as_ref()
            .ok_or_else(|| InterviewError::Other("No LLM provider configured".to_string()))
    }

    /// Create from environment variables (`LLM_BASE_URL`, `LLM_API_KEY`,
    /// `LLM_MODEL`, `LLM_TEMPERATURE`).
    pub fn from_env() -> Result<Self, InterviewError> {
        let adapter = crate::OpenAiCompatAdapter::from_env()?;
        let temperature = std::env::var("LLM_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(0.4);
        Ok(Self::new()
            .with_middleware(LoggingMiddleware)
            .with_temperature(temperature)
            .with_provider(adapter))
    }
}

impl Default for LlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str) -> interview_types::Result<String> {
        let model = match &self.model {
            Some(model) => model.clone(),
            None => self.provider()?.default_model().to_string(),
        };
        let mut request = Request::prompt(model, prompt);
        request.temperature = self.temperature;
        let response = self.complete(&request).await?;
        Ok(response.text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
