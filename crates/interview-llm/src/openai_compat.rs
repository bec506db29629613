use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::{FinishReason, ProviderAdapter, Request, Response, Usage};
use interview_types::InterviewError;

const PROVIDER: &str = "openai-compat";

// ---------------------------------------------------------------------------
// OpenAiCompatAdapter
// ---------------------------------------------------------------------------

/// Adapter for servers speaking the OpenAI chat completions protocol
/// (LM Studio, vLLM, llama.cpp server, OpenAI itself).
#[derive(Debug)]
pub struct OpenAiCompatAdapter {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    default_model: String,
    timeout: Duration,
}

impl OpenAiCompatAdapter {
    pub fn new(api_key: String) -> Self {
        let timeout = Duration::from_secs(120);
        Self {
            api_key,
            client: build_client(timeout),
            base_url: "http://localhost:1234".to_string(),
            default_model: "meta-llama-3.1-8b-instruct".to_string(),
            timeout,
        }
    }

    pub fn from_env() -> Result<Self, InterviewError> {
        let key = std::env::var("LLM_API_KEY").unwrap_or_else(|_| "lm-studio".to_string());
        let mut adapter = Self::new(key);
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            adapter = adapter.with_base_url(url);
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            adapter = adapter.with_model(model);
        }
        Ok(adapter)
    }

    /// Accepts the server root with or without a trailing `/v1`.
    pub fn with_base_url(mut self, url: String) -> Self {
        let trimmed = url.trim_end_matches('/');
        self.base_url = trimmed
            .strip_suffix("/v1")
            .unwrap_or(trimmed)
            .to_string();
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.default_model = model;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.client = build_client(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request_body(&self, request: &Request) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.as_str(),
                    "content": msg.content,
                })
            })
            .collect();

        let model = if request.model.is_empty() {
            self.default_model.as_str()
        } else {
            request.model.as_str()
        };

        let mut body = json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }
        if !request.stop_sequences.is_empty() {
            body["stop"] = json!(request.stop_sequences);
        }

        body
    }

    fn parse_response(&self, body: serde_json::Value) -> Result<Response, InterviewError> {
        let id = body["id"].as_str().unwrap_or("").to_string();
        let model = body["model"].as_str().unwrap_or("").to_string();

        let choice = &body["choices"][0];
        if choice.is_null() {
            return Err(InterviewError::ProviderError {
                provider: PROVIDER.into(),
                status: 200,
                message: "response carries no choices".into(),
            });
        }

        let text = choice["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let finish_reason = match choice["finish_reason"].as_str() {
            Some("length") => FinishReason::MaxTokens,
            _ => FinishReason::EndTurn,
        };

        let usage_obj = &body["usage"];
        let input_tokens = usage_obj["prompt_tokens"].as_u64().unwrap_or(0);
        let output_tokens = usage_obj["completion_tokens"].as_u64().unwrap_or(0);
        let total_tokens = usage_obj["total_tokens"]
            .as_u64()
            .unwrap_or(input_tokens + output_tokens);

        Ok(Response {
            id,
            text,
            usage: Usage {
                input_tokens,
                output_tokens,
                total_tokens,
            },
            model,
            finish_reason,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> InterviewError {
        if e.is_timeout() {
            InterviewError::RequestTimeout {
                provider: PROVIDER.into(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            InterviewError::ProviderError {
                provider: PROVIDER.into(),
                status: 0,
                message: e.to_string(),
            }
        }
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn map_error(status: reqwest::StatusCode, body: &str) -> InterviewError {
    match status.as_u16() {
        401 | 403 => InterviewError::AuthError {
            provider: PROVIDER.into(),
        },
        code => InterviewError::ProviderError {
            provider: PROVIDER.into(),
            status: code,
            message: extract_error_message(body),
        },
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v["error"]["message"]
                .as_str()
                .or_else(|| v["error"].as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

// ---------------------------------------------------------------------------
// ProviderAdapter implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ProviderAdapter for OpenAiCompatAdapter {
    async fn complete(&self, request: &Request) -> Result<Response, InterviewError> {
        let body = self.build_request_body(request);

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let response_body = resp.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(map_error(status, &response_body));
        }

        let json: serde_json::Value =
            serde_json::from_str(&response_body).map_err(|e| InterviewError::ProviderError {
                provider: PROVIDER.into(),
                status: status.as_u16(),
                message: format!("Failed to parse response JSON: {e}"),
            })?;

        self.parse_response(json)
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
