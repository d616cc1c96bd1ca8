//! LLM provider interface (§6): an `async_trait` in the teacher's
//! service-trait idiom (`JobHandler`, `DocumentStore`), with an
//! OpenAI-compatible HTTP implementation and a deterministic mock for tests.

use std::time::Duration;

use async_trait::async_trait;
use newsroom_core::error::{NewsroomError, Result};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct SummarizeRequest {
    pub story_id: String,
    pub prompt: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SummarizeResponse {
    pub text: String,
    pub token_count: u32,
    pub cost_estimate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct BatchPollResult {
    pub status: BatchStatus,
    pub results: Option<Vec<SummarizeResponse>>,
    pub cost_estimate: f64,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn summarize(&self, request: SummarizeRequest) -> Result<SummarizeResponse>;

    async fn batch_submit(&self, prompts: Vec<String>, model: &str) -> Result<String>;

    async fn batch_poll(&self, batch_id: &str) -> Result<BatchPollResult>;
}

const DOLLARS_PER_1K_TOKENS: f64 = 0.002;

/// Calls an OpenAI-compatible `/chat/completions` endpoint.
pub struct HttpLlmProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl HttpLlmProvider {
    pub fn new(api_base: String, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("failed to build LLM HTTP client");
        Self { client, api_base, api_key }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    async fn summarize(&self, request: SummarizeRequest) -> Result<SummarizeResponse> {
        let body = json!({
            "model": request.model,
            "messages": [{"role": "user", "content": request.prompt}],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| NewsroomError::TransientNetwork(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            return Err(NewsroomError::ContentPolicyRefusal { story_id: request.story_id });
        }

        if !response.status().is_success() {
            return Err(NewsroomError::TransientNetwork(format!(
                "LLM provider returned {}",
                response.status()
            )));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| NewsroomError::Parse {
            context: "llm chat completion response".to_string(),
            message: e.to_string(),
        })?;

        let text = parsed.choices.into_iter().next().map(|c| c.message.content).ok_or_else(|| {
            NewsroomError::Parse {
                context: "llm chat completion response".to_string(),
                message: "empty completion choices".to_string(),
            }
        })?;

        let token_count = parsed.usage.map(|u| u.total_tokens).unwrap_or(0);
        let cost_estimate = token_count as f64 / 1000.0 * DOLLARS_PER_1K_TOKENS;

        Ok(SummarizeResponse { text, token_count, cost_estimate })
    }

    async fn batch_submit(&self, _prompts: Vec<String>, _model: &str) -> Result<String> {
        Err(anyhow::anyhow!("batch submission is not wired to a live endpoint").into())
    }

    async fn batch_poll(&self, _batch_id: &str) -> Result<BatchPollResult> {
        Err(anyhow::anyhow!("batch polling is not wired to a live endpoint").into())
    }
}

/// Deterministic canned-summary provider for tests, the `wiremock`-adjacent
/// role the teacher fills with hand-rolled fakes for external services.
pub struct MockLlmProvider {
    pub canned_text: String,
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self { canned_text: "This is a generated summary of the story.".to_string() }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn summarize(&self, request: SummarizeRequest) -> Result<SummarizeResponse> {
        let token_count = (request.prompt.split_whitespace().count() as u32) + 20;
        Ok(SummarizeResponse {
            text: self.canned_text.clone(),
            token_count,
            cost_estimate: token_count as f64 / 1000.0 * DOLLARS_PER_1K_TOKENS,
        })
    }

    async fn batch_submit(&self, prompts: Vec<String>, _model: &str) -> Result<String> {
        Ok(format!("mock-batch-{}", prompts.len()))
    }

    async fn batch_poll(&self, batch_id: &str) -> Result<BatchPollResult> {
        let status = if batch_id.is_empty() { BatchStatus::Failed } else { BatchStatus::Completed };
        Ok(BatchPollResult {
            status,
            results: Some(vec![SummarizeResponse {
                text: self.canned_text.clone(),
                token_count: 20,
                cost_estimate: 0.0,
            }]),
            cost_estimate: 0.0,
        })
    }
}
