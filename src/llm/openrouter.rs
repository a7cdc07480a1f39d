//! OpenRouter 클라이언트
//!
//! source: https://openrouter.ai/docs/api-reference/chat-completion

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::config::{backoff_delay, Settings};

use super::error::{LlmError, Result};
use super::types::{ChatRequest, ChatResponseRaw, CompletionRequest, ResponseFormat};
use super::LlmClient;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const INITIAL_BACKOFF_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    default_model: String,
    backup_models: Vec<String>,
    max_retries: u32,
}

impl OpenRouterClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::Config("OPENROUTER_API_KEY is empty".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: default_model.into(),
            backup_models: Vec::new(),
            max_retries: 3,
        })
    }

    /// 설정의 키, URL, 모델 목록, 재시도 횟수 사용
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings
            .openrouter_api_key
            .as_deref()
            .ok_or_else(|| LlmError::Config("OPENROUTER_API_KEY not set".to_string()))?;

        Ok(Self::new(
            api_key,
            settings.openrouter_base_url.as_str(),
            settings.default_model.as_str(),
        )?
        .with_backup_models(settings.backup_models.clone())
        .with_max_retries(settings.max_retries))
    }

    pub fn with_backup_models(mut self, models: Vec<String>) -> Self {
        self.backup_models = models;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn generate(&self, request: &CompletionRequest) -> Result<String> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let body = ChatRequest {
            model,
            messages: request.messages(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: ResponseFormat::for_json_mode(request.json_mode),
        };

        let start = Instant::now();
        tracing::info!("Generating completion with model: {}", model);

        let mut attempt = 0;
        let text = loop {
            let response = self
                .http_client
                .post(format!("{}/chat/completions", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .header("X-Title", "esg-extract")
                .json(&body)
                .send()
                .await
                .map_err(|e| LlmError::Network(e.to_string()))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| LlmError::Network(format!("Failed to read response body: {}", e)))?;

            if status.as_u16() == 429 && attempt < self.max_retries {
                let backoff = backoff_delay(INITIAL_BACKOFF_MS, attempt);
                tracing::warn!(
                    "Rate limit hit (429) on {}, backing off {:?} (attempt {}/{})",
                    model,
                    backoff,
                    attempt + 1,
                    self.max_retries
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            if !status.is_success() {
                return Err(LlmError::Api(format!("{}: {}", status, text)));
            }

            break text;
        };

        let content = parse_chat_response(&text)?;
        tracing::debug!(
            "Generated {} characters with {} in {} ms",
            content.len(),
            model,
            start.elapsed().as_millis()
        );
        Ok(content)
    }

    fn candidate_models(&self) -> Vec<String> {
        let mut models = vec![self.default_model.clone()];
        for model in &self.backup_models {
            if !models.contains(model) {
                models.push(model.clone());
            }
        }
        models
    }
}

/// 2xx 응답 본문에서 첫 번째 choice의 content 추출
fn parse_chat_response(body: &str) -> Result<String> {
    let raw: ChatResponseRaw = serde_json::from_str(body)
        .map_err(|e| LlmError::Parse(format!("Invalid chat response: {}", e)))?;

    if let Some(error) = raw.error {
        return Err(LlmError::Api(error.describe()));
    }

    let choice = raw
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::EmptyResponse("API returned empty choices".to_string()))?;

    choice
        .message
        .content
        .ok_or_else(|| LlmError::EmptyResponse("API returned None content".to_string()))
}

// ============================================================================
// Tests
// ============================================================================
