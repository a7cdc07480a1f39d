//! LLM 모듈 - OpenRouter(OpenAI 호환) 채팅 완성 클라이언트
//!
//! 무료 모델은 자주 실패하므로 기본 모델 → 백업 모델 순으로 시도합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let client = OpenRouterClient::from_settings(&settings)?;
//! let completion = client
//!     .try_multiple_models(&CompletionRequest::new(prompt).max_tokens(500))
//!     .await?;
//! println!("{} answered: {}", completion.model, completion.content);
//! ```

pub mod error;
mod openrouter;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;

pub use error::{LlmError, Result};
pub use openrouter::OpenRouterClient;
pub use types::{Completion, CompletionRequest, Message};

/// 모델 전환 사이 기본 대기 시간
pub const DEFAULT_FALLBACK_DELAY: Duration = Duration::from_secs(2);

// ============================================================================
// LlmClient Trait
// ============================================================================

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 단일 모델 호출 (`request.model`이 없으면 기본 모델)
    async fn generate(&self, request: &CompletionRequest) -> Result<String>;

    /// 시도할 모델 목록 (기본 모델이 첫 번째)
    fn candidate_models(&self) -> Vec<String>;

    fn fallback_delay(&self) -> Duration {
        DEFAULT_FALLBACK_DELAY
    }

    /// 성공할 때까지 모델을 차례로 시도
    async fn try_multiple_models(&self, request: &CompletionRequest) -> Result<Completion> {
        let models = self.candidate_models();
        let mut last_error: Option<LlmError> = None;

        for (i, model) in models.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.fallback_delay()).await;
            }

            tracing::info!("Trying model {}/{}: {}", i + 1, models.len(), model);
            let attempt = request.clone().model(model.as_str());

            match self.generate(&attempt).await {
                Ok(content) => {
                    tracing::info!("Successfully used model: {}", model);
                    return Ok(Completion {
                        content,
                        model: model.clone(),
                    });
                }
                Err(e) => {
                    tracing::warn!("Model {} failed: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(LlmError::AllModelsFailed {
            count: models.len(),
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no models configured".to_string()),
        })
    }

    /// JSON 모드 호출 후 파싱
    async fn generate_json(&self, request: &CompletionRequest) -> Result<serde_json::Value> {
        let request = request.clone().json_mode(true);
        let content = self.generate(&request).await?;

        serde_json::from_str(strip_code_fence(&content)).map_err(|e| {
            tracing::warn!("Failed to parse JSON response: {}", e);
            LlmError::Parse(format!("Failed to parse JSON response: {}", e))
        })
    }
}

/// ```json ... ``` 로 감싼 응답에서 본문만 꺼냄
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = rest.strip_suffix("```").unwrap_or(rest);
    // 언어 태그 줄 제거
    match body.split_once('\n') {
        Some((tag, inner)) if !tag.trim().starts_with('{') && !tag.trim().starts_with('[') => {
            inner.trim()
        }
        _ => body.trim(),
    }
}

// ============================================================================
// Test Support
// ============================================================================


// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::mock::ScriptedLlm;
    use super::*;

    #[tokio::test]
    async fn test_try_multiple_models_falls_back() {
        let llm = ScriptedLlm::new(
            &["primary", "backup-1", "backup-2"],
            vec![
                Err(LlmError::Api("overloaded".to_string())),
                Ok("VALUE: 42".to_string()),
            ],
        );

        let completion = llm
            .try_multiple_models(&CompletionRequest::new("prompt"))
            .await
            .unwrap();
        assert_eq!(completion.model, "backup-1");
        assert_eq!(completion.content, "VALUE: 42");

        let models: Vec<_> = llm.recorded().into_iter().filter_map(|r| r.model).collect();
        assert_eq!(models, vec!["primary", "backup-1"]);
    }

    #[tokio::test]
    async fn test_try_multiple_models_all_fail() {
        let llm = ScriptedLlm::new(
            &["a", "b"],
            vec![
                Err(LlmError::Network("timeout".to_string())),
                Err(LlmError::EmptyResponse("API returned None content".to_string())),
            ],
        );

        let err = llm
            .try_multiple_models(&CompletionRequest::new("prompt"))
            .await
            .unwrap_err();
        match err {
            LlmError::AllModelsFailed { count, last } => {
                assert_eq!(count, 2);
                assert!(last.contains("None content"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_generate_json_sets_json_mode() {
        let llm = ScriptedLlm::replying(&["```json\n{\"found\": true, \"confidence\": 0.9}\n```"]);

        let value = llm
            .generate_json(&CompletionRequest::new("prompt"))
            .await
            .unwrap();
        assert_eq!(value["found"], true);
        assert!(llm.recorded()[0].json_mode);
    }

    #[tokio::test]
    async fn test_generate_json_parse_error() {
        let llm = ScriptedLlm::replying(&["definitely not json"]);
        let err = llm
            .generate_json(&CompletionRequest::new("prompt"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
    }
}
