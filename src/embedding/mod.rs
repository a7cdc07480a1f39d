//! 임베딩 모듈 - Gemini API를 통한 텍스트 벡터화
//!
//! 보고서 청크와 지표 검색 쿼리를 벡터로 변환합니다.
//! 청크는 `RETRIEVAL_DOCUMENT`, 쿼리는 `RETRIEVAL_QUERY` 태스크로 임베딩합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = GeminiEmbedding::new(api_key)?;
//! let vectors = embedder.embed_batch(&chunks).await?;
//! let query = embedder.embed_query("Scope 1 GHG emissions").await?;
//! ```

use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::{backoff_delay, Settings};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 문서 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 검색 쿼리 임베딩 (기본 구현: `embed`)
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Google Gemini Embedding
// ============================================================================

const GEMINI_MODEL: &str = "models/gemini-embedding-001";

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// 기본 임베딩 차원
pub const DEFAULT_DIMENSION: usize = 768;

/// 지원하는 임베딩 차원 (MRL)
pub const SUPPORTED_DIMENSIONS: [usize; 3] = [768, 1536, 3072];

/// batchEmbedContents 요청당 최대 텍스트 수
const MAX_BATCH_SIZE: usize = 100;

/// Rate Limiter 설정 (Gemini 무료 티어: 60 RPM)
const RATE_LIMIT_RPM: u32 = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
const MIN_DELAY_MS: u64 = 1000;
/// 기본 429 재시도 횟수
const DEFAULT_MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;

/// Gemini 임베딩 태스크 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

/// Google Gemini 임베딩 구현체
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    dimension: usize,
    max_retries: u32,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// 최소 간격 + 윈도우 기반 Rate Limiter
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay: Duration::from_millis(MIN_DELAY_MS),
            last_request: None,
        }
    }

    async fn acquire(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }

        let now = Instant::now();
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window.saturating_sub(now.duration_since(oldest));
                if !wait_time.is_zero() {
                    tracing::debug!("Embedding rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

impl GeminiEmbedding {
    /// 기본 차원(768)으로 생성
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_dimension(api_key, DEFAULT_DIMENSION)
    }

    /// 차원을 지정하여 생성 (768, 1536, 3072 중 선택)
    pub fn with_dimension(api_key: String, dimension: usize) -> Result<Self> {
        if !SUPPORTED_DIMENSIONS.contains(&dimension) {
            anyhow::bail!(
                "Invalid dimension: {}. Must be 768, 1536, or 3072",
                dimension
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            base_url: GEMINI_API_BASE.to_string(),
            dimension,
            max_retries: DEFAULT_MAX_RETRIES,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                RATE_LIMIT_RPM,
                RATE_LIMIT_WINDOW,
            ))),
        })
    }

    /// 설정에서 생성 (API 키가 없으면 에러)
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_gemini_key()?.to_string();
        let embedder = Self::with_dimension(api_key, settings.embedding_dimension)?
            .with_max_retries(settings.max_retries);
        tracing::info!(
            "Using Gemini API embedding (dimension: {})",
            embedder.dimension
        );
        Ok(embedder)
    }

    /// 429 재시도 횟수 지정
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// API 베이스 URL 변경 (프록시, 로컬 서버)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}:{}", self.base_url, GEMINI_MODEL, method)
    }

    fn request_for(&self, text: &str, task_type: TaskType) -> EmbedRequest {
        EmbedRequest {
            model: GEMINI_MODEL.to_string(),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type,
            output_dimensionality: Some(self.dimension),
        }
    }

    async fn embed_with_task(&self, text: &str, task_type: TaskType) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let body = self
            .post_with_retry(&self.endpoint("embedContent"), &self.request_for(text, task_type))
            .await?;
        let response: EmbedResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;

        Ok(response.embedding.values)
    }

    /// POST + rate limit + 429 지수 백오프
    async fn post_with_retry<T: Serialize + Sync>(&self, url: &str, request: &T) -> Result<String> {
        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=self.max_retries {
            {
                let mut limiter = self.rate_limiter.lock().await;
                limiter.acquire().await;
            }

            let backoff = backoff_delay(INITIAL_BACKOFF_MS, attempt);

            let response = match self
                .client
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    if attempt < self.max_retries {
                        tracing::warn!(
                            "Embedding request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            self.max_retries
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                return Ok(body);
            }

            if status.as_u16() == 429 {
                tracing::warn!(
                    "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                    backoff,
                    attempt + 1,
                    self.max_retries
                );
                last_error = Some(anyhow::anyhow!("Rate limit exceeded (429)"));

                if attempt < self.max_retries {
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                break;
            }

            if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                anyhow::bail!(
                    "Gemini API error ({}): {}",
                    error.error.status,
                    error.error.message
                );
            }
            anyhow::bail!("Gemini API error ({}): {}", status, body);
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow::anyhow!("Embedding failed after {} retries", self.max_retries)
        }))
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: TaskType,
    #[serde(rename = "outputDimensionality", skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_task(text, TaskType::RetrievalDocument).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_task(text, TaskType::RetrievalQuery).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = vec![vec![0.0; self.dimension]; texts.len()];

        // 빈 텍스트는 API 호출 없이 영벡터
        let pending: Vec<usize> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(i, _)| i)
            .collect();

        let total_batches = pending.len().div_ceil(MAX_BATCH_SIZE);
        for (batch_no, range) in batch_ranges(pending.len()).enumerate() {
            let batch = &pending[range];
            tracing::debug!(
                "Embedding batch {}/{} ({} texts)",
                batch_no + 1,
                total_batches,
                batch.len()
            );

            let request = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|&i| self.request_for(&texts[i], TaskType::RetrievalDocument))
                    .collect(),
            };

            let body = self
                .post_with_retry(&self.endpoint("batchEmbedContents"), &request)
                .await?;
            let response: BatchEmbedResponse =
                serde_json::from_str(&body).context("Failed to parse batch embedding response")?;

            if response.embeddings.len() != batch.len() {
                anyhow::bail!(
                    "Batch embedding returned {} vectors for {} texts",
                    response.embeddings.len(),
                    batch.len()
                );
            }

            for (&i, values) in batch.iter().zip(response.embeddings) {
                results[i] = values.values;
            }
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "gemini-embedding-001"
    }
}

/// `len`개 텍스트를 요청당 최대 `MAX_BATCH_SIZE`개 구간으로 분할
fn batch_ranges(len: usize) -> impl Iterator<Item = Range<usize>> {
    (0..len)
        .step_by(MAX_BATCH_SIZE)
        .map(move |start| start..(start + MAX_BATCH_SIZE).min(len))
}

// ============================================================================
// API Key Management
// ============================================================================

/// 키 조회 함수에서 Gemini API 키 찾기
///
/// 우선순위:
/// 1. `GEMINI_API_KEY`
/// 2. `GOOGLE_AI_API_KEY`
pub fn api_key_from_env<F>(get: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"]
        .into_iter()
        .find_map(|name| get(name).filter(|key| !key.trim().is_empty()))
}

// ============================================================================
// Test Support
// ============================================================================


// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::StubServer;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_invalid_dimension() {
        let result = GeminiEmbedding::with_dimension("fake_key".to_string(), 999);
        assert!(result
            .err()
            .map(|e| e.to_string().contains("Invalid dimension"))
            .unwrap_or(false));
    }

    #[test]
    fn test_valid_dimensions() {
        for dim in SUPPORTED_DIMENSIONS {
            let result = GeminiEmbedding::with_dimension("fake_key".to_string(), dim);
            assert!(result.is_ok());
        }
    }

    #[test]
    fn test_api_key_priority() {
        let get = lookup(&[("GEMINI_API_KEY", "g"), ("GOOGLE_AI_API_KEY", "a")]);
        assert_eq!(api_key_from_env(&get).as_deref(), Some("g"));

        let get = lookup(&[("GEMINI_API_KEY", "  "), ("GOOGLE_AI_API_KEY", "a")]);
        assert_eq!(api_key_from_env(&get).as_deref(), Some("a"));

        let get = lookup(&[]);
        assert_eq!(api_key_from_env(&get), None);
    }

    #[test]
    fn test_endpoints() {
        let embedder = GeminiEmbedding::new("fake_key".to_string()).unwrap();
        assert_eq!(
            embedder.endpoint("batchEmbedContents"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:batchEmbedContents"
        );

        let embedder = embedder.with_base_url("http://127.0.0.1:9/v1beta/");
        assert_eq!(
            embedder.endpoint("embedContent"),
            "http://127.0.0.1:9/v1beta/models/gemini-embedding-001:embedContent"
        );
    }

    #[test]
    fn test_batch_ranges() {
        assert_eq!(batch_ranges(0).count(), 0);
        assert_eq!(batch_ranges(100).collect::<Vec<_>>(), vec![0..100]);
        assert_eq!(batch_ranges(101).collect::<Vec<_>>(), vec![0..100, 100..101]);
        assert_eq!(
            batch_ranges(250).collect::<Vec<_>>(),
            vec![0..100, 100..200, 200..250]
        );
    }

    fn local_embedder(server: &StubServer, max_retries: u32) -> GeminiEmbedding {
        let mut embedder = GeminiEmbedding::with_dimension("fake_key".to_string(), 768)
            .unwrap()
            .with_base_url(&server.base_url)
            .with_max_retries(max_retries);
        embedder.client = reqwest::Client::builder().no_proxy().build().unwrap();
        embedder
    }

    fn batch_body(values: impl Iterator<Item = f32>) -> String {
        let embeddings: Vec<serde_json::Value> = values
            .map(|v| serde_json::json!({ "values": [v] }))
            .collect();
        serde_json::json!({ "embeddings": embeddings }).to_string()
    }

    #[tokio::test]
    async fn test_batches_split_and_keep_order() {
        // 150개 중 10번째마다 빈 텍스트 → 실제 요청 135개 = 100 + 35
        let texts: Vec<String> = (0..150)
            .map(|i| if i % 10 == 0 { String::new() } else { format!("chunk {}", i) })
            .collect();
        let sent: Vec<usize> = (0..150).filter(|i| i % 10 != 0).collect();

        let server = StubServer::start(vec![
            (200, batch_body(sent[..100].iter().map(|&i| i as f32))),
            (200, batch_body(sent[100..].iter().map(|&i| i as f32))),
        ])
        .await;
        let embedder = local_embedder(&server, 0);

        let vectors = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors.len(), 150);
        for (i, vector) in vectors.iter().enumerate() {
            if i % 10 == 0 {
                assert_eq!(vector.len(), 768);
                assert!(vector.iter().all(|v| *v == 0.0));
            } else {
                assert_eq!(vector, &vec![i as f32]);
            }
        }

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("POST /models/gemini-embedding-001:batchEmbedContents"));
        assert_eq!(requests[0].matches("RETRIEVAL_DOCUMENT").count(), 100);
        assert_eq!(requests[1].matches("RETRIEVAL_DOCUMENT").count(), 35);
        assert!(requests[1].contains("\"chunk 149\""));
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried() {
        let server = StubServer::start(vec![
            (429, r#"{"error":{"message":"quota","status":"RESOURCE_EXHAUSTED"}}"#.to_string()),
            (200, r#"{"embedding":{"values":[0.5,0.25]}}"#.to_string()),
        ])
        .await;
        let embedder = local_embedder(&server, 1);

        let vector = embedder.embed_query("Scope 1 emissions").await.unwrap();
        assert_eq!(vector, vec![0.5, 0.25]);
        assert_eq!(server.requests().len(), 2);
        assert!(server.requests()[1].contains("RETRIEVAL_QUERY"));
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_max_retries() {
        let server = StubServer::start(vec![(429, "{}".to_string())]).await;
        let embedder = local_embedder(&server, 0);

        let err = embedder.embed("Scope 1 emissions").await.unwrap_err();
        assert!(err.to_string().contains("429"));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_other_api_errors_are_not_retried() {
        let server = StubServer::start(vec![(
            400,
            r#"{"error":{"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#.to_string(),
        )])
        .await;
        let embedder = local_embedder(&server, 3);

        let err = embedder.embed("text").await.unwrap_err();
        assert!(err.to_string().contains("INVALID_ARGUMENT"));
        assert_eq!(server.requests().len(), 1);
    }

    #[test]
    fn test_request_serialization() {
        let embedder = GeminiEmbedding::new("fake_key".to_string()).unwrap();
        let json = serde_json::to_value(embedder.request_for("hello", TaskType::RetrievalQuery))
            .unwrap();

        assert_eq!(json["model"], "models/gemini-embedding-001");
        assert_eq!(json["taskType"], "RETRIEVAL_QUERY");
        assert_eq!(json["outputDimensionality"], 768);
        assert_eq!(json["content"]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_batch_response_parsing() {
        let body = r#"{"embeddings":[{"values":[0.1,0.2]},{"values":[0.3,0.4]}]}"#;
        let parsed: BatchEmbedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.embeddings.len(), 2);
        assert_eq!(parsed.embeddings[1].values, vec![0.3, 0.4]);
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = GeminiEmbedding::new("fake_key".to_string()).unwrap();

        let vector = embedder.embed("   ").await.unwrap();
        assert_eq!(vector.len(), 768);
        assert!(vector.iter().all(|v| *v == 0.0));

        let batch = embedder
            .embed_batch(&["".to_string(), "\n".to_string()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|v| v.len() == 768));
    }
}
