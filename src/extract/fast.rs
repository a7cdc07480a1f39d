//! Fast 모드 - 벡터 검색 + 지표당 LLM 1회 호출
//!
//! 1. 문서 인덱싱 (600자 청크, 100자 오버랩, 캐시)
//! 2. 지표별 상위 3개 청크 검색
//! 3. `VALUE:/PAGE:/CONFIDENCE:/REASONING:` 형식으로 응답 요청

use std::sync::Arc;

use anyhow::Result;

use crate::document::{extract_numeric_value, PdfDocument};
use crate::indicators::{ExtractedValue, ExtractionMethod, Indicator};
use crate::knowledge::{ChunkConfig, IndexStats, VectorSearchEngine};
use crate::llm::{CompletionRequest, LlmClient};

use super::confidence::{clamp_confidence, parse_confidence};

/// 지표당 검색할 청크 수
pub const DEFAULT_TOP_K: usize = 3;

const FAST_TEMPERATURE: f32 = 0.1;
const FAST_MAX_TOKENS: u32 = 500;

/// 검색 결과가 비었을 때의 설명
const NO_CONTEXT_EXPLANATION: &str = "No indexed content";

pub struct FastVectorExtractor {
    llm: Arc<dyn LlmClient>,
    engine: VectorSearchEngine,
}

impl FastVectorExtractor {
    pub fn new(llm: Arc<dyn LlmClient>, engine: VectorSearchEngine) -> Self {
        Self { llm, engine }
    }

    /// 문서 인덱싱 (캐시 사용)
    ///
    /// 엔진이 이미 같은 문서를 들고 있으면 `force_reindex`가 아닌 한 다시 임베딩하지 않습니다.
    pub async fn index(&mut self, document: &PdfDocument, force_reindex: bool) -> Result<IndexStats> {
        let key = document.key();
        if !force_reindex {
            if let Some(stats) = self.engine.stats().filter(|s| s.pdf_key == key) {
                tracing::debug!("{} already indexed ({} chunks)", key, stats.chunk_count);
                return Ok(stats.clone());
            }
        }

        let stats = self
            .engine
            .index_document(
                &key,
                document.pages(),
                &ChunkConfig::for_vector_index(),
                force_reindex,
            )
            .await?;

        tracing::info!(
            "Indexed {} ({} chunks, cache: {})",
            stats.pdf_key,
            stats.chunk_count,
            stats.from_cache
        );
        Ok(stats)
    }

    /// 지표 하나 추출
    ///
    /// 검색이나 LLM 호출이 실패해도 에러 대신 `vector_search_failed` 결과를 돌려줍니다.
    pub async fn extract_indicator(&self, indicator: &Indicator, top_k: usize) -> ExtractedValue {
        tracing::info!("Fast extracting: {}", indicator.code);

        let context = match self.engine.search_for_indicator(indicator, top_k).await {
            Ok(context) => context,
            Err(e) => {
                tracing::error!("Context search failed for {}: {:#}", indicator.code, e);
                return failed_value(indicator, format!("{:#}", e));
            }
        };

        if context.trim().is_empty() {
            tracing::warn!("No indexed content for {}", indicator.code);
            let mut value = base_value(indicator, ExtractionMethod::VectorSearch);
            value.explanation = Some(NO_CONTEXT_EXPLANATION.to_string());
            return value;
        }

        let request = CompletionRequest::new(build_prompt(indicator, &context))
            .temperature(FAST_TEMPERATURE)
            .max_tokens(FAST_MAX_TOKENS);

        match self.llm.try_multiple_models(&request).await {
            Ok(completion) => {
                let mut value = parse_response(&completion.content, indicator);
                value.source_text = Some(context);
                tracing::info!(
                    "Extracted {}: {} (confidence: {:.2}, model: {})",
                    indicator.code,
                    value.value.as_deref().unwrap_or("Not found"),
                    value.confidence,
                    completion.model
                );
                value
            }
            Err(e) => {
                tracing::error!("Fast extraction failed for {}: {}", indicator.code, e);
                failed_value(indicator, e.to_string())
            }
        }
    }

    /// 문서 인덱싱 후 지표를 순서대로 추출 (`force_reindex`면 캐시 무시)
    pub async fn extract_batch(
        &mut self,
        indicators: &[&Indicator],
        document: &PdfDocument,
        force_reindex: bool,
    ) -> Result<Vec<ExtractedValue>> {
        tracing::info!(
            "Starting fast batch extraction for {} indicators",
            indicators.len()
        );

        tracing::info!("Step 1/2: Indexing document...");
        self.index(document, force_reindex).await?;

        tracing::info!("Step 2/2: Extracting indicators...");
        let mut results = Vec::with_capacity(indicators.len());
        for (i, indicator) in indicators.iter().enumerate() {
            tracing::info!("Extracting {}/{}: {}", i + 1, indicators.len(), indicator.code);
            results.push(self.extract_indicator(indicator, DEFAULT_TOP_K).await);
        }

        tracing::info!("Batch extraction complete: {} indicators", results.len());
        Ok(results)
    }
}

// ============================================================================
// Prompt & Parsing
// ============================================================================

/// 추출 프롬프트
pub fn build_prompt(indicator: &Indicator, context: &str) -> String {
    format!(
        r#"Extract the ESG indicator from the provided document context.

**Indicator:** {code} - {name}
**Description:** {description}
**Expected Unit:** {unit}

**Document Context:**
{context}

**Instructions:**
1. Find the exact value for this indicator in the context
2. Extract the numeric value with its unit
3. Identify the page number where you found it
4. Provide confidence score (0.0 to 1.0)

Respond in this exact format:
VALUE: [extracted value with unit, or "Not found"]
PAGE: [page number, or "N/A"]
CONFIDENCE: [0.0 to 1.0]
REASONING: [brief explanation of what you found]"#,
        code = indicator.code,
        name = indicator.name,
        description = indicator.description,
        unit = indicator.expected_unit,
        context = context,
    )
}

/// 줄 단위 응답 파싱
///
/// - `VALUE:` not found / n/a / none → 값 없음
/// - `PAGE:` 정수가 아니면 없음
/// - `CONFIDENCE:` 파싱 실패 0.5, 누락 0.0
pub fn parse_response(response: &str, indicator: &Indicator) -> ExtractedValue {
    let mut result = base_value(indicator, ExtractionMethod::VectorSearch);

    for line in response.trim().lines() {
        let line = line.trim().trim_start_matches(['*', '-', ' ']);

        if let Some(raw) = field(line, "VALUE:") {
            let raw = strip_brackets(raw);
            if !is_missing(raw) && !raw.is_empty() {
                result.value = Some(raw.to_string());
            }
        } else if let Some(raw) = field(line, "PAGE:") {
            result.source_page = parse_page(strip_brackets(raw));
        } else if let Some(raw) = field(line, "CONFIDENCE:") {
            result.confidence = parse_confidence(raw);
        } else if let Some(raw) = field(line, "REASONING:") {
            let raw = raw.trim();
            if !raw.is_empty() {
                result.explanation = Some(raw.to_string());
            }
        }
    }

    result.confidence = clamp_confidence(result.confidence);
    result.numeric_value = result.value.as_deref().and_then(extract_numeric_value);
    result
}

fn field<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    line.strip_prefix(label)
        .map(|rest| rest.trim_start_matches('*').trim())
}

fn strip_brackets(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim()
        .trim_matches('"')
}

fn is_missing(raw: &str) -> bool {
    matches!(raw.to_lowercase().as_str(), "not found" | "n/a" | "none")
}

fn parse_page(raw: &str) -> Option<u32> {
    if is_missing(raw) {
        return None;
    }
    // "page 7", "p. 12" 등은 첫 번째 숫자
    raw.trim_start_matches(|c: char| !c.is_ascii_digit())
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|digits| digits.parse().ok())
}

fn base_value(indicator: &Indicator, method: ExtractionMethod) -> ExtractedValue {
    let mut value = ExtractedValue::empty(indicator.code);
    value.unit = Some(indicator.expected_unit.to_string());
    value.extraction_method = Some(method);
    value
}

fn failed_value(indicator: &Indicator, reason: String) -> ExtractedValue {
    let mut value = base_value(indicator, ExtractionMethod::VectorSearchFailed);
    value.explanation = Some(reason);
    value
}

// ============================================================================
// Tests
// ============================================================================
