//! Simple 모드 - 키워드 페이지 검색 + JSON 모드 LLM 호출 (최대 3회)
//!
//! 임베딩 API 없이 동작합니다. 지표 키워드가 나오는 페이지(앞뒤 1페이지 포함)
//! 중 처음 3개를 컨텍스트로 쓰고, 하나도 없으면 문서 앞쪽 큰 청크 5개를 씁니다.

use std::sync::Arc;

use serde_json::Value;

use crate::document::{extract_numeric_value, PdfDocument};
use crate::indicators::{ExtractedValue, ExtractionMethod, Indicator};
use crate::knowledge::{Chunker, PageWindowChunker};
use crate::llm::{CompletionRequest, LlmClient};

use super::confidence::confidence_from_json;

/// 키워드 페이지 앞뒤로 포함할 페이지 수
const CONTEXT_PAGES: u32 = 1;
const MAX_KEYWORD_PAGES: usize = 3;
const MAX_FALLBACK_CHUNKS: usize = 5;
const MAX_ATTEMPTS: usize = 3;
/// 프롬프트에 넣는 컨텍스트 최대 길이 (문자)
const MAX_CONTEXT_CHARS: usize = 4000;
/// 이 신뢰도를 넘는 값을 찾으면 남은 컨텍스트를 시도하지 않음
const EARLY_STOP_CONFIDENCE: f64 = 0.8;

const SIMPLE_TEMPERATURE: f32 = 0.1;
const SIMPLE_MAX_TOKENS: u32 = 1000;

const NO_CONTEXT_EXPLANATION: &str = "No relevant context found in document";

const SYSTEM_PROMPT: &str = "You are an expert ESG data analyst specializing in extracting \
sustainability indicators from corporate reports. Your task is to carefully analyze \
the provided text and extract the requested indicator value with high accuracy.";

/// LLM에 넘길 컨텍스트 한 조각
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub page: u32,
    pub text: String,
}

/// 키워드 기반 추출기
pub struct SimpleExtractor {
    llm: Arc<dyn LlmClient>,
}

impl SimpleExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 지표 하나 추출
    pub async fn extract_indicator(
        &self,
        indicator: &Indicator,
        document: &PdfDocument,
    ) -> anyhow::Result<ExtractedValue> {
        let contexts = gather_contexts(document, indicator)?;
        tracing::info!("Found {} contexts for {}", contexts.len(), indicator.code);

        if contexts.is_empty() {
            tracing::warn!("No contexts found for {}", indicator.code);
            let mut value = empty_value(indicator);
            value.explanation = Some(NO_CONTEXT_EXPLANATION.to_string());
            return Ok(value);
        }

        let max_attempts = MAX_ATTEMPTS.min(contexts.len());
        Ok(self.extract_with_retry(indicator, &contexts, max_attempts).await)
    }

    /// 지표를 순서대로 추출 (지표별 실패는 결과에 남기고 계속)
    pub async fn extract_batch(
        &self,
        indicators: &[&Indicator],
        document: &PdfDocument,
    ) -> (Vec<ExtractedValue>, Vec<String>) {
        let mut values = Vec::with_capacity(indicators.len());
        let mut errors = Vec::new();

        for (i, indicator) in indicators.iter().enumerate() {
            tracing::info!(
                "Extracting indicator {}/{}: {}",
                i + 1,
                indicators.len(),
                indicator.code
            );
            match self.extract_indicator(indicator, document).await {
                Ok(value) => values.push(value),
                Err(e) => {
                    tracing::error!("Error extracting {}: {:#}", indicator.code, e);
                    errors.push(format!("Extraction error for {}: {:#}", indicator.code, e));
                }
            }
        }

        (values, errors)
    }

    /// 컨텍스트를 차례로 시도하며 가장 높은 신뢰도의 결과 선택
    ///
    /// 실패한 호출은 `found=false, confidence=0`으로 취급합니다.
    pub async fn extract_with_retry(
        &self,
        indicator: &Indicator,
        contexts: &[Context],
        max_attempts: usize,
    ) -> ExtractedValue {
        let mut best = empty_value(indicator);
        let mut last_error: Option<String> = None;

        for (i, context) in contexts.iter().take(max_attempts).enumerate() {
            tracing::info!("Extraction attempt {} for {}", i + 1, indicator.code);

            let request = CompletionRequest::new(build_prompt(indicator, &context.text))
                .system(SYSTEM_PROMPT)
                .temperature(SIMPLE_TEMPERATURE)
                .max_tokens(SIMPLE_MAX_TOKENS);

            let response = match self.llm.generate_json(&request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Attempt {} for {} failed: {}", i + 1, indicator.code, e);
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            let (candidate, found) = value_from_json(&response, indicator, context);
            let confidence = candidate.confidence;

            if confidence > best.confidence {
                best = candidate;
            }

            if found && confidence > EARLY_STOP_CONFIDENCE {
                break;
            }
        }

        if best.confidence == 0.0 && best.explanation.is_none() {
            best.explanation = last_error;
        }

        tracing::info!(
            "Extracted {}: {} (confidence: {:.2})",
            indicator.code,
            best.value.as_deref().unwrap_or("Not found"),
            best.confidence
        );
        best
    }
}

// ============================================================================
// Context Preparation
// ============================================================================

/// 지표별 컨텍스트 준비
pub fn gather_contexts(document: &PdfDocument, indicator: &Indicator) -> anyhow::Result<Vec<Context>> {
    let pages = document.pages_for_keywords(indicator.keywords, CONTEXT_PAGES)?;

    if !pages.is_empty() {
        return Ok(pages
            .into_iter()
            .take(MAX_KEYWORD_PAGES)
            .map(|(page, text)| Context {
                page,
                text: text.to_string(),
            })
            .collect());
    }

    tracing::warn!(
        "No specific pages found for {}, using chunks",
        indicator.code
    );
    Ok(PageWindowChunker::with_defaults()
        .chunk_pages(document.pages())
        .into_iter()
        .filter(|chunk| !chunk.text.trim().is_empty())
        .take(MAX_FALLBACK_CHUNKS)
        .map(|chunk| Context {
            page: chunk.page,
            text: chunk.text,
        })
        .collect())
}

// ============================================================================
// Prompt & Parsing
// ============================================================================

pub fn build_prompt(indicator: &Indicator, context: &str) -> String {
    let context: String = context.chars().take(MAX_CONTEXT_CHARS).collect();

    format!(
        r#"
Extract the following ESG indicator from the provided text context:

**Indicator**: {name}
**Description**: {description}
**Expected Unit**: {unit}
**Related Keywords**: {keywords}

**Text Context**:
{context}

Please extract the indicator value and provide your response in the following JSON format:
{{
    "value": "the extracted value as a string (e.g., '1,234,567' or '12.5%')",
    "numeric_value": the value as a number (e.g., 1234567 or 12.5),
    "unit": "the unit of measurement (e.g., 'tCO2e', '%', 'employees')",
    "confidence": a confidence score between 0.0 and 1.0,
    "explanation": "brief explanation of where and how you found this value",
    "source_text": "the exact sentence or phrase containing the value",
    "found": true or false
}}

If the indicator is not found or cannot be extracted with confidence, set "found" to false
and "confidence" to 0.0. Always provide the most accurate numeric value you can extract.
"#,
        name = indicator.name,
        description = indicator.description,
        unit = indicator.expected_unit,
        keywords = indicator.keywords.join(", "),
        context = context,
    )
}

/// JSON 응답 → (추출 값, found 플래그)
///
/// 필드 타입이 조금 달라도 (숫자 대신 문자열 등) 받아들입니다.
pub fn value_from_json(response: &Value, indicator: &Indicator, context: &Context) -> (ExtractedValue, bool) {
    let found = match response.get("found") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };

    let mut value = empty_value(indicator);
    value.confidence = confidence_from_json(response.get("confidence"));
    value.explanation = string_field(response, "explanation");
    value.source_text = string_field(response, "source_text");

    if let Some(unit) = string_field(response, "unit") {
        value.unit = Some(unit);
    }

    if found {
        value.value = string_field(response, "value");
        value.numeric_value = match response.get("numeric_value") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => extract_numeric_value(s),
            _ => None,
        }
        .or_else(|| value.value.as_deref().and_then(extract_numeric_value));
        value.source_page = Some(context.page);
    }

    (value, found)
}

/// 문자열/숫자 필드를 문자열로 (null, 빈 문자열 → None)
fn string_field(response: &Value, key: &str) -> Option<String> {
    match response.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn empty_value(indicator: &Indicator) -> ExtractedValue {
    let mut value = ExtractedValue::empty(indicator.code);
    value.unit = Some(indicator.expected_unit.to_string());
    value.extraction_method = Some(ExtractionMethod::Simple);
    value
}

// ============================================================================
// Tests
// ============================================================================
