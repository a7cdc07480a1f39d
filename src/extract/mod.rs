//! 추출 파이프라인 - 보고서 한 건(또는 폴더 전체)에 대한 실행 단위
//!
//! - Fast: 벡터 검색 + 지표당 LLM 1회 (임베딩 API 필요)
//! - Simple: 키워드 페이지 검색 + JSON 모드 LLM 최대 3회

pub mod confidence;
pub mod fast;
pub mod simple;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::Settings;
use crate::document::PdfDocument;
use crate::embedding::EmbeddingProvider;
use crate::indicators::{ExtractedValue, ExtractionMethod, Indicator};
use crate::knowledge::{EmbeddingCache, VectorSearchEngine};
use crate::llm::LlmClient;

pub use confidence::{ConfidenceBand, QualityMetrics};
pub use fast::FastVectorExtractor;
pub use simple::SimpleExtractor;

// ============================================================================
// Types
// ============================================================================

/// 추출 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    #[default]
    Fast,
    Simple,
}

impl ExtractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMode::Fast => "fast",
            ExtractionMode::Simple => "simple",
        }
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" | "vector" => Ok(ExtractionMode::Fast),
            "simple" | "keyword" => Ok(ExtractionMode::Simple),
            other => Err(format!("Unknown extraction mode: {} (expected fast or simple)", other)),
        }
    }
}

/// 보고서 한 건 추출 요청
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub pdf_path: PathBuf,
    pub company: String,
    pub year: i32,
    pub indicators: Vec<&'static Indicator>,
    pub mode: ExtractionMode,
    pub force_reindex: bool,
}

/// 보고서 한 건 추출 결과
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionRun {
    pub company: String,
    pub year: i32,
    pub mode: ExtractionMode,
    pub pdf_path: PathBuf,
    pub values: Vec<ExtractedValue>,
    /// 지표별 실패 (실행 전체를 중단시키지 않음)
    pub errors: Vec<String>,
    pub total_indicators: usize,
    pub processing_time_secs: f64,
    pub started_at: DateTime<Utc>,
}

impl ExtractionRun {
    pub fn quality(&self) -> QualityMetrics {
        QualityMetrics::from_values(&self.values)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// LLM / 임베딩 클라이언트를 묶은 실행기
pub struct Pipeline {
    llm: Arc<dyn LlmClient>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    cache_dir: PathBuf,
}

impl Pipeline {
    /// 임베딩 프로바이더가 없으면 Fast 모드는 실패합니다.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            llm,
            embedder,
            cache_dir: cache_dir.into(),
        }
    }

    pub fn from_settings(
        settings: &Settings,
        llm: Arc<dyn LlmClient>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        Self::new(llm, embedder, settings.cache_dir.clone())
    }

    /// 보고서 한 건 추출
    ///
    /// 문서 로드/인덱싱 실패는 에러, 지표별 실패는 `errors`에 기록됩니다.
    pub async fn run_extraction(&self, request: &ExtractionRequest) -> Result<ExtractionRun> {
        let started_at = Utc::now();
        let timer = Instant::now();

        tracing::info!(
            "Starting {} extraction for {} - {} ({} indicators)",
            request.mode,
            request.company,
            request.year,
            request.indicators.len()
        );

        let document = PdfDocument::open(&request.pdf_path)
            .await
            .with_context(|| format!("Failed to load report: {:?}", request.pdf_path))?;

        let run = self
            .run_on_document(request, &document, started_at, timer)
            .await?;

        let quality = run.quality();
        tracing::info!(
            "Finished {} - {}: {}/{} found, quality {:.2} in {:.1}s",
            run.company,
            run.year,
            quality.found,
            quality.total,
            quality.quality_score,
            run.processing_time_secs
        );
        Ok(run)
    }

    /// 이미 로드된 문서로 추출
    pub async fn run_on_document(
        &self,
        request: &ExtractionRequest,
        document: &PdfDocument,
        started_at: DateTime<Utc>,
        timer: Instant,
    ) -> Result<ExtractionRun> {
        let (values, errors) = match request.mode {
            ExtractionMode::Fast => {
                let embedder = self.embedder.clone().ok_or_else(|| {
                    anyhow::anyhow!(
                        "Fast mode requires an embedding provider. \
                         Set GEMINI_API_KEY or use --mode simple"
                    )
                })?;
                let cache = EmbeddingCache::open(&self.cache_dir)?;
                let mut extractor = FastVectorExtractor::new(
                    self.llm.clone(),
                    VectorSearchEngine::new(embedder, cache),
                );

                let values = extractor
                    .extract_batch(&request.indicators, document, request.force_reindex)
                    .await?;
                let errors = values
                    .iter()
                    .filter(|v| v.extraction_method == Some(ExtractionMethod::VectorSearchFailed))
                    .map(|v| {
                        format!(
                            "Extraction error for {}: {}",
                            v.indicator_code,
                            v.explanation.as_deref().unwrap_or("unknown error")
                        )
                    })
                    .collect();
                (values, errors)
            }
            ExtractionMode::Simple => {
                SimpleExtractor::new(self.llm.clone())
                    .extract_batch(&request.indicators, document)
                    .await
            }
        };

        let validated = values.iter().filter(|v| v.confidence > 0.5).count();
        tracing::info!(
            "Validated {}/{} values with >0.5 confidence",
            validated,
            values.len()
        );

        Ok(ExtractionRun {
            company: request.company.clone(),
            year: request.year,
            mode: request.mode,
            pdf_path: document.path().to_path_buf(),
            values,
            errors,
            total_indicators: request.indicators.len(),
            processing_time_secs: timer.elapsed().as_secs_f64(),
            started_at,
        })
    }
}

// ============================================================================
// Batch Discovery
// ============================================================================

/// 폴더에서 찾은 보고서
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFile {
    pub path: PathBuf,
    pub company: String,
    pub year: i32,
}

fn report_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.+?)[_\- ]((?:19|20)\d{2})$").expect("Invalid regex"))
}

/// `<Company>_<Year>` 형식 파일명에서 회사명/연도 추출
///
/// 연도가 없으면 `default_year`, 그것도 없으면 None.
pub fn parse_report_name(path: &Path, default_year: Option<i32>) -> Option<(String, i32)> {
    let stem = path.file_stem()?.to_str()?.trim();
    if stem.is_empty() {
        return None;
    }

    if let Some(caps) = report_name_pattern().captures(stem) {
        let company = caps[1].trim().to_string();
        let year = caps[2].parse().ok()?;
        return Some((company, year));
    }

    default_year.map(|year| (stem.to_string(), year))
}

/// 폴더 안의 `*.pdf` 보고서 목록 (하위 폴더 제외, 파일명 순)
pub fn discover_reports(dir: &Path, default_year: Option<i32>) -> Result<Vec<ReportFile>> {
    if !dir.is_dir() {
        anyhow::bail!("Reports directory not found: {:?}", dir);
    }

    let mut reports = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if !is_pdf {
            continue;
        }

        match parse_report_name(path, default_year) {
            Some((company, year)) => reports.push(ReportFile {
                path: path.to_path_buf(),
                company,
                year,
            }),
            None => tracing::warn!(
                "Skipping {:?}: name is not <Company>_<Year>.pdf and no --year given",
                path
            ),
        }
    }

    Ok(reports)
}

// ============================================================================
// Tests
// ============================================================================
