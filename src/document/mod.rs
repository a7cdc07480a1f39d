//! 문서 모듈 - 보고서 PDF 로드 및 페이지 단위 조회
//!
//! 모든 페이지 번호는 1부터 시작합니다.

pub mod numeric;
pub mod pdf;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

pub use numeric::extract_numeric_value;

/// 검색 결과 주변에 포함할 줄 수
const SEARCH_CONTEXT_LINES: usize = 2;

// ============================================================================
// Page
// ============================================================================

/// 문서의 한 페이지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 페이지 번호 (1부터)
    pub number: u32,
    pub text: String,
}

impl Page {
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

// ============================================================================
// PdfDocument
// ============================================================================

/// 페이지별 텍스트가 로드된 보고서
#[derive(Debug, Clone)]
pub struct PdfDocument {
    path: PathBuf,
    pages: Vec<Page>,
}

impl PdfDocument {
    /// PDF 파일 열기
    ///
    /// 텍스트 추출은 CPU 바운드이므로 spawn_blocking에서 실행합니다.
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("PDF file not found: {:?}", path);
        }

        let owned = path.to_path_buf();
        let raw_pages = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&owned))
            .await
            .context("PDF extraction task failed")??;

        let pages: Vec<Page> = raw_pages
            .into_iter()
            .map(|(number, text)| Page::new(number, text))
            .collect();

        tracing::info!("Loaded {} pages from {:?}", pages.len(), path);

        Ok(Self {
            path: path.to_path_buf(),
            pages,
        })
    }

    /// 이미 추출된 페이지로 생성
    pub fn from_pages(path: impl Into<PathBuf>, pages: Vec<Page>) -> Self {
        Self {
            path: path.into(),
            pages,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 캐시 키로 사용하는 문서 식별자
    pub fn key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// 특정 페이지 텍스트
    pub fn page_text(&self, number: u32) -> Result<&str> {
        self.pages
            .iter()
            .find(|p| p.number == number)
            .map(|p| p.text.as_str())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Page number {} out of range (1-{})",
                    number,
                    self.pages.len()
                )
            })
    }

    /// (페이지 번호, 텍스트) 목록
    pub fn text_by_page(&self) -> Vec<(u32, &str)> {
        self.pages
            .iter()
            .map(|p| (p.number, p.text.as_str()))
            .collect()
    }

    /// 전체 페이지에서 문자열 검색 (대소문자 무시)
    ///
    /// 일치하는 줄마다 앞뒤 2줄을 포함한 문맥을 만들고,
    /// 한 페이지의 문맥들은 `\n...\n`으로 연결합니다.
    pub fn search_text(&self, query: &str) -> Result<Vec<(u32, String)>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![]);
        }

        let pattern = RegexBuilder::new(&regex::escape(query))
            .case_insensitive(true)
            .build()
            .with_context(|| format!("Invalid search query: {}", query))?;

        let mut results = Vec::new();

        for page in &self.pages {
            if !pattern.is_match(&page.text) {
                continue;
            }

            let lines: Vec<&str> = page.text.split('\n').collect();
            let contexts: Vec<String> = lines
                .iter()
                .enumerate()
                .filter(|(_, line)| pattern.is_match(line))
                .map(|(i, _)| {
                    let start = i.saturating_sub(SEARCH_CONTEXT_LINES);
                    let end = (i + SEARCH_CONTEXT_LINES + 1).min(lines.len());
                    lines[start..end].join("\n")
                })
                .collect();

            // 여러 줄에 걸친 일치는 줄 단위로 찾을 수 없음
            if !contexts.is_empty() {
                results.push((page.number, contexts.join("\n...\n")));
            }
        }

        Ok(results)
    }

    /// 키워드가 등장하는 페이지와 앞뒤 `context_pages` 페이지
    ///
    /// 페이지 번호 오름차순, 중복 없음.
    pub fn pages_for_keywords(&self, keywords: &[&str], context_pages: u32) -> Result<Vec<(u32, &str)>> {
        let last_page = self.pages.iter().map(|p| p.number).max().unwrap_or(0);
        let mut relevant = BTreeSet::new();

        for keyword in keywords {
            for (page, _) in self.search_text(keyword)? {
                let start = page.saturating_sub(context_pages).max(1);
                let end = (page + context_pages).min(last_page);
                relevant.extend(start..=end);
            }
        }

        Ok(relevant
            .into_iter()
            .filter_map(|n| self.page_text(n).ok().map(|text| (n, text)))
            .collect())
    }

    /// 페이지 범위 텍스트 (양 끝 포함)
    pub fn page_range_text(&self, start_page: u32, end_page: u32) -> Result<String> {
        if start_page < 1 || end_page as usize > self.pages.len() || start_page > end_page {
            anyhow::bail!(
                "Page range {}-{} out of bounds (1-{})",
                start_page,
                end_page,
                self.pages.len()
            );
        }

        let mut parts = Vec::with_capacity((end_page - start_page + 1) as usize);
        for number in start_page..=end_page {
            let text = self.page_text(number)?;
            parts.push(format!("\n--- Page {} ---\n{}", number, text));
        }

        Ok(parts.join("\n"))
    }
}

// ============================================================================
// Report Validation
// ============================================================================

/// 추출에 적합한 보고서인지 검사한 결과
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportValidation {
    pub valid: bool,
    pub total_pages: Option<usize>,
    pub has_text: bool,
    pub reasonable_size: bool,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl ReportValidation {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// 보고서 PDF 검사
///
/// 첫 페이지에 텍스트가 있고 (100자 초과), 페이지 수가 50~1000 사이면 유효합니다.
pub async fn validate_report(path: &Path) -> ReportValidation {
    if !path.exists() {
        return ReportValidation::failed("File not found");
    }

    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf {
        return ReportValidation::failed("Not a PDF file");
    }

    match PdfDocument::open(path).await {
        Ok(doc) => check_document(&doc),
        Err(e) => ReportValidation::failed(format!("{:#}", e)),
    }
}

fn check_document(doc: &PdfDocument) -> ReportValidation {
    let total_pages = doc.page_count();
    let has_text = doc
        .pages()
        .first()
        .map(|p| p.text.trim().chars().count() > 100)
        .unwrap_or(false);
    let reasonable_size = (50..=1000).contains(&total_pages);

    let mut warnings = Vec::new();
    if !has_text {
        warnings.push("No text content".to_string());
    }
    if !reasonable_size {
        warnings.push(format!("Unusual page count: {}", total_pages));
    }

    ReportValidation {
        valid: has_text && reasonable_size,
        total_pages: Some(total_pages),
        has_text,
        reasonable_size,
        warnings,
        error: None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> PdfDocument {
        PdfDocument::from_pages(
            "reports/TEST_2024.pdf",
            vec![
                Page::new(1, "Annual report\nIntroduction"),
                Page::new(2, "Climate\nOur Scope 1 emissions were 12,000 tCO2e\nin 2024"),
                Page::new(3, "Workforce\nWe employ 5,000 FTE"),
                Page::new(4, "Governance\nBoard met 11 times"),
                Page::new(5, "Appendix\nscope 1 restated"),
            ],
        )
    }

    #[test]
    fn test_page_text() {
        let doc = sample_doc();
        assert!(doc.page_text(3).unwrap().contains("5,000 FTE"));
        assert!(doc.page_text(0).is_err());
        assert!(doc.page_text(6).is_err());
    }

    #[test]
    fn test_search_text_case_insensitive_with_context() {
        let doc = sample_doc();
        let results = doc.search_text("SCOPE 1").unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 2);
        assert!(results[0].1.contains("Climate"));
        assert!(results[0].1.contains("in 2024"));
        assert_eq!(results[1].0, 5);
    }

    #[test]
    fn test_search_text_literal() {
        let doc = PdfDocument::from_pages("x.pdf", vec![Page::new(1, "tCO2e per €M (x)")]);
        assert_eq!(doc.search_text("(x)").unwrap().len(), 1);
        assert!(doc.search_text("   ").unwrap().is_empty());
    }

    #[test]
    fn test_search_joins_multiple_hits() {
        let text = "a\nb\nfraud one\nc\nd\ne\nf\ng\nfraud two";
        let doc = PdfDocument::from_pages("x.pdf", vec![Page::new(1, text)]);
        let results = doc.search_text("fraud").unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].1.contains("\n...\n"));
    }

    #[test]
    fn test_pages_for_keywords_with_context() {
        let doc = sample_doc();
        let pages = doc.pages_for_keywords(&["FTE"], 1).unwrap();
        let numbers: Vec<u32> = pages.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![2, 3, 4]);

        // 문서 경계에서 잘림 + 중복 제거
        let pages = doc.pages_for_keywords(&["scope 1", "Annual"], 1).unwrap();
        let numbers: Vec<u32> = pages.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

        assert!(doc.pages_for_keywords(&["biodiversity"], 1).unwrap().is_empty());
    }

    #[test]
    fn test_page_range_text() {
        let doc = sample_doc();
        let text = doc.page_range_text(2, 3).unwrap();
        assert!(text.starts_with("\n--- Page 2 ---\n"));
        assert!(text.contains("--- Page 3 ---"));
        assert!(!text.contains("Page 4"));

        assert!(doc.page_range_text(0, 2).is_err());
        assert!(doc.page_range_text(4, 9).is_err());
        assert!(doc.page_range_text(3, 2).is_err());
    }

    #[test]
    fn test_check_document_small_report() {
        let validation = check_document(&sample_doc());
        assert!(!validation.valid);
        assert!(!validation.has_text);
        assert!(!validation.reasonable_size);
        assert_eq!(validation.warnings.len(), 2);
    }

    #[test]
    fn test_check_document_valid_report() {
        let pages = (1..=60)
            .map(|n| Page::new(n, "x".repeat(200)))
            .collect();
        let validation = check_document(&PdfDocument::from_pages("big.pdf", pages));
        assert!(validation.valid);
        assert_eq!(validation.total_pages, Some(60));
        assert!(validation.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_validate_report_missing_and_wrong_type() {
        let missing = validate_report(Path::new("/no/such/report.pdf")).await;
        assert_eq!(missing.error.as_deref(), Some("File not found"));

        let dir = tempfile::TempDir::new().unwrap();
        let txt = dir.path().join("report.txt");
        std::fs::write(&txt, "hello").unwrap();
        let wrong = validate_report(&txt).await;
        assert_eq!(wrong.error.as_deref(), Some("Not a PDF file"));
    }
}
