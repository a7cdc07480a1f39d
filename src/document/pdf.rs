//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 페이지별 텍스트를 추출합니다.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

/// PDF에서 텍스트 추출
///
/// 페이지별로 텍스트를 추출하여 (페이지 번호, 텍스트) 튜플 벡터로 반환합니다.
/// 페이지 번호는 1부터 시작합니다.
pub fn extract_text_from_pdf(path: &Path) -> Result<Vec<(u32, String)>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![(1, String::new())]);
    }

    Ok(split_pdf_pages(&text)
        .into_iter()
        .enumerate()
        .map(|(i, text)| (i as u32 + 1, text))
        .collect())
}

/// 페이지 구분선 ("--- Page 3 ---", "=== 3 ===")
fn page_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"(?m)^[\s]*[-=]+[\s]*(?:Page[\s]*)?(\d+)[\s]*[-=]+[\s]*$")
            .expect("Invalid regex")
    })
}

/// PDF 텍스트를 페이지별로 분리
///
/// 폼피드는 빈 페이지도 위치를 차지하므로 버리지 않습니다.
/// 페이지 번호가 원본 PDF와 어긋나지 않게 하기 위해서입니다.
pub(crate) fn split_pdf_pages(text: &str) -> Vec<String> {
    if text.contains('\x0c') {
        let mut pages: Vec<String> = text.split('\x0c').map(|s| s.to_string()).collect();

        // 마지막 폼피드 뒤의 빈 꼬리는 페이지가 아님
        while pages.len() > 1 && pages.last().map(|p| p.trim().is_empty()).unwrap_or(false) {
            pages.pop();
        }
        return pages;
    }

    let pattern = page_marker();
    if pattern.is_match(text) {
        let pages: Vec<String> = pattern
            .split(text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if pages.len() > 1 {
            return pages;
        }
    }

    vec![text.to_string()]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pdf_pages_with_formfeed() {
        let text = "Page 1 content\x0cPage 2 content\x0cPage 3 content\x0c";
        let pages = split_pdf_pages(text);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], "Page 1 content");
        assert_eq!(pages[2], "Page 3 content");
    }

    #[test]
    fn test_split_keeps_blank_pages_in_position() {
        let text = "cover\x0c\x0cthird page";
        let pages = split_pdf_pages(text);
        assert_eq!(pages.len(), 3);
        assert!(pages[1].is_empty());
        assert_eq!(pages[2], "third page");
    }

    #[test]
    fn test_split_pdf_pages_with_markers() {
        let text = "--- Page 1 ---\nalpha\n--- Page 2 ---\nbeta";
        let pages = split_pdf_pages(text);
        assert_eq!(pages, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_split_pdf_pages_no_separator() {
        let text = "Just some text without page breaks";
        let pages = split_pdf_pages(text);
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(extract_text_from_pdf(Path::new("/definitely/not/here.pdf")).is_err());
    }
}
