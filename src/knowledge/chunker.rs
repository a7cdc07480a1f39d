//! Text Chunking Module
//!
//! 페이지 텍스트를 겹치는 문자 윈도우로 분할합니다.
//! 모든 청크는 원래 페이지 번호와 페이지 내 문자 오프셋을 유지합니다.

use serde::{Deserialize, Serialize};

use crate::document::Page;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 오버랩 크기 (문자 수)
    pub chunk_overlap: usize,
    /// 공백 제거 후 이 길이 이하인 청크는 버림
    pub min_chunk_chars: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 200,
            min_chunk_chars: 0,
        }
    }
}

impl ChunkConfig {
    /// 벡터 인덱스용 설정 (작은 청크, 짧은 조각 제거)
    pub fn for_vector_index() -> Self {
        Self {
            chunk_size: 600,
            chunk_overlap: 100,
            min_chunk_chars: 50,
        }
    }

    /// 키워드 검색 실패 시 사용하는 큰 청크
    pub fn for_keyword_fallback() -> Self {
        Self {
            chunk_size: 3000,
            chunk_overlap: 300,
            min_chunk_chars: 0,
        }
    }

    /// 윈도우 이동 간격 (최소 1자)
    pub fn step(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap).max(1)
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// 페이지 텍스트 조각
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// 페이지 번호 (1부터)
    pub page: u32,
    /// 페이지 내 시작 문자 오프셋
    pub start: usize,
    /// 페이지 내 끝 문자 오프셋 (미포함)
    pub end: usize,
    /// 페이지 전체를 담은 청크인지
    pub full_page: bool,
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 페이지 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 페이지 목록을 청크로 분할 (페이지 번호 오름차순)
    fn chunk_pages(&self, pages: &[Page]) -> Vec<Chunk>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// SlidingWindowChunker
// ============================================================================

/// 벡터 인덱스용 슬라이딩 윈도우 청커
///
/// 0부터 `size - overlap` 간격으로 `[i, i + size)` 윈도우를 만들고,
/// 공백 제거 후 `min_chunk_chars` 이하인 윈도우는 버립니다.
pub struct SlidingWindowChunker {
    config: ChunkConfig,
}

impl SlidingWindowChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::for_vector_index())
    }
}

impl Chunker for SlidingWindowChunker {
    fn chunk_pages(&self, pages: &[Page]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in sorted_pages(pages) {
            let offsets = char_offsets(&page.text);
            let char_len = offsets.len() - 1;
            let mut start = 0;

            while start < char_len {
                let end = (start + self.config.chunk_size).min(char_len);
                let text = &page.text[offsets[start]..offsets[end]];

                if text.trim().chars().count() > self.config.min_chunk_chars {
                    chunks.push(Chunk {
                        text: text.to_string(),
                        page: page.number,
                        start,
                        end,
                        full_page: start == 0 && end == char_len,
                    });
                }

                start += self.config.step();
            }
        }

        chunks
    }

    fn name(&self) -> &'static str {
        "SlidingWindowChunker"
    }
}

// ============================================================================
// PageWindowChunker
// ============================================================================

/// 페이지 단위 청커
///
/// 짧은 페이지는 통째로 하나의 청크가 되고, 긴 페이지만 겹치는 윈도우로 나눕니다.
pub struct PageWindowChunker {
    config: ChunkConfig,
}

impl PageWindowChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::for_keyword_fallback())
    }
}

impl Chunker for PageWindowChunker {
    fn chunk_pages(&self, pages: &[Page]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in sorted_pages(pages) {
            let offsets = char_offsets(&page.text);
            let char_len = offsets.len() - 1;

            if char_len <= self.config.chunk_size {
                chunks.push(Chunk {
                    text: page.text.clone(),
                    page: page.number,
                    start: 0,
                    end: char_len,
                    full_page: true,
                });
                continue;
            }

            let mut start = 0;
            loop {
                let end = (start + self.config.chunk_size).min(char_len);
                chunks.push(Chunk {
                    text: page.text[offsets[start]..offsets[end]].to_string(),
                    page: page.number,
                    start,
                    end,
                    full_page: false,
                });

                if end >= char_len {
                    break;
                }
                // 오버랩만큼 되돌아가되 반드시 전진
                start = end.saturating_sub(self.config.chunk_overlap).max(start + 1);
            }
        }

        chunks
    }

    fn name(&self) -> &'static str {
        "PageWindowChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 페이지 번호 오름차순 정렬
fn sorted_pages(pages: &[Page]) -> Vec<&Page> {
    let mut sorted: Vec<&Page> = pages.iter().collect();
    sorted.sort_by_key(|p| p.number);
    sorted
}

/// 문자 인덱스 → 바이트 오프셋 테이블 (끝에 전체 길이 포함)
///
/// UTF-8 다중 바이트 문자를 자르지 않기 위해 사용합니다.
fn char_offsets(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 벡터 인덱스용 기본 청커
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(SlidingWindowChunker::with_defaults())
}

/// 설정을 지정한 슬라이딩 윈도우 청커
pub fn sliding_window_chunker(config: ChunkConfig) -> Box<dyn Chunker> {
    Box::new(SlidingWindowChunker::new(config))
}

// ============================================================================
// Tests
// ============================================================================
