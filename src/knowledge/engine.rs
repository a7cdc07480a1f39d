//! Vector Search Engine - 문서 인덱싱 + 지표별 컨텍스트 검색
//!
//! 1. 페이지 → 청크 (슬라이딩 윈도우)
//! 2. 청크 → 임베딩 (배치 API, 문서별 파일 캐시)
//! 3. 지표 질의 → 쿼리 임베딩 → 코사인 유사도 상위 k개

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::document::Page;
use crate::embedding::EmbeddingProvider;
use crate::indicators::Indicator;

use super::cache::{CacheIdentity, EmbeddingCache};
use super::chunker::{sliding_window_chunker, ChunkConfig};
use super::vector::{SearchHit, VectorIndex};

// ============================================================================
// Types
// ============================================================================

/// 인덱싱 결과 요약
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub pdf_key: String,
    pub chunk_count: usize,
    pub dimension: usize,
    /// 캐시에서 불러왔는지
    pub from_cache: bool,
}

// ============================================================================
// VectorSearchEngine
// ============================================================================

/// 문서 한 건에 대한 벡터 검색 엔진
pub struct VectorSearchEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
    index: Option<VectorIndex>,
    stats: Option<IndexStats>,
}

impl VectorSearchEngine {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, cache: EmbeddingCache) -> Self {
        Self {
            embedder,
            cache,
            index: None,
            stats: None,
        }
    }

    /// 현재 인덱싱된 문서 키
    pub fn indexed_key(&self) -> Option<&str> {
        self.stats.as_ref().map(|s| s.pdf_key.as_str())
    }

    /// 마지막 인덱싱 결과
    pub fn stats(&self) -> Option<&IndexStats> {
        self.stats.as_ref()
    }

    /// 문서 인덱싱
    ///
    /// 유효한 캐시가 있으면 그대로 쓰고, 없거나 `force_reindex`면
    /// 청킹 + 배치 임베딩 후 캐시에 저장합니다.
    pub async fn index_document(
        &mut self,
        pdf_key: &str,
        pages: &[Page],
        config: &ChunkConfig,
        force_reindex: bool,
    ) -> Result<IndexStats> {
        let identity = CacheIdentity::new(
            pages,
            config,
            self.embedder.name(),
            self.embedder.dimension(),
        );

        if force_reindex {
            self.cache.invalidate(pdf_key)?;
        } else if let Some(index) = self.cache.load(pdf_key, &identity) {
            return Ok(self.install(pdf_key, index, true));
        }

        let chunker = sliding_window_chunker(config.clone());
        let chunks = chunker.chunk_pages(pages);
        tracing::info!(
            "Created {} chunks from {} pages ({})",
            chunks.len(),
            pages.len(),
            chunker.name()
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            tracing::info!("Generating embeddings for {} chunks", texts.len());
            self.embedder
                .embed_batch(&texts)
                .await
                .context("Failed to embed document chunks")?
        };

        let index = VectorIndex::new(chunks, embeddings)?;

        // 캐시 저장 실패는 인덱싱 실패가 아님
        if let Err(e) = self.cache.save(pdf_key, &identity, &index) {
            tracing::warn!("Failed to save embeddings cache: {:#}", e);
        }

        Ok(self.install(pdf_key, index, false))
    }

    fn install(&mut self, pdf_key: &str, index: VectorIndex, from_cache: bool) -> IndexStats {
        let stats = IndexStats {
            pdf_key: pdf_key.to_string(),
            chunk_count: index.len(),
            dimension: index.dimension().unwrap_or_else(|| self.embedder.dimension()),
            from_cache,
        };

        self.index = Some(index);
        self.stats = Some(stats.clone());
        stats
    }

    /// 질의문으로 상위 `top_k` 청크 검색
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let index = self
            .index
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No document indexed. Call index_document() first."))?;

        let query_embedding = self
            .embedder
            .embed_query(query)
            .await
            .context("Failed to embed search query")?;

        let hits = index.search(&query_embedding, top_k);
        tracing::debug!("Search '{}' returned {} hits", query, hits.len());
        Ok(hits)
    }

    /// 지표용 컨텍스트 문자열
    ///
    /// 페이지가 처음 등장할 때만 `--- Page N (relevance: S) ---` 머리말을 붙입니다.
    pub async fn search_for_indicator(&self, indicator: &Indicator, top_k: usize) -> Result<String> {
        let hits = self.search(&indicator.search_query(), top_k).await?;
        Ok(format_context(&hits))
    }
}

/// 검색 결과를 프롬프트용 컨텍스트로 조립
pub fn format_context(hits: &[SearchHit]) -> String {
    let mut parts = Vec::with_capacity(hits.len() * 2);
    let mut seen_pages = Vec::new();

    for hit in hits {
        if !seen_pages.contains(&hit.page) {
            parts.push(format!(
                "\n--- Page {} (relevance: {:.2}) ---",
                hit.page, hit.score
            ));
            seen_pages.push(hit.page);
        }
        parts.push(hit.text.trim().to_string());
    }

    parts.join("\n\n")
}

// ============================================================================
// Tests
// ============================================================================
