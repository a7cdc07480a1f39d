//! Vector Index - 메모리 내 선형 코사인 유사도 검색
//!
//! 보고서 한 건의 청크 수는 수천 개 수준이므로 ANN 구조 없이
//! 전체를 순회합니다.

use std::cmp::Ordering;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::chunker::Chunk;

// ============================================================================
// Types
// ============================================================================

/// 검색 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// 청크 텍스트
    pub text: String,
    /// 페이지 번호
    pub page: u32,
    /// 코사인 유사도 (-1.0 ~ 1.0)
    pub score: f32,
}

/// 청크와 임베딩을 함께 보관하는 인덱스
///
/// 역직렬화도 `VectorIndex::new`의 검사를 거칩니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RawVectorIndex")]
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct RawVectorIndex {
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
}

impl TryFrom<RawVectorIndex> for VectorIndex {
    type Error = anyhow::Error;

    fn try_from(raw: RawVectorIndex) -> Result<Self> {
        Self::new(raw.chunks, raw.embeddings)
    }
}

impl VectorIndex {
    /// 청크와 임베딩으로 인덱스 생성
    ///
    /// 두 목록의 길이가 다르거나 임베딩 차원이 섞여 있으면 에러.
    pub fn new(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            anyhow::bail!(
                "Chunk/embedding count mismatch: {} chunks, {} embeddings",
                chunks.len(),
                embeddings.len()
            );
        }

        if let Some(first) = embeddings.first() {
            if let Some(bad) = embeddings.iter().position(|e| e.len() != first.len()) {
                anyhow::bail!(
                    "Embedding dimension mismatch at {}: expected {}, got {}",
                    bad,
                    first.len(),
                    embeddings[bad].len()
                );
            }
        }

        Ok(Self { chunks, embeddings })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    /// 임베딩 차원 (비어 있으면 None)
    pub fn dimension(&self) -> Option<usize> {
        self.embeddings.first().map(|e| e.len())
    }

    /// 상위 `top_k` 청크 검색
    ///
    /// 유사도 내림차순, 동점이면 문서 순서를 유지합니다.
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Vec<SearchHit> {
        let mut scored: Vec<(&Chunk, f32)> = self
            .chunks
            .iter()
            .zip(self.embeddings.iter())
            .map(|(chunk, emb)| (chunk, cosine_similarity(emb, query_embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(chunk, score)| SearchHit {
                text: chunk.text.clone(),
                page: chunk.page,
                score,
            })
            .collect()
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 두 벡터 간의 코사인 유사도를 계산합니다.
/// 결과는 -1.0 ~ 1.0 범위입니다.
///
/// 길이가 다르거나 비어 있거나 영벡터면 0.0을 반환합니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(page: u32, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            page,
            start: 0,
            end: text.chars().count(),
            full_page: true,
        }
    }

    fn sample_index() -> VectorIndex {
        VectorIndex::new(
            vec![
                chunk(1, "emissions"),
                chunk(2, "workforce"),
                chunk(3, "board"),
                chunk(4, "emissions again"),
            ],
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
                vec![0.9, 0.1, 0.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_cosine_similarity_same() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c) - 0.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) - -1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        let empty: Vec<f32> = vec![];
        assert_eq!(cosine_similarity(&empty, &empty), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_orders_by_score() {
        let index = sample_index();
        let hits = index.search(&[1.0, 0.0, 0.0], 2);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].page, 1);
        assert_eq!(hits[1].page, 4);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_search_top_k_larger_than_index() {
        let index = sample_index();
        let hits = index.search(&[0.0, 1.0, 0.0], 10);
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].page, 2);
    }

    #[test]
    fn test_search_ties_keep_document_order() {
        let index = VectorIndex::new(
            vec![chunk(5, "a"), chunk(2, "b")],
            vec![vec![1.0, 0.0], vec![2.0, 0.0]],
        )
        .unwrap();
        let hits = index.search(&[1.0, 0.0], 2);
        assert_eq!(hits[0].page, 5);
        assert_eq!(hits[1].page, 2);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let result = VectorIndex::new(vec![chunk(1, "a")], vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        let result = VectorIndex::new(
            vec![chunk(1, "a"), chunk(2, "b")],
            vec![vec![1.0, 0.0], vec![1.0]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_checks_lengths() {
        let json = serde_json::to_value(&sample_index()).unwrap();
        let mut broken = json.clone();
        broken["embeddings"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!([1.0, 1.0, 1.0]));

        assert!(serde_json::from_value::<VectorIndex>(json).is_ok());
        assert!(serde_json::from_value::<VectorIndex>(broken).is_err());
    }

    #[test]
    fn test_empty_index() {
        let index = VectorIndex::default();
        assert!(index.is_empty());
        assert!(index.search(&[1.0], 3).is_empty());
        assert_eq!(index.dimension(), None);
    }
}
