//! Knowledge 모듈 - 보고서 벡터 인덱스 + 결과 저장소
//!
//! - Chunker: 페이지 텍스트를 겹치는 윈도우로 분할
//! - Vector: 인메모리 코사인 유사도 검색
//! - Cache: PDF별 임베딩 디스크 캐시
//! - Engine: 인덱싱 + 지표별 컨텍스트 검색
//! - Store: SQLite 추출 결과 저장 + CSV 내보내기

mod cache;
mod chunker;
mod engine;
mod store;
mod vector;

// Re-exports
pub use cache::{CacheIdentity, EmbeddingCache};
pub use chunker::{
    Chunk, ChunkConfig, Chunker, PageWindowChunker, SlidingWindowChunker,
    default_chunker, sliding_window_chunker,
};
pub use engine::{format_context, IndexStats, VectorSearchEngine};
pub use store::{EsgRecord, RecordFilter, ResultStore, SummaryStats};
pub use vector::{cosine_similarity, SearchHit, VectorIndex};
