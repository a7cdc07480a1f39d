//! esg-extract - 지속가능성 보고서 ESG 지표 추출기
//!
//! 보고서 PDF를 청크로 나눠 임베딩하고, 지표마다 가까운 청크를 찾아
//! LLM으로 값/단위/페이지/신뢰도를 추출합니다.

pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod extract;
pub mod indicators;
pub mod knowledge;
pub mod llm;
pub mod report;

#[cfg(test)]
mod test_server;

// Re-exports
pub use config::Settings;
pub use document::{PdfDocument, Page};
pub use embedding::{EmbeddingProvider, GeminiEmbedding};
pub use extract::{
    ExtractionMode, ExtractionRequest, ExtractionRun, FastVectorExtractor, Pipeline,
    QualityMetrics, SimpleExtractor,
};
pub use indicators::{
    EsgCategory, ExtractedValue, ExtractionMethod, Indicator, all_indicators,
    get_indicator_by_code,
};
pub use knowledge::{
    ChunkConfig, Chunker, EmbeddingCache, RecordFilter, ResultStore, SearchHit,
    VectorSearchEngine,
};
pub use llm::{LlmClient, LlmError, OpenRouterClient};
pub use report::create_extraction_report;
