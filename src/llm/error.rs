//! LLM 클라이언트 에러 타입

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    /// 설정 오류 (API 키 누락, 잘못된 URL)
    #[error("Configuration error: {0}")]
    Config(String),

    /// 연결 실패, 타임아웃
    #[error("Network error: {0}")]
    Network(String),

    /// 2xx가 아닌 응답 또는 응답 본문의 error 객체
    #[error("API error: {0}")]
    Api(String),

    /// choices가 비어 있거나 content가 null
    #[error("Empty response: {0}")]
    EmptyResponse(String),

    /// JSON 파싱 실패
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("All {count} models failed. Last error: {last}")]
    AllModelsFailed { count: usize, last: String },
}
