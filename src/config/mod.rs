//! 설정 모듈 - 환경변수 기반 애플리케이션 설정
//!
//! `.env` 파일이 있으면 먼저 읽고, 이후 환경변수에서 값을 가져옵니다.
//! API 키는 실제로 필요한 명령이 실행될 때만 검사합니다.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::embedding::{api_key_from_env, DEFAULT_DIMENSION};

/// OpenRouter 기본 엔드포인트
pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// 기본 모델 (OpenRouter 무료 모델)
pub const DEFAULT_MODEL: &str = "meta-llama/llama-3.3-70b-instruct:free";

/// 기본 모델 실패 시 순서대로 시도할 백업 모델
pub const DEFAULT_BACKUP_MODELS: [&str; 2] =
    ["google/gemini-2.0-flash-exp:free", "qwen/qwen3-coder:free"];

/// `MAX_RETRIES` 상한
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// 429 백오프 상한
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.esg-extract/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".esg-extract")
}

// ============================================================================
// Settings
// ============================================================================

/// 애플리케이션 설정
#[derive(Debug, Clone)]
pub struct Settings {
    pub openrouter_api_key: Option<String>,
    pub openrouter_base_url: String,
    pub default_model: String,
    pub backup_models: Vec<String>,

    /// Gemini 임베딩 API 키 (fast 모드에서만 필요)
    pub gemini_api_key: Option<String>,
    pub embedding_dimension: usize,

    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub cache_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub reports_dir: PathBuf,

    /// 429 재시도 횟수 (0..=MAX_RETRIES_LIMIT)
    pub max_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_data_dir(get_data_dir())
    }
}

impl Settings {
    /// 데이터 디렉토리를 지정하여 기본 설정 생성
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            openrouter_api_key: None,
            openrouter_base_url: DEFAULT_OPENROUTER_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            backup_models: DEFAULT_BACKUP_MODELS.iter().map(|m| m.to_string()).collect(),
            gemini_api_key: None,
            embedding_dimension: DEFAULT_DIMENSION,
            database_path: data_dir.join("esg_data.db"),
            cache_dir: data_dir.join("embeddings_cache"),
            outputs_dir: PathBuf::from("outputs"),
            reports_dir: PathBuf::from("reports"),
            data_dir,
            max_retries: 3,
        }
    }

    /// 환경변수에서 설정 로드 (.env 포함)
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {:?}", path),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Failed to read .env file: {}", e),
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 키 조회 함수로 설정 구성
    ///
    /// 테스트에서는 프로세스 환경 대신 HashMap을 넘깁니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = get("ESG_DATA_DIR").map(PathBuf::from).unwrap_or_else(get_data_dir);
        let mut settings = Self::with_data_dir(data_dir);

        settings.openrouter_api_key = get("OPENROUTER_API_KEY");
        if let Some(url) = get("OPENROUTER_BASE_URL") {
            settings.openrouter_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("DEFAULT_MODEL") {
            settings.default_model = model;
        }
        if let Some(models) = get("BACKUP_MODELS") {
            settings.backup_models = models
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
        }

        settings.gemini_api_key = api_key_from_env(&get);
        settings.embedding_dimension = parse_or(&get, "EMBEDDING_DIMENSION", DEFAULT_DIMENSION)?;

        if let Some(path) = get("ESG_DATABASE_PATH") {
            settings.database_path = PathBuf::from(path);
        }
        if let Some(dir) = get("ESG_OUTPUTS_DIR") {
            settings.outputs_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("ESG_REPORTS_DIR") {
            settings.reports_dir = PathBuf::from(dir);
        }

        settings.max_retries = parse_or(&get, "MAX_RETRIES", settings.max_retries)?;
        if settings.max_retries > MAX_RETRIES_LIMIT {
            anyhow::bail!(
                "Invalid value for MAX_RETRIES: {} (must be at most {})",
                settings.max_retries,
                MAX_RETRIES_LIMIT
            );
        }

        Ok(settings)
    }

    /// 작업 디렉토리 생성 (data, cache, outputs)
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.cache_dir, &self.outputs_dir] {
            create_dir(dir)?;
        }
        if let Some(parent) = self.database_path.parent() {
            create_dir(parent)?;
        }
        Ok(())
    }

    /// OpenRouter API 키 (없으면 에러)
    pub fn require_openrouter_key(&self) -> Result<&str> {
        self.openrouter_api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "OPENROUTER_API_KEY not set.\n\
                 Set: export OPENROUTER_API_KEY=your-api-key\n\
                 Get your API key at: https://openrouter.ai/keys"
            )
        })
    }

    /// Gemini API 키 (없으면 에러)
    pub fn require_gemini_key(&self) -> Result<&str> {
        self.gemini_api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "GEMINI_API_KEY or GOOGLE_AI_API_KEY not set.\n\
                 Set: export GEMINI_API_KEY=your-api-key\n\
                 Get your API key at: https://aistudio.google.com/app/apikey"
            )
        })
    }

    /// 기본 모델 + 백업 모델 (시도 순서)
    pub fn model_chain(&self) -> Vec<String> {
        let mut models = vec![self.default_model.clone()];
        for model in &self.backup_models {
            if !models.contains(model) {
                models.push(model.clone());
            }
        }
        models
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// `attempt`번째 재시도 전 대기 시간 (initial * 2^attempt, 상한 MAX_BACKOFF)
pub fn backoff_delay(initial_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt);
    Duration::from_millis(initial_ms.saturating_mul(factor)).min(MAX_BACKOFF)
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {:?} ({})", key, raw, e)),
        None => Ok(default),
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() && !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {:?}", dir))?;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
