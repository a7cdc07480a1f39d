//! Embedding Cache - 문서별 임베딩 파일 캐시
//!
//! 저장 위치: `<cache_dir>/<sha256(pdf_key)>.json`
//!
//! 같은 보고서를 다시 처리할 때 임베딩 API 호출을 생략합니다.
//! 페이지 텍스트, 청킹 설정, 임베딩 프로바이더 중 하나라도 바뀌면
//! 지문(fingerprint)이 달라져 캐시를 무시합니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::document::Page;

use super::chunker::ChunkConfig;
use super::vector::VectorIndex;

/// 캐시 파일 포맷 버전
const CACHE_VERSION: u32 = 1;

// ============================================================================
// Types
// ============================================================================

/// 캐시 유효성 검사용 식별 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheIdentity {
    /// 페이지 텍스트 + 청킹 설정 해시
    pub fingerprint: String,
    /// 임베딩 프로바이더 이름
    pub provider: String,
    /// 임베딩 차원
    pub dimension: usize,
}

impl CacheIdentity {
    pub fn new(pages: &[Page], config: &ChunkConfig, provider: &str, dimension: usize) -> Self {
        Self {
            fingerprint: fingerprint(pages, config),
            provider: provider.to_string(),
            dimension,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    version: u32,
    identity: CacheIdentity,
    index: VectorIndex,
}

// ============================================================================
// EmbeddingCache
// ============================================================================

/// 문서별 임베딩 캐시
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    dir: PathBuf,
}

impl EmbeddingCache {
    /// 캐시 디렉토리 열기 (없으면 생성)
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            std::fs::create_dir_all(dir).context("Failed to create embeddings cache directory")?;
        }

        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// 문서 키에 대응하는 캐시 파일 경로
    pub fn cache_path(&self, pdf_key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sha256_hex(pdf_key.as_bytes())))
    }

    /// 캐시 로드
    ///
    /// 파일이 없거나 손상되었거나 식별 정보가 다르면 `None`.
    pub fn load(&self, pdf_key: &str, expected: &CacheIdentity) -> Option<VectorIndex> {
        let path = self.cache_path(pdf_key);
        if !path.exists() {
            return None;
        }

        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to read embeddings cache {:?}: {}", path, e);
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Ignoring corrupt embeddings cache {:?}: {}", path, e);
                return None;
            }
        };

        if entry.version != CACHE_VERSION || &entry.identity != expected {
            tracing::info!("Embeddings cache for {} is stale, reindexing", pdf_key);
            return None;
        }

        if let Some(dimension) = entry.index.dimension() {
            if dimension != expected.dimension {
                tracing::warn!(
                    "Ignoring embeddings cache {:?}: vectors have {} dimensions, expected {}",
                    path,
                    dimension,
                    expected.dimension
                );
                return None;
            }
        }

        tracing::info!("Loaded {} chunks from cache: {:?}", entry.index.len(), path);
        Some(entry.index)
    }

    /// 캐시 저장 (임시 파일에 쓴 뒤 rename)
    pub fn save(&self, pdf_key: &str, identity: &CacheIdentity, index: &VectorIndex) -> Result<PathBuf> {
        #[derive(Serialize)]
        struct CacheEntryRef<'a> {
            version: u32,
            identity: &'a CacheIdentity,
            index: &'a VectorIndex,
        }

        let path = self.cache_path(pdf_key);
        let tmp_path = path.with_extension("json.tmp");

        let body = serde_json::to_vec(&CacheEntryRef {
            version: CACHE_VERSION,
            identity,
            index,
        })
        .context("Failed to serialize embeddings cache")?;

        std::fs::write(&tmp_path, body)
            .with_context(|| format!("Failed to write embeddings cache: {:?}", tmp_path))?;
        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to move embeddings cache into place: {:?}", path))?;

        tracing::info!("Saved embeddings cache: {:?}", path);
        Ok(path)
    }

    /// 캐시 삭제 (삭제했으면 true)
    pub fn invalidate(&self, pdf_key: &str) -> Result<bool> {
        let path = self.cache_path(pdf_key);
        if !path.exists() {
            return Ok(false);
        }

        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove embeddings cache: {:?}", path))?;
        Ok(true)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// 페이지 텍스트 + 청킹 설정 지문
fn fingerprint(pages: &[Page], config: &ChunkConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(
        format!(
            "{}:{}:{}",
            config.chunk_size, config.chunk_overlap, config.min_chunk_chars
        )
        .as_bytes(),
    );

    for page in pages {
        hasher.update(page.number.to_le_bytes());
        hasher.update((page.text.len() as u64).to_le_bytes());
        hasher.update(page.text.as_bytes());
    }

    format!("{:x}", hasher.finalize())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::chunker::Chunk;
    use tempfile::TempDir;

    fn sample_index() -> VectorIndex {
        VectorIndex::new(
            vec![Chunk {
                text: "Scope 1 emissions: 12,000 tCO2e".to_string(),
                page: 4,
                start: 0,
                end: 31,
                full_page: true,
            }],
            vec![vec![0.25, 0.5, 0.75]],
        )
        .unwrap()
    }

    fn identity(text: &str) -> CacheIdentity {
        CacheIdentity::new(
            &[Page::new(1, text)],
            &ChunkConfig::for_vector_index(),
            "mock",
            3,
        )
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cache = EmbeddingCache::open(&dir.path().join("cache")).unwrap();
        let id = identity("page one");

        let path = cache.save("reports/AIB_2024.pdf", &id, &sample_index()).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = cache.load("reports/AIB_2024.pdf", &id).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.chunks()[0].page, 4);
        assert_eq!(loaded.embeddings()[0], vec![0.25, 0.5, 0.75]);
    }

    #[test]
    fn test_stale_identity_is_ignored() {
        let dir = TempDir::new().unwrap();
        let cache = EmbeddingCache::open(dir.path()).unwrap();
        cache.save("doc.pdf", &identity("v1"), &sample_index()).unwrap();

        assert!(cache.load("doc.pdf", &identity("v2")).is_none());

        let mut other_provider = identity("v1");
        other_provider.provider = "other".to_string();
        assert!(cache.load("doc.pdf", &other_provider).is_none());
    }

    #[test]
    fn test_missing_and_corrupt_entries() {
        let dir = TempDir::new().unwrap();
        let cache = EmbeddingCache::open(dir.path()).unwrap();
        assert!(cache.load("nothing.pdf", &identity("x")).is_none());

        std::fs::write(cache.cache_path("broken.pdf"), b"{not json").unwrap();
        assert!(cache.load("broken.pdf", &identity("x")).is_none());
    }

    #[test]
    fn test_entry_with_extra_embeddings_is_ignored() {
        let dir = TempDir::new().unwrap();
        let cache = EmbeddingCache::open(dir.path()).unwrap();
        let id = identity("v1");
        let path = cache.save("doc.pdf", &id, &sample_index()).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let tampered = body.replace("[[0.25,0.5,0.75]]", "[[0.25,0.5,0.75],[1.0,1.0,1.0]]");
        assert_ne!(body, tampered);
        std::fs::write(&path, tampered).unwrap();

        assert!(cache.load("doc.pdf", &id).is_none());
    }

    #[test]
    fn test_entry_with_wrong_dimension_is_ignored() {
        let dir = TempDir::new().unwrap();
        let cache = EmbeddingCache::open(dir.path()).unwrap();
        let mut id = identity("v1");
        id.dimension = 768;
        cache.save("doc.pdf", &id, &sample_index()).unwrap();

        assert!(cache.load("doc.pdf", &id).is_none());
    }

    #[test]
    fn test_invalidate() {
        let dir = TempDir::new().unwrap();
        let cache = EmbeddingCache::open(dir.path()).unwrap();
        cache.save("doc.pdf", &identity("v1"), &sample_index()).unwrap();

        assert!(cache.invalidate("doc.pdf").unwrap());
        assert!(!cache.invalidate("doc.pdf").unwrap());
        assert!(cache.load("doc.pdf", &identity("v1")).is_none());
    }

    #[test]
    fn test_cache_path_is_stable_per_key() {
        let dir = TempDir::new().unwrap();
        let cache = EmbeddingCache::open(dir.path()).unwrap();
        assert_eq!(cache.cache_path("a.pdf"), cache.cache_path("a.pdf"));
        assert_ne!(cache.cache_path("a.pdf"), cache.cache_path("b.pdf"));
        assert!(cache
            .cache_path("a.pdf")
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.len() == 64 + ".json".len())
            .unwrap_or(false));
    }

    #[test]
    fn test_fingerprint_depends_on_config() {
        let pages = [Page::new(1, "same text")];
        let a = fingerprint(&pages, &ChunkConfig::for_vector_index());
        let b = fingerprint(&pages, &ChunkConfig::for_keyword_fallback());
        assert_ne!(a, b);
    }
}
