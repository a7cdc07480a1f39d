//! Result Store - rusqlite 기반 추출 결과 저장소
//!
//! 실행마다 추출된 지표 값을 `esg_indicators` 테이블에 쌓고,
//! 회사/연도/지표/신뢰도로 조회하거나 CSV로 내보냅니다.
//! 기본 위치: <data_dir>/esg_data.db

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, Transaction};
use serde::{Deserialize, Serialize};

use crate::indicators::ExtractedValue;

// ============================================================================
// Types
// ============================================================================

/// 저장된 지표 레코드
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsgRecord {
    pub id: i64,
    pub company: String,
    pub year: i32,
    pub indicator: String,
    pub value: Option<String>,
    pub numeric_value: Option<f64>,
    pub unit: Option<String>,
    pub source_page: Option<u32>,
    pub confidence: f64,
    /// 추출 시 모델이 남긴 설명
    pub notes: Option<String>,
    pub source_text: Option<String>,
    pub extraction_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 레코드 조회 조건 (None이면 조건 없음)
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub company: Option<String>,
    pub year: Option<i32>,
    pub indicator: Option<String>,
    pub min_confidence: Option<f64>,
}

impl RecordFilter {
    pub fn company_year(company: Option<&str>, year: Option<i32>) -> Self {
        Self {
            company: company.map(str::to_string),
            year,
            ..Default::default()
        }
    }
}

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct SummaryStats {
    pub total_records: usize,
    pub unique_companies: usize,
    pub unique_years: usize,
    pub unique_indicators: usize,
    /// confidence > 0 인 레코드의 평균 (소수 둘째 자리)
    pub average_confidence: f64,
    pub db_path: PathBuf,
}

/// CSV 한 줄
#[derive(Serialize)]
struct CsvRow<'a> {
    company: &'a str,
    year: i32,
    indicator: &'a str,
    value: Option<&'a str>,
    numeric_value: Option<f64>,
    unit: Option<&'a str>,
    source_page: Option<u32>,
    confidence: f64,
    notes: Option<&'a str>,
}

const SELECT_COLUMNS: &str = "SELECT id, company, year, indicator, value, numeric_value, unit,
        source_page, confidence, notes, source_text, extraction_method, created_at, updated_at
     FROM esg_indicators";

// ============================================================================
// ResultStore
// ============================================================================

/// 추출 결과 저장소
pub struct ResultStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl ResultStore {
    /// 저장소 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        // 부모 디렉토리 생성
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS esg_indicators (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company TEXT NOT NULL,
                year INTEGER NOT NULL,
                indicator TEXT NOT NULL,
                value TEXT,
                numeric_value REAL,
                unit TEXT,
                source_page INTEGER,
                confidence REAL NOT NULL DEFAULT 0.0,
                notes TEXT,
                source_text TEXT,
                extraction_method TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create esg_indicators table")?;

        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_esg_company ON esg_indicators(company);
             CREATE INDEX IF NOT EXISTS idx_esg_year ON esg_indicators(year);
             CREATE INDEX IF NOT EXISTS idx_esg_indicator ON esg_indicators(indicator);",
        )
        .context("Failed to create esg_indicators indexes")?;

        tracing::debug!("Result store initialized at {:?}", self.db_path);
        Ok(())
    }

    /// 한 실행의 결과를 한 트랜잭션으로 저장
    ///
    /// 하나라도 실패하면 아무것도 저장되지 않습니다.
    pub fn save_extraction_results(
        &self,
        company: &str,
        year: i32,
        values: &[ExtractedValue],
    ) -> Result<usize> {
        let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let tx = conn.transaction().context("Failed to begin transaction")?;
        insert_values(&tx, company, year, values)?;
        tx.commit().context("Failed to commit extraction results")?;

        tracing::info!("Saved {} records for {} {}", values.len(), company, year);
        Ok(values.len())
    }

    /// 같은 회사/연도의 기존 결과를 지우고 새 결과 저장 (한 트랜잭션)
    ///
    /// 저장이 실패하면 기존 결과는 그대로 남습니다. 지운 개수를 반환합니다.
    pub fn replace_extraction_results(
        &self,
        company: &str,
        year: i32,
        values: &[ExtractedValue],
    ) -> Result<usize> {
        let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let tx = conn.transaction().context("Failed to begin transaction")?;
        let replaced = tx
            .execute(
                "DELETE FROM esg_indicators WHERE company = ?1 AND year = ?2",
                params![company, year],
            )
            .context("Failed to delete earlier records")?;
        insert_values(&tx, company, year, values)?;
        tx.commit().context("Failed to commit extraction results")?;

        tracing::info!(
            "Saved {} records for {} {} (replaced {})",
            values.len(),
            company,
            year,
            replaced
        );
        Ok(replaced)
    }

    /// 조건에 맞는 레코드 조회 (회사, 연도, 지표 순)
    pub fn get_records(&self, filter: &RecordFilter) -> Result<Vec<EsgRecord>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let (clause, values) = where_clause(filter);
        let sql = format!(
            "{}{} ORDER BY company, year, indicator, id",
            SELECT_COLUMNS, clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| {
            Ok(EsgRecord {
                id: row.get(0)?,
                company: row.get(1)?,
                year: row.get(2)?,
                indicator: row.get(3)?,
                value: row.get(4)?,
                numeric_value: row.get(5)?,
                unit: row.get(6)?,
                source_page: row.get(7)?,
                confidence: row.get(8)?,
                notes: row.get(9)?,
                source_text: row.get(10)?,
                extraction_method: row.get(11)?,
                created_at: parse_datetime(row.get::<_, String>(12)?),
                updated_at: parse_datetime(row.get::<_, String>(13)?),
            })
        })?;

        let records = rows
            .collect::<rusqlite::Result<Vec<EsgRecord>>>()
            .context("Failed to decode esg_indicators rows")?;
        Ok(records)
    }

    /// 회사/연도로 레코드 삭제, 삭제된 개수 반환
    ///
    /// 둘 다 None이면 전체 삭제.
    pub fn delete_records(&self, company: Option<&str>, year: Option<i32>) -> Result<usize> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let (clause, values) = where_clause(&RecordFilter::company_year(company, year));
        let sql = format!("DELETE FROM esg_indicators{}", clause);

        let count = conn
            .execute(&sql, params_from_iter(values))
            .context("Failed to delete records")?;

        tracing::info!("Deleted {} records", count);
        Ok(count)
    }

    /// 저장소 통계
    pub fn summary_stats(&self) -> Result<SummaryStats> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        let total_records = count("SELECT COUNT(*) FROM esg_indicators")?;
        let unique_companies = count("SELECT COUNT(DISTINCT company) FROM esg_indicators")?;
        let unique_years = count("SELECT COUNT(DISTINCT year) FROM esg_indicators")?;
        let unique_indicators = count("SELECT COUNT(DISTINCT indicator) FROM esg_indicators")?;

        let average: Option<f64> = conn.query_row(
            "SELECT AVG(confidence) FROM esg_indicators WHERE confidence > 0",
            [],
            |row| row.get(0),
        )?;

        Ok(SummaryStats {
            total_records,
            unique_companies,
            unique_years,
            unique_indicators,
            average_confidence: (average.unwrap_or(0.0) * 100.0).round() / 100.0,
            db_path: self.db_path.clone(),
        })
    }

    /// CSV 내보내기, 내보낸 레코드 수 반환
    pub fn export_to_csv(
        &self,
        output_path: &Path,
        company: Option<&str>,
        year: Option<i32>,
    ) -> Result<usize> {
        let records = self.get_records(&RecordFilter::company_year(company, year))?;

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let mut writer = csv::Writer::from_path(output_path)
            .with_context(|| format!("Failed to create {}", output_path.display()))?;

        for record in &records {
            writer.serialize(CsvRow {
                company: &record.company,
                year: record.year,
                indicator: &record.indicator,
                value: record.value.as_deref(),
                numeric_value: record.numeric_value,
                unit: record.unit.as_deref(),
                source_page: record.source_page,
                confidence: record.confidence,
                notes: record.notes.as_deref(),
            })?;
        }
        writer.flush().context("Failed to flush CSV writer")?;

        tracing::info!("Exported {} records to {:?}", records.len(), output_path);
        Ok(records.len())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 열린 트랜잭션 안에서 값 삽입 (commit은 호출자 몫)
fn insert_values(
    tx: &Transaction<'_>,
    company: &str,
    year: i32,
    values: &[ExtractedValue],
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let mut stmt = tx.prepare(
        "INSERT INTO esg_indicators (
            company, year, indicator, value, numeric_value, unit, source_page,
            confidence, notes, source_text, extraction_method, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
    )?;

    for value in values {
        stmt.execute(params![
            company,
            year,
            value.indicator_code,
            value.value,
            value.numeric_value,
            value.unit,
            value.source_page,
            value.confidence,
            value.explanation,
            value.source_text,
            value.extraction_method.map(|m| m.as_str()),
            now,
        ])
        .with_context(|| format!("Failed to insert {}", value.indicator_code))?;
    }

    Ok(())
}

/// 필터를 WHERE 절과 바인딩 값으로 변환
fn where_clause(filter: &RecordFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(company) = &filter.company {
        values.push(Value::Text(company.clone()));
        conditions.push(format!("company = ?{}", values.len()));
    }
    if let Some(year) = filter.year {
        values.push(Value::Integer(year as i64));
        conditions.push(format!("year = ?{}", values.len()));
    }
    if let Some(indicator) = &filter.indicator {
        values.push(Value::Text(indicator.clone()));
        conditions.push(format!("indicator = ?{}", values.len()));
    }
    if let Some(min) = filter.min_confidence {
        values.push(Value::Real(min));
        conditions.push(format!("confidence >= ?{}", values.len()));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// Tests
// ============================================================================
