//! CLI 모듈
//!
//! esg-extract CLI 명령어 정의 및 구현

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::document::{validate_report, PdfDocument};
use crate::embedding::{EmbeddingProvider, GeminiEmbedding};
use crate::extract::{
    discover_reports, ConfidenceBand, ExtractionMode, ExtractionRequest, ExtractionRun, Pipeline,
};
use crate::indicators::{all_indicators, get_indicators_by_category, resolve_indicators, EsgCategory};
use crate::knowledge::{ChunkConfig, EmbeddingCache, RecordFilter, ResultStore, VectorSearchEngine};
use crate::llm::{LlmClient, OpenRouterClient};
use crate::report::{
    company_info, create_extraction_report, csv_output_path, export_to_json, find_company,
    find_run_csvs, format_number, json_output_path, merge_csv_files, normalize_company_name,
    report_output_path,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "esg-extract")]
#[command(version, about = "지속가능성 보고서 ESG 지표 추출기", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 보고서 PDF 한 건에서 지표 추출
    Extract {
        /// 보고서 PDF 경로
        #[arg(short, long)]
        pdf: PathBuf,

        /// 회사명
        #[arg(short, long)]
        company: String,

        /// 보고 연도
        #[arg(short, long)]
        year: i32,

        /// 추출할 지표 코드 (쉼표 구분, 생략 시 전체)
        #[arg(short, long, value_delimiter = ',')]
        indicators: Vec<String>,

        /// 추출 방식 (fast | simple)
        #[arg(short, long, default_value = "fast")]
        mode: ExtractionMode,

        /// CSV 출력 경로 (기본: outputs/<Company>_<Year>_esg_data.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 실행 결과를 JSON으로도 저장
        #[arg(long)]
        json: bool,

        /// 임베딩 캐시 무시하고 재인덱싱
        #[arg(long)]
        force: bool,
    },

    /// 폴더 안의 모든 보고서 추출 (<Company>_<Year>.pdf)
    Batch {
        /// 보고서 폴더 (기본: reports/)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// 파일명에 연도가 없을 때 사용할 연도
        #[arg(short, long)]
        year: Option<i32>,

        /// 추출할 지표 코드 (쉼표 구분, 생략 시 전체)
        #[arg(short, long, value_delimiter = ',')]
        indicators: Vec<String>,

        /// 추출 방식 (fast | simple)
        #[arg(short, long, default_value = "fast")]
        mode: ExtractionMode,

        /// 임베딩 캐시 무시하고 재인덱싱
        #[arg(long)]
        force: bool,
    },

    /// 보고서 벡터 검색
    Search {
        /// 보고서 PDF 경로
        #[arg(short, long)]
        pdf: PathBuf,

        /// 검색 쿼리
        query: String,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// 임베딩 캐시 무시하고 재인덱싱
        #[arg(long)]
        force: bool,
    },

    /// 지표 카탈로그
    Indicators {
        /// 카테고리 필터 (E, S, G, ESRS2)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// 저장된 추출 결과 조회
    Records {
        #[arg(short, long)]
        company: Option<String>,

        #[arg(short, long)]
        year: Option<i32>,

        #[arg(short, long)]
        indicator: Option<String>,

        /// 최소 신뢰도
        #[arg(long)]
        min_confidence: Option<f64>,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// 저장된 추출 결과를 CSV로 내보내기
    Export {
        /// CSV 출력 경로
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long)]
        company: Option<String>,

        #[arg(short, long)]
        year: Option<i32>,
    },

    /// 저장된 추출 결과 삭제
    Delete {
        #[arg(short, long)]
        company: Option<String>,

        #[arg(short, long)]
        year: Option<i32>,

        /// 전체 삭제
        #[arg(long)]
        all: bool,
    },

    /// 실행별 CSV 병합 (입력 생략 시 outputs/*_esg_data.csv)
    Merge {
        /// 병합할 CSV 파일
        inputs: Vec<PathBuf>,

        /// 병합 CSV 출력 경로
        #[arg(short, long)]
        output: PathBuf,
    },

    /// 대상 은행과 보고서 입수 경로
    Companies {
        /// 약칭 또는 회사명
        name: Option<String>,
    },

    /// 보고서 PDF가 추출에 적합한지 검사
    Validate {
        /// 보고서 PDF 경로
        pdf: PathBuf,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli, settings: Settings) -> Result<()> {
    match cli.command {
        Commands::Extract {
            pdf,
            company,
            year,
            indicators,
            mode,
            output,
            json,
            force,
        } => {
            let request = ExtractionRequest {
                pdf_path: pdf,
                company: normalize_company_name(&company),
                year,
                indicators: resolve_indicators(&indicators)?,
                mode,
                force_reindex: force,
            };
            cmd_extract(&settings, request, output, json).await
        }
        Commands::Batch {
            dir,
            year,
            indicators,
            mode,
            force,
        } => cmd_batch(&settings, dir, year, &indicators, mode, force).await,
        Commands::Search {
            pdf,
            query,
            limit,
            force,
        } => cmd_search(&settings, &pdf, &query, limit, force).await,
        Commands::Indicators { category } => cmd_indicators(category.as_deref()),
        Commands::Records {
            company,
            year,
            indicator,
            min_confidence,
            limit,
        } => {
            let filter = RecordFilter {
                company,
                year,
                indicator,
                min_confidence,
            };
            cmd_records(&settings, &filter, limit)
        }
        Commands::Export {
            output,
            company,
            year,
        } => cmd_export(&settings, &output, company.as_deref(), year),
        Commands::Delete { company, year, all } => {
            cmd_delete(&settings, company.as_deref(), year, all)
        }
        Commands::Merge { inputs, output } => cmd_merge(&settings, inputs, &output),
        Commands::Companies { name } => cmd_companies(name.as_deref()),
        Commands::Validate { pdf } => cmd_validate(&pdf).await,
        Commands::Status => cmd_status(&settings),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 추출 명령어 (extract)
///
/// 보고서 한 건을 추출하고 DB 저장, CSV, 텍스트 리포트를 만듭니다.
async fn cmd_extract(
    settings: &Settings,
    request: ExtractionRequest,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    settings.ensure_dirs()?;
    let pipeline = build_pipeline(settings, request.mode)?;
    let store = ResultStore::open(&settings.database_path).context("ResultStore 열기 실패")?;

    println!(
        "[*] 추출 시작: {} {} ({} 모드, 지표 {} 개)",
        request.company,
        request.year,
        request.mode,
        request.indicators.len()
    );
    println!("    PDF: {}", request.pdf_path.display());

    let run = pipeline
        .run_extraction(&request)
        .await
        .context("추출 실패")?;

    println!();
    print_values(&run);

    let csv_path = output
        .unwrap_or_else(|| csv_output_path(&settings.outputs_dir, &run.company, run.year));
    let report_path = save_run_outputs(settings, &store, &run, &csv_path)?;

    if json {
        let json_path = json_output_path(&settings.outputs_dir, &run.company, run.year);
        export_to_json(&run, &json_path, true)?;
        println!("     JSON: {}", json_path.display());
    }

    println!();
    print_quality(&run);
    println!("     CSV: {}", csv_path.display());
    println!("     리포트: {}", report_path.display());

    if !run.errors.is_empty() {
        println!();
        println!("[!] 지표별 오류 {} 건:", run.errors.len());
        for error in &run.errors {
            println!("    - {}", truncate_text(error, 120));
        }
    }

    Ok(())
}

/// 일괄 추출 명령어 (batch)
///
/// 한 보고서가 실패해도 나머지는 계속 처리합니다.
async fn cmd_batch(
    settings: &Settings,
    dir: Option<PathBuf>,
    year: Option<i32>,
    indicators: &[String],
    mode: ExtractionMode,
    force: bool,
) -> Result<()> {
    settings.ensure_dirs()?;
    let dir = dir.unwrap_or_else(|| settings.reports_dir.clone());
    let indicators = resolve_indicators(indicators)?;

    let reports = discover_reports(&dir, year)?;
    if reports.is_empty() {
        println!("[!] 처리할 보고서가 없습니다: {}", dir.display());
        println!("    파일명 형식: <Company>_<Year>.pdf (연도가 없으면 --year 지정)");
        return Ok(());
    }

    let pipeline = build_pipeline(settings, mode)?;
    let store = ResultStore::open(&settings.database_path).context("ResultStore 열기 실패")?;

    println!("[*] 보고서 {} 건 ({} 모드)", reports.len(), mode);
    println!();

    let mut success_count = 0;
    let mut error_count = 0;

    for (i, report) in reports.iter().enumerate() {
        let company = normalize_company_name(&report.company);
        println!("[{}/{}] {} {}", i + 1, reports.len(), company, report.year);

        let request = ExtractionRequest {
            pdf_path: report.path.clone(),
            company,
            year: report.year,
            indicators: indicators.clone(),
            mode,
            force_reindex: force,
        };

        let run = match pipeline.run_extraction(&request).await {
            Ok(run) => run,
            Err(e) => {
                println!("    실패: {:#}", e);
                error_count += 1;
                continue;
            }
        };

        let csv_path = csv_output_path(&settings.outputs_dir, &run.company, run.year);
        match save_run_outputs(settings, &store, &run, &csv_path) {
            Ok(_) => {
                let quality = run.quality();
                println!(
                    "    완료: {}/{} 추출, 품질 {:.2} ({:.1}초)",
                    quality.found, quality.total, quality.quality_score, run.processing_time_secs
                );
                success_count += 1;
            }
            Err(e) => {
                println!("    저장 실패: {:#}", e);
                error_count += 1;
            }
        }
    }

    let combined = settings.outputs_dir.join("all_reports_combined.csv");
    let exported = store.export_to_csv(&combined, None, year)?;

    println!();
    println!("[OK] 완료: 성공 {}, 실패 {}", success_count, error_count);
    println!("     통합 CSV: {} ({} 행)", combined.display(), exported);

    Ok(())
}

/// 벡터 검색 명령어 (search)
///
/// 보고서를 인덱싱(또는 캐시 로드)한 뒤 쿼리와 가까운 청크를 보여줍니다.
async fn cmd_search(
    settings: &Settings,
    pdf: &Path,
    query: &str,
    limit: usize,
    force: bool,
) -> Result<()> {
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(GeminiEmbedding::from_settings(settings).context(
            "벡터 검색에는 GEMINI_API_KEY (또는 GOOGLE_AI_API_KEY)가 필요합니다",
        )?);

    let document = PdfDocument::open(pdf).await.context("PDF 로드 실패")?;
    let cache = EmbeddingCache::open(&settings.cache_dir)?;
    let mut engine = VectorSearchEngine::new(embedder, cache);

    println!("[*] 인덱싱 중: {} ({} 페이지)", pdf.display(), document.page_count());
    let stats = engine
        .index_document(
            &document.key(),
            document.pages(),
            &ChunkConfig::for_vector_index(),
            force,
        )
        .await
        .context("인덱싱 실패")?;
    println!(
        "    청크 {} 개 ({})",
        stats.chunk_count,
        if stats.from_cache { "캐시" } else { "새로 생성" }
    );

    println!("[*] 검색 중: \"{}\"", query);
    let hits = engine.search(query, limit).await.context("검색 실패")?;

    if hits.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [점수: {:.4}] 페이지 {}", i + 1, hit.score, hit.page);
        println!("   내용: {}", truncate_text(&hit.text, 200));
        println!();
    }

    Ok(())
}

/// 지표 목록 명령어 (indicators)
fn cmd_indicators(category: Option<&str>) -> Result<()> {
    let indicators: Vec<_> = match category {
        Some(raw) => {
            let category = EsgCategory::parse(raw)
                .ok_or_else(|| anyhow::anyhow!("알 수 없는 카테고리: {} (E, S, G, ESRS2)", raw))?;
            get_indicators_by_category(category)
        }
        None => all_indicators().iter().collect(),
    };

    println!("[OK] ESG 지표 ({} 개):\n", indicators.len());
    for indicator in indicators {
        println!(
            "  {:<8} [{}] {} ({})",
            indicator.code, indicator.category, indicator.name, indicator.expected_unit
        );
        println!("           {}", truncate_text(indicator.description, 80));
    }

    Ok(())
}

/// 결과 조회 명령어 (records)
fn cmd_records(settings: &Settings, filter: &RecordFilter, limit: usize) -> Result<()> {
    let store = ResultStore::open(&settings.database_path).context("ResultStore 열기 실패")?;
    let records = store.get_records(filter).context("결과 조회 실패")?;

    if records.is_empty() {
        println!("[!] 저장된 결과가 없습니다.");
        return Ok(());
    }

    println!("[OK] 저장된 결과 ({} 건):\n", records.len());

    for record in records.iter().take(limit) {
        let page = record
            .source_page
            .map(|p| format!("p.{}", p))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "  #{:<5} {} {} {:<8} {} {}",
            record.id,
            record.company,
            record.year,
            record.indicator,
            record.value.as_deref().map(|v| truncate_text(v, 40)).unwrap_or_else(|| "-".to_string()),
            record.unit.as_deref().unwrap_or("")
        );
        println!(
            "         {} | 신뢰도 {:.2} | {}",
            page,
            record.confidence,
            record.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    if records.len() > limit {
        println!("\n    ... 외 {} 건 (--limit 로 조정)", records.len() - limit);
    }

    Ok(())
}

/// CSV 내보내기 명령어 (export)
fn cmd_export(
    settings: &Settings,
    output: &Path,
    company: Option<&str>,
    year: Option<i32>,
) -> Result<()> {
    let store = ResultStore::open(&settings.database_path).context("ResultStore 열기 실패")?;
    let count = store
        .export_to_csv(output, company, year)
        .context("CSV 내보내기 실패")?;

    if count == 0 {
        println!("[!] 조건에 맞는 결과가 없습니다 (헤더만 저장됨)");
    }
    println!("[OK] {} 건 내보냄: {}", count, output.display());

    Ok(())
}

/// 병합 명령어 (merge)
fn cmd_merge(settings: &Settings, inputs: Vec<PathBuf>, output: &Path) -> Result<()> {
    let inputs = if inputs.is_empty() {
        find_run_csvs(&settings.outputs_dir)?
            .into_iter()
            .filter(|path| path != output)
            .collect()
    } else {
        inputs
    };

    if inputs.is_empty() {
        bail!(
            "병합할 CSV가 없습니다: {}",
            settings.outputs_dir.display()
        );
    }

    println!("[*] CSV {} 개 병합 중...", inputs.len());
    for path in inputs.iter().filter(|p| !p.exists()) {
        println!("[!] 파일 없음, 건너뜀: {}", path.display());
    }

    let rows = merge_csv_files(&inputs, output).context("CSV 병합 실패")?;
    println!("[OK] {} 행 병합: {}", rows, output.display());

    Ok(())
}

/// 대상 은행 명령어 (companies)
fn cmd_companies(name: Option<&str>) -> Result<()> {
    let companies = match name {
        Some(name) => vec![find_company(name)
            .ok_or_else(|| anyhow::anyhow!("알 수 없는 회사: {}", name))?],
        None => company_info().iter().collect(),
    };

    println!("[OK] 대상 은행 ({} 곳):\n", companies.len());
    for company in companies {
        println!("  {:<6} {}", company.code, company.name);
        println!("         {}", company.website);
        println!("         {}", company.report_location);
    }

    Ok(())
}

/// 삭제 명령어 (delete)
///
/// 실수로 전체를 지우지 않도록 조건이 없으면 --all 이 필요합니다.
fn cmd_delete(settings: &Settings, company: Option<&str>, year: Option<i32>, all: bool) -> Result<()> {
    if company.is_none() && year.is_none() && !all {
        bail!("--company, --year, --all 중 하나를 지정해야 합니다");
    }

    let store = ResultStore::open(&settings.database_path).context("ResultStore 열기 실패")?;
    let deleted = store
        .delete_records(company, year)
        .context("결과 삭제 실패")?;

    if deleted > 0 {
        println!("[OK] {} 건 삭제됨", deleted);
    } else {
        println!("[!] 삭제할 결과를 찾을 수 없습니다");
    }

    Ok(())
}

/// 검사 명령어 (validate)
async fn cmd_validate(pdf: &Path) -> Result<()> {
    println!("[*] 보고서 검사 중: {}", pdf.display());

    let validation = validate_report(pdf).await;

    if let Some(ref error) = validation.error {
        println!("[!] 검사 실패: {}", error);
        return Ok(());
    }

    if let Ok(metadata) = std::fs::metadata(pdf) {
        println!("    크기: {}", format_bytes(metadata.len() as usize));
    }
    if let Some(pages) = validation.total_pages {
        println!("    페이지: {}", pages);
    }
    println!("    텍스트: {}", if validation.has_text { "있음" } else { "없음" });

    if validation.valid {
        println!("[OK] 추출에 적합한 보고서입니다");
    } else {
        println!("[!] 추출 결과가 좋지 않을 수 있습니다");
        for warning in &validation.warnings {
            println!("    - {}", warning);
        }
    }

    Ok(())
}

/// 상태 명령어 (status)
///
/// 시스템 상태를 확인합니다.
fn cmd_status(settings: &Settings) -> Result<()> {
    println!("esg-extract v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", settings.data_dir.display());
    println!("[*] 보고서 폴더: {}", settings.reports_dir.display());
    println!("[*] 출력 폴더: {}", settings.outputs_dir.display());
    let vector = ChunkConfig::for_vector_index();
    let fallback = ChunkConfig::for_keyword_fallback();
    println!(
        "[*] 청크 fast {}/{} | simple {}/{} | 재시도 {}",
        vector.chunk_size,
        vector.chunk_overlap,
        fallback.chunk_size,
        fallback.chunk_overlap,
        settings.max_retries
    );

    // API 키 상태
    if settings.openrouter_api_key.is_some() {
        println!("[OK] OpenRouter API 키: 설정됨");
        println!("     모델: {}", settings.model_chain().join(" -> "));
    } else {
        println!("[!] OpenRouter API 키: 미설정");
        println!("    설정: export OPENROUTER_API_KEY=your-key");
    }

    if settings.gemini_api_key.is_some() {
        println!(
            "[OK] Gemini API 키: 설정됨 (임베딩 {} 차원)",
            settings.embedding_dimension
        );
    } else {
        println!("[!] Gemini API 키: 미설정 (simple 모드만 사용 가능)");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    // 임베딩 캐시
    let cached = std::fs::read_dir(&settings.cache_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.metadata().ok())
                .filter(|m| m.is_file())
                .fold((0usize, 0usize), |(count, bytes), m| (count + 1, bytes + m.len() as usize))
        })
        .unwrap_or((0, 0));
    println!(
        "[*] 임베딩 캐시: {} 개 ({})",
        cached.0,
        format_bytes(cached.1)
    );

    // 결과 통계
    match ResultStore::open(&settings.database_path) {
        Ok(store) => match store.summary_stats() {
            Ok(stats) => {
                println!("[OK] 저장된 결과: {} 건", stats.total_records);
                println!(
                    "     회사 {} | 연도 {} | 지표 {} | 평균 신뢰도 {:.2}",
                    stats.unique_companies,
                    stats.unique_years,
                    stats.unique_indicators,
                    stats.average_confidence
                );
                println!("     DB: {}", stats.db_path.display());
            }
            Err(e) => {
                println!("[!] 통계 조회 실패: {}", e);
            }
        },
        Err(e) => {
            println!("[!] ResultStore 열기 실패: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 모드에 맞는 파이프라인 구성
///
/// Fast 모드는 Gemini 키가 없으면 실패합니다.
fn build_pipeline(settings: &Settings, mode: ExtractionMode) -> Result<Pipeline> {
    let llm: Arc<dyn LlmClient> = Arc::new(
        OpenRouterClient::from_settings(settings).context(
            "OPENROUTER_API_KEY가 설정되지 않았습니다.\n\
             설정: export OPENROUTER_API_KEY=your-key\n\
             API 키 발급: https://openrouter.ai/keys",
        )?,
    );

    let embedder = match mode {
        ExtractionMode::Fast => {
            let gemini: Arc<dyn EmbeddingProvider> =
                Arc::new(GeminiEmbedding::from_settings(settings).context(
                    "fast 모드에는 GEMINI_API_KEY (또는 GOOGLE_AI_API_KEY)가 필요합니다.\n\
                     임베딩 없이 실행하려면 --mode simple 을 사용하세요",
                )?);
            Some(gemini)
        }
        ExtractionMode::Simple => None,
    };

    Ok(Pipeline::from_settings(settings, llm, embedder))
}

/// DB 저장 + CSV + 텍스트 리포트, 리포트 경로 반환
///
/// 같은 회사/연도의 이전 결과는 새 결과로 교체합니다.
fn save_run_outputs(
    settings: &Settings,
    store: &ResultStore,
    run: &ExtractionRun,
    csv_path: &Path,
) -> Result<PathBuf> {
    store
        .replace_extraction_results(&run.company, run.year, &run.values)
        .context("결과 저장 실패")?;
    store
        .export_to_csv(csv_path, Some(&run.company), Some(run.year))
        .context("CSV 내보내기 실패")?;

    let report_path = report_output_path(&settings.outputs_dir, &run.company, run.year);
    create_extraction_report(&run.company, run.year, &run.values, Some(&report_path))?;

    Ok(report_path)
}

/// 지표별 결과 출력
fn print_values(run: &ExtractionRun) {
    for value in &run.values {
        let status = if value.confidence > 0.5 { "✓" } else { "✗" };
        let shown = match (&value.value, value.numeric_value) {
            (Some(_), Some(n)) => format!(
                "{} {}",
                format_number(Some(n), if n.fract() == 0.0 { 0 } else { 2 }),
                value.unit.as_deref().unwrap_or("")
            ),
            (Some(raw), None) => truncate_text(raw, 40),
            (None, _) => "Not found".to_string(),
        };
        let page = value
            .source_page
            .map(|p| format!("p.{}", p))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "  {} {:<8} {} ({}, {:.2} {})",
            status,
            value.indicator_code,
            shown.trim_end(),
            page,
            value.confidence,
            ConfidenceBand::from_score(value.confidence).as_str()
        );
    }
}

/// 품질 요약 출력
fn print_quality(run: &ExtractionRun) {
    let quality = run.quality();
    println!(
        "[OK] 완료: {}/{} 추출 (커버리지 {:.1}%, 평균 신뢰도 {:.2}, 품질 {:.2})",
        quality.found,
        quality.total,
        quality.coverage * 100.0,
        quality.avg_confidence,
        quality.quality_score
    );
    println!("     처리 시간: {:.1}초", run.processing_time_secs);
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
