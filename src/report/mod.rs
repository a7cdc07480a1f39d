//! 리포트 모듈 - 텍스트 품질 리포트, JSON 내보내기, CSV 병합, 대상 은행 정보
//!
//! 출력 파일 이름 규칙: `<Company>_<Year>_esg_data.csv`, `<Company>_<Year>_report.txt`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use walkdir::WalkDir;

use crate::extract::QualityMetrics;
use crate::indicators::ExtractedValue;

/// 리포트에서 ✓ 로 표시할 최소 신뢰도 (초과)
const CHECK_THRESHOLD: f64 = 0.5;

/// 실행별 CSV 파일명 접미사
const RUN_CSV_SUFFIX: &str = "_esg_data.csv";

/// 회사명에서 제거할 법인 접미사
const COMPANY_SUFFIXES: [&str; 6] = [" plc", " PLC", " Ltd", " Limited", " Inc.", " Corporation"];

// ============================================================================
// Formatting
// ============================================================================

/// 천 단위 구분자를 넣어 숫자 포맷 (None → "N/A")
pub fn format_number(value: Option<f64>, decimals: usize) -> String {
    let Some(value) = value else {
        return "N/A".to_string();
    };
    if !value.is_finite() {
        return value.to_string();
    }

    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };

    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

/// 법인 접미사를 제거한 회사명
pub fn normalize_company_name(name: &str) -> String {
    let mut normalized = name.trim().to_string();
    for suffix in COMPANY_SUFFIXES {
        normalized = normalized.replace(suffix, "");
    }
    normalized.trim().to_string()
}

/// 출력 파일 이름 앞부분 (공백 → `_`)
pub fn output_stem(company: &str, year: i32) -> String {
    format!("{}_{}", company.trim().replace(' ', "_"), year)
}

pub fn csv_output_path(outputs_dir: &Path, company: &str, year: i32) -> PathBuf {
    outputs_dir.join(format!("{}{}", output_stem(company, year), RUN_CSV_SUFFIX))
}

pub fn report_output_path(outputs_dir: &Path, company: &str, year: i32) -> PathBuf {
    outputs_dir.join(format!("{}_report.txt", output_stem(company, year)))
}

pub fn json_output_path(outputs_dir: &Path, company: &str, year: i32) -> PathBuf {
    outputs_dir.join(format!("{}_run.json", output_stem(company, year)))
}

// ============================================================================
// Extraction Report
// ============================================================================

/// 텍스트 품질 리포트 생성, `output_path`가 있으면 파일로도 저장
///
/// 지표 코드의 `-` 앞부분(E1, S1, G1 ...)으로 묶어 정렬합니다.
pub fn create_extraction_report(
    company: &str,
    year: i32,
    values: &[ExtractedValue],
    output_path: Option<&Path>,
) -> Result<String> {
    let quality = QualityMetrics::from_values(values);
    let heavy = "=".repeat(80);
    let light = "-".repeat(80);

    let mut lines = vec![
        heavy.clone(),
        "ESG DATA EXTRACTION REPORT".to_string(),
        heavy.clone(),
        format!("Company: {}", company),
        format!("Report Year: {}", year),
        format!("Extraction Date: {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
        String::new(),
        "QUALITY METRICS".to_string(),
        light.clone(),
        format!("Total Indicators: {}", quality.total),
        format!("Successfully Extracted: {}", quality.found),
        format!("Not Found: {}", quality.not_found),
        format!("Coverage: {:.1}%", quality.coverage * 100.0),
        format!("Average Confidence: {:.2}", quality.avg_confidence),
        format!("Overall Quality Score: {:.2}", quality.quality_score),
        String::new(),
        "DETAILED RESULTS".to_string(),
        light,
    ];

    let mut by_category: BTreeMap<&str, Vec<&ExtractedValue>> = BTreeMap::new();
    for value in values {
        let category = value
            .indicator_code
            .split('-')
            .next()
            .unwrap_or(&value.indicator_code);
        by_category.entry(category).or_default().push(value);
    }

    for (category, group) in by_category {
        lines.push(format!("\n{} Indicators:", category));
        lines.push("-".repeat(40));

        for value in group {
            let status = if value.confidence > CHECK_THRESHOLD { "✓" } else { "✗" };
            lines.push(format!(
                "{} {}: {} ({:.2})",
                status,
                value.indicator_code,
                value.value.as_deref().unwrap_or("Not found"),
                value.confidence
            ));
        }
    }

    lines.push(format!("\n{}", heavy));
    let report = lines.join("\n");

    if let Some(path) = output_path {
        ensure_parent(path)?;
        std::fs::write(path, &report)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        tracing::info!("Report saved to {:?}", path);
    }

    Ok(report)
}

// ============================================================================
// JSON Export
// ============================================================================

/// 직렬화 가능한 값을 JSON 파일로 저장
pub fn export_to_json<T: Serialize + ?Sized>(data: &T, output_path: &Path, pretty: bool) -> Result<PathBuf> {
    ensure_parent(output_path)?;

    let json = if pretty {
        serde_json::to_string_pretty(data)
    } else {
        serde_json::to_string(data)
    }
    .context("Failed to serialize JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON: {}", output_path.display()))?;

    tracing::info!("Exported JSON to {:?}", output_path);
    Ok(output_path.to_path_buf())
}

// ============================================================================
// CSV Merge
// ============================================================================

/// 여러 CSV를 하나로 병합
///
/// 헤더는 처음 등장한 순서로 합치고(중복 제거), 해당 열이 없는 파일의 칸은 비워 둡니다.
/// 없는 파일은 경고 후 건너뛰며, 읽을 파일이 하나도 없으면 에러입니다.
/// 반환값은 병합된 데이터 행 수입니다.
pub fn merge_csv_files(csv_paths: &[PathBuf], output_path: &Path) -> Result<usize> {
    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<BTreeMap<String, String>> = Vec::new();
    let mut merged_files = 0;

    for path in csv_paths {
        if !path.exists() {
            tracing::warn!("CSV file not found: {:?}", path);
            continue;
        }

        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open CSV: {}", path.display()))?;
        let file_headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("Failed to read CSV header: {}", path.display()))?
            .iter()
            .map(str::to_string)
            .collect();

        for header in &file_headers {
            if !headers.contains(header) {
                headers.push(header.clone());
            }
        }

        for record in reader.records() {
            let record = record.with_context(|| format!("Malformed CSV row in {}", path.display()))?;
            rows.push(
                file_headers
                    .iter()
                    .cloned()
                    .zip(record.iter().map(str::to_string))
                    .collect(),
            );
        }
        merged_files += 1;
    }

    if merged_files == 0 {
        anyhow::bail!("No valid CSV files found");
    }

    ensure_parent(output_path)?;
    let mut writer = csv::Writer::from_path(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    writer.write_record(&headers)?;
    for row in &rows {
        writer.write_record(
            headers
                .iter()
                .map(|h| row.get(h).map(String::as_str).unwrap_or("")),
        )?;
    }
    writer.flush().context("Failed to flush CSV writer")?;

    tracing::info!("Merged {} CSV files into {:?}", merged_files, output_path);
    Ok(rows.len())
}

/// 출력 폴더의 실행별 CSV (`*_esg_data.csv`, 파일명 순)
pub fn find_run_csvs(outputs_dir: &Path) -> Result<Vec<PathBuf>> {
    if !outputs_dir.is_dir() {
        anyhow::bail!("Outputs directory not found: {:?}", outputs_dir);
    }

    Ok(WalkDir::new(outputs_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().ends_with(RUN_CSV_SUFFIX))
        .map(|e| e.into_path())
        .collect())
}

// ============================================================================
// Companies
// ============================================================================

/// 대상 은행의 보고서 입수 정보
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompanyInfo {
    /// 파일명에 쓰는 약칭 (`AIB_2024.pdf`)
    pub code: &'static str,
    pub name: &'static str,
    pub website: &'static str,
    /// 웹사이트에서 연차 보고서까지의 경로
    pub report_location: &'static str,
}

const COMPANIES: [CompanyInfo; 3] = [
    CompanyInfo {
        code: "AIB",
        name: "Allied Irish Banks",
        website: "https://www.aib.ie",
        report_location: "Investor Relations → Reports & Presentations → Annual Report 2024",
    },
    CompanyInfo {
        code: "BBVA",
        name: "BBVA",
        website: "https://shareholdersandinvestors.bbva.com",
        report_location: "Reports → Annual Reports → 2024 Management Report",
    },
    CompanyInfo {
        code: "BPCE",
        name: "Groupe BPCE",
        website: "https://www.groupebpce.com",
        report_location: "Publications → Universal registration documents",
    },
];

/// 대상 은행 목록
pub fn company_info() -> &'static [CompanyInfo] {
    &COMPANIES
}

/// 약칭 또는 이름으로 조회 (대소문자 무시)
pub fn find_company(query: &str) -> Option<&'static CompanyInfo> {
    let query = query.trim();
    COMPANIES
        .iter()
        .find(|c| c.code.eq_ignore_ascii_case(query) || c.name.eq_ignore_ascii_case(query))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn value(code: &str, raw: Option<&str>, confidence: f64) -> ExtractedValue {
        let mut v = ExtractedValue::empty(code);
        v.value = raw.map(str::to_string);
        v.confidence = confidence;
        v
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(None, 2), "N/A");
        assert_eq!(format_number(Some(1234567.891), 2), "1,234,567.89");
        assert_eq!(format_number(Some(999.0), 0), "999");
        assert_eq!(format_number(Some(1000.0), 0), "1,000");
        assert_eq!(format_number(Some(-45210.5), 1), "-45,210.5");
        assert_eq!(format_number(Some(0.5), 2), "0.50");
        assert_eq!(format_number(Some(-0.001), 2), "0.00");
    }

    #[test]
    fn test_normalize_company_name() {
        assert_eq!(normalize_company_name("  Barclays PLC "), "Barclays");
        assert_eq!(normalize_company_name("HSBC Holdings plc"), "HSBC Holdings");
        assert_eq!(normalize_company_name("Acme Inc."), "Acme");
        assert_eq!(normalize_company_name("Allied Irish Banks"), "Allied Irish Banks");
    }

    #[test]
    fn test_output_paths() {
        let dir = Path::new("outputs");
        assert_eq!(
            csv_output_path(dir, "Allied Irish Banks", 2024),
            dir.join("Allied_Irish_Banks_2024_esg_data.csv")
        );
        assert_eq!(
            report_output_path(dir, "AIB", 2024),
            dir.join("AIB_2024_report.txt")
        );
    }

    #[test]
    fn test_report_groups_by_category() {
        let values = vec![
            value("S1-1", Some("12,000"), 0.8),
            value("E1-2", None, 0.0),
            value("E1-1", Some("1,234"), 0.9),
            value("G1-1", Some("40%"), 0.5),
        ];
        let report = create_extraction_report("Barclays", 2024, &values, None).unwrap();

        assert!(report.contains("Company: Barclays"));
        assert!(report.contains("Report Year: 2024"));
        assert!(report.contains("Total Indicators: 4"));
        assert!(report.contains("Successfully Extracted: 3"));
        assert!(report.contains("Coverage: 75.0%"));

        let e = report.find("E1 Indicators:").unwrap();
        let g = report.find("G1 Indicators:").unwrap();
        let s = report.find("S1 Indicators:").unwrap();
        assert!(e < g && g < s);

        // 카테고리 안에서는 입력 순서 유지
        assert!(report.find("E1-2").unwrap() < report.find("E1-1:").unwrap());

        assert!(report.contains("✓ E1-1: 1,234 (0.90)"));
        assert!(report.contains("✗ E1-2: Not found (0.00)"));
        assert!(report.contains("✗ G1-1: 40% (0.50)"));
    }

    #[test]
    fn test_report_written_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("outputs").join("AIB_2024_report.txt");

        let report =
            create_extraction_report("AIB", 2024, &[value("E1-1", Some("1"), 0.7)], Some(&path))
                .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), report);
    }

    #[test]
    fn test_export_to_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.json");
        let values = vec![value("E1-1", Some("1,234"), 0.9)];

        export_to_json(&values, &path, true).unwrap();

        let parsed: Vec<ExtractedValue> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, values);
    }

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_merge_csv_files() {
        let dir = TempDir::new().unwrap();
        let aib = write_csv(
            &dir,
            "AIB_2024_esg_data.csv",
            "company,year,indicator,value\nAIB,2024,E1-1,\"1,234\"\nAIB,2024,S1-1,9800\n",
        );
        let bbva = write_csv(
            &dir,
            "BBVA_2024_esg_data.csv",
            "company,year,indicator,value\nBBVA,2024,E1-1,560\n",
        );
        let output = dir.path().join("merged").join("all.csv");

        let rows = merge_csv_files(&[aib, dir.path().join("missing.csv"), bbva], &output).unwrap();
        assert_eq!(rows, 3);

        let content = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "company,year,indicator,value",
                "AIB,2024,E1-1,\"1,234\"",
                "AIB,2024,S1-1,9800",
                "BBVA,2024,E1-1,560",
            ]
        );
    }

    #[test]
    fn test_merge_aligns_columns_by_name() {
        let dir = TempDir::new().unwrap();
        let a = write_csv(&dir, "a.csv", "company,indicator,value\nAIB,E1-1,1\n");
        let b = write_csv(&dir, "b.csv", "indicator,company,notes\nG1-1,BPCE,estimated\n");
        // 헤더도 행도 없는 빈 파일
        let empty = write_csv(&dir, "empty.csv", "");
        let output = dir.path().join("all.csv");

        assert_eq!(merge_csv_files(&[a, b, empty], &output).unwrap(), 2);

        let content = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec!["company,indicator,value,notes", "AIB,E1-1,1,", "BPCE,G1-1,,estimated"]
        );
    }

    #[test]
    fn test_find_run_csvs() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "BBVA_2024_esg_data.csv", "a\n");
        write_csv(&dir, "AIB_2024_esg_data.csv", "a\n");
        write_csv(&dir, "AIB_2024_report.txt", "x");
        std::fs::create_dir(dir.path().join("old")).unwrap();
        std::fs::write(dir.path().join("old/BPCE_2023_esg_data.csv"), "a\n").unwrap();

        let found = find_run_csvs(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![
                dir.path().join("AIB_2024_esg_data.csv"),
                dir.path().join("BBVA_2024_esg_data.csv"),
            ]
        );
        assert!(find_run_csvs(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_merge_without_valid_files_fails() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("all.csv");

        let err = merge_csv_files(&[dir.path().join("nope.csv")], &output).unwrap_err();
        assert!(err.to_string().contains("No valid CSV files found"));
        assert!(merge_csv_files(&[], &output).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_company_info() {
        let codes: Vec<&str> = company_info().iter().map(|c| c.code).collect();
        assert_eq!(codes, vec!["AIB", "BBVA", "BPCE"]);

        assert_eq!(find_company("aib").map(|c| c.name), Some("Allied Irish Banks"));
        assert_eq!(
            find_company("Groupe BPCE").map(|c| c.website),
            Some("https://www.groupebpce.com")
        );
        assert!(find_company("Barclays").is_none());
    }
}
