//! ESG 지표 카탈로그 및 추출 결과 타입
//!
//! ESRS E1 (기후), S1 (자사 인력), G1 (거버넌스), ESRS 2 기준 20개 지표를 정의합니다.

use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Category
// ============================================================================

/// ESG 카테고리
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EsgCategory {
    #[serde(rename = "E")]
    Environmental,
    #[serde(rename = "S")]
    Social,
    #[serde(rename = "G")]
    Governance,
    #[serde(rename = "ESRS2")]
    Esrs2,
}

impl EsgCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EsgCategory::Environmental => "E",
            EsgCategory::Social => "S",
            EsgCategory::Governance => "G",
            EsgCategory::Esrs2 => "ESRS2",
        }
    }

    /// "E", "s", "esrs2" 등에서 파싱
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "E" | "ENVIRONMENTAL" => Some(EsgCategory::Environmental),
            "S" | "SOCIAL" => Some(EsgCategory::Social),
            "G" | "GOVERNANCE" => Some(EsgCategory::Governance),
            "ESRS2" => Some(EsgCategory::Esrs2),
            _ => None,
        }
    }
}

impl fmt::Display for EsgCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Indicator
// ============================================================================

/// 추출 대상 ESG 지표 정의
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Indicator {
    pub code: &'static str,
    pub name: &'static str,
    pub category: EsgCategory,
    pub description: &'static str,
    pub expected_unit: &'static str,
    pub keywords: &'static [&'static str],
}

impl Indicator {
    /// 벡터 검색용 질의문
    ///
    /// 이름, 설명, 키워드를 한 문장으로 합칩니다.
    pub fn search_query(&self) -> String {
        format!(
            "{}. {}. Keywords: {}",
            self.name,
            self.description,
            self.keywords.join(", ")
        )
    }
}

const ESG_INDICATORS: [Indicator; 20] = [
    // E1 - Climate Change
    Indicator {
        code: "E1-1",
        name: "Total Scope 1 GHG Emissions",
        category: EsgCategory::Environmental,
        description: "Direct greenhouse gas emissions from owned or controlled sources",
        expected_unit: "tCO2e",
        keywords: &["scope 1", "direct emissions", "GHG", "greenhouse gas", "tCO2e"],
    },
    Indicator {
        code: "E1-2",
        name: "Total Scope 2 GHG Emissions",
        category: EsgCategory::Environmental,
        description: "Indirect GHG emissions from purchased electricity, heat, or steam",
        expected_unit: "tCO2e",
        keywords: &["scope 2", "indirect emissions", "electricity", "purchased energy", "tCO2e"],
    },
    Indicator {
        code: "E1-3",
        name: "Total Scope 3 GHG Emissions",
        category: EsgCategory::Environmental,
        description: "All other indirect emissions in the value chain",
        expected_unit: "tCO2e",
        keywords: &["scope 3", "value chain", "indirect emissions", "financed emissions", "tCO2e"],
    },
    Indicator {
        code: "E1-4",
        name: "GHG Emissions Intensity",
        category: EsgCategory::Environmental,
        description: "GHG emissions per million euros of revenue",
        expected_unit: "tCO2e per €M revenue",
        keywords: &["emissions intensity", "carbon intensity", "tCO2e per", "emissions per revenue"],
    },
    Indicator {
        code: "E1-5",
        name: "Total Energy Consumption",
        category: EsgCategory::Environmental,
        description: "Total energy consumption from all sources",
        expected_unit: "MWh or GJ",
        keywords: &["energy consumption", "total energy", "energy use", "MWh", "GJ"],
    },
    Indicator {
        code: "E1-6",
        name: "Renewable Energy Percentage",
        category: EsgCategory::Environmental,
        description: "Percentage of energy from renewable sources",
        expected_unit: "%",
        keywords: &["renewable energy", "green energy", "renewable percentage", "renewable sources"],
    },
    Indicator {
        code: "E1-7",
        name: "Net Zero Target Year",
        category: EsgCategory::Environmental,
        description: "Target year for achieving net zero emissions",
        expected_unit: "year",
        keywords: &["net zero", "carbon neutral", "target year", "2030", "2040", "2050"],
    },
    Indicator {
        code: "E1-8",
        name: "Green Financing Volume",
        category: EsgCategory::Environmental,
        description: "Volume of green financing provided",
        expected_unit: "€ millions",
        keywords: &[
            "green financing",
            "sustainable finance",
            "green bonds",
            "climate finance",
            "€M",
            "million",
        ],
    },
    // S1 - Own Workforce
    Indicator {
        code: "S1-1",
        name: "Total Employees",
        category: EsgCategory::Social,
        description: "Total number of employees (full-time equivalent)",
        expected_unit: "FTE",
        keywords: &["workforce", "employees", "headcount", "staff", "FTE", "full-time equivalent"],
    },
    Indicator {
        code: "S1-2",
        name: "Female Employees",
        category: EsgCategory::Social,
        description: "Percentage of female employees",
        expected_unit: "%",
        keywords: &["female employees", "women", "gender diversity", "female representation"],
    },
    Indicator {
        code: "S1-3",
        name: "Gender Pay Gap",
        category: EsgCategory::Social,
        description: "Gender pay gap percentage",
        expected_unit: "%",
        keywords: &["gender pay gap", "pay gap", "wage gap", "equal pay"],
    },
    Indicator {
        code: "S1-4",
        name: "Training Hours per Employee",
        category: EsgCategory::Social,
        description: "Average training hours per employee per year",
        expected_unit: "hours",
        keywords: &["training hours", "development", "learning", "training per employee"],
    },
    Indicator {
        code: "S1-5",
        name: "Employee Turnover Rate",
        category: EsgCategory::Social,
        description: "Annual employee turnover rate",
        expected_unit: "%",
        keywords: &["turnover rate", "attrition", "employee retention", "turnover"],
    },
    Indicator {
        code: "S1-6",
        name: "Work-Related Accidents",
        category: EsgCategory::Social,
        description: "Number of work-related accidents",
        expected_unit: "count",
        keywords: &[
            "work-related accidents",
            "workplace accidents",
            "injuries",
            "incidents",
            "safety",
        ],
    },
    Indicator {
        code: "S1-7",
        name: "Collective Bargaining Coverage",
        category: EsgCategory::Social,
        description: "Percentage of employees covered by collective bargaining agreements",
        expected_unit: "%",
        keywords: &[
            "collective bargaining",
            "union coverage",
            "collective agreements",
            "trade union",
        ],
    },
    // G1 & ESRS 2 - Governance
    Indicator {
        code: "G1-1",
        name: "Board Female Representation",
        category: EsgCategory::Governance,
        description: "Percentage of women on the board",
        expected_unit: "%",
        keywords: &["women directors", "board diversity", "female board members", "women on board"],
    },
    Indicator {
        code: "G1-2",
        name: "Board Meetings",
        category: EsgCategory::Governance,
        description: "Number of board meetings held annually",
        expected_unit: "count/year",
        keywords: &["board meetings", "governance meetings", "meetings per year"],
    },
    Indicator {
        code: "G1-3",
        name: "Corruption Incidents",
        category: EsgCategory::Governance,
        description: "Number of corruption incidents reported",
        expected_unit: "count",
        keywords: &["corruption", "bribery", "anti-corruption", "corruption incidents", "fraud"],
    },
    Indicator {
        code: "G1-4",
        name: "Avg Payment Period to Suppliers",
        category: EsgCategory::Governance,
        description: "Average payment period to suppliers in days",
        expected_unit: "days",
        keywords: &["payment period", "supplier payment", "payment terms", "days payable"],
    },
    Indicator {
        code: "ESRS2-1",
        name: "Suppliers Screened for ESG",
        category: EsgCategory::Esrs2,
        description: "Percentage of suppliers screened for ESG criteria",
        expected_unit: "%",
        keywords: &[
            "supplier screening",
            "ESG screening",
            "supplier assessment",
            "supply chain ESG",
        ],
    },
];

/// 전체 지표 카탈로그
pub fn all_indicators() -> &'static [Indicator] {
    &ESG_INDICATORS
}

/// 코드로 지표 조회 (대소문자 무시)
pub fn get_indicator_by_code(code: &str) -> Option<&'static Indicator> {
    let code = code.trim();
    ESG_INDICATORS
        .iter()
        .find(|ind| ind.code.eq_ignore_ascii_case(code))
}

/// 카테고리별 지표 목록
pub fn get_indicators_by_category(category: EsgCategory) -> Vec<&'static Indicator> {
    ESG_INDICATORS
        .iter()
        .filter(|ind| ind.category == category)
        .collect()
}

/// 코드 목록을 지표로 변환
///
/// 빈 목록이면 전체 카탈로그를 반환합니다. 알 수 없는 코드가 있으면 에러.
pub fn resolve_indicators(codes: &[String]) -> Result<Vec<&'static Indicator>> {
    if codes.is_empty() {
        return Ok(ESG_INDICATORS.iter().collect());
    }

    codes
        .iter()
        .map(|code| {
            get_indicator_by_code(code)
                .ok_or_else(|| anyhow::anyhow!("Invalid indicator code: {}", code))
        })
        .collect()
}

// ============================================================================
// Extracted Value
// ============================================================================

/// 추출 방법
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    VectorSearch,
    VectorSearchFailed,
    Simple,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::VectorSearch => "vector_search",
            ExtractionMethod::VectorSearchFailed => "vector_search_failed",
            ExtractionMethod::Simple => "simple",
        }
    }
}

/// 보고서에서 추출한 지표 값
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedValue {
    pub indicator_code: String,
    pub value: Option<String>,
    pub numeric_value: Option<f64>,
    pub unit: Option<String>,
    pub source_page: Option<u32>,
    pub source_text: Option<String>,
    /// 0.0 ~ 1.0
    pub confidence: f64,
    pub explanation: Option<String>,
    pub extraction_method: Option<ExtractionMethod>,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractedValue {
    /// 값이 없는 빈 결과
    pub fn empty(indicator_code: impl Into<String>) -> Self {
        Self {
            indicator_code: indicator_code.into(),
            value: None,
            numeric_value: None,
            unit: None,
            source_page: None,
            source_text: None,
            confidence: 0.0,
            explanation: None,
            extraction_method: None,
            extracted_at: Utc::now(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_size_and_split() {
        assert_eq!(all_indicators().len(), 20);
        assert_eq!(get_indicators_by_category(EsgCategory::Environmental).len(), 8);
        assert_eq!(get_indicators_by_category(EsgCategory::Social).len(), 7);
        assert_eq!(get_indicators_by_category(EsgCategory::Governance).len(), 4);
        assert_eq!(get_indicators_by_category(EsgCategory::Esrs2).len(), 1);
    }

    #[test]
    fn test_codes_unique() {
        let mut codes: Vec<_> = all_indicators().iter().map(|i| i.code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 20);
    }

    #[test]
    fn test_get_indicator_by_code() {
        let ind = get_indicator_by_code("E1-1").unwrap();
        assert_eq!(ind.name, "Total Scope 1 GHG Emissions");
        assert_eq!(ind.expected_unit, "tCO2e");

        assert!(get_indicator_by_code("esrs2-1").is_some());
        assert!(get_indicator_by_code("X9-9").is_none());
    }

    #[test]
    fn test_resolve_indicators() {
        assert_eq!(resolve_indicators(&[]).unwrap().len(), 20);

        let picked = resolve_indicators(&["S1-1".to_string(), "G1-3".to_string()]).unwrap();
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[1].code, "G1-3");

        let err = resolve_indicators(&["E1-1".to_string(), "nope".to_string()]).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_search_query() {
        let ind = get_indicator_by_code("S1-3").unwrap();
        assert_eq!(
            ind.search_query(),
            "Gender Pay Gap. Gender pay gap percentage. Keywords: gender pay gap, pay gap, wage gap, equal pay"
        );
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(EsgCategory::parse("e"), Some(EsgCategory::Environmental));
        assert_eq!(EsgCategory::parse("ESRS2"), Some(EsgCategory::Esrs2));
        assert_eq!(EsgCategory::parse("x"), None);
    }

    #[test]
    fn test_method_serialization() {
        let json = serde_json::to_string(&ExtractionMethod::VectorSearchFailed).unwrap();
        assert_eq!(json, "\"vector_search_failed\"");
        assert_eq!(ExtractionMethod::Simple.as_str(), "simple");
    }
}
