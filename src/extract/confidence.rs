//! 신뢰도 점수 처리 + 실행 단위 품질 지표

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::indicators::ExtractedValue;

/// 이 값을 넘으면 "추출됨"으로 집계
pub const FOUND_THRESHOLD: f64 = 0.3;

/// 파싱할 수 없는 신뢰도 값의 대체값
pub const UNPARSABLE_CONFIDENCE: f64 = 0.5;

/// [0, 1] 범위로 자르기 (NaN → 0)
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// 선두 10진수 + 선택적 `%`, 뒤에 문자나 숫자가 바로 붙으면 불일치
fn confidence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+(?:\.\d+)?)\s*(%)?(?:$|\W)").expect("Invalid regex"))
}

/// 모델이 쓴 신뢰도 문자열 파싱
///
/// `0.85`, `85%`, `0.9 (high)`, `0.9-1.0`(하한) 같은 형태를 받아들이고,
/// 평범한 10진수로 시작하지 않으면 (`high`, `1e-1`, `-0.2`) `UNPARSABLE_CONFIDENCE`.
pub fn parse_confidence(raw: &str) -> f64 {
    let raw = raw.trim().trim_start_matches('[').trim_end_matches(']').trim();

    let Some(caps) = confidence_pattern().captures(raw) else {
        return UNPARSABLE_CONFIDENCE;
    };
    let Ok(value) = caps[1].parse::<f64>() else {
        return UNPARSABLE_CONFIDENCE;
    };

    if caps.get(2).is_some() {
        clamp_confidence(value / 100.0)
    } else {
        clamp_confidence(value)
    }
}

/// JSON 응답의 confidence 필드 (숫자 또는 문자열)
pub fn confidence_from_json(value: Option<&serde_json::Value>) -> f64 {
    match value {
        Some(serde_json::Value::Number(n)) => clamp_confidence(n.as_f64().unwrap_or(0.0)),
        Some(serde_json::Value::String(s)) => parse_confidence(s),
        _ => 0.0,
    }
}

// ============================================================================
// Confidence Band
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    /// High > 0.7, Medium 0.4 ~ 0.7, Low < 0.4
    pub fn from_score(score: f64) -> Self {
        if score > 0.7 {
            ConfidenceBand::High
        } else if score >= 0.4 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::Low => "low",
        }
    }
}

// ============================================================================
// Quality Metrics
// ============================================================================

/// 실행 한 번의 품질 지표
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub total: usize,
    pub found: usize,
    pub not_found: usize,
    pub coverage: f64,
    /// 신뢰도 > 0 인 값들의 평균
    pub avg_confidence: f64,
    /// 0.6 × coverage + 0.4 × avg_confidence
    pub quality_score: f64,
}

impl QualityMetrics {
    pub fn from_values(values: &[ExtractedValue]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let total = values.len();
        let found = values
            .iter()
            .filter(|v| v.confidence > FOUND_THRESHOLD)
            .count();

        let positive: Vec<f64> = values
            .iter()
            .map(|v| v.confidence)
            .filter(|c| *c > 0.0)
            .collect();
        let avg_confidence = if positive.is_empty() {
            0.0
        } else {
            positive.iter().sum::<f64>() / positive.len() as f64
        };

        let coverage = found as f64 / total as f64;
        let quality_score = coverage * 0.6 + avg_confidence * 0.4;

        Self {
            total,
            found,
            not_found: total - found,
            coverage: round2(coverage),
            avg_confidence: round2(avg_confidence),
            quality_score: round2(quality_score),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn value(code: &str, confidence: f64) -> ExtractedValue {
        let mut v = ExtractedValue::empty(code);
        v.confidence = confidence;
        v
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp_confidence(1.7), 1.0);
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
        assert_eq!(clamp_confidence(0.42), 0.42);
    }

    #[test]
    fn test_parse_confidence() {
        assert_eq!(parse_confidence("0.85"), 0.85);
        assert_eq!(parse_confidence(" [0.9] "), 0.9);
        assert_eq!(parse_confidence("85%"), 0.85);
        assert_eq!(parse_confidence("0.9 (high)"), 0.9);
        assert_eq!(parse_confidence("2"), 1.0);
        assert_eq!(parse_confidence("high"), UNPARSABLE_CONFIDENCE);
        assert_eq!(parse_confidence(""), UNPARSABLE_CONFIDENCE);
    }

    #[test]
    fn test_parse_confidence_rejects_non_decimal_forms() {
        // 지수 표기는 앞의 "1"만 읽지 않음
        assert_eq!(parse_confidence("1e-1"), UNPARSABLE_CONFIDENCE);
        assert_eq!(parse_confidence("9e"), UNPARSABLE_CONFIDENCE);
        assert_eq!(parse_confidence("-0.2"), UNPARSABLE_CONFIDENCE);

        // 범위는 하한
        assert_eq!(parse_confidence("0.9-1.0"), 0.9);
        assert_eq!(parse_confidence("0.75, fairly sure"), 0.75);
        assert_eq!(parse_confidence("92 %"), 0.92);
    }

    #[test]
    fn test_confidence_from_json() {
        assert_eq!(confidence_from_json(Some(&serde_json::json!(0.75))), 0.75);
        assert_eq!(confidence_from_json(Some(&serde_json::json!("0.6"))), 0.6);
        assert_eq!(confidence_from_json(Some(&serde_json::json!(null))), 0.0);
        assert_eq!(confidence_from_json(None), 0.0);
    }

    #[test]
    fn test_bands() {
        assert_eq!(ConfidenceBand::from_score(0.71), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::from_score(0.7), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::from_score(0.4), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::from_score(0.39), ConfidenceBand::Low);
    }

    #[test]
    fn test_quality_metrics() {
        let values = vec![
            value("E1-1", 0.9),
            value("E1-2", 0.5),
            value("S1-1", 0.2),
            value("G1-1", 0.0),
        ];
        let metrics = QualityMetrics::from_values(&values);

        assert_eq!(metrics.total, 4);
        assert_eq!(metrics.found, 2);
        assert_eq!(metrics.not_found, 2);
        assert_eq!(metrics.coverage, 0.5);
        // (0.9 + 0.5 + 0.2) / 3
        assert_eq!(metrics.avg_confidence, 0.53);
        // 0.3 + 0.2133
        assert_eq!(metrics.quality_score, 0.51);
    }

    #[test]
    fn test_quality_metrics_empty() {
        assert_eq!(QualityMetrics::from_values(&[]), QualityMetrics::default());
    }
}
