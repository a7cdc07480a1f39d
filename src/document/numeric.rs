//! 보고서 숫자 표기 파싱
//!
//! 지원 형식:
//! - `1,234,567` (영미식 천 단위 구분)
//! - `1.234.567` (유럽식)
//! - `1 234 567` (공백 구분)
//! - `12.5%` (백분율 → 0.125)
//! - `€1,234.56` (통화 기호)
//! - `1,234 tCO2e` (단위가 붙은 값 → 앞의 숫자)

use std::sync::OnceLock;

use regex::Regex;

fn number_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"[-+]?\d+(?:[.,\s]\d+)*").expect("Invalid regex"))
}

fn comma_thousands() -> &'static Regex {
    static THOUSANDS: OnceLock<Regex> = OnceLock::new();
    THOUSANDS.get_or_init(|| Regex::new(r"^[-+]?\d{1,3}(?:,\d{3})+$").expect("Invalid regex"))
}

/// 텍스트에서 숫자 값 추출
pub fn extract_numeric_value(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '€' | '$' | '£' | '¥'))
        .collect();
    let is_percentage = cleaned.contains('%');

    let token = number_token().find(&cleaned)?.as_str();
    let mut number: String = token.chars().filter(|c| !c.is_whitespace()).collect();

    match (number.rfind(','), number.rfind('.')) {
        (Some(comma), Some(dot)) => {
            if dot > comma {
                number = number.replace(',', "");
            } else {
                number = number.replace('.', "").replace(',', ".");
            }
        }
        (Some(_), None) => {
            if comma_thousands().is_match(&number) {
                number = number.replace(',', "");
            } else {
                number = number.replace(',', ".");
            }
        }
        (None, Some(_)) => {
            if number.matches('.').count() > 1 {
                number = number.replace('.', "");
            }
        }
        (None, None) => {}
    }

    let value: f64 = number.parse().ok()?;
    if is_percentage && value > 1.0 {
        Some(value / 100.0)
    } else {
        Some(value)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.map(|a| (a - b).abs() < 1e-9).unwrap_or(false)
    }

    #[test]
    fn test_thousand_separators() {
        assert!(approx(extract_numeric_value("1,234,567"), 1_234_567.0));
        assert!(approx(extract_numeric_value("1.234.567"), 1_234_567.0));
        assert!(approx(extract_numeric_value("1 234 567"), 1_234_567.0));
    }

    #[test]
    fn test_decimals() {
        assert!(approx(extract_numeric_value("€1,234.56"), 1234.56));
        assert!(approx(extract_numeric_value("1.234,56"), 1234.56));
        assert!(approx(extract_numeric_value("12,5"), 12.5));
        assert!(approx(extract_numeric_value("-3.2"), -3.2));
    }

    #[test]
    fn test_percentages() {
        assert!(approx(extract_numeric_value("12.5%"), 0.125));
        assert!(approx(extract_numeric_value("0.5%"), 0.5));
    }

    #[test]
    fn test_value_with_unit() {
        assert!(approx(extract_numeric_value("1,234 tCO2e"), 1234.0));
        assert!(approx(extract_numeric_value("2050"), 2050.0));
    }

    #[test]
    fn test_no_number() {
        assert_eq!(extract_numeric_value(""), None);
        assert_eq!(extract_numeric_value("Not found"), None);
    }
}
