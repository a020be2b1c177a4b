//! Criteria matching for SUMIF, COUNTIF, AVERAGEIF and related functions
//!
//! Excel criteria can be:
//! - A number: exact match (e.g., 5)
//! - A text string: case-insensitive match (e.g., "apple")
//! - A comparison expression: ">5", ">=10", "<100", "<=50", "<>0", "=5"
//! - Wildcards: "*" matches any characters, "?" matches single character
//! - Empty string: matches empty cells

use crate::functions::wildcard::WildcardPattern;
use heron_calc_core::{to_text, FormulaValue};

/// Criteria matcher for SUMIF/COUNTIF/AVERAGEIF and related functions
#[derive(Debug)]
pub struct CriteriaMatcher {
    criteria_type: CriteriaType,
}

#[derive(Debug)]
enum CriteriaType {
    /// Exact number match
    Number(f64),
    /// Comparison with number (operator, value)
    Comparison(ComparisonOp, f64),
    /// Text match (case-insensitive)
    Text(String),
    /// Text match with wildcards
    Pattern(WildcardPattern),
    /// Match empty values
    Empty,
    /// Matches nothing (error/array criteria)
    Never,
}

#[derive(Debug, Clone, Copy)]
enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl CriteriaMatcher {
    /// Create a new criteria matcher from a FormulaValue
    pub fn new(criteria: &FormulaValue) -> Self {
        let criteria_type = match criteria {
            FormulaValue::Number(n) => CriteriaType::Number(*n),
            FormulaValue::Boolean(b) => CriteriaType::Number(if *b { 1.0 } else { 0.0 }),
            FormulaValue::Text(s) => Self::parse_string_criteria(s),
            FormulaValue::Empty => CriteriaType::Empty,
            _ => CriteriaType::Never,
        };

        Self { criteria_type }
    }

    fn parse_string_criteria(s: &str) -> CriteriaType {
        let s = s.trim();

        if s.is_empty() {
            return CriteriaType::Empty;
        }

        if let Some(ct) = Self::try_parse_comparison(s) {
            return ct;
        }

        if let Ok(n) = s.parse::<f64>() {
            return CriteriaType::Number(n);
        }

        match WildcardPattern::new(s) {
            Some(pattern) => CriteriaType::Pattern(pattern),
            None => CriteriaType::Text(s.to_lowercase()),
        }
    }

    fn try_parse_comparison(s: &str) -> Option<CriteriaType> {
        // Longer operators first, so ">=" is not read as ">" plus "=5"
        let (op, rest) = if let Some(rest) = s.strip_prefix(">=") {
            (ComparisonOp::GreaterEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<=") {
            (ComparisonOp::LessEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<>") {
            (ComparisonOp::NotEqual, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (ComparisonOp::GreaterThan, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (ComparisonOp::LessThan, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (ComparisonOp::Equal, rest)
        } else {
            return None;
        };

        // Text comparisons like ">A" fall through to plain text handling
        rest.trim()
            .parse::<f64>()
            .ok()
            .map(|n| CriteriaType::Comparison(op, n))
    }

    /// Check if a value matches the criteria
    pub fn matches(&self, value: &FormulaValue) -> bool {
        match &self.criteria_type {
            // Numbers match actual numeric values only, not text that looks
            // numeric; SUMIF(A:A, 5) does not match the text "5".
            CriteriaType::Number(criteria_num) => match value {
                FormulaValue::Number(n) => (n - criteria_num).abs() < 1e-10,
                FormulaValue::Boolean(b) => {
                    let n = if *b { 1.0 } else { 0.0 };
                    (n - criteria_num).abs() < 1e-10
                }
                _ => false,
            },

            CriteriaType::Comparison(op, criteria_num) => {
                let n = match value {
                    FormulaValue::Number(n) => *n,
                    FormulaValue::Boolean(b) => {
                        if *b {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    _ => return false,
                };
                match op {
                    ComparisonOp::Equal => (n - criteria_num).abs() < 1e-10,
                    ComparisonOp::NotEqual => (n - criteria_num).abs() >= 1e-10,
                    ComparisonOp::LessThan => n < *criteria_num,
                    ComparisonOp::LessEqual => n <= *criteria_num,
                    ComparisonOp::GreaterThan => n > *criteria_num,
                    ComparisonOp::GreaterEqual => n >= *criteria_num,
                }
            }

            CriteriaType::Text(pattern) => match to_text(value) {
                Ok(text) => text.to_lowercase() == *pattern,
                Err(_) => false,
            },

            CriteriaType::Pattern(pattern) => match to_text(value) {
                Ok(text) => pattern.matches(&text),
                Err(_) => false,
            },

            CriteriaType::Empty => {
                matches!(value, FormulaValue::Empty)
                    || matches!(value, FormulaValue::Text(s) if s.is_empty())
            }

            CriteriaType::Never => false,
        }
    }
}
