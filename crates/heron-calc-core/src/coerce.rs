//! Value coercion, comparison, and flattening
//!
//! Excel's coercion rules in one place, shared by every function family:
//! - Booleans convert to 1/0, empty converts to 0/""/FALSE.
//! - Text converts to numbers through a locale-aware grammar.
//! - Errors pass through every coercion unchanged.
//! - Arrays never coerce to scalars; callers that reduce them do so
//!   explicitly.

use crate::value::{CellError, FormulaValue};
use std::cmp::Ordering;

/// Coerce a value to a number
///
/// Returns the error itself when given an error value, `#VALUE!` for
/// anything that has no numeric reading (including NaN).
pub fn to_number(v: &FormulaValue) -> Result<f64, CellError> {
    match v {
        FormulaValue::Number(n) => {
            if n.is_nan() {
                Err(CellError::Value)
            } else {
                Ok(*n)
            }
        }
        FormulaValue::Boolean(true) => Ok(1.0),
        FormulaValue::Boolean(false) => Ok(0.0),
        FormulaValue::Text(s) => {
            if s.is_empty() {
                Ok(0.0)
            } else {
                parse_number(s).ok_or(CellError::Value)
            }
        }
        FormulaValue::Empty => Ok(0.0),
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Vector(_) | FormulaValue::Table(_) => Err(CellError::Value),
    }
}

/// Coerce a value to text
pub fn to_text(v: &FormulaValue) -> Result<String, CellError> {
    match v {
        FormulaValue::Text(s) => Ok(s.clone()),
        FormulaValue::Number(n) => {
            if n.is_nan() {
                Err(CellError::Value)
            } else {
                Ok(number_to_text(*n))
            }
        }
        FormulaValue::Boolean(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        FormulaValue::Empty => Ok(String::new()),
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Vector(_) | FormulaValue::Table(_) => Err(CellError::Value),
    }
}

/// Coerce a value to a boolean
pub fn to_boolean(v: &FormulaValue) -> Result<bool, CellError> {
    match v {
        FormulaValue::Boolean(b) => Ok(*b),
        FormulaValue::Number(n) => {
            if n.is_nan() {
                Err(CellError::Value)
            } else {
                Ok(*n != 0.0)
            }
        }
        FormulaValue::Text(s) => {
            if s.eq_ignore_ascii_case("TRUE") {
                Ok(true)
            } else if s.eq_ignore_ascii_case("FALSE") {
                Ok(false)
            } else {
                Err(CellError::Value)
            }
        }
        FormulaValue::Empty => Ok(false),
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Vector(_) | FormulaValue::Table(_) => Err(CellError::Value),
    }
}

/// Format a number the way Excel's general format does
///
/// Integral values print without a trailing ".0"; everything else uses the
/// shortest round-trip representation.
pub fn number_to_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Parse text as a number using the default separators ('.' decimal, ',' group)
pub fn parse_number(s: &str) -> Option<f64> {
    parse_number_with(s, '.', ',')
}

/// Parse text as a number with explicit decimal and group separators
///
/// Accepts an optional sign, group separators in the integer part, a
/// fractional part, scientific notation, and a trailing `%` (divides by
/// 100). Group separators after the decimal point are rejected.
pub fn parse_number_with(s: &str, decimal_sep: char, group_sep: char) -> Option<f64> {
    let mut s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut percent = false;
    if let Some(stripped) = s.strip_suffix('%') {
        percent = true;
        s = stripped.trim_end();
    }

    let mut normalized = String::with_capacity(s.len());
    let mut seen_decimal = false;
    for c in s.chars() {
        if c == group_sep {
            if seen_decimal {
                return None;
            }
            continue;
        }
        if c == decimal_sep {
            if seen_decimal {
                return None;
            }
            seen_decimal = true;
            normalized.push('.');
        } else {
            normalized.push(c);
        }
    }

    // f64 parsing accepts "inf"/"NaN" and overflows to infinity; none of
    // those are numbers in Excel's grammar.
    let n: f64 = normalized.parse().ok()?;
    if !n.is_finite() {
        return None;
    }
    Some(if percent { n / 100.0 } else { n })
}

/// Compare two values for ordering (Excel-style comparison)
///
/// Numeric comparison once types align; text compares case-insensitively;
/// cross-type ordering is Number < Text < Boolean. Empty coerces to the
/// other side's zero value. NaN on either side is `#VALUE!`.
pub fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Result<Ordering, CellError> {
    if let FormulaValue::Error(e) = left {
        return Err(*e);
    }
    if let FormulaValue::Error(e) = right {
        return Err(*e);
    }

    match (left, right) {
        (FormulaValue::Number(l), FormulaValue::Number(r)) => {
            l.partial_cmp(r).ok_or(CellError::Value)
        }

        // Text compares case-insensitively
        (FormulaValue::Text(l), FormulaValue::Text(r)) => {
            Ok(l.to_lowercase().cmp(&r.to_lowercase()))
        }

        // FALSE < TRUE
        (FormulaValue::Boolean(l), FormulaValue::Boolean(r)) => Ok(l.cmp(r)),

        // Empty coerces to the other side's zero value
        (FormulaValue::Empty, FormulaValue::Empty) => Ok(Ordering::Equal),
        (FormulaValue::Empty, r) => compare_values(&empty_as(r), r),
        (l, FormulaValue::Empty) => compare_values(l, &empty_as(l)),

        // Mixed types: Number < Text < Boolean
        (FormulaValue::Number(_), FormulaValue::Text(_)) => Ok(Ordering::Less),
        (FormulaValue::Text(_), FormulaValue::Number(_)) => Ok(Ordering::Greater),
        (FormulaValue::Number(_), FormulaValue::Boolean(_)) => Ok(Ordering::Less),
        (FormulaValue::Boolean(_), FormulaValue::Number(_)) => Ok(Ordering::Greater),
        (FormulaValue::Text(_), FormulaValue::Boolean(_)) => Ok(Ordering::Less),
        (FormulaValue::Boolean(_), FormulaValue::Text(_)) => Ok(Ordering::Greater),

        _ => Err(CellError::Value),
    }
}

fn empty_as(other: &FormulaValue) -> FormulaValue {
    match other {
        FormulaValue::Text(_) => FormulaValue::Text(String::new()),
        FormulaValue::Boolean(_) => FormulaValue::Boolean(false),
        _ => FormulaValue::Number(0.0),
    }
}

/// Return the first error among the given values, in argument order
pub fn first_error(args: &[FormulaValue]) -> Option<CellError> {
    args.iter().find_map(|v| v.get_error())
}

/// Flatten nested Vectors and Tables into a scalar sequence
///
/// Depth-first, left-to-right, using an explicit work stack so deeply
/// nested inputs cannot exhaust the call stack. Errors and empties are kept
/// as scalars; callers filter as needed.
pub fn flatten_values(args: &[FormulaValue]) -> Vec<FormulaValue> {
    let mut out = Vec::new();
    let mut stack: Vec<&FormulaValue> = args.iter().rev().collect();
    while let Some(v) = stack.pop() {
        match v {
            FormulaValue::Vector(items) => stack.extend(items.iter().rev()),
            FormulaValue::Table(rows) => {
                for row in rows.iter().rev() {
                    stack.extend(row.iter().rev());
                }
            }
            scalar => out.push(scalar.clone()),
        }
    }
    out
}
