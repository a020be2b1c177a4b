//! Statistical functions

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::functions::criteria::CriteriaMatcher;
use heron_calc_core::{flatten_values, CellError, FormulaValue};

/// COUNTA - counts non-empty values
pub fn fn_counta(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = flatten_values(args)
        .iter()
        .filter(|v| !v.is_empty())
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTBLANK - counts empty values and empty strings
pub fn fn_countblank(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let count = flatten_values(args)
        .iter()
        .filter(|v| {
            matches!(v, FormulaValue::Empty) || matches!(v, FormulaValue::Text(s) if s.is_empty())
        })
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTIF(range, criteria)
pub fn fn_countif(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let criteria = args.get(1).unwrap();
    if let FormulaValue::Error(e) = criteria {
        return Ok(FormulaValue::Error(*e));
    }
    let matcher = CriteriaMatcher::new(criteria);
    let count = flatten_values(&args[..1])
        .iter()
        .filter(|v| matcher.matches(v))
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// AVERAGEIF(range, criteria, [average_range])
pub fn fn_averageif(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let range = flatten_values(&args[..1]);
    let criteria = args.get(1).unwrap();
    if let FormulaValue::Error(e) = criteria {
        return Ok(FormulaValue::Error(*e));
    }
    let avg_range = match args.get(2) {
        Some(v) => flatten_values(std::slice::from_ref(v)),
        None => range.clone(),
    };
    if avg_range.len() != range.len() {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    let matcher = CriteriaMatcher::new(criteria);
    let mut sum = 0.0;
    let mut count = 0;
    for (test, value) in range.iter().zip(&avg_range) {
        if matcher.matches(test) {
            if let FormulaValue::Number(n) = value {
                sum += n;
                count += 1;
            }
        }
    }

    if count == 0 {
        Ok(FormulaValue::Error(CellError::Div0))
    } else {
        Ok(FormulaValue::Number(sum / count as f64))
    }
}

fn sorted_numbers(args: &[FormulaValue]) -> Result<Vec<f64>, CellError> {
    let mut values = Vec::new();
    for v in flatten_values(args) {
        match v {
            FormulaValue::Number(n) => {
                if n.is_nan() {
                    return Err(CellError::Value);
                }
                values.push(n);
            }
            FormulaValue::Error(e) => return Err(e),
            _ => {}
        }
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    Ok(values)
}

/// MEDIAN(number1, [number2], ...)
pub fn fn_median(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let values = match sorted_numbers(args) {
        Ok(v) => v,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    if values.is_empty() {
        return Ok(FormulaValue::Error(CellError::Num));
    }
    let mid = values.len() / 2;
    let median = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };
    Ok(FormulaValue::Number(median))
}

/// LARGE(array, k) - k-th largest value
pub fn fn_large(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    kth(args, true)
}

/// SMALL(array, k) - k-th smallest value
pub fn fn_small(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    kth(args, false)
}

fn kth(args: &[FormulaValue], largest: bool) -> FormulaResult<FormulaValue> {
    let values = match sorted_numbers(&args[..1]) {
        Ok(v) => v,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let k = match args.get(1).map(heron_calc_core::to_number) {
        Some(Ok(n)) => n.trunc() as i64,
        Some(Err(e)) => return Ok(FormulaValue::Error(e)),
        None => return Ok(FormulaValue::Error(CellError::Value)),
    };
    if k < 1 || k as usize > values.len() {
        return Ok(FormulaValue::Error(CellError::Num));
    }
    let idx = if largest {
        values.len() - k as usize
    } else {
        k as usize - 1
    };
    Ok(FormulaValue::Number(values[idx]))
}
