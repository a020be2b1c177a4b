//! Math functions

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::functions::criteria::CriteriaMatcher;
use heron_calc_core::{flatten_values, to_number, CellError, FormulaValue};

/// Collect the numeric values from a flattened argument list
///
/// Numbers are kept, errors propagate, text/booleans/empties inside arrays
/// are ignored the way Excel's aggregates ignore them.
fn numeric_values(args: &[FormulaValue]) -> Result<Vec<f64>, CellError> {
    let mut out = Vec::new();
    for v in flatten_values(args) {
        match v {
            FormulaValue::Number(n) => {
                if n.is_nan() {
                    return Err(CellError::Value);
                }
                out.push(n);
            }
            FormulaValue::Error(e) => return Err(e),
            _ => {}
        }
    }
    Ok(out)
}

fn scalar_num(v: &FormulaValue) -> Result<f64, CellError> {
    if v.is_array() {
        return Err(CellError::Value);
    }
    to_number(v)
}

fn unary<F>(args: &[FormulaValue], op: F) -> FormulaResult<FormulaValue>
where
    F: Fn(f64) -> Result<f64, CellError>,
{
    let calc = || -> Result<f64, CellError> { op(scalar_num(args.get(0).unwrap())?) };
    Ok(match calc() {
        Ok(n) if n.is_finite() => FormulaValue::Number(n),
        Ok(_) => FormulaValue::Error(CellError::Num),
        Err(e) => FormulaValue::Error(e),
    })
}

/// SUM function
pub fn fn_sum(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match numeric_values(args) {
        Ok(values) => Ok(FormulaValue::Number(values.iter().sum())),
        Err(e) => Ok(FormulaValue::Error(e)),
    }
}

/// AVERAGE function
pub fn fn_average(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match numeric_values(args) {
        Ok(values) if values.is_empty() => Ok(FormulaValue::Error(CellError::Div0)),
        Ok(values) => Ok(FormulaValue::Number(
            values.iter().sum::<f64>() / values.len() as f64,
        )),
        Err(e) => Ok(FormulaValue::Error(e)),
    }
}

/// MIN function - 0 when no numeric values are present
pub fn fn_min(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match numeric_values(args) {
        Ok(values) => {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            Ok(FormulaValue::Number(if min == f64::INFINITY {
                0.0
            } else {
                min
            }))
        }
        Err(e) => Ok(FormulaValue::Error(e)),
    }
}

/// MAX function - 0 when no numeric values are present
pub fn fn_max(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match numeric_values(args) {
        Ok(values) => {
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            Ok(FormulaValue::Number(if max == f64::NEG_INFINITY {
                0.0
            } else {
                max
            }))
        }
        Err(e) => Ok(FormulaValue::Error(e)),
    }
}

/// COUNT function - counts numeric values only
pub fn fn_count(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = flatten_values(args)
        .iter()
        .filter(|v| matches!(v, FormulaValue::Number(_)))
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// ABS(number)
pub fn fn_abs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary(args, |n| Ok(n.abs()))
}

/// SIGN(number)
pub fn fn_sign(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary(args, |n| {
        Ok(if n > 0.0 {
            1.0
        } else if n < 0.0 {
            -1.0
        } else {
            0.0
        })
    })
}

/// INT(number) - floors toward negative infinity
pub fn fn_int(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary(args, |n| Ok(n.floor()))
}

/// TRUNC(number, [num_digits]) - truncates toward zero
pub fn fn_trunc(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let calc = || -> Result<f64, CellError> {
        let number = scalar_num(args.get(0).unwrap())?;
        let digits = match args.get(1) {
            None | Some(FormulaValue::Empty) => 0,
            Some(v) => scalar_num(v)? as i32,
        };
        let multiplier = 10_f64.powi(digits);
        Ok((number * multiplier).trunc() / multiplier)
    };
    Ok(result_value(calc()))
}

/// ROUND(number, [num_digits]) - round half away from zero
pub fn fn_round(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    round_impl(args, RoundMode::HalfAwayFromZero)
}

/// ROUNDUP(number, num_digits) - away from zero
pub fn fn_roundup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    round_impl(args, RoundMode::AwayFromZero)
}

/// ROUNDDOWN(number, num_digits) - toward zero
pub fn fn_rounddown(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    round_impl(args, RoundMode::TowardZero)
}

enum RoundMode {
    HalfAwayFromZero,
    AwayFromZero,
    TowardZero,
}

fn round_impl(args: &[FormulaValue], mode: RoundMode) -> FormulaResult<FormulaValue> {
    let calc = || -> Result<f64, CellError> {
        let number = scalar_num(args.get(0).unwrap())?;
        let digits = match args.get(1) {
            None | Some(FormulaValue::Empty) => 0,
            Some(v) => scalar_num(v)? as i32,
        };
        let multiplier = 10_f64.powi(digits);
        let scaled = number * multiplier;
        let rounded = match mode {
            RoundMode::HalfAwayFromZero => {
                if number >= 0.0 {
                    (scaled + 0.5).floor()
                } else {
                    (scaled - 0.5).ceil()
                }
            }
            // Nudge by an epsilon so representation noise like 3.0000000004
            // does not round an exact value up a digit
            RoundMode::AwayFromZero => {
                if scaled >= 0.0 {
                    (scaled - 1e-9).ceil()
                } else {
                    (scaled + 1e-9).floor()
                }
            }
            RoundMode::TowardZero => scaled.trunc(),
        };
        Ok(rounded / multiplier)
    };
    Ok(result_value(calc()))
}

/// MOD(number, divisor)
///
/// The result carries the sign of the divisor, unlike Rust's `%`.
pub fn fn_mod(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let calc = || -> Result<f64, CellError> {
        let number = scalar_num(args.get(0).unwrap())?;
        let divisor = scalar_num(args.get(1).unwrap())?;
        if divisor == 0.0 {
            return Err(CellError::Div0);
        }
        Ok(number - divisor * (number / divisor).floor())
    };
    Ok(result_value(calc()))
}

/// SQRT(number)
pub fn fn_sqrt(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary(args, |n| {
        if n < 0.0 {
            Err(CellError::Num)
        } else {
            Ok(n.sqrt())
        }
    })
}

/// POWER(number, power)
pub fn fn_power(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let calc = || -> Result<f64, CellError> {
        let base = scalar_num(args.get(0).unwrap())?;
        let exponent = scalar_num(args.get(1).unwrap())?;
        Ok(base.powf(exponent))
    };
    Ok(result_value(calc()))
}

/// EXP(number)
pub fn fn_exp(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary(args, |n| Ok(n.exp()))
}

/// LN(number)
pub fn fn_ln(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary(args, |n| {
        if n <= 0.0 {
            Err(CellError::Num)
        } else {
            Ok(n.ln())
        }
    })
}

/// LOG(number, [base]) - base defaults to 10
pub fn fn_log(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let calc = || -> Result<f64, CellError> {
        let number = scalar_num(args.get(0).unwrap())?;
        let base = match args.get(1) {
            None | Some(FormulaValue::Empty) => 10.0,
            Some(v) => scalar_num(v)?,
        };
        if number <= 0.0 || base <= 0.0 || base == 1.0 {
            return Err(CellError::Num);
        }
        Ok(number.log(base))
    };
    Ok(result_value(calc()))
}

/// LOG10(number)
pub fn fn_log10(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary(args, |n| {
        if n <= 0.0 {
            Err(CellError::Num)
        } else {
            Ok(n.log10())
        }
    })
}

/// PI()
pub fn fn_pi(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(std::f64::consts::PI))
}

/// RAND() - volatile, uniform in [0, 1)
pub fn fn_rand(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    Ok(FormulaValue::Number(rng.gen::<f64>()))
}

/// RANDBETWEEN(bottom, top) - volatile, integer in [bottom, top]
pub fn fn_randbetween(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    use rand::Rng;

    let calc = || -> Result<f64, CellError> {
        let bottom = scalar_num(args.get(0).unwrap())?.ceil() as i64;
        let top = scalar_num(args.get(1).unwrap())?.floor() as i64;
        if bottom > top {
            return Err(CellError::Num);
        }
        let mut rng = rand::thread_rng();
        Ok(rng.gen_range(bottom..=top) as f64)
    };
    Ok(result_value(calc()))
}

/// SUMIF(range, criteria, [sum_range])
pub fn fn_sumif(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let range = flatten_values(&args[..1]);
    let criteria = args.get(1).unwrap();
    if let FormulaValue::Error(e) = criteria {
        return Ok(FormulaValue::Error(*e));
    }
    let sum_range = match args.get(2) {
        Some(v) => flatten_values(std::slice::from_ref(v)),
        None => range.clone(),
    };
    if sum_range.len() != range.len() {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    let matcher = CriteriaMatcher::new(criteria);
    let mut sum = 0.0;
    for (test, value) in range.iter().zip(&sum_range) {
        if matcher.matches(test) {
            if let FormulaValue::Number(n) = value {
                sum += n;
            }
        }
    }
    Ok(FormulaValue::Number(sum))
}

/// SUMPRODUCT(array1, [array2], ...)
///
/// Arrays must agree in length; non-numeric entries multiply as zero.
pub fn fn_sumproduct(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let mut arrays = Vec::with_capacity(args.len());
    for arg in args {
        if let FormulaValue::Error(e) = arg {
            return Ok(FormulaValue::Error(*e));
        }
        arrays.push(flatten_values(std::slice::from_ref(arg)));
    }

    let len = arrays[0].len();
    if arrays.iter().any(|a| a.len() != len) {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    let mut sum = 0.0;
    for i in 0..len {
        let mut product = 1.0;
        for array in &arrays {
            match &array[i] {
                FormulaValue::Number(n) => product *= n,
                FormulaValue::Error(e) => return Ok(FormulaValue::Error(*e)),
                _ => product = 0.0,
            }
        }
        sum += product;
    }
    Ok(FormulaValue::Number(sum))
}

fn result_value(result: Result<f64, CellError>) -> FormulaValue {
    match result {
        Ok(n) if n.is_finite() => FormulaValue::Number(n),
        Ok(_) => FormulaValue::Error(CellError::Num),
        Err(e) => FormulaValue::Error(e),
    }
}
