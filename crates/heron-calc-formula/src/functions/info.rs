//! Information functions

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use heron_calc_core::{CellError, FormulaValue};

/// ISBLANK(value)
pub fn fn_isblank(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(args.get(0).unwrap().is_empty()))
}

/// ISNUMBER(value)
pub fn fn_isnumber(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(matches!(
        args.get(0).unwrap(),
        FormulaValue::Number(_)
    )))
}

/// ISTEXT(value)
pub fn fn_istext(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(matches!(
        args.get(0).unwrap(),
        FormulaValue::Text(_)
    )))
}

/// ISLOGICAL(value)
pub fn fn_islogical(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(matches!(
        args.get(0).unwrap(),
        FormulaValue::Boolean(_)
    )))
}

/// ISERROR(value) - TRUE for any error
pub fn fn_iserror(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(args.get(0).unwrap().is_error()))
}

/// ISERR(value) - TRUE for any error except #N/A
pub fn fn_iserr(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(matches!(
        args.get(0).unwrap(),
        FormulaValue::Error(e) if *e != CellError::Na
    )))
}

/// ISNA(value)
pub fn fn_isna(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(matches!(
        args.get(0).unwrap(),
        FormulaValue::Error(CellError::Na)
    )))
}

/// NA() - the #N/A error as a value
pub fn fn_na(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Error(CellError::Na))
}

/// ERROR.TYPE(value) - numeric code of an error, #N/A for non-errors
pub fn fn_error_type(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let code = match args.get(0).unwrap() {
        FormulaValue::Error(CellError::Null) => 1.0,
        FormulaValue::Error(CellError::Div0) => 2.0,
        FormulaValue::Error(CellError::Value) => 3.0,
        FormulaValue::Error(CellError::Ref) => 4.0,
        FormulaValue::Error(CellError::Name) => 5.0,
        FormulaValue::Error(CellError::Num) => 6.0,
        FormulaValue::Error(CellError::Na) => 7.0,
        FormulaValue::Error(CellError::Circ) => 8.0,
        _ => return Ok(FormulaValue::Error(CellError::Na)),
    };
    Ok(FormulaValue::Number(code))
}
