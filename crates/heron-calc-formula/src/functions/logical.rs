//! Logical functions
//!
//! The short-circuiting family (IF, IFERROR, IFNA, IFS, SWITCH) receives
//! deferred arguments and evaluates at most one branch producer per call,
//! left to right; unselected branches are never invoked. The remaining
//! functions (AND, OR, NOT, XOR, TRUE, FALSE) are ordinary eager functions.

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::thunk::Thunk;
use heron_calc_core::{compare_values, flatten_values, CellError, FormulaValue};
use std::cmp::Ordering;

/// Interpret a condition value as a boolean, Excel style
fn condition_bool(v: &FormulaValue) -> Result<bool, CellError> {
    match v {
        FormulaValue::Boolean(b) => Ok(*b),
        FormulaValue::Number(n) => Ok(*n != 0.0),
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
        _ => Err(CellError::Value),
    }
}

/// IF(condition, if_true, [if_false])
///
/// Exactly one branch is evaluated. A missing if_false yields FALSE.
pub fn fn_if(args: &[&dyn Thunk], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let condition = args[0].evaluate()?;
    let take_true = match condition_bool(&condition) {
        Ok(b) => b,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    if take_true {
        args[1].evaluate()
    } else {
        match args.get(2) {
            Some(branch) => branch.evaluate(),
            None => Ok(FormulaValue::Boolean(false)),
        }
    }
}

/// IFERROR(value, value_if_error)
///
/// The fallback is only evaluated when the first argument is an error.
pub fn fn_iferror(args: &[&dyn Thunk], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let value = args[0].evaluate()?;
    match value {
        FormulaValue::Error(_) => args[1].evaluate(),
        other => Ok(other),
    }
}

/// IFNA(value, value_if_na)
///
/// Like IFERROR but only catches #N/A; every other error passes through.
pub fn fn_ifna(args: &[&dyn Thunk], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let value = args[0].evaluate()?;
    match value {
        FormulaValue::Error(CellError::Na) => args[1].evaluate(),
        other => Ok(other),
    }
}

/// IFS(condition1, value1, [condition2, value2], ...)
///
/// Conditions are evaluated left to right; the value producer of the first
/// TRUE condition is the only one invoked. No TRUE condition is #N/A.
pub fn fn_ifs(args: &[&dyn Thunk], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    if args.len() < 2 || args.len() % 2 != 0 {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    let mut i = 0;
    while i < args.len() {
        let condition = args[i].evaluate()?;
        match condition_bool(&condition) {
            Ok(true) => return args[i + 1].evaluate(),
            Ok(false) => {}
            Err(e) => return Ok(FormulaValue::Error(e)),
        }
        i += 2;
    }

    Ok(FormulaValue::Error(CellError::Na))
}

/// SWITCH(expression, value1, result1, [value2, result2], ..., [default])
///
/// The expression is compared against each value in turn; the first match's
/// result producer is invoked. An odd trailing argument is the default.
pub fn fn_switch(args: &[&dyn Thunk], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    if args.len() < 3 {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    let expression = args[0].evaluate()?;
    if let FormulaValue::Error(e) = expression {
        return Ok(FormulaValue::Error(e));
    }

    let remaining = args.len() - 1;
    let has_default = remaining % 2 == 1;
    let num_pairs = remaining / 2;

    for pair_idx in 0..num_pairs {
        let value_idx = 1 + pair_idx * 2;
        let value = args[value_idx].evaluate()?;
        if let FormulaValue::Error(e) = value {
            return Ok(FormulaValue::Error(e));
        }
        if matches!(compare_values(&expression, &value), Ok(Ordering::Equal)) {
            return args[value_idx + 1].evaluate();
        }
    }

    if has_default {
        args[args.len() - 1].evaluate()
    } else {
        Ok(FormulaValue::Error(CellError::Na))
    }
}

/// AND(logical1, [logical2], ...)
///
/// Text and empty cells inside arrays are ignored; errors propagate.
pub fn fn_and(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    for v in flatten_values(args) {
        match v {
            FormulaValue::Boolean(false) => return Ok(FormulaValue::Boolean(false)),
            FormulaValue::Number(n) if n == 0.0 => return Ok(FormulaValue::Boolean(false)),
            FormulaValue::Error(e) => return Ok(FormulaValue::Error(e)),
            _ => {}
        }
    }
    Ok(FormulaValue::Boolean(true))
}

/// OR(logical1, [logical2], ...)
pub fn fn_or(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    for v in flatten_values(args) {
        match v {
            FormulaValue::Boolean(true) => return Ok(FormulaValue::Boolean(true)),
            FormulaValue::Number(n) if n != 0.0 => return Ok(FormulaValue::Boolean(true)),
            FormulaValue::Error(e) => return Ok(FormulaValue::Error(e)),
            _ => {}
        }
    }
    Ok(FormulaValue::Boolean(false))
}

/// NOT(logical)
pub fn fn_not(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match args.get(0).unwrap() {
        FormulaValue::Boolean(b) => Ok(FormulaValue::Boolean(!b)),
        FormulaValue::Number(n) => Ok(FormulaValue::Boolean(*n == 0.0)),
        FormulaValue::Error(e) => Ok(FormulaValue::Error(*e)),
        _ => Ok(FormulaValue::Error(CellError::Value)),
    }
}

/// XOR(logical1, [logical2], ...) - TRUE for an odd count of TRUE values
pub fn fn_xor(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut true_count = 0;
    for v in flatten_values(args) {
        match v {
            FormulaValue::Boolean(true) => true_count += 1,
            FormulaValue::Number(n) if n != 0.0 => true_count += 1,
            FormulaValue::Error(e) => return Ok(FormulaValue::Error(e)),
            _ => {}
        }
    }
    Ok(FormulaValue::Boolean(true_count % 2 == 1))
}

/// TRUE()
pub fn fn_true(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(true))
}

/// FALSE()
pub fn fn_false(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thunk::ValueThunk;
    use std::cell::Cell;

    fn ctx() -> EvaluationContext {
        EvaluationContext::new()
    }

    struct CountingThunk<'a> {
        value: FormulaValue,
        calls: &'a Cell<usize>,
    }

    impl Thunk for CountingThunk<'_> {
        fn evaluate(&self) -> FormulaResult<FormulaValue> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.value.clone())
        }
    }

    #[test]
    fn test_if_selects_one_branch() {
        let cond = ValueThunk(FormulaValue::Boolean(true));
        let taken_calls = Cell::new(0);
        let skipped_calls = Cell::new(0);
        let taken = CountingThunk {
            value: FormulaValue::Number(1.0),
            calls: &taken_calls,
        };
        let skipped = CountingThunk {
            value: FormulaValue::Number(2.0),
            calls: &skipped_calls,
        };

        let got = fn_if(&[&cond as &dyn Thunk, &taken, &skipped], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Number(1.0));
        assert_eq!(taken_calls.get(), 1);
        assert_eq!(skipped_calls.get(), 0);
    }

    #[test]
    fn test_if_missing_else_is_false() {
        let cond = ValueThunk(FormulaValue::Boolean(false));
        let branch = ValueThunk(FormulaValue::Number(1.0));
        let got = fn_if(&[&cond as &dyn Thunk, &branch], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Boolean(false));
    }

    #[test]
    fn test_if_error_condition_propagates() {
        let cond = ValueThunk(FormulaValue::Error(CellError::Div0));
        let calls = Cell::new(0);
        let branch = CountingThunk {
            value: FormulaValue::Number(1.0),
            calls: &calls,
        };
        let got = fn_if(&[&cond as &dyn Thunk, &branch, &branch], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Error(CellError::Div0));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_iferror_lazy_fallback() {
        let calls = Cell::new(0);
        let fallback = CountingThunk {
            value: FormulaValue::Number(0.0),
            calls: &calls,
        };

        let fine = ValueThunk(FormulaValue::Number(5.0));
        let got = fn_iferror(&[&fine as &dyn Thunk, &fallback], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Number(5.0));
        assert_eq!(calls.get(), 0);

        let broken = ValueThunk(FormulaValue::Error(CellError::Div0));
        let got = fn_iferror(&[&broken as &dyn Thunk, &fallback], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Number(0.0));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_ifna_only_catches_na() {
        let fallback = ValueThunk(FormulaValue::Number(999.0));

        let na = ValueThunk(FormulaValue::Error(CellError::Na));
        let got = fn_ifna(&[&na as &dyn Thunk, &fallback], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Number(999.0));

        let div0 = ValueThunk(FormulaValue::Error(CellError::Div0));
        let got = fn_ifna(&[&div0 as &dyn Thunk, &fallback], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Error(CellError::Div0));
    }

    #[test]
    fn test_ifs_first_true_wins() {
        let f = ValueThunk(FormulaValue::Boolean(false));
        let t = ValueThunk(FormulaValue::Boolean(true));
        let first_calls = Cell::new(0);
        let second_calls = Cell::new(0);
        let first = CountingThunk {
            value: FormulaValue::text("first"),
            calls: &first_calls,
        };
        let second = CountingThunk {
            value: FormulaValue::text("second"),
            calls: &second_calls,
        };

        let got = fn_ifs(&[&f as &dyn Thunk, &first, &t, &second], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::text("second"));
        assert_eq!(first_calls.get(), 0);
        assert_eq!(second_calls.get(), 1);

        // No TRUE condition
        let got = fn_ifs(&[&f as &dyn Thunk, &first], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Error(CellError::Na));

        // Odd argument count
        let got = fn_ifs(&[&f as &dyn Thunk, &first, &t], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_switch_matching_and_default() {
        let expr = ValueThunk(FormulaValue::Number(2.0));
        let one = ValueThunk(FormulaValue::Number(1.0));
        let two = ValueThunk(FormulaValue::Number(2.0));
        let a = ValueThunk(FormulaValue::text("a"));
        let b = ValueThunk(FormulaValue::text("b"));
        let fallback = ValueThunk(FormulaValue::text("other"));

        let got = fn_switch(&[&expr as &dyn Thunk, &one, &a, &two, &b], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::text("b"));

        let expr9 = ValueThunk(FormulaValue::Number(9.0));
        let got = fn_switch(&[&expr9 as &dyn Thunk, &one, &a, &two, &b, &fallback], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::text("other"));

        let got = fn_switch(&[&expr9 as &dyn Thunk, &one, &a], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Error(CellError::Na));
    }

    #[test]
    fn test_switch_case_insensitive_text() {
        let expr = ValueThunk(FormulaValue::text("Apple"));
        let apple = ValueThunk(FormulaValue::text("APPLE"));
        let result = ValueThunk(FormulaValue::Number(1.0));
        let got = fn_switch(&[&expr as &dyn Thunk, &apple, &result], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Number(1.0));
    }

    #[test]
    fn test_and_or_xor() {
        let got = fn_and(
            &[FormulaValue::Boolean(true), FormulaValue::Number(1.0)],
            &ctx(),
        )
        .unwrap();
        assert_eq!(got, FormulaValue::Boolean(true));

        let got = fn_and(
            &[FormulaValue::Boolean(true), FormulaValue::Number(0.0)],
            &ctx(),
        )
        .unwrap();
        assert_eq!(got, FormulaValue::Boolean(false));

        let arr = FormulaValue::Vector(vec![
            FormulaValue::Boolean(false),
            FormulaValue::Boolean(true),
        ]);
        let got = fn_or(&[arr], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Boolean(true));

        let got = fn_xor(
            &[
                FormulaValue::Boolean(true),
                FormulaValue::Boolean(true),
                FormulaValue::Boolean(true),
            ],
            &ctx(),
        )
        .unwrap();
        assert_eq!(got, FormulaValue::Boolean(true));

        let got = fn_and(
            &[
                FormulaValue::Boolean(true),
                FormulaValue::Error(CellError::Ref),
            ],
            &ctx(),
        )
        .unwrap();
        assert_eq!(got, FormulaValue::Error(CellError::Ref));
    }

    #[test]
    fn test_not() {
        assert_eq!(
            fn_not(&[FormulaValue::Boolean(true)], &ctx()).unwrap(),
            FormulaValue::Boolean(false)
        );
        assert_eq!(
            fn_not(&[FormulaValue::Number(0.0)], &ctx()).unwrap(),
            FormulaValue::Boolean(true)
        );
        assert_eq!(
            fn_not(&[FormulaValue::text("x")], &ctx()).unwrap(),
            FormulaValue::Error(CellError::Value)
        );
    }
}
