//! Deferred argument producers for short-circuiting functions
//!
//! `IF`, `IFERROR`, `IFNA`, `IFS`, and `SWITCH` must not evaluate branches
//! they do not select. The caller hands those functions thunks instead of
//! values; the function invokes at most one branch producer, left to right,
//! and never touches the rest.

use crate::error::FormulaResult;
use heron_calc_core::FormulaValue;

/// A deferred argument
///
/// Contract: `evaluate` is called at most once per function invocation.
/// Implementations are not required to memoize.
pub trait Thunk {
    /// Produce the argument value
    fn evaluate(&self) -> FormulaResult<FormulaValue>;
}

/// A thunk wrapping an already-computed value
///
/// Useful for callers that have eager values in hand (tests, simple hosts).
pub struct ValueThunk(pub FormulaValue);

impl Thunk for ValueThunk {
    fn evaluate(&self) -> FormulaResult<FormulaValue> {
        Ok(self.0.clone())
    }
}

impl<F> Thunk for F
where
    F: Fn() -> FormulaResult<FormulaValue>,
{
    fn evaluate(&self) -> FormulaResult<FormulaValue> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_value_thunk() {
        let t = ValueThunk(FormulaValue::Number(5.0));
        assert_eq!(t.evaluate().unwrap(), FormulaValue::Number(5.0));
    }

    #[test]
    fn test_closure_thunk_runs_on_demand() {
        let calls = Cell::new(0);
        let t = || -> FormulaResult<FormulaValue> {
            calls.set(calls.get() + 1);
            Ok(FormulaValue::Number(1.0))
        };
        assert_eq!(calls.get(), 0);
        let _ = t.evaluate();
        assert_eq!(calls.get(), 1);
    }
}
