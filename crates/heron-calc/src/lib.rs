//! # heron-calc
//!
//! An Excel-compatible formula evaluation library.
//!
//! heron-calc reproduces Excel's documented semantics exactly, including
//! the deliberately preserved 1900 leap-year bug, approximate-match
//! tie-break rules, and the Newton-Raphson/bisection behavior of the
//! financial solvers. Functions are pure: they take already-resolved
//! argument values and return a value or a tagged error; an external
//! parser/evaluator supplies arguments and dispatches through the
//! name-keyed registry.
//!
//! ## Example
//!
//! ```rust
//! use heron_calc::prelude::*;
//!
//! let ctx = EvaluationContext::new();
//!
//! // The 1900 leap-year bug is part of the contract
//! let serial = registry()
//!     .call(
//!         "DATE",
//!         &[
//!             FormulaValue::Number(1900.0),
//!             FormulaValue::Number(3.0),
//!             FormulaValue::Number(1.0),
//!         ],
//!         &ctx,
//!     )
//!     .unwrap();
//! assert_eq!(serial, FormulaValue::Number(61.0));
//! ```

pub mod prelude;

// Re-export core types
pub use heron_calc_core::{
    compare_values, first_error, flatten_values, number_to_text, parse_number, parse_number_with,
    to_boolean, to_number, to_text, CellError, FormulaValue, MAX_COLS, MAX_ROWS,
};

// Re-export formula types
pub use heron_calc_formula::{
    registry, EvaluationContext, FormulaError, FormulaResult, FunctionDef, FunctionImpl,
    FunctionRegistry, Implementation, LazyFunctionImpl, Thunk, ValueThunk,
};
