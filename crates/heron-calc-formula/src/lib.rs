//! # heron-calc-formula
//!
//! Excel-compatible formula function library.
//!
//! This crate provides:
//! - The built-in function families (lookup, date/time, financial, logical,
//!   math, text, statistical, info)
//! - The lookup-by-name [`FunctionRegistry`] consumed by an external
//!   evaluator
//! - The [`Thunk`] contract for short-circuiting functions
//!
//! Every function is pure: it consumes already-resolved
//! [`heron_calc_core::FormulaValue`] arguments and returns a value or a
//! tagged error. Excel errors travel as values; only host-side faults
//! (unknown name, bad argument count) surface as [`FormulaError`].
//!
//! ## Example
//!
//! ```rust
//! use heron_calc_core::FormulaValue;
//! use heron_calc_formula::{registry, EvaluationContext};
//!
//! let ctx = EvaluationContext::new();
//! let result = registry()
//!     .call(
//!         "SUM",
//!         &[FormulaValue::Number(1.0), FormulaValue::Number(2.0)],
//!         &ctx,
//!     )
//!     .unwrap();
//! assert_eq!(result, FormulaValue::Number(3.0));
//! ```

pub mod context;
pub mod error;
pub mod functions;
pub mod thunk;

pub use context::EvaluationContext;
pub use error::{FormulaError, FormulaResult};
pub use functions::{
    registry, FunctionDef, FunctionImpl, FunctionRegistry, Implementation, LazyFunctionImpl,
};
pub use thunk::{Thunk, ValueThunk};
