//! Prelude module - common imports for heron-calc users
//!
//! ```rust
//! use heron_calc::prelude::*;
//! ```

pub use crate::{
    // Coercion and comparison
    compare_values,
    flatten_values,
    // The registry entry point
    registry,
    to_boolean,
    to_number,
    to_text,
    // Error types
    CellError,
    EvaluationContext,
    FormulaError,
    FormulaResult,
    // Value types
    FormulaValue,
    FunctionDef,
    FunctionRegistry,
    // Deferred arguments
    Thunk,
    ValueThunk,
};
