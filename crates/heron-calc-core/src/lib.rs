//! # heron-calc-core
//!
//! Core value types for the heron-calc formula engine.
//!
//! This crate provides the fundamental types shared by every function
//! family:
//! - [`FormulaValue`] - the value algebra (numbers, text, booleans, errors,
//!   1-D vectors, 2-D tables)
//! - [`CellError`] - Excel's tagged error kinds, carried as data
//! - Coercion and comparison rules ([`to_number`], [`to_text`],
//!   [`to_boolean`], [`compare_values`])
//! - The shared array-flatten utility ([`flatten_values`])
//!
//! ## Example
//!
//! ```rust
//! use heron_calc_core::{to_number, CellError, FormulaValue};
//!
//! assert_eq!(to_number(&FormulaValue::Boolean(true)), Ok(1.0));
//! assert_eq!(to_number(&FormulaValue::text("12.5")), Ok(12.5));
//! assert_eq!(to_number(&FormulaValue::text("twelve")), Err(CellError::Value));
//! ```

pub mod coerce;
pub mod value;

// Re-exports for convenience
pub use coerce::{
    compare_values, first_error, flatten_values, number_to_text, parse_number, parse_number_with,
    to_boolean, to_number, to_text,
};
pub use value::{CellError, FormulaValue};

/// Maximum number of rows in a sheet reference (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a sheet reference (Excel limit)
pub const MAX_COLS: u16 = 16_384;
