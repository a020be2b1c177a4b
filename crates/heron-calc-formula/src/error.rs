//! Formula error types
//!
//! Excel-visible errors (`#VALUE!`, `#N/A`, ...) are *values* and travel as
//! [`heron_calc_core::FormulaValue::Error`]. The types here cover host-side
//! faults only: conditions a well-behaved caller (the external parser and
//! evaluator) never produces, such as calling an unknown function name.

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Host-side errors that can occur when invoking formula functions
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Invalid argument
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },
}
