//! Formula value types

use std::fmt;

/// Represents a value flowing through formula evaluation
///
/// Every formula function consumes and produces this algebra. Errors are
/// ordinary values here, not exceptions: once produced they travel through
/// arithmetic and comparisons as data.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FormulaValue {
    /// Empty cell (no value)
    Empty,

    /// Boolean value (TRUE/FALSE)
    Boolean(bool),

    /// Numeric value (all numbers stored as f64, including date serials)
    Number(f64),

    /// Text value
    Text(String),

    /// Error value (#VALUE!, #REF!, etc.)
    Error(CellError),

    /// One-dimensional sequence of values
    Vector(Vec<FormulaValue>),

    /// Two-dimensional, row-major grid of values (all rows same length)
    Table(Vec<Vec<FormulaValue>>),
}

impl FormulaValue {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        FormulaValue::Text(s.into())
    }

    /// Check if the value is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, FormulaValue::Empty)
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Check if the value is an array (Vector or Table)
    pub fn is_array(&self) -> bool {
        matches!(self, FormulaValue::Vector(_) | FormulaValue::Table(_))
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FormulaValue::Empty => "empty",
            FormulaValue::Boolean(_) => "boolean",
            FormulaValue::Number(_) => "number",
            FormulaValue::Text(_) => "text",
            FormulaValue::Error(_) => "error",
            FormulaValue::Vector(_) => "vector",
            FormulaValue::Table(_) => "table",
        }
    }
}

impl Default for FormulaValue {
    fn default() -> Self {
        FormulaValue::Empty
    }
}

impl fmt::Display for FormulaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaValue::Empty => write!(f, ""),
            FormulaValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            FormulaValue::Number(n) => {
                // Format like Excel: integral values without a trailing ".0"
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            FormulaValue::Text(s) => write!(f, "{}", s),
            FormulaValue::Error(e) => write!(f, "{}", e),
            // Arrays have no scalar rendering
            FormulaValue::Vector(_) | FormulaValue::Table(_) => write!(f, "#VALUE!"),
        }
    }
}

impl From<bool> for FormulaValue {
    fn from(b: bool) -> Self {
        FormulaValue::Boolean(b)
    }
}

impl From<i32> for FormulaValue {
    fn from(n: i32) -> Self {
        FormulaValue::Number(n as f64)
    }
}

impl From<i64> for FormulaValue {
    fn from(n: i64) -> Self {
        FormulaValue::Number(n as f64)
    }
}

impl From<f64> for FormulaValue {
    fn from(n: f64) -> Self {
        FormulaValue::Number(n)
    }
}

impl From<&str> for FormulaValue {
    fn from(s: &str) -> Self {
        FormulaValue::text(s)
    }
}

impl From<String> for FormulaValue {
    fn from(s: String) -> Self {
        FormulaValue::Text(s)
    }
}

impl From<CellError> for FormulaValue {
    fn from(e: CellError) -> Self {
        FormulaValue::Error(e)
    }
}

/// Excel error values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellError {
    /// #NULL! - Incorrect range operator
    Null,
    /// #DIV/0! - Division by zero
    Div0,
    /// #VALUE! - Wrong type of argument or operand
    Value,
    /// #REF! - Invalid cell reference
    Ref,
    /// #NAME? - Unrecognized formula name
    Name,
    /// #NUM! - Invalid numeric value
    Num,
    /// #N/A - Value not available
    Na,
    /// #CIRC! - Circular reference reported by the caller
    Circ,
}

impl CellError {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Null => "#NULL!",
            CellError::Div0 => "#DIV/0!",
            CellError::Value => "#VALUE!",
            CellError::Ref => "#REF!",
            CellError::Name => "#NAME?",
            CellError::Num => "#NUM!",
            CellError::Na => "#N/A",
            CellError::Circ => "#CIRC!",
        }
    }

    /// Parse an error string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "#NULL!" => Some(CellError::Null),
            "#DIV/0!" => Some(CellError::Div0),
            "#VALUE!" => Some(CellError::Value),
            "#REF!" => Some(CellError::Ref),
            "#NAME?" => Some(CellError::Name),
            "#NUM!" => Some(CellError::Num),
            "#N/A" => Some(CellError::Na),
            "#CIRC!" => Some(CellError::Circ),
            _ => None,
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(FormulaValue::from(42), FormulaValue::Number(42.0));
        assert_eq!(FormulaValue::from(3.14), FormulaValue::Number(3.14));
        assert_eq!(FormulaValue::from(true), FormulaValue::Boolean(true));
        assert_eq!(FormulaValue::from("hello"), FormulaValue::text("hello"));
        assert_eq!(
            FormulaValue::from(CellError::Na),
            FormulaValue::Error(CellError::Na)
        );
    }

    #[test]
    fn test_cell_error_display() {
        assert_eq!(CellError::Div0.to_string(), "#DIV/0!");
        assert_eq!(CellError::Value.to_string(), "#VALUE!");
        assert_eq!(CellError::Na.to_string(), "#N/A");
        assert_eq!(CellError::Circ.to_string(), "#CIRC!");
    }

    #[test]
    fn test_cell_error_parse() {
        assert_eq!(CellError::from_str("#DIV/0!"), Some(CellError::Div0));
        assert_eq!(CellError::from_str("#n/a"), Some(CellError::Na)); // Case insensitive
        assert_eq!(CellError::from_str("invalid"), None);
    }

    #[test]
    fn test_display_number_formatting() {
        assert_eq!(FormulaValue::Number(42.0).to_string(), "42");
        assert_eq!(FormulaValue::Number(3.5).to_string(), "3.5");
        assert_eq!(FormulaValue::Boolean(true).to_string(), "TRUE");
        assert_eq!(FormulaValue::Empty.to_string(), "");
    }
}
