//! Text functions

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use heron_calc_core::{
    flatten_values, parse_number, parse_number_with, to_text, CellError, FormulaValue,
};

fn text_arg(v: &FormulaValue) -> Result<String, CellError> {
    if v.is_array() {
        return Err(CellError::Value);
    }
    to_text(v)
}

fn num_arg(v: &FormulaValue) -> Result<f64, CellError> {
    if v.is_array() {
        return Err(CellError::Value);
    }
    heron_calc_core::to_number(v)
}

/// LEN(text) - character count, not byte count
pub fn fn_len(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match text_arg(args.get(0).unwrap()) {
        Ok(s) => Ok(FormulaValue::Number(s.chars().count() as f64)),
        Err(e) => Ok(FormulaValue::Error(e)),
    }
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let calc = || -> Result<String, CellError> {
        let s = text_arg(args.get(0).unwrap())?;
        let count = match args.get(1) {
            None | Some(FormulaValue::Empty) => 1,
            Some(v) => {
                let n = num_arg(v)?;
                if n < 0.0 {
                    return Err(CellError::Value);
                }
                n.trunc() as usize
            }
        };
        Ok(s.chars().take(count).collect())
    };
    Ok(text_result(calc()))
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let calc = || -> Result<String, CellError> {
        let s = text_arg(args.get(0).unwrap())?;
        let count = match args.get(1) {
            None | Some(FormulaValue::Empty) => 1,
            Some(v) => {
                let n = num_arg(v)?;
                if n < 0.0 {
                    return Err(CellError::Value);
                }
                n.trunc() as usize
            }
        };
        let chars: Vec<char> = s.chars().collect();
        let start = chars.len().saturating_sub(count);
        Ok(chars[start..].iter().collect())
    };
    Ok(text_result(calc()))
}

/// MID(text, start_num, num_chars) - start_num is 1-based
pub fn fn_mid(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let calc = || -> Result<String, CellError> {
        let s = text_arg(args.get(0).unwrap())?;
        let start = num_arg(args.get(1).unwrap())?.trunc() as i64;
        let count = num_arg(args.get(2).unwrap())?.trunc() as i64;
        if start < 1 || count < 0 {
            return Err(CellError::Value);
        }
        Ok(s.chars()
            .skip((start - 1) as usize)
            .take(count as usize)
            .collect())
    };
    Ok(text_result(calc()))
}

/// LOWER(text)
pub fn fn_lower(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match text_arg(args.get(0).unwrap()) {
        Ok(s) => Ok(FormulaValue::Text(s.to_lowercase())),
        Err(e) => Ok(FormulaValue::Error(e)),
    }
}

/// UPPER(text)
pub fn fn_upper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match text_arg(args.get(0).unwrap()) {
        Ok(s) => Ok(FormulaValue::Text(s.to_uppercase())),
        Err(e) => Ok(FormulaValue::Error(e)),
    }
}

/// TRIM(text) - strips ends and collapses interior runs of spaces
pub fn fn_trim(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match text_arg(args.get(0).unwrap()) {
        Ok(s) => Ok(FormulaValue::Text(
            s.split_whitespace().collect::<Vec<_>>().join(" "),
        )),
        Err(e) => Ok(FormulaValue::Error(e)),
    }
}

/// CONCAT(text1, [text2], ...) - arrays are flattened in reading order
pub fn fn_concat(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut out = String::new();
    for v in flatten_values(args) {
        match to_text(&v) {
            Ok(s) => out.push_str(&s),
            Err(e) => return Ok(FormulaValue::Error(e)),
        }
    }
    Ok(FormulaValue::Text(out))
}

/// EXACT(text1, text2) - case-sensitive equality
pub fn fn_exact(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let calc = || -> Result<bool, CellError> {
        let a = text_arg(args.get(0).unwrap())?;
        let b = text_arg(args.get(1).unwrap())?;
        Ok(a == b)
    };
    match calc() {
        Ok(b) => Ok(FormulaValue::Boolean(b)),
        Err(e) => Ok(FormulaValue::Error(e)),
    }
}

/// REPT(text, number_times)
pub fn fn_rept(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let calc = || -> Result<String, CellError> {
        let s = text_arg(args.get(0).unwrap())?;
        let times = num_arg(args.get(1).unwrap())?.trunc() as i64;
        if times < 0 {
            return Err(CellError::Value);
        }
        // Excel caps cell text at 32767 characters
        if s.chars().count() as i64 * times > 32_767 {
            return Err(CellError::Value);
        }
        Ok(s.repeat(times as usize))
    };
    Ok(text_result(calc()))
}

/// SUBSTITUTE(text, old_text, new_text, [instance_num])
pub fn fn_substitute(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let calc = || -> Result<String, CellError> {
        let s = text_arg(args.get(0).unwrap())?;
        let old = text_arg(args.get(1).unwrap())?;
        let new = text_arg(args.get(2).unwrap())?;
        if old.is_empty() {
            return Ok(s);
        }
        match args.get(3) {
            None | Some(FormulaValue::Empty) => Ok(s.replace(&old, &new)),
            Some(v) => {
                let instance = num_arg(v)?.trunc() as i64;
                if instance < 1 {
                    return Err(CellError::Value);
                }
                let mut seen = 0;
                let mut from = 0;
                while let Some(pos) = s[from..].find(&old) {
                    seen += 1;
                    let at = from + pos;
                    if seen == instance {
                        let mut out = String::with_capacity(s.len());
                        out.push_str(&s[..at]);
                        out.push_str(&new);
                        out.push_str(&s[at + old.len()..]);
                        return Ok(out);
                    }
                    from = at + old.len();
                }
                Ok(s)
            }
        }
    };
    Ok(text_result(calc()))
}

/// CHAR(number) - codes 1..=255, Latin-1
pub fn fn_char(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let calc = || -> Result<String, CellError> {
        let code = num_arg(args.get(0).unwrap())?.trunc() as i64;
        if !(1..=255).contains(&code) {
            return Err(CellError::Value);
        }
        Ok(char::from_u32(code as u32)
            .map(|c| c.to_string())
            .unwrap_or_default())
    };
    Ok(text_result(calc()))
}

/// CODE(text) - code point of the first character
pub fn fn_code(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let calc = || -> Result<f64, CellError> {
        let s = text_arg(args.get(0).unwrap())?;
        match s.chars().next() {
            Some(c) => Ok(c as u32 as f64),
            None => Err(CellError::Value),
        }
    };
    match calc() {
        Ok(n) => Ok(FormulaValue::Number(n)),
        Err(e) => Ok(FormulaValue::Error(e)),
    }
}

/// VALUE(text)
///
/// Unlike the implicit coercion, VALUE("") is #VALUE!, not 0.
pub fn fn_value(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match args.get(0).unwrap() {
        FormulaValue::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaValue::Text(s) => match parse_number(s) {
            Some(n) => Ok(FormulaValue::Number(n)),
            None => Ok(FormulaValue::Error(CellError::Value)),
        },
        FormulaValue::Error(e) => Ok(FormulaValue::Error(*e)),
        _ => Ok(FormulaValue::Error(CellError::Value)),
    }
}

/// NUMBERVALUE(text, [decimal_separator], [group_separator])
///
/// The locale-parameterized cousin of VALUE. Separators default to "." and
/// ","; only their first character is used; an empty text yields 0.
pub fn fn_numbervalue(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let calc = || -> Result<f64, CellError> {
        let text = text_arg(args.get(0).unwrap())?;
        let decimal_sep = separator_arg(args.get(1), '.')?;
        let group_sep = separator_arg(args.get(2), ',')?;
        if decimal_sep == group_sep {
            return Err(CellError::Value);
        }
        if text.trim().is_empty() {
            return Ok(0.0);
        }
        parse_number_with(&text, decimal_sep, group_sep).ok_or(CellError::Value)
    };
    match calc() {
        Ok(n) => Ok(FormulaValue::Number(n)),
        Err(e) => Ok(FormulaValue::Error(e)),
    }
}

fn separator_arg(arg: Option<&FormulaValue>, default: char) -> Result<char, CellError> {
    match arg {
        None | Some(FormulaValue::Empty) => Ok(default),
        Some(v) => {
            let s = text_arg(v)?;
            s.chars().next().ok_or(CellError::Value)
        }
    }
}

/// T(value) - text passes through, everything else becomes ""
pub fn fn_t(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match args.get(0).unwrap() {
        FormulaValue::Text(s) => Ok(FormulaValue::Text(s.clone())),
        FormulaValue::Error(e) => Ok(FormulaValue::Error(*e)),
        _ => Ok(FormulaValue::Text(String::new())),
    }
}

/// N(value) - numbers pass through, booleans become 1/0, text becomes 0
pub fn fn_n(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match args.get(0).unwrap() {
        FormulaValue::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaValue::Boolean(b) => Ok(FormulaValue::Number(if *b { 1.0 } else { 0.0 })),
        FormulaValue::Error(e) => Ok(FormulaValue::Error(*e)),
        _ => Ok(FormulaValue::Number(0.0)),
    }
}

fn text_result(result: Result<String, CellError>) -> FormulaValue {
    match result {
        Ok(s) => FormulaValue::Text(s),
        Err(e) => FormulaValue::Error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> EvaluationContext {
        EvaluationContext::new()
    }

    #[test]
    fn test_len_left_right_mid() {
        assert_eq!(
            fn_len(&[FormulaValue::text("abc")], &ctx()).unwrap(),
            FormulaValue::Number(3.0)
        );
        assert_eq!(
            fn_left(&[FormulaValue::text("abcdef"), FormulaValue::Number(2.0)], &ctx()).unwrap(),
            FormulaValue::text("ab")
        );
        assert_eq!(
            fn_right(&[FormulaValue::text("abcdef"), FormulaValue::Number(3.0)], &ctx()).unwrap(),
            FormulaValue::text("def")
        );
        assert_eq!(
            fn_mid(
                &[
                    FormulaValue::text("abcdef"),
                    FormulaValue::Number(2.0),
                    FormulaValue::Number(3.0)
                ],
                &ctx()
            )
            .unwrap(),
            FormulaValue::text("bcd")
        );
    }

    #[test]
    fn test_trim_collapses_runs() {
        assert_eq!(
            fn_trim(&[FormulaValue::text("  a   b  ")], &ctx()).unwrap(),
            FormulaValue::text("a b")
        );
    }

    #[test]
    fn test_concat_flattens() {
        let got = fn_concat(
            &[
                FormulaValue::text("a"),
                FormulaValue::Number(1.0),
                FormulaValue::Boolean(true),
            ],
            &ctx(),
        )
        .unwrap();
        assert_eq!(got, FormulaValue::text("a1TRUE"));

        let table = FormulaValue::Table(vec![
            vec![FormulaValue::text("a"), FormulaValue::text("b")],
            vec![FormulaValue::text("c"), FormulaValue::text("d")],
        ]);
        assert_eq!(
            fn_concat(&[table], &ctx()).unwrap(),
            FormulaValue::text("abcd")
        );
    }

    #[test]
    fn test_substitute() {
        let got = fn_substitute(
            &[
                FormulaValue::text("a-b-c"),
                FormulaValue::text("-"),
                FormulaValue::text("+"),
            ],
            &ctx(),
        )
        .unwrap();
        assert_eq!(got, FormulaValue::text("a+b+c"));

        let got = fn_substitute(
            &[
                FormulaValue::text("a-b-c"),
                FormulaValue::text("-"),
                FormulaValue::text("+"),
                FormulaValue::Number(2.0),
            ],
            &ctx(),
        )
        .unwrap();
        assert_eq!(got, FormulaValue::text("a-b+c"));
    }

    #[test]
    fn test_char_code_round_trip() {
        assert_eq!(
            fn_char(&[FormulaValue::Number(65.0)], &ctx()).unwrap(),
            FormulaValue::text("A")
        );
        assert_eq!(
            fn_code(&[FormulaValue::text("A")], &ctx()).unwrap(),
            FormulaValue::Number(65.0)
        );
        assert_eq!(
            fn_char(&[FormulaValue::Number(0.0)], &ctx()).unwrap(),
            FormulaValue::Error(CellError::Value)
        );
    }

    #[test]
    fn test_value_and_numbervalue() {
        assert_eq!(
            fn_value(&[FormulaValue::text("1,234.5")], &ctx()).unwrap(),
            FormulaValue::Number(1234.5)
        );
        assert_eq!(
            fn_value(&[FormulaValue::text("abc")], &ctx()).unwrap(),
            FormulaValue::Error(CellError::Value)
        );
        assert_eq!(
            fn_value(&[FormulaValue::text("")], &ctx()).unwrap(),
            FormulaValue::Error(CellError::Value)
        );

        // European separators
        let got = fn_numbervalue(
            &[
                FormulaValue::text("1.234,5"),
                FormulaValue::text(","),
                FormulaValue::text("."),
            ],
            &ctx(),
        )
        .unwrap();
        assert_eq!(got, FormulaValue::Number(1234.5));

        assert_eq!(
            fn_numbervalue(&[FormulaValue::text("")], &ctx()).unwrap(),
            FormulaValue::Number(0.0)
        );
        assert_eq!(
            fn_numbervalue(
                &[
                    FormulaValue::text("1"),
                    FormulaValue::text("."),
                    FormulaValue::text(".")
                ],
                &ctx()
            )
            .unwrap(),
            FormulaValue::Error(CellError::Value)
        );
    }

    #[test]
    fn test_t_and_n() {
        assert_eq!(
            fn_t(&[FormulaValue::text("x")], &ctx()).unwrap(),
            FormulaValue::text("x")
        );
        assert_eq!(
            fn_t(&[FormulaValue::Number(5.0)], &ctx()).unwrap(),
            FormulaValue::text("")
        );
        assert_eq!(
            fn_n(&[FormulaValue::Boolean(true)], &ctx()).unwrap(),
            FormulaValue::Number(1.0)
        );
        assert_eq!(
            fn_n(&[FormulaValue::text("text")], &ctx()).unwrap(),
            FormulaValue::Number(0.0)
        );
    }
}
