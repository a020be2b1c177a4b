//! Lookup functions
//!
//! VLOOKUP/HLOOKUP/INDEX/MATCH plus the modern XLOOKUP/XMATCH family, all
//! built on one shared match engine. Match policies and search directions
//! use a common vocabulary:
//!
//! - match mode 0 = exact, 1 = approximate over ascending data (largest
//!   value <= target), -1 = approximate over descending data (smallest
//!   value >= target), 2 = wildcard.
//! - search mode 1 = first-to-last, -1 = last-to-first, 2/-2 = binary
//!   search over ascending/descending data.
//!
//! Approximate modes assume the caller sorted the data; the engine does not
//! validate sortedness, it stops scanning once sort order is violated.

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::functions::wildcard::{contains_wildcard, WildcardPattern};
use heron_calc_core::{compare_values, first_error, to_text, CellError, FormulaValue};
use heron_calc_core::{MAX_COLS, MAX_ROWS};
use lazy_regex::regex;
use std::cmp::Ordering;

fn to_i64_trunc(v: &FormulaValue) -> Option<i64> {
    heron_calc_core::to_number(v).ok().map(|n| n.trunc() as i64)
}

/// How candidates are matched against the lookup value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    /// Largest value <= target; data sorted ascending
    ApproxAscending,
    /// Smallest value >= target; data sorted descending
    ApproxDescending,
    Wildcard,
}

impl MatchMode {
    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(MatchMode::Exact),
            1 => Some(MatchMode::ApproxAscending),
            -1 => Some(MatchMode::ApproxDescending),
            2 => Some(MatchMode::Wildcard),
            _ => None,
        }
    }
}

/// Scan order over the candidate sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    FirstToLast,
    LastToFirst,
    /// Binary search; data sorted ascending
    BinaryAscending,
    /// Binary search; data sorted descending
    BinaryDescending,
}

impl SearchMode {
    fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(SearchMode::FirstToLast),
            -1 => Some(SearchMode::LastToFirst),
            2 => Some(SearchMode::BinaryAscending),
            -2 => Some(SearchMode::BinaryDescending),
            _ => None,
        }
    }
}

/// Find the 0-based index of the match, or `#N/A`
///
/// The shared engine behind MATCH, XMATCH, XLOOKUP, and LOOKUP.
pub fn find_match(
    target: &FormulaValue,
    values: &[FormulaValue],
    mode: MatchMode,
    search: SearchMode,
) -> Result<usize, CellError> {
    if values.is_empty() {
        return Err(CellError::Na);
    }

    match mode {
        MatchMode::Wildcard => {
            // Binary search cannot drive a pattern scan
            if matches!(
                search,
                SearchMode::BinaryAscending | SearchMode::BinaryDescending
            ) {
                return Err(CellError::Value);
            }
            let pattern_text = to_text(target)?;
            match WildcardPattern::new(&pattern_text) {
                Some(pattern) => {
                    let matches_at = |i: usize| match &values[i] {
                        FormulaValue::Text(s) => pattern.matches(s),
                        _ => false,
                    };
                    scan_indices(values.len(), search).find(|&i| matches_at(i))
                }
                // Pattern without wildcards degrades to exact matching
                None => scan_indices(values.len(), search).find(|&i| is_equal(target, &values[i])),
            }
            .ok_or(CellError::Na)
        }

        MatchMode::Exact => match search {
            SearchMode::FirstToLast | SearchMode::LastToFirst => {
                scan_indices(values.len(), search)
                    .find(|&i| is_equal(target, &values[i]))
                    .ok_or(CellError::Na)
            }
            SearchMode::BinaryAscending => binary_find(target, values, true)
                .0
                .ok_or(CellError::Na),
            SearchMode::BinaryDescending => binary_find(target, values, false)
                .0
                .ok_or(CellError::Na),
        },

        MatchMode::ApproxAscending => match search {
            SearchMode::BinaryAscending | SearchMode::BinaryDescending => {
                let (exact, boundary) = binary_find(target, values, true);
                match exact {
                    Some(i) => Ok(i),
                    // The probe boundary is the insertion point: everything
                    // before it is < target, so the best "largest <=" sits
                    // just left of it.
                    None if boundary > 0 => Ok(boundary - 1),
                    None => Err(CellError::Na),
                }
            }
            _ => {
                let mut best: Option<usize> = None;
                for (i, v) in values.iter().enumerate() {
                    match compare_values(v, target) {
                        Ok(Ordering::Equal) => best = Some(i),
                        Ok(Ordering::Less) => best = Some(i),
                        // Sorted-ascending assumption: stop at the first
                        // element greater than the target.
                        Ok(Ordering::Greater) => break,
                        Err(_) => continue,
                    }
                }
                best.ok_or(CellError::Na)
            }
        },

        MatchMode::ApproxDescending => match search {
            SearchMode::BinaryAscending | SearchMode::BinaryDescending => {
                let (exact, boundary) = binary_find(target, values, false);
                match exact {
                    Some(i) => Ok(i),
                    None if boundary > 0 => Ok(boundary - 1),
                    None => Err(CellError::Na),
                }
            }
            _ => {
                let mut best: Option<usize> = None;
                for (i, v) in values.iter().enumerate() {
                    match compare_values(v, target) {
                        Ok(Ordering::Equal) => best = Some(i),
                        Ok(Ordering::Greater) => best = Some(i),
                        // Sorted-descending assumption
                        Ok(Ordering::Less) => break,
                        Err(_) => continue,
                    }
                }
                best.ok_or(CellError::Na)
            }
        },
    }
}

fn scan_indices(len: usize, search: SearchMode) -> Box<dyn Iterator<Item = usize>> {
    match search {
        SearchMode::LastToFirst => Box::new((0..len).rev()),
        _ => Box::new(0..len),
    }
}

fn is_equal(target: &FormulaValue, candidate: &FormulaValue) -> bool {
    matches!(compare_values(candidate, target), Ok(Ordering::Equal))
}

/// Textbook binary search over the comparator
///
/// Returns `(exact_hit, insertion_point)`. On a miss the insertion point is
/// the index where the target would be placed to keep the assumed sort
/// order; approximate modes reuse it to resolve nearest-match without a
/// second scan.
fn binary_find(
    target: &FormulaValue,
    values: &[FormulaValue],
    ascending: bool,
) -> (Option<usize>, usize) {
    let mut lo = 0usize;
    let mut hi = values.len();
    while lo < hi {
        let mid = (lo + hi) / 2;
        let ord = match compare_values(&values[mid], target) {
            Ok(o) => o,
            // Incomparable candidates (stray errors) are treated as below
            // the target so the probe keeps moving.
            Err(_) => Ordering::Less,
        };
        let ord = if ascending { ord } else { ord.reverse() };
        match ord {
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
            Ordering::Equal => return (Some(mid), mid),
        }
    }
    (None, lo)
}

fn table_dims(table: &[Vec<FormulaValue>]) -> (usize, usize) {
    let rows = table.len();
    let cols = table.first().map(|r| r.len()).unwrap_or(0);
    (rows, cols)
}

/// View a Vector, or a single-row/single-column Table, as a flat candidate list
fn as_lookup_vector(v: &FormulaValue) -> Option<Vec<FormulaValue>> {
    match v {
        FormulaValue::Vector(items) => Some(items.clone()),
        FormulaValue::Table(rows) => {
            let (nrows, ncols) = table_dims(rows);
            if nrows == 1 {
                Some(rows[0].clone())
            } else if ncols == 1 {
                Some(
                    rows.iter()
                        .map(|r| r.first().cloned().unwrap_or(FormulaValue::Empty))
                        .collect(),
                )
            } else {
                None
            }
        }
        _ => None,
    }
}

/// MATCH(lookup_value, lookup_array, [match_type])
///
/// Returns the 1-based position of the match. match_type defaults to 1
/// (largest value <= lookup_value over ascending data); 0 is exact (with
/// wildcard support for text patterns); -1 assumes descending data.
pub fn fn_match(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let lookup_value = args.get(0).unwrap();
    if let FormulaValue::Error(e) = lookup_value {
        return Ok(FormulaValue::Error(*e));
    }
    if lookup_value.is_array() {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    let values = match as_lookup_vector(args.get(1).unwrap()) {
        Some(v) => v,
        None => return Ok(FormulaValue::Error(CellError::Na)),
    };

    let match_type = match args.get(2) {
        None | Some(FormulaValue::Empty) => 1,
        Some(v) => {
            if let FormulaValue::Error(e) = v {
                return Ok(FormulaValue::Error(*e));
            }
            match to_i64_trunc(v) {
                Some(t) => t,
                None => return Ok(FormulaValue::Error(CellError::Value)),
            }
        }
    };

    let mode = match match_type {
        0 => {
            // MATCH in exact mode honors wildcards in text lookups
            if matches!(lookup_value, FormulaValue::Text(s) if contains_wildcard(s)) {
                MatchMode::Wildcard
            } else {
                MatchMode::Exact
            }
        }
        t if t > 0 => MatchMode::ApproxAscending,
        _ => MatchMode::ApproxDescending,
    };

    match find_match(lookup_value, &values, mode, SearchMode::FirstToLast) {
        Ok(i) => Ok(FormulaValue::Number((i + 1) as f64)),
        Err(e) => Ok(FormulaValue::Error(e)),
    }
}

/// XMATCH(lookup_value, lookup_array, [match_mode], [search_mode])
///
/// match_mode: 0 exact (default), 1 approximate ascending, -1 approximate
/// descending, 2 wildcard. search_mode: 1 first-to-last (default), -1
/// last-to-first, 2/-2 binary over ascending/descending data.
pub fn fn_xmatch(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let lookup_value = args.get(0).unwrap();
    if let FormulaValue::Error(e) = lookup_value {
        return Ok(FormulaValue::Error(*e));
    }
    if lookup_value.is_array() {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    let values = match as_lookup_vector(args.get(1).unwrap()) {
        Some(v) => v,
        None => return Ok(FormulaValue::Error(CellError::Value)),
    };

    let (mode, search) = match parse_modes(args.get(2), args.get(3)) {
        Ok(pair) => pair,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    match find_match(lookup_value, &values, mode, search) {
        Ok(i) => Ok(FormulaValue::Number((i + 1) as f64)),
        Err(e) => Ok(FormulaValue::Error(e)),
    }
}

fn parse_modes(
    match_arg: Option<&FormulaValue>,
    search_arg: Option<&FormulaValue>,
) -> Result<(MatchMode, SearchMode), CellError> {
    let mode = match match_arg {
        None => MatchMode::Exact,
        Some(FormulaValue::Empty) => MatchMode::Exact,
        Some(FormulaValue::Error(e)) => return Err(*e),
        Some(v) => to_i64_trunc(v)
            .and_then(MatchMode::from_code)
            .ok_or(CellError::Value)?,
    };
    let search = match search_arg {
        None => SearchMode::FirstToLast,
        Some(FormulaValue::Empty) => SearchMode::FirstToLast,
        Some(FormulaValue::Error(e)) => return Err(*e),
        Some(v) => to_i64_trunc(v)
            .and_then(SearchMode::from_code)
            .ok_or(CellError::Value)?,
    };
    Ok((mode, search))
}

/// XLOOKUP(lookup_value, lookup_array, return_array, [if_not_found], [match_mode], [search_mode])
pub fn fn_xlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let lookup_value = args.get(0).unwrap();
    if let FormulaValue::Error(e) = lookup_value {
        return Ok(FormulaValue::Error(*e));
    }
    if lookup_value.is_array() {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    let values = match as_lookup_vector(args.get(1).unwrap()) {
        Some(v) => v,
        None => return Ok(FormulaValue::Error(CellError::Value)),
    };

    let (mode, search) = match parse_modes(args.get(4), args.get(5)) {
        Ok(pair) => pair,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    let idx = match find_match(lookup_value, &values, mode, search) {
        Ok(i) => i,
        Err(CellError::Na) => {
            // if_not_found substitutes for #N/A only
            return match args.get(3) {
                Some(v) if !v.is_empty() => Ok(v.clone()),
                _ => Ok(FormulaValue::Error(CellError::Na)),
            };
        }
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    select_return(args.get(2).unwrap(), idx, values.len())
}

/// Pull the row/column/element aligned with the matched position
fn select_return(
    return_array: &FormulaValue,
    idx: usize,
    lookup_len: usize,
) -> FormulaResult<FormulaValue> {
    match return_array {
        FormulaValue::Vector(items) => {
            if items.len() != lookup_len {
                return Ok(FormulaValue::Error(CellError::Value));
            }
            Ok(items[idx].clone())
        }
        FormulaValue::Table(rows) => {
            let (nrows, ncols) = table_dims(rows);
            if nrows == lookup_len {
                let row = &rows[idx];
                if ncols == 1 {
                    Ok(row[0].clone())
                } else {
                    Ok(FormulaValue::Vector(row.clone()))
                }
            } else if ncols == lookup_len {
                let col: Vec<FormulaValue> = rows
                    .iter()
                    .map(|r| r.get(idx).cloned().unwrap_or(FormulaValue::Empty))
                    .collect();
                if nrows == 1 {
                    Ok(col[0].clone())
                } else {
                    Ok(FormulaValue::Vector(col))
                }
            } else {
                Ok(FormulaValue::Error(CellError::Value))
            }
        }
        // A scalar return array only works for single-element lookups
        other if lookup_len == 1 => Ok(other.clone()),
        _ => Ok(FormulaValue::Error(CellError::Value)),
    }
}

/// VLOOKUP(lookup_value, table_array, col_index_num, [range_lookup])
///
/// Searches the first column of the table. Exact mode (range_lookup FALSE)
/// honors wildcards when the lookup value itself contains `*`/`?`.
/// Approximate mode (TRUE or omitted) assumes the first column is sorted
/// ascending and returns the last row whose key is <= the target; a miss
/// below the first key falls back to the first row rather than erroring.
pub fn fn_vlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lookup_table(args, Axis::Row)
}

/// HLOOKUP(lookup_value, table_array, row_index_num, [range_lookup])
///
/// VLOOKUP transposed: searches the first row, indexes down the matched
/// column.
pub fn fn_hlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lookup_table(args, Axis::Column)
}

#[derive(Clone, Copy, PartialEq)]
enum Axis {
    Row,
    Column,
}

fn lookup_table(args: &[FormulaValue], axis: Axis) -> FormulaResult<FormulaValue> {
    if let Some(e) = first_error(args) {
        return Ok(FormulaValue::Error(e));
    }

    let lookup_value = args.get(0).unwrap();
    if lookup_value.is_array() {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    let table: Vec<Vec<FormulaValue>> = match args.get(1).unwrap() {
        FormulaValue::Table(rows) => rows.clone(),
        FormulaValue::Vector(items) => vec![items.clone()],
        _ => return Ok(FormulaValue::Error(CellError::Value)),
    };
    let (nrows, ncols) = table_dims(&table);
    if nrows == 0 || ncols == 0 {
        return Ok(FormulaValue::Error(CellError::Na));
    }

    let index = match to_i64_trunc(args.get(2).unwrap()) {
        Some(i) => i,
        None => return Ok(FormulaValue::Error(CellError::Value)),
    };
    if index < 1 {
        return Ok(FormulaValue::Error(CellError::Value));
    }
    let index0 = (index - 1) as usize;
    let limit = if axis == Axis::Row { ncols } else { nrows };
    if index0 >= limit {
        return Ok(FormulaValue::Error(CellError::Ref));
    }

    let range_lookup = match args.get(3) {
        None | Some(FormulaValue::Empty) => true,
        Some(v) => match heron_calc_core::to_boolean(v) {
            Ok(b) => b,
            Err(e) => return Ok(FormulaValue::Error(e)),
        },
    };

    // Keys are the first column (VLOOKUP) or first row (HLOOKUP)
    let keys: Vec<FormulaValue> = if axis == Axis::Row {
        table
            .iter()
            .map(|r| r.first().cloned().unwrap_or(FormulaValue::Empty))
            .collect()
    } else {
        table[0].clone()
    };

    let pos = if range_lookup {
        // Last key <= target, with the first element as defensive default
        // when even the first key exceeds the target.
        match find_match(
            lookup_value,
            &keys,
            MatchMode::ApproxAscending,
            SearchMode::FirstToLast,
        ) {
            Ok(i) => i,
            Err(_) => 0,
        }
    } else {
        let mode = if matches!(lookup_value, FormulaValue::Text(s) if contains_wildcard(s)) {
            MatchMode::Wildcard
        } else {
            MatchMode::Exact
        };
        match find_match(lookup_value, &keys, mode, SearchMode::FirstToLast) {
            Ok(i) => i,
            Err(e) => return Ok(FormulaValue::Error(e)),
        }
    };

    let result = if axis == Axis::Row {
        table[pos].get(index0).cloned()
    } else {
        table.get(index0).and_then(|r| r.get(pos).cloned())
    };
    Ok(result.unwrap_or(FormulaValue::Empty))
}

/// LOOKUP(lookup_value, lookup_vector, [result_vector])
///
/// Vector form of the approximate-ascending search. The array form (second
/// argument is a table, no third argument) searches the first column and
/// returns from the last column.
pub fn fn_lookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let lookup_value = args.get(0).unwrap();
    if let FormulaValue::Error(e) = lookup_value {
        return Ok(FormulaValue::Error(*e));
    }
    if lookup_value.is_array() {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    let array = args.get(1).unwrap();
    if let FormulaValue::Error(e) = array {
        return Ok(FormulaValue::Error(*e));
    }

    // Array form: search the first column (or first row when the table is
    // wider than tall), return from the opposite edge.
    if args.len() == 2 {
        if let FormulaValue::Table(rows) = array {
            let (nrows, ncols) = table_dims(rows);
            if nrows == 0 || ncols == 0 {
                return Ok(FormulaValue::Error(CellError::Na));
            }
            if ncols > nrows {
                let keys = rows[0].clone();
                return match find_match(
                    lookup_value,
                    &keys,
                    MatchMode::ApproxAscending,
                    SearchMode::FirstToLast,
                ) {
                    Ok(i) => Ok(rows[nrows - 1].get(i).cloned().unwrap_or(FormulaValue::Empty)),
                    Err(e) => Ok(FormulaValue::Error(e)),
                };
            }
            let keys: Vec<FormulaValue> = rows
                .iter()
                .map(|r| r.first().cloned().unwrap_or(FormulaValue::Empty))
                .collect();
            return match find_match(
                lookup_value,
                &keys,
                MatchMode::ApproxAscending,
                SearchMode::FirstToLast,
            ) {
                Ok(i) => Ok(rows[i].last().cloned().unwrap_or(FormulaValue::Empty)),
                Err(e) => Ok(FormulaValue::Error(e)),
            };
        }
    }

    let values = match as_lookup_vector(array) {
        Some(v) => v,
        None => return Ok(FormulaValue::Error(CellError::Value)),
    };

    let idx = match find_match(
        lookup_value,
        &values,
        MatchMode::ApproxAscending,
        SearchMode::FirstToLast,
    ) {
        Ok(i) => i,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    match args.get(2) {
        Some(result_arg) => {
            let results = match as_lookup_vector(result_arg) {
                Some(v) => v,
                None => return Ok(FormulaValue::Error(CellError::Value)),
            };
            Ok(results.get(idx).cloned().unwrap_or(FormulaValue::Empty))
        }
        None => Ok(values[idx].clone()),
    }
}

/// INDEX(array, row_num, [column_num])
///
/// For a 2-D table, row 0 with a column index returns the whole column and
/// column 0 with a row index returns the whole row; both nonzero return a
/// scalar. Any out-of-bounds axis is `#REF!`.
pub fn fn_index(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    if let Some(e) = first_error(args) {
        return Ok(FormulaValue::Error(e));
    }

    let row_num = match to_i64_trunc(args.get(1).unwrap()) {
        Some(n) => n,
        None => return Ok(FormulaValue::Error(CellError::Value)),
    };
    let col_num = match args.get(2) {
        None | Some(FormulaValue::Empty) => None,
        Some(v) => match to_i64_trunc(v) {
            Some(n) => Some(n),
            None => return Ok(FormulaValue::Error(CellError::Value)),
        },
    };
    if row_num < 0 || col_num.is_some_and(|c| c < 0) {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    match args.get(0).unwrap() {
        FormulaValue::Vector(items) => {
            // 1-D input: the row number indexes the vector
            if items.is_empty() {
                return Ok(FormulaValue::Error(CellError::Ref));
            }
            if col_num.is_some_and(|c| c > 1) {
                return Ok(FormulaValue::Error(CellError::Ref));
            }
            if row_num == 0 {
                return Ok(FormulaValue::Vector(items.clone()));
            }
            match items.get((row_num - 1) as usize) {
                Some(v) => Ok(v.clone()),
                None => Ok(FormulaValue::Error(CellError::Ref)),
            }
        }
        FormulaValue::Table(rows) => {
            let (nrows, ncols) = table_dims(rows);
            if nrows == 0 || ncols == 0 {
                return Ok(FormulaValue::Error(CellError::Ref));
            }
            let col = col_num.unwrap_or(if nrows == 1 { row_num } else { 1 });
            let (row, col) = if col_num.is_none() && nrows == 1 {
                // Single-row table with one index: index selects the column
                (1, col)
            } else {
                (row_num, col)
            };

            if row as usize > nrows || col as usize > ncols {
                return Ok(FormulaValue::Error(CellError::Ref));
            }
            match (row, col) {
                (0, 0) => Ok(FormulaValue::Table(rows.clone())),
                (0, c) => Ok(FormulaValue::Vector(
                    rows.iter()
                        .map(|r| r.get((c - 1) as usize).cloned().unwrap_or(FormulaValue::Empty))
                        .collect(),
                )),
                (r, 0) => Ok(FormulaValue::Vector(rows[(r - 1) as usize].clone())),
                (r, c) => Ok(rows[(r - 1) as usize]
                    .get((c - 1) as usize)
                    .cloned()
                    .unwrap_or(FormulaValue::Empty)),
            }
        }
        _ => Ok(FormulaValue::Error(CellError::Value)),
    }
}

/// CHOOSE(index_num, value1, [value2], ...)
///
/// index_num is 1-based and truncated (2.9 -> 2). Out of range is #VALUE!.
pub fn fn_choose(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let index_arg = &args[0];
    if let FormulaValue::Error(e) = index_arg {
        return Ok(FormulaValue::Error(*e));
    }

    let index = match to_i64_trunc(index_arg) {
        Some(i) => i,
        None => return Ok(FormulaValue::Error(CellError::Value)),
    };

    let num_values = args.len() - 1;
    if index < 1 || index as usize > num_values {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    Ok(args[index as usize].clone())
}

/// OFFSET(reference, rows, cols, [height], [width])
///
/// Computes a sub-rectangle of the base reference. The result must lie
/// entirely within the base: negative offsets or any overhang past the
/// original extents are `#REF!`. The result collapses to a scalar, Vector,
/// or Table depending on the computed height and width.
pub fn fn_offset(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    if let Some(e) = first_error(args) {
        return Ok(FormulaValue::Error(e));
    }

    let base: Vec<Vec<FormulaValue>> = match args.get(0).unwrap() {
        FormulaValue::Table(rows) => rows.clone(),
        FormulaValue::Vector(items) => vec![items.clone()],
        scalar => vec![vec![scalar.clone()]],
    };
    let (nrows, ncols) = table_dims(&base);
    if nrows == 0 || ncols == 0 {
        return Ok(FormulaValue::Error(CellError::Ref));
    }

    let row_off = match to_i64_trunc(args.get(1).unwrap()) {
        Some(n) => n,
        None => return Ok(FormulaValue::Error(CellError::Value)),
    };
    let col_off = match to_i64_trunc(args.get(2).unwrap()) {
        Some(n) => n,
        None => return Ok(FormulaValue::Error(CellError::Value)),
    };

    let height = match args.get(3) {
        None | Some(FormulaValue::Empty) => nrows as i64 - row_off,
        Some(v) => match to_i64_trunc(v) {
            Some(n) => n,
            None => return Ok(FormulaValue::Error(CellError::Value)),
        },
    };
    let width = match args.get(4) {
        None | Some(FormulaValue::Empty) => ncols as i64 - col_off,
        Some(v) => match to_i64_trunc(v) {
            Some(n) => n,
            None => return Ok(FormulaValue::Error(CellError::Value)),
        },
    };

    if row_off < 0 || col_off < 0 || height < 1 || width < 1 {
        return Ok(FormulaValue::Error(CellError::Ref));
    }
    if row_off + height > nrows as i64 || col_off + width > ncols as i64 {
        return Ok(FormulaValue::Error(CellError::Ref));
    }

    let rows: Vec<Vec<FormulaValue>> = base[row_off as usize..(row_off + height) as usize]
        .iter()
        .map(|r| r[col_off as usize..(col_off + width) as usize].to_vec())
        .collect();

    Ok(collapse(rows))
}

/// Shrink a 1x1 result to a scalar and a single-row/column result to a Vector
fn collapse(rows: Vec<Vec<FormulaValue>>) -> FormulaValue {
    let (nrows, ncols) = table_dims(&rows);
    if nrows == 1 && ncols == 1 {
        rows.into_iter().next().unwrap().into_iter().next().unwrap()
    } else if nrows == 1 {
        FormulaValue::Vector(rows.into_iter().next().unwrap())
    } else if ncols == 1 {
        FormulaValue::Vector(
            rows.into_iter()
                .map(|r| r.into_iter().next().unwrap())
                .collect(),
        )
    } else {
        FormulaValue::Table(rows)
    }
}

/// INDIRECT(ref_text, [a1])
///
/// Parses an A1-style (default) or R1C1-style reference, optionally
/// sheet-qualified and optionally a range, validates it against the maximum
/// grid, and returns the canonical A1-style text. Anything malformed or out
/// of bounds is `#REF!`.
pub fn fn_indirect(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let ref_arg = args.get(0).unwrap();
    if let FormulaValue::Error(e) = ref_arg {
        return Ok(FormulaValue::Error(*e));
    }
    let text = match to_text(ref_arg) {
        Ok(s) => s,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    let a1 = match args.get(1) {
        None | Some(FormulaValue::Empty) => true,
        Some(v) => match heron_calc_core::to_boolean(v) {
            Ok(b) => b,
            Err(e) => return Ok(FormulaValue::Error(e)),
        },
    };

    match canonicalize_reference(&text, a1) {
        Some(canonical) => Ok(FormulaValue::Text(canonical)),
        None => Ok(FormulaValue::Error(CellError::Ref)),
    }
}

/// Parse and re-serialize a reference; `None` for malformed/out-of-bounds
fn canonicalize_reference(text: &str, a1: bool) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    // Optional sheet qualifier, possibly quoted: 'My Sheet'!A1
    let (sheet, body) = match text.rfind('!') {
        Some(pos) => {
            let raw = &text[..pos];
            let name = raw.trim_matches('\'');
            if name.is_empty() {
                return None;
            }
            (Some(name.to_string()), &text[pos + 1..])
        }
        None => (None, text),
    };

    let cells: Vec<&str> = body.split(':').collect();
    if cells.is_empty() || cells.len() > 2 {
        return None;
    }

    let mut parsed = Vec::with_capacity(cells.len());
    for part in &cells {
        parsed.push(parse_cell(part, a1)?);
    }

    let mut out = String::new();
    if let Some(name) = sheet {
        if name.contains(' ') {
            out.push('\'');
            out.push_str(&name);
            out.push('\'');
        } else {
            out.push_str(&name);
        }
        out.push('!');
    }
    out.push_str(&format_cell(parsed[0]));
    if let Some(&end) = parsed.get(1) {
        out.push(':');
        out.push_str(&format_cell(end));
    }
    Some(out)
}

/// Parse one cell token into 1-based (row, col)
fn parse_cell(token: &str, a1: bool) -> Option<(u32, u32)> {
    let token = token.trim();
    if a1 {
        let caps = regex!(r"^\$?([A-Za-z]{1,3})\$?([0-9]{1,7})$").captures(token)?;
        let col = column_number(caps.get(1).unwrap().as_str())?;
        let row: u32 = caps.get(2).unwrap().as_str().parse().ok()?;
        if row == 0 || row > MAX_ROWS || col > MAX_COLS as u32 {
            return None;
        }
        Some((row, col))
    } else {
        let caps = regex!(r"^[Rr]([0-9]{1,7})[Cc]([0-9]{1,5})$").captures(token)?;
        let row: u32 = caps.get(1).unwrap().as_str().parse().ok()?;
        let col: u32 = caps.get(2).unwrap().as_str().parse().ok()?;
        if row == 0 || col == 0 || row > MAX_ROWS || col > MAX_COLS as u32 {
            return None;
        }
        Some((row, col))
    }
}

/// Parse base-26 column letters (A=1, Z=26, AA=27, ...)
fn column_number(letters: &str) -> Option<u32> {
    let mut col: u32 = 0;
    for c in letters.chars() {
        let c = c.to_ascii_uppercase();
        if !c.is_ascii_uppercase() {
            return None;
        }
        col = col.checked_mul(26)?.checked_add(c as u32 - 'A' as u32 + 1)?;
    }
    Some(col)
}

/// Format 1-based column number as letters
fn column_letters(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn format_cell((row, col): (u32, u32)) -> String {
    format!("{}{}", column_letters(col), row)
}
