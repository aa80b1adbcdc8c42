//! Delta engine: joins two snapshots of the same category on a unique key and
//! turns cumulative counters into per-interval differences (or rates).
//!
//! Cells are diffed on their text form. Integral pairs stay integral; any
//! pair that needs floating-point parsing (decimal point, exponent) is
//! rendered with exactly two fractional digits so output stays stable across
//! samples.

use std::collections::HashMap;

use crate::error::StatError;
use crate::table::sort::parse_number;
use crate::table::{Cell, Row, TabularSnapshot};

/// How two snapshots are joined, diffed, ordered and cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaSpec {
    /// Column used to match rows between samples.
    pub unique_key: usize,
    /// Inclusive range of diffable columns. `(0, 0)` disables diffing.
    pub diff_range: (usize, usize),
    /// Seconds between the samples; 0 yields plain differences.
    pub elapsed_secs: u64,
    pub order_key: usize,
    pub descending: bool,
    /// Maximum rows in the result; 0 means unlimited.
    pub limit: usize,
}

impl Default for DeltaSpec {
    fn default() -> Self {
        Self {
            unique_key: 0,
            diff_range: (0, 0),
            elapsed_secs: 0,
            order_key: 0,
            descending: true,
            limit: 0,
        }
    }
}

/// Computes the delta between `current` and `previous`.
///
/// Rows are matched by the text of the unique key column. Matched rows get
/// their diffable cells replaced with [`diff_pair`] results, rows that are new
/// since `previous` are copied unchanged and rows that disappeared are
/// dropped. The result is sorted by `spec.order_key` and cut to `spec.limit`.
///
/// A `(0, 0)` diff range returns `current` unchanged. Any non-numeric or NULL
/// diffable cell fails the whole call.
pub fn compute_delta(
    current: &TabularSnapshot,
    previous: &TabularSnapshot,
    spec: &DeltaSpec,
) -> Result<TabularSnapshot, StatError> {
    if spec.diff_range == (0, 0) {
        return Ok(current.clone());
    }

    let mut result = diff(current, previous, spec)?;
    result.sort(spec.order_key, spec.descending);
    result.truncate_rows(spec.limit);
    Ok(result)
}

/// Joins and diffs without ordering or truncation.
fn diff(
    current: &TabularSnapshot,
    previous: &TabularSnapshot,
    spec: &DeltaSpec,
) -> Result<TabularSnapshot, StatError> {
    current.validate()?;
    previous.validate()?;

    if current.ncols != previous.ncols {
        return Err(StatError::MalformedResult(format!(
            "cannot diff snapshots with {} and {} columns",
            current.ncols, previous.ncols
        )));
    }

    let key = spec.unique_key;
    if key >= current.ncols {
        return Err(StatError::InvalidColumn {
            index: key,
            columns: current.ncols,
        });
    }

    let interval = if spec.elapsed_secs > 0 {
        spec.elapsed_secs
    } else {
        1
    };

    // Inclusive range clamped to the last column; start > end diffs nothing.
    let (start, end) = spec.diff_range;
    let end = end.min(current.ncols - 1);

    // NULL keys never match; duplicates resolve to the first previous row.
    let mut index: HashMap<&str, &Row> = HashMap::with_capacity(previous.nrows);
    for row in &previous.rows {
        if let Some(k) = row[key].as_deref() {
            index.entry(k).or_insert(row);
        }
    }

    let mut rows = Vec::with_capacity(current.nrows);
    for (row_idx, row) in current.rows.iter().enumerate() {
        let Some(prev) = row[key].as_deref().and_then(|k| index.get(k)) else {
            rows.push(row.clone());
            continue;
        };

        let mut out: Row = Vec::with_capacity(row.len());
        for (col, cell) in row.iter().enumerate() {
            if col == key || col < start || col > end {
                out.push(cell.clone());
                continue;
            }
            let value = diff_cells(cell, &prev[col], interval).map_err(|e| {
                StatError::InvalidNumericCell(format!(
                    "row {}, column '{}': {}",
                    row_idx, current.columns[col], e
                ))
            })?;
            out.push(Some(value));
        }
        rows.push(out);
    }

    TabularSnapshot::new(current.columns.clone(), rows)
}

fn diff_cells(current: &Cell, previous: &Cell, interval: u64) -> Result<String, String> {
    match (current.as_deref(), previous.as_deref()) {
        (Some(c), Some(p)) => diff_pair(c, p, interval).map_err(|e| e.to_string()),
        _ => Err("NULL value cannot be diffed".to_string()),
    }
}

/// Difference of two textual counter values divided by `interval`.
///
/// Integral inputs produce an integer string; anything else is parsed as
/// floating point and rendered with two fractional digits.
pub fn diff_pair(current: &str, previous: &str, interval: u64) -> Result<String, StatError> {
    let interval = interval.max(1);

    if let Ok((c, p)) = parse_pair_int(current, previous)
        && let Some(delta) = c.checked_sub(p)
    {
        return Ok((delta / interval as i64).to_string());
    }

    let (c, p) = parse_pair_float(current, previous)?;
    Ok(format!("{:.2}", (c - p) / interval as f64))
}

/// Parses both values as integers.
pub(crate) fn parse_pair_int(current: &str, previous: &str) -> Result<(i64, i64), StatError> {
    let parse = |v: &str| {
        v.parse::<i64>()
            .map_err(|_| StatError::InvalidNumericCell(format!("'{}' is not an integer", v)))
    };
    Ok((parse(current)?, parse(previous)?))
}

/// Parses both values as finite floating-point numbers.
pub(crate) fn parse_pair_float(current: &str, previous: &str) -> Result<(f64, f64), StatError> {
    let parse = |v: &str| {
        parse_number(v)
            .ok_or_else(|| StatError::InvalidNumericCell(format!("'{}' is not a number", v)))
    };
    Ok((parse(current)?, parse(previous)?))
}
