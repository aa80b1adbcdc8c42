//! Type-aware in-place row ordering.

use std::cmp::Ordering;

use super::TabularSnapshot;

/// Parses a cell as a finite floating-point number.
pub(crate) fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl TabularSnapshot {
    /// Reorders rows in place by `column`.
    ///
    /// The column is compared numerically when every non-NULL cell parses as a
    /// number, otherwise as case-sensitive text. NULL sorts lowest. The sort is
    /// stable, so ties keep their relative order in both directions.
    ///
    /// Out-of-range columns and empty snapshots are left untouched.
    pub fn sort(&mut self, column: usize, descending: bool) {
        if self.rows.is_empty() || column >= self.ncols {
            return;
        }

        let numeric = self
            .rows
            .iter()
            .filter_map(|row| row[column].as_deref())
            .all(|v| parse_number(v).is_some());

        self.rows.sort_by(|a, b| {
            let ord = compare_cells(a[column].as_deref(), b[column].as_deref(), numeric);
            if descending { ord.reverse() } else { ord }
        });
    }
}

fn compare_cells(a: Option<&str>, b: Option<&str>, numeric: bool) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) if numeric => match (parse_number(a), parse_number(b)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => a.cmp(b),
        },
        (Some(a), Some(b)) => a.cmp(b),
    }
}
