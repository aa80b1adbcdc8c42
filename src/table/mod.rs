//! Generic tabular snapshot of one statistics category.
//!
//! A [`TabularSnapshot`] holds column names and rows of nullable text cells,
//! exactly as the server returned them. No column type is assumed here;
//! numeric interpretation is left to the delta engine and the sorter.
//!
//! Snapshots are built once and then treated as immutable. The only mutating
//! operations are the explicit in-place helpers ([`TabularSnapshot::sort`],
//! [`TabularSnapshot::truncate_rows`], [`TabularSnapshot::truncate_strings`],
//! [`TabularSnapshot::retain_matching`]); all of them keep `nrows` in sync.
//! Clone first if the original row order is still needed.

mod render;
pub(crate) mod sort;

use regex::Regex;

use crate::error::StatError;

/// One cell: `None` is SQL NULL, `Some` carries the server's text form.
pub type Cell = Option<String>;

/// One row, one cell per column.
pub type Row = Vec<Cell>;

/// One sample of one statistics category at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularSnapshot {
    pub valid: bool,
    pub ncols: usize,
    pub nrows: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl TabularSnapshot {
    /// Builds a snapshot from a query result, validating its shape.
    ///
    /// Fails with [`StatError::MalformedResult`] when there are no columns or
    /// any row width differs from the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Result<Self, StatError> {
        if columns.is_empty() {
            return Err(StatError::MalformedResult(
                "result has no columns".to_string(),
            ));
        }

        let snapshot = Self {
            valid: true,
            ncols: columns.len(),
            nrows: rows.len(),
            columns,
            rows,
        };
        snapshot.check_shape().map_err(StatError::MalformedResult)?;
        Ok(snapshot)
    }

    /// Re-checks the row/column invariant.
    ///
    /// Used after any construction path that bypasses [`TabularSnapshot::new`]
    /// (hand-built values, deserialized data).
    pub fn validate(&self) -> Result<(), StatError> {
        if !self.valid {
            return Err(StatError::MalformedResult(
                "snapshot is not marked valid".to_string(),
            ));
        }
        self.check_shape().map_err(StatError::MalformedResult)
    }

    pub(crate) fn check_shape(&self) -> Result<(), String> {
        if self.ncols != self.columns.len() {
            return Err(format!(
                "header declares {} columns, got {} names",
                self.ncols,
                self.columns.len()
            ));
        }

        if let Some((idx, row)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.ncols)
        {
            return Err(format!(
                "row {}: expected {} cells, got {}",
                idx,
                self.ncols,
                row.len()
            ));
        }

        if self.nrows != self.rows.len() {
            // First row index that is either missing or unexpected.
            return Err(format!(
                "row {}: declared {} rows, got {}",
                self.nrows.min(self.rows.len()),
                self.nrows,
                self.rows.len()
            ));
        }

        Ok(())
    }

    /// Position of the column named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Text of a cell, `None` for NULL or out-of-range coordinates.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column)?.as_deref()
    }

    /// Keeps at most `limit` rows; 0 keeps everything.
    pub fn truncate_rows(&mut self, limit: usize) {
        if limit > 0 && self.rows.len() > limit {
            self.rows.truncate(limit);
            self.nrows = self.rows.len();
        }
    }

    /// Shortens every text cell to at most `limit` characters; 0 disables.
    pub fn truncate_strings(&mut self, limit: usize) {
        if limit == 0 {
            return;
        }
        for cell in self.rows.iter_mut().flatten().flatten() {
            if let Some((cut, _)) = cell.char_indices().nth(limit) {
                cell.truncate(cut);
            }
        }
    }

    /// Keeps only rows whose `column` cell matches `pattern`.
    ///
    /// NULL cells never match.
    pub fn retain_matching(&mut self, column: usize, pattern: &Regex) -> Result<(), StatError> {
        if column >= self.ncols {
            return Err(StatError::InvalidColumn {
                index: column,
                columns: self.ncols,
            });
        }
        self.rows
            .retain(|row| row[column].as_deref().is_some_and(|v| pattern.is_match(v)));
        self.nrows = self.rows.len();
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn cell(v: &str) -> Cell {
        Some(v.to_string())
    }

    pub(crate) fn snapshot(columns: &[&str], rows: &[&[Option<&str>]]) -> TabularSnapshot {
        TabularSnapshot::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.map(str::to_string)).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn new_builds_valid_snapshot() {
        let s = snapshot(
            &["id", "name"],
            &[&[Some("1"), Some("one")], &[Some("3"), None]],
        );
        assert!(s.valid);
        assert_eq!(s.ncols, 2);
        assert_eq!(s.nrows, 2);
        assert_eq!(s.cell(1, 0), Some("3"));
        assert_eq!(s.cell(1, 1), None);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn new_rejects_zero_columns() {
        let err = TabularSnapshot::new(Vec::new(), Vec::new()).unwrap_err();
        assert!(matches!(err, StatError::MalformedResult(_)));
    }

    #[test]
    fn new_rejects_short_row() {
        let err = TabularSnapshot::new(
            vec!["a".into(), "b".into()],
            vec![vec![cell("1"), cell("2")], vec![cell("3")]],
        )
        .unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn validate_rejects_row_width_mismatch() {
        let s = TabularSnapshot {
            valid: true,
            ncols: 4,
            nrows: 1,
            columns: vec!["col1".into(), "col2".into(), "col3".into(), "col4".into()],
            rows: vec![vec![cell("1"), cell("one"), cell("10")]],
        };
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("row 0"));
    }

    #[test]
    fn validate_rejects_row_count_mismatch() {
        let s = TabularSnapshot {
            valid: true,
            ncols: 4,
            nrows: 2,
            columns: vec!["col1".into(), "col2".into(), "col3".into(), "col4".into()],
            rows: vec![vec![cell("1"), cell("one"), cell("10"), cell("111e-1")]],
        };
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn validate_rejects_default_snapshot() {
        assert!(TabularSnapshot::default().validate().is_err());
    }

    #[test]
    fn truncate_rows_keeps_prefix() {
        let mut s = snapshot(&["id"], &[&[Some("1")], &[Some("2")], &[Some("3")]]);
        s.truncate_rows(0);
        assert_eq!(s.nrows, 3);
        s.truncate_rows(2);
        assert_eq!(s.nrows, 2);
        assert_eq!(s.cell(1, 0), Some("2"));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn truncate_strings_counts_characters() {
        let mut s = snapshot(&["q"], &[&[Some("SELECT 1")], &[Some("привет")], &[None]]);
        s.truncate_strings(4);
        assert_eq!(s.cell(0, 0), Some("SELE"));
        assert_eq!(s.cell(1, 0), Some("прив"));
        assert_eq!(s.cell(2, 0), None);
    }

    #[test]
    fn retain_matching_filters_rows() {
        let mut s = snapshot(
            &["id", "state"],
            &[
                &[Some("1"), Some("active")],
                &[Some("2"), Some("idle")],
                &[Some("3"), None],
                &[Some("4"), Some("idle in transaction")],
            ],
        );
        s.retain_matching(1, &Regex::new("^idle").unwrap()).unwrap();
        assert_eq!(s.nrows, 2);
        assert_eq!(s.cell(0, 0), Some("2"));
        assert_eq!(s.cell(1, 0), Some("4"));

        assert!(s.retain_matching(5, &Regex::new(".").unwrap()).is_err());
    }
}
