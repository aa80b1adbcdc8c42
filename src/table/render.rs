//! Plain-text rendering of snapshots (aligned columns, no terminal styling).

use std::io::{self, Write};

use super::TabularSnapshot;

const COLUMN_GAP: &str = "  ";
/// Shown for SQL NULL; an empty string renders as nothing.
const NULL_MARKER: &str = "-";

impl TabularSnapshot {
    /// Writes the header and all rows as left-aligned columns.
    ///
    /// NULL cells are rendered as [`NULL_MARKER`].
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                let len = cell.as_deref().unwrap_or(NULL_MARKER).chars().count();
                *width = (*width).max(len);
            }
        }

        write_line(out, &widths, self.columns.iter().map(String::as_str))?;
        for row in &self.rows {
            write_line(out, &widths, row.iter().map(|c| c.as_deref().unwrap_or(NULL_MARKER)))?;
        }
        Ok(())
    }
}

fn write_line<'a, W: Write>(
    out: &mut W,
    widths: &[usize],
    cells: impl Iterator<Item = &'a str>,
) -> io::Result<()> {
    let mut line = String::new();
    for (i, (cell, width)) in cells.zip(widths).enumerate() {
        if i > 0 {
            line.push_str(COLUMN_GAP);
        }
        line.push_str(&format!("{:<width$}", cell, width = *width));
    }
    writeln!(out, "{}", line.trim_end())
}

#[cfg(test)]
mod tests {
    use crate::table::tests::snapshot;

    #[test]
    fn renders_aligned_columns() {
        let s = snapshot(
            &["id", "name"],
            &[&[Some("1"), Some("bronze")], &[Some("248"), None]],
        );
        let mut buf = Vec::new();
        s.write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "id   name\n1    bronze\n248  -\n");
    }

    #[test]
    fn null_and_empty_text_render_differently() {
        let s = snapshot(&["k", "v", "w"], &[&[Some("a"), None, Some("")], &[Some("b"), Some(""), None]]);
        let mut buf = Vec::new();
        s.write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "k  v  w\na  -\nb     -\n");
    }

    #[test]
    fn renders_every_cell() {
        let s = snapshot(
            &["c1", "c2"],
            &[&[Some("row1:value1"), Some("row1:value2")], &[Some("row2:value1"), Some("row2:value2")]],
        );
        let mut buf = Vec::new();
        s.write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        for needle in ["row1:value2", "row2:value1", "row2:value2"] {
            assert!(text.contains(needle));
        }
    }
}
