//! Entry payload codec.
//!
//! A payload is UTF-8 text: one JSON header line followed by one JSON array
//! per row. JSON `null` marks SQL NULL, so it stays distinct from `""`.
//!
//! ```text
//! {"columns":["pid","state"],"rows":2}
//! ["123","active"]
//! ["456",null]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::StatError;
use crate::table::{Row, TabularSnapshot};

/// Upper bound for pre-allocation; the declared row count is untrusted.
const MAX_PREALLOC_ROWS: usize = 4096;

#[derive(Serialize, Deserialize)]
struct PayloadHeader {
    columns: Vec<String>,
    rows: usize,
}

/// Serializes a snapshot into payload bytes.
pub fn encode(snapshot: &TabularSnapshot) -> Result<Vec<u8>, StatError> {
    snapshot.validate()?;

    let header = PayloadHeader {
        columns: snapshot.columns.clone(),
        rows: snapshot.nrows,
    };

    let mut out = serde_json::to_vec(&header)
        .map_err(|e| StatError::MalformedResult(format!("header encoding: {}", e)))?;
    out.push(b'\n');
    for row in &snapshot.rows {
        serde_json::to_writer(&mut out, row)
            .map_err(|e| StatError::MalformedResult(format!("row encoding: {}", e)))?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Rebuilds a snapshot from payload bytes.
///
/// Fails with [`StatError::MalformedArchiveEntry`] on truncated, unparsable
/// or shape-inconsistent input.
pub fn decode(bytes: &[u8]) -> Result<TabularSnapshot, StatError> {
    let malformed = StatError::MalformedArchiveEntry;

    let text = std::str::from_utf8(bytes).map_err(|e| malformed(e.to_string()))?;
    let mut lines = text.lines();

    let header_line = lines
        .next()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| malformed("empty payload".to_string()))?;
    let header: PayloadHeader =
        serde_json::from_str(header_line).map_err(|e| malformed(format!("header: {}", e)))?;
    if header.columns.is_empty() {
        return Err(malformed("header has no columns".to_string()));
    }

    let mut rows: Vec<Row> = Vec::with_capacity(header.rows.min(MAX_PREALLOC_ROWS));
    for idx in 0..header.rows {
        let line = lines.next().ok_or_else(|| {
            malformed(format!(
                "truncated: header declares {} rows, got {}",
                header.rows, idx
            ))
        })?;
        let row: Row =
            serde_json::from_str(line).map_err(|e| malformed(format!("row {}: {}", idx, e)))?;
        rows.push(row);
    }

    if lines.any(|l| !l.is_empty()) {
        return Err(malformed(format!(
            "trailing data after {} declared rows",
            header.rows
        )));
    }

    let snapshot = TabularSnapshot {
        valid: true,
        ncols: header.columns.len(),
        nrows: rows.len(),
        columns: header.columns,
        rows,
    };
    snapshot.check_shape().map_err(malformed)?;
    Ok(snapshot)
}
