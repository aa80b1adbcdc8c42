//! Archive read path.

use std::fs::File;
use std::io::{BufReader, Read as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::trace;

use super::name::EntryName;
use super::payload;
use crate::error::StatError;
use crate::table::TabularSnapshot;

/// One replayed sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveRecord {
    pub category: String,
    pub timestamp: DateTime<Utc>,
    pub snapshot: TabularSnapshot,
}

/// Selects which entries are decoded. Bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub category: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl EntryFilter {
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn range(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Decides from the entry name alone.
    pub fn matches(&self, name: &EntryName) -> bool {
        self.category.as_deref().is_none_or(|c| c == name.category)
            && self.start.is_none_or(|s| name.timestamp >= s)
            && self.end.is_none_or(|e| name.timestamp <= e)
    }
}

/// Reads a tar archive written by [`super::ArchiveWriter`].
///
/// A reader supports a single pass; open a new one to iterate again.
pub struct ArchiveReader {
    path: PathBuf,
    archive: tar::Archive<BufReader<File>>,
}

impl ArchiveReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StatError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| StatError::ArchiveUnreadable {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            path,
            archive: tar::Archive::new(BufReader::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterates entries in archive order, decoding those `filter` accepts.
    ///
    /// The iterator yields at most one error and then ends.
    pub fn records(&mut self, filter: EntryFilter) -> Result<Records<'_>, StatError> {
        let entries = self
            .archive
            .entries()
            .map_err(|e| StatError::ArchiveUnreadable {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(Records {
            entries,
            filter,
            position: 0,
            done: false,
        })
    }

    /// Name of the first entry, without decoding any payload.
    pub fn first_entry(&mut self) -> Result<Option<EntryName>, StatError> {
        let mut entries = self
            .archive
            .entries()
            .map_err(|e| StatError::ArchiveUnreadable {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        let Some(entry) = entries.next() else {
            return Ok(None);
        };
        let entry = entry.map_err(|e| corrupt("<header>", 0, e.to_string()))?;
        let raw = entry_path(&entry).map_err(|reason| corrupt("<header>", 0, reason))?;
        EntryName::parse(&raw)
            .map(Some)
            .ok_or_else(|| corrupt(&raw, 0, "unrecognized entry name".to_string()))
    }
}

/// Iterator over decoded archive entries.
pub struct Records<'a> {
    entries: tar::Entries<'a, BufReader<File>>,
    filter: EntryFilter,
    position: usize,
    done: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<ArchiveRecord, StatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let position = self.position;
            let result = match self.entries.next()? {
                Ok(entry) => {
                    self.position += 1;
                    self.read_entry(entry, position)
                }
                Err(e) => Err(corrupt("<header>", position, e.to_string())),
            };

            match result {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl Records<'_> {
    /// `Ok(None)` means the entry was filtered out by name.
    fn read_entry(
        &self,
        mut entry: tar::Entry<'_, BufReader<File>>,
        position: usize,
    ) -> Result<Option<ArchiveRecord>, StatError> {
        let raw = entry_path(&entry).map_err(|reason| corrupt("<header>", position, reason))?;
        let name = EntryName::parse(&raw)
            .ok_or_else(|| corrupt(&raw, position, "unrecognized entry name".to_string()))?;

        if !self.filter.matches(&name) {
            trace!(entry = %raw, "skipped by filter");
            return Ok(None);
        }

        let size = entry.size();
        if size == 0 {
            return Err(corrupt(&raw, position, "missing payload".to_string()));
        }

        let mut data = Vec::with_capacity(size.min(1 << 20) as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| corrupt(&raw, position, e.to_string()))?;
        if data.len() as u64 != size {
            return Err(corrupt(
                &raw,
                position,
                format!("truncated payload: expected {} bytes, got {}", size, data.len()),
            ));
        }

        let snapshot =
            payload::decode(&data).map_err(|e| corrupt(&raw, position, e.to_string()))?;

        Ok(Some(ArchiveRecord {
            category: name.category,
            timestamp: name.timestamp,
            snapshot,
        }))
    }
}

fn entry_path(entry: &tar::Entry<'_, BufReader<File>>) -> Result<String, String> {
    entry
        .path()
        .map(|p| p.to_string_lossy().into_owned())
        .map_err(|e| e.to_string())
}

fn corrupt(entry: &str, position: usize, reason: String) -> StatError {
    StatError::ArchiveCorrupt {
        entry: entry.to_string(),
        position,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveWriter, WriteMode};
    use crate::table::tests::snapshot;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 7, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn activity(pid: &str) -> TabularSnapshot {
        snapshot(
            &["pid", "state", "query"],
            &[&[Some(pid), Some("active"), None]],
        )
    }

    fn tables(n: &str) -> TabularSnapshot {
        snapshot(&["relid", "seq_scan"], &[&[Some("16384"), Some(n)], &[Some("16390"), Some("7")]])
    }

    /// Three cycles of two categories each.
    fn recording(path: &Path) {
        let mut writer = ArchiveWriter::new(path, WriteMode::Truncate);
        for i in 0..3 {
            let mut cycle = writer.begin_cycle().unwrap();
            cycle.append("activity", ts(i), &activity(&format!("{}", 100 + i))).unwrap();
            cycle.append("tables", ts(i), &tables(&format!("{}", i * 10))).unwrap();
            cycle.finish().unwrap();
        }
    }

    /// Raw tar with hand-picked names and payloads.
    fn raw_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let mut builder = tar::Builder::new(File::create(path).unwrap());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.finish().unwrap();
    }

    #[test]
    fn round_trip_keeps_order_and_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stat.tar");
        recording(&path);

        let mut reader = ArchiveReader::open(&path).unwrap();
        let records: Vec<ArchiveRecord> = reader
            .records(EntryFilter::default())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(records.len(), 6);
        let order: Vec<(&str, i64)> = records
            .iter()
            .map(|r| (r.category.as_str(), (r.timestamp - ts(0)).num_seconds()))
            .collect();
        assert_eq!(
            order,
            [
                ("activity", 0),
                ("tables", 0),
                ("activity", 1),
                ("tables", 1),
                ("activity", 2),
                ("tables", 2)
            ]
        );
        assert_eq!(records[2].snapshot, activity("101"));
        assert_eq!(records[5].snapshot, tables("20"));
    }

    #[test]
    fn category_filter_selects_one_series() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stat.tar");
        recording(&path);

        let mut reader = ArchiveReader::open(&path).unwrap();
        let got: Vec<String> = reader
            .records(EntryFilter::default().category("tables"))
            .unwrap()
            .map(|r| r.unwrap().snapshot.cell(0, 1).unwrap().to_string())
            .collect();
        assert_eq!(got, ["0", "10", "20"]);
    }

    #[test]
    fn time_range_is_inclusive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stat.tar");
        recording(&path);

        let mut reader = ArchiveReader::open(&path).unwrap();
        let filter = EntryFilter::default()
            .category("activity")
            .range(Some(ts(1)), Some(ts(2)));
        let got: Vec<DateTime<Utc>> = reader
            .records(filter)
            .unwrap()
            .map(|r| r.unwrap().timestamp)
            .collect();
        assert_eq!(got, [ts(1), ts(2)]);
    }

    #[test]
    fn range_excluding_everything_yields_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stat.tar");
        recording(&path);

        let mut reader = ArchiveReader::open(&path).unwrap();
        let filter = EntryFilter::default().range(Some(ts(100)), None);
        assert_eq!(reader.records(filter).unwrap().count(), 0);
    }

    #[test]
    fn corrupt_payload_stops_replay_at_that_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stat.tar");
        let good = payload::encode(&activity("1")).unwrap();
        raw_archive(
            &path,
            &[
                ("activity.20260207T120000.000.json", good.as_slice()),
                (
                    "activity.20260207T120001.000.json",
                    b"{\"columns\":[\"pid\"],\"rows\":3}\n[\"1\"]\n".as_slice(),
                ),
                ("activity.20260207T120002.000.json", good.as_slice()),
            ],
        );

        let mut reader = ArchiveReader::open(&path).unwrap();
        let mut records = reader.records(EntryFilter::default()).unwrap();
        assert!(records.next().unwrap().is_ok());
        match records.next().unwrap() {
            Err(StatError::ArchiveCorrupt { entry, position, .. }) => {
                assert_eq!(entry, "activity.20260207T120001.000.json");
                assert_eq!(position, 1);
            }
            other => panic!("expected corrupt entry, got {:?}", other),
        }
        assert!(records.next().is_none());
    }

    #[test]
    fn empty_payload_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stat.tar");
        raw_archive(&path, &[("tables.20260207T120000.000.json", b"".as_slice())]);

        let mut reader = ArchiveReader::open(&path).unwrap();
        let first = reader.records(EntryFilter::default()).unwrap().next().unwrap();
        assert!(matches!(first, Err(StatError::ArchiveCorrupt { position: 0, .. })));
    }

    #[test]
    fn filtered_out_entries_are_not_decoded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stat.tar");
        let good = payload::encode(&tables("5")).unwrap();
        raw_archive(
            &path,
            &[
                ("activity.20260207T120000.000.json", b"not a payload".as_slice()),
                ("tables.20260207T120000.000.json", good.as_slice()),
            ],
        );

        let mut reader = ArchiveReader::open(&path).unwrap();
        let got: Vec<_> = reader
            .records(EntryFilter::default().category("tables"))
            .unwrap()
            .collect();
        assert_eq!(got.len(), 1);
        assert!(got[0].is_ok());
    }

    #[test]
    fn foreign_entry_name_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stat.tar");
        raw_archive(&path, &[("README", b"hello".as_slice())]);

        let mut reader = ArchiveReader::open(&path).unwrap();
        let first = reader.records(EntryFilter::default()).unwrap().next().unwrap();
        assert!(matches!(first, Err(StatError::ArchiveCorrupt { .. })));
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stat.tar");
        recording(&path);

        // End marker plus most of the last payload block.
        let len = std::fs::metadata(&path).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 1024 - 500).unwrap();
        drop(file);

        let mut reader = ArchiveReader::open(&path).unwrap();
        let results: Vec<_> = reader.records(EntryFilter::default()).unwrap().collect();
        assert_eq!(results.len(), 6);
        assert!(results[..5].iter().all(|r| r.is_ok()));
        assert!(matches!(
            results[5],
            Err(StatError::ArchiveCorrupt { position: 5, .. })
        ));
    }

    #[test]
    fn first_entry_reads_only_the_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stat.tar");
        recording(&path);

        let mut reader = ArchiveReader::open(&path).unwrap();
        let first = reader.first_entry().unwrap().unwrap();
        assert_eq!(first.category, "activity");
        assert_eq!(first.timestamp, ts(0));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            ArchiveReader::open(dir.path().join("nope.tar")),
            Err(StatError::ArchiveUnreadable { .. })
        ));
    }
}
