//! Scripted statistics source for tests.

use std::collections::{HashMap, VecDeque};

use super::{SourceError, StatSource};
use crate::table::TabularSnapshot;

enum Scripted {
    Rows(TabularSnapshot),
    Fail(String),
}

/// Replays prepared results keyed by SQL text.
///
/// Each query pops the next prepared result for its SQL. The last result of
/// a query is repeated once the queue is down to one entry. Unknown SQL fails
/// with [`SourceError::QueryError`].
#[derive(Default)]
pub struct MockSource {
    script: HashMap<String, VecDeque<Scripted>>,
    log: Vec<String>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful result for `sql`.
    pub fn respond(mut self, sql: &str, snapshot: TabularSnapshot) -> Self {
        self.push(sql, Scripted::Rows(snapshot));
        self
    }

    /// Queues a failure for `sql`.
    pub fn fail(mut self, sql: &str, message: &str) -> Self {
        self.push(sql, Scripted::Fail(message.to_string()));
        self
    }

    /// Every SQL text queried so far, in order.
    pub fn log(&self) -> &[String] {
        &self.log
    }

    fn push(&mut self, sql: &str, item: Scripted) {
        self.script.entry(sql.to_string()).or_default().push_back(item);
    }
}

impl StatSource for MockSource {
    fn query(&mut self, sql: &str) -> Result<TabularSnapshot, SourceError> {
        self.log.push(sql.to_string());

        let queue = self
            .script
            .get_mut(sql)
            .ok_or_else(|| SourceError::QueryError(format!("no scripted result for {:?}", sql)))?;
        let item = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().map(|item| match item {
                Scripted::Rows(s) => Scripted::Rows(s.clone()),
                Scripted::Fail(m) => Scripted::Fail(m.clone()),
            })
        };

        match item {
            Some(Scripted::Rows(snapshot)) => Ok(snapshot),
            Some(Scripted::Fail(message)) => Err(SourceError::QueryError(message)),
            None => Err(SourceError::QueryError(format!(
                "script exhausted for {:?}",
                sql
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::snapshot;

    #[test]
    fn replays_in_order_and_repeats_last() {
        let mut source = MockSource::new()
            .respond("q", snapshot(&["v"], &[&[Some("1")]]))
            .respond("q", snapshot(&["v"], &[&[Some("2")]]));

        let values: Vec<String> = (0..3)
            .map(|_| source.query("q").unwrap().cell(0, 0).unwrap().to_string())
            .collect();
        assert_eq!(values, ["1", "2", "2"]);
        assert_eq!(source.log().len(), 3);
    }

    #[test]
    fn unknown_sql_fails() {
        let mut source = MockSource::new();
        assert!(matches!(
            source.query("SELECT 1"),
            Err(SourceError::QueryError(_))
        ));
    }
}
