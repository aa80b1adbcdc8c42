//! Statistics categories ("views").
//!
//! A [`View`] names one category and carries its SQL plus the rules the delta
//! engine needs to turn two samples into a delta. [`Views`] keeps views in
//! registration order, which is also the order they are sampled and archived
//! in every cycle.

mod describe;
mod queries;

pub use describe::describe;
pub use queries::{QueryOptions, select_wal_functions};

use tracing::info;

use crate::delta::DeltaSpec;
use queries::*;

/// One statistics category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub name: String,
    pub query: String,
    /// Column used to match rows between samples.
    pub unique_key: usize,
    /// Inclusive range of diffable columns; `(0, 0)` shows values as sampled.
    pub diff_range: (usize, usize),
    pub order_key: usize,
    pub order_desc: bool,
    /// Lowest `server_version_num` the query works on; 0 means any.
    pub min_version: u32,
}

impl View {
    /// Whether samples must be diffed before they mean anything.
    pub fn is_cumulative(&self) -> bool {
        self.diff_range != (0, 0)
    }

    /// Delta rules for two samples taken `elapsed_secs` apart.
    pub fn delta_spec(&self, elapsed_secs: u64, limit: usize) -> DeltaSpec {
        DeltaSpec {
            unique_key: self.unique_key,
            diff_range: self.diff_range,
            elapsed_secs,
            order_key: self.order_key,
            descending: self.order_desc,
            limit,
        }
    }

    fn version_ok(&self, version: u32) -> bool {
        version >= self.min_version
    }
}

/// Ordered set of views sampled in every cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Views {
    views: Vec<View>,
}

impl Views {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a view. A view with an existing name replaces it in place.
    pub fn register(&mut self, view: View) {
        match self.views.iter_mut().find(|v| v.name == view.name) {
            Some(existing) => *existing = view,
            None => self.views.push(view),
        }
    }

    /// The stock categories with SQL rendered for `opts`.
    pub fn default_catalogue(opts: &QueryOptions) -> Self {
        let mut views = Self::new();
        let mut add = |name: &str,
                       query: String,
                       diff_range: (usize, usize),
                       order_key: usize,
                       min_version: u32| {
            views.register(View {
                name: name.to_string(),
                query,
                unique_key: 0,
                diff_range,
                order_key,
                order_desc: true,
                min_version,
            });
        };

        add("databases", build_databases_query(opts), (1, 13), 1, 0);
        add(
            "databases_sessions",
            build_databases_sessions_query(opts),
            (1, 7),
            1,
            POSTGRES_V14,
        );
        add("activity", build_activity_query(opts), (0, 0), 7, POSTGRES_V10);
        add("replication", build_replication_query(opts), (6, 6), 6, POSTGRES_V10);
        add("tables", build_tables_query(opts), (1, 10), 1, 0);
        add("indexes", build_indexes_query(opts), (1, 5), 1, 0);
        add("functions", build_functions_query(opts), (2, 4), 3, 0);
        add("sizes", build_sizes_query(opts), (4, 6), 1, 0);
        add("wal", build_wal_query(opts), (1, 5), 1, 0);

        let statements: [(&str, String, (usize, usize), usize, u32); 6] = [
            ("statements_timings", build_statements_timings_query(opts), (3, 8), 4, 90400),
            ("statements_general", build_statements_general_query(opts), (3, 10), 3, 90400),
            ("statements_io", build_statements_io_query(opts), (3, 7), 5, 90400),
            ("statements_temp", build_statements_temp_query(opts), (3, 5), 4, 90400),
            ("statements_local", build_statements_local_query(opts), (3, 7), 5, 90400),
            ("statements_wal", build_statements_wal_query(opts), (3, 6), 6, POSTGRES_V13),
        ];
        let progress: [(&str, String, (usize, usize), usize, u32); 6] = [
            ("progress_vacuum", build_progress_vacuum_query(opts), (7, 8), 0, 90600),
            ("progress_cluster", build_progress_cluster_query(opts), (9, 10), 0, POSTGRES_V12),
            (
                "progress_create_index",
                build_progress_create_index_query(opts),
                (10, 11),
                0,
                POSTGRES_V12,
            ),
            ("progress_analyze", build_progress_analyze_query(opts), (10, 10), 0, POSTGRES_V13),
            (
                "progress_basebackup",
                build_progress_basebackup_query(opts),
                (8, 8),
                0,
                POSTGRES_V13,
            ),
            ("progress_copy", build_progress_copy_query(opts), (9, 10), 0, POSTGRES_V14),
        ];
        for (name, query, diff_range, order_key, min_version) in statements.into_iter().chain(progress) {
            add(name, query, diff_range, order_key, min_version);
        }

        views
    }

    /// Drops views the server cannot run and returns how many were dropped.
    ///
    /// Views above `version` go, and so do `statements_*` views when
    /// pg_stat_statements is not installed.
    pub fn filter_supported(&mut self, version: u32, pgss_schema: Option<&str>) -> usize {
        let before = self.views.len();
        let pgss_missing = pgss_schema.is_none_or(str::is_empty);
        let mut statements_dropped = false;

        self.views.retain(|v| {
            if !v.version_ok(version) {
                return false;
            }
            if pgss_missing && v.name.starts_with("statements_") {
                statements_dropped = true;
                return false;
            }
            true
        });

        if statements_dropped {
            info!("pg_stat_statements not found, statements views are skipped");
        }
        before - self.views.len()
    }

    /// Keeps only the named view. Returns `false` if it is not present.
    pub fn retain_only(&mut self, name: &str) -> bool {
        self.views.retain(|v| v.name == name);
        !self.views.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&View> {
        self.views.iter().find(|v| v.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.views.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, View> {
        self.views.iter()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

/// One-letter selectors of the category families, as `(family, selector, category)`.
const SELECTORS: &[(&str, &str, &str)] = &[
    ("databases", "g", "databases"),
    ("databases", "s", "databases_sessions"),
    ("statements", "m", "statements_timings"),
    ("statements", "g", "statements_general"),
    ("statements", "i", "statements_io"),
    ("statements", "t", "statements_temp"),
    ("statements", "l", "statements_local"),
    ("statements", "w", "statements_wal"),
    ("progress", "v", "progress_vacuum"),
    ("progress", "c", "progress_cluster"),
    ("progress", "i", "progress_create_index"),
    ("progress", "a", "progress_analyze"),
    ("progress", "b", "progress_basebackup"),
    ("progress", "y", "progress_copy"),
];

/// Resolves a family flag and its selector, e.g. `statements` + `g` to
/// `statements_general`.
pub fn select_category(family: &str, selector: &str) -> Option<&'static str> {
    SELECTORS
        .iter()
        .find(|(f, s, _)| *f == family && *s == selector)
        .map(|(_, _, category)| *category)
}

impl<'a> IntoIterator for &'a Views {
    type Item = &'a View;
    type IntoIter = std::slice::Iter<'a, View>;

    fn into_iter(self) -> Self::IntoIter {
        self.views.iter()
    }
}
