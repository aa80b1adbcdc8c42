//! SQL builders for the stock statistics categories.
//!
//! Every builder returns a complete statement for the server described by
//! [`QueryOptions`]. Columns that the delta engine diffs are wrapped in
//! `coalesce` so they never come back NULL.

/// Server version where WAL functions lost their `xlog` names.
pub const POSTGRES_V10: u32 = 100000;
pub const POSTGRES_V12: u32 = 120000;
pub const POSTGRES_V13: u32 = 130000;
pub const POSTGRES_V14: u32 = 140000;
pub const POSTGRES_V17: u32 = 170000;

/// Server-dependent fragments used to render view SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub version: u32,
    pub recovery: bool,
    /// Function that measures the distance between two WAL positions.
    pub wal_diff_fn: String,
    /// Function that reports the current WAL position.
    pub wal_position_fn: String,
    /// Schema holding pg_stat_statements; empty when not installed.
    pub pgss_schema: String,
    /// Longest query text to fetch; 0 fetches whole texts.
    pub string_limit: usize,
    /// Expression selecting statement text, e.g. `left(p.query, 256)`.
    pub pgss_query_expr: String,
}

impl QueryOptions {
    pub fn new(version: u32, recovery: bool, string_limit: usize, pgss_schema: &str) -> Self {
        let (wal_diff_fn, wal_position_fn) = select_wal_functions(version, recovery);
        Self {
            version,
            recovery,
            wal_diff_fn: wal_diff_fn.to_string(),
            wal_position_fn: wal_position_fn.to_string(),
            pgss_schema: pgss_schema.to_string(),
            string_limit,
            pgss_query_expr: limit_text("p.query", string_limit),
        }
    }

    /// Wraps a text expression in `left(..)` when a string limit is set.
    pub fn limit_text(&self, expr: &str) -> String {
        limit_text(expr, self.string_limit)
    }
}

impl Default for QueryOptions {
    /// Options for a current primary with pg_stat_statements in `public`.
    fn default() -> Self {
        Self::new(POSTGRES_V17, false, 0, "public")
    }
}

/// Picks WAL function names by version and recovery state.
///
/// A standby has no current insert position, so the last received one is
/// used instead.
pub fn select_wal_functions(version: u32, recovery: bool) -> (&'static str, &'static str) {
    match (version >= POSTGRES_V10, recovery) {
        (true, false) => ("pg_wal_lsn_diff", "pg_current_wal_lsn"),
        (true, true) => ("pg_wal_lsn_diff", "pg_last_wal_receive_lsn"),
        (false, false) => ("pg_xlog_location_diff", "pg_current_xlog_location"),
        (false, true) => ("pg_xlog_location_diff", "pg_last_xlog_receive_location"),
    }
}

fn limit_text(expr: &str, limit: usize) -> String {
    if limit == 0 {
        expr.to_string()
    } else {
        format!("left({}, {})", expr, limit)
    }
}

pub(super) fn build_databases_query(_opts: &QueryOptions) -> String {
    r#"
        SELECT
            coalesce(datname, '__shared__') AS database,
            coalesce(xact_commit, 0) AS commit,
            coalesce(xact_rollback, 0) AS rollback,
            coalesce(blks_read, 0) AS reads,
            coalesce(blks_hit, 0) AS hits,
            coalesce(tup_returned, 0) AS returned,
            coalesce(tup_fetched, 0) AS fetched,
            coalesce(tup_inserted, 0) AS inserts,
            coalesce(tup_updated, 0) AS updates,
            coalesce(tup_deleted, 0) AS deletes,
            coalesce(conflicts, 0) AS conflicts,
            coalesce(deadlocks, 0) AS deadlocks,
            coalesce(temp_files, 0) AS temp_files,
            coalesce(temp_bytes, 0) AS temp_bytes,
            date_trunc('seconds', now() - stats_reset)::text AS stats_age
        FROM pg_stat_database
        ORDER BY datname
    "#
    .to_string()
}

/// Session accounting, times in milliseconds.
pub(super) fn build_databases_sessions_query(_opts: &QueryOptions) -> String {
    r#"
        SELECT
            coalesce(datname, '__shared__') AS database,
            round(coalesce(session_time, 0)::numeric, 2) AS "session,ms",
            round(coalesce(active_time, 0)::numeric, 2) AS "active,ms",
            round(coalesce(idle_in_transaction_time, 0)::numeric, 2) AS "idle_xact,ms",
            coalesce(sessions, 0) AS sessions,
            coalesce(sessions_abandoned, 0) AS abandoned,
            coalesce(sessions_fatal, 0) AS fatal,
            coalesce(sessions_killed, 0) AS killed,
            date_trunc('seconds', now() - stats_reset)::text AS stats_age
        FROM pg_stat_database
        ORDER BY datname
    "#
    .to_string()
}

pub(super) fn build_activity_query(opts: &QueryOptions) -> String {
    let query = opts.limit_text("query");
    format!(
        r#"
        SELECT
            pid,
            host(client_addr) AS client,
            usename AS user,
            datname AS database,
            state,
            wait_event_type AS wait_etype,
            wait_event,
            date_trunc('seconds', clock_timestamp() - xact_start)::text AS xact_age,
            date_trunc('seconds', clock_timestamp() - query_start)::text AS query_age,
            date_trunc('seconds', clock_timestamp() - state_change)::text AS change_age,
            {query} AS query
        FROM pg_stat_activity
        WHERE pid <> pg_backend_pid() AND backend_type = 'client backend'
        ORDER BY pid
        "#
    )
}

pub(super) fn build_replication_query(opts: &QueryOptions) -> String {
    let f1 = &opts.wal_diff_fn;
    let f2 = &opts.wal_position_fn;
    format!(
        "SELECT pid AS pid, host(client_addr) AS client, usename AS user, application_name AS name, \
         state, sync_state AS mode, \
         ({f1}({f2}(),'0/0') / 1024)::bigint AS \"wal,KiB\", \
         ({f1}({f2}(),sent_lsn) / 1024)::bigint AS \"pending,KiB\", \
         ({f1}(sent_lsn,write_lsn) / 1024)::bigint AS \"write,KiB\", \
         ({f1}(write_lsn,flush_lsn) / 1024)::bigint AS \"flush,KiB\", \
         ({f1}(flush_lsn,replay_lsn) / 1024)::bigint AS \"replay,KiB\", \
         ({f1}({f2}(),replay_lsn))::bigint / 1024 AS \"total,KiB\", \
         coalesce(date_trunc('seconds', write_lag), '0 seconds'::interval)::text AS write, \
         coalesce(date_trunc('seconds', flush_lag), '0 seconds'::interval)::text AS flush, \
         coalesce(date_trunc('seconds', replay_lag), '0 seconds'::interval)::text AS replay \
         FROM pg_stat_replication ORDER BY pid DESC"
    )
}

pub(super) fn build_tables_query(_opts: &QueryOptions) -> String {
    r#"
        SELECT
            s.schemaname || '.' || s.relname AS table,
            coalesce(s.seq_scan, 0) AS seq_scan,
            coalesce(s.seq_tup_read, 0) AS seq_read,
            coalesce(s.idx_scan, 0) AS idx_scan,
            coalesce(s.idx_tup_fetch, 0) AS idx_fetch,
            coalesce(s.n_tup_ins, 0) AS inserts,
            coalesce(s.n_tup_upd, 0) AS updates,
            coalesce(s.n_tup_del, 0) AS deletes,
            coalesce(s.n_tup_hot_upd, 0) AS hot_updates,
            coalesce(io.heap_blks_read, 0) AS heap_read,
            coalesce(io.heap_blks_hit, 0) AS heap_hit,
            s.n_live_tup AS live,
            s.n_dead_tup AS dead
        FROM pg_stat_user_tables s
        JOIN pg_statio_user_tables io ON io.relid = s.relid
        ORDER BY 1
    "#
    .to_string()
}

pub(super) fn build_indexes_query(_opts: &QueryOptions) -> String {
    r#"
        SELECT
            s.schemaname || '.' || s.relname || '.' || s.indexrelname AS index,
            coalesce(s.idx_scan, 0) AS scans,
            coalesce(s.idx_tup_read, 0) AS tuples_read,
            coalesce(s.idx_tup_fetch, 0) AS tuples_fetch,
            coalesce(io.idx_blks_read, 0) AS blks_read,
            coalesce(io.idx_blks_hit, 0) AS blks_hit
        FROM pg_stat_user_indexes s
        JOIN pg_statio_user_indexes io ON io.indexrelid = s.indexrelid
        ORDER BY 1
    "#
    .to_string()
}

pub(super) fn build_functions_query(_opts: &QueryOptions) -> String {
    r#"
        SELECT
            funcid,
            schemaname || '.' || funcname AS function,
            coalesce(calls, 0) AS calls,
            coalesce(total_time, 0)::numeric(20,2) AS "total,ms",
            coalesce(self_time, 0)::numeric(20,2) AS "self,ms",
            round((total_time / greatest(calls, 1))::numeric, 2) AS "avg_total,ms",
            round((self_time / greatest(calls, 1))::numeric, 2) AS "avg_self,ms"
        FROM pg_stat_user_functions
        ORDER BY funcid
    "#
    .to_string()
}

/// Sizes appear twice: as totals and as a copy the delta engine turns into
/// growth rates.
pub(super) fn build_sizes_query(_opts: &QueryOptions) -> String {
    r#"
        SELECT
            s.schemaname || '.' || s.relname AS relation,
            pg_total_relation_size(s.relid) / 1024 AS "total,KiB",
            pg_relation_size(s.relid) / 1024 AS "rel,KiB",
            (pg_total_relation_size(s.relid) - pg_relation_size(s.relid)) / 1024 AS "idx,KiB",
            pg_total_relation_size(s.relid) / 1024 AS "total_change,KiB",
            pg_relation_size(s.relid) / 1024 AS "rel_change,KiB",
            (pg_total_relation_size(s.relid) - pg_relation_size(s.relid)) / 1024 AS "idx_change,KiB"
        FROM pg_stat_user_tables s
        ORDER BY 1
    "#
    .to_string()
}

pub(super) fn build_wal_query(opts: &QueryOptions) -> String {
    let f1 = &opts.wal_diff_fn;
    let f2 = &opts.wal_position_fn;
    if opts.version >= POSTGRES_V14 {
        format!(
            r#"
        SELECT
            'wal' AS source,
            ({f1}({f2}(), '0/0') / 1024)::bigint AS "written,KiB",
            w.wal_records AS records,
            w.wal_fpi AS fpi,
            (w.wal_bytes / 1024)::bigint AS "bytes,KiB",
            w.wal_buffers_full AS buffers_full
        FROM pg_stat_wal w
        "#
        )
    } else {
        format!(
            r#"
        SELECT
            'wal' AS source,
            ({f1}({f2}(), '0/0') / 1024)::bigint AS "written,KiB"
        "#
        )
    }
}

/// Timing columns changed names in 13 (exec split from plan) and in 17
/// (shared block timings).
fn statements_time_columns(version: u32) -> (&'static str, &'static str, &'static str) {
    let total = if version >= POSTGRES_V13 {
        "p.total_plan_time + p.total_exec_time"
    } else {
        "p.total_time"
    };
    if version >= POSTGRES_V17 {
        (total, "p.shared_blk_read_time", "p.shared_blk_write_time")
    } else {
        (total, "p.blk_read_time", "p.blk_write_time")
    }
}

pub(super) fn build_statements_timings_query(opts: &QueryOptions) -> String {
    let schema = &opts.pgss_schema;
    let query = &opts.pgss_query_expr;
    let (total, read, write) = statements_time_columns(opts.version);
    format!(
        r#"
        SELECT
            left(md5(p.userid::text || p.dbid::text || p.queryid::text), 10) AS queryid,
            a.rolname AS user,
            d.datname AS database,
            p.calls AS calls,
            round(({total})::numeric, 2) AS "t_all,ms",
            round(({read})::numeric, 2) AS "t_read,ms",
            round(({write})::numeric, 2) AS "t_write,ms",
            round(({total} - {read} - {write})::numeric, 2) AS "t_cpu,ms",
            p.rows AS rows,
            {query} AS query
        FROM {schema}.pg_stat_statements p
        JOIN pg_roles a ON a.oid = p.userid
        JOIN pg_database d ON d.oid = p.dbid
        ORDER BY 1
        "#
    )
}

pub(super) fn build_statements_general_query(opts: &QueryOptions) -> String {
    let schema = &opts.pgss_schema;
    let query = &opts.pgss_query_expr;
    format!(
        r#"
        SELECT
            left(md5(p.userid::text || p.dbid::text || p.queryid::text), 10) AS queryid,
            a.rolname AS user,
            d.datname AS database,
            p.calls AS calls,
            p.rows AS rows,
            p.shared_blks_hit AS shared_hit,
            p.shared_blks_read AS shared_read,
            p.shared_blks_dirtied AS shared_dirtied,
            p.shared_blks_written AS shared_written,
            p.temp_blks_read AS temp_read,
            p.temp_blks_written AS temp_written,
            {query} AS query
        FROM {schema}.pg_stat_statements p
        JOIN pg_roles a ON a.oid = p.userid
        JOIN pg_database d ON d.oid = p.dbid
        ORDER BY 1
        "#
    )
}

/// Shared, temp and local block counters of pg_stat_statements in KiB.
///
/// `kind` is the block counter prefix (`shared`, `temp` or `local`); temp
/// blocks have no hit and dirtied counters.
fn build_statements_blocks_query(opts: &QueryOptions, kind: &str) -> String {
    let schema = &opts.pgss_schema;
    let query = &opts.pgss_query_expr;
    let counters: &[&str] = if kind == "temp" {
        &["read", "written"]
    } else {
        &["hit", "read", "dirtied", "written"]
    };
    let columns: String = counters
        .iter()
        .map(|c| {
            format!(
                "            p.{kind}_blks_{c} * current_setting('block_size')::bigint / 1024 AS \"{c},KiB\",\n"
            )
        })
        .collect();
    format!(
        r#"
        SELECT
            left(md5(p.userid::text || p.dbid::text || p.queryid::text), 10) AS queryid,
            a.rolname AS user,
            d.datname AS database,
            p.calls AS calls,
{columns}            {query} AS query
        FROM {schema}.pg_stat_statements p
        JOIN pg_roles a ON a.oid = p.userid
        JOIN pg_database d ON d.oid = p.dbid
        ORDER BY 1
        "#
    )
}

pub(super) fn build_statements_io_query(opts: &QueryOptions) -> String {
    build_statements_blocks_query(opts, "shared")
}

pub(super) fn build_statements_temp_query(opts: &QueryOptions) -> String {
    build_statements_blocks_query(opts, "temp")
}

pub(super) fn build_statements_local_query(opts: &QueryOptions) -> String {
    build_statements_blocks_query(opts, "local")
}

pub(super) fn build_statements_wal_query(opts: &QueryOptions) -> String {
    let schema = &opts.pgss_schema;
    let query = &opts.pgss_query_expr;
    format!(
        r#"
        SELECT
            left(md5(p.userid::text || p.dbid::text || p.queryid::text), 10) AS queryid,
            a.rolname AS user,
            d.datname AS database,
            p.calls AS calls,
            p.wal_records AS records,
            p.wal_fpi AS fpi,
            (p.wal_bytes / 1024)::bigint AS "bytes,KiB",
            {query} AS query
        FROM {schema}.pg_stat_statements p
        JOIN pg_roles a ON a.oid = p.userid
        JOIN pg_database d ON d.oid = p.dbid
        ORDER BY 1
        "#
    )
}

/// Block counters are converted to MiB; the `_rate` copies are diffed.
pub(super) fn build_progress_vacuum_query(_opts: &QueryOptions) -> String {
    r#"
        SELECT
            v.pid,
            v.datname AS database,
            v.relid::regclass::text AS table,
            v.phase,
            (v.heap_blks_total * current_setting('block_size')::bigint / 1048576) AS "total,MiB",
            (v.heap_blks_scanned * current_setting('block_size')::bigint / 1048576) AS "scanned,MiB",
            (v.heap_blks_vacuumed * current_setting('block_size')::bigint / 1048576) AS "vacuumed,MiB",
            (v.heap_blks_scanned * current_setting('block_size')::bigint / 1048576) AS "scanned_rate,MiB",
            (v.heap_blks_vacuumed * current_setting('block_size')::bigint / 1048576) AS "vacuumed_rate,MiB",
            date_trunc('seconds', clock_timestamp() - a.xact_start)::text AS duration
        FROM pg_stat_progress_vacuum v
        JOIN pg_stat_activity a ON a.pid = v.pid
        ORDER BY v.pid
    "#
    .to_string()
}

pub(super) fn build_progress_cluster_query(_opts: &QueryOptions) -> String {
    r#"
        SELECT
            p.pid,
            p.datname AS database,
            p.relid::regclass::text AS table,
            p.command,
            p.phase,
            (p.heap_blks_total * current_setting('block_size')::bigint / 1048576) AS "total,MiB",
            (p.heap_blks_scanned * current_setting('block_size')::bigint / 1048576) AS "scanned,MiB",
            p.heap_tuples_scanned AS tup_scanned,
            p.heap_tuples_written AS tup_written,
            coalesce(p.heap_blks_scanned * current_setting('block_size')::bigint / 1048576, 0) AS "scanned_rate,MiB",
            coalesce(p.heap_tuples_written, 0) AS written_rate,
            date_trunc('seconds', clock_timestamp() - a.xact_start)::text AS duration
        FROM pg_stat_progress_cluster p
        JOIN pg_stat_activity a ON a.pid = p.pid
        ORDER BY p.pid
    "#
    .to_string()
}

pub(super) fn build_progress_create_index_query(_opts: &QueryOptions) -> String {
    r#"
        SELECT
            p.pid,
            p.datname AS database,
            p.relid::regclass::text AS table,
            p.index_relid::regclass::text AS index,
            p.command,
            p.phase,
            (p.blocks_total * current_setting('block_size')::bigint / 1048576) AS "total,MiB",
            (p.blocks_done * current_setting('block_size')::bigint / 1048576) AS "done,MiB",
            p.tuples_total AS tup_total,
            p.tuples_done AS tup_done,
            coalesce(p.blocks_done * current_setting('block_size')::bigint / 1048576, 0) AS "done_rate,MiB",
            coalesce(p.tuples_done, 0) AS tup_rate,
            date_trunc('seconds', clock_timestamp() - a.xact_start)::text AS duration
        FROM pg_stat_progress_create_index p
        JOIN pg_stat_activity a ON a.pid = p.pid
        ORDER BY p.pid
    "#
    .to_string()
}

pub(super) fn build_progress_analyze_query(_opts: &QueryOptions) -> String {
    r#"
        SELECT
            p.pid,
            p.datname AS database,
            p.relid::regclass::text AS table,
            p.phase,
            (p.sample_blks_total * current_setting('block_size')::bigint / 1048576) AS "sample_total,MiB",
            (p.sample_blks_scanned * current_setting('block_size')::bigint / 1048576) AS "sampled,MiB",
            p.ext_stats_total AS ext_total,
            p.ext_stats_computed AS ext_done,
            p.child_tables_total AS child_total,
            p.child_tables_done AS child_done,
            coalesce(p.sample_blks_scanned * current_setting('block_size')::bigint / 1048576, 0) AS "sampled_rate,MiB",
            date_trunc('seconds', clock_timestamp() - a.xact_start)::text AS duration
        FROM pg_stat_progress_analyze p
        JOIN pg_stat_activity a ON a.pid = p.pid
        ORDER BY p.pid
    "#
    .to_string()
}

pub(super) fn build_progress_basebackup_query(_opts: &QueryOptions) -> String {
    r#"
        SELECT
            p.pid,
            host(a.client_addr) AS client,
            a.usename AS user,
            p.phase,
            coalesce(p.backup_total, 0) / 1048576 AS "total,MiB",
            coalesce(p.backup_streamed, 0) / 1048576 AS "streamed,MiB",
            p.tablespaces_total AS tbsp_total,
            p.tablespaces_streamed AS tbsp_streamed,
            coalesce(p.backup_streamed, 0) / 1048576 AS "streamed_rate,MiB",
            date_trunc('seconds', clock_timestamp() - a.backend_start)::text AS duration
        FROM pg_stat_progress_basebackup p
        JOIN pg_stat_activity a ON a.pid = p.pid
        ORDER BY p.pid
    "#
    .to_string()
}

pub(super) fn build_progress_copy_query(_opts: &QueryOptions) -> String {
    r#"
        SELECT
            p.pid,
            p.datname AS database,
            p.relid::regclass::text AS table,
            p.command,
            p.type,
            p.bytes_total / 1048576 AS "total,MiB",
            p.bytes_processed / 1048576 AS "processed,MiB",
            p.tuples_processed AS tup_processed,
            p.tuples_excluded AS tup_excluded,
            coalesce(p.bytes_processed, 0) / 1048576 AS "processed_rate,MiB",
            coalesce(p.tuples_processed, 0) AS tup_rate,
            date_trunc('seconds', clock_timestamp() - a.xact_start)::text AS duration
        FROM pg_stat_progress_copy p
        JOIN pg_stat_activity a ON a.pid = p.pid
        ORDER BY p.pid
    "#
    .to_string()
}
