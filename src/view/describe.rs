//! Column descriptions printed by `pgrec --describe`.

/// Description of a stock category, or `None` for unknown names.
pub fn describe(category: &str) -> Option<&'static str> {
    let text = match category {
        "databases" => DATABASES,
        "databases_sessions" => DATABASES_SESSIONS,
        "activity" => ACTIVITY,
        "replication" => REPLICATION,
        "tables" => TABLES,
        "indexes" => INDEXES,
        "functions" => FUNCTIONS,
        "sizes" => SIZES,
        "wal" => WAL,
        "statements_timings" => STATEMENTS_TIMINGS,
        "statements_general" => STATEMENTS_GENERAL,
        "statements_io" => STATEMENTS_IO,
        "statements_temp" => STATEMENTS_TEMP,
        "statements_local" => STATEMENTS_LOCAL,
        "statements_wal" => STATEMENTS_WAL,
        "progress_vacuum" => PROGRESS_VACUUM,
        "progress_cluster" => PROGRESS_CLUSTER,
        "progress_create_index" => PROGRESS_CREATE_INDEX,
        "progress_analyze" => PROGRESS_ANALYZE,
        "progress_basebackup" => PROGRESS_BASEBACKUP,
        "progress_copy" => PROGRESS_COPY,
        _ => return None,
    };
    Some(text)
}

const DATABASES: &str = "\
Database statistics, based on pg_stat_database. Counters are per-second rates.

  database    database name, __shared__ for shared objects
  commit      committed transactions
  rollback    rolled back transactions
  reads       blocks read from disk or OS cache
  hits        blocks found in shared buffers
  returned    rows returned by sequential scans
  fetched     rows fetched by index scans
  inserts     rows inserted
  updates     rows updated
  deletes     rows deleted
  conflicts   queries canceled by recovery conflicts
  deadlocks   deadlocks detected
  temp_files  temporary files created
  temp_bytes  bytes written to temporary files
  stats_age   time since statistics were reset
";

const DATABASES_SESSIONS: &str = "\
Database session statistics, based on pg_stat_database (PostgreSQL 14+).
Times are milliseconds spent per second, counters are per-second rates.

  database    database name, __shared__ for shared objects
  session     time spent by sessions
  active      time spent executing statements
  idle_xact   time spent idle in transaction
  sessions    sessions established
  abandoned   sessions lost because the client disconnected
  fatal       sessions terminated by fatal errors
  killed      sessions terminated by operator intervention
  stats_age   time since statistics were reset
";

const ACTIVITY: &str = "\
Client backends, based on pg_stat_activity. Values are shown as sampled.

  pid         backend process ID
  client      client address
  user        role name
  database    database name
  state       backend state
  wait_etype  wait event type
  wait_event  wait event name
  xact_age    age of the current transaction
  query_age   age of the current query
  change_age  time since the state last changed
  query       text of the current or last query
";

const REPLICATION: &str = "\
Replication connections, based on pg_stat_replication. Sizes in KiB.

  pid          WAL sender process ID
  client       standby address
  user         role name
  name         application name
  state        WAL sender state
  mode         synchronous state
  wal          WAL position of the server, as a per-second rate
  pending      WAL not yet sent
  write        WAL sent but not written by the standby
  flush        WAL written but not flushed by the standby
  replay       WAL flushed but not replayed by the standby
  total        total lag of the standby
  write, flush, replay (lag)  time lag at each stage
";

const TABLES: &str = "\
User tables, based on pg_stat_user_tables and pg_statio_user_tables.
Counters are per-second rates.

  table        schema-qualified name
  seq_scan     sequential scans
  seq_read     rows read by sequential scans
  idx_scan     index scans
  idx_fetch    rows fetched by index scans
  inserts, updates, deletes, hot_updates  row modifications
  heap_read    heap blocks read from disk or OS cache
  heap_hit     heap blocks found in shared buffers
  live         estimated live rows
  dead         estimated dead rows
";

const INDEXES: &str = "\
User indexes, based on pg_stat_user_indexes and pg_statio_user_indexes.
Counters are per-second rates.

  index         schema, table and index name
  scans         index scans
  tuples_read   index entries returned
  tuples_fetch  live rows fetched
  blks_read     index blocks read from disk or OS cache
  blks_hit      index blocks found in shared buffers
";

const FUNCTIONS: &str = "\
User functions, based on pg_stat_user_functions (track_functions must be on).

  funcid       function OID
  function     schema-qualified name
  calls        calls per second
  total        time spent in the function and its callees, ms per second
  self         time spent in the function itself, ms per second
  avg_total    average total time per call since reset
  avg_self     average self time per call since reset
";

const SIZES: &str = "\
Table sizes in KiB.

  relation      schema-qualified table name
  total         table with indexes and TOAST
  rel           main fork only
  idx           indexes and TOAST
  *_change      growth of the matching size, KiB per second
";

const WAL: &str = "\
WAL activity, based on pg_stat_wal (PostgreSQL 14+). Per-second rates.

  source        always 'wal'
  written       WAL generated, KiB
  records       WAL records
  fpi           full page images
  bytes         WAL bytes, KiB
  buffers_full  times WAL buffers were full
";

const STATEMENTS_TIMINGS: &str = "\
Statement timings, based on pg_stat_statements. Times in ms per second.

  queryid      short hash of user, database and query ID
  user         role name
  database     database name
  calls        calls per second
  t_all        total time
  t_read       time spent reading blocks
  t_write      time spent writing blocks
  t_cpu        remaining time
  rows         rows returned or affected
  query        normalized query text
";

const STATEMENTS_GENERAL: &str = "\
Statement block usage, based on pg_stat_statements. Per-second rates.

  queryid, user, database, calls  as in statements_timings
  rows            rows returned or affected
  shared_hit      shared blocks found in buffers
  shared_read     shared blocks read
  shared_dirtied  shared blocks dirtied
  shared_written  shared blocks written
  temp_read       temporary blocks read
  temp_written    temporary blocks written
  query           normalized query text
";

const STATEMENTS_IO: &str = "\
Statement shared buffers IO, based on pg_stat_statements. KiB per second.

  queryid, user, database, calls  as in statements_timings
  hit       shared blocks found in buffers
  read      shared blocks read
  dirtied   shared blocks dirtied
  written   shared blocks written
  query     normalized query text
";

const STATEMENTS_TEMP: &str = "\
Statement temporary files IO, based on pg_stat_statements. KiB per second.

  queryid, user, database, calls  as in statements_timings
  read      temporary blocks read
  written   temporary blocks written
  query     normalized query text
";

const STATEMENTS_LOCAL: &str = "\
Statement local buffers IO (temporary tables), based on pg_stat_statements.
KiB per second.

  queryid, user, database, calls  as in statements_timings
  hit       local blocks found in buffers
  read      local blocks read
  dirtied   local blocks dirtied
  written   local blocks written
  query     normalized query text
";

const STATEMENTS_WAL: &str = "\
Statement WAL usage, based on pg_stat_statements (PostgreSQL 13+).
Per-second rates.

  queryid, user, database, calls  as in statements_timings
  records   WAL records generated
  fpi       full page images generated
  bytes     WAL generated, KiB
  query     normalized query text
";

const PROGRESS_VACUUM: &str = "\
Running vacuums, based on pg_stat_progress_vacuum. Sizes in MiB.

  pid, database, table, phase
  total          heap size
  scanned        heap scanned so far
  vacuumed       heap vacuumed so far
  scanned_rate   scan speed, MiB per second
  vacuumed_rate  vacuum speed, MiB per second
  duration       time since the transaction started
";

const PROGRESS_CLUSTER: &str = "\
Running CLUSTER and VACUUM FULL, based on pg_stat_progress_cluster
(PostgreSQL 12+). Sizes in MiB.

  pid, database, table, command, phase
  total          heap size
  scanned        heap scanned so far
  tup_scanned    rows scanned
  tup_written    rows written
  scanned_rate   scan speed, MiB per second
  written_rate   rows written per second
  duration       time since the transaction started
";

const PROGRESS_CREATE_INDEX: &str = "\
Running CREATE INDEX and REINDEX, based on pg_stat_progress_create_index
(PostgreSQL 12+). Sizes in MiB.

  pid, database, table, index, command, phase
  total          blocks to process in the current phase
  done           blocks processed
  tup_total      rows to process
  tup_done       rows processed
  done_rate      MiB processed per second
  tup_rate       rows processed per second
  duration       time since the transaction started
";

const PROGRESS_ANALYZE: &str = "\
Running ANALYZE, based on pg_stat_progress_analyze (PostgreSQL 13+).
Sizes in MiB.

  pid, database, table, phase
  sample_total   heap blocks to sample
  sampled        heap blocks sampled
  ext_total      extended statistics to compute
  ext_done       extended statistics computed
  child_total    child tables to process
  child_done     child tables processed
  sampled_rate   sampling speed, MiB per second
  duration       time since the transaction started
";

const PROGRESS_BASEBACKUP: &str = "\
Running base backups, based on pg_stat_progress_basebackup (PostgreSQL 13+).
Sizes in MiB.

  pid, client, user, phase
  total          estimated backup size
  streamed       data streamed so far
  tbsp_total     tablespaces to stream
  tbsp_streamed  tablespaces streamed
  streamed_rate  streaming speed, MiB per second
  duration       time since the WAL sender started
";

const PROGRESS_COPY: &str = "\
Running COPY, based on pg_stat_progress_copy (PostgreSQL 14+). Sizes in MiB.

  pid, database, table, command, type
  total          size of the source file, if known
  processed      data processed so far
  tup_processed  rows processed
  tup_excluded   rows skipped by WHERE
  processed_rate MiB processed per second
  tup_rate       rows processed per second
  duration       time since the transaction started
";
