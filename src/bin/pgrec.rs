//! pgrec - PostgreSQL statistics viewer.
//!
//! Supports two modes:
//! - Live mode (default): sample one category and print its deltas
//! - Report mode: replay one category from a pgrecd archive
//!
//! Usage:
//!   pgrec                       # live databases deltas, 1 second interval
//!   pgrec -T 5                  # live table deltas, 5 second interval
//!   pgrec -r                    # report from ./pgrec.stat.tar
//!   pgrec -r stat.tar -A        # activity report from a custom archive
//!   pgrec -r -s -1h -e -30m     # report for a window relative to the first entry
//!   pgrec -r -X g               # pg_stat_statements general report
//!   pgrec -P v -d               # describe the vacuum progress columns

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use pgrec::collector::{PostgresSource, ServerProperties};
use pgrec::report::{ReportConfig, run_report};
use pgrec::sampling::{CancelToken, DeltaPrinter, RecordConfig, SamplingLoop};
use pgrec::view::{QueryOptions, Views, describe, select_category};

/// Default archive path for report mode.
const DEFAULT_ARCHIVE: &str = "pgrec.stat.tar";

/// Category used when none is selected.
const DEFAULT_CATEGORY: &str = "databases";

/// PostgreSQL statistics viewer.
#[derive(Parser)]
#[command(name = "pgrec", about = "PostgreSQL statistics viewer", version)]
struct Args {
    /// Update interval in seconds (default: 1).
    /// Only used in live mode.
    #[arg(value_name = "INTERVAL", conflicts_with = "report", value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Report mode. Optionally specify the archive (default: pgrec.stat.tar).
    #[arg(short = 'r', long = "report", value_name = "FILE", num_args = 0..=1, default_missing_value = DEFAULT_ARCHIVE)]
    report: Option<PathBuf>,

    /// Report start time. Supported formats:
    /// - Date and time (UTC): 2026-02-07 17:00:00
    /// - ISO 8601: 2026-02-07T17:00:00
    /// - Unix timestamp: 1738944000
    /// - Relative to the first entry: -1h, -30m, -2d
    /// - Time only, on the day of the first entry: 17:00:00
    #[arg(short = 's', long = "start", value_name = "TIME", requires = "report")]
    start: Option<String>,

    /// Report end time, same formats as --start.
    #[arg(short = 'e', long = "end", value_name = "TIME", requires = "report")]
    end: Option<String>,

    /// Order rows by this column.
    #[arg(short = 'o', long = "order", value_name = "COLUMN", requires = "report")]
    order: Option<String>,

    /// Ascending order.
    #[arg(long, conflicts_with = "desc")]
    asc: bool,

    /// Descending order (the category default).
    #[arg(long)]
    desc: bool,

    /// Show only rows whose COLUMN matches the regular expression PATTERN.
    #[arg(short = 'g', long = "grep", value_name = "COLUMN:PATTERN", requires = "report")]
    grep: Option<String>,

    /// Maximum rows per table (0 shows all).
    #[arg(short = 'l', long = "limit", default_value = "0")]
    limit: usize,

    /// Trim cells to this many characters (0 keeps them whole).
    #[arg(short = 't', long = "strlimit", default_value = "32")]
    string_limit: usize,

    /// Statistics category by name.
    #[arg(short = 'C', long = "category", value_name = "NAME", group = "category_choice")]
    category: Option<String>,

    /// Show activity statistics.
    #[arg(short = 'A', long, group = "category_choice")]
    activity: bool,

    /// Show replication statistics.
    #[arg(short = 'R', long, group = "category_choice")]
    replication: bool,

    /// Show tables statistics.
    #[arg(short = 'T', long, group = "category_choice")]
    tables: bool,

    /// Show indexes statistics.
    #[arg(short = 'I', long, group = "category_choice")]
    indexes: bool,

    /// Show tables sizes statistics.
    #[arg(short = 'S', long, group = "category_choice")]
    sizes: bool,

    /// Show functions statistics.
    #[arg(short = 'F', long, group = "category_choice")]
    functions: bool,

    /// Show WAL statistics.
    #[arg(short = 'W', long, group = "category_choice")]
    wal: bool,

    /// Show databases statistics: 'g' general, 's' sessions.
    #[arg(short = 'D', long, value_name = "SELECTOR", group = "category_choice", value_parser = ["g", "s"])]
    databases: Option<String>,

    /// Show pg_stat_statements statistics: 'm' timings, 'g' general, 'i' io,
    /// 't' temp files io, 'l' local files io, 'w' wal.
    #[arg(short = 'X', long, value_name = "SELECTOR", group = "category_choice", value_parser = ["m", "g", "i", "t", "l", "w"])]
    statements: Option<String>,

    /// Show pg_stat_progress_* statistics: 'v' vacuum, 'c' cluster,
    /// 'i' create index, 'a' analyze, 'b' basebackup, 'y' copy.
    #[arg(short = 'P', long = "progress", value_name = "SELECTOR", group = "category_choice", value_parser = ["v", "c", "i", "a", "b", "y"])]
    progress: Option<String>,

    /// Print the description of the selected category's columns and exit.
    #[arg(short = 'd', long)]
    describe: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is warnings only.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    /// Category picked by `-C` or one of the shortcut flags.
    fn category(&self) -> String {
        if let Some(name) = &self.category {
            return name.clone();
        }
        let families = [
            ("databases", &self.databases),
            ("statements", &self.statements),
            ("progress", &self.progress),
        ];
        for (family, selector) in families {
            if let Some(category) = selector
                .as_deref()
                .and_then(|s| select_category(family, s))
            {
                return category.to_string();
            }
        }
        let shortcuts = [
            (self.activity, "activity"),
            (self.replication, "replication"),
            (self.tables, "tables"),
            (self.indexes, "indexes"),
            (self.sizes, "sizes"),
            (self.functions, "functions"),
            (self.wal, "wal"),
        ];
        shortcuts
            .iter()
            .find(|(set, _)| *set)
            .map_or(DEFAULT_CATEGORY, |(_, name)| *name)
            .to_string()
    }
}

/// Initializes the tracing subscriber. Logs go to stderr so they never mix
/// with tables on stdout.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("pgrec={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Logs the failed stage to stderr and exits with status 1.
fn fail(stage: &str, err: impl std::fmt::Display) -> ! {
    error!("{} failed: {}", stage, err);
    std::process::exit(1);
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let category = args.category();
    if args.describe {
        match describe(&category) {
            Some(text) => print!("{}", text),
            None => fail("describe", format!("unknown category '{}'", category)),
        }
        return;
    }
    match &args.report {
        Some(path) => report(&args, path.clone(), category),
        None => live(&args, category),
    }
}

fn report(args: &Args, input: PathBuf, category: String) {
    let config = ReportConfig {
        input,
        start: args.start.clone(),
        end: args.end.clone(),
        category,
        order: args.order.clone(),
        descending: match (args.asc, args.desc) {
            (true, _) => Some(false),
            (_, true) => Some(true),
            _ => None,
        },
        grep: args.grep.clone(),
        limit: args.limit,
        string_limit: args.string_limit,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match run_report(&config, &mut out) {
        Ok(printed) => info!("Printed {} tables", printed),
        Err(e) => fail("report", e),
    }
}

fn live(args: &Args, category: String) {
    let mut source = PostgresSource::from_env().unwrap_or_else(|e| fail("connect", e));
    if let Err(e) = source.try_connect() {
        fail("connect", e);
    }
    let props = ServerProperties::fetch(&mut source).unwrap_or_else(|e| fail("setup", e));

    let opts = QueryOptions::new(
        props.version,
        props.recovery,
        args.string_limit,
        props.pgss_schema.as_deref().unwrap_or_default(),
    );
    let mut views = Views::default_catalogue(&opts);
    views.filter_supported(props.version, props.pgss_schema.as_deref());
    if !views.retain_only(&category) {
        fail(
            "setup",
            format!("category '{}' is unknown or not supported by this server", category),
        );
    }

    let cancel = CancelToken::new();
    let token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let config = RecordConfig {
        interval: Duration::from_secs(args.interval.unwrap_or(1)),
        count: 0,
    };
    let mut printer = DeltaPrinter::new(io::stdout().lock(), args.limit, args.string_limit);
    if let Err(e) = SamplingLoop::new(config).run(&mut source, &views, &mut printer, &cancel) {
        fail("watch", e);
    }
}
