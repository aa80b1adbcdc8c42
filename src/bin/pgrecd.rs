//! pgrecd - PostgreSQL statistics recorder.
//!
//! Samples every supported statistics category once per interval and appends
//! the snapshots to a tar archive, one entry per category per cycle.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use pgrec::archive::{ArchiveWriter, WriteMode};
use pgrec::collector::{PostgresSource, ServerProperties};
use pgrec::sampling::{CancelToken, RecordConfig, SamplingLoop};
use pgrec::view::{QueryOptions, Views};

/// PostgreSQL statistics recorder.
#[derive(Parser)]
#[command(name = "pgrecd", about = "Record PostgreSQL statistics into a tar archive", version)]
struct Args {
    /// Archive file to write.
    #[arg(short = 'f', long = "file", default_value = "pgrec.stat.tar")]
    file: PathBuf,

    /// Append to an existing archive. Use --append=false to start over.
    #[arg(short = 'a', long, default_value_t = true, action = clap::ArgAction::Set)]
    append: bool,

    /// Sampling interval in seconds.
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Number of cycles to record (0 records until interrupted).
    #[arg(short, long, default_value = "0")]
    count: usize,

    /// Trim statement texts to this many characters (0 keeps them whole).
    #[arg(short = 's', long = "strlimit", default_value = "0")]
    string_limit: usize,

    /// Record a single cycle and exit.
    #[arg(short = '1', long)]
    oneshot: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["pgrecd", "pgrec"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Logs the failed stage and exits with status 1.
fn fail(stage: &str, err: impl std::fmt::Display) -> ! {
    error!("{} failed: {}", stage, err);
    std::process::exit(1);
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    info!("pgrecd {} starting", env!("CARGO_PKG_VERSION"));

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
    let skipped = views.filter_supported(props.version, props.pgss_schema.as_deref());
    if skipped > 0 {
        info!(
            "{} statistics categories are not supported by this server and will be skipped",
            skipped
        );
    }
    info!("Categories: {}", views.names().join(", "));

    let mode = if args.append {
        WriteMode::Append
    } else {
        WriteMode::Truncate
    };
    let mut writer = ArchiveWriter::new(&args.file, mode);
    info!("Recording to {}", args.file.display());

    let cancel = CancelToken::new();
    let token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        token.cancel();
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let config = RecordConfig {
        interval: Duration::from_secs(args.interval),
        count: if args.oneshot { 1 } else { args.count },
    };
    match SamplingLoop::new(config).run(&mut source, &views, &mut writer, &cancel) {
        Ok(cycles) => info!("Recorded {} cycles", cycles),
        Err(e) => fail("recording", e),
    }
}
