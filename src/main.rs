use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use url::Url;

use vesti_rss::config::{DEFAULT_ITEMS, DEFAULT_SERVER, MAX_ITEMS, MIN_ITEMS};
use vesti_rss::fetch::build_client;
use vesti_rss::{FeedConfig, FeedError, RunSummary};

/// vesti-rss - generate an RSS feed from the vesti.ru news API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of news items to fetch, any value from 1 to 500
    #[arg(short = 'n', long = "max-items", default_value_t = DEFAULT_ITEMS,
          value_parser = parse_item_count)]
    max_items: usize,

    /// Logging level (RUST_LOG overrides it when set)
    #[arg(long = "log-level", value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Site the news API and item links are taken from
    #[arg(long = "server", default_value = DEFAULT_SERVER)]
    server: Url,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

fn parse_item_count(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|_| format!("{s:?} is not a number"))?;
    if !(MIN_ITEMS..=MAX_ITEMS).contains(&n) {
        return Err(format!("invalid number of items: {n} (expected {MIN_ITEMS} to {MAX_ITEMS})"));
    }
    Ok(n)
}

// stdout carries the feed, so logs go to stderr
fn init_tracing(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_level);

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let mut out = io::BufWriter::new(io::stdout());
    let result = run(&args, &mut out, shutdown).await;

    // keep whatever was written, complete or not
    if let Err(e) = out.flush() {
        error!(error = %e, "flushing STDOUT");
        return ExitCode::from(1);
    }

    match result {
        Ok(summary) => {
            info!(
                items = summary.items,
                pages = summary.pages,
                duplicates = summary.duplicates,
                rejected = summary.rejected,
                "feed complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) if e.is_shutdown() => {
            error!("{e}");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{e}");
            ExitCode::from(1)
        }
    }
}

async fn run<W: Write>(
    args: &Args,
    out: W,
    shutdown: CancellationToken,
) -> Result<RunSummary, FeedError> {
    let config = FeedConfig::with_server(&args.server, args.max_items)?;
    let client = build_client()?;
    vesti_rss::run(&config, client, out, shutdown).await
}

/// Cancels `shutdown` on the first termination signal.
async fn watch_signals(shutdown: CancellationToken) {
    let name = wait_for_signal().await;
    error!("signal: {name}");
    shutdown.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let (Ok(mut term), Ok(mut hup), Ok(mut quit)) = (
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
        signal(SignalKind::quit()),
    ) else {
        error!("installing signal handlers failed, only Ctrl-C will stop the run");
        return ctrl_c().await;
    };

    tokio::select! {
        name = ctrl_c() => name,
        _ = term.recv() => "SIGTERM",
        _ = hup.recv() => "SIGHUP",
        _ = quit.recv() => "SIGQUIT",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    "SIGINT"
}
