//! rsiwatch CLI: evaluation passes, manual syncs, cache and history inspection.
//!
//! Commands:
//! - `run`: evaluate every configured instrument and notify on breaches
//! - `sync`: bring one symbol's cache up to date and print its RSI state
//! - `cache status`: report cached symbols, date ranges and sizes
//! - `history`: print the run history

mod obs;

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand};
use rsiwatch_core::data::{ParquetStore, RemoteSource};
use rsiwatch_core::indicators::{closing_prices, rsi};
use rsiwatch_core::{detect, BreachStatus, FieldProjection, ProviderId, Synchronizer, Thresholds};
use rsiwatch_runner::{
    compose, run_pass, HistoryRow, InstrumentEvaluation, LiveBackend, LogNotifier, MonitorConfig,
    Notifier, OutboxNotifier, PassReport, RunHistory,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rsiwatch", about = "rsiwatch: RSI threshold monitor for equity watchlists")]
struct Cli {
    /// Log level or filter directive (overridden by RSIWATCH_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log format: text or json.
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one evaluation pass over every configured source.
    Run {
        /// Path to the TOML config file.
        #[arg(long, default_value = "monitor.toml")]
        config: PathBuf,

        /// Evaluation date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        today: Option<String>,

        /// Skip the breach notification.
        #[arg(long, default_value_t = false)]
        no_notify: bool,

        /// Do not append to the run history.
        #[arg(long, default_value_t = false)]
        no_history: bool,
    },
    /// Synchronize one symbol's cache and print its RSI state.
    Sync {
        /// Provider-namespaced symbol (e.g. FSE/BAS_X, sap.de, SAP.DE).
        symbol: String,

        /// Provider: quandl, stooq or yahoo.
        #[arg(long)]
        provider: ProviderId,

        /// Start date (YYYY-MM-DD). Defaults to 100 days before --end.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,

        /// Cache group. Defaults to the provider name.
        #[arg(long)]
        group: Option<String>,

        /// Environment variable holding the provider API key.
        #[arg(long)]
        api_key_env: Option<String>,

        /// RSI period.
        #[arg(long, default_value_t = 14)]
        period: usize,
    },
    /// Cache inspection commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Print the run history.
    History {
        /// History file. Defaults to ./data/history.csv.
        #[arg(long, default_value = "data/history.csv")]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached symbols, date ranges, and sizes.
    Status {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,

        /// Only this group.
        #[arg(long)]
        group: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    obs::init_tracing(&cli.log_level, &cli.log_format).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Run {
            config,
            today,
            no_notify,
            no_history,
        } => run_cmd(&config, today.as_deref(), no_notify, no_history),
        Commands::Sync {
            symbol,
            provider,
            start,
            end,
            cache_dir,
            group,
            api_key_env,
            period,
        } => sync_cmd(SyncArgs {
            symbol,
            provider,
            start,
            end,
            cache_dir,
            group,
            api_key_env,
            period,
        }),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir, group } => cache_status_cmd(&cache_dir, group.as_deref()),
        },
        Commands::History { file } => history_cmd(&file),
    }
}

fn parse_date(value: Option<&str>) -> Result<Option<NaiveDate>> {
    value
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("dates must be YYYY-MM-DD")
}

fn run_cmd(config_path: &Path, today: Option<&str>, no_notify: bool, no_history: bool) -> Result<()> {
    let config = MonitorConfig::load(config_path)?;
    let today = parse_date(today)?.unwrap_or_else(|| chrono::Local::now().date_naive());

    let pass = run_pass(&config, &LiveBackend, today)?;
    print_pass(&pass);

    if !no_notify {
        if let Some(notification) = compose(&pass, &config.report) {
            match &config.report.outbox {
                Some(dir) => OutboxNotifier::new(dir).notify(&notification)?,
                None => LogNotifier.notify(&notification)?,
            }
        }
    }

    if !no_history {
        let history = RunHistory::new(&config.report.history_file);
        history
            .append(&HistoryRow::from_pass(&pass))
            .with_context(|| format!("appending to {}", history.path().display()))?;
    }

    Ok(())
}

struct SyncArgs {
    symbol: String,
    provider: ProviderId,
    start: Option<String>,
    end: Option<String>,
    cache_dir: PathBuf,
    group: Option<String>,
    api_key_env: Option<String>,
    period: usize,
}

fn sync_cmd(args: SyncArgs) -> Result<()> {
    let end = parse_date(args.end.as_deref())?.unwrap_or_else(|| chrono::Local::now().date_naive());
    let start = parse_date(args.start.as_deref())?
        .unwrap_or_else(|| end.checked_sub_signed(Duration::days(100)).unwrap_or(NaiveDate::MIN));
    if start > end {
        bail!("--start ({start}) is after --end ({end})");
    }

    let api_key = args
        .api_key_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok());
    let group = args.group.as_deref().unwrap_or(args.provider.as_str());
    let store = ParquetStore::open(&args.cache_dir, group)?;
    let source = RemoteSource::connect(args.provider, api_key)?;
    let sync = Synchronizer::new(&store, &source, FieldProjection::default());

    let outcome = sync.synchronize(&args.symbol, start, end);
    println!("Symbol:    {}", args.symbol);
    println!("Action:    {:?}", outcome.action);
    println!("Persisted: {:?}", outcome.persisted);
    println!("Rows:      {}", outcome.series.len());
    if let (Some(first), Some(last)) = (outcome.series.earliest(), outcome.series.latest()) {
        println!("Range:     {} to {}", first.date, last.date);
        println!("Last close:{:>10.2}", last.close);
    }

    let window_days = u32::try_from((end - start).num_days()).unwrap_or(u32::MAX);
    let closes = closing_prices(&outcome.series, window_days, end);
    match rsi(&closes, args.period) {
        Ok(oscillator) => {
            if let Some(w) = detect(&oscillator, &Thresholds::default()) {
                println!("RSI({}):   {:.2} on {} ({})", args.period, w.value, w.date, status_label(Some(w.status)));
                if let Some(since) = w.since {
                    println!("Since:     {since}");
                }
            }
        }
        Err(e) => println!("RSI({}):   undefined ({e})", args.period),
    }
    Ok(())
}

fn cache_status_cmd(cache_dir: &Path, group: Option<&str>) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let groups: Vec<String> = match group {
        Some(g) => vec![g.to_string()],
        None => {
            let mut names = Vec::new();
            for entry in std::fs::read_dir(cache_dir)? {
                let entry = entry?;
                if entry.path().is_dir() {
                    names.push(entry.file_name().to_string_lossy().to_string());
                }
            }
            names.sort();
            names
        }
    };

    println!("Cache: {}", cache_dir.display());
    for group in &groups {
        let store = ParquetStore::open(cache_dir, group.as_str())?;
        let status = store.status()?;
        let total: u64 = status.iter().map(|s| s.size_bytes).sum();

        println!();
        println!("[{group}] {} symbol(s), {}", status.len(), format_size(total));
        println!("{:<16} {:<25} {:>6} {:>10}  {}", "Symbol", "Date Range", "Rows", "Size", "Fields");
        println!("{}", "-".repeat(72));
        for s in &status {
            let (range, rows, fields) = match &s.meta {
                Some(m) => (
                    format!("{} to {}", m.start_date, m.end_date),
                    m.row_count.to_string(),
                    m.fields.join(","),
                ),
                None => ("-".to_string(), "-".to_string(), String::new()),
            };
            let flag = if s.quarantined { " (quarantined)" } else { "" };
            println!(
                "{:<16} {:<25} {:>6} {:>10}  {}{}",
                s.key,
                range,
                rows,
                format_size(s.size_bytes),
                fields,
                flag
            );
        }
    }
    Ok(())
}

fn history_cmd(file: &Path) -> Result<()> {
    let rows = RunHistory::new(file).read_all()?;
    if rows.is_empty() {
        println!("No runs recorded in {}", file.display());
        return Ok(());
    }
    println!("{:<12} {:>6} {:>6} {:>6}", "Date", "Below", "Above", "Total");
    println!("{}", "-".repeat(33));
    for row in &rows {
        println!("{:<12} {:>6} {:>6} {:>6}", row.date, row.below, row.above, row.total);
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn status_label(status: Option<BreachStatus>) -> &'static str {
    match status {
        Some(BreachStatus::Below) => "below",
        Some(BreachStatus::Above) => "above",
        Some(BreachStatus::Within) => "within",
        None => "n/a",
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

fn print_row(e: &InstrumentEvaluation) {
    let since = e
        .window
        .and_then(|w| w.since)
        .map_or_else(String::new, |d| d.to_string());
    println!(
        "{:<16} {:<28} {:>7} {:>9} {:>9} {:<7} {:<11} {:?}",
        e.instrument.symbol,
        truncate(&e.instrument.name, 28),
        fmt_opt(e.window.map(|w| w.value)),
        fmt_opt(e.sma),
        fmt_opt(e.ema),
        status_label(e.status()),
        since,
        e.action
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max - 1).chain(std::iter::once('…')).collect()
    }
}

fn print_pass(pass: &PassReport) {
    println!();
    println!("=== RSI pass {} ===", pass.today);
    for source in &pass.sources {
        println!();
        println!("[{}] {}", source.group, source.provider);
        if let Some(err) = &source.error {
            println!("ERROR: {err}");
            continue;
        }
        println!(
            "{:<16} {:<28} {:>7} {:>9} {:>9} {:<7} {:<11} {}",
            "Symbol", "Name", "RSI", "SMA10", "EMA10", "Status", "Since", "Sync"
        );
        println!("{}", "-".repeat(108));
        for e in &source.evaluations {
            print_row(e);
        }
    }
    println!();
    println!(
        "Breaching: {} below, {} above, {} evaluated",
        pass.count(BreachStatus::Below),
        pass.count(BreachStatus::Above),
        pass.total()
    );
}
