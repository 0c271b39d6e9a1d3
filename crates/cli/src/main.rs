use anyhow::{Context, Result};
use barlens_core::{Bar, BarSource, PriceField};
use barlens_data::{csv_loader, BarManager};
use barlens_indicators::{ChartIndicator, IndicatorSettings};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "barlens")]
#[command(about = "Chart indicator caches: compute SMA, RSI and VQI overlays over OHLC bars")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Indicator settings file (TOML)
    #[arg(short, long, global = true, env = "BARLENS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute every indicator over a CSV history and print the latest values
    Show {
        /// Path to CSV data file
        #[arg(short, long)]
        data: PathBuf,

        /// Number of most recent bars to print
        #[arg(short = 'n', long, default_value = "20")]
        last: usize,

        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Feed bars one at a time and check the caches against a bulk build
    Replay {
        /// Path to CSV data file
        #[arg(short, long)]
        data: PathBuf,

        /// Deliver every bar as an opening-only bar first, then revise it
        #[arg(long)]
        revisions: bool,

        /// Number of most recent bars to print
        #[arg(short = 'n', long, default_value = "10")]
        last: usize,
    },

    /// List the indicators and their effective parameters
    Indicators {
        /// Print the settings as a TOML document instead
        #[arg(long)]
        toml: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Show { data, last, json } => run_show(&settings, &data, last, json)?,
        Commands::Replay {
            data,
            revisions,
            last,
        } => run_replay(&settings, &data, revisions, last)?,
        Commands::Indicators { toml } => list_indicators(&settings, toml)?,
    }

    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<IndicatorSettings> {
    let Some(path) = path else {
        return Ok(IndicatorSettings::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let settings = IndicatorSettings::from_toml_str(&text)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    tracing::info!(config = %path.display(), "Loaded indicator settings");
    Ok(settings)
}

fn load_history(path: &Path) -> Result<Vec<Bar>> {
    let bars = csv_loader::load_bars_from_csv(path)?;
    if bars.is_empty() {
        anyhow::bail!("No bars loaded from CSV file");
    }
    tracing::info!(bars = bars.len(), data = %path.display(), "Loaded historical data");
    Ok(bars)
}

fn run_show(settings: &IndicatorSettings, data: &Path, last: usize, json: bool) -> Result<()> {
    let manager = BarManager::from_bars(load_history(data)?)?;
    let mut engines = settings.build()?;

    // ascending, the way a chart paints its visible bars
    for ix in 0..manager.len() {
        for engine in engines.iter_mut() {
            engine.value_at(&manager, ix as isize)?;
        }
    }

    print_rows(&manager, &engines, last, json)
}

fn run_replay(
    settings: &IndicatorSettings,
    data: &Path,
    revisions: bool,
    last: usize,
) -> Result<()> {
    let bars = load_history(data)?;
    let mut manager = BarManager::new();
    let mut engines = settings.build()?;
    let mut updates = 0usize;

    for bar in bars {
        if revisions {
            let event = manager.update_bar(Bar::opening(bar.timestamp, bar.open))?;
            query_all(&mut engines, &manager, event.index())?;
            updates += 1;
        }
        let event = manager.update_bar(bar)?;
        query_all(&mut engines, &manager, event.index())?;
        updates += 1;
    }
    tracing::info!(bars = manager.len(), updates, "Replay complete");

    let last_ix = manager.len() - 1;
    let mut reference = settings.build()?;
    let mut diverged = Vec::new();
    for (engine, fresh) in engines.iter().zip(reference.iter_mut()) {
        fresh.value_at(&manager, last_ix as isize)?;

        let mismatches: Vec<usize> = (0..manager.len())
            .filter(|&ix| !same_value(engine.cached(ix), fresh.cached(ix)))
            .collect();
        match mismatches.first() {
            None => tracing::info!(indicator = engine.name(), "Matches bulk build"),
            Some(&first) => {
                tracing::warn!(
                    indicator = engine.name(),
                    count = mismatches.len(),
                    first,
                    replayed = ?engine.cached(first),
                    bulk = ?fresh.cached(first),
                    "Diverges from bulk build"
                );
                diverged.push(engine.name().to_string());
            }
        }
    }

    print_rows(&manager, &engines, last, false)?;

    if !diverged.is_empty() {
        anyhow::bail!("Incremental values diverged for: {}", diverged.join(", "));
    }
    println!("All indicators match a fresh bulk build.");
    Ok(())
}

fn query_all(
    engines: &mut [Box<dyn ChartIndicator>],
    source: &dyn BarSource,
    ix: usize,
) -> Result<()> {
    for engine in engines.iter_mut() {
        engine.value_at(source, ix as isize)?;
    }
    Ok(())
}

fn same_value(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits(),
        (None, None) => true,
        _ => false,
    }
}

#[derive(Serialize)]
struct Row {
    index: usize,
    timestamp: DateTime<Utc>,
    close: f64,
    /// Undefined values are `null`.
    values: BTreeMap<String, Option<f64>>,
    labels: Vec<String>,
}

fn print_rows(
    manager: &BarManager,
    engines: &[Box<dyn ChartIndicator>],
    last: usize,
    json: bool,
) -> Result<()> {
    let first = manager.len().saturating_sub(last);
    let rows = (first..manager.len())
        .map(|ix| -> Result<Row> {
            let bar = manager.bar_at(ix)?;
            Ok(Row {
                index: ix,
                timestamp: bar.timestamp,
                close: bar.price(PriceField::Close),
                values: engines
                    .iter()
                    .map(|e| (e.name().to_string(), e.cached(ix).filter(|v| v.is_finite())))
                    .collect(),
                labels: engines.iter().map(|e| e.label_text(ix as isize)).collect(),
            })
        })
        .collect::<Result<Vec<Row>>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let sep = "=".repeat(72);
    println!("\n{sep}");
    println!("  {:>6}  {:<16}  {:>12}  INDICATORS", "INDEX", "TIME", "CLOSE");
    println!("{sep}");
    for row in &rows {
        println!(
            "  {:>6}  {:<16}  {:>12.4}  {}",
            row.index,
            row.timestamp.format("%Y-%m-%d %H:%M"),
            row.close,
            row.labels.join("  |  ")
        );
    }
    println!("{sep}\n");
    Ok(())
}

fn list_indicators(settings: &IndicatorSettings, as_toml: bool) -> Result<()> {
    if as_toml {
        print!("{}", toml::to_string_pretty(settings)?);
        return Ok(());
    }

    let (sma, rsi, vqi) = (&settings.sma, &settings.rsi, &settings.vqi);
    println!("Configured indicators:");
    println!(
        "  SMA  - Simple Moving Average      (window: {}, price: {})",
        sma.window, sma.price
    );
    println!(
        "  RSI  - Relative Strength Index    (window: {}, price: close)",
        rsi.window
    );
    println!(
        "  VQI  - Volatility Quality Index   (period: {}, method: {}, smoothing: {})",
        vqi.period, vqi.ma_method, vqi.smoothing
    );
    println!(
        "                                    (filter: {} x {}, first value at bar {})",
        vqi.filter_threshold,
        vqi.currency_point,
        vqi.start()
    );
    Ok(())
}
