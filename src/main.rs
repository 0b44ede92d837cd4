mod replay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use configuration::{Config, LogFormat, LoggingSettings, load_config};
use events::{LogLevel, LogMessage, ResultMessage};
use executor::{SharedPortfolio, SimulatedExecutor};
use indicatif::ProgressStyle;
use replay::{Replay, ReplaySummary, benchmark_series, read_ticks};
use results::{EmitterKind, ResultsHandler, StatisticsOutcome};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_indicatif::IndicatifLayer;
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// The main entry point for the Vantage results engine.
#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment may already be set.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    let _log_guard = init_tracing(&config.logging, cli.log_format)?;

    match cli.command {
        Commands::Replay(args) => handle_replay(args, config).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Samples and reports the performance of a simulated trading account.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Missing files fall back to defaults.
    #[arg(long, global = true, default_value = "vantage.toml")]
    config: PathBuf,

    /// Overrides `logging.format` from the configuration.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a tick file through a simulated account and report the results.
    Replay(ReplayArgs),
}

#[derive(Parser)]
struct ReplayArgs {
    /// CSV file with `timestamp,symbol,price,benchmark,side,quantity` rows.
    #[arg(long)]
    input: PathBuf,

    /// Print every sampled point and the final statistics as JSON lines on
    /// stdout instead of tables.
    #[arg(long)]
    stream: bool,

    /// Overrides `results.starting_capital` from the configuration.
    #[arg(long)]
    starting_capital: Option<Decimal>,
}

// ==============================================================================
// Logging
// ==============================================================================

/// Installs the global subscriber: console output routed through the progress
/// bar writer, an optional daily-rolling file, and the indicatif layer itself.
///
/// `RUST_LOG` takes precedence over `logging.level`. The returned guard must be
/// held until exit so buffered file output is flushed.
fn init_tracing(settings: &LoggingSettings, format_override: Option<LogFormat>) -> Result<Option<WorkerGuard>> {
    let indicatif_layer = IndicatifLayer::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console = tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer());
    match format_override.unwrap_or(settings.format) {
        LogFormat::Full => layers.push(console.boxed()),
        LogFormat::Compact => layers.push(console.compact().boxed()),
    }

    let guard = match &settings.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &settings.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer).boxed());
            Some(guard)
        }
        None => None,
    };
    layers.push(indicatif_layer.boxed());

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .with_context(|| format!("Invalid log filter '{}'", settings.level))?;

    tracing_subscriber::registry()
        .with(layers.with_filter(filter))
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    Ok(guard)
}

// ==============================================================================
// Replay Command Logic
// ==============================================================================

async fn handle_replay(args: ReplayArgs, mut config: Config) -> Result<()> {
    if let Some(capital) = args.starting_capital {
        config.results.starting_capital = capital;
        config.validate()?;
    }

    let ticks = read_ticks(&args.input)?;
    tracing::info!(ticks = ticks.len(), input = %args.input.display(), "Loaded tick file");

    let portfolio = SharedPortfolio::new(config.results.starting_capital);

    // In streaming mode a consumer task prints every message as it arrives.
    let (emitter, stream) = if args.stream {
        let (sender, receiver) = mpsc::unbounded_channel();
        let consumer = tokio::spawn(print_stream(receiver));
        (EmitterKind::Streaming(sender.clone()), Some((sender, consumer)))
    } else {
        (EmitterKind::Buffered, None)
    };

    let mut builder = ResultsHandler::builder()
        .starting_portfolio_value(config.results.starting_capital)
        .portfolio(Arc::new(portfolio.clone()))
        .benchmark(Arc::new(benchmark_series(&ticks)))
        .trade_ledger(Arc::new(portfolio.clone()))
        .emitter(emitter);
    if let Some(first) = ticks.first() {
        builder = builder.start_time(first.timestamp);
    }
    let handler = Arc::new(builder.build()?);

    let exit = handler.exit_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, finishing the current tick");
            exit.request();
        }
    });

    let executor = SimulatedExecutor::new(config.simulation.clone());
    let force_final_sample = config.results.force_final_sample;
    let replay_handler = Arc::clone(&handler);
    let replay_portfolio = portfolio.clone();

    let summary = tokio::task::spawn_blocking(move || -> Result<ReplaySummary> {
        let span = tracing::info_span!("replay");
        span.pb_set_style(&progress_style()?);
        span.pb_set_length(ticks.len() as u64);
        let _entered = span.enter();

        Replay {
            handler: &replay_handler,
            portfolio: &replay_portfolio,
            executor: &executor,
            force_final_sample,
        }
        .run(&ticks)
    })
    .await
    .context("Replay task panicked")??;

    let profit_loss = portfolio.profit_loss();
    let outcome = handler.generate_statistics(Some(&profit_loss));
    match &outcome {
        StatisticsOutcome::Complete(_) => tracing::info!("Statistics generated"),
        StatisticsOutcome::MissingData(missing) => tracing::warn!("No statistics: {missing}"),
        StatisticsOutcome::Failed(reason) => tracing::error!("Statistics failed: {reason}"),
    }
    let log_entry = outcome.log_message();
    let statistics = outcome.into_result();
    let runtime = handler.runtime_statistics(&statistics.summary, None);

    match stream {
        Some((sender, consumer)) => {
            let mut messages: Vec<ResultMessage> = Vec::new();
            if summary.interrupted {
                messages.push(ResultMessage::Log(LogMessage::new(
                    LogLevel::Warn,
                    format!("Replay interrupted after {} ticks", summary.ticks),
                )));
            }
            messages.extend(log_entry.map(ResultMessage::Log));
            messages.push(ResultMessage::Statistics(statistics.summary));
            messages.push(ResultMessage::RuntimeStatistics(runtime));

            for message in messages {
                if sender.send(message).is_err() {
                    tracing::warn!("Stream consumer stopped before the final statistics");
                }
            }
            // The consumer finishes once every sender, including the emitter's, is gone.
            drop(sender);
            drop(handler);
            consumer.await.context("Stream consumer panicked")?;
        }
        None => {
            print_summary(&summary);
            print_table("Statistic", &statistics.summary);
            print_table("Runtime", &runtime);
        }
    }

    Ok(())
}

fn progress_style() -> Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
        .progress_chars("#>-"))
}

async fn print_stream(mut receiver: UnboundedReceiver<ResultMessage>) {
    while let Some(message) = receiver.recv().await {
        match message.to_json() {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "Dropped a stream message"),
        }
    }
}

fn print_summary(summary: &ReplaySummary) {
    println!(
        "Replayed {} ticks: {} fills, {} rejected orders, {} closed trades{}",
        summary.ticks,
        summary.fills,
        summary.rejected_orders,
        summary.closed_trades,
        if summary.interrupted { " (interrupted)" } else { "" }
    );
}

fn print_table(title: &str, rows: &BTreeMap<String, String>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![title, "Value"]);
    for (key, value) in rows {
        table.add_row(vec![key.as_str(), value.as_str()]);
    }
    println!("{table}");
}
