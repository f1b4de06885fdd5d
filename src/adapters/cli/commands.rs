//! CLI Command Handlers
//!
//! Wires configuration into the venue, price history, scorer and executor,
//! then runs one of the commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::adapters::kraken::{KrakenClient, KrakenConfig, KrakenExchange, KrakenPriceHistory};
use crate::adapters::paper::PaperExchange;
use crate::application::{shutdown_channel, OrderExecutor, Orchestrator};
use crate::config::{load_config, Config, ExchangeKind};
use crate::domain::sizing::{Allocation, PositionSizer, SizingConfig};
use crate::ports::exchange::ExchangePort;
use crate::ports::market_data::PriceHistoryPort;
use crate::strategy::{adx_warmup, combine_score_functions, CombinedScore, ScoringRegistry};

/// Rebalancer - two-asset portfolio rebalancing driven by indicator scores
#[derive(Parser, Debug)]
#[command(
    name = "rebalancer",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Two-asset portfolio rebalancer for Kraken",
    long_about = "Scores closed candles with weighted EMA and stochastic crossover signals \
                  and moves the base/quote allocation toward the score with precision-safe orders."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the rebalancing loop
    Run(RunCmd),

    /// Print the current combined score and its parts
    Score(ScoreCmd),

    /// Show balances, ticker and current allocation
    Balance(BalanceCmd),
}

impl Command {
    fn config_path(&self) -> &Path {
        match self {
            Command::Run(cmd) => &cmd.config,
            Command::Score(cmd) => &cmd.config,
            Command::Balance(cmd) => &cmd.config,
        }
    }
}

/// Start the rebalancing loop
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/kraken.toml")]
    pub config: PathBuf,

    /// Trade against the in-memory paper venue instead of the configured one
    #[arg(short, long)]
    pub paper: bool,
}

/// Print the current score
#[derive(Parser, Debug)]
pub struct ScoreCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/kraken.toml")]
    pub config: PathBuf,
}

/// Show account state
#[derive(Parser, Debug)]
pub struct BalanceCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/kraken.toml")]
    pub config: PathBuf,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    let path = app.command.config_path();
    let config = load_config(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    init_logging(app.verbose, app.debug, &config.logging.level)?;

    match app.command {
        Command::Run(cmd) => run_command(cmd, config).await,
        Command::Score(_) => score_command(config).await,
        Command::Balance(_) => balance_command(config).await,
    }
}

/// Initialize logging system. `RUST_LOG` overrides everything.
fn init_logging(verbose: bool, debug: bool, configured: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        configured
    };

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    Ok(())
}

fn kraken_client(config: &Config) -> Result<KrakenClient> {
    let (api_key, api_secret) = config.exchange.credentials();
    let client = KrakenClient::with_config(KrakenConfig {
        api_base_url: config.exchange.api_url.clone(),
        timeout: Duration::from_secs(config.exchange.timeout_seconds),
        api_key,
        api_secret,
    })
    .context("Failed to create Kraken client")?;
    Ok(client)
}

fn price_history(config: &Config, client: &KrakenClient) -> Arc<dyn PriceHistoryPort> {
    Arc::new(KrakenPriceHistory::new(
        client.clone(),
        &config.pair.symbol,
        config.source.interval_minutes,
        config.source.min_data_length,
    ))
}

/// Resolve the venue once at startup
async fn exchange(
    config: &Config,
    kind: ExchangeKind,
    client: &KrakenClient,
    history: &Arc<dyn PriceHistoryPort>,
) -> Result<Arc<dyn ExchangePort>> {
    match kind {
        ExchangeKind::Kraken => {
            if !client.has_credentials() {
                bail!("KRAKEN_KEY and KRAKEN_SECRET must be set to trade on Kraken (or use --paper)");
            }
            let kraken = KrakenExchange::new(client.clone(), &config.pair.symbol, &config.pair.base, &config.pair.quote);
            kraken.verify_pair().await.context("Pair verification failed")?;
            Ok(Arc::new(kraken))
        }
        ExchangeKind::Paper => {
            let paper = &config.exchange.paper;
            warn!("PAPER TRADING MODE - no real orders");
            Ok(Arc::new(
                PaperExchange::new(
                    Arc::clone(history),
                    &config.pair.base,
                    &config.pair.quote,
                    paper.starting_base,
                    paper.starting_quote,
                )
                .with_spread_bps(paper.spread_bps),
            ))
        }
    }
}

/// Build the scorer and make sure the configured history can feed it
fn scorer(config: &Config) -> Result<CombinedScore> {
    let registry = ScoringRegistry::with_defaults();
    let scorer = combine_score_functions(&config.strategy.score_functions, &registry)
        .context("Invalid score function configuration")?;

    let mut required = scorer.lookback();
    if let Some(period) = config.strategy.trend_period {
        required = required.max(adx_warmup(period));
    }
    if config.source.min_data_length < required {
        bail!(
            "source.min_data_length is {} but the score functions need {} periods",
            config.source.min_data_length,
            required
        );
    }
    Ok(scorer)
}

/// Handle run command
async fn run_command(cmd: RunCmd, config: Config) -> Result<()> {
    info!("Starting rebalancer for {}", config.pair.symbol);
    info!("Config: {}", cmd.config.display());

    let kind = if cmd.paper { ExchangeKind::Paper } else { config.exchange.kind };
    let client = kraken_client(&config)?;
    let history = price_history(&config, &client);
    let exchange = exchange(&config, kind, &client, &history).await?;
    let scorer = scorer(&config)?;

    let sizer = PositionSizer::new(SizingConfig::from(&config));
    let mut executor = OrderExecutor::new(
        config.pair.symbol.clone(),
        sizer,
        exchange,
        config.execution.retry.clone(),
    );
    if let Some(seconds) = config.exchange.order_expiry() {
        executor = executor.with_order_expiry(seconds);
    }

    let mut orchestrator = Orchestrator::new(history, scorer, executor, config.source.interval())
        .with_settle_delay(config.execution.settle_delay());
    if let Some(period) = config.strategy.trend_period {
        orchestrator = orchestrator.with_trend_period(period);
    }

    // Setup Ctrl+C handler
    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        trigger.trigger();
    });

    orchestrator.run(shutdown).await?;
    Ok(())
}

/// Handle score command
async fn score_command(config: Config) -> Result<()> {
    let client = kraken_client(&config)?;
    let history = price_history(&config, &client);
    let scorer = scorer(&config)?;

    let data = history.get_data().await.context("Failed to fetch price history")?;
    let Some(newest) = data.last() else {
        bail!("No closed periods returned for {}", config.pair.symbol);
    };
    if data.len() < scorer.lookback() {
        bail!("Only {} closed periods available, need {}", data.len(), scorer.lookback());
    }

    let target = data.len() - 1;
    let parts = scorer.breakdown(&data, target)?;
    let score = scorer.score(&data, target)?;

    println!("Pair:   {}", config.pair.symbol);
    println!("Period: {} (close {})", newest.timestamp, newest.ohlc.close);
    for part in &parts {
        println!(
            "  {:<16} raw {:>6.2} x weight {:>5.2} = {:>6.3}",
            part.name,
            part.raw,
            part.weight,
            part.weighted()
        );
    }
    println!("Score:  {:.2}", score);

    Ok(())
}

/// Handle balance command
async fn balance_command(config: Config) -> Result<()> {
    let client = kraken_client(&config)?;
    let history = price_history(&config, &client);
    let exchange = exchange(&config, config.exchange.kind, &client, &history).await?;

    let balance = exchange.get_balance().await.context("Failed to get balance")?;
    let ticker = exchange.get_ticker().await.context("Failed to get ticker")?;

    let base = balance.get(&config.pair.base);
    let quote = balance.get(&config.pair.quote);

    println!("Venue:  {}", exchange.name());
    println!("{:<6}  {}", config.pair.base, base);
    println!("{:<6}  {}", config.pair.quote, quote);
    println!(
        "Ticker: ask {} / bid {} / last {} (spread {:.1} bps)",
        ticker.ask,
        ticker.bid,
        ticker.last,
        ticker.spread_bps()
    );

    match Allocation::compute(base, quote, ticker.last, 0.0) {
        Some(allocation) => println!(
            "Allocation: {:.2}% {} of {:.8} {} total",
            allocation.current_ratio * 100.0,
            config.pair.base,
            allocation.total_value_in_base,
            config.pair.base
        ),
        None => println!("Allocation: empty account"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_paper() {
        let app = CliApp::try_parse_from(["rebalancer", "-v", "run", "--config", "bot.toml", "--paper"]).unwrap();
        assert!(app.verbose);
        match app.command {
            Command::Run(cmd) => {
                assert!(cmd.paper);
                assert_eq!(cmd.config, PathBuf::from("bot.toml"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let app = CliApp::try_parse_from(["rebalancer", "score", "--debug"]).unwrap();
        assert!(app.debug);
        assert_eq!(app.command.config_path(), Path::new("config/kraken.toml"));
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(CliApp::try_parse_from(["rebalancer", "swap"]).is_err());
    }
}
