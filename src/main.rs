use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use obtrader::api::{DeltaClient, TelegramNotifier};
use obtrader::execution::{ExecutionClient, PaperExecutor};
use obtrader::feed::StreamSupervisor;
use obtrader::notify::{LogNotifier, Notifier};
use obtrader::{AppConfig, TradingEngine};

#[derive(Parser, Debug)]
#[command(name = "obtrader")]
#[command(about = "Order-block breakout trader for Delta Exchange perpetuals")]
#[command(version)]
struct Args {
    /// Path to a settings file (defaults to ./Settings.toml when present)
    #[arg(short, long)]
    config: Option<String>,

    /// Simulate orders instead of sending them to the exchange
    #[arg(long)]
    paper: bool,

    /// Log filter, e.g. `info` or `obtrader=debug`
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    setup_logging(args.log_level.as_deref());

    tracing::info!("🚀 obtrader starting");

    let mut config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if args.paper {
        config.trading.paper = true;
    }
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Trading {} on {} candles, capital ${}{}",
        config.exchange.symbol,
        config.trading.timeframe,
        config.trading.initial_capital,
        if config.trading.paper { " (paper)" } else { "" }
    );

    let notifier: Arc<dyn Notifier> = match &config.telegram {
        Some(tg) => {
            tracing::info!("Telegram alerts enabled");
            Arc::new(
                TelegramNotifier::new(tg.bot_token.clone(), tg.chat_id.clone(), tg.api_url.clone())
                    .context("Failed to build Telegram client")?,
            )
        }
        None => {
            tracing::info!("Telegram not configured, alerts go to the log");
            Arc::new(LogNotifier)
        }
    };

    let executor: Arc<dyn ExecutionClient> = if config.trading.paper {
        Arc::new(PaperExecutor::new(config.trading.initial_capital))
    } else {
        Arc::new(DeltaClient::new(config.delta_config()).context("Failed to build exchange client")?)
    };

    let mut engine = TradingEngine::new(config.engine_config(), executor, notifier.clone());
    engine.announce_startup().await;

    let supervisor = StreamSupervisor::new(config.supervisor_config(), notifier);

    tokio::select! {
        result = supervisor.run(&mut engine) => {
            result.context("Trading stopped on an unrecoverable fault")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("{}", engine.state().stats().summary().replace('\n', " | "));
    Ok(())
}

fn setup_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("obtrader=info")),
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
