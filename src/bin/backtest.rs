use anyhow::Result;
use clap::Parser;
use obtrader::backtest::{BacktestMetrics, BacktestRunner, MarketScenario, SyntheticDataGenerator};
use obtrader::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "backtest")]
#[command(about = "Replay synthetic markets through the order-block engine")]
struct Args {
    /// Settings file whose strategy and risk parameters are tested
    #[arg(short, long)]
    config: Option<String>,

    /// Candles per scenario
    #[arg(short, long, default_value_t = 1000)]
    candles: usize,

    /// Candle interval in minutes
    #[arg(short, long, default_value_t = 15)]
    interval: i64,

    /// Seed for the synthetic generator
    #[arg(short, long, default_value_t = 42)]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter("obtrader=info,obtrader::alerts=warn")
        .init();

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║          OBTRADER BACKTESTING SUITE                   ║");
    println!("╚═══════════════════════════════════════════════════════╝");

    let config = AppConfig::load(args.config.as_deref())?;
    let runner = BacktestRunner::new(config.engine_config());

    let mut all_metrics = Vec::new();

    for scenario in MarketScenario::all() {
        let mut generator = SyntheticDataGenerator::new(args.seed);
        let candles = generator.generate(scenario, args.candles, args.interval);

        match runner.run_and_report(candles, scenario.label()).await {
            Ok(metrics) => all_metrics.push((scenario.label().to_string(), metrics)),
            Err(e) => eprintln!("❌ Backtest failed for {}: {}", scenario.label(), e),
        }
    }

    print_summary_comparison(&all_metrics);

    Ok(())
}

fn print_summary_comparison(results: &[(String, BacktestMetrics)]) {
    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              SCENARIO COMPARISON                      ║");
    println!("╚═══════════════════════════════════════════════════════╝\n");

    println!(
        "{:<20} {:>10} {:>10} {:>8} {:>8} {:>10}",
        "Scenario", "P&L", "Return%", "Trades", "Win%", "MaxDD%"
    );
    println!("{}", "─".repeat(70));

    for (name, metrics) in results {
        println!(
            "{:<20} {:>10.2} {:>10.2} {:>8} {:>8.1} {:>10.2}",
            name,
            metrics.total_pnl,
            metrics.total_return_pct,
            metrics.total_trades,
            metrics.win_rate,
            metrics.max_drawdown_pct
        );
    }

    let by_return = |a: &&(String, BacktestMetrics), b: &&(String, BacktestMetrics)| {
        a.1.total_return_pct.total_cmp(&b.1.total_return_pct)
    };

    if let Some((name, metrics)) = results.iter().max_by(by_return) {
        println!("\n🏆 Best Scenario: {} ({:+.2}%)", name, metrics.total_return_pct);
    }
    if let Some((name, metrics)) = results.iter().min_by(by_return) {
        println!("⚠️  Worst Scenario: {} ({:+.2}%)", name, metrics.total_return_pct);
    }

    let total_trades: usize = results.iter().map(|(_, m)| m.total_trades).sum();
    println!("\n📊 Total Trades Across All Scenarios: {}", total_trades);
    println!("\n═══════════════════════════════════════════════════════\n");
}
