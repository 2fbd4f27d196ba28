use dca_backtest::backtest::{BacktestReport, BacktestRunner, MarketScenario, SyntheticDataGenerator};
use dca_backtest::models::format_pct;
use dca_backtest::strategy::StrategyParams;
use dca_backtest::Result;

const DAYS: usize = 750;
const SEED: u64 = 42;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("dca_backtest=warn")
        .init();

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║          DIP-BUYING DCA SCENARIO SUITE               ║");
    println!("╚═══════════════════════════════════════════════════════╝");

    // A smaller pot than the default so the crash scenario can run dry
    let params = StrategyParams::new(10_000.0, 50.0, -0.01);
    let runner = BacktestRunner::new(params);

    let scenarios = [
        (MarketScenario::Uptrend, "📈 Uptrend"),
        (MarketScenario::Downtrend, "📉 Downtrend"),
        (MarketScenario::Sideways, "↔️  Sideways"),
        (MarketScenario::Volatile, "⚡ Volatile"),
        (MarketScenario::Crash, "💥 Crash (30% slide)"),
    ];

    let mut all_reports = Vec::new();

    for (scenario, name) in scenarios {
        let mut generator = SyntheticDataGenerator::new(SEED);
        let records = generator.generate(scenario, DAYS);

        match runner.run_and_report(&records, name) {
            Ok(report) => all_reports.push((name.to_string(), report)),
            Err(e) => eprintln!("❌ Backtest failed for {}: {}", name, e),
        }
    }

    print_summary_comparison(&all_reports);

    Ok(())
}

fn print_summary_comparison(results: &[(String, BacktestReport)]) {
    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              SCENARIO COMPARISON                      ║");
    println!("╚═══════════════════════════════════════════════════════╝\n");

    println!(
        "{:<26} {:>6} {:>12} {:>12} {:>10} {:>6}",
        "Scenario", "Buys", "Invested", "Profit", "Return", "Early"
    );
    println!("{}", "─".repeat(78));

    for (name, report) in results {
        let s = &report.summary;
        println!(
            "{:<26} {:>6} {:>12.2} {:>12.2} {:>10} {:>6}",
            name,
            s.buy_count,
            s.cash_invested,
            s.total_profit,
            format_pct(s.total_profit_pct),
            if s.stopped_early { "yes" } else { "no" }
        );
    }

    println!();

    let ranked: Vec<_> = results
        .iter()
        .filter_map(|(name, r)| r.summary.total_profit_pct.map(|pct| (name, pct)))
        .collect();

    if let Some((name, pct)) = ranked.iter().max_by(|a, b| a.1.total_cmp(&b.1)) {
        println!("🏆 Best Scenario: {} ({})", name, format_pct(Some(*pct)));
    }
    if let Some((name, pct)) = ranked.iter().min_by(|a, b| a.1.total_cmp(&b.1)) {
        println!("⚠️  Worst Scenario: {} ({})", name, format_pct(Some(*pct)));
    }

    let total_buys: usize = results.iter().map(|(_, r)| r.summary.buy_count).sum();
    let total_invested: f64 = results.iter().map(|(_, r)| r.summary.cash_invested).sum();

    println!("\n📊 Overall Statistics:");
    println!("   Total Buys Across All Scenarios: {}", total_buys);
    println!("   Total Cash Deployed: ${:.2}", total_invested);

    println!("\n═══════════════════════════════════════════════════════\n");
}
