use crate::backtest::runner::BacktestRunner;
use crate::error::SimulationError;
use crate::models::{format_pct, DailyRecord, Summary};
use crate::strategy::StrategyParams;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Outcome of one run in a threshold sweep
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    pub buy_threshold: f64,
    pub outcome: Result<Summary, SimulationError>,
}

/// One simulation of `records` under `params`
type RunFn = fn(&[DailyRecord], StrategyParams) -> Result<Summary, SimulationError>;

fn run_summary(records: &[DailyRecord], params: StrategyParams) -> Result<Summary, SimulationError> {
    BacktestRunner::new(params)
        .run(records)
        .map(|report| report.summary)
}

/// Run one independent simulation per threshold on the blocking pool
///
/// Every run gets its own state; the series is shared read-only. Results
/// come back in the order of `thresholds`, one per threshold.
pub async fn run_threshold_sweep(
    records: Arc<Vec<DailyRecord>>,
    base: StrategyParams,
    thresholds: &[f64],
) -> Vec<SweepResult> {
    sweep_with(records, base, thresholds, run_summary).await
}

async fn sweep_with(
    records: Arc<Vec<DailyRecord>>,
    base: StrategyParams,
    thresholds: &[f64],
    run: RunFn,
) -> Vec<SweepResult> {
    let mut tasks = JoinSet::new();

    for (slot, &threshold) in thresholds.iter().enumerate() {
        let records = Arc::clone(&records);
        let params = base.with_buy_threshold(threshold);

        tasks.spawn_blocking(move || {
            (
                slot,
                SweepResult {
                    buy_threshold: threshold,
                    outcome: run(&records, params),
                },
            )
        });
    }

    let mut results: Vec<Option<SweepResult>> = vec![None; thresholds.len()];

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((slot, result)) => results[slot] = Some(result),
            Err(e) => tracing::error!("Sweep worker failed: {}", e),
        }
    }

    // A failed worker still gets its row
    results
        .into_iter()
        .zip(thresholds)
        .map(|(result, &buy_threshold)| {
            result.unwrap_or(SweepResult {
                buy_threshold,
                outcome: Err(SimulationError::RunAborted { buy_threshold }),
            })
        })
        .collect()
}

/// Run with the highest total profit percent
pub fn best_result(results: &[SweepResult]) -> Option<&SweepResult> {
    results
        .iter()
        .filter_map(|r| match &r.outcome {
            Ok(summary) => summary.total_profit_pct.map(|pct| (r, pct)),
            Err(_) => None,
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(r, _)| r)
}

pub fn print_sweep_table(results: &[SweepResult]) {
    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              BUY THRESHOLD SWEEP                      ║");
    println!("╚═══════════════════════════════════════════════════════╝\n");

    println!(
        "{:>10} {:>6} {:>14} {:>14} {:>14} {:>10}",
        "Threshold", "Buys", "Invested", "Value", "Profit", "Return"
    );
    println!("{}", "─".repeat(73));

    for result in results {
        match &result.outcome {
            Ok(s) => println!(
                "{:>10} {:>6} {:>14.2} {:>14.2} {:>14.2} {:>10}",
                format_pct(Some(result.buy_threshold)),
                s.buy_count,
                s.cash_invested,
                s.value_of_shares,
                s.total_profit,
                format_pct(s.total_profit_pct)
            ),
            Err(e) => println!(
                "{:>10} ❌ {}",
                format_pct(Some(result.buy_threshold)),
                e
            ),
        }
    }

    if let Some(best) = best_result(results) {
        if let Ok(summary) = &best.outcome {
            println!(
                "\n🏆 Best threshold: {} ({})",
                format_pct(Some(best.buy_threshold)),
                format_pct(summary.total_profit_pct)
            );
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::synthetic::{MarketScenario, SyntheticDataGenerator};
    use crate::models::series_from_closes;

    #[tokio::test]
    async fn test_sweep_matches_individual_runs() {
        let mut gen = SyntheticDataGenerator::new(11);
        let records = Arc::new(gen.generate(MarketScenario::Volatile, 300));
        let base = StrategyParams::new(20_000.0, 50.0, 0.0);
        let thresholds = [-0.03, -0.02, -0.01, 0.0];

        let results = run_threshold_sweep(records.clone(), base, &thresholds).await;

        assert_eq!(results.len(), thresholds.len());
        for (result, &threshold) in results.iter().zip(thresholds.iter()) {
            assert_eq!(result.buy_threshold, threshold);
            let expected = BacktestRunner::new(base.with_buy_threshold(threshold))
                .run(&records)
                .unwrap()
                .summary;
            assert_eq!(result.outcome.as_ref().unwrap(), &expected);
        }
    }

    #[test]
    fn test_invalid_threshold_reported_per_run() {
        let records = Arc::new(series_from_closes(&[100.0, 99.0, 98.0]));
        let base = StrategyParams::new(1000.0, 50.0, 0.0);

        let results = tokio_test::block_on(run_threshold_sweep(records, base, &[0.01, 0.0]));

        assert!(matches!(
            results[0].outcome,
            Err(SimulationError::InvalidParams { .. })
        ));
        assert!(results[1].outcome.is_ok());
    }

    fn panics_on_flat_threshold(
        records: &[DailyRecord],
        params: StrategyParams,
    ) -> Result<Summary, SimulationError> {
        if params.buy_threshold == 0.0 {
            panic!("worker died");
        }
        run_summary(records, params)
    }

    #[tokio::test]
    async fn test_panicked_worker_keeps_its_row() {
        let records = Arc::new(series_from_closes(&[100.0, 99.0, 98.0]));
        let base = StrategyParams::new(1000.0, 50.0, 0.0);
        let thresholds = [-0.005, 0.0, -0.02];

        let results = sweep_with(records, base, &thresholds, panics_on_flat_threshold).await;

        assert_eq!(results.len(), thresholds.len());
        assert!(results[0].outcome.is_ok());
        assert_eq!(results[1].buy_threshold, 0.0);
        assert_eq!(
            results[1].outcome,
            Err(SimulationError::RunAborted { buy_threshold: 0.0 })
        );
        assert!(results[2].outcome.is_ok());
    }

    #[test]
    fn test_best_result_picks_highest_return() {
        let records = Arc::new(series_from_closes(&[
            100.0, 99.0, 98.0, 97.0, 90.0, 95.0, 100.0, 110.0,
        ]));
        let base = StrategyParams::new(1000.0, 10.0, 0.0);

        let results = tokio_test::block_on(run_threshold_sweep(records, base, &[-0.05, -0.5]));
        let best = best_result(&results).unwrap();

        // -50% never triggers, so only -5% has a return
        assert_eq!(best.buy_threshold, -0.05);
    }
}
