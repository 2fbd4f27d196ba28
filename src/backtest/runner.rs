use crate::backtest::metrics::{summarize, BacktestReport};
use crate::error::SimulationError;
use crate::models::{ratio_or_none, BuyEvent, DailyRecord, Lot, Signal};
use crate::strategy::{price_change_pct, DipBuyStrategy, Strategy, StrategyParams};

/// Cash and holdings of one run
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub cash_remaining: f64,
    pub cash_invested: f64,
    pub days_since_last_buy: u32,
    pub investments: Vec<Lot>,
}

impl SimulationState {
    pub fn new(starting_cash: f64) -> Self {
        Self {
            cash_remaining: starting_cash,
            cash_invested: 0.0,
            days_since_last_buy: 0,
            investments: Vec::new(),
        }
    }

    pub fn total_shares(&self) -> f64 {
        // fold from +0.0: an empty f64 sum is -0.0
        self.investments.iter().fold(0.0, |acc, lot| acc + lot.shares)
    }

    /// Out of capital, including a negative rounding residue
    pub fn is_exhausted(&self) -> bool {
        self.cash_remaining <= 0.0
    }
}

/// What happened on a single simulated day
#[derive(Debug, Clone, PartialEq)]
pub enum DayOutcome {
    Bought(BuyEvent),
    Held {
        day: usize,
        price_change_pct: f64,
        days_since_last_buy: u32,
    },
}

/// Day-by-day state machine for one run
///
/// Each call to [`Simulation::step`] consumes the previous and current
/// record and advances the state by exactly one day.
#[derive(Debug, Clone)]
pub struct Simulation<S: Strategy = DipBuyStrategy> {
    params: StrategyParams,
    strategy: S,
    state: SimulationState,
}

impl Simulation<DipBuyStrategy> {
    pub fn new(params: StrategyParams) -> Result<Self, SimulationError> {
        Self::with_strategy(params, DipBuyStrategy::from_params(&params))
    }
}

impl<S: Strategy> Simulation<S> {
    pub fn with_strategy(params: StrategyParams, strategy: S) -> Result<Self, SimulationError> {
        params.validate()?;
        Ok(Self {
            params,
            strategy,
            state: SimulationState::new(params.starting_cash),
        })
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Simulate `day` given the record before it
    pub fn step(
        &mut self,
        prev: &DailyRecord,
        curr: &DailyRecord,
        day: usize,
    ) -> Result<DayOutcome, SimulationError> {
        if day == 0 {
            return Err(SimulationError::NoPreviousDay);
        }

        // Sanity check: the series must be gap-free and in order
        if prev.sequence_index != day - 1 {
            return Err(SimulationError::DataIntegrity {
                index: day - 1,
                expected: day - 1,
                actual: prev.sequence_index,
            });
        }
        if curr.sequence_index != day {
            return Err(SimulationError::DataIntegrity {
                index: day,
                expected: day,
                actual: curr.sequence_index,
            });
        }

        let prev_price = checked_price(prev)?;
        let price = checked_price(curr)?;
        let change = price_change_pct(prev_price, price);

        if self.strategy.generate_signal(change) == Signal::Hold {
            self.state.days_since_last_buy += 1;
            return Ok(DayOutcome::Held {
                day,
                price_change_pct: change,
                days_since_last_buy: self.state.days_since_last_buy,
            });
        }

        let days_waited = self.state.days_since_last_buy;
        let amount = self
            .strategy
            .deployment_amount(days_waited, self.state.cash_remaining);

        // Nothing left to deploy: no lot, the day counts as a hold
        if amount <= 0.0 {
            self.state.days_since_last_buy += 1;
            return Ok(DayOutcome::Held {
                day,
                price_change_pct: change,
                days_since_last_buy: self.state.days_since_last_buy,
            });
        }

        self.state.cash_remaining -= amount;
        self.state.cash_invested += amount;
        self.state.days_since_last_buy = 0;

        let shares = amount / price;
        self.state.investments.push(Lot {
            day,
            shares,
            buy_price: price,
        });

        let cumulative_shares = self.state.total_shares();
        let cumulative_value = cumulative_shares * price;
        let profit = cumulative_value - self.state.cash_invested;

        Ok(DayOutcome::Bought(BuyEvent {
            day,
            price_change_pct: change,
            days_waited,
            amount_deployed: amount,
            price,
            shares_bought: shares,
            cumulative_shares,
            cumulative_value,
            cash_invested: self.state.cash_invested,
            profit,
            profit_pct: ratio_or_none(profit, self.state.cash_invested),
            cash_remaining: self.state.cash_remaining,
        }))
    }

    pub fn into_state(self) -> SimulationState {
        self.state
    }
}

/// Close price of `record`, rejected unless positive and finite
fn checked_price(record: &DailyRecord) -> Result<f64, SimulationError> {
    let price = record.close_price();
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(SimulationError::InvalidPrice {
            index: record.sequence_index,
            value: price,
        })
    }
}

/// Backtest runner that replays a daily series through the dip-buying strategy
#[derive(Debug, Clone)]
pub struct BacktestRunner {
    params: StrategyParams,
}

impl BacktestRunner {
    pub fn new(params: StrategyParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    /// Run the default dip-buying strategy over `records`
    pub fn run(&self, records: &[DailyRecord]) -> Result<BacktestReport, SimulationError> {
        let strategy = DipBuyStrategy::from_params(&self.params);
        self.run_with_strategy(strategy, records)
    }

    /// Run any strategy over `records`
    ///
    /// Day 0 is skipped since it has no previous close. The loop ends at the
    /// last record or as soon as cash runs out, whichever comes first.
    pub fn run_with_strategy<S: Strategy>(
        &self,
        strategy: S,
        records: &[DailyRecord],
    ) -> Result<BacktestReport, SimulationError> {
        let mut simulation = Simulation::with_strategy(self.params, strategy)?;

        if records.len() < 2 {
            return Err(SimulationError::InsufficientData {
                required: 2,
                actual: records.len(),
            });
        }

        tracing::info!(
            "Starting backtest: {} days, strategy {}, cash ${:.2}, base deployment ${:.2}, threshold {:.2}%",
            records.len(),
            simulation.strategy().name(),
            self.params.starting_cash,
            self.params.base_deployment_size,
            self.params.buy_threshold * 100.0
        );
        tracing::debug!("Skipping day 0: need a previous close to calculate change");

        let mut events = Vec::new();
        let mut last_day = 0;
        let mut stopped_early = false;

        for (i, pair) in records.windows(2).enumerate() {
            let day = i + 1;

            match simulation.step(&pair[0], &pair[1], day)? {
                DayOutcome::Bought(event) => {
                    tracing::info!(
                        "Buy on day {} ({} since last close, waited {} days): ${:.2} for {:.4} shares @ ${:.2}",
                        event.day,
                        crate::models::format_pct(Some(event.price_change_pct)),
                        event.days_waited,
                        event.amount_deployed,
                        event.shares_bought,
                        event.price
                    );
                    events.push(event);
                }
                DayOutcome::Held {
                    day,
                    price_change_pct,
                    ..
                } => {
                    tracing::debug!(
                        "No buy on day {} ({:+.2}% since last close)",
                        day,
                        price_change_pct * 100.0
                    );
                }
            }

            last_day = day;

            if simulation.state().is_exhausted() {
                stopped_early = day + 1 < records.len();
                tracing::info!("Simulation stops on day {}: cash is gone", day);
                break;
            }
        }

        let summary = summarize(
            simulation.state(),
            &records[last_day],
            stopped_early,
        );

        tracing::info!(
            "Backtest complete: {} buys, invested ${:.2}, profit ${:.2} ({})",
            summary.buy_count,
            summary.cash_invested,
            summary.total_profit,
            crate::models::format_pct(summary.total_profit_pct)
        );

        Ok(BacktestReport {
            strategy: simulation.strategy().name().to_string(),
            params: self.params,
            days_in_series: records.len(),
            days_processed: last_day,
            events,
            summary,
        })
    }

    /// Run backtest and print report
    pub fn run_and_report(
        &self,
        records: &[DailyRecord],
        dataset_name: &str,
    ) -> Result<BacktestReport, SimulationError> {
        println!("\n🔬 Running backtest: {}", dataset_name);
        println!("   Days: {}", records.len());

        let report = self.run(records)?;
        report.print_report();

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::synthetic::{MarketScenario, SyntheticDataGenerator};
    use crate::models::series_from_closes;

    const EPS: f64 = 1e-9;

    /// Buys a fixed amount every day regardless of price
    struct AlwaysBuy(f64);

    impl Strategy for AlwaysBuy {
        fn generate_signal(&self, _price_change_pct: f64) -> Signal {
            Signal::Buy
        }

        fn deployment_amount(&self, _days_since_last_buy: u32, cash_remaining: f64) -> f64 {
            self.0.min(cash_remaining)
        }

        fn name(&self) -> &str {
            "AlwaysBuy"
        }
    }

    fn params(starting_cash: f64, base: f64, threshold: f64) -> StrategyParams {
        StrategyParams::new(starting_cash, base, threshold)
    }

    #[test]
    fn test_reference_scenario() {
        let series = series_from_closes(&[100.0, 95.0, 95.0, 90.0]);
        let runner = BacktestRunner::new(params(1000.0, 50.0, 0.0));

        let report = runner.run(&series).unwrap();

        assert_eq!(report.events.len(), 3);
        assert!(report.events.iter().all(|e| e.days_waited == 0));
        assert!(report.events.iter().all(|e| (e.amount_deployed - 50.0).abs() < EPS));

        // Day 1: -5%
        assert!((report.events[0].price_change_pct + 0.05).abs() < EPS);
        assert!((report.events[0].shares_bought - 50.0 / 95.0).abs() < EPS);
        // Day 2: flat still buys with a zero threshold
        assert_eq!(report.events[1].price_change_pct, 0.0);
        // Day 3: about -5.26%
        assert!((report.events[2].price_change_pct + 5.0 / 95.0).abs() < EPS);

        let s = &report.summary;
        assert!((s.cash_invested - 150.0).abs() < EPS);
        assert!((s.cash_remaining - 850.0).abs() < EPS);
        let expected_shares = 50.0 / 95.0 + 50.0 / 95.0 + 50.0 / 90.0;
        assert!((s.total_shares - expected_shares).abs() < EPS);
        assert!((s.total_shares - 1.608).abs() < 1e-3);
        assert!((s.value_of_shares - expected_shares * 90.0).abs() < EPS);
        assert!((s.value_of_shares - 144.74).abs() < 1e-2);
        assert!((s.total_profit + 5.26).abs() < 1e-2);
        assert_eq!(s.last_price, 90.0);
        assert!(!s.stopped_early);
    }

    #[test]
    fn test_two_day_drop_single_buy() {
        let series = series_from_closes(&[100.0, 97.0]);
        let runner = BacktestRunner::new(params(30.0, 50.0, -0.01));

        let report = runner.run(&series).unwrap();

        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].day, 1);
        // min(base, starting cash)
        assert_eq!(report.events[0].amount_deployed, 30.0);
    }

    #[test]
    fn test_rising_prices_never_buy() {
        let series = series_from_closes(&[100.0, 101.0, 102.5, 103.0, 110.0]);
        let runner = BacktestRunner::new(params(1000.0, 50.0, 0.0));

        let report = runner.run(&series).unwrap();

        assert!(report.events.is_empty());
        assert_eq!(report.summary.total_shares, 0.0);
        assert_eq!(report.summary.total_profit, 0.0);
        assert_eq!(report.summary.total_profit_pct, None);
        assert_eq!(report.summary.average_cost_basis, None);
        assert_eq!(report.summary.cash_remaining, 1000.0);

        // No negative zeros in printed or serialized output
        assert!(report.summary.total_shares.is_sign_positive());
        assert!(report.summary.value_of_shares.is_sign_positive());
        assert!(report.summary.total_profit.is_sign_positive());
        let json = report.to_json().unwrap();
        assert!(json.contains("\"total_shares\": 0.0"));
        assert!(json.contains("\"value_of_shares\": 0.0"));
        assert!(!json.contains("-0.0"));
    }

    #[test]
    fn test_multiplier_grows_with_wait() {
        // Three up days, then a drop: waited 3 days -> deploy 3x
        let series = series_from_closes(&[100.0, 101.0, 102.0, 103.0, 99.0]);
        let runner = BacktestRunner::new(params(1000.0, 50.0, 0.0));

        let report = runner.run(&series).unwrap();

        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].days_waited, 3);
        assert_eq!(report.events[0].amount_deployed, 150.0);
    }

    #[test]
    fn test_days_since_last_buy_counter() {
        let series = series_from_closes(&[100.0, 99.0, 100.0, 101.0, 100.0, 101.0]);
        let mut sim = Simulation::new(params(1000.0, 10.0, 0.0)).unwrap();

        let expected = [0, 1, 2, 0, 1];
        for (i, pair) in series.windows(2).enumerate() {
            let outcome = sim.step(&pair[0], &pair[1], i + 1).unwrap();
            assert_eq!(sim.state().days_since_last_buy, expected[i]);
            if let DayOutcome::Held {
                days_since_last_buy,
                ..
            } = outcome
            {
                assert_eq!(days_since_last_buy, expected[i]);
            }
        }
    }

    #[test]
    fn test_cash_conservation_every_step() {
        let mut gen = SyntheticDataGenerator::new(7);
        let series = gen.generate(MarketScenario::Volatile, 400);
        let p = params(5_000.0, 25.0, -0.005);
        let mut sim = Simulation::new(p).unwrap();

        let mut last_remaining = p.starting_cash;
        let mut last_invested = 0.0;

        for (i, pair) in series.windows(2).enumerate() {
            sim.step(&pair[0], &pair[1], i + 1).unwrap();
            let state = sim.state();

            assert!(
                (state.cash_invested + state.cash_remaining - p.starting_cash).abs() < 1e-6,
                "conservation broken on day {}",
                i + 1
            );
            assert!(state.cash_remaining <= last_remaining);
            assert!(state.cash_invested >= last_invested);

            last_remaining = state.cash_remaining;
            last_invested = state.cash_invested;

            if state.is_exhausted() {
                break;
            }
        }
    }

    #[test]
    fn test_early_stop_when_cash_exhausted() {
        // 4 buys of 25 use exactly 100 of cash on day 4
        let series = series_from_closes(&[10.0, 10.0, 10.0, 10.0, 10.0, 20.0, 30.0]);
        let runner = BacktestRunner::new(params(100.0, 25.0, 0.0));

        let report = runner.run_with_strategy(AlwaysBuy(25.0), &series).unwrap();

        assert_eq!(report.events.len(), 4);
        assert_eq!(report.days_processed, 4);
        assert_eq!(report.summary.cash_remaining, 0.0);
        assert!(report.summary.stopped_early);
        // Marked at the last day reached, not the end of the series
        assert_eq!(report.summary.last_day, 4);
        assert_eq!(report.summary.last_price, 10.0);
        assert!((report.summary.total_profit).abs() < EPS);
    }

    #[test]
    fn test_exhaustion_caps_last_deployment() {
        // Waiting 3 days asks for 150 but only 120 is left
        let series = series_from_closes(&[100.0, 100.0, 101.0, 102.0, 103.0, 100.0, 90.0]);
        let runner = BacktestRunner::new(params(170.0, 50.0, 0.0));

        let report = runner.run(&series).unwrap();

        assert_eq!(report.events.len(), 2);
        assert_eq!(report.events[1].amount_deployed, 120.0);
        assert_eq!(report.summary.cash_remaining, 0.0);
        assert_eq!(report.days_processed, 5);
        assert!(report.summary.stopped_early);
    }

    #[test]
    fn test_gap_in_series_is_fatal() {
        let mut series = series_from_closes(&[100.0, 99.0, 98.0, 97.0]);
        series[2].sequence_index = 5;
        let runner = BacktestRunner::new(params(1000.0, 50.0, 0.0));

        let err = runner.run(&series).unwrap_err();
        assert_eq!(
            err,
            SimulationError::DataIntegrity {
                index: 2,
                expected: 2,
                actual: 5
            }
        );
    }

    #[test]
    fn test_out_of_order_previous_record() {
        let series = series_from_closes(&[100.0, 99.0, 98.0]);
        let mut sim = Simulation::new(params(1000.0, 50.0, 0.0)).unwrap();

        // Feeding day 2 with day 0 as its previous record
        let err = sim.step(&series[0], &series[2], 2).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::DataIntegrity {
                expected: 1,
                actual: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_day_zero_has_no_previous_close() {
        let series = series_from_closes(&[100.0, 99.0]);
        let mut sim = Simulation::new(params(1000.0, 50.0, 0.0)).unwrap();

        let err = sim.step(&series[0], &series[0], 0).unwrap_err();
        assert_eq!(err, SimulationError::NoPreviousDay);
        assert_eq!(sim.state().days_since_last_buy, 0);
    }

    #[test]
    fn test_zero_close_rejected() {
        let series = series_from_closes(&[100.0, 0.0, 50.0]);
        let runner = BacktestRunner::new(params(1000.0, 50.0, 0.0));

        let err = runner.run(&series).unwrap_err();
        assert_eq!(
            err,
            SimulationError::InvalidPrice {
                index: 1,
                value: 0.0
            }
        );
    }

    #[test]
    fn test_nan_close_rejected() {
        let series = series_from_closes(&[100.0, f64::NAN, 90.0]);
        let runner = BacktestRunner::new(params(1000.0, 50.0, 0.0));

        let err = runner.run(&series).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::InvalidPrice { index: 1, value } if value.is_nan()
        ));
    }

    #[test]
    fn test_bad_previous_close_rejected() {
        let mut series = series_from_closes(&[100.0, 95.0]);
        series[0].adj_close = f64::INFINITY;
        let mut sim = Simulation::new(params(1000.0, 50.0, 0.0)).unwrap();

        let err = sim.step(&series[0], &series[1], 1).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidPrice { index: 0, .. }));
        assert!(sim.state().investments.is_empty());
    }

    #[test]
    fn test_invalid_params_rejected_before_loop() {
        let series = series_from_closes(&[100.0, 99.0]);
        let runner = BacktestRunner::new(params(-10.0, 50.0, 0.0));

        let err = runner.run(&series).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidParams { .. }));
    }

    #[test]
    fn test_too_short_series() {
        let series = series_from_closes(&[100.0]);
        let runner = BacktestRunner::new(params(1000.0, 50.0, 0.0));

        let err = runner.run(&series).unwrap_err();
        assert_eq!(
            err,
            SimulationError::InsufficientData {
                required: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_runs_are_deterministic() {
        let mut gen = SyntheticDataGenerator::new(42);
        let series = gen.generate(MarketScenario::Sideways, 250);
        let runner = BacktestRunner::new(params(10_000.0, 50.0, -0.002));

        let first = runner.run(&series).unwrap();
        let second = runner.run(&series).unwrap();

        assert_eq!(first, second);
    }
}
