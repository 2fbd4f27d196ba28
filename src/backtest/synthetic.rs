use crate::models::DailyRecord;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::str::FromStr;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise (+0.1% daily average)
    Uptrend,
    /// Steady downtrend with noise (-0.1% daily average)
    Downtrend,
    /// Sideways/choppy market (±1% around mean)
    Sideways,
    /// High volatility (±3% daily swings)
    Volatile,
    /// Slow growth, then a 30% slide over the second half
    Crash,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 5] = [
        MarketScenario::Uptrend,
        MarketScenario::Downtrend,
        MarketScenario::Sideways,
        MarketScenario::Volatile,
        MarketScenario::Crash,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MarketScenario::Uptrend => "uptrend",
            MarketScenario::Downtrend => "downtrend",
            MarketScenario::Sideways => "sideways",
            MarketScenario::Volatile => "volatile",
            MarketScenario::Crash => "crash",
        }
    }
}

impl fmt::Display for MarketScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MarketScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarketScenario::ALL
            .iter()
            .copied()
            .find(|scenario| scenario.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "Unknown scenario '{}', expected one of: uptrend, downtrend, sideways, volatile, crash",
                    s
                )
            })
    }
}

/// Generates synthetic daily price history for backtesting
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
    start_date: NaiveDate,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 150.0,
            base_volume: 1_000_000.0,
            start_date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap_or_default(),
        }
    }

    /// Generate `num_days` trading days (weekdays) for a scenario
    pub fn generate(&mut self, scenario: MarketScenario, num_days: usize) -> Vec<DailyRecord> {
        let closes = match scenario {
            MarketScenario::Uptrend => self.trend_closes(num_days, 0.001),
            MarketScenario::Downtrend => self.trend_closes(num_days, -0.001),
            MarketScenario::Sideways => self.sideways_closes(num_days),
            MarketScenario::Volatile => self.volatile_closes(num_days),
            MarketScenario::Crash => self.crash_closes(num_days),
        };

        let dates = trading_days(self.start_date, num_days);

        closes
            .into_iter()
            .zip(dates)
            .enumerate()
            .map(|(i, (close, date))| self.create_record(i, date, close))
            .collect()
    }

    /// Drift per day plus ±1% noise
    fn trend_closes(&mut self, num_days: usize, drift_per_day: f64) -> Vec<f64> {
        let mut closes = Vec::with_capacity(num_days);
        let mut current_price = self.base_price;

        for _ in 0..num_days {
            let drift = current_price * drift_per_day;
            let noise = current_price * self.rng.gen_range(-0.01..0.01);
            current_price += drift + noise;
            closes.push(current_price);
        }

        closes
    }

    /// Mean-reverting random walk
    fn sideways_closes(&mut self, num_days: usize) -> Vec<f64> {
        let mut closes = Vec::with_capacity(num_days);
        let mut current_price = self.base_price;
        let mean_price = self.base_price;

        for _ in 0..num_days {
            let reversion = (mean_price - current_price) * 0.1; // 10% pull to mean
            let noise = current_price * self.rng.gen_range(-0.01..0.01);
            current_price += reversion + noise;
            closes.push(current_price);
        }

        closes
    }

    fn volatile_closes(&mut self, num_days: usize) -> Vec<f64> {
        let mut closes = Vec::with_capacity(num_days);
        let mut current_price = self.base_price;

        for _ in 0..num_days {
            let change = current_price * self.rng.gen_range(-0.03..0.03);
            current_price += change;

            // Prevent price from going too low
            if current_price < self.base_price * 0.5 {
                current_price = self.base_price * 0.5;
            }

            closes.push(current_price);
        }

        closes
    }

    fn crash_closes(&mut self, num_days: usize) -> Vec<f64> {
        let mut closes = Vec::with_capacity(num_days);
        let mut current_price = self.base_price;
        let half = (num_days / 2).max(1);

        for i in 0..num_days {
            if i < num_days / 2 {
                let change = current_price * self.rng.gen_range(-0.005..0.008);
                current_price += change;
            } else {
                // -30% spread over the second half
                let drop = current_price * (-0.30 / half as f64);
                let noise = current_price * self.rng.gen_range(-0.003..0.003);
                current_price += drop + noise;
            }
            closes.push(current_price);
        }

        closes
    }

    /// Helper to create a daily record from a close
    fn create_record(&mut self, sequence_index: usize, date: NaiveDate, price: f64) -> DailyRecord {
        let noise_pct = 0.005; // ±0.5% intraday range

        let high = price * (1.0 + self.rng.gen_range(0.0..noise_pct));
        let low = price * (1.0 - self.rng.gen_range(0.0..noise_pct));

        let open_raw = price * (1.0 + self.rng.gen_range(-noise_pct..noise_pct));
        let open = open_raw.clamp(low, high);

        // Vary volume ±30%
        let volume = (self.base_volume * self.rng.gen_range(0.7..1.3)).round();

        DailyRecord {
            sequence_index,
            date: Some(date),
            open,
            high,
            low,
            close: price,
            adj_close: price,
            volume,
        }
    }
}

/// `count` consecutive weekdays starting at `start` (or the next weekday)
fn trading_days(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(count);
    let mut date = start;

    while days.len() < count {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(date);
        }
        date += Duration::days(1);
    }

    days
}
