use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day of price history
///
/// `sequence_index` is the record's 0-based position in the series it was
/// loaded into. The simulator only reads `adj_close`; the remaining provider
/// fields are carried along for reporting and caching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyRecord {
    pub sequence_index: usize,
    pub date: Option<NaiveDate>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64, // Split/dividend adjusted close
    pub volume: f64,
}

impl DailyRecord {
    /// Build a record that only carries a close price (open/high/low mirror it)
    pub fn from_close(sequence_index: usize, close_price: f64) -> Self {
        Self {
            sequence_index,
            date: None,
            open: close_price,
            high: close_price,
            low: close_price,
            close: close_price,
            adj_close: close_price,
            volume: 0.0,
        }
    }

    /// The price the simulator trades at
    pub fn close_price(&self) -> f64 {
        self.adj_close
    }
}

/// Build a gap-free series from a list of closes
pub fn series_from_closes(closes: &[f64]) -> Vec<DailyRecord> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| DailyRecord::from_close(i, close))
        .collect()
}

/// Trading signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Hold,
}

/// One executed buy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lot {
    pub day: usize,
    pub shares: f64,
    pub buy_price: f64,
}

/// Everything that happened on a day the strategy bought
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuyEvent {
    pub day: usize,
    pub price_change_pct: f64,
    pub days_waited: u32,
    pub amount_deployed: f64,
    pub price: f64,
    pub shares_bought: f64,
    pub cumulative_shares: f64,
    pub cumulative_value: f64,
    pub cash_invested: f64,
    pub profit: f64,
    pub profit_pct: Option<f64>, // None while nothing has been invested
    pub cash_remaining: f64,
}

/// Final position after a run, marked to the last price reached
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub last_day: usize,
    pub last_price: f64,
    pub buy_count: usize,
    pub total_shares: f64,
    pub value_of_shares: f64,
    pub cash_invested: f64,
    pub cash_remaining: f64,
    pub total_profit: f64,
    pub total_profit_pct: Option<f64>,
    pub average_cost_basis: Option<f64>,
    pub stopped_early: bool,
}

impl Summary {
    pub fn invested_anything(&self) -> bool {
        self.cash_invested > 0.0
    }
}

/// `profit / invested`, or None when nothing has been invested yet
pub fn ratio_or_none(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// Format a fraction as a two-decimal percentage ("-5.26%"), "n/a" when absent
pub fn format_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v * 100.0),
        None => "n/a".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_from_closes_assigns_indices() {
        let series = series_from_closes(&[100.0, 95.0, 90.0]);

        assert_eq!(series.len(), 3);
        for (i, rec) in series.iter().enumerate() {
            assert_eq!(rec.sequence_index, i);
        }
        assert_eq!(series[1].close_price(), 95.0);
    }

    #[test]
    fn test_close_price_uses_adjusted_close() {
        let mut rec = DailyRecord::from_close(0, 100.0);
        rec.close = 120.0;
        assert_eq!(rec.close_price(), 100.0);
    }

    #[test]
    fn test_ratio_or_none() {
        assert_eq!(ratio_or_none(5.0, 0.0), None);
        assert_eq!(ratio_or_none(5.0, 10.0), Some(0.5));
    }

    #[test]
    fn test_format_pct() {
        assert_eq!(format_pct(Some(-0.0526)), "-5.26%");
        assert_eq!(format_pct(Some(0.0)), "0.00%");
        assert_eq!(format_pct(None), "n/a");
    }
}
