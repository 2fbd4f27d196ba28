// Trading strategy module
pub mod dca;

pub use dca::{price_change_pct, DipBuyStrategy, StrategyParams};

use crate::models::Signal;

/// Base trait for day-over-day accumulation strategies
pub trait Strategy: Send + Sync {
    /// Decide whether to buy given the change since the previous close
    fn generate_signal(&self, price_change_pct: f64) -> Signal;

    /// Cash to deploy on a buy, never more than `cash_remaining`
    fn deployment_amount(&self, days_since_last_buy: u32, cash_remaining: f64) -> f64;

    /// Get strategy name
    fn name(&self) -> &str;
}
