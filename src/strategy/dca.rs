use super::Strategy;
use crate::error::SimulationError;
use crate::models::Signal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_STARTING_CASH: f64 = 100_000.0;
pub const DEFAULT_BASE_DEPLOYMENT_SIZE: f64 = 50.0;
pub const DEFAULT_BUY_THRESHOLD: f64 = 0.0;

/// Parameters for one dip-buying run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StrategyParams {
    pub starting_cash: f64,
    pub base_deployment_size: f64, // Cash deployed per trigger, before the wait multiplier
    pub buy_threshold: f64,        // Fractional change at or below which we buy (-0.01 = 1% drop)
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            starting_cash: DEFAULT_STARTING_CASH,
            base_deployment_size: DEFAULT_BASE_DEPLOYMENT_SIZE,
            buy_threshold: DEFAULT_BUY_THRESHOLD,
        }
    }
}

impl StrategyParams {
    pub fn new(starting_cash: f64, base_deployment_size: f64, buy_threshold: f64) -> Self {
        Self {
            starting_cash,
            base_deployment_size,
            buy_threshold,
        }
    }

    pub fn with_buy_threshold(self, buy_threshold: f64) -> Self {
        Self {
            buy_threshold,
            ..self
        }
    }

    /// Reject configurations the simulator cannot run with
    pub fn validate(&self) -> Result<(), SimulationError> {
        if !self.starting_cash.is_finite() || self.starting_cash <= 0.0 {
            return Err(SimulationError::InvalidParams {
                field: "starting_cash",
                value: self.starting_cash,
                reason: "must be a positive number",
            });
        }
        if !self.base_deployment_size.is_finite() || self.base_deployment_size <= 0.0 {
            return Err(SimulationError::InvalidParams {
                field: "base_deployment_size",
                value: self.base_deployment_size,
                reason: "must be a positive number",
            });
        }
        if !self.buy_threshold.is_finite() || self.buy_threshold > 0.0 {
            return Err(SimulationError::InvalidParams {
                field: "buy_threshold",
                value: self.buy_threshold,
                reason: "must be zero or negative",
            });
        }
        Ok(())
    }
}

/// Fractional change from `prev_close` to `curr_close`
pub fn price_change_pct(prev_close: f64, curr_close: f64) -> f64 {
    (curr_close - prev_close) / prev_close
}

/// Dip-buying Dollar Cost Averaging strategy
///
/// Buys whenever the close is at or below `buy_threshold` relative to the
/// previous close. The longer it has been since the last buy, the more cash
/// goes in:
/// - multiplier = max(days since last buy, 1)
/// - amount = min(base deployment size * multiplier, cash remaining)
/// - Never sells
#[derive(Debug, Clone)]
pub struct DipBuyStrategy {
    base_deployment_size: f64,
    buy_threshold: f64,
}

impl DipBuyStrategy {
    pub fn new(base_deployment_size: f64, buy_threshold: f64) -> Self {
        Self {
            base_deployment_size,
            buy_threshold,
        }
    }

    pub fn from_params(params: &StrategyParams) -> Self {
        Self::new(params.base_deployment_size, params.buy_threshold)
    }

    pub fn buy_threshold(&self) -> f64 {
        self.buy_threshold
    }
}

impl Default for DipBuyStrategy {
    fn default() -> Self {
        Self::from_params(&StrategyParams::default())
    }
}

impl Strategy for DipBuyStrategy {
    fn generate_signal(&self, price_change_pct: f64) -> Signal {
        if price_change_pct <= self.buy_threshold {
            Signal::Buy
        } else {
            Signal::Hold
        }
    }

    fn deployment_amount(&self, days_since_last_buy: u32, cash_remaining: f64) -> f64 {
        let multiplier = days_since_last_buy.max(1) as f64;
        (self.base_deployment_size * multiplier).min(cash_remaining.max(0.0))
    }

    fn name(&self) -> &str {
        "DipBuyDCA"
    }
}
