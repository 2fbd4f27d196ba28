// Core modules
pub mod api;
pub mod backfill;
pub mod backtest;
pub mod config;
pub mod error;
pub mod models;
pub mod strategy;

// Re-export commonly used types
pub use backtest::{BacktestReport, BacktestRunner};
pub use error::{LoadError, SimulationError};
pub use models::*;
pub use strategy::{Strategy, StrategyParams};

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
