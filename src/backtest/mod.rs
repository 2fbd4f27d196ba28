pub mod metrics;
pub mod runner;
pub mod sweep;
pub mod synthetic;

pub use metrics::{summarize, BacktestReport};
pub use runner::{BacktestRunner, DayOutcome, Simulation, SimulationState};
pub use sweep::{best_result, print_sweep_table, run_threshold_sweep, SweepResult};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
