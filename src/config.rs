use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::api::yahoo::YAHOO_API_BASE;
use crate::strategy::dca::{
    DEFAULT_BASE_DEPLOYMENT_SIZE, DEFAULT_BUY_THRESHOLD, DEFAULT_STARTING_CASH,
};
use crate::strategy::StrategyParams;

const DEFAULT_CONFIG_FILE: &str = "dca";
const ENV_PREFIX: &str = "DCA";

/// Runtime settings
///
/// Layered, later sources winning: built-in defaults, `dca.toml` (or an
/// explicit file), then `DCA_*` environment variables such as
/// `DCA_STARTING_CASH` or `DCA_BUY_THRESHOLD`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub starting_cash: f64,
    pub base_deployment_size: f64,
    pub buy_threshold: f64,
    pub data_dir: PathBuf,
    pub yahoo_base_url: String,
}

impl Settings {
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let file = match config_file {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Self::builder()?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("starting_cash", DEFAULT_STARTING_CASH)?
            .set_default("base_deployment_size", DEFAULT_BASE_DEPLOYMENT_SIZE)?
            .set_default("buy_threshold", DEFAULT_BUY_THRESHOLD)?
            .set_default("data_dir", "ticker_data")?
            .set_default("yahoo_base_url", YAHOO_API_BASE)
    }

    pub fn strategy_params(&self) -> StrategyParams {
        StrategyParams::new(
            self.starting_cash,
            self.base_deployment_size,
            self.buy_threshold,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::builder()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize::<Settings>()
            .unwrap();

        assert_eq!(settings.starting_cash, 100_000.0);
        assert_eq!(settings.base_deployment_size, 50.0);
        assert_eq!(settings.buy_threshold, 0.0);
        assert_eq!(settings.data_dir, PathBuf::from("ticker_data"));
        assert_eq!(settings.strategy_params(), StrategyParams::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "starting_cash = 2500.0\nbuy_threshold = -0.015").unwrap();

        let settings = Settings::load(file.path().to_str()).unwrap();

        assert_eq!(settings.starting_cash, 2500.0);
        assert_eq!(settings.buy_threshold, -0.015);
        // Untouched keys keep defaults
        assert_eq!(settings.base_deployment_size, 50.0);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(Settings::load(Some("/nonexistent/dca-settings.toml")).is_err());
    }
}
