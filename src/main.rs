use clap::{Args, Parser, Subcommand};
use dca_backtest::api::YahooClient;
use dca_backtest::backfill::{self, load_series, DateRange, SeriesValidator};
use dca_backtest::backtest::{
    print_sweep_table, run_threshold_sweep, BacktestRunner, MarketScenario,
    SyntheticDataGenerator,
};
use dca_backtest::config::Settings;
use dca_backtest::models::DailyRecord;
use dca_backtest::strategy::StrategyParams;
use dca_backtest::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_TICKER: &str = "SPY";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Backtest dollar-cost averaging into a security on down days"
)]
struct Cli {
    /// Settings file (defaults to ./dca.toml when present)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Retrieve daily history for a ticker into the cache directory
    Fetch {
        /// Ticker symbol
        #[arg(long, short = 't', default_value = DEFAULT_TICKER)]
        ticker: String,

        /// First day as YYYY-MM-DD (default: a year before the end date)
        #[arg(long, short = 's')]
        start_date: Option<String>,

        /// Last day as YYYY-MM-DD (default: yesterday)
        #[arg(long, short = 'e')]
        end_date: Option<String>,
    },

    /// Run the strategy and print each buy plus a summary
    Simulate {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        strategy: StrategyArgs,

        /// Print the report as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run the same series under several buy thresholds in parallel
    Sweep {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        strategy: StrategyArgs,

        /// Comma-separated thresholds, e.g. -0.03,-0.01,0
        #[arg(
            long,
            value_delimiter = ',',
            allow_hyphen_values = true,
            default_values_t = vec![-0.03, -0.02, -0.01, -0.005, 0.0]
        )]
        thresholds: Vec<f64>,
    },
}

/// Where the daily series comes from
#[derive(Args, Debug)]
struct SourceArgs {
    /// Tab- or comma-delimited file with an 'Adj Close' or 'Close' column
    #[arg(long, short = 'i', conflicts_with_all = ["ticker", "synthetic"])]
    input: Option<PathBuf>,

    /// Ticker to load from cache or fetch (default SPY)
    #[arg(long, short = 't', conflicts_with = "synthetic")]
    ticker: Option<String>,

    /// First day as YYYY-MM-DD when using --ticker
    #[arg(long, short = 's')]
    start_date: Option<String>,

    /// Last day as YYYY-MM-DD when using --ticker
    #[arg(long, short = 'e')]
    end_date: Option<String>,

    /// Generated series: uptrend, downtrend, sideways, volatile or crash
    #[arg(long)]
    synthetic: Option<MarketScenario>,

    /// Number of trading days for --synthetic
    #[arg(long, default_value_t = 750)]
    days: usize,

    /// Seed for --synthetic
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Overrides for the configured strategy parameters
#[derive(Args, Debug)]
struct StrategyArgs {
    /// Cash available at the start
    #[arg(long)]
    starting_cash: Option<f64>,

    /// Base cash deployed per buy
    #[arg(long)]
    deployment_size: Option<f64>,

    /// Buy when the day-over-day change is at or below this (e.g. -0.01)
    #[arg(long, allow_negative_numbers = true)]
    buy_threshold: Option<f64>,
}

impl StrategyArgs {
    fn apply(&self, settings: &Settings) -> StrategyParams {
        let base = settings.strategy_params();
        StrategyParams::new(
            self.starting_cash.unwrap_or(base.starting_cash),
            self.deployment_size.unwrap_or(base.base_deployment_size),
            self.buy_threshold.unwrap_or(base.buy_threshold),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    tracing::debug!("Settings: {:?}", settings);

    match cli.command {
        Command::Fetch {
            ticker,
            start_date,
            end_date,
        } => {
            let range = DateRange::resolve(start_date.as_deref(), end_date.as_deref())?;
            let records = fetch_history(&ticker, &range, &settings).await?;
            println!(
                "{} days of {} from {} to {} in {}",
                records.len(),
                ticker.to_uppercase(),
                range.start,
                range.end,
                backfill::cache_path(&settings.data_dir, &ticker, &range).display()
            );
        }
        Command::Simulate {
            source,
            strategy,
            json,
        } => {
            let (name, records) = load_records(&source, &settings).await?;
            let runner = BacktestRunner::new(strategy.apply(&settings));

            if json {
                let report = runner.run(&records)?;
                println!("{}", report.to_json()?);
            } else {
                runner.run_and_report(&records, &name)?;
            }
        }
        Command::Sweep {
            source,
            strategy,
            thresholds,
        } => {
            let (name, records) = load_records(&source, &settings).await?;
            let base = strategy.apply(&settings);

            println!("\n🔬 Sweeping {} buy thresholds over {}", thresholds.len(), name);
            println!("   Days: {}", records.len());
            println!("   Start With: ${:.2}", base.starting_cash);
            println!("   Deploy Size: ${:.2}", base.base_deployment_size);

            let results = run_threshold_sweep(Arc::new(records), base, &thresholds).await;
            print_sweep_table(&results);
        }
    }

    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dca_backtest=info"));

    // Logs go to stderr so the report on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn fetch_history(
    ticker: &str,
    range: &DateRange,
    settings: &Settings,
) -> Result<Vec<DailyRecord>> {
    let client = YahooClient::with_base_url(settings.yahoo_base_url.as_str())?;
    backfill::load_or_fetch(ticker, range, &settings.data_dir, &client).await
}

/// Resolve the series to simulate and check it is usable
async fn load_records(
    source: &SourceArgs,
    settings: &Settings,
) -> Result<(String, Vec<DailyRecord>)> {
    let (name, records) = if let Some(path) = &source.input {
        (path.display().to_string(), load_series(path)?)
    } else if let Some(scenario) = source.synthetic {
        let mut generator = SyntheticDataGenerator::new(source.seed);
        (
            format!("synthetic {} ({} days, seed {})", scenario, source.days, source.seed),
            generator.generate(scenario, source.days),
        )
    } else {
        let ticker = source.ticker.as_deref().unwrap_or(DEFAULT_TICKER);
        let range = DateRange::resolve(source.start_date.as_deref(), source.end_date.as_deref())?;
        let records = fetch_history(ticker, &range, settings).await?;
        (backfill::cache_file_name(ticker, &range), records)
    };

    SeriesValidator::new().validate(&records)?;
    tracing::info!("Loaded {} daily records from {}", records.len(), name);

    Ok((name, records))
}
