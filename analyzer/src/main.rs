use anyhow::Context;
use clap::Parser;
use price_analyzer::{utils::init_logger, utils::load_series_from_path, AnalysisConfig, Analyzer};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "price-analyzer")]
#[command(about = "Summarize trend, volatility and moving averages of a daily closing-price CSV")]
pub struct Cli {
    /// CSV file with `date` and `close` columns (`volume` optional)
    #[arg(short, long)]
    file: PathBuf,
    /// Symbol reported in the output
    #[arg(short, long, default_value = "UNKNOWN")]
    symbol: String,
    /// Short moving-average window
    #[arg(long, default_value_t = 5)]
    short: usize,
    /// Long moving-average window
    #[arg(long, default_value_t = 20)]
    long: usize,
    /// Percent change below which the trend is reported as flat
    #[arg(long, default_value_t = 0.5)]
    flat_band: f64,
}

fn main() -> anyhow::Result<()> {
    init_logger()?;

    let cli = Cli::parse();

    let config = AnalysisConfig {
        short_window: cli.short,
        long_window: cli.long,
        flat_band_percent: cli.flat_band,
        ..AnalysisConfig::default()
    };
    config.validate()?;

    let series = load_series_from_path(&cli.file)?;
    tracing::info!(file = %cli.file.display(), observations = series.len(), "Loaded price series");

    let symbol = cli.symbol.trim().to_uppercase();
    let result = Analyzer::new(config)
        .summarize(&series, &symbol)
        .with_context(|| format!("cannot analyze {}", cli.file.display()))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
