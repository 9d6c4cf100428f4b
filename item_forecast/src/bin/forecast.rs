//! Command-line forecaster: one next-period forecast for one item of a CSV table.

use clap::Parser;
use item_forecast::{
    DataLoader, ForecastConfig, ForecastError, ForecastOutcome, ForecastService, RetrainPolicy,
    SeriesColumns,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "forecast")]
#[command(about = "Next-period LSTM forecast for one item", long_about = None)]
struct Args {
    /// Long-format CSV with item, period and value columns
    csv: PathBuf,

    /// Item to forecast, as written in the item column
    item: String,

    /// Directory holding model artifacts (overrides the config file)
    #[arg(short, long)]
    models: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Retrain even if a persisted model exists
    #[arg(long)]
    force_retrain: bool,

    /// Item column name
    #[arg(long, default_value = "Item")]
    item_column: String,

    /// Period column name
    #[arg(long, default_value = "Year")]
    period_column: String,

    /// Value column name
    #[arg(long, default_value = "Value_winsor")]
    value_column: String,
}

/// Format with thousands separators and no decimals, e.g. `12,346`
fn format_thousands(value: f64) -> String {
    let rounded = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, ch) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0.0 && rounded != "0" {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

fn run(args: Args) -> Result<(), ForecastError> {
    let mut config = match &args.config {
        Some(path) => ForecastConfig::from_json_file(path)?,
        None => ForecastConfig::default(),
    };
    if let Some(dir) = args.models {
        config = config.with_model_dir(dir);
    }
    let policy = if args.force_retrain {
        RetrainPolicy::Always
    } else {
        config.retrain
    };

    let columns = SeriesColumns {
        item: args.item_column,
        period: args.period_column,
        value: args.value_column,
    };
    let panel = DataLoader::from_csv(&args.csv, &columns)?;
    let series = panel.find(&args.item).ok_or_else(|| {
        ForecastError::DataError(format!(
            "Item '{}' not found; available: {}",
            args.item,
            panel.items().join(", ")
        ))
    })?;

    let service = ForecastService::new(config)?;
    match service.forecast_with(series.item_id(), series.values(), policy)? {
        ForecastOutcome::Forecast(forecast) => println!(
            "Next-period forecast ({}): {}",
            forecast.item_id,
            format_thousands(forecast.value)
        ),
        ForecastOutcome::Unavailable(reason) => println!("{}", reason),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Forecast failed: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{format_thousands, Args};
    use clap::{CommandFactory, Parser};

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["forecast", "prices.csv", "Napa Cabbage", "--force-retrain"]);
        assert_eq!(args.item, "Napa Cabbage");
        assert!(args.force_retrain);
        assert!(args.models.is_none());
        assert_eq!(args.value_column, "Value_winsor");
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0.4), "0");
        assert_eq!(format_thousands(999.0), "999");
        assert_eq!(format_thousands(1234.0), "1,234");
        assert_eq!(format_thousands(12345.6), "12,346");
        assert_eq!(format_thousands(-1234567.0), "-1,234,567");
    }
}
