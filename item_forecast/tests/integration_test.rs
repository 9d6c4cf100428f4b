use item_forecast::{
    make_windows, DataLoader, FileModelStore, ForecastConfig, ForecastOutcome, ForecastService,
    ModelSource, ModelStore, SeriesColumns, UnavailableReason,
};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const SERIES: [f64; 8] = [10.0, 12.0, 11.0, 13.0, 15.0, 14.0, 16.0, 18.0];

// Helper function to create a simple test dataset
fn create_sample_data() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();

    writeln!(file, "Item,Year,Value_winsor").unwrap();
    for (i, value) in SERIES.iter().enumerate() {
        writeln!(file, "Napa Cabbage,{},{}", 2010 + i, value).unwrap();
    }
    for year in 2015..2020 {
        writeln!(file, "Burdock,{},{}", year, 400 + year % 7).unwrap();
    }

    file
}

#[test]
fn test_reference_series_yields_three_windows() {
    assert_eq!(make_windows(&SERIES, 5).len(), 3);
}

#[test]
fn test_reference_series_below_default_window_threshold() {
    let dir = TempDir::new().unwrap();
    let config = ForecastConfig::default().with_model_dir(dir.path());
    let service = ForecastService::new(config).unwrap();

    let outcome = service.forecast("Napa Cabbage", &SERIES).unwrap();

    assert_eq!(
        outcome.unavailable_reason(),
        Some(UnavailableReason::InsufficientWindows {
            required: 5,
            actual: 3
        })
    );
    assert!(!FileModelStore::new(dir.path()).exists("Napa Cabbage"));
}

#[test]
fn test_full_forecast_workflow() {
    // 1. Load data
    let data_file = create_sample_data();
    let panel = DataLoader::from_csv(data_file.path(), &SeriesColumns::default()).unwrap();
    assert_eq!(panel.items(), vec!["Burdock", "Napa Cabbage"]);
    let series = panel.get("Napa Cabbage").unwrap();
    assert_eq!(series.values(), &SERIES);

    // 2. Forecast with the production architecture, accepting three windows
    let dir = TempDir::new().unwrap();
    let config = ForecastConfig {
        min_windows: 3,
        ..ForecastConfig::default()
    }
    .with_model_dir(dir.path().join("models"));
    let service = ForecastService::new(config.clone()).unwrap();

    let forecast = match service.forecast_series(series).unwrap() {
        ForecastOutcome::Forecast(f) => f,
        other => panic!("expected a forecast, got {:?}", other),
    };
    assert_eq!(forecast.source, ModelSource::Trained);
    assert!(forecast.value.is_finite());

    // 3. Artifact persisted under the normalised name
    let store = FileModelStore::new(dir.path().join("models"));
    assert!(dir.path().join("models").join("lstm_napa_cabbage.json").is_file());
    let artifact = store.load("napa cabbage").unwrap();
    assert_eq!(artifact.item_id, "Napa Cabbage");
    assert_eq!(artifact.series_len, 8);
    assert_eq!(artifact.report.windows, 3);

    // 4. A new process reuses the artifact
    let restarted = ForecastService::new(config).unwrap();
    match restarted.forecast("NAPA CABBAGE", series.values()).unwrap() {
        ForecastOutcome::Forecast(f) => {
            assert_eq!(f.source, ModelSource::Store);
            assert_eq!(f.value, forecast.value);
        }
        other => panic!("expected a forecast, got {:?}", other),
    }

    // 5. Short items report insufficient history
    let burdock = panel.get("Burdock").unwrap();
    assert_eq!(
        restarted.forecast_series(burdock).unwrap(),
        ForecastOutcome::Unavailable(UnavailableReason::InsufficientHistory {
            required: 8,
            actual: 5
        })
    );
}

#[test]
fn test_config_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("forecast.json");
    let config = ForecastConfig {
        epochs: 25,
        ..ForecastConfig::default()
    }
    .with_model_dir(dir.path().join("models"));
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let loaded = ForecastConfig::from_json_file(&path).unwrap();
    assert_eq!(loaded, config);

    std::fs::write(&path, r#"{"horizon": 3}"#).unwrap();
    assert!(ForecastConfig::from_json_file(&path).is_err());
}
