use chrono::{Duration, NaiveDate};
use rstest::rstest;
use sales_forecast::models::exponential_smoothing::HoltLinear;
use sales_forecast::{
    ForecastError, ForecastModel, HoltWinters, TimeSeriesData, TrainedForecastModel,
    TrainedHoltWinters,
};
use tempfile::tempdir;

fn create_test_data(days: i64) -> TimeSeriesData {
    let start = NaiveDate::from_ymd_opt(2023, 12, 20).unwrap();
    TimeSeriesData::from_observations((0..days).map(|d| {
        let weekend = if d % 7 >= 5 { 80.0 } else { 0.0 };
        (start + Duration::days(d), 200.0 + 1.5 * d as f64 + weekend)
    }))
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(30)]
#[case(365)]
fn test_forecast_horizon_dates(#[case] horizon: usize) {
    let data = create_test_data(60);
    let last = data.last_date().unwrap();
    let trained = HoltWinters::weekly().train(&data).unwrap();

    let forecast = trained.forecast(horizon).unwrap();
    assert_eq!(forecast.horizon(), horizon);

    let dates = forecast.dates();
    assert_eq!(dates[0], last + Duration::days(1));
    for pair in dates.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::days(1));
    }
    for point in forecast.points() {
        assert!(point.lower <= point.value && point.value <= point.upper);
    }
}

#[test]
fn test_holt_linear_horizon() {
    let data = create_test_data(20);
    let trained = HoltLinear::new(0.2).unwrap().train(&data).unwrap();
    let forecast = trained.forecast(30).unwrap();

    assert_eq!(forecast.horizon(), 30);
    assert_eq!(forecast.dates()[0], data.last_date().unwrap() + Duration::days(1));
    assert_eq!(trained.fitted().len(), data.len());
}

#[test]
fn test_seasonal_forecast_tracks_weekends() {
    let trained = HoltWinters::weekly().train(&create_test_data(84)).unwrap();
    let forecast = trained.forecast(7).unwrap();
    let start = NaiveDate::from_ymd_opt(2023, 12, 20).unwrap();

    let (weekend, weekday): (Vec<_>, Vec<_>) = forecast
        .points()
        .iter()
        .partition(|p| (p.date - start).num_days() % 7 >= 5);
    let low_weekend = weekend.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
    let high_weekday = weekday.iter().map(|p| p.value).fold(f64::NEG_INFINITY, f64::max);
    assert!(low_weekend > high_weekday);
}

#[test]
fn test_save_and_load_forecaster() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sales_forecaster.json");
    let trained = HoltWinters::weekly().train(&create_test_data(30)).unwrap();

    trained.save(&path).unwrap();
    let loaded = TrainedHoltWinters::load(&path).unwrap();
    assert_eq!(loaded.last_date(), trained.last_date());
    assert_eq!(loaded.forecast(10).unwrap().dates(), trained.forecast(10).unwrap().dates());
}

#[test]
fn test_missing_forecaster() {
    let dir = tempdir().unwrap();
    let result = TrainedHoltWinters::load(dir.path().join("nope.json"));
    assert!(matches!(result, Err(ForecastError::ModelUnavailable(_))));
}
