//! Analytics operations over the order store and the trained models.
//!
//! [`AnalyticsService`] is built once from an [`AppConfig`]. It loads the churn
//! model package and the sales forecaster at construction and shares them
//! read-only afterwards. Each operation opens its own store connection and
//! releases it before returning, so every answer is computed from the current
//! contents of the store.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use churn_model::{
    train_churn_model, ChurnClassifier, ChurnScore, FeatureEngine, ModelPackage, PipelineError,
    RiskSegment, TrainingReport,
};
use commerce_store::{
    import_csv, AgeGroupSales, CountryCount, DailyValue, ImportSummary, OrderRecord, OrderStats,
    ProductSales, Store, YearlyQuantity,
};
use sales_forecast::metrics::{holdout_accuracy, ForecastAccuracy};
use sales_forecast::models::holt_winters::WEEKLY_SEASON;
use sales_forecast::{
    DemandEstimate, DemandRule, ForecastError, ForecastModel, ForecastResult, HoltWinters,
    MonthTotal, TimeSeriesData, TrainedForecastModel, TrainedHoltWinters,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, IN_MEMORY_DATABASE};
use crate::error::{ErrorBody, Result, ServiceError};

/// Predicted churners for one month of last purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurnTrendPoint {
    /// `YYYY-MM`
    pub month: String,
    pub churn_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCount {
    pub segment: RiskSegment,
    pub customers: usize,
}

/// Recent daily history followed by the forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullSalesView {
    pub history: Vec<DailyValue>,
    pub forecast: ForecastResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesKpis {
    pub total_revenue: f64,
    /// Mean revenue over days that had sales
    pub average_daily_sales: f64,
    /// `%B %Y`
    pub best_month: Option<String>,
    pub worst_month: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainKpis {
    pub total_revenue: f64,
    pub total_orders: i64,
    pub average_order_value: f64,
    /// Percentage of customers predicted to churn; absent without a churn model
    pub churn_rate: Option<f64>,
}

/// Result of one product's demand estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DemandOutcome {
    Forecast(DemandEstimate),
    Failed(ErrorBody),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDemand {
    pub product_id: String,
    pub product_name: Option<String>,
    pub category: Option<String>,
    #[serde(flatten)]
    pub outcome: DemandOutcome,
}

/// Units sold in a labelled period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodQuantity {
    pub period: String,
    pub total_quantity: f64,
}

/// Summary of a forecaster training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecasterReport {
    pub observations: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: NaiveDate,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub sigma: f64,
    /// Accuracy of a two-week holdout, when the series is long enough
    pub holdout: Option<ForecastAccuracy>,
}

pub struct AnalyticsService {
    config: AppConfig,
    classifier: Option<ChurnClassifier>,
    forecaster: Option<Arc<TrainedHoltWinters>>,
}

impl AnalyticsService {
    /// Build the service, loading whichever model artifacts are present.
    ///
    /// A missing or rejected artifact disables the features that need it.
    pub fn new(config: AppConfig) -> Self {
        let classifier = match ModelPackage::load(&config.models.churn_model_path) {
            Ok(package) => Some(ChurnClassifier::new(Arc::new(package))),
            Err(PipelineError::ModelUnavailable(msg)) => {
                warn!(%msg, "Churn model not loaded, churn features disabled");
                None
            }
            Err(err) => {
                error!(%err, "Churn model rejected, churn features disabled");
                None
            }
        };

        let forecaster = match TrainedHoltWinters::load(&config.models.sales_model_path) {
            Ok(trained) => Some(Arc::new(trained)),
            Err(ForecastError::ModelUnavailable(msg)) => {
                warn!(%msg, "Sales forecaster not loaded, forecasts disabled");
                None
            }
            Err(err) => {
                error!(%err, "Sales forecaster rejected, forecasts disabled");
                None
            }
        };

        Self {
            config,
            classifier,
            forecaster,
        }
    }

    /// Build the service around already loaded models
    pub fn with_models(
        config: AppConfig,
        package: Option<ModelPackage>,
        forecaster: Option<TrainedHoltWinters>,
    ) -> Self {
        Self {
            config,
            classifier: package.map(|p| ChurnClassifier::new(Arc::new(p))),
            forecaster: forecaster.map(Arc::new),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn has_churn_model(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn has_forecaster(&self) -> bool {
        self.forecaster.is_some()
    }

    fn open_store(&self) -> Result<Store> {
        let path = &self.config.database.path;
        if path == IN_MEMORY_DATABASE {
            return Err(ServiceError::Config(format!(
                "database.path {IN_MEMORY_DATABASE} is not supported, use a file"
            )));
        }
        Ok(Store::open(path)?)
    }

    fn classifier(&self) -> Result<&ChurnClassifier> {
        self.classifier.as_ref().ok_or_else(|| {
            ServiceError::ModelUnavailable("churn model has not been trained".to_string())
        })
    }

    fn forecaster(&self) -> Result<&TrainedHoltWinters> {
        self.forecaster.as_deref().ok_or_else(|| {
            ServiceError::ModelUnavailable("sales forecaster has not been trained".to_string())
        })
    }

    fn forecast_horizon(&self, days: usize) -> Result<usize> {
        if days == 0 {
            return Err(ServiceError::InvalidRequest(
                "forecast days must be positive".to_string(),
            ));
        }
        Ok(days.min(self.config.api.max_forecast_days))
    }

    /// Score every customer with orders against the configured reference date
    fn score_customers(&self) -> Result<Vec<ChurnScore>> {
        let classifier = self.classifier()?;
        let aggregates = self.open_store()?.customer_aggregates()?;
        let batch = FeatureEngine::new(self.config.reference_instant()).derive(&aggregates);
        debug!(customers = batch.len(), "Derived churn features");
        Ok(classifier.score(&batch)?)
    }

    fn daily_sales_series(&self) -> Result<TimeSeriesData> {
        let daily = self.open_store()?.daily_sales()?;
        Ok(series_from(daily))
    }

    /// Customers most likely to churn, highest probability first
    pub fn predict_churn(&self, count: usize) -> Result<Vec<ChurnScore>> {
        if count == 0 {
            return Err(ServiceError::InvalidRequest(
                "count must be positive".to_string(),
            ));
        }
        let count = count.min(self.config.api.max_churn_predictions);

        let mut scores = self.score_customers()?;
        scores.sort_by(|a, b| {
            b.probability
                .total_cmp(&a.probability)
                .then_with(|| a.customer_id.cmp(&b.customer_id))
        });
        scores.truncate(count);
        Ok(scores)
    }

    /// Predicted churners per month of last purchase, contiguous and zero-filled
    pub fn churn_trends(&self) -> Result<Vec<ChurnTrendPoint>> {
        let scores = self.score_customers()?;

        let mut months: BTreeMap<(i32, u32), usize> = BTreeMap::new();
        for date in scores
            .iter()
            .filter(|s| s.predicted_churn)
            .filter_map(|s| s.last_seen)
        {
            *months.entry((date.year(), date.month())).or_insert(0) += 1;
        }

        let (Some(&first), Some(&last)) = (months.keys().next(), months.keys().next_back()) else {
            return Ok(Vec::new());
        };
        Ok(month_range(first, last)
            .map(|(year, month)| ChurnTrendPoint {
                month: format!("{year:04}-{month:02}"),
                churn_count: months.get(&(year, month)).copied().unwrap_or(0),
            })
            .collect())
    }

    /// Customer count per risk segment, every segment listed
    pub fn churn_segmentation(&self) -> Result<Vec<SegmentCount>> {
        let scores = self.score_customers()?;
        Ok(RiskSegment::ALL
            .iter()
            .map(|&segment| SegmentCount {
                segment,
                customers: scores.iter().filter(|s| s.segment == segment).count(),
            })
            .collect())
    }

    /// Daily sales forecast continuing after the forecaster's last training date
    pub fn sales_forecast(&self, days: usize) -> Result<ForecastResult> {
        let horizon = self.forecast_horizon(days)?;
        let forecast = self.forecaster()?.forecast(horizon)?;
        debug!(horizon, "Forecast daily sales");
        Ok(forecast)
    }

    /// Zero-filled daily history over the configured window plus the forecast
    pub fn full_sales_view(&self, days: usize) -> Result<FullSalesView> {
        let forecast = self.sales_forecast(days)?;
        let series = self.daily_sales_series()?;
        let window = series.window(self.config.data.history_window_days as i64 - 1);

        let history = window
            .dates()
            .iter()
            .zip(window.values())
            .map(|(&date, &value)| DailyValue { date, value })
            .collect();
        Ok(FullSalesView { history, forecast })
    }

    pub fn sales_kpis(&self) -> Result<SalesKpis> {
        let (totals, daily) = {
            let store = self.open_store()?;
            (store.order_totals()?, store.daily_sales()?)
        };
        if daily.is_empty() {
            return Err(ServiceError::DataUnavailable(
                "No dated sales recorded".to_string(),
            ));
        }

        let average_daily_sales = daily.iter().map(|d| d.value).sum::<f64>() / daily.len() as f64;
        let months = series_from(daily).monthly_totals();
        let best = pick_month(&months, |candidate, current| candidate > current);
        let worst = pick_month(&months, |candidate, current| candidate < current);

        Ok(SalesKpis {
            total_revenue: totals.total_revenue,
            average_daily_sales,
            best_month: best.and_then(|m| month_label(m.year, m.month)),
            worst_month: worst.and_then(|m| month_label(m.year, m.month)),
        })
    }

    pub fn main_kpis(&self) -> Result<MainKpis> {
        let totals = self.open_store()?.order_totals()?;
        let average_order_value = if totals.total_orders > 0 {
            totals.total_revenue / totals.total_orders as f64
        } else {
            0.0
        };

        let churn_rate = match self.score_customers() {
            Ok(scores) if scores.is_empty() => None,
            Ok(scores) => {
                let churned = scores.iter().filter(|s| s.predicted_churn).count();
                Some(churned as f64 / scores.len() as f64 * 100.0)
            }
            Err(ServiceError::ModelUnavailable(msg)) => {
                warn!(%msg, "Churn rate omitted from KPIs");
                None
            }
            Err(ServiceError::DataUnavailable(_)) => None,
            Err(err) => return Err(err),
        };

        Ok(MainKpis {
            total_revenue: totals.total_revenue,
            total_orders: totals.total_orders,
            average_order_value,
            churn_rate,
        })
    }

    /// Demand over the configured horizon for the best-selling products.
    ///
    /// A product whose estimate fails is reported as a failed entry.
    pub fn product_demand_forecast(&self) -> Result<Vec<ProductDemand>> {
        let store = self.open_store()?;
        let products = store.top_products_by_quantity(self.config.data.demand_top_products)?;
        let rule = self.config.demand_rule();

        let demand = products
            .into_iter()
            .map(|product| {
                let outcome = match product_demand(&store, &rule, &product.product_id) {
                    Ok(estimate) => DemandOutcome::Forecast(estimate),
                    Err(err) => {
                        warn!(product_id = %product.product_id, %err, "Demand forecast failed");
                        DemandOutcome::Failed(err.to_body())
                    }
                };
                ProductDemand {
                    product_id: product.product_id,
                    product_name: product.product_name,
                    category: product.category,
                    outcome,
                }
            })
            .collect::<Vec<_>>();

        info!(products = demand.len(), "Estimated product demand");
        Ok(demand)
    }

    /// Best-selling products by revenue
    pub fn top_products(&self, n: usize) -> Result<Vec<ProductSales>> {
        if n == 0 {
            return Err(ServiceError::InvalidRequest("n must be positive".to_string()));
        }
        Ok(self.open_store()?.top_products_by_sales(n)?)
    }

    pub fn user_distribution(&self) -> Result<Vec<CountryCount>> {
        Ok(self.open_store()?.user_distribution()?)
    }

    pub fn sales_by_age(&self) -> Result<Vec<AgeGroupSales>> {
        Ok(self.open_store()?.sales_by_age_group()?)
    }

    /// Units per calendar month labelled `%B %Y`
    pub fn monthly_sales(&self) -> Result<Vec<PeriodQuantity>> {
        let months = self.open_store()?.monthly_quantities()?;
        Ok(months
            .into_iter()
            .filter_map(|m| {
                month_label(m.year, m.month).map(|period| PeriodQuantity {
                    period,
                    total_quantity: m.total_quantity,
                })
            })
            .collect())
    }

    pub fn yearly_sales(&self) -> Result<Vec<YearlyQuantity>> {
        Ok(self.open_store()?.yearly_quantities()?)
    }

    pub fn db_stats(&self) -> Result<OrderStats> {
        Ok(self.open_store()?.order_stats()?)
    }

    pub fn orders(&self, limit: Option<usize>) -> Result<Vec<OrderRecord>> {
        Ok(self.open_store()?.orders(limit)?)
    }

    /// Import a CSV upload into the store
    pub fn upload_csv<R: Read>(&self, reader: R) -> Result<ImportSummary> {
        let store = self.open_store()?;
        Ok(import_csv(&store, reader)?)
    }

    /// Retrain the churn model from the store, persist it and serve it from now on
    pub fn train_churn(&mut self) -> Result<TrainingReport> {
        let aggregates = self.open_store()?.customer_aggregates()?;
        let (package, report) = train_churn_model(
            &aggregates,
            self.config.reference_instant(),
            &self.config.label_rule(),
            &self.config.training_params(),
        )?;
        package.save(&self.config.models.churn_model_path)?;

        info!(
            path = %self.config.models.churn_model_path.display(),
            rows = report.total_rows,
            roc_auc = ?report.roc_auc,
            "Churn model replaced"
        );
        self.classifier = Some(ChurnClassifier::new(Arc::new(package)));
        Ok(report)
    }

    /// Retrain the sales forecaster on the full daily history
    pub fn train_forecaster(&mut self) -> Result<ForecasterReport> {
        let series = self.daily_sales_series()?;
        if series.is_empty() {
            return Err(ServiceError::DataUnavailable(
                "No dated sales recorded".to_string(),
            ));
        }

        let model = HoltWinters::weekly();
        let trained = model.train(&series)?;

        let holdout_days = 2 * WEEKLY_SEASON;
        let holdout = if series.len() >= model.min_observations() + holdout_days {
            match holdout_accuracy(&model, &series, holdout_days) {
                Ok(accuracy) => Some(accuracy),
                Err(err) => {
                    warn!(%err, "Holdout evaluation skipped");
                    None
                }
            }
        } else {
            None
        };

        trained.save(&self.config.models.sales_model_path)?;
        let (alpha, beta, gamma) = trained.params();
        let report = ForecasterReport {
            observations: series.len(),
            first_date: series.first_date(),
            last_date: trained.last_date(),
            alpha,
            beta,
            gamma,
            sigma: trained.sigma(),
            holdout,
        };

        info!(
            observations = report.observations,
            last_date = %report.last_date,
            "Sales forecaster replaced"
        );
        self.forecaster = Some(Arc::new(trained));
        Ok(report)
    }
}

fn product_demand(store: &Store, rule: &DemandRule, product_id: &str) -> Result<DemandEstimate> {
    let daily = store.daily_product_demand(product_id)?;
    Ok(rule.estimate(&series_from(daily))?)
}

fn series_from(daily: Vec<DailyValue>) -> TimeSeriesData {
    TimeSeriesData::from_observations(daily.into_iter().map(|d| (d.date, d.value)))
}

/// First month whose total beats every earlier one under `better`
fn pick_month(months: &[MonthTotal], better: impl Fn(f64, f64) -> bool) -> Option<&MonthTotal> {
    months.iter().fold(None, |chosen, month| match chosen {
        Some(current) if !better(month.total, current.total) => Some(current),
        _ => Some(month),
    })
}

fn month_label(year: i32, month: u32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, month, 1).map(|d| d.format("%B %Y").to_string())
}

/// Every `(year, month)` from `first` through `last` inclusive
fn month_range(first: (i32, u32), last: (i32, u32)) -> impl Iterator<Item = (i32, u32)> {
    std::iter::successors(Some(first), move |&(year, month)| {
        let next = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        (next <= last).then_some(next)
    })
}
