//! Application configuration, read once from TOML and passed to every component.
//!
//! Every section has complete defaults, so a file only needs the keys it overrides:
//!
//! ```toml
//! [database]
//! path = "data/commerce.db"
//!
//! [data]
//! reference_date = "2025-09-27"
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use churn_model::{LabelRule, ReferenceInstant, TrainingParams};
use sales_forecast::DemandRule;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// SQLite's private in-memory path. Every request opens its own connection,
/// so a database at this path would be empty on each call; it is refused.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub models: ModelsConfig,
    pub data: DataConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; `:memory:` is rejected
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "commerce.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub churn_model_path: PathBuf,
    pub sales_model_path: PathBuf,
    pub random_seed: u64,
    /// Trees grown per churn forest
    pub forest_trees: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            churn_model_path: PathBuf::from("churn_model.json"),
            sales_model_path: PathBuf::from("sales_forecaster.json"),
            random_seed: 42,
            forest_trees: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Instant all recency and tenure features are measured against
    pub reference_date: NaiveDate,
    pub churn_threshold_days: u32,
    pub default_forecast_days: usize,
    pub demand_horizon_days: usize,
    pub demand_top_products: usize,
    /// Days of history in the full sales view: exactly this many, ending at the
    /// last sale date. An inclusive "last date minus N days" cutoff would give
    /// one day more.
    pub history_window_days: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            reference_date: NaiveDate::from_ymd_opt(2025, 9, 27).unwrap_or_default(),
            churn_threshold_days: 365,
            default_forecast_days: 30,
            demand_horizon_days: 30,
            demand_top_products: 5,
            history_window_days: 180,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub max_churn_predictions: usize,
    pub max_forecast_days: usize,
    pub default_top_n: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_churn_predictions: 100,
            max_forecast_days: 365,
            default_top_n: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Read and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            ServiceError::Config(format!("Cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|err| ServiceError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(ServiceError::Config("database.path is empty".to_string()));
        }
        if self.database.path == IN_MEMORY_DATABASE {
            return Err(ServiceError::Config(format!(
                "database.path {IN_MEMORY_DATABASE} is not supported, use a file"
            )));
        }
        let positive = [
            ("data.churn_threshold_days", self.data.churn_threshold_days as usize),
            ("data.default_forecast_days", self.data.default_forecast_days),
            ("data.demand_horizon_days", self.data.demand_horizon_days),
            ("data.demand_top_products", self.data.demand_top_products),
            ("data.history_window_days", self.data.history_window_days),
            ("api.max_churn_predictions", self.api.max_churn_predictions),
            ("api.max_forecast_days", self.api.max_forecast_days),
            ("api.default_top_n", self.api.default_top_n),
            ("models.forest_trees", self.models.forest_trees),
        ];
        if let Some((key, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ServiceError::Config(format!("{key} must be positive")));
        }
        if self.data.default_forecast_days > self.api.max_forecast_days {
            return Err(ServiceError::Config(format!(
                "data.default_forecast_days ({}) exceeds api.max_forecast_days ({})",
                self.data.default_forecast_days, self.api.max_forecast_days
            )));
        }
        Ok(())
    }

    pub fn reference_instant(&self) -> ReferenceInstant {
        ReferenceInstant::new(self.data.reference_date)
    }

    pub fn label_rule(&self) -> LabelRule {
        LabelRule::new(f64::from(self.data.churn_threshold_days))
    }

    pub fn training_params(&self) -> TrainingParams {
        let mut params = TrainingParams::default().with_seed(self.models.random_seed);
        params.forest.n_trees = self.models.forest_trees;
        params
    }

    pub fn demand_rule(&self) -> DemandRule {
        DemandRule::with_horizon(self.data.demand_horizon_days)
    }
}
