//! # Churnsight
//!
//! `churnsight` serves churn predictions and sales analytics for an e-commerce
//! order store.
//!
//! ## Workspace
//!
//! - `feature_math`: medians, imputation and scaling
//! - [`churn_model`]: features, labels, column alignment, the random forest and the model package
//! - [`sales_forecast`]: daily series, Holt-Winters sales forecasts and product demand
//! - [`commerce_store`]: SQLite tables, grouped aggregation queries and CSV import
//!
//! This crate adds configuration, logging, the service-boundary error type and
//! [`AnalyticsService`], which answers every analytics request.
//!
//! ## Example
//!
//! ```no_run
//! use churnsight::{AnalyticsService, AppConfig};
//!
//! # fn run() -> churnsight::Result<()> {
//! let config = AppConfig::load("churnsight.toml")?;
//! let service = AnalyticsService::new(config);
//!
//! for score in service.predict_churn(10)? {
//!     println!("{} {:.2} {}", score.customer_id, score.probability, score.segment);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod service;

pub use config::AppConfig;
pub use error::{ErrorBody, Result, ServiceError};
pub use service::{
    AnalyticsService, ChurnTrendPoint, DemandOutcome, ForecasterReport, FullSalesView, MainKpis,
    PeriodQuantity, ProductDemand, SalesKpis, SegmentCount,
};
