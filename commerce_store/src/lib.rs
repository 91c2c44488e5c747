//! # Commerce Store
//!
//! `commerce_store` keeps customers, products and orders in SQLite and answers
//! every aggregation the analytics layer needs with a single grouped query.
//!
//! ## Usage Example
//!
//! ```no_run
//! use commerce_store::Store;
//!
//! # fn run() -> commerce_store::Result<()> {
//! let store = Store::open("commerce.db")?;
//! let customers = store.customer_aggregates()?;
//! let daily = store.daily_sales()?;
//! println!("{} customers, {} sales days", customers.len(), daily.len());
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

pub mod import;
pub mod records;
mod store;

pub use churn_model::CustomerAggregate;
pub use import::{import_csv, ImportSummary};
pub use records::{
    AgeGroupSales, CountryCount, Customer, DailyValue, MonthlyQuantity, OrderRecord, OrderStats,
    OrderTotals, Product, ProductAggregate, ProductSales, YearlyQuantity,
};
pub use store::{Store, WriteBatch};

/// Errors returned by the store
#[derive(Error, Debug)]
pub enum StoreError {
    /// No rows exist for the requested aggregation
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Database query failed: {0}")]
    Sql(#[from] rusqlite::Error),

    /// An upload row could not be mapped onto the tables
    #[error("Import failed at row {row}: {message}")]
    Import { row: usize, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
