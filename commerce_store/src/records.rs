//! Row types read from and written to the store

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Customer table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub signup_date: Option<NaiveDate>,
}

/// Product table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub product_name: Option<String>,
    pub category: Option<String>,
}

/// Order table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub customer_id: String,
    pub product_id: String,
    pub purchase_date: Option<NaiveDate>,
    pub cancellations_count: i64,
    pub subscription_status: Option<String>,
    pub unit_price: f64,
    pub quantity: i64,
    pub purchase_frequency: f64,
    pub rating: f64,
}

/// One row per product from the grouped order query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAggregate {
    pub product_id: String,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub order_count: i64,
    pub total_quantity: f64,
    pub total_sales: f64,
    pub avg_rating: Option<f64>,
    pub first_sale: Option<NaiveDate>,
    pub last_sale: Option<NaiveDate>,
}

/// A dated total (revenue or units)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyValue {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyQuantity {
    pub year: i32,
    pub month: u32,
    pub total_quantity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearlyQuantity {
    pub year: i32,
    pub total_quantity: f64,
}

/// Product ranked by revenue or units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSales {
    pub product_id: String,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub total_sales: f64,
    pub total_quantity: f64,
}

/// Units sold per age bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeGroupSales {
    pub age_group: String,
    pub total_quantity: f64,
}

/// Customers per country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryCount {
    pub country: Option<String>,
    pub user_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub total_revenue: f64,
    pub total_orders: i64,
}

/// Order counts with the share of cancelled subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderStats {
    pub total_entries: i64,
    pub cancelled_count: i64,
    /// Percentage rounded to two decimals
    pub cancelled_percentage: f64,
}
