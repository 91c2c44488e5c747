//! Bulk CSV upload mapped onto the customers, products and orders tables.
//!
//! Each CSV row is one order carrying its customer and product columns.
//! Unparsable dates become NULL and unparsable numbers become 0. Existing ids
//! are left untouched. The whole upload runs in one transaction, so a failing
//! row leaves the store unchanged.

use std::collections::HashSet;
use std::io::Read;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::records::{Customer, OrderRecord, Product};
use crate::store::Store;
use crate::{Result, StoreError};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Outcome of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Data rows read from the upload
    pub rows_processed: usize,
    pub customers_inserted: usize,
    pub products_inserted: usize,
    pub orders_inserted: usize,
}

#[derive(Debug, Deserialize)]
struct UploadRow {
    customer_id: Option<String>,
    age: Option<String>,
    gender: Option<String>,
    country: Option<String>,
    signup_date: Option<String>,
    product_id: Option<String>,
    product_name: Option<String>,
    category: Option<String>,
    order_id: Option<String>,
    #[serde(alias = "purchase_date")]
    last_purchase_date: Option<String>,
    cancellations_count: Option<String>,
    subscription_status: Option<String>,
    unit_price: Option<String>,
    quantity: Option<String>,
    purchase_frequency: Option<String>,
    #[serde(rename = "Ratings", alias = "ratings", alias = "rating")]
    ratings: Option<String>,
}

/// Parse a CSV upload and insert its rows.
pub fn import_csv<R: Read>(store: &Store, reader: R) -> Result<ImportSummary> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut customers = Vec::new();
    let mut products = Vec::new();
    let mut orders = Vec::new();
    let mut seen_customers = HashSet::new();
    let mut seen_products = HashSet::new();

    for (index, row) in csv_reader.deserialize::<UploadRow>().enumerate() {
        // header is line 1
        let line = index + 2;
        let row = row?;
        let (customer, product, order) = clean_row(row, line)?;
        if seen_customers.insert(customer.customer_id.clone()) {
            customers.push(customer);
        }
        if seen_products.insert(product.product_id.clone()) {
            products.push(product);
        }
        orders.push(order);
    }

    if orders.is_empty() {
        return Err(StoreError::DataUnavailable(
            "Upload contains no rows".to_string(),
        ));
    }

    let mut batch = store.write_batch()?;
    let mut summary = ImportSummary {
        rows_processed: orders.len(),
        customers_inserted: 0,
        products_inserted: 0,
        orders_inserted: 0,
    };
    for customer in &customers {
        summary.customers_inserted += usize::from(batch.insert_customer(customer)?);
    }
    for product in &products {
        summary.products_inserted += usize::from(batch.insert_product(product)?);
    }
    for order in &orders {
        summary.orders_inserted += usize::from(batch.insert_order(order)?);
    }
    batch.commit()?;

    let skipped = summary.rows_processed - summary.orders_inserted;
    if skipped > 0 {
        warn!(skipped, "Orders already present were left untouched");
    }
    info!(
        rows = summary.rows_processed,
        customers = summary.customers_inserted,
        products = summary.products_inserted,
        orders = summary.orders_inserted,
        "Imported upload"
    );
    Ok(summary)
}

fn clean_row(row: UploadRow, line: usize) -> Result<(Customer, Product, OrderRecord)> {
    let customer_id = required(row.customer_id, "customer_id", line)?;
    let product_id = required(row.product_id, "product_id", line)?;
    let order_id = required(row.order_id, "order_id", line)?;

    let customer = Customer {
        customer_id: customer_id.clone(),
        age: Some(parse_number(row.age.as_deref()).trunc() as i64),
        gender: non_empty(row.gender),
        country: non_empty(row.country),
        signup_date: parse_date(row.signup_date.as_deref()),
    };
    let product = Product {
        product_id: product_id.clone(),
        product_name: non_empty(row.product_name),
        category: non_empty(row.category),
    };
    let order = OrderRecord {
        order_id,
        customer_id,
        product_id,
        purchase_date: parse_date(row.last_purchase_date.as_deref()),
        cancellations_count: parse_number(row.cancellations_count.as_deref()).trunc() as i64,
        subscription_status: non_empty(row.subscription_status),
        unit_price: parse_number(row.unit_price.as_deref()),
        quantity: parse_number(row.quantity.as_deref()).trunc() as i64,
        purchase_frequency: parse_number(row.purchase_frequency.as_deref()),
        rating: parse_number(row.ratings.as_deref()),
    };
    Ok((customer, product, order))
}

fn required(value: Option<String>, column: &str, line: usize) -> Result<String> {
    non_empty(value).ok_or_else(|| StoreError::Import {
        row: line,
        message: format!("missing {column}"),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Lenient numeric coercion: anything unparsable or non-finite is 0.
pub(crate) fn parse_number(raw: Option<&str>) -> f64 {
    raw.and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Lenient date coercion: anything unparsable is `None`.
pub(crate) fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2024-03-05", Some((2024, 3, 5)))]
    #[case("03/05/2024", Some((2024, 3, 5)))]
    #[case("2024-03-05 10:20:00", Some((2024, 3, 5)))]
    #[case("2024-03-05T10:20:00", Some((2024, 3, 5)))]
    #[case("not a date", None)]
    #[case("", None)]
    fn test_parse_date(#[case] raw: &str, #[case] expected: Option<(i32, u32, u32)>) {
        let expected = expected.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        assert_eq!(parse_date(Some(raw)), expected);
    }

    #[rstest]
    #[case(Some("12.5"), 12.5)]
    #[case(Some("abc"), 0.0)]
    #[case(Some("NaN"), 0.0)]
    #[case(None, 0.0)]
    fn test_parse_number(#[case] raw: Option<&str>, #[case] expected: f64) {
        assert_eq!(parse_number(raw), expected);
    }

    #[test]
    fn test_missing_order_id_reports_line() {
        let csv = "customer_id,product_id,order_id\nC1,P1,\n";
        let store = Store::open_in_memory().unwrap();
        let err = import_csv(&store, csv.as_bytes()).unwrap_err();
        assert!(matches!(err, StoreError::Import { row: 2, .. }));
    }
}
