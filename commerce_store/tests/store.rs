use chrono::NaiveDate;
use commerce_store::{import_csv, Store, StoreError};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

const UPLOAD: &str = "\
customer_id,age,gender,country,signup_date,product_id,product_name,category,order_id,last_purchase_date,cancellations_count,subscription_status,unit_price,quantity,purchase_frequency,Ratings
C1,22,Female,USA,2023-01-10,P1,Lamp,Home,O1,2024-01-05,0,active,10.0,2,3,4.5
C1,22,Female,USA,2023-01-10,P2,Mug,Kitchen,O2,2024-02-10,1,cancelled,5.0,1,3,3.0
C2,40,Male,India,2023-06-01,P1,Lamp,Home,O3,2024-01-05,0,active,10.0,5,1,5.0
C3,oops,Male,India,bad-date,P3,Chair,Home,O4,2024-03-20,0,paused,100.0,1,1,
";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn seeded_store() -> Store {
    let store = Store::open_in_memory().unwrap();
    import_csv(&store, UPLOAD.as_bytes()).unwrap();
    store
}

#[test]
fn test_import_summary_dedups_ids() {
    let store = Store::open_in_memory().unwrap();
    let summary = import_csv(&store, UPLOAD.as_bytes()).unwrap();

    assert_eq!(summary.rows_processed, 4);
    assert_eq!(summary.customers_inserted, 3);
    assert_eq!(summary.products_inserted, 3);
    assert_eq!(summary.orders_inserted, 4);
}

#[test]
fn test_reimport_leaves_existing_ids_untouched() {
    let store = seeded_store();
    let changed = UPLOAD.replace("C1,22,Female", "C1,99,Female");
    let summary = import_csv(&store, changed.as_bytes()).unwrap();

    assert_eq!(summary.rows_processed, 4);
    assert_eq!(summary.customers_inserted, 0);
    assert_eq!(summary.orders_inserted, 0);
    assert_eq!(store.customer_aggregate("C1").unwrap().age, Some(22.0));
}

#[test]
fn test_failed_import_rolls_back() {
    let store = Store::open_in_memory().unwrap();
    let upload = format!("{UPLOAD}C4,30,Male,USA,2023-01-01,P4,Desk,Office,,2024-01-01,0,active,1,1,1,1\n");

    let err = import_csv(&store, upload.as_bytes()).unwrap_err();
    assert!(matches!(err, StoreError::Import { row: 6, .. }));
    assert_eq!(store.order_stats().unwrap().total_entries, 0);
}

#[test]
fn test_customer_aggregate_uses_latest_status() {
    let store = seeded_store();
    let c1 = store.customer_aggregate("C1").unwrap();

    assert_eq!(c1.order_count, 2);
    assert_eq!(c1.last_seen, Some(date(2024, 2, 10)));
    assert_eq!(c1.signup_date, Some(date(2023, 1, 10)));
    assert_eq!(c1.total_quantity, Some(3.0));
    assert_eq!(c1.total_spend, Some(25.0));
    assert_eq!(c1.total_cancellations, Some(1.0));
    assert_eq!(c1.subscription_status.as_deref(), Some("cancelled"));
}

#[test]
fn test_import_coerces_bad_values() {
    let store = seeded_store();
    let c3 = store.customer_aggregate("C3").unwrap();

    assert_eq!(c3.age, Some(0.0));
    assert_eq!(c3.signup_date, None);
    assert_eq!(c3.avg_rating, Some(0.0));
}

#[test]
fn test_aggregates_one_row_per_customer() {
    let store = seeded_store();
    let ids: Vec<String> = store
        .customer_aggregates()
        .unwrap()
        .into_iter()
        .map(|c| c.customer_id)
        .collect();
    assert_eq!(ids, vec!["C1", "C2", "C3"]);
}

#[test]
fn test_empty_store_reports_data_unavailable() {
    let store = Store::open_in_memory().unwrap();
    assert!(matches!(
        store.customer_aggregates(),
        Err(StoreError::DataUnavailable(_))
    ));
    assert!(matches!(
        store.product_aggregate("P1"),
        Err(StoreError::DataUnavailable(_))
    ));
    assert!(store.daily_sales().unwrap().is_empty());
}

#[test]
fn test_product_aggregate() {
    let store = seeded_store();
    let lamp = store.product_aggregate("P1").unwrap();

    assert_eq!(lamp.product_name.as_deref(), Some("Lamp"));
    assert_eq!(lamp.order_count, 2);
    assert_eq!(lamp.total_quantity, 7.0);
    assert_eq!(lamp.total_sales, 70.0);
    assert_eq!(lamp.first_sale, Some(date(2024, 1, 5)));
    assert_eq!(lamp.last_sale, Some(date(2024, 1, 5)));
    assert_eq!(store.product_aggregates().unwrap().len(), 3);
}

#[test]
fn test_daily_sales_and_demand() {
    let store = seeded_store();
    let daily = store.daily_sales().unwrap();

    let dates: Vec<NaiveDate> = daily.iter().map(|d| d.date).collect();
    assert_eq!(dates, vec![date(2024, 1, 5), date(2024, 2, 10), date(2024, 3, 20)]);
    assert_eq!(daily[0].value, 70.0);

    let demand = store.daily_product_demand("P1").unwrap();
    assert_eq!(demand.len(), 1);
    assert_eq!(demand[0].value, 7.0);
}

#[test]
fn test_time_grains() {
    let store = seeded_store();

    let monthly = store.monthly_quantities().unwrap();
    let keys: Vec<(i32, u32, f64)> = monthly
        .iter()
        .map(|m| (m.year, m.month, m.total_quantity))
        .collect();
    assert_eq!(keys, vec![(2024, 1, 7.0), (2024, 2, 1.0), (2024, 3, 1.0)]);

    let yearly = store.yearly_quantities().unwrap();
    assert_eq!(yearly.len(), 1);
    assert_eq!(yearly[0].total_quantity, 9.0);
}

#[test]
fn test_rankings() {
    let store = seeded_store();

    let by_sales: Vec<String> = store
        .top_products_by_sales(2)
        .unwrap()
        .into_iter()
        .map(|p| p.product_id)
        .collect();
    assert_eq!(by_sales, vec!["P3", "P1"]);

    let by_quantity = store.top_products_by_quantity(10).unwrap();
    assert_eq!(by_quantity[0].product_id, "P1");
    assert_eq!(by_quantity.len(), 3);
}

#[test]
fn test_age_groups_and_countries() {
    let store = seeded_store();

    let groups: Vec<(String, f64)> = store
        .sales_by_age_group()
        .unwrap()
        .into_iter()
        .map(|g| (g.age_group, g.total_quantity))
        .collect();
    assert_eq!(
        groups,
        vec![
            ("36-45".to_string(), 5.0),
            ("18-25".to_string(), 3.0),
            ("60+".to_string(), 1.0),
        ]
    );

    let countries = store.user_distribution().unwrap();
    assert_eq!(countries[0].country.as_deref(), Some("India"));
    assert_eq!(countries[0].user_count, 2);
}

#[test]
fn test_order_totals_and_stats() {
    let store = seeded_store();

    let totals = store.order_totals().unwrap();
    assert_eq!(totals.total_revenue, 175.0);
    assert_eq!(totals.total_orders, 4);

    let stats = store.order_stats().unwrap();
    assert_eq!(stats.total_entries, 4);
    assert_eq!(stats.cancelled_count, 1);
    assert_eq!(stats.cancelled_percentage, 25.0);

    assert_eq!(store.orders(Some(2)).unwrap().len(), 2);
    assert_eq!(store.orders(None).unwrap().len(), 4);
}

#[test]
fn test_file_store_persists() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data").join("commerce.db");
    {
        let store = Store::open(&path).unwrap();
        import_csv(&store, UPLOAD.as_bytes()).unwrap();
    }
    let reopened = Store::open(&path).unwrap();
    assert_eq!(reopened.customer_aggregates().unwrap().len(), 3);
}
