use std::path::Path;

use chrono::NaiveDate;
use churn_model::CustomerAggregate;
use rusqlite::{params, Connection, Row, Transaction};
use tracing::debug;

use crate::records::{
    AgeGroupSales, CountryCount, Customer, DailyValue, MonthlyQuantity, OrderRecord, OrderStats,
    OrderTotals, Product, ProductAggregate, ProductSales, YearlyQuantity,
};
use crate::{Result, StoreError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS customers (
        customer_id TEXT PRIMARY KEY,
        age INTEGER,
        gender TEXT,
        country TEXT,
        signup_date TEXT
    );
    CREATE TABLE IF NOT EXISTS products (
        product_id TEXT PRIMARY KEY,
        product_name TEXT,
        category TEXT
    );
    CREATE TABLE IF NOT EXISTS orders (
        order_id TEXT PRIMARY KEY,
        customer_id TEXT NOT NULL REFERENCES customers(customer_id),
        product_id TEXT NOT NULL REFERENCES products(product_id),
        purchase_date TEXT,
        cancellations_count INTEGER NOT NULL DEFAULT 0,
        subscription_status TEXT,
        unit_price REAL NOT NULL DEFAULT 0,
        quantity INTEGER NOT NULL DEFAULT 0,
        purchase_frequency REAL NOT NULL DEFAULT 0,
        rating REAL NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_orders_customer ON orders(customer_id);
    CREATE INDEX IF NOT EXISTS idx_orders_product ON orders(product_id);
    CREATE INDEX IF NOT EXISTS idx_orders_date ON orders(purchase_date);
";

/// Latest subscription status comes from the most recent order per customer
/// (ties broken by the greatest order id).
const CUSTOMER_AGGREGATE_SQL: &str = "
    WITH ranked AS (
        SELECT o.*,
               ROW_NUMBER() OVER (
                   PARTITION BY o.customer_id
                   ORDER BY o.purchase_date DESC, o.order_id DESC
               ) AS recency_rank
        FROM orders o
    )
    SELECT c.customer_id,
           c.age,
           c.gender,
           c.country,
           c.signup_date,
           MAX(r.purchase_date),
           COUNT(r.order_id),
           SUM(r.quantity),
           SUM(r.unit_price * r.quantity),
           AVG(r.rating),
           SUM(r.cancellations_count),
           MAX(CASE WHEN r.recency_rank = 1 THEN r.subscription_status END)
    FROM customers c
    JOIN ranked r ON r.customer_id = c.customer_id
    WHERE ?1 IS NULL OR c.customer_id = ?1
    GROUP BY c.customer_id
    ORDER BY c.customer_id";

const PRODUCT_AGGREGATE_SQL: &str = "
    SELECT p.product_id,
           p.product_name,
           p.category,
           COUNT(o.order_id),
           COALESCE(SUM(o.quantity), 0),
           COALESCE(SUM(o.unit_price * o.quantity), 0),
           AVG(o.rating),
           MIN(o.purchase_date),
           MAX(o.purchase_date)
    FROM products p
    JOIN orders o ON o.product_id = p.product_id
    WHERE ?1 IS NULL OR p.product_id = ?1
    GROUP BY p.product_id
    ORDER BY p.product_id";

/// SQLite connection holding the customers, products and orders tables.
///
/// The store owns its connection; dropping it closes the connection.
pub struct Store {
    connection: Connection,
}

impl Store {
    /// Open (or create) a database file and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self {
            connection: Connection::open(path)?,
        };
        store.apply_schema()?;
        debug!(path = %path.display(), "Opened commerce store");
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            connection: Connection::open_in_memory()?,
        };
        store.apply_schema()?;
        Ok(store)
    }

    fn apply_schema(&self) -> Result<()> {
        self.connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.connection.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Start a write batch wrapping related inserts in one transaction.
    pub fn write_batch(&self) -> Result<WriteBatch<'_>> {
        Ok(WriteBatch {
            tx: self.connection.unchecked_transaction()?,
        })
    }

    /// One aggregate per customer with at least one order.
    pub fn customer_aggregates(&self) -> Result<Vec<CustomerAggregate>> {
        let rows = self.query_customer_aggregates(None)?;
        if rows.is_empty() {
            return Err(StoreError::DataUnavailable(
                "No customers with orders".to_string(),
            ));
        }
        debug!(customers = rows.len(), "Aggregated customers");
        Ok(rows)
    }

    /// Aggregate for a single customer.
    pub fn customer_aggregate(&self, customer_id: &str) -> Result<CustomerAggregate> {
        self.query_customer_aggregates(Some(customer_id))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                StoreError::DataUnavailable(format!("No orders for customer '{customer_id}'"))
            })
    }

    fn query_customer_aggregates(&self, customer_id: Option<&str>) -> Result<Vec<CustomerAggregate>> {
        let mut stmt = self.connection.prepare_cached(CUSTOMER_AGGREGATE_SQL)?;
        let rows = stmt
            .query_map(params![customer_id], customer_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// One aggregate per product with at least one order.
    pub fn product_aggregates(&self) -> Result<Vec<ProductAggregate>> {
        let rows = self.query_product_aggregates(None)?;
        if rows.is_empty() {
            return Err(StoreError::DataUnavailable(
                "No products with orders".to_string(),
            ));
        }
        Ok(rows)
    }

    /// Aggregate for a single product.
    pub fn product_aggregate(&self, product_id: &str) -> Result<ProductAggregate> {
        self.query_product_aggregates(Some(product_id))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                StoreError::DataUnavailable(format!("No orders for product '{product_id}'"))
            })
    }

    fn query_product_aggregates(&self, product_id: Option<&str>) -> Result<Vec<ProductAggregate>> {
        let mut stmt = self.connection.prepare_cached(PRODUCT_AGGREGATE_SQL)?;
        let rows = stmt
            .query_map(params![product_id], |row| {
                Ok(ProductAggregate {
                    product_id: row.get(0)?,
                    product_name: row.get(1)?,
                    category: row.get(2)?,
                    order_count: row.get(3)?,
                    total_quantity: row.get(4)?,
                    total_sales: row.get(5)?,
                    avg_rating: row.get(6)?,
                    first_sale: row.get(7)?,
                    last_sale: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Revenue per purchase date, ascending. Orders without a date are skipped.
    pub fn daily_sales(&self) -> Result<Vec<DailyValue>> {
        self.daily_values(
            "SELECT purchase_date, SUM(unit_price * quantity)
             FROM orders
             WHERE purchase_date IS NOT NULL
             GROUP BY purchase_date
             ORDER BY purchase_date",
            None,
        )
    }

    /// Units sold per purchase date for one product, ascending.
    pub fn daily_product_demand(&self, product_id: &str) -> Result<Vec<DailyValue>> {
        self.daily_values(
            "SELECT purchase_date, SUM(quantity)
             FROM orders
             WHERE purchase_date IS NOT NULL AND product_id = ?1
             GROUP BY purchase_date
             ORDER BY purchase_date",
            Some(product_id),
        )
    }

    fn daily_values(&self, sql: &str, key: Option<&str>) -> Result<Vec<DailyValue>> {
        let mut stmt = self.connection.prepare_cached(sql)?;
        let map = |row: &Row<'_>| -> rusqlite::Result<DailyValue> {
            Ok(DailyValue {
                date: row.get::<_, NaiveDate>(0)?,
                value: row.get(1)?,
            })
        };
        let rows = match key {
            Some(key) => stmt.query_map(params![key], map)?.collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt.query_map([], map)?.collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
    }

    /// Units sold per calendar month, ascending.
    pub fn monthly_quantities(&self) -> Result<Vec<MonthlyQuantity>> {
        let mut stmt = self.connection.prepare_cached(
            "SELECT CAST(strftime('%Y', purchase_date) AS INTEGER),
                    CAST(strftime('%m', purchase_date) AS INTEGER),
                    SUM(quantity)
             FROM orders
             WHERE purchase_date IS NOT NULL
             GROUP BY 1, 2
             ORDER BY 1, 2",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(MonthlyQuantity {
                    year: row.get::<_, i64>(0)? as i32,
                    month: row.get::<_, i64>(1)? as u32,
                    total_quantity: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Units sold per calendar year, ascending.
    pub fn yearly_quantities(&self) -> Result<Vec<YearlyQuantity>> {
        let mut stmt = self.connection.prepare_cached(
            "SELECT CAST(strftime('%Y', purchase_date) AS INTEGER), SUM(quantity)
             FROM orders
             WHERE purchase_date IS NOT NULL
             GROUP BY 1
             ORDER BY 1",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(YearlyQuantity {
                    year: row.get::<_, i64>(0)? as i32,
                    total_quantity: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Top `n` products by revenue.
    pub fn top_products_by_sales(&self, n: usize) -> Result<Vec<ProductSales>> {
        self.ranked_products("total_sales", n)
    }

    /// Top `n` products by units sold.
    pub fn top_products_by_quantity(&self, n: usize) -> Result<Vec<ProductSales>> {
        self.ranked_products("total_quantity", n)
    }

    fn ranked_products(&self, order_by: &'static str, n: usize) -> Result<Vec<ProductSales>> {
        let sql = format!(
            "SELECT p.product_id,
                    p.product_name,
                    p.category,
                    SUM(o.unit_price * o.quantity) AS total_sales,
                    SUM(o.quantity) AS total_quantity
             FROM products p
             JOIN orders o ON o.product_id = p.product_id
             GROUP BY p.product_id
             ORDER BY {order_by} DESC, p.product_id
             LIMIT ?1"
        );
        let mut stmt = self.connection.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params![n as i64], |row| {
                Ok(ProductSales {
                    product_id: row.get(0)?,
                    product_name: row.get(1)?,
                    category: row.get(2)?,
                    total_sales: row.get(3)?,
                    total_quantity: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Units sold per age bucket, largest first. Unknown or out-of-range ages count as `60+`.
    pub fn sales_by_age_group(&self) -> Result<Vec<AgeGroupSales>> {
        let mut stmt = self.connection.prepare_cached(
            "SELECT CASE
                        WHEN c.age BETWEEN 18 AND 25 THEN '18-25'
                        WHEN c.age BETWEEN 26 AND 35 THEN '26-35'
                        WHEN c.age BETWEEN 36 AND 45 THEN '36-45'
                        WHEN c.age BETWEEN 46 AND 60 THEN '46-60'
                        ELSE '60+'
                    END AS age_group,
                    SUM(o.quantity) AS total_quantity
             FROM customers c
             JOIN orders o ON o.customer_id = c.customer_id
             GROUP BY age_group
             ORDER BY total_quantity DESC, age_group",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(AgeGroupSales {
                    age_group: row.get(0)?,
                    total_quantity: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Customers per country, largest first.
    pub fn user_distribution(&self) -> Result<Vec<CountryCount>> {
        let mut stmt = self.connection.prepare_cached(
            "SELECT country, COUNT(customer_id) AS user_count
             FROM customers
             GROUP BY country
             ORDER BY user_count DESC, country",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CountryCount {
                    country: row.get(0)?,
                    user_count: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Total revenue and distinct order count.
    pub fn order_totals(&self) -> Result<OrderTotals> {
        let totals = self.connection.query_row(
            "SELECT COALESCE(SUM(unit_price * quantity), 0), COUNT(DISTINCT order_id) FROM orders",
            [],
            |row| {
                Ok(OrderTotals {
                    total_revenue: row.get(0)?,
                    total_orders: row.get(1)?,
                })
            },
        )?;
        Ok(totals)
    }

    /// Order count and share of orders with a cancelled subscription.
    pub fn order_stats(&self) -> Result<OrderStats> {
        let (total_entries, cancelled_count): (i64, i64) = self.connection.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN LOWER(TRIM(subscription_status)) = 'cancelled'
                                      THEN 1 ELSE 0 END), 0)
             FROM orders",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let percentage = if total_entries > 0 {
            cancelled_count as f64 / total_entries as f64 * 100.0
        } else {
            0.0
        };

        Ok(OrderStats {
            total_entries,
            cancelled_count,
            cancelled_percentage: (percentage * 100.0).round() / 100.0,
        })
    }

    /// Order rows by purchase date then id; `limit` of `None` returns all.
    pub fn orders(&self, limit: Option<usize>) -> Result<Vec<OrderRecord>> {
        let limit = limit.map_or(-1, |n| n as i64);
        let mut stmt = self.connection.prepare_cached(
            "SELECT order_id, customer_id, product_id, purchase_date, cancellations_count,
                    subscription_status, unit_price, quantity, purchase_frequency, rating
             FROM orders
             ORDER BY purchase_date, order_id
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(OrderRecord {
                    order_id: row.get(0)?,
                    customer_id: row.get(1)?,
                    product_id: row.get(2)?,
                    purchase_date: row.get(3)?,
                    cancellations_count: row.get(4)?,
                    subscription_status: row.get(5)?,
                    unit_price: row.get(6)?,
                    quantity: row.get(7)?,
                    purchase_frequency: row.get(8)?,
                    rating: row.get(9)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<CustomerAggregate> {
    Ok(CustomerAggregate {
        customer_id: row.get(0)?,
        age: row.get(1)?,
        gender: row.get(2)?,
        country: row.get(3)?,
        signup_date: row.get(4)?,
        last_seen: row.get(5)?,
        order_count: row.get(6)?,
        total_quantity: row.get(7)?,
        total_spend: row.get(8)?,
        avg_rating: row.get(9)?,
        total_cancellations: row.get(10)?,
        subscription_status: row.get(11)?,
    })
}

/// Groups inserts into one transaction; dropping without [`WriteBatch::commit`] rolls back.
pub struct WriteBatch<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> WriteBatch<'conn> {
    /// Insert a customer unless the id exists. Returns whether a row was added.
    pub fn insert_customer(&mut self, customer: &Customer) -> Result<bool> {
        let changed = self
            .tx
            .prepare_cached(
                "INSERT INTO customers (customer_id, age, gender, country, signup_date)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(customer_id) DO NOTHING",
            )?
            .execute(params![
                customer.customer_id,
                customer.age,
                customer.gender,
                customer.country,
                customer.signup_date
            ])?;
        Ok(changed > 0)
    }

    /// Insert a product unless the id exists.
    pub fn insert_product(&mut self, product: &Product) -> Result<bool> {
        let changed = self
            .tx
            .prepare_cached(
                "INSERT INTO products (product_id, product_name, category)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(product_id) DO NOTHING",
            )?
            .execute(params![
                product.product_id,
                product.product_name,
                product.category
            ])?;
        Ok(changed > 0)
    }

    /// Insert an order unless the id exists.
    pub fn insert_order(&mut self, order: &OrderRecord) -> Result<bool> {
        let changed = self
            .tx
            .prepare_cached(
                "INSERT INTO orders (order_id, customer_id, product_id, purchase_date,
                                     cancellations_count, subscription_status, unit_price,
                                     quantity, purchase_frequency, rating)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(order_id) DO NOTHING",
            )?
            .execute(params![
                order.order_id,
                order.customer_id,
                order.product_id,
                order.purchase_date,
                order.cancellations_count,
                order.subscription_status,
                order.unit_price,
                order.quantity,
                order.purchase_frequency,
                order.rating
            ])?;
        Ok(changed > 0)
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}
