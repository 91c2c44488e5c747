//! Daily time series construction

use crate::error::{ForecastError, Result};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Contiguous daily series: one value per calendar day, no gaps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesData {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TimeSeriesData {
    /// Create a series from already contiguous daily dates
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::DataError(format!(
                "Dates length ({}) doesn't match values length ({})",
                dates.len(),
                values.len()
            )));
        }

        if let Some(pair) = dates.windows(2).find(|w| w[1] - w[0] != Duration::days(1)) {
            return Err(ForecastError::DataError(format!(
                "Dates must advance by one day, found {} followed by {}",
                pair[0], pair[1]
            )));
        }

        Ok(Self { dates, values })
    }

    /// Build a daily series from dated observations.
    ///
    /// Observations on the same day are summed and days without any
    /// observation between the first and last date are filled with zero.
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for (date, value) in observations {
            *by_day.entry(date).or_insert(0.0) += value;
        }

        let (first, last) = match (by_day.keys().next(), by_day.keys().next_back()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Self::empty(),
        };

        let mut dates = Vec::new();
        let mut values = Vec::new();
        let mut day = first;
        while day <= last {
            dates.push(day);
            values.push(by_day.get(&day).copied().unwrap_or(0.0));
            day += Duration::days(1);
        }

        Self { dates, values }
    }

    pub fn empty() -> Self {
        Self {
            dates: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Days with a strictly positive value
    pub fn active_days(&self) -> usize {
        self.values.iter().filter(|v| **v > 0.0).count()
    }

    /// Days from the first to the last date
    pub fn span_days(&self) -> i64 {
        match (self.first_date(), self.last_date()) {
            (Some(first), Some(last)) => (last - first).num_days(),
            _ => 0,
        }
    }

    /// Observations dated within `days` of the last date (inclusive)
    pub fn window(&self, days: i64) -> Self {
        let Some(last) = self.last_date() else {
            return Self::empty();
        };
        let start = last - Duration::days(days);
        let offset = self.dates.partition_point(|d| *d < start);

        Self {
            dates: self.dates[offset..].to_vec(),
            values: self.values[offset..].to_vec(),
        }
    }

    /// Calendar-month totals, one entry per month between the first and last date
    pub fn monthly_totals(&self) -> Vec<MonthTotal> {
        let mut months: BTreeMap<(i32, u32), f64> = BTreeMap::new();
        for (date, value) in self.dates.iter().zip(&self.values) {
            *months.entry((date.year(), date.month())).or_insert(0.0) += value;
        }

        months
            .into_iter()
            .map(|((year, month), total)| MonthTotal { year, month, total })
            .collect()
    }
}

/// Total for one calendar month
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthTotal {
    pub year: i32,
    pub month: u32,
    pub total: f64,
}

impl MonthTotal {
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// `YYYY-MM`
    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn observations_are_summed_and_zero_filled() {
        let series = TimeSeriesData::from_observations(vec![
            (date("2024-01-03"), 5.0),
            (date("2024-01-01"), 2.0),
            (date("2024-01-01"), 3.0),
        ]);

        assert_eq!(
            series.dates(),
            &[date("2024-01-01"), date("2024-01-02"), date("2024-01-03")]
        );
        assert_eq!(series.values(), &[5.0, 0.0, 5.0]);
        assert_eq!(series.active_days(), 2);
        assert_eq!(series.span_days(), 2);
    }

    #[test]
    fn new_rejects_gaps() {
        let result = TimeSeriesData::new(vec![date("2024-01-01"), date("2024-01-03")], vec![1.0, 2.0]);
        assert!(result.is_err());
        assert!(TimeSeriesData::new(vec![date("2024-01-01")], vec![]).is_err());
    }

    #[test]
    fn window_keeps_trailing_days() {
        let series = TimeSeriesData::from_observations(
            (0..10).map(|i| (date("2024-01-01") + Duration::days(i), i as f64)),
        );
        let recent = series.window(3);
        assert_eq!(recent.len(), 4);
        assert_eq!(recent.first_date(), Some(date("2024-01-07")));
    }

    #[test]
    fn monthly_totals_cover_empty_months() {
        let series = TimeSeriesData::from_observations(vec![
            (date("2024-01-31"), 10.0),
            (date("2024-03-01"), 4.0),
        ]);
        let months: Vec<(String, f64)> = series
            .monthly_totals()
            .iter()
            .map(|m| (m.key(), m.total))
            .collect();
        assert_eq!(
            months,
            vec![
                ("2024-01".to_string(), 10.0),
                ("2024-02".to_string(), 0.0),
                ("2024-03".to_string(), 4.0)
            ]
        );
    }

    #[test]
    fn empty_observations() {
        let series = TimeSeriesData::from_observations(Vec::new());
        assert!(series.is_empty());
        assert_eq!(series.last_date(), None);
        assert!(series.window(10).is_empty());
    }
}
