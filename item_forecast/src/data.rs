//! Item series and a loader for long-format tables

use crate::error::{ForecastError, Result};
use crate::store::normalize_item_id;
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Ordered observations of one item, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    item_id: String,
    periods: Vec<i64>,
    values: Vec<f64>,
}

impl Series {
    /// Series from values already in time order; periods are numbered from zero
    pub fn new(item_id: impl Into<String>, values: Vec<f64>) -> Self {
        let periods = (0..values.len() as i64).collect();
        Self {
            item_id: item_id.into(),
            periods,
            values,
        }
    }

    /// Series from `(period, value)` pairs in any order.
    ///
    /// Fails on duplicate periods.
    pub fn from_observations(
        item_id: impl Into<String>,
        mut observations: Vec<(i64, f64)>,
    ) -> Result<Self> {
        let item_id = item_id.into();
        observations.sort_by_key(|&(period, _)| period);

        if let Some(pair) = observations.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(ForecastError::DataError(format!(
                "Duplicate period {} for item '{}'",
                pair[0].0, item_id
            )));
        }

        let (periods, values) = observations.into_iter().unzip();
        Ok(Self {
            item_id,
            periods,
            values,
        })
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn periods(&self) -> &[i64] {
        &self.periods
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
}

/// Column names of a long-format series table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesColumns {
    pub item: String,
    pub period: String,
    pub value: String,
}

impl Default for SeriesColumns {
    fn default() -> Self {
        Self {
            item: "Item".to_string(),
            period: "Year".to_string(),
            value: "Value_winsor".to_string(),
        }
    }
}

/// Every item's series from one table
#[derive(Debug, Clone, Default)]
pub struct SeriesPanel {
    series: BTreeMap<String, Series>,
}

impl SeriesPanel {
    /// Item identifiers in sorted order
    pub fn items(&self) -> Vec<&str> {
        self.series.keys().map(String::as_str).collect()
    }

    pub fn get(&self, item_id: &str) -> Option<&Series> {
        self.series.get(item_id)
    }

    /// Look up an item the way the model store keys it: an exact match first,
    /// then ignoring case and spaces versus underscores.
    pub fn find(&self, item_id: &str) -> Option<&Series> {
        self.get(item_id).or_else(|| {
            let wanted = normalize_item_id(item_id);
            self.series
                .iter()
                .find(|(name, _)| normalize_item_id(name) == wanted)
                .map(|(_, series)| series)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Series> {
        self.series.values()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Data loader for item series tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load every item's series from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P, columns: &SeriesColumns) -> Result<SeriesPanel> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        Self::from_reader(reader, columns)
    }

    /// Load from an already configured CSV reader
    pub fn from_reader<R: std::io::Read>(
        mut reader: csv::Reader<R>,
        columns: &SeriesColumns,
    ) -> Result<SeriesPanel> {
        let headers = reader.headers()?.clone();
        let item_idx = Self::column_index(&headers, &columns.item)?;
        let period_idx = Self::column_index(&headers, &columns.period)?;
        let value_idx = Self::column_index(&headers, &columns.value)?;

        let mut grouped: HashMap<String, Vec<(i64, f64)>> = HashMap::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let line = row + 2;
            let field = |idx: usize| record.get(idx).unwrap_or("");

            let item = field(item_idx);
            if item.is_empty() {
                return Err(ForecastError::DataError(format!(
                    "Missing item name on line {}",
                    line
                )));
            }

            let raw_value = field(value_idx);
            if raw_value.is_empty() || raw_value.eq_ignore_ascii_case("nan") {
                log::warn!("Skipping line {}: no value for '{}'", line, item);
                continue;
            }
            let value: f64 = raw_value.parse().map_err(|_| {
                ForecastError::DataError(format!(
                    "Invalid value '{}' on line {}",
                    raw_value, line
                ))
            })?;
            let period = parse_period(field(period_idx)).ok_or_else(|| {
                ForecastError::DataError(format!(
                    "Invalid period '{}' on line {}",
                    field(period_idx),
                    line
                ))
            })?;

            grouped
                .entry(item.to_string())
                .or_default()
                .push((period, value));
        }

        let series = grouped
            .into_iter()
            .map(|(item, observations)| {
                Series::from_observations(item.clone(), observations).map(|s| (item, s))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        log::debug!("Loaded {} item series", series.len());
        Ok(SeriesPanel { series })
    }

    fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ForecastError::DataError(format!("Column '{}' not found", name)))
    }
}

/// Parse an integer period (e.g. a year) or an ISO date, as days since the common era.
fn parse_period(raw: &str) -> Option<i64> {
    if let Ok(period) = raw.parse::<i64>() {
        return Some(period);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| i64::from(date.num_days_from_ce()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_observations_sorts_by_period() {
        let series =
            Series::from_observations("Carrot", vec![(2021, 3.0), (2019, 1.0), (2020, 2.0)])
                .unwrap();
        assert_eq!(series.periods(), &[2019, 2020, 2021]);
        assert_eq!(series.values(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_duplicate_periods_rejected() {
        let result = Series::from_observations("Carrot", vec![(2020, 1.0), (2020, 2.0)]);
        assert!(matches!(result, Err(ForecastError::DataError(_))));
    }

    #[test]
    fn test_parse_period() {
        assert_eq!(parse_period("2019"), Some(2019));
        assert!(parse_period("2023-01-02").unwrap() > parse_period("2023-01-01").unwrap());
        assert_eq!(parse_period("last year"), None);
    }
}
