//! Data Processor Module
//! Reshapes the wide monthly file to long form and joins the metric views.

use super::columns::{self, HISTORIC_PREFIX, ID_COLUMNS, JOIN_KEY};
use super::metric::Metric;
use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use polars::prelude::*;
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

/// Days between 0001-01-01 and 1970-01-01, the epoch of the Polars Date type.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column '{0}' is not a YYYY-MM month")]
    InvalidDate(String),
    #[error("No month columns found")]
    NoMonthColumns,
    #[error("Duplicate join key in '{metric}' view: {key}")]
    DuplicateKey { metric: Metric, key: String },
}

/// Parse a `YYYY-MM` header into the first day of that month.
pub fn parse_month(text: &str) -> Option<NaiveDate> {
    let bytes = text.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return None;
    }
    let year: i32 = text[..4].parse().ok()?;
    let month: u32 = text[5..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Polars Date physical value for a calendar date.
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + EPOCH_DAYS_FROM_CE)
}

/// Handles reshaping and joining.
pub struct DataProcessor;

impl DataProcessor {
    /// Transform the wide month columns to long format.
    ///
    /// Output columns: [region_id, region_name, size_rank, index, date, year,
    /// value, historic_average]. One row per input cell, missing cells kept
    /// as nulls.
    pub fn reshape_long(wide: &DataFrame) -> Result<DataFrame, ProcessorError> {
        let mut months: Vec<(String, NaiveDate)> = Vec::new();
        let mut historic_col: Option<String> = None;

        for name in wide.get_column_names() {
            let name = name.to_string();
            if ID_COLUMNS.contains(&name.as_str()) {
                continue;
            }
            if name.starts_with(HISTORIC_PREFIX) {
                historic_col.get_or_insert(name);
                continue;
            }
            let date = parse_month(&name).ok_or_else(|| ProcessorError::InvalidDate(name.clone()))?;
            months.push((name, date));
        }

        if months.is_empty() {
            return Err(ProcessorError::NoMonthColumns);
        }
        months.sort_by_key(|(_, date)| *date);

        let region_id = wide.column(columns::REGION_ID)?.cast(&DataType::Int64)?;
        let region_id = region_id.i64()?;
        let region_name = wide.column(columns::REGION_NAME)?.cast(&DataType::String)?;
        let region_name = region_name.str()?;
        let size_rank = wide.column(columns::SIZE_RANK)?.cast(&DataType::Int64)?;
        let size_rank = size_rank.i64()?;
        let index = wide.column(columns::INDEX)?.cast(&DataType::String)?;
        let index = index.str()?;

        let historic = match &historic_col {
            Some(name) => Some(wide.column(name)?.cast(&DataType::Float64)?),
            None => None,
        };
        let historic = historic.as_ref().map(|c| c.f64()).transpose()?;

        let month_values: Vec<Column> = months
            .iter()
            .map(|(name, _)| wide.column(name).and_then(|c| c.cast(&DataType::Float64)))
            .collect::<PolarsResult<_>>()?;
        let month_values: Vec<&Float64Chunked> = month_values
            .iter()
            .map(|c| c.f64())
            .collect::<PolarsResult<_>>()?;

        let capacity = wide.height() * months.len();
        let mut out_region_id: Vec<Option<i64>> = Vec::with_capacity(capacity);
        let mut out_region_name: Vec<Option<&str>> = Vec::with_capacity(capacity);
        let mut out_size_rank: Vec<Option<i64>> = Vec::with_capacity(capacity);
        let mut out_index: Vec<Option<&str>> = Vec::with_capacity(capacity);
        let mut out_date: Vec<i32> = Vec::with_capacity(capacity);
        let mut out_year: Vec<i32> = Vec::with_capacity(capacity);
        let mut out_value: Vec<Option<f64>> = Vec::with_capacity(capacity);
        let mut out_historic: Vec<Option<f64>> = Vec::with_capacity(capacity);

        for row in 0..wide.height() {
            let hist = historic.and_then(|h| h.get(row));
            for ((_, date), values) in months.iter().zip(month_values.iter()) {
                out_region_id.push(region_id.get(row));
                out_region_name.push(region_name.get(row));
                out_size_rank.push(size_rank.get(row));
                out_index.push(index.get(row));
                out_date.push(date_to_days(*date));
                out_year.push(date.year());
                out_value.push(values.get(row));
                out_historic.push(hist);
            }
        }

        let date = Column::new(columns::DATE.into(), out_date).cast(&DataType::Date)?;
        let df = DataFrame::new(vec![
            Column::new(columns::REGION_ID.into(), out_region_id),
            Column::new(columns::REGION_NAME.into(), out_region_name),
            Column::new(columns::SIZE_RANK.into(), out_size_rank),
            Column::new(columns::INDEX.into(), out_index),
            date,
            Column::new(columns::YEAR.into(), out_year),
            Column::new(columns::VALUE.into(), out_value),
            Column::new(columns::HISTORIC_AVERAGE.into(), out_historic),
        ])?;

        debug!(
            "Reshaped {} wide rows x {} months into {} long rows",
            wide.height(),
            months.len(),
            df.height()
        );
        Ok(df)
    }

    /// Split the long table by metric and left-join the three views on
    /// (region_id, region_name, size_rank, date), starting from price-to-income.
    pub fn join_metrics(long: &DataFrame) -> Result<DataFrame, ProcessorError> {
        let index = long.column(columns::INDEX)?.str()?;
        let unknown: BTreeSet<&str> = index
            .into_iter()
            .flatten()
            .filter(|label| Metric::from_label(label).is_none())
            .collect();
        if !unknown.is_empty() {
            warn!(
                "Ignoring rows with unknown index: {}",
                unknown.into_iter().collect::<Vec<_>>().join(", ")
            );
        }

        let price = Self::metric_view(long, Metric::PriceToIncome, true)?;
        let mortgage = Self::metric_view(long, Metric::MortgageAffordability, false)?;
        let rent = Self::metric_view(long, Metric::RentAffordability, false)?;

        let keys = JOIN_KEY.map(col);
        let joined = price
            .lazy()
            .join(
                mortgage.lazy(),
                keys.clone(),
                keys.clone(),
                JoinArgs::new(JoinType::Left),
            )
            .join(
                rent.lazy(),
                keys.clone(),
                keys,
                JoinArgs::new(JoinType::Left),
            )
            .sort_by_exprs(
                [col(columns::SIZE_RANK), col(columns::DATE)],
                SortMultipleOptions::default(),
            )
            .collect()?;

        debug!("Joined metric views into {} rows", joined.height());
        Ok(joined)
    }

    /// Rows of one metric with `value`/`historic_average` renamed to the
    /// metric's own columns. Only the base view keeps `year`.
    fn metric_view(
        long: &DataFrame,
        metric: Metric,
        keep_year: bool,
    ) -> Result<DataFrame, ProcessorError> {
        let mut selection: Vec<Expr> = JOIN_KEY.iter().map(|c| col(*c)).collect();
        if keep_year {
            selection.push(col(columns::YEAR));
        }
        selection.push(col(columns::VALUE).alias(metric.column()));
        selection.push(col(columns::HISTORIC_AVERAGE).alias(metric.hist_column()));

        let view = long
            .clone()
            .lazy()
            .filter(col(columns::INDEX).eq(lit(metric.label())))
            .select(selection)
            .collect()?;

        Self::ensure_unique_keys(&view, metric)?;
        Ok(view)
    }

    fn ensure_unique_keys(view: &DataFrame, metric: Metric) -> Result<(), ProcessorError> {
        let region_id = view.column(columns::REGION_ID)?.i64()?;
        let region_name = view.column(columns::REGION_NAME)?.str()?;
        let size_rank = view.column(columns::SIZE_RANK)?.i64()?;
        let date = view.column(columns::DATE)?.cast(&DataType::Int32)?;
        let date = date.i32()?;

        let mut seen = HashSet::with_capacity(view.height());
        for i in 0..view.height() {
            let key = (
                region_id.get(i),
                region_name.get(i),
                size_rank.get(i),
                date.get(i),
            );
            if !seen.insert(key) {
                return Err(ProcessorError::DuplicateKey {
                    metric,
                    key: format!(
                        "{:?} / {:?} / {:?} / {:?}",
                        key.0,
                        key.1,
                        key.2,
                        key.3.and_then(days_to_date)
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide_fixture() -> DataFrame {
        df!(
            "region_id" => [1i64, 1, 1, 2, 2],
            "region_name" => ["United States", "United States", "United States", "Boston, MA", "Boston, MA"],
            "size_rank" => [0i64, 0, 0, 5, 5],
            "index" => [
                "Price To Income",
                "Mortgage Affordability",
                "Rent Affordability",
                "Price To Income",
                "Mortgage Affordability",
            ],
            "historic_average_1985thru1999" => [2.9, 0.21, 0.25, 3.8, 0.24],
            "1979-04" => [Some(2.9), Some(0.23), None, Some(3.0), Some(0.25)],
            "1979-03" => [Some(2.8), Some(0.22), Some(0.27), None, Some(0.26)]
        )
        .unwrap()
    }

    #[test]
    fn parses_months() {
        assert_eq!(parse_month("1979-03"), NaiveDate::from_ymd_opt(1979, 3, 1));
        assert_eq!(parse_month("2018-12"), NaiveDate::from_ymd_opt(2018, 12, 1));
        assert_eq!(parse_month("2018-13"), None);
        assert_eq!(parse_month("1979/03"), None);
        assert_eq!(parse_month("region_id"), None);
    }

    #[test]
    fn day_conversion_matches_unix_epoch() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(date_to_days(epoch), 0);
        let d = NaiveDate::from_ymd_opt(1979, 3, 1).unwrap();
        assert_eq!(days_to_date(date_to_days(d)), Some(d));
    }

    #[test]
    fn reshape_has_one_row_per_cell() {
        let wide = wide_fixture();
        let long = DataProcessor::reshape_long(&wide).unwrap();
        assert_eq!(long.height(), wide.height() * 2);

        let ids = long.column("region_id").unwrap().i64().unwrap();
        let index = long.column("index").unwrap().str().unwrap();
        let dates = long.column("date").unwrap().cast(&DataType::Int32).unwrap();
        let dates = dates.i32().unwrap();
        let values = long.column("value").unwrap().f64().unwrap();

        let wide_ids = wide.column("region_id").unwrap().i64().unwrap();
        let wide_index = wide.column("index").unwrap().str().unwrap();
        for month in ["1979-03", "1979-04"] {
            let day = date_to_days(parse_month(month).unwrap());
            let cells = wide.column(month).unwrap().f64().unwrap();
            for row in 0..wide.height() {
                let matches: Vec<Option<f64>> = (0..long.height())
                    .filter(|&i| {
                        ids.get(i) == wide_ids.get(row)
                            && index.get(i) == wide_index.get(row)
                            && dates.get(i) == Some(day)
                    })
                    .map(|i| values.get(i))
                    .collect();
                assert_eq!(matches, vec![cells.get(row)], "row {row}, {month}");
            }
        }
    }

    #[test]
    fn reshape_orders_months_ascending() {
        let long = DataProcessor::reshape_long(&wide_fixture()).unwrap();
        let years = long.column("year").unwrap().i32().unwrap();
        assert!(years.into_iter().all(|y| y == Some(1979)));
        let first = long.column("value").unwrap().f64().unwrap().get(0);
        assert_eq!(first, Some(2.8));
    }

    #[test]
    fn reshape_is_idempotent() {
        let wide = wide_fixture();
        let a = DataProcessor::reshape_long(&wide).unwrap();
        let b = DataProcessor::reshape_long(&wide).unwrap();
        assert!(a.equals_missing(&b));
    }

    #[test]
    fn rejects_malformed_month_column() {
        let wide = df!(
            "region_id" => [1i64],
            "region_name" => ["United States"],
            "size_rank" => [0i64],
            "index" => ["Price To Income"],
            "1979-3" => [2.8]
        )
        .unwrap();
        let err = DataProcessor::reshape_long(&wide).unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidDate(ref c) if c == "1979-3"));
    }

    #[test]
    fn join_places_metrics_side_by_side() {
        let long = DataProcessor::reshape_long(&wide_fixture()).unwrap();
        let joined = DataProcessor::join_metrics(&long).unwrap();

        // Two regions x two months of price-to-income.
        assert_eq!(joined.height(), 4);
        for name in [
            "price_to_income",
            "price_to_income_hist",
            "mort_afford",
            "mort_afford_hist",
            "rent_afford",
            "rent_afford_hist",
            "year",
        ] {
            assert!(joined.column(name).is_ok(), "missing column {name}");
        }

        // Sorted by size rank then date: first row is United States 1979-03,
        // present in all three views.
        let mort = joined.column("mort_afford").unwrap().f64().unwrap();
        let rent = joined.column("rent_afford").unwrap().f64().unwrap();
        assert_eq!(mort.get(0), Some(0.22));
        assert_eq!(rent.get(0), Some(0.27));

        // Boston has no rent view, so rent columns are null.
        let names = joined.column("region_name").unwrap().str().unwrap();
        for i in 0..joined.height() {
            if names.get(i) == Some("Boston, MA") {
                assert_eq!(rent.get(i), None);
                assert!(mort.get(i).is_some());
            }
        }
    }

    #[test]
    fn join_rejects_duplicate_keys() {
        let wide = df!(
            "region_id" => [1i64, 1],
            "region_name" => ["United States", "United States"],
            "size_rank" => [0i64, 0],
            "index" => ["Price To Income", "Price To Income"],
            "1979-03" => [2.8, 2.9]
        )
        .unwrap();
        let long = DataProcessor::reshape_long(&wide).unwrap();
        let err = DataProcessor::join_metrics(&long).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::DuplicateKey {
                metric: Metric::PriceToIncome,
                ..
            }
        ));
    }
}
