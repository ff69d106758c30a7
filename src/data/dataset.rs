//! The immutable base table every view reads from.

use super::columns;
use super::loader::{DataLoader, LoaderError};
use super::metric::Metric;
use super::processor::{days_to_date, DataProcessor, ProcessorError};
use chrono::NaiveDate;
use log::info;
use polars::prelude::*;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// One joined row with an explicit optional value per metric.
#[derive(Debug, Clone, PartialEq)]
pub struct AffordabilityRecord {
    pub region_id: i64,
    pub region_name: String,
    pub size_rank: i64,
    pub date: NaiveDate,
    pub price_to_income: Option<f64>,
    pub price_to_income_hist: Option<f64>,
    pub mort_afford: Option<f64>,
    pub mort_afford_hist: Option<f64>,
    pub rent_afford: Option<f64>,
    pub rent_afford_hist: Option<f64>,
}

impl AffordabilityRecord {
    /// (value, historical average) of one metric.
    pub fn metric_values(&self, metric: Metric) -> (Option<f64>, Option<f64>) {
        match metric {
            Metric::PriceToIncome => (self.price_to_income, self.price_to_income_hist),
            Metric::MortgageAffordability => (self.mort_afford, self.mort_afford_hist),
            Metric::RentAffordability => (self.rent_afford, self.rent_afford_hist),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionInfo {
    pub region_id: i64,
    pub region_name: String,
    pub size_rank: i64,
}

/// Joined affordability table plus the region list derived from it.
#[derive(Debug, Clone)]
pub struct AffordabilityData {
    joined: DataFrame,
    regions: Vec<RegionInfo>,
}

impl AffordabilityData {
    /// Load, reshape and join a wide affordability file.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let wide = DataLoader::load_wide_csv(path)?;
        let data = Self::from_wide(&wide)?;
        info!(
            "Loaded {}: {} regions, {} region-months",
            path.display(),
            data.regions.len(),
            data.joined.height()
        );
        Ok(data)
    }

    pub fn from_wide(wide: &DataFrame) -> Result<Self, DatasetError> {
        let long = DataProcessor::reshape_long(wide)?;
        let joined = DataProcessor::join_metrics(&long)?;
        Self::from_joined(joined)
    }

    pub fn from_joined(joined: DataFrame) -> Result<Self, DatasetError> {
        let unique = joined
            .clone()
            .lazy()
            .select([
                col(columns::REGION_ID),
                col(columns::REGION_NAME),
                col(columns::SIZE_RANK),
            ])
            .unique_stable(None, UniqueKeepStrategy::First)
            .sort_by_exprs(
                [col(columns::SIZE_RANK), col(columns::REGION_NAME)],
                SortMultipleOptions::default(),
            )
            .collect()?;

        let ids = unique.column(columns::REGION_ID)?.i64()?;
        let names = unique.column(columns::REGION_NAME)?.str()?;
        let ranks = unique.column(columns::SIZE_RANK)?.i64()?;
        let regions = (0..unique.height())
            .filter_map(|i| {
                Some(RegionInfo {
                    region_id: ids.get(i)?,
                    region_name: names.get(i)?.to_string(),
                    size_rank: ranks.get(i)?,
                })
            })
            .collect();

        Ok(Self { joined, regions })
    }

    /// The joined wide table.
    pub fn frame(&self) -> &DataFrame {
        &self.joined
    }

    /// Regions ordered by size rank (largest first).
    pub fn regions(&self) -> &[RegionInfo] {
        &self.regions
    }

    pub fn region_names(&self) -> Vec<String> {
        self.regions.iter().map(|r| r.region_name.clone()).collect()
    }

    pub fn find_region(&self, name: &str) -> Option<&RegionInfo> {
        self.regions.iter().find(|r| r.region_name == name)
    }

    /// Regions with a positive size rank, i.e. excluding national aggregates.
    pub fn ranked_regions(&self) -> impl Iterator<Item = &RegionInfo> {
        self.regions.iter().filter(|r| r.size_rank > 0)
    }

    /// Inclusive span of calendar years covered, if any rows exist.
    pub fn year_range(&self) -> Option<(i32, i32)> {
        let years = self.joined.column(columns::YEAR).ok()?.i32().ok()?;
        Some((years.min()?, years.max()?))
    }

    pub fn contains_year(&self, year: i32) -> bool {
        self.year_range()
            .is_some_and(|(min, max)| (min..=max).contains(&year))
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        let dates = self
            .joined
            .column(columns::DATE)
            .ok()?
            .cast(&DataType::Int32)
            .ok()?;
        let latest = dates.i32().ok()?.max()?;
        days_to_date(latest)
    }

    /// Materialise the joined table as typed records.
    pub fn records(&self) -> PolarsResult<Vec<AffordabilityRecord>> {
        let df = &self.joined;
        let ids = df.column(columns::REGION_ID)?.i64()?;
        let names = df.column(columns::REGION_NAME)?.str()?;
        let ranks = df.column(columns::SIZE_RANK)?.i64()?;
        let dates = df.column(columns::DATE)?.cast(&DataType::Int32)?;
        let dates = dates.i32()?;
        let pti = df.column(columns::PRICE_TO_INCOME)?.f64()?;
        let pti_hist = df.column(columns::PRICE_TO_INCOME_HIST)?.f64()?;
        let mort = df.column(columns::MORT_AFFORD)?.f64()?;
        let mort_hist = df.column(columns::MORT_AFFORD_HIST)?.f64()?;
        let rent = df.column(columns::RENT_AFFORD)?.f64()?;
        let rent_hist = df.column(columns::RENT_AFFORD_HIST)?.f64()?;

        let records = (0..df.height())
            .filter_map(|i| {
                Some(AffordabilityRecord {
                    region_id: ids.get(i)?,
                    region_name: names.get(i)?.to_string(),
                    size_rank: ranks.get(i)?,
                    date: dates.get(i).and_then(days_to_date)?,
                    price_to_income: pti.get(i),
                    price_to_income_hist: pti_hist.get(i),
                    mort_afford: mort.get(i),
                    mort_afford_hist: mort_hist.get(i),
                    rent_afford: rent.get(i),
                    rent_afford_hist: rent_hist.get(i),
                })
            })
            .collect();
        Ok(records)
    }
}

/// Test fixtures shared by the view and statistics modules.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Wide table with a national row (rank 0) and four ranked regions over
    /// two years, months 2017-11 .. 2018-02.
    pub fn wide() -> DataFrame {
        let mut names = Vec::new();
        let mut ids = Vec::new();
        let mut ranks = Vec::new();
        let mut index = Vec::new();
        let mut hist = Vec::new();
        let mut nov = Vec::new();
        let mut dec = Vec::new();
        let mut jan = Vec::new();
        let mut feb = Vec::new();

        let regions = [
            (102001i64, "United States", 0i64, 3.0),
            (394913, "New York, NY", 1, 5.0),
            (753899, "Los Angeles-Long Beach-Anaheim, CA", 2, 8.0),
            (394463, "Chicago, IL", 3, 3.5),
            (394514, "Dayton, OH", 4, 2.0),
        ];
        for (id, name, rank, base) in regions {
            for (label, scale) in [
                ("Price To Income", 1.0),
                ("Mortgage Affordability", 0.05),
                ("Rent Affordability", 0.07),
            ] {
                ids.push(id);
                names.push(name);
                ranks.push(rank);
                index.push(label);
                hist.push(Some(base * scale * 0.9));
                nov.push(Some(base * scale));
                dec.push(Some(base * scale + 0.2 * scale));
                jan.push(Some(base * scale + 0.4 * scale));
                // Dayton has no February value for any metric.
                feb.push(if rank == 4 {
                    None
                } else {
                    Some(base * scale + 0.6 * scale)
                });
            }
        }

        df!(
            "region_id" => ids,
            "region_name" => names,
            "size_rank" => ranks,
            "index" => index,
            "historic_average_1985thru1999" => hist,
            "2017-11" => nov,
            "2017-12" => dec,
            "2018-01" => jan,
            "2018-02" => feb
        )
        .unwrap()
    }

    pub fn data() -> AffordabilityData {
        AffordabilityData::from_wide(&wide()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::*;

    #[test]
    fn regions_sorted_by_rank() {
        let data = fixtures::data();
        let ranks: Vec<i64> = data.regions().iter().map(|r| r.size_rank).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3, 4]);
        assert_eq!(data.ranked_regions().count(), 4);
        assert!(data.find_region("Chicago, IL").is_some());
        assert!(data.find_region("Chicago").is_none());
    }

    #[test]
    fn year_range_and_latest_date() {
        let data = fixtures::data();
        assert_eq!(data.year_range(), Some((2017, 2018)));
        assert!(data.contains_year(2018));
        assert!(!data.contains_year(2019));
        assert_eq!(data.latest_date(), NaiveDate::from_ymd_opt(2018, 2, 1));
    }

    #[test]
    fn records_carry_all_metrics_when_all_views_match() {
        let data = fixtures::data();
        let records = data.records().unwrap();
        assert_eq!(records.len(), 5 * 4);
        for r in &records {
            if r.price_to_income.is_some() {
                assert!(r.mort_afford.is_some(), "{r:?}");
                assert!(r.rent_afford.is_some(), "{r:?}");
            }
        }
        let dayton_feb = records
            .iter()
            .find(|r| r.region_name == "Dayton, OH" && r.date.format("%Y-%m").to_string() == "2018-02")
            .unwrap();
        assert_eq!(dayton_feb.price_to_income, None);
        assert_eq!(dayton_feb.mort_afford, None);
    }

    #[test]
    fn load_reads_csv_end_to_end() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("affordability.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "RegionID,RegionName,SizeRank,Index,HistoricAverage_1985thru1999,1979-03,1979-04"
        )
        .unwrap();
        writeln!(f, "102001,United States,0,Price To Income,2.9,2.8,2.85").unwrap();
        writeln!(f, "102001,United States,0,Mortgage Affordability,0.21,0.26,0.27").unwrap();
        writeln!(f, "102001,United States,0,Rent Affordability,0.25,0.29,").unwrap();
        drop(f);

        let data = AffordabilityData::load(&path).unwrap();
        let records = data.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].price_to_income, Some(2.8));
        assert_eq!(records[0].rent_afford_hist, Some(0.25));
        assert_eq!(records[1].rent_afford, None);
    }
}
