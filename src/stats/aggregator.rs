//! Yearly Aggregation Module
//! Grouped yearly means over the joined affordability table.

use crate::data::columns::{self, SIZE_GROUP, YEAR};
use crate::data::{AffordabilityData, Metric};
use polars::prelude::*;

/// Which regions take part in an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionFilter {
    /// Every row, national aggregates included.
    All,
    /// The `n` largest ranked regions (size rank 1..=n).
    Largest(u32),
    /// The `n` smallest ranked regions (highest size ranks).
    Smallest(u32),
}

impl RegionFilter {
    fn to_expr(self, data: &AffordabilityData) -> Option<Expr> {
        match self {
            RegionFilter::All => None,
            RegionFilter::Largest(0) | RegionFilter::Smallest(0) => Some(lit(false)),
            RegionFilter::Largest(n) => Some(
                col(columns::SIZE_RANK)
                    .gt_eq(lit(1i64))
                    .and(col(columns::SIZE_RANK).lt_eq(lit(i64::from(n)))),
            ),
            RegionFilter::Smallest(n) => {
                let ranks: Vec<i64> = data.ranked_regions().map(|r| r.size_rank).collect();
                let threshold = ranks
                    .len()
                    .checked_sub(n as usize)
                    .and_then(|start| ranks.get(start))
                    .or_else(|| ranks.first());
                Some(match threshold {
                    Some(&rank) => col(columns::SIZE_RANK).gt_eq(lit(rank)),
                    None => lit(false),
                })
            }
        }
    }
}

/// Comparison group for the largest vs smallest chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeGroup {
    Largest,
    Smallest,
}

impl SizeGroup {
    pub fn label(self, n: u32) -> String {
        match self {
            SizeGroup::Largest => format!("{n} largest regions"),
            SizeGroup::Smallest => format!("{n} smallest regions"),
        }
    }

    pub fn filter(self, n: u32) -> RegionFilter {
        match self {
            SizeGroup::Largest => RegionFilter::Largest(n),
            SizeGroup::Smallest => RegionFilter::Smallest(n),
        }
    }
}

/// Computes grouped yearly averages.
pub struct Aggregator;

impl Aggregator {
    /// Mean of the non-null `metric` values per (year, region).
    ///
    /// Output columns: [year, region_id, region_name, size_rank, avg_<metric>],
    /// sorted by year then size rank. Groups without any value are absent.
    pub fn yearly_average(
        data: &AffordabilityData,
        metric: Metric,
        filter: RegionFilter,
    ) -> PolarsResult<DataFrame> {
        let mut lf = data
            .frame()
            .clone()
            .lazy()
            .filter(col(metric.column()).is_not_null());
        if let Some(expr) = filter.to_expr(data) {
            lf = lf.filter(expr);
        }

        lf.group_by([
            col(YEAR),
            col(columns::REGION_ID),
            col(columns::REGION_NAME),
            col(columns::SIZE_RANK),
        ])
        .agg([col(metric.column()).mean().alias(metric.avg_column())])
        .sort_by_exprs(
            [col(YEAR), col(columns::SIZE_RANK)],
            SortMultipleOptions::default(),
        )
        .collect()
    }

    /// Yearly averages restricted to a single year.
    pub fn yearly_average_for(
        data: &AffordabilityData,
        metric: Metric,
        filter: RegionFilter,
        year: i32,
    ) -> PolarsResult<DataFrame> {
        Self::yearly_average(data, metric, filter)?
            .lazy()
            .filter(col(YEAR).eq(lit(year)))
            .collect()
    }

    /// Yearly mean price-to-income across all months of the `n` largest and
    /// the `n` smallest regions, from `since` onward.
    ///
    /// Output columns: [year, size_group, avg_price_to_income].
    pub fn size_group_average(
        data: &AffordabilityData,
        n: u32,
        since: i32,
    ) -> PolarsResult<DataFrame> {
        let metric = Metric::PriceToIncome;
        let group = |group: SizeGroup| -> PolarsResult<DataFrame> {
            let mut lf = data.frame().clone().lazy().filter(
                col(metric.column())
                    .is_not_null()
                    .and(col(YEAR).gt_eq(lit(since))),
            );
            if let Some(expr) = group.filter(n).to_expr(data) {
                lf = lf.filter(expr);
            }
            lf.group_by([col(YEAR)])
                .agg([col(metric.column()).mean().alias(metric.avg_column())])
                .with_column(lit(group.label(n)).alias(SIZE_GROUP))
                .select([col(YEAR), col(SIZE_GROUP), col(metric.avg_column())])
                .sort_by_exprs([col(YEAR)], SortMultipleOptions::default())
                .collect()
        };

        let largest = group(SizeGroup::Largest)?;
        let smallest = group(SizeGroup::Smallest)?;
        largest.vstack(&smallest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures;

    fn avg_for(df: &DataFrame, region: &str, year: i32, metric: Metric) -> Option<f64> {
        let names = df.column("region_name").unwrap().str().unwrap();
        let years = df.column("year").unwrap().i32().unwrap();
        let avgs = df.column(metric.avg_column()).unwrap().f64().unwrap();
        (0..df.height())
            .find(|&i| names.get(i) == Some(region) && years.get(i) == Some(year))
            .and_then(|i| avgs.get(i))
    }

    #[test]
    fn mean_of_non_missing_months_in_year() {
        let data = fixtures::data();
        let df = Aggregator::yearly_average(&data, Metric::PriceToIncome, RegionFilter::All).unwrap();

        // United States: 2018 has January 3.4 and February 3.6.
        let us_2018 = avg_for(&df, "United States", 2018, Metric::PriceToIncome).unwrap();
        assert!((us_2018 - 3.5).abs() < 1e-9);

        // Dayton has only January in 2018; the missing February is skipped.
        let dayton_2018 = avg_for(&df, "Dayton, OH", 2018, Metric::PriceToIncome).unwrap();
        assert!((dayton_2018 - 2.4).abs() < 1e-9);

        // 2017: November and December.
        let chicago_2017 = avg_for(&df, "Chicago, IL", 2017, Metric::PriceToIncome).unwrap();
        assert!((chicago_2017 - 3.6).abs() < 1e-9);
    }

    #[test]
    fn largest_filter_skips_national_row() {
        let data = fixtures::data();
        let df =
            Aggregator::yearly_average(&data, Metric::PriceToIncome, RegionFilter::Largest(2))
                .unwrap();
        let ranks: Vec<i64> = df
            .column("size_rank")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!(ranks.iter().all(|r| (1..=2).contains(r)));
        // Two regions x two years.
        assert_eq!(df.height(), 4);
    }

    #[test]
    fn smallest_filter_takes_highest_ranks() {
        let data = fixtures::data();
        let df =
            Aggregator::yearly_average(&data, Metric::PriceToIncome, RegionFilter::Smallest(2))
                .unwrap();
        let mut names: Vec<String> = df
            .column("region_name")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .map(String::from)
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names, vec!["Chicago, IL", "Dayton, OH"]);
    }

    #[test]
    fn empty_groups_select_nothing() {
        let data = fixtures::data();
        for filter in [RegionFilter::Largest(0), RegionFilter::Smallest(0)] {
            let df = Aggregator::yearly_average(&data, Metric::PriceToIncome, filter).unwrap();
            assert_eq!(df.height(), 0, "{filter:?}");
        }
        let df = Aggregator::size_group_average(&data, 0, 2000).unwrap();
        assert_eq!(df.height(), 0);
    }

    #[test]
    fn out_of_range_year_is_empty() {
        let data = fixtures::data();
        let df = Aggregator::yearly_average_for(
            &data,
            Metric::PriceToIncome,
            RegionFilter::All,
            1950,
        )
        .unwrap();
        assert_eq!(df.height(), 0);
    }

    #[test]
    fn size_groups_since_year() {
        let data = fixtures::data();
        let df = Aggregator::size_group_average(&data, 2, 2018).unwrap();
        // One row per group for 2018 only.
        assert_eq!(df.height(), 2);
        let groups = df.column("size_group").unwrap().str().unwrap();
        assert_eq!(groups.get(0), Some("2 largest regions"));
        assert_eq!(groups.get(1), Some("2 smallest regions"));

        // Largest: New York (5.4, 5.6) and LA (8.4, 8.6) -> 7.0
        let avgs = df.column("avg_price_to_income").unwrap().f64().unwrap();
        assert!((avgs.get(0).unwrap() - 7.0).abs() < 1e-9);
        // Smallest: Chicago (3.9, 4.1) and Dayton (2.4) -> 3.4667
        assert!((avgs.get(1).unwrap() - 10.4 / 3.0).abs() < 1e-9);
    }
}
