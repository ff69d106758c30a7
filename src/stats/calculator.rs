//! Statistics Calculator Module
//! Descriptive statistics per region and Welch's t-test between size groups.

use super::aggregator::{Aggregator, SizeGroup};
use crate::data::columns;
use crate::data::{AffordabilityData, Metric};
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::collections::HashMap;

/// Significance threshold for t-test
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// Descriptive statistics for one series of values.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryStats {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub p05: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for SummaryStats {
    fn default() -> Self {
        Self {
            name: String::new(),
            count: 0,
            mean: f64::NAN,
            median: f64::NAN,
            std: f64::NAN,
            p05: f64::NAN,
            p95: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
        }
    }
}

/// Largest vs smallest regions: region-year averages compared with Welch's t-test.
#[derive(Debug, Clone, Serialize)]
pub struct GroupComparison {
    pub largest: SummaryStats,
    pub smallest: SummaryStats,
    pub p_value: f64,
    pub is_significant: bool,
}

/// Handles statistical calculations.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(values: &[f64]) -> SummaryStats {
        let n = values.len();
        if n == 0 {
            return SummaryStats::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mean = values.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        let variance = if n > 1 {
            values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };

        SummaryStats {
            name: String::new(),
            count: n,
            mean,
            median,
            std: variance.sqrt(),
            p05: Self::percentile(&sorted, 5.0),
            p95: Self::percentile(&sorted, 95.0),
            min: sorted[0],
            max: sorted[n - 1],
        }
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    /// Perform Welch's t-test (independent samples, unequal variance).
    pub fn perform_ttest(group_values: &[f64], control_values: &[f64]) -> (f64, bool) {
        let n1 = group_values.len() as f64;
        let n2 = control_values.len() as f64;

        if n1 < 2.0 || n2 < 2.0 {
            return (f64::NAN, false);
        }

        let mean1 = group_values.iter().sum::<f64>() / n1;
        let mean2 = control_values.iter().sum::<f64>() / n2;

        let var1 = group_values
            .iter()
            .map(|x| (x - mean1).powi(2))
            .sum::<f64>()
            / (n1 - 1.0);
        let var2 = control_values
            .iter()
            .map(|x| (x - mean2).powi(2))
            .sum::<f64>()
            / (n2 - 1.0);

        let se = (var1 / n1 + var2 / n2).sqrt();
        if se == 0.0 {
            return (1.0, false);
        }

        let t = (mean1 - mean2) / se;

        // Welch-Satterthwaite degrees of freedom
        let df_num = (var1 / n1 + var2 / n2).powi(2);
        let df_denom = (var1 / n1).powi(2) / (n1 - 1.0) + (var2 / n2).powi(2) / (n2 - 1.0);
        let df = df_num / df_denom;

        if let Ok(dist) = StudentsT::new(0.0, 1.0, df) {
            let p_value = 2.0 * (1.0 - dist.cdf(t.abs()));
            (p_value, p_value <= SIGNIFICANCE_THRESHOLD)
        } else {
            (f64::NAN, false)
        }
    }

    /// Compare region-year average price-to-income of the `n` largest and the
    /// `n` smallest regions from `since` onward.
    pub fn compare_size_groups(
        data: &AffordabilityData,
        n: u32,
        since: i32,
    ) -> PolarsResult<GroupComparison> {
        let metric = Metric::PriceToIncome;
        let samples = |group: SizeGroup| -> PolarsResult<Vec<f64>> {
            let df = Aggregator::yearly_average(data, metric, group.filter(n))?
                .lazy()
                .filter(col(columns::YEAR).gt_eq(lit(since)))
                .collect()?;
            Ok(df
                .column(metric.avg_column())?
                .f64()?
                .into_iter()
                .flatten()
                .collect())
        };

        let largest_values = samples(SizeGroup::Largest)?;
        let smallest_values = samples(SizeGroup::Smallest)?;
        let (p_value, is_significant) = Self::perform_ttest(&largest_values, &smallest_values);

        let mut largest = Self::compute_descriptive_stats(&largest_values);
        largest.name = SizeGroup::Largest.label(n);
        let mut smallest = Self::compute_descriptive_stats(&smallest_values);
        smallest.name = SizeGroup::Smallest.label(n);

        Ok(GroupComparison {
            largest,
            smallest,
            p_value,
            is_significant,
        })
    }

    /// Price-to-income statistics over all months for each region, computed in parallel.
    /// Returned in size-rank order.
    pub fn region_summaries(data: &AffordabilityData) -> PolarsResult<Vec<SummaryStats>> {
        let mut by_region: HashMap<i64, Vec<f64>> = HashMap::new();
        for record in data.records()? {
            if let (Some(value), _) = record.metric_values(Metric::PriceToIncome) {
                by_region.entry(record.region_id).or_default().push(value);
            }
        }

        let summaries = data
            .regions()
            .par_iter()
            .filter_map(|region| {
                let values = by_region.get(&region.region_id)?;
                let mut stats = Self::compute_descriptive_stats(values);
                stats.name = region.region_name.clone();
                Some(stats)
            })
            .collect();
        Ok(summaries)
    }
}
