//! Chart Views Module
//! Pure functions from the base table and widget inputs to chart specs.
//! Every call recomputes its view from the immutable base table.

use super::spec::{
    min_max, palette_color, ramp_color, BubbleMap, BubbleMarker, ChartSpec, HistogramBin,
    HistogramChart, LineChart, ReferenceLine, TableSpec, TimePoint, TrendSeries,
};
use crate::config::Settings;
use crate::data::columns::{self, DATE, REGION_ID, REGION_NAME, SIZE_GROUP, YEAR};
use crate::data::{days_to_date, AffordabilityData, GeocodeTable, Metric};
use crate::stats::{Aggregator, RegionFilter, StatsCalculator};
use log::{debug, warn};
use polars::prelude::*;
use std::collections::BTreeMap;

const MAP_MARKER_OPACITY: f64 = 0.7;

/// Rows of one region sorted by date, restricted to `cols`.
/// The name is resolved to its region id; an unknown name gives no rows.
fn region_rows(data: &AffordabilityData, region: &str, cols: &[&str]) -> PolarsResult<DataFrame> {
    let mut selection = vec![col(DATE)];
    selection.extend(cols.iter().map(|c| col(*c)));
    let predicate = match data.find_region(region) {
        Some(info) => col(REGION_ID).eq(lit(info.region_id)),
        None => lit(false),
    };
    data.frame()
        .clone()
        .lazy()
        .filter(predicate)
        .select(selection)
        .sort_by_exprs([col(DATE)], SortMultipleOptions::default())
        .collect()
}

/// Non-null (date, value * scale) pairs of a column.
fn time_points(df: &DataFrame, value_col: &str, scale: f64) -> PolarsResult<Vec<TimePoint>> {
    let dates = df.column(DATE)?.cast(&DataType::Int32)?;
    let dates = dates.i32()?;
    let values = df.column(value_col)?.f64()?;
    Ok(dates
        .into_iter()
        .zip(values.into_iter())
        .filter_map(|(d, v)| {
            Some(TimePoint {
                date: days_to_date(d?)?,
                value: v? * scale,
            })
        })
        .collect())
}

/// First non-null value of a column, used for per-region historical averages.
fn first_value(df: &DataFrame, value_col: &str) -> PolarsResult<Option<f64>> {
    Ok(df.column(value_col)?.f64()?.into_iter().flatten().next())
}

/// Region-trend widget: price-to-income over time for up to `max_regions`
/// selected regions, one series each. Unknown regions produce no series.
pub fn region_trend(
    data: &AffordabilityData,
    regions: &[String],
    max_regions: usize,
) -> PolarsResult<ChartSpec> {
    if regions.len() > max_regions {
        warn!(
            "{} regions selected, only the first {} are plotted",
            regions.len(),
            max_regions
        );
    }

    let metric = Metric::PriceToIncome;
    let mut series = Vec::new();
    for region in regions.iter().take(max_regions) {
        let rows = region_rows(data, region, &[metric.column()])?;
        let points = time_points(&rows, metric.column(), 1.0)?;
        if points.is_empty() {
            debug!("No price-to-income values for '{region}'");
            continue;
        }
        series.push(TrendSeries {
            name: region.clone(),
            points,
        });
    }

    Ok(ChartSpec::Line(LineChart {
        title: "Price-to-income ratio by region".to_string(),
        subtitle: None,
        x_label: "Date".to_string(),
        y_label: "Price to income".to_string(),
        series,
        reference_lines: Vec::new(),
    }))
}

/// Single-region widget: mortgage and rent affordability (% of income) over time,
/// with each metric's historical average as a reference line.
pub fn region_affordability(data: &AffordabilityData, region: &str) -> PolarsResult<ChartSpec> {
    let mortgage = Metric::MortgageAffordability;
    let rent = Metric::RentAffordability;
    let rows = region_rows(
        data,
        region,
        &[
            mortgage.column(),
            mortgage.hist_column(),
            rent.column(),
            rent.hist_column(),
        ],
    )?;

    let mut series = Vec::new();
    let mut reference_lines = Vec::new();
    for (metric, name) in [(mortgage, "Mortgage"), (rent, "Rent")] {
        let points = time_points(&rows, metric.column(), 100.0)?;
        if !points.is_empty() {
            series.push(TrendSeries {
                name: name.to_string(),
                points,
            });
        }
        if let Some(hist) = first_value(&rows, metric.hist_column())? {
            reference_lines.push(ReferenceLine {
                name: format!("{name} historical average"),
                value: hist * 100.0,
            });
        }
    }

    Ok(ChartSpec::Line(LineChart {
        title: format!("Mortgage and rent affordability: {region}"),
        subtitle: Some("Share of median income spent on housing".to_string()),
        x_label: "Date".to_string(),
        y_label: "% of income".to_string(),
        series,
        reference_lines,
    }))
}

/// Year bubble map: one marker per mapped region with a coordinate and a
/// value for `year`. Radius grows linearly with the raw ratio.
pub fn year_bubble_map(
    data: &AffordabilityData,
    geocodes: &GeocodeTable,
    year: i32,
    settings: &Settings,
) -> PolarsResult<ChartSpec> {
    let metric = Metric::PriceToIncome;
    let filter = RegionFilter::Largest(settings.map_top_n);
    let all_years = Aggregator::yearly_average(data, metric, filter)?;
    let color_domain = min_max(
        all_years
            .column(metric.avg_column())?
            .f64()?
            .into_iter()
            .flatten(),
    );

    let df = all_years
        .lazy()
        .filter(col(YEAR).eq(lit(year)))
        .collect()?;
    let ids = df.column(columns::REGION_ID)?.i64()?;
    let avgs = df.column(metric.avg_column())?.f64()?;

    let mut markers = Vec::new();
    for (id, value) in ids.into_iter().zip(avgs.into_iter()) {
        let (Some(id), Some(value)) = (id, value) else {
            continue;
        };
        let Some(region) = data.regions().iter().find(|r| r.region_id == id) else {
            continue;
        };
        let Some(coord) = geocodes.lookup(region) else {
            continue;
        };
        markers.push(BubbleMarker {
            region_name: region.region_name.clone(),
            latitude: coord.latitude,
            longitude: coord.longitude,
            value,
            radius: value * settings.marker_radius_scale,
            opacity: MAP_MARKER_OPACITY,
            color: color_domain.map_or(palette_color(0), |d| ramp_color(value, d)),
        });
    }

    Ok(ChartSpec::BubbleMap(BubbleMap {
        title: format!(
            "Average price-to-income, {} largest regions, {year}",
            settings.map_top_n
        ),
        year,
        markers,
        color_domain,
    }))
}

/// Index `k` of the bucket `[k * width, (k + 1) * width)` holding `value`.
/// A value within rounding error of an edge belongs to the bucket above it.
fn bucket_index(value: f64, width: f64) -> i64 {
    let q = value / width;
    let edge = q.round();
    if (q - edge).abs() <= 1e-9 * edge.abs().max(1.0) {
        edge as i64
    } else {
        q.floor() as i64
    }
}

/// Year histogram: count of regions per price-to-income bucket
/// `[k * width, (k + 1) * width)` for `year`. Empty buckets between the
/// lowest and highest occupied ones are kept.
pub fn year_histogram(
    data: &AffordabilityData,
    year: i32,
    bin_width: f64,
) -> PolarsResult<ChartSpec> {
    let metric = Metric::PriceToIncome;
    let values: Vec<f64> = if data.contains_year(year) {
        let df = Aggregator::yearly_average_for(data, metric, RegionFilter::All, year)?;
        df.column(metric.avg_column())?
            .f64()?
            .into_iter()
            .flatten()
            .collect()
    } else {
        debug!("{year} is outside the data, histogram is empty");
        Vec::new()
    };

    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    if bin_width > 0.0 {
        for v in values.iter().filter(|v| v.is_finite()) {
            *counts.entry(bucket_index(*v, bin_width)).or_default() += 1;
        }
    }

    let bins = match (counts.keys().next(), counts.keys().next_back()) {
        (Some(&first), Some(&last)) => (first..=last)
            .map(|k| HistogramBin {
                lower: k as f64 * bin_width,
                upper: (k + 1) as f64 * bin_width,
                count: counts.get(&k).copied().unwrap_or(0),
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(ChartSpec::Histogram(HistogramChart {
        title: format!("Distribution of average price-to-income, {year}"),
        year,
        x_label: "Average price to income".to_string(),
        bin_width,
        bins,
    }))
}

/// National price-to-income trend with its historical average.
pub fn national_trend(data: &AffordabilityData, region: &str) -> PolarsResult<ChartSpec> {
    let metric = Metric::PriceToIncome;
    let rows = region_rows(data, region, &[metric.column(), metric.hist_column()])?;
    let points = time_points(&rows, metric.column(), 1.0)?;
    let reference_lines = first_value(&rows, metric.hist_column())?
        .map(|value| ReferenceLine {
            name: "Historical average".to_string(),
            value,
        })
        .into_iter()
        .collect();

    let series = if points.is_empty() {
        Vec::new()
    } else {
        vec![TrendSeries {
            name: region.to_string(),
            points,
        }]
    };

    Ok(ChartSpec::Line(LineChart {
        title: format!("Price-to-income ratio: {region}"),
        subtitle: Some("Median home value over median household income".to_string()),
        x_label: "Date".to_string(),
        y_label: "Price to income".to_string(),
        series,
        reference_lines,
    }))
}

/// Yearly average price-to-income of the largest vs the smallest regions.
pub fn size_comparison(data: &AffordabilityData, settings: &Settings) -> PolarsResult<ChartSpec> {
    let n = settings.comparison_group_size;
    let since = settings.comparison_since;
    let metric = Metric::PriceToIncome;
    let df = Aggregator::size_group_average(data, n, since)?;

    let groups = df.column(SIZE_GROUP)?.str()?;
    let years = df.column(YEAR)?.i32()?;
    let avgs = df.column(metric.avg_column())?.f64()?;

    let mut series: Vec<TrendSeries> = Vec::new();
    for i in 0..df.height() {
        let (Some(group), Some(year), Some(value)) = (groups.get(i), years.get(i), avgs.get(i))
        else {
            continue;
        };
        let Some(date) = chrono::NaiveDate::from_ymd_opt(year, 1, 1) else {
            continue;
        };
        let point = TimePoint { date, value };
        match series.iter_mut().find(|s| s.name == group) {
            Some(s) => s.points.push(point),
            None => series.push(TrendSeries {
                name: group.to_string(),
                points: vec![point],
            }),
        }
    }

    let comparison = StatsCalculator::compare_size_groups(data, n, since)?;
    let subtitle = if comparison.p_value.is_nan() {
        "Not enough data for a significance test".to_string()
    } else {
        format!(
            "Welch t-test p = {:.4}{}",
            comparison.p_value,
            if comparison.is_significant {
                " (significant)"
            } else {
                ""
            }
        )
    };

    Ok(ChartSpec::Line(LineChart {
        title: format!("Largest vs smallest {n} regions since {since}"),
        subtitle: Some(subtitle),
        x_label: "Year".to_string(),
        y_label: "Average price to income".to_string(),
        series,
        reference_lines: Vec::new(),
    }))
}

/// Most and least affordable ranked regions by price-to-income at the latest date.
pub fn affordability_ranking(data: &AffordabilityData, n: usize) -> PolarsResult<ChartSpec> {
    let metric = Metric::PriceToIncome;
    let Some(latest) = data.latest_date() else {
        return Ok(ChartSpec::Table(ranking_table(String::new(), Vec::new())));
    };

    let df = data
        .frame()
        .clone()
        .lazy()
        .filter(
            col(DATE)
                .cast(DataType::Int32)
                .eq(lit(crate::data::date_to_days(latest)))
                .and(col(columns::SIZE_RANK).gt_eq(lit(1i64)))
                .and(col(metric.column()).is_not_null()),
        )
        .sort_by_exprs([col(metric.column())], SortMultipleOptions::default())
        .collect()?;

    let names = df.column(REGION_NAME)?.str()?;
    let ranks = df.column(columns::SIZE_RANK)?.i64()?;
    let values = df.column(metric.column())?.f64()?;
    let all: Vec<(String, i64, f64)> = (0..df.height())
        .filter_map(|i| Some((names.get(i)?.to_string(), ranks.get(i)?, values.get(i)?)))
        .collect();

    let take = n.min(all.len() / 2 + all.len() % 2);
    let mut rows = Vec::new();
    for (label, entries) in [
        ("Most affordable", all.iter().take(take).collect::<Vec<_>>()),
        (
            "Least affordable",
            all.iter().rev().take(take.min(all.len() - take)).collect(),
        ),
    ] {
        for (name, rank, value) in entries {
            rows.push(vec![
                label.to_string(),
                name.clone(),
                rank.to_string(),
                format!("{value:.2}"),
            ]);
        }
    }

    Ok(ChartSpec::Table(ranking_table(
        latest.format("%B %Y").to_string(),
        rows,
    )))
}

fn ranking_table(period: String, rows: Vec<Vec<String>>) -> TableSpec {
    TableSpec {
        title: format!("Most and least affordable regions {period}")
            .trim_end()
            .to_string(),
        columns: ["Group", "Region", "Size rank", "Price to income"]
            .map(String::from)
            .to_vec(),
        rows,
        note: None,
    }
}

/// Price-to-income summary for the national row and the mapped regions.
pub fn region_summary_table(data: &AffordabilityData, top_n: u32) -> PolarsResult<ChartSpec> {
    let summaries = StatsCalculator::region_summaries(data)?;
    let rows = summaries
        .iter()
        .filter(|s| {
            data.find_region(&s.name)
                .is_some_and(|r| r.size_rank <= i64::from(top_n))
        })
        .map(|s| {
            vec![
                s.name.clone(),
                s.count.to_string(),
                format!("{:.2}", s.mean),
                format!("{:.2}", s.median),
                format!("{:.2}", s.std),
                format!("{:.2}", s.p05),
                format!("{:.2}", s.p95),
                format!("{:.2}", s.max),
            ]
        })
        .collect();

    Ok(ChartSpec::Table(TableSpec {
        title: format!("Price-to-income summary, {top_n} largest regions"),
        columns: ["Region", "N", "Mean", "Median", "Std", "P05", "P95", "Max"]
            .map(String::from)
            .to_vec(),
        rows,
        note: Some("All months on record".to_string()),
    }))
}

/// The narrative sequence, in reading order.
pub fn narrative(
    data: &AffordabilityData,
    geocodes: Option<&GeocodeTable>,
    settings: &Settings,
) -> PolarsResult<Vec<ChartSpec>> {
    let national = settings.national_region.as_str();
    let mut charts = vec![
        national_trend(data, national)?,
        region_affordability(data, national)?,
        size_comparison(data, settings)?,
        affordability_ranking(data, settings.ranking_rows)?,
        region_summary_table(data, settings.map_top_n)?,
    ];

    if let Some((_, last_year)) = data.year_range() {
        if let Some(geocodes) = geocodes.filter(|g| !g.is_empty()) {
            charts.push(year_bubble_map(data, geocodes, last_year, settings)?);
        }
        charts.push(year_histogram(
            data,
            last_year,
            settings.histogram_bin_width,
        )?);
    }
    Ok(charts)
}
