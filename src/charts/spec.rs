//! Chart Specification Module
//! Renderer-independent description of every chart the views produce.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// A chart ready to draw, interactively or to an image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartSpec {
    Line(LineChart),
    BubbleMap(BubbleMap),
    Histogram(HistogramChart),
    Table(TableSpec),
}

impl ChartSpec {
    pub fn title(&self) -> &str {
        match self {
            ChartSpec::Line(c) => &c.title,
            ChartSpec::BubbleMap(c) => &c.title,
            ChartSpec::Histogram(c) => &c.title,
            ChartSpec::Table(c) => &c.title,
        }
    }

    /// True when there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        match self {
            ChartSpec::Line(c) => c.series.iter().all(|s| s.points.is_empty()),
            ChartSpec::BubbleMap(c) => c.markers.is_empty(),
            ChartSpec::Histogram(c) => c.bins.is_empty(),
            ChartSpec::Table(c) => c.rows.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimePoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl TimePoint {
    /// Position on a continuous time axis, in fractional years.
    pub fn x(&self) -> f64 {
        decimal_year(self.date)
    }
}

pub fn decimal_year(date: NaiveDate) -> f64 {
    date.year() as f64 + date.month0() as f64 / 12.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub name: String,
    pub points: Vec<TimePoint>,
}

/// Horizontal line drawn across the whole time axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceLine {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineChart {
    pub title: String,
    pub subtitle: Option<String>,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<TrendSeries>,
    pub reference_lines: Vec<ReferenceLine>,
}

impl LineChart {
    /// (min, max) over every point and reference line.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let values = self
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.value))
            .chain(self.reference_lines.iter().map(|r| r.value));
        min_max(values)
    }

    pub fn x_range(&self) -> Option<(f64, f64)> {
        min_max(
            self.series
                .iter()
                .flat_map(|s| s.points.iter().map(TimePoint::x)),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BubbleMarker {
    pub region_name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Yearly average price-to-income, unscaled.
    pub value: f64,
    /// Screen radius in pixels.
    pub radius: f64,
    pub opacity: f64,
    pub color: [u8; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BubbleMap {
    pub title: String,
    pub year: i32,
    pub markers: Vec<BubbleMarker>,
    /// Value domain of the color ramp, shared by every year.
    pub color_domain: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramChart {
    pub title: String,
    pub year: i32,
    pub x_label: String,
    pub bin_width: f64,
    pub bins: Vec<HistogramBin>,
}

impl HistogramChart {
    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSpec {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub note: Option<String>,
}

/// Series palette shared by the interactive and static renderers.
pub const PALETTE: [[u8; 3]; 6] = [
    [31, 119, 180],
    [214, 39, 40],
    [44, 160, 44],
    [255, 127, 14],
    [148, 103, 189],
    [140, 86, 75],
];

pub fn palette_color(index: usize) -> [u8; 3] {
    PALETTE[index % PALETTE.len()]
}

const RAMP_LOW: [u8; 3] = [255, 237, 160];
const RAMP_HIGH: [u8; 3] = [189, 0, 38];

/// Linear yellow-to-red ramp over `domain`; values outside are clamped.
pub fn ramp_color(value: f64, domain: (f64, f64)) -> [u8; 3] {
    let (lo, hi) = domain;
    let t = if hi > lo {
        ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
    } else {
        0.5
    };
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    [
        mix(RAMP_LOW[0], RAMP_HIGH[0]),
        mix(RAMP_LOW[1], RAMP_HIGH[1]),
        mix(RAMP_LOW[2], RAMP_HIGH[2]),
    ]
}

pub(crate) fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.filter(|v| v.is_finite()).fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_year_uses_month_start() {
        let d = NaiveDate::from_ymd_opt(1979, 3, 1).unwrap();
        assert!((decimal_year(d) - (1979.0 + 2.0 / 12.0)).abs() < 1e-12);
    }

    #[test]
    fn ramp_clamps_to_domain() {
        assert_eq!(ramp_color(-1.0, (2.0, 6.0)), RAMP_LOW);
        assert_eq!(ramp_color(10.0, (2.0, 6.0)), RAMP_HIGH);
        let mid = ramp_color(4.0, (2.0, 6.0));
        assert!(mid[1] < RAMP_LOW[1] && mid[1] > RAMP_HIGH[1]);
    }

    #[test]
    fn serializes_with_kind_tag() {
        let spec = ChartSpec::Table(TableSpec {
            title: "t".into(),
            columns: vec!["a".into()],
            rows: vec![],
            note: None,
        });
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["kind"], "table");
        assert!(spec.is_empty());
    }
}
