//! Static Chart Renderer
//! Renders chart specs to PNG bytes with plotters, for the report export.
//!
//! Layout per chart kind:
//! - Line: caption, mesh with fractional-year x axis, one line per series,
//!   gray reference lines, legend in the upper left
//! - Bubble map: longitude/latitude mesh, filled circles sized by value,
//!   region labels above each marker
//! - Histogram: adjacent bars on a count axis
//! - Table: header row, zebra-striped body, optional note

use super::spec::{
    min_max, palette_color, BubbleMap, ChartSpec, HistogramChart, LineChart, TableSpec,
};
use plotters::coord::Shift;
use plotters::prelude::*;
use rayon::prelude::*;
use std::io::Cursor;
use thiserror::Error;

const REFERENCE: RGBColor = RGBColor(120, 120, 120);
const STRIPE: RGBColor = RGBColor(242, 242, 242);

/// Continental US bounds, widened when a marker falls outside.
const MAP_LON: (f64, f64) = (-125.0, -66.0);
const MAP_LAT: (f64, f64) = (24.0, 50.0);

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Drawing failed: {0}")]
    Draw(String),
    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid image size {0}x{1}")]
    Size(u32, u32),
}

fn draw_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

fn rgb(c: [u8; 3]) -> RGBColor {
    RGBColor(c[0], c[1], c[2])
}

/// Widen a range by `pad` of its span; degenerate ranges get a unit span.
fn pad_range((lo, hi): (f64, f64), pad: f64) -> (f64, f64) {
    let span = hi - lo;
    if span <= f64::EPSILON {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo - span * pad, hi + span * pad)
    }
}

/// Relative column widths from the longest text in each column.
fn column_weights(table: &TableSpec) -> Vec<usize> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(i, header)| {
            table
                .rows
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(1)
                .clamp(4, 40)
        })
        .collect()
}

pub struct ChartRenderer;

impl ChartRenderer {
    /// Render one chart spec to an in-memory PNG.
    pub fn render_png(
        spec: &ChartSpec,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::Size(width, height));
        }

        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&WHITE).map_err(draw_err)?;

            if spec.is_empty() {
                Self::draw_placeholder(&root, spec.title())?;
            } else {
                match spec {
                    ChartSpec::Line(chart) => Self::draw_line_chart(&root, chart)?,
                    ChartSpec::BubbleMap(map) => Self::draw_bubble_map(&root, map)?,
                    ChartSpec::Histogram(hist) => Self::draw_histogram(&root, hist)?,
                    ChartSpec::Table(table) => Self::draw_table(&root, table)?,
                }
            }
            root.present().map_err(draw_err)?;
        }

        let image = image::RgbImage::from_raw(width, height, buffer)
            .ok_or(RenderError::Size(width, height))?;
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(bytes)
    }

    /// Render every spec in parallel, preserving order.
    pub fn render_all(
        specs: &[ChartSpec],
        width: u32,
        height: u32,
    ) -> Result<Vec<Vec<u8>>, RenderError> {
        specs
            .par_iter()
            .map(|spec| Self::render_png(spec, width, height))
            .collect()
    }

    fn draw_placeholder(root: &Area, title: &str) -> Result<(), RenderError> {
        let (w, h) = root.dim_in_pixel();
        let title_style = ("sans-serif", 26).into_font().color(&BLACK);
        root.draw_text(title, &title_style, (20, 20))
            .map_err(draw_err)?;
        let body = ("sans-serif", 20).into_font().color(&REFERENCE);
        root.draw_text(
            "No data for this selection",
            &body,
            (w as i32 / 2 - 120, h as i32 / 2),
        )
        .map_err(draw_err)?;
        Ok(())
    }

    fn draw_line_chart(root: &Area, chart: &LineChart) -> Result<(), RenderError> {
        let (x0, x1) = pad_range(chart.x_range().unwrap_or((0.0, 1.0)), 0.0);
        let (y0, y1) = pad_range(chart.value_range().unwrap_or((0.0, 1.0)), 0.1);

        let caption = match &chart.subtitle {
            Some(subtitle) => format!("{} ({})", chart.title, subtitle),
            None => chart.title.clone(),
        };

        let mut ctx = ChartBuilder::on(root)
            .caption(caption, ("sans-serif", 24))
            .margin(20)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(x0..x1, y0..y1)
            .map_err(draw_err)?;

        ctx.configure_mesh()
            .x_desc(chart.x_label.as_str())
            .y_desc(chart.y_label.as_str())
            .x_label_formatter(&|x| format!("{x:.0}"))
            .draw()
            .map_err(draw_err)?;

        for (i, series) in chart.series.iter().enumerate() {
            let color = rgb(palette_color(i));
            ctx.draw_series(LineSeries::new(
                series.points.iter().map(|p| (p.x(), p.value)),
                color.stroke_width(2),
            ))
            .map_err(draw_err)?
            .label(series.name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }

        for reference in &chart.reference_lines {
            ctx.draw_series(LineSeries::new(
                vec![(x0, reference.value), (x1, reference.value)],
                REFERENCE.stroke_width(1),
            ))
            .map_err(draw_err)?
            .label(reference.name.as_str())
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], REFERENCE.stroke_width(1)));
        }

        ctx.configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK.mix(0.4))
            .draw()
            .map_err(draw_err)?;
        Ok(())
    }

    fn draw_bubble_map(root: &Area, map: &BubbleMap) -> Result<(), RenderError> {
        let lon = min_max(map.markers.iter().map(|m| m.longitude))
            .map_or(MAP_LON, |(lo, hi)| (lo.min(MAP_LON.0), hi.max(MAP_LON.1)));
        let lat = min_max(map.markers.iter().map(|m| m.latitude))
            .map_or(MAP_LAT, |(lo, hi)| (lo.min(MAP_LAT.0), hi.max(MAP_LAT.1)));
        let (x0, x1) = pad_range(lon, 0.03);
        let (y0, y1) = pad_range(lat, 0.05);

        let mut ctx = ChartBuilder::on(root)
            .caption(&map.title, ("sans-serif", 24))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(x0..x1, y0..y1)
            .map_err(draw_err)?;

        ctx.configure_mesh()
            .x_desc("Longitude")
            .y_desc("Latitude")
            .light_line_style(WHITE)
            .draw()
            .map_err(draw_err)?;

        ctx.draw_series(map.markers.iter().map(|m| {
            Circle::new(
                (m.longitude, m.latitude),
                m.radius.round().max(1.0) as i32,
                rgb(m.color).mix(m.opacity.clamp(0.0, 1.0)).filled(),
            )
        }))
        .map_err(draw_err)?;

        ctx.draw_series(map.markers.iter().map(|m| {
            Text::new(
                format!("{} {:.1}", short_name(&m.region_name), m.value),
                (m.longitude, m.latitude),
                ("sans-serif", 12).into_font(),
            )
        }))
        .map_err(draw_err)?;
        Ok(())
    }

    fn draw_histogram(root: &Area, hist: &HistogramChart) -> Result<(), RenderError> {
        let x0 = hist.bins.first().map_or(0.0, |b| b.lower);
        let x1 = hist.bins.last().map_or(1.0, |b| b.upper);
        let y_max = hist.bins.iter().map(|b| b.count).max().unwrap_or(0) as f64 + 1.0;

        let mut ctx = ChartBuilder::on(root)
            .caption(&hist.title, ("sans-serif", 24))
            .margin(20)
            .x_label_area_size(45)
            .y_label_area_size(50)
            .build_cartesian_2d(x0..x1, 0.0..y_max)
            .map_err(draw_err)?;

        ctx.configure_mesh()
            .disable_x_mesh()
            .x_desc(hist.x_label.as_str())
            .y_desc("Regions")
            .draw()
            .map_err(draw_err)?;

        let color = rgb(palette_color(0));
        ctx.draw_series(hist.bins.iter().map(|b| {
            Rectangle::new(
                [(b.lower, 0.0), (b.upper, b.count as f64)],
                color.mix(0.75).filled(),
            )
        }))
        .map_err(draw_err)?;
        ctx.draw_series(hist.bins.iter().map(|b| {
            Rectangle::new([(b.lower, 0.0), (b.upper, b.count as f64)], WHITE.stroke_width(1))
        }))
        .map_err(draw_err)?;
        Ok(())
    }

    fn draw_table(root: &Area, table: &TableSpec) -> Result<(), RenderError> {
        let (w, h) = root.dim_in_pixel();
        let (w, h) = (w as i32, h as i32);
        let margin = 30;
        let row_h = 28;

        let title_style = ("sans-serif", 26).into_font().color(&BLACK);
        root.draw_text(&table.title, &title_style, (margin, 20))
            .map_err(draw_err)?;

        let weights = column_weights(table);
        let total: usize = weights.iter().sum::<usize>().max(1);
        let usable = w - 2 * margin;
        let mut xs = Vec::with_capacity(weights.len());
        let mut x = margin;
        for weight in &weights {
            xs.push(x);
            x += usable * *weight as i32 / total as i32;
        }

        let header_style = ("sans-serif", 16)
            .into_font()
            .style(FontStyle::Bold)
            .color(&BLACK);
        let cell_style = ("sans-serif", 15).into_font().color(&BLACK);

        let header_y = 75;
        for (column, x) in table.columns.iter().zip(&xs) {
            root.draw_text(column, &header_style, (*x + 4, header_y))
                .map_err(draw_err)?;
        }
        root.draw(&PathElement::new(
            vec![(margin, header_y + row_h - 4), (w - margin, header_y + row_h - 4)],
            BLACK.stroke_width(1),
        ))
        .map_err(draw_err)?;

        let body_top = header_y + row_h + 4;
        let capacity = ((h - body_top - 50) / row_h).max(0) as usize;
        for (i, row) in table.rows.iter().take(capacity).enumerate() {
            let y = body_top + i as i32 * row_h;
            if i % 2 == 0 {
                root.draw(&Rectangle::new(
                    [(margin, y - 4), (w - margin, y + row_h - 4)],
                    STRIPE.filled(),
                ))
                .map_err(draw_err)?;
            }
            for (cell, x) in row.iter().zip(&xs) {
                root.draw_text(cell, &cell_style, (*x + 4, y))
                    .map_err(draw_err)?;
            }
        }

        let note_style = ("sans-serif", 13).into_font().color(&REFERENCE);
        let mut footer = Vec::new();
        if table.rows.len() > capacity {
            footer.push(format!("{} more rows not shown", table.rows.len() - capacity));
        }
        if let Some(note) = &table.note {
            footer.push(note.clone());
        }
        if !footer.is_empty() {
            root.draw_text(&footer.join(" | "), &note_style, (margin, h - 35))
                .map_err(draw_err)?;
        }
        Ok(())
    }
}

/// Metro name without the state suffix, for map labels.
fn short_name(region: &str) -> &str {
    region.split(',').next().unwrap_or(region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::views;
    use crate::config::Settings;
    use crate::data::{fixtures, GeocodeTable};
    use polars::prelude::*;

    fn geocodes() -> GeocodeTable {
        let df = df!(
            "region_name" => ["New York, NY", "Chicago, IL"],
            "latitude" => [40.71, 41.88],
            "longitude" => [-74.0, -87.63]
        )
        .unwrap();
        GeocodeTable::from_frame(&df).unwrap()
    }

    fn assert_png(png: &[u8], width: u32, height: u32) {
        assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));
        let image = image::load_from_memory(png).unwrap();
        assert_eq!((image.width(), image.height()), (width, height));
    }

    #[test]
    fn renders_every_chart_kind() {
        let data = fixtures::data();
        let settings = Settings::default();
        let charts = vec![
            views::national_trend(&data, "United States").unwrap(),
            views::region_affordability(&data, "Chicago, IL").unwrap(),
            views::year_bubble_map(&data, &geocodes(), 2018, &settings).unwrap(),
            views::year_histogram(&data, 2018, 0.5).unwrap(),
            views::affordability_ranking(&data, 3).unwrap(),
        ];
        assert!(charts.iter().all(|c| !c.is_empty()));

        for chart in &charts {
            let png = ChartRenderer::render_png(chart, 640, 400).unwrap();
            assert_png(&png, 640, 400);
        }
    }

    #[test]
    fn empty_chart_renders_placeholder() {
        let data = fixtures::data();
        let chart = views::year_histogram(&data, 1950, 0.5).unwrap();
        assert!(chart.is_empty());
        let png = ChartRenderer::render_png(&chart, 320, 200).unwrap();
        assert_png(&png, 320, 200);
    }

    #[test]
    fn render_all_keeps_order() {
        let data = fixtures::data();
        let charts = views::narrative(&data, None, &Settings::default()).unwrap();
        let pngs = ChartRenderer::render_all(&charts, 400, 300).unwrap();
        assert_eq!(pngs.len(), charts.len());
        for png in &pngs {
            assert_png(png, 400, 300);
        }
    }

    #[test]
    fn pads_degenerate_ranges() {
        assert_eq!(pad_range((2.0, 2.0), 0.1), (1.5, 2.5));
        let (lo, hi) = pad_range((0.0, 10.0), 0.1);
        assert!((lo + 1.0).abs() < 1e-12 && (hi - 11.0).abs() < 1e-12);
    }

    #[test]
    fn weights_follow_longest_cell() {
        let table = TableSpec {
            title: "t".into(),
            columns: vec!["Region".into(), "N".into()],
            rows: vec![vec!["Los Angeles-Long Beach-Anaheim, CA".into(), "12".into()]],
            note: None,
        };
        assert_eq!(column_weights(&table), vec![34, 4]);
    }

    #[test]
    fn map_labels_drop_state() {
        assert_eq!(short_name("Chicago, IL"), "Chicago");
        assert_eq!(short_name("United States"), "United States");
    }

    #[test]
    fn zero_size_is_rejected() {
        let spec = ChartSpec::Table(TableSpec {
            title: "t".into(),
            columns: vec![],
            rows: vec![],
            note: None,
        });
        assert!(matches!(
            ChartRenderer::render_png(&spec, 0, 10),
            Err(RenderError::Size(0, 10))
        ));
    }
}
