//! Chart Plotter Module
//! Draws chart specs interactively using egui_plot.

use super::spec::{palette_color, BubbleMap, ChartSpec, HistogramChart, LineChart, TableSpec};
use egui::{Color32, RichText};
use egui_plot::{Bar, BarChart, HLine, Legend, Line, Plot, PlotPoint, PlotPoints, Points, Text};

pub const REFERENCE_COLOR: Color32 = Color32::from_rgb(120, 120, 120);

/// Draws chart specs with egui_plot.
pub struct ChartPlotter;

impl ChartPlotter {
    pub fn color(rgb: [u8; 3]) -> Color32 {
        Color32::from_rgb(rgb[0], rgb[1], rgb[2])
    }

    /// Draw any chart spec; empty charts show a placeholder.
    pub fn draw(ui: &mut egui::Ui, id: &str, spec: &ChartSpec, height: f32) {
        if spec.is_empty() {
            ui.add_sized(
                [ui.available_width(), height.min(80.0)],
                egui::Label::new(RichText::new("No data for this selection").color(Color32::GRAY)),
            );
            return;
        }

        match spec {
            ChartSpec::Line(chart) => Self::draw_line_chart(ui, id, chart, height),
            ChartSpec::BubbleMap(map) => Self::draw_bubble_map(ui, id, map, height),
            ChartSpec::Histogram(hist) => Self::draw_histogram(ui, id, hist, height),
            ChartSpec::Table(table) => Self::draw_table(ui, id, table),
        }
    }

    /// Multi-series line chart; x axis in fractional years.
    pub fn draw_line_chart(ui: &mut egui::Ui, id: &str, chart: &LineChart, height: f32) {
        if let Some(subtitle) = &chart.subtitle {
            ui.label(RichText::new(subtitle).size(12.0).color(Color32::GRAY));
        }

        Plot::new(format!("line_{id}"))
            .height(height)
            .legend(Legend::default())
            .x_axis_label(chart.x_label.clone())
            .y_axis_label(chart.y_label.clone())
            .allow_scroll(false)
            .x_axis_formatter(|mark, _range| format!("{:.0}", mark.value))
            .label_formatter(|name, value| {
                let (year, month) = hover_date(value.x);
                if name.is_empty() {
                    format!("{year}-{month:02}\n{:.2}", value.y)
                } else {
                    format!("{name}\n{year}-{month:02}\n{:.2}", value.y)
                }
            })
            .show(ui, |plot_ui| {
                for (i, series) in chart.series.iter().enumerate() {
                    let points: PlotPoints = series.points.iter().map(|p| [p.x(), p.value]).collect();
                    plot_ui.line(
                        Line::new(points)
                            .color(Self::color(palette_color(i)))
                            .width(2.0)
                            .name(&series.name),
                    );
                }

                for reference in &chart.reference_lines {
                    plot_ui.hline(
                        HLine::new(reference.value)
                            .color(REFERENCE_COLOR)
                            .style(egui_plot::LineStyle::dashed_loose())
                            .name(&reference.name),
                    );
                }
            });
    }

    /// Bubble map: markers at (longitude, latitude) with equal axis scaling.
    pub fn draw_bubble_map(ui: &mut egui::Ui, id: &str, map: &BubbleMap, height: f32) {
        if let Some((lo, hi)) = map.color_domain {
            ui.label(
                RichText::new(format!("Color scale {lo:.1} - {hi:.1}, radius grows with ratio"))
                    .size(12.0)
                    .color(Color32::GRAY),
            );
        }

        Plot::new(format!("map_{id}"))
            .height(height)
            .data_aspect(1.0)
            .x_axis_label("Longitude")
            .y_axis_label("Latitude")
            .allow_scroll(false)
            .include_x(-125.0)
            .include_x(-66.0)
            .include_y(24.0)
            .include_y(50.0)
            .show(ui, |plot_ui| {
                for marker in &map.markers {
                    let rgb = marker.color;
                    let fill = Color32::from_rgba_unmultiplied(
                        rgb[0],
                        rgb[1],
                        rgb[2],
                        (marker.opacity.clamp(0.0, 1.0) * 255.0) as u8,
                    );
                    plot_ui.points(
                        Points::new(vec![[marker.longitude, marker.latitude]])
                            .radius(marker.radius as f32)
                            .filled(true)
                            .color(fill)
                            .name(format!("{}: {:.2}", marker.region_name, marker.value)),
                    );
                    plot_ui.text(
                        Text::new(
                            PlotPoint::new(marker.longitude, marker.latitude),
                            RichText::new(format!("{:.1}", marker.value)).size(10.0),
                        )
                        .color(Color32::BLACK),
                    );
                }
            });
    }

    /// Histogram as adjacent bars.
    pub fn draw_histogram(ui: &mut egui::Ui, id: &str, hist: &HistogramChart, height: f32) {
        ui.label(
            RichText::new(format!("{} regions", hist.total()))
                .size(12.0)
                .color(Color32::GRAY),
        );

        let bars: Vec<Bar> = hist
            .bins
            .iter()
            .map(|b| {
                Bar::new((b.lower + b.upper) / 2.0, b.count as f64)
                    .width(hist.bin_width)
                    .name(format!("{:.2} - {:.2}", b.lower, b.upper))
            })
            .collect();

        Plot::new(format!("hist_{id}"))
            .height(height)
            .x_axis_label(hist.x_label.clone())
            .y_axis_label("Regions")
            .allow_scroll(false)
            .include_y(0.0)
            .show(ui, |plot_ui| {
                plot_ui.bar_chart(
                    BarChart::new(bars)
                        .color(Self::color(palette_color(0)))
                        .name(format!("{}", hist.year)),
                );
            });
    }

    /// Draw a table spec as a striped grid.
    pub fn draw_table(ui: &mut egui::Ui, id: &str, table: &TableSpec) {
        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                egui::Grid::new(ui.make_persistent_id(format!("table_{id}")))
                    .striped(true)
                    .min_col_width(55.0)
                    .spacing([12.0, 4.0])
                    .show(ui, |ui| {
                        for column in &table.columns {
                            ui.label(RichText::new(column).strong().size(12.0));
                        }
                        ui.end_row();

                        for row in &table.rows {
                            for cell in row {
                                ui.label(RichText::new(cell).size(12.0));
                            }
                            ui.end_row();
                        }
                    });

                if let Some(note) = &table.note {
                    ui.add_space(4.0);
                    ui.label(RichText::new(note).size(11.0).color(Color32::GRAY));
                }
            });
    }
}

/// Year and month (1..=12) under a fractional-year cursor position.
fn hover_date(x: f64) -> (i32, u32) {
    let year = x.floor();
    let month = ((x - year) * 12.0 + 1e-6).floor().clamp(0.0, 11.0) as u32 + 1;
    (year as i32, month)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::spec::decimal_year;
    use chrono::NaiveDate;

    #[test]
    fn hover_month_stays_in_range() {
        assert_eq!(hover_date(1979.0), (1979, 1));
        assert_eq!(hover_date(1979.97), (1979, 12));
        assert_eq!(hover_date(1979.999_999), (1979, 12));
        assert_eq!(hover_date(1979.5), (1979, 7));
    }

    #[test]
    fn hover_matches_point_month() {
        for month in 1..=12 {
            let date = NaiveDate::from_ymd_opt(2018, month, 1).unwrap();
            assert_eq!(hover_date(decimal_year(date)), (2018, month));
        }
    }
}
