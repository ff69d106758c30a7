//! Chart Viewer Widget
//! Central scrollable panel: the narrative charts followed by the four
//! interactive widget cards.

use super::control_panel::WidgetInputs;
use crate::charts::{views, ChartPlotter, ChartSpec};
use crate::config::Settings;
use crate::data::{AffordabilityData, GeocodeTable};
use egui::{Color32, RichText, ScrollArea};
use log::debug;
use polars::prelude::PolarsResult;

const CHART_SPACING: f32 = 15.0;
const CHART_HEIGHT: f32 = 320.0;
const CARD_WIDTH: f32 = 900.0;

/// Charts for the current dataset and widget inputs.
#[derive(Default)]
pub struct ChartViewer {
    pub narrative: Vec<ChartSpec>,
    pub trend: Option<ChartSpec>,
    pub affordability: Option<ChartSpec>,
    pub bubble_map: Option<ChartSpec>,
    pub histogram: Option<ChartSpec>,
    /// Inputs the widget charts were last computed for.
    inputs: Option<WidgetInputs>,
    pub error: Option<String>,
}

impl ChartViewer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all charts
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Rebuild the narrative and force the widgets to recompute.
    pub fn set_dataset(
        &mut self,
        data: &AffordabilityData,
        geocodes: Option<&GeocodeTable>,
        settings: &Settings,
    ) {
        self.clear();
        match views::narrative(data, geocodes, settings) {
            Ok(charts) => self.narrative = charts,
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    /// Recompute the widgets whose inputs changed since the last call.
    pub fn refresh(
        &mut self,
        data: &AffordabilityData,
        geocodes: Option<&GeocodeTable>,
        settings: &Settings,
        inputs: &WidgetInputs,
    ) {
        if self.inputs.as_ref() == Some(inputs) {
            return;
        }
        let previous = self.inputs.take().unwrap_or_default();
        if let Err(e) = self.recompute(data, geocodes, settings, inputs, &previous) {
            self.error = Some(e.to_string());
        }
        self.inputs = Some(inputs.clone());
    }

    fn recompute(
        &mut self,
        data: &AffordabilityData,
        geocodes: Option<&GeocodeTable>,
        settings: &Settings,
        inputs: &WidgetInputs,
        previous: &WidgetInputs,
    ) -> PolarsResult<()> {
        if self.trend.is_none() || inputs.trend_regions != previous.trend_regions {
            debug!("Recomputing trend for {:?}", inputs.trend_regions);
            self.trend = Some(views::region_trend(
                data,
                &inputs.trend_regions,
                settings.max_trend_regions,
            )?);
        }

        if self.affordability.is_none() || inputs.region != previous.region {
            self.affordability = Some(views::region_affordability(data, &inputs.region)?);
        }

        if self.histogram.is_none() || inputs.histogram_year != previous.histogram_year {
            self.histogram = match inputs.histogram_year {
                Some(year) => Some(views::year_histogram(
                    data,
                    year,
                    settings.histogram_bin_width,
                )?),
                None => None,
            };
        }

        let geocodes = geocodes.filter(|g| !g.is_empty());
        if self.bubble_map.is_none() || inputs.map_year != previous.map_year {
            self.bubble_map = match (inputs.map_year, geocodes) {
                (Some(year), Some(geocodes)) => {
                    Some(views::year_bubble_map(data, geocodes, year, settings)?)
                }
                _ => None,
            };
        }
        Ok(())
    }

    /// Narrative followed by the widget charts, in display order.
    pub fn all_charts(&self) -> Vec<ChartSpec> {
        self.narrative
            .iter()
            .chain(
                [
                    &self.trend,
                    &self.affordability,
                    &self.bubble_map,
                    &self.histogram,
                ]
                .into_iter()
                .flatten(),
            )
            .cloned()
            .collect()
    }

    /// Draw the narrative and widget cards
    pub fn show(&mut self, ui: &mut egui::Ui) {
        if self.narrative.is_empty() && self.trend.is_none() {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("No Data").size(20.0));
            });
            return;
        }

        ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                if let Some(error) = &self.error {
                    ui.label(
                        RichText::new(format!("Error: {error}"))
                            .color(Color32::from_rgb(220, 53, 69)),
                    );
                    ui.add_space(CHART_SPACING);
                }

                ui.heading("Housing affordability");
                ui.add_space(CHART_SPACING);
                for (i, chart) in self.narrative.iter().enumerate() {
                    Self::draw_card(ui, &format!("narrative_{i}"), chart);
                    ui.add_space(CHART_SPACING);
                }

                ui.separator();
                ui.heading("Explore");
                ui.add_space(CHART_SPACING);
                for (id, chart) in [
                    ("trend", &self.trend),
                    ("affordability", &self.affordability),
                    ("bubble_map", &self.bubble_map),
                    ("histogram", &self.histogram),
                ] {
                    match chart {
                        Some(chart) => Self::draw_card(ui, id, chart),
                        None if id == "bubble_map" => {
                            ui.label(
                                RichText::new("Load a geocode file to show the map")
                                    .color(Color32::GRAY),
                            );
                        }
                        None => {}
                    }
                    ui.add_space(CHART_SPACING);
                }
            });
    }

    fn draw_card(ui: &mut egui::Ui, id: &str, chart: &ChartSpec) {
        let card_width = CARD_WIDTH.min(ui.available_width() - 20.0);
        egui::Frame::none()
            .rounding(8.0)
            .stroke(egui::Stroke::new(1.0, Color32::from_rgb(100, 149, 237)))
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .inner_margin(12.0)
            .show(ui, |ui| {
                ui.set_width(card_width);
                ui.label(RichText::new(chart.title()).size(16.0).strong());
                ui.add_space(6.0);
                ChartPlotter::draw(ui, id, chart, CHART_HEIGHT);
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures;
    use polars::prelude::*;

    fn inputs(map_year: i32, histogram_year: i32) -> WidgetInputs {
        WidgetInputs {
            trend_regions: vec!["New York, NY".into()],
            region: "Chicago, IL".into(),
            map_year: Some(map_year),
            histogram_year: Some(histogram_year),
        }
    }

    fn geocodes() -> GeocodeTable {
        let df = df!(
            "region_name" => ["New York, NY", "Los Angeles-Long Beach-Anaheim, CA"],
            "latitude" => [40.71, 34.05],
            "longitude" => [-74.0, -118.24]
        )
        .unwrap();
        GeocodeTable::from_frame(&df).unwrap()
    }

    fn map_year(viewer: &ChartViewer) -> i32 {
        match &viewer.bubble_map {
            Some(ChartSpec::BubbleMap(map)) => map.year,
            other => panic!("expected bubble map, got {other:?}"),
        }
    }

    fn histogram_year(viewer: &ChartViewer) -> i32 {
        match &viewer.histogram {
            Some(ChartSpec::Histogram(hist)) => hist.year,
            other => panic!("expected histogram, got {other:?}"),
        }
    }

    #[test]
    fn widgets_follow_inputs() {
        let data = fixtures::data();
        let settings = Settings::default();
        let mut viewer = ChartViewer::new();
        viewer.set_dataset(&data, None, &settings);
        assert_eq!(viewer.narrative.len(), 6);

        viewer.refresh(&data, None, &settings, &inputs(2017, 2017));
        assert_eq!(histogram_year(&viewer), 2017);
        assert!(viewer.bubble_map.is_none());
        assert_eq!(viewer.all_charts().len(), 9);

        viewer.refresh(&data, None, &settings, &inputs(2017, 2018));
        assert_eq!(histogram_year(&viewer), 2018);
        assert!(viewer.error.is_none());
    }

    #[test]
    fn map_and_histogram_years_are_independent() {
        let data = fixtures::data();
        let geocodes = geocodes();
        let settings = Settings::default();
        let mut viewer = ChartViewer::new();
        viewer.set_dataset(&data, Some(&geocodes), &settings);

        viewer.refresh(&data, Some(&geocodes), &settings, &inputs(2017, 2017));
        let map_before = viewer.bubble_map.clone();
        assert_eq!(map_year(&viewer), 2017);

        viewer.refresh(&data, Some(&geocodes), &settings, &inputs(2017, 2018));
        assert_eq!(histogram_year(&viewer), 2018);
        assert_eq!(viewer.bubble_map, map_before);

        let histogram_before = viewer.histogram.clone();
        viewer.refresh(&data, Some(&geocodes), &settings, &inputs(2018, 2018));
        assert_eq!(map_year(&viewer), 2018);
        assert_eq!(viewer.histogram, histogram_before);
    }

    #[test]
    fn empty_geocode_table_hides_the_map() {
        let data = fixtures::data();
        let empty = GeocodeTable::from_frame(&geocodes_frame_without_rows()).unwrap();
        assert!(empty.is_empty());
        let settings = Settings::default();
        let mut viewer = ChartViewer::new();
        viewer.set_dataset(&data, Some(&empty), &settings);
        assert_eq!(viewer.narrative.len(), 6);

        viewer.refresh(&data, Some(&empty), &settings, &inputs(2017, 2017));
        assert!(viewer.bubble_map.is_none());
        assert!(viewer.histogram.is_some());
    }

    fn geocodes_frame_without_rows() -> DataFrame {
        df!(
            "region_name" => Vec::<String>::new(),
            "latitude" => Vec::<f64>::new(),
            "longitude" => Vec::<f64>::new()
        )
        .unwrap()
    }
}
