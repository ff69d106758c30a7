//! Control Panel Widget
//! Left side panel with file pickers, widget inputs and the export button.

use egui::{Color32, ComboBox, RichText, ScrollArea};
use std::path::PathBuf;
use std::time::Duration;

/// Inputs of the four interactive widgets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetInputs {
    pub trend_regions: Vec<String>,
    pub region: String,
    pub map_year: Option<i32>,
    pub histogram_year: Option<i32>,
}

/// Year after `year` in `range`, wrapping back to the first year.
pub fn next_year(year: i32, (first, last): (i32, i32)) -> i32 {
    if year >= last || year < first {
        first
    } else {
        year + 1
    }
}

/// Year slider with its own play/pause animation.
#[derive(Debug, Clone, Default)]
pub struct YearPlayer {
    pub year: i32,
    pub playing: bool,
    last_step: f64,
}

impl YearPlayer {
    fn reset(&mut self, year_range: Option<(i32, i32)>) {
        self.map_year.reset(year_range);
        self.histogram_year.reset(year_range);
    }

    /// Step to the next year once `interval` has elapsed since the last step.
    pub fn tick(&mut self, now: f64, range: (i32, i32), interval: Duration) -> bool {
        if !self.playing || now - self.last_step < interval.as_secs_f64() {
            return false;
        }
        self.year = next_year(self.year, range);
        self.last_step = now;
        true
    }

    fn show(&mut self, ui: &mut egui::Ui, label: &str, (first, last): (i32, i32)) {
        ui.horizontal(|ui| {
            ui.label(label);
            let button = if self.playing { "⏸ Pause" } else { "▶ Play" };
            if ui.button(button).clicked() {
                self.playing = !self.playing;
                self.last_step = ui.input(|i| i.time);
            }
            ui.add(egui::Slider::new(&mut self.year, first..=last).integer());
        });
    }
}

/// Left side control panel with file selection and widget controls.
pub struct ControlPanel {
    pub data_path: Option<PathBuf>,
    pub geocode_path: Option<PathBuf>,
    pub region_names: Vec<String>,
    pub selected_regions: Vec<String>,
    pub single_region: String,
    pub region_search: String,
    pub year_range: Option<(i32, i32)>,
    pub map_year: YearPlayer,
    pub histogram_year: YearPlayer,
    pub max_trend_regions: usize,
    pub animation_interval: Duration,
    pub progress: f32,
    pub status: String,
    pub export_enabled: bool,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self {
            data_path: None,
            geocode_path: None,
            region_names: Vec::new(),
            selected_regions: Vec::new(),
            single_region: String::new(),
            region_search: String::new(),
            year_range: None,
            map_year: YearPlayer::default(),
            histogram_year: YearPlayer::default(),
            max_trend_regions: 3,
            animation_interval: Duration::from_millis(800),
            progress: 0.0,
            status: "Ready".to_string(),
            export_enabled: false,
        }
    }
}

impl ControlPanel {
    pub fn new(max_trend_regions: usize, animation_interval: Duration) -> Self {
        Self {
            max_trend_regions,
            animation_interval,
            ..Self::default()
        }
    }

    /// Reset the pickers for a newly loaded dataset.
    pub fn update_regions(
        &mut self,
        region_names: Vec<String>,
        default_region: &str,
        year_range: Option<(i32, i32)>,
    ) {
        let fallback = region_names.first().cloned().unwrap_or_default();
        self.single_region = if region_names.iter().any(|r| r == default_region) {
            default_region.to_string()
        } else {
            fallback.clone()
        };
        self.selected_regions = if fallback.is_empty() {
            Vec::new()
        } else {
            vec![self.single_region.clone()]
        };
        self.region_names = region_names;
        self.year_range = year_range;
        self.map_year.reset(year_range);
        self.histogram_year.reset(year_range);
        self.export_enabled = !self.region_names.is_empty();
    }

    /// Add or remove a region from the trend selection.
    /// Returns false when the selection is already full.
    pub fn toggle_region(&mut self, region: &str) -> bool {
        if let Some(pos) = self.selected_regions.iter().position(|r| r == region) {
            self.selected_regions.remove(pos);
            return true;
        }
        if self.selected_regions.len() >= self.max_trend_regions {
            self.status = format!("At most {} regions can be compared", self.max_trend_regions);
            return false;
        }
        self.selected_regions.push(region.to_string());
        true
    }

    pub fn inputs(&self) -> WidgetInputs {
        WidgetInputs {
            trend_regions: self.selected_regions.clone(),
            region: self.single_region.clone(),
            map_year: self.year_range.map(|_| self.map_year.year),
            histogram_year: self.year_range.map(|_| self.histogram_year.year),
        }
    }

    fn is_playing(&self) -> bool {
        self.map_year.playing || self.histogram_year.playing
    }

    /// Advance each playing year slider independently.
    pub fn tick(&mut self, now: f64) -> bool {
        let Some(range) = self.year_range else {
            return false;
        };
        let map = self.map_year.tick(now, range, self.animation_interval);
        let histogram = self.histogram_year.tick(now, range, self.animation_interval);
        map || histogram
    }

    /// Draw the control panel
    pub fn show(&mut self, ui: &mut egui::Ui) -> ControlPanelAction {
        let mut action = ControlPanelAction::None;

        if self.is_playing() {
            let now = ui.input(|i| i.time);
            self.tick(now);
            ui.ctx().request_repaint_after(self.animation_interval);
        }

        // Title
        ui.vertical_centered(|ui| {
            ui.add_space(5.0);
            ui.label(
                RichText::new("🏠 Affordability Explorer")
                    .size(20.0)
                    .color(Color32::from_rgb(100, 149, 237)),
            );
            ui.label(
                RichText::new("Price to income, mortgage and rent")
                    .size(11.0)
                    .color(Color32::GRAY),
            );
        });
        ui.add_space(10.0);
        ui.separator();
        ui.add_space(5.0);

        // ===== Data Source Section =====
        ui.label(RichText::new("📁 Data Source").size(14.0).strong());
        ui.add_space(5.0);

        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                if Self::file_row(ui, "Data", self.data_path.as_ref()) {
                    action = ControlPanelAction::BrowseData;
                }
                ui.add_space(4.0);
                if Self::file_row(ui, "Geocodes", self.geocode_path.as_ref()) {
                    action = ControlPanelAction::BrowseGeocodes;
                }
            });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Region Section =====
        ui.label(RichText::new("📍 Regions").size(14.0).strong());
        ui.add_space(5.0);

        ui.label(format!(
            "Trend comparison ({}/{}):",
            self.selected_regions.len(),
            self.max_trend_regions
        ));
        ui.horizontal_wrapped(|ui| {
            let mut removed = None;
            for region in &self.selected_regions {
                if ui.small_button(format!("✕ {region}")).clicked() {
                    removed = Some(region.clone());
                }
            }
            if let Some(region) = removed {
                self.toggle_region(&region);
            }
        });

        ui.add(egui::TextEdit::singleline(&mut self.region_search).hint_text("Search regions"));
        let needle = self.region_search.to_lowercase();
        let mut toggled = None;
        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(5.0)
            .show(ui, |ui| {
                ScrollArea::vertical()
                    .id_salt("region_list")
                    .max_height(140.0)
                    .show(ui, |ui| {
                        for region in self
                            .region_names
                            .iter()
                            .filter(|r| needle.is_empty() || r.to_lowercase().contains(&needle))
                        {
                            let selected = self.selected_regions.contains(region);
                            if ui.selectable_label(selected, region).clicked() {
                                toggled = Some(region.clone());
                            }
                        }
                    });
            });
        if let Some(region) = toggled {
            self.toggle_region(&region);
        }

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            ui.label("Affordability:");
            ComboBox::from_id_salt("single_region")
                .width(180.0)
                .selected_text(&self.single_region)
                .show_ui(ui, |ui| {
                    for region in &self.region_names {
                        ui.selectable_value(&mut self.single_region, region.clone(), region);
                    }
                });
        });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Year Section =====
        ui.label(RichText::new("📅 Years").size(14.0).strong());
        ui.add_space(5.0);

        match self.year_range {
            Some(range) => {
                self.map_year.show(ui, "Map:", range);
                ui.add_space(4.0);
                self.histogram_year.show(ui, "Histogram:", range);
            }
            None => {
                ui.label(RichText::new("Load data to pick a year").color(Color32::GRAY));
            }
        }

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Action Buttons =====
        ui.vertical_centered(|ui| {
            ui.add_enabled_ui(self.export_enabled, |ui| {
                let button = egui::Button::new(RichText::new("📄 Export Report").size(14.0))
                    .min_size(egui::vec2(150.0, 30.0));
                if ui.add(button).clicked() {
                    action = ControlPanelAction::ExportReport;
                }
            });
        });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Progress Section =====
        ui.label(RichText::new("📊 Progress").size(14.0).strong());
        ui.add_space(5.0);

        ui.add(
            egui::ProgressBar::new(self.progress / 100.0)
                .show_percentage()
                .animate(self.progress > 0.0 && self.progress < 100.0),
        );

        ui.add_space(5.0);

        let status_color = if self.status.contains("Error") {
            Color32::from_rgb(220, 53, 69)
        } else if self.status.contains("Complete") || self.status.contains("exported") {
            Color32::from_rgb(40, 167, 69)
        } else {
            Color32::GRAY
        };
        ui.label(RichText::new(&self.status).size(11.0).color(status_color));

        action
    }

    /// One file picker row; returns true when Browse was clicked.
    fn file_row(ui: &mut egui::Ui, label: &str, path: Option<&PathBuf>) -> bool {
        let mut clicked = false;
        ui.horizontal(|ui| {
            let path_text = path
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "No file selected".to_string());

            ui.label(RichText::new(format!("{label}:")).size(12.0).strong());
            ui.label(RichText::new(&path_text).size(12.0).color(if path.is_some() {
                Color32::WHITE
            } else {
                Color32::GRAY
            }));

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("📂 Browse").clicked() {
                    clicked = true;
                }
            });
        });
        clicked
    }

    /// Set progress and status
    pub fn set_progress(&mut self, progress: f32, status: &str) {
        self.progress = progress;
        self.status = status.to_string();
    }
}

/// Actions triggered by control panel
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPanelAction {
    None,
    BrowseData,
    BrowseGeocodes,
    ExportReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> ControlPanel {
        let mut panel = ControlPanel::new(3, Duration::from_millis(500));
        panel.update_regions(
            vec![
                "United States".into(),
                "New York, NY".into(),
                "Chicago, IL".into(),
                "Dayton, OH".into(),
            ],
            "United States",
            Some((2016, 2018)),
        );
        panel
    }

    #[test]
    fn year_wraps_after_last() {
        assert_eq!(next_year(2016, (2016, 2018)), 2017);
        assert_eq!(next_year(2018, (2016, 2018)), 2016);
        assert_eq!(next_year(1900, (2016, 2018)), 2016);
    }

    #[test]
    fn selection_is_capped() {
        let mut panel = panel();
        assert_eq!(panel.selected_regions, vec!["United States"]);
        assert!(panel.toggle_region("New York, NY"));
        assert!(panel.toggle_region("Chicago, IL"));
        assert!(!panel.toggle_region("Dayton, OH"));
        assert_eq!(panel.selected_regions.len(), 3);
        assert!(panel.toggle_region("United States"));
        assert!(panel.toggle_region("Dayton, OH"));
        assert_eq!(
            panel.inputs().trend_regions,
            vec!["New York, NY", "Chicago, IL", "Dayton, OH"]
        );
    }

    #[test]
    fn animation_steps_on_interval() {
        let mut panel = panel();
        assert!(!panel.tick(10.0));
        panel.map_year.playing = true;
        assert!(panel.tick(10.0));
        assert_eq!(panel.map_year.year, 2017);
        assert!(!panel.tick(10.2));
        assert!(panel.tick(10.6));
        assert!(panel.tick(11.2));
        assert_eq!(panel.map_year.year, 2016);
    }

    #[test]
    fn year_sliders_animate_independently() {
        let mut panel = panel();
        panel.histogram_year.playing = true;
        assert!(panel.tick(10.0));
        assert!(panel.tick(10.6));
        assert_eq!(panel.histogram_year.year, 2018);
        assert_eq!(panel.map_year.year, 2016);

        let inputs = panel.inputs();
        assert_eq!(inputs.map_year, Some(2016));
        assert_eq!(inputs.histogram_year, Some(2018));
    }

    #[test]
    fn inputs_without_data_have_no_year() {
        let panel = ControlPanel::default();
        assert_eq!(panel.inputs(), WidgetInputs::default());
    }
}
