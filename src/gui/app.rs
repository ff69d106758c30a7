//! Affordability Explorer Main Application
//! Main window with control panel and chart viewer.

use crate::config::Settings;
use crate::data::{AffordabilityData, GeocodeTable};
use crate::export;
use crate::gui::{ChartViewer, ControlPanel, ControlPanelAction};
use anyhow::Context;
use egui::SidePanel;
use log::{error, info};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Loading result from background thread
enum LoadResult {
    Progress(f32, String),
    Data(AffordabilityData),
    Geocodes(GeocodeTable),
    Error(String),
}

/// Main application window.
pub struct ExplorerApp {
    settings: Settings,
    data: Option<Arc<AffordabilityData>>,
    geocodes: Option<GeocodeTable>,
    control_panel: ControlPanel,
    chart_viewer: ChartViewer,

    // Async loading
    load_rx: Option<Receiver<LoadResult>>,
    is_loading: bool,
}

impl ExplorerApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        settings: Settings,
        data_path: Option<PathBuf>,
        geocode_path: Option<PathBuf>,
    ) -> Self {
        let mut app = Self::with_settings(settings);
        if data_path.is_some() || geocode_path.is_some() {
            app.start_loading(data_path, geocode_path);
        }
        app
    }

    fn with_settings(settings: Settings) -> Self {
        let control_panel = ControlPanel::new(
            settings.max_trend_regions,
            Duration::from_millis(settings.animation_interval_ms),
        );
        Self {
            settings,
            data: None,
            geocodes: None,
            control_panel,
            chart_viewer: ChartViewer::new(),
            load_rx: None,
            is_loading: false,
        }
    }

    /// Load the data and/or geocode file on a background thread.
    fn start_loading(&mut self, data_path: Option<PathBuf>, geocode_path: Option<PathBuf>) {
        if self.is_loading {
            return; // Already loading
        }
        if let Some(path) = &data_path {
            self.control_panel.data_path = Some(path.clone());
        }
        if let Some(path) = &geocode_path {
            self.control_panel.geocode_path = Some(path.clone());
        }

        let (tx, rx) = channel();
        self.load_rx = Some(rx);
        self.is_loading = true;
        self.control_panel.set_progress(5.0, "Loading...");

        thread::spawn(move || Self::run_loading(tx, data_path, geocode_path));
    }

    /// Run loading (called from background thread)
    fn run_loading(
        tx: Sender<LoadResult>,
        data_path: Option<PathBuf>,
        geocode_path: Option<PathBuf>,
    ) {
        if let Some(path) = data_path {
            let _ = tx.send(LoadResult::Progress(
                10.0,
                "Reading and reshaping data...".to_string(),
            ));
            match AffordabilityData::load(&path) {
                Ok(data) => {
                    let _ = tx.send(LoadResult::Data(data));
                }
                Err(e) => {
                    let _ = tx.send(LoadResult::Error(e.to_string()));
                    return;
                }
            }
        }

        if let Some(path) = geocode_path {
            let _ = tx.send(LoadResult::Progress(70.0, "Reading geocodes...".to_string()));
            match GeocodeTable::load(&path) {
                Ok(table) => {
                    let _ = tx.send(LoadResult::Geocodes(table));
                }
                Err(e) => {
                    let _ = tx.send(LoadResult::Error(e.to_string()));
                }
            }
        }
    }

    /// Check for loading results
    fn check_load_results(&mut self) {
        let Some(rx) = self.load_rx.take() else {
            return;
        };

        let mut changed = false;
        loop {
            match rx.try_recv() {
                Ok(LoadResult::Progress(progress, status)) => {
                    self.control_panel.set_progress(progress, &status);
                }
                Ok(LoadResult::Data(data)) => {
                    self.control_panel.update_regions(
                        data.region_names(),
                        &self.settings.national_region,
                        data.year_range(),
                    );
                    self.data = Some(Arc::new(data));
                    changed = true;
                }
                Ok(LoadResult::Geocodes(table)) => {
                    self.geocodes = Some(table);
                    changed = true;
                }
                Ok(LoadResult::Error(error)) => {
                    self.control_panel
                        .set_progress(0.0, &format!("Error: {}", error));
                    self.is_loading = false;
                }
                Err(std::sync::mpsc::TryRecvError::Empty) => {
                    self.load_rx = Some(rx);
                    break;
                }
                Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                    if self.is_loading {
                        self.is_loading = false;
                        self.control_panel.set_progress(100.0, "Complete");
                    }
                    break;
                }
            }
        }

        if changed {
            self.on_dataset_changed();
        }
    }

    fn on_dataset_changed(&mut self) {
        let Some(data) = self.data.clone() else {
            return;
        };
        if let Some(geocodes) = &self.geocodes {
            geocodes
                .validate(&data, self.settings.map_top_n)
                .log();
        }
        self.chart_viewer
            .set_dataset(&data, self.geocodes.as_ref(), &self.settings);
    }

    /// Handle report export - render every chart and write PNGs, JSON and PPTX
    fn handle_export(&mut self) {
        let Some(data) = self.data.clone() else {
            self.control_panel.set_progress(0.0, "No data loaded");
            return;
        };

        // Ask user for output location
        let Some(output_path) = rfd::FileDialog::new()
            .add_filter("PowerPoint", &["pptx"])
            .set_file_name(export::REPORT_FILE)
            .save_file()
        else {
            return; // User cancelled
        };

        self.control_panel.set_progress(30.0, "Rendering charts...");
        let charts = self.chart_viewer.all_charts();
        let result = export::write_report(&charts, &data, &self.settings, &output_path)
            .and_then(|_| {
                let json = output_path.with_extension("json");
                export::write_charts_json(&charts, &json)
            })
            .context("Report export failed");

        match result {
            Ok(()) => {
                info!("Report exported to {}", output_path.display());
                self.control_panel.set_progress(
                    100.0,
                    &format!("Report exported: {} charts", charts.len()),
                );
                if let Err(e) = open::that(&output_path) {
                    error!("Could not open {}: {}", output_path.display(), e);
                }
            }
            Err(e) => {
                error!("{e:#}");
                self.control_panel
                    .set_progress(0.0, &format!("Error: {e:#}"));
            }
        }
    }

    fn handle_browse(&mut self, geocodes: bool) {
        let title = if geocodes { "Geocode CSV" } else { "Affordability CSV" };
        if let Some(path) = rfd::FileDialog::new()
            .set_title(title)
            .add_filter("CSV Files", &["csv"])
            .pick_file()
        {
            self.load_picked(path, geocodes);
        }
    }

    /// Start loading a picked file. Ignored while another load is running.
    fn load_picked(&mut self, path: PathBuf, geocodes: bool) {
        if self.is_loading {
            self.control_panel
                .set_progress(self.control_panel.progress, "Still loading, try again shortly");
            return;
        }
        if geocodes {
            self.start_loading(None, Some(path));
        } else {
            self.chart_viewer.clear();
            self.start_loading(Some(path), None);
        }
    }
}

impl eframe::App for ExplorerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Check for background results
        self.check_load_results();

        // Request repaint while loading
        if self.is_loading {
            ctx.request_repaint();
        }

        // Left panel - Control Panel
        SidePanel::left("control_panel")
            .min_width(300.0)
            .max_width(350.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    match self.control_panel.show(ui) {
                        ControlPanelAction::BrowseData => self.handle_browse(false),
                        ControlPanelAction::BrowseGeocodes => self.handle_browse(true),
                        ControlPanelAction::ExportReport => self.handle_export(),
                        ControlPanelAction::None => {}
                    }
                });
            });

        if let Some(data) = &self.data {
            let inputs = self.control_panel.inputs();
            self.chart_viewer
                .refresh(data, self.geocodes.as_ref(), &self.settings, &inputs);
        }

        // Central panel - Chart Viewer
        egui::CentralPanel::default().show(ctx, |ui| {
            self.chart_viewer.show(ui);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures;

    #[test]
    fn picking_a_file_during_a_load_keeps_the_charts() {
        let mut app = ExplorerApp::with_settings(Settings::default());
        let data = fixtures::data();
        app.chart_viewer.set_dataset(&data, None, &app.settings);
        app.data = Some(Arc::new(data));
        app.is_loading = true;

        app.load_picked(PathBuf::from("/nonexistent/other.csv"), false);
        assert_eq!(app.chart_viewer.narrative.len(), 6);
        assert!(app.load_rx.is_none());
        assert!(app.control_panel.data_path.is_none());
    }
}
