//! Affordability Explorer - Housing affordability charts and report export
//!
//! Loads a wide affordability CSV, reshapes and joins it, and shows the
//! narrative charts plus interactive widgets, or exports them headlessly.

mod charts;
mod config;
mod data;
mod export;
mod gui;
mod ppt;
mod stats;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::Settings;
use data::{AffordabilityData, GeocodeTable};
use eframe::egui;
use gui::ExplorerApp;
use log::{debug, info};
use std::path::PathBuf;

const DEFAULT_LOGGING_LEVEL: &str = "warn";
const VERBOSE_LOGGING_LEVEL: &str = "debug";

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Wide affordability CSV (RegionID, RegionName, SizeRank, Index, ..., YYYY-MM columns)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Geocode CSV with region_name (or region_id), latitude and longitude
    #[arg(short, long)]
    geocodes: Option<PathBuf>,

    /// JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the narrative report to this directory and exit
    #[arg(short, long, value_name = "DIR")]
    export: Option<PathBuf>,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Set RUST_LOG if not set
    if std::env::var("RUST_LOG").is_err() {
        let level = if args.verbose {
            VERBOSE_LOGGING_LEVEL
        } else {
            DEFAULT_LOGGING_LEVEL
        };
        std::env::set_var("RUST_LOG", level);
    }
    pretty_env_logger::init_timed();
    debug!("args: {args:?}");

    let settings = match &args.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    debug!("settings: {settings:?}");

    match args.export {
        Some(output_dir) => run_export(&settings, args.data, args.geocodes, &output_dir),
        None => run_gui(settings, args.data, args.geocodes),
    }
}

fn run_export(
    settings: &Settings,
    data_path: Option<PathBuf>,
    geocode_path: Option<PathBuf>,
    output_dir: &std::path::Path,
) -> Result<()> {
    let Some(data_path) = data_path else {
        bail!("--export needs a data file (--data)");
    };

    let data = AffordabilityData::load(&data_path)
        .with_context(|| format!("Failed to load {}", data_path.display()))?;
    let geocodes = match geocode_path {
        Some(path) => {
            let table = GeocodeTable::load(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            table.validate(&data, settings.map_top_n).log();
            Some(table)
        }
        None => None,
    };

    let summary = export::export_narrative(&data, geocodes.as_ref(), settings, output_dir)?;
    info!(
        "Wrote {} images, {} and {}",
        summary.images.len(),
        summary.charts_json.display(),
        summary.report.display()
    );
    Ok(())
}

fn run_gui(
    settings: Settings,
    data_path: Option<PathBuf>,
    geocode_path: Option<PathBuf>,
) -> Result<()> {
    // Configure native options
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([1100.0, 700.0])
            .with_title("Affordability Explorer"),
        ..Default::default()
    };

    // Run the application
    eframe::run_native(
        "Affordability Explorer",
        options,
        Box::new(|cc| {
            Ok(Box::new(ExplorerApp::new(
                cc,
                settings,
                data_path,
                geocode_path,
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run the window: {e}"))
}
