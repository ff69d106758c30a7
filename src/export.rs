//! Report export: narrative charts to PNG files, a JSON dump of every chart
//! spec, and a PPTX deck.

use crate::charts::{views, ChartRenderer, ChartSpec};
use crate::config::Settings;
use crate::data::{AffordabilityData, GeocodeTable};
use crate::ppt::{PptGenerator, ReportSlide};
use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

pub const REPORT_TITLE: &str = "Housing Affordability Report";
pub const REPORT_FILE: &str = "report.pptx";
pub const CHARTS_FILE: &str = "charts.json";

/// Files written by one export run.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub images: Vec<PathBuf>,
    pub charts_json: PathBuf,
    pub report: PathBuf,
}

/// File-name-safe version of a chart title.
pub fn file_stem(index: usize, title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    format!("{:02}_{}", index + 1, slug.trim_matches('_'))
}

/// Cover slide lines describing the loaded data.
pub fn report_subtitle(data: &AffordabilityData) -> Vec<String> {
    let mut lines = vec![format!("{} regions", data.regions().len())];
    if let Some((first, last)) = data.year_range() {
        lines.push(format!("Monthly data {first} to {last}"));
    }
    if let Some(latest) = data.latest_date() {
        lines.push(format!("Latest month: {}", latest.format("%B %Y")));
    }
    lines
}

pub fn write_charts_json(charts: &[ChartSpec], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(charts).context("Failed to serialize charts")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Render `charts` and write them as a PPTX deck at `path`.
pub fn write_report(
    charts: &[ChartSpec],
    data: &AffordabilityData,
    settings: &Settings,
    path: &Path,
) -> Result<Vec<Vec<u8>>> {
    let size = (settings.export_width, settings.export_height);
    let images = ChartRenderer::render_all(charts, size.0, size.1)
        .context("Failed to render charts")?;

    let slides: Vec<ReportSlide> = charts
        .iter()
        .zip(&images)
        .map(|(chart, image)| ReportSlide {
            title: chart.title().to_string(),
            image: image.clone(),
            pixel_size: size,
        })
        .collect();

    PptGenerator::generate_report(&slides, path, REPORT_TITLE, &report_subtitle(data))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(images)
}

/// Headless export of the narrative into `output_dir`.
pub fn export_narrative(
    data: &AffordabilityData,
    geocodes: Option<&GeocodeTable>,
    settings: &Settings,
    output_dir: &Path,
) -> Result<ExportSummary> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let charts = views::narrative(data, geocodes, settings).context("Failed to build charts")?;
    debug!("Narrative has {} charts", charts.len());

    let charts_json = output_dir.join(CHARTS_FILE);
    write_charts_json(&charts, &charts_json)?;

    let report = output_dir.join(REPORT_FILE);
    let pngs = write_report(&charts, data, settings, &report)?;

    let mut images = Vec::with_capacity(pngs.len());
    for (i, (chart, png)) in charts.iter().zip(&pngs).enumerate() {
        let path = output_dir.join(format!("{}.png", file_stem(i, chart.title())));
        fs::write(&path, png).with_context(|| format!("Failed to write {}", path.display()))?;
        images.push(path);
    }

    info!(
        "Exported {} charts to {}",
        images.len(),
        output_dir.display()
    );
    Ok(ExportSummary {
        images,
        charts_json,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures;
    use polars::prelude::*;
    use std::io::Read;
    use ::zip::ZipArchive;

    #[test]
    fn stems_are_numbered_and_safe() {
        assert_eq!(
            file_stem(0, "Price-to-income ratio: United States"),
            "01_price_to_income_ratio_united_states"
        );
        assert_eq!(file_stem(11, "  Largest vs smallest  "), "12_largest_vs_smallest");
    }

    #[test]
    fn subtitle_describes_data() {
        let lines = report_subtitle(&fixtures::data());
        assert_eq!(lines[0], "5 regions");
        assert_eq!(lines[1], "Monthly data 2017 to 2018");
        assert_eq!(lines[2], "Latest month: February 2018");
    }

    #[test]
    fn charts_json_is_a_tagged_array() {
        let data = fixtures::data();
        let charts = views::narrative(&data, None, &Settings::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CHARTS_FILE);
        write_charts_json(&charts, &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let kinds: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["kind"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, vec!["line", "line", "line", "table", "table", "histogram"]);
    }

    #[test]
    fn narrative_export_writes_images_json_and_deck() {
        let data = fixtures::data();
        let geocodes = GeocodeTable::from_frame(
            &df!(
                "region_name" => ["New York, NY", "Los Angeles-Long Beach-Anaheim, CA"],
                "latitude" => [40.71, 34.05],
                "longitude" => [-74.0, -118.24]
            )
            .unwrap(),
        )
        .unwrap();
        let settings = Settings {
            export_width: 480,
            export_height: 320,
            ..Settings::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report");

        let summary = export_narrative(&data, Some(&geocodes), &settings, &out).unwrap();
        assert_eq!(summary.images.len(), 7);
        assert_eq!(summary.charts_json, out.join(CHARTS_FILE));
        assert_eq!(summary.report, out.join(REPORT_FILE));

        let mut written: Vec<String> = fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        written.sort();
        assert_eq!(written.len(), 9);
        assert!(written[0].starts_with("01_") && written[6].starts_with("07_"));
        assert!(written[..7].iter().all(|name| name.ends_with(".png")));
        assert_eq!(&written[7..], [CHARTS_FILE, REPORT_FILE]);

        for path in &summary.images {
            let image = image::open(path).unwrap();
            assert_eq!((image.width(), image.height()), (480, 320));
        }

        let mut archive = ZipArchive::new(fs::File::open(&summary.report).unwrap()).unwrap();
        assert!(archive.by_name("ppt/slides/slide8.xml").is_ok());
        assert!(archive.by_name("ppt/slides/slide9.xml").is_err());
        let mut cover = String::new();
        archive
            .by_name("ppt/slides/slide1.xml")
            .unwrap()
            .read_to_string(&mut cover)
            .unwrap();
        assert!(cover.contains(REPORT_TITLE));
    }
}
