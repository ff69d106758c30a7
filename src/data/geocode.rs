//! Geocode lookup for the bubble map.
//! Keyed by region id when the lookup carries one, by exact region name otherwise.

use super::columns;
use super::dataset::{AffordabilityData, RegionInfo};
use super::loader::{DataLoader, LoaderError};
use log::{info, warn};
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GeoKey {
    Id(i64),
    Name(String),
}

#[derive(Debug, Clone, Default)]
pub struct GeocodeTable {
    entries: HashMap<GeoKey, (String, Coordinate)>,
}

/// Result of checking the lookup against the loaded regions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeocodeReport {
    pub matched: usize,
    /// Lookup rows whose key matches no loaded region.
    pub unmatched_geocodes: Vec<String>,
    /// Top-N regions that have no coordinate.
    pub missing_regions: Vec<String>,
}

impl GeocodeReport {
    pub fn is_complete(&self) -> bool {
        self.unmatched_geocodes.is_empty() && self.missing_regions.is_empty()
    }

    pub fn log(&self) {
        info!("Geocodes matched for {} regions", self.matched);
        if self.is_complete() {
            return;
        }
        if !self.unmatched_geocodes.is_empty() {
            warn!(
                "{} geocode rows match no region: {}",
                self.unmatched_geocodes.len(),
                self.unmatched_geocodes.join("; ")
            );
        }
        if !self.missing_regions.is_empty() {
            warn!(
                "{} mapped regions have no coordinate and will be omitted: {}",
                self.missing_regions.len(),
                self.missing_regions.join("; ")
            );
        }
    }
}

impl GeocodeTable {
    pub fn load(path: &Path) -> Result<Self, GeocodeError> {
        let df = DataLoader::load_geocode_csv(path)?;
        let table = Self::from_frame(&df)?;
        info!("Loaded {} geocodes from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn from_frame(df: &DataFrame) -> Result<Self, GeocodeError> {
        let names = df.column(columns::REGION_NAME)?.cast(&DataType::String)?;
        let names = names.str()?;
        let lat = df.column(columns::LATITUDE)?.cast(&DataType::Float64)?;
        let lat = lat.f64()?;
        let lon = df.column(columns::LONGITUDE)?.cast(&DataType::Float64)?;
        let lon = lon.f64()?;
        let ids = match df.column(columns::REGION_ID) {
            Ok(c) => Some(c.cast(&DataType::Int64)?),
            Err(_) => None,
        };
        let ids = ids.as_ref().map(|c| c.i64()).transpose()?;

        let mut entries = HashMap::with_capacity(df.height());
        for i in 0..df.height() {
            let (Some(name), Some(latitude), Some(longitude)) = (names.get(i), lat.get(i), lon.get(i))
            else {
                continue;
            };
            let key = match ids.and_then(|ids| ids.get(i)) {
                Some(id) => GeoKey::Id(id),
                None => GeoKey::Name(name.to_string()),
            };
            entries.insert(
                key,
                (
                    name.to_string(),
                    Coordinate {
                        latitude,
                        longitude,
                    },
                ),
            );
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Coordinate for a region, by id first and exact name second.
    pub fn lookup(&self, region: &RegionInfo) -> Option<Coordinate> {
        self.entries
            .get(&GeoKey::Id(region.region_id))
            .or_else(|| self.entries.get(&GeoKey::Name(region.region_name.clone())))
            .map(|(_, coord)| *coord)
    }

    /// Check the lookup against the loaded regions and the `top_n` mapped ones.
    pub fn validate(&self, data: &AffordabilityData, top_n: u32) -> GeocodeReport {
        let mut used: Vec<&GeoKey> = Vec::new();
        let mut report = GeocodeReport::default();

        for region in data.regions() {
            let id_key = GeoKey::Id(region.region_id);
            let name_key = GeoKey::Name(region.region_name.clone());
            let hit = self
                .entries
                .get_key_value(&id_key)
                .or_else(|| self.entries.get_key_value(&name_key));

            match hit {
                Some((key, _)) => used.push(key),
                None if is_mapped(region, top_n) => {
                    report.missing_regions.push(region.region_name.clone())
                }
                None => {}
            }
        }

        report.matched = used.len();
        let mut unmatched: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, _)| !used.contains(key))
            .map(|(_, (name, _))| name.clone())
            .collect();
        unmatched.sort();
        report.unmatched_geocodes = unmatched;
        report
    }
}

/// Whether a region belongs on the bubble map.
pub fn is_mapped(region: &RegionInfo, top_n: u32) -> bool {
    region.size_rank >= 1 && region.size_rank <= i64::from(top_n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::fixtures;

    #[test]
    fn validates_by_name_and_reports_mismatches() {
        let geo = df!(
            "region_name" => ["New York, NY", "Los Angeles, CA", "Chicago, IL"],
            "latitude" => [40.71, 34.05, 41.88],
            "longitude" => [-74.0, -118.24, -87.63]
        )
        .unwrap();
        let table = GeocodeTable::from_frame(&geo).unwrap();
        let data = fixtures::data();

        let report = table.validate(&data, 3);
        assert_eq!(report.matched, 2);
        assert_eq!(report.unmatched_geocodes, vec!["Los Angeles, CA".to_string()]);
        assert_eq!(
            report.missing_regions,
            vec!["Los Angeles-Long Beach-Anaheim, CA".to_string()]
        );
        assert!(!report.is_complete());
    }

    #[test]
    fn id_key_wins_over_renamed_region() {
        let geo = df!(
            "region_id" => [753899i64],
            "region_name" => ["Los Angeles, CA"],
            "latitude" => [34.05],
            "longitude" => [-118.24]
        )
        .unwrap();
        let table = GeocodeTable::from_frame(&geo).unwrap();
        let data = fixtures::data();
        let la = data
            .find_region("Los Angeles-Long Beach-Anaheim, CA")
            .unwrap();

        let coord = table.lookup(la).unwrap();
        assert_eq!(coord.latitude, 34.05);
        let report = table.validate(&data, 2);
        assert!(report.unmatched_geocodes.is_empty());
        assert_eq!(report.missing_regions, vec!["New York, NY".to_string()]);
    }

    #[test]
    fn national_row_is_never_mapped() {
        let data = fixtures::data();
        let us = data.find_region("United States").unwrap();
        assert!(!is_mapped(us, 25));
    }
}
