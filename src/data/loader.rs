//! CSV Data Loader Module
//! Reads the wide affordability file and the geocode lookup using Polars.

use super::columns::{self, ID_COLUMNS};
use super::processor::parse_month;
use log::debug;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("Missing required column '{column}' in {path}")]
    MissingColumn { column: String, path: PathBuf },
}

/// Handles CSV file loading with Polars.
pub struct DataLoader;

impl DataLoader {
    /// Load a CSV file and normalise its header to snake_case.
    pub fn read_csv(file_path: &Path) -> Result<DataFrame, LoaderError> {
        if !file_path.is_file() {
            return Err(LoaderError::NotFound(file_path.to_path_buf()));
        }

        let mut df = LazyCsvReader::new(file_path)
            .with_infer_schema_length(Some(10000))
            .finish()?
            .collect()?;

        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| normalize_column_name(s.as_str()))
            .collect();
        df.set_column_names(names)?;

        debug!(
            "Read {} ({} rows, {} columns)",
            file_path.display(),
            df.height(),
            df.width()
        );
        Ok(df)
    }

    /// Load the wide affordability file: one row per region and index,
    /// one column per month.
    pub fn load_wide_csv(file_path: &Path) -> Result<DataFrame, LoaderError> {
        let df = Self::read_csv(file_path)?;
        Self::require_columns(&df, &ID_COLUMNS, file_path)?;
        Ok(df)
    }

    /// Load the geocode lookup table.
    pub fn load_geocode_csv(file_path: &Path) -> Result<DataFrame, LoaderError> {
        let df = Self::read_csv(file_path)?;
        Self::require_columns(
            &df,
            &[columns::REGION_NAME, columns::LATITUDE, columns::LONGITUDE],
            file_path,
        )?;
        Ok(df)
    }

    fn require_columns(df: &DataFrame, required: &[&str], path: &Path) -> Result<(), LoaderError> {
        let present = Self::get_columns(df);
        for column in required {
            if !present.iter().any(|c| c == column) {
                return Err(LoaderError::MissingColumn {
                    column: column.to_string(),
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(())
    }

    /// Get list of column names from a DataFrame.
    pub fn get_columns(df: &DataFrame) -> Vec<String> {
        df.get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

/// Normalise a header to lowercase snake_case (`RegionID` -> `region_id`).
/// Month headers such as `1979-03` are returned unchanged.
pub fn normalize_column_name(name: &str) -> String {
    let trimmed = name.trim();
    if parse_month(trimmed).is_some() {
        return trimmed.to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && i > 0 {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                let boundary = prev.is_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_uppercase() && next_is_lower);
                if boundary && !out.ends_with('_') {
                    out.push('_');
                }
            }
            out.extend(c.to_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}
