//! Data module - CSV loading, reshaping and joining

pub mod columns;
mod dataset;
mod geocode;
mod loader;
mod metric;
mod processor;

pub use dataset::AffordabilityData;
pub use geocode::GeocodeTable;
pub use metric::Metric;
pub use processor::{date_to_days, days_to_date};

#[cfg(test)]
pub(crate) use dataset::fixtures;
