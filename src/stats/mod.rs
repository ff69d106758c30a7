//! Stats module - yearly aggregation and summary statistics

mod aggregator;
mod calculator;

pub use aggregator::{Aggregator, RegionFilter};
pub use calculator::StatsCalculator;
