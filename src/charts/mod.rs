//! Charts module - Chart views and rendering

mod plotter;
mod renderer;
mod spec;
pub mod views;

pub use plotter::ChartPlotter;
pub use renderer::ChartRenderer;
pub use spec::ChartSpec;
