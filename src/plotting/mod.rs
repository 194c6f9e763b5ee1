mod chart;
mod styles;

pub use chart::{generate_plot, generate_plot_async};
pub use styles::{ChartStyle, ChartTheme};
