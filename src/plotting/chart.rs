use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use once_cell::sync::Lazy;
use tokio::sync::Mutex as TokioMutex;

use std::error::Error;

use crate::app::App;
use crate::types::{GroupValue, RankedEntry, ScatterPoint};

use super::styles::{ChartStyle, ChartTheme};

type PlotError = Box<dyn Error + Send + Sync>;

// Global plot cache with a 5-minute expiration
static PLOT_CACHE: Lazy<Arc<TokioMutex<LruCache<PlotCacheKey, (Vec<u8>, Instant)>>>> =
    Lazy::new(|| {
        Arc::new(TokioMutex::new(LruCache::new(NonZeroUsize::new(10).unwrap()))) // Cache up to 10 plots
    });

#[derive(Hash, Eq, PartialEq)]
struct PlotCacheKey {
    metric: String,
    use_log_scale: bool,
    data_hash: u64,
}

impl PlotCacheKey {
    fn new(app: &App) -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();

        for entry in app
            .top_genres
            .iter()
            .chain(&app.top_artists)
            .chain(&app.yearly_top_artists)
        {
            entry.outer.hash(&mut hasher);
            entry.key.hash(&mut hasher);
            entry.mean_value.to_bits().hash(&mut hasher);
            entry.track_count.hash(&mut hasher);
        }
        for point in &app.scatter_tracks {
            point.x.to_bits().hash(&mut hasher);
            point.y.to_bits().hash(&mut hasher);
            point.size.to_bits().hash(&mut hasher);
            point.label.hash(&mut hasher);
            point.genre.hash(&mut hasher);
        }

        Self {
            metric: app.current_metric.clone(),
            use_log_scale: app.use_log_scale,
            data_hash: hasher.finish(),
        }
    }
}

// Helper function to wrap errors
fn wrap_err<E>(e: E) -> PlotError
where
    E: Into<Box<dyn Error + Send + Sync>>,
{
    e.into()
}

/// Generate a plot for the current view, returning the PNG bytes.
///
/// Rendered plots are cached by view, scale, and data content, so repeated
/// selections of an unchanged view cost one cache lookup.
pub async fn generate_plot_async(app: App) -> Result<Vec<u8>, PlotError> {
    let cache_key = PlotCacheKey::new(&app);

    // Try to get from cache first
    if let Some((plot_data, timestamp)) = PLOT_CACHE.lock().await.get(&cache_key) {
        if timestamp.elapsed() < Duration::from_secs(300) {
            // 5 minutes
            return Ok(plot_data.clone());
        }
    }

    // Generate new plot in a blocking task
    let plot_data = tokio::task::spawn_blocking(move || {
        let buffer;
        {
            let root = BitMapBackend::new(&app.plot_path, (640, 480)).into_drawing_area();
            generate_plot_internal(&app, &root)?;
            root.present()?;

            // Read the file back into the buffer
            buffer = std::fs::read(&app.plot_path)?;
            // Clean up the temporary file
            let _ = std::fs::remove_file(&app.plot_path);
        }
        Ok::<_, PlotError>(buffer)
    })
    .await??;

    // Cache the result
    PLOT_CACHE
        .lock()
        .await
        .put(cache_key, (plot_data.clone(), Instant::now()));

    Ok(plot_data)
}

/// Generate a plot for the current view, leaving the PNG at `app.plot_path`.
pub fn generate_plot(app: &App) -> Result<(), PlotError> {
    let root = BitMapBackend::new(&app.plot_path, (640, 480)).into_drawing_area();
    generate_plot_internal(app, &root)?;
    root.present()?;
    Ok(())
}

/// Internal function to generate the plot for the selected view
pub(crate) fn generate_plot_internal(
    app: &App,
    root_area: &DrawingArea<BitMapBackend, Shift>,
) -> Result<(), PlotError> {
    let theme = ChartTheme::default();
    let style = ChartStyle::default();
    root_area.fill(&theme.background_color).map_err(wrap_err)?;

    match app.current_metric.as_str() {
        "Top Genres" => draw_ranked_bars(
            root_area,
            &theme,
            &style,
            "Top Genres by Average Popularity",
            &app.top_genres,
            app.use_log_scale,
        ),
        "Top Artists" => draw_ranked_bars(
            root_area,
            &theme,
            &style,
            &format!("Top Artists ({})", app.selected_genre),
            &app.top_artists,
            app.use_log_scale,
        ),
        "Danceability vs Energy" => {
            draw_track_scatter(root_area, &theme, &style, &app.scatter_tracks)
        }
        "Popularity Timeline" => {
            draw_yearly_scatter(root_area, &theme, &style, &app.yearly_top_artists)
        }
        _ => Ok(()),
    }
}

/// Bar chart of ranked entries, labels on the x axis, means on the y axis.
fn draw_ranked_bars(
    root_area: &DrawingArea<BitMapBackend, Shift>,
    theme: &ChartTheme,
    style: &ChartStyle,
    caption: &str,
    entries: &[RankedEntry],
    use_log_scale: bool,
) -> Result<(), PlotError> {
    let values: Vec<f64> = entries.iter().map(|entry| entry.mean_value).collect();
    let (min_val, max_val) = calculate_adaptive_range(&values);
    let labels: Vec<String> = entries.iter().map(|entry| entry.key.to_string()).collect();

    let x_max = entries.len().max(1) as f64;
    let mut chart_builder = ChartBuilder::on(root_area)
        .caption(
            caption,
            ("sans-serif", (style.font_size * 2) as i32)
                .into_font()
                .color(&theme.text_color),
        )
        .margin(style.margin as i32)
        .set_all_label_area_size(style.label_area_size as i32)
        .build_cartesian_2d(
            0f64..x_max,
            if use_log_scale {
                1.0..max_val
            } else {
                min_val..max_val
            },
        )?;

    let mut mesh = chart_builder.configure_mesh();

    // Store the labels in a longer-lived variable
    let labels_clone = labels.clone();
    let x_label_formatter = move |x: &f64| {
        let idx = *x as usize;
        if idx < labels_clone.len() {
            labels_clone[idx].clone()
        } else {
            String::new()
        }
    };

    mesh.light_line_style(TRANSPARENT)
        .bold_line_style(theme.grid_color)
        .axis_style(theme.axis_color)
        .y_desc("avg popularity")
        .label_style(
            ("sans-serif", style.font_size as i32)
                .into_font()
                .color(&theme.text_color),
        )
        .y_label_formatter(&format_axis_value)
        .x_labels(entries.len().max(1))
        .x_label_formatter(&x_label_formatter)
        // Rotate x labels for better readability
        .x_label_style(
            ("sans-serif", style.font_size as i32)
                .into_font()
                .color(&theme.text_color)
                .transform(FontTransform::Rotate90)
                .pos(Pos::new(HPos::Right, VPos::Center)),
        );

    mesh.draw()?;

    draw_grid(&mut chart_builder, x_max).map_err(wrap_err)?;

    let bar_width = 0.8;
    let bar_color = RGBColor(135, 206, 250); // Light sky blue
    chart_builder
        .draw_series(entries.iter().enumerate().map(|(i, entry)| {
            let x0 = i as f64 + (1.0 - bar_width) / 2.0;
            let x1 = x0 + bar_width;
            Rectangle::new(
                [(x0, 0.0), (x1, entry.mean_value)],
                bar_color.mix(0.6).filled(),
            )
        }))?
        .label("Average popularity")
        .legend(move |(x, y)| {
            Rectangle::new([(x, y - 5), (x + 20, y + 5)], bar_color.mix(0.6).filled())
        });

    Ok(())
}

/// Scatter of the current selection's tracks, point size from popularity.
fn draw_track_scatter(
    root_area: &DrawingArea<BitMapBackend, Shift>,
    theme: &ChartTheme,
    style: &ChartStyle,
    points: &[ScatterPoint],
) -> Result<(), PlotError> {
    let mut chart_builder = ChartBuilder::on(root_area)
        .caption(
            "Danceability vs Energy",
            ("sans-serif", (style.font_size * 2) as i32)
                .into_font()
                .color(&theme.text_color),
        )
        .margin(style.margin as i32)
        .set_all_label_area_size(style.label_area_size as i32)
        .build_cartesian_2d(0f64..1f64, 0f64..1f64)?;

    chart_builder
        .configure_mesh()
        .light_line_style(TRANSPARENT)
        .bold_line_style(theme.grid_color)
        .axis_style(theme.axis_color)
        .x_desc("danceability")
        .y_desc("energy")
        .label_style(
            ("sans-serif", style.font_size as i32)
                .into_font()
                .color(&theme.text_color),
        )
        .x_label_formatter(&format_axis_value)
        .y_label_formatter(&format_axis_value)
        .draw()?;

    let point_color = RGBColor(100, 149, 237); // Cornflower blue
    chart_builder.draw_series(points.iter().map(|point| {
        // Popularity 0..100 maps to a 2..10 pixel radius.
        let radius = (2.0 + point.size / 12.5) as i32;
        Circle::new((point.x, point.y), radius, point_color.mix(0.4).filled())
    }))?;

    Ok(())
}

/// Year-by-year scatter of the top artists' mean popularity.
fn draw_yearly_scatter(
    root_area: &DrawingArea<BitMapBackend, Shift>,
    theme: &ChartTheme,
    style: &ChartStyle,
    entries: &[RankedEntry],
) -> Result<(), PlotError> {
    let years: Vec<i32> = entries
        .iter()
        .filter_map(|entry| match entry.outer {
            Some(GroupValue::Year(year)) => Some(year),
            _ => None,
        })
        .collect();

    let (x_min, x_max) = match (years.iter().min(), years.iter().max()) {
        (Some(&min_year), Some(&max_year)) => (min_year as f64 - 0.5, max_year as f64 + 0.5),
        _ => (0.0, 1.0),
    };
    let values: Vec<f64> = entries.iter().map(|entry| entry.mean_value).collect();
    let (y_min, y_max) = calculate_adaptive_range(&values);

    let mut chart_builder = ChartBuilder::on(root_area)
        .caption(
            "Artist Popularity Shift Over Time",
            ("sans-serif", (style.font_size * 2) as i32)
                .into_font()
                .color(&theme.text_color),
        )
        .margin(style.margin as i32)
        .set_all_label_area_size(style.label_area_size as i32)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart_builder
        .configure_mesh()
        .light_line_style(TRANSPARENT)
        .bold_line_style(theme.grid_color)
        .axis_style(theme.axis_color)
        .x_desc("release year")
        .y_desc("avg popularity")
        .label_style(
            ("sans-serif", style.font_size as i32)
                .into_font()
                .color(&theme.text_color),
        )
        .x_label_formatter(&|x| format!("{:.0}", x))
        .y_label_formatter(&format_axis_value)
        .draw()?;

    draw_grid(&mut chart_builder, x_max).map_err(wrap_err)?;

    // One stable palette color per artist across all years.
    let artist_keys: BTreeSet<&GroupValue> = entries.iter().map(|entry| &entry.key).collect();
    let artist_keys: Vec<&GroupValue> = artist_keys.into_iter().collect();

    chart_builder.draw_series(entries.iter().filter_map(|entry| {
        let year = match entry.outer {
            Some(GroupValue::Year(year)) => year,
            _ => return None,
        };
        let color_index = artist_keys
            .binary_search(&&entry.key)
            .unwrap_or(0);
        let color = Palette99::pick(color_index).mix(0.8);
        Some(Circle::new(
            (year as f64, entry.mean_value),
            4,
            color.filled(),
        ))
    }))?;

    Ok(())
}

fn draw_grid(
    chart_builder: &mut ChartContext<BitMapBackend, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    x_max: f64,
) -> Result<(), PlotError> {
    let grid_style = ShapeStyle::from(&WHITE.mix(0.15)).stroke_width(1);
    let major_grid_style = ShapeStyle::from(&WHITE.mix(0.25)).stroke_width(2);

    // Draw horizontal grid lines
    let y_range = chart_builder.y_range();
    let y_min = y_range.start;
    let y_max = y_range.end;
    let y_span = y_max - y_min;

    // Calculate nice grid intervals
    let y_interval = if y_span > 1_000.0 {
        100.0
    } else if y_span > 100.0 {
        10.0
    } else if y_span > 10.0 {
        5.0
    } else if y_span > 1.0 {
        1.0
    } else {
        0.1
    };

    // Draw both major and minor grid lines
    let steps = (y_span / y_interval).ceil() as i32;
    let y_start = (y_min / y_interval).floor() * y_interval;

    for i in 0..=steps {
        let y = y_start + i as f64 * y_interval;
        if y > y_max {
            break;
        }
        let line_style = if i % 5 == 0 {
            major_grid_style
        } else {
            grid_style
        };
        chart_builder.draw_series(std::iter::once(PathElement::new(
            vec![(0.0, y), (x_max, y)],
            line_style,
        )))?;
    }

    Ok(())
}

/// Axis label formatting with K/M shorthand for large values.
fn format_axis_value(value: &f64) -> String {
    if value.abs() >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value.abs() >= 1_000.0 {
        format!("{:.1}K", value / 1_000.0)
    } else if value.abs() < 10.0 && value.fract() != 0.0 {
        format!("{:.2}", value)
    } else {
        format!("{:.0}", value)
    }
}

pub(crate) fn calculate_adaptive_range(values: &[f64]) -> (f64, f64) {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    if sorted.is_empty() {
        return (0.0, 1.0);
    }

    // Remove extreme outliers (values beyond 95th percentile)
    let p95_idx = ((sorted.len() as f64 * 0.95) as usize)
        .max(1)
        .min(sorted.len() - 1);
    let normal_max = sorted[p95_idx];
    let absolute_max = sorted[sorted.len() - 1];

    // Use the 95th percentile for the main scale, but ensure we can still see the peaks
    let display_max = if absolute_max > normal_max * 2.0 {
        normal_max * 1.2 // Main scale shows normal range
    } else {
        absolute_max * 1.1 // Show everything if no extreme outliers
    };

    (0.0, display_max.max(1.0))
}
