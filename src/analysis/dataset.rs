use chrono::{Datelike, NaiveDate};
use csv::StringRecord;
use statrs::statistics::Statistics;
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::task::spawn_blocking;

use crate::types::{AnalysisResult, Dataset, Field, ScatterPoint, Track};
use crate::utils::aggregation::{
    clean, distinct_sorted_values, downsample_points, filter_by_category, top_n_by_group,
    EngineError,
};

/// Selector value standing for "no genre filter".
pub const ALL_GENRES: &str = "All";

/// Entries kept per ranked view.
const TOP_N: usize = 10;

/// Upper bound on scatter points handed to the chart layer.
const SCATTER_TARGET_POINTS: usize = 2000;

/// Valid popularity domain; rows outside it are dropped, not clamped.
const POPULARITY_DOMAIN: RangeInclusive<f64> = 0.0..=100.0;

/// Errors raised while loading or analyzing the tracks dataset.
///
/// Load errors are fatal: the application serves no partial data.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("dataset header contains none of the known track columns")]
    MissingColumns,
    #[error("row {row}: invalid numeric value '{value}' in column '{column}'")]
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },
    #[error("aggregation failed: {0}")]
    Engine(#[from] EngineError),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("failed to acquire parser slot: {0}")]
    Semaphore(#[from] tokio::sync::AcquireError),
}

/// Column indices of the known fields within one dataset variant's header.
#[derive(Clone, Copy)]
struct ColumnLayout {
    artists: Option<usize>,
    track_name: Option<usize>,
    track_genre: Option<usize>,
    popularity: Option<usize>,
    danceability: Option<usize>,
    energy: Option<usize>,
    release_date: Option<usize>,
    year: Option<usize>,
}

impl ColumnLayout {
    fn from_headers(headers: &StringRecord) -> Self {
        let index_of = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim() == name)
        };

        Self {
            artists: index_of("artists"),
            track_name: index_of("track_name"),
            track_genre: index_of("track_genre"),
            popularity: index_of("popularity"),
            danceability: index_of("danceability"),
            energy: index_of("energy"),
            release_date: index_of("release_date"),
            year: index_of("year"),
        }
    }

    fn known_column_count(&self) -> usize {
        [
            self.artists,
            self.track_name,
            self.track_genre,
            self.popularity,
            self.danceability,
            self.energy,
            self.release_date,
            self.year,
        ]
        .iter()
        .filter(|index| index.is_some())
        .count()
    }
}

/// Load the tracks dataset from a CSV file asynchronously.
///
/// The header is validated first, then rows are parsed to [`Track`] values
/// in parallel chunks. Chunk results are reassembled in file order, so the
/// returned dataset preserves row order exactly.
pub async fn load_dataset_async(path: String) -> Result<Dataset, DatasetError> {
    // Read the header and all raw records in a blocking task since csv I/O
    // is synchronous.
    let (headers, records) = spawn_blocking(move || {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&path)?;
        let headers = reader.headers()?.clone();
        let records = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok::<_, DatasetError>((headers, records))
    })
    .await??;

    let layout = ColumnLayout::from_headers(&headers);
    if layout.known_column_count() == 0 {
        return Err(DatasetError::MissingColumns);
    }

    let columns: BTreeSet<String> = headers
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    // Parse rows in parallel chunks using a bounded number of tasks.
    let chunk_size = get_optimal_chunk_size(records.len());
    let max_tasks = get_optimal_task_count();
    let semaphore = Arc::new(tokio::sync::Semaphore::new(max_tasks));

    let mut handles = Vec::new();
    // The header occupies line 1; the first data row is line 2.
    let mut row_base = 2usize;
    for chunk in records.chunks(chunk_size) {
        let chunk = chunk.to_vec();
        let first_row = row_base;
        row_base += chunk.len();
        let permit = semaphore.clone().acquire_owned().await?;

        handles.push(tokio::spawn(async move {
            let _permit = permit;
            spawn_blocking(move || parse_record_chunk(&chunk, layout, first_row)).await?
        }));
    }

    // Await chunks in submission order so the dataset keeps file order.
    let mut tracks = Vec::with_capacity(records.len());
    for handle in handles {
        tracks.extend(handle.await??);
    }

    Ok(Dataset { tracks, columns })
}

/// Parse a chunk of raw CSV records into tracks.
fn parse_record_chunk(
    chunk: &[StringRecord],
    layout: ColumnLayout,
    first_row: usize,
) -> Result<Vec<Track>, DatasetError> {
    let mut tracks = Vec::with_capacity(chunk.len());

    for (offset, record) in chunk.iter().enumerate() {
        let row = first_row + offset;

        let year_from_date = text_cell(record, layout.release_date)
            .and_then(|raw| parse_release_year(raw));
        let year_from_column = int_cell(record, layout.year, "year", row)?;

        tracks.push(Track {
            artists: text_cell(record, layout.artists).map(str::to_string),
            track_name: text_cell(record, layout.track_name).map(str::to_string),
            track_genre: text_cell(record, layout.track_genre).map(str::to_string),
            popularity: number_cell(record, layout.popularity, "popularity", row)?,
            danceability: number_cell(record, layout.danceability, "danceability", row)?,
            energy: number_cell(record, layout.energy, "energy", row)?,
            release_year: year_from_date.or(year_from_column),
        });
    }

    Ok(tracks)
}

/// Non-empty trimmed text of a cell, when the column exists.
fn text_cell(record: &StringRecord, index: Option<usize>) -> Option<&str> {
    index
        .and_then(|index| record.get(index))
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
}

/// Numeric value of a cell. An empty cell is missing; a non-empty cell that
/// does not parse is a fatal load error, never a silent default.
fn number_cell(
    record: &StringRecord,
    index: Option<usize>,
    column: &'static str,
    row: usize,
) -> Result<Option<f64>, DatasetError> {
    match text_cell(record, index) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| DatasetError::InvalidNumber {
                row,
                column,
                value: raw.to_string(),
            }),
    }
}

/// Integer value of a cell, with the same strictness as [`number_cell`].
fn int_cell(
    record: &StringRecord,
    index: Option<usize>,
    column: &'static str,
    row: usize,
) -> Result<Option<i32>, DatasetError> {
    match text_cell(record, index) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i32>()
            .map(Some)
            .map_err(|_| DatasetError::InvalidNumber {
                row,
                column,
                value: raw.to_string(),
            }),
    }
}

/// Derive a release year from a raw date cell.
///
/// Full dates, year-month values, and bare years all occur in the dataset;
/// anything else is treated as missing, matching the upstream preprocessing
/// which coerces bad dates and drops them at cleaning.
fn parse_release_year(raw: &str) -> Option<i32> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.year());
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d") {
        return Some(date.year());
    }
    raw.parse::<i32>().ok()
}

/// Get optimal chunk size based on row count
fn get_optimal_chunk_size(_total_rows: usize) -> usize {
    // Aim for chunks that will take ~100ms to parse
    const TARGET_CHUNK_TIME_MS: usize = 100;
    const ROWS_PER_MS: usize = 50; // Estimated rows parseable per millisecond
    const MIN_CHUNK_SIZE: usize = 500;
    const MAX_CHUNK_SIZE: usize = 10_000;

    let optimal_size = TARGET_CHUNK_TIME_MS * ROWS_PER_MS;
    optimal_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE)
}

/// Get optimal number of parallel tasks based on system resources
fn get_optimal_task_count() -> usize {
    let cpu_count = num_cpus::get();
    // Use 75% of available CPUs to leave room for other system processes
    (cpu_count * 3 / 4).max(1)
}

/// Analyze the loaded dataset for the given genre selection asynchronously.
pub async fn analyze_tracks_async(
    dataset: Arc<Dataset>,
    genre: String,
) -> Result<AnalysisResult, DatasetError> {
    spawn_blocking(move || analyze_tracks(&dataset, &genre)).await?
}

/// Derive every aggregate view and the summary statistics for one selection.
///
/// Reads the dataset only; all heavy lifting is delegated to the pure
/// aggregation operations.
fn analyze_tracks(dataset: &Dataset, genre: &str) -> Result<AnalysisResult, DatasetError> {
    let start_time = Instant::now();

    // The ranked views and the genre selector all work from the same
    // cleaned rows.
    let base = clean(
        dataset,
        &[Field::Artists, Field::TrackGenre, Field::Popularity],
        Some(POPULARITY_DOMAIN),
    )?;

    let available_genres: Vec<String> = distinct_sorted_values(&base, Field::TrackGenre)?
        .into_iter()
        .map(|value| value.to_string())
        .collect();

    let top_genres = top_n_by_group(&base, None, Field::TrackGenre, Field::Popularity, TOP_N)?;

    let selection = if genre == ALL_GENRES {
        base.clone()
    } else {
        filter_by_category(&base, Field::TrackGenre, genre)?
    };
    let top_artists = top_n_by_group(&selection, None, Field::Artists, Field::Popularity, TOP_N)?;

    // The scatter view additionally needs the audio features.
    let scatter_rows = clean(
        dataset,
        &[
            Field::TrackName,
            Field::TrackGenre,
            Field::Danceability,
            Field::Energy,
            Field::Popularity,
        ],
        Some(POPULARITY_DOMAIN),
    )?;
    let scatter_selection = if genre == ALL_GENRES {
        scatter_rows
    } else {
        filter_by_category(&scatter_rows, Field::TrackGenre, genre)?
    };
    let scatter_points: Vec<ScatterPoint> = scatter_selection
        .iter()
        .map(|track| ScatterPoint {
            x: track.danceability.unwrap_or(0.0),
            y: track.energy.unwrap_or(0.0),
            size: track.popularity.unwrap_or(0.0),
            label: track.track_name.clone().unwrap_or_default(),
            genre: track.track_genre.clone().unwrap_or_default(),
        })
        .collect();
    let scatter_tracks = downsample_points(&scatter_points, SCATTER_TARGET_POINTS);

    // The timeline exists only for dataset variants that carry a year.
    let yearly_top_artists = if dataset.has_field(Field::Year) {
        let yearly_rows = clean(dataset, &[Field::Artists, Field::Year, Field::Popularity], None)?;
        top_n_by_group(
            &yearly_rows,
            Some(Field::Year),
            Field::Artists,
            Field::Popularity,
            TOP_N,
        )?
    } else {
        Vec::new()
    };

    let track_count = base.len();
    let artist_count = distinct_sorted_values(&base, Field::Artists)?.len();
    let genre_count = available_genres.len();

    let popularity_values: Vec<f64> = base.iter().filter_map(|track| track.popularity).collect();
    let mean_popularity = if popularity_values.is_empty() {
        0.0
    } else {
        (&popularity_values).mean()
    };
    let popularity_std_dev = if popularity_values.len() < 2 {
        0.0
    } else {
        (&popularity_values).std_dev()
    };

    let elapsed = start_time.elapsed();
    let elapsed_secs = elapsed.as_secs_f64();
    let rows_per_sec = if elapsed_secs > 0.0 {
        track_count as f64 / elapsed_secs
    } else {
        0.0
    };

    let processing_stats = format!(
        "Aggregated {} rows in {:.2}s\nRows/sec: {:.1}\nGenres: {}\nArtists: {}",
        track_count, elapsed_secs, rows_per_sec, genre_count, artist_count
    );

    Ok(AnalysisResult {
        track_count,
        artist_count,
        genre_count,
        mean_popularity,
        popularity_std_dev,
        top_genres,
        top_artists,
        yearly_top_artists,
        scatter_tracks,
        available_genres,
        elapsed_time: elapsed_secs,
        processing_stats,
    })
}
