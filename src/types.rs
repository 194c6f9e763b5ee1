//! # Common Types
//!
//! This module contains the common types used throughout the application for
//! representing the tracks dataset, its derived aggregate views, and caching.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// A key used for caching analysis results based on the selected genre.
///
/// This struct is used as a key in the cache to store analysis results for a
/// specific genre selection.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct CacheKey {
    /// The selected genre (or "All" for the whole dataset)
    pub genre: String,
}

/// A named column of the tracks dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Performing artist(s) of the track
    Artists,
    /// Track title
    TrackName,
    /// Genre label assigned to the track
    TrackGenre,
    /// Popularity score, expected in [0, 100]
    Popularity,
    /// Danceability score in [0, 1]
    Danceability,
    /// Energy score in [0, 1]
    Energy,
    /// Release year, derived from the `release_date` column at load
    Year,
}

impl Field {
    /// The CSV header the field is read from.
    pub fn column_name(self) -> &'static str {
        match self {
            Field::Artists => "artists",
            Field::TrackName => "track_name",
            Field::TrackGenre => "track_genre",
            Field::Popularity => "popularity",
            Field::Danceability => "danceability",
            Field::Energy => "energy",
            Field::Year => "release_date",
        }
    }

    /// Whether the field holds a numeric metric.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Field::Popularity | Field::Danceability | Field::Energy
        )
    }

    /// Whether the field can serve as a grouping or category key.
    pub fn is_categorical(self) -> bool {
        matches!(
            self,
            Field::Artists | Field::TrackName | Field::TrackGenre | Field::Year
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// A grouping key value: either a text category or a release year.
///
/// The derived `Ord` sorts years numerically and text lexically, so group
/// orderings and tie-breaks are total and deterministic for both key kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum GroupValue {
    /// A release year key
    Year(i32),
    /// A text category key (artist, genre, track name)
    Text(String),
}

impl fmt::Display for GroupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupValue::Year(year) => write!(f, "{}", year),
            GroupValue::Text(text) => f.write_str(text),
        }
    }
}

/// One row of the tracks dataset.
///
/// Missing CSV cells are `None`; the cleaning step drops rows whose required
/// fields are missing before any aggregation runs. Rows are never mutated
/// after load.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Track {
    /// Performing artist(s)
    pub artists: Option<String>,
    /// Track title
    pub track_name: Option<String>,
    /// Genre label (may repeat across rows)
    pub track_genre: Option<String>,
    /// Popularity score
    pub popularity: Option<f64>,
    /// Danceability score
    pub danceability: Option<f64>,
    /// Energy score
    pub energy: Option<f64>,
    /// Release year derived from `release_date` (or a pre-derived `year`
    /// column); unparsable dates are coerced to missing
    pub release_year: Option<i32>,
}

impl Track {
    /// Text value of a categorical field; `None` for numeric fields or
    /// missing cells.
    pub fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::Artists => self.artists.as_deref(),
            Field::TrackName => self.track_name.as_deref(),
            Field::TrackGenre => self.track_genre.as_deref(),
            _ => None,
        }
    }

    /// Numeric value of a metric field; `None` for categorical fields or
    /// missing cells.
    pub fn numeric(&self, field: Field) -> Option<f64> {
        match field {
            Field::Popularity => self.popularity,
            Field::Danceability => self.danceability,
            Field::Energy => self.energy,
            _ => None,
        }
    }

    /// Grouping value of a categorical field.
    pub fn group_value(&self, field: Field) -> Option<GroupValue> {
        match field {
            Field::Year => self.release_year.map(GroupValue::Year),
            _ => self
                .text(field)
                .map(|text| GroupValue::Text(text.to_string())),
        }
    }

    /// Whether the row has a value for the field.
    pub fn has_value(&self, field: Field) -> bool {
        match field {
            Field::Artists => self.artists.is_some(),
            Field::TrackName => self.track_name.is_some(),
            Field::TrackGenre => self.track_genre.is_some(),
            Field::Popularity => self.popularity.is_some(),
            Field::Danceability => self.danceability.is_some(),
            Field::Energy => self.energy.is_some(),
            Field::Year => self.release_year.is_some(),
        }
    }
}

/// The loaded tracks dataset: ordered rows plus the header columns observed
/// at load time.
///
/// Loaded once at startup and treated as immutable afterwards; shared
/// between the UI and analysis tasks as `Arc<Dataset>`.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// All rows, in file order
    pub tracks: Vec<Track>,
    /// CSV header columns seen at load
    pub columns: BTreeSet<String>,
}

impl Dataset {
    /// Whether the field's backing column was present in the CSV header.
    ///
    /// The year is backed by either a `release_date` or a pre-derived `year`
    /// column, whichever the dataset variant ships.
    pub fn has_field(&self, field: Field) -> bool {
        match field {
            Field::Year => {
                self.columns.contains("release_date") || self.columns.contains("year")
            }
            _ => self.columns.contains(field.column_name()),
        }
    }
}

/// One entry of a ranked aggregate view: a group key and its mean value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    /// Outer group the entry belongs to (e.g. release year), when the view
    /// is two-level
    pub outer: Option<GroupValue>,
    /// The ranked group key (e.g. artist or genre)
    pub key: GroupValue,
    /// Arithmetic mean of the value field across the group's rows
    pub mean_value: f64,
    /// Number of rows aggregated into the mean
    pub track_count: usize,
}

/// One point of a scatter view handed to the chart layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    /// Horizontal position (danceability)
    pub x: f64,
    /// Vertical position (energy)
    pub y: f64,
    /// Point size driver (popularity)
    pub size: f64,
    /// Hover label (track name)
    pub label: String,
    /// Color dimension (genre)
    pub genre: String,
}

/// The result of analyzing the tracks dataset for one genre selection.
///
/// This struct contains all the aggregate views and summary statistics
/// derived from the dataset, including top genres, top artists, the yearly
/// popularity timeline, and the scatter view of the current selection.
#[derive(Clone, Default, Serialize)]
pub struct AnalysisResult {
    /// Total number of tracks that survived cleaning
    pub track_count: usize,
    /// Number of distinct artists in the cleaned rows
    pub artist_count: usize,
    /// Number of distinct genres in the cleaned rows
    pub genre_count: usize,
    /// Mean popularity across the cleaned rows
    pub mean_popularity: f64,
    /// Popularity standard deviation across the cleaned rows
    pub popularity_std_dev: f64,
    /// Top genres by mean popularity
    pub top_genres: Vec<RankedEntry>,
    /// Top artists by mean popularity within the current selection
    pub top_artists: Vec<RankedEntry>,
    /// Top artists per release year (ascending years)
    pub yearly_top_artists: Vec<RankedEntry>,
    /// Danceability/energy scatter of the current selection
    pub scatter_tracks: Vec<ScatterPoint>,
    /// List of selectable genres, distinct and sorted
    pub available_genres: Vec<String>,
    /// Wall-clock seconds the analysis took
    pub elapsed_time: f64,
    /// Human-readable processing statistics
    pub processing_stats: String,
}
