use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use thiserror::Error;

use crate::types::{AnalysisResult, RankedEntry, ScatterPoint};

/// Errors raised while exporting aggregate views.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize views: {0}")]
    Json(#[from] serde_json::Error),
}

/// The aggregate views of an analysis, as written by [`export_views_json`].
#[derive(Serialize)]
struct ExportedViews<'a> {
    genre: &'a str,
    top_genres: &'a [RankedEntry],
    top_artists: &'a [RankedEntry],
    yearly_top_artists: &'a [RankedEntry],
    scatter_tracks: &'a [ScatterPoint],
}

/// Write the aggregate views of `result` to `path` as pretty-printed JSON.
pub fn export_views_json(
    path: &Path,
    genre: &str,
    result: &AnalysisResult,
) -> Result<(), ExportError> {
    let views = ExportedViews {
        genre,
        top_genres: &result.top_genres,
        top_artists: &result.top_artists,
        yearly_top_artists: &result.yearly_top_artists,
        scatter_tracks: &result.scatter_tracks,
    };

    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &views)?;
    Ok(())
}
