use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::ops::RangeInclusive;
use thiserror::Error;

use crate::types::{Dataset, Field, GroupValue, RankedEntry, ScatterPoint, Track};

/// Errors for misconfigured aggregation calls.
///
/// These are programming errors at the call boundary, not data conditions:
/// an empty result set is never an error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("column '{0}' is not present in the dataset")]
    MissingColumn(&'static str),
    #[error("field '{0}' is not a numeric metric")]
    NotNumeric(&'static str),
    #[error("field '{0}' is not categorical")]
    NotCategorical(&'static str),
    #[error("top-n limit must be positive")]
    InvalidLimit,
}

/// Drop rows unusable for a computation over the `required` fields.
///
/// A row survives when every required field has a value and, if
/// `popularity_bounds` is given, its popularity lies inside the inclusive
/// range. Relative row order is preserved and rows are returned unchanged.
///
/// A required field whose backing column is absent from the dataset header
/// is a configuration error, not a per-row skip.
pub fn clean(
    dataset: &Dataset,
    required: &[Field],
    popularity_bounds: Option<RangeInclusive<f64>>,
) -> Result<Vec<Track>, EngineError> {
    for field in required {
        if !dataset.has_field(*field) {
            return Err(EngineError::MissingColumn(field.column_name()));
        }
    }

    let rows = dataset
        .tracks
        .iter()
        .filter(|track| required.iter().all(|field| track.has_value(*field)))
        .filter(|track| match &popularity_bounds {
            Some(range) => track
                .popularity
                .map(|popularity| range.contains(&popularity))
                .unwrap_or(false),
            None => true,
        })
        .cloned()
        .collect();

    Ok(rows)
}

/// Rank groups of `inner` by the arithmetic mean of `value`, keeping the top
/// `n` groups per outer partition.
///
/// Within each outer partition groups sort descending by mean, ties broken
/// by the inner key ascending; the final result orders outer partitions
/// ascending. Without an outer field there is a single global partition.
pub fn top_n_by_group(
    rows: &[Track],
    outer: Option<Field>,
    inner: Field,
    value: Field,
    n: usize,
) -> Result<Vec<RankedEntry>, EngineError> {
    if n == 0 {
        return Err(EngineError::InvalidLimit);
    }
    if !inner.is_categorical() {
        return Err(EngineError::NotCategorical(inner.column_name()));
    }
    if let Some(field) = outer {
        if !field.is_categorical() {
            return Err(EngineError::NotCategorical(field.column_name()));
        }
    }
    if !value.is_numeric() {
        return Err(EngineError::NotNumeric(value.column_name()));
    }

    let mut partitions: HashMap<(Option<GroupValue>, GroupValue), (f64, usize)> = HashMap::new();
    for track in rows {
        let inner_key = match track.group_value(inner) {
            Some(key) => key,
            None => continue,
        };
        let outer_key = match outer {
            Some(field) => match track.group_value(field) {
                Some(key) => Some(key),
                None => continue,
            },
            None => None,
        };
        let metric = match track.numeric(value) {
            Some(metric) => metric,
            None => continue,
        };
        let slot = partitions.entry((outer_key, inner_key)).or_insert((0.0, 0));
        slot.0 += metric;
        slot.1 += 1;
    }

    let mut entries: Vec<RankedEntry> = partitions
        .into_iter()
        .map(|((outer_key, key), (sum, count))| RankedEntry {
            outer: outer_key,
            key,
            mean_value: sum / count as f64,
            track_count: count,
        })
        .collect();

    // Outer partitions ascending, then mean descending, ties by key ascending.
    entries.sort_by(|a, b| {
        a.outer
            .cmp(&b.outer)
            .then_with(|| {
                b.mean_value
                    .partial_cmp(&a.mean_value)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.key.cmp(&b.key))
    });

    let mut result: Vec<RankedEntry> = Vec::new();
    let mut taken_in_partition = 0usize;
    for entry in entries {
        let partition_changed = match result.last() {
            Some(last) => last.outer != entry.outer,
            None => true,
        };
        if partition_changed {
            taken_in_partition = 0;
        }
        if taken_in_partition < n {
            result.push(entry);
            taken_in_partition += 1;
        }
    }

    Ok(result)
}

/// Keep only rows whose `field` equals `value` exactly (case-sensitive).
///
/// No matching row yields an empty result, never an error.
pub fn filter_by_category(
    rows: &[Track],
    field: Field,
    value: &str,
) -> Result<Vec<Track>, EngineError> {
    if !field.is_categorical() {
        return Err(EngineError::NotCategorical(field.column_name()));
    }

    Ok(rows
        .iter()
        .filter(|track| match field {
            Field::Year => track
                .release_year
                .map(|year| year.to_string() == value)
                .unwrap_or(false),
            _ => track.text(field) == Some(value),
        })
        .cloned()
        .collect())
}

/// Distinct, non-missing values of `field`, sorted ascending.
///
/// Computed once after cleaning; the dataset is immutable after load, so the
/// result cannot go stale between selection changes.
pub fn distinct_sorted_values(
    rows: &[Track],
    field: Field,
) -> Result<Vec<GroupValue>, EngineError> {
    if !field.is_categorical() {
        return Err(EngineError::NotCategorical(field.column_name()));
    }

    let values: BTreeSet<GroupValue> = rows
        .iter()
        .filter_map(|track| track.group_value(field))
        .collect();
    Ok(values.into_iter().collect())
}

/// Reduce scatter points to at most `target_points` to keep chart rendering
/// responsive on large selections.
pub fn downsample_points(points: &[ScatterPoint], target_points: usize) -> Vec<ScatterPoint> {
    if target_points == 0 {
        return Vec::new();
    }
    if points.len() <= target_points {
        return points.to_vec();
    }

    let window_size = (points.len() as f64 / target_points as f64).ceil() as usize;
    points
        .chunks(window_size)
        .map(|chunk| chunk[0].clone())
        .collect()
}
