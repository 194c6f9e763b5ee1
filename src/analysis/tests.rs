use super::*;
use crate::types::{CacheKey, Field, GroupValue};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::assert_ok;

fn write_fixture(lines: &[&str]) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tracks.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    (temp_dir, path)
}

fn sample_lines() -> Vec<&'static str> {
    vec![
        "artists,track_name,track_genre,popularity,danceability,energy,release_date",
        "Asha,Sunrise,pop,80,0.8,0.7,2020-03-01",
        "Basil,Moonlight,pop,90,0.6,0.5,2020-07-15",
        "Asha,Horizon,pop,60,0.7,0.9,2021-01-02",
        "Cleo,Undertow,rock,70,0.4,0.95,2021-06-30",
    ]
}

#[tokio::test]
async fn test_load_dataset() {
    let (_temp_dir, path) = write_fixture(&sample_lines());
    let dataset = load_dataset_async(path.to_str().unwrap().to_string())
        .await
        .unwrap();

    assert_eq!(dataset.tracks.len(), 4);
    assert!(dataset.has_field(Field::Artists));
    assert!(dataset.has_field(Field::Year));
    assert_eq!(dataset.tracks[0].artists.as_deref(), Some("Asha"));
    assert_eq!(dataset.tracks[0].release_year, Some(2020));
    assert_eq!(dataset.tracks[3].popularity, Some(70.0));
}

#[tokio::test]
async fn test_load_missing_file() {
    let result = load_dataset_async("/nonexistent/tracks.csv".to_string()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_load_rejects_unknown_header() {
    let (_temp_dir, path) = write_fixture(&["alpha,beta", "1,2"]);
    let result = load_dataset_async(path.to_str().unwrap().to_string()).await;
    assert!(matches!(result, Err(DatasetError::MissingColumns)));
}

#[tokio::test]
async fn test_load_rejects_invalid_number() {
    let (_temp_dir, path) = write_fixture(&[
        "artists,track_name,track_genre,popularity,danceability,energy,release_date",
        "Asha,Sunrise,pop,eighty,0.8,0.7,2020-03-01",
    ]);

    let result = load_dataset_async(path.to_str().unwrap().to_string()).await;
    match result {
        Err(DatasetError::InvalidNumber { row, column, value }) => {
            assert_eq!(row, 2);
            assert_eq!(column, "popularity");
            assert_eq!(value, "eighty");
        }
        other => panic!("expected InvalidNumber, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_load_rejects_short_rows() {
    let (_temp_dir, path) = write_fixture(&[
        "artists,track_name,track_genre,popularity,danceability,energy,release_date",
        "Asha,Sunrise,pop,80",
    ]);

    let result = load_dataset_async(path.to_str().unwrap().to_string()).await;
    assert!(matches!(result, Err(DatasetError::Csv(_))));
}

#[tokio::test]
async fn test_load_coerces_unparsable_dates_to_missing() {
    let (_temp_dir, path) = write_fixture(&[
        "artists,track_name,track_genre,popularity,danceability,energy,release_date",
        "Asha,Sunrise,pop,80,0.8,0.7,someday",
    ]);

    let dataset = load_dataset_async(path.to_str().unwrap().to_string())
        .await
        .unwrap();
    assert_eq!(dataset.tracks.len(), 1);
    assert_eq!(dataset.tracks[0].release_year, None);
}

#[tokio::test]
async fn test_load_empty_cells_become_missing() {
    let (_temp_dir, path) = write_fixture(&[
        "artists,track_name,track_genre,popularity,danceability,energy,release_date",
        ",Sunrise,pop,,0.8,0.7,2020-03-01",
    ]);

    let dataset = load_dataset_async(path.to_str().unwrap().to_string())
        .await
        .unwrap();
    assert_eq!(dataset.tracks[0].artists, None);
    assert_eq!(dataset.tracks[0].popularity, None);
}

#[tokio::test]
async fn test_load_accepts_prederived_year_column() {
    let (_temp_dir, path) = write_fixture(&[
        "artists,track_name,track_genre,popularity,danceability,energy,year",
        "Asha,Sunrise,pop,80,0.8,0.7,1999",
    ]);

    let dataset = load_dataset_async(path.to_str().unwrap().to_string())
        .await
        .unwrap();
    assert!(dataset.has_field(Field::Year));
    assert_eq!(dataset.tracks[0].release_year, Some(1999));
}

#[tokio::test]
async fn test_analyze_all_genres() {
    let (_temp_dir, path) = write_fixture(&sample_lines());
    let dataset = Arc::new(
        load_dataset_async(path.to_str().unwrap().to_string())
            .await
            .unwrap(),
    );

    let result = analyze_tracks_async(dataset, ALL_GENRES.to_string())
        .await
        .unwrap();

    assert_eq!(result.track_count, 4);
    assert_eq!(result.available_genres, vec!["pop", "rock"]);

    // pop's mean is (80 + 90 + 60) / 3, rock's is 70.
    assert_eq!(result.top_genres.len(), 2);
    assert_eq!(result.top_genres[0].key, GroupValue::Text("pop".to_string()));
    assert!((result.top_genres[0].mean_value - 230.0 / 3.0).abs() < 1e-9);

    // The yearly view keeps years ascending.
    assert!(!result.yearly_top_artists.is_empty());
    assert_eq!(
        result.yearly_top_artists[0].outer,
        Some(GroupValue::Year(2020))
    );

    assert_eq!(result.scatter_tracks.len(), 4);
    assert!(result.mean_popularity > 0.0);
}

#[tokio::test]
async fn test_analyze_selected_genre_filters_artists() {
    let (_temp_dir, path) = write_fixture(&sample_lines());
    let dataset = Arc::new(
        load_dataset_async(path.to_str().unwrap().to_string())
            .await
            .unwrap(),
    );

    let result = analyze_tracks_async(dataset, "rock".to_string())
        .await
        .unwrap();

    assert_eq!(result.top_artists.len(), 1);
    assert_eq!(result.top_artists[0].key, GroupValue::Text("Cleo".to_string()));
    assert_eq!(result.scatter_tracks.len(), 1);
}

#[tokio::test]
async fn test_analyze_unknown_genre_yields_empty_views() {
    let (_temp_dir, path) = write_fixture(&sample_lines());
    let dataset = Arc::new(
        load_dataset_async(path.to_str().unwrap().to_string())
            .await
            .unwrap(),
    );

    let result = analyze_tracks_async(dataset, "jazz".to_string()).await;
    tokio_test::assert_ok!(&result);

    let result = result.unwrap();
    assert!(result.top_artists.is_empty());
    assert!(result.scatter_tracks.is_empty());
    // Dataset-wide views are unaffected by the selection.
    assert_eq!(result.top_genres.len(), 2);
}

#[tokio::test]
async fn test_analyze_without_year_column_skips_timeline() {
    let (_temp_dir, path) = write_fixture(&[
        "artists,track_name,track_genre,popularity,danceability,energy",
        "Asha,Sunrise,pop,80,0.8,0.7",
    ]);
    let dataset = Arc::new(
        load_dataset_async(path.to_str().unwrap().to_string())
            .await
            .unwrap(),
    );

    let result = analyze_tracks_async(dataset, ALL_GENRES.to_string())
        .await
        .unwrap();
    assert!(result.yearly_top_artists.is_empty());
    assert_eq!(result.track_count, 1);
}

#[test]
fn test_cache_key() {
    let key1 = CacheKey {
        genre: ALL_GENRES.to_string(),
    };
    let key2 = CacheKey {
        genre: ALL_GENRES.to_string(),
    };
    let key3 = CacheKey {
        genre: "pop".to_string(),
    };

    assert_eq!(key1, key2);
    assert_ne!(key1, key3);

    let mut cache = CacheManager::new();
    assert!(cache.is_empty());
    cache.store(key1.clone(), crate::types::AnalysisResult::default());
    assert!(cache.get(&key2).is_some());
    assert!(cache.get(&key3).is_none());
    assert_eq!(cache.len(), 1);

    cache.clear();
    assert!(cache.is_empty());
}
