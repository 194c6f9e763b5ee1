use std::fs;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use trackstats::analysis::{analyze_tracks_async, load_dataset_async, ALL_GENRES};
use trackstats::app::App;
use trackstats::types::GroupValue;

fn write_sample_dataset(temp_dir: &TempDir) -> String {
    let path = temp_dir.path().join("tracks.csv");
    let mut file = fs::File::create(&path).unwrap();

    let lines = [
        "artists,track_name,track_genre,popularity,danceability,energy,release_date",
        "Asha,Sunrise,pop,80,0.8,0.7,2020-03-01",
        "Basil,Moonlight,pop,90,0.6,0.5,2020-07-15",
        "Asha,Horizon,pop,60,0.7,0.9,2021-01-02",
        "Cleo,Undertow,rock,70,0.4,0.95,2021-06-30",
        "Dara,Static,rock,55,0.5,0.85,2020-11-20",
        "Elio,Glasswing,electro,65,0.9,0.6,2021-04-04",
        // Missing artist: cleaned away before any aggregation.
        ",Nameless,pop,50,0.5,0.5,2020-01-01",
        // Out-of-domain popularity: dropped, not clamped.
        "Fenn,Overdrive,rock,140,0.6,0.8,2021-09-09",
    ];
    for line in &lines {
        writeln!(file, "{}", line).unwrap();
    }

    path.to_str().unwrap().to_string()
}

#[tokio::test]
async fn test_full_workflow() {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = write_sample_dataset(&temp_dir);

    // Initialize app
    let app = Arc::new(Mutex::new(App::default()));
    {
        let mut app = app.lock().unwrap();
        app.csv_path = csv_path.clone();
    }

    // Test dataset loading and analysis
    let dataset = Arc::new(load_dataset_async(csv_path.clone()).await.unwrap());
    {
        let mut app = app.lock().unwrap();
        assert_eq!(app.track_count, 0);
        assert!(app.top_artists.is_empty());

        let result = analyze_tracks_async(Arc::clone(&dataset), ALL_GENRES.to_string())
            .await
            .unwrap();
        app.dataset = Some(Arc::clone(&dataset));
        app.update_with_result(result);

        // Two rows are unusable (missing artist, popularity out of domain).
        assert_eq!(app.track_count, 6);
        assert!(!app.top_genres.is_empty());
        assert!(!app.top_artists.is_empty());
        assert_eq!(
            app.available_genres,
            vec!["electro", "pop", "rock"]
        );
        assert_eq!(app.selected_genre, ALL_GENRES);
    }

    // Test genre selection
    {
        let mut app = app.lock().unwrap();
        app.selected_genre = "rock".to_string();

        let result = analyze_tracks_async(Arc::clone(&dataset), "rock".to_string())
            .await
            .unwrap();
        app.update_with_result(result);

        let artists: Vec<String> = app
            .top_artists
            .iter()
            .map(|entry| entry.key.to_string())
            .collect();
        assert_eq!(artists, vec!["Cleo", "Dara"]);
    }

    // Test plot generation
    {
        let mut app = app.lock().unwrap();
        app.plot_path = temp_dir
            .path()
            .join("test_plot.png")
            .to_str()
            .unwrap()
            .to_string();

        // Test each plotted view
        for metric in &[
            "Top Genres",
            "Top Artists",
            "Danceability vs Energy",
            "Popularity Timeline",
        ] {
            app.current_metric = metric.to_string();
            assert!(trackstats::plotting::generate_plot(&app).is_ok());
            assert!(fs::metadata(&app.plot_path).is_ok());
        }
    }

    // Test the yearly timeline ordering
    {
        let app = app.lock().unwrap();
        let years: Vec<_> = app
            .yearly_top_artists
            .iter()
            .map(|entry| entry.outer.clone())
            .collect();
        let mut sorted_years = years.clone();
        sorted_years.sort();
        assert_eq!(years, sorted_years);
        assert_eq!(years.first(), Some(&Some(GroupValue::Year(2020))));
    }

    // Test caching
    {
        let app = app.lock().unwrap();
        assert!(app.get_cached_result(ALL_GENRES).is_some());
        assert!(app.get_cached_result("rock").is_some());
        assert!(app.get_cached_result("jazz").is_none());
        assert_eq!(app.analysis_cache.len(), 2);
    }
}

#[tokio::test]
async fn test_error_handling() {
    // Test invalid dataset path
    {
        let result = load_dataset_async("/nonexistent/path/tracks.csv".to_string()).await;
        assert!(result.is_err());
    }

    // Test unknown genre selection: empty views, not an error
    {
        let temp_dir = TempDir::new().unwrap();
        let csv_path = write_sample_dataset(&temp_dir);
        let dataset = Arc::new(load_dataset_async(csv_path).await.unwrap());

        let result = analyze_tracks_async(dataset, "jazz".to_string())
            .await
            .unwrap();
        assert!(result.top_artists.is_empty());
        assert!(result.scatter_tracks.is_empty());
        assert!(!result.top_genres.is_empty());
    }
}

#[tokio::test]
async fn test_cache_survives_selection_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = write_sample_dataset(&temp_dir);
    let dataset = Arc::new(load_dataset_async(csv_path).await.unwrap());

    let app = Arc::new(Mutex::new(App::default()));
    {
        let mut app = app.lock().unwrap();
        app.dataset = Some(Arc::clone(&dataset));

        let result = analyze_tracks_async(Arc::clone(&dataset), ALL_GENRES.to_string())
            .await
            .unwrap();
        app.update_with_result(result);
    }

    // Switching back to an analyzed genre reuses the cached result.
    {
        let mut app = app.lock().unwrap();
        let cached = app.get_cached_result(ALL_GENRES).unwrap();
        let track_count = cached.track_count;
        app.update_with_result(cached);
        assert_eq!(app.track_count, track_count);
    }
}
