use eframe::App as EApp;
use egui::TextureHandle;
use std::sync::{Arc, Mutex};

use crate::analysis::{CacheManager, ALL_GENRES};
use crate::types::{AnalysisResult, CacheKey, Dataset, RankedEntry, ScatterPoint};

/// Main application state
#[derive(Clone)]
pub struct App {
    pub csv_path: String,
    pub dataset: Option<Arc<Dataset>>,
    pub track_count: usize,
    pub artist_count: usize,
    pub genre_count: usize,
    pub mean_popularity: f64,
    pub popularity_std_dev: f64,
    pub top_genres: Vec<RankedEntry>,
    pub top_artists: Vec<RankedEntry>,
    pub yearly_top_artists: Vec<RankedEntry>,
    pub scatter_tracks: Vec<ScatterPoint>,
    pub plot_path: String,
    pub plot_texture: Option<TextureHandle>,
    pub current_metric: String,
    pub update_needed: bool,
    pub is_loading: bool,
    pub is_analyzing: bool,
    pub use_log_scale: bool,
    pub selected_genre: String,
    pub available_genres: Vec<String>,
    pub analysis_cache: CacheManager,
    pub last_analysis_time: Option<f64>,
    pub rows_per_second: Option<f64>,
    pub processing_stats: String,
    pub analysis_result: Option<AnalysisResult>,
    pub error_message: Option<String>,
}

impl App {
    /// Update the app state with new analysis results
    pub fn update_with_result(&mut self, result: AnalysisResult) {
        // Genres are dataset-wide; populate the selector after the first
        // analysis of a loaded dataset.
        if self.available_genres.is_empty() {
            self.available_genres = result.available_genres.clone();
        }

        // Cache the result for the current selection
        let cache_key = CacheKey {
            genre: self.selected_genre.clone(),
        };
        self.analysis_cache.store(cache_key, result.clone());

        // Update performance metrics
        self.last_analysis_time = Some(result.elapsed_time);
        self.rows_per_second = if result.elapsed_time > 0.0 {
            Some(result.track_count as f64 / result.elapsed_time)
        } else {
            None
        };
        self.processing_stats = result.processing_stats.clone();

        // Update stats and views
        self.track_count = result.track_count;
        self.artist_count = result.artist_count;
        self.genre_count = result.genre_count;
        self.mean_popularity = result.mean_popularity;
        self.popularity_std_dev = result.popularity_std_dev;
        self.top_genres = result.top_genres.clone();
        self.top_artists = result.top_artists.clone();
        self.yearly_top_artists = result.yearly_top_artists.clone();
        self.scatter_tracks = result.scatter_tracks.clone();
        self.update_needed = true;
        self.analysis_result = Some(result);
        self.error_message = None;
    }

    /// Get a cached result for the given genre selection
    pub fn get_cached_result(&self, genre: &str) -> Option<AnalysisResult> {
        let cache_key = CacheKey {
            genre: genre.to_string(),
        };
        self.analysis_cache.get(&cache_key).cloned()
    }

    /// Forget the loaded dataset and all cached results, e.g. before
    /// loading a different CSV file
    pub fn clear_loaded_dataset(&mut self) {
        self.dataset = None;
        self.analysis_cache.clear();
        self.available_genres.clear();
        self.selected_genre = ALL_GENRES.to_string();
    }
}

impl Default for App {
    fn default() -> Self {
        Self {
            csv_path: String::new(),
            dataset: None,
            track_count: 0,
            artist_count: 0,
            genre_count: 0,
            mean_popularity: 0.0,
            popularity_std_dev: 0.0,
            top_genres: Vec::new(),
            top_artists: Vec::new(),
            yearly_top_artists: Vec::new(),
            scatter_tracks: Vec::new(),
            plot_path: "track_views.png".to_string(),
            plot_texture: None,
            current_metric: "Top Genres".to_string(),
            update_needed: false,
            is_loading: false,
            is_analyzing: false,
            use_log_scale: false,
            selected_genre: ALL_GENRES.to_string(),
            available_genres: Vec::new(),
            analysis_cache: CacheManager::new(),
            last_analysis_time: None,
            rows_per_second: None,
            processing_stats: String::new(),
            analysis_result: None,
            error_message: None,
        }
    }
}

/// Thread-safe wrapper around App for use with eframe
pub struct AppWrapper {
    pub app: Arc<Mutex<App>>,
}

impl EApp for AppWrapper {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Ok(mut app) = self.app.lock() {
            super::ui::draw_ui(&mut app, ctx, Arc::clone(&self.app));
        } else {
            eprintln!("Failed to acquire app lock in update");
        }
    }
}
