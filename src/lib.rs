//! # Track Statistics Visualization Library
//!
//! `trackstats` is a library for analyzing and visualizing the Spotify
//! tracks dataset. It provides functionality to load the dataset from CSV,
//! derive ranked aggregate views (top genres, top artists, yearly
//! popularity), and generate interactive visualizations driven by a genre
//! selector.
//!
//! ## Features
//!
//! - Load the tracks dataset with strict numeric validation
//! - Clean, group, rank, and slice rows into top-N views
//! - Average popularity by genre, artist, and year × artist
//! - Genre filtering with cached recomputation
//! - Generate interactive visualizations
//! - Export aggregate views as JSON
//!
//! ## Example
//!
//! ```no_run
//! use trackstats::TrackStatsApp;
//! use std::sync::{Arc, Mutex};
//! use eframe::NativeOptions;
//!
//! // Create a new application instance
//! let app = Arc::new(Mutex::new(TrackStatsApp::default()));
//! let app_wrapper = trackstats::app::AppWrapper { app };
//!
//! // Run the application with eframe
//! eframe::run_native(
//!     "Track Statistics",
//!     NativeOptions::default(),
//!     Box::new(|_cc| Ok(Box::new(app_wrapper))),
//! ).unwrap();
//! ```

pub mod analysis;
pub mod app;
pub mod plotting;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use app::App as TrackStatsApp;
pub use types::{AnalysisResult, CacheKey, Dataset, Field, GroupValue, RankedEntry, Track};
