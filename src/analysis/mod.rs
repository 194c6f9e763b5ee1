mod cache;
pub mod dataset;

pub use cache::CacheManager;
pub use dataset::{analyze_tracks_async, load_dataset_async, DatasetError, ALL_GENRES};

#[cfg(test)]
mod tests;
