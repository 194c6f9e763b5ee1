pub mod aggregation;
pub mod export;

pub use aggregation::{
    clean, distinct_sorted_values, downsample_points, filter_by_category, top_n_by_group,
    EngineError,
};
pub use export::export_views_json;
