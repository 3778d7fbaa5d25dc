//! Hybrid Vector + Graph scoring
//!
//! Vector search produces an oversampled candidate window; edges between
//! candidates in that window boost their scores before the final ranking.

pub mod fusion;
pub mod query;
pub mod scorer;

/// Re-export key types for external use
pub use fusion::Weights;
pub use query::{GraphSearchResponse, HybridQuery, HybridResponse, SearchMode};
pub use scorer::HybridScorer;
