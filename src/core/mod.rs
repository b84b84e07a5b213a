// Core algorithm exports
pub mod distance;
pub mod extractor;
pub mod filters;
pub mod memory;
pub mod pipeline;
pub mod scheduler;
pub mod scorer;
pub mod scoring;
pub mod vocabulary;

pub use distance::{haversine_distance, Origin};
pub use extractor::ConstraintExtractor;
pub use filters::LunchFilter;
pub use memory::{SessionMemory, DEFAULT_MEMORY_CAPACITY};
pub use pipeline::RecommendationPipeline;
pub use scheduler::Scheduler;
pub use scorer::{compare_ranked, VenueScorer};
pub use scoring::calculate_venue_score;
pub use vocabulary::{KeywordRule, Vocabulary, VocabularyError};
