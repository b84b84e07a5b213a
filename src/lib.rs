//! Lunza - calendar-driven lunch venue recommendations
//!
//! This library watches a calendar for lunch meetings, extracts location and
//! dietary constraints from each one, ranks nearby venues and hands a short
//! recommendation back to the calendar or another notification channel.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{
    ConstraintExtractor, LunchFilter, RecommendationPipeline, Scheduler, SessionMemory,
    VenueScorer, Vocabulary,
};
pub use error::{CollaboratorError, StartupError, StoreError};
pub use models::{
    ConstraintSet, Event, PipelineOutcome, Recommendation, ScoredVenue, ScoringWeights,
    SkipReason, TickReport, Venue,
};
