// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    normalize_tag, ConstraintSet, Event, PipelineOutcome, Recommendation, ScoreBreakdown,
    ScoredVenue, ScoringWeights, SkipReason, Synthesis, TimeWindow, Venue,
};
pub use requests::{TickRequest, VenueQuery};
pub use responses::{
    ErrorResponse, EventReport, EventStatus, HealthResponse, SchedulerState, StatusResponse,
    TickReport,
};
