//! Collaborator contracts consumed by the pipeline and scheduler.
//!
//! Every external system sits behind one of these traits so the core can be
//! exercised with in-process fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

use crate::error::{CollaboratorError, StoreError};
use crate::models::{ConstraintSet, Event, Recommendation, ScoredVenue, Synthesis, Venue, VenueQuery};

/// Calendar read/write transport
#[async_trait]
pub trait CalendarTransport: Send + Sync {
    /// Timed events starting inside `[from, to)`, ordered by start time
    async fn list_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, CollaboratorError>;

    /// Attach a note to an event
    async fn annotate(&self, event_id: &str, text: &str) -> Result<(), CollaboratorError>;

    /// Startup reachability check
    async fn probe(&self) -> Result<(), CollaboratorError> {
        let now = Utc::now();
        self.list_events(now, now + chrono::Duration::minutes(1))
            .await
            .map(|_| ())
    }
}

/// Geospatial venue search
#[async_trait]
pub trait VenueSearch: Send + Sync {
    async fn search(&self, query: &VenueQuery) -> Result<Vec<Venue>, CollaboratorError>;
}

/// Text-completion service producing the justification and menu suggestions
#[async_trait]
pub trait TextSynthesis: Send + Sync {
    async fn synthesize(
        &self,
        constraints: &ConstraintSet,
        top_venues: &[ScoredVenue],
    ) -> Result<Synthesis, CollaboratorError>;
}

/// Best-effort delivery of a finished recommendation
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, recommendation: &Recommendation) -> Result<(), CollaboratorError>;
}

/// Durable set of event identifiers already handled.
///
/// Guarantees:
/// - `mark` is idempotent; marking twice is not an error.
/// - once marked, `has` stays true for the store's retention.
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    async fn has(&self, event_id: &str) -> Result<bool, StoreError>;

    async fn mark(&self, event_id: &str) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}

/// Optional persistence of the session memory window (last writer wins)
#[async_trait]
pub trait MemoryPersistence: Send + Sync {
    async fn load(&self) -> Result<Vec<String>, StoreError>;

    async fn save(&self, entries: &[String]) -> Result<(), StoreError>;
}

/// Run a collaborator call with an upper time bound; elapsing is a recoverable error
pub async fn bounded<T, F>(service: &'static str, limit: Duration, call: F) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout {
            service,
            secs: limit.as_secs(),
        }),
    }
}
