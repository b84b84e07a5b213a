use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::core::extractor::ConstraintExtractor;
use crate::core::memory::SessionMemory;
use crate::core::scorer::VenueScorer;
use crate::models::{ConstraintSet, Event, PipelineOutcome, Recommendation, SkipReason, VenueQuery};
use crate::services::traits::{bounded, MemoryPersistence, TextSynthesis, VenueSearch};

/// Default upper bound for a single collaborator call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of venues requested from the search collaborator
pub const DEFAULT_MAX_RESULTS: u8 = 10;

/// Turns one calendar event into a recommendation.
///
/// # Pipeline stages
/// 1. Constraint extraction (local, infallible)
/// 2. Venue search (bounded)
/// 3. Scoring against session memory
/// 4. Text synthesis (bounded)
/// 5. Memory update with the top venue
///
/// Collaborator failures end the run with a skip; they never propagate.
pub struct RecommendationPipeline {
    extractor: ConstraintExtractor,
    scorer: VenueScorer,
    search: Arc<dyn VenueSearch>,
    synthesis: Arc<dyn TextSynthesis>,
    memory: SessionMemory,
    persistence: Option<Arc<dyn MemoryPersistence>>,
    call_timeout: Duration,
    max_results: u8,
}

impl RecommendationPipeline {
    pub fn new(
        extractor: ConstraintExtractor,
        scorer: VenueScorer,
        search: Arc<dyn VenueSearch>,
        synthesis: Arc<dyn TextSynthesis>,
    ) -> Self {
        Self {
            extractor,
            scorer,
            search,
            synthesis,
            memory: SessionMemory::new(),
            persistence: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_memory(mut self, memory: SessionMemory) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn MemoryPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_max_results(mut self, max_results: u8) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn memory(&self) -> &SessionMemory {
        &self.memory
    }

    /// Load the persisted window, if any. A failed load keeps the current window.
    pub async fn restore_memory(&mut self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        match persistence.load().await {
            Ok(entries) => {
                self.memory = SessionMemory::from_entries(entries, self.memory.capacity());
                tracing::info!("Restored session memory: {:?}", self.memory.recent());
            }
            Err(e) => tracing::warn!("Failed to restore session memory: {}", e),
        }
    }

    fn query_for(&self, constraints: &ConstraintSet) -> VenueQuery {
        VenueQuery {
            area: constraints.area.clone(),
            venue_hint: constraints.venue_hint.clone(),
            diet: constraints.diet.clone(),
            health: constraints.health.iter().cloned().collect(),
            max_results: self.max_results,
        }
    }

    /// Run all stages for one event
    pub async fn run(&mut self, event: &Event) -> PipelineOutcome {
        let skip = |reason: SkipReason| {
            tracing::info!("Skipping event {}: {}", event.event_id, reason);
            PipelineOutcome::Skipped {
                event_id: event.event_id.clone(),
                reason,
            }
        };

        let constraints = self.extractor.extract(event);
        tracing::debug!(
            "Constraints for {}: area={:?} hint={:?} requirements={:?}",
            event.event_id,
            constraints.area,
            constraints.venue_hint,
            constraints.requirements()
        );

        let query = self.query_for(&constraints);
        let venues = match bounded("venue search", self.call_timeout, self.search.search(&query)).await {
            Ok(venues) => venues,
            Err(e) => return skip(SkipReason::SearchFailed(e.to_string())),
        };

        if venues.is_empty() {
            return skip(SkipReason::NoVenues);
        }

        let ranked = self.scorer.score(venues, &constraints, &self.memory);
        if ranked.is_empty() {
            return skip(SkipReason::NoVenues);
        }

        let synthesis = match bounded(
            "synthesis",
            self.call_timeout,
            self.synthesis.synthesize(&constraints, &ranked),
        )
        .await
        {
            Ok(synthesis) => synthesis,
            Err(e) => return skip(SkipReason::SynthesisFailed(e.to_string())),
        };

        let top_key = ranked[0].venue.memory_key();
        self.memory.record(&top_key);
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save(&self.memory.recent()).await {
                tracing::warn!("Failed to persist session memory: {}", e);
            }
        }

        tracing::info!(
            "Recommended {} for event {} ({:.1}/100)",
            ranked[0].venue.name,
            event.event_id,
            ranked[0].score
        );

        PipelineOutcome::Recommended(Box::new(Recommendation {
            id: uuid::Uuid::new_v4(),
            event_id: event.event_id.clone(),
            event_title: event.title.clone(),
            constraints,
            venues: ranked,
            justification: synthesis.justification,
            menu_suggestions: synthesis.menu_suggestions,
            generated_at: Utc::now(),
        }))
    }
}
