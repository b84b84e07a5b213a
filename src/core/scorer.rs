use crate::core::memory::SessionMemory;
use crate::core::scoring::calculate_venue_score;
use crate::core::vocabulary::Vocabulary;
use crate::models::{ConstraintSet, ScoredVenue, ScoringWeights, Venue};
use std::cmp::Ordering;
use std::sync::Arc;

/// Default number of venues returned per recommendation
pub const DEFAULT_TOP_N: usize = 3;

/// Default radius beyond which proximity scores zero
pub const DEFAULT_MAX_RADIUS_KM: f64 = 3.0;

/// Ranks candidate venues against a constraint set
///
/// # Ranking
/// 1. Weighted score, descending
/// 2. Raw rating, descending
/// 3. Distance, ascending (unknown distance sorts last)
#[derive(Debug, Clone)]
pub struct VenueScorer {
    weights: ScoringWeights,
    max_radius_km: f64,
    top_n: usize,
    vocabulary: Arc<Vocabulary>,
}

impl VenueScorer {
    pub fn new(weights: ScoringWeights, max_radius_km: f64, top_n: usize, vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            weights,
            max_radius_km,
            top_n,
            vocabulary,
        }
    }

    pub fn with_default_weights() -> Self {
        Self::new(
            ScoringWeights::default(),
            DEFAULT_MAX_RADIUS_KM,
            DEFAULT_TOP_N,
            Arc::new(Vocabulary::default()),
        )
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score every venue and return the best `top_n`, best first.
    ///
    /// An empty input yields an empty output; requirements no venue can meet
    /// simply score zero health fit.
    pub fn score(
        &self,
        venues: Vec<Venue>,
        constraints: &ConstraintSet,
        memory: &SessionMemory,
    ) -> Vec<ScoredVenue> {
        let recent = memory.recent();

        let mut scored: Vec<ScoredVenue> = venues
            .into_iter()
            .map(|venue| {
                let (score, breakdown) = calculate_venue_score(
                    &venue,
                    constraints,
                    &recent,
                    memory.capacity(),
                    &self.weights,
                    self.max_radius_km,
                    &self.vocabulary,
                );
                ScoredVenue {
                    venue,
                    score,
                    breakdown,
                }
            })
            .collect();

        scored.sort_by(compare_ranked);
        scored.truncate(self.top_n);

        if let Some(best) = scored.first() {
            tracing::debug!(
                "Top venue {} scored {:.1} ({})",
                best.venue.name,
                best.score,
                best.breakdown.rationale()
            );
        }

        scored
    }
}

impl Default for VenueScorer {
    fn default() -> Self {
        Self::with_default_weights()
    }
}

/// Ordering for ranked output: score desc, then rating desc, then distance asc
pub fn compare_ranked(a: &ScoredVenue, b: &ScoredVenue) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.venue
                .rating
                .partial_cmp(&a.venue.rating)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| compare_distance(a.venue.distance_km, b.venue.distance_km))
}

fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
