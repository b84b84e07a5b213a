use crate::core::vocabulary::Vocabulary;
use crate::models::{normalize_tag, ConstraintSet, ScoreBreakdown, ScoringWeights, Venue};
use std::collections::BTreeSet;

/// Calculate a venue score (0-100) against the meeting constraints
///
/// Scoring formula:
/// score = (
///     health_fit * 0.40 +      # Share of diet/health requirements the venue meets
///     popularity * 0.30 +      # Rating scaled to 0-100
///     proximity * 0.20 +       # Closer = higher, zero beyond the max radius
///     novelty * 0.10           # Penalizes cuisines suggested recently
/// )
pub fn calculate_venue_score(
    venue: &Venue,
    constraints: &ConstraintSet,
    recent: &[String],
    memory_capacity: usize,
    weights: &ScoringWeights,
    max_radius_km: f64,
    vocabulary: &Vocabulary,
) -> (f64, ScoreBreakdown) {
    let (health_fit, matched_requirements) = calculate_health_fit(venue, constraints, vocabulary);
    let popularity = calculate_popularity(venue.rating);
    let proximity = calculate_proximity(venue.distance_km, max_radius_km);
    let (novelty, recent_repeats) = calculate_novelty(venue, recent, memory_capacity);

    let total = health_fit * weights.health_fit
        + popularity * weights.popularity
        + proximity * weights.proximity
        + novelty * weights.novelty;

    let breakdown = ScoreBreakdown {
        health_fit,
        popularity,
        proximity,
        novelty,
        matched_requirements,
        recent_repeats,
    };

    (total.clamp(0.0, 100.0), breakdown)
}

/// Share of requirements the venue meets (0-100), 100 when nothing was asked for
pub fn calculate_health_fit(
    venue: &Venue,
    constraints: &ConstraintSet,
    vocabulary: &Vocabulary,
) -> (f64, Vec<String>) {
    let requirements = constraints.requirements();
    if requirements.is_empty() {
        return (100.0, Vec::new());
    }

    let venue_tags: BTreeSet<String> = venue
        .tags
        .iter()
        .chain(venue.cuisine.iter())
        .map(|t| normalize_tag(t))
        .collect();

    let matched: Vec<String> = requirements
        .iter()
        .filter(|req| {
            vocabulary
                .accepted_tags(req)
                .iter()
                .any(|tag| venue_tags.contains(tag))
        })
        .map(|req| req.to_string())
        .collect();

    let fit = matched.len() as f64 / requirements.len() as f64 * 100.0;
    (fit, matched)
}

/// Rating on a 0-5 scale mapped to 0-100
#[inline]
pub fn calculate_popularity(rating: f64) -> f64 {
    (rating.clamp(0.0, 5.0) / 5.0) * 100.0
}

/// Proximity score (0-100)
/// Linear decay from 100 at the origin to 0 at the radius, so the score is
/// continuous at the edge. Unknown distance scores zero.
#[inline]
pub fn calculate_proximity(distance_km: Option<f64>, max_radius_km: f64) -> f64 {
    let distance = match distance_km {
        Some(d) if d.is_finite() && d >= 0.0 => d,
        _ => return 0.0,
    };
    if max_radius_km <= 0.0 {
        return 0.0;
    }

    ((1.0 - distance / max_radius_km) * 100.0).max(0.0)
}

/// Novelty score (0-100)
/// Each recent memory slot naming this venue's cuisine (or the venue itself)
/// removes an equal share; all slots matching scores zero.
#[inline]
pub fn calculate_novelty(venue: &Venue, recent: &[String], memory_capacity: usize) -> (f64, usize) {
    let repeats = recent.iter().filter(|key| venue.matches_key(key)).count();
    if memory_capacity == 0 {
        return (100.0, repeats);
    }
    let penalty = repeats.min(memory_capacity) as f64 / memory_capacity as f64;
    ((1.0 - penalty) * 100.0, repeats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn venue(cuisine: &str, rating: f64, distance_km: Option<f64>, tags: &[&str]) -> Venue {
        Venue {
            name: format!("{} Place", cuisine),
            address: "1 Market St".to_string(),
            rating,
            price_tier: Some(2),
            distance_km,
            cuisine: Some(cuisine.to_string()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn constraints(diet: Option<&str>, health: &[&str]) -> ConstraintSet {
        let start = DateTime::parse_from_rfc3339("2026-10-20T12:00:00Z").unwrap();
        ConstraintSet {
            area: Some("San Francisco".to_string()),
            venue_hint: None,
            time_window: crate::models::TimeWindow { start, end: start },
            diet: diet.map(str::to_string),
            health: health.iter().map(|h| h.to_string()).collect(),
        }
    }

    #[test]
    fn test_health_fit_without_requirements_is_full() {
        let vocab = Vocabulary::default();
        let (fit, matched) = calculate_health_fit(&venue("thai", 4.0, None, &[]), &constraints(None, &[]), &vocab);
        assert_eq!(fit, 100.0);
        assert!(matched.is_empty());
    }

    #[test]
    fn test_health_fit_is_proportional() {
        let vocab = Vocabulary::default();
        let v = venue("mediterranean", 4.0, None, &["vegetarian"]);
        let c = constraints(Some("vegetarian"), &["low-glycemic", "nut-free"]);
        let (fit, matched) = calculate_health_fit(&v, &c, &vocab);
        // vegetarian via tag, low-glycemic via mediterranean cuisine, nut-free unmet
        assert!((fit - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(matched, vec!["vegetarian", "low-glycemic"]);
    }

    #[test]
    fn test_health_fit_zero_when_unsatisfiable() {
        let vocab = Vocabulary::default();
        let (fit, _) = calculate_health_fit(&venue("bbq", 5.0, None, &[]), &constraints(Some("vegan"), &[]), &vocab);
        assert_eq!(fit, 0.0);
    }

    #[test]
    fn test_popularity_scale() {
        assert_eq!(calculate_popularity(5.0), 100.0);
        assert_eq!(calculate_popularity(2.5), 50.0);
        assert_eq!(calculate_popularity(7.0), 100.0);
        assert_eq!(calculate_popularity(-1.0), 0.0);
    }

    #[test]
    fn test_proximity_score() {
        // Very close = high score
        assert!(calculate_proximity(Some(0.05), 3.0) > 95.0);

        // At max radius = zero score
        assert_eq!(calculate_proximity(Some(3.0), 3.0), 0.0);
        assert_eq!(calculate_proximity(Some(10.0), 3.0), 0.0);

        // Unknown distance = zero score
        assert_eq!(calculate_proximity(None, 3.0), 0.0);

        // Monotonically decreasing
        assert!(calculate_proximity(Some(0.5), 3.0) > calculate_proximity(Some(1.5), 3.0));
    }

    #[test]
    fn test_proximity_has_no_step_at_radius() {
        assert!((calculate_proximity(Some(1.5), 3.0) - 50.0).abs() < 1e-9);
        assert!(calculate_proximity(Some(2.999), 3.0) < 0.1);
        assert_eq!(calculate_proximity(Some(3.0), 3.0), 0.0);
    }

    #[test]
    fn test_novelty_linear_per_match() {
        let v = venue("thai", 4.0, None, &[]);
        let none: Vec<String> = vec![];
        let one = vec!["thai".to_string()];
        let mixed = vec!["thai".to_string(), "pizza".to_string(), "thai".to_string()];
        let all = vec!["thai".to_string(); 3];

        assert_eq!(calculate_novelty(&v, &none, 3).0, 100.0);
        assert!((calculate_novelty(&v, &one, 3).0 - 200.0 / 3.0).abs() < 1e-9);
        assert!((calculate_novelty(&v, &mixed, 3).0 - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(calculate_novelty(&v, &all, 3), (0.0, 3));
    }

    #[test]
    fn test_total_score_is_weighted_and_bounded() {
        let vocab = Vocabulary::default();
        let weights = ScoringWeights::default();
        let v = venue("salad", 5.0, Some(0.0), &["low-glycemic"]);
        let (score, breakdown) = calculate_venue_score(
            &v,
            &constraints(None, &["low-glycemic"]),
            &[],
            3,
            &weights,
            3.0,
            &vocab,
        );
        assert!((score - 100.0).abs() < 1e-9);
        assert_eq!(breakdown.health_fit, 100.0);
        assert_eq!(breakdown.novelty, 100.0);

        let heavy = ScoringWeights {
            health_fit: 2.0,
            popularity: 2.0,
            proximity: 2.0,
            novelty: 2.0,
        };
        let (clamped, _) = calculate_venue_score(&v, &constraints(None, &[]), &[], 3, &heavy, 3.0, &vocab);
        assert_eq!(clamped, 100.0);
    }
}
