use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use validator::Validate;

/// Calendar event as handed over by the calendar transport
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Event {
    #[validate(length(min = 1))]
    #[serde(rename = "eventId")]
    pub event_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(rename = "startTime")]
    pub start_time: DateTime<FixedOffset>,
    #[serde(rename = "endTime")]
    pub end_time: DateTime<FixedOffset>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub attendees: Vec<String>,
}

/// Start/end of the meeting, carried along as metadata only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl TimeWindow {
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes().max(0)
    }
}

/// Normalized location and dietary requirements derived from one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet {
    pub area: Option<String>,
    #[serde(rename = "venueHint")]
    pub venue_hint: Option<String>,
    #[serde(rename = "timeWindow")]
    pub time_window: TimeWindow,
    pub diet: Option<String>,
    pub health: BTreeSet<String>,
}

impl ConstraintSet {
    /// Diet label followed by every health flag, in a stable order
    pub fn requirements(&self) -> Vec<&str> {
        self.diet
            .iter()
            .map(String::as_str)
            .chain(self.health.iter().map(String::as_str))
            .collect()
    }

    pub fn has_requirements(&self) -> bool {
        self.diet.is_some() || !self.health.is_empty()
    }
}

/// Candidate eating establishment returned by the venue search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub name: String,
    #[serde(default)]
    pub address: String,
    /// 0-5 stars
    #[serde(default)]
    pub rating: f64,
    #[serde(rename = "priceTier", default)]
    pub price_tier: Option<u8>,
    #[serde(rename = "distanceKm", default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Venue {
    /// Identifier recorded into session memory once this venue is picked
    pub fn memory_key(&self) -> String {
        match &self.cuisine {
            Some(cuisine) => normalize_tag(cuisine),
            None => normalize_tag(&self.name),
        }
    }

    /// True when `key` names this venue's cuisine, one of its tags, or the venue itself
    pub fn matches_key(&self, key: &str) -> bool {
        let key = normalize_tag(key);
        self.memory_key() == key
            || normalize_tag(&self.name) == key
            || self.tags.iter().any(|t| normalize_tag(t) == key)
    }
}

/// Lowercase, hyphen-separated form used for every tag comparison
pub fn normalize_tag(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Per-component sub-scores, each on a 0-100 scale before weighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    #[serde(rename = "healthFit")]
    pub health_fit: f64,
    pub popularity: f64,
    pub proximity: f64,
    pub novelty: f64,
    #[serde(rename = "matchedRequirements")]
    pub matched_requirements: Vec<String>,
    #[serde(rename = "recentRepeats")]
    pub recent_repeats: usize,
}

impl ScoreBreakdown {
    pub fn rationale(&self) -> String {
        let mut parts = vec![
            format!("health fit {:.0}", self.health_fit),
            format!("popularity {:.0}", self.popularity),
            format!("proximity {:.0}", self.proximity),
            format!("novelty {:.0}", self.novelty),
        ];
        if !self.matched_requirements.is_empty() {
            parts.push(format!("meets {}", self.matched_requirements.join(", ")));
        }
        if self.recent_repeats > 0 {
            parts.push(format!("recently suggested x{}", self.recent_repeats));
        }
        parts.join("; ")
    }
}

/// Venue plus its weighted score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredVenue {
    pub venue: Venue,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Scoring weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub health_fit: f64,
    pub popularity: f64,
    pub proximity: f64,
    pub novelty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            health_fit: 0.40,
            popularity: 0.30,
            proximity: 0.20,
            novelty: 0.10,
        }
    }
}

/// Output of the text-synthesis collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub justification: String,
    #[serde(rename = "menuSuggestions", alias = "menu_suggestions", default)]
    pub menu_suggestions: Vec<String>,
}

/// Final recommendation for one event, handed to the notification channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: uuid::Uuid,
    #[serde(rename = "eventId")]
    pub event_id: String,
    #[serde(rename = "eventTitle")]
    pub event_title: String,
    pub constraints: ConstraintSet,
    pub venues: Vec<ScoredVenue>,
    pub justification: String,
    #[serde(rename = "menuSuggestions")]
    pub menu_suggestions: Vec<String>,
    #[serde(rename = "generatedAt")]
    pub generated_at: DateTime<Utc>,
}

impl Recommendation {
    pub fn top_venue(&self) -> Option<&ScoredVenue> {
        self.venues.first()
    }

    /// Plain-text note used for calendar annotations and webhook payloads
    pub fn render_note(&self) -> String {
        let mut note = String::from("Lunza recommendation\n");
        note.push_str(&self.justification);
        note.push_str("\n\n");
        for (rank, scored) in self.venues.iter().enumerate() {
            note.push_str(&format!(
                "{}. {} ({:.0}/100) - {}\n",
                rank + 1,
                scored.venue.name,
                scored.score,
                scored.venue.address
            ));
        }
        if !self.menu_suggestions.is_empty() {
            note.push_str("\nTry: ");
            note.push_str(&self.menu_suggestions.join("; "));
            note.push('\n');
        }
        note
    }
}

/// Why the pipeline produced no recommendation for an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    NoVenues,
    SearchFailed(String),
    SynthesisFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoVenues => write!(f, "no venues found"),
            SkipReason::SearchFailed(e) => write!(f, "venue search failed: {}", e),
            SkipReason::SynthesisFailed(e) => write!(f, "synthesis failed: {}", e),
        }
    }
}

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Recommended(Box<Recommendation>),
    Skipped { event_id: String, reason: SkipReason },
}

impl PipelineOutcome {
    pub fn event_id(&self) -> &str {
        match self {
            PipelineOutcome::Recommended(rec) => &rec.event_id,
            PipelineOutcome::Skipped { event_id, .. } => event_id,
        }
    }

    pub fn recommendation(&self) -> Option<&Recommendation> {
        match self {
            PipelineOutcome::Recommended(rec) => Some(rec.as_ref()),
            PipelineOutcome::Skipped { .. } => None,
        }
    }
}
