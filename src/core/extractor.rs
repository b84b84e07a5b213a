use crate::core::vocabulary::Vocabulary;
use crate::models::{ConstraintSet, Event, TimeWindow};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Turns a raw calendar event into a normalized [`ConstraintSet`].
///
/// Extraction is total: anything the vocabulary does not recognize is left
/// unset rather than guessed.
#[derive(Debug, Clone)]
pub struct ConstraintExtractor {
    vocabulary: Arc<Vocabulary>,
    default_area: Option<String>,
}

impl ConstraintExtractor {
    pub fn new(vocabulary: Arc<Vocabulary>, default_area: Option<String>) -> Self {
        Self {
            vocabulary,
            default_area,
        }
    }

    pub fn with_default_vocabulary(default_area: Option<String>) -> Self {
        Self::new(Arc::new(Vocabulary::default()), default_area)
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocabulary
    }

    pub fn extract(&self, event: &Event) -> ConstraintSet {
        let (area, venue_hint) = match event.location.as_deref().map(str::trim) {
            Some(location) if !location.is_empty() => self.split_location(location),
            _ => (None, None),
        };

        let text = format!("{} {}", event.title, event.description).to_lowercase();
        let diet = self.match_diet(&text);
        let health = self.match_health(&text);

        if diet.is_none() && health.is_empty() {
            tracing::debug!("No diet/health keywords in event {}", event.event_id);
        }

        ConstraintSet {
            area: area.or_else(|| self.default_area.clone()),
            venue_hint,
            time_window: TimeWindow {
                start: event.start_time,
                end: event.end_time,
            },
            diet,
            health,
        }
    }

    /// Split a location into (area, landmark hint).
    ///
    /// Comma-separated segments are scanned in order; the first one carrying a
    /// hint prefix ("near X") or a landmark keyword ("X HQ") becomes the hint,
    /// everything else is kept verbatim as the area. Text before a prefix only
    /// counts as area when it names no meeting ("Lunch near X" has no area).
    fn split_location(&self, location: &str) -> (Option<String>, Option<String>) {
        let mut area_parts: Vec<&str> = Vec::new();
        let mut hint: Option<String> = None;

        for segment in location.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if hint.is_none() {
                if let Some((before, after)) = self.split_hint_prefix(segment) {
                    if !before.is_empty() && !self.describes_meeting(before) {
                        area_parts.push(before);
                    }
                    if !after.is_empty() {
                        hint = Some(after.to_string());
                    }
                    continue;
                }
                if self.has_landmark_keyword(segment) {
                    hint = Some(segment.to_string());
                    continue;
                }
            }
            area_parts.push(segment);
        }

        let area = if area_parts.is_empty() {
            None
        } else {
            Some(area_parts.join(", "))
        };
        (area, hint)
    }

    /// Earliest hint prefix in the segment (longest wins on ties), split around it
    fn split_hint_prefix<'a>(&self, segment: &'a str) -> Option<(&'a str, &'a str)> {
        // ASCII lowercasing keeps byte offsets aligned with `segment`
        let lowered = segment.to_ascii_lowercase();
        let bytes = lowered.as_bytes();
        let mut best: Option<(usize, usize)> = None;

        for prefix in &self.vocabulary.hint_prefixes {
            let prefix = prefix.trim().to_ascii_lowercase();
            if prefix.is_empty() {
                continue;
            }
            let word_like = prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ');

            for (idx, _) in lowered.match_indices(prefix.as_str()) {
                let end = idx + prefix.len();
                let starts_word = idx == 0 || bytes[idx - 1].is_ascii_whitespace();
                let ends_word = !word_like || bytes.get(end).map_or(true, |b| b.is_ascii_whitespace());
                if !(starts_word && ends_word) {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((best_idx, best_len)) => {
                        idx < best_idx || (idx == best_idx && prefix.len() > best_len)
                    }
                };
                if better {
                    best = Some((idx, prefix.len()));
                }
                break;
            }
        }

        best.map(|(idx, len)| (segment[..idx].trim(), segment[idx + len..].trim()))
    }

    fn has_landmark_keyword(&self, segment: &str) -> bool {
        contains_word(segment, &self.vocabulary.landmark_keywords)
    }

    fn describes_meeting(&self, text: &str) -> bool {
        contains_word(text, &self.vocabulary.meeting_words)
    }

    fn match_diet(&self, text: &str) -> Option<String> {
        self.vocabulary
            .diets
            .iter()
            .find(|rule| rule.matches(text))
            .map(|rule| rule.label.clone())
    }

    fn match_health(&self, text: &str) -> BTreeSet<String> {
        self.vocabulary
            .health
            .iter()
            .filter(|rule| rule.matches(text))
            .map(|rule| rule.label.clone())
            .collect()
    }
}

/// Whole-word, case-insensitive membership test
fn contains_word(text: &str, words: &[String]) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .any(|word| words.iter().any(|w| w.eq_ignore_ascii_case(word)))
}
