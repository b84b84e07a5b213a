use crate::models::Event;
use chrono::Timelike;

/// Decides whether a calendar event looks like a lunch meeting.
///
/// Either signal qualifies an event: a local start hour inside the lunch
/// window, or a lunch keyword in the title/description.
#[derive(Debug, Clone)]
pub struct LunchFilter {
    start_hour: u32,
    end_hour: u32,
    keywords: Vec<String>,
}

impl LunchFilter {
    pub fn new(start_hour: u32, end_hour: u32, keywords: Vec<String>) -> Self {
        Self {
            start_hour,
            end_hour,
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    #[inline]
    pub fn is_lunch_meeting(&self, event: &Event) -> bool {
        self.matches_time_window(event) || self.matches_keywords(event)
    }

    /// Start hour (event-local) within [start_hour, end_hour], inclusive
    #[inline]
    pub fn matches_time_window(&self, event: &Event) -> bool {
        let hour = event.start_time.hour();
        hour >= self.start_hour && hour <= self.end_hour
    }

    /// Any word in title or description starting with a lunch keyword
    pub fn matches_keywords(&self, event: &Event) -> bool {
        let text = format!("{} {}", event.title, event.description).to_lowercase();
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .any(|word| self.keywords.iter().any(|k| word.starts_with(k.as_str())))
    }
}

impl Default for LunchFilter {
    fn default() -> Self {
        Self::new(
            11,
            14,
            ["lunch", "meal", "dining", "restaurant", "food", "eat"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
        )
    }
}
