use serde::{Deserialize, Serialize};
use validator::Validate;

/// Query sent to the venue search collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct VenueQuery {
    pub area: Option<String>,
    #[serde(rename = "venueHint")]
    pub venue_hint: Option<String>,
    pub diet: Option<String>,
    #[serde(default)]
    pub health: Vec<String>,
    #[validate(range(min = 1, max = 20))]
    #[serde(rename = "maxResults", default = "default_max_results")]
    pub max_results: u8,
}

fn default_max_results() -> u8 {
    10
}

impl VenueQuery {
    /// Free-text query in the form the text-search endpoint expects
    pub fn text_query(&self) -> String {
        let mut words: Vec<String> = Vec::new();
        if let Some(diet) = &self.diet {
            words.push(diet.replace('-', " "));
        }
        for flag in &self.health {
            words.push(flag.replace('-', " "));
        }
        words.push("lunch restaurants".to_string());
        if let Some(hint) = &self.venue_hint {
            words.push(format!("near {}", hint));
        }
        if let Some(area) = &self.area {
            words.push(format!("in {}", area));
        }
        words.join(" ")
    }

    /// Stable key for caching search results
    pub fn cache_key(&self) -> String {
        format!(
            "venues:{}:{}:{}:{}:{}",
            self.area.as_deref().unwrap_or("-").to_lowercase(),
            self.venue_hint.as_deref().unwrap_or("-").to_lowercase(),
            self.diet.as_deref().unwrap_or("-"),
            self.health.join(","),
            self.max_results
        )
    }
}

/// Request to trigger a one-shot tick through the control surface
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TickRequest {
    #[validate(range(min = 1, max = 168))]
    #[serde(alias = "lookahead_hours", rename = "lookaheadHours", default)]
    pub lookahead_hours: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> VenueQuery {
        VenueQuery {
            area: Some("San Francisco".to_string()),
            venue_hint: Some("GitHub HQ".to_string()),
            diet: None,
            health: vec!["low-glycemic".to_string()],
            max_results: 10,
        }
    }

    #[test]
    fn test_text_query() {
        assert_eq!(
            query().text_query(),
            "low glycemic lunch restaurants near GitHub HQ in San Francisco"
        );
    }

    #[test]
    fn test_cache_key_is_case_insensitive_on_location() {
        let mut other = query();
        other.area = Some("SAN FRANCISCO".to_string());
        assert_eq!(query().cache_key(), other.cache_key());
    }

    #[test]
    fn test_max_results_validation() {
        let mut q = query();
        assert!(q.validate().is_ok());
        q.max_results = 0;
        assert!(q.validate().is_err());
    }

    #[test]
    fn test_tick_request_validation() {
        let ok = TickRequest { lookahead_hours: Some(24) };
        assert!(ok.validate().is_ok());
        let too_far = TickRequest { lookahead_hours: Some(500) };
        assert!(too_far.validate().is_err());
        assert!(TickRequest::default().validate().is_ok());
    }
}
