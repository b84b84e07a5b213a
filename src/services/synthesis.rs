use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::fmt::Write as _;
use std::time::Duration;

use crate::error::CollaboratorError;
use crate::models::{ConstraintSet, ScoredVenue, Synthesis};
use crate::services::traits::TextSynthesis;

const SERVICE: &str = "synthesis";

const SYSTEM_PROMPT: &str = "You are Lunza, a location-aware lunch planning assistant. \
Given a meeting's dietary constraints and a short list of ranked venues, explain in two or three \
sentences why the first venue is the best fit, then suggest up to three specific dishes that \
satisfy the constraints. Respond with JSON: {\"justification\": string, \"menuSuggestions\": [string]}.";

/// Gemini `generateContent` client
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_key,
            model,
            client,
        })
    }
}

/// Describe the constraints and ranked venues for the model
pub fn build_prompt(constraints: &ConstraintSet, top_venues: &[ScoredVenue]) -> String {
    let mut prompt = String::from("Meeting constraints:\n");

    if let Some(area) = &constraints.area {
        let _ = writeln!(prompt, "- Area: {}", area);
    }
    if let Some(hint) = &constraints.venue_hint {
        let _ = writeln!(prompt, "- Near: {}", hint);
    }
    let requirements = constraints.requirements();
    if requirements.is_empty() {
        prompt.push_str("- Dietary requirements: none stated\n");
    } else {
        let _ = writeln!(prompt, "- Dietary requirements: {}", requirements.join(", "));
    }
    let _ = writeln!(
        prompt,
        "- Time: {} ({} minutes)",
        constraints.time_window.start.format("%H:%M"),
        constraints.time_window.duration_minutes()
    );

    prompt.push_str("\nRanked venues:\n");
    for (rank, scored) in top_venues.iter().enumerate() {
        let venue = &scored.venue;
        let _ = write!(
            prompt,
            "{}. {} ({}) score {:.1}, rating {:.1}",
            rank + 1,
            venue.name,
            venue.address,
            scored.score,
            venue.rating
        );
        if let Some(cuisine) = &venue.cuisine {
            let _ = write!(prompt, ", cuisine {}", cuisine);
        }
        if let Some(distance) = venue.distance_km {
            let _ = write!(prompt, ", {:.1} km away", distance);
        }
        let _ = writeln!(prompt, ". {}", scored.breakdown.rationale());
    }

    prompt
}

/// Parse model output into a synthesis.
///
/// Prefers the requested JSON shape (optionally inside a code fence); any
/// other non-empty text is used verbatim as the justification.
pub fn parse_synthesis(text: &str) -> Result<Synthesis, CollaboratorError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CollaboratorError::InvalidResponse("empty synthesis".to_string()));
    }

    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    if let Ok(synthesis) = serde_json::from_str::<Synthesis>(unfenced) {
        if !synthesis.justification.trim().is_empty() {
            return Ok(synthesis);
        }
    }

    Ok(Synthesis {
        justification: trimmed.to_string(),
        menu_suggestions: Vec::new(),
    })
}

#[async_trait]
impl TextSynthesis for GeminiClient {
    async fn synthesize(
        &self,
        constraints: &ConstraintSet,
        top_venues: &[ScoredVenue],
    ) -> Result<Synthesis, CollaboratorError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        let body = json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
            "contents": [{ "role": "user", "parts": [{ "text": build_prompt(constraints, top_venues) }] }],
            "generationConfig": { "responseMimeType": "application/json" }
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read body".to_string());
            return Err(CollaboratorError::ApiError {
                service: SERVICE,
                status,
                message,
            });
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::InvalidResponse(format!("Failed to parse completion: {}", e)))?;

        let text: String = generated
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        parse_synthesis(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScoreBreakdown, TimeWindow, Venue};
    use chrono::DateTime;
    use std::collections::BTreeSet;

    fn constraints() -> ConstraintSet {
        let start = DateTime::parse_from_rfc3339("2026-10-20T12:30:00-07:00").unwrap();
        ConstraintSet {
            area: Some("San Francisco".to_string()),
            venue_hint: Some("GitHub HQ".to_string()),
            time_window: TimeWindow {
                start,
                end: start + chrono::Duration::hours(1),
            },
            diet: None,
            health: BTreeSet::from(["low-glycemic".to_string()]),
        }
    }

    fn scored(name: &str) -> ScoredVenue {
        ScoredVenue {
            venue: Venue {
                name: name.to_string(),
                address: "88 Townsend".to_string(),
                rating: 4.5,
                price_tier: None,
                distance_km: Some(0.4),
                cuisine: Some("salad".to_string()),
                tags: BTreeSet::new(),
            },
            score: 81.0,
            breakdown: ScoreBreakdown {
                health_fit: 100.0,
                popularity: 90.0,
                proximity: 76.0,
                novelty: 100.0,
                matched_requirements: vec!["low-glycemic".to_string()],
                recent_repeats: 0,
            },
        }
    }

    #[test]
    fn test_prompt_mentions_constraints_and_venues() {
        let prompt = build_prompt(&constraints(), &[scored("Sweetgreen")]);
        assert!(prompt.contains("Area: San Francisco"));
        assert!(prompt.contains("Near: GitHub HQ"));
        assert!(prompt.contains("low-glycemic"));
        assert!(prompt.contains("1. Sweetgreen"));
        assert!(prompt.contains("60 minutes"));
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"justification\": \"Close and healthy\", \"menuSuggestions\": [\"Kale bowl\"]}\n```";
        let synthesis = parse_synthesis(text).unwrap();
        assert_eq!(synthesis.justification, "Close and healthy");
        assert_eq!(synthesis.menu_suggestions, vec!["Kale bowl"]);
    }

    #[test]
    fn test_parse_plain_text_falls_back() {
        let synthesis = parse_synthesis("Sweetgreen is two blocks away.").unwrap();
        assert_eq!(synthesis.justification, "Sweetgreen is two blocks away.");
        assert!(synthesis.menu_suggestions.is_empty());
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(matches!(
            parse_synthesis("  \n"),
            Err(CollaboratorError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_synthesize_reads_first_candidate() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
            .match_header("x-goog-api-key", "secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates": [{"content": {"parts": [
                    {"text": "{\"justification\": \"Best fit\", \"menuSuggestions\": [\"Grain bowl\"]}"}
                ]}}]}"#,
            )
            .create_async()
            .await;

        let client = GeminiClient::new(
            server.url(),
            "secret".to_string(),
            "gemini-2.5-flash".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();

        let synthesis = client
            .synthesize(&constraints(), &[scored("Sweetgreen")])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(synthesis.justification, "Best fit");
        assert_eq!(synthesis.menu_suggestions, vec!["Grain bowl"]);
    }

    #[tokio::test]
    async fn test_synthesize_maps_quota_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/m:generateContent")
            .with_status(429)
            .with_body("quota exceeded")
            .create_async()
            .await;

        let client = GeminiClient::new(server.url(), "k".to_string(), "m".to_string(), Duration::from_secs(5)).unwrap();
        let err = client.synthesize(&constraints(), &[]).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::ApiError { status: 429, .. }));
    }
}
