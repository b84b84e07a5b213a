use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::time::Duration;
use validator::Validate;

use crate::core::distance::Origin;
use crate::error::CollaboratorError;
use crate::models::{normalize_tag, Venue, VenueQuery};
use crate::services::traits::VenueSearch;

const SERVICE: &str = "venue search";

const FIELD_MASK: &str = "places.displayName,places.formattedAddress,places.rating,places.priceLevel,\
places.location,places.types,places.primaryType,places.servesVegetarianFood";

/// Place types too generic to be useful as venue tags
const GENERIC_TYPES: &[&str] = &["restaurant", "food", "point_of_interest", "establishment", "store"];

/// Places text-search client
pub struct PlacesClient {
    base_url: String,
    api_key: String,
    origin: Option<Origin>,
    client: Client,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    places: Vec<Place>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Place {
    display_name: Option<LocalizedText>,
    formatted_address: Option<String>,
    rating: Option<f64>,
    price_level: Option<String>,
    location: Option<LatLng>,
    #[serde(default)]
    types: Vec<String>,
    primary_type: Option<String>,
    serves_vegetarian_food: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct LocalizedText {
    text: String,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

impl Place {
    fn into_venue(self, origin: Option<Origin>) -> Option<Venue> {
        let name = self.display_name.map(|n| n.text).filter(|n| !n.trim().is_empty())?;

        let mut tags: BTreeSet<String> = self
            .types
            .iter()
            .filter(|t| !GENERIC_TYPES.contains(&t.as_str()))
            .map(|t| normalize_tag(t.trim_end_matches("_restaurant")))
            .filter(|t| !t.is_empty())
            .collect();
        if self.serves_vegetarian_food == Some(true) {
            tags.insert("vegetarian".to_string());
        }

        let cuisine = self
            .primary_type
            .as_deref()
            .filter(|t| t.ends_with("_restaurant") && *t != "restaurant")
            .map(|t| normalize_tag(t.trim_end_matches("_restaurant")));

        let distance_km = match (origin, &self.location) {
            (Some(origin), Some(loc)) => Some(origin.distance_to(loc.latitude, loc.longitude)),
            _ => None,
        };

        Some(Venue {
            name,
            address: self.formatted_address.unwrap_or_default(),
            rating: self.rating.unwrap_or(0.0),
            price_tier: self.price_level.as_deref().and_then(price_tier),
            distance_km,
            cuisine,
            tags,
        })
    }
}

fn price_tier(level: &str) -> Option<u8> {
    match level {
        "PRICE_LEVEL_FREE" => Some(0),
        "PRICE_LEVEL_INEXPENSIVE" => Some(1),
        "PRICE_LEVEL_MODERATE" => Some(2),
        "PRICE_LEVEL_EXPENSIVE" => Some(3),
        "PRICE_LEVEL_VERY_EXPENSIVE" => Some(4),
        _ => None,
    }
}

impl PlacesClient {
    pub fn new(
        base_url: String,
        api_key: String,
        origin: Option<Origin>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_key,
            origin,
            client,
        })
    }
}

#[async_trait]
impl VenueSearch for PlacesClient {
    async fn search(&self, query: &VenueQuery) -> Result<Vec<Venue>, CollaboratorError> {
        query
            .validate()
            .map_err(|e| CollaboratorError::InvalidRequest(e.to_string()))?;

        let url = format!("{}/v1/places:searchText", self.base_url.trim_end_matches('/'));
        let text_query = query.text_query();

        tracing::debug!("Searching venues: {}", text_query);

        let response = self
            .client
            .post(&url)
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&json!({
                "textQuery": text_query,
                "maxResultCount": query.max_results,
            }))
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

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::InvalidResponse(format!("Failed to parse places: {}", e)))?;

        let venues: Vec<Venue> = body
            .places
            .into_iter()
            .filter_map(|place| place.into_venue(self.origin))
            .collect();

        tracing::debug!("Venue search returned {} venues", venues.len());

        Ok(venues)
    }
}
