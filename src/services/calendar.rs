use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Local, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::CollaboratorError;
use crate::models::Event;
use crate::services::traits::CalendarTransport;

const SERVICE: &str = "calendar";

/// Google Calendar v3 REST client
///
/// Handles:
/// - Listing timed events in a look-ahead window
/// - Appending recommendation notes to event descriptions
pub struct GoogleCalendarClient {
    base_url: String,
    calendar_id: String,
    access_token: String,
    max_results: u32,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<CalendarItem>,
}

#[derive(Debug, Deserialize)]
struct CalendarItem {
    id: Option<String>,
    summary: Option<String>,
    location: Option<String>,
    description: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
    #[serde(default)]
    attendees: Vec<Attendee>,
}

#[derive(Debug, Deserialize)]
struct EventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Deserialize)]
struct Attendee {
    email: Option<String>,
}

impl CalendarItem {
    /// All-day events (date only) and items without an id are not schedulable
    fn into_event(self) -> Option<Event> {
        let event_id = self.id.filter(|id| !id.is_empty())?;
        let start_time = self.start.and_then(|t| t.date_time)?;
        let end_time = self
            .end
            .and_then(|t| t.date_time)
            .unwrap_or(start_time + ChronoDuration::hours(1));

        Some(Event {
            event_id,
            title: self.summary.unwrap_or_else(|| "No Title".to_string()),
            location: self.location.filter(|l| !l.trim().is_empty()),
            start_time,
            end_time,
            description: self.description.unwrap_or_default(),
            attendees: self.attendees.into_iter().filter_map(|a| a.email).collect(),
        })
    }
}

impl GoogleCalendarClient {
    pub fn new(
        base_url: String,
        calendar_id: String,
        access_token: String,
        max_results: u32,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            calendar_id,
            access_token,
            max_results,
            client,
        })
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.calendar_id)
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(event_id))
    }

    async fn fetch_description(&self, event_id: &str) -> Result<String, CollaboratorError> {
        let response = self
            .client
            .get(self.event_url(event_id))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let response = check_status(response).await?;
        let item: CalendarItem = response
            .json()
            .await
            .map_err(|e| CollaboratorError::InvalidResponse(format!("Failed to parse event: {}", e)))?;

        Ok(item.description.unwrap_or_default())
    }
}

#[async_trait]
impl CalendarTransport for GoogleCalendarClient {
    async fn list_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, CollaboratorError> {
        let url = format!(
            "{}?timeMin={}&timeMax={}&maxResults={}&singleEvents=true&orderBy=startTime",
            self.events_url(),
            urlencoding::encode(&from.to_rfc3339()),
            urlencoding::encode(&to.to_rfc3339()),
            self.max_results
        );

        tracing::debug!("Listing calendar events: {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let response = check_status(response).await?;
        let list: EventList = response
            .json()
            .await
            .map_err(|e| CollaboratorError::InvalidResponse(format!("Failed to parse events: {}", e)))?;

        let total = list.items.len();
        let events: Vec<Event> = list
            .items
            .into_iter()
            .filter_map(CalendarItem::into_event)
            .collect();

        tracing::debug!("Fetched {} timed events ({} items total)", events.len(), total);

        Ok(events)
    }

    async fn annotate(&self, event_id: &str, text: &str) -> Result<(), CollaboratorError> {
        let current = self.fetch_description(event_id).await?;
        let description = if current.trim().is_empty() {
            text.to_string()
        } else {
            format!("{}\n\n---\n{}", current, text)
        };

        let response = self
            .client
            .patch(self.event_url(event_id))
            .bearer_auth(&self.access_token)
            .json(&json!({ "description": description }))
            .send()
            .await?;

        check_status(response).await?;
        tracing::debug!("Annotated calendar event {}", event_id);
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CollaboratorError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read body".to_string());
    Err(CollaboratorError::ApiError {
        service: SERVICE,
        status,
        message,
    })
}

/// Calendar with fixed mock lunch meetings, for running without calendar access.
///
/// The mock events are returned regardless of the requested window; notes
/// are kept in memory.
pub struct DemoCalendar {
    events: Vec<Event>,
    notes: Mutex<HashMap<String, Vec<String>>>,
}

impl DemoCalendar {
    pub fn new() -> Self {
        Self::with_events(Self::mock_events(Local::now().date_naive()))
    }

    pub fn with_events(events: Vec<Event>) -> Self {
        Self {
            events,
            notes: Mutex::new(HashMap::new()),
        }
    }

    /// Two lunch meetings: tomorrow and the day after, 12:30 local time
    fn mock_events(today: chrono::NaiveDate) -> Vec<Event> {
        let offset = *Local::now().offset();
        let lunch_on = |days: i64| {
            let naive = (today + ChronoDuration::days(days))
                .and_hms_opt(12, 30, 0)
                .unwrap_or_default();
            offset
                .from_local_datetime(&naive)
                .single()
                .unwrap_or_else(|| offset.from_utc_datetime(&naive))
        };

        let first = lunch_on(1);
        let second = lunch_on(2);

        vec![
            Event {
                event_id: "demo_lunch_1".to_string(),
                title: "Team Lunch Meeting".to_string(),
                location: Some("San Francisco, near GitHub HQ".to_string()),
                start_time: first,
                end_time: first + ChronoDuration::hours(1),
                description: "Need healthy lunch options for diabetes management. Looking for low-carb, high-protein options.".to_string(),
                attendees: vec!["alice@example.com".to_string(), "bob@example.com".to_string()],
            },
            Event {
                event_id: "demo_lunch_2".to_string(),
                title: "Client Lunch".to_string(),
                location: Some("Downtown San Francisco".to_string()),
                start_time: second,
                end_time: second + ChronoDuration::hours(1),
                description: "Business lunch. Need vegetarian options.".to_string(),
                attendees: vec!["client@example.com".to_string()],
            },
        ]
    }

    pub fn notes(&self, event_id: &str) -> Vec<String> {
        self.notes
            .lock()
            .map(|notes| notes.get(event_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl Default for DemoCalendar {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalendarTransport for DemoCalendar {
    async fn list_events(
        &self,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<Event>, CollaboratorError> {
        Ok(self.events.clone())
    }

    async fn annotate(&self, event_id: &str, text: &str) -> Result<(), CollaboratorError> {
        tracing::info!("Demo calendar note for {}:\n{}", event_id, text);
        if let Ok(mut notes) = self.notes.lock() {
            notes.entry(event_id.to_string()).or_default().push(text.to_string());
        }
        Ok(())
    }
}
