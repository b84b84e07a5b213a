use async_trait::async_trait;
use base64::prelude::*;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CollaboratorError;
use crate::models::Recommendation;
use crate::services::traits::{CalendarTransport, NotificationChannel};

/// Writes recommendations to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationChannel for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, recommendation: &Recommendation) -> Result<(), CollaboratorError> {
        let top = recommendation
            .top_venue()
            .map(|v| v.venue.name.as_str())
            .unwrap_or("-");
        tracing::info!(
            event_id = %recommendation.event_id,
            top_venue = %top,
            "Recommendation for '{}': {}",
            recommendation.event_title,
            recommendation.justification
        );
        Ok(())
    }
}

/// Appends the rendered note to the calendar event itself
pub struct CalendarNoteNotifier {
    calendar: Arc<dyn CalendarTransport>,
}

impl CalendarNoteNotifier {
    pub fn new(calendar: Arc<dyn CalendarTransport>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl NotificationChannel for CalendarNoteNotifier {
    fn name(&self) -> &str {
        "calendar"
    }

    async fn deliver(&self, recommendation: &Recommendation) -> Result<(), CollaboratorError> {
        self.calendar
            .annotate(&recommendation.event_id, &recommendation.render_note())
            .await
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    #[serde(flatten)]
    recommendation: &'a Recommendation,
    note: String,
}

/// POSTs the recommendation as JSON to a configured URL
pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl NotificationChannel for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, recommendation: &Recommendation) -> Result<(), CollaboratorError> {
        let payload = WebhookPayload {
            recommendation,
            note: recommendation.render_note(),
        };
        let response = self.client.post(&self.url).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::ApiError {
                service: "webhook",
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// Emails the rendered note through the Gmail `messages.send` API.
///
/// Uses the same OAuth token as the calendar, which must carry the
/// `gmail.send` scope.
pub struct GmailNotifier {
    base_url: String,
    access_token: String,
    sender: Option<String>,
    recipients: Vec<String>,
    client: Client,
}

impl GmailNotifier {
    pub fn new(
        base_url: String,
        access_token: String,
        sender: Option<String>,
        recipients: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        if recipients.is_empty() {
            return Err(CollaboratorError::InvalidRequest(
                "email channel needs at least one recipient".to_string(),
            ));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            sender,
            recipients,
            client,
        })
    }

    /// RFC 2822 plain-text message; non-ASCII subjects use an encoded word
    pub fn build_message(&self, recommendation: &Recommendation) -> String {
        let subject = format!("Lunch recommendation: {}", recommendation.event_title);
        let subject = if subject.is_ascii() {
            subject
        } else {
            format!("=?UTF-8?B?{}?=", BASE64_STANDARD.encode(subject.as_bytes()))
        };

        let mut message = String::new();
        if let Some(sender) = &self.sender {
            message.push_str(&format!("From: {}\r\n", sender));
        }
        message.push_str(&format!("To: {}\r\n", self.recipients.join(", ")));
        message.push_str(&format!("Subject: {}\r\n", subject));
        message.push_str("MIME-Version: 1.0\r\n");
        message.push_str("Content-Type: text/plain; charset=\"UTF-8\"\r\n\r\n");
        message.push_str(&recommendation.render_note());
        message
    }
}

#[async_trait]
impl NotificationChannel for GmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn deliver(&self, recommendation: &Recommendation) -> Result<(), CollaboratorError> {
        let raw = BASE64_URL_SAFE_NO_PAD.encode(self.build_message(recommendation).as_bytes());
        let url = format!("{}/gmail/v1/users/me/messages/send", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::ApiError {
                service: "gmail",
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        tracing::debug!(
            "Emailed recommendation for {} to {} recipient(s)",
            recommendation.event_id,
            self.recipients.len()
        );
        Ok(())
    }
}

/// Delivers to every channel; one failing channel does not stop the rest
pub struct FanoutNotifier {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl FanoutNotifier {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait]
impl NotificationChannel for FanoutNotifier {
    fn name(&self) -> &str {
        "fanout"
    }

    /// Returns the first failure after every channel has been tried
    async fn deliver(&self, recommendation: &Recommendation) -> Result<(), CollaboratorError> {
        let mut first_error = None;

        for channel in &self.channels {
            if let Err(e) = channel.deliver(recommendation).await {
                tracing::warn!("Notification channel '{}' failed: {}", channel.name(), e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
