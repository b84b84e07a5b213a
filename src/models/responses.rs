use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// Scheduler state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Processing,
}

/// What happened to a single event during a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EventStatus {
    Recommended {
        #[serde(rename = "topVenue")]
        top_venue: String,
        score: f64,
        delivered: bool,
    },
    Skipped {
        reason: String,
    },
    AlreadyProcessed,
    StoreUnavailable {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventReport {
    #[serde(rename = "eventId")]
    pub event_id: String,
    pub title: String,
    #[serde(flatten)]
    pub status: EventStatus,
}

/// Summary of one fetch-filter-process cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    #[serde(rename = "tickId")]
    pub tick_id: uuid::Uuid,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
    pub fetched: usize,
    #[serde(rename = "lunchCandidates")]
    pub lunch_candidates: usize,
    pub events: Vec<EventReport>,
    #[serde(rename = "fetchError")]
    pub fetch_error: Option<String>,
    pub interrupted: bool,
}

impl TickReport {
    pub fn new() -> Self {
        Self {
            tick_id: uuid::Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            fetched: 0,
            lunch_candidates: 0,
            events: Vec::new(),
            fetch_error: None,
            interrupted: false,
        }
    }

    pub fn recommended_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.status, EventStatus::Recommended { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.status, EventStatus::Skipped { .. }))
            .count()
    }
}

impl Default for TickReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Status endpoint response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub state: SchedulerState,
    #[serde(rename = "recentSelections")]
    pub recent_selections: Vec<String>,
    #[serde(rename = "lastTick")]
    pub last_tick: Option<TickReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_report_serializes_flat_status() {
        let report = EventReport {
            event_id: "evt-1".to_string(),
            title: "Team Lunch".to_string(),
            status: EventStatus::Skipped {
                reason: "no venues found".to_string(),
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "no venues found");
        assert_eq!(json["eventId"], "evt-1");
    }

    #[test]
    fn test_tick_report_counts() {
        let mut report = TickReport::new();
        report.events.push(EventReport {
            event_id: "a".to_string(),
            title: "A".to_string(),
            status: EventStatus::AlreadyProcessed,
        });
        report.events.push(EventReport {
            event_id: "b".to_string(),
            title: "B".to_string(),
            status: EventStatus::Recommended {
                top_venue: "Sweetgreen".to_string(),
                score: 81.0,
                delivered: true,
            },
        });
        assert_eq!(report.recommended_count(), 1);
        assert_eq!(report.skipped_count(), 0);
    }
}
