// Integration tests for Lunza

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lunza::core::{ConstraintExtractor, LunchFilter, RecommendationPipeline, Scheduler, VenueScorer};
use lunza::error::{CollaboratorError, StoreError};
use lunza::models::{
    ConstraintSet, Event, EventStatus, Recommendation, ScoredVenue, SchedulerState, Synthesis,
    Venue, VenueQuery,
};
use lunza::services::{
    CalendarTransport, JsonEventStore, MemoryEventStore, NotificationChannel, ProcessedEventStore,
    TextSynthesis, VenueSearch,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

struct FakeCalendar {
    events: Vec<Event>,
    fail: bool,
    list_calls: AtomicUsize,
}

impl FakeCalendar {
    fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            fail: false,
            list_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CalendarTransport for FakeCalendar {
    async fn list_events(&self, _from: DateTime<Utc>, _to: DateTime<Utc>) -> Result<Vec<Event>, CollaboratorError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CollaboratorError::ApiError {
                service: "calendar",
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(self.events.clone())
    }

    async fn annotate(&self, _event_id: &str, _text: &str) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

struct FakeSearch {
    venues: Vec<Venue>,
    calls: AtomicUsize,
}

impl FakeSearch {
    fn new(venues: Vec<Venue>) -> Self {
        Self {
            venues,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VenueSearch for FakeSearch {
    async fn search(&self, _query: &VenueQuery) -> Result<Vec<Venue>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.venues.clone())
    }
}

struct FakeSynthesis;

#[async_trait]
impl TextSynthesis for FakeSynthesis {
    async fn synthesize(
        &self,
        _constraints: &ConstraintSet,
        top_venues: &[ScoredVenue],
    ) -> Result<Synthesis, CollaboratorError> {
        Ok(Synthesis {
            justification: format!("{} fits best", top_venues[0].venue.name),
            menu_suggestions: vec!["House salad".to_string()],
        })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    fail: bool,
    delivered: Mutex<Vec<Recommendation>>,
}

#[async_trait]
impl NotificationChannel for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, recommendation: &Recommendation) -> Result<(), CollaboratorError> {
        if self.fail {
            return Err(CollaboratorError::ApiError {
                service: "webhook",
                status: 500,
                message: "down".to_string(),
            });
        }
        self.delivered.lock().unwrap().push(recommendation.clone());
        Ok(())
    }
}

struct BrokenStore;

#[async_trait]
impl ProcessedEventStore for BrokenStore {
    async fn has(&self, _event_id: &str) -> Result<bool, StoreError> {
        Err(StoreError::IoError(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")))
    }

    async fn mark(&self, _event_id: &str) -> Result<(), StoreError> {
        Err(StoreError::IoError(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")))
    }
}

fn create_event(id: &str, title: &str, start: &str) -> Event {
    let start_time = DateTime::parse_from_rfc3339(start).unwrap();
    Event {
        event_id: id.to_string(),
        title: title.to_string(),
        location: Some("San Francisco, near GitHub HQ".to_string()),
        start_time,
        end_time: start_time + chrono::Duration::hours(1),
        description: String::new(),
        attendees: vec!["alice@example.com".to_string()],
    }
}

fn lunch_events() -> Vec<Event> {
    vec![
        create_event("evt-1", "Team Lunch", "2026-10-20T12:30:00-07:00"),
        create_event("evt-2", "Client Lunch", "2026-10-21T12:30:00-07:00"),
    ]
}

fn create_venue(name: &str, cuisine: &str, rating: f64, distance_km: f64) -> Venue {
    Venue {
        name: name.to_string(),
        address: format!("{} Street", name),
        rating,
        price_tier: Some(2),
        distance_km: Some(distance_km),
        cuisine: Some(cuisine.to_string()),
        tags: BTreeSet::new(),
    }
}

fn thai_and_salad() -> Vec<Venue> {
    vec![
        create_venue("Thai Basil", "thai", 4.8, 0.5),
        create_venue("Salad Spot", "salad", 4.5, 0.6),
    ]
}

fn create_scheduler(
    calendar: Arc<dyn CalendarTransport>,
    store: Arc<dyn ProcessedEventStore>,
    search: Arc<dyn VenueSearch>,
    notifier: Arc<dyn NotificationChannel>,
) -> Scheduler {
    let pipeline = RecommendationPipeline::new(
        ConstraintExtractor::with_default_vocabulary(None),
        VenueScorer::default(),
        search,
        Arc::new(FakeSynthesis),
    );
    Scheduler::new(calendar, store, notifier, pipeline, LunchFilter::default())
        .with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_integration_second_tick_skips_processed_events() {
    let search = Arc::new(FakeSearch::new(thai_and_salad()));
    let scheduler = create_scheduler(
        Arc::new(FakeCalendar::new(lunch_events())),
        Arc::new(MemoryEventStore::new()),
        search.clone(),
        Arc::new(RecordingNotifier::default()),
    );

    let first = scheduler.run_once().await;
    assert_eq!(first.recommended_count(), 2);

    let second = scheduler.run_once().await;
    assert_eq!(second.events.len(), 2);
    assert!(second
        .events
        .iter()
        .all(|e| e.status == EventStatus::AlreadyProcessed));
    assert_eq!(search.calls.load(Ordering::SeqCst), 2);
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}

#[tokio::test]
async fn test_integration_no_venues_is_skipped_and_marked() {
    let store = Arc::new(MemoryEventStore::new());
    let scheduler = create_scheduler(
        Arc::new(FakeCalendar::new(lunch_events())),
        store.clone(),
        Arc::new(FakeSearch::new(vec![])),
        Arc::new(RecordingNotifier::default()),
    );

    let report = scheduler.run_once().await;

    assert_eq!(report.skipped_count(), 2);
    assert_eq!(
        report.events[0].status,
        EventStatus::Skipped {
            reason: "no venues found".to_string()
        }
    );
    assert!(store.has("evt-1").await.unwrap());
    assert!(store.has("evt-2").await.unwrap());
}

#[tokio::test]
async fn test_integration_novelty_changes_second_pick() {
    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler = create_scheduler(
        Arc::new(FakeCalendar::new(lunch_events())),
        Arc::new(MemoryEventStore::new()),
        Arc::new(FakeSearch::new(thai_and_salad())),
        notifier.clone(),
    );

    scheduler.run_once().await;

    let delivered = notifier.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].top_venue().unwrap().venue.name, "Thai Basil");

    let thai_second = delivered[1]
        .venues
        .iter()
        .find(|v| v.venue.name == "Thai Basil")
        .unwrap();
    assert!(thai_second.breakdown.novelty < 100.0);
    assert_eq!(delivered[1].top_venue().unwrap().venue.name, "Salad Spot");

    assert_eq!(scheduler.recent_selections(), vec!["thai", "salad"]);
}

#[tokio::test]
async fn test_integration_failed_delivery_does_not_block_batch() {
    let store = Arc::new(MemoryEventStore::new());
    let scheduler = create_scheduler(
        Arc::new(FakeCalendar::new(lunch_events())),
        store.clone(),
        Arc::new(FakeSearch::new(thai_and_salad())),
        Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        }),
    );

    let report = scheduler.run_once().await;

    assert_eq!(report.recommended_count(), 2);
    for event in &report.events {
        match &event.status {
            EventStatus::Recommended { delivered, .. } => assert!(!delivered),
            other => panic!("unexpected status: {:?}", other),
        }
    }
    assert!(store.has("evt-2").await.unwrap());
}

#[tokio::test]
async fn test_integration_calendar_failure_is_reported() {
    let calendar = FakeCalendar {
        fail: true,
        ..FakeCalendar::new(vec![])
    };
    let scheduler = create_scheduler(
        Arc::new(calendar),
        Arc::new(MemoryEventStore::new()),
        Arc::new(FakeSearch::new(thai_and_salad())),
        Arc::new(RecordingNotifier::default()),
    );

    let report = scheduler.run_once().await;

    assert!(report.fetch_error.as_deref().unwrap().contains("503"));
    assert!(report.events.is_empty());
    assert!(scheduler.last_report().is_some());
}

#[tokio::test]
async fn test_integration_store_failure_skips_event() {
    let search = Arc::new(FakeSearch::new(thai_and_salad()));
    let scheduler = create_scheduler(
        Arc::new(FakeCalendar::new(lunch_events())),
        Arc::new(BrokenStore),
        search.clone(),
        Arc::new(RecordingNotifier::default()),
    );

    let report = scheduler.run_once().await;

    assert!(report
        .events
        .iter()
        .all(|e| matches!(e.status, EventStatus::StoreUnavailable { .. })));
    assert_eq!(search.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_integration_filters_non_lunch_and_malformed_events() {
    let mut events = lunch_events();
    events.push(create_event("evt-3", "Standup", "2026-10-20T09:00:00-07:00"));
    events.push(create_event("", "Lunch with no id", "2026-10-20T12:00:00-07:00"));

    let scheduler = create_scheduler(
        Arc::new(FakeCalendar::new(events)),
        Arc::new(MemoryEventStore::new()),
        Arc::new(FakeSearch::new(thai_and_salad())),
        Arc::new(RecordingNotifier::default()),
    );

    let report = scheduler.run_once().await;

    assert_eq!(report.fetched, 4);
    assert_eq!(report.lunch_candidates, 2);
    let ids: Vec<&str> = report.events.iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, vec!["evt-1", "evt-2"]);
}

#[tokio::test]
async fn test_integration_stop_request_ends_tick_before_next_event() {
    let search = Arc::new(FakeSearch::new(thai_and_salad()));
    let scheduler = create_scheduler(
        Arc::new(FakeCalendar::new(lunch_events())),
        Arc::new(MemoryEventStore::new()),
        search.clone(),
        Arc::new(RecordingNotifier::default()),
    );

    let (_tx, rx) = watch::channel(true);
    let report = scheduler.tick(None, Some(&rx)).await;

    assert!(report.interrupted);
    assert!(report.events.is_empty());
    assert_eq!(search.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_integration_continuous_mode_until_stopped() {
    let calendar = Arc::new(FakeCalendar::new(lunch_events()));
    let search = Arc::new(FakeSearch::new(thai_and_salad()));
    let scheduler = Arc::new(create_scheduler(
        calendar.clone(),
        Arc::new(MemoryEventStore::new()),
        search.clone(),
        Arc::new(RecordingNotifier::default()),
    ));

    let (tx, rx) = watch::channel(false);
    let handle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run_continuous(Duration::from_secs(60), rx).await })
    };

    tokio::time::sleep(Duration::from_secs(90)).await;
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();

    assert!(calendar.list_calls.load(Ordering::SeqCst) >= 2);
    assert_eq!(search.calls.load(Ordering::SeqCst), 2);
    let last = scheduler.last_report().unwrap();
    assert!(last
        .events
        .iter()
        .all(|e| e.status == EventStatus::AlreadyProcessed));
}

#[tokio::test]
async fn test_integration_json_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed.json");

    {
        let scheduler = create_scheduler(
            Arc::new(FakeCalendar::new(lunch_events())),
            Arc::new(JsonEventStore::open(&path).await.unwrap()),
            Arc::new(FakeSearch::new(thai_and_salad())),
            Arc::new(RecordingNotifier::default()),
        );
        assert_eq!(scheduler.run_once().await.recommended_count(), 2);
    }

    let search = Arc::new(FakeSearch::new(thai_and_salad()));
    let restarted = create_scheduler(
        Arc::new(FakeCalendar::new(lunch_events())),
        Arc::new(JsonEventStore::open(&path).await.unwrap()),
        search.clone(),
        Arc::new(RecordingNotifier::default()),
    );

    let report = restarted.run_once().await;
    assert!(report
        .events
        .iter()
        .all(|e| e.status == EventStatus::AlreadyProcessed));
    assert_eq!(search.calls.load(Ordering::SeqCst), 0);
}
