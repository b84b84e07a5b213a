use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use validator::Validate;

use crate::core::filters::LunchFilter;
use crate::core::pipeline::{RecommendationPipeline, DEFAULT_CALL_TIMEOUT};
use crate::error::StoreError;
use crate::models::{Event, EventReport, EventStatus, PipelineOutcome, SchedulerState, TickReport};
use crate::services::traits::{bounded, CalendarTransport, NotificationChannel, ProcessedEventStore};

/// Default look-ahead window for fetching events
pub const DEFAULT_LOOKAHEAD_HOURS: i64 = 24;

/// Periodic driver: fetch, filter, process, notify.
///
/// Ticks are serialized through the pipeline lock, so events are processed
/// strictly one after another in fetch order and session memory is never
/// read and written concurrently. A stop request is honored between events.
pub struct Scheduler {
    calendar: Arc<dyn CalendarTransport>,
    store: Arc<dyn ProcessedEventStore>,
    notifier: Arc<dyn NotificationChannel>,
    pipeline: tokio::sync::Mutex<RecommendationPipeline>,
    filter: LunchFilter,
    lookahead: chrono::Duration,
    call_timeout: Duration,
    processing: AtomicBool,
    last_report: Mutex<Option<TickReport>>,
    recent: Mutex<Vec<String>>,
}

/// Holds the scheduler in `Processing` until dropped
struct ProcessingGuard<'a>(&'a AtomicBool);

impl<'a> ProcessingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Scheduler {
    pub fn new(
        calendar: Arc<dyn CalendarTransport>,
        store: Arc<dyn ProcessedEventStore>,
        notifier: Arc<dyn NotificationChannel>,
        pipeline: RecommendationPipeline,
        filter: LunchFilter,
    ) -> Self {
        let recent = pipeline.memory().recent();
        Self {
            calendar,
            store,
            notifier,
            pipeline: tokio::sync::Mutex::new(pipeline),
            filter,
            lookahead: chrono::Duration::hours(DEFAULT_LOOKAHEAD_HOURS),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            processing: AtomicBool::new(false),
            last_report: Mutex::new(None),
            recent: Mutex::new(recent),
        }
    }

    pub fn with_lookahead(mut self, lookahead: chrono::Duration) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn state(&self) -> SchedulerState {
        if self.processing.load(Ordering::SeqCst) {
            SchedulerState::Processing
        } else {
            SchedulerState::Idle
        }
    }

    /// Report of the most recently completed tick
    pub fn last_report(&self) -> Option<TickReport> {
        self.last_report.lock().ok().and_then(|r| r.clone())
    }

    /// Session memory window as of the last processed event
    pub fn recent_selections(&self) -> Vec<String> {
        self.recent.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub async fn health(&self) -> Result<bool, StoreError> {
        self.store.health_check().await
    }

    /// Single-pass mode: one tick over the configured look-ahead
    pub async fn run_once(&self) -> TickReport {
        self.tick(None, None).await
    }

    /// Continuous mode: tick immediately, then every `interval`, until `stop` turns true
    /// or its sender goes away. A running tick finishes its current event first.
    pub async fn run_continuous(&self, interval: Duration, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("Scheduler running every {}s", interval.as_secs());

        loop {
            if *stop.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.tick(None, Some(&stop)).await;
                    tracing::info!(
                        tick_id = %report.tick_id,
                        "Tick finished: {} fetched, {} candidates, {} recommended, {} skipped",
                        report.fetched,
                        report.lunch_candidates,
                        report.recommended_count(),
                        report.skipped_count()
                    );
                }
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Scheduler stopped");
    }

    /// One fetch-filter-process cycle.
    ///
    /// Never fails: a calendar error is recorded in the report and the tick
    /// ends with no events processed.
    pub async fn tick(
        &self,
        lookahead: Option<chrono::Duration>,
        stop: Option<&watch::Receiver<bool>>,
    ) -> TickReport {
        let mut pipeline = self.pipeline.lock().await;
        let _processing = ProcessingGuard::enter(&self.processing);
        let mut report = TickReport::new();

        let from = Utc::now();
        let to = from + lookahead.unwrap_or(self.lookahead);

        let events = match bounded("calendar", self.call_timeout, self.calendar.list_events(from, to)).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!("Failed to fetch calendar events: {}", e);
                report.fetch_error = Some(e.to_string());
                return self.finish(report);
            }
        };
        report.fetched = events.len();

        let candidates: Vec<Event> = events
            .into_iter()
            .filter(|event| match event.validate() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Dropping malformed event '{}': {}", event.title, e);
                    false
                }
            })
            .filter(|event| self.filter.is_lunch_meeting(event))
            .collect();
        report.lunch_candidates = candidates.len();

        tracing::debug!(
            "Tick {}: {} events, {} lunch candidates",
            report.tick_id,
            report.fetched,
            report.lunch_candidates
        );

        for event in candidates {
            if stop.map(|s| *s.borrow()).unwrap_or(false) {
                tracing::info!("Stop requested, ending tick early");
                report.interrupted = true;
                break;
            }

            let status = self.process_event(&mut pipeline, &event).await;
            report.events.push(EventReport {
                event_id: event.event_id,
                title: event.title,
                status,
            });
        }

        self.finish(report)
    }

    async fn process_event(&self, pipeline: &mut RecommendationPipeline, event: &Event) -> EventStatus {
        match self.store.has(&event.event_id).await {
            Ok(true) => {
                tracing::debug!("Event {} already processed", event.event_id);
                return EventStatus::AlreadyProcessed;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!("Processed-event lookup failed for {}: {}", event.event_id, e);
                return EventStatus::StoreUnavailable {
                    reason: e.to_string(),
                };
            }
        }

        let outcome = pipeline.run(event).await;

        if let Ok(mut recent) = self.recent.lock() {
            *recent = pipeline.memory().recent();
        }

        if let Err(e) = self.store.mark(&event.event_id).await {
            tracing::error!("Failed to mark event {} processed: {}", event.event_id, e);
        }

        match outcome {
            PipelineOutcome::Recommended(recommendation) => {
                let delivered = match bounded(
                    "notification",
                    self.call_timeout,
                    self.notifier.deliver(&recommendation),
                )
                .await
                {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(
                            "Delivery via '{}' failed for {}: {}",
                            self.notifier.name(),
                            event.event_id,
                            e
                        );
                        false
                    }
                };

                let (top_venue, score) = recommendation
                    .top_venue()
                    .map(|v| (v.venue.name.clone(), v.score))
                    .unwrap_or_default();

                EventStatus::Recommended {
                    top_venue,
                    score,
                    delivered,
                }
            }
            PipelineOutcome::Skipped { reason, .. } => EventStatus::Skipped {
                reason: reason.to_string(),
            },
        }
    }

    fn finish(&self, mut report: TickReport) -> TickReport {
        report.finished_at = Some(Utc::now());
        if let Ok(mut last) = self.last_report.lock() {
            *last = Some(report.clone());
        }
        report
    }
}
