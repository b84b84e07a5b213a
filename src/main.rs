use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use lunza::config::{MemoryBackend, Settings, StoreBackend};
use lunza::core::{
    ConstraintExtractor, LunchFilter, Origin, RecommendationPipeline, Scheduler, SessionMemory,
    VenueScorer, Vocabulary,
};
use lunza::error::{CollaboratorError, StartupError, StoreError};
use lunza::models::{EventStatus, ScoringWeights, TickReport};
use lunza::routes::{self, control::AppState};
use lunza::services::{
    bounded, CacheManager, CachingVenueSearch, CalendarNoteNotifier, CalendarTransport,
    DemoCalendar, FanoutNotifier, GeminiClient, GmailNotifier, GoogleCalendarClient,
    JsonEventStore, JsonMemoryFile, LogNotifier, MemoryEventStore, MemoryPersistence,
    NotificationChannel, PlacesClient, PostgresEventStore, ProcessedEventStore,
    RedisMemoryPersistence, TextSynthesis, VenueSearch, WebhookNotifier,
};

#[derive(Parser, Debug)]
#[command(name = "lunza", version, about = "Lunch venue recommendations for calendar meetings")]
struct Cli {
    /// Run a single tick and exit
    #[arg(long)]
    once: bool,

    /// Minutes between ticks in continuous mode
    #[arg(long, value_name = "MINUTES", env = "LUNZA_INTERVAL")]
    interval: Option<u64>,

    /// Use the built-in mock calendar
    #[arg(long)]
    demo: bool,

    /// Configuration file (default: config/default.toml + config/local.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Start the control HTTP surface alongside continuous mode
    #[arg(long)]
    serve: bool,
}

fn init_tracing(level: &str, format: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        "json" => registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok(),
        "compact" => registry
            .with(fmt::layer().with_target(false).compact())
            .try_init()
            .ok(),
        _ => registry
            .with(fmt::layer().with_target(false).pretty())
            .try_init()
            .ok(),
    };
}

#[actix_web::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&settings.logging.level, &settings.logging.format);

    match run(cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Startup failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, settings: Settings) -> Result<(), StartupError> {
    info!("Starting Lunza...");

    let call_timeout = Duration::from_secs(settings.scheduler.call_timeout_secs);

    let vocabulary = Arc::new(match &settings.extraction.vocabulary_path {
        Some(path) => {
            Vocabulary::from_file(path).map_err(|e| StartupError::Vocabulary(format!("{}: {}", path, e)))?
        }
        None => Vocabulary::default(),
    });

    let calendar = build_calendar(&cli, &settings, call_timeout)?;
    bounded("calendar", call_timeout, calendar.probe())
        .await
        .map_err(StartupError::Calendar)?;
    info!("Calendar transport reachable");

    let cache = build_cache(&settings).await;
    let search = build_search(&settings, cache.clone(), call_timeout)?;
    let synthesis = build_synthesis(&settings, call_timeout)?;
    let store = build_store(&settings).await?;
    let notifier = build_notifier(&settings, calendar.clone(), call_timeout)?;

    let weights = ScoringWeights {
        health_fit: settings.scoring.weights.health_fit,
        popularity: settings.scoring.weights.popularity,
        proximity: settings.scoring.weights.proximity,
        novelty: settings.scoring.weights.novelty,
    };
    info!("Scorer initialized with weights: {:?}", weights);

    let scorer = VenueScorer::new(
        weights,
        settings.scoring.max_radius_km,
        settings.scoring.top_n,
        vocabulary.clone(),
    );
    let extractor = ConstraintExtractor::new(vocabulary, settings.extraction.default_area.clone());

    let mut pipeline = RecommendationPipeline::new(extractor, scorer, search, synthesis)
        .with_memory(SessionMemory::with_capacity(settings.scoring.memory_capacity))
        .with_timeout(call_timeout)
        .with_max_results(settings.search.max_results);
    if let Some(persistence) = build_memory_persistence(&settings, cache.as_ref()) {
        pipeline = pipeline.with_persistence(persistence);
    }
    pipeline.restore_memory().await;

    let filter = LunchFilter::new(
        settings.scheduler.lunch_start_hour,
        settings.scheduler.lunch_end_hour,
        settings.scheduler.lunch_keywords.clone(),
    );

    let scheduler = Arc::new(
        Scheduler::new(calendar, store, notifier, pipeline, filter)
            .with_lookahead(chrono::Duration::hours(settings.scheduler.lookahead_hours))
            .with_timeout(call_timeout),
    );

    if cli.once {
        let report = scheduler.run_once().await;
        print_report(&report);
        return Ok(());
    }

    let minutes = cli.interval.unwrap_or(settings.scheduler.interval_minutes).max(1);
    let (stop_tx, stop_rx) = watch::channel(false);

    let scheduler_task = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            scheduler
                .run_continuous(Duration::from_secs(minutes * 60), stop_rx)
                .await
        })
    };

    if cli.serve || settings.server.enabled {
        let app_state = AppState {
            scheduler: scheduler.clone(),
        };
        let host = settings.server.host.clone();
        let port = settings.server.port;
        let workers = settings.server.workers.unwrap_or(2);

        info!("Starting control server on {}:{}", host, port);

        // Runs until SIGINT/SIGTERM
        HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(app_state.clone()))
                .wrap(Cors::permissive())
                .wrap(middleware::Logger::default())
                .wrap(middleware::Compress::default())
                .configure(routes::configure_routes)
        })
        .workers(workers)
        .bind((host, port))?
        .run()
        .await?;
    } else {
        tokio::signal::ctrl_c().await?;
    }

    info!("Shutdown requested, finishing the current event");
    let _ = stop_tx.send(true);
    if let Err(e) = scheduler_task.await {
        warn!("Scheduler task ended abnormally: {}", e);
    }

    Ok(())
}

fn build_calendar(
    cli: &Cli,
    settings: &Settings,
    timeout: Duration,
) -> Result<Arc<dyn CalendarTransport>, StartupError> {
    if cli.demo || settings.calendar.demo {
        info!("Using demo calendar");
        return Ok(Arc::new(DemoCalendar::new()));
    }

    let token = settings.calendar.access_token.clone().ok_or_else(|| {
        StartupError::Calendar(CollaboratorError::NotConfigured(
            "calendar.access_token (GOOGLE_CALENDAR_TOKEN)".to_string(),
        ))
    })?;

    let client = GoogleCalendarClient::new(
        settings.calendar.base_url.clone(),
        settings.calendar.calendar_id.clone(),
        token,
        settings.calendar.max_results,
        timeout,
    )
    .map_err(StartupError::Calendar)?;

    Ok(Arc::new(client))
}

/// The cache is optional; a Redis failure degrades to the in-process tier
async fn build_cache(settings: &Settings) -> Option<Arc<CacheManager>> {
    if !settings.cache.enabled {
        return None;
    }

    let size = settings.cache.l1_cache_size;
    let ttl = settings.cache.ttl_secs;

    let manager = match settings.cache.redis_url.as_deref() {
        Some(url) => match CacheManager::new(Some(url), size, ttl).await {
            Ok(manager) => {
                info!("Cache manager initialized (L1: {} entries, TTL: {}s, Redis L2)", size, ttl);
                manager
            }
            Err(e) => {
                warn!("Failed to connect to Redis ({}), using in-process cache only", e);
                CacheManager::in_memory(size, ttl)
            }
        },
        None => {
            info!("Cache manager initialized (L1: {} entries, TTL: {}s)", size, ttl);
            CacheManager::in_memory(size, ttl)
        }
    };

    Some(Arc::new(manager))
}

fn build_search(
    settings: &Settings,
    cache: Option<Arc<CacheManager>>,
    timeout: Duration,
) -> Result<Arc<dyn VenueSearch>, StartupError> {
    let api_key = settings.search.api_key.clone().ok_or_else(|| {
        StartupError::Collaborator(CollaboratorError::NotConfigured(
            "search.api_key (PLACES_API_KEY)".to_string(),
        ))
    })?;

    let origin = match (settings.search.origin_latitude, settings.search.origin_longitude) {
        (Some(latitude), Some(longitude)) => Some(Origin {
            latitude,
            longitude,
        }),
        _ => {
            warn!("No search origin configured; venue distances will be unknown");
            None
        }
    };

    let places: Arc<dyn VenueSearch> = Arc::new(
        PlacesClient::new(settings.search.base_url.clone(), api_key, origin, timeout)
            .map_err(StartupError::Collaborator)?,
    );

    Ok(match cache {
        Some(cache) => Arc::new(CachingVenueSearch::new(places, cache)),
        None => places,
    })
}

fn build_synthesis(settings: &Settings, timeout: Duration) -> Result<Arc<dyn TextSynthesis>, StartupError> {
    let api_key = settings.synthesis.api_key.clone().ok_or_else(|| {
        StartupError::Collaborator(CollaboratorError::NotConfigured(
            "synthesis.api_key (GEMINI_API_KEY or GOOGLE_API_KEY)".to_string(),
        ))
    })?;

    let client = GeminiClient::new(
        settings.synthesis.base_url.clone(),
        api_key,
        settings.synthesis.model.clone(),
        timeout,
    )
    .map_err(StartupError::Collaborator)?;

    Ok(Arc::new(client))
}

async fn build_store(settings: &Settings) -> Result<Arc<dyn ProcessedEventStore>, StartupError> {
    let store: Arc<dyn ProcessedEventStore> = match settings.store.backend {
        StoreBackend::Memory => {
            warn!("Processed events are kept in memory and will be forgotten on restart");
            Arc::new(MemoryEventStore::new())
        }
        StoreBackend::Json => Arc::new(JsonEventStore::open(&settings.store.path).await?),
        StoreBackend::Postgres => {
            let url = settings.store.database_url.as_deref().ok_or_else(|| {
                StoreError::NotConfigured("store.database_url (DATABASE_URL)".to_string())
            })?;
            Arc::new(
                PostgresEventStore::new(
                    url,
                    settings.store.max_connections,
                    settings.store.min_connections,
                    Duration::from_secs(settings.store.acquire_timeout_secs),
                )
                .await?,
            )
        }
    };

    info!("Processed-event store ready ({:?})", settings.store.backend);
    Ok(store)
}

fn build_memory_persistence(
    settings: &Settings,
    cache: Option<&Arc<CacheManager>>,
) -> Option<Arc<dyn MemoryPersistence>> {
    match settings.store.memory_backend {
        MemoryBackend::None => None,
        MemoryBackend::Json => Some(Arc::new(JsonMemoryFile::new(&settings.store.memory_path))),
        MemoryBackend::Redis => match cache {
            Some(cache) if cache.has_l2() => Some(Arc::new(RedisMemoryPersistence::new(cache.clone(), "default"))),
            _ => {
                warn!("Redis memory persistence requested without a Redis cache; memory will not persist");
                None
            }
        },
    }
}

fn build_notifier(
    settings: &Settings,
    calendar: Arc<dyn CalendarTransport>,
    timeout: Duration,
) -> Result<Arc<dyn NotificationChannel>, StartupError> {
    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

    if settings.notification.log {
        channels.push(Arc::new(LogNotifier));
    }
    if settings.notification.calendar_note {
        channels.push(Arc::new(CalendarNoteNotifier::new(calendar)));
    }
    if let Some(url) = &settings.notification.webhook_url {
        channels.push(Arc::new(
            WebhookNotifier::new(url.clone(), timeout).map_err(StartupError::Collaborator)?,
        ));
    }
    if !settings.notification.email_recipients.is_empty() {
        let token = settings.calendar.access_token.clone().ok_or_else(|| {
            StartupError::Collaborator(CollaboratorError::NotConfigured(
                "calendar.access_token with gmail.send scope (GOOGLE_CALENDAR_TOKEN)".to_string(),
            ))
        })?;
        channels.push(Arc::new(
            GmailNotifier::new(
                settings.notification.gmail_base_url.clone(),
                token,
                settings.notification.email_sender.clone(),
                settings.notification.email_recipients.clone(),
                timeout,
            )
            .map_err(StartupError::Collaborator)?,
        ));
    }

    let fanout = FanoutNotifier::new(channels);
    if fanout.is_empty() {
        warn!("No notification channels enabled; recommendations are only reported per tick");
    }
    Ok(Arc::new(fanout))
}

fn print_report(report: &TickReport) {
    if let Some(e) = &report.fetch_error {
        println!("Calendar fetch failed: {}", e);
        return;
    }

    println!(
        "Fetched {} events, {} lunch meetings",
        report.fetched, report.lunch_candidates
    );

    for event in &report.events {
        let outcome = match &event.status {
            EventStatus::Recommended {
                top_venue,
                score,
                delivered,
            } => format!(
                "recommended {} ({:.1}/100){}",
                top_venue,
                score,
                if *delivered { "" } else { ", delivery failed" }
            ),
            EventStatus::Skipped { reason } => format!("skipped: {}", reason),
            EventStatus::AlreadyProcessed => "already processed".to_string(),
            EventStatus::StoreUnavailable { reason } => format!("not processed, store unavailable: {}", reason),
        };
        println!("  {} [{}]: {}", event.title, event.event_id, outcome);
    }
}
