// Service exports
pub mod cache;
pub mod calendar;
pub mod notifier;
pub mod places;
pub mod postgres;
pub mod stores;
pub mod synthesis;
pub mod traits;

pub use cache::{CacheError, CacheKey, CacheManager, CachingVenueSearch, RedisMemoryPersistence};
pub use calendar::{DemoCalendar, GoogleCalendarClient};
pub use notifier::{
    CalendarNoteNotifier, FanoutNotifier, GmailNotifier, LogNotifier, WebhookNotifier,
};
pub use places::PlacesClient;
pub use postgres::PostgresEventStore;
pub use stores::{JsonEventStore, JsonMemoryFile, MemoryEventStore};
pub use synthesis::GeminiClient;
pub use traits::{
    bounded, CalendarTransport, MemoryPersistence, NotificationChannel, ProcessedEventStore,
    TextSynthesis, VenueSearch,
};
