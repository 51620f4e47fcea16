// src/lib.rs
// Public library surface for the service binary, demos and integration tests.

pub mod config;
pub mod detect;
pub mod error;
pub mod format;
pub mod model;
pub mod rain;
pub mod source;
pub mod telemetry;
pub mod trend;

// Notification fan-out, cooldown dedup and the periodic cycle
pub mod notify;
pub mod scheduler;

// ---- Re-exports for stable public API ----
pub use crate::detect::{detect_events, DetectionConfig};
pub use crate::error::DetectError;
pub use crate::model::{
    EventCategory, EventType, NotificationRecord, RainPeriod, RecipientId, Subscription,
    WeatherEvent, WeatherSample,
};
pub use crate::notify::{Dispatcher, Notifier};
pub use crate::rain::{filter_short_rains, find_rain_periods, merge_rain_periods_with_short_pauses};
pub use crate::scheduler::{EventScheduler, SchedulerCfg};
