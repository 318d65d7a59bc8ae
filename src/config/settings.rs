use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the WebSocket server, the template catalog,
/// pagination, the broadcast scheduler and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub catalog: CatalogSettings,
    pub feed: FeedSettings,
    pub scheduler: SchedulerSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the server will bind to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Where the template catalog is loaded from.
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogSettings {
    pub path: String,
}

/// Pagination defaults for caller-driven `next_batch` requests.
#[derive(Debug, Deserialize, Clone)]
pub struct FeedSettings {
    pub page_size: usize,
}

/// Which subscribed connections receive a push on each scheduler tick.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetPolicy {
    /// One random topic, one random connection per tick.
    #[default]
    #[serde(alias = "single_random")]
    Single,
    /// Every subscribed connection of every subscribed topic per tick.
    #[serde(alias = "all_subscribers")]
    All,
}

/// Configuration settings for the broadcast scheduler.
///
/// Intervals are in milliseconds. The loop sleeps a random duration drawn
/// from `[min_interval_ms, max_interval_ms]` between iterations.
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerSettings {
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
    pub items_per_push: usize,
    pub stop_timeout_ms: u64,
    pub recovery_delay_ms: u64,
    pub policy: TargetPolicy,
}

impl SchedulerSettings {
    /// Returns a copy with a well-formed sleep window and a non-zero push size.
    pub fn validate(mut self) -> Self {
        if self.min_interval_ms > self.max_interval_ms {
            std::mem::swap(&mut self.min_interval_ms, &mut self.max_interval_ms);
        }
        self.items_per_push = self.items_per_push.max(1);
        self
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub catalog: Option<PartialCatalogSettings>,
    pub feed: Option<PartialFeedSettings>,
    pub scheduler: Option<PartialSchedulerSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialCatalogSettings {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialFeedSettings {
    pub page_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialSchedulerSettings {
    pub min_interval_ms: Option<u64>,
    pub max_interval_ms: Option<u64>,
    pub items_per_push: Option<usize>,
    pub stop_timeout_ms: Option<u64>,
    pub recovery_delay_ms: Option<u64>,
    pub policy: Option<TargetPolicy>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            catalog: CatalogSettings {
                path: "data/templates.json".to_string(),
            },
            feed: FeedSettings { page_size: 5 },
            scheduler: SchedulerSettings {
                min_interval_ms: 2_000,
                max_interval_ms: 5_000,
                items_per_push: 1,
                stop_timeout_ms: 10_000,
                recovery_delay_ms: 2_000,
                policy: TargetPolicy::Single,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `Settings::default()`.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server.unwrap_or_default();
        let catalog = self.catalog.unwrap_or_default();
        let feed = self.feed.unwrap_or_default();
        let scheduler = self.scheduler.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
            },
            catalog: CatalogSettings {
                path: catalog.path.unwrap_or(default.catalog.path),
            },
            feed: FeedSettings {
                page_size: feed.page_size.unwrap_or(default.feed.page_size),
            },
            scheduler: SchedulerSettings {
                min_interval_ms: scheduler
                    .min_interval_ms
                    .unwrap_or(default.scheduler.min_interval_ms),
                max_interval_ms: scheduler
                    .max_interval_ms
                    .unwrap_or(default.scheduler.max_interval_ms),
                items_per_push: scheduler
                    .items_per_push
                    .unwrap_or(default.scheduler.items_per_push),
                stop_timeout_ms: scheduler
                    .stop_timeout_ms
                    .unwrap_or(default.scheduler.stop_timeout_ms),
                recovery_delay_ms: scheduler
                    .recovery_delay_ms
                    .unwrap_or(default.scheduler.recovery_delay_ms),
                policy: scheduler.policy.unwrap_or(default.scheduler.policy),
            }
            .validate(),
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
        }
    }
}
