//! Broadcast scheduler
//!
//! A single background task that simulates real-time activity: every tick it
//! looks at the subscription registry, pulls the next item for a subscribed
//! connection from the cursor service and publishes it on that connection's
//! channel, then sleeps a random interval from the configured window.
//!
//! Lifecycle:
//! - `start` spawns the loop on the current Tokio runtime. Calling it again
//!   while the loop runs does nothing.
//! - `stop` flips a `watch` flag and waits up to `stop_timeout` for the loop
//!   to exit. The loop checks the flag at the top of every iteration and
//!   wakes from its sleep as soon as the flag changes. Calling `stop` while
//!   stopped (or before `start`) does nothing.
//!
//! A tick never takes the registry lock and the cursor lock at the same
//! time: each call returns an owned snapshot before the next one starts.
//! Publish failures are logged per target. Anything that panics inside a
//! tick is caught at the loop boundary, logged, and followed by
//! `recovery_delay` before the next tick.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{SchedulerSettings, TargetPolicy};
use crate::feed::CursorService;
use crate::registry::SubscriptionRegistry;
use crate::scheduler::publisher::{ChannelKey, Publisher, PushPayload, Renderer};
use crate::utils::Result;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of one scheduler iteration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// `(topic, connection)` pairs selected this tick.
    pub targets: usize,
    /// Items handed to the publisher successfully.
    pub published: usize,
    /// Targets whose publish failed.
    pub failed: usize,
}

struct Worker {
    registry: Arc<SubscriptionRegistry>,
    feed: Arc<CursorService>,
    publisher: Arc<dyn Publisher>,
    renderer: Option<Arc<dyn Renderer>>,
    settings: SchedulerSettings,
    rng: Mutex<StdRng>,
}

impl Worker {
    fn tick(&self) -> Tick {
        let mut topics: Vec<String> = self.registry.topics_with_subscribers().into_iter().collect();
        if topics.is_empty() {
            debug!("no topics with subscribers, skipping push");
            return Tick::default();
        }
        // Sorted so a seeded rng picks reproducibly.
        topics.sort();

        let targets = self.pick_targets(topics);
        let mut tick = Tick {
            targets: targets.len(),
            ..Tick::default()
        };

        for (topic, connection_id) in &targets {
            match self.push(topic, connection_id) {
                Ok(published) => tick.published += published,
                Err(e) => {
                    tick.failed += 1;
                    warn!(topic = %topic, connection = %connection_id, "push failed: {e}");
                }
            }
        }
        tick
    }

    fn pick_targets(&self, topics: Vec<String>) -> Vec<(String, String)> {
        match self.settings.policy {
            TargetPolicy::Single => {
                let Some(topic) = topics.choose(&mut *lock(&self.rng)).cloned() else {
                    return Vec::new();
                };
                let connections = self.sorted_connections(&topic);
                let Some(connection_id) = connections.choose(&mut *lock(&self.rng)).cloned()
                else {
                    debug!(topic = %topic, "topic has no active connections, skipping push");
                    return Vec::new();
                };
                debug!(topic = %topic, connection = %connection_id, "picked push target");
                vec![(topic, connection_id)]
            }
            TargetPolicy::All => topics
                .into_iter()
                .flat_map(|topic| {
                    self.sorted_connections(&topic)
                        .into_iter()
                        .map(move |connection_id| (topic.clone(), connection_id))
                })
                .collect(),
        }
    }

    fn sorted_connections(&self, topic: &str) -> Vec<String> {
        let mut connections: Vec<String> =
            self.registry.connections_for_topic(topic).into_iter().collect();
        connections.sort();
        connections
    }

    /// Pulls the next items for one target and publishes them.
    fn push(&self, topic: &str, connection_id: &str) -> Result<usize> {
        let items = self
            .feed
            .next_batch(connection_id, topic, self.settings.items_per_push);
        if items.is_empty() {
            debug!(topic, connection = connection_id, "no new item generated");
            return Ok(0);
        }

        let channel = ChannelKey::new(topic, connection_id);
        let mut published = 0;
        for post in items {
            let payload = PushPayload {
                channel: channel.to_string(),
                html: self.render(&post),
                post,
            };
            self.publisher.publish(&channel, &payload)?;
            published += 1;
            info!(channel = %channel, post = %payload.post.id, "pushed new item");
        }
        Ok(published)
    }

    /// A render failure still publishes the raw item.
    fn render(&self, post: &crate::feed::ContentItem) -> Option<String> {
        let renderer = self.renderer.as_ref()?;
        match renderer.render(post) {
            Ok(html) => Some(html),
            Err(e) => {
                error!(post = %post.id, "failed to render item, sending raw data: {e}");
                None
            }
        }
    }

    fn next_interval(&self) -> Duration {
        let min = self.settings.min_interval_ms;
        let max = self.settings.max_interval_ms.max(min);
        Duration::from_millis(lock(&self.rng).gen_range(min..=max))
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("broadcast scheduler started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let pause = match catch_unwind(AssertUnwindSafe(|| self.tick())) {
                Ok(tick) => {
                    if tick.targets > 0 {
                        debug!(
                            targets = tick.targets,
                            published = tick.published,
                            failed = tick.failed,
                            "scheduler tick"
                        );
                    }
                    self.next_interval()
                }
                Err(panic) => {
                    error!(
                        "scheduler tick panicked: {}; recovering",
                        panic_message(panic.as_ref())
                    );
                    self.settings.recovery_delay()
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("broadcast scheduler stopped");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct BroadcastScheduler {
    worker: Arc<Worker>,
    running: Mutex<Option<Running>>,
}

impl BroadcastScheduler {
    pub fn builder(
        registry: Arc<SubscriptionRegistry>,
        feed: Arc<CursorService>,
        publisher: Arc<dyn Publisher>,
    ) -> BroadcastSchedulerBuilder {
        BroadcastSchedulerBuilder {
            registry,
            feed,
            publisher,
            renderer: None,
            settings: crate::config::Settings::default().scheduler,
            seed: None,
        }
    }

    /// Launches the background loop. Must be called from within a Tokio runtime.
    ///
    /// Returns `false` if the loop was already running.
    pub fn start(&self) -> bool {
        let mut running = lock(&self.running);
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            debug!("broadcast scheduler already running");
            return false;
        }

        info!(
            min_interval_ms = self.worker.settings.min_interval_ms,
            max_interval_ms = self.worker.settings.max_interval_ms,
            policy = ?self.worker.settings.policy,
            "starting broadcast scheduler"
        );
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.worker.clone().run(shutdown_rx));
        *running = Some(Running { shutdown, task });
        true
    }

    /// Signals the loop to exit and waits for it, at most `stop_timeout`.
    pub async fn stop(&self) {
        let Some(Running { shutdown, mut task }) = lock(&self.running).take() else {
            return;
        };

        info!("stopping broadcast scheduler");
        let _ = shutdown.send(true);

        match tokio::time::timeout(self.worker.settings.stop_timeout(), &mut task).await {
            Ok(Ok(())) => info!("broadcast scheduler stopped cleanly"),
            Ok(Err(e)) => error!("broadcast scheduler task failed: {e}"),
            Err(_) => {
                warn!(
                    timeout_ms = self.worker.settings.stop_timeout_ms,
                    "broadcast scheduler did not stop in time, aborting"
                );
                task.abort();
            }
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.running)
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }

    /// Runs one iteration synchronously, without sleeping.
    pub fn run_once(&self) -> Tick {
        self.worker.tick()
    }

    /// Draws the pause the loop would take after a successful tick.
    pub fn next_interval(&self) -> Duration {
        self.worker.next_interval()
    }
}

impl Drop for BroadcastScheduler {
    fn drop(&mut self) {
        if let Some(running) = lock(&self.running).take() {
            let _ = running.shutdown.send(true);
        }
    }
}

pub struct BroadcastSchedulerBuilder {
    registry: Arc<SubscriptionRegistry>,
    feed: Arc<CursorService>,
    publisher: Arc<dyn Publisher>,
    renderer: Option<Arc<dyn Renderer>>,
    settings: SchedulerSettings,
    seed: Option<u64>,
}

impl BroadcastSchedulerBuilder {
    pub fn settings(mut self, settings: SchedulerSettings) -> Self {
        self.settings = settings.validate();
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Fixes the sampling rng, for reproducible target selection.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> BroadcastScheduler {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        BroadcastScheduler {
            worker: Arc::new(Worker {
                registry: self.registry,
                feed: self.feed,
                publisher: self.publisher,
                renderer: self.renderer,
                settings: self.settings,
                rng: Mutex::new(rng),
            }),
            running: Mutex::new(None),
        }
    }
}
