//! The weather poll node.
//!
//! One periodic loop drives everything: each tick asks the quota gate
//! for a request slot, fetches current conditions, normalizes them into
//! the category tree and fans the tree out over the bus. A denied gate
//! or a failed fetch just skips the tick; the next one starts fresh.

use crate::api::{self, Fetcher};
use crate::config::{Config, Location};
use crate::observation::{self, sanitize, NormalizeError, WeatherValue};
use crate::publish::{publish_tree, BusPublisher};
use crate::quota::RequestQuota;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Root of the published topic tree.
const ROOT_TOPIC: &str = "weather";

/// Delay before the one-shot startup cycle, so subscribers get data
/// without waiting a full poll period.
const STARTUP_KICK_SECS: u64 = 10;

/// Everything that can fail between a granted request and a publish.
#[derive(Debug, thiserror::Error)]
enum CycleError {
    #[error(transparent)]
    Fetch(#[from] api::FetchError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// Weather polling node: quota gate, fetcher and bus wired to one loop.
pub struct WeatherNode<F, B> {
    agent_id: String,
    request_url: String,
    poll_interval: Duration,
    quota: RequestQuota,
    fetcher: F,
    bus: B,
    valid_data: bool,
}

impl<F: Fetcher, B: BusPublisher> WeatherNode<F, B> {
    pub fn new(config: &Config, location: &Location, fetcher: F, bus: B) -> Self {
        let request_url = api::conditions_url(&config.api_key, location);
        Self {
            agent_id: config.agent_id.clone(),
            request_url,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            quota: RequestQuota::new(config.daily_threshold, config.minute_threshold, Utc::now()),
            fetcher,
            bus,
            valid_data: false,
        }
    }

    /// Whether the most recent fetch produced publishable data.
    pub fn valid_data(&self) -> bool {
        self.valid_data
    }

    pub fn quota(&self) -> &RequestQuota {
        &self.quota
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Run one poll cycle at the given instant.
    ///
    /// A fetch or normalize failure after the gate granted still leaves
    /// that quota slot consumed: the remote call was actually made.
    pub async fn cycle(&mut self, now: DateTime<Utc>) {
        if !self.quota.try_acquire(now) {
            log::warn!("[{}] no requests available, skipping cycle", self.agent_id);
            return;
        }

        match self.fetch_observation().await {
            Ok(tree) => {
                self.valid_data = true;
                if let Err(e) = publish_tree(&self.bus, &tree, ROOT_TOPIC, &self.agent_id) {
                    log::error!("[{}] publish failed: {}", self.agent_id, e);
                }
            }
            Err(e) => {
                log::error!("[{}] invalid data, not publishing: {}", self.agent_id, e);
                self.valid_data = false;
            }
        }
    }

    async fn fetch_observation(&self) -> Result<WeatherValue, CycleError> {
        let document = self.fetcher.fetch(&self.request_url).await?;
        let document = sanitize(document);
        let record = api::current_observation(&document)?;
        Ok(observation::normalize(record)?)
    }

    /// Run the node until the shutdown signal fires.
    ///
    /// A single `select!` loop drives the cycles, so no two fetches can
    /// ever overlap; ticks that elapse while a cycle is still in flight
    /// are coalesced into one.
    pub async fn run(mut self, shutdown_tx: watch::Sender<()>) {
        let mut shutdown = shutdown_tx.subscribe();

        // Request URL carries the API key, so it stays out of the logs.
        log::info!(
            "[{}] polling conditions every {}s",
            self.agent_id,
            self.poll_interval.as_secs()
        );

        // One-shot startup cycle, independent of the periodic schedule.
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(STARTUP_KICK_SECS)) => {
                self.cycle(Utc::now()).await;
            }
            _ = shutdown.changed() => {
                log::info!("[{}] shutdown before first cycle", self.agent_id);
                return;
            }
        }

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick fires immediately; the startup kick already covered it.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.cycle(Utc::now()).await;
                }
                _ = shutdown.changed() => {
                    log::info!("[{}] shutdown signal received, exiting", self.agent_id);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FetchError;
    use crate::config::LocationConfig;
    use crate::observation::TAXONOMY;
    use crate::publish::test_support::RecordingBus;
    use chrono::TimeZone;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubFetcher {
        response: Value,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn ok(response: Value) -> Self {
            Self {
                response,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                response: Value::Null,
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, _url: &str) -> crate::api::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(FetchError::MalformedPayload("connection reset".to_string()))
            } else {
                Ok(self.response.clone())
            }
        }
    }

    fn test_config(minute_threshold: u32) -> Config {
        Config {
            agent_id: "weather1".to_string(),
            poll_interval_secs: 60,
            daily_threshold: 100,
            minute_threshold,
            api_key: "abc123".to_string(),
            location: LocationConfig {
                zip: "99352".to_string(),
                ..Default::default()
            },
        }
    }

    fn conditions_document() -> Value {
        let mut observation = serde_json::Map::new();
        for (_, fields) in TAXONOMY {
            for field in *fields {
                observation.insert((*field).to_string(), json!(*field));
            }
        }
        json!({"current_observation": observation})
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn successful_cycle_publishes_the_full_tree() {
        let config = test_config(10);
        let location = config.location.resolve().unwrap();
        let fetcher = StubFetcher::ok(conditions_document());
        let mut node = WeatherNode::new(&config, &location, fetcher, RecordingBus::default());

        node.cycle(now()).await;

        assert!(node.valid_data());
        let events = node.bus.take();
        // Root "all" + one "all" per category + one leaf per field.
        let leaf_count: usize = TAXONOMY.iter().map(|(_, fields)| fields.len()).sum();
        assert_eq!(events.len(), 1 + TAXONOMY.len() + leaf_count);
        assert_eq!(events[0].topic, "weather/all");
        assert_eq!(events[1].topic, "weather/temperature/all");
        assert_eq!(events[2].topic, "weather/temperature/temperature_string");
    }

    #[tokio::test]
    async fn denied_gate_skips_the_fetch() {
        let config = test_config(0);
        let location = config.location.resolve().unwrap();
        let fetcher = StubFetcher::ok(conditions_document());
        let mut node = WeatherNode::new(&config, &location, fetcher, RecordingBus::default());

        node.cycle(now()).await;

        assert_eq!(node.fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(node.bus.take().is_empty());
        assert_eq!(node.quota().daily_count(), 0);
    }

    #[tokio::test]
    async fn failed_fetch_consumes_the_quota_slot() {
        let config = test_config(10);
        let location = config.location.resolve().unwrap();
        let fetcher = StubFetcher::failing();
        let mut node = WeatherNode::new(&config, &location, fetcher, RecordingBus::default());

        node.cycle(now()).await;

        assert!(!node.valid_data());
        assert!(node.bus.take().is_empty());
        assert_eq!(node.quota().daily_count(), 1);
    }

    #[tokio::test]
    async fn missing_field_skips_publish_but_keeps_slot_spent() {
        let mut document = conditions_document();
        document["current_observation"]
            .as_object_mut()
            .unwrap()
            .remove("wind_mph");

        let config = test_config(10);
        let location = config.location.resolve().unwrap();
        let fetcher = StubFetcher::ok(document);
        let mut node = WeatherNode::new(&config, &location, fetcher, RecordingBus::default());

        node.cycle(now()).await;

        assert!(!node.valid_data());
        assert!(node.bus.take().is_empty());
        assert_eq!(node.quota().daily_count(), 1);
    }
}
