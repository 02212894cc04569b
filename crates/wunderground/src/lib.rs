//! Weather Underground conditions publisher for Zenoh.
//!
//! This node polls the Weather Underground `conditions` API on a
//! schedule, gated by the API key's daily and per-minute request
//! quotas, and republishes each observation as a topic tree:
//! aggregate JSON at `weather/all` and `weather/<category>/all`,
//! plain-text scalars at the leaves.

pub mod api;
pub mod config;
pub mod node;
pub mod observation;
pub mod publish;
pub mod quota;

pub use api::{conditions_url, FetchError, Fetcher, WeatherClient};
pub use config::{Config, ConfigError, Location, LocationConfig};
pub use node::WeatherNode;
pub use observation::{normalize, sanitize, Category, NormalizeError, WeatherValue, TAXONOMY};
pub use publish::{publish_tree, BusPublisher, ContentType, Headers, PublishError, ZenohBus};
pub use quota::RequestQuota;
