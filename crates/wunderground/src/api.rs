//! Weather Underground API client.
//!
//! Builds the `conditions` request URL and fetches the JSON document.
//! You need a developer key from <http://www.wunderground.com/weather/api/>
//! in the agent config for this to return anything.

use crate::config::Location;
use serde_json::Value;

/// API base endpoint.
const BASE_URL: &str = "http://api.wunderground.com/api";

/// Errors from fetch operations.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Build the conditions query URL for a location.
pub fn conditions_url(api_key: &str, location: &Location) -> String {
    let base = format!("{}/{}/conditions/q/", BASE_URL, api_key);
    match location {
        Location::PostalCode(zip) => format!("{}{}.json", base, zip),
        Location::RegionCity { region, city } => format!("{}{}/{}.json", base, region, city),
    }
}

/// Remote fetch seam.
///
/// Non-2xx responses, transport failures and JSON decode failures all
/// surface as `FetchError`; the poll loop treats them uniformly as a
/// skipped cycle.
#[async_trait::async_trait]
pub trait Fetcher {
    async fn fetch(&self, url: &str) -> Result<Value>;
}

/// reqwest-backed fetcher.
pub struct WeatherClient {
    client: reqwest::Client,
}

impl WeatherClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WeatherClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Fetcher for WeatherClient {
    async fn fetch(&self, url: &str) -> Result<Value> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

/// Pull the `current_observation` object out of a conditions document.
pub fn current_observation(document: &Value) -> Result<&serde_json::Map<String, Value>> {
    document
        .get("current_observation")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            FetchError::MalformedPayload("response has no 'current_observation' object".to_string())
        })
}
