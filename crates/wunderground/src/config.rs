use serde::{Deserialize, Serialize};
use std::path::Path;

/// Location selector for the conditions query.
///
/// Either a postal code or a region/city pair must be set; the postal
/// code wins when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Postal code (e.g. "99352")
    #[serde(default)]
    pub zip: String,
    /// State or country code (e.g. "WA")
    #[serde(default)]
    pub region: String,
    /// City name (e.g. "Richland")
    #[serde(default)]
    pub city: String,
}

/// Resolved location used to build the request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    PostalCode(String),
    RegionCity { region: String, city: String },
}

impl LocationConfig {
    /// Resolve the selector, favouring the postal code.
    pub fn resolve(&self) -> Result<Location, ConfigError> {
        if !self.zip.is_empty() {
            Ok(Location::PostalCode(self.zip.clone()))
        } else if !self.region.is_empty() && !self.city.is_empty() {
            Ok(Location::RegionCity {
                region: self.region.clone(),
                city: self.city.clone(),
            })
        } else {
            Err(ConfigError::MissingLocation)
        }
    }
}

/// Root configuration structure for the weather agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Agent identifier, stamped into the FROM header of every event
    pub agent_id: String,
    /// Seconds between poll cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Maximum granted requests per calendar day
    #[serde(default = "default_daily_threshold")]
    pub daily_threshold: u32,
    /// Maximum granted requests in any rolling 60-second window
    #[serde(default = "default_minute_threshold")]
    pub minute_threshold: u32,
    /// Weather Underground developer API key
    pub api_key: String,
    /// Location to query conditions for
    #[serde(default)]
    pub location: LocationConfig,
}

fn default_poll_interval() -> u64 {
    300
}

fn default_daily_threshold() -> u32 {
    500
}

fn default_minute_threshold() -> u32 {
    10
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Check that the config can actually drive a node.
    ///
    /// The location selector is resolved here so a missing one is a
    /// startup error rather than a broken request URL later.
    pub fn validate(&self) -> Result<Location, ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        self.location.resolve()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("no location selected: set either zip or region and city")]
    MissingLocation,
    #[error("no API key configured")]
    MissingApiKey,
}
