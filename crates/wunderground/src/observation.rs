//! Observation normalization.
//!
//! The Weather Underground `conditions` endpoint returns one flat-ish
//! record of mixed fields. This module shapes it into the fixed category
//! taxonomy the agent publishes: each category picks a known list of
//! fields out of the record, and the result is a typed tree the
//! publisher can walk without inspecting runtime types.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// The seven fixed observation categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Temperature,
    Wind,
    Location,
    Time,
    CloudCover,
    Precipitation,
    PressureHumidity,
}

impl Category {
    /// Topic segment for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Temperature => "temperature",
            Category::Wind => "wind",
            Category::Location => "location",
            Category::Time => "time",
            Category::CloudCover => "cloud_cover",
            Category::Precipitation => "precipitation",
            Category::PressureHumidity => "pressure_humidity",
        }
    }
}

/// Category taxonomy: which record fields land under which category.
///
/// Declaration order here is the publish order. The table is fixed; it
/// mirrors the fields the conditions endpoint is known to carry.
pub const TAXONOMY: &[(Category, &[&str])] = &[
    (
        Category::Temperature,
        &[
            "temperature_string",
            "temp_f",
            "temp_c",
            "feelslike_c",
            "feelslike_f",
            "feelslike_string",
            "windchill_c",
            "windchill_f",
            "windchill_string",
            "heat_index_c",
            "heat_index_f",
            "heat_index_string",
        ],
    ),
    (
        Category::Wind,
        &[
            "wind_gust_kph",
            "wind_string",
            "wind_mph",
            "wind_dir",
            "wind_degrees",
            "wind_kph",
            "wind_gust_mph",
            "pressure_in",
        ],
    ),
    (
        Category::Location,
        &[
            "local_tz_long",
            "observation_location",
            "display_location",
            "station_id",
        ],
    ),
    (
        Category::Time,
        &[
            "local_time_rfc822",
            "local_tz_short",
            "local_tz_offset",
            "local_epoch",
            "observation_time",
            "observation_time_rfc822",
            "observation_epoch",
        ],
    ),
    (
        Category::CloudCover,
        &[
            "weather",
            "solarradiation",
            "visibility_mi",
            "visibility_km",
            "UV",
        ],
    ),
    (
        Category::Precipitation,
        &[
            "dewpoint_string",
            "precip_today_string",
            "dewpoint_f",
            "dewpoint_c",
            "precip_today_metric",
            "precip_today_in",
            "precip_1hr_in",
            "precip_1hr_metric",
            "precip_1hr_string",
        ],
    ),
    (
        Category::PressureHumidity,
        &["pressure_trend", "pressure_mb", "relative_humidity"],
    ),
];

/// Errors from observation normalization.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("observation missing field '{field}' for category '{category}'")]
    MissingField {
        category: &'static str,
        field: &'static str,
    },
}

/// A node in the published observation tree.
///
/// The branch/leaf decision is made once here, so the publisher recurses
/// over a typed tree instead of re-inspecting JSON value kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherValue {
    /// Nested mapping; entries keep their insertion order.
    Branch(Vec<(String, WeatherValue)>),
    /// Scalar payload (string, number, bool, null) or a JSON array,
    /// published as a single text value.
    Leaf(Value),
}

impl WeatherValue {
    /// Convert a record value into a tree node.
    ///
    /// Objects become branches with keys in sorted order so fan-out is
    /// deterministic; everything else stays a leaf.
    fn from_value(value: &Value) -> WeatherValue {
        match value {
            Value::Object(map) => WeatherValue::Branch(
                map.iter()
                    .map(|(k, v)| (k.clone(), WeatherValue::from_value(v)))
                    .collect(),
            ),
            other => WeatherValue::Leaf(other.clone()),
        }
    }

    /// Text representation of a leaf: strings unquoted, everything else
    /// as its JSON text.
    pub fn leaf_text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl Serialize for WeatherValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WeatherValue::Branch(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            WeatherValue::Leaf(value) => value.serialize(serializer),
        }
    }
}

/// Post-fetch sanitation pass over the raw payload.
///
/// Rebuilds nested maps and sequences and leaves scalars as-is.
/// `serde_json` already decodes all text to UTF-8, so the pass
/// normalizes structure only; it exists so the node never stores
/// values straight out of the transport layer.
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, sanitize(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        scalar => scalar,
    }
}

/// Build the categorized observation tree from a flat conditions record.
///
/// Every field the taxonomy lists must be present; a missing one fails
/// the whole cycle rather than substituting a default. Record fields not
/// listed in any category are dropped.
pub fn normalize(record: &Map<String, Value>) -> Result<WeatherValue, NormalizeError> {
    let mut categories = Vec::with_capacity(TAXONOMY.len());
    for (category, fields) in TAXONOMY {
        let mut entries = Vec::with_capacity(fields.len());
        for field in *fields {
            let value = record.get(*field).ok_or(NormalizeError::MissingField {
                category: category.as_str(),
                field,
            })?;
            entries.push(((*field).to_string(), WeatherValue::from_value(value)));
        }
        categories.push((category.as_str().to_string(), WeatherValue::Branch(entries)));
    }
    Ok(WeatherValue::Branch(categories))
}
