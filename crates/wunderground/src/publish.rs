//! Topic fan-out over the pub/sub bus.
//!
//! A categorized observation is republished as a topic tree: every
//! branch gets an aggregate `<prefix>/all` event carrying its JSON, and
//! every leaf gets a plain-text event at its own topic. The bus itself
//! sits behind a trait so the fan-out is testable with a recording mock.

use crate::observation::WeatherValue;
use serde::Serialize;
use zenoh::bytes::ZBytes;
use zenoh::Wait;

/// Topic path separator.
pub const TOPIC_DELIM: &str = "/";

/// Payload kind marker carried on every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContentType {
    #[serde(rename = "application/json")]
    Json,
    #[serde(rename = "text/plain")]
    PlainText,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::PlainText => "text/plain",
        }
    }
}

/// Event metadata: originator id and payload kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Headers {
    #[serde(rename = "FROM")]
    pub from: String,
    #[serde(rename = "Content-Type")]
    pub content_type: ContentType,
}

/// Errors from publish operations.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Zenoh error: {0}")]
    Zenoh(#[from] zenoh::Error),

    #[error("JSON encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PublishError>;

/// Fire-and-forget publish seam over the bus.
///
/// No acknowledgment is awaited; an error means the event could not be
/// handed to the bus at all.
pub trait BusPublisher {
    fn publish(&self, topic: &str, headers: &Headers, payload: &[u8]) -> Result<()>;
}

/// Walk the observation tree depth-first and emit one event per node.
///
/// Branches emit `<prefix>/all` with the aggregate JSON before their
/// children; leaves emit the scalar text at `<prefix>` itself. Entry
/// order inside each branch is the emission order, so the full fan-out
/// is deterministic.
pub fn publish_tree<B: BusPublisher + ?Sized>(
    bus: &B,
    item: &WeatherValue,
    topic_prefix: &str,
    from: &str,
) -> Result<()> {
    match item {
        WeatherValue::Branch(entries) => {
            let headers = Headers {
                from: from.to_string(),
                content_type: ContentType::Json,
            };
            let payload = serde_json::to_vec(item)?;
            bus.publish(
                &format!("{}{}all", topic_prefix, TOPIC_DELIM),
                &headers,
                &payload,
            )?;

            for (key, child) in entries {
                let child_prefix = format!("{}{}{}", topic_prefix, TOPIC_DELIM, key);
                publish_tree(bus, child, &child_prefix, from)?;
            }
            Ok(())
        }
        WeatherValue::Leaf(value) => {
            let headers = Headers {
                from: from.to_string(),
                content_type: ContentType::PlainText,
            };
            let text = WeatherValue::leaf_text(value);
            bus.publish(topic_prefix, &headers, text.as_bytes())
        }
    }
}

/// Bus publisher backed by a Zenoh session.
///
/// Events go out as `put`s with the payload kind as the Zenoh encoding
/// and the headers attached as a JSON attachment.
pub struct ZenohBus {
    session: zenoh::Session,
}

impl ZenohBus {
    pub fn new(session: zenoh::Session) -> Self {
        Self { session }
    }
}

impl BusPublisher for ZenohBus {
    fn publish(&self, topic: &str, headers: &Headers, payload: &[u8]) -> Result<()> {
        let encoding = match headers.content_type {
            ContentType::Json => zenoh::bytes::Encoding::APPLICATION_JSON,
            ContentType::PlainText => zenoh::bytes::Encoding::TEXT_PLAIN,
        };
        let attachment = ZBytes::from(serde_json::to_vec(headers)?);
        self.session
            .put(topic, ZBytes::from(payload.to_vec()))
            .encoding(encoding)
            .attachment(attachment)
            .wait()?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::RecordingBus;
    use super::*;
    use serde_json::json;

    fn leaf(v: serde_json::Value) -> WeatherValue {
        WeatherValue::Leaf(v)
    }

    #[test]
    fn two_level_tree_emits_three_events_parent_first() {
        let tree = WeatherValue::Branch(vec![(
            "temperature".to_string(),
            WeatherValue::Branch(vec![("temp_f".to_string(), leaf(json!("72")))]),
        )]);

        let bus = RecordingBus::default();
        publish_tree(&bus, &tree, "weather", "weather1").unwrap();

        let events = bus.take();
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].topic, "weather/all");
        assert_eq!(events[0].headers.content_type, ContentType::Json);
        assert_eq!(
            events[0].payload,
            br#"{"temperature":{"temp_f":"72"}}"#.to_vec()
        );

        assert_eq!(events[1].topic, "weather/temperature/all");
        assert_eq!(events[1].headers.content_type, ContentType::Json);
        assert_eq!(events[1].payload, br#"{"temp_f":"72"}"#.to_vec());

        assert_eq!(events[2].topic, "weather/temperature/temp_f");
        assert_eq!(events[2].headers.content_type, ContentType::PlainText);
        assert_eq!(events[2].payload, b"72".to_vec());
    }

    #[test]
    fn every_event_carries_the_agent_id() {
        let tree = WeatherValue::Branch(vec![("temp_f".to_string(), leaf(json!(72.5)))]);

        let bus = RecordingBus::default();
        publish_tree(&bus, &tree, "weather", "weather1").unwrap();

        for event in bus.take() {
            assert_eq!(event.headers.from, "weather1");
        }
    }

    #[test]
    fn scalar_root_publishes_at_prefix_itself() {
        let bus = RecordingBus::default();
        publish_tree(&bus, &leaf(json!(42)), "weather/answer", "weather1").unwrap();

        let events = bus.take();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].topic, "weather/answer");
        assert_eq!(events[0].payload, b"42".to_vec());
    }

    #[test]
    fn branch_order_drives_emission_order() {
        let tree = WeatherValue::Branch(vec![
            ("zulu".to_string(), leaf(json!("z"))),
            ("alpha".to_string(), leaf(json!("a"))),
        ]);

        let bus = RecordingBus::default();
        publish_tree(&bus, &tree, "weather", "weather1").unwrap();

        let topics: Vec<String> = bus.take().into_iter().map(|e| e.topic).collect();
        assert_eq!(topics, vec!["weather/all", "weather/zulu", "weather/alpha"]);
    }

    #[test]
    fn headers_serialize_with_wire_names() {
        let headers = Headers {
            from: "weather1".to_string(),
            content_type: ContentType::Json,
        };
        assert_eq!(
            serde_json::to_string(&headers).unwrap(),
            r#"{"FROM":"weather1","Content-Type":"application/json"}"#
        );
    }
}
