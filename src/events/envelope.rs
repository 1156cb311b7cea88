//! Wire envelope for the batched subscribe reply.
//!
//! The broker delivers `{"t":{"t":"<timetoken>","r":<region>},"m":[...]}`
//! where each entry of `m` wraps one event with short field tags:
//! `c` channel, `b` subscription match, `i` publisher, `d` payload,
//! `e` message-type tag, `p` publish cursor, `u` user metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{
    Event, FileEvent, MessageActionEvent, MessageEvent, ObjectEvent, PresenceEvent,
};

/// Suffix that marks a channel name as a presence feed.
pub const PRESENCE_CHANNEL_SUFFIX: &str = "-pnpres";

/// Message-type tags carried in the envelope `e` field.
const TYPE_SIGNAL: u8 = 1;
const TYPE_OBJECT: u8 = 2;
const TYPE_MESSAGE_ACTION: u8 = 3;
const TYPE_FILE: u8 = 4;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("subscribe reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("subscribe reply cursor is malformed")]
    Cursor,
}

/// Publish cursor attached to each envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublishCursor {
    #[serde(rename = "t", default)]
    pub timetoken: String,
    #[serde(rename = "r", default = "region_sentinel")]
    pub region: i32,
}

impl Default for PublishCursor {
    fn default() -> Self {
        Self {
            timetoken: String::new(),
            region: region_sentinel(),
        }
    }
}

fn region_sentinel() -> i32 {
    -1
}

/// One event wrapper from the `m` array of a subscribe reply.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope {
    #[serde(rename = "c", default)]
    pub channel: String,
    #[serde(rename = "b", default)]
    pub subscription: Option<String>,
    #[serde(rename = "i", default)]
    pub publisher: Option<String>,
    #[serde(rename = "d", default)]
    pub payload: Value,
    #[serde(rename = "e", default)]
    pub message_type: Option<u8>,
    #[serde(rename = "p", default)]
    pub publish_cursor: PublishCursor,
    #[serde(rename = "u", default)]
    pub user_metadata: Option<Value>,
    /// Set by the crypto layer when payload decryption failed; never on the
    /// wire.
    #[serde(skip)]
    pub decrypt_error: bool,
}

impl Envelope {
    /// Envelope timetoken under unsigned semantics; 0 when absent.
    pub fn timetoken(&self) -> u64 {
        self.publish_cursor.timetoken.parse().unwrap_or(0)
    }

    pub fn is_presence(&self) -> bool {
        self.channel.ends_with(PRESENCE_CHANNEL_SUFFIX)
            || self
                .subscription
                .as_deref()
                .is_some_and(|s| s.ends_with(PRESENCE_CHANNEL_SUFFIX))
    }

    /// True for the plain-message type tag: the only kind the de-dup cache
    /// tracks.
    pub fn is_regular_message(&self) -> bool {
        !self.is_presence() && self.message_type.unwrap_or(0) == 0
    }
}

/// Typed view of a subscribe reply body.
#[derive(Debug, Clone, Default)]
pub struct SubscribeServiceData {
    pub timetoken: u64,
    pub region: i32,
    pub events: Vec<Envelope>,
}

#[derive(Debug, Deserialize)]
struct WireCursor {
    #[serde(rename = "t")]
    timetoken: String,
    #[serde(rename = "r", default = "region_sentinel")]
    region: i32,
}

#[derive(Debug, Deserialize)]
struct WireBody {
    #[serde(rename = "t")]
    cursor: WireCursor,
    #[serde(rename = "m", default)]
    events: Vec<Envelope>,
}

/// Parse a raw subscribe reply body into typed service data.
pub fn parse_subscribe_body(raw: &[u8]) -> Result<SubscribeServiceData, EnvelopeError> {
    let body: WireBody = serde_json::from_slice(raw)?;
    let timetoken = body
        .cursor
        .timetoken
        .parse()
        .map_err(|_| EnvelopeError::Cursor)?;
    Ok(SubscribeServiceData {
        timetoken,
        region: body.cursor.region,
        events: body.events,
    })
}

#[derive(Debug, Deserialize)]
struct PresencePayload {
    #[serde(default)]
    action: String,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    occupancy: Option<u64>,
    #[serde(default)]
    data: Option<Value>,
}

/// Classify one envelope into its typed event.
///
/// Returns `None` for a presence envelope whose payload does not parse; the
/// stream keeps flowing and the envelope is dropped with a warning at the
/// fan-out layer.
pub fn classify(envelope: &Envelope) -> Option<Event> {
    let timetoken = envelope.timetoken();
    if envelope.is_presence() {
        let payload: PresencePayload =
            serde_json::from_value(envelope.payload.clone()).ok()?;
        let channel = envelope
            .channel
            .trim_end_matches(PRESENCE_CHANNEL_SUFFIX)
            .to_string();
        return Some(Event::Presence(PresenceEvent {
            channel,
            subscription: envelope.subscription.clone(),
            timetoken,
            action: payload.action,
            uuid: payload.uuid,
            occupancy: payload.occupancy,
            state: payload.data,
        }));
    }

    let event = match envelope.message_type.unwrap_or(0) {
        TYPE_SIGNAL => Event::Signal(message_event(envelope, timetoken)),
        TYPE_OBJECT => Event::Object(ObjectEvent {
            channel: envelope.channel.clone(),
            subscription: envelope.subscription.clone(),
            timetoken,
            event: envelope.payload.clone(),
        }),
        TYPE_MESSAGE_ACTION => Event::MessageAction(MessageActionEvent {
            channel: envelope.channel.clone(),
            subscription: envelope.subscription.clone(),
            timetoken,
            publisher: envelope.publisher.clone(),
            action: envelope.payload.clone(),
        }),
        TYPE_FILE => Event::File(FileEvent {
            channel: envelope.channel.clone(),
            subscription: envelope.subscription.clone(),
            timetoken,
            publisher: envelope.publisher.clone(),
            payload: envelope.payload.clone(),
        }),
        _ => Event::Message(message_event(envelope, timetoken)),
    };
    Some(event)
}

fn message_event(envelope: &Envelope, timetoken: u64) -> MessageEvent {
    MessageEvent {
        channel: envelope.channel.clone(),
        subscription: envelope.subscription.clone(),
        timetoken,
        publisher: envelope.publisher.clone(),
        payload: envelope.payload.clone(),
        user_metadata: envelope.user_metadata.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_subscribe_body() {
        let raw = br#"{"t":{"t":"15617","r":2},"m":[{"c":"news","i":"pub-1","d":{"text":"hi"},"p":{"t":"15617","r":2}}]}"#;
        let data = parse_subscribe_body(raw).expect("parse body");
        assert_eq!(data.timetoken, 15_617);
        assert_eq!(data.region, 2);
        assert_eq!(data.events.len(), 1);
        assert_eq!(data.events[0].channel, "news");
        assert_eq!(data.events[0].timetoken(), 15_617);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_subscribe_body(b"not json").is_err());
        assert!(parse_subscribe_body(br#"{"t":{"t":"abc"},"m":[]}"#).is_err());
    }

    #[test]
    fn test_classify_by_type_tag() {
        let mut envelope = Envelope {
            channel: "news".into(),
            subscription: None,
            publisher: Some("pub-1".into()),
            payload: json!({"text": "hi"}),
            message_type: None,
            publish_cursor: PublishCursor {
                timetoken: "42".into(),
                region: 1,
            },
            user_metadata: None,
            decrypt_error: false,
        };
        assert!(matches!(classify(&envelope), Some(Event::Message(_))));

        envelope.message_type = Some(1);
        assert!(matches!(classify(&envelope), Some(Event::Signal(_))));
        envelope.message_type = Some(2);
        assert!(matches!(classify(&envelope), Some(Event::Object(_))));
        envelope.message_type = Some(3);
        assert!(matches!(classify(&envelope), Some(Event::MessageAction(_))));
        envelope.message_type = Some(4);
        assert!(matches!(classify(&envelope), Some(Event::File(_))));
    }

    #[test]
    fn test_classify_presence_strips_suffix() {
        let envelope = Envelope {
            channel: "news-pnpres".into(),
            subscription: None,
            publisher: None,
            payload: json!({"action": "join", "uuid": "u-1", "occupancy": 3}),
            message_type: None,
            publish_cursor: PublishCursor {
                timetoken: "42".into(),
                region: 1,
            },
            user_metadata: None,
            decrypt_error: false,
        };
        match classify(&envelope) {
            Some(Event::Presence(presence)) => {
                assert_eq!(presence.channel, "news");
                assert_eq!(presence.action, "join");
                assert_eq!(presence.occupancy, Some(3));
            }
            other => panic!("expected presence event, got {other:?}"),
        }
    }
}
