//! Typed event model for the subscribe stream.
//!
//! A batched subscribe reply demultiplexes into the variants below. The
//! engine never interprets application payloads; they stay `serde_json::Value`
//! all the way to the listener.

pub mod envelope;

use serde::Serialize;
use serde_json::Value;

pub use envelope::{Envelope, SubscribeServiceData, PRESENCE_CHANNEL_SUFFIX};

/// A real-time message or signal received on a data channel.
#[derive(Debug, Clone, Serialize)]
pub struct MessageEvent {
    pub channel: String,
    /// Subscription match (channel group or wildcard) when it differs from
    /// the channel itself.
    pub subscription: Option<String>,
    pub timetoken: u64,
    pub publisher: Option<String>,
    pub payload: Value,
    pub user_metadata: Option<Value>,
}

/// A message-action event (reaction added/removed on a stored message).
#[derive(Debug, Clone, Serialize)]
pub struct MessageActionEvent {
    pub channel: String,
    pub subscription: Option<String>,
    pub timetoken: u64,
    pub publisher: Option<String>,
    pub action: Value,
}

/// An object (membership/metadata) change event.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectEvent {
    pub channel: String,
    pub subscription: Option<String>,
    pub timetoken: u64,
    pub event: Value,
}

/// A file-upload announcement.
#[derive(Debug, Clone, Serialize)]
pub struct FileEvent {
    pub channel: String,
    pub subscription: Option<String>,
    pub timetoken: u64,
    pub publisher: Option<String>,
    pub payload: Value,
}

/// A presence event on a `-pnpres` feed, reported against the data channel.
#[derive(Debug, Clone, Serialize)]
pub struct PresenceEvent {
    pub channel: String,
    pub subscription: Option<String>,
    pub timetoken: u64,
    /// `join`, `leave`, `timeout`, `state-change` or `interval`.
    pub action: String,
    pub uuid: Option<String>,
    pub occupancy: Option<u64>,
    pub state: Option<Value>,
}

/// Tagged union of everything a subscribe reply can carry.
#[derive(Debug, Clone, Serialize)]
pub enum Event {
    Message(MessageEvent),
    Signal(MessageEvent),
    MessageAction(MessageActionEvent),
    Object(ObjectEvent),
    File(FileEvent),
    Presence(PresenceEvent),
}

impl Event {
    pub fn channel(&self) -> &str {
        match self {
            Event::Message(e) | Event::Signal(e) => &e.channel,
            Event::MessageAction(e) => &e.channel,
            Event::Object(e) => &e.channel,
            Event::File(e) => &e.channel,
            Event::Presence(e) => &e.channel,
        }
    }

    pub fn timetoken(&self) -> u64 {
        match self {
            Event::Message(e) | Event::Signal(e) => e.timetoken,
            Event::MessageAction(e) => e.timetoken,
            Event::Object(e) => e.timetoken,
            Event::File(e) => e.timetoken,
            Event::Presence(e) => e.timetoken,
        }
    }
}
