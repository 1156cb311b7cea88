//! Event fan-out: turns one parsed subscribe reply into an ordered
//! notification plan.
//!
//! Runs inside the engine's critical section (it mutates the de-dup cache
//! and the state store); the returned plan is dispatched to listeners after
//! the guard is released. De-duplication removes elements but never
//! reorders, so broker order survives end to end.

use serde_json::json;

use crate::client::presence::PresenceStateStore;
use crate::core::config::ClientConfig;
use crate::events::{envelope, Event, SubscribeServiceData};
use crate::client::listeners::Notification;
use crate::net::transport::TransportOperation;
use crate::subscribe::dedupe::{DedupeCache, DedupeKey};
use crate::subscribe::status::{StatusCategory, SubscribeStatus};

/// Process one reply into notifications, in delivery order.
pub fn process(
    config: &ClientConfig,
    cache: &mut DedupeCache,
    presence_state: &PresenceStateStore,
    data: &SubscribeServiceData,
    override_used: Option<u64>,
) -> Vec<Notification> {
    let mut plan = Vec::with_capacity(data.events.len() + 1);

    if let Some(token) = override_used {
        // Catch-up across a cached region: entries at or past the requested
        // token no longer describe delivered events.
        cache.purge_newer_than(token);
    }

    let capacity = config.maximum_messages_cache_size;
    let threshold = config.request_message_count_threshold;
    if threshold > 0 && data.events.len() >= threshold {
        plan.push(Notification::Status(
            SubscribeStatus::new(
                TransportOperation::Subscribe,
                StatusCategory::RequestMessageCountExceeded,
            )
            .with_data(json!({ "count": data.events.len() })),
        ));
    }

    for wire in &data.events {
        if wire.decrypt_error {
            plan.push(Notification::Status(
                SubscribeStatus::error(
                    TransportOperation::Subscribe,
                    StatusCategory::DecryptionError,
                )
                .with_data(json!({
                    "channel": wire.channel,
                    "timetoken": wire.timetoken(),
                    "payload": wire.payload,
                })),
            ));
            continue;
        }

        if capacity > 0 && wire.is_regular_message() {
            let key = DedupeKey::new(wire.timetoken(), wire.channel.clone());
            if !cache.try_insert(key, &wire.payload) {
                tracing::trace!(
                    "suppressing duplicate message {}_{}",
                    wire.timetoken(),
                    wire.channel
                );
                continue;
            }
            cache.evict_to(capacity);
        }

        let Some(event) = envelope::classify(wire) else {
            tracing::warn!("dropping unclassifiable envelope on {}", wire.channel);
            continue;
        };

        if let Event::Presence(presence) = &event {
            let own = presence.action == "state-change"
                && presence.uuid.as_deref() == Some(config.uuid.as_str());
            if own {
                if let Some(state) = &presence.state {
                    presence_state.set(&presence.channel, state.clone());
                }
            }
        }

        plan.push(match event {
            Event::Message(message) => Notification::Message(message),
            Event::Signal(signal) => Notification::Signal(signal),
            Event::MessageAction(action) => Notification::MessageAction(action),
            Event::Object(object) => Notification::Object(object),
            Event::File(file) => Notification::File(file),
            Event::Presence(presence) => Notification::Presence(presence),
        });
    }

    plan
}
