//! Request builder: assembles the parameter bag for subscribe and leave
//! calls from the subscription list, the cursor, the filter expression, and
//! merged user state.

use std::collections::HashMap;

use serde_json::Value;

use crate::client::presence::PresenceStateStore;
use crate::core::config::ClientConfig;
use crate::net::transport::{TransportOperation, TransportRequest};
use crate::subscribe::channels::SubscriptionList;
use crate::subscribe::cursor::{SubscribeCursor, REGION_UNSET};

/// Path sentinel used when only channel groups are subscribed; the broker
/// requires a non-empty channel segment.
pub const EMPTY_CHANNELS_SEGMENT: &str = ",";

/// Percent-escape a query value (used for `state` JSON and `filter-expr`).
pub fn escape_query_value(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

fn channels_segment(list: &SubscriptionList) -> String {
    let names = list.channel_names();
    if names.is_empty() {
        EMPTY_CHANNELS_SEGMENT.to_string()
    } else {
        names.join(",")
    }
}

/// Build the parameter bag for one subscribe request.
///
/// Caller-supplied query parameters merge last and may add keys but never
/// override builder-owned ones. A state map that fails to serialize is
/// silently dropped from the bag.
pub fn build_subscribe(
    config: &ClientConfig,
    list: &SubscriptionList,
    cursor: &SubscribeCursor,
    filter_expression: Option<&str>,
    caller_state: Option<&HashMap<String, Value>>,
    presence_state: &PresenceStateStore,
    extra_query: &[(String, String)],
) -> TransportRequest {
    let mut query: Vec<(String, String)> = Vec::new();
    query.push(("tt".to_string(), cursor.current().to_string()));
    if cursor.current_region() > REGION_UNSET {
        query.push(("tr".to_string(), cursor.current_region().to_string()));
    }

    let groups = list.group_names();
    if !groups.is_empty() {
        query.push(("channel-group".to_string(), groups.join(",")));
    }
    if config.presence_heartbeat_value > 0 {
        query.push((
            "heartbeat".to_string(),
            config.presence_heartbeat_value.to_string(),
        ));
    }

    let objects: Vec<String> = list
        .data_channel_names()
        .into_iter()
        .chain(list.group_names())
        .collect();
    let mut state = presence_state.state_merged_with(caller_state, &objects);
    if config.manage_presence_list_manually {
        state.retain(|object, _| objects.contains(object));
    }
    if !state.is_empty() {
        match serde_json::to_string(&ordered(&state)) {
            Ok(json) => query.push(("state".to_string(), escape_query_value(&json))),
            Err(error) => {
                tracing::warn!("dropping state parameter, serialization failed: {error}");
            }
        }
    }

    if let Some(filter) = filter_expression {
        query.push(("filter-expr".to_string(), filter.to_string()));
    }

    merge_extra(&mut query, extra_query);

    TransportRequest {
        operation: TransportOperation::Subscribe,
        channels: channels_segment(list),
        query,
    }
}

/// Build the parameter bag for a leave request over the given objects.
pub fn build_leave(
    channels: &[String],
    groups: &[String],
    extra_query: &[(String, String)],
) -> TransportRequest {
    let mut query: Vec<(String, String)> = Vec::new();
    if !groups.is_empty() {
        query.push(("channel-group".to_string(), groups.join(",")));
    }
    merge_extra(&mut query, extra_query);

    let segment = if channels.is_empty() {
        EMPTY_CHANNELS_SEGMENT.to_string()
    } else {
        channels.join(",")
    };
    TransportRequest {
        operation: TransportOperation::Unsubscribe,
        channels: segment,
        query,
    }
}

fn merge_extra(query: &mut Vec<(String, String)>, extra: &[(String, String)]) {
    for (field, value) in extra {
        if query.iter().any(|(name, _)| name == field) {
            tracing::debug!("ignoring caller query parameter {field}: builder-owned");
            continue;
        }
        query.push((field.clone(), value.clone()));
    }
}

/// Stable key order keeps the serialized state deterministic on the wire.
fn ordered(state: &HashMap<String, Value>) -> std::collections::BTreeMap<&str, &Value> {
    state.iter().map(|(k, v)| (k.as_str(), v)).collect()
}
