//! Per-object custom client state, attached to subscribe requests and
//! refreshed from self-targeted `state-change` presence events.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

#[derive(Debug, Default)]
pub struct PresenceStateStore {
    state: RwLock<HashMap<String, Value>>,
}

impl PresenceStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the given entries into the stored state.
    pub fn merge(&self, entries: &HashMap<String, Value>) {
        let mut state = self.state.write();
        for (object, value) in entries {
            state.insert(object.clone(), value.clone());
        }
    }

    /// Replace the state for one object.
    pub fn set(&self, object: &str, value: Value) {
        self.state.write().insert(object.to_string(), value);
    }

    pub fn remove<'a, I>(&self, objects: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut state = self.state.write();
        for object in objects {
            state.remove(object);
        }
    }

    pub fn clear(&self) {
        self.state.write().clear();
    }

    /// Stored state restricted to the given objects, with caller-supplied
    /// entries layered on top.
    pub fn state_merged_with(
        &self,
        caller: Option<&HashMap<String, Value>>,
        objects: &[String],
    ) -> HashMap<String, Value> {
        let state = self.state.read();
        let mut merged: HashMap<String, Value> = objects
            .iter()
            .filter_map(|object| {
                state
                    .get(object)
                    .map(|value| (object.clone(), value.clone()))
            })
            .collect();
        if let Some(caller) = caller {
            for (object, value) in caller {
                merged.insert(object.clone(), value.clone());
            }
        }
        merged
    }
}
