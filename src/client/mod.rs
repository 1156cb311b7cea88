//! Client shell: owns the collaborator services and the subscribe engine.
//!
//! - `listeners` - Listener registry and notification dispatch
//! - `presence` - Per-object custom client state
//! - `heartbeat` - Presence heartbeat hooks

pub mod heartbeat;
pub mod listeners;
pub mod presence;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::core::config::ClientConfig;
use crate::net::transport::Transport;
use crate::subscribe::cursor::CursorSnapshot;
use crate::subscribe::machine::SubscriberState;
use crate::subscribe::scheduler::{SubscribeCall, SubscribeEngine, UnsubscribeCall};

use self::heartbeat::{HeartbeatHooks, NoopHeartbeat};
use self::listeners::{EventListener, ListenerSink};
use self::presence::PresenceStateStore;

/// Everything the engine consumes from its owning client. The engine holds
/// this through a weak handle; dropping the client turns the engine into a
/// no-op.
pub struct ClientServices {
    pub config: ClientConfig,
    pub transport: Arc<dyn Transport>,
    pub listeners: ListenerSink,
    pub presence_state: PresenceStateStore,
    pub heartbeat: Arc<dyn HeartbeatHooks>,
}

/// User-facing client handle around the subscribe engine.
pub struct TachyonClient {
    services: Arc<ClientServices>,
    engine: Arc<SubscribeEngine>,
}

impl TachyonClient {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::with_parts(config, transport, Arc::new(NoopHeartbeat))
    }

    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        heartbeat: Arc<dyn HeartbeatHooks>,
    ) -> Result<Self> {
        config.validate()?;
        let services = Arc::new(ClientServices {
            config,
            transport,
            listeners: ListenerSink::new(),
            presence_state: PresenceStateStore::new(),
            heartbeat,
        });
        let engine = SubscribeEngine::new(Arc::downgrade(&services));
        Ok(Self { services, engine })
    }

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.services.listeners.add(listener);
    }

    /// Subscribe to data channels, optionally to their presence feeds too,
    /// and (re)start the loop.
    pub fn subscribe_to_channels<I, S>(&self, channels: I, with_presence: bool)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = channels.into_iter().map(Into::into).collect();
        if with_presence {
            self.engine
                .add_presence(names.iter().map(String::as_str));
        }
        self.engine.add_channels(names);
        self.engine.subscribe(SubscribeCall::initial(), None);
    }

    pub fn subscribe_to_groups<I, S>(&self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.engine.add_groups(groups);
        self.engine.subscribe(SubscribeCall::initial(), None);
    }

    /// Re-register the current set, catching up from a caller-chosen token.
    pub fn subscribe_with_timetoken(&self, timetoken: u64) {
        self.engine
            .subscribe(SubscribeCall::initial().with_timetoken(timetoken), None);
    }

    /// Re-register the current set attaching per-object presence state.
    pub fn subscribe_with_state(&self, state: HashMap<String, Value>) {
        self.engine
            .subscribe(SubscribeCall::initial().with_state(state), None);
    }

    pub fn unsubscribe_from_channels<I, S>(&self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.engine.unsubscribe(
            UnsubscribeCall {
                channels: channels.into_iter().map(Into::into).collect(),
                groups: Vec::new(),
                inform_listener: true,
                subscribe_on_rest: true,
                query: Vec::new(),
            },
            None,
        );
    }

    pub fn unsubscribe_from_groups<I, S>(&self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.engine.unsubscribe(
            UnsubscribeCall {
                channels: Vec::new(),
                groups: groups.into_iter().map(Into::into).collect(),
                inform_listener: true,
                subscribe_on_rest: true,
                query: Vec::new(),
            },
            None,
        );
    }

    /// Leave everything; the engine clears its internal state.
    pub fn unsubscribe_all(&self) {
        self.engine.unsubscribe_all(None);
    }

    /// Reachability restore signal (network is back).
    pub fn restore(&self) {
        self.engine.restore_subscription_cycle();
    }

    /// Abort the in-flight subscribe request.
    pub fn cancel_all_subscribes(&self) {
        self.engine.cancel_all_subscribes();
    }

    /// Set presence state for one object; rides the next subscribe request.
    pub fn set_presence_state(&self, object: &str, state: Value) {
        self.services.presence_state.set(object, state);
    }

    pub fn state(&self) -> SubscriberState {
        self.engine.current_state()
    }

    /// Cursor diagnostics: `(current, last)` timetoken/region pairs.
    pub fn cursor(&self) -> CursorSnapshot {
        self.engine.cursor_snapshot()
    }

    pub fn subscribed_channels(&self) -> Vec<String> {
        self.engine.subscribed_channels()
    }

    pub fn subscribed_groups(&self) -> Vec<String> {
        self.engine.subscribed_groups()
    }

    /// Engine access for advanced callers (custom call shapes, completions).
    pub fn engine(&self) -> &Arc<SubscribeEngine> {
        &self.engine
    }
}

impl Drop for TachyonClient {
    fn drop(&mut self) {
        self.engine.shutdown();
    }
}
