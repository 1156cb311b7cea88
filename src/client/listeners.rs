//! Listener registry and notification dispatch.
//!
//! The engine computes an ordered notification plan inside its critical
//! section and hands the whole plan to [`ListenerSink::dispatch`] after the
//! guard is released, so listeners never run under the engine lock and a
//! reply's events are never interleaved with another completion.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::events::{
    FileEvent, MessageActionEvent, MessageEvent, ObjectEvent, PresenceEvent,
};
use crate::subscribe::status::SubscribeStatus;

/// Receiver for subscribe-loop output. All methods default to no-ops so
/// implementations override only what they consume.
#[allow(unused_variables)]
pub trait EventListener: Send + Sync {
    fn on_status(&self, status: &SubscribeStatus) {}
    fn on_message(&self, message: &MessageEvent) {}
    fn on_signal(&self, signal: &MessageEvent) {}
    fn on_message_action(&self, action: &MessageActionEvent) {}
    fn on_object(&self, event: &ObjectEvent) {}
    fn on_file(&self, event: &FileEvent) {}
    fn on_presence(&self, event: &PresenceEvent) {}
}

/// One entry of a notification plan, in delivery order.
#[derive(Debug, Clone)]
pub enum Notification {
    Status(SubscribeStatus),
    Message(MessageEvent),
    Signal(MessageEvent),
    MessageAction(MessageActionEvent),
    Object(ObjectEvent),
    File(FileEvent),
    Presence(PresenceEvent),
}

#[derive(Default)]
pub struct ListenerSink {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl ListenerSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().push(listener);
    }

    /// Deliver a whole plan as one notify block, preserving order.
    pub fn dispatch(&self, plan: Vec<Notification>) {
        if plan.is_empty() {
            return;
        }
        let listeners = self.listeners.read().clone();
        for notification in &plan {
            for listener in &listeners {
                match notification {
                    Notification::Status(status) => listener.on_status(status),
                    Notification::Message(message) => listener.on_message(message),
                    Notification::Signal(signal) => listener.on_signal(signal),
                    Notification::MessageAction(action) => listener.on_message_action(action),
                    Notification::Object(event) => listener.on_object(event),
                    Notification::File(event) => listener.on_file(event),
                    Notification::Presence(event) => listener.on_presence(event),
                }
            }
        }
    }
}
