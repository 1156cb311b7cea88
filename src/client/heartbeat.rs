//! Presence heartbeat hooks.
//!
//! The subscribe engine only signals the heartbeat scheduler; announcing
//! presence is someone else's loop.

pub trait HeartbeatHooks: Send + Sync {
    /// Called after every successful subscribe reply (unless the presence
    /// list is manually managed).
    fn start_if_required(&self);

    /// Called on controlled cancellation and on generic disconnect.
    fn stop_if_possible(&self);
}

/// Default hooks for deployments without a heartbeat scheduler.
#[derive(Debug, Default)]
pub struct NoopHeartbeat;

impl HeartbeatHooks for NoopHeartbeat {
    fn start_if_required(&self) {
        tracing::trace!("heartbeat start requested");
    }

    fn stop_if_possible(&self) {
        tracing::trace!("heartbeat stop requested");
    }
}
