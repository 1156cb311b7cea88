//! Loop scheduler: drives the never-ending long-poll cycle.
//!
//! All mutable engine state lives behind one reader-writer region; compound
//! read-modify-write sequences (cursor swaps, list edits racing an in-flight
//! request) execute as single critical sections. Listener notifications and
//! transport calls never run while the guard is held: the completion handler
//! computes an ordered notification plan under the lock and dispatches it
//! after release.
//!
//! In-flight supersession works through a request generation counter plus
//! transport-task abort: every newly issued request bumps the generation,
//! and a completion whose generation is stale is discarded the same way a
//! transport-level cancel is. The superseded request's pending completion
//! callback lives in engine state, not in the aborted task, so the
//! supersession site acks it as `Cancelled` even when the old task was
//! never polled.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::client::listeners::Notification;
use crate::client::ClientServices;
use crate::net::transport::{TransportOperation, TransportStatus};
use crate::subscribe::channels::{is_presence_name, SubscriptionList};
use crate::subscribe::cursor::{CursorSnapshot, SubscribeCursor};
use crate::subscribe::dedupe::DedupeCache;
use crate::subscribe::fanout;
use crate::subscribe::machine::{StateMachine, SubscriberState, TargetState};
use crate::subscribe::request;
use crate::subscribe::retry::RetryTimer;
use crate::subscribe::status::{StatusCategory, SubscribeStatus};

/// Completion callback for subscribe/unsubscribe entry points.
pub type SubscribeCompletion = Box<dyn FnOnce(SubscribeStatus) + Send + Sync + 'static>;

/// One subscribe invocation: initial registration or loop continuation.
pub struct SubscribeCall {
    pub is_initial: bool,
    /// Caller-requested catch-up token, stored as the cursor override.
    pub timetoken: Option<u64>,
    /// Per-call presence state layered over the stored state.
    pub state: Option<HashMap<String, Value>>,
    /// Extra query parameters; merged add-only.
    pub query: Vec<(String, String)>,
}

impl SubscribeCall {
    pub fn initial() -> Self {
        Self {
            is_initial: true,
            timetoken: None,
            state: None,
            query: Vec::new(),
        }
    }

    pub fn continuation() -> Self {
        Self {
            is_initial: false,
            ..Self::initial()
        }
    }

    pub fn with_timetoken(mut self, timetoken: u64) -> Self {
        self.timetoken = Some(timetoken);
        self
    }

    pub fn with_state(mut self, state: HashMap<String, Value>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }
}

/// One unsubscribe invocation.
pub struct UnsubscribeCall {
    pub channels: Vec<String>,
    pub groups: Vec<String>,
    /// Whether listeners should observe the resulting disconnect.
    pub inform_listener: bool,
    /// Continue the loop with the narrower set once the leave completes.
    pub subscribe_on_rest: bool,
    pub query: Vec<(String, String)>,
}

struct EngineState {
    list: SubscriptionList,
    cursor: SubscribeCursor,
    machine: StateMachine,
    cache: DedupeCache,
    retry_timer: RetryTimer,
    restoring_after_network_issues: bool,
    /// Escaped once at construction; rides every subscribe request.
    filter_expression: Option<String>,
    inflight: Option<JoinHandle<()>>,
    /// Completion callback of the in-flight request, surrendered to whoever
    /// supersedes it.
    pending_completion: Option<SubscribeCompletion>,
    request_seq: u64,
}

impl EngineState {
    /// Invalidate and abort the in-flight subscribe. Returns its pending
    /// completion so the caller can ack it as cancelled outside the guard.
    fn supersede_inflight(&mut self) -> Option<SubscribeCompletion> {
        self.request_seq += 1;
        if let Some(task) = self.inflight.take() {
            task.abort();
        }
        self.pending_completion.take()
    }
}

/// The subscribe engine. Holds a weak back-reference to the client services
/// (observer, not owner): every entry point becomes a no-op once the owning
/// client is torn down.
pub struct SubscribeEngine {
    services: Weak<ClientServices>,
    state: RwLock<EngineState>,
}

impl SubscribeEngine {
    pub fn new(services: Weak<ClientServices>) -> Arc<Self> {
        let filter_expression = services.upgrade().and_then(|services| {
            services
                .config
                .filter_expression
                .as_deref()
                .map(request::escape_query_value)
        });
        Arc::new(Self {
            services,
            state: RwLock::new(EngineState {
                list: SubscriptionList::new(),
                cursor: SubscribeCursor::new(),
                machine: StateMachine::new(),
                cache: DedupeCache::new(),
                retry_timer: RetryTimer::new(),
                restoring_after_network_issues: false,
                filter_expression,
                inflight: None,
                pending_completion: None,
                request_seq: 0,
            }),
        })
    }

    /// Ack a surrendered completion as a controlled cancel.
    fn ack_cancelled(completion: Option<SubscribeCompletion>) {
        if let Some(done) = completion {
            done(SubscribeStatus::new(
                TransportOperation::Subscribe,
                StatusCategory::Cancelled,
            ));
        }
    }

    // ---------------------------------------------------------------------
    // List mutation (single-writer through the engine guard)
    // ---------------------------------------------------------------------

    pub fn add_channels<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.write().list.add_channels(names);
    }

    pub fn add_groups<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.write().list.add_groups(names);
    }

    pub fn add_presence<'a, I>(&self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.state.write().list.add_presence(names);
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    pub fn current_state(&self) -> SubscriberState {
        self.state.read().machine.current()
    }

    pub fn cursor_snapshot(&self) -> CursorSnapshot {
        self.state.read().cursor.snapshot()
    }

    pub fn subscribed_channels(&self) -> Vec<String> {
        self.state.read().list.channel_names()
    }

    pub fn subscribed_groups(&self) -> Vec<String> {
        self.state.read().list.group_names()
    }

    // ---------------------------------------------------------------------
    // Subscribe
    // ---------------------------------------------------------------------

    /// Single entry point for initial registration and loop continuation.
    pub fn subscribe(self: &Arc<Self>, call: SubscribeCall, mut completion: Option<SubscribeCompletion>) {
        let Some(services) = self.services.upgrade() else {
            return;
        };

        let mut st = self.state.write();
        st.retry_timer.stop();

        if st.list.is_empty() {
            // Nothing subscribed: park everything and report a disconnect.
            st.cursor.reset();
            st.restoring_after_network_issues = false;
            let superseded = st.supersede_inflight();
            let outcome = st.machine.apply(TargetState::Disconnected);
            let status = SubscribeStatus::new(
                TransportOperation::Subscribe,
                StatusCategory::Disconnected,
            );
            let plan = if outcome.observable {
                vec![Notification::Status(status.clone())]
            } else {
                Vec::new()
            };
            drop(st);
            Self::ack_cancelled(superseded);
            services.listeners.dispatch(plan);
            if let Some(done) = completion {
                done(status);
            }
            return;
        }

        if call.is_initial {
            if !st.restoring_after_network_issues {
                st.cursor.set_override(call.timetoken);
            }
            st.machine.clear_restore_flag();
            st.cursor.begin_initial();
        } else if let Some(done) = completion.take() {
            // "Has begun" ack; the long-poll outcome itself reaches listeners
            // through the state machine.
            drop(st);
            done(SubscribeStatus::new(
                TransportOperation::Subscribe,
                StatusCategory::Connected,
            ));
            st = self.state.write();
            if st.list.is_empty() {
                // Raced an unsubscribe-from-all while acking.
                return;
            }
        }

        let superseded = self.issue_subscribe(
            &mut st,
            &services,
            call.is_initial,
            call.state.as_ref(),
            &call.query,
            completion,
        );
        drop(st);
        Self::ack_cancelled(superseded);
    }

    /// Build and dispatch one subscribe request. Assumes the guard is held.
    /// Any in-flight request is superseded; its pending completion is
    /// returned so the caller can ack it as `Cancelled` after releasing the
    /// guard. An initial-subscribe completion is parked in engine state and
    /// fires with the registration outcome.
    fn issue_subscribe(
        self: &Arc<Self>,
        st: &mut EngineState,
        services: &Arc<ClientServices>,
        is_initial: bool,
        caller_state: Option<&HashMap<String, Value>>,
        extra_query: &[(String, String)],
        completion: Option<SubscribeCompletion>,
    ) -> Option<SubscribeCompletion> {
        let superseded = st.supersede_inflight();
        let seq = st.request_seq;
        let request = request::build_subscribe(
            &services.config,
            &st.list,
            &st.cursor,
            st.filter_expression.as_deref(),
            caller_state,
            &services.presence_state,
            extra_query,
        );
        tracing::debug!(
            "issuing subscribe (initial: {}, tt: {})",
            is_initial,
            st.cursor.current()
        );

        let engine = Arc::clone(self);
        let transport = Arc::clone(&services.transport);
        st.inflight = Some(tokio::spawn(async move {
            let status = transport.send(request).await;
            engine.handle_subscription_status(seq, is_initial, status);
        }));
        st.pending_completion = completion;
        superseded
    }

    // ---------------------------------------------------------------------
    // Completion handling
    // ---------------------------------------------------------------------

    fn handle_subscription_status(self: &Arc<Self>, seq: u64, is_initial: bool, status: TransportStatus) {
        let Some(services) = self.services.upgrade() else {
            return;
        };
        let completion;
        {
            let mut st = self.state.write();
            if st.request_seq != seq {
                // Superseded by a newer request; the superseder already
                // acked our completion as cancelled.
                tracing::trace!("dropping stale subscribe completion (seq {seq})");
                return;
            }
            st.retry_timer.stop();
            completion = st.pending_completion.take();
        }

        if status.is_error {
            self.handle_failed_subscription(&services, &status, completion);
        } else {
            self.handle_successful_subscription(&services, is_initial, status, completion);
        }
    }

    fn handle_successful_subscription(
        self: &Arc<Self>,
        services: &Arc<ClientServices>,
        is_initial: bool,
        status: TransportStatus,
        completion: Option<SubscribeCompletion>,
    ) {
        let Some(data) = status.service_data else {
            // Success without a body is a broken transport contract.
            let failure = TransportStatus::failure(
                status.operation,
                StatusCategory::MalformedResponse,
                status.request_url,
            );
            self.handle_failed_subscription(services, &failure, completion);
            return;
        };

        let mut plan;
        let mut completion_status = None;
        {
            let mut st = self.state.write();
            let config = &services.config;
            let reuse_last = config.keep_time_token_on_list_change
                || (config.catch_up_on_subscription_restore
                    && st.restoring_after_network_issues);
            let advance = st.cursor.accept(data.timetoken, data.region, is_initial, reuse_last);
            st.restoring_after_network_issues = false;

            // Stale replies skip the cursor but still fan out.
            let override_used = if advance.accepted {
                advance.override_used
            } else {
                None
            };
            plan = fanout::process(
                config,
                &mut st.cache,
                &services.presence_state,
                &data,
                override_used,
            );

            // The next iteration is scheduled before listeners run, so
            // message-handler latency never serializes against the loop.
            if st.list.is_empty() {
                tracing::debug!("subscription list drained; not rescheduling");
            } else {
                // Our own completion was taken at handler entry, so nothing
                // is superseded here.
                let superseded =
                    self.issue_subscribe(&mut st, services, false, None, &[], None);
                debug_assert!(superseded.is_none());
            }

            if is_initial {
                let outcome = st.machine.apply(TargetState::Connected);
                let status =
                    SubscribeStatus::new(TransportOperation::Subscribe, outcome.category)
                        .with_affected(st.list.channel_names(), st.list.group_names());
                completion_status = Some(status.clone());
                if outcome.observable {
                    plan.push(Notification::Status(status));
                }
            }
        }

        if !services.config.manage_presence_list_manually {
            services.heartbeat.start_if_required();
        }
        services.listeners.dispatch(plan);
        if let Some(done) = completion {
            done(completion_status.unwrap_or_else(|| {
                SubscribeStatus::new(TransportOperation::Subscribe, StatusCategory::Connected)
            }));
        }
    }

    fn handle_failed_subscription(
        self: &Arc<Self>,
        services: &Arc<ClientServices>,
        status: &TransportStatus,
        completion: Option<SubscribeCompletion>,
    ) {
        if let Some(done) = completion {
            done(SubscribeStatus::error(status.operation, status.category));
        }
        match status.category {
            StatusCategory::Cancelled => {
                tracing::debug!("subscribe cancelled");
                services.heartbeat.stop_if_possible();
            }
            category if category.is_recoverable_error() => {
                let retry = !category.is_policy_error();
                let mut plan = Vec::new();
                {
                    let mut st = self.state.write();
                    if retry {
                        self.arm_retry_timer(&mut st);
                    }
                    let target = match category {
                        StatusCategory::AccessDenied => TargetState::AccessDenied,
                        StatusCategory::MalformedFilter => TargetState::MalformedFilter,
                        StatusCategory::RequestTooLong => TargetState::RequestTooLong,
                        _ => TargetState::UnexpectedlyDisconnected,
                    };
                    let outcome = st.machine.apply(target);
                    if outcome.observable {
                        plan.push(Notification::Status(
                            SubscribeStatus::error(status.operation, outcome.category)
                                .with_retry(retry)
                                .with_affected(st.list.channel_names(), st.list.group_names()),
                        ));
                    }
                }
                tracing::warn!(
                    "subscribe failed ({:?}), automatic retry: {}",
                    category,
                    retry
                );
                services.listeners.dispatch(plan);
            }
            _ => {
                // Generic disconnect. The transport's own reachability logic
                // owns the retry; park the cursor for catch-up and wait for
                // restore().
                let mut plan = Vec::new();
                {
                    let mut st = self.state.write();
                    st.restoring_after_network_issues = true;
                    if services.config.catch_up_on_subscription_restore {
                        st.cursor.begin_initial();
                    } else {
                        st.cursor.reset();
                    }
                    let outcome = st.machine.apply(TargetState::UnexpectedlyDisconnected);
                    if outcome.observable {
                        plan.push(Notification::Status(
                            SubscribeStatus::error(status.operation, outcome.category)
                                .with_retry(true)
                                .with_affected(st.list.channel_names(), st.list.group_names()),
                        ));
                    }
                }
                tracing::warn!("subscribe hit a network failure; awaiting restore");
                services.heartbeat.stop_if_possible();
                services.listeners.dispatch(plan);
            }
        }
    }

    fn arm_retry_timer(self: &Arc<Self>, st: &mut EngineState) {
        let weak = Arc::downgrade(self);
        st.retry_timer.start(move || {
            if let Some(engine) = weak.upgrade() {
                engine.restore_subscription_cycle();
            }
        });
    }

    // ---------------------------------------------------------------------
    // Restore
    // ---------------------------------------------------------------------

    /// Restore path, entered from the retry timer and from external
    /// reachability signals.
    pub fn restore_subscription_cycle(self: &Arc<Self>) {
        let should_restore = {
            let mut st = self.state.write();
            if st.machine.current() == SubscriberState::AccessDenied {
                st.retry_timer.stop();
            }
            !st.list.is_empty()
                && (st.machine.current() == SubscriberState::AccessDenied
                    || (st.machine.current() == SubscriberState::UnexpectedlyDisconnected
                        && st.machine.may_require_restore()))
        };
        if should_restore {
            tracing::debug!("restoring subscription cycle");
            self.subscribe(SubscribeCall::initial(), None);
        }
    }

    // ---------------------------------------------------------------------
    // Unsubscribe
    // ---------------------------------------------------------------------

    pub fn unsubscribe(self: &Arc<Self>, call: UnsubscribeCall, completion: Option<SubscribeCompletion>) {
        let Some(services) = self.services.upgrade() else {
            return;
        };
        services.presence_state.remove(
            call.channels
                .iter()
                .chain(call.groups.iter())
                .map(String::as_str),
        );

        let mut st = self.state.write();
        st.list
            .remove_channels(call.channels.iter().map(String::as_str));
        st.list.remove_groups(call.groups.iter().map(String::as_str));

        // Presence feeds cannot be leaver-announced.
        let leave_channels: Vec<String> = call
            .channels
            .iter()
            .filter(|name| !is_presence_name(name))
            .cloned()
            .collect();
        let leave_groups: Vec<String> = call
            .groups
            .iter()
            .filter(|name| !is_presence_name(name))
            .cloned()
            .collect();

        if st.list.is_empty() {
            st.cursor.reset();
        }

        if leave_channels.is_empty() && leave_groups.is_empty() {
            drop(st);
            // Nothing to announce: continue the loop with whatever is left;
            // an empty set short-circuits to Disconnected inside subscribe().
            self.subscribe(SubscribeCall::initial(), completion);
            return;
        }

        // A leave supersedes any in-flight subscribe.
        let superseded = st.supersede_inflight();
        let list_version = st.list.version();

        if services.config.suppress_leave_events {
            drop(st);
            Self::ack_cancelled(superseded);
            let status = TransportStatus::success(
                TransportOperation::Unsubscribe,
                String::new(),
                None,
            );
            self.handle_leave_status(&call, list_version, completion, status);
            return;
        }

        let request = request::build_leave(&leave_channels, &leave_groups, &call.query);
        drop(st);
        Self::ack_cancelled(superseded);
        let engine = Arc::clone(self);
        let transport = Arc::clone(&services.transport);
        tokio::spawn(async move {
            let status = transport.send(request).await;
            engine.handle_leave_status(&call, list_version, completion, status);
        });
    }

    fn handle_leave_status(
        self: &Arc<Self>,
        call: &UnsubscribeCall,
        list_version: u64,
        completion: Option<SubscribeCompletion>,
        status: TransportStatus,
    ) {
        let Some(services) = self.services.upgrade() else {
            return;
        };
        let mut plan = Vec::new();
        let resubscribe;
        {
            let mut st = self.state.write();
            if status.is_error && status.category == StatusCategory::AccessDenied {
                let outcome = st.machine.apply(TargetState::AccessDenied);
                if outcome.observable {
                    plan.push(Notification::Status(
                        SubscribeStatus::error(TransportOperation::Unsubscribe, outcome.category)
                            .with_affected(call.channels.clone(), call.groups.clone()),
                    ));
                }
            } else if call.inform_listener {
                let outcome = st.machine.apply(TargetState::Disconnected);
                if outcome.observable {
                    plan.push(Notification::Status(
                        SubscribeStatus::new(TransportOperation::Unsubscribe, outcome.category)
                            .with_affected(call.channels.clone(), call.groups.clone()),
                    ));
                }
            }
            // Continue only if the set survived the leave untouched.
            resubscribe = call.subscribe_on_rest
                && !st.list.is_empty()
                && st.list.version() == list_version;
        }

        services.listeners.dispatch(plan);
        if let Some(done) = completion {
            done(SubscribeStatus::new(
                TransportOperation::Unsubscribe,
                StatusCategory::Acknowledgment,
            ));
        }
        if resubscribe {
            self.subscribe(SubscribeCall::continuation(), None);
        }
    }

    /// Leave every subscribed object and clear internal state.
    pub fn unsubscribe_all(self: &Arc<Self>, completion: Option<SubscribeCompletion>) {
        let Some(services) = self.services.upgrade() else {
            return;
        };
        let (channels, groups) = {
            let mut st = self.state.write();
            st.cache.clear();
            st.restoring_after_network_issues = false;
            (st.list.channel_names(), st.list.group_names())
        };
        services.presence_state.clear();
        if channels.is_empty() && groups.is_empty() {
            if let Some(done) = completion {
                done(SubscribeStatus::new(
                    TransportOperation::Unsubscribe,
                    StatusCategory::Acknowledgment,
                ));
            }
            return;
        }
        self.unsubscribe(
            UnsubscribeCall {
                channels,
                groups,
                inform_listener: true,
                subscribe_on_rest: false,
                query: Vec::new(),
            },
            completion,
        );
    }

    // ---------------------------------------------------------------------
    // Cancellation & teardown
    // ---------------------------------------------------------------------

    /// Abort the in-flight subscribe, if any; its completion acks as a
    /// controlled cancel.
    pub fn cancel_all_subscribes(&self) {
        let superseded = self.state.write().supersede_inflight();
        Self::ack_cancelled(superseded);
        if let Some(services) = self.services.upgrade() {
            services.heartbeat.stop_if_possible();
        }
    }

    /// Engine teardown: releases the timer and the in-flight request.
    pub fn shutdown(&self) {
        let superseded = {
            let mut st = self.state.write();
            let superseded = st.supersede_inflight();
            st.retry_timer.stop();
            superseded
        };
        Self::ack_cancelled(superseded);
    }
}
