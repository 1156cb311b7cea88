//! Subscriber state machine.
//!
//! Every transport outcome requests a target state; the machine decides the
//! stored state, whether listeners observe the transition, and the category
//! they observe it under. `MalformedFilter` and `RequestTooLong` are stored
//! as `UnexpectedlyDisconnected` but keep their distinctive categories.

use crate::subscribe::status::StatusCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Initialized,
    Connected,
    Disconnected,
    UnexpectedlyDisconnected,
    AccessDenied,
}

/// Requested target of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Connected,
    Disconnected,
    UnexpectedlyDisconnected,
    AccessDenied,
    MalformedFilter,
    RequestTooLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub category: StatusCategory,
    /// False suppresses the listener notification for this transition.
    pub observable: bool,
}

#[derive(Debug)]
pub struct StateMachine {
    current: SubscriberState,
    may_require_restore: bool,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: SubscriberState::Initialized,
            may_require_restore: false,
        }
    }

    pub fn current(&self) -> SubscriberState {
        self.current
    }

    /// Whether a reachability restore should re-enter the subscribe loop.
    pub fn may_require_restore(&self) -> bool {
        self.may_require_restore
    }

    /// An explicit initial subscribe withdraws any pending restore claim.
    pub fn clear_restore_flag(&mut self) {
        self.may_require_restore = false;
    }

    /// Apply one transition and report how listeners should see it.
    pub fn apply(&mut self, target: TargetState) -> TransitionOutcome {
        use SubscriberState as S;

        let from = self.current;
        let (stored, category, observable) = match target {
            TargetState::Connected => {
                let category = if from == S::UnexpectedlyDisconnected {
                    StatusCategory::Reconnected
                } else {
                    StatusCategory::Connected
                };
                (S::Connected, category, true)
            }
            TargetState::Disconnected => {
                let observable = matches!(
                    from,
                    S::Initialized | S::Connected | S::UnexpectedlyDisconnected
                );
                (S::Disconnected, StatusCategory::Disconnected, observable)
            }
            TargetState::UnexpectedlyDisconnected => {
                // Same-state re-entry stays observable: a failed restore is
                // reported again.
                let observable = matches!(
                    from,
                    S::Initialized | S::Connected | S::UnexpectedlyDisconnected
                );
                (
                    S::UnexpectedlyDisconnected,
                    StatusCategory::UnexpectedDisconnect,
                    observable,
                )
            }
            TargetState::AccessDenied => {
                let observable = from != S::AccessDenied;
                (S::AccessDenied, StatusCategory::AccessDenied, observable)
            }
            TargetState::MalformedFilter => (
                S::UnexpectedlyDisconnected,
                StatusCategory::MalformedFilter,
                true,
            ),
            TargetState::RequestTooLong => (
                S::UnexpectedlyDisconnected,
                StatusCategory::RequestTooLong,
                true,
            ),
        };

        self.may_require_restore = match target {
            TargetState::Connected => true,
            TargetState::Disconnected | TargetState::UnexpectedlyDisconnected => observable,
            TargetState::AccessDenied
            | TargetState::MalformedFilter
            | TargetState::RequestTooLong => false,
        };
        self.current = stored;

        tracing::debug!(
            "subscriber state {:?} -> {:?} ({:?}, observable: {})",
            from,
            stored,
            category,
            observable
        );
        TransitionOutcome {
            category,
            observable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_connect_reports_connected() {
        let mut machine = StateMachine::new();
        let outcome = machine.apply(TargetState::Connected);
        assert_eq!(outcome.category, StatusCategory::Connected);
        assert!(outcome.observable);
        assert!(machine.may_require_restore());
        assert_eq!(machine.current(), SubscriberState::Connected);
    }

    #[test]
    fn test_reconnect_after_unexpected_disconnect() {
        let mut machine = StateMachine::new();
        machine.apply(TargetState::Connected);
        machine.apply(TargetState::UnexpectedlyDisconnected);
        let outcome = machine.apply(TargetState::Connected);
        assert_eq!(outcome.category, StatusCategory::Reconnected);
    }

    #[test]
    fn test_access_denied_recovery_reports_connected() {
        let mut machine = StateMachine::new();
        machine.apply(TargetState::AccessDenied);
        let outcome = machine.apply(TargetState::Connected);
        assert_eq!(outcome.category, StatusCategory::Connected);
    }

    #[test]
    fn test_disconnected_self_transition_is_ignored() {
        let mut machine = StateMachine::new();
        machine.apply(TargetState::Disconnected);
        let outcome = machine.apply(TargetState::Disconnected);
        assert!(!outcome.observable);
        assert_eq!(machine.current(), SubscriberState::Disconnected);
    }

    #[test]
    fn test_unexpected_disconnect_self_transition_is_observable() {
        let mut machine = StateMachine::new();
        machine.apply(TargetState::Connected);
        machine.apply(TargetState::UnexpectedlyDisconnected);
        let outcome = machine.apply(TargetState::UnexpectedlyDisconnected);
        assert!(outcome.observable);
        assert!(machine.may_require_restore());
    }

    #[test]
    fn test_access_denied_suppresses_repeat_and_disconnect() {
        let mut machine = StateMachine::new();
        machine.apply(TargetState::AccessDenied);
        assert!(!machine.may_require_restore());
        let repeat = machine.apply(TargetState::AccessDenied);
        assert!(!repeat.observable);
        let disconnect = machine.apply(TargetState::Disconnected);
        assert!(!disconnect.observable);
        assert_eq!(machine.current(), SubscriberState::Disconnected);
    }

    #[test]
    fn test_policy_errors_stored_as_unexpected_disconnect() {
        let mut machine = StateMachine::new();
        let outcome = machine.apply(TargetState::MalformedFilter);
        assert_eq!(outcome.category, StatusCategory::MalformedFilter);
        assert_eq!(machine.current(), SubscriberState::UnexpectedlyDisconnected);
        assert!(!machine.may_require_restore());

        let outcome = machine.apply(TargetState::RequestTooLong);
        assert_eq!(outcome.category, StatusCategory::RequestTooLong);
        assert_eq!(machine.current(), SubscriberState::UnexpectedlyDisconnected);

        // Recovery from a stored policy error reads as a reconnect.
        let outcome = machine.apply(TargetState::Connected);
        assert_eq!(outcome.category, StatusCategory::Reconnected);
    }

    #[test]
    fn test_disconnected_to_unexpected_is_unobservable() {
        let mut machine = StateMachine::new();
        machine.apply(TargetState::Disconnected);
        let outcome = machine.apply(TargetState::UnexpectedlyDisconnected);
        assert!(!outcome.observable);
        assert!(!machine.may_require_restore());
    }
}
