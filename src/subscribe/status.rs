//! Status categories and the status record handed to listeners.

use serde::Serialize;
use serde_json::Value;

use crate::net::transport::TransportOperation;

/// User-visible outcome category for subscribe-loop activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusCategory {
    Connected,
    Reconnected,
    Disconnected,
    UnexpectedDisconnect,
    AccessDenied,
    MalformedFilter,
    RequestTooLong,
    Cancelled,
    Timeout,
    MalformedResponse,
    TLSConnectionFailed,
    DecryptionError,
    RequestMessageCountExceeded,
    Acknowledgment,
}

impl StatusCategory {
    /// Recoverable transport failures: retried on the 1 Hz timer.
    pub fn is_recoverable_error(&self) -> bool {
        matches!(
            self,
            Self::AccessDenied
                | Self::Timeout
                | Self::MalformedFilter
                | Self::MalformedResponse
                | Self::RequestTooLong
                | Self::TLSConnectionFailed
        )
    }

    /// Policy errors require a configuration change before a re-subscribe
    /// can succeed; the engine never retries them automatically.
    pub fn is_policy_error(&self) -> bool {
        matches!(self, Self::MalformedFilter | Self::RequestTooLong)
    }
}

/// Status record delivered to listeners and completion callbacks.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeStatus {
    pub operation: TransportOperation,
    pub category: StatusCategory,
    pub is_error: bool,
    pub automatically_retry: bool,
    pub affected_channels: Vec<String>,
    pub affected_groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl SubscribeStatus {
    pub fn new(operation: TransportOperation, category: StatusCategory) -> Self {
        Self {
            operation,
            category,
            is_error: false,
            automatically_retry: false,
            affected_channels: Vec::new(),
            affected_groups: Vec::new(),
            data: None,
        }
    }

    pub fn error(operation: TransportOperation, category: StatusCategory) -> Self {
        Self {
            is_error: true,
            ..Self::new(operation, category)
        }
    }

    pub fn with_retry(mut self, retry: bool) -> Self {
        self.automatically_retry = retry;
        self
    }

    pub fn with_affected(mut self, channels: Vec<String>, groups: Vec<String>) -> Self {
        self.affected_channels = channels;
        self.affected_groups = groups;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_and_policy_split() {
        assert!(StatusCategory::Timeout.is_recoverable_error());
        assert!(StatusCategory::AccessDenied.is_recoverable_error());
        assert!(!StatusCategory::Cancelled.is_recoverable_error());
        assert!(StatusCategory::MalformedFilter.is_policy_error());
        assert!(StatusCategory::RequestTooLong.is_policy_error());
        assert!(!StatusCategory::Timeout.is_policy_error());
    }
}
