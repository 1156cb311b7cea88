//! Transport contract between the subscribe engine and the wire.
//!
//! The engine hands a parameter bag to the transport and gets back a status
//! record; everything HTTP (TLS, pooling, URL syntax) stays behind this
//! seam. Failures are statuses, never panics.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::events::SubscribeServiceData;
use crate::subscribe::status::StatusCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransportOperation {
    Subscribe,
    Unsubscribe,
}

/// Parameter bag for one request.
///
/// `channels` is the raw path segment: comma-joined names, or the `","`
/// sentinel when only groups are subscribed (the broker requires a
/// non-empty segment). `query` pairs are ordered; `state` and `filter-expr`
/// values arrive pre-escaped and must not be re-encoded.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub operation: TransportOperation,
    pub channels: String,
    pub query: Vec<(String, String)>,
}

impl TransportRequest {
    /// Value of a query field, when present.
    pub fn query_value(&self, field: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }
}

/// Completion record for one request.
#[derive(Debug, Clone)]
pub struct TransportStatus {
    pub operation: TransportOperation,
    pub category: StatusCategory,
    pub is_error: bool,
    /// Request URL (or its logical rendering) for diagnostics.
    pub request_url: String,
    /// Parsed reply body; present on subscribe success.
    pub service_data: Option<SubscribeServiceData>,
}

impl TransportStatus {
    pub fn success(
        operation: TransportOperation,
        request_url: String,
        service_data: Option<SubscribeServiceData>,
    ) -> Self {
        Self {
            operation,
            category: StatusCategory::Acknowledgment,
            is_error: false,
            request_url,
            service_data,
        }
    }

    pub fn failure(
        operation: TransportOperation,
        category: StatusCategory,
        request_url: String,
    ) -> Self {
        Self {
            operation,
            category,
            is_error: true,
            request_url,
            service_data: None,
        }
    }
}

/// Object-safe async transport; completions are delivered by awaiting the
/// returned future on the engine's completion task.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: TransportRequest,
    ) -> Pin<Box<dyn Future<Output = TransportStatus> + Send + '_>>;
}
