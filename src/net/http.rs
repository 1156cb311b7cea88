//! Default long-poll transport over reqwest.
//!
//! Failure mapping: 403 is an authorization refusal, 414 a too-long request
//! URI, request timeouts surface as `Timeout`, TLS handshake problems as
//! `TLSConnectionFailed`, unparsable bodies as `MalformedResponse`, and
//! everything else rides the generic-disconnect path.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;

use crate::core::config::ClientConfig;
use crate::events::envelope;
use crate::net::transport::{
    Transport, TransportOperation, TransportRequest, TransportStatus,
};
use crate::subscribe::status::StatusCategory;

pub struct HttpTransport {
    client: reqwest::Client,
    origin: String,
    subscribe_key: String,
    uuid: String,
    auth_key: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.subscribe_request_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            origin: config.origin.clone(),
            subscribe_key: config.subscribe_key.clone(),
            uuid: config.uuid.clone(),
            auth_key: config.auth_key.clone(),
        })
    }

    /// Render the request URL. Query values owned by the request builder
    /// (`state`, `filter-expr`) arrive pre-escaped and are appended verbatim;
    /// the channel segment is escaped here.
    fn url_for(&self, request: &TransportRequest) -> String {
        // Escape each channel name individually; the commas separating them
        // are part of the path grammar.
        let channels: String = request
            .channels
            .split(',')
            .map(|name| {
                url::form_urlencoded::byte_serialize(name.as_bytes()).collect::<String>()
            })
            .collect::<Vec<_>>()
            .join(",");
        let path = match request.operation {
            TransportOperation::Subscribe => format!(
                "https://{}/v2/subscribe/{}/{}/0",
                self.origin, self.subscribe_key, channels
            ),
            TransportOperation::Unsubscribe => format!(
                "https://{}/v2/presence/sub-key/{}/channel/{}/leave",
                self.origin, self.subscribe_key, channels
            ),
        };
        let mut query: Vec<String> = request
            .query
            .iter()
            .map(|(field, value)| format!("{field}={value}"))
            .collect();
        query.push(format!("uuid={}", self.uuid));
        if let Some(auth) = &self.auth_key {
            query.push(format!("auth={auth}"));
        }
        format!("{path}?{}", query.join("&"))
    }

    async fn execute(&self, request: TransportRequest) -> TransportStatus {
        let url = self.url_for(&request);
        let operation = request.operation;
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(error) => {
                let category = categorize_error(&error);
                tracing::warn!("request failed ({category:?}): {error}");
                return TransportStatus::failure(operation, category, url);
            }
        };

        let http_status = response.status();
        if http_status == StatusCode::FORBIDDEN || http_status == StatusCode::UNAUTHORIZED {
            return TransportStatus::failure(operation, StatusCategory::AccessDenied, url);
        }
        if http_status == StatusCode::URI_TOO_LONG {
            return TransportStatus::failure(operation, StatusCategory::RequestTooLong, url);
        }
        if !http_status.is_success() {
            tracing::warn!("request rejected with HTTP {http_status}");
            return TransportStatus::failure(
                operation,
                StatusCategory::UnexpectedDisconnect,
                url,
            );
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!("failed to read reply body: {error}");
                return TransportStatus::failure(
                    operation,
                    StatusCategory::MalformedResponse,
                    url,
                );
            }
        };
        match operation {
            TransportOperation::Subscribe => match envelope::parse_subscribe_body(&body) {
                Ok(data) => TransportStatus::success(operation, url, Some(data)),
                Err(error) => {
                    tracing::warn!("malformed subscribe reply: {error}");
                    TransportStatus::failure(operation, StatusCategory::MalformedResponse, url)
                }
            },
            TransportOperation::Unsubscribe => TransportStatus::success(operation, url, None),
        }
    }
}

fn categorize_error(error: &reqwest::Error) -> StatusCategory {
    if error.is_timeout() {
        return StatusCategory::Timeout;
    }
    // reqwest does not expose TLS failures as a dedicated kind; they surface
    // as connect errors with a certificate/tls source.
    let rendered = format!("{error:#}").to_lowercase();
    if rendered.contains("tls") || rendered.contains("certificate") {
        return StatusCategory::TLSConnectionFailed;
    }
    StatusCategory::UnexpectedDisconnect
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: TransportRequest,
    ) -> Pin<Box<dyn Future<Output = TransportStatus> + Send + '_>> {
        Box::pin(self.execute(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> HttpTransport {
        let mut config = ClientConfig::new("sub-key", "client-1");
        config.auth_key = Some("token".to_string());
        HttpTransport::new(&config).expect("build transport")
    }

    #[test]
    fn test_subscribe_url_shape() {
        let request = TransportRequest {
            operation: TransportOperation::Subscribe,
            channels: "a,b".to_string(),
            query: vec![("tt".to_string(), "15".to_string())],
        };
        let url = transport().url_for(&request);
        assert!(url.starts_with("https://ps.tachyon.dev/v2/subscribe/sub-key/a,b/0?"));
        assert!(url.contains("tt=15"));
        assert!(url.contains("uuid=client-1"));
        assert!(url.contains("auth=token"));
    }

    #[test]
    fn test_leave_url_shape() {
        let request = TransportRequest {
            operation: TransportOperation::Unsubscribe,
            channels: "a".to_string(),
            query: vec![("channel-group".to_string(), "g".to_string())],
        };
        let url = transport().url_for(&request);
        assert!(url.contains("/v2/presence/sub-key/sub-key/channel/a/leave?"));
        assert!(url.contains("channel-group=g"));
    }
}
