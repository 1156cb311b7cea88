//! Common test harness: a scripted transport and a recording listener.
//!
//! The mock pops one pre-programmed outcome per request and records every
//! parameter bag it was handed; once a script runs dry the request pends
//! forever, which is the long-poll analogue of "no new events".

// Not all test files use all helpers; silence dead_code warnings.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use tachyon::client::listeners::EventListener;
use tachyon::config::ClientConfig;
use tachyon::events::envelope::PublishCursor;
use tachyon::events::{Envelope, MessageEvent, PresenceEvent, SubscribeServiceData};
use tachyon::subscribe::status::SubscribeStatus;
use tachyon::{
    StatusCategory, TachyonClient, Transport, TransportOperation, TransportRequest,
    TransportStatus,
};

// -----------------------------------------------------------------------------
// Scripted transport
// -----------------------------------------------------------------------------

#[derive(Default)]
pub struct MockTransport {
    subscribe_script: Mutex<VecDeque<TransportStatus>>,
    leave_script: Mutex<VecDeque<TransportStatus>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_subscribe(&self, status: TransportStatus) {
        self.subscribe_script.lock().push_back(status);
    }

    pub fn push_leave(&self, status: TransportStatus) {
        self.leave_script.lock().push_back(status);
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    pub fn subscribe_requests(&self) -> Vec<TransportRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.operation == TransportOperation::Subscribe)
            .collect()
    }

    pub fn leave_requests(&self) -> Vec<TransportRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.operation == TransportOperation::Unsubscribe)
            .collect()
    }

    /// Timetoken carried by each issued subscribe request, in order.
    pub fn subscribe_timetokens(&self) -> Vec<String> {
        self.subscribe_requests()
            .iter()
            .filter_map(|request| request.query_value("tt").map(str::to_string))
            .collect()
    }
}

impl Transport for MockTransport {
    fn send(
        &self,
        request: TransportRequest,
    ) -> Pin<Box<dyn Future<Output = TransportStatus> + Send + '_>> {
        Box::pin(async move {
            self.requests.lock().push(request.clone());
            let next = match request.operation {
                TransportOperation::Subscribe => self.subscribe_script.lock().pop_front(),
                TransportOperation::Unsubscribe => self.leave_script.lock().pop_front(),
            };
            match next {
                Some(status) => status,
                None => std::future::pending().await,
            }
        })
    }
}

// -----------------------------------------------------------------------------
// Script entries
// -----------------------------------------------------------------------------

pub fn ok(timetoken: u64, region: i32, events: Vec<Envelope>) -> TransportStatus {
    TransportStatus::success(
        TransportOperation::Subscribe,
        "mock://subscribe".to_string(),
        Some(SubscribeServiceData {
            timetoken,
            region,
            events,
        }),
    )
}

pub fn fail(category: StatusCategory) -> TransportStatus {
    TransportStatus::failure(
        TransportOperation::Subscribe,
        category,
        "mock://subscribe".to_string(),
    )
}

pub fn leave_ok() -> TransportStatus {
    TransportStatus::success(TransportOperation::Unsubscribe, "mock://leave".to_string(), None)
}

pub fn leave_fail(category: StatusCategory) -> TransportStatus {
    TransportStatus::failure(
        TransportOperation::Unsubscribe,
        category,
        "mock://leave".to_string(),
    )
}

pub fn msg(timetoken: u64, channel: &str, payload: Value) -> Envelope {
    Envelope {
        channel: channel.to_string(),
        subscription: None,
        publisher: Some("publisher-1".to_string()),
        payload,
        message_type: None,
        publish_cursor: PublishCursor {
            timetoken: timetoken.to_string(),
            region: 1,
        },
        user_metadata: None,
        decrypt_error: false,
    }
}

// -----------------------------------------------------------------------------
// Recording listener
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Status(StatusCategory),
    Message { channel: String, payload: Value },
    Presence { channel: String, action: String },
}

#[derive(Default)]
pub struct RecordingListener {
    records: Mutex<Vec<Recorded>>,
}

impl RecordingListener {
    pub fn all(&self) -> Vec<Recorded> {
        self.records.lock().clone()
    }

    pub fn categories(&self) -> Vec<StatusCategory> {
        self.all()
            .into_iter()
            .filter_map(|record| match record {
                Recorded::Status(category) => Some(category),
                _ => None,
            })
            .collect()
    }

    pub fn message_payloads(&self) -> Vec<Value> {
        self.all()
            .into_iter()
            .filter_map(|record| match record {
                Recorded::Message { payload, .. } => Some(payload),
                _ => None,
            })
            .collect()
    }
}

impl EventListener for RecordingListener {
    fn on_status(&self, status: &SubscribeStatus) {
        self.records.lock().push(Recorded::Status(status.category));
    }

    fn on_message(&self, message: &MessageEvent) {
        self.records.lock().push(Recorded::Message {
            channel: message.channel.clone(),
            payload: message.payload.clone(),
        });
    }

    fn on_presence(&self, event: &PresenceEvent) {
        self.records.lock().push(Recorded::Presence {
            channel: event.channel.clone(),
            action: event.action.clone(),
        });
    }
}

// -----------------------------------------------------------------------------
// Harness
// -----------------------------------------------------------------------------

pub struct Harness {
    pub client: TachyonClient,
    pub transport: Arc<MockTransport>,
    pub listener: Arc<RecordingListener>,
}

pub fn config() -> ClientConfig {
    ClientConfig::new("sub-key", "client-1")
}

pub fn harness(config: ClientConfig) -> Harness {
    let transport = MockTransport::new();
    let client =
        TachyonClient::new(config, transport.clone() as Arc<dyn Transport>).expect("build client");
    let listener = Arc::new(RecordingListener::default());
    client.add_listener(listener.clone());
    Harness {
        client,
        transport,
        listener,
    }
}

/// Let spawned completion tasks drain without advancing time.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Poll a condition while yielding; panics when it never holds.
pub async fn wait_until<F: Fn() -> bool>(what: &str, cond: F) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("timed out waiting for {what}");
}
