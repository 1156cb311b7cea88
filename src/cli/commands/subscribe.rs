//! Subscribe command - connect and stream received events to stdout.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{sleep, Duration};

use crate::cli::args::{OutputFormat, SubscribeArgs};
use crate::client::listeners::EventListener;
use crate::client::TachyonClient;
use crate::core::config::ClientConfig;
use crate::events::{MessageEvent, PresenceEvent};
use crate::net::http::HttpTransport;
use crate::subscribe::scheduler::SubscribeCall;
use crate::subscribe::status::SubscribeStatus;

pub async fn run_subscribe(args: SubscribeArgs) -> Result<()> {
    let config = build_config(&args)?;
    if args.channels.is_empty() && args.groups.is_empty() {
        bail!("nothing to subscribe to: pass --channel and/or --group");
    }

    let transport = Arc::new(HttpTransport::new(&config).context("build transport")?);
    let client = TachyonClient::new(config, transport).context("build client")?;
    client.add_listener(Arc::new(StdoutListener {
        format: args.format,
    }));

    let engine = client.engine();
    if args.presence {
        engine.add_presence(args.channels.iter().map(String::as_str));
    }
    engine.add_channels(args.channels.clone());
    engine.add_groups(args.groups.clone());
    let mut call = SubscribeCall::initial();
    if let Some(timetoken) = args.timetoken {
        call = call.with_timetoken(timetoken);
    }
    engine.subscribe(call, None);
    eprintln!(
        "subscribed to {} channel(s), {} group(s)",
        args.channels.len(),
        args.groups.len()
    );

    // Stream until the process is told to stop, then leave cleanly so the
    // broker announces this client's departure.
    let mut interrupt = signal(SignalKind::interrupt()).context("install SIGINT handler")?;
    let mut terminate = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    let reason = tokio::select! {
        _ = interrupt.recv() => "interrupt",
        _ = terminate.recv() => "terminate",
    };
    eprintln!("caught {reason} signal; leaving all subscriptions...");
    client.unsubscribe_all();
    // Give the leave request a moment to reach the broker.
    sleep(Duration::from_millis(500)).await;
    Ok(())
}

fn build_config(args: &SubscribeArgs) -> Result<ClientConfig> {
    let mut config = match (&args.config, &args.subscribe_key) {
        (Some(path), _) => ClientConfig::load(path)?,
        (None, Some(key)) => {
            let uuid = args
                .uuid
                .clone()
                .unwrap_or_else(|| format!("tachyon-{}", short_uuid()));
            ClientConfig::new(key.clone(), uuid)
        }
        (None, None) => bail!("either --config or --subscribe-key is required"),
    };
    if let Some(uuid) = &args.uuid {
        config.uuid = uuid.clone();
    }
    if let Some(origin) = &args.origin {
        config.origin = origin.clone();
    }
    if let Some(filter) = &args.filter {
        config.filter_expression = Some(filter.clone());
    }
    config.validate()?;
    Ok(config)
}

fn short_uuid() -> String {
    uuid::Uuid::new_v4()
        .to_string()
        .split('-')
        .next()
        .unwrap_or("anon")
        .to_string()
}

// -----------------------------------------------------------------------------
// Output
// -----------------------------------------------------------------------------

struct StdoutListener {
    format: OutputFormat,
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    ts: String,
    kind: &'static str,
    channel: &'a str,
    timetoken: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    publisher: Option<&'a str>,
    payload: &'a Value,
}

impl StdoutListener {
    fn emit(&self, kind: &'static str, channel: &str, timetoken: u64, publisher: Option<&str>, payload: &Value) {
        match self.format {
            OutputFormat::Json => {
                let line = MessageOutput {
                    ts: Utc::now().to_rfc3339(),
                    kind,
                    channel,
                    timetoken,
                    publisher,
                    payload,
                };
                if let Ok(json) = serde_json::to_string(&line) {
                    println!("{json}");
                }
            }
            OutputFormat::Raw => {
                if let Some(text) = payload.as_str() {
                    println!("{text}");
                } else {
                    println!("{payload}");
                }
            }
        }
    }
}

impl EventListener for StdoutListener {
    fn on_status(&self, status: &SubscribeStatus) {
        eprintln!(
            "status: {:?} (error: {}, retry: {})",
            status.category, status.is_error, status.automatically_retry
        );
    }

    fn on_message(&self, message: &MessageEvent) {
        self.emit(
            "message",
            &message.channel,
            message.timetoken,
            message.publisher.as_deref(),
            &message.payload,
        );
    }

    fn on_signal(&self, signal: &MessageEvent) {
        self.emit(
            "signal",
            &signal.channel,
            signal.timetoken,
            signal.publisher.as_deref(),
            &signal.payload,
        );
    }

    fn on_presence(&self, event: &PresenceEvent) {
        if matches!(self.format, OutputFormat::Json) {
            let payload = serde_json::json!({
                "action": event.action,
                "uuid": event.uuid,
                "occupancy": event.occupancy,
            });
            self.emit("presence", &event.channel, event.timetoken, None, &payload);
        }
    }
}
