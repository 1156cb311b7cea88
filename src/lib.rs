#![deny(clippy::all, clippy::pedantic)]
// Module naming: common pattern in domain-driven code
#![allow(clippy::module_name_repetitions)]
// Function complexity: some functions are inherently complex
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]
// Documentation style: many terms don't need backticks
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
// API ergonomics: prefer simplicity over must_use annotations
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
// Format strings: allow non-inlined for readability
#![allow(clippy::uninlined_format_args)]
// Import style
#![allow(clippy::wildcard_imports)]
// Variable naming: domain terms often similar
#![allow(clippy::similar_names)]
// Struct field patterns
#![allow(clippy::struct_excessive_bools)]
// Control flow style
#![allow(clippy::if_not_else)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::single_match_else)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::manual_let_else)]
// Passing style
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::trivially_copy_pass_by_ref)]
// Option/Result patterns
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
// Type defaults
#![allow(clippy::default_trait_access)]
#![allow(clippy::implicit_hasher)]
// Closure style
#![allow(clippy::redundant_closure_for_method_calls)]
// Unit patterns
#![allow(clippy::ignored_unit_patterns)]
// Explicit returns
#![allow(clippy::needless_return)]
#![allow(clippy::semicolon_if_nothing_returned)]

//! Tachyon - client-side subscribe engine for a real-time pub/sub messaging
//! service.
//!
//! The client keeps one long-poll conversation with the broker and fans the
//! batched replies out to listeners as typed events, de-duplicating broker
//! retransmissions and reconnecting through a small state machine.
//!
//! # Module Organization
//!
//! ## Core
//! - `core::config` - Configuration parsing and validation
//!
//! ## Engine
//! - `subscribe::scheduler` - Long-poll loop scheduler
//! - `subscribe::machine` - Subscriber state machine
//! - `subscribe::cursor` - Continuation cursor
//! - `subscribe::channels` - Subscription list
//! - `subscribe::dedupe` - Message de-duplication
//! - `subscribe::fanout` - Event demultiplexing
//! - `subscribe::request` - Request parameter building
//! - `subscribe::retry` - Retry timer
//!
//! ## Events
//! - `events` - Typed event model and the wire envelope
//!
//! ## Networking
//! - `net::transport` - Transport contract
//! - `net::http` - Default long-poll transport
//!
//! ## Client
//! - `client` - Client handle, listener sink, presence state, heartbeat hooks
//!
//! ## Operations
//! - `ops::telemetry` - Tracing initialisation
//!
//! ## CLI
//! - `cli` - Command-line client

// Core infrastructure
pub mod core;

// Engine
pub mod subscribe;

// Events
pub mod events;

// Networking
pub mod net;

// Client shell
pub mod client;

// Operations
pub mod ops;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::config;
pub use client::heartbeat::{HeartbeatHooks, NoopHeartbeat};
pub use client::listeners::{EventListener, ListenerSink, Notification};
pub use client::presence::PresenceStateStore;
pub use client::{ClientServices, TachyonClient};
pub use events::{Envelope, Event, SubscribeServiceData};
pub use net::{Transport, TransportOperation, TransportRequest, TransportStatus};
pub use subscribe::{
    StatusCategory, SubscribeCall, SubscribeEngine, SubscribeStatus, SubscriberState,
    UnsubscribeCall,
};
