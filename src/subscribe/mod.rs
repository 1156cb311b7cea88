//! The subscribe engine core.
//!
//! - `cursor` - Continuation cursor (timetoken + region pairs)
//! - `channels` - Subscription list (data channels, groups, presence feeds)
//! - `dedupe` - Bounded message de-duplication cache
//! - `machine` - Subscriber state machine
//! - `retry` - 1 Hz retry timer for recoverable failures
//! - `request` - Subscribe/leave parameter-bag builder
//! - `fanout` - Batched-reply demultiplexing into listener notifications
//! - `scheduler` - The loop scheduler tying everything together
//! - `status` - Status categories and records

pub mod channels;
pub mod cursor;
pub mod dedupe;
pub mod fanout;
pub mod machine;
pub mod request;
pub mod retry;
pub mod scheduler;
pub mod status;

pub use channels::SubscriptionList;
pub use cursor::{CursorSnapshot, SubscribeCursor};
pub use dedupe::{DedupeCache, DedupeKey};
pub use machine::{StateMachine, SubscriberState, TargetState};
pub use retry::RetryTimer;
pub use scheduler::{SubscribeCall, SubscribeEngine, UnsubscribeCall};
pub use status::{StatusCategory, SubscribeStatus};
