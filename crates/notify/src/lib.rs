//! Realtime progress notification for repoflow.
//!
//! This crate provides:
//! - `ProgressNotifier` trait for pluggable push channels
//! - `NoopNotifier`, the default when nothing is listening
//! - `BroadcastNotifier` for in-process subscribers (websocket sessions)
//! - `WebhookNotifier` for posting events to an HTTP endpoint
//! - `FanoutNotifier` that routes one event to several channels
//! - `QueuedNotifier` that moves a slow channel's delivery off the caller

pub mod broadcast;
pub mod dispatcher;
pub mod noop;
pub mod queued;
pub mod traits;
pub mod webhook;

pub use broadcast::BroadcastNotifier;
pub use dispatcher::FanoutNotifier;
pub use noop::NoopNotifier;
pub use queued::QueuedNotifier;
pub use traits::{DispatchResult, NotifyError, ProgressEvent, ProgressNotifier};
pub use webhook::WebhookNotifier;
