//! Messaging Module
//!
//! Adapters between the tracking core and the external at-least-once messaging
//! substrate. The core only needs two message shapes (`PageWorkItem` out,
//! `PageProcessed` in) and a way to publish the former.
//!
//! ## Submodules
//! - **`protocol`**: wire DTOs and default topic names.
//! - **`bus`**: the `MessageBus` trait and the in-process `ChannelBus`.
//! - **`dapr`**: `DaprBus`, publishing over a Dapr sidecar's HTTP API.

pub mod bus;
pub mod dapr;
pub mod protocol;
