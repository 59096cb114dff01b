//! # reloader-push - Artifact Delivery
//!
//! Delivers a packaged app bundle to every configured device over a plain
//! TCP stream: no framing, no checksum, the artifact ends when the sender
//! closes its write half.
//!
//! - [`TransferChannel`] - One bounded-connect streaming connection to one device
//! - [`AppPushCoordinator`] - Fans an artifact out to a device list with per-device failure isolation

pub mod channel;
pub mod coordinator;

pub use channel::{
    ChannelConfig, TransferChannel, DEFAULT_CHUNK_SIZE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PUSH_PORT,
};
pub use coordinator::{AppPushCoordinator, PushMode, PushReport};
