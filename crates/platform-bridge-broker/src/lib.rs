//! Message channel and request/response broker for platform adapters
//!
//! This crate provides:
//! - Wire schema for messages exchanged across the channel
//! - `LocalChannel`, an asynchronous fan-out channel shared by both sides
//! - `MessageBroker` with listener fan-out and correlation-id requests
//! - Stream transport linking a local channel to a remote peer (TCP)

pub mod broker;
pub mod channel;
pub mod protocol;
pub mod tcp;
pub mod transport;

pub use broker::{Channel, ListenerId, MessageBroker, MessageSender};
pub use channel::{ChannelReceiver, Envelope, LocalChannel, MessageChannel, TARGET_ANY};
pub use protocol::{Action, Message, Module, SideTag, decode, encode, unsupported};
pub use tcp::{connect, link_tcp};
pub use transport::{AsyncReader, AsyncWriter, StreamLink, link_stream};
