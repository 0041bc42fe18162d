//! Stream transport linking a local channel to a remote peer
//!
//! Provides AsyncReader/AsyncWriter traits that can be implemented for
//! different stream transports, and `link_stream`, which relays frames
//! between a stream and a `LocalChannel` so that brokers on either end see
//! each other's messages as if they shared one channel.

use crate::channel::{ChannelReceiver, Envelope, LocalChannel, MessageChannel, TARGET_ANY};
use async_trait::async_trait;
use platform_bridge_core::Result;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Largest frame accepted from a peer (64MB)
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Trait for async reading from a transport
#[async_trait]
pub trait AsyncReader: Send + 'static {
    /// Read a complete message from the transport
    /// Messages are length-prefixed: 4-byte little-endian length + JSON payload
    async fn read_message(&mut self) -> Result<Vec<u8>>;
}

/// Trait for async writing to a transport
#[async_trait]
pub trait AsyncWriter: Send + Sync + 'static {
    /// Write a complete message to the transport
    /// Messages are length-prefixed: 4-byte little-endian length + JSON payload
    async fn write_message(&mut self, data: &[u8]) -> Result<()>;
}

/// Running relay between a stream and a local channel
///
/// Dropping the link stops both relay tasks.
pub struct StreamLink {
    inbound: JoinHandle<()>,
    outbound: JoinHandle<()>,
}

impl StreamLink {
    /// Wait until the peer disconnects or the stream fails
    pub async fn closed(&mut self) {
        let _ = (&mut self.inbound).await;
    }

    pub fn is_closed(&self) -> bool {
        self.inbound.is_finished()
    }
}

impl Drop for StreamLink {
    fn drop(&mut self) {
        self.inbound.abort();
        self.outbound.abort();
    }
}

/// Relay messages between `channel` and a stream peer.
///
/// Messages posted locally to `"*"` or to `peer_origin` are written to the
/// stream; frames read from the stream are posted into the channel. Relayed
/// frames are never written back to the peer.
pub fn link_stream<R: AsyncReader, W: AsyncWriter>(
    channel: &LocalChannel,
    peer_origin: &str,
    reader: R,
    writer: W,
) -> StreamLink {
    // Subscribe now so nothing posted after this call is missed
    let outgoing = channel.endpoint(peer_origin).subscribe();
    let outbound = tokio::spawn(writer_task(outgoing, writer));
    let inbound = tokio::spawn(reader_task(reader, channel.clone()));
    StreamLink { inbound, outbound }
}

/// Background task moving frames from the peer into the channel
async fn reader_task<R: AsyncReader>(mut reader: R, channel: LocalChannel) {
    loop {
        match reader.read_message().await {
            Ok(data) => {
                let json_preview: String =
                    String::from_utf8_lossy(&data).chars().take(200).collect();
                debug!("[peer→{}] len={} json={}", channel.origin(), data.len(), json_preview);

                match serde_json::from_slice(&data) {
                    Ok(value) => channel.post_envelope(Envelope {
                        target: TARGET_ANY.to_string(),
                        data: value,
                        relayed: true,
                    }),
                    Err(e) => warn!("Dropping undecodable frame: {}", e),
                }
            }
            Err(e) => {
                error!("Stream reader failed: {}", e);
                break;
            }
        }
    }
}

/// Background task moving locally posted messages to the peer
async fn writer_task<W: AsyncWriter>(mut outgoing: ChannelReceiver, mut writer: W) {
    while let Some(envelope) = outgoing.recv().await {
        if envelope.relayed {
            continue;
        }
        let data = match serde_json::to_vec(&envelope.data) {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to serialize outgoing message: {}", e);
                continue;
            }
        };
        if let Err(e) = writer.write_message(&data).await {
            error!("Stream writer failed: {}", e);
            break;
        }
    }
    debug!("Stream writer exiting");
}
