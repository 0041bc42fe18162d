//! TCP transport implementation
//!
//! Used when the two sides of the bridge run in separate processes, e.g. a
//! game build talking to the QA harness.

use crate::channel::LocalChannel;
use crate::transport::{AsyncReader, AsyncWriter, MAX_FRAME_LEN, StreamLink, link_stream};
use async_trait::async_trait;
use platform_bridge_core::{BridgeError, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::info;

/// TCP read wrapper
pub struct TcpReadWrapper(pub OwnedReadHalf);

#[async_trait]
impl AsyncReader for TcpReadWrapper {
    async fn read_message(&mut self) -> Result<Vec<u8>> {
        // Read 4-byte length prefix (little-endian)
        let mut len_bytes = [0u8; 4];
        self.0
            .read_exact(&mut len_bytes)
            .await
            .map_err(|e| BridgeError::Transport(format!("TCP read length failed: {}", e)))?;
        let len = u32::from_le_bytes(len_bytes) as usize;

        if len > MAX_FRAME_LEN {
            return Err(BridgeError::Transport(format!(
                "Message too large: {} bytes",
                len
            )));
        }

        // Read message body
        let mut data = vec![0u8; len];
        self.0
            .read_exact(&mut data)
            .await
            .map_err(|e| BridgeError::Transport(format!("TCP read data failed: {}", e)))?;

        Ok(data)
    }
}

/// TCP write wrapper
pub struct TcpWriteWrapper(pub OwnedWriteHalf);

#[async_trait]
impl AsyncWriter for TcpWriteWrapper {
    async fn write_message(&mut self, data: &[u8]) -> Result<()> {
        let len = (data.len() as u32).to_le_bytes();
        self.0
            .write_all(&len)
            .await
            .map_err(|e| BridgeError::Transport(format!("TCP write length failed: {}", e)))?;

        self.0
            .write_all(data)
            .await
            .map_err(|e| BridgeError::Transport(format!("TCP write data failed: {}", e)))?;

        self.0
            .flush()
            .await
            .map_err(|e| BridgeError::Transport(format!("TCP flush failed: {}", e)))?;

        Ok(())
    }
}

/// Link `channel` to a peer over an established TCP stream
pub fn link_tcp(
    channel: &LocalChannel,
    peer_origin: &str,
    stream: TcpStream,
) -> Result<StreamLink> {
    // Disable Nagle's algorithm for low latency
    stream
        .set_nodelay(true)
        .map_err(|e| BridgeError::Transport(format!("Failed to set TCP_NODELAY: {}", e)))?;
    let (read_half, write_half) = stream.into_split();
    Ok(link_stream(
        channel,
        peer_origin,
        TcpReadWrapper(read_half),
        TcpWriteWrapper(write_half),
    ))
}

/// Connect to a peer at `addr` and link it to `channel`
pub async fn connect(channel: &LocalChannel, peer_origin: &str, addr: &str) -> Result<StreamLink> {
    info!("Connecting to peer {} at {}", peer_origin, addr);
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| BridgeError::Transport(format!("Failed to connect to {}: {}", addr, e)))?;
    link_tcp(channel, peer_origin, stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{Channel, MessageBroker};
    use crate::channel::TARGET_ANY;
    use crate::protocol::{Action, Message, Module, SideTag};
    use serde_json::{Map, json};
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_request_across_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        // Host process: accepts one connection and answers every request
        let host_channel = LocalChannel::new("host");
        let host = MessageBroker::new(host_channel.clone(), SideTag::qa_tool());
        let sender = host.sender();
        host.add_listener(Channel::Message, move |msg| {
            if msg.id.is_some() {
                let reply = Message::response_to(msg).with_field("ok", true);
                let _ = sender.send(reply, TARGET_ANY);
            }
        });
        let accept_channel = host_channel.clone();
        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            link_tcp(&accept_channel, "game", stream).unwrap()
        });

        // Game process
        let game_channel = LocalChannel::new("game");
        let game = MessageBroker::new(game_channel.clone(), SideTag::bridge());
        let _game_link = connect(&game_channel, "host", &addr).await.unwrap();
        let _host_link = accept.await.unwrap();

        let response = tokio::time::timeout(
            Duration::from_secs(5),
            game.request(Module::Platform, Action::Initialize, Map::new()),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(response.field("ok"), Some(&json!(true)));
        assert!(response.is_from(&SideTag::qa_tool()));
    }
}
