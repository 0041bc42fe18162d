//! Embedding context handed to a bridge instance
//!
//! Holds everything a platform adapter may need from the host: the message
//! channel and the SDK handles. Scoped to one `PlatformBridge`.

use crate::adapters::absolute_games::AbsoluteGamesSdk;
use crate::adapters::playgama::PlaygamaSdk;
use crate::resolver::RemoteConfigSource;
use platform_bridge_broker::LocalChannel;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct PlatformContext {
    /// Channel shared with the host side, used by message-protocol adapters
    pub channel: Option<LocalChannel>,
    pub playgama: Option<Arc<dyn PlaygamaSdk>>,
    pub absolute_games: Option<Arc<dyn AbsoluteGamesSdk>>,
    /// Overrides the HTTP source built from `resolutionEndpoint`
    pub remote_config: Option<Arc<dyn RemoteConfigSource>>,
}

impl PlatformContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: LocalChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_playgama(mut self, sdk: Arc<dyn PlaygamaSdk>) -> Self {
        self.playgama = Some(sdk);
        self
    }

    pub fn with_absolute_games(mut self, sdk: Arc<dyn AbsoluteGamesSdk>) -> Self {
        self.absolute_games = Some(sdk);
        self
    }

    pub fn with_remote_config(mut self, source: Arc<dyn RemoteConfigSource>) -> Self {
        self.remote_config = Some(source);
        self
    }
}
