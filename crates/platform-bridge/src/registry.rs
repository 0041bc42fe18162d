//! Platform id to adapter constructor mapping
//!
//! Adding a platform means one `PlatformId` variant and one arm here.

use crate::adapter::PlatformAdapter;
use crate::adapters::absolute_games::AbsoluteGamesAdapter;
use crate::adapters::mock::MockAdapter;
use crate::adapters::playgama::PlaygamaAdapter;
use crate::adapters::qa_tool::QaToolAdapter;
use crate::config::BridgeOptions;
use crate::context::PlatformContext;
use platform_bridge_core::{BridgeError, PlatformId, Result};
use std::sync::Arc;

/// Construct the adapter for `id` from the handles in `context`.
///
/// Fails with `SdkUnavailable` when the context lacks what the platform needs.
pub fn build_adapter(
    id: PlatformId,
    context: &PlatformContext,
    options: &BridgeOptions,
) -> Result<Arc<dyn PlatformAdapter>> {
    match id {
        PlatformId::Mock => Ok(Arc::new(MockAdapter::new())),
        PlatformId::QaTool => {
            let channel = context
                .channel
                .clone()
                .ok_or(BridgeError::SdkUnavailable(id))?;
            Ok(Arc::new(QaToolAdapter::new(channel, options.request_timeout())))
        }
        PlatformId::Playgama => {
            let sdk = context
                .playgama
                .clone()
                .ok_or(BridgeError::SdkUnavailable(id))?;
            Ok(Arc::new(PlaygamaAdapter::new(sdk)))
        }
        PlatformId::AbsoluteGames => {
            let sdk = context
                .absolute_games
                .clone()
                .ok_or(BridgeError::SdkUnavailable(id))?;
            Ok(Arc::new(AbsoluteGamesAdapter::new(sdk)))
        }
    }
}
