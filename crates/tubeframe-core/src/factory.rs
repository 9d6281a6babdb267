//! Player Factory - one player per container
//!
//! Waits for the runtime, turns the initial description into the one-shot
//! construction payload, and builds the player. Live values the constructor
//! cannot carry (volume, mute, rate) are applied before the handle is handed
//! out; if that step fails the new player is destroyed again.

use crate::bridge::EventSink;
use crate::description::Description;
use crate::loader::SdkLoader;
use crate::reconcile::{self, Command};
use crate::runtime::{Player, PlayerHandle, PlayerOptions};
use crate::types::Container;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Builds players through a shared [`SdkLoader`]
#[derive(Debug, Clone)]
pub struct PlayerFactory {
    loader: Arc<SdkLoader>,
}

impl PlayerFactory {
    pub fn new(loader: Arc<SdkLoader>) -> Self {
        Self { loader }
    }

    pub fn loader(&self) -> &Arc<SdkLoader> {
        &self.loader
    }

    /// Construct a player bound to `container`.
    ///
    /// `events` must be live before this is called: the runtime may report
    /// events as soon as construction starts.
    #[instrument(skip(self, initial, events), fields(container = %container))]
    pub async fn create(
        &self,
        container: &Container,
        initial: &Description,
        events: EventSink,
    ) -> Result<PlayerHandle> {
        if !container.is_valid() {
            return Err(Error::InvalidContainer(container.to_string()));
        }

        let runtime = self.loader.acquire().await?;
        let options = PlayerOptions::from_description(initial);

        info!(
            video = initial.video_id.as_ref().map(|id| id.as_str()).unwrap_or("<none>"),
            size = %initial.live.size,
            player_vars = %options.player_vars.to_json(),
            "Constructing player"
        );

        let player = runtime.construct(container, options, events).await?;
        let guard = DestroyOnDrop::new(player);

        for command in reconcile::initial_commands(initial) {
            command
                .apply(guard.player())
                .map_err(|e| initial_command_error(&command, e))?;
        }

        Ok(guard.disarm())
    }
}

fn initial_command_error(command: &Command, e: Error) -> Error {
    match e {
        Error::PlayerDestroyed => Error::Construction(format!(
            "player destroyed before `{}` could be applied",
            command.name()
        )),
        other => other,
    }
}

/// Destroys a freshly constructed player unless disarmed
struct DestroyOnDrop {
    player: PlayerHandle,
    armed: bool,
}

impl DestroyOnDrop {
    fn new(player: PlayerHandle) -> Self {
        Self {
            player,
            armed: true,
        }
    }

    fn player(&self) -> &dyn Player {
        self.player.as_ref()
    }

    fn disarm(mut self) -> PlayerHandle {
        self.armed = false;
        self.player.clone()
    }
}

impl Drop for DestroyOnDrop {
    fn drop(&mut self) {
        if self.armed {
            warn!("Destroying partially set up player");
            self.player.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::EventBridge;
    use crate::config::SdkConfig;
    use crate::sim::{SimCall, SimRuntime, SimScriptHost};

    fn factory(host: SimScriptHost) -> PlayerFactory {
        PlayerFactory::new(Arc::new(SdkLoader::new(Arc::new(host), SdkConfig::default())))
    }

    #[tokio::test]
    async fn test_create_applies_payload_and_initial_values() {
        let runtime = Arc::new(SimRuntime::new());
        let factory = factory(SimScriptHost::new(runtime.clone()));
        let bridge = Arc::new(EventBridge::default());
        let desc = Description::new()
            .video("abc12345678")
            .start_seconds(15.0)
            .volume(0.5)
            .muted(true);

        factory
            .create(&Container::new("player"), &desc, bridge.sink())
            .await
            .unwrap();

        let player = runtime.last_player().unwrap();
        let options = player.options().unwrap();
        assert_eq!(options.video_id.as_ref().map(|id| id.as_str()), Some("abc12345678"));
        assert_eq!(options.player_vars.start, Some(15.0));
        assert_eq!(player.calls(), vec![SimCall::SetVolume(50), SimCall::Mute]);
    }

    #[tokio::test]
    async fn test_invalid_container_skips_loader() {
        let factory = factory(SimScriptHost::new(SimRuntime::new()));
        let bridge = Arc::new(EventBridge::default());

        let err = factory
            .create(&Container::new(""), &Description::new(), bridge.sink())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::InvalidContainer(_)));
        assert!(!factory.loader().is_settled());
    }

    #[tokio::test]
    async fn test_construction_failure_propagates() {
        let runtime = Arc::new(SimRuntime::new());
        runtime.fail_next_construction("bad parameters");
        let factory = factory(SimScriptHost::new(runtime.clone()));
        let bridge = Arc::new(EventBridge::default());

        let err = factory
            .create(&Container::new("player"), &Description::new(), bridge.sink())
            .await
            .err()
            .unwrap();

        assert_eq!(err, Error::Construction("bad parameters".into()));
        assert!(runtime.players().is_empty());
    }

    #[test]
    fn test_guard_destroys_unless_disarmed() {
        let player = Arc::new(crate::sim::SimPlayer::detached());
        drop(DestroyOnDrop::new(player.clone()));
        assert_eq!(player.destroy_count(), 1);

        let kept = DestroyOnDrop::new(player.clone()).disarm();
        drop(kept);
        assert_eq!(player.destroy_count(), 1);
    }
}
