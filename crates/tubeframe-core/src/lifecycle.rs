//! Lifecycle Manager - owns one player across mounts and container swaps
//!
//! ```text
//!  Unattached ──mount/update──▶ Constructing ──factory ok──▶ Attached
//!      ▲                            │                           │
//!      └──────── factory error ─────┘                           │
//!      └──────────────── unmount / container swap ──────────────┘
//! ```
//!
//! Descriptions supplied while a construction is pending are queued; the
//! latest one is reconciled against the initial description as soon as the
//! player exists. An unmount during construction is honored once the
//! construction settles: the new player is destroyed right away.
//!
//! A construction whose future is dropped before it settles leaves the
//! lifecycle unattached, so the next update constructs again.
//!
//! Diffing and issuing commands is serialized: descriptions reach the player
//! in the order they were applied. No lock is held across an await.

use crate::bridge::{EventBridge, EventSink};
use crate::description::Description;
use crate::factory::PlayerFactory;
use crate::reconcile;
use crate::runtime::PlayerHandle;
use crate::types::{Container, InstanceId};
use crate::{lock, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unattached,
    Constructing,
    Attached,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Unattached => write!(f, "unattached"),
            LifecycleState::Constructing => write!(f, "constructing"),
            LifecycleState::Attached => write!(f, "attached"),
        }
    }
}

enum Phase {
    Unattached,
    Constructing,
    Attached(PlayerHandle),
}

impl Phase {
    fn state(&self) -> LifecycleState {
        match self {
            Phase::Unattached => LifecycleState::Unattached,
            Phase::Constructing => LifecycleState::Constructing,
            Phase::Attached(_) => LifecycleState::Attached,
        }
    }
}

struct Inner {
    phase: Phase,
    container: Option<Container>,
    mounted: bool,
    /// Latest description supplied by the host
    desired: Arc<Description>,
    /// Description the live player currently reflects
    applied: Arc<Description>,
    /// Bumped whenever a pending construction must be discarded
    generation: u64,
}

struct Shared {
    id: InstanceId,
    factory: PlayerFactory,
    bridge: Arc<EventBridge>,
    /// Held from diff to the last issued command; taken before `inner`
    apply: Mutex<()>,
    inner: Mutex<Inner>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.bridge.retire();
        let inner = self
            .inner
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Phase::Attached(player) = std::mem::replace(&mut inner.phase, Phase::Unattached) {
            debug!(instance = %self.id, "Destroying player on drop");
            player.destroy();
        }
    }
}

/// What [`PlayerLifecycle::sync`] decided under the lock
enum Step {
    Idle,
    Reconcile {
        player: PlayerHandle,
        previous: Arc<Description>,
        next: Arc<Description>,
    },
    Attach(Attach),
}

struct Attach {
    generation: u64,
    container: Container,
    initial: Arc<Description>,
    events: EventSink,
}

/// Resets an abandoned construction back to unattached
struct PendingConstruction<'a> {
    shared: &'a Shared,
    generation: u64,
    armed: bool,
}

impl PendingConstruction<'_> {
    fn settle(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingConstruction<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = lock(&self.shared.inner);
        if inner.generation == self.generation && matches!(inner.phase, Phase::Constructing) {
            warn!(instance = %self.shared.id, "Construction abandoned before it settled");
            inner.phase = Phase::Unattached;
        }
    }
}

/// Declarative handle to one player
///
/// Cloning is cheap and every clone drives the same player. The player is
/// destroyed when the last clone is dropped.
#[derive(Clone)]
pub struct PlayerLifecycle {
    shared: Arc<Shared>,
}

impl PlayerLifecycle {
    pub fn new(factory: PlayerFactory) -> Self {
        let initial = Arc::new(Description::default());
        Self {
            shared: Arc::new(Shared {
                id: InstanceId::new(),
                factory,
                bridge: Arc::new(EventBridge::default()),
                apply: Mutex::new(()),
                inner: Mutex::new(Inner {
                    phase: Phase::Unattached,
                    container: None,
                    mounted: false,
                    desired: initial.clone(),
                    applied: initial,
                    generation: 0,
                }),
            }),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.shared.id
    }

    pub fn state(&self) -> LifecycleState {
        self.lock().phase.state()
    }

    pub fn is_mounted(&self) -> bool {
        self.lock().mounted
    }

    /// Live player, if attached
    pub fn player(&self) -> Option<PlayerHandle> {
        match &self.lock().phase {
            Phase::Attached(player) => Some(player.clone()),
            _ => None,
        }
    }

    pub fn container(&self) -> Option<Container> {
        self.lock().container.clone()
    }

    /// Latest description supplied by the host
    pub fn description(&self) -> Arc<Description> {
        self.lock().desired.clone()
    }

    /// Mount into `container` with `description`.
    ///
    /// Resolves once the player is attached. Errors from the loader or the
    /// runtime are returned here and leave the lifecycle unattached.
    #[instrument(skip_all, fields(instance = %self.shared.id, container = %container))]
    pub async fn mount(&self, container: Container, description: Description) -> Result<()> {
        let retired = {
            let mut inner = self.lock();
            inner.mounted = true;
            inner.desired = Arc::new(description);
            if inner.container.as_ref() != Some(&container) {
                inner.container = Some(container);
                self.retire(&mut inner)
            } else {
                None
            }
        };
        destroy(retired);
        self.sync().await
    }

    /// Supply the next description.
    ///
    /// Attached: reconciled immediately. Constructing: queued until the
    /// player exists. Unattached but mounted: a fresh attach is attempted.
    #[instrument(skip_all, fields(instance = %self.shared.id))]
    pub async fn update(&self, description: Description) -> Result<()> {
        self.lock().desired = Arc::new(description);
        self.sync().await
    }

    /// Rebind to a different element, recreating the player there
    #[instrument(skip_all, fields(instance = %self.shared.id, container = %container))]
    pub async fn set_container(&self, container: Container) -> Result<()> {
        let retired = {
            let mut inner = self.lock();
            if inner.container.as_ref() == Some(&container) {
                return Ok(());
            }
            info!(from = ?inner.container.as_ref().map(Container::id), "Container replaced");
            inner.container = Some(container);
            self.retire(&mut inner)
        };
        destroy(retired);
        self.sync().await
    }

    /// Tear the player down.
    ///
    /// A construction still in flight is destroyed as soon as it completes.
    pub fn unmount(&self) {
        let retired = {
            let mut inner = self.lock();
            inner.mounted = false;
            inner.container = None;
            self.retire(&mut inner)
        };
        info!(instance = %self.shared.id, "Unmounted");
        destroy(retired);
    }

    /// Bring the player in line with the desired description
    async fn sync(&self) -> Result<()> {
        let attach = {
            let _apply = lock(&self.shared.apply);
            match self.next_step() {
                Step::Idle => None,
                Step::Reconcile {
                    player,
                    previous,
                    next,
                } => {
                    reconcile::reconcile(player.as_ref(), &previous, &next);
                    None
                }
                Step::Attach(attach) => Some(attach),
            }
        };

        match attach {
            Some(attach) => self.attach(attach).await,
            None => Ok(()),
        }
    }

    /// Decide the next step under the state lock
    fn next_step(&self) -> Step {
        let mut inner = self.lock();
        let desired = inner.desired.clone();
        self.shared.bridge.replace_handlers(desired.handlers.clone());

        let attached = match &inner.phase {
            Phase::Attached(player) => Some(player.clone()),
            Phase::Constructing | Phase::Unattached => None,
        };
        let constructing = matches!(inner.phase, Phase::Constructing);
        let target = inner.container.clone().filter(|_| inner.mounted);

        if let Some(player) = attached {
            let previous = std::mem::replace(&mut inner.applied, desired.clone());
            Step::Reconcile {
                player,
                previous,
                next: desired,
            }
        } else if constructing {
            debug!("Construction pending, description queued");
            Step::Idle
        } else if let Some(container) = target {
            inner.generation += 1;
            inner.phase = Phase::Constructing;
            Step::Attach(Attach {
                generation: inner.generation,
                container,
                initial: desired,
                events: self.shared.bridge.sink(),
            })
        } else {
            Step::Idle
        }
    }

    async fn attach(&self, attach: Attach) -> Result<()> {
        let Attach {
            generation,
            container,
            initial,
            events,
        } = attach;

        info!(container = %container, "Attaching player");
        let pending = PendingConstruction {
            shared: &self.shared,
            generation,
            armed: true,
        };
        let result = self
            .shared
            .factory
            .create(&container, &initial, events)
            .await;
        pending.settle();

        let _apply = lock(&self.shared.apply);
        let (player, desired) = {
            let mut inner = self.lock();
            let current = inner.generation == generation;

            match result {
                Ok(player) if current => {
                    inner.phase = Phase::Attached(player.clone());
                    inner.applied = inner.desired.clone();
                    info!("Player attached");
                    (player, inner.desired.clone())
                }
                Ok(player) => {
                    drop(inner);
                    debug!("Construction finished after unmount or swap, destroying");
                    player.destroy();
                    return Ok(());
                }
                Err(e) if current => {
                    inner.phase = Phase::Unattached;
                    warn!(error = %e, code = e.error_code(), "Player construction failed");
                    return Err(e);
                }
                Err(e) => {
                    debug!(error = %e, "Construction failed after unmount or swap");
                    return Ok(());
                }
            }
        };

        // Descriptions queued during construction
        if !Arc::ptr_eq(&desired, &initial) {
            reconcile::reconcile(player.as_ref(), &initial, &desired);
        }
        Ok(())
    }

    /// Detach from the current player, returning it for destruction
    fn retire(&self, inner: &mut Inner) -> Option<PlayerHandle> {
        self.shared.bridge.retire();
        inner.generation += 1;
        match std::mem::replace(&mut inner.phase, Phase::Unattached) {
            Phase::Attached(player) => Some(player),
            Phase::Constructing | Phase::Unattached => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.shared.inner)
    }
}

impl std::fmt::Debug for PlayerLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerLifecycle")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn destroy(player: Option<PlayerHandle>) {
    if let Some(player) = player {
        debug!("Destroying player");
        player.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SdkConfig;
    use crate::loader::SdkLoader;
    use crate::sim::{SimCall, SimRuntime, SimScriptHost};
    use crate::Error;

    fn lifecycle() -> (PlayerLifecycle, Arc<SimRuntime>) {
        let runtime = Arc::new(SimRuntime::new());
        let host = Arc::new(SimScriptHost::new(runtime.clone()));
        let loader = Arc::new(SdkLoader::new(host, SdkConfig::default()));
        (PlayerLifecycle::new(PlayerFactory::new(loader)), runtime)
    }

    #[tokio::test]
    async fn test_mount_attaches() {
        let (lifecycle, runtime) = lifecycle();
        assert_eq!(lifecycle.state(), LifecycleState::Unattached);

        lifecycle
            .mount(Container::new("player"), Description::new().video("abc12345678"))
            .await
            .unwrap();

        assert_eq!(lifecycle.state(), LifecycleState::Attached);
        assert!(lifecycle.player().is_some());
        assert_eq!(runtime.players().len(), 1);
    }

    #[tokio::test]
    async fn test_update_reconciles_against_previous() {
        let (lifecycle, runtime) = lifecycle();
        lifecycle
            .mount(Container::new("player"), Description::new().video("abc12345678").paused(false))
            .await
            .unwrap();

        lifecycle
            .update(Description::new().video("abc12345678").paused(true))
            .await
            .unwrap();
        lifecycle
            .update(Description::new().video("abc12345678").paused(true))
            .await
            .unwrap();

        let player = runtime.last_player().unwrap();
        assert_eq!(player.calls(), vec![SimCall::Pause]);
    }

    #[tokio::test]
    async fn test_failed_construction_leaves_unattached() {
        let (lifecycle, runtime) = lifecycle();
        runtime.fail_next_construction("rejected");

        let err = lifecycle
            .mount(Container::new("player"), Description::new())
            .await
            .unwrap_err();
        assert_eq!(err, Error::Construction("rejected".into()));
        assert_eq!(lifecycle.state(), LifecycleState::Unattached);
        assert_eq!(runtime.construction_attempts(), 1);

        // Next update tries again from scratch
        lifecycle.update(Description::new()).await.unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Attached);
        assert_eq!(runtime.construction_attempts(), 2);
    }

    #[tokio::test]
    async fn test_unmount_destroys() {
        let (lifecycle, runtime) = lifecycle();
        lifecycle
            .mount(Container::new("player"), Description::new())
            .await
            .unwrap();

        lifecycle.unmount();

        assert_eq!(lifecycle.state(), LifecycleState::Unattached);
        assert!(lifecycle.player().is_none());
        assert_eq!(runtime.last_player().unwrap().destroy_count(), 1);

        // Updates while unmounted are stored, not applied
        lifecycle.update(Description::new().volume(0.1)).await.unwrap();
        assert_eq!(runtime.construction_attempts(), 1);
    }

    #[tokio::test]
    async fn test_drop_destroys() {
        let (lifecycle, runtime) = lifecycle();
        lifecycle
            .mount(Container::new("player"), Description::new())
            .await
            .unwrap();
        let clone = lifecycle.clone();

        drop(lifecycle);
        assert!(!runtime.last_player().unwrap().is_destroyed());
        drop(clone);
        assert_eq!(runtime.last_player().unwrap().destroy_count(), 1);
    }

    #[tokio::test]
    async fn test_same_container_is_not_a_swap() {
        let (lifecycle, runtime) = lifecycle();
        lifecycle
            .mount(Container::new("player"), Description::new())
            .await
            .unwrap();

        lifecycle.set_container(Container::new("player")).await.unwrap();
        assert_eq!(runtime.construction_attempts(), 1);
        assert!(!runtime.last_player().unwrap().is_destroyed());
    }
}
