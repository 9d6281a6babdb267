//! In-memory runtime
//!
//! A deterministic stand-in for the external player runtime, for headless
//! hosts, demos and tests. Every player call is recorded and the last-known
//! player state is kept so callers can assert on it.
//!
//! - [`SimScriptHost`] counts script insertions and can be told to fail
//! - [`SimRuntime`] can hold constructions until released, or reject them
//! - [`SimPlayer`] records calls, re-emits events on request, and can park
//!   callers inside a call

use crate::bridge::EventSink;
use crate::runtime::{
    NativeEvent, Player, PlayerHandle, PlayerOptions, Runtime, RuntimeHandle, ScriptHost,
    VideoRequest,
};
use crate::types::{Container, Dimension, PlayerState, Size, VideoId};
use crate::{lock, Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use tokio::sync::Semaphore;
use tracing::debug;
use url::Url;

/// Host document with an optional pre-installed runtime
pub struct SimScriptHost {
    runtime: Arc<SimRuntime>,
    installed: AtomicBool,
    failure: Option<String>,
    insertions: AtomicUsize,
    ready_waits: AtomicUsize,
    scripts: Mutex<Vec<Url>>,
}

impl SimScriptHost {
    /// Empty document; the runtime arrives with the script
    pub fn new(runtime: impl Into<Arc<SimRuntime>>) -> Self {
        Self::build(runtime.into(), false, None)
    }

    /// Document where the runtime is already installed
    pub fn preinstalled(runtime: impl Into<Arc<SimRuntime>>) -> Self {
        Self::build(runtime.into(), true, None)
    }

    /// Document where the script is blocked
    pub fn failing(runtime: impl Into<Arc<SimRuntime>>) -> Self {
        Self::build(
            runtime.into(),
            false,
            Some("script blocked by client".to_string()),
        )
    }

    fn build(runtime: Arc<SimRuntime>, installed: bool, failure: Option<String>) -> Self {
        Self {
            runtime,
            installed: AtomicBool::new(installed),
            failure,
            insertions: AtomicUsize::new(0),
            ready_waits: AtomicUsize::new(0),
            scripts: Mutex::new(Vec::new()),
        }
    }

    /// Number of script nodes inserted so far
    pub fn script_insertions(&self) -> usize {
        self.insertions.load(Ordering::SeqCst)
    }

    /// Number of ready registrations
    pub fn ready_waits(&self) -> usize {
        self.ready_waits.load(Ordering::SeqCst)
    }

    /// Sources of the inserted scripts
    pub fn scripts(&self) -> Vec<Url> {
        lock(&self.scripts).clone()
    }
}

#[async_trait]
impl ScriptHost for SimScriptHost {
    fn runtime_present(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    async fn load_script(&self, src: &Url) -> Result<()> {
        self.insertions.fetch_add(1, Ordering::SeqCst);
        lock(&self.scripts).push(src.clone());

        // Network round trip
        tokio::task::yield_now().await;

        match &self.failure {
            Some(reason) => Err(Error::SdkLoad(reason.clone())),
            None => {
                self.installed.store(true, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    async fn when_ready(&self) -> Result<RuntimeHandle> {
        self.ready_waits.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if !self.runtime_present() {
            return Err(Error::SdkLoad("runtime is not installed".to_string()));
        }
        let runtime: RuntimeHandle = self.runtime.clone();
        Ok(runtime)
    }
}

/// Player runtime that builds [`SimPlayer`]s
pub struct SimRuntime {
    players: Mutex<Vec<Arc<SimPlayer>>>,
    attempts: AtomicUsize,
    hold: Mutex<Option<Arc<Semaphore>>>,
    fail_next: Mutex<Option<String>>,
    emit_ready: bool,
}

impl SimRuntime {
    pub fn new() -> Self {
        Self {
            players: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            hold: Mutex::new(None),
            fail_next: Mutex::new(None),
            emit_ready: true,
        }
    }

    /// Do not emit `Ready` after construction
    pub fn without_ready(mut self) -> Self {
        self.emit_ready = false;
        self
    }

    /// Park every later construction until [`release_construction`] is called
    ///
    /// [`release_construction`]: SimRuntime::release_construction
    pub fn hold_constructions(&self) {
        *lock(&self.hold) = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let one parked construction finish
    pub fn release_construction(&self) {
        if let Some(hold) = lock(&self.hold).as_ref() {
            hold.add_permits(1);
        }
    }

    /// Reject the next construction with `reason`
    pub fn fail_next_construction(&self, reason: impl Into<String>) {
        *lock(&self.fail_next) = Some(reason.into());
    }

    /// Number of construction attempts, including failed ones
    pub fn construction_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Every player constructed so far, oldest first
    pub fn players(&self) -> Vec<Arc<SimPlayer>> {
        lock(&self.players).clone()
    }

    pub fn last_player(&self) -> Option<Arc<SimPlayer>> {
        lock(&self.players).last().cloned()
    }
}

impl Default for SimRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runtime for SimRuntime {
    async fn construct(
        &self,
        container: &Container,
        options: PlayerOptions,
        events: EventSink,
    ) -> Result<PlayerHandle> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let hold = lock(&self.hold).clone();
        if let Some(hold) = hold {
            hold.acquire()
                .await
                .map_err(|e| Error::Internal(e.to_string()))?
                .forget();
        }

        if let Some(reason) = lock(&self.fail_next).take() {
            return Err(Error::Construction(reason));
        }
        if !container.is_valid() {
            return Err(Error::InvalidContainer(container.to_string()));
        }
        if let Some(video_id) = options.video_id.as_ref().filter(|id| !id.is_well_formed()) {
            return Err(Error::Construction(format!("invalid video id `{video_id}`")));
        }

        let player = Arc::new_cyclic(|me| {
            SimPlayer::attached(me.clone(), container.clone(), options, events)
        });
        lock(&self.players).push(player.clone());
        debug!(container = %container, "Simulated player constructed");

        if self.emit_ready {
            player.emit(NativeEvent::Ready);
        }
        let handle: PlayerHandle = player;
        Ok(handle)
    }
}

/// Call recorded by a [`SimPlayer`]
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    Load(VideoRequest),
    Cue(VideoRequest),
    Play,
    Pause,
    SetSize(Size),
    SetVolume(u8),
    Mute,
    UnMute,
    SetPlaybackRate(f64),
    Destroy,
}

impl SimCall {
    pub fn is_load(&self) -> bool {
        matches!(self, SimCall::Load(_) | SimCall::Cue(_))
    }
}

/// Last-known state of a [`SimPlayer`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimSnapshot {
    pub video_id: Option<VideoId>,
    pub size: Option<Size>,
    pub volume: Option<u8>,
    pub muted: Option<bool>,
    pub playback_rate: Option<f64>,
    pub state: Option<PlayerState>,
    pub destroyed: bool,
}

#[derive(Debug, Default)]
struct SimState {
    calls: Vec<SimCall>,
    snapshot: SimSnapshot,
}

/// Blocks player calls while held
#[derive(Default)]
struct CallHold {
    held: Mutex<bool>,
    released: Condvar,
    waiting: AtomicUsize,
}

impl CallHold {
    fn wait(&self) {
        let mut held = lock(&self.held);
        if !*held {
            return;
        }
        self.waiting.fetch_add(1, Ordering::SeqCst);
        while *held {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Recording player
pub struct SimPlayer {
    me: Weak<SimPlayer>,
    container: Option<Container>,
    options: Option<PlayerOptions>,
    events: Option<EventSink>,
    state: Mutex<SimState>,
    hold: CallHold,
}

impl SimPlayer {
    /// Player with no container and no event sink
    pub fn detached() -> Self {
        Self {
            me: Weak::new(),
            container: None,
            options: None,
            events: None,
            state: Mutex::new(SimState::default()),
            hold: CallHold::default(),
        }
    }

    fn attached(
        me: Weak<SimPlayer>,
        container: Container,
        options: PlayerOptions,
        events: EventSink,
    ) -> Self {
        let snapshot = SimSnapshot {
            video_id: options.video_id.clone(),
            size: Some(Size {
                width: options.width.clone(),
                height: options.height.clone(),
            }),
            state: Some(PlayerState::Unstarted),
            ..Default::default()
        };

        Self {
            me,
            container: Some(container),
            options: Some(options),
            events: Some(events),
            state: Mutex::new(SimState {
                calls: Vec::new(),
                snapshot,
            }),
            hold: CallHold::default(),
        }
    }

    pub fn container(&self) -> Option<&Container> {
        self.container.as_ref()
    }

    /// Construction payload this player was built from
    pub fn options(&self) -> Option<&PlayerOptions> {
        self.options.as_ref()
    }

    pub fn calls(&self) -> Vec<SimCall> {
        lock(&self.state).calls.clone()
    }

    pub fn snapshot(&self) -> SimSnapshot {
        lock(&self.state).snapshot.clone()
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.state).snapshot.destroyed
    }

    pub fn destroy_count(&self) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|call| **call == SimCall::Destroy)
            .count()
    }

    /// Raise a native event as the runtime would, returning the number of
    /// callbacks invoked
    pub fn emit(&self, event: NativeEvent) -> usize {
        let (Some(events), Some(me)) = (&self.events, self.me.upgrade()) else {
            return 0;
        };
        if let NativeEvent::StateChange(state) = &event {
            lock(&self.state).snapshot.state = Some(*state);
        }
        let target: PlayerHandle = me;
        events.emit(&target, event)
    }

    pub fn emit_state(&self, state: PlayerState) -> usize {
        self.emit(NativeEvent::StateChange(state))
    }

    /// Park every later call until [`release_calls`] is called.
    ///
    /// Parked callers block their thread.
    ///
    /// [`release_calls`]: SimPlayer::release_calls
    pub fn hold_calls(&self) {
        *lock(&self.hold.held) = true;
    }

    pub fn release_calls(&self) {
        *lock(&self.hold.held) = false;
        self.hold.released.notify_all();
    }

    /// Number of callers currently parked
    pub fn parked_calls(&self) -> usize {
        self.hold.waiting.load(Ordering::SeqCst)
    }

    fn record(&self, call: SimCall, update: impl FnOnce(&mut SimSnapshot)) -> Result<()> {
        self.hold.wait();
        let mut state = lock(&self.state);
        if state.snapshot.destroyed {
            return Err(Error::PlayerDestroyed);
        }
        update(&mut state.snapshot);
        state.calls.push(call);
        Ok(())
    }
}

impl Player for SimPlayer {
    fn load_video_by_id(&self, request: &VideoRequest) -> Result<()> {
        self.record(SimCall::Load(request.clone()), |s| {
            s.video_id = Some(request.video_id.clone());
        })
    }

    fn cue_video_by_id(&self, request: &VideoRequest) -> Result<()> {
        self.record(SimCall::Cue(request.clone()), |s| {
            s.video_id = Some(request.video_id.clone());
        })
    }

    fn play_video(&self) -> Result<()> {
        self.record(SimCall::Play, |_| {})
    }

    fn pause_video(&self) -> Result<()> {
        self.record(SimCall::Pause, |_| {})
    }

    fn set_size(&self, width: &Dimension, height: &Dimension) -> Result<()> {
        let size = Size {
            width: width.clone(),
            height: height.clone(),
        };
        self.record(SimCall::SetSize(size.clone()), |s| s.size = Some(size))
    }

    fn set_volume(&self, volume: u8) -> Result<()> {
        self.record(SimCall::SetVolume(volume), |s| s.volume = Some(volume))
    }

    fn mute(&self) -> Result<()> {
        self.record(SimCall::Mute, |s| s.muted = Some(true))
    }

    fn un_mute(&self) -> Result<()> {
        self.record(SimCall::UnMute, |s| s.muted = Some(false))
    }

    fn set_playback_rate(&self, rate: f64) -> Result<()> {
        self.record(SimCall::SetPlaybackRate(rate), |s| s.playback_rate = Some(rate))
    }

    fn destroy(&self) {
        let mut state = lock(&self.state);
        state.snapshot.destroyed = true;
        state.calls.push(SimCall::Destroy);
    }
}
