//! Player descriptions
//!
//! A [`Description`] is the complete desired state of one player for one
//! update. Fields are grouped by when the runtime honors them:
//!
//! - [`LiveOptions`] can be changed on a live player
//! - [`ConstructionOptions`] are only read at construction or reload time
//! - [`Handlers`] hold the caller's event callbacks
//!
//! Descriptions compare by value, except callbacks which compare by identity.

use crate::runtime::PlayerHandle;
use crate::types::{Dimension, PlaybackQuality, PlayerErrorCode, PlayerState, Size, VideoId};
use std::sync::Arc;

/// Fields that may be updated on a live player
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveOptions {
    pub size: Size,
    /// `None` leaves play state to the viewer
    pub paused: Option<bool>,
    /// Volume between 0 and 1
    pub volume: Option<f64>,
    pub muted: Option<bool>,
    pub playback_rate: Option<f64>,
}

/// Player parameters fixed at construction time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerParams {
    pub show_captions: bool,
    pub controls: bool,
    pub disable_keyboard: bool,
    pub allow_fullscreen: bool,
    /// ISO 639-1 code or full locale for the player interface
    pub lang: Option<String>,
    pub annotations: bool,
    pub modest_branding: bool,
    pub plays_inline: bool,
    pub show_related_videos: bool,
}

impl Default for PlayerParams {
    fn default() -> Self {
        Self {
            show_captions: false,
            controls: true,
            disable_keyboard: false,
            allow_fullscreen: true,
            lang: None,
            annotations: true,
            modest_branding: false,
            plays_inline: false,
            show_related_videos: true,
        }
    }
}

impl PlayerParams {
    /// Names of the parameters that differ between `self` and `other`
    pub fn changed_fields(&self, other: &PlayerParams) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.show_captions != other.show_captions {
            changed.push("show_captions");
        }
        if self.controls != other.controls {
            changed.push("controls");
        }
        if self.disable_keyboard != other.disable_keyboard {
            changed.push("disable_keyboard");
        }
        if self.allow_fullscreen != other.allow_fullscreen {
            changed.push("allow_fullscreen");
        }
        if self.lang != other.lang {
            changed.push("lang");
        }
        if self.annotations != other.annotations {
            changed.push("annotations");
        }
        if self.modest_branding != other.modest_branding {
            changed.push("modest_branding");
        }
        if self.plays_inline != other.plays_inline {
            changed.push("plays_inline");
        }
        if self.show_related_videos != other.show_related_videos {
            changed.push("show_related_videos");
        }
        changed
    }
}

/// Fields honored only when a video is constructed or (re)loaded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstructionOptions {
    pub start_seconds: Option<f64>,
    pub end_seconds: Option<f64>,
    pub autoplay: bool,
    pub params: PlayerParams,
}

impl ConstructionOptions {
    /// Names of the construction-only fields that differ
    pub fn changed_fields(&self, other: &ConstructionOptions) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.start_seconds != other.start_seconds {
            changed.push("start_seconds");
        }
        if self.end_seconds != other.end_seconds {
            changed.push("end_seconds");
        }
        if self.autoplay != other.autoplay {
            changed.push("autoplay");
        }
        changed.extend(self.params.changed_fields(&other.params));
        changed
    }
}

/// Data carried by a native event
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    None,
    State(PlayerState),
    Error(PlayerErrorCode),
    PlaybackRate(f64),
    PlaybackQuality(PlaybackQuality),
}

/// Payload handed to every callback
#[derive(Clone)]
pub struct PlayerEvent {
    /// Player that raised the event
    pub target: PlayerHandle,
    pub data: EventData,
}

impl std::fmt::Debug for PlayerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerEvent")
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

/// Opaque event callback, compared by identity
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(&PlayerEvent) + Send + Sync>);

impl Callback {
    pub fn new(f: impl Fn(&PlayerEvent) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, event: &PlayerEvent) {
        (self.0)(event)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Callback({:p})", self.addr())
    }
}

/// Named callback slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerSlot {
    Ready,
    Error,
    StateChange,
    Cued,
    Buffering,
    Playing,
    Pause,
    End,
    PlaybackRateChange,
    PlaybackQualityChange,
}

impl HandlerSlot {
    pub const ALL: [HandlerSlot; 10] = [
        HandlerSlot::Ready,
        HandlerSlot::Error,
        HandlerSlot::StateChange,
        HandlerSlot::Cued,
        HandlerSlot::Buffering,
        HandlerSlot::Playing,
        HandlerSlot::Pause,
        HandlerSlot::End,
        HandlerSlot::PlaybackRateChange,
        HandlerSlot::PlaybackQualityChange,
    ];

    /// Derived slot fed by a state-change event, if any
    pub fn for_state(state: PlayerState) -> Option<HandlerSlot> {
        match state {
            PlayerState::Cued => Some(HandlerSlot::Cued),
            PlayerState::Buffering => Some(HandlerSlot::Buffering),
            PlayerState::Playing => Some(HandlerSlot::Playing),
            PlayerState::Paused => Some(HandlerSlot::Pause),
            PlayerState::Ended => Some(HandlerSlot::End),
            PlayerState::Unstarted => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HandlerSlot::Ready => "onReady",
            HandlerSlot::Error => "onError",
            HandlerSlot::StateChange => "onStateChange",
            HandlerSlot::Cued => "onCued",
            HandlerSlot::Buffering => "onBuffering",
            HandlerSlot::Playing => "onPlaying",
            HandlerSlot::Pause => "onPause",
            HandlerSlot::End => "onEnd",
            HandlerSlot::PlaybackRateChange => "onPlaybackRateChange",
            HandlerSlot::PlaybackQualityChange => "onPlaybackQualityChange",
        }
    }
}

impl std::fmt::Display for HandlerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Dispatch table of optional callbacks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Handlers {
    pub on_ready: Option<Callback>,
    pub on_error: Option<Callback>,
    pub on_state_change: Option<Callback>,
    pub on_cued: Option<Callback>,
    pub on_buffering: Option<Callback>,
    pub on_playing: Option<Callback>,
    pub on_pause: Option<Callback>,
    pub on_end: Option<Callback>,
    pub on_playback_rate_change: Option<Callback>,
    pub on_playback_quality_change: Option<Callback>,
}

impl Handlers {
    pub fn get(&self, slot: HandlerSlot) -> Option<&Callback> {
        self.slot(slot).as_ref()
    }

    pub fn set(&mut self, slot: HandlerSlot, callback: Option<Callback>) {
        *self.slot_mut(slot) = callback;
    }

    /// Slots whose callback identity differs between `self` and `other`
    pub fn changed_slots(&self, other: &Handlers) -> Vec<HandlerSlot> {
        HandlerSlot::ALL
            .into_iter()
            .filter(|slot| self.get(*slot) != other.get(*slot))
            .collect()
    }

    fn slot(&self, slot: HandlerSlot) -> &Option<Callback> {
        match slot {
            HandlerSlot::Ready => &self.on_ready,
            HandlerSlot::Error => &self.on_error,
            HandlerSlot::StateChange => &self.on_state_change,
            HandlerSlot::Cued => &self.on_cued,
            HandlerSlot::Buffering => &self.on_buffering,
            HandlerSlot::Playing => &self.on_playing,
            HandlerSlot::Pause => &self.on_pause,
            HandlerSlot::End => &self.on_end,
            HandlerSlot::PlaybackRateChange => &self.on_playback_rate_change,
            HandlerSlot::PlaybackQualityChange => &self.on_playback_quality_change,
        }
    }

    fn slot_mut(&mut self, slot: HandlerSlot) -> &mut Option<Callback> {
        match slot {
            HandlerSlot::Ready => &mut self.on_ready,
            HandlerSlot::Error => &mut self.on_error,
            HandlerSlot::StateChange => &mut self.on_state_change,
            HandlerSlot::Cued => &mut self.on_cued,
            HandlerSlot::Buffering => &mut self.on_buffering,
            HandlerSlot::Playing => &mut self.on_playing,
            HandlerSlot::Pause => &mut self.on_pause,
            HandlerSlot::End => &mut self.on_end,
            HandlerSlot::PlaybackRateChange => &mut self.on_playback_rate_change,
            HandlerSlot::PlaybackQualityChange => &mut self.on_playback_quality_change,
        }
    }
}

/// Desired player state for one update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Description {
    pub video_id: Option<VideoId>,
    pub live: LiveOptions,
    pub construction: ConstructionOptions,
    pub handlers: Handlers,
}

impl Description {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn video(mut self, id: impl Into<VideoId>) -> Self {
        self.video_id = Some(id.into());
        self
    }

    pub fn without_video(mut self) -> Self {
        self.video_id = None;
        self
    }

    pub fn size(mut self, width: impl Into<Dimension>, height: impl Into<Dimension>) -> Self {
        self.live.size = Size::new(width, height);
        self
    }

    pub fn paused(mut self, paused: impl Into<Option<bool>>) -> Self {
        self.live.paused = paused.into();
        self
    }

    pub fn volume(mut self, volume: impl Into<Option<f64>>) -> Self {
        self.live.volume = volume.into().filter(|v| !v.is_nan());
        self
    }

    pub fn muted(mut self, muted: impl Into<Option<bool>>) -> Self {
        self.live.muted = muted.into();
        self
    }

    pub fn playback_rate(mut self, rate: impl Into<Option<f64>>) -> Self {
        self.live.playback_rate = rate.into().filter(|r| !r.is_nan());
        self
    }

    pub fn start_seconds(mut self, seconds: impl Into<Option<f64>>) -> Self {
        self.construction.start_seconds = seconds.into();
        self
    }

    pub fn end_seconds(mut self, seconds: impl Into<Option<f64>>) -> Self {
        self.construction.end_seconds = seconds.into();
        self
    }

    pub fn autoplay(mut self, autoplay: bool) -> Self {
        self.construction.autoplay = autoplay;
        self
    }

    pub fn params(mut self, params: PlayerParams) -> Self {
        self.construction.params = params;
        self
    }

    /// Register a new closure for `slot`
    pub fn on(self, slot: HandlerSlot, f: impl Fn(&PlayerEvent) + Send + Sync + 'static) -> Self {
        self.with_handler(slot, Callback::new(f))
    }

    /// Register an existing callback, keeping its identity
    pub fn with_handler(mut self, slot: HandlerSlot, callback: Callback) -> Self {
        self.handlers.set(slot, Some(callback));
        self
    }

    pub fn without_handler(mut self, slot: HandlerSlot) -> Self {
        self.handlers.set(slot, None);
        self
    }
}
