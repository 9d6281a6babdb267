//! External runtime surface
//!
//! The player runtime is a black box reached through three traits:
//!
//! - [`ScriptHost`] installs the runtime into the host document
//! - [`Runtime`] constructs players
//! - [`Player`] is the imperative command surface of one live player

use crate::bridge::EventSink;
use crate::description::Description;
use crate::types::{Container, Dimension, PlaybackQuality, PlayerErrorCode, PlayerState, Size, VideoId};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// Shared handle to a live player
pub type PlayerHandle = Arc<dyn Player>;

/// Shared handle to the loaded runtime
pub type RuntimeHandle = Arc<dyn Runtime>;

/// Host environment the SDK is installed into
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Whether a runtime is already installed globally
    fn runtime_present(&self) -> bool;

    /// Insert the script node and resolve once it has loaded or failed
    async fn load_script(&self, src: &Url) -> Result<()>;

    /// Resolve once the installed runtime signals readiness
    async fn when_ready(&self) -> Result<RuntimeHandle>;
}

/// Loaded player runtime
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Construct a player bound to `container`.
    ///
    /// Implementations attach their native listeners to `events` before
    /// returning, and resolve once the runtime has accepted construction.
    async fn construct(
        &self,
        container: &Container,
        options: PlayerOptions,
        events: EventSink,
    ) -> Result<PlayerHandle>;
}

/// Imperative command surface of one player
pub trait Player: Send + Sync {
    fn load_video_by_id(&self, request: &VideoRequest) -> Result<()>;
    fn cue_video_by_id(&self, request: &VideoRequest) -> Result<()>;
    fn play_video(&self) -> Result<()>;
    fn pause_video(&self) -> Result<()>;
    fn set_size(&self, width: &Dimension, height: &Dimension) -> Result<()>;
    /// Volume on the runtime's 0 to 100 scale
    fn set_volume(&self, volume: u8) -> Result<()>;
    fn mute(&self) -> Result<()>;
    fn un_mute(&self) -> Result<()>;
    fn set_playback_rate(&self, rate: f64) -> Result<()>;
    /// Tear the player down; later commands fail
    fn destroy(&self);
}

/// Arguments of a load or cue call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRequest {
    pub video_id: VideoId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_seconds: Option<f64>,
}

impl VideoRequest {
    /// Latch the load-time fields of `description` for `video_id`
    pub fn new(video_id: VideoId, description: &Description) -> Self {
        Self {
            video_id,
            start_seconds: description.construction.start_seconds,
            end_seconds: description.construction.end_seconds,
        }
    }
}

/// Player parameters in the runtime's wire names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerVars {
    #[serde(with = "flag")]
    pub autoplay: bool,
    #[serde(with = "flag")]
    pub cc_load_policy: bool,
    #[serde(with = "flag")]
    pub controls: bool,
    #[serde(with = "flag")]
    pub disablekb: bool,
    #[serde(with = "flag")]
    pub fs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hl: Option<String>,
    /// 1 shows annotations, 3 hides them
    pub iv_load_policy: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(with = "flag")]
    pub modestbranding: bool,
    #[serde(with = "flag")]
    pub playsinline: bool,
    #[serde(with = "flag")]
    pub rel: bool,
}

impl PlayerVars {
    /// Derive the parameter set of `description`.
    ///
    /// An explicit `paused` value decides autoplay.
    pub fn from_description(description: &Description) -> Self {
        let construction = &description.construction;
        let params = &construction.params;

        Self {
            autoplay: match description.live.paused {
                Some(paused) => !paused,
                None => construction.autoplay,
            },
            cc_load_policy: params.show_captions,
            controls: params.controls,
            disablekb: params.disable_keyboard,
            fs: params.allow_fullscreen,
            hl: params.lang.clone(),
            iv_load_policy: if params.annotations { 1 } else { 3 },
            start: construction.start_seconds,
            end: construction.end_seconds,
            modestbranding: params.modest_branding,
            playsinline: params.plays_inline,
            rel: params.show_related_videos,
        }
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// One-shot construction payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<VideoId>,
    pub width: Dimension,
    pub height: Dimension,
    pub player_vars: PlayerVars,
}

impl PlayerOptions {
    pub fn from_description(description: &Description) -> Self {
        let Size { width, height } = description.live.size.clone();
        Self {
            video_id: description.video_id.clone(),
            width,
            height,
            player_vars: PlayerVars::from_description(description),
        }
    }
}

/// Event raised by the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    Ready,
    StateChange(PlayerState),
    Error(PlayerErrorCode),
    PlaybackRateChange(f64),
    PlaybackQualityChange(PlaybackQuality),
}

impl NativeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            NativeEvent::Ready => "onReady",
            NativeEvent::StateChange(_) => "onStateChange",
            NativeEvent::Error(_) => "onError",
            NativeEvent::PlaybackRateChange(_) => "onPlaybackRateChange",
            NativeEvent::PlaybackQualityChange(_) => "onPlaybackQualityChange",
        }
    }
}

/// Booleans travel as 0/1
mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(u8::deserialize(deserializer)? != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::PlayerParams;

    #[test]
    fn test_default_player_vars() {
        let vars = PlayerVars::from_description(&Description::new());
        assert!(!vars.autoplay);
        assert!(vars.controls);
        assert!(vars.fs);
        assert!(vars.rel);
        assert_eq!(vars.iv_load_policy, 1);
        assert_eq!(vars.hl, None);
    }

    #[test]
    fn test_paused_decides_autoplay() {
        let desc = Description::new().autoplay(true).paused(true);
        assert!(!PlayerVars::from_description(&desc).autoplay);

        let desc = Description::new().paused(false);
        assert!(PlayerVars::from_description(&desc).autoplay);

        let desc = Description::new().autoplay(true);
        assert!(PlayerVars::from_description(&desc).autoplay);
    }

    #[test]
    fn test_player_vars_json() {
        let desc = Description::new()
            .start_seconds(30.0)
            .params(PlayerParams {
                annotations: false,
                lang: Some("fr".into()),
                ..Default::default()
            });
        let json: serde_json::Value =
            serde_json::from_str(&PlayerVars::from_description(&desc).to_json()).unwrap();

        assert_eq!(json["autoplay"], 0);
        assert_eq!(json["controls"], 1);
        assert_eq!(json["iv_load_policy"], 3);
        assert_eq!(json["hl"], "fr");
        assert_eq!(json["start"], 30.0);
        assert!(json.get("end").is_none());
    }

    #[test]
    fn test_player_options() {
        let desc = Description::new().video("abc12345678").size("100%", 480u32);
        let options = PlayerOptions::from_description(&desc);
        assert_eq!(options.video_id, Some(VideoId::from("abc12345678")));
        assert_eq!(options.width, Dimension::Css("100%".into()));
        assert_eq!(options.height, Dimension::Pixels(480));

        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["videoId"], "abc12345678");
        assert_eq!(json["width"], "100%");
        assert_eq!(json["height"], 480);
    }

    #[test]
    fn test_video_request_latches_load_time_fields() {
        let desc = Description::new().start_seconds(5.0).end_seconds(20.0);
        let request = VideoRequest::new("xyz98765432".into(), &desc);
        assert_eq!(request.start_seconds, Some(5.0));
        assert_eq!(request.end_seconds, Some(20.0));
    }
}
