//! Core types for Tubeframe

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for one mounted player lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External video identifier (11 characters on YouTube)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Length of a canonical video id
    pub const LEN: usize = 11;

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id has the canonical 11-character shape.
    ///
    /// Ids are never rejected locally; the runtime decides.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == Self::LEN
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    }
}

impl From<&str> for VideoId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for VideoId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Player dimension, either pixels or a CSS length such as `"100%"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    Pixels(u32),
    Css(String),
}

impl From<u32> for Dimension {
    fn from(px: u32) -> Self {
        Dimension::Pixels(px)
    }
}

impl From<&str> for Dimension {
    fn from(css: &str) -> Self {
        Dimension::Css(css.to_string())
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dimension::Pixels(px) => write!(f, "{px}"),
            Dimension::Css(css) => f.write_str(css),
        }
    }
}

/// Player size
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: Dimension,
    pub height: Dimension,
}

impl Size {
    pub fn new(width: impl Into<Dimension>, height: impl Into<Dimension>) -> Self {
        Self {
            width: width.into(),
            height: height.into(),
        }
    }
}

impl Default for Size {
    /// The external player's default embed size
    fn default() -> Self {
        Self::new(640u32, 360u32)
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Reference to the element a player is mounted into.
///
/// Two containers are the same element when their ids match; handing the
/// lifecycle a different id is a container swap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Container(Arc<str>);

impl Container {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    /// A container must name an element
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Playback state reported by the runtime's state-change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl PlayerState {
    /// Map the runtime's numeric state code
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(PlayerState::Unstarted),
            0 => Some(PlayerState::Ended),
            1 => Some(PlayerState::Playing),
            2 => Some(PlayerState::Paused),
            3 => Some(PlayerState::Buffering),
            5 => Some(PlayerState::Cued),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            PlayerState::Unstarted => -1,
            PlayerState::Ended => 0,
            PlayerState::Playing => 1,
            PlayerState::Paused => 2,
            PlayerState::Buffering => 3,
            PlayerState::Cued => 5,
        }
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Unstarted => write!(f, "unstarted"),
            PlayerState::Ended => write!(f, "ended"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::Paused => write!(f, "paused"),
            PlayerState::Buffering => write!(f, "buffering"),
            PlayerState::Cued => write!(f, "cued"),
        }
    }
}

/// Error codes delivered by the runtime's error event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerErrorCode {
    /// Request contains an invalid parameter value (e.g. malformed video id)
    InvalidParameter,
    /// Content cannot be played in an HTML5 player
    Html5Error,
    /// Video not found or removed
    VideoNotFound,
    /// Owner does not allow embedded playback (codes 101 and 150)
    EmbeddingNotAllowed(i32),
    /// Any code the runtime adds later
    Other(i32),
}

impl PlayerErrorCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            2 => PlayerErrorCode::InvalidParameter,
            5 => PlayerErrorCode::Html5Error,
            100 => PlayerErrorCode::VideoNotFound,
            101 | 150 => PlayerErrorCode::EmbeddingNotAllowed(code),
            other => PlayerErrorCode::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            PlayerErrorCode::InvalidParameter => 2,
            PlayerErrorCode::Html5Error => 5,
            PlayerErrorCode::VideoNotFound => 100,
            PlayerErrorCode::EmbeddingNotAllowed(code) | PlayerErrorCode::Other(code) => *code,
        }
    }
}

impl std::fmt::Display for PlayerErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerErrorCode::InvalidParameter => write!(f, "invalid parameter"),
            PlayerErrorCode::Html5Error => write!(f, "HTML5 player error"),
            PlayerErrorCode::VideoNotFound => write!(f, "video not found"),
            PlayerErrorCode::EmbeddingNotAllowed(code) => {
                write!(f, "embedding not allowed ({code})")
            }
            PlayerErrorCode::Other(code) => write!(f, "unknown error ({code})"),
        }
    }
}

/// Playback quality reported by the quality-change event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackQuality {
    Small,
    Medium,
    Large,
    Hd720,
    Hd1080,
    HighRes,
    Default,
    /// Quality label not known to this crate, kept verbatim
    Other(String),
}

impl PlaybackQuality {
    pub fn from_label(label: &str) -> Self {
        match label {
            "small" => PlaybackQuality::Small,
            "medium" => PlaybackQuality::Medium,
            "large" => PlaybackQuality::Large,
            "hd720" => PlaybackQuality::Hd720,
            "hd1080" => PlaybackQuality::Hd1080,
            "highres" => PlaybackQuality::HighRes,
            "default" => PlaybackQuality::Default,
            other => PlaybackQuality::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            PlaybackQuality::Small => "small",
            PlaybackQuality::Medium => "medium",
            PlaybackQuality::Large => "large",
            PlaybackQuality::Hd720 => "hd720",
            PlaybackQuality::Hd1080 => "hd1080",
            PlaybackQuality::HighRes => "highres",
            PlaybackQuality::Default => "default",
            PlaybackQuality::Other(label) => label,
        }
    }
}

impl std::fmt::Display for PlaybackQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
