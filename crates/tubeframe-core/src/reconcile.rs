//! Description Differ / Reconciler
//!
//! [`diff`] is a pure function from a pair of descriptions to an ordered
//! [`Plan`] of player commands; [`reconcile`] runs that plan against a live
//! player. Commands are emitted in this order:
//!
//! 1. load or cue, when the video changed (supersedes play/pause)
//! 2. play or pause, when `paused` changed
//! 3. resize
//! 4. volume, then mute/unmute
//! 5. playback rate
//!
//! Construction-only fields never produce commands. Changing them is reported
//! in [`Plan::ignored`] and takes effect on the next construction.

use crate::description::{Description, HandlerSlot};
use crate::runtime::{Player, VideoRequest};
use crate::types::Size;
use crate::{Error, Result};
use tracing::{debug, warn};

/// One imperative player call
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadVideo(VideoRequest),
    CueVideo(VideoRequest),
    Play,
    Pause,
    SetSize(Size),
    /// Volume on the runtime's 0 to 100 scale
    SetVolume(u8),
    Mute,
    UnMute,
    SetPlaybackRate(f64),
}

impl Command {
    /// Runtime method name
    pub fn name(&self) -> &'static str {
        match self {
            Command::LoadVideo(_) => "loadVideoById",
            Command::CueVideo(_) => "cueVideoById",
            Command::Play => "playVideo",
            Command::Pause => "pauseVideo",
            Command::SetSize(_) => "setSize",
            Command::SetVolume(_) => "setVolume",
            Command::Mute => "mute",
            Command::UnMute => "unMute",
            Command::SetPlaybackRate(_) => "setPlaybackRate",
        }
    }

    /// Whether this command (re)loads a video
    pub fn is_load(&self) -> bool {
        matches!(self, Command::LoadVideo(_) | Command::CueVideo(_))
    }

    pub fn apply(&self, player: &dyn Player) -> Result<()> {
        match self {
            Command::LoadVideo(request) => player.load_video_by_id(request),
            Command::CueVideo(request) => player.cue_video_by_id(request),
            Command::Play => player.play_video(),
            Command::Pause => player.pause_video(),
            Command::SetSize(size) => player.set_size(&size.width, &size.height),
            Command::SetVolume(volume) => player.set_volume(*volume),
            Command::Mute => player.mute(),
            Command::UnMute => player.un_mute(),
            Command::SetPlaybackRate(rate) => player.set_playback_rate(*rate),
        }
    }
}

/// Convert a 0 to 1 volume to the runtime's 0 to 100 scale
pub fn runtime_volume(volume: f64) -> u8 {
    // NaN casts to 0
    (volume.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// NaN counts as unset
fn level(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

/// Outcome of diffing two descriptions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    /// Commands to issue, in order
    pub commands: Vec<Command>,
    /// Construction-only fields that changed and were not applied
    pub ignored: Vec<&'static str>,
    /// Handler slots whose callback identity changed
    pub handlers_changed: Vec<HandlerSlot>,
}

impl Plan {
    /// True when the live player needs no calls
    pub fn is_noop(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Compute the commands that move a live player from `previous` to `next`
pub fn diff(previous: &Description, next: &Description) -> Plan {
    let mut plan = Plan::default();
    let prev = &previous.live;
    let live = &next.live;

    // A load resets playback state, so it goes first and replaces play/pause
    if next.video_id != previous.video_id {
        if let Some(video_id) = &next.video_id {
            let request = VideoRequest::new(video_id.clone(), next);
            plan.commands.push(if live.paused == Some(true) {
                Command::CueVideo(request)
            } else {
                Command::LoadVideo(request)
            });
        }
    }
    let loaded = plan.commands.iter().any(Command::is_load);

    if !loaded && live.paused != prev.paused {
        match live.paused {
            Some(true) => plan.commands.push(Command::Pause),
            Some(false) => plan.commands.push(Command::Play),
            None => {}
        }
    }

    if live.size != prev.size {
        plan.commands.push(Command::SetSize(live.size.clone()));
    }

    if level(live.volume) != level(prev.volume) {
        if let Some(volume) = level(live.volume) {
            plan.commands.push(Command::SetVolume(runtime_volume(volume)));
        }
    }

    if live.muted != prev.muted {
        match live.muted {
            Some(true) => plan.commands.push(Command::Mute),
            Some(false) => plan.commands.push(Command::UnMute),
            None => {}
        }
    }

    if level(live.playback_rate) != level(prev.playback_rate) {
        if let Some(rate) = level(live.playback_rate) {
            plan.commands.push(Command::SetPlaybackRate(rate));
        }
    }

    plan.ignored = previous
        .construction
        .changed_fields(&next.construction)
        .into_iter()
        // Start and end were just honored by the load call
        .filter(|field| !(loaded && matches!(*field, "start_seconds" | "end_seconds")))
        .collect();

    plan.handlers_changed = previous.handlers.changed_slots(&next.handlers);
    plan
}

/// Live values the constructor cannot carry, applied right after construction
pub fn initial_commands(description: &Description) -> Vec<Command> {
    let live = &description.live;
    let mut commands = Vec::new();

    if let Some(volume) = level(live.volume) {
        commands.push(Command::SetVolume(runtime_volume(volume)));
    }
    if live.muted == Some(true) {
        commands.push(Command::Mute);
    }
    if let Some(rate) = level(live.playback_rate) {
        if rate != 1.0 {
            commands.push(Command::SetPlaybackRate(rate));
        }
    }
    commands
}

/// Run `commands` in order, skipping over failures.
///
/// Returns one [`Error::Command`] per failed command.
pub fn execute(player: &dyn Player, commands: &[Command]) -> Vec<Error> {
    let mut failed = Vec::new();
    for command in commands {
        if let Err(e) = command.apply(player) {
            let e = Error::command(command.name(), e.to_string());
            warn!(error = %e, code = e.error_code(), "Player command failed");
            failed.push(e);
        }
    }
    failed
}

/// Diff `previous` against `next` and issue the result on `player`
pub fn reconcile(player: &dyn Player, previous: &Description, next: &Description) -> Plan {
    let plan = diff(previous, next);

    if !plan.ignored.is_empty() {
        debug!(fields = ?plan.ignored, "Construction-only fields changed, applied on next construction");
    }
    if !plan.is_noop() {
        debug!(
            commands = ?plan.commands.iter().map(Command::name).collect::<Vec<_>>(),
            "Reconciling player"
        );
        execute(player, &plan.commands);
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::PlayerParams;
    use crate::sim::{SimCall, SimPlayer};
    use crate::types::VideoId;

    fn base() -> Description {
        Description::new().video("abc12345678")
    }

    #[test]
    fn test_identical_descriptions_are_noop() {
        let desc = base().paused(false).volume(0.3).muted(false).playback_rate(1.5);
        let plan = diff(&desc, &desc.clone());
        assert!(plan.is_noop());
        assert!(plan.ignored.is_empty());
        assert!(plan.handlers_changed.is_empty());
    }

    #[test]
    fn test_video_change_loads_once_without_play() {
        let prev = base().paused(false);
        let next = Description::new().video("xyz98765432").paused(false);

        let plan = diff(&prev, &next);
        assert_eq!(
            plan.commands,
            vec![Command::LoadVideo(VideoRequest {
                video_id: VideoId::from("xyz98765432"),
                start_seconds: None,
                end_seconds: None,
            })]
        );
    }

    #[test]
    fn test_video_change_supersedes_pause() {
        let prev = base().paused(false);
        let next = Description::new().video("xyz98765432").paused(true).start_seconds(12.0);

        let plan = diff(&prev, &next);
        assert_eq!(
            plan.commands,
            vec![Command::CueVideo(VideoRequest {
                video_id: VideoId::from("xyz98765432"),
                start_seconds: Some(12.0),
                end_seconds: None,
            })]
        );
        assert!(plan.ignored.is_empty());
    }

    #[test]
    fn test_pause_toggle() {
        let plan = diff(&base().paused(false), &base().paused(true));
        assert_eq!(plan.commands, vec![Command::Pause]);

        let plan = diff(&base().paused(true), &base().paused(false));
        assert_eq!(plan.commands, vec![Command::Play]);
    }

    #[test]
    fn test_unset_paused_never_controls_playback() {
        assert!(diff(&base().paused(true), &base()).is_noop());
        assert!(diff(&base().paused(false), &base()).is_noop());
    }

    #[test]
    fn test_mute_without_volume_call() {
        let prev = base().volume(0.5);
        let next = base().volume(0.5).muted(true);
        assert_eq!(diff(&prev, &next).commands, vec![Command::Mute]);
    }

    #[test]
    fn test_volume_and_mute_are_independent() {
        let prev = base().volume(0.5).muted(true);
        let next = base().volume(0.8).muted(false);
        assert_eq!(
            diff(&prev, &next).commands,
            vec![Command::SetVolume(80), Command::UnMute]
        );
    }

    #[test]
    fn test_volume_scale() {
        assert_eq!(runtime_volume(0.0), 0);
        assert_eq!(runtime_volume(0.333), 33);
        assert_eq!(runtime_volume(1.0), 100);
        assert_eq!(runtime_volume(1.7), 100);
        assert_eq!(runtime_volume(-0.2), 0);
    }

    #[test]
    fn test_nan_levels_are_idempotent() {
        let mut desc = base().volume(0.5);
        desc.live.volume = Some(f64::NAN);
        desc.live.playback_rate = Some(f64::NAN);

        assert!(diff(&desc, &desc.clone()).is_noop());
        assert!(diff(&base(), &desc).is_noop());
        assert!(initial_commands(&desc).is_empty());
    }

    #[test]
    fn test_rate_is_forwarded_unvalidated() {
        let plan = diff(&base(), &base().playback_rate(3.7));
        assert_eq!(plan.commands, vec![Command::SetPlaybackRate(3.7)]);
    }

    #[test]
    fn test_load_comes_before_live_changes() {
        let prev = base().paused(false).size(640u32, 360u32).volume(0.2);
        let next = Description::new()
            .video("xyz98765432")
            .paused(true)
            .size("100%", 480u32)
            .volume(0.9)
            .muted(true)
            .playback_rate(2.0);

        let names: Vec<_> = diff(&prev, &next).commands.iter().map(Command::name).collect();
        assert_eq!(
            names,
            vec!["cueVideoById", "setSize", "setVolume", "mute", "setPlaybackRate"]
        );
    }

    #[test]
    fn test_construction_only_changes_are_ignored() {
        let prev = base();
        let next = base().autoplay(true).params(PlayerParams {
            controls: false,
            show_captions: true,
            ..Default::default()
        });

        let plan = diff(&prev, &next);
        assert!(plan.is_noop());
        assert_eq!(plan.ignored, vec!["autoplay", "show_captions", "controls"]);
    }

    #[test]
    fn test_start_seconds_without_video_change_is_ignored() {
        let plan = diff(&base(), &base().start_seconds(30.0));
        assert!(plan.is_noop());
        assert_eq!(plan.ignored, vec!["start_seconds"]);
    }

    #[test]
    fn test_clearing_video_issues_nothing() {
        let plan = diff(&base(), &base().without_video());
        assert!(plan.is_noop());
    }

    #[test]
    fn test_handler_changes_are_reported() {
        let prev = base().on(HandlerSlot::Error, |_| {});
        let next = base();
        let plan = diff(&prev, &next);
        assert!(plan.is_noop());
        assert_eq!(plan.handlers_changed, vec![HandlerSlot::Error]);
    }

    #[test]
    fn test_initial_commands() {
        let desc = base().volume(0.25).muted(true).playback_rate(1.0);
        assert_eq!(initial_commands(&desc), vec![Command::SetVolume(25), Command::Mute]);
        assert!(initial_commands(&base().muted(false)).is_empty());
    }

    #[test]
    fn test_reconcile_reflects_next_state() {
        let player = SimPlayer::detached();
        let prev = base();
        let next = base().size(1280u32, 720u32).volume(0.4).muted(true).playback_rate(0.5);

        reconcile(&player, &prev, &next);

        let snapshot = player.snapshot();
        assert_eq!(snapshot.size, Some(Size::new(1280u32, 720u32)));
        assert_eq!(snapshot.volume, Some(40));
        assert_eq!(snapshot.muted, Some(true));
        assert_eq!(snapshot.playback_rate, Some(0.5));
    }

    #[test]
    fn test_failed_commands_do_not_stop_the_plan() {
        let player = SimPlayer::detached();
        player.destroy();

        let plan = reconcile(&player, &base(), &base().volume(0.4).muted(true));

        assert_eq!(plan.commands.len(), 2);
        assert_eq!(
            execute(&player, &plan.commands),
            vec![
                Error::command("setVolume", "Player has been destroyed"),
                Error::command("mute", "Player has been destroyed"),
            ]
        );
        assert!(!player.calls().contains(&SimCall::Mute));
    }
}
