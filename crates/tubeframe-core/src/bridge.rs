//! Event Bridge - native runtime events to caller callbacks
//!
//! The runtime gets an [`EventSink`] at construction and reports every native
//! event through it. The bridge looks up the callback in the *current*
//! handler table at dispatch time, so a handler swapped in by a later
//! description is the one that runs.
//!
//! Native listeners stay attached for the whole player lifetime. Clearing a
//! handler only stops dispatch; nothing is unregistered from the runtime.

use crate::description::{EventData, HandlerSlot, Handlers, PlayerEvent};
use crate::runtime::{NativeEvent, PlayerHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tracing::trace;

/// Dispatch table shared by every player generation of one lifecycle
#[derive(Debug, Default)]
pub struct EventBridge {
    handlers: RwLock<Handlers>,
    /// Generation whose events are currently delivered
    generation: AtomicU64,
}

impl EventBridge {
    pub fn new(handlers: Handlers) -> Self {
        Self {
            handlers: RwLock::new(handlers),
            generation: AtomicU64::new(0),
        }
    }

    /// Swap in a new handler table, returning the slots whose callback changed
    pub fn replace_handlers(&self, handlers: Handlers) -> Vec<HandlerSlot> {
        let mut current = self
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let changed = current.changed_slots(&handlers);
        *current = handlers;
        changed
    }

    /// Snapshot of the current handler table
    pub fn handlers(&self) -> Handlers {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Open a sink for a new player, retiring every earlier sink
    pub fn sink(self: &Arc<Self>) -> EventSink {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        EventSink {
            bridge: Arc::downgrade(self),
            generation,
        }
    }

    /// Stop delivering events from every sink handed out so far
    pub fn retire(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Deliver one native event, returning the number of callbacks invoked
    pub fn dispatch(&self, target: &PlayerHandle, event: NativeEvent) -> usize {
        // Snapshot so callbacks may replace handlers without deadlocking
        let handlers = self.handlers();
        let mut invoked = 0;

        let mut call = |slot: HandlerSlot, data: EventData| {
            if let Some(callback) = handlers.get(slot) {
                callback.call(&PlayerEvent {
                    target: target.clone(),
                    data,
                });
                invoked += 1;
            }
        };

        match &event {
            NativeEvent::Ready => call(HandlerSlot::Ready, EventData::None),
            NativeEvent::StateChange(state) => {
                call(HandlerSlot::StateChange, EventData::State(*state));
                if let Some(slot) = HandlerSlot::for_state(*state) {
                    call(slot, EventData::State(*state));
                }
            }
            NativeEvent::Error(code) => call(HandlerSlot::Error, EventData::Error(*code)),
            NativeEvent::PlaybackRateChange(rate) => {
                call(HandlerSlot::PlaybackRateChange, EventData::PlaybackRate(*rate))
            }
            NativeEvent::PlaybackQualityChange(quality) => call(
                HandlerSlot::PlaybackQualityChange,
                EventData::PlaybackQuality(quality.clone()),
            ),
        }

        trace!(event = event.name(), invoked, "Event dispatched");
        invoked
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

/// Listener handle given to the runtime at construction
#[derive(Debug, Clone)]
pub struct EventSink {
    bridge: Weak<EventBridge>,
    generation: u64,
}

impl EventSink {
    /// Report a native event.
    ///
    /// Events from a retired player, or after the lifecycle is gone, are
    /// dropped.
    pub fn emit(&self, target: &PlayerHandle, event: NativeEvent) -> usize {
        match self.bridge.upgrade() {
            Some(bridge) if bridge.is_current(self.generation) => bridge.dispatch(target, event),
            _ => {
                trace!(event = event.name(), "Dropping event from retired player");
                0
            }
        }
    }

    /// Whether events sent through this sink are still delivered
    pub fn is_live(&self) -> bool {
        self.bridge
            .upgrade()
            .is_some_and(|bridge| bridge.is_current(self.generation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::Callback;
    use crate::sim::SimPlayer;
    use crate::types::{PlaybackQuality, PlayerErrorCode, PlayerState};
    use std::sync::Mutex;

    fn recorder() -> (Callback, Arc<Mutex<Vec<EventData>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback = Callback::new(move |event| sink.lock().unwrap().push(event.data.clone()));
        (callback, seen)
    }

    fn target() -> PlayerHandle {
        Arc::new(SimPlayer::detached())
    }

    #[test]
    fn test_state_change_feeds_generic_and_derived_slots() {
        let (generic, generic_seen) = recorder();
        let (playing, playing_seen) = recorder();
        let mut handlers = Handlers::default();
        handlers.set(HandlerSlot::StateChange, Some(generic));
        handlers.set(HandlerSlot::Playing, Some(playing));
        let bridge = EventBridge::new(handlers);

        let invoked = bridge.dispatch(&target(), NativeEvent::StateChange(PlayerState::Playing));

        assert_eq!(invoked, 2);
        assert_eq!(*generic_seen.lock().unwrap(), vec![EventData::State(PlayerState::Playing)]);
        assert_eq!(*playing_seen.lock().unwrap(), vec![EventData::State(PlayerState::Playing)]);
    }

    #[test]
    fn test_unstarted_has_no_derived_slot() {
        let (generic, generic_seen) = recorder();
        let mut handlers = Handlers::default();
        handlers.set(HandlerSlot::StateChange, Some(generic));
        let bridge = EventBridge::new(handlers);

        assert_eq!(bridge.dispatch(&target(), NativeEvent::StateChange(PlayerState::Unstarted)), 1);
        assert_eq!(generic_seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_no_coalescing() {
        let (on_end, seen) = recorder();
        let mut handlers = Handlers::default();
        handlers.set(HandlerSlot::End, Some(on_end));
        let bridge = EventBridge::new(handlers);
        let player = target();

        for _ in 0..3 {
            bridge.dispatch(&player, NativeEvent::StateChange(PlayerState::Ended));
        }
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_absent_handler_is_noop() {
        let bridge = EventBridge::default();
        assert_eq!(bridge.dispatch(&target(), NativeEvent::Error(PlayerErrorCode::VideoNotFound)), 0);
        assert_eq!(bridge.dispatch(&target(), NativeEvent::Ready), 0);
    }

    #[test]
    fn test_payload_data() {
        let (on_error, errors) = recorder();
        let (on_rate, rates) = recorder();
        let (on_quality, qualities) = recorder();
        let mut handlers = Handlers::default();
        handlers.set(HandlerSlot::Error, Some(on_error));
        handlers.set(HandlerSlot::PlaybackRateChange, Some(on_rate));
        handlers.set(HandlerSlot::PlaybackQualityChange, Some(on_quality));
        let bridge = EventBridge::new(handlers);
        let player = target();

        bridge.dispatch(&player, NativeEvent::Error(PlayerErrorCode::from_code(150)));
        bridge.dispatch(&player, NativeEvent::PlaybackRateChange(1.5));
        bridge.dispatch(&player, NativeEvent::PlaybackQualityChange(PlaybackQuality::Hd720));

        assert_eq!(
            *errors.lock().unwrap(),
            vec![EventData::Error(PlayerErrorCode::EmbeddingNotAllowed(150))]
        );
        assert_eq!(*rates.lock().unwrap(), vec![EventData::PlaybackRate(1.5)]);
        assert_eq!(
            *qualities.lock().unwrap(),
            vec![EventData::PlaybackQuality(PlaybackQuality::Hd720)]
        );
    }

    #[test]
    fn test_replaced_handler_receives_next_event() {
        let (old, old_seen) = recorder();
        let (new, new_seen) = recorder();
        let mut handlers = Handlers::default();
        handlers.set(HandlerSlot::Ready, Some(old));
        let bridge = EventBridge::new(handlers.clone());

        bridge.dispatch(&target(), NativeEvent::Ready);
        handlers.set(HandlerSlot::Ready, Some(new));
        assert_eq!(bridge.replace_handlers(handlers), vec![HandlerSlot::Ready]);
        bridge.dispatch(&target(), NativeEvent::Ready);

        assert_eq!(old_seen.lock().unwrap().len(), 1);
        assert_eq!(new_seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_retired_sink_drops_events() {
        let (on_ready, seen) = recorder();
        let mut handlers = Handlers::default();
        handlers.set(HandlerSlot::Ready, Some(on_ready));
        let bridge = Arc::new(EventBridge::new(handlers));

        let first = bridge.sink();
        let second = bridge.sink();
        assert!(!first.is_live());
        assert!(second.is_live());

        assert_eq!(first.emit(&target(), NativeEvent::Ready), 0);
        assert_eq!(second.emit(&target(), NativeEvent::Ready), 1);

        bridge.retire();
        assert_eq!(second.emit(&target(), NativeEvent::Ready), 0);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
