use std::sync::{Arc, Mutex};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::election::LeaderCallbacks;

/// A callback invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackEvent {
    StartedLeading,
    StoppedLeading,
    NewLeader(String),
}

#[derive(Default)]
struct Recorded {
    events: Vec<(Instant, CallbackEvent)>,
    tokens: Vec<CancellationToken>,
}

/// Callbacks that record every invocation with the time it happened.
#[derive(Clone, Default)]
pub struct RecordingCallbacks {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in order.
    pub fn events(&self) -> Vec<CallbackEvent> {
        self.with(|r| r.events.iter().map(|(_, e)| e.clone()).collect())
    }

    /// All events with their times.
    pub fn timeline(&self) -> Vec<(Instant, CallbackEvent)> {
        self.with(|r| r.events.clone())
    }

    /// Number of recorded occurrences of `event`.
    pub fn count(&self, event: &CallbackEvent) -> usize {
        self.with(|r| r.events.iter().filter(|(_, e)| e == event).count())
    }

    /// Time of the first occurrence of `event`.
    pub fn first(&self, event: &CallbackEvent) -> Option<Instant> {
        self.with(|r| r.events.iter().find(|(_, e)| e == event).map(|(at, _)| *at))
    }

    /// Leadership tokens handed to `on_started_leading`, in order.
    pub fn tokens(&self) -> Vec<CancellationToken> {
        self.with(|r| r.tokens.clone())
    }

    fn with<R>(&self, f: impl FnOnce(&mut Recorded) -> R) -> R {
        f(&mut self.recorded.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn push(&self, event: CallbackEvent) {
        self.with(|r| r.events.push((Instant::now(), event)));
    }
}

impl LeaderCallbacks for RecordingCallbacks {
    fn on_started_leading(&self, leadership: CancellationToken) {
        self.with(|r| r.tokens.push(leadership));
        self.push(CallbackEvent::StartedLeading);
    }

    fn on_stopped_leading(&self) {
        self.push(CallbackEvent::StoppedLeading);
    }

    fn on_new_leader(&self, identity: &str) {
        self.push(CallbackEvent::NewLeader(identity.to_string()));
    }
}
