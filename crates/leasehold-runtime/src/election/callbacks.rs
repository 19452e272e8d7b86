use tokio_util::sync::CancellationToken;

/// Notifications about leadership transitions.
///
/// All three run on the elector's own task, one at a time and never during a
/// store round-trip. Implementations must return quickly; long work belongs in
/// a task spawned from [`LeaderCallbacks::on_started_leading`].
pub trait LeaderCallbacks: Send + Sync + 'static {
    /// Leadership was acquired and recorded in the store.
    ///
    /// `leadership` is cancelled as soon as leadership ends for any reason,
    /// including shutdown of the elector.
    fn on_started_leading(&self, leadership: CancellationToken);

    /// Leadership was lost or given up. Leader-only work must stop now.
    fn on_stopped_leading(&self);

    /// A new holder was observed. Also fires with this candidate's own identity.
    fn on_new_leader(&self, _identity: &str) {}
}

type StartedFn = Box<dyn Fn(CancellationToken) + Send + Sync>;
type StoppedFn = Box<dyn Fn() + Send + Sync>;
type NewLeaderFn = Box<dyn Fn(&str) + Send + Sync>;

/// Closure-based callbacks.
pub struct FnCallbacks {
    started: StartedFn,
    stopped: StoppedFn,
    new_leader: Option<NewLeaderFn>,
}

impl FnCallbacks {
    /// Create callbacks from the two required hooks.
    pub fn new<S, T>(on_started_leading: S, on_stopped_leading: T) -> Self
    where
        S: Fn(CancellationToken) + Send + Sync + 'static,
        T: Fn() + Send + Sync + 'static,
    {
        Self {
            started: Box::new(on_started_leading),
            stopped: Box::new(on_stopped_leading),
            new_leader: None,
        }
    }

    /// Set the optional new-leader hook.
    pub fn on_new_leader<F>(mut self, on_new_leader: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.new_leader = Some(Box::new(on_new_leader));
        self
    }
}

impl LeaderCallbacks for FnCallbacks {
    fn on_started_leading(&self, leadership: CancellationToken) {
        (self.started)(leadership)
    }

    fn on_stopped_leading(&self) {
        (self.stopped)()
    }

    fn on_new_leader(&self, identity: &str) {
        if let Some(f) = &self.new_leader {
            f(identity)
        }
    }
}
