use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leasehold_core::config::ElectionConfig;
use leasehold_core::election::ElectionState;
use leasehold_core::error::{LeaseholdError, Result};
use leasehold_core::lock::{Fingerprint, Lock, LockRecord};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::callbacks::LeaderCallbacks;

/// Externally visible view of an elector.
#[derive(Debug, Clone, Default)]
pub struct ElectorStatus {
    /// Current role.
    pub state: ElectionState,
    /// Last observed holder, if any.
    pub leader: Option<String>,
    /// When this candidate last acquired or renewed the lease.
    pub last_renewal: Option<Instant>,
}

/// What the elector knows about the lease between ticks.
#[derive(Default)]
struct Observation {
    record: Option<LockRecord>,
    fingerprint: Option<Fingerprint>,
    /// Local monotonic time at which `record` was first seen in its current version.
    observed_at: Option<Instant>,
    /// Last identity passed to `on_new_leader`.
    reported_leader: Option<String>,
}

impl Observation {
    /// Remember a fetched record. The clock restarts only when the record changed.
    fn observe(&mut self, record: LockRecord, fingerprint: Fingerprint, now: Instant) {
        let changed = self.record.as_ref() != Some(&record)
            || self.fingerprint.as_ref() != Some(&fingerprint);
        if changed {
            self.record = Some(record);
            self.fingerprint = Some(fingerprint);
            self.observed_at = Some(now);
        }
    }

    /// Remember a record this candidate just wrote.
    fn written(&mut self, record: LockRecord, fingerprint: Fingerprint, now: Instant) {
        self.record = Some(record);
        self.fingerprint = Some(fingerprint);
        self.observed_at = Some(now);
    }

    /// A held record is expired once `lease_duration_seconds` have passed on the
    /// local clock since its current version was first observed.
    fn is_expired(&self, now: Instant) -> bool {
        match (&self.record, self.observed_at) {
            (Some(record), Some(observed_at)) => {
                let lease = Duration::from_secs(record.lease_duration_seconds);
                now.saturating_duration_since(observed_at) > lease
            }
            _ => true,
        }
    }
}

/// Outcome of a single acquire-or-renew attempt.
#[derive(Debug, PartialEq, Eq)]
enum Attempt {
    /// This candidate holds the lease.
    Held,
    /// Another candidate holds a valid lease.
    HeldByOther(String),
    /// The attempt failed; try again later.
    Failed,
}

/// Why a leader stopped leading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepDown {
    Cancelled,
    DeadlineExceeded,
    Lost,
}

/// Lease-based leader election over a [`Lock`].
///
/// One task drives [`LeaderElector::run`]; every store round-trip, state
/// change and callback happens on that task in order.
pub struct LeaderElector {
    lock: Arc<dyn Lock>,
    config: ElectionConfig,
    callbacks: Arc<dyn LeaderCallbacks>,
    status_tx: watch::Sender<ElectorStatus>,
}

impl LeaderElector {
    /// Create a new elector. Fails on invalid timings or an empty identity.
    pub fn new(
        lock: impl Lock,
        config: ElectionConfig,
        callbacks: impl LeaderCallbacks,
    ) -> Result<Self> {
        Self::from_parts(Arc::new(lock), config, Arc::new(callbacks))
    }

    /// Create a new elector from shared parts.
    pub fn from_parts(
        lock: Arc<dyn Lock>,
        config: ElectionConfig,
        callbacks: Arc<dyn LeaderCallbacks>,
    ) -> Result<Self> {
        config.validate()?;
        if lock.identity().is_empty() {
            return Err(LeaseholdError::Config(
                "candidate identity must not be empty".to_string(),
            ));
        }

        let (status_tx, _) = watch::channel(ElectorStatus::default());
        Ok(Self {
            lock,
            config,
            callbacks,
            status_tx,
        })
    }

    /// This candidate's identity.
    pub fn identity(&self) -> &str {
        self.lock.identity()
    }

    /// The election configuration.
    pub fn config(&self) -> &ElectionConfig {
        &self.config
    }

    /// Current role.
    pub fn state(&self) -> ElectionState {
        self.status_tx.borrow().state
    }

    /// Check if this candidate currently believes it holds the lease.
    pub fn is_leader(&self) -> bool {
        self.state().is_leading()
    }

    /// Last observed holder.
    pub fn get_leader(&self) -> Option<String> {
        self.status_tx.borrow().leader.clone()
    }

    /// Snapshot of the current status.
    pub fn status(&self) -> ElectorStatus {
        self.status_tx.borrow().clone()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<ElectorStatus> {
        self.status_tx.subscribe()
    }

    /// Health check for a watchdog.
    ///
    /// Fails when this candidate believes it leads but has not renewed for
    /// longer than the lease plus `max_tolerable_expiry`, which means the tick
    /// loop is stuck.
    pub fn check(&self, max_tolerable_expiry: Duration) -> Result<()> {
        let status = self.status_tx.borrow();
        if !status.state.is_leading() {
            return Ok(());
        }

        let limit = self.config.lease_duration() + max_tolerable_expiry;
        match status.last_renewal {
            Some(renewed) if renewed.elapsed() > limit => Err(LeaseholdError::InvalidState(
                format!(
                    "leader {} has not renewed {} for {:?}",
                    self.identity(),
                    self.lock.describe(),
                    renewed.elapsed()
                ),
            )),
            _ => Ok(()),
        }
    }

    /// Run the election until `cancel` fires.
    ///
    /// Leadership may be gained and lost any number of times. On return the
    /// state is `Stopped` and `on_stopped_leading` has fired if this candidate
    /// was leading.
    pub async fn run(&self, cancel: CancellationToken) {
        if self.state().is_terminal() {
            tracing::warn!(lock = %self.lock.describe(), "Leader election already stopped");
            return;
        }

        tracing::info!(
            lock = %self.lock.describe(),
            identity = %self.identity(),
            "Starting leader election"
        );

        let mut observation = Observation::default();

        while self.acquire(&mut observation, &cancel).await {
            let reason = self.lead(&mut observation, &cancel).await;
            self.stand_down(&mut observation, reason).await;

            if reason == StepDown::Cancelled {
                break;
            }
        }

        self.status_tx.send_modify(|s| s.state = ElectionState::Stopped);
        tracing::info!(lock = %self.lock.describe(), "Leader election stopped");
    }

    /// Spawn [`LeaderElector::run`] on the current runtime.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Poll every retry period until the lease is acquired.
    ///
    /// Returns false when cancelled first.
    async fn acquire(&self, observation: &mut Observation, cancel: &CancellationToken) -> bool {
        let mut ticker = tokio::time::interval(self.config.retry_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                _ = ticker.tick() => {}
            }

            let round = {
                let in_flight = self.try_acquire_or_renew(observation);
                tokio::pin!(in_flight);
                tokio::select! {
                    biased;
                    attempt = &mut in_flight => Ok(attempt),
                    _ = cancel.cancelled() => {
                        // A write may already be committed; let it land before giving up.
                        let landed =
                            tokio::time::timeout(self.config.retry_period(), &mut in_flight).await;
                        Err(landed.ok())
                    }
                }
            };

            let attempt = match round {
                Ok(attempt) => attempt,
                Err(landed) => {
                    self.abandon(observation, landed).await;
                    return false;
                }
            };

            match attempt {
                Attempt::Held => return true,
                Attempt::HeldByOther(holder) => {
                    self.status_tx.send_modify(|s| s.state = ElectionState::Following);
                    tracing::debug!(
                        lock = %self.lock.describe(),
                        holder = %holder,
                        "Lease held by another candidate"
                    );
                }
                Attempt::Failed => {}
            }
        }
    }

    /// Cancelled while a round-trip was in flight. A lease it may have taken is
    /// released without ever reporting leadership.
    async fn abandon(&self, observation: &mut Observation, landed: Option<Attempt>) {
        match landed {
            Some(Attempt::Held) => {
                tracing::info!(lock = %self.lock.describe(), "Acquired lease while stopping");
            }
            Some(_) => return,
            None => {
                tracing::warn!(lock = %self.lock.describe(), "Store round-trip still in flight at stop");
            }
        }

        if self.config.release_on_cancel {
            self.release_bounded(observation).await;
        }
    }

    /// Hold the lease, renewing every retry period, until it is lost or the
    /// elector is cancelled.
    ///
    /// Each renewal must complete within `renew_deadline` of the start of the
    /// last successful write, so a stuck leader stops before any follower can
    /// see its lease expire.
    async fn lead(&self, observation: &mut Observation, cancel: &CancellationToken) -> StepDown {
        let leadership = cancel.child_token();
        self.status_tx.send_modify(|s| {
            s.state = ElectionState::Leading;
            s.last_renewal = Some(Instant::now());
        });
        tracing::info!(
            lock = %self.lock.describe(),
            identity = %self.identity(),
            "Acquired leadership"
        );
        self.callbacks.on_started_leading(leadership.clone());

        let mut renewed_from = observation.observed_at.unwrap_or_else(Instant::now);
        let period = self.config.retry_period();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break StepDown::Cancelled,
                _ = ticker.tick() => {}
            }

            let renewal = tokio::select! {
                biased;
                _ = cancel.cancelled() => break StepDown::Cancelled,
                renewal = tokio::time::timeout_at(
                    renewed_from + self.config.renew_deadline(),
                    self.renew(observation),
                ) => renewal,
            };

            match renewal {
                Ok(None) => {
                    renewed_from = observation.observed_at.unwrap_or(renewed_from);
                    self.status_tx
                        .send_modify(|s| s.last_renewal = Some(Instant::now()));
                }
                Ok(Some(holder)) => {
                    tracing::warn!(
                        lock = %self.lock.describe(),
                        holder = %holder,
                        "Lease taken over by another candidate"
                    );
                    break StepDown::Lost;
                }
                Err(_) => {
                    tracing::warn!(
                        lock = %self.lock.describe(),
                        deadline = ?self.config.renew_deadline(),
                        "Failed to renew lease before deadline"
                    );
                    break StepDown::DeadlineExceeded;
                }
            }
        };

        leadership.cancel();
        reason
    }

    /// Retry renewal every retry period. Resolves to `None` once renewed, or to
    /// the new holder when someone else owns the lease. The caller bounds this
    /// with the renew deadline.
    async fn renew(&self, observation: &mut Observation) -> Option<String> {
        loop {
            match self.try_acquire_or_renew(observation).await {
                Attempt::Held => return None,
                Attempt::HeldByOther(holder) => return Some(holder),
                Attempt::Failed => tokio::time::sleep(self.config.retry_period()).await,
            }
        }
    }

    /// Give up leadership: leave `Leading`, notify, and optionally release.
    async fn stand_down(&self, observation: &mut Observation, reason: StepDown) {
        self.status_tx.send_modify(|s| s.state = ElectionState::Following);
        tracing::info!(
            lock = %self.lock.describe(),
            identity = %self.identity(),
            reason = ?reason,
            "Stopped leading"
        );
        self.callbacks.on_stopped_leading();

        if self.config.release_on_cancel {
            self.release_bounded(observation).await;
        }
    }

    /// Release, bounded so shutdown never waits on an unreachable store. The
    /// outcome is only logged.
    async fn release_bounded(&self, observation: &mut Observation) {
        match tokio::time::timeout(self.config.retry_period(), self.release(observation)).await {
            Ok(Ok(true)) => {
                tracing::info!(lock = %self.lock.describe(), "Released lease");
            }
            Ok(Ok(false)) => {}
            Ok(Err(e)) => {
                tracing::warn!(lock = %self.lock.describe(), "Failed to release lease: {}", e);
            }
            Err(_) => {
                tracing::warn!(lock = %self.lock.describe(), "Timed out releasing lease");
            }
        }
    }

    /// Clear the holder if the record is ours. Tries the cached record first and
    /// re-reads the store when that is stale or not ours, since a write dropped
    /// mid-flight may still have landed.
    async fn release(&self, observation: &mut Observation) -> Result<bool> {
        let identity = self.identity();

        if let (Some(record), Some(fp)) = (&observation.record, &observation.fingerprint) {
            if record.is_held_by(identity) {
                let released = record.released(Utc::now());
                match self.lock.update(released.clone(), fp.clone()).await {
                    Ok(fp) => {
                        observation.written(released, fp, Instant::now());
                        self.status_tx.send_modify(|s| s.leader = None);
                        return Ok(true);
                    }
                    Err(LeaseholdError::Conflict(_)) => {
                        tracing::debug!(
                            lock = %self.lock.describe(),
                            "Cached lease record is stale, refetching before release"
                        );
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let (record, fingerprint) = match self.lock.get().await {
            Ok(found) => found,
            Err(LeaseholdError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        if !record.is_held_by(identity) {
            observation.observe(record, fingerprint, Instant::now());
            return Ok(false);
        }

        let released = record.released(Utc::now());
        let fingerprint = self.lock.update(released.clone(), fingerprint).await?;
        observation.written(released, fingerprint, Instant::now());
        self.status_tx.send_modify(|s| s.leader = None);
        Ok(true)
    }

    /// One round of the election against the store.
    async fn try_acquire_or_renew(&self, observation: &mut Observation) -> Attempt {
        let identity = self.identity().to_string();
        let lease_secs = self.config.lease_duration_secs;
        let now = Utc::now();
        let started = Instant::now();

        // A leader first renews from its cached record and fingerprint.
        if self.is_leader() {
            if let (Some(record), Some(fp)) = (&observation.record, &observation.fingerprint) {
                if record.is_held_by(&identity) {
                    let renewed = record.claimed_by(&identity, lease_secs, now);
                    match self.lock.update(renewed.clone(), fp.clone()).await {
                        Ok(fp) => {
                            observation.written(renewed, fp, started);
                            return Attempt::Held;
                        }
                        Err(LeaseholdError::Conflict(_)) => {
                            tracing::debug!(
                                lock = %self.lock.describe(),
                                "Cached lease record is stale, refetching"
                            );
                        }
                        Err(e) => {
                            tracing::warn!(lock = %self.lock.describe(), "Failed to renew lease: {}", e);
                            return Attempt::Failed;
                        }
                    }
                }
            }
        }

        let (record, fingerprint) = match self.lock.get().await {
            Ok(found) => found,
            Err(LeaseholdError::NotFound(_)) => return self.try_create(observation).await,
            Err(e) => {
                tracing::warn!(lock = %self.lock.describe(), "Failed to fetch lease record: {}", e);
                return Attempt::Failed;
            }
        };

        // Stamp after the read: the record may have been written while it was in flight.
        observation.observe(record.clone(), fingerprint.clone(), Instant::now());
        self.report_leader(observation, &record.holder_identity);

        if record.is_held() && !record.is_held_by(&identity) {
            // A leader that sees another holder has lost, expired or not.
            if self.is_leader() || !observation.is_expired(Instant::now()) {
                return Attempt::HeldByOther(record.holder_identity);
            }
            tracing::info!(
                lock = %self.lock.describe(),
                holder = %record.holder_identity,
                "Lease expired, attempting takeover"
            );
        }

        let claimed = record.claimed_by(&identity, lease_secs, now);
        match self.lock.update(claimed.clone(), fingerprint).await {
            Ok(fp) => {
                observation.written(claimed, fp, started);
                self.report_leader(observation, &identity);
                Attempt::Held
            }
            Err(LeaseholdError::Conflict(_)) => self.learn_winner(observation).await,
            Err(e) => {
                tracing::warn!(lock = %self.lock.describe(), "Failed to update lease record: {}", e);
                Attempt::Failed
            }
        }
    }

    /// Create the record when none exists.
    async fn try_create(&self, observation: &mut Observation) -> Attempt {
        let identity = self.identity().to_string();
        let started = Instant::now();
        let record = LockRecord::new_held(&identity, self.config.lease_duration_secs, Utc::now());

        match self.lock.create(record.clone()).await {
            Ok(fp) => {
                observation.written(record, fp, started);
                self.report_leader(observation, &identity);
                Attempt::Held
            }
            Err(LeaseholdError::AlreadyExists(_)) => {
                tracing::debug!(lock = %self.lock.describe(), "Lost the race to create the lease");
                Attempt::Failed
            }
            Err(e) => {
                tracing::warn!(lock = %self.lock.describe(), "Failed to create lease record: {}", e);
                Attempt::Failed
            }
        }
    }

    /// After losing a conditional write, find out who won.
    async fn learn_winner(&self, observation: &mut Observation) -> Attempt {
        let (record, fingerprint) = match self.lock.get().await {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!(lock = %self.lock.describe(), "Failed to fetch lease after conflict: {}", e);
                return Attempt::Failed;
            }
        };

        observation.observe(record.clone(), fingerprint, Instant::now());
        self.report_leader(observation, &record.holder_identity);

        if record.is_held() && !record.is_held_by(self.identity()) {
            Attempt::HeldByOther(record.holder_identity)
        } else {
            Attempt::Failed
        }
    }

    /// Fire `on_new_leader` once per distinct holder.
    fn report_leader(&self, observation: &mut Observation, holder: &str) {
        if holder.is_empty() {
            // A released lease ends the current holder's term.
            observation.reported_leader = None;
            self.status_tx.send_if_modified(|s| s.leader.take().is_some());
            return;
        }
        if observation.reported_leader.as_deref() == Some(holder) {
            return;
        }

        observation.reported_leader = Some(holder.to_string());
        self.status_tx
            .send_modify(|s| s.leader = Some(holder.to_string()));
        if holder != self.identity() {
            tracing::info!(lock = %self.lock.describe(), leader = %holder, "New leader elected");
        }
        self.callbacks.on_new_leader(holder);
    }
}
