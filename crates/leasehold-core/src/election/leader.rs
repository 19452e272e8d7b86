use chrono::{DateTime, Utc};

use crate::lock::LockRecord;

/// Snapshot of who holds an election's lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderInfo {
    /// Holder identity.
    pub identity: String,
    /// When leadership was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lease was last renewed.
    pub renewed_at: DateTime<Utc>,
    /// When the lease expires by the holder's clock.
    pub lease_until: DateTime<Utc>,
    /// Number of times the lease changed hands.
    pub transitions: u64,
}

impl LeaderInfo {
    /// Build leader info from a record. Returns None for an unheld record.
    pub fn from_record(record: &LockRecord) -> Option<Self> {
        if !record.is_held() {
            return None;
        }

        let lease = chrono::Duration::seconds(record.lease_duration_seconds as i64);
        Some(Self {
            identity: record.holder_identity.clone(),
            acquired_at: record.acquire_time,
            renewed_at: record.renew_time,
            lease_until: record.renew_time + lease,
            transitions: record.leader_transitions,
        })
    }

    /// Check if the lease is still valid by the local wall clock.
    ///
    /// Only suitable for display: the elector itself never compares clocks
    /// across hosts.
    pub fn is_valid(&self) -> bool {
        self.lease_until > Utc::now()
    }
}
