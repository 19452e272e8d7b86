use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The persisted lease: who holds it and since when it was last renewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Current or most recent holder. Empty means unheld.
    pub holder_identity: String,
    /// How long a held lease stays valid without renewal.
    pub lease_duration_seconds: u64,
    /// When the current holder acquired the lease.
    pub acquire_time: DateTime<Utc>,
    /// When the current holder last renewed the lease.
    pub renew_time: DateTime<Utc>,
    /// Number of times the lease changed hands.
    pub leader_transitions: u64,
}

impl LockRecord {
    /// A fresh record held by `identity`.
    pub fn new_held(identity: impl Into<String>, lease_duration_seconds: u64, now: DateTime<Utc>) -> Self {
        Self {
            holder_identity: identity.into(),
            lease_duration_seconds,
            acquire_time: now,
            renew_time: now,
            leader_transitions: 0,
        }
    }

    /// Check if anyone holds the lease.
    pub fn is_held(&self) -> bool {
        !self.holder_identity.is_empty()
    }

    /// Check if the lease is held by `identity`.
    pub fn is_held_by(&self, identity: &str) -> bool {
        self.is_held() && self.holder_identity == identity
    }

    /// The record `identity` writes to take or keep the lease.
    ///
    /// Keeping it preserves the acquire time and transition count; taking it
    /// over from anyone else (including an unheld record) bumps the counter.
    pub fn claimed_by(&self, identity: &str, lease_duration_seconds: u64, now: DateTime<Utc>) -> Self {
        if self.is_held_by(identity) {
            Self {
                holder_identity: identity.to_string(),
                lease_duration_seconds,
                acquire_time: self.acquire_time,
                renew_time: now,
                leader_transitions: self.leader_transitions,
            }
        } else {
            Self {
                holder_identity: identity.to_string(),
                lease_duration_seconds,
                acquire_time: now,
                renew_time: now,
                leader_transitions: self.leader_transitions + 1,
            }
        }
    }

    /// The record a leader writes to give the lease up.
    pub fn released(&self, now: DateTime<Utc>) -> Self {
        Self {
            holder_identity: String::new(),
            lease_duration_seconds: self.lease_duration_seconds,
            acquire_time: now,
            renew_time: now,
            leader_transitions: self.leader_transitions,
        }
    }
}

/// Opaque version token for conditional writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for Fingerprint {
    fn from(version: i64) -> Self {
        Self(version.to_string())
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
