use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LeaseholdError, Result};

/// Election timing configuration.
///
/// Every field is required. Values are checked by [`ElectionConfig::validate`]
/// and rejected rather than adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// How long a lease stays valid without renewal.
    pub lease_duration_secs: u64,

    /// How long a leader keeps retrying a renewal before stepping down.
    pub renew_deadline_secs: u64,

    /// Interval between acquisition and renewal attempts.
    pub retry_period_secs: u64,

    /// Clear the holder on graceful shutdown instead of letting the lease expire.
    pub release_on_cancel: bool,
}

impl ElectionConfig {
    /// Create a validated election configuration.
    pub fn new(
        lease_duration_secs: u64,
        renew_deadline_secs: u64,
        retry_period_secs: u64,
        release_on_cancel: bool,
    ) -> Result<Self> {
        let config = Self {
            lease_duration_secs,
            renew_deadline_secs,
            retry_period_secs,
            release_on_cancel,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check `lease_duration > renew_deadline > retry_period > 0`.
    pub fn validate(&self) -> Result<()> {
        if self.retry_period_secs == 0 {
            return Err(LeaseholdError::Config(
                "retry_period_secs must be greater than zero".to_string(),
            ));
        }
        if self.renew_deadline_secs <= self.retry_period_secs {
            return Err(LeaseholdError::Config(format!(
                "renew_deadline_secs ({}) must be greater than retry_period_secs ({})",
                self.renew_deadline_secs, self.retry_period_secs
            )));
        }
        if self.lease_duration_secs <= self.renew_deadline_secs {
            return Err(LeaseholdError::Config(format!(
                "lease_duration_secs ({}) must be greater than renew_deadline_secs ({})",
                self.lease_duration_secs, self.renew_deadline_secs
            )));
        }
        Ok(())
    }

    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_duration_secs)
    }

    pub fn renew_deadline(&self) -> Duration {
        Duration::from_secs(self.renew_deadline_secs)
    }

    pub fn retry_period(&self) -> Duration {
        Duration::from_secs(self.retry_period_secs)
    }
}
