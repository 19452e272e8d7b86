pub mod config;
pub mod election;
pub mod error;
pub mod lock;

pub use config::LeaseholdConfig;
pub use election::{CandidateId, ElectionState, LeaderInfo};
pub use error::{LeaseholdError, Result};
pub use lock::{Fingerprint, Lock, LockRecord};
