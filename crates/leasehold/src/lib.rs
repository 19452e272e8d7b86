//! Leasehold - lease-based leader election
//!
//! Candidates compete for a single lease record in a shared store. The holder
//! renews it periodically; the others take over once it has gone unrenewed
//! for a full lease duration.

mod runtime;

pub use leasehold_core;
pub use leasehold_runtime;

pub use runtime::prelude;
pub use runtime::{Leasehold, LeaseholdBuilder, Reconciler};
