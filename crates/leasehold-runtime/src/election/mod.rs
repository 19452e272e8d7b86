mod callbacks;
mod elector;
mod task;

pub use callbacks::{FnCallbacks, LeaderCallbacks};
pub use elector::{ElectorStatus, LeaderElector};
pub use task::{LeaderTaskRunner, ManagedTask, TaskFuture};
