pub mod db;
pub mod election;
pub mod lock;
pub mod testing;

pub use db::Database;
pub use election::{
    ElectorStatus, FnCallbacks, LeaderCallbacks, LeaderElector, LeaderTaskRunner, ManagedTask,
    TaskFuture,
};
pub use lock::{MemoryLock, MemoryLockStore, PgLeaseLock};
