mod memory;
mod postgres;

pub use memory::{MemoryLock, MemoryLockStore};
pub use postgres::PgLeaseLock;
