mod record;
mod traits;

pub use record::{Fingerprint, LockRecord};
pub use traits::{Lock, LockFuture};
