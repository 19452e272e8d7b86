//! Test helpers for election code: a fault-injecting lock and callbacks
//! that record what they were told.

mod callbacks;
mod faulty;

pub use callbacks::{CallbackEvent, RecordingCallbacks};
pub use faulty::FaultyLock;
