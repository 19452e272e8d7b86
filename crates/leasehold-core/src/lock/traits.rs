use std::future::Future;
use std::pin::Pin;

use super::record::{Fingerprint, LockRecord};
use crate::error::Result;

/// Boxed future returned by [`Lock`] operations.
pub type LockFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Access to the shared lease record.
///
/// The only mutation is a conditional write against the last observed
/// [`Fingerprint`]; the store must reject stale writes with `Conflict`.
///
/// Error contract:
/// - `get`: `NotFound` when no record exists, `Transient` on store errors.
/// - `create`: `AlreadyExists` when a concurrent create won, `Transient` otherwise.
/// - `update`: `Conflict` when the fingerprint is stale, `Transient` on store errors.
pub trait Lock: Send + Sync + 'static {
    /// Fetch the record and its current fingerprint.
    fn get(&self) -> LockFuture<'_, (LockRecord, Fingerprint)>;

    /// Create the record if it does not exist yet.
    fn create(&self, record: LockRecord) -> LockFuture<'_, Fingerprint>;

    /// Replace the record if `fingerprint` is still current.
    fn update(&self, record: LockRecord, fingerprint: Fingerprint) -> LockFuture<'_, Fingerprint>;

    /// This candidate's identity, fixed for the lock's lifetime.
    fn identity(&self) -> &str;

    /// Human-readable location of the record, for logs.
    fn describe(&self) -> String;
}
