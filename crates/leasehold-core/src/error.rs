use thiserror::Error;

/// Core error type for leasehold operations.
///
/// Lock backends report `NotFound`, `AlreadyExists`, `Conflict` and `Transient`;
/// the elector handles those internally. `Config` is the only variant a caller
/// of `LeaderElector::new` ever sees.
#[derive(Error, Debug)]
pub enum LeaseholdError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock record not found: {0}")]
    NotFound(String),

    #[error("Lock record already exists: {0}")]
    AlreadyExists(String),

    #[error("Stale fingerprint for {0}")]
    Conflict(String),

    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<sqlx::Error> for LeaseholdError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Configuration(e) => LeaseholdError::Config(e.to_string()),
            other => LeaseholdError::Transient(other.to_string()),
        }
    }
}

/// Result type alias using LeaseholdError.
pub type Result<T> = std::result::Result<T, LeaseholdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_lock() {
        let err = LeaseholdError::Conflict("ns/name".into());
        assert_eq!(err.to_string(), "Stale fingerprint for ns/name");
    }

    #[test]
    fn test_sqlx_errors_become_transient() {
        let err: LeaseholdError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, LeaseholdError::Transient(_)));

        let err: LeaseholdError = sqlx::Error::Configuration("bad url".into()).into();
        assert!(matches!(err, LeaseholdError::Config(_)));
    }
}
