use chrono::{DateTime, Utc};
use leasehold_core::error::{LeaseholdError, Result};
use leasehold_core::lock::{Fingerprint, Lock, LockFuture, LockRecord};

/// Schema for the lease table.
const LEASE_TABLE_SQL: &str = include_str!("../../migrations/0000_leasehold_leases.sql");

type LeaseRow = (String, i64, DateTime<Utc>, DateTime<Utc>, i64, i64);

/// Lock backed by a row in `leasehold_leases`.
///
/// The row's `version` column is the fingerprint: every write bumps it and
/// updates only match the version the caller last read.
#[derive(Clone)]
pub struct PgLeaseLock {
    pool: sqlx::PgPool,
    namespace: String,
    name: String,
    identity: String,
}

impl PgLeaseLock {
    /// Create a new PostgreSQL lock handle.
    pub fn new(
        pool: sqlx::PgPool,
        namespace: impl Into<String>,
        name: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            namespace: namespace.into(),
            name: name.into(),
            identity: identity.into(),
        }
    }

    /// Create the lease table if it does not exist.
    pub async fn ensure_schema(pool: &sqlx::PgPool) -> Result<()> {
        sqlx::raw_sql(LEASE_TABLE_SQL)
            .execute(pool)
            .await
            .map_err(|e| LeaseholdError::Database(format!("Failed to create lease table: {}", e)))?;
        Ok(())
    }

    fn parse_version(&self, fingerprint: &Fingerprint) -> Result<i64> {
        // A token we never issued can never match the row.
        fingerprint
            .as_str()
            .parse()
            .map_err(|_| LeaseholdError::Conflict(self.describe()))
    }
}

impl Lock for PgLeaseLock {
    fn get(&self) -> LockFuture<'_, (LockRecord, Fingerprint)> {
        Box::pin(async move {
            let row: Option<LeaseRow> = sqlx::query_as(
                r#"
                SELECT holder_identity, lease_duration_seconds, acquire_time,
                       renew_time, leader_transitions, version
                FROM leasehold_leases
                WHERE namespace = $1 AND name = $2
                "#,
            )
            .bind(&self.namespace)
            .bind(&self.name)
            .fetch_optional(&self.pool)
            .await?;

            match row {
                Some((holder, duration, acquired, renewed, transitions, version)) => Ok((
                    LockRecord {
                        holder_identity: holder,
                        lease_duration_seconds: duration.max(0) as u64,
                        acquire_time: acquired,
                        renew_time: renewed,
                        leader_transitions: transitions.max(0) as u64,
                    },
                    Fingerprint::from(version),
                )),
                None => Err(LeaseholdError::NotFound(self.describe())),
            }
        })
    }

    fn create(&self, record: LockRecord) -> LockFuture<'_, Fingerprint> {
        Box::pin(async move {
            let result = sqlx::query(
                r#"
                INSERT INTO leasehold_leases (
                    namespace, name, holder_identity, lease_duration_seconds,
                    acquire_time, renew_time, leader_transitions, version
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, 1)
                ON CONFLICT (namespace, name) DO NOTHING
                "#,
            )
            .bind(&self.namespace)
            .bind(&self.name)
            .bind(&record.holder_identity)
            .bind(record.lease_duration_seconds as i64)
            .bind(record.acquire_time)
            .bind(record.renew_time)
            .bind(record.leader_transitions as i64)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(LeaseholdError::AlreadyExists(self.describe()));
            }
            Ok(Fingerprint::from(1))
        })
    }

    fn update(&self, record: LockRecord, fingerprint: Fingerprint) -> LockFuture<'_, Fingerprint> {
        Box::pin(async move {
            let version = self.parse_version(&fingerprint)?;

            let row: Option<(i64,)> = sqlx::query_as(
                r#"
                UPDATE leasehold_leases
                SET holder_identity = $3,
                    lease_duration_seconds = $4,
                    acquire_time = $5,
                    renew_time = $6,
                    leader_transitions = $7,
                    version = version + 1
                WHERE namespace = $1 AND name = $2 AND version = $8
                RETURNING version
                "#,
            )
            .bind(&self.namespace)
            .bind(&self.name)
            .bind(&record.holder_identity)
            .bind(record.lease_duration_seconds as i64)
            .bind(record.acquire_time)
            .bind(record.renew_time)
            .bind(record.leader_transitions as i64)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?;

            row.map(|(version,)| Fingerprint::from(version))
                .ok_or_else(|| LeaseholdError::Conflict(self.describe()))
        })
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_table_sql() {
        assert!(LEASE_TABLE_SQL.contains("CREATE TABLE IF NOT EXISTS leasehold_leases"));
        assert!(LEASE_TABLE_SQL.contains("version"));
        assert!(LEASE_TABLE_SQL.contains("PRIMARY KEY (namespace, name)"));
    }

    #[tokio::test]
    async fn test_foreign_fingerprint_is_conflict() {
        // connect_lazy never opens a connection here.
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/leasehold").unwrap();
        let lock = PgLeaseLock::new(pool, "ns", "election", "a");

        assert_eq!(lock.describe(), "ns/election");
        assert_eq!(lock.parse_version(&Fingerprint::from(4)).unwrap(), 4);
        assert!(matches!(
            lock.parse_version(&Fingerprint::new("not-a-version")),
            Err(LeaseholdError::Conflict(_))
        ));
    }
}
