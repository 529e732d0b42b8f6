use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::DigestConfig;
use crate::signup::digest;

/// Attribution captured from the request context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignupMetadata {
    pub source: Option<String>,
    pub campaign: Option<String>,
}

/// Read shape of one signup. The digest columns and the user agent never
/// appear here; no read path returns them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SignupRecord {
    pub id: Uuid,
    pub email: String,
    pub signed_up_at: OffsetDateTime,
    pub verified: bool,
    pub source: Option<String>,
    pub campaign: Option<String>,
}

/// One submission; `email` must already be normalized.
#[derive(Debug, Clone)]
pub struct NewSignup {
    pub email: String,
    pub ip_digest: String,
    pub user_agent: Option<String>,
    pub metadata: SignupMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// False when the address was already registered.
    pub created: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("signup storage unavailable")]
    Unavailable(#[source] anyhow::Error),

    #[error("digest computation failed")]
    Digest(#[source] anyhow::Error),
}

fn unavailable(context: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| StoreError::Unavailable(anyhow::Error::new(e).context(context))
}

/// Persistence contract for signups. `submit` is insert-or-ignore: at most
/// one record per normalized email ever exists, no matter how many
/// submissions race for it.
#[async_trait]
pub trait SignupStore: Send + Sync {
    async fn submit(&self, signup: NewSignup) -> Result<SubmitOutcome, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<SignupRecord>, StoreError>;

    /// Check a plaintext candidate against the integrity digest stored for
    /// `email`. Unknown addresses verify as false.
    async fn verify_email_integrity(&self, email: &str, candidate: &str)
        -> Result<bool, StoreError>;

    /// Most recent signups first.
    async fn recent(&self, limit: i64) -> Result<Vec<SignupRecord>, StoreError>;
}

pub struct PgSignupStore {
    db: PgPool,
    digest_cost: DigestConfig,
}

impl PgSignupStore {
    pub fn new(db: PgPool, digest_cost: DigestConfig) -> Self {
        Self { db, digest_cost }
    }
}

#[async_trait]
impl SignupStore for PgSignupStore {
    async fn submit(&self, signup: NewSignup) -> Result<SubmitOutcome, StoreError> {
        // Fast path; the unique constraint below is the real guard.
        if self.find_by_email(&signup.email).await?.is_some() {
            return Ok(SubmitOutcome { created: false });
        }

        let email_digest =
            digest::digest_value(&signup.email, &self.digest_cost).map_err(StoreError::Digest)?;

        let result = sqlx::query(
            r#"
            INSERT INTO early_access_signups
                (email, email_digest, ip_digest, user_agent, source, campaign)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO NOTHING
        "#,
        )
        .bind(&signup.email)
        .bind(&email_digest)
        .bind(&signup.ip_digest)
        .bind(&signup.user_agent)
        .bind(&signup.metadata.source)
        .bind(&signup.metadata.campaign)
        .execute(&self.db)
        .await
        .map_err(unavailable("insert signup"))?;

        // Zero rows affected means a concurrent submission won the race;
        // same outcome as the fast path.
        Ok(SubmitOutcome {
            created: result.rows_affected() > 0,
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<SignupRecord>, StoreError> {
        let record = sqlx::query_as::<_, SignupRecord>(
            r#"
            SELECT id, email, signed_up_at, verified, source, campaign
            FROM early_access_signups
            WHERE email = $1
        "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(unavailable("find signup by email"))?;
        Ok(record)
    }

    async fn verify_email_integrity(
        &self,
        email: &str,
        candidate: &str,
    ) -> Result<bool, StoreError> {
        let stored: Option<String> = sqlx::query_scalar(
            r#"
            SELECT email_digest
            FROM early_access_signups
            WHERE email = $1
        "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(unavailable("load email digest"))?;

        match stored {
            Some(stored) => digest::verify_digest(candidate, &stored).map_err(StoreError::Digest),
            None => Ok(false),
        }
    }

    async fn recent(&self, limit: i64) -> Result<Vec<SignupRecord>, StoreError> {
        let rows = sqlx::query_as::<_, SignupRecord>(
            r#"
            SELECT id, email, signed_up_at, verified, source, campaign
            FROM early_access_signups
            ORDER BY signed_up_at DESC
            LIMIT $1
        "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(unavailable("list recent signups"))?;
        Ok(rows)
    }
}

struct StoredSignup {
    record: SignupRecord,
    email_digest: String,
}

/// In-memory [`SignupStore`] for tests and local development. Enforces the
/// same one-record-per-email rule under a process-local mutex.
pub struct MemoryStore {
    digest_cost: DigestConfig,
    rows: Mutex<HashMap<String, StoredSignup>>,
}

impl MemoryStore {
    pub fn new(digest_cost: DigestConfig) -> Self {
        Self {
            digest_cost,
            rows: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SignupStore for MemoryStore {
    async fn submit(&self, signup: NewSignup) -> Result<SubmitOutcome, StoreError> {
        {
            let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
            if rows.contains_key(&signup.email) {
                return Ok(SubmitOutcome { created: false });
            }
        }

        // Digest computation stays outside the lock.
        let email_digest =
            digest::digest_value(&signup.email, &self.digest_cost).map_err(StoreError::Digest)?;

        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        match rows.entry(signup.email.clone()) {
            Entry::Occupied(_) => Ok(SubmitOutcome { created: false }),
            Entry::Vacant(vacant) => {
                vacant.insert(StoredSignup {
                    record: SignupRecord {
                        id: Uuid::new_v4(),
                        email: signup.email,
                        signed_up_at: OffsetDateTime::now_utc(),
                        verified: false,
                        source: signup.metadata.source,
                        campaign: signup.metadata.campaign,
                    },
                    email_digest,
                });
                Ok(SubmitOutcome { created: true })
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<SignupRecord>, StoreError> {
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.get(email).map(|stored| stored.record.clone()))
    }

    async fn verify_email_integrity(
        &self,
        email: &str,
        candidate: &str,
    ) -> Result<bool, StoreError> {
        let stored = {
            let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
            rows.get(email).map(|stored| stored.email_digest.clone())
        };

        match stored {
            Some(stored) => digest::verify_digest(candidate, &stored).map_err(StoreError::Digest),
            None => Ok(false),
        }
    }

    async fn recent(&self, limit: i64) -> Result<Vec<SignupRecord>, StoreError> {
        let mut records: Vec<SignupRecord> = {
            let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
            rows.values().map(|stored| stored.record.clone()).collect()
        };
        records.sort_by(|a, b| b.signed_up_at.cmp(&a.signed_up_at));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }
}
