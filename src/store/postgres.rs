//! `PostgreSQL` backend. Uniqueness is enforced by the schema; the
//! conditional writes lean on `ON CONFLICT` guards and unique violations
//! so concurrent callers resolve inside the database.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info_span, Instrument};

use super::{
    BindWrite, CommitOutcome, IdentityRecord, IdentityStore, IssuedNonce, StoreError,
};

const UNIQUE_VIOLATION: &str = "23505";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the schema if it does not exist yet.
    ///
    /// # Errors
    /// Propagates any database error.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS identities (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                identity_key TEXT NOT NULL UNIQUE,
                wallet_address TEXT UNIQUE,
                totp_secret TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS siwe_nonces (
                identity_key TEXT PRIMARY KEY,
                nonce TEXT NOT NULL,
                issued_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn record_from_row(row: &PgRow) -> Result<IdentityRecord, sqlx::Error> {
    Ok(IdentityRecord {
        identity_key: row.try_get("identity_key")?,
        wallet_address: row.try_get("wallet_address")?,
        totp_secret: row.try_get("totp_secret")?,
        created_at_unix: row.try_get("created_at_unix")?,
        updated_at_unix: row.try_get("updated_at_unix")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION)
    )
}

const RECORD_COLUMNS: &str = r"
    identity_key,
    wallet_address,
    totp_secret,
    EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix,
    EXTRACT(EPOCH FROM updated_at)::BIGINT AS updated_at_unix
";

#[async_trait]
impl IdentityStore for PgStore {
    async fn get(&self, identity_key: &str) -> Result<Option<IdentityRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM identities WHERE identity_key = $1"
        ))
        .bind(identity_key)
        .fetch_optional(&self.pool)
        .instrument(info_span!("db.query", query = "identities.get"))
        .await?;
        row.as_ref()
            .map(record_from_row)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn get_by_wallet(&self, address: &str) -> Result<Option<IdentityRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM identities WHERE wallet_address = $1"
        ))
        .bind(address)
        .fetch_optional(&self.pool)
        .instrument(info_span!("db.query", query = "identities.get_by_wallet"))
        .await?;
        row.as_ref()
            .map(record_from_row)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn commit_totp_secret(
        &self,
        identity_key: &str,
        secret: &str,
    ) -> Result<CommitOutcome, StoreError> {
        // The guarded upsert only lands when no different secret exists;
        // a missing RETURNING row means another secret is already on file.
        let row = sqlx::query(
            r"
            INSERT INTO identities (identity_key, totp_secret)
            VALUES ($1, $2)
            ON CONFLICT (identity_key) DO UPDATE
                SET totp_secret = EXCLUDED.totp_secret,
                    updated_at = NOW()
                WHERE identities.totp_secret IS NULL
                   OR identities.totp_secret = EXCLUDED.totp_secret
            RETURNING identity_key
            ",
        )
        .bind(identity_key)
        .bind(secret)
        .fetch_optional(&self.pool)
        .instrument(info_span!("db.query", query = "identities.commit_totp_secret"))
        .await?;
        Ok(if row.is_some() {
            CommitOutcome::Committed
        } else {
            CommitOutcome::AlreadyEnrolled
        })
    }

    async fn try_bind_wallet(
        &self,
        identity_key: &str,
        address: &str,
    ) -> Result<BindWrite, StoreError> {
        let result = sqlx::query(
            r"
            INSERT INTO identities (identity_key, wallet_address)
            VALUES ($1, $2)
            ON CONFLICT (identity_key) DO UPDATE
                SET wallet_address = EXCLUDED.wallet_address,
                    updated_at = NOW()
                WHERE identities.wallet_address IS NULL
            RETURNING identity_key
            ",
        )
        .bind(identity_key)
        .bind(address)
        .fetch_optional(&self.pool)
        .instrument(info_span!("db.query", query = "identities.try_bind_wallet"))
        .await;

        match result {
            Ok(Some(_)) => Ok(BindWrite::Created),
            Ok(None) => {
                // Identity row exists with a wallet already set.
                let existing: Option<String> =
                    sqlx::query_scalar("SELECT wallet_address FROM identities WHERE identity_key = $1")
                        .bind(identity_key)
                        .fetch_optional(&self.pool)
                        .instrument(info_span!("db.query", query = "identities.wallet"))
                        .await?
                        .flatten();
                match existing {
                    Some(address) => Ok(BindWrite::IdentityTaken(address)),
                    None => Err(StoreError::Unavailable(
                        "wallet bind lost without a winner".to_string(),
                    )),
                }
            }
            // The wallet_address unique index fired: another identity holds it.
            Err(err) if is_unique_violation(&err) => Ok(BindWrite::WalletTaken),
            Err(err) => Err(err.into()),
        }
    }

    async fn put_nonce(&self, identity_key: &str, nonce: &str) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO siwe_nonces (identity_key, nonce, issued_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (identity_key) DO UPDATE
                SET nonce = EXCLUDED.nonce,
                    issued_at = NOW()
            ",
        )
        .bind(identity_key)
        .bind(nonce)
        .execute(&self.pool)
        .instrument(info_span!("db.query", query = "siwe_nonces.put"))
        .await?;
        Ok(())
    }

    async fn take_nonce(&self, identity_key: &str) -> Result<Option<IssuedNonce>, StoreError> {
        let row = sqlx::query(
            r"
            DELETE FROM siwe_nonces
            WHERE identity_key = $1
            RETURNING nonce, EXTRACT(EPOCH FROM issued_at)::BIGINT AS issued_at_unix
            ",
        )
        .bind(identity_key)
        .fetch_optional(&self.pool)
        .instrument(info_span!("db.query", query = "siwe_nonces.take"))
        .await?;
        row.map(|row| {
            Ok(IssuedNonce {
                nonce: row.try_get("nonce")?,
                issued_at_unix: row.try_get("issued_at_unix")?,
            })
        })
        .transpose()
        .map_err(|err: sqlx::Error| err.into())
    }
}
