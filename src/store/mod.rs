//! Identity store: the durable identity -> wallet/TOTP record plus the
//! short-lived nonce table.
//!
//! The conditional writes (`commit_totp_secret`, `try_bind_wallet`,
//! `take_nonce`) are the protocol's atomicity points; every backend must
//! make them single-winner under concurrency.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Durable per-identity record. `wallet_address` and `totp_secret` are
/// write-once through the trait's conditional operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityRecord {
    pub identity_key: String,
    pub wallet_address: Option<String>,
    pub totp_secret: Option<String>,
    pub created_at_unix: i64,
    pub updated_at_unix: i64,
}

/// Result of committing a TOTP secret on first successful verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// A different secret is already on file for this identity.
    AlreadyEnrolled,
}

/// Result of the atomic wallet-binding write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindWrite {
    /// First binding for both sides; the pair is now permanent.
    Created,
    /// The identity already holds this wallet address (possibly a different
    /// one; the caller compares).
    IdentityTaken(String),
    /// Another identity already holds the wallet.
    WalletTaken,
}

/// A nonce previously issued to an identity, returned exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedNonce {
    pub nonce: String,
    pub issued_at_unix: i64,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fetch the record for an identity key, if one exists.
    async fn get(&self, identity_key: &str) -> Result<Option<IdentityRecord>, StoreError>;

    /// Fetch the record holding a canonical wallet address, if any.
    async fn get_by_wallet(&self, address: &str) -> Result<Option<IdentityRecord>, StoreError>;

    /// Commit a TOTP secret if and only if the identity has none, or has
    /// this exact secret already (idempotent re-commit).
    async fn commit_totp_secret(
        &self,
        identity_key: &str,
        secret: &str,
    ) -> Result<CommitOutcome, StoreError>;

    /// Bind `address` to `identity_key` if both sides are free. Exactly one
    /// caller wins under concurrency.
    async fn try_bind_wallet(
        &self,
        identity_key: &str,
        address: &str,
    ) -> Result<BindWrite, StoreError>;

    /// Store a nonce for the identity, replacing any outstanding one.
    async fn put_nonce(&self, identity_key: &str, nonce: &str) -> Result<(), StoreError>;

    /// Remove and return the identity's outstanding nonce. A second
    /// concurrent call observes `None`.
    async fn take_nonce(&self, identity_key: &str) -> Result<Option<IssuedNonce>, StoreError>;
}
