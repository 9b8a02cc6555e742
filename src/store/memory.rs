//! In-memory backend for ephemeral deployments and tests.
//!
//! One mutex guards all three maps so the conditional writes observe a
//! consistent snapshot; contention is irrelevant at this backend's scale.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{
    BindWrite, CommitOutcome, IdentityRecord, IdentityStore, IssuedNonce, StoreError,
};

#[derive(Default)]
struct Inner {
    records: HashMap<String, IdentityRecord>,
    /// Canonical wallet address -> identity key.
    wallet_index: HashMap<String, String>,
    nonces: HashMap<String, IssuedNonce>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".to_string()))
    }
}

fn blank_record(identity_key: &str, now: i64) -> IdentityRecord {
    IdentityRecord {
        identity_key: identity_key.to_string(),
        wallet_address: None,
        totp_secret: None,
        created_at_unix: now,
        updated_at_unix: now,
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn get(&self, identity_key: &str) -> Result<Option<IdentityRecord>, StoreError> {
        Ok(self.lock()?.records.get(identity_key).cloned())
    }

    async fn get_by_wallet(&self, address: &str) -> Result<Option<IdentityRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .wallet_index
            .get(address)
            .and_then(|key| inner.records.get(key))
            .cloned())
    }

    async fn commit_totp_secret(
        &self,
        identity_key: &str,
        secret: &str,
    ) -> Result<CommitOutcome, StoreError> {
        let mut inner = self.lock()?;
        let now = Utc::now().timestamp();
        let record = inner
            .records
            .entry(identity_key.to_string())
            .or_insert_with(|| blank_record(identity_key, now));
        match &record.totp_secret {
            Some(existing) if existing != secret => Ok(CommitOutcome::AlreadyEnrolled),
            _ => {
                record.totp_secret = Some(secret.to_string());
                record.updated_at_unix = now;
                Ok(CommitOutcome::Committed)
            }
        }
    }

    async fn try_bind_wallet(
        &self,
        identity_key: &str,
        address: &str,
    ) -> Result<BindWrite, StoreError> {
        let mut inner = self.lock()?;
        let now = Utc::now().timestamp();

        if let Some(existing) = inner
            .records
            .get(identity_key)
            .and_then(|record| record.wallet_address.clone())
        {
            return Ok(BindWrite::IdentityTaken(existing));
        }
        if inner.wallet_index.contains_key(address) {
            return Ok(BindWrite::WalletTaken);
        }

        let record = inner
            .records
            .entry(identity_key.to_string())
            .or_insert_with(|| blank_record(identity_key, now));
        record.wallet_address = Some(address.to_string());
        record.updated_at_unix = now;
        inner
            .wallet_index
            .insert(address.to_string(), identity_key.to_string());
        Ok(BindWrite::Created)
    }

    async fn put_nonce(&self, identity_key: &str, nonce: &str) -> Result<(), StoreError> {
        self.lock()?.nonces.insert(
            identity_key.to_string(),
            IssuedNonce {
                nonce: nonce.to_string(),
                issued_at_unix: Utc::now().timestamp(),
            },
        );
        Ok(())
    }

    async fn take_nonce(&self, identity_key: &str) -> Result<Option<IssuedNonce>, StoreError> {
        Ok(self.lock()?.nonces.remove(identity_key))
    }
}
