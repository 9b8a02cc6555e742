//! Binding enforcer: the one-to-one, append-only identity/wallet registry
//! logic layered over the store's atomic write.
//!
//! The identity-side pre-check gives the common cases a cheap answer; the
//! store write remains the authority, so two racing callers still resolve
//! to exactly one winner.

use crate::siwe::normalize_address;
use crate::store::{BindWrite, IdentityStore, StoreError};

/// Why a bind attempt was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindRejection {
    /// The identity is permanently bound to a different wallet.
    IdentityWalletMismatch,
    /// The wallet is permanently bound to a different identity.
    WalletBoundElsewhere,
}

impl BindRejection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdentityWalletMismatch => "identity-wallet mismatch",
            Self::WalletBoundElsewhere => "wallet already bound elsewhere",
        }
    }
}

/// Outcome of a bind attempt, always in canonical lowercase addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindOutcome {
    /// First proof for this identity; the pair is now permanent.
    Linked { address: String },
    /// Repeat proof of the already-bound wallet.
    Confirmed { address: String },
    /// Refused; `linked_wallet` carries the identity's existing binding on
    /// a mismatch so the client can say which wallet to connect.
    Rejected {
        reason: BindRejection,
        linked_wallet: Option<String>,
    },
}

/// Bind `address` to `identity_key`, or confirm an existing binding.
///
/// # Errors
/// Propagates store failures only; every protocol-level refusal is a
/// `BindOutcome::Rejected`.
pub async fn bind(
    store: &dyn IdentityStore,
    identity_key: &str,
    address: &str,
) -> Result<BindOutcome, StoreError> {
    let address = normalize_address(address);

    if let Some(existing) = store
        .get(identity_key)
        .await?
        .and_then(|record| record.wallet_address)
    {
        return Ok(if existing == address {
            BindOutcome::Confirmed { address }
        } else {
            BindOutcome::Rejected {
                reason: BindRejection::IdentityWalletMismatch,
                linked_wallet: Some(existing),
            }
        });
    }

    match store.try_bind_wallet(identity_key, &address).await? {
        BindWrite::Created => Ok(BindOutcome::Linked { address }),
        // Lost a race against ourselves: another request bound this identity
        // between the pre-check and the write.
        BindWrite::IdentityTaken(existing) => Ok(if existing == address {
            BindOutcome::Confirmed { address }
        } else {
            BindOutcome::Rejected {
                reason: BindRejection::IdentityWalletMismatch,
                linked_wallet: Some(existing),
            }
        }),
        BindWrite::WalletTaken => Ok(BindOutcome::Rejected {
            reason: BindRejection::WalletBoundElsewhere,
            linked_wallet: None,
        }),
    }
}
