//! Session state machine for the three-step authentication flow.
//!
//! A session is a client-held snapshot of which proofs have been satisfied.
//! Transitions are explicit: a snapshot plus an event yields a new snapshot,
//! and no event may skip a step. The permanent fact (TOTP enrolled) and the
//! per-session fact (TOTP verified this session) are distinct fields; only
//! the former survives into the next session, via the identity store.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::error::AuthError;

/// Authentication progress, in required order. Each state strictly gates
/// the next.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum AuthStep {
    Unauthenticated,
    IdentityProven,
    TotpVerified,
    FullyAuthenticated,
}

impl AuthStep {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::IdentityProven => "identity_proven",
            Self::TotpVerified => "totp_verified",
            Self::FullyAuthenticated => "fully_authenticated",
        }
    }

    /// The step the client has to complete next.
    #[must_use]
    pub fn next_action(self) -> &'static str {
        match self {
            Self::Unauthenticated => "sso",
            Self::IdentityProven => "totp",
            Self::TotpVerified => "wallet",
            Self::FullyAuthenticated => "complete",
        }
    }
}

/// Events consumed by the state machine. The initial identity assertion is
/// consumed by [`Session::new`]; everything else goes through
/// [`Session::apply`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    /// TOTP Engine succeeded, either via fresh enrollment or a returning
    /// user's code entry.
    TotpSatisfied { enrolled: bool },
    /// Binding Enforcer returned `linked` or `confirmed` for this address.
    WalletConfirmed { address: String },
}

/// Signed-token claims: the per-session view of the identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Identity key: the normalized email-equivalent asserted by the
    /// external provider. Immutable for the session's lifetime.
    pub sub: String,
    /// Permanent flag mirroring whether a TOTP secret is committed.
    pub totp_enabled: bool,
    /// Per-session proof; always false in a freshly minted session.
    pub totp_verified: bool,
    /// Canonical lowercase wallet address confirmed-bound this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Session {
    /// Mint a fresh session from a successful external identity assertion.
    #[must_use]
    pub fn new(identity: String, ttl_seconds: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: identity,
            totp_enabled: false,
            totp_verified: false,
            wallet_address: None,
            iat: now,
            exp: now + ttl_seconds,
        }
    }

    #[must_use]
    pub fn step(&self) -> AuthStep {
        if self.totp_verified && self.wallet_address.is_some() {
            AuthStep::FullyAuthenticated
        } else if self.totp_verified {
            AuthStep::TotpVerified
        } else {
            AuthStep::IdentityProven
        }
    }

    /// Apply an event, returning the advanced snapshot.
    ///
    /// # Errors
    /// Returns `AuthError::Unauthenticated` when the event would skip a
    /// step; the snapshot is unchanged in that case.
    pub fn apply(self, event: AuthEvent) -> Result<Self, AuthError> {
        match event {
            AuthEvent::TotpSatisfied { enrolled } => Ok(Self {
                totp_enabled: self.totp_enabled || enrolled,
                totp_verified: true,
                ..self
            }),
            AuthEvent::WalletConfirmed { address } => {
                if !self.totp_verified {
                    return Err(AuthError::Unauthenticated);
                }
                Ok(Self {
                    wallet_address: Some(address),
                    ..self
                })
            }
        }
    }
}
