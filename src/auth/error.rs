//! Error taxonomy for the authentication protocol.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

/// Failures surfaced by the authentication endpoints.
///
/// Every variant maps to a fixed HTTP status. No error path ever advances
/// the session state machine.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No proven identity for a step that requires one.
    #[error("not authenticated")]
    Unauthenticated,

    /// Malformed input, recoverable by resubmission.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Nonce mismatch, bad signature, or bad TOTP code. Recoverable by
    /// retry; a consumed nonce must be reissued first.
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// Verification attempted with no committed TOTP secret on file.
    /// Deliberately distinct from a failed match: setup is a legitimate path.
    #[error("TOTP not configured")]
    TotpNotConfigured,

    /// A committed TOTP secret already exists and differs from the
    /// submitted one. Re-enrollment requires an administrative path.
    #[error("TOTP already configured")]
    AlreadyEnrolled,

    /// The identity/wallet pair violates the one-to-one binding invariant.
    /// `linked_wallet` is the existing binding on an identity-side conflict.
    #[error("wallet binding conflict")]
    BindingConflict {
        linked_wallet: Option<String>,
        connected_wallet: String,
    },

    /// Store or cryptographic subsystem failure; safe to retry.
    #[error("service unavailable")]
    Unavailable,
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::InvalidInput(_) | Self::TotpNotConfigured => StatusCode::BAD_REQUEST,
            Self::VerificationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::AlreadyEnrolled => StatusCode::CONFLICT,
            Self::BindingConflict { .. } => StatusCode::FORBIDDEN,
            Self::Unavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::BindingConflict {
                linked_wallet,
                connected_wallet,
            } => json!({
                "error": self.to_string(),
                "linked_wallet": linked_wallet,
                "connected_wallet": connected_wallet,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        error!("Identity store error: {err}");
        Self::Unavailable
    }
}
