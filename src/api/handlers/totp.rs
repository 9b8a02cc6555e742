//! TOTP enrollment and verification endpoints.
//!
//! Setup has no persistence side effect; the generated secret travels to
//! the client and comes back with the first code, and is committed only
//! when that code validates. A lost setup response costs nothing.

use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::auth::{AuthError, AuthEvent, AuthState};
use crate::store::CommitOutcome;
use crate::totp::valid_code_format;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TotpSetupResponse {
    /// Base32 secret, echoed back on the first verify.
    pub secret: String,
    /// otpauth:// provisioning descriptor for manual entry.
    pub otpauth_url: String,
    /// PNG data URL rendering of the descriptor.
    pub qr_code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TotpStatusResponse {
    pub totp_enabled: bool,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct TotpVerifyRequest {
    pub code: String,
    /// Present only on the first verification after setup.
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TotpVerifyResponse {
    pub success: bool,
    /// True when this verification committed a fresh enrollment.
    pub is_setup: bool,
    pub next: String,
}

#[utoipa::path(
    get,
    path = "/auth/totp/setup",
    responses(
        (status = 200, description = "Fresh enrollment material; nothing persisted yet", body = [TotpSetupResponse]),
        (status = 401, description = "No proven identity"),
        (status = 409, description = "A TOTP secret is already committed")
    ),
    tag = "totp"
)]
pub async fn setup(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let session = state.require_identity(&headers)?;

    let enrolled = state
        .store()
        .get(&session.sub)
        .await?
        .is_some_and(|record| record.totp_secret.is_some());
    if enrolled {
        return Err(AuthError::AlreadyEnrolled);
    }

    let enrollment = state.totp().enroll(&session.sub)?;
    Ok(Json(TotpSetupResponse {
        secret: enrollment.secret,
        otpauth_url: enrollment.otpauth_url,
        qr_code: enrollment.qr_code,
    }))
}

#[utoipa::path(
    get,
    path = "/auth/totp/verify",
    responses(
        (status = 200, description = "Whether a committed secret exists", body = [TotpStatusResponse]),
        (status = 401, description = "No proven identity")
    ),
    tag = "totp"
)]
pub async fn status(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let session = state.require_identity(&headers)?;
    let totp_enabled = state
        .store()
        .get(&session.sub)
        .await?
        .is_some_and(|record| record.totp_secret.is_some());
    Ok(Json(TotpStatusResponse { totp_enabled }))
}

#[utoipa::path(
    post,
    path = "/auth/totp/verify",
    request_body = TotpVerifyRequest,
    responses(
        (status = 200, description = "Code accepted; session advanced", body = [TotpVerifyResponse]),
        (status = 400, description = "Malformed code, or no committed secret and none submitted"),
        (status = 401, description = "No proven identity"),
        (status = 409, description = "A different secret is already committed"),
        (status = 422, description = "Code did not match")
    ),
    tag = "totp"
)]
pub async fn verify(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    Json(payload): Json<TotpVerifyRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let session = state.require_identity(&headers)?;

    if !valid_code_format(&payload.code) {
        return Err(AuthError::InvalidInput(
            "code must be exactly six digits".to_string(),
        ));
    }

    let committed = state
        .store()
        .get(&session.sub)
        .await?
        .and_then(|record| record.totp_secret);

    let (secret, is_setup) = match (committed, payload.secret) {
        // Enrollment: validate against the submitted secret, then commit.
        (None, Some(submitted)) => (submitted, true),
        // Returning user: the committed secret is authoritative; any
        // submitted secret is ignored.
        (Some(stored), _) => (stored, false),
        (None, None) => return Err(AuthError::TotpNotConfigured),
    };

    if !state.totp().validate(&secret, &payload.code, &session.sub)? {
        return Err(AuthError::VerificationFailed(
            "code did not match".to_string(),
        ));
    }

    if is_setup {
        match state.store().commit_totp_secret(&session.sub, &secret).await? {
            CommitOutcome::Committed => {
                info!(identity = %session.sub, "TOTP enrollment committed");
            }
            CommitOutcome::AlreadyEnrolled => return Err(AuthError::AlreadyEnrolled),
        }
    }

    let session = session.apply(AuthEvent::TotpSatisfied { enrolled: is_setup })?;
    let headers = state.session_headers(&session)?;
    let body = Json(TotpVerifyResponse {
        success: true,
        is_setup,
        next: session.step().next_action().to_string(),
    });
    Ok((headers, body))
}
