//! External identity assertion intake.
//!
//! The provider's protocol is out of scope: the opaque assertion is handed
//! to the configured verification endpoint, and a fresh session is minted
//! from the identity it asserts. Any prior session is discarded wholesale.

use axum::{
    extract::Extension,
    response::{IntoResponse, Json},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

use super::{normalize_identity, valid_email};
use crate::api::APP_USER_AGENT;
use crate::auth::{AuthError, AuthState, Session};

#[derive(ToSchema, Deserialize, Debug)]
pub struct SsoCallbackRequest {
    /// Opaque assertion issued by the external provider.
    pub assertion: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SsoCallbackResponse {
    pub identity: String,
    /// Whether a TOTP secret is already committed for this identity.
    pub totp_enabled: bool,
    pub next: String,
}

#[derive(Deserialize, Debug)]
struct VerifiedAssertion {
    email: String,
}

/// Hand the assertion to the external provider's verification endpoint.
async fn verify_assertion(verify_url: &str, assertion: &str) -> Result<String, AuthError> {
    let client = Client::builder()
        .user_agent(APP_USER_AGENT)
        .build()
        .map_err(|err| {
            error!("Failed to build HTTP client: {err}");
            AuthError::Unavailable
        })?;

    let response = client
        .post(verify_url)
        .json(&json!({ "assertion": assertion }))
        .send()
        .await
        .map_err(|err| {
            error!("Identity provider unreachable: {err}");
            AuthError::Unavailable
        })?;

    if !response.status().is_success() {
        return Err(AuthError::VerificationFailed(
            "identity assertion rejected".to_string(),
        ));
    }

    let verified: VerifiedAssertion = response.json().await.map_err(|err| {
        error!("Malformed identity provider response: {err}");
        AuthError::Unavailable
    })?;
    Ok(verified.email)
}

#[utoipa::path(
    post,
    path = "/auth/sso/callback",
    request_body = SsoCallbackRequest,
    responses(
        (status = 200, description = "Identity proven; fresh session issued", body = [SsoCallbackResponse]),
        (status = 400, description = "Malformed assertion or identity"),
        (status = 422, description = "Assertion rejected by the provider")
    ),
    tag = "auth"
)]
pub async fn callback(
    Extension(state): Extension<Arc<AuthState>>,
    Json(payload): Json<SsoCallbackRequest>,
) -> Result<impl IntoResponse, AuthError> {
    if payload.assertion.trim().is_empty() {
        return Err(AuthError::InvalidInput("empty assertion".to_string()));
    }

    let asserted = verify_assertion(state.config().sso_verify_url(), &payload.assertion).await?;
    let identity = normalize_identity(&asserted);
    if !valid_email(&identity) {
        return Err(AuthError::InvalidInput(
            "asserted identity is not a valid address".to_string(),
        ));
    }

    let mut session = Session::new(identity.clone(), state.config().session_ttl_seconds());
    // Mirror the permanent enrollment fact into the fresh session's claims.
    session.totp_enabled = state
        .store()
        .get(&identity)
        .await?
        .is_some_and(|record| record.totp_secret.is_some());

    info!(%identity, "Identity proven by external provider");

    let headers = state.session_headers(&session)?;
    let body = Json(SsoCallbackResponse {
        identity,
        totp_enabled: session.totp_enabled,
        next: session.step().next_action().to_string(),
    });
    Ok((headers, body))
}
