//! Wallet-ownership proof endpoints.
//!
//! Both endpoints require the TOTP step to be satisfied in this session.
//! The nonce is taken from the store before any cryptography runs, so a
//! failed attempt always costs the caller a round trip to reissue.

use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::auth::{AuthError, AuthEvent, AuthState};
use crate::binding::{self, BindOutcome};
use crate::siwe::{self, SiweError, SiweMessage};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct NonceResponse {
    pub nonce: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct SiweVerifyRequest {
    /// Full plaintext sign-in message, exactly as signed.
    pub message: String,
    /// 65-byte hex signature from `personal_sign`.
    pub signature: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SiweVerifyResponse {
    pub success: bool,
    /// Canonical lowercase bound address.
    pub address: String,
    /// True when this proof created the binding rather than confirming it.
    pub is_new_link: bool,
    pub next: String,
}

#[utoipa::path(
    get,
    path = "/auth/siwe/nonce",
    responses(
        (status = 200, description = "Fresh single-use nonce; invalidates any prior one", body = [NonceResponse]),
        (status = 401, description = "TOTP step not satisfied this session")
    ),
    tag = "siwe"
)]
pub async fn nonce(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let session = state.require_totp_verified(&headers)?;
    let nonce = siwe::generate_nonce();
    state.store().put_nonce(&session.sub, &nonce).await?;
    Ok(Json(NonceResponse { nonce }))
}

#[utoipa::path(
    post,
    path = "/auth/siwe/verify",
    request_body = SiweVerifyRequest,
    responses(
        (status = 200, description = "Proof accepted; wallet bound or confirmed", body = [SiweVerifyResponse]),
        (status = 400, description = "Malformed message"),
        (status = 401, description = "TOTP step not satisfied this session"),
        (status = 403, description = "Binding conflict; existing pair reported"),
        (status = 422, description = "Nonce or signature did not verify")
    ),
    tag = "siwe"
)]
pub async fn verify(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    Json(payload): Json<SiweVerifyRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let session = state.require_totp_verified(&headers)?;

    let message: SiweMessage = payload
        .message
        .parse()
        .map_err(|err: SiweError| AuthError::InvalidInput(err.to_string()))?;

    // Cheap checks first, then the single-use nonce, then the signature.
    // The nonce is consumed before recovery so a replayed message can never
    // reach the cryptographic path twice.
    let issued = state
        .store()
        .take_nonce(&session.sub)
        .await?
        .ok_or_else(|| AuthError::VerificationFailed("no outstanding nonce".to_string()))?;
    if issued.nonce != message.nonce {
        return Err(AuthError::VerificationFailed(
            "nonce mismatch".to_string(),
        ));
    }
    if Utc::now().timestamp() - issued.issued_at_unix > state.config().nonce_ttl_seconds() {
        return Err(AuthError::VerificationFailed("nonce expired".to_string()));
    }

    let recovered = siwe::recover_address(&payload.message, &payload.signature)
        .map_err(|_| AuthError::VerificationFailed("signature did not verify".to_string()))?;
    let claimed = siwe::normalize_address(&message.address);
    if recovered != claimed {
        warn!(identity = %session.sub, "Recovered signer differs from claimed address");
        return Err(AuthError::VerificationFailed(
            "signature does not match the claimed address".to_string(),
        ));
    }

    match binding::bind(state.store().as_ref(), &session.sub, &recovered).await? {
        BindOutcome::Linked { address } => {
            info!(identity = %session.sub, %address, "Wallet bound");
            respond(&state, session, address, true)
        }
        BindOutcome::Confirmed { address } => {
            info!(identity = %session.sub, %address, "Wallet binding confirmed");
            respond(&state, session, address, false)
        }
        BindOutcome::Rejected {
            reason,
            linked_wallet,
        } => {
            warn!(
                identity = %session.sub,
                reason = reason.as_str(),
                "Wallet binding refused"
            );
            Err(AuthError::BindingConflict {
                linked_wallet,
                connected_wallet: recovered,
            })
        }
    }
}

fn respond(
    state: &AuthState,
    session: crate::auth::Session,
    address: String,
    is_new_link: bool,
) -> Result<(HeaderMap, Json<SiweVerifyResponse>), AuthError> {
    let session = session.apply(AuthEvent::WalletConfirmed {
        address: address.clone(),
    })?;
    let headers = state.session_headers(&session)?;
    Ok((
        headers,
        Json(SiweVerifyResponse {
            success: true,
            address,
            is_new_link,
            next: session.step().next_action().to_string(),
        }),
    ))
}
