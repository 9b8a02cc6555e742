use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::{AuthError, AuthState};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct WalletLinkResponse {
    pub has_linked_wallet: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_wallet: Option<String>,
}

/// Report the identity's permanent wallet binding, if any. Available from
/// `IdentityProven` so clients can show which wallet to connect before the
/// proof starts.
#[utoipa::path(
    get,
    path = "/auth/wallet",
    responses(
        (status = 200, description = "Binding status for the session identity", body = [WalletLinkResponse]),
        (status = 401, description = "No proven identity")
    ),
    tag = "siwe"
)]
pub async fn link_status(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let session = state.require_identity(&headers)?;
    let linked_wallet = state
        .store()
        .get(&session.sub)
        .await?
        .and_then(|record| record.wallet_address);
    Ok(Json(WalletLinkResponse {
        has_linked_wallet: linked_wallet.is_some(),
        linked_wallet,
    }))
}
