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
pub struct HomeResponse {
    pub identity: String,
    pub wallet_address: String,
}

/// The protected surface. The gate has already required a fully
/// authenticated session; this handler only renders it.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Authenticated identity and bound wallet", body = [HomeResponse]),
        (status = 303, description = "Redirect to the entry point")
    ),
    tag = "protected"
)]
pub async fn home(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let session = state.require_identity(&headers)?;
    let wallet_address = session.wallet_address.ok_or(AuthError::Unauthenticated)?;
    Ok(Json(HomeResponse {
        identity: session.sub,
        wallet_address,
    }))
}
