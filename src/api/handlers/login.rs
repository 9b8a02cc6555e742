use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::{AuthState, AuthStep};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct FlowStatusResponse {
    /// Current authentication state name.
    pub state: String,
    /// The step the client should perform next.
    pub next: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

/// Entry point: reports where the caller is in the flow so the client can
/// resume at the right step. Fully authenticated sessions never reach this
/// handler; the gate has already redirected them home.
#[utoipa::path(
    get,
    path = "/login",
    responses(
        (status = 200, description = "Current flow position", body = [FlowStatusResponse]),
        (status = 303, description = "Redirect home for finished sessions")
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let session = state.session_from_headers(&headers);
    let step = session
        .as_ref()
        .map_or(AuthStep::Unauthenticated, crate::auth::Session::step);
    Json(FlowStatusResponse {
        state: step.as_str().to_string(),
        next: step.next_action().to_string(),
        identity: session.map(|session| session.sub),
    })
}
