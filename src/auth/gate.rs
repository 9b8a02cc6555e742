//! Access gate: evaluated from scratch on every inbound request.
//!
//! Anything outside the public surface (the entry point, the auth
//! sub-protocol endpoints, health, and the API docs) requires a session at
//! exactly `FullyAuthenticated`; otherwise the request is redirected to the
//! entry point. A finished session is redirected *away* from the entry
//! point so a completed flow cannot be re-entered.

use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::{session::AuthStep, state::AuthState};

pub const ENTRY_PATH: &str = "/login";
const HOME_PATH: &str = "/";

fn is_public(path: &str) -> bool {
    path == ENTRY_PATH
        || path == "/health"
        || path.starts_with("/auth/")
        || path.starts_with("/swagger-ui")
        || path.starts_with("/api-docs")
}

/// Where to send this request, if anywhere. `None` lets it through.
pub(crate) fn redirect_target(path: &str, step: AuthStep) -> Option<&'static str> {
    if path == ENTRY_PATH && step == AuthStep::FullyAuthenticated {
        return Some(HOME_PATH);
    }
    if !is_public(path) && step != AuthStep::FullyAuthenticated {
        return Some(ENTRY_PATH);
    }
    None
}

pub async fn enforce(
    Extension(state): Extension<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let step = state
        .session_from_headers(request.headers())
        .map_or(AuthStep::Unauthenticated, |session| session.step());

    if let Some(target) = redirect_target(&path, step) {
        debug!(%path, step = step.as_str(), target, "gate redirect");
        return Redirect::to(target).into_response();
    }
    next.run(request).await
}
