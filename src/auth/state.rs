//! Shared handler state and configuration.

use axum::http::{header::SET_COOKIE, HeaderMap};
use chrono::Utc;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::error;

use super::{
    error::AuthError,
    session::{AuthStep, Session},
    token::{self, TokenSigner},
};
use crate::{store::IdentityStore, totp::TotpEngine};

const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_NONCE_TTL_SECONDS: i64 = 5 * 60;

/// Authentication configuration loaded at startup.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    issuer: String,
    sso_verify_url: String,
    session_secret: SecretString,
    session_ttl_seconds: i64,
    nonce_ttl_seconds: i64,
    cookie_secure: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(issuer: String, sso_verify_url: String, session_secret: SecretString) -> Self {
        Self {
            issuer,
            sso_verify_url,
            session_secret,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            nonce_ttl_seconds: DEFAULT_NONCE_TTL_SECONDS,
            cookie_secure: false,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, ttl: i64) -> Self {
        self.session_ttl_seconds = ttl;
        self
    }

    #[must_use]
    pub fn with_nonce_ttl_seconds(mut self, ttl: i64) -> Self {
        self.nonce_ttl_seconds = ttl;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn sso_verify_url(&self) -> &str {
        &self.sso_verify_url
    }

    #[must_use]
    pub fn session_secret(&self) -> &SecretString {
        &self.session_secret
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn nonce_ttl_seconds(&self) -> i64 {
        self.nonce_ttl_seconds
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }
}

/// Everything the handlers and the gate share: configuration, token signer,
/// TOTP engine, and the identity store handle. Injected via `Extension`;
/// there is no ambient global state.
pub struct AuthState {
    config: AuthConfig,
    signer: TokenSigner,
    totp: TotpEngine,
    store: Arc<dyn IdentityStore>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, store: Arc<dyn IdentityStore>) -> Self {
        let signer = TokenSigner::new(config.session_secret().clone());
        let totp = TotpEngine::new(config.issuer().to_string());
        Self {
            config,
            signer,
            totp,
            store,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    #[must_use]
    pub fn totp(&self) -> &TotpEngine {
        &self.totp
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    /// Decode the request's session, if any. Invalid or expired tokens are
    /// treated as absent to avoid leaking auth state.
    #[must_use]
    pub fn session_from_headers(&self, headers: &HeaderMap) -> Option<Session> {
        let token = token::extract_session_token(headers)?;
        self.signer.decode(&token, Utc::now().timestamp()).ok()
    }

    /// Require at least a proven identity.
    ///
    /// # Errors
    /// `AuthError::Unauthenticated` when no valid session is attached.
    pub fn require_identity(&self, headers: &HeaderMap) -> Result<Session, AuthError> {
        self.session_from_headers(headers)
            .ok_or(AuthError::Unauthenticated)
    }

    /// Require the TOTP step to be satisfied this session. Used by the
    /// wallet sub-protocol endpoints; a previously valid wallet proof never
    /// substitutes for the missing step.
    ///
    /// # Errors
    /// `AuthError::Unauthenticated` when the session has not reached
    /// `TotpVerified`.
    pub fn require_totp_verified(&self, headers: &HeaderMap) -> Result<Session, AuthError> {
        let session = self.require_identity(headers)?;
        if session.step() < AuthStep::TotpVerified {
            return Err(AuthError::Unauthenticated);
        }
        Ok(session)
    }

    /// Re-sign the session and produce the `Set-Cookie` header for it.
    ///
    /// # Errors
    /// `AuthError::Unavailable` if signing or header construction fails.
    pub fn session_headers(&self, session: &Session) -> Result<HeaderMap, AuthError> {
        let token = self.signer.encode(session)?;
        let cookie = token::session_cookie(
            &token,
            self.config.session_ttl_seconds(),
            self.config.cookie_secure(),
        )
        .map_err(|err| {
            error!("Failed to build session cookie: {err}");
            AuthError::Unavailable
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(SET_COOKIE, cookie);
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::http::{header::COOKIE, HeaderValue};

    fn state() -> AuthState {
        let config = AuthConfig::new(
            "WalletGate".to_string(),
            "http://sso.invalid/verify".to_string(),
            SecretString::from("test-secret".to_string()),
        );
        AuthState::new(config, Arc::new(MemoryStore::new()))
    }

    #[test]
    fn config_defaults() {
        let state = state();
        assert_eq!(state.config().session_ttl_seconds(), 86_400);
        assert_eq!(state.config().nonce_ttl_seconds(), 300);
        assert!(!state.config().cookie_secure());
    }

    #[test]
    fn require_identity_without_cookie_fails() {
        let state = state();
        let headers = HeaderMap::new();
        assert!(matches!(
            state.require_identity(&headers),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn session_round_trips_through_cookie_headers() {
        let state = state();
        let session = Session::new("alice@example.com".to_string(), 3600);
        let headers = state.session_headers(&session).expect("set-cookie");
        let cookie = headers
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .expect("cookie pair")
            .to_string();

        let mut request_headers = HeaderMap::new();
        request_headers.insert(COOKIE, HeaderValue::from_str(&cookie).expect("header"));
        let decoded = state.require_identity(&request_headers).expect("session");
        assert_eq!(decoded, session);
    }

    #[test]
    fn totp_gate_requires_this_sessions_proof() {
        let state = state();
        let mut session = Session::new("alice@example.com".to_string(), 3600);
        session.totp_enabled = true; // enrolled in a past session
        let headers = state.session_headers(&session).expect("set-cookie");
        let cookie = headers
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .expect("cookie pair")
            .to_string();
        let mut request_headers = HeaderMap::new();
        request_headers.insert(COOKIE, HeaderValue::from_str(&cookie).expect("header"));
        assert!(state.require_totp_verified(&request_headers).is_err());
    }
}
