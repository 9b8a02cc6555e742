//! Signed session token and cookie plumbing.
//!
//! The token is `base64url(claims JSON) . base64url(HMAC-SHA256 tag)`.
//! The server holds only the signing secret; all session state travels with
//! the client, so every request is checked from scratch.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::error;

use super::{error::AuthError, session::Session};

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE_NAME: &str = "walletgate_session";

/// Issues and validates signed session tokens.
#[derive(Clone)]
pub struct TokenSigner {
    secret: SecretString,
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Encode and sign the claims snapshot.
    ///
    /// # Errors
    /// Returns `AuthError::Unavailable` if serialization or MAC setup fails.
    pub fn encode(&self, session: &Session) -> Result<String, AuthError> {
        let payload = serde_json::to_vec(session).map_err(|err| {
            error!("Failed to serialize session claims: {err}");
            AuthError::Unavailable
        })?;
        let body = Base64UrlUnpadded::encode_string(&payload);
        let tag = self.tag(body.as_bytes())?;
        Ok(format!("{body}.{tag}"))
    }

    /// Validate signature and expiry, returning the claims.
    ///
    /// # Errors
    /// Returns `AuthError::Unauthenticated` on any malformed, forged, or
    /// expired token; no distinction is leaked to the caller.
    pub fn decode(&self, token: &str, now: i64) -> Result<Session, AuthError> {
        let (body, tag) = token.split_once('.').ok_or(AuthError::Unauthenticated)?;
        let tag_bytes =
            Base64UrlUnpadded::decode_vec(tag).map_err(|_| AuthError::Unauthenticated)?;
        let mut mac = self.mac()?;
        mac.update(body.as_bytes());
        mac.verify_slice(&tag_bytes)
            .map_err(|_| AuthError::Unauthenticated)?;

        let payload =
            Base64UrlUnpadded::decode_vec(body).map_err(|_| AuthError::Unauthenticated)?;
        let session: Session =
            serde_json::from_slice(&payload).map_err(|_| AuthError::Unauthenticated)?;
        if session.exp <= now {
            return Err(AuthError::Unauthenticated);
        }
        Ok(session)
    }

    fn tag(&self, body: &[u8]) -> Result<String, AuthError> {
        let mut mac = self.mac()?;
        mac.update(body);
        Ok(Base64UrlUnpadded::encode_string(
            &mac.finalize().into_bytes(),
        ))
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes()).map_err(|err| {
            error!("Failed to initialize session MAC: {err}");
            AuthError::Unavailable
        })
    }
}

/// Build the `HttpOnly` session cookie carrying a signed token.
///
/// # Errors
/// Returns an error if the token contains bytes invalid in a header value.
pub fn session_cookie(
    token: &str,
    ttl_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Pull the session token from the cookie header, or a bearer header for
/// non-browser clients.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        // Segments without '=' (nameless cookies) are skipped, not fatal.
        let Some((key, val)) = pair.trim().split_once('=') else {
            continue;
        };
        if key.trim() == SESSION_COOKIE_NAME {
            return Some(val.trim().to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
